//! Free text and shared contacts.
//!
//! Text only ever answers the field the active step is waiting for. Invalid
//! input re-prompts and leaves the step where it is.

use tracing::{info, warn};

use super::router::{Context, Transition};
use super::transport::Outbound;
use super::ui_builder;
use crate::db::{BookingOutcome, NewBooking, NewUser};
use crate::dialogue::{AddTripStep, Conversation, SearchStep};
use crate::errors::{error_logging, AppResult};
use crate::locations::LocationId;
use crate::observability;
use crate::validation::{validate_passenger_name, validate_phone, validate_price};

pub async fn handle_text(
    ctx: &Context<'_>,
    state: Option<Conversation>,
    text: &str,
) -> AppResult<Transition> {
    let Some(state) = state else {
        return Ok(Transition::keep().push(ctx.send(ui_builder::free_text_hint())));
    };

    match state {
        Conversation::Search(SearchStep::PassengerName {
            trip_id,
            seats,
            origin,
            destination,
        }) => Ok(passenger_name(ctx, trip_id, seats, origin, destination, text)),
        Conversation::Search(SearchStep::PassengerPhone {
            trip_id,
            seats,
            origin,
            destination,
            name,
        }) => {
            let booking = PendingBooking {
                trip_id,
                seats,
                origin,
                destination,
                name,
            };
            passenger_phone(ctx, booking, text).await
        }
        Conversation::AddTrip(AddTripStep::EnterPrice { schedule }) => match validate_price(text) {
            Ok(price) => Ok(Transition::set(Conversation::AddTrip(AddTripStep::ChooseModel {
                schedule: schedule.clone(),
                price,
            }))
            .push(ctx.send(ui_builder::choose_model(&schedule, price)))),
            Err(reason) => {
                error_logging::log_validation_error(&reason, "enter_price", Some(ctx.chat_id()), "price", Some(text));
                Ok(Transition::keep().push(ctx.send(ui_builder::invalid_price(reason))))
            }
        },
        // Every other step expects a button press
        _ => Ok(Transition::keep().push(ctx.send(ui_builder::use_buttons_hint()))),
    }
}

fn passenger_name(
    ctx: &Context<'_>,
    trip_id: i64,
    seats: i32,
    origin: LocationId,
    destination: LocationId,
    text: &str,
) -> Transition {
    match validate_passenger_name(text) {
        Ok(name) => Transition::set(Conversation::Search(SearchStep::PassengerPhone {
            trip_id,
            seats,
            origin,
            destination,
            name: name.to_string(),
        }))
        .push(ctx.send(ui_builder::ask_passenger_phone(name))),
        Err(reason) => Transition::keep().push(ctx.send(ui_builder::invalid_name(reason))),
    }
}

/// Fields collected by the search flow before the phone number
struct PendingBooking {
    trip_id: i64,
    seats: i32,
    origin: LocationId,
    destination: LocationId,
    name: String,
}

async fn passenger_phone(
    ctx: &Context<'_>,
    booking: PendingBooking,
    raw_phone: &str,
) -> AppResult<Transition> {
    let phone = match validate_phone(raw_phone) {
        Ok(phone) => phone,
        Err(reason) => {
            error_logging::log_validation_error(&reason, "enter_phone", Some(ctx.chat_id()), "phone", Some(raw_phone));
            return Ok(Transition::keep().push(ctx.send(ui_builder::invalid_phone())));
        }
    };

    let outcome = ctx
        .repo
        .create_booking(NewBooking {
            trip_id: booking.trip_id,
            passenger_name: booking.name.clone(),
            passenger_phone: phone,
            passenger_chat_id: Some(ctx.chat_id()),
            seats_booked: booking.seats,
        })
        .await?;

    match outcome {
        BookingOutcome::Created { booking, trip } => {
            observability::record_booking_outcome("created");
            info!(
                chat_id = %ctx.chat_id(),
                booking_id = %booking.id,
                trip_id = %trip.id,
                seats = %booking.seats_booked,
                "Booking created"
            );

            let mut transition = Transition::clear()
                .after_write()
                .push(ctx.send(ui_builder::booking_created(&booking, &trip)));
            match ctx.notification_chat(&trip).await {
                Some(driver_chat) => {
                    transition = transition.push(Outbound::send(
                        driver_chat,
                        ui_builder::driver_notification(&booking, &trip),
                    ));
                }
                None => warn!(trip_id = %trip.id, "Trip has no linked driver chat; booking not announced"),
            }
            Ok(transition)
        }
        BookingOutcome::InsufficientSeats { available } => {
            observability::record_booking_outcome("insufficient_seats");
            let Some(trip) = ctx.repo.get_trip(booking.trip_id).await? else {
                return Ok(trip_gone(ctx));
            };
            Ok(Transition::set(Conversation::Search(SearchStep::ChooseSeats {
                trip_id: trip.id,
                origin: booking.origin,
                destination: booking.destination,
            }))
            .push(ctx.send(ui_builder::Screen::removing_keyboard(
                ui_builder::only_seats_left(available),
            )))
            .push(ctx.send(ui_builder::trip_detail(&trip, None))))
        }
        BookingOutcome::TripUnavailable => {
            observability::record_booking_outcome("trip_unavailable");
            Ok(trip_gone(ctx))
        }
    }
}

fn trip_gone(ctx: &Context<'_>) -> Transition {
    Transition::clear()
        .push(ctx.send(ui_builder::Screen::removing_keyboard(ui_builder::TRIP_UNAVAILABLE)))
        .push(ctx.send(ui_builder::main_menu(None)))
}

/// A shared contact answers the booking phone step; otherwise it registers
/// the sender
pub async fn handle_contact(
    ctx: &Context<'_>,
    state: Option<Conversation>,
    phone: &str,
    contact_user_id: Option<i64>,
) -> AppResult<Transition> {
    if let Some(Conversation::Search(SearchStep::PassengerPhone {
        trip_id,
        seats,
        origin,
        destination,
        name,
    })) = state
    {
        let booking = PendingBooking {
            trip_id,
            seats,
            origin,
            destination,
            name,
        };
        return passenger_phone(ctx, booking, phone).await;
    }

    let Some(sender) = &ctx.envelope.sender else {
        return Ok(Transition::keep().push(ctx.send(ui_builder::contact_not_own())));
    };
    if contact_user_id != Some(sender.user_id) {
        warn!(chat_id = %ctx.chat_id(), "Rejected contact belonging to another user");
        return Ok(Transition::keep().push(ctx.send(ui_builder::contact_not_own())));
    }

    let phone = match validate_phone(phone) {
        Ok(phone) => phone,
        Err(reason) => {
            error_logging::log_validation_error(&reason, "register", Some(ctx.chat_id()), "phone", Some(phone));
            return Ok(Transition::keep().push(ctx.send(ui_builder::invalid_phone())));
        }
    };

    let user = ctx
        .repo
        .register_user(NewUser {
            telegram_id: sender.user_id,
            chat_id: ctx.chat_id(),
            full_name: sender.full_name(),
            phone,
        })
        .await?;
    info!(chat_id = %ctx.chat_id(), user_id = %user.id, "User registered");

    Ok(Transition::keep()
        .push(ctx.send(ui_builder::registration_complete(&user.full_name)))
        .push(ctx.send(ui_builder::main_menu(Some(&user.full_name)))))
}
