//! Actions keyed by a booking or trip id rather than by conversation state.
//!
//! Only the chat that owns the trip may confirm, reject or deactivate; only
//! the chat that made the booking may cancel it. Bookings change status only
//! while pending, so repeated presses never move seats twice.

use tracing::{info, warn};

use crate::bot::command_handlers;
use crate::bot::router::{Context, Transition};
use crate::bot::transport::Outbound;
use crate::bot::ui_builder;
use crate::db::{BookingStatus, BookingTransition};
use crate::errors::{error_logging, AppResult};
use crate::observability;

/// Driver accepts (`confirm = true`) or rejects a pending booking
pub async fn decide(ctx: &Context<'_>, booking_id: i64, confirm: bool) -> AppResult<Transition> {
    let Some(booking) = ctx.repo.get_booking(booking_id).await? else {
        return Ok(Transition::keep().with_alert(ui_builder::BOOKING_NOT_FOUND));
    };
    let Some(trip) = ctx.repo.get_trip(booking.trip_id).await? else {
        return Ok(Transition::keep().with_alert(ui_builder::BOOKING_NOT_FOUND));
    };

    if ctx.repo.notification_chat_for(&trip).await? != Some(ctx.chat_id()) {
        warn!(chat_id = %ctx.chat_id(), booking_id = %booking_id, "Booking decision from a chat that does not own the trip");
        return Ok(Transition::keep().with_alert(ui_builder::NOT_YOUR_TRIP));
    }

    let target = if confirm {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Rejected
    };

    match ctx.repo.transition_booking(booking_id, target).await? {
        BookingTransition::Applied { booking, trip } => {
            observability::record_booking_transition(target.as_str());
            info!(
                chat_id = %ctx.chat_id(),
                booking_id = %booking.id,
                trip_id = %trip.id,
                status = %target.as_str(),
                "Booking decided by driver"
            );

            let mut transition = Transition::keep()
                .after_write()
                .with_notice(ui_builder::status_label(target))
                .push(ctx.reply(ui_builder::driver_decision(&booking, &trip)));
            if let Some(passenger_chat) = booking.passenger_chat_id {
                transition = transition.push(Outbound::send(
                    passenger_chat,
                    ui_builder::passenger_status_update(&booking, &trip),
                ));
            }
            Ok(transition)
        }
        BookingTransition::AlreadyFinal(status) => {
            Ok(Transition::keep().with_alert(ui_builder::already_processed(status)))
        }
        BookingTransition::NotFound => Ok(Transition::keep().with_alert(ui_builder::BOOKING_NOT_FOUND)),
    }
}

/// Passenger withdraws a pending booking
pub async fn cancel_booking(ctx: &Context<'_>, booking_id: i64) -> AppResult<Transition> {
    let Some(booking) = ctx.repo.get_booking(booking_id).await? else {
        return Ok(Transition::keep().with_alert(ui_builder::BOOKING_NOT_FOUND));
    };
    if booking.passenger_chat_id != Some(ctx.chat_id()) {
        warn!(chat_id = %ctx.chat_id(), booking_id = %booking_id, "Cancellation from a chat that did not book");
        return Ok(Transition::keep().with_alert(ui_builder::NOT_YOUR_BOOKING));
    }

    match ctx
        .repo
        .transition_booking(booking_id, BookingStatus::Cancelled)
        .await?
    {
        BookingTransition::Applied { booking, trip } => {
            observability::record_booking_transition(BookingStatus::Cancelled.as_str());
            info!(chat_id = %ctx.chat_id(), booking_id = %booking.id, trip_id = %trip.id, "Booking cancelled by passenger");

            let mut transition = Transition::keep()
                .after_write()
                .with_notice(ui_builder::status_label(BookingStatus::Cancelled))
                .push(ctx.reply(ui_builder::booking_cancelled(&booking)));
            if let Some(driver_chat) = ctx.notification_chat(&trip).await {
                transition = transition.push(Outbound::send(
                    driver_chat,
                    ui_builder::driver_cancellation_notice(&booking, &trip),
                ));
            }
            Ok(transition)
        }
        BookingTransition::AlreadyFinal(status) => {
            Ok(Transition::keep().with_alert(ui_builder::already_processed(status)))
        }
        BookingTransition::NotFound => Ok(Transition::keep().with_alert(ui_builder::BOOKING_NOT_FOUND)),
    }
}

/// Soft-delete a trip from the driver's listing
pub async fn deactivate_trip(ctx: &Context<'_>, trip_id: i64) -> AppResult<Transition> {
    if !ctx.repo.deactivate_trip(trip_id, ctx.chat_id()).await? {
        return Ok(Transition::keep().with_alert(ui_builder::TRIP_NOT_OWNED));
    }
    info!(chat_id = %ctx.chat_id(), trip_id = %trip_id, "Trip deactivated");

    let transition = Transition::keep()
        .after_write()
        .with_notice(ui_builder::trip_deactivated(trip_id));
    // The listing redraw is best-effort once the trip is gone
    match command_handlers::my_trips_screen(ctx).await {
        Ok(screen) => Ok(transition.push(ctx.reply(screen))),
        Err(e) => {
            error_logging::log_database_error(&e, "my_trips_screen", Some(ctx.chat_id()), None);
            Ok(transition)
        }
    }
}
