//! Driver add-trip flow. Each step accepts exactly one kind of button; the
//! price step is answered by text in `message_handler`.

use chrono::NaiveTime;
use tracing::{debug, info};

use super::callback_data::CallbackData;
use crate::bot::router::{Context, Transition};
use crate::bot::ui_builder::{self, FIRST_HOUR, LAST_HOUR, MAX_SEAT_BUTTONS, VEHICLE_COLORS, VEHICLE_MODELS};
use crate::db::NewTrip;
use crate::dialogue::{AddTripStep, Conversation, Itinerary, Route, Schedule};
use crate::errors::{AppError, AppResult};
use crate::locations::{self, LocationId};
use crate::observability;

fn next(step: AddTripStep) -> Transition {
    Transition::set(Conversation::AddTrip(step))
}

pub async fn handle(
    ctx: &Context<'_>,
    step: AddTripStep,
    callback: CallbackData,
) -> AppResult<Transition> {
    match (step, callback) {
        (AddTripStep::ChooseOrigin, CallbackData::AddOrigin(origin)) => {
            Ok(next(AddTripStep::ChooseDestination { origin })
                .push(ctx.reply(ui_builder::choose_destination(origin, CallbackData::AddDestination))))
        }

        (AddTripStep::ChooseDestination { origin }, CallbackData::AddDestination(destination))
            if destination != origin =>
        {
            let route = Route {
                origin,
                destination,
            };
            if locations::is_regional_center(destination) {
                let selected = Default::default();
                let screen = ui_builder::choose_pickups(route, &selected);
                Ok(next(AddTripStep::ChoosePickups { route, selected }).push(ctx.reply(screen)))
            } else {
                let itinerary = Itinerary {
                    route,
                    pickups: Vec::new(),
                };
                let screen = ui_builder::choose_date(&itinerary, ctx.today);
                Ok(next(AddTripStep::ChooseDate { itinerary }).push(ctx.reply(screen)))
            }
        }

        (AddTripStep::ChoosePickups { route, mut selected }, CallbackData::TogglePickup(pickup))
            if is_pickup_candidate(route, pickup) =>
        {
            if !selected.remove(&pickup) {
                selected.insert(pickup);
            }
            let screen = ui_builder::choose_pickups(route, &selected);
            Ok(next(AddTripStep::ChoosePickups { route, selected }).push(ctx.reply(screen)))
        }

        (AddTripStep::ChoosePickups { route, selected }, CallbackData::PickupsDone) => {
            let itinerary = Itinerary {
                route,
                pickups: selected.into_iter().collect(),
            };
            let screen = ui_builder::choose_date(&itinerary, ctx.today);
            Ok(next(AddTripStep::ChooseDate { itinerary }).push(ctx.reply(screen)))
        }

        (AddTripStep::ChooseDate { itinerary }, CallbackData::SelectDate(date))
            if ui_builder::is_in_date_window(date, ctx.today) =>
        {
            let screen = ui_builder::choose_time(&itinerary, date, ctx.today);
            Ok(next(AddTripStep::ChooseTime { itinerary, date }).push(ctx.reply(screen)))
        }

        (AddTripStep::ChooseTime { itinerary, date }, CallbackData::SelectHour(hour))
            if (FIRST_HOUR..=LAST_HOUR).contains(&hour) =>
        {
            let schedule = Schedule {
                itinerary,
                date,
                hour,
            };
            let screen = ui_builder::ask_price(&schedule);
            Ok(next(AddTripStep::EnterPrice { schedule }).push(ctx.reply(screen)))
        }

        (AddTripStep::ChooseModel { schedule, price }, CallbackData::SelectModel(model))
            if model < VEHICLE_MODELS.len() =>
        {
            Ok(next(AddTripStep::ChooseColor {
                schedule,
                price,
                model,
            })
            .push(ctx.reply(ui_builder::choose_color(model))))
        }

        (
            AddTripStep::ChooseColor {
                schedule,
                price,
                model,
            },
            CallbackData::SelectColor(color),
        ) if color < VEHICLE_COLORS.len() => Ok(next(AddTripStep::ChooseSeats {
            schedule,
            price,
            model,
            color,
        })
        .push(ctx.reply(ui_builder::choose_total_seats(model, color)))),

        (
            AddTripStep::ChooseSeats {
                schedule,
                price,
                model,
                color,
            },
            CallbackData::SelectTotalSeats(seats),
        ) if (1..=MAX_SEAT_BUTTONS).contains(&seats) => {
            publish_trip(ctx, schedule, price, model, color, seats).await
        }

        (step, callback) => {
            debug!(chat_id = %ctx.chat_id(), step = ?step, callback = ?callback, "Callback does not match add-trip step");
            Ok(Transition::stale())
        }
    }
}

fn is_pickup_candidate(route: Route, pickup: LocationId) -> bool {
    locations::pickup_candidates(route.origin, route.destination)
        .iter()
        .any(|loc| loc.id == pickup)
}

fn name_of(id: LocationId) -> AppResult<String> {
    locations::get(id)
        .map(|loc| loc.name.to_string())
        .ok_or_else(|| AppError::Internal(format!("unknown location id {}", id)))
}

fn vocabulary_entry(entries: &[&str], index: usize) -> AppResult<String> {
    entries
        .get(index)
        .map(|entry| entry.to_string())
        .ok_or_else(|| AppError::Internal(format!("vocabulary index {} out of range", index)))
}

async fn publish_trip(
    ctx: &Context<'_>,
    schedule: Schedule,
    price: i64,
    model: usize,
    color: usize,
    seats: i32,
) -> AppResult<Transition> {
    let departure_time = NaiveTime::from_hms_opt(schedule.hour, 0, 0)
        .ok_or_else(|| AppError::Internal(format!("invalid departure hour {}", schedule.hour)))?;

    let driver_id = match ctx.sender_id() {
        Some(user_id) => ctx.repo.find_user_by_telegram_id(user_id).await?.map(|u| u.id),
        None => None,
    };

    let itinerary = schedule.itinerary;
    let pickup_districts = itinerary
        .pickups
        .iter()
        .map(|id| name_of(*id))
        .collect::<AppResult<Vec<_>>>()?;

    let trip = ctx
        .repo
        .create_trip(NewTrip {
            driver_id,
            driver_chat_id: Some(ctx.chat_id()),
            from_district: name_of(itinerary.route.origin)?,
            to_district: name_of(itinerary.route.destination)?,
            pickup_districts,
            departure_date: schedule.date,
            departure_time,
            total_seats: seats,
            price_per_seat: price,
            car_model: vocabulary_entry(&VEHICLE_MODELS, model)?,
            car_color: vocabulary_entry(&VEHICLE_COLORS, color)?,
        })
        .await?;

    observability::record_trip_created();
    info!(chat_id = %ctx.chat_id(), trip_id = %trip.id, "Trip published");

    Ok(Transition::clear()
        .after_write()
        .push(ctx.reply(ui_builder::trip_created(&trip))))
}
