//! Passenger search flow: origin, destination, trip, seat count.

use chrono::NaiveDate;
use tracing::debug;

use super::callback_data::CallbackData;
use crate::bot::router::{Context, Transition};
use crate::bot::ui_builder::{self, MAX_SEAT_BUTTONS};
use crate::db::Trip;
use crate::dialogue::{Conversation, SearchStep};
use crate::errors::AppResult;
use crate::locations::{self, LocationId};

pub async fn handle(
    ctx: &Context<'_>,
    step: SearchStep,
    callback: CallbackData,
) -> AppResult<Transition> {
    match (step, callback) {
        (SearchStep::ChooseOrigin, CallbackData::SelectOrigin(origin)) => Ok(Transition::set(
            Conversation::Search(SearchStep::ChooseDestination { origin }),
        )
        .push(ctx.reply(ui_builder::choose_destination(
            origin,
            CallbackData::SelectDestination,
        )))),

        (SearchStep::ChooseDestination { origin }, CallbackData::SelectDestination(destination))
            if destination != origin =>
        {
            show_results(ctx, origin, destination).await
        }

        (
            SearchStep::ChooseTrip {
                origin,
                destination,
            },
            CallbackData::SelectTrip(trip_id),
        ) => select_trip(ctx, trip_id, origin, destination).await,

        (
            SearchStep::ChooseSeats {
                trip_id,
                origin,
                destination,
            },
            CallbackData::SelectSeats {
                trip_id: chosen,
                seats,
            },
        ) if chosen == trip_id && (1..=MAX_SEAT_BUTTONS).contains(&seats) => {
            select_seats(ctx, trip_id, seats, origin, destination).await
        }

        (
            SearchStep::ChooseSeats {
                origin,
                destination,
                ..
            },
            CallbackData::BackToResults,
        ) => show_results(ctx, origin, destination).await,

        (step, callback) => {
            debug!(chat_id = %ctx.chat_id(), step = ?step, callback = ?callback, "Callback does not match search step");
            Ok(Transition::stale())
        }
    }
}

async fn show_results(
    ctx: &Context<'_>,
    origin: LocationId,
    destination: LocationId,
) -> AppResult<Transition> {
    let (Some(from), Some(to)) = (locations::get(origin), locations::get(destination)) else {
        return Ok(Transition::stale());
    };

    let trips = ctx
        .repo
        .search_trips(from.name, to.name, ctx.today, ctx.config.search_result_limit)
        .await?;
    debug!(chat_id = %ctx.chat_id(), origin = %from.name, destination = %to.name, results = trips.len(), "Search completed");

    Ok(Transition::set(Conversation::Search(SearchStep::ChooseTrip {
        origin,
        destination,
    }))
    .push(ctx.reply(ui_builder::search_results(origin, destination, &trips))))
}

async fn select_trip(
    ctx: &Context<'_>,
    trip_id: i64,
    origin: LocationId,
    destination: LocationId,
) -> AppResult<Transition> {
    let trip = match ctx.repo.get_trip(trip_id).await? {
        Some(trip) if trip.is_active => trip,
        _ => return Ok(Transition::clear().push(ctx.reply(ui_builder::trip_not_found()))),
    };

    // Only trips the result list could have shown
    if !serves_route(&trip, origin, destination, ctx.today) {
        debug!(chat_id = %ctx.chat_id(), trip_id = %trip_id, "Selected trip is not on the searched route");
        return Ok(Transition::stale());
    }

    if trip.available_seats() <= 0 {
        return Ok(Transition::keep().with_alert(ui_builder::TRIP_FULL));
    }

    Ok(Transition::set(Conversation::Search(SearchStep::ChooseSeats {
        trip_id,
        origin,
        destination,
    }))
    .push(ctx.reply(ui_builder::trip_detail(&trip, None))))
}

fn serves_route(
    trip: &Trip,
    origin: LocationId,
    destination: LocationId,
    today: NaiveDate,
) -> bool {
    let (Some(from), Some(to)) = (locations::get(origin), locations::get(destination)) else {
        return false;
    };
    trip.to_district == to.name
        && trip.departure_date >= today
        && (trip.from_district == from.name || trip.pickup_districts.iter().any(|p| p == from.name))
}

async fn select_seats(
    ctx: &Context<'_>,
    trip_id: i64,
    seats: i32,
    origin: LocationId,
    destination: LocationId,
) -> AppResult<Transition> {
    let trip = match ctx.repo.get_trip(trip_id).await? {
        Some(trip) if trip.is_active => trip,
        _ => return Ok(Transition::clear().push(ctx.reply(ui_builder::trip_not_found()))),
    };

    // Seats may have gone since the card was drawn; redraw it
    let available = trip.available_seats();
    if seats > available {
        let notice = ui_builder::only_seats_left(available);
        return Ok(Transition::keep()
            .with_notice(notice.clone())
            .push(ctx.reply(ui_builder::trip_detail(&trip, Some(&notice)))));
    }

    Ok(Transition::set(Conversation::Search(SearchStep::PassengerName {
        trip_id,
        seats,
        origin,
        destination,
    }))
    .push(ctx.reply(ui_builder::ask_passenger_name(seats))))
}
