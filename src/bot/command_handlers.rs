//! Command handlers. Every command abandons whatever flow was active; the
//! menu buttons reuse the same entry points.

use tracing::info;

use super::callbacks::callback_data::CallbackData;
use super::router::{Context, Transition};
use super::ui_builder;
use super::Command;
use crate::dialogue::{AddTripStep, Conversation, SearchStep};
use crate::errors::AppResult;

pub async fn handle_command(
    ctx: &Context<'_>,
    state: Option<Conversation>,
    command: &Command,
) -> AppResult<Transition> {
    info!(chat_id = %ctx.chat_id(), command = ?command, "Received command");

    match command {
        Command::Start => start(ctx).await,
        Command::Search => Ok(start_search(ctx)),
        Command::Add => start_add_trip(ctx).await,
        Command::MyTrips => my_trips(ctx).await,
        Command::MyBookings => my_bookings(ctx).await,
        Command::Cancel => Ok(cancel(ctx, state.is_some())),
        Command::Help => Ok(help(ctx)),
    }
}

/// Unrecognized slash text: the active step keeps waiting for its answer
pub fn unknown_command(ctx: &Context<'_>, text: &str) -> Transition {
    info!(chat_id = %ctx.chat_id(), text = %text, "Unknown command");
    Transition::keep().push(ctx.send(ui_builder::unknown_command()))
}

/// Main menu for registered senders, contact request for everyone else
pub async fn start(ctx: &Context<'_>) -> AppResult<Transition> {
    let Some(sender) = &ctx.envelope.sender else {
        return Ok(Transition::clear().push(ctx.send(ui_builder::request_contact())));
    };

    let screen = match ctx.repo.find_user_by_telegram_id(sender.user_id).await? {
        Some(user) => ui_builder::main_menu(Some(&user.full_name)),
        None => ui_builder::request_contact(),
    };
    Ok(Transition::clear().push(ctx.send(screen)))
}

pub fn start_search(ctx: &Context<'_>) -> Transition {
    Transition::set(Conversation::Search(SearchStep::ChooseOrigin))
        .push(ctx.reply(ui_builder::choose_origin(CallbackData::SelectOrigin)))
}

/// Drivers must be registered before publishing trips
pub async fn start_add_trip(ctx: &Context<'_>) -> AppResult<Transition> {
    if !is_registered(ctx).await? {
        return Ok(Transition::clear().push(ctx.reply(ui_builder::not_registered())));
    }
    Ok(Transition::set(Conversation::AddTrip(AddTripStep::ChooseOrigin))
        .push(ctx.reply(ui_builder::choose_origin(CallbackData::AddOrigin))))
}

pub async fn my_trips(ctx: &Context<'_>) -> AppResult<Transition> {
    if !is_registered(ctx).await? {
        return Ok(Transition::clear().push(ctx.reply(ui_builder::not_registered())));
    }
    let screen = my_trips_screen(ctx).await?;
    Ok(Transition::clear().push(ctx.reply(screen)))
}

pub async fn my_trips_screen(ctx: &Context<'_>) -> AppResult<ui_builder::Screen> {
    let trips = ctx.repo.trips_for_driver(ctx.chat_id()).await?;
    let mut listing = Vec::with_capacity(trips.len());
    for trip in trips {
        let bookings = ctx.repo.bookings_for_trip(trip.id).await?;
        listing.push((trip, bookings));
    }
    Ok(ui_builder::my_trips(&listing))
}

pub async fn my_bookings(ctx: &Context<'_>) -> AppResult<Transition> {
    let bookings = ctx.repo.bookings_for_passenger(ctx.chat_id()).await?;
    let mut listing = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let trip = ctx.repo.get_trip(booking.trip_id).await?;
        listing.push((booking, trip));
    }
    Ok(Transition::clear().push(ctx.reply(ui_builder::my_bookings(&listing))))
}

pub fn cancel(ctx: &Context<'_>, had_state: bool) -> Transition {
    if had_state {
        Transition::clear().push(ctx.reply(ui_builder::cancelled(true)))
    } else {
        Transition::clear().push(ctx.reply(ui_builder::nothing_to_cancel()))
    }
}

pub fn help(ctx: &Context<'_>) -> Transition {
    Transition::clear().push(ctx.reply(ui_builder::help()))
}

async fn is_registered(ctx: &Context<'_>) -> AppResult<bool> {
    match ctx.sender_id() {
        Some(user_id) => Ok(ctx.repo.find_user_by_telegram_id(user_id).await?.is_some()),
        None => Ok(false),
    }
}
