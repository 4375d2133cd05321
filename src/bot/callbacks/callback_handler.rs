//! Callback Handler module for processing inline keyboard callback queries

use tracing::debug;

use super::callback_data::{CallbackData, MenuItem};
use super::{add_trip_callbacks, booking_callbacks, search_callbacks};
use crate::bot::command_handlers;
use crate::bot::router::{Context, Transition};
use crate::bot::ui_builder;
use crate::dialogue::Conversation;
use crate::errors::AppResult;

pub async fn handle_callback(
    ctx: &Context<'_>,
    state: Option<Conversation>,
    data: &str,
) -> AppResult<Transition> {
    let Some(callback) = CallbackData::parse(data) else {
        debug!(chat_id = %ctx.chat_id(), data = %data, "Unrecognized callback data");
        return Ok(Transition::stale());
    };
    debug!(chat_id = %ctx.chat_id(), callback = ?callback, "Handling callback");

    match callback {
        CallbackData::Noop => Ok(Transition::keep()),
        CallbackData::Cancel => Ok(Transition::clear().push(ctx.reply(ui_builder::cancelled(state.is_some())))),
        CallbackData::Menu(item) => match item {
            MenuItem::Search => Ok(command_handlers::start_search(ctx)),
            MenuItem::AddTrip => command_handlers::start_add_trip(ctx).await,
            MenuItem::MyTrips => command_handlers::my_trips(ctx).await,
            MenuItem::MyBookings => command_handlers::my_bookings(ctx).await,
            MenuItem::Help => Ok(command_handlers::help(ctx)),
        },

        // Keyed by record id, independent of the conversation
        CallbackData::ConfirmBooking(id) => booking_callbacks::decide(ctx, id, true).await,
        CallbackData::RejectBooking(id) => booking_callbacks::decide(ctx, id, false).await,
        CallbackData::CancelBooking(id) => booking_callbacks::cancel_booking(ctx, id).await,
        CallbackData::DeactivateTrip(id) => booking_callbacks::deactivate_trip(ctx, id).await,

        CallbackData::SelectOrigin(_)
        | CallbackData::SelectDestination(_)
        | CallbackData::SelectTrip(_)
        | CallbackData::SelectSeats { .. }
        | CallbackData::BackToResults => match state {
            Some(Conversation::Search(step)) => search_callbacks::handle(ctx, step, callback).await,
            _ => Ok(Transition::stale()),
        },

        CallbackData::AddOrigin(_)
        | CallbackData::AddDestination(_)
        | CallbackData::TogglePickup(_)
        | CallbackData::PickupsDone
        | CallbackData::SelectDate(_)
        | CallbackData::SelectHour(_)
        | CallbackData::SelectModel(_)
        | CallbackData::SelectColor(_)
        | CallbackData::SelectTotalSeats(_) => match state {
            Some(Conversation::AddTrip(step)) => add_trip_callbacks::handle(ctx, step, callback).await,
            _ => Ok(Transition::stale()),
        },
    }
}
