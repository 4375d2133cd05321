//! Bot module for handling Telegram interactions
//!
//! - `update`: transport-independent view of an inbound update
//! - `router`: loads chat state, dispatches, commits the result
//! - `command_handlers`, `message_handler`, `callbacks`: per-input handlers
//! - `ui_builder`: message texts and keyboards
//! - `transport`: executes outbound actions against the Bot API

pub mod callbacks;
pub mod command_handlers;
pub mod message_handler;
pub mod router;
pub mod transport;
pub mod ui_builder;
pub mod update;

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "register or open the main menu.")]
    Start,
    #[command(description = "find a ride.")]
    Search,
    #[command(description = "offer a trip as a driver.")]
    Add,
    #[command(description = "trips you have published.")]
    MyTrips,
    #[command(description = "seats you have booked.")]
    MyBookings,
    #[command(description = "abandon the current step.")]
    Cancel,
    #[command(description = "show available commands.")]
    Help,
}

pub use router::{FlowRouter, Transition};
pub use transport::{Outbound, TelegramTransport, TelegramWebhookRegistrar};
pub use update::{Envelope, Inbound, Sender};
