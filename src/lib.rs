//! # Shared Taxi Telegram Bot
//!
//! Passengers search for shared-taxi seats between districts and book them;
//! drivers publish trips and accept or reject bookings. Conversations are
//! multi-step flows whose state is stored per chat.

pub mod bot;
pub mod config;
pub mod conversation_store;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod locations;
pub mod observability;
pub mod observability_config;
pub mod repository;
pub mod validation;

pub use conversation_store::{ConversationStore, MemoryConversationStore, PgConversationStore};
pub use repository::{MemoryRepository, PgRepository, TaxiRepository};
