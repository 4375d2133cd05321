//! Inline keyboard callback handling
//!
//! - `callback_data`: typed button payloads and their wire encoding
//! - `callback_handler`: parses the payload and routes it
//! - `search_callbacks`: passenger search flow steps
//! - `add_trip_callbacks`: driver add-trip flow steps
//! - `booking_callbacks`: accept, reject, cancel and deactivate actions

pub mod add_trip_callbacks;
pub mod booking_callbacks;
pub mod callback_data;
pub mod callback_handler;
pub mod search_callbacks;
