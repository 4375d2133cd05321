//! Typed inline-button payloads.
//!
//! Every button the bot renders carries one [`CallbackData`] value encoded as
//! `tag` or `tag:arg[:arg]`. Arguments are integers or ISO dates, never free
//! text, so delimiter collisions cannot occur. Telegram caps callback data at
//! 64 bytes; the longest encoding here is well below that.

use chrono::NaiveDate;

use crate::locations::LocationId;

/// Telegram's limit on `callback_data`
pub const MAX_CALLBACK_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Search,
    AddTrip,
    MyTrips,
    MyBookings,
    Help,
}

impl MenuItem {
    fn tag(&self) -> &'static str {
        match self {
            MenuItem::Search => "search",
            MenuItem::AddTrip => "add",
            MenuItem::MyTrips => "trips",
            MenuItem::MyBookings => "bookings",
            MenuItem::Help => "help",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "search" => Some(MenuItem::Search),
            "add" => Some(MenuItem::AddTrip),
            "trips" => Some(MenuItem::MyTrips),
            "bookings" => Some(MenuItem::MyBookings),
            "help" => Some(MenuItem::Help),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackData {
    Menu(MenuItem),
    // Search flow
    SelectOrigin(LocationId),
    SelectDestination(LocationId),
    SelectTrip(i64),
    SelectSeats { trip_id: i64, seats: i32 },
    BackToResults,
    // Add-trip flow
    AddOrigin(LocationId),
    AddDestination(LocationId),
    TogglePickup(LocationId),
    PickupsDone,
    SelectDate(NaiveDate),
    SelectHour(u32),
    SelectModel(usize),
    SelectColor(usize),
    SelectTotalSeats(i32),
    /// Abandon whatever flow is active
    Cancel,
    // Flow-independent actions keyed by record id
    ConfirmBooking(i64),
    RejectBooking(i64),
    CancelBooking(i64),
    DeactivateTrip(i64),
    /// Inert button (labels, page info)
    Noop,
}

impl CallbackData {
    pub fn encode(&self) -> String {
        match self {
            CallbackData::Menu(item) => format!("m:{}", item.tag()),
            CallbackData::SelectOrigin(loc) => format!("from:{}", loc),
            CallbackData::SelectDestination(loc) => format!("to:{}", loc),
            CallbackData::SelectTrip(id) => format!("trip:{}", id),
            CallbackData::SelectSeats { trip_id, seats } => format!("book:{}:{}", trip_id, seats),
            CallbackData::BackToResults => "back_results".to_string(),
            CallbackData::AddOrigin(loc) => format!("add_from:{}", loc),
            CallbackData::AddDestination(loc) => format!("add_to:{}", loc),
            CallbackData::TogglePickup(loc) => format!("add_pickup:{}", loc),
            CallbackData::PickupsDone => "add_pickup_done".to_string(),
            CallbackData::SelectDate(date) => format!("add_date:{}", date.format("%Y-%m-%d")),
            CallbackData::SelectHour(hour) => format!("add_time:{}", hour),
            CallbackData::SelectModel(index) => format!("add_model:{}", index),
            CallbackData::SelectColor(index) => format!("add_color:{}", index),
            CallbackData::SelectTotalSeats(seats) => format!("add_seats:{}", seats),
            CallbackData::Cancel => "cancel".to_string(),
            CallbackData::ConfirmBooking(id) => format!("confirm:{}", id),
            CallbackData::RejectBooking(id) => format!("reject:{}", id),
            CallbackData::CancelBooking(id) => format!("cancel_booking:{}", id),
            CallbackData::DeactivateTrip(id) => format!("deactivate:{}", id),
            CallbackData::Noop => "noop".to_string(),
        }
    }

    /// Parse a token produced by [`CallbackData::encode`]; anything else is `None`
    pub fn parse(data: &str) -> Option<Self> {
        if data.len() > MAX_CALLBACK_BYTES {
            return None;
        }

        let (tag, args) = match data.split_once(':') {
            Some((tag, args)) => (tag, Some(args)),
            None => (data, None),
        };

        match (tag, args) {
            ("back_results", None) => Some(CallbackData::BackToResults),
            ("add_pickup_done", None) => Some(CallbackData::PickupsDone),
            ("cancel", None) => Some(CallbackData::Cancel),
            ("noop", None) => Some(CallbackData::Noop),
            ("m", Some(item)) => MenuItem::from_tag(item).map(CallbackData::Menu),
            ("from", Some(arg)) => parse_location(arg).map(CallbackData::SelectOrigin),
            ("to", Some(arg)) => parse_location(arg).map(CallbackData::SelectDestination),
            ("trip", Some(arg)) => parse_id(arg).map(CallbackData::SelectTrip),
            ("book", Some(arg)) => {
                let (trip, seats) = arg.split_once(':')?;
                Some(CallbackData::SelectSeats {
                    trip_id: parse_id(trip)?,
                    seats: parse_small(seats)?,
                })
            }
            ("add_from", Some(arg)) => parse_location(arg).map(CallbackData::AddOrigin),
            ("add_to", Some(arg)) => parse_location(arg).map(CallbackData::AddDestination),
            ("add_pickup", Some(arg)) => parse_location(arg).map(CallbackData::TogglePickup),
            ("add_date", Some(arg)) => NaiveDate::parse_from_str(arg, "%Y-%m-%d")
                .ok()
                .map(CallbackData::SelectDate),
            ("add_time", Some(arg)) => {
                let hour = arg.parse::<u32>().ok().filter(|h| *h < 24)?;
                Some(CallbackData::SelectHour(hour))
            }
            ("add_model", Some(arg)) => arg.parse().ok().map(CallbackData::SelectModel),
            ("add_color", Some(arg)) => arg.parse().ok().map(CallbackData::SelectColor),
            ("add_seats", Some(arg)) => parse_small(arg).map(CallbackData::SelectTotalSeats),
            ("confirm", Some(arg)) => parse_id(arg).map(CallbackData::ConfirmBooking),
            ("reject", Some(arg)) => parse_id(arg).map(CallbackData::RejectBooking),
            ("cancel_booking", Some(arg)) => parse_id(arg).map(CallbackData::CancelBooking),
            ("deactivate", Some(arg)) => parse_id(arg).map(CallbackData::DeactivateTrip),
            _ => None,
        }
    }
}

fn parse_location(arg: &str) -> Option<LocationId> {
    let id = arg.parse::<u16>().ok()?;
    crate::locations::get(LocationId(id)).map(|loc| loc.id)
}

fn parse_id(arg: &str) -> Option<i64> {
    arg.parse::<i64>().ok().filter(|id| *id > 0)
}

fn parse_small(arg: &str) -> Option<i32> {
    arg.parse::<i32>().ok().filter(|n| (1..=8).contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tokens() {
        assert_eq!(
            CallbackData::parse("from:3"),
            Some(CallbackData::SelectOrigin(LocationId(3)))
        );
        assert_eq!(
            CallbackData::parse("book:12:2"),
            Some(CallbackData::SelectSeats { trip_id: 12, seats: 2 })
        );
        assert_eq!(
            CallbackData::parse("add_date:2026-10-15"),
            Some(CallbackData::SelectDate(
                NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
            ))
        );
        assert_eq!(CallbackData::parse("m:add"), Some(CallbackData::Menu(MenuItem::AddTrip)));
        assert_eq!(CallbackData::parse("cancel"), Some(CallbackData::Cancel));
        assert_eq!(
            CallbackData::parse("cancel_booking:5"),
            Some(CallbackData::CancelBooking(5))
        );
    }

    #[test]
    fn test_origin_and_destination_prefixes_are_disjoint() {
        assert_ne!(CallbackData::parse("from:4"), CallbackData::parse("to:4"));
        assert_ne!(CallbackData::parse("from:4"), CallbackData::parse("add_from:4"));
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert_eq!(CallbackData::parse(""), None);
        assert_eq!(CallbackData::parse("from:"), None);
        assert_eq!(CallbackData::parse("from:Termiz"), None);
        assert_eq!(CallbackData::parse("from:999"), None);
        assert_eq!(CallbackData::parse("book:12"), None);
        assert_eq!(CallbackData::parse("book:12:9"), None);
        assert_eq!(CallbackData::parse("confirm:-1"), None);
        assert_eq!(CallbackData::parse("add_time:24"), None);
        assert_eq!(CallbackData::parse("cancel:1"), None);
        assert_eq!(CallbackData::parse("m:admin"), None);
        assert_eq!(CallbackData::parse(&format!("trip:{}", "1".repeat(80))), None);
    }

    #[test]
    fn test_encodings_fit_telegram_limit() {
        let widest = [
            CallbackData::SelectSeats { trip_id: i64::MAX, seats: 4 },
            CallbackData::CancelBooking(i64::MAX),
            CallbackData::DeactivateTrip(i64::MAX),
            CallbackData::SelectDate(NaiveDate::from_ymd_opt(2099, 12, 31).unwrap()),
        ];
        for data in widest {
            let encoded = data.encode();
            assert!(encoded.len() <= MAX_CALLBACK_BYTES, "{} too long", encoded);
            assert_eq!(CallbackData::parse(&encoded), Some(data));
        }
    }
}
