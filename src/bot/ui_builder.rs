//! UI Builder module for creating keyboards and formatting messages
//!
//! Everything here is pure: domain values in, [`Screen`]s out. The transport
//! turns them into Telegram markup.

use chrono::{Duration, NaiveDate};

use crate::bot::callbacks::callback_data::{CallbackData, MenuItem};
use crate::db::{Booking, BookingStatus, Trip};
use crate::dialogue::{Itinerary, Route, Schedule};
use crate::locations::{self, Location, LocationId};

pub const VEHICLE_MODELS: [&str; 8] = [
    "Cobalt", "Nexia", "Lacetti", "Gentra", "Malibu", "Spark", "Damas", "Captiva",
];

pub const VEHICLE_COLORS: [&str; 6] = ["White", "Black", "Gray", "Silver", "Blue", "Red"];

/// Departure hours offered to drivers
pub const FIRST_HOUR: u32 = 6;
pub const LAST_HOUR: u32 = 20;

/// Days offered for departure, today included
pub const DATE_WINDOW_DAYS: i64 = 7;

/// Most seats offered by one button row, both for trips and bookings
pub const MAX_SEAT_BUTTONS: i32 = 4;

pub const GENERIC_FAILURE: &str = "⚠️ Something went wrong, please try again.";
pub const STALE_BUTTON: &str = "This button is no longer active.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: CallbackData,
}

impl Button {
    pub fn new(label: impl Into<String>, data: CallbackData) -> Self {
        Self {
            label: label.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    pub fn contains(&self, data: &CallbackData) -> bool {
        self.buttons().any(|b| &b.data == data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Inline(Keyboard),
    /// Reply keyboard with a single share-my-contact button
    RequestContact { label: String },
    RemoveKeyboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub markup: Option<Markup>,
}

impl Screen {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            markup: Some(Markup::Inline(keyboard)),
        }
    }

    /// Plain message that also hides a reply keyboard
    pub fn removing_keyboard(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: Some(Markup::RemoveKeyboard),
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match &self.markup {
            Some(Markup::Inline(keyboard)) => Some(keyboard),
            _ => None,
        }
    }
}

fn cancel_row() -> Vec<Button> {
    vec![Button::new("✖️ Cancel", CallbackData::Cancel)]
}

fn menu_row() -> Vec<Button> {
    vec![Button::new("🏠 Main menu", CallbackData::Cancel)]
}

fn location_name(id: LocationId) -> &'static str {
    locations::get(id).map(|loc| loc.name).unwrap_or("?")
}

/// `80000` → `80 000`
pub fn format_price(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

pub fn format_route(from: &str, to: &str, pickups: &[String]) -> String {
    if pickups.is_empty() {
        format!("{} → {}", from, to)
    } else {
        format!("{} → {} (via {})", from, to, pickups.join(", "))
    }
}

fn trip_route(trip: &Trip) -> String {
    format_route(&trip.from_district, &trip.to_district, &trip.pickup_districts)
}

/// "Today", "Tomorrow" or `Mon 20.10`
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    let days = (date - today).num_days();
    match days {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %d.%m").to_string(),
    }
}

pub fn date_window(today: NaiveDate) -> Vec<NaiveDate> {
    (0..DATE_WINDOW_DAYS)
        .map(|offset| today + Duration::days(offset))
        .collect()
}

pub fn is_in_date_window(date: NaiveDate, today: NaiveDate) -> bool {
    (0..DATE_WINDOW_DAYS).contains(&(date - today).num_days())
}

fn location_rows(
    candidates: &[&Location],
    to_data: impl Fn(LocationId) -> CallbackData,
) -> Vec<Vec<Button>> {
    candidates
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|loc| Button::new(format!("📍 {}", loc.name), to_data(loc.id)))
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Registration and menus

pub fn main_menu(name: Option<&str>) -> Screen {
    let greeting = match name {
        Some(name) => format!("👋 Hello, {}!\n\nWhat would you like to do?", name),
        None => "What would you like to do?".to_string(),
    };
    let keyboard = Keyboard::new()
        .row(vec![Button::new("🔍 Find a ride", CallbackData::Menu(MenuItem::Search))])
        .row(vec![Button::new("🚗 Offer a trip", CallbackData::Menu(MenuItem::AddTrip))])
        .row(vec![
            Button::new("📋 My trips", CallbackData::Menu(MenuItem::MyTrips)),
            Button::new("🎫 My bookings", CallbackData::Menu(MenuItem::MyBookings)),
        ])
        .row(vec![Button::new("❓ Help", CallbackData::Menu(MenuItem::Help))]);
    Screen::with_keyboard(greeting, keyboard)
}

pub fn request_contact() -> Screen {
    Screen {
        text: "👋 Welcome to the shared taxi bot!\n\nTo get started, please share your phone number using the button below.".to_string(),
        markup: Some(Markup::RequestContact {
            label: "📱 Share my phone number".to_string(),
        }),
    }
}

pub fn contact_not_own() -> Screen {
    Screen {
        text: "⚠️ Please share your own contact using the button below.".to_string(),
        markup: Some(Markup::RequestContact {
            label: "📱 Share my phone number".to_string(),
        }),
    }
}

pub fn registration_complete(name: &str) -> Screen {
    Screen {
        text: format!("✅ Thank you, {}! You are registered.", name),
        markup: Some(Markup::RemoveKeyboard),
    }
}

pub fn not_registered() -> Screen {
    Screen::text("🔒 Only registered drivers can do this. Send /start to register first.")
}

pub fn help() -> Screen {
    Screen::with_keyboard(
        "ℹ️ Commands\n\n\
         /start - register or open the main menu\n\
         /search - find a ride\n\
         /add - offer a trip as a driver\n\
         /mytrips - trips you have published\n\
         /mybookings - seats you have booked\n\
         /cancel - abandon the current step\n\
         /help - this message",
        Keyboard::new().row(menu_row()),
    )
}

pub fn free_text_hint() -> Screen {
    Screen::text("🤔 I didn't understand that. Use /search to find a ride, /add to offer one, or /help for all commands.")
}

pub fn unknown_command() -> Screen {
    Screen::text("❓ Unknown command. Send /help to see what I can do.")
}

pub fn use_buttons_hint() -> Screen {
    Screen::text("👆 Please use the buttons above, or /cancel to start over.")
}

pub fn cancelled(had_state: bool) -> Screen {
    let mut screen = main_menu(None);
    if had_state {
        screen.text = format!("✖️ Cancelled.\n\n{}", screen.text);
    }
    screen
}

pub fn nothing_to_cancel() -> Screen {
    Screen::text("There is nothing to cancel.")
}

// ---------------------------------------------------------------------------
// Route selection, shared by both flows

pub fn choose_origin(to_data: impl Fn(LocationId) -> CallbackData) -> Screen {
    let candidates: Vec<&Location> = locations::all().iter().collect();
    let mut keyboard = Keyboard {
        rows: location_rows(&candidates, to_data),
    };
    keyboard = keyboard.row(cancel_row());
    Screen::with_keyboard("📍 Where are you leaving from?", keyboard)
}

pub fn choose_destination(
    origin: LocationId,
    to_data: impl Fn(LocationId) -> CallbackData,
) -> Screen {
    let candidates = locations::destination_candidates(origin);
    let keyboard = Keyboard {
        rows: location_rows(&candidates, to_data),
    }
    .row(cancel_row());
    Screen::with_keyboard(
        format!("From: {}\n\n🏁 Where are you going?", location_name(origin)),
        keyboard,
    )
}

// ---------------------------------------------------------------------------
// Search flow

pub fn format_trip_line(trip: &Trip) -> String {
    format!(
        "🕐 {} {} · {} · 💺 {} · 💰 {}",
        trip.departure_date.format("%d.%m"),
        trip.departure_time.format("%H:%M"),
        trip_route(trip),
        trip.available_seats(),
        format_price(trip.price_per_seat)
    )
}

pub fn search_results(origin: LocationId, destination: LocationId, trips: &[Trip]) -> Screen {
    let header = format!("🔍 {} → {}", location_name(origin), location_name(destination));

    if trips.is_empty() {
        let keyboard = Keyboard::new()
            .row(vec![Button::new("🔄 Search again", CallbackData::Menu(MenuItem::Search))])
            .row(menu_row());
        return Screen::with_keyboard(
            format!("{}\n\n😔 No upcoming trips found for this route.", header),
            keyboard,
        );
    }

    let mut keyboard = Keyboard::new();
    for trip in trips {
        keyboard = keyboard.row(vec![Button::new(
            format!(
                "{} {} · {} so'm · {} seats",
                trip.departure_date.format("%d.%m"),
                trip.departure_time.format("%H:%M"),
                format_price(trip.price_per_seat),
                trip.available_seats()
            ),
            CallbackData::SelectTrip(trip.id),
        )]);
    }
    keyboard = keyboard.row(cancel_row());

    let lines: Vec<String> = trips.iter().map(format_trip_line).collect();
    Screen::with_keyboard(
        format!(
            "{}\n\nFound {} trip(s):\n{}\n\nChoose a trip:",
            header,
            trips.len(),
            lines.join("\n")
        ),
        keyboard,
    )
}

pub fn trip_details(trip: &Trip) -> String {
    format!(
        "🚕 Trip #{}\n\n\
         🛣 {}\n\
         📅 {} at {}\n\
         🚗 {} ({})\n\
         💺 {} of {} seats free\n\
         💰 {} so'm per seat",
        trip.id,
        trip_route(trip),
        trip.departure_date.format("%d.%m.%Y"),
        trip.departure_time.format("%H:%M"),
        trip.car_model,
        trip.car_color,
        trip.available_seats(),
        trip.total_seats,
        format_price(trip.price_per_seat)
    )
}

/// Trip card with one button per bookable seat count
pub fn trip_detail(trip: &Trip, notice: Option<&str>) -> Screen {
    let seat_buttons: Vec<Button> = (1..=trip.available_seats().min(MAX_SEAT_BUTTONS))
        .map(|n| {
            Button::new(
                format!("💺 {}", n),
                CallbackData::SelectSeats {
                    trip_id: trip.id,
                    seats: n,
                },
            )
        })
        .collect();

    let keyboard = Keyboard::new()
        .row(seat_buttons)
        .row(vec![
            Button::new("⬅️ Back to results", CallbackData::BackToResults),
            Button::new("✖️ Cancel", CallbackData::Cancel),
        ]);

    let mut text = trip_details(trip);
    if trip.available_seats() > 0 {
        text.push_str("\n\nHow many seats do you need?");
    }
    if let Some(notice) = notice {
        text = format!("{}\n\n{}", notice, text);
    }
    Screen::with_keyboard(text, keyboard)
}

pub const TRIP_FULL: &str = "😔 This trip is full.";

pub fn only_seats_left(available: i32) -> String {
    if available == 0 {
        "😔 Sorry, the last seats were just taken.".to_string()
    } else {
        format!("⚠️ Only {} seat(s) left. Please choose again.", available)
    }
}

pub const TRIP_UNAVAILABLE: &str = "❌ This trip is no longer available.";

pub fn trip_not_found() -> Screen {
    Screen::with_keyboard(
        TRIP_UNAVAILABLE,
        Keyboard::new()
            .row(vec![Button::new("🔄 Search again", CallbackData::Menu(MenuItem::Search))])
            .row(menu_row()),
    )
}

pub fn ask_passenger_name(seats: i32) -> Screen {
    Screen::with_keyboard(
        format!("💺 Seats: {}\n\n👤 Please type the passenger's name:", seats),
        Keyboard::new().row(cancel_row()),
    )
}

pub fn invalid_name(reason: &str) -> Screen {
    let text = match reason {
        "name-too-long" => "⚠️ The name is too long. Please type at most 64 characters.",
        _ => "⚠️ The name cannot be empty. Please type the passenger's name:",
    };
    Screen::text(text)
}

pub fn ask_passenger_phone(name: &str) -> Screen {
    Screen {
        text: format!(
            "👤 {}\n\n📱 Please type a phone number (e.g. +998901234567) or share your contact:",
            name
        ),
        markup: Some(Markup::RequestContact {
            label: "📱 Share my phone number".to_string(),
        }),
    }
}

pub fn invalid_phone() -> Screen {
    Screen::text("⚠️ That doesn't look like a phone number. Use 9 to 15 digits, optionally starting with +.")
}

pub fn booking_created(booking: &Booking, trip: &Trip) -> Screen {
    Screen {
        text: format!(
            "✅ Booking #{} created!\n\n\
             🛣 {}\n\
             📅 {} at {}\n\
             💺 {} seat(s)\n\
             💰 {} so'm total\n\
             Status: {}\n\n\
             The driver will confirm shortly.",
            booking.id,
            trip_route(trip),
            trip.departure_date.format("%d.%m.%Y"),
            trip.departure_time.format("%H:%M"),
            booking.seats_booked,
            format_price(trip.price_per_seat * booking.seats_booked as i64),
            status_label(booking.status)
        ),
        markup: Some(Markup::RemoveKeyboard),
    }
}

fn booking_summary(booking: &Booking, trip: &Trip) -> String {
    format!(
        "🎫 Booking #{} for trip #{}\n\n\
         🛣 {}\n\
         📅 {} at {}\n\
         👤 {}\n\
         📱 {}\n\
         💺 {} seat(s)",
        booking.id,
        trip.id,
        trip_route(trip),
        trip.departure_date.format("%d.%m.%Y"),
        trip.departure_time.format("%H:%M"),
        booking.passenger_name,
        booking.passenger_phone,
        booking.seats_booked
    )
}

/// Sent to the driver; carries the accept/reject buttons
pub fn driver_notification(booking: &Booking, trip: &Trip) -> Screen {
    let keyboard = Keyboard::new().row(vec![
        Button::new("✅ Confirm", CallbackData::ConfirmBooking(booking.id)),
        Button::new("❌ Reject", CallbackData::RejectBooking(booking.id)),
    ]);
    Screen::with_keyboard(
        format!(
            "🔔 New booking request!\n\n{}\n\n💺 {} of {} seats now taken",
            booking_summary(booking, trip),
            trip.occupied_seats,
            trip.total_seats
        ),
        keyboard,
    )
}

pub fn status_label(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "⏳ pending",
        BookingStatus::Confirmed => "✅ confirmed",
        BookingStatus::Rejected => "❌ rejected",
        BookingStatus::Cancelled => "🚫 cancelled",
    }
}

/// Replaces the driver notification once the booking is decided
pub fn driver_decision(booking: &Booking, trip: &Trip) -> Screen {
    Screen::text(format!(
        "{}\n\nStatus: {}\n💺 {} of {} seats taken",
        booking_summary(booking, trip),
        status_label(booking.status),
        trip.occupied_seats,
        trip.total_seats
    ))
}

pub fn passenger_status_update(booking: &Booking, trip: &Trip) -> Screen {
    let headline = match booking.status {
        BookingStatus::Confirmed => "✅ Your booking was confirmed by the driver!",
        BookingStatus::Rejected => "❌ Unfortunately the driver rejected your booking.",
        _ => "ℹ️ Your booking was updated.",
    };
    Screen::text(format!(
        "{}\n\n🎫 Booking #{}\n🛣 {}\n📅 {} at {}\n🚗 {} ({})",
        headline,
        booking.id,
        trip_route(trip),
        trip.departure_date.format("%d.%m.%Y"),
        trip.departure_time.format("%H:%M"),
        trip.car_model,
        trip.car_color
    ))
}

pub fn driver_cancellation_notice(booking: &Booking, trip: &Trip) -> Screen {
    Screen::text(format!(
        "🚫 A passenger cancelled their booking.\n\n{}\n\n💺 {} of {} seats now taken",
        booking_summary(booking, trip),
        trip.occupied_seats,
        trip.total_seats
    ))
}

pub fn booking_cancelled(booking: &Booking) -> Screen {
    Screen::with_keyboard(
        format!("🚫 Booking #{} cancelled.", booking.id),
        Keyboard::new()
            .row(vec![Button::new("🎫 My bookings", CallbackData::Menu(MenuItem::MyBookings))])
            .row(menu_row()),
    )
}

pub fn already_processed(status: BookingStatus) -> String {
    format!("This booking was already processed ({}).", status_label(status))
}

pub const BOOKING_NOT_FOUND: &str = "Booking not found.";
pub const NOT_YOUR_TRIP: &str = "Only the driver of this trip can do that.";
pub const NOT_YOUR_BOOKING: &str = "Only the passenger who booked can do that.";

// ---------------------------------------------------------------------------
// Add-trip flow

pub fn choose_pickups(route: Route, selected: &std::collections::BTreeSet<LocationId>) -> Screen {
    let candidates = locations::pickup_candidates(route.origin, route.destination);
    let mut keyboard = Keyboard::new();
    for pair in candidates.chunks(2) {
        keyboard = keyboard.row(
            pair.iter()
                .map(|loc| {
                    let mark = if selected.contains(&loc.id) { "✅" } else { "▫️" };
                    Button::new(
                        format!("{} {}", mark, loc.name),
                        CallbackData::TogglePickup(loc.id),
                    )
                })
                .collect(),
        );
    }
    keyboard = keyboard
        .row(vec![Button::new("➡️ Done", CallbackData::PickupsDone)])
        .row(cancel_row());

    let chosen: Vec<&str> = selected.iter().map(|id| location_name(*id)).collect();
    let chosen = if chosen.is_empty() {
        "none".to_string()
    } else {
        chosen.join(", ")
    };
    Screen::with_keyboard(
        format!(
            "🛣 {} → {}\n\n\
             Do you also pick up passengers elsewhere? Tap to toggle, then Done.\n\
             Selected: {}",
            location_name(route.origin),
            location_name(route.destination),
            chosen
        ),
        keyboard,
    )
}

fn itinerary_text(itinerary: &Itinerary) -> String {
    let pickups: Vec<String> = itinerary
        .pickups
        .iter()
        .map(|id| location_name(*id).to_string())
        .collect();
    format_route(
        location_name(itinerary.route.origin),
        location_name(itinerary.route.destination),
        &pickups,
    )
}

pub fn choose_date(itinerary: &Itinerary, today: NaiveDate) -> Screen {
    let buttons: Vec<Button> = date_window(today)
        .into_iter()
        .map(|date| Button::new(date_label(date, today), CallbackData::SelectDate(date)))
        .collect();
    let mut keyboard = Keyboard::new();
    for chunk in buttons.chunks(2) {
        keyboard = keyboard.row(chunk.to_vec());
    }
    keyboard = keyboard.row(cancel_row());
    Screen::with_keyboard(
        format!("🛣 {}\n\n📅 When do you leave?", itinerary_text(itinerary)),
        keyboard,
    )
}

pub fn choose_time(itinerary: &Itinerary, date: NaiveDate, today: NaiveDate) -> Screen {
    let buttons: Vec<Button> = (FIRST_HOUR..=LAST_HOUR)
        .map(|hour| Button::new(format!("{:02}:00", hour), CallbackData::SelectHour(hour)))
        .collect();
    let mut keyboard = Keyboard::new();
    for chunk in buttons.chunks(4) {
        keyboard = keyboard.row(chunk.to_vec());
    }
    keyboard = keyboard.row(cancel_row());
    Screen::with_keyboard(
        format!(
            "🛣 {}\n📅 {}\n\n🕐 What time do you leave?",
            itinerary_text(itinerary),
            date_label(date, today)
        ),
        keyboard,
    )
}

fn schedule_text(schedule: &Schedule) -> String {
    format!(
        "🛣 {}\n📅 {} at {:02}:00",
        itinerary_text(&schedule.itinerary),
        schedule.date.format("%d.%m.%Y"),
        schedule.hour
    )
}

pub fn ask_price(schedule: &Schedule) -> Screen {
    Screen::with_keyboard(
        format!(
            "{}\n\n💰 Type the price per seat in so'm (1 000 to 1 000 000):",
            schedule_text(schedule)
        ),
        Keyboard::new().row(cancel_row()),
    )
}

pub fn invalid_price(reason: &str) -> Screen {
    let text = match reason {
        "price-out-of-range" => "⚠️ The price must be between 1 000 and 1 000 000 so'm.",
        _ => "⚠️ Please type the price as a number, e.g. 80000.",
    };
    Screen::text(text)
}

pub fn choose_model(schedule: &Schedule, price: i64) -> Screen {
    let buttons: Vec<Button> = VEHICLE_MODELS
        .iter()
        .enumerate()
        .map(|(i, model)| Button::new(*model, CallbackData::SelectModel(i)))
        .collect();
    let mut keyboard = Keyboard::new();
    for chunk in buttons.chunks(2) {
        keyboard = keyboard.row(chunk.to_vec());
    }
    keyboard = keyboard.row(cancel_row());
    Screen::with_keyboard(
        format!(
            "{}\n💰 {} so'm\n\n🚗 Which car?",
            schedule_text(schedule),
            format_price(price)
        ),
        keyboard,
    )
}

pub fn choose_color(model: usize) -> Screen {
    let buttons: Vec<Button> = VEHICLE_COLORS
        .iter()
        .enumerate()
        .map(|(i, color)| Button::new(*color, CallbackData::SelectColor(i)))
        .collect();
    let mut keyboard = Keyboard::new();
    for chunk in buttons.chunks(3) {
        keyboard = keyboard.row(chunk.to_vec());
    }
    keyboard = keyboard.row(cancel_row());
    Screen::with_keyboard(
        format!(
            "🚗 {}\n\n🎨 What color is it?",
            VEHICLE_MODELS.get(model).copied().unwrap_or("?")
        ),
        keyboard,
    )
}

pub fn choose_total_seats(model: usize, color: usize) -> Screen {
    let buttons: Vec<Button> = (1..=MAX_SEAT_BUTTONS)
        .map(|n| Button::new(format!("💺 {}", n), CallbackData::SelectTotalSeats(n)))
        .collect();
    Screen::with_keyboard(
        format!(
            "🚗 {} ({})\n\n💺 How many passenger seats are available?",
            VEHICLE_MODELS.get(model).copied().unwrap_or("?"),
            VEHICLE_COLORS.get(color).copied().unwrap_or("?")
        ),
        Keyboard::new().row(buttons).row(cancel_row()),
    )
}

pub fn trip_created(trip: &Trip) -> Screen {
    Screen::with_keyboard(
        format!("✅ Trip published!\n\n{}", trip_details(trip)),
        Keyboard::new()
            .row(vec![Button::new("📋 My trips", CallbackData::Menu(MenuItem::MyTrips))])
            .row(menu_row()),
    )
}

// ---------------------------------------------------------------------------
// Listings

pub fn my_trips(trips: &[(Trip, Vec<Booking>)]) -> Screen {
    if trips.is_empty() {
        return Screen::with_keyboard(
            "📋 You have no active trips.",
            Keyboard::new()
                .row(vec![Button::new("🚗 Offer a trip", CallbackData::Menu(MenuItem::AddTrip))])
                .row(menu_row()),
        );
    }

    let mut text = String::from("📋 Your active trips\n");
    let mut keyboard = Keyboard::new();
    for (trip, bookings) in trips {
        let pending = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Pending)
            .count();
        let confirmed = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .count();
        text.push_str(&format!(
            "\n#{} {}\n   💺 {}/{} taken · ⏳ {} pending · ✅ {} confirmed\n",
            trip.id,
            format_trip_line(trip),
            trip.occupied_seats,
            trip.total_seats,
            pending,
            confirmed
        ));
        keyboard = keyboard.row(vec![Button::new(
            format!("🚫 Deactivate #{}", trip.id),
            CallbackData::DeactivateTrip(trip.id),
        )]);
    }
    Screen::with_keyboard(text, keyboard.row(menu_row()))
}

pub fn trip_deactivated(trip_id: i64) -> String {
    format!("Trip #{} deactivated.", trip_id)
}

pub const TRIP_NOT_OWNED: &str = "Trip not found or not yours.";

pub fn my_bookings(bookings: &[(Booking, Option<Trip>)]) -> Screen {
    if bookings.is_empty() {
        return Screen::with_keyboard(
            "🎫 You have no bookings yet.",
            Keyboard::new()
                .row(vec![Button::new("🔍 Find a ride", CallbackData::Menu(MenuItem::Search))])
                .row(menu_row()),
        );
    }

    let mut text = String::from("🎫 Your bookings\n");
    let mut keyboard = Keyboard::new();
    for (booking, trip) in bookings {
        let route = match trip {
            Some(trip) => format!(
                "{} · {} {}",
                trip_route(trip),
                trip.departure_date.format("%d.%m"),
                trip.departure_time.format("%H:%M")
            ),
            None => format!("trip #{}", booking.trip_id),
        };
        text.push_str(&format!(
            "\n#{} {} · 💺 {} · {}\n",
            booking.id,
            route,
            booking.seats_booked,
            status_label(booking.status)
        ));
        if booking.status == BookingStatus::Pending {
            keyboard = keyboard.row(vec![Button::new(
                format!("❌ Cancel booking #{}", booking.id),
                CallbackData::CancelBooking(booking.id),
            )]);
        }
    }
    Screen::with_keyboard(text, keyboard.row(menu_row()))
}
