//! # Test Helper Library
//!
//! Shared setup for the flow tests: a router over in-memory backends, update
//! builders and trip fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use taxi_bot::bot::callbacks::callback_data::CallbackData;
use taxi_bot::bot::ui_builder::Keyboard;
use taxi_bot::bot::{Command, Envelope, FlowRouter, Inbound, Outbound, Sender};
use taxi_bot::config::ConversationConfig;
use taxi_bot::conversation_store::{ConversationStore, MemoryConversationStore};
use taxi_bot::db::{
    Booking, BookingOutcome, BookingStatus, BookingTransition, NewBooking, NewTrip, NewUser, Trip,
    User,
};
use taxi_bot::dialogue::Conversation;
use taxi_bot::errors::{AppError, AppResult};
use taxi_bot::repository::{MemoryRepository, TaxiRepository};

pub const DRIVER_CHAT: i64 = 1001;
pub const PASSENGER_CHAT: i64 = 2002;
pub const OTHER_CHAT: i64 = 3003;

/// Message id of the message carrying the pressed buttons
pub const KEYBOARD_MESSAGE_ID: i32 = 77;

pub struct Harness {
    pub router: FlowRouter,
    pub repo: Arc<MemoryRepository>,
    pub store: Arc<MemoryConversationStore>,
    pub faults: Arc<Faults>,
}

impl Harness {
    pub fn new() -> Self {
        let config = ConversationConfig::default();
        let repo = Arc::new(MemoryRepository::new());
        let store = Arc::new(MemoryConversationStore::new(config.ttl()));
        let faults = Arc::new(Faults::default());
        let router = FlowRouter::new(
            Arc::new(FaultyRepository {
                inner: repo.clone(),
                faults: faults.clone(),
            }),
            Arc::new(FaultyStore {
                inner: store.clone(),
                faults: faults.clone(),
            }),
            config,
        );
        Self {
            router,
            repo,
            store,
            faults,
        }
    }

    pub async fn send(&self, envelope: Envelope) -> Vec<Outbound> {
        self.router.handle(envelope).await
    }

    pub async fn state(&self, chat_id: i64) -> Option<Conversation> {
        self.store.get(chat_id).await.expect("memory store never fails")
    }

    pub fn today(&self) -> NaiveDate {
        self.router.today()
    }

    /// Register the sender of `chat_id` (private chat: user id == chat id)
    pub async fn register(&self, chat_id: i64, name: &str) {
        self.repo
            .register_user(NewUser {
                telegram_id: chat_id,
                chat_id,
                full_name: name.to_string(),
                phone: "+998901112233".to_string(),
            })
            .await
            .expect("memory repository never fails");
    }

    pub fn add_trip(&self, trip: Trip) -> Trip {
        self.repo.insert_trip(trip)
    }
}

pub fn sender(user_id: i64) -> Sender {
    Sender {
        user_id,
        first_name: "Ali".to_string(),
        last_name: None,
        username: None,
    }
}

fn envelope(chat_id: i64, inbound: Inbound) -> Envelope {
    Envelope {
        chat_id,
        sender: Some(sender(chat_id)),
        inbound,
    }
}

pub fn command(chat_id: i64, command: Command) -> Envelope {
    envelope(chat_id, Inbound::Command(command))
}

pub fn text(chat_id: i64, text: &str) -> Envelope {
    envelope(chat_id, Inbound::Text(text.to_string()))
}

/// Slash text that does not parse as one of the bot's commands
pub fn unknown_command_text(chat_id: i64, text: &str) -> Envelope {
    envelope(chat_id, Inbound::UnknownCommand(text.to_string()))
}

pub fn contact(chat_id: i64, phone: &str, user_id: Option<i64>) -> Envelope {
    envelope(
        chat_id,
        Inbound::Contact {
            phone: phone.to_string(),
            user_id,
        },
    )
}

pub fn raw_callback(chat_id: i64, data: &str) -> Envelope {
    envelope(
        chat_id,
        Inbound::Callback {
            callback_id: format!("cb-{}", chat_id),
            data: data.to_string(),
            message_id: Some(KEYBOARD_MESSAGE_ID),
        },
    )
}

pub fn callback(chat_id: i64, data: CallbackData) -> Envelope {
    raw_callback(chat_id, &data.encode())
}

/// Active trip departing `days_ahead` days after `today`
pub fn trip(from: &str, to: &str, pickups: &[&str], today: NaiveDate, days_ahead: i64) -> Trip {
    Trip {
        id: 0,
        driver_id: None,
        driver_chat_id: Some(DRIVER_CHAT),
        from_district: from.to_string(),
        to_district: to.to_string(),
        pickup_districts: pickups.iter().map(|p| p.to_string()).collect(),
        departure_date: today + Duration::days(days_ahead),
        departure_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        total_seats: 4,
        occupied_seats: 0,
        price_per_seat: 50_000,
        car_model: "Cobalt".to_string(),
        car_color: "White".to_string(),
        is_active: true,
        created_at: Utc::now(),
    }
}

/// Answer for the pressed button: (text, shown as alert)
pub fn callback_answer(outbound: &[Outbound]) -> Option<(Option<&str>, bool)> {
    outbound.iter().find_map(|action| match action {
        Outbound::AnswerCallback { text, alert, .. } => Some((text.as_deref(), *alert)),
        _ => None,
    })
}

/// Everything except callback answers
pub fn messages(outbound: &[Outbound]) -> Vec<&Outbound> {
    outbound
        .iter()
        .filter(|action| !matches!(action, Outbound::AnswerCallback { .. }))
        .collect()
}

pub fn messages_to(outbound: &[Outbound], chat_id: i64) -> Vec<&Outbound> {
    messages(outbound)
        .into_iter()
        .filter(|action| action.chat_id() == Some(chat_id))
        .collect()
}

/// Keyboard of the last message that carries one
pub fn last_keyboard(outbound: &[Outbound]) -> Option<&Keyboard> {
    outbound.iter().rev().find_map(|action| action.keyboard())
}

pub fn all_text(outbound: &[Outbound]) -> String {
    outbound
        .iter()
        .filter_map(|action| action.text())
        .collect::<Vec<_>>()
        .join("\n---\n")
}

pub fn trip_buttons(keyboard: &Keyboard) -> Vec<i64> {
    keyboard
        .buttons()
        .filter_map(|button| match button.data {
            CallbackData::SelectTrip(id) => Some(id),
            _ => None,
        })
        .collect()
}

/// Switches that make the router's backends misbehave on purpose
#[derive(Debug, Default)]
pub struct Faults {
    /// `driver_chat_id` fails like an unreachable database
    pub driver_lookup_fails: AtomicBool,
    /// Store writes fail; reads still work
    pub store_writes_fail: AtomicBool,
    /// Repository calls yield to the scheduler before running
    pub yield_first: AtomicBool,
}

impl Faults {
    pub fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    fn on(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }

    async fn maybe_yield(&self) {
        if Self::on(&self.yield_first) {
            tokio::task::yield_now().await;
        }
    }
}

fn database_down<T>() -> AppResult<T> {
    Err(AppError::Database("connection refused".to_string()))
}

/// In-memory repository behind a set of [`Faults`]
pub struct FaultyRepository {
    inner: Arc<MemoryRepository>,
    faults: Arc<Faults>,
}

#[async_trait]
impl TaxiRepository for FaultyRepository {
    async fn find_user_by_telegram_id(&self, telegram_id: i64) -> AppResult<Option<User>> {
        self.faults.maybe_yield().await;
        self.inner.find_user_by_telegram_id(telegram_id).await
    }

    async fn register_user(&self, new_user: NewUser) -> AppResult<User> {
        self.faults.maybe_yield().await;
        self.inner.register_user(new_user).await
    }

    async fn driver_chat_id(&self, user_id: i64) -> AppResult<Option<i64>> {
        self.faults.maybe_yield().await;
        if Faults::on(&self.faults.driver_lookup_fails) {
            return database_down();
        }
        self.inner.driver_chat_id(user_id).await
    }

    async fn create_trip(&self, new_trip: NewTrip) -> AppResult<Trip> {
        self.faults.maybe_yield().await;
        self.inner.create_trip(new_trip).await
    }

    async fn get_trip(&self, trip_id: i64) -> AppResult<Option<Trip>> {
        self.faults.maybe_yield().await;
        self.inner.get_trip(trip_id).await
    }

    async fn trips_for_driver(&self, chat_id: i64) -> AppResult<Vec<Trip>> {
        self.faults.maybe_yield().await;
        self.inner.trips_for_driver(chat_id).await
    }

    async fn deactivate_trip(&self, trip_id: i64, chat_id: i64) -> AppResult<bool> {
        self.faults.maybe_yield().await;
        self.inner.deactivate_trip(trip_id, chat_id).await
    }

    async fn search_trips(
        &self,
        origin: &str,
        destination: &str,
        from_date: NaiveDate,
        limit: usize,
    ) -> AppResult<Vec<Trip>> {
        self.faults.maybe_yield().await;
        self.inner.search_trips(origin, destination, from_date, limit).await
    }

    async fn create_booking(&self, new_booking: NewBooking) -> AppResult<BookingOutcome> {
        self.faults.maybe_yield().await;
        self.inner.create_booking(new_booking).await
    }

    async fn get_booking(&self, booking_id: i64) -> AppResult<Option<Booking>> {
        self.faults.maybe_yield().await;
        self.inner.get_booking(booking_id).await
    }

    async fn bookings_for_trip(&self, trip_id: i64) -> AppResult<Vec<Booking>> {
        self.faults.maybe_yield().await;
        self.inner.bookings_for_trip(trip_id).await
    }

    async fn bookings_for_passenger(&self, chat_id: i64) -> AppResult<Vec<Booking>> {
        self.faults.maybe_yield().await;
        self.inner.bookings_for_passenger(chat_id).await
    }

    async fn transition_booking(
        &self,
        booking_id: i64,
        target: BookingStatus,
    ) -> AppResult<BookingTransition> {
        self.faults.maybe_yield().await;
        self.inner.transition_booking(booking_id, target).await
    }
}

/// In-memory conversation store behind a set of [`Faults`]
pub struct FaultyStore {
    inner: Arc<MemoryConversationStore>,
    faults: Arc<Faults>,
}

#[async_trait]
impl ConversationStore for FaultyStore {
    async fn get(&self, chat_id: i64) -> AppResult<Option<Conversation>> {
        self.inner.get(chat_id).await
    }

    async fn set(&self, chat_id: i64, conversation: Conversation) -> AppResult<()> {
        if Faults::on(&self.faults.store_writes_fail) {
            return database_down();
        }
        self.inner.set(chat_id, conversation).await
    }

    async fn clear(&self, chat_id: i64) -> AppResult<()> {
        if Faults::on(&self.faults.store_writes_fail) {
            return database_down();
        }
        self.inner.clear(chat_id).await
    }
}
