//! Persistence gateway for users, trips and bookings.
//!
//! The bot only talks to [`TaxiRepository`]. [`PgRepository`] is the
//! production backend; [`MemoryRepository`] keeps everything in process and
//! is used when no database is configured and by the flow tests.
//!
//! Both backends keep `occupied_seats` equal to the sum of `seats_booked` over
//! the trip's pending and confirmed bookings: seats are occupied in the same
//! atomic unit that creates a booking and released in the same unit that
//! rejects or cancels it, and only pending bookings ever change status.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use sqlx::postgres::PgPool;
use tracing::Instrument;

use crate::db::{
    self, Booking, BookingOutcome, BookingStatus, BookingTransition, NewBooking, NewTrip, NewUser,
    Trip, User,
};
use crate::errors::{AppError, AppResult};
use crate::observability::db_span;

#[async_trait]
pub trait TaxiRepository: Send + Sync {
    async fn find_user_by_telegram_id(&self, telegram_id: i64) -> AppResult<Option<User>>;

    async fn register_user(&self, new_user: NewUser) -> AppResult<User>;

    async fn driver_chat_id(&self, user_id: i64) -> AppResult<Option<i64>>;

    async fn create_trip(&self, new_trip: NewTrip) -> AppResult<Trip>;

    async fn get_trip(&self, trip_id: i64) -> AppResult<Option<Trip>>;

    async fn trips_for_driver(&self, chat_id: i64) -> AppResult<Vec<Trip>>;

    async fn deactivate_trip(&self, trip_id: i64, chat_id: i64) -> AppResult<bool>;

    /// Trips to `destination` that start at `origin` or pick up there,
    /// without duplicates and at most `limit` of them.
    async fn search_trips(
        &self,
        origin: &str,
        destination: &str,
        from_date: NaiveDate,
        limit: usize,
    ) -> AppResult<Vec<Trip>>;

    async fn create_booking(&self, new_booking: NewBooking) -> AppResult<BookingOutcome>;

    async fn get_booking(&self, booking_id: i64) -> AppResult<Option<Booking>>;

    async fn bookings_for_trip(&self, trip_id: i64) -> AppResult<Vec<Booking>>;

    async fn bookings_for_passenger(&self, chat_id: i64) -> AppResult<Vec<Booking>>;

    async fn transition_booking(
        &self,
        booking_id: i64,
        target: BookingStatus,
    ) -> AppResult<BookingTransition>;

    /// Chat that receives booking notifications for a trip
    async fn notification_chat_for(&self, trip: &Trip) -> AppResult<Option<i64>> {
        if let Some(chat_id) = trip.driver_chat_id {
            return Ok(Some(chat_id));
        }
        match trip.driver_id {
            Some(user_id) => self.driver_chat_id(user_id).await,
            None => Ok(None),
        }
    }
}

/// Concatenate two result sets, dropping trips already seen, keeping order.
pub fn merge_unique(direct: Vec<Trip>, via_pickup: Vec<Trip>, limit: usize) -> Vec<Trip> {
    let mut seen = HashSet::new();
    direct
        .into_iter()
        .chain(via_pickup)
        .filter(|trip| seen.insert(trip.id))
        .take(limit)
        .collect()
}

fn db_error(err: anyhow::Error) -> AppError {
    AppError::Database(format!("{:#}", err))
}

#[derive(Clone)]
pub struct PgRepository {
    pool: Arc<PgPool>,
}

impl PgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaxiRepository for PgRepository {
    async fn find_user_by_telegram_id(&self, telegram_id: i64) -> AppResult<Option<User>> {
        db::get_user_by_telegram_id(&self.pool, telegram_id)
            .await
            .map_err(db_error)
    }

    async fn register_user(&self, new_user: NewUser) -> AppResult<User> {
        db::register_user(&self.pool, &new_user).await.map_err(db_error)
    }

    async fn driver_chat_id(&self, user_id: i64) -> AppResult<Option<i64>> {
        db::get_driver_chat_id(&self.pool, user_id).await.map_err(db_error)
    }

    async fn create_trip(&self, new_trip: NewTrip) -> AppResult<Trip> {
        db::create_trip(&self.pool, &new_trip)
            .instrument(db_span("create_trip", "trips"))
            .await
            .map_err(db_error)
    }

    async fn get_trip(&self, trip_id: i64) -> AppResult<Option<Trip>> {
        db::get_trip(&self.pool, trip_id).await.map_err(db_error)
    }

    async fn trips_for_driver(&self, chat_id: i64) -> AppResult<Vec<Trip>> {
        db::list_trips_for_driver_chat(&self.pool, chat_id)
            .await
            .map_err(db_error)
    }

    async fn deactivate_trip(&self, trip_id: i64, chat_id: i64) -> AppResult<bool> {
        db::deactivate_trip(&self.pool, trip_id, chat_id)
            .await
            .map_err(db_error)
    }

    async fn search_trips(
        &self,
        origin: &str,
        destination: &str,
        from_date: NaiveDate,
        limit: usize,
    ) -> AppResult<Vec<Trip>> {
        let limit_sql = limit as i64;
        let direct = db::find_trips(&self.pool, origin, destination, from_date, false, limit_sql)
            .instrument(db_span("find_trips_direct", "trips"))
            .await
            .map_err(db_error)?;
        let via_pickup = db::find_trips(&self.pool, origin, destination, from_date, true, limit_sql)
            .instrument(db_span("find_trips_via_pickup", "trips"))
            .await
            .map_err(db_error)?;
        Ok(merge_unique(direct, via_pickup, limit))
    }

    async fn create_booking(&self, new_booking: NewBooking) -> AppResult<BookingOutcome> {
        db::create_booking(&self.pool, &new_booking)
            .instrument(db_span("create_booking", "bookings"))
            .await
            .map_err(db_error)
    }

    async fn get_booking(&self, booking_id: i64) -> AppResult<Option<Booking>> {
        db::get_booking(&self.pool, booking_id).await.map_err(db_error)
    }

    async fn bookings_for_trip(&self, trip_id: i64) -> AppResult<Vec<Booking>> {
        db::list_bookings_for_trip(&self.pool, trip_id)
            .await
            .map_err(db_error)
    }

    async fn bookings_for_passenger(&self, chat_id: i64) -> AppResult<Vec<Booking>> {
        db::list_bookings_for_passenger(&self.pool, chat_id)
            .await
            .map_err(db_error)
    }

    async fn transition_booking(
        &self,
        booking_id: i64,
        target: BookingStatus,
    ) -> AppResult<BookingTransition> {
        db::transition_booking(&self.pool, booking_id, target)
            .instrument(db_span("transition_booking", "bookings"))
            .await
            .map_err(db_error)
    }
}

#[derive(Debug, Default)]
struct MemoryTables {
    users: Vec<User>,
    links: HashMap<i64, i64>,
    trips: Vec<Trip>,
    bookings: Vec<Booking>,
}

impl MemoryTables {
    fn owns(&self, trip: &Trip, chat_id: i64) -> bool {
        trip.driver_chat_id == Some(chat_id)
            || trip
                .driver_id
                .is_some_and(|user_id| self.links.get(&user_id) == Some(&chat_id))
    }

    fn trip_mut(&mut self, trip_id: i64) -> Option<&mut Trip> {
        self.trips.iter_mut().find(|trip| trip.id == trip_id)
    }
}

/// In-process backend; one lock guards all tables so every operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: Mutex<MemoryTables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a trip as-is, keeping the caller's occupancy and flags
    pub fn insert_trip(&self, mut trip: Trip) -> Trip {
        let mut tables = self.tables.lock();
        trip.id = tables.trips.len() as i64 + 1;
        tables.trips.push(trip.clone());
        trip
    }

    pub fn all_bookings(&self) -> Vec<Booking> {
        self.tables.lock().bookings.clone()
    }

    pub fn all_trips(&self) -> Vec<Trip> {
        self.tables.lock().trips.clone()
    }
}

#[async_trait]
impl TaxiRepository for MemoryRepository {
    async fn find_user_by_telegram_id(&self, telegram_id: i64) -> AppResult<Option<User>> {
        let tables = self.tables.lock();
        Ok(tables
            .users
            .iter()
            .find(|user| user.telegram_id == telegram_id)
            .cloned())
    }

    async fn register_user(&self, new_user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.lock();
        let user = match tables
            .users
            .iter()
            .find(|user| user.telegram_id == new_user.telegram_id)
        {
            Some(existing) => existing.clone(),
            None => {
                let user = User {
                    id: tables.users.len() as i64 + 1,
                    telegram_id: new_user.telegram_id,
                    full_name: new_user.full_name,
                    phone: new_user.phone,
                    created_at: Utc::now(),
                };
                tables.users.push(user.clone());
                user
            }
        };
        tables.links.insert(user.id, new_user.chat_id);
        Ok(user)
    }

    async fn driver_chat_id(&self, user_id: i64) -> AppResult<Option<i64>> {
        Ok(self.tables.lock().links.get(&user_id).copied())
    }

    async fn create_trip(&self, new_trip: NewTrip) -> AppResult<Trip> {
        let trip = Trip {
            id: 0,
            driver_id: new_trip.driver_id,
            driver_chat_id: new_trip.driver_chat_id,
            from_district: new_trip.from_district,
            to_district: new_trip.to_district,
            pickup_districts: new_trip.pickup_districts,
            departure_date: new_trip.departure_date,
            departure_time: new_trip.departure_time,
            total_seats: new_trip.total_seats,
            occupied_seats: 0,
            price_per_seat: new_trip.price_per_seat,
            car_model: new_trip.car_model,
            car_color: new_trip.car_color,
            is_active: true,
            created_at: Utc::now(),
        };
        Ok(self.insert_trip(trip))
    }

    async fn get_trip(&self, trip_id: i64) -> AppResult<Option<Trip>> {
        let tables = self.tables.lock();
        Ok(tables.trips.iter().find(|trip| trip.id == trip_id).cloned())
    }

    async fn trips_for_driver(&self, chat_id: i64) -> AppResult<Vec<Trip>> {
        let tables = self.tables.lock();
        let mut trips: Vec<Trip> = tables
            .trips
            .iter()
            .filter(|trip| trip.is_active && tables.owns(trip, chat_id))
            .cloned()
            .collect();
        trips.sort_by_key(|trip| (trip.departure_date, trip.departure_time));
        Ok(trips)
    }

    async fn deactivate_trip(&self, trip_id: i64, chat_id: i64) -> AppResult<bool> {
        let mut tables = self.tables.lock();
        let owned = tables
            .trips
            .iter()
            .find(|trip| trip.id == trip_id)
            .is_some_and(|trip| trip.is_active && tables.owns(trip, chat_id));
        if !owned {
            return Ok(false);
        }
        if let Some(trip) = tables.trip_mut(trip_id) {
            trip.is_active = false;
        }
        Ok(true)
    }

    async fn search_trips(
        &self,
        origin: &str,
        destination: &str,
        from_date: NaiveDate,
        limit: usize,
    ) -> AppResult<Vec<Trip>> {
        let tables = self.tables.lock();
        let candidates = tables.trips.iter().filter(|trip| {
            trip.is_active
                && trip.to_district == destination
                && trip.departure_date >= from_date
                && trip.available_seats() > 0
        });
        let direct: Vec<Trip> = candidates
            .clone()
            .filter(|trip| trip.from_district == origin)
            .take(limit)
            .cloned()
            .collect();
        let via_pickup: Vec<Trip> = candidates
            .filter(|trip| trip.pickup_districts.iter().any(|p| p == origin))
            .take(limit)
            .cloned()
            .collect();
        Ok(merge_unique(direct, via_pickup, limit))
    }

    async fn create_booking(&self, new_booking: NewBooking) -> AppResult<BookingOutcome> {
        let mut tables = self.tables.lock();
        let booking_id = tables.bookings.len() as i64 + 1;

        let Some(trip) = tables.trip_mut(new_booking.trip_id) else {
            return Ok(BookingOutcome::TripUnavailable);
        };
        if !trip.is_active {
            return Ok(BookingOutcome::TripUnavailable);
        }
        let available = trip.available_seats();
        if new_booking.seats_booked > available {
            return Ok(BookingOutcome::InsufficientSeats { available });
        }
        trip.occupied_seats += new_booking.seats_booked;
        let trip = trip.clone();

        let now = Utc::now();
        let booking = Booking {
            id: booking_id,
            trip_id: new_booking.trip_id,
            passenger_name: new_booking.passenger_name,
            passenger_phone: new_booking.passenger_phone,
            passenger_chat_id: new_booking.passenger_chat_id,
            seats_booked: new_booking.seats_booked,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.bookings.push(booking.clone());
        Ok(BookingOutcome::Created { booking, trip })
    }

    async fn get_booking(&self, booking_id: i64) -> AppResult<Option<Booking>> {
        let tables = self.tables.lock();
        Ok(tables.bookings.iter().find(|b| b.id == booking_id).cloned())
    }

    async fn bookings_for_trip(&self, trip_id: i64) -> AppResult<Vec<Booking>> {
        let tables = self.tables.lock();
        Ok(tables
            .bookings
            .iter()
            .filter(|b| b.trip_id == trip_id)
            .cloned()
            .collect())
    }

    async fn bookings_for_passenger(&self, chat_id: i64) -> AppResult<Vec<Booking>> {
        let tables = self.tables.lock();
        Ok(tables
            .bookings
            .iter()
            .rev()
            .filter(|b| b.passenger_chat_id == Some(chat_id))
            .take(20)
            .cloned()
            .collect())
    }

    async fn transition_booking(
        &self,
        booking_id: i64,
        target: BookingStatus,
    ) -> AppResult<BookingTransition> {
        let mut tables = self.tables.lock();

        let Some(index) = tables.bookings.iter().position(|b| b.id == booking_id) else {
            return Ok(BookingTransition::NotFound);
        };
        let current = tables.bookings[index].clone();
        if current.status.is_final() {
            return Ok(BookingTransition::AlreadyFinal(current.status));
        }

        // Nothing is written until both rows are known to exist
        let Some(trip) = tables.trip_mut(current.trip_id) else {
            return Err(AppError::Internal(format!(
                "booking {} references missing trip {}",
                current.id, current.trip_id
            )));
        };
        if !target.holds_seats() {
            trip.occupied_seats -= current.seats_booked;
        }
        let trip = trip.clone();

        let booking = &mut tables.bookings[index];
        booking.status = target;
        booking.updated_at = Utc::now();
        let booking = booking.clone();

        Ok(BookingTransition::Applied { booking, trip })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn trip(id: i64) -> Trip {
        Trip {
            id,
            driver_id: None,
            driver_chat_id: None,
            from_district: "Termiz".to_string(),
            to_district: "Denov".to_string(),
            pickup_districts: Vec::new(),
            departure_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            departure_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            total_seats: 4,
            occupied_seats: 0,
            price_per_seat: 30_000,
            car_model: "Cobalt".to_string(),
            car_color: "White".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_unique_drops_overlap_and_keeps_order() {
        let merged = merge_unique(vec![trip(1), trip(2)], vec![trip(2), trip(3)], 10);
        let ids: Vec<i64> = merged.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_merge_unique_respects_limit() {
        let direct = (1..=8).map(trip).collect();
        let via = (9..=14).map(trip).collect();
        assert_eq!(merge_unique(direct, via, 10).len(), 10);
    }

    #[tokio::test]
    async fn test_transition_with_missing_trip_leaves_booking_untouched() {
        let repo = MemoryRepository::new();
        let now = Utc::now();
        repo.tables.lock().bookings.push(Booking {
            id: 1,
            trip_id: 99,
            passenger_name: "Ali".to_string(),
            passenger_phone: "+998901234567".to_string(),
            passenger_chat_id: Some(2002),
            seats_booked: 1,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        });

        let result = repo.transition_booking(1, BookingStatus::Rejected).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        let booking = repo.get_booking(1).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }
}
