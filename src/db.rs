use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};

/// A registered driver account, keyed by Telegram identity
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub full_name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub telegram_id: i64,
    pub chat_id: i64,
    pub full_name: String,
    pub phone: String,
}

/// Represents a published trip in the database
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub id: i64,
    pub driver_id: Option<i64>,
    pub driver_chat_id: Option<i64>,
    pub from_district: String,
    pub to_district: String,
    pub pickup_districts: Vec<String>,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub total_seats: i32,
    pub occupied_seats: i32,
    pub price_per_seat: i64,
    pub car_model: String,
    pub car_color: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn available_seats(&self) -> i32 {
        (self.total_seats - self.occupied_seats).max(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTrip {
    pub driver_id: Option<i64>,
    pub driver_chat_id: Option<i64>,
    pub from_district: String,
    pub to_district: String,
    pub pickup_districts: Vec<String>,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub total_seats: i32,
    pub price_per_seat: i64,
    pub car_model: String,
    pub car_color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "rejected" => Some(BookingStatus::Rejected),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Final bookings accept no further transitions
    pub fn is_final(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    /// Whether the booking's seats count towards the trip's occupancy
    pub fn holds_seats(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

/// Represents a seat booking in the database
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub trip_id: i64,
    pub passenger_name: String,
    pub passenger_phone: String,
    pub passenger_chat_id: Option<i64>,
    pub seats_booked: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub trip_id: i64,
    pub passenger_name: String,
    pub passenger_phone: String,
    pub passenger_chat_id: Option<i64>,
    pub seats_booked: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingOutcome {
    Created { booking: Booking, trip: Trip },
    InsufficientSeats { available: i32 },
    /// Trip missing or deactivated
    TripUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingTransition {
    Applied { booking: Booking, trip: Trip },
    AlreadyFinal(BookingStatus),
    NotFound,
}

/// Raw conversation row; the payload is JSON owned by `conversation_store`
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRow {
    pub chat_id: i64,
    pub flow: String,
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

const TRIP_COLUMNS: &str = "id, driver_id, driver_chat_id, from_district, to_district, pickup_districts, \
     departure_date, departure_time, total_seats, occupied_seats, price_per_seat, car_model, \
     car_color, is_active, created_at";

const BOOKING_COLUMNS: &str = "id, trip_id, passenger_name, passenger_phone, passenger_chat_id, \
     seats_booked, status, created_at, updated_at";

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            telegram_id BIGINT UNIQUE NOT NULL,
            full_name VARCHAR(255) NOT NULL,
            phone VARCHAR(20) NOT NULL,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS driver_telegram_links (
            user_id BIGINT PRIMARY KEY REFERENCES users(id),
            chat_id BIGINT NOT NULL,
            linked_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create driver_telegram_links table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS trips (
            id BIGSERIAL PRIMARY KEY,
            driver_id BIGINT REFERENCES users(id),
            driver_chat_id BIGINT,
            from_district VARCHAR(64) NOT NULL,
            to_district VARCHAR(64) NOT NULL,
            pickup_districts TEXT[] NOT NULL DEFAULT '{}',
            departure_date DATE NOT NULL,
            departure_time TIME NOT NULL,
            total_seats INTEGER NOT NULL CHECK (total_seats BETWEEN 1 AND 8),
            occupied_seats INTEGER NOT NULL DEFAULT 0,
            price_per_seat BIGINT NOT NULL,
            car_model VARCHAR(64) NOT NULL,
            car_color VARCHAR(32) NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            CHECK (occupied_seats >= 0 AND occupied_seats <= total_seats)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create trips table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bookings (
            id BIGSERIAL PRIMARY KEY,
            trip_id BIGINT NOT NULL REFERENCES trips(id),
            passenger_name VARCHAR(255) NOT NULL,
            passenger_phone VARCHAR(20) NOT NULL,
            passenger_chat_id BIGINT,
            seats_booked INTEGER NOT NULL CHECK (seats_booked > 0),
            status VARCHAR(16) NOT NULL DEFAULT 'pending',
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create bookings table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS conversation_states (
            chat_id BIGINT PRIMARY KEY,
            flow VARCHAR(32) NOT NULL,
            payload TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create conversation_states table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS trips_route_idx ON trips(to_district, from_district) WHERE is_active")
        .execute(pool)
        .await
        .context("Failed to create trips route index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS trips_pickup_idx ON trips USING GIN (pickup_districts)")
        .execute(pool)
        .await
        .context("Failed to create trips pickup index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS bookings_trip_id_idx ON bookings(trip_id)")
        .execute(pool)
        .await
        .context("Failed to create bookings trip_id index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS bookings_passenger_chat_idx ON bookings(passenger_chat_id)")
        .execute(pool)
        .await
        .context("Failed to create bookings passenger index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        telegram_id: row.get("telegram_id"),
        full_name: row.get("full_name"),
        phone: row.get("phone"),
        created_at: row.get("created_at"),
    }
}

fn trip_from_row(row: &PgRow) -> Trip {
    Trip {
        id: row.get("id"),
        driver_id: row.get("driver_id"),
        driver_chat_id: row.get("driver_chat_id"),
        from_district: row.get("from_district"),
        to_district: row.get("to_district"),
        pickup_districts: row.get("pickup_districts"),
        departure_date: row.get("departure_date"),
        departure_time: row.get("departure_time"),
        total_seats: row.get("total_seats"),
        occupied_seats: row.get("occupied_seats"),
        price_per_seat: row.get("price_per_seat"),
        car_model: row.get("car_model"),
        car_color: row.get("car_color"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn booking_from_row(row: &PgRow) -> Result<Booking> {
    let status: String = row.get("status");
    Ok(Booking {
        id: row.get("id"),
        trip_id: row.get("trip_id"),
        passenger_name: row.get("passenger_name"),
        passenger_phone: row.get("passenger_phone"),
        passenger_chat_id: row.get("passenger_chat_id"),
        seats_booked: row.get("seats_booked"),
        status: BookingStatus::parse(&status)
            .with_context(|| format!("Unknown booking status in database: {status}"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Get a user by Telegram ID
pub async fn get_user_by_telegram_id(pool: &PgPool, telegram_id: i64) -> Result<Option<User>> {
    debug!(telegram_id = %telegram_id, "Getting user by telegram_id");

    let row = sqlx::query(
        "SELECT id, telegram_id, full_name, phone, created_at FROM users WHERE telegram_id = $1",
    )
    .bind(telegram_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by telegram_id")?;

    Ok(row.as_ref().map(user_from_row))
}

/// Create a user and link their chat; an existing registration is returned unchanged
pub async fn register_user(pool: &PgPool, new_user: &NewUser) -> Result<User> {
    debug!(telegram_id = %new_user.telegram_id, "Registering user");

    let mut tx = pool.begin().await.context("Failed to begin registration")?;

    sqlx::query(
        "INSERT INTO users (telegram_id, full_name, phone) VALUES ($1, $2, $3)
         ON CONFLICT (telegram_id) DO NOTHING",
    )
    .bind(new_user.telegram_id)
    .bind(&new_user.full_name)
    .bind(&new_user.phone)
    .execute(&mut *tx)
    .await
    .context("Failed to insert user")?;

    let row = sqlx::query(
        "SELECT id, telegram_id, full_name, phone, created_at FROM users WHERE telegram_id = $1",
    )
    .bind(new_user.telegram_id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to read registered user")?;
    let user = user_from_row(&row);

    sqlx::query(
        "INSERT INTO driver_telegram_links (user_id, chat_id) VALUES ($1, $2)
         ON CONFLICT (user_id) DO UPDATE SET chat_id = excluded.chat_id, linked_at = CURRENT_TIMESTAMP",
    )
    .bind(user.id)
    .bind(new_user.chat_id)
    .execute(&mut *tx)
    .await
    .context("Failed to link driver chat")?;

    tx.commit().await.context("Failed to commit registration")?;

    info!(user_id = %user.id, "User registered");
    Ok(user)
}

/// Look up the chat linked to a driver account
pub async fn get_driver_chat_id(pool: &PgPool, user_id: i64) -> Result<Option<i64>> {
    let row = sqlx::query("SELECT chat_id FROM driver_telegram_links WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get driver chat link")?;

    Ok(row.map(|row| row.get(0)))
}

/// Create a new trip in the database
pub async fn create_trip(pool: &PgPool, new_trip: &NewTrip) -> Result<Trip> {
    debug!(from = %new_trip.from_district, to = %new_trip.to_district, "Creating new trip");

    let query = format!(
        "INSERT INTO trips (driver_id, driver_chat_id, from_district, to_district, pickup_districts,
             departure_date, departure_time, total_seats, price_per_seat, car_model, car_color)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING {TRIP_COLUMNS}"
    );
    let row = sqlx::query(&query)
        .bind(new_trip.driver_id)
        .bind(new_trip.driver_chat_id)
        .bind(&new_trip.from_district)
        .bind(&new_trip.to_district)
        .bind(&new_trip.pickup_districts)
        .bind(new_trip.departure_date)
        .bind(new_trip.departure_time)
        .bind(new_trip.total_seats)
        .bind(new_trip.price_per_seat)
        .bind(&new_trip.car_model)
        .bind(&new_trip.car_color)
        .fetch_one(pool)
        .await
        .context("Failed to insert new trip")?;

    let trip = trip_from_row(&row);
    info!(trip_id = %trip.id, "Trip created");
    Ok(trip)
}

/// Read a trip by ID
pub async fn get_trip(pool: &PgPool, trip_id: i64) -> Result<Option<Trip>> {
    debug!(trip_id = %trip_id, "Reading trip");

    let query = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(trip_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read trip")?;

    Ok(row.as_ref().map(trip_from_row))
}

/// Active, upcoming trips with free seats arriving at `destination`, either
/// starting at `origin` (`via_pickup == false`) or picking up at it.
pub async fn find_trips(
    pool: &PgPool,
    origin: &str,
    destination: &str,
    from_date: NaiveDate,
    via_pickup: bool,
    limit: i64,
) -> Result<Vec<Trip>> {
    let origin_clause = if via_pickup {
        "$1 = ANY(pickup_districts)"
    } else {
        "from_district = $1"
    };
    let query = format!(
        "SELECT {TRIP_COLUMNS} FROM trips
         WHERE is_active AND {origin_clause} AND to_district = $2
           AND departure_date >= $3 AND occupied_seats < total_seats
         ORDER BY id
         LIMIT $4"
    );

    let rows = sqlx::query(&query)
        .bind(origin)
        .bind(destination)
        .bind(from_date)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to search trips")?;

    let trips: Vec<Trip> = rows.iter().map(trip_from_row).collect();
    debug!(origin = %origin, destination = %destination, via_pickup, count = trips.len(), "Trip search finished");
    Ok(trips)
}

/// Active trips owned by the given chat, directly or through the driver link
pub async fn list_trips_for_driver_chat(pool: &PgPool, chat_id: i64) -> Result<Vec<Trip>> {
    let query = format!(
        "SELECT {TRIP_COLUMNS} FROM trips
         WHERE is_active AND (driver_chat_id = $1
             OR driver_id IN (SELECT user_id FROM driver_telegram_links WHERE chat_id = $1))
         ORDER BY departure_date, departure_time"
    );
    let rows = sqlx::query(&query)
        .bind(chat_id)
        .fetch_all(pool)
        .await
        .context("Failed to list driver trips")?;

    Ok(rows.iter().map(trip_from_row).collect())
}

/// Soft-delete a trip; only its owning chat may do so
pub async fn deactivate_trip(pool: &PgPool, trip_id: i64, chat_id: i64) -> Result<bool> {
    debug!(trip_id = %trip_id, "Deactivating trip");

    let result = sqlx::query(
        "UPDATE trips SET is_active = FALSE
         WHERE id = $1 AND is_active AND (driver_chat_id = $2
             OR driver_id IN (SELECT user_id FROM driver_telegram_links WHERE chat_id = $2))",
    )
    .bind(trip_id)
    .bind(chat_id)
    .execute(pool)
    .await
    .context("Failed to deactivate trip")?;

    Ok(result.rows_affected() > 0)
}

/// Insert a pending booking and occupy its seats in one transaction
pub async fn create_booking(pool: &PgPool, new_booking: &NewBooking) -> Result<BookingOutcome> {
    debug!(trip_id = %new_booking.trip_id, seats = new_booking.seats_booked, "Creating booking");

    let mut tx = pool.begin().await.context("Failed to begin booking")?;

    // Row lock serializes concurrent bookings for the same trip.
    let row = sqlx::query(
        "SELECT total_seats, occupied_seats, is_active FROM trips WHERE id = $1 FOR UPDATE",
    )
    .bind(new_booking.trip_id)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to lock trip")?;

    let Some(row) = row else {
        return Ok(BookingOutcome::TripUnavailable);
    };
    let total: i32 = row.get(0);
    let occupied: i32 = row.get(1);
    let active: bool = row.get(2);
    if !active {
        return Ok(BookingOutcome::TripUnavailable);
    }
    let available = total - occupied;
    if new_booking.seats_booked > available {
        return Ok(BookingOutcome::InsufficientSeats { available });
    }

    let query = format!(
        "INSERT INTO bookings (trip_id, passenger_name, passenger_phone, passenger_chat_id, seats_booked)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {BOOKING_COLUMNS}"
    );
    let booking_row = sqlx::query(&query)
        .bind(new_booking.trip_id)
        .bind(&new_booking.passenger_name)
        .bind(&new_booking.passenger_phone)
        .bind(new_booking.passenger_chat_id)
        .bind(new_booking.seats_booked)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert booking")?;
    let booking = booking_from_row(&booking_row)?;

    let query = format!(
        "UPDATE trips SET occupied_seats = occupied_seats + $1 WHERE id = $2 RETURNING {TRIP_COLUMNS}"
    );
    let trip_row = sqlx::query(&query)
        .bind(new_booking.seats_booked)
        .bind(new_booking.trip_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to occupy seats")?;
    let trip = trip_from_row(&trip_row);

    tx.commit().await.context("Failed to commit booking")?;

    info!(booking_id = %booking.id, trip_id = %trip.id, "Booking created");
    Ok(BookingOutcome::Created { booking, trip })
}

/// Read a booking by ID
pub async fn get_booking(pool: &PgPool, booking_id: i64) -> Result<Option<Booking>> {
    let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(booking_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read booking")?;

    row.as_ref().map(booking_from_row).transpose()
}

pub async fn list_bookings_for_trip(pool: &PgPool, trip_id: i64) -> Result<Vec<Booking>> {
    let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE trip_id = $1 ORDER BY id");
    let rows = sqlx::query(&query)
        .bind(trip_id)
        .fetch_all(pool)
        .await
        .context("Failed to list trip bookings")?;

    rows.iter().map(booking_from_row).collect()
}

pub async fn list_bookings_for_passenger(pool: &PgPool, chat_id: i64) -> Result<Vec<Booking>> {
    let query = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE passenger_chat_id = $1 ORDER BY id DESC LIMIT 20"
    );
    let rows = sqlx::query(&query)
        .bind(chat_id)
        .fetch_all(pool)
        .await
        .context("Failed to list passenger bookings")?;

    rows.iter().map(booking_from_row).collect()
}

/// Move a pending booking to `target`, releasing its seats when the target
/// no longer holds them. Bookings that are already final are left alone.
pub async fn transition_booking(
    pool: &PgPool,
    booking_id: i64,
    target: BookingStatus,
) -> Result<BookingTransition> {
    debug!(booking_id = %booking_id, target = %target.as_str(), "Transitioning booking");

    let mut tx = pool.begin().await.context("Failed to begin booking transition")?;

    let query = format!(
        "UPDATE bookings SET status = $1, updated_at = CURRENT_TIMESTAMP
         WHERE id = $2 AND status = 'pending'
         RETURNING {BOOKING_COLUMNS}"
    );
    let row = sqlx::query(&query)
        .bind(target.as_str())
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update booking status")?;

    let Some(row) = row else {
        let current = sqlx::query("SELECT status FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read booking status")?;
        return Ok(match current {
            Some(row) => {
                let status: String = row.get(0);
                let status = BookingStatus::parse(&status)
                    .with_context(|| format!("Unknown booking status in database: {status}"))?;
                BookingTransition::AlreadyFinal(status)
            }
            None => BookingTransition::NotFound,
        });
    };
    let booking = booking_from_row(&row)?;

    let trip_row = if target.holds_seats() {
        let query = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1");
        sqlx::query(&query)
            .bind(booking.trip_id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read booking trip")?
    } else {
        let query = format!(
            "UPDATE trips SET occupied_seats = occupied_seats - $1 WHERE id = $2 RETURNING {TRIP_COLUMNS}"
        );
        sqlx::query(&query)
            .bind(booking.seats_booked)
            .bind(booking.trip_id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to release seats")?
    };
    let trip = trip_from_row(&trip_row);

    tx.commit().await.context("Failed to commit booking transition")?;

    info!(booking_id = %booking.id, status = %booking.status.as_str(), "Booking transitioned");
    Ok(BookingTransition::Applied { booking, trip })
}

pub async fn get_conversation_state(pool: &PgPool, chat_id: i64) -> Result<Option<ConversationRow>> {
    let row = sqlx::query(
        "SELECT chat_id, flow, payload, updated_at FROM conversation_states WHERE chat_id = $1",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read conversation state")?;

    Ok(row.map(|row| ConversationRow {
        chat_id: row.get(0),
        flow: row.get(1),
        payload: row.get(2),
        updated_at: row.get(3),
    }))
}

pub async fn upsert_conversation_state(
    pool: &PgPool,
    chat_id: i64,
    flow: &str,
    payload: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO conversation_states (chat_id, flow, payload, updated_at)
         VALUES ($1, $2, $3, CURRENT_TIMESTAMP)
         ON CONFLICT (chat_id) DO UPDATE
         SET flow = excluded.flow, payload = excluded.payload, updated_at = excluded.updated_at",
    )
    .bind(chat_id)
    .bind(flow)
    .bind(payload)
    .execute(pool)
    .await
    .context("Failed to save conversation state")?;
    Ok(())
}

pub async fn delete_conversation_state(pool: &PgPool, chat_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM conversation_states WHERE chat_id = $1")
        .bind(chat_id)
        .execute(pool)
        .await
        .context("Failed to delete conversation state")?;
    Ok(())
}

/// Drop abandoned flows; returns how many were removed
pub async fn purge_conversation_states_before(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM conversation_states WHERE updated_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await
        .context("Failed to purge conversation states")?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_status_round_trips_through_text() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Rejected,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("accepted"), None);
    }

    #[test]
    fn test_only_pending_is_open() {
        assert!(!BookingStatus::Pending.is_final());
        assert!(BookingStatus::Confirmed.is_final());
        assert!(BookingStatus::Rejected.is_final());
        assert!(BookingStatus::Cancelled.is_final());
        assert!(BookingStatus::Confirmed.holds_seats());
        assert!(!BookingStatus::Rejected.holds_seats());
    }
}
