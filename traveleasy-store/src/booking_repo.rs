use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashSet;
use traveleasy_core::repository::{BookingRepository, RepoError, RepoResult};
use traveleasy_core::{Booking, BookingStatus, NewBooking, Trip};
use tracing::info;
use uuid::Uuid;

use crate::trip_repo::{lock_trip, save_trip_state, to_i32, to_u32};

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, trip_id, booked_by, source, destination, contact, traveler_name, \
                               traveler_number, seats_booked, number_of_seats, kilometers, rate_per_km, \
                               total_price, date, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    trip_id: Uuid,
    booked_by: Uuid,
    source: String,
    destination: String,
    contact: String,
    traveler_name: String,
    traveler_number: String,
    seats_booked: Vec<String>,
    number_of_seats: i32,
    kilometers: f64,
    rate_per_km: f64,
    total_price: f64,
    date: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepoError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            trip_id: row.trip_id,
            booked_by: row.booked_by,
            source: row.source,
            destination: row.destination,
            contact: row.contact,
            traveler_name: row.traveler_name,
            traveler_number: row.traveler_number,
            seats_booked: row.seats_booked,
            number_of_seats: to_u32(row.number_of_seats, "number_of_seats")?,
            kilometers: row.kilometers,
            rate_per_km: row.rate_per_km,
            total_price: row.total_price,
            date: row.date,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

async fn held_seats_in(tx: &mut Transaction<'_, Postgres>, trip_id: Uuid) -> RepoResult<HashSet<String>> {
    let rows: Vec<(Vec<String>,)> =
        sqlx::query_as("SELECT seats_booked FROM bookings WHERE trip_id = $1 AND status = $2")
            .bind(trip_id)
            .bind(BookingStatus::Active.as_str())
            .fetch_all(&mut **tx)
            .await
            .map_err(RepoError::backend)?;

    Ok(rows.into_iter().flat_map(|(labels,)| labels).collect())
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn book(&self, new_booking: NewBooking, booked_by: Uuid) -> RepoResult<(Booking, Trip)> {
        let mut tx = self.pool.begin().await.map_err(RepoError::backend)?;

        // The trip row lock serialises every booking on this trip.
        let mut trip = lock_trip(&mut tx, new_booking.trip_id, None)
            .await?
            .ok_or(RepoError::NotFound("Trip"))?;
        let held = held_seats_in(&mut tx, trip.id).await?;
        new_booking.admit(&mut trip, &held)?;
        save_trip_state(&mut tx, &trip).await?;

        let booking = Booking::new(booked_by, new_booking);
        sqlx::query(
            r#"
            INSERT INTO bookings (id, trip_id, booked_by, source, destination, contact, traveler_name,
                                  traveler_number, seats_booked, number_of_seats, kilometers, rate_per_km,
                                  total_price, date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(booking.id)
        .bind(booking.trip_id)
        .bind(booking.booked_by)
        .bind(&booking.source)
        .bind(&booking.destination)
        .bind(&booking.contact)
        .bind(&booking.traveler_name)
        .bind(&booking.traveler_number)
        .bind(&booking.seats_booked)
        .bind(to_i32(booking.number_of_seats, "numberOfSeats")?)
        .bind(booking.kilometers)
        .bind(booking.rate_per_km)
        .bind(booking.total_price)
        .bind(&booking.date)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::backend)?;

        tx.commit().await.map_err(RepoError::backend)?;
        info!("Booking {} holds {} seat(s) on trip {}", booking.id, booking.number_of_seats, trip.id);

        Ok((booking, trip))
    }

    async fn cancel(&self, booking_id: Uuid, booked_by: Uuid) -> RepoResult<(Booking, Option<Trip>)> {
        let mut tx = self.pool.begin().await.map_err(RepoError::backend)?;

        // Lock order is trip then booking everywhere, so find the trip first.
        let trip_id: Option<(Uuid,)> =
            sqlx::query_as("SELECT trip_id FROM bookings WHERE id = $1 AND booked_by = $2")
                .bind(booking_id)
                .bind(booked_by)
                .fetch_optional(&mut *tx)
                .await
                .map_err(RepoError::backend)?;
        let (trip_id,) = trip_id.ok_or(RepoError::NotFound("Booking"))?;

        let mut trip = lock_trip(&mut tx, trip_id, None).await?;

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepoError::backend)?
        .ok_or(RepoError::NotFound("Booking"))?;
        let mut booking = Booking::try_from(row)?;

        booking.cancel()?;
        sqlx::query("UPDATE bookings SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(booking.status.as_str())
            .bind(booking.updated_at)
            .bind(booking.id)
            .execute(&mut *tx)
            .await
            .map_err(RepoError::backend)?;

        if let Some(trip) = trip.as_mut() {
            trip.release(booking.number_of_seats);
            save_trip_state(&mut tx, trip).await?;
        }

        tx.commit().await.map_err(RepoError::backend)?;
        Ok((booking, trip))
    }

    async fn list_for_user(&self, booked_by: Uuid) -> RepoResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE booked_by = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(booked_by)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::backend)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn list_for_trip(&self, trip_id: Uuid) -> RepoResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE trip_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::backend)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn held_seats(&self, trip_id: Uuid) -> RepoResult<HashSet<String>> {
        let mut tx = self.pool.begin().await.map_err(RepoError::backend)?;
        let held = held_seats_in(&mut tx, trip_id).await?;
        tx.commit().await.map_err(RepoError::backend)?;
        Ok(held)
    }
}
