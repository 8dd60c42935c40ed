use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use traveleasy_core::repository::{RepoError, RepoResult, TripRepository};
use traveleasy_core::{BookingStatus, CoreError, Trip, TripFilter};
use traveleasy_shared::Masked;
use uuid::Uuid;

pub struct PgTripRepository {
    pool: PgPool,
}

impl PgTripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const TRIP_COLUMNS: &str = "id, creator_id, status, name, seats, booked_seats, date, time, \
                                       meet_place, source, destination, kilometer, contact, vehicle, \
                                       vehicle_type, pan_card, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct TripRow {
    id: Uuid,
    creator_id: Uuid,
    status: String,
    name: String,
    seats: i32,
    booked_seats: i32,
    date: String,
    time: String,
    meet_place: String,
    source: String,
    destination: String,
    kilometer: f64,
    contact: String,
    vehicle: String,
    vehicle_type: String,
    pan_card: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

pub(crate) fn to_u32(value: i32, column: &str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::Rule(CoreError::InternalError(format!("negative {}: {}", column, value))))
}

pub(crate) fn to_i32(value: u32, column: &str) -> RepoResult<i32> {
    i32::try_from(value)
        .map_err(|_| RepoError::Rule(CoreError::ValidationError(format!("{} is too large", column))))
}

impl TryFrom<TripRow> for Trip {
    type Error = RepoError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            id: row.id,
            creator_id: row.creator_id,
            status: row.status.parse()?,
            name: row.name,
            seats: to_u32(row.seats, "seats")?,
            booked_seats: to_u32(row.booked_seats, "booked_seats")?,
            date: row.date,
            time: row.time,
            meet_place: row.meet_place,
            source: row.source,
            destination: row.destination,
            kilometer: row.kilometer,
            contact: row.contact,
            vehicle: row.vehicle,
            vehicle_type: row.vehicle_type,
            pan_card: Masked(row.pan_card),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Loads and row-locks a trip for the rest of the transaction.
pub(crate) async fn lock_trip(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
    creator_id: Option<Uuid>,
) -> RepoResult<Option<Trip>> {
    let row = sqlx::query_as::<_, TripRow>(&format!(
        "SELECT {} FROM trips WHERE id = $1 AND ($2::uuid IS NULL OR creator_id = $2) FOR UPDATE",
        TRIP_COLUMNS
    ))
    .bind(trip_id)
    .bind(creator_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(RepoError::backend)?;

    row.map(Trip::try_from).transpose()
}

pub(crate) async fn save_trip_state(tx: &mut Transaction<'_, Postgres>, trip: &Trip) -> RepoResult<()> {
    sqlx::query("UPDATE trips SET status = $1, booked_seats = $2, updated_at = $3 WHERE id = $4")
        .bind(trip.status.as_str())
        .bind(to_i32(trip.booked_seats, "booked_seats")?)
        .bind(trip.updated_at)
        .bind(trip.id)
        .execute(&mut **tx)
        .await
        .map_err(RepoError::backend)?;
    Ok(())
}

impl PgTripRepository {
    /// Moves an owned trip and its active bookings to `to` in one transaction.
    async fn close(
        &self,
        trip_id: Uuid,
        creator_id: Uuid,
        to: BookingStatus,
        apply: fn(&mut Trip) -> Result<(), CoreError>,
    ) -> RepoResult<(Trip, u64)> {
        let mut tx = self.pool.begin().await.map_err(RepoError::backend)?;

        let mut trip = lock_trip(&mut tx, trip_id, Some(creator_id))
            .await?
            .ok_or(RepoError::NotFound("Trip"))?;
        apply(&mut trip)?;
        save_trip_state(&mut tx, &trip).await?;

        let cascaded = sqlx::query(
            "UPDATE bookings SET status = $1, updated_at = $2 WHERE trip_id = $3 AND status = $4",
        )
        .bind(to.as_str())
        .bind(trip.updated_at)
        .bind(trip.id)
        .bind(BookingStatus::Active.as_str())
        .execute(&mut *tx)
        .await
        .map_err(RepoError::backend)?
        .rows_affected();

        tx.commit().await.map_err(RepoError::backend)?;
        Ok((trip, cascaded))
    }
}

#[async_trait]
impl TripRepository for PgTripRepository {
    async fn create(&self, trip: &Trip) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trips (id, creator_id, status, name, seats, booked_seats, date, time, meet_place,
                               source, destination, kilometer, contact, vehicle, vehicle_type, pan_card,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(trip.id)
        .bind(trip.creator_id)
        .bind(trip.status.as_str())
        .bind(&trip.name)
        .bind(to_i32(trip.seats, "seats")?)
        .bind(to_i32(trip.booked_seats, "booked_seats")?)
        .bind(&trip.date)
        .bind(&trip.time)
        .bind(&trip.meet_place)
        .bind(&trip.source)
        .bind(&trip.destination)
        .bind(trip.kilometer)
        .bind(&trip.contact)
        .bind(&trip.vehicle)
        .bind(&trip.vehicle_type)
        .bind(trip.pan_card.expose())
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await
        .map_err(RepoError::backend)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(&format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::backend)?;

        row.map(Trip::try_from).transpose()
    }

    async fn list(&self, filter: &TripFilter) -> RepoResult<Vec<Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {} FROM trips \
             WHERE ($1::uuid IS NULL OR creator_id = $1) AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC",
            TRIP_COLUMNS
        ))
        .bind(filter.creator)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::backend)?;

        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn complete(&self, trip_id: Uuid, creator_id: Uuid) -> RepoResult<(Trip, u64)> {
        self.close(trip_id, creator_id, BookingStatus::Completed, Trip::complete).await
    }

    async fn cancel(&self, trip_id: Uuid, creator_id: Uuid) -> RepoResult<(Trip, u64)> {
        self.close(trip_id, creator_id, BookingStatus::Cancelled, Trip::cancel).await
    }
}
