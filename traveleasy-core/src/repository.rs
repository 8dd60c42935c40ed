use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::booking::{Booking, NewBooking};
use crate::trip::{Trip, TripFilter};
use crate::user::User;
use crate::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Duplicate(String),
    #[error(transparent)]
    Rule(#[from] CoreError),
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RepoError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RepoError::Backend(Box::new(err))
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Duplicate` when the e-mail is taken.
    async fn create(&self, user: &User) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Persists `is_verified` and `verification_code`.
    async fn update_verification(&self, user: &User) -> RepoResult<()>;

    /// Stores `user`'s fresh verification code unless the stored account is
    /// already verified, in which case it fails with `CoreError::already_verified`.
    async fn reissue_code(&self, user: &User) -> RepoResult<()>;
}

/// Repository trait for published trips
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn create(&self, trip: &Trip) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Trip>>;

    /// Newest first.
    async fn list(&self, filter: &TripFilter) -> RepoResult<Vec<Trip>>;

    /// Completes a trip owned by `creator_id` and every active booking on it,
    /// as one unit. Returns the trip and the number of bookings completed.
    async fn complete(&self, trip_id: Uuid, creator_id: Uuid) -> RepoResult<(Trip, u64)>;

    /// Cancels a trip owned by `creator_id` and every active booking on it,
    /// as one unit. Returns the trip and the number of bookings cancelled.
    async fn cancel(&self, trip_id: Uuid, creator_id: Uuid) -> RepoResult<(Trip, u64)>;
}

/// Repository trait for seat bookings
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Admits `booking` against its trip and persists both, as one unit:
    /// no two concurrent calls can oversell a trip or share a seat label.
    async fn book(&self, booking: NewBooking, booked_by: Uuid) -> RepoResult<(Booking, Trip)>;

    /// Cancels a booking made by `booked_by` and releases its seats, as one unit.
    /// The trip is `None` when it no longer exists.
    async fn cancel(&self, booking_id: Uuid, booked_by: Uuid) -> RepoResult<(Booking, Option<Trip>)>;

    /// Newest first.
    async fn list_for_user(&self, booked_by: Uuid) -> RepoResult<Vec<Booking>>;

    /// Newest first.
    async fn list_for_trip(&self, trip_id: Uuid) -> RepoResult<Vec<Booking>>;

    /// Seat labels held by active bookings on the trip.
    async fn held_seats(&self, trip_id: Uuid) -> RepoResult<HashSet<String>>;
}
