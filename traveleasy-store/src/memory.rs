use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use traveleasy_core::booking::held_seats;
use traveleasy_core::repository::{
    BookingRepository, RepoError, RepoResult, TripRepository, UserRepository,
};
use traveleasy_core::{Booking, BookingStatus, CoreError, NewBooking, Trip, TripFilter, User};
use uuid::Uuid;

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    trips: HashMap<Uuid, Trip>,
    trip_order: Vec<Uuid>,
    bookings: HashMap<Uuid, Booking>,
    booking_order: Vec<Uuid>,
}

impl Collections {
    fn bookings_for_trip(&self, trip_id: Uuid) -> impl Iterator<Item = &Booking> {
        self.bookings.values().filter(move |b| b.trip_id == trip_id)
    }

    /// Newest first, following insertion order.
    fn newest_bookings<'a>(&'a self, keep: impl Fn(&Booking) -> bool + 'a) -> Vec<Booking> {
        self.booking_order
            .iter()
            .rev()
            .filter_map(|id| self.bookings.get(id))
            .filter(|b| keep(b))
            .cloned()
            .collect()
    }

    fn close_trip(
        &mut self,
        trip_id: Uuid,
        creator_id: Uuid,
        apply: fn(&mut Trip) -> traveleasy_core::CoreResult<()>,
        cascade: fn(&mut Booking) -> traveleasy_core::CoreResult<()>,
    ) -> RepoResult<(Trip, u64)> {
        let trip = self
            .trips
            .get_mut(&trip_id)
            .filter(|t| t.creator_id == creator_id)
            .ok_or(RepoError::NotFound("Trip"))?;
        apply(trip)?;
        let trip = trip.clone();

        let mut changed = 0;
        for booking in self.bookings.values_mut() {
            if booking.trip_id == trip_id && booking.status == BookingStatus::Active {
                cascade(booking)?;
                changed += 1;
            }
        }
        Ok((trip, changed))
    }
}

/// Process-local store behind one lock; each repository call is a single
/// critical section, so multi-collection updates are atomic.
///
/// Used for development without Postgres and in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: &User) -> RepoResult<()> {
        let mut db = self.inner.write().await;
        let email = user.email.to_lowercase();
        if db.emails.contains_key(&email) {
            return Err(RepoError::Duplicate("User with this email already exists".to_string()));
        }
        db.emails.insert(email, user.id);
        db.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let db = self.inner.read().await;
        Ok(db
            .emails
            .get(&email.to_lowercase())
            .and_then(|id| db.users.get(id))
            .cloned())
    }

    async fn update_verification(&self, user: &User) -> RepoResult<()> {
        let mut db = self.inner.write().await;
        let stored = db.users.get_mut(&user.id).ok_or(RepoError::NotFound("User"))?;
        stored.is_verified = user.is_verified;
        stored.verification_code = user.verification_code.clone();
        stored.updated_at = user.updated_at;
        Ok(())
    }

    async fn reissue_code(&self, user: &User) -> RepoResult<()> {
        let mut db = self.inner.write().await;
        let stored = db.users.get_mut(&user.id).ok_or(RepoError::NotFound("User"))?;
        if stored.is_verified {
            return Err(CoreError::already_verified().into());
        }
        stored.verification_code = user.verification_code.clone();
        stored.updated_at = user.updated_at;
        Ok(())
    }
}

#[async_trait]
impl TripRepository for MemoryStore {
    async fn create(&self, trip: &Trip) -> RepoResult<()> {
        let mut db = self.inner.write().await;
        db.trip_order.push(trip.id);
        db.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Trip>> {
        Ok(self.inner.read().await.trips.get(&id).cloned())
    }

    async fn list(&self, filter: &TripFilter) -> RepoResult<Vec<Trip>> {
        let db = self.inner.read().await;
        Ok(db
            .trip_order
            .iter()
            .rev()
            .filter_map(|id| db.trips.get(id))
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn complete(&self, trip_id: Uuid, creator_id: Uuid) -> RepoResult<(Trip, u64)> {
        let mut db = self.inner.write().await;
        db.close_trip(trip_id, creator_id, Trip::complete, Booking::complete)
    }

    async fn cancel(&self, trip_id: Uuid, creator_id: Uuid) -> RepoResult<(Trip, u64)> {
        let mut db = self.inner.write().await;
        db.close_trip(trip_id, creator_id, Trip::cancel, Booking::cancel)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn book(&self, new_booking: NewBooking, booked_by: Uuid) -> RepoResult<(Booking, Trip)> {
        let mut db = self.inner.write().await;

        let held = held_seats(db.bookings_for_trip(new_booking.trip_id));
        let trip = db
            .trips
            .get_mut(&new_booking.trip_id)
            .ok_or(RepoError::NotFound("Trip"))?;
        new_booking.admit(trip, &held)?;
        let trip = trip.clone();

        let booking = Booking::new(booked_by, new_booking);
        db.booking_order.push(booking.id);
        db.bookings.insert(booking.id, booking.clone());
        Ok((booking, trip))
    }

    async fn cancel(&self, booking_id: Uuid, booked_by: Uuid) -> RepoResult<(Booking, Option<Trip>)> {
        let mut db = self.inner.write().await;

        let booking = db
            .bookings
            .get_mut(&booking_id)
            .filter(|b| b.booked_by == booked_by)
            .ok_or(RepoError::NotFound("Booking"))?;
        booking.cancel()?;
        let booking = booking.clone();

        let trip = db.trips.get_mut(&booking.trip_id).map(|trip| {
            trip.release(booking.number_of_seats);
            trip.clone()
        });
        Ok((booking, trip))
    }

    async fn list_for_user(&self, booked_by: Uuid) -> RepoResult<Vec<Booking>> {
        let db = self.inner.read().await;
        Ok(db.newest_bookings(move |b| b.booked_by == booked_by))
    }

    async fn list_for_trip(&self, trip_id: Uuid) -> RepoResult<Vec<Booking>> {
        let db = self.inner.read().await;
        Ok(db.newest_bookings(move |b| b.trip_id == trip_id))
    }

    async fn held_seats(&self, trip_id: Uuid) -> RepoResult<HashSet<String>> {
        let db = self.inner.read().await;
        Ok(held_seats(db.bookings_for_trip(trip_id)))
    }
}
