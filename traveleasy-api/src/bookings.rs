use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use traveleasy_core::{Booking, BookingDraft, BookingStatus, Role};
use uuid::Uuid;

use crate::error::{ApiJson, ApiPath, ApiQuery, AppError};
use crate::middleware::{current_user, Claims};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookTrip", post(book_trip))
        .route("/api/bookings", get(my_bookings))
        .route("/api/bookings/{id}/cancel", put(cancel_booking))
        .route("/api/bookingsfortrip", get(bookings_for_trip))
}

/// Condensed booking shown in the traveller's booking list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingSummary {
    id: Uuid,
    trip_id: Uuid,
    source: String,
    destination: String,
    date: String,
    price: f64,
    seats: Vec<String>,
    status: BookingStatus,
    contact: String,
}

impl From<Booking> for BookingSummary {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            trip_id: b.trip_id,
            source: b.source,
            destination: b.destination,
            date: b.date,
            price: b.total_price,
            seats: b.seats_booked,
            status: b.status,
            contact: b.contact,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripQuery {
    trip_id: Option<String>,
}

async fn book_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(draft): ApiJson<BookingDraft>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let traveler = current_user(&state, &claims, Some(Role::Traveler)).await?;

    let new_booking = draft.validate(state.business_rules.rate_per_km)?;
    let (booking, trip) = state.bookings.book(new_booking, traveler.id).await?;
    info!(
        "Traveler {} booked {:?} on trip {} ({} of {} seats taken)",
        traveler.id, booking.seats_booked, trip.id, trip.booked_seats, trip.seats
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Booking confirmed!", "booking": booking })),
    ))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(booking_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let traveler = current_user(&state, &claims, Some(Role::Traveler)).await?;

    let (booking, trip) = state.bookings.cancel(booking_id, traveler.id).await?;
    if let Some(trip) = &trip {
        info!("Booking {} cancelled, trip {} now has {} seat(s) booked", booking.id, trip.id, trip.booked_seats);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Trip booking cancelled successfully.",
        "bookingId": booking.id,
        "updatedStatus": booking.status,
    })))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, AppError> {
    let user = current_user(&state, &claims, None).await?;

    let bookings: Vec<BookingSummary> = state
        .bookings
        .list_for_user(user.id)
        .await?
        .into_iter()
        .map(BookingSummary::from)
        .collect();

    Ok(Json(json!({
        "success": true,
        "message": "Bookings fetched successfully.",
        "total": bookings.len(),
        "data": bookings,
    })))
}

async fn bookings_for_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<TripQuery>,
) -> Result<Json<Value>, AppError> {
    let trip_id = query
        .trip_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Trip ID is required.".to_string()))?;
    let trip_id = Uuid::parse_str(trip_id.trim())
        .map_err(|_| AppError::ValidationError("Invalid trip ID.".to_string()))?;

    let provider = current_user(&state, &claims, Some(Role::Provider)).await?;
    let trip = state
        .trips
        .find_by_id(trip_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Trip not found".to_string()))?;
    if trip.creator_id != provider.id {
        return Err(AppError::AuthorizationError(
            "You can only view bookings for your own trips.".to_string(),
        ));
    }

    let bookings = state.bookings.list_for_trip(trip.id).await?;
    Ok(Json(json!({ "success": true, "data": bookings })))
}
