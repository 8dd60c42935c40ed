use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use traveleasy_core::{Role, Trip, TripDraft, TripFilter, TripStatus};
use uuid::Uuid;

use crate::error::{ApiJson, ApiPath, ApiQuery, AppError};
use crate::middleware::{current_user, Claims};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/addtrip", post(add_trip))
        .route("/api/providertrips/my", get(my_trips))
        .route("/api/providertrips/all", get(all_trips))
        .route("/api/providertrips/{id}/complete", put(complete_trip))
        .route("/api/providertrips/{id}/cancel", put(cancel_trip))
        .route("/api/trips/{id}/seats", get(trip_seats))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

async fn add_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(draft): ApiJson<TripDraft>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let provider = current_user(&state, &claims, Some(Role::Provider)).await?;

    let trip = Trip::new(provider.id, draft.validate()?);
    state.trips.create(&trip).await?;
    info!("Provider {} published trip {} with {} seats", provider.id, trip.id, trip.seats);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Trip added successfully!", "trip": trip })),
    ))
}

async fn list_trips(state: &AppState, filter: TripFilter) -> Result<Json<Value>, AppError> {
    let trips = state.trips.list(&filter).await?;
    if trips.is_empty() {
        return Ok(Json(json!({ "message": "No trips found for this status.", "trips": [] })));
    }
    Ok(Json(json!({ "trips": trips })))
}

async fn my_trips(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<Value>, AppError> {
    let user = current_user(&state, &claims, None).await?;
    let filter = TripFilter {
        creator: Some(user.id),
        status: TripStatus::from_filter(query.status.as_deref()),
    };
    list_trips(&state, filter).await
}

async fn all_trips(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<Value>, AppError> {
    current_user(&state, &claims, None).await?;
    let filter = TripFilter {
        creator: None,
        status: TripStatus::from_filter(query.status.as_deref()),
    };
    list_trips(&state, filter).await
}

async fn complete_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(trip_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let provider = current_user(&state, &claims, Some(Role::Provider)).await?;

    let (trip, bookings_updated) = state.trips.complete(trip_id, provider.id).await?;
    info!("Trip {} completed, {} booking(s) completed with it", trip.id, bookings_updated);

    Ok(Json(json!({
        "success": true,
        "message": "Trip and all related bookings marked as Completed",
        "trip": trip,
        "bookingsUpdated": bookings_updated,
    })))
}

async fn cancel_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(trip_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let provider = current_user(&state, &claims, Some(Role::Provider)).await?;

    let (trip, bookings_updated) = state.trips.cancel(trip_id, provider.id).await?;
    info!("Trip {} cancelled, {} booking(s) cancelled with it", trip.id, bookings_updated);

    Ok(Json(json!({
        "success": true,
        "message": "Trip and all related bookings marked as Cancelled",
        "trip": trip,
        "bookingsUpdated": bookings_updated,
    })))
}

async fn trip_seats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(trip_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    current_user(&state, &claims, None).await?;

    let trip = state
        .trips
        .find_by_id(trip_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Trip not found".to_string()))?;
    let held = state.bookings.held_seats(trip.id).await?;

    Ok(Json(json!({
        "tripId": trip.id,
        "seats": trip.seats,
        "bookedseats": trip.booked_seats,
        "available": trip.available_seat_labels(&held),
    })))
}
