use axum::{Json, extract::State, http::StatusCode};

use palace_types::api::{BookingCreatedResponse, CreateBookingRequest};
use palace_types::models::{Booking, Room};

use crate::extract::ApiJson;
use crate::session::SessionToken;
use crate::{ActionError, AppState, reservations};

pub async fn create_booking(
    State(state): State<AppState>,
    token: SessionToken,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingCreatedResponse>), ActionError> {
    let booking_id = reservations::create_booking(&state, token.as_deref(), &req).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookingCreatedResponse {
            success: true,
            booking_id,
        }),
    ))
}

pub async fn list_bookings(State(state): State<AppState>, token: SessionToken) -> Json<Vec<Booking>> {
    Json(reservations::list_bookings(&state, token.as_deref()).await)
}

pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<Room>>, ActionError> {
    Ok(Json(reservations::list_rooms(&state).await?))
}
