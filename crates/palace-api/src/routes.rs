use axum::{
    Json, Router, middleware,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

use crate::middleware::boundary_policy;
use crate::{AppState, auth, bookings, profile};

/// JSON API, mounted under `/api` by [`app`].
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signup/resend", post(auth::resend_code))
        .route("/auth/signup/verify", post(auth::verify_signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/profile", patch(profile::update_profile))
        .route("/favorites", get(profile::get_favorites))
        .route("/favorites/{room_id}", post(profile::toggle_favorite))
        .route("/rooms", get(bookings::list_rooms))
        .route("/bookings", get(bookings::list_bookings).post(bookings::create_booking))
        .with_state(state)
}

/// The API plus `pages` behind the boundary policy.
pub fn app(state: AppState, pages: Router) -> Router {
    let guarded = pages.layer(middleware::from_fn_with_state(state.clone(), boundary_policy));
    Router::new().nest("/api", api_routes(state)).merge(guarded)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
