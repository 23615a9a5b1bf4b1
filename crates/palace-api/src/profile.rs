use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::CookieJar;

use palace_types::api::{FavoriteResponse, UpdateProfileRequest};

use crate::auth::with_session;
use crate::extract::{ApiJson, ApiPath};
use crate::session::SessionToken;
use crate::{ActionError, AppState, accounts};

/// Apply the edit and swap in a re-minted session cookie.
pub async fn update_profile(
    State(state): State<AppState>,
    token: SessionToken,
    jar: CookieJar,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ActionError> {
    let signed_in = accounts::update_profile(&state, token.as_deref(), &req).await?;
    Ok(with_session(state.secure_cookies, jar, signed_in))
}

pub async fn get_favorites(State(state): State<AppState>, token: SessionToken) -> Json<Vec<i64>> {
    Json(accounts::get_favorites(&state, token.as_deref()).await)
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    token: SessionToken,
    ApiPath(room_id): ApiPath<i64>,
) -> Result<Json<FavoriteResponse>, ActionError> {
    let action = accounts::toggle_favorite(&state, token.as_deref(), room_id).await?;
    Ok(Json(FavoriteResponse {
        success: true,
        action,
    }))
}
