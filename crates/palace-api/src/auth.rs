use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::CookieJar;

use palace_types::api::{
    ForgotPasswordRequest, LoginRequest, ResendCodeRequest, ResetPasswordRequest, SignupRequest,
    SuccessResponse, UserResponse, VerifySignupRequest,
};

use crate::extract::ApiJson;
use crate::session::{self, SessionToken, SignedIn};
use crate::{ActionError, AppState, accounts};

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<Json<SuccessResponse>, ActionError> {
    accounts::request_signup(&state, &req).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn resend_code(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResendCodeRequest>,
) -> Result<Json<SuccessResponse>, ActionError> {
    accounts::resend_signup_code(&state, &req.email).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn verify_signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<VerifySignupRequest>,
) -> Result<impl IntoResponse, ActionError> {
    let signed_in = accounts::verify_signup(&state, &req.email, &req.code).await?;
    Ok(with_session(state.secure_cookies, jar, signed_in))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ActionError> {
    let signed_in = accounts::login(&state, &req.email, &req.password).await?;
    Ok(with_session(state.secure_cookies, jar, signed_in))
}

/// Always succeeds; there is no server-side session to revoke.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (jar.add(session::removal_cookie()), Json(SuccessResponse::ok()))
}

pub async fn me(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Json<UserResponse>, ActionError> {
    let claims = session::authenticate(&state, token.as_deref())?;
    Ok(Json(UserResponse {
        success: true,
        user: claims.account_view(),
    }))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<SuccessResponse>, ActionError> {
    accounts::request_password_reset(&state, &req.email).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>, ActionError> {
    accounts::reset_password(&state, &req.email, &req.token, &req.password).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Set the session cookie and answer with the public user view.
pub(crate) fn with_session(secure: bool, jar: CookieJar, signed_in: SignedIn) -> impl IntoResponse {
    let cookie = session::session_cookie(&signed_in, secure);
    (
        jar.add(cookie),
        Json(UserResponse {
            success: true,
            user: signed_in.user,
        }),
    )
}
