use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AccountView, FavoriteAction};

// -- Session claims --

/// Current version of the session payload schema. Bumped whenever the
/// shape of [`SessionClaims`] changes.
pub const SESSION_SCHEMA_VERSION: u8 = 2;

/// Identity carried inside a session token. Canonical definition shared by
/// the session codec and every authenticated handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
}

/// Business-level session payload. `expires` is independent of the
/// signature's own `exp` claim, which the codec manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user: SessionUser,
    pub expires: DateTime<Utc>,
}

impl SessionClaims {
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        now < self.expires
    }

    pub fn account_view(&self) -> AccountView {
        AccountView {
            name: self.user.name.clone(),
            email: self.user.email.clone(),
            avatar: self.user.avatar.clone(),
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResendCodeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySignupRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub password: String,
}

// -- Profile --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

// -- Bookings --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub room_id: i64,
    pub room_name: String,
    pub check_in: String,
    pub check_out: String,
    pub guests: u32,
    pub total_price: f64,
    pub payment_method: String,
    pub message: Option<String>,
}

// -- Responses --

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: AccountView,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub success: bool,
    pub action: FavoriteAction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreatedResponse {
    pub success: bool,
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
