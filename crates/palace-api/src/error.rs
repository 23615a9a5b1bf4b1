use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use palace_types::api::ErrorResponse;

/// Every failure an action can report. The `Display` text is what the
/// client sees; causes of `OperationFailed` are logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("User already exists")]
    AccountExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("Verification code has expired")]
    CodeExpired,
    #[error("No pending verification found")]
    NoPendingVerification,
    #[error("No account found with this email")]
    AccountNotFound,
    #[error("Invalid or expired reset link")]
    InvalidOrExpiredToken,
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Invalid session")]
    InvalidSession,
    #[error("{0}")]
    NotificationFailed(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    InvalidBooking(String),
    #[error("Room not found")]
    UnknownRoom,
    #[error("Room is not available for the selected dates")]
    RoomUnavailable,
    #[error("Something went wrong. Please try again.")]
    OperationFailed(#[from] anyhow::Error),
}

impl ActionError {
    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::AccountExists | ActionError::RoomUnavailable => StatusCode::CONFLICT,
            ActionError::InvalidCredentials
            | ActionError::Unauthenticated
            | ActionError::InvalidSession => StatusCode::UNAUTHORIZED,
            ActionError::InvalidCode
            | ActionError::InvalidOrExpiredToken
            | ActionError::InvalidInput(_)
            | ActionError::InvalidBooking(_) => StatusCode::BAD_REQUEST,
            ActionError::CodeExpired => StatusCode::GONE,
            ActionError::NoPendingVerification
            | ActionError::AccountNotFound
            | ActionError::UnknownRoom => StatusCode::NOT_FOUND,
            ActionError::NotificationFailed(_) => StatusCode::BAD_GATEWAY,
            ActionError::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ActionError {
    fn from(rejection: JsonRejection) -> Self {
        ActionError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for ActionError {
    fn from(rejection: PathRejection) -> Self {
        ActionError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        if let ActionError::OperationFailed(cause) = &self {
            error!("Operation failed: {:#}", cause);
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
