//! Request extractors whose rejections answer with the `{"error": ...}`
//! body like every other failure.

use axum::extract::{FromRequest, FromRequestParts};

use crate::ActionError;

/// JSON request body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ActionError))]
pub struct ApiJson<T>(pub T);

/// Path parameters.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ActionError))]
pub struct ApiPath<T>(pub T);
