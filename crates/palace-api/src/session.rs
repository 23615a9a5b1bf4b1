use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use time::OffsetDateTime;
use tracing::debug;

use palace_crypto::SESSION_TTL_HOURS;
use palace_db::models::AccountRow;
use palace_types::api::{SessionClaims, SessionUser};
use palace_types::models::{AccountView, DEFAULT_AVATAR_URL};

use crate::{ActionError, AppStateInner};

pub const SESSION_COOKIE: &str = "session";

/// A freshly minted session plus the public view it was minted for.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub token: String,
    pub expires: DateTime<Utc>,
    pub user: AccountView,
}

/// Raw session token from the `session` cookie, or failing that an
/// `Authorization: Bearer` header. Never rejects; absence is `None`.
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(token_from_headers(&parts.headers)))
    }
}

impl SessionToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

/// Resolve a token into claims. The signature, its expiry, and the
/// payload `expires` must all hold.
pub fn authenticate(state: &AppStateInner, token: Option<&str>) -> Result<SessionClaims, ActionError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or(ActionError::Unauthenticated)?;

    let claims = state.sessions.decode(token).map_err(|e| {
        debug!("Rejected session token: {}", e);
        ActionError::InvalidSession
    })?;

    if !claims.is_current(Utc::now()) {
        debug!("Rejected session for {}: payload expired", claims.user.email);
        return Err(ActionError::InvalidSession);
    }

    Ok(claims)
}

/// Expiry for a brand-new session.
pub fn new_session_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::hours(SESSION_TTL_HOURS)
}

pub fn account_view(account: &AccountRow) -> AccountView {
    AccountView {
        name: account.name.clone(),
        email: account.email.clone(),
        avatar: account
            .avatar_url
            .clone()
            .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
    }
}

/// Mint a session token for `account` carrying the given business expiry.
pub fn issue(
    state: &AppStateInner,
    account: &AccountRow,
    expires: DateTime<Utc>,
) -> Result<SignedIn, ActionError> {
    let user = account_view(account);
    let claims = SessionClaims {
        user: SessionUser {
            id: account.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
        },
        expires,
    };

    let token = state.sessions.encode(&claims)?;
    Ok(SignedIn {
        token,
        expires,
        user,
    })
}

pub fn session_cookie(signed_in: &SignedIn, secure: bool) -> Cookie<'static> {
    let expires = OffsetDateTime::from_unix_timestamp(signed_in.expires.timestamp())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    Cookie::build((SESSION_COOKIE, signed_in.token.clone()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .expires(expires)
        .build()
}

/// Empty, already-expired cookie that makes the client drop its token.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}
