use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::AppState;
use crate::session::{authenticate, token_from_headers};

const PROTECTED_PREFIXES: &[&str] = &["/profile"];
const GUEST_ONLY_PREFIXES: &[&str] = &["/login", "/signup", "/forgot-password", "/reset-password"];

pub const SIGN_IN_PATH: &str = "/login";
pub const LANDING_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Protected,
    GuestOnly,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Redirect(&'static str),
}

/// Static classification by path prefix. The JSON API is never guarded
/// here; its handlers authenticate on their own.
pub fn classify(path: &str) -> RouteClass {
    if path == "/api" || path.starts_with("/api/") {
        return RouteClass::Public;
    }
    if PROTECTED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        RouteClass::Protected
    } else if GUEST_ONLY_PREFIXES.iter().any(|p| path.starts_with(p)) {
        RouteClass::GuestOnly
    } else {
        RouteClass::Public
    }
}

pub fn evaluate(class: RouteClass, has_session: bool) -> Verdict {
    match (class, has_session) {
        (RouteClass::Protected, false) => Verdict::Redirect(SIGN_IN_PATH),
        (RouteClass::GuestOnly, true) => Verdict::Redirect(LANDING_PATH),
        _ => Verdict::Continue,
    }
}

/// Route guard for page requests. A malformed or expired session counts
/// as no session.
pub async fn boundary_policy(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let class = classify(&path);
    if class == RouteClass::Public {
        return next.run(req).await;
    }

    let has_session = token_from_headers(req.headers())
        .is_some_and(|token| authenticate(&state, Some(&token)).is_ok());

    match evaluate(class, has_session) {
        Verdict::Continue => next.run(req).await,
        Verdict::Redirect(to) => {
            debug!("Boundary redirect {} -> {}", path, to);
            Redirect::temporary(to).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_by_prefix() {
        assert_eq!(classify("/profile"), RouteClass::Protected);
        assert_eq!(classify("/profile/bookings"), RouteClass::Protected);
        assert_eq!(classify("/login"), RouteClass::GuestOnly);
        assert_eq!(classify("/reset-password"), RouteClass::GuestOnly);
        assert_eq!(classify("/signup/verify"), RouteClass::GuestOnly);
        assert_eq!(classify("/"), RouteClass::Public);
        assert_eq!(classify("/rooms"), RouteClass::Public);
        assert_eq!(classify("/api/profile"), RouteClass::Public);
        assert_eq!(classify("/api/auth/login"), RouteClass::Public);
    }

    #[test]
    fn verdicts() {
        assert_eq!(evaluate(RouteClass::Protected, false), Verdict::Redirect("/login"));
        assert_eq!(evaluate(RouteClass::Protected, true), Verdict::Continue);
        assert_eq!(evaluate(RouteClass::GuestOnly, true), Verdict::Redirect("/"));
        assert_eq!(evaluate(RouteClass::GuestOnly, false), Verdict::Continue);
        assert_eq!(evaluate(RouteClass::Public, false), Verdict::Continue);
        assert_eq!(evaluate(RouteClass::Public, true), Verdict::Continue);
    }
}
