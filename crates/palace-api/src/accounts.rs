//! Account lifecycle: signup with emailed verification code, login,
//! password reset, profile edits, and favorites.
//!
//! Identity for authenticated operations comes only from the validated
//! session token, never from request fields.

use std::sync::OnceLock;

use anyhow::Context;
use chrono::{Duration, Utc};
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use palace_crypto::codes::{generate_otp, generate_reset_token, hash_token};
use palace_crypto::password::{hash_password, verify_password};
use palace_db::models::{PasswordResetRow, PendingVerificationRow};
use palace_notify::Notice;
use palace_types::api::{SignupRequest, UpdateProfileRequest};
use palace_types::models::{DEFAULT_AVATAR_URL, FavoriteAction};

use crate::session::{self, SignedIn};
use crate::{ActionError, AppStateInner};

const CODE_TTL_MINUTES: i64 = 10;
const RESET_TTL_MINUTES: i64 = 60;
const MIN_PASSWORD_LEN: usize = 8;

/// Start a signup: stash the hashed credentials under a fresh code and
/// email the code. Re-requesting replaces any earlier pending signup.
pub async fn request_signup(state: &AppStateInner, req: &SignupRequest) -> Result<(), ActionError> {
    validate_name(&req.name)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    if state.db.get_account_by_email(&req.email)?.is_some() {
        return Err(ActionError::AccountExists);
    }

    let code = generate_otp();
    let password_hash = hash_password(&req.password)?;

    state.db.upsert_pending_verification(&PendingVerificationRow {
        email: req.email.clone(),
        code: code.clone(),
        expires_at: code_expiry(),
        name: req.name.clone(),
        password_hash,
    })?;

    let notice = Notice::VerificationCode {
        to: req.email.clone(),
        name: req.name.clone(),
        code,
    };
    state.notifier.send(&notice).await.map_err(|e| {
        error!("Verification email to {} failed: {:#}", req.email, e);
        ActionError::NotificationFailed("Failed to send verification email. Please try again.")
    })?;

    info!("Signup code issued for {}", req.email);
    Ok(())
}

/// Issue a new code for an outstanding signup. The previous code stops
/// working immediately.
pub async fn resend_signup_code(state: &AppStateInner, email: &str) -> Result<(), ActionError> {
    let pending = state
        .db
        .get_pending_verification(email)?
        .ok_or(ActionError::NoPendingVerification)?;

    let code = generate_otp();
    if !state.db.refresh_pending_code(email, &code, code_expiry())? {
        return Err(ActionError::NoPendingVerification);
    }

    let notice = Notice::VerificationCode {
        to: email.to_string(),
        name: pending.name,
        code,
    };
    state.notifier.send(&notice).await.map_err(|e| {
        error!("Verification email resend to {} failed: {:#}", email, e);
        ActionError::NotificationFailed("Failed to resend email")
    })?;

    info!("Signup code re-issued for {}", email);
    Ok(())
}

/// Complete a signup. On success the account exists, the pending record
/// is gone, and a 24-hour session is returned.
pub async fn verify_signup(
    state: &AppStateInner,
    email: &str,
    code: &str,
) -> Result<SignedIn, ActionError> {
    let pending = state
        .db
        .find_pending_verification(email, code)?
        .ok_or(ActionError::InvalidCode)?;

    // Expired records stay so the user can ask for a resend.
    if Utc::now().timestamp() > pending.expires_at {
        warn!("Expired signup code presented for {}", email);
        return Err(ActionError::CodeExpired);
    }

    let account = state
        .db
        .create_account(
            &Uuid::new_v4().to_string(),
            &pending.name,
            &pending.email,
            &pending.password_hash,
            Some(DEFAULT_AVATAR_URL),
        )?
        .ok_or(ActionError::AccountExists)?;

    state.db.delete_pending_verification(email)?;

    info!("Account created for {}", account.email);
    session::issue(state, &account, session::new_session_expiry())
}

/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(state: &AppStateInner, email: &str, password: &str) -> Result<SignedIn, ActionError> {
    let Some(account) = state.db.get_account_by_email(email)? else {
        // Burn comparable time so response latency does not reveal the miss.
        if let Some(hash) = dummy_hash() {
            let _ = verify_password(password, hash);
        }
        return Err(ActionError::InvalidCredentials);
    };

    if !verify_password(password, &account.password_hash) {
        warn!("Failed login for {}", email);
        return Err(ActionError::InvalidCredentials);
    }

    info!("Login for {}", email);
    session::issue(state, &account, session::new_session_expiry())
}

/// Email a single-use reset link. A new request replaces the previous
/// token. A failed send still leaves the new token valid.
pub async fn request_password_reset(state: &AppStateInner, email: &str) -> Result<(), ActionError> {
    let account = state
        .db
        .get_account_by_email(email)?
        .ok_or(ActionError::AccountNotFound)?;

    let token = generate_reset_token();
    state.db.upsert_password_reset(&PasswordResetRow {
        email: email.to_string(),
        token_hash: hash_token(&token),
        expires_at: (Utc::now() + Duration::minutes(RESET_TTL_MINUTES)).timestamp(),
    })?;

    let notice = Notice::PasswordReset {
        to: email.to_string(),
        name: account.name,
        link: reset_link(&state.base_url, &token, email).context("invalid base URL")?,
    };
    state.notifier.send(&notice).await.map_err(|e| {
        error!("Reset email to {} failed: {:#}", email, e);
        ActionError::NotificationFailed("Failed to send reset email")
    })?;

    info!("Password reset issued for {}", email);
    Ok(())
}

/// Existing sessions are not revoked by a reset.
pub async fn reset_password(
    state: &AppStateInner,
    email: &str,
    token: &str,
    new_password: &str,
) -> Result<(), ActionError> {
    validate_password(new_password)?;

    let token_hash = hash_token(token);
    let reset = state
        .db
        .find_password_reset(email, &token_hash)?
        .ok_or(ActionError::InvalidOrExpiredToken)?;

    if Utc::now().timestamp() > reset.expires_at {
        warn!("Expired reset token presented for {}", email);
        return Err(ActionError::InvalidOrExpiredToken);
    }

    let password_hash = hash_password(new_password)?;
    if !state.db.update_password(email, &password_hash)? {
        return Err(ActionError::AccountNotFound);
    }
    state.db.delete_password_reset(email, &token_hash)?;

    info!("Password reset completed for {}", email);
    Ok(())
}

/// Apply the provided fields and re-mint the session. The new token keeps
/// the old payload expiry.
pub async fn update_profile(
    state: &AppStateInner,
    token: Option<&str>,
    req: &UpdateProfileRequest,
) -> Result<SignedIn, ActionError> {
    let claims = session::authenticate(state, token)?;

    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let avatar = req.avatar.as_deref().map(str::trim).filter(|a| !a.is_empty());

    let account = state
        .db
        .update_profile(&claims.user.email, name, avatar)?
        .ok_or(ActionError::AccountNotFound)?;

    info!("Profile updated for {}", account.email);
    session::issue(state, &account, claims.expires)
}

/// Flip membership of `room_id` in the caller's favorites.
pub async fn toggle_favorite(
    state: &AppStateInner,
    token: Option<&str>,
    room_id: i64,
) -> Result<FavoriteAction, ActionError> {
    let claims = session::authenticate(state, token)?;
    let account = state
        .db
        .get_account_by_email(&claims.user.email)?
        .ok_or(ActionError::AccountNotFound)?;

    let added = state.db.toggle_favorite(&account.id, room_id)?;
    Ok(if added {
        FavoriteAction::Added
    } else {
        FavoriteAction::Removed
    })
}

/// Lenient read: any failure yields an empty list.
pub async fn get_favorites(state: &AppStateInner, token: Option<&str>) -> Vec<i64> {
    let lookup = || -> Result<Vec<i64>, ActionError> {
        let claims = session::authenticate(state, token)?;
        match state.db.get_account_by_email(&claims.user.email)? {
            Some(account) => Ok(state.db.get_favorites(&account.id)?),
            None => Ok(Vec::new()),
        }
    };

    lookup().unwrap_or_else(|e| {
        if let ActionError::OperationFailed(cause) = &e {
            error!("Favorites lookup failed: {:#}", cause);
        }
        Vec::new()
    })
}

fn code_expiry() -> i64 {
    (Utc::now() + Duration::minutes(CODE_TTL_MINUTES)).timestamp()
}

fn dummy_hash() -> Option<&'static str> {
    static HASH: OnceLock<Option<String>> = OnceLock::new();
    HASH.get_or_init(|| hash_password("palace-timing-equalizer").ok())
        .as_deref()
}

fn reset_link(base_url: &str, token: &str, email: &str) -> Result<String, url::ParseError> {
    let url = Url::parse_with_params(
        &format!("{}/reset-password", base_url.trim_end_matches('/')),
        &[("token", token), ("email", email)],
    )?;
    Ok(url.into())
}

fn validate_name(name: &str) -> Result<(), ActionError> {
    if name.trim().is_empty() {
        return Err(ActionError::InvalidInput("Name is required".to_string()));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ActionError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(ActionError::InvalidInput("Invalid email address".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ActionError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ActionError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use palace_notify::outbox::MemoryOutbox;

    use crate::testing::{self, signup_request};

    fn pending_count(state: &AppStateInner) -> i64 {
        state
            .db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM pending_verifications", [], |r| r.get(0))?)
            })
            .unwrap()
    }

    fn account_count(state: &AppStateInner) -> i64 {
        state
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))?))
            .unwrap()
    }

    fn expire(state: &AppStateInner, table: &str, email: &str) {
        let sql = format!("UPDATE {} SET expires_at = ?1 WHERE email = ?2", table);
        let past = Utc::now().timestamp() - 1;
        state
            .db
            .with_conn(|conn| {
                conn.execute(&sql, (past, email))?;
                Ok(())
            })
            .unwrap();
    }

    fn token_from_link(link: &str) -> String {
        link.split("token=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap()
            .to_string()
    }

    async fn signup_pending(state: &AppStateInner, outbox: &MemoryOutbox, email: &str) -> String {
        request_signup(state, &signup_request("Ama", email, "Secret123!"))
            .await
            .unwrap();
        outbox.last_code(email).unwrap()
    }

    #[tokio::test]
    async fn signup_then_verify_creates_exactly_one_account() {
        let (state, outbox) = testing::state();
        let code = signup_pending(&state, &outbox, "ama@x.com").await;
        assert_eq!(pending_count(&state), 1);

        let signed_in = verify_signup(&state, "ama@x.com", &code).await.unwrap();
        assert_eq!(account_count(&state), 1);
        assert_eq!(pending_count(&state), 0);

        assert_eq!(signed_in.user.name, "Ama");
        assert_eq!(signed_in.user.email, "ama@x.com");
        assert_eq!(signed_in.user.avatar, DEFAULT_AVATAR_URL);

        let claims = session::authenticate(&state, Some(&signed_in.token)).unwrap();
        let lifetime = claims.expires - Utc::now();
        assert!(lifetime > Duration::hours(23) && lifetime <= Duration::hours(24));

        let stored = state.db.get_account_by_email("ama@x.com").unwrap().unwrap();
        assert_ne!(stored.password_hash, "Secret123!");
        assert!(verify_password("Secret123!", &stored.password_hash));
    }

    #[tokio::test]
    async fn wrong_code_leaves_pending_record_for_retry() {
        let (state, outbox) = testing::state();
        let code = signup_pending(&state, &outbox, "ama@x.com").await;
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for _ in 0..2 {
            let err = verify_signup(&state, "ama@x.com", wrong).await.unwrap_err();
            assert!(matches!(err, ActionError::InvalidCode));
        }
        assert_eq!(pending_count(&state), 1);
        assert!(verify_signup(&state, "ama@x.com", &code).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_email_is_an_invalid_code() {
        let (state, _) = testing::state();
        let err = verify_signup(&state, "ghost@x.com", "123456").await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidCode));
    }

    #[tokio::test]
    async fn expired_code_is_rejected_but_kept() {
        let (state, outbox) = testing::state();
        let code = signup_pending(&state, &outbox, "ama@x.com").await;
        expire(&state, "pending_verifications", "ama@x.com");

        let err = verify_signup(&state, "ama@x.com", &code).await.unwrap_err();
        assert!(matches!(err, ActionError::CodeExpired));
        assert_eq!(pending_count(&state), 1);
        assert_eq!(account_count(&state), 0);

        resend_signup_code(&state, "ama@x.com").await.unwrap();
        let fresh = outbox.last_code("ama@x.com").unwrap();
        assert!(verify_signup(&state, "ama@x.com", &fresh).await.is_ok());
    }

    #[tokio::test]
    async fn resend_invalidates_previous_code() {
        let (state, outbox) = testing::state();
        let first = signup_pending(&state, &outbox, "ama@x.com").await;

        // Codes are random; retry until the new one differs.
        let mut second = first.clone();
        while second == first {
            resend_signup_code(&state, "ama@x.com").await.unwrap();
            second = outbox.last_code("ama@x.com").unwrap();
        }

        let err = verify_signup(&state, "ama@x.com", &first).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidCode));
        assert!(verify_signup(&state, "ama@x.com", &second).await.is_ok());
    }

    #[tokio::test]
    async fn resend_without_pending_signup_fails() {
        let (state, outbox) = testing::state();
        let err = resend_signup_code(&state, "ama@x.com").await.unwrap_err();
        assert!(matches!(err, ActionError::NoPendingVerification));
        assert!(outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn signup_for_existing_account_does_nothing() {
        let (state, outbox) = testing::state();
        testing::signed_in(&state, &outbox, "ama@x.com").await;
        let sent_before = outbox.sent().len();

        let err = request_signup(&state, &signup_request("Other", "ama@x.com", "Another123!"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::AccountExists));
        assert_eq!(outbox.sent().len(), sent_before);
        assert_eq!(pending_count(&state), 0);
    }

    #[tokio::test]
    async fn concurrent_commit_for_same_email_is_a_conflict() {
        let (state, outbox) = testing::state();
        let code = signup_pending(&state, &outbox, "ama@x.com").await;

        // Another signup for the same email commits first.
        state
            .db
            .create_account("other", "Racer", "ama@x.com", "hash", None)
            .unwrap()
            .unwrap();

        let err = verify_signup(&state, "ama@x.com", &code).await.unwrap_err();
        assert!(matches!(err, ActionError::AccountExists));
        assert_eq!(account_count(&state), 1);
    }

    #[tokio::test]
    async fn failed_delivery_fails_request_but_keeps_pending_record() {
        let (state, outbox) = testing::state();
        outbox.set_failing(true);

        let err = request_signup(&state, &signup_request("Ama", "ama@x.com", "Secret123!"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotificationFailed(_)));
        assert_eq!(pending_count(&state), 1);

        outbox.set_failing(false);
        resend_signup_code(&state, "ama@x.com").await.unwrap();
        let code = outbox.last_code("ama@x.com").unwrap();
        assert!(verify_signup(&state, "ama@x.com", &code).await.is_ok());
    }

    #[tokio::test]
    async fn signup_input_is_validated() {
        let (state, _) = testing::state();
        for req in [
            signup_request("", "ama@x.com", "Secret123!"),
            signup_request("Ama", "not-an-email", "Secret123!"),
            signup_request("Ama", "ama@x.com", "short"),
        ] {
            let err = request_signup(&state, &req).await.unwrap_err();
            assert!(matches!(err, ActionError::InvalidInput(_)));
        }
        assert_eq!(pending_count(&state), 0);
    }

    #[tokio::test]
    async fn login_does_not_reveal_which_part_was_wrong() {
        let (state, outbox) = testing::state();
        testing::signed_in(&state, &outbox, "ama@x.com").await;

        let wrong_password = login(&state, "ama@x.com", "Wrong123!").await.unwrap_err();
        let unknown_email = login(&state, "ghost@x.com", "Secret123!").await.unwrap_err();

        assert!(matches!(wrong_password, ActionError::InvalidCredentials));
        assert!(matches!(unknown_email, ActionError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.status(), unknown_email.status());

        let signed_in = login(&state, "ama@x.com", "Secret123!").await.unwrap();
        assert_eq!(signed_in.user.email, "ama@x.com");
    }

    #[tokio::test]
    async fn password_reset_round_trip_is_single_use() {
        let (state, outbox) = testing::state();
        testing::signed_in(&state, &outbox, "ama@x.com").await;

        request_password_reset(&state, "ama@x.com").await.unwrap();
        let link = outbox.last_reset_link("ama@x.com").unwrap();
        assert!(link.starts_with("http://localhost:3000/reset-password?token="));
        assert!(link.ends_with("&email=ama%40x.com"));
        let token = token_from_link(&link);

        reset_password(&state, "ama@x.com", &token, "NewSecret456!").await.unwrap();
        assert!(login(&state, "ama@x.com", "NewSecret456!").await.is_ok());
        assert!(matches!(
            login(&state, "ama@x.com", "Secret123!").await,
            Err(ActionError::InvalidCredentials)
        ));

        let again = reset_password(&state, "ama@x.com", &token, "Third789!").await.unwrap_err();
        assert!(matches!(again, ActionError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn reset_rejects_expired_or_superseded_tokens() {
        let (state, outbox) = testing::state();
        testing::signed_in(&state, &outbox, "ama@x.com").await;

        request_password_reset(&state, "ama@x.com").await.unwrap();
        let first = token_from_link(&outbox.last_reset_link("ama@x.com").unwrap());
        request_password_reset(&state, "ama@x.com").await.unwrap();
        let second = token_from_link(&outbox.last_reset_link("ama@x.com").unwrap());

        let superseded = reset_password(&state, "ama@x.com", &first, "NewSecret456!").await;
        assert!(matches!(superseded, Err(ActionError::InvalidOrExpiredToken)));

        expire(&state, "password_resets", "ama@x.com");
        let expired = reset_password(&state, "ama@x.com", &second, "NewSecret456!").await;
        assert!(matches!(expired, Err(ActionError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn reset_for_unknown_email_fails() {
        let (state, outbox) = testing::state();
        let err = request_password_reset(&state, "ghost@x.com").await.unwrap_err();
        assert!(matches!(err, ActionError::AccountNotFound));
        assert!(outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn reset_token_survives_failed_delivery() {
        let (state, outbox) = testing::state();
        testing::signed_in(&state, &outbox, "ama@x.com").await;
        outbox.set_failing(true);

        let err = request_password_reset(&state, "ama@x.com").await.unwrap_err();
        assert!(matches!(err, ActionError::NotificationFailed(_)));

        let rows: i64 = state
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM password_resets", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn profile_update_is_partial_and_keeps_session_expiry() {
        let (state, outbox) = testing::state();
        let original = testing::signed_in(&state, &outbox, "ama@x.com").await;

        let req = UpdateProfileRequest {
            name: Some("Ama Mensah".to_string()),
            avatar: None,
        };
        let refreshed = update_profile(&state, Some(&original.token), &req).await.unwrap();
        assert_eq!(refreshed.user.name, "Ama Mensah");
        assert_eq!(refreshed.user.avatar, DEFAULT_AVATAR_URL);
        assert_eq!(refreshed.expires.timestamp(), original.expires.timestamp());

        let claims = session::authenticate(&state, Some(&refreshed.token)).unwrap();
        assert_eq!(claims.user.name, "Ama Mensah");

        // The old token still decodes with the old name.
        let stale = session::authenticate(&state, Some(&original.token)).unwrap();
        assert_eq!(stale.user.name, "Ama");

        let avatar_only = UpdateProfileRequest {
            name: Some("   ".to_string()),
            avatar: Some("https://cdn.example/ama.jpg".to_string()),
        };
        let updated = update_profile(&state, Some(&refreshed.token), &avatar_only).await.unwrap();
        assert_eq!(updated.user.name, "Ama Mensah");
        assert_eq!(updated.user.avatar, "https://cdn.example/ama.jpg");
    }

    #[tokio::test]
    async fn profile_update_requires_a_session_for_a_live_account() {
        let (state, outbox) = testing::state();
        let req = UpdateProfileRequest::default();
        assert!(matches!(
            update_profile(&state, None, &req).await,
            Err(ActionError::Unauthenticated)
        ));
        assert!(matches!(
            update_profile(&state, Some("junk"), &req).await,
            Err(ActionError::InvalidSession)
        ));

        let signed_in = testing::signed_in(&state, &outbox, "ama@x.com").await;
        state
            .db
            .with_conn(|conn| {
                conn.execute("DELETE FROM accounts WHERE email = 'ama@x.com'", [])?;
                Ok(())
            })
            .unwrap();
        assert!(matches!(
            update_profile(&state, Some(&signed_in.token), &req).await,
            Err(ActionError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn favorite_toggle_alternates() {
        let (state, outbox) = testing::state();
        let signed_in = testing::signed_in(&state, &outbox, "ama@x.com").await;
        let token = Some(signed_in.token.as_str());

        assert_eq!(toggle_favorite(&state, token, 1).await.unwrap(), FavoriteAction::Added);
        assert_eq!(get_favorites(&state, token).await, vec![1]);
        assert_eq!(toggle_favorite(&state, token, 1).await.unwrap(), FavoriteAction::Removed);
        assert!(get_favorites(&state, token).await.is_empty());
        assert_eq!(toggle_favorite(&state, token, 1).await.unwrap(), FavoriteAction::Added);
    }

    #[tokio::test]
    async fn favorites_read_is_lenient() {
        let (state, _) = testing::state();
        assert!(get_favorites(&state, None).await.is_empty());
        assert!(get_favorites(&state, Some("junk")).await.is_empty());
        assert!(matches!(
            toggle_favorite(&state, None, 1).await,
            Err(ActionError::Unauthenticated)
        ));
    }

    #[test]
    fn reset_link_encodes_query_values() {
        assert_eq!(
            reset_link("http://palace.test/", "abc", "a@b.c").unwrap(),
            "http://palace.test/reset-password?token=abc&email=a%40b.c"
        );

        let link = Url::parse(&reset_link("http://localhost:3000", "f00d", "ama+test@x.com").unwrap()).unwrap();
        let query: Vec<(String, String)> = link.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            vec![
                ("token".to_string(), "f00d".to_string()),
                ("email".to_string(), "ama+test@x.com".to_string()),
            ]
        );
        assert!(link.as_str().contains("email=ama%2Btest%40x.com"));

        assert!(reset_link("not a url", "abc", "a@b.c").is_err());
    }
}
