use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use palace_types::api::{SESSION_SCHEMA_VERSION, SessionClaims, SessionUser};
use palace_types::models::DEFAULT_AVATAR_URL;

/// Lifetime of the signature itself, independent of the payload `expires`.
pub const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session signature is invalid")]
    InvalidSignature,
    #[error("session has expired")]
    Expired,
}

#[derive(Serialize)]
struct OutgoingClaims<'a> {
    v: u8,
    user: &'a SessionUser,
    expires: i64,
    iat: i64,
    exp: i64,
}

/// Every payload shape this codec accepts. Older shapes are migrated into
/// [`SessionClaims`] on decode.
#[derive(Deserialize)]
#[serde(untagged)]
enum IncomingClaims {
    Current {
        v: u8,
        user: SessionUser,
        expires: i64,
    },
    /// `{ user: {...}, expires: "<RFC 3339>" }`
    Nested {
        user: LegacyUser,
        expires: DateTime<Utc>,
    },
    /// The user fields at the top level, no business expiry.
    Flat {
        id: String,
        name: String,
        email: String,
        avatar: Option<String>,
        exp: i64,
    },
}

#[derive(Deserialize)]
struct LegacyUser {
    id: String,
    name: String,
    email: String,
    avatar: Option<String>,
}

impl From<LegacyUser> for SessionUser {
    fn from(user: LegacyUser) -> Self {
        SessionUser {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar: user.avatar.unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
        }
    }
}

/// Stateless HS256 session codec.
#[derive(Clone)]
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign `claims`. The token's own `exp` is always issued-at + 24h,
    /// whatever the payload `expires` says.
    pub fn encode(&self, claims: &SessionClaims) -> Result<String> {
        self.encode_at(claims, Utc::now())
    }

    fn encode_at(&self, claims: &SessionClaims, issued_at: DateTime<Utc>) -> Result<String> {
        let outgoing = OutgoingClaims {
            v: SESSION_SCHEMA_VERSION,
            user: &claims.user,
            expires: claims.expires.timestamp(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &outgoing, &self.encoding)?;
        Ok(token)
    }

    /// Verify signature and signature expiry. The payload `expires` is NOT
    /// checked here; see [`SessionClaims::is_current`].
    pub fn decode(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let data = decode::<IncomingClaims>(token, &self.decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::InvalidSignature,
            },
        )?;

        match data.claims {
            IncomingClaims::Current { v, user, expires } => {
                if v != SESSION_SCHEMA_VERSION {
                    return Err(SessionError::InvalidSignature);
                }
                Ok(SessionClaims {
                    user,
                    expires: from_timestamp(expires)?,
                })
            }
            IncomingClaims::Nested { user, expires } => Ok(SessionClaims {
                user: user.into(),
                expires,
            }),
            IncomingClaims::Flat {
                id,
                name,
                email,
                avatar,
                exp,
            } => Ok(SessionClaims {
                user: LegacyUser {
                    id,
                    name,
                    email,
                    avatar,
                }
                .into(),
                expires: from_timestamp(exp)?,
            }),
        }
    }
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>, SessionError> {
    DateTime::from_timestamp(secs, 0).ok_or(SessionError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(expires: DateTime<Utc>) -> SessionClaims {
        SessionClaims {
            user: SessionUser {
                id: "6f2d".to_string(),
                name: "Ama".to_string(),
                email: "ama@x.com".to_string(),
                avatar: "/a.jpg".to_string(),
            },
            expires,
        }
    }

    fn sign_raw(secret: &str, payload: &serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            payload,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn encode_decode() {
        let codec = SessionCodec::new("test-secret");
        let expires = DateTime::from_timestamp(Utc::now().timestamp() + 3600, 0).unwrap();
        let original = claims(expires);

        let token = codec.encode(&original).unwrap();
        let decoded = codec.decode(&token).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = SessionCodec::new("key-one")
            .encode(&claims(Utc::now() + Duration::hours(1)))
            .unwrap();
        let result = SessionCodec::new("key-two").decode(&token);
        assert_eq!(result, Err(SessionError::InvalidSignature));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = SessionCodec::new("test-secret");
        let token = codec.encode(&claims(Utc::now() + Duration::hours(1))).unwrap();

        let forged = sign_raw(
            "other",
            &serde_json::json!({ "v": 2, "user": { "id": "x", "name": "Eve", "email": "eve@x.com", "avatar": "" }, "expires": 0, "exp": 0 }),
        );
        let forged_payload = forged.split('.').nth(1).unwrap().to_string();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1] = forged_payload;

        assert_eq!(codec.decode(&parts.join(".")), Err(SessionError::InvalidSignature));
        assert_eq!(codec.decode("garbage"), Err(SessionError::InvalidSignature));
    }

    #[test]
    fn signature_expiry_is_enforced() {
        let codec = SessionCodec::new("test-secret");
        let issued = Utc::now() - Duration::hours(SESSION_TTL_HOURS + 1);
        let token = codec
            .encode_at(&claims(Utc::now() + Duration::hours(1)), issued)
            .unwrap();
        assert_eq!(codec.decode(&token), Err(SessionError::Expired));
    }

    #[test]
    fn payload_expiry_is_left_to_the_caller() {
        let codec = SessionCodec::new("test-secret");
        let stale = claims(Utc::now() - Duration::hours(1));
        let token = codec.encode(&stale).unwrap();

        let decoded = codec.decode(&token).unwrap();
        assert!(!decoded.is_current(Utc::now()));
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = sign_raw(
            "test-secret",
            &serde_json::json!({
                "v": 9,
                "user": { "id": "1", "name": "Ama", "email": "ama@x.com", "avatar": "/a.jpg" },
                "expires": exp,
                "exp": exp,
            }),
        );
        let codec = SessionCodec::new("test-secret");
        assert_eq!(codec.decode(&token), Err(SessionError::InvalidSignature));
    }

    #[test]
    fn nested_legacy_shape_is_migrated() {
        let now = Utc::now();
        let token = sign_raw(
            "test-secret",
            &serde_json::json!({
                "user": { "id": "65b9f1", "name": "Ama", "email": "ama@x.com" },
                "expires": "2031-01-01T00:00:00.000Z",
                "iat": now.timestamp(),
                "exp": (now + Duration::hours(24)).timestamp(),
            }),
        );

        let decoded = SessionCodec::new("test-secret").decode(&token).unwrap();
        assert_eq!(decoded.user.id, "65b9f1");
        assert_eq!(decoded.user.avatar, DEFAULT_AVATAR_URL);
        assert_eq!(decoded.expires.to_rfc3339(), "2031-01-01T00:00:00+00:00");
    }

    #[test]
    fn flat_legacy_shape_is_migrated() {
        let exp = (Utc::now() + Duration::hours(2)).timestamp();
        let token = sign_raw(
            "test-secret",
            &serde_json::json!({
                "id": "65b9f1",
                "name": "Ama",
                "email": "ama@x.com",
                "avatar": "/custom.jpg",
                "exp": exp,
            }),
        );

        let decoded = SessionCodec::new("test-secret").decode(&token).unwrap();
        assert_eq!(decoded.user.email, "ama@x.com");
        assert_eq!(decoded.user.avatar, "/custom.jpg");
        assert_eq!(decoded.expires.timestamp(), exp);
    }
}
