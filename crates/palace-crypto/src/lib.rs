//! Palace crypto helpers
//!
//! Password hashing (Argon2id), one-time codes and reset tokens, and the
//! signed session codec (HS256 JWT).

pub mod codes;
pub mod password;
pub mod session;

pub use session::{SESSION_TTL_HOURS, SessionCodec, SessionError};
