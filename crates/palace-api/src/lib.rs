pub mod accounts;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod profile;
pub mod reservations;
pub mod routes;
pub mod session;

use std::sync::Arc;

use palace_crypto::SessionCodec;
use palace_db::Database;
use palace_notify::Notifier;

pub use error::ActionError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionCodec,
    pub notifier: Arc<dyn Notifier>,
    /// Public origin used in emailed links, without a trailing slash.
    pub base_url: String,
    /// Adds the `Secure` attribute to the session cookie.
    pub secure_cookies: bool,
}
