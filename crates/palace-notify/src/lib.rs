//! Outbound notifications: verification codes, reset links, and booking
//! confirmations.
//!
//! Callers depend on the [`Notifier`] trait only. The server picks
//! [`smtp::SmtpNotifier`] when SMTP is configured and [`LogNotifier`]
//! otherwise; tests use [`outbox::MemoryOutbox`].

pub mod outbox;
pub mod smtp;
mod templates;

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    VerificationCode {
        to: String,
        name: String,
        code: String,
    },
    PasswordReset {
        to: String,
        name: String,
        link: String,
    },
    BookingConfirmed(BookingConfirmation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfirmation {
    pub to: String,
    pub user_name: String,
    pub room_name: String,
    pub check_in: String,
    pub check_out: String,
    pub guests: u32,
    pub total_price: f64,
    pub booking_id: String,
    pub bookings_url: String,
}

impl Notice {
    pub fn recipient(&self) -> &str {
        match self {
            Notice::VerificationCode { to, .. } | Notice::PasswordReset { to, .. } => to,
            Notice::BookingConfirmed(details) => &details.to,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notice::VerificationCode { .. } => "verification_code",
            Notice::PasswordReset { .. } => "password_reset",
            Notice::BookingConfirmed(_) => "booking_confirmed",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &Notice) -> Result<()>;
}

/// Development sink used when SMTP is not configured: the rendered text
/// body goes to the log at debug level and delivery always succeeds.
pub struct LogNotifier {
    brand: String,
}

impl LogNotifier {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &Notice) -> Result<()> {
        let email = templates::render(notice, &self.brand);
        tracing::warn!(
            to = %notice.recipient(),
            kind = notice.kind(),
            "Email not configured, logging instead of sending"
        );
        tracing::debug!(subject = %email.subject, "{}", email.text);
        Ok(())
    }
}
