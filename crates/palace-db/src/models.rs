/// Database row types. These map directly to SQLite rows and stay distinct
/// from the palace-types wire models; conversions live here.
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use palace_types::models::{Booking, BookingStatus, Room};

pub struct AccountRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

pub struct PendingVerificationRow {
    pub email: String,
    pub code: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub name: String,
    pub password_hash: String,
}

pub struct PasswordResetRow {
    pub email: String,
    pub token_hash: String,
    /// Unix seconds.
    pub expires_at: i64,
}

pub struct RoomRow {
    pub id: i64,
    pub name: String,
    pub nightly_rate: f64,
    pub max_guests: i64,
}

pub struct BookingRow {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub room_id: i64,
    pub room_name: String,
    pub check_in: String,
    pub check_out: String,
    pub guests: i64,
    pub total_price: f64,
    pub payment_method: String,
    pub message: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            id: row.id,
            name: row.name,
            nightly_rate: row.nightly_rate,
            max_guests: row.max_guests.max(0) as u32,
        }
    }
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id.parse().unwrap_or_else(|e| {
                warn!("Corrupt booking id '{}': {}", row.id, e);
                Uuid::default()
            }),
            status: BookingStatus::parse(&row.status).unwrap_or_else(|| {
                warn!("Unknown status '{}' on booking '{}'", row.status, row.id);
                BookingStatus::Confirmed
            }),
            created_at: parse_timestamp(&row.created_at).unwrap_or_else(|| {
                warn!("Corrupt created_at '{}' on booking '{}'", row.created_at, row.id);
                DateTime::<Utc>::default()
            }),
            user_id: row.user_id,
            user_email: row.user_email,
            user_name: row.user_name,
            room_id: row.room_id,
            room_name: row.room_name,
            check_in: row.check_in,
            check_out: row.check_out,
            guests: row.guests.max(0) as u32,
            total_price: row.total_price,
            payment_method: row.payment_method,
            message: row.message,
        }
    }
}

/// Accepts RFC 3339 as written by this crate, and SQLite's
/// `datetime('now')` format as naive UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}
