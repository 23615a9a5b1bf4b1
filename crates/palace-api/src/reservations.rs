//! Booking creation and listing, keyed to the session's identity.

use chrono::NaiveDate;
use tracing::{error, info, warn};
use uuid::Uuid;

use palace_db::models::BookingRow;
use palace_db::queries::now_rfc3339;
use palace_db::BookingInsert;
use palace_notify::{BookingConfirmation, Notice};
use palace_types::api::CreateBookingRequest;
use palace_types::models::{Booking, BookingStatus, Room};

use crate::session;
use crate::{ActionError, AppStateInner};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Record a confirmed booking. The confirmation email is best-effort.
pub async fn create_booking(
    state: &AppStateInner,
    token: Option<&str>,
    req: &CreateBookingRequest,
) -> Result<Uuid, ActionError> {
    let claims = session::authenticate(state, token)?;

    let check_in = parse_date(&req.check_in, "check-in")?;
    let check_out = parse_date(&req.check_out, "check-out")?;
    if check_in >= check_out {
        return Err(invalid("Check-out must be after check-in"));
    }
    if req.guests == 0 {
        return Err(invalid("At least one guest is required"));
    }
    if !req.total_price.is_finite() || req.total_price < 0.0 {
        return Err(invalid("Total price must be a non-negative amount"));
    }
    let payment_method = req.payment_method.trim();
    if payment_method.is_empty() {
        return Err(invalid("Payment method is required"));
    }

    let room = state.db.get_room(req.room_id)?.ok_or(ActionError::UnknownRoom)?;
    if i64::from(req.guests) > room.max_guests {
        return Err(ActionError::InvalidBooking(format!(
            "{} accommodates at most {} guests",
            room.name, room.max_guests
        )));
    }

    let id = Uuid::new_v4();
    let row = BookingRow {
        id: id.to_string(),
        user_id: claims.user.id.clone(),
        user_email: claims.user.email.clone(),
        user_name: claims.user.name.clone(),
        room_id: room.id,
        room_name: room.name.clone(),
        check_in: check_in.format(DATE_FORMAT).to_string(),
        check_out: check_out.format(DATE_FORMAT).to_string(),
        guests: i64::from(req.guests),
        total_price: req.total_price,
        payment_method: payment_method.to_string(),
        message: req
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        status: BookingStatus::Confirmed.as_str().to_string(),
        created_at: now_rfc3339(),
    };

    if state.db.insert_booking(&row)? == BookingInsert::Overlap {
        warn!(
            "Room {} already booked between {} and {}",
            room.id, row.check_in, row.check_out
        );
        return Err(ActionError::RoomUnavailable);
    }

    info!("Booking {} confirmed for {} (room {})", id, row.user_email, room.id);

    let notice = Notice::BookingConfirmed(BookingConfirmation {
        to: row.user_email.clone(),
        user_name: row.user_name.clone(),
        room_name: row.room_name.clone(),
        check_in: row.check_in.clone(),
        check_out: row.check_out.clone(),
        guests: req.guests,
        total_price: row.total_price,
        booking_id: row.id.clone(),
        bookings_url: format!("{}/profile", state.base_url.trim_end_matches('/')),
    });
    if let Err(e) = state.notifier.send(&notice).await {
        error!("Booking confirmation email for {} failed: {:#}", id, e);
    }

    Ok(id)
}

/// Lenient read: a missing or invalid session, or a store failure, yields
/// an empty list.
pub async fn list_bookings(state: &AppStateInner, token: Option<&str>) -> Vec<Booking> {
    let Ok(claims) = session::authenticate(state, token) else {
        return Vec::new();
    };

    match state.db.list_bookings_for_email(&claims.user.email) {
        Ok(rows) => rows.into_iter().map(Booking::from).collect(),
        Err(e) => {
            error!("Failed to list bookings for {}: {:#}", claims.user.email, e);
            Vec::new()
        }
    }
}

pub async fn list_rooms(state: &AppStateInner) -> Result<Vec<Room>, ActionError> {
    let rooms = state.db.list_rooms()?;
    Ok(rooms.into_iter().map(Room::from).collect())
}

fn parse_date(raw: &str, label: &str) -> Result<NaiveDate, ActionError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ActionError::InvalidBooking(format!("Invalid {} date, expected YYYY-MM-DD", label)))
}

fn invalid(reason: &str) -> ActionError {
    ActionError::InvalidBooking(reason.to_string())
}
