use crate::Database;
use crate::models::{AccountRow, BookingRow, PasswordResetRow, PendingVerificationRow, RoomRow};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row};

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, avatar_url, created_at";
const BOOKING_COLUMNS: &str = "id, user_id, user_email, user_name, room_id, room_name, check_in, \
     check_out, guests, total_price, payment_method, message, status, created_at";

/// Outcome of [`Database::insert_booking`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingInsert {
    Inserted,
    /// The room already has a confirmed booking overlapping the requested stay.
    Overlap,
}

impl Database {
    // -- Accounts --

    /// Insert a new account. Returns `None` when the email is already taken;
    /// the UNIQUE constraint is the authority, not any earlier lookup.
    pub fn create_account(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        avatar_url: Option<&str>,
    ) -> Result<Option<AccountRow>> {
        let created_at = now_rfc3339();
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO accounts (id, name, email, password_hash, avatar_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, name, email, password_hash, avatar_url, created_at],
            );

            match inserted {
                Ok(_) => Ok(Some(AccountRow {
                    id: id.to_string(),
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash: password_hash.to_string(),
                    avatar_url: avatar_url.map(str::to_string),
                    created_at,
                })),
                Err(e) if is_unique_violation(&e) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_account_by_email(&self, email: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account_by_email(conn, email))
    }

    /// Returns false when no account matched.
    pub fn update_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE accounts SET password_hash = ?1 WHERE email = ?2",
                (password_hash, email),
            )?;
            Ok(changed > 0)
        })
    }

    /// Partial profile update: `None` fields are left untouched.
    /// Returns the updated row, or `None` if the account does not exist.
    pub fn update_profile(
        &self,
        email: &str,
        name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE accounts
                 SET name = COALESCE(?1, name), avatar_url = COALESCE(?2, avatar_url)
                 WHERE email = ?3",
                rusqlite::params![name, avatar_url, email],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_account_by_email(conn, email)
        })
    }

    // -- Favorites --

    /// Toggle a favorite: removes if present, inserts if not.
    /// Returns true when the room was added.
    pub fn toggle_favorite(&self, account_id: &str, room_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM favorites WHERE account_id = ?1 AND room_id = ?2",
                rusqlite::params![account_id, room_id],
            )?;
            if removed > 0 {
                return Ok(false);
            }

            conn.execute(
                "INSERT INTO favorites (account_id, room_id) VALUES (?1, ?2)",
                rusqlite::params![account_id, room_id],
            )?;
            Ok(true)
        })
    }

    pub fn get_favorites(&self, account_id: &str) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT room_id FROM favorites WHERE account_id = ?1 ORDER BY room_id",
            )?;
            let ids = stmt
                .query_map([account_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }

    // -- Pending verifications --

    /// Insert or replace the pending signup for `row.email`.
    pub fn upsert_pending_verification(&self, row: &PendingVerificationRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pending_verifications (email, code, expires_at, name, password_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO UPDATE SET
                    code = excluded.code,
                    expires_at = excluded.expires_at,
                    name = excluded.name,
                    password_hash = excluded.password_hash",
                rusqlite::params![row.email, row.code, row.expires_at, row.name, row.password_hash],
            )?;
            Ok(())
        })
    }

    pub fn get_pending_verification(&self, email: &str) -> Result<Option<PendingVerificationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT email, code, expires_at, name, password_hash
                 FROM pending_verifications WHERE email = ?1",
                [email],
                pending_from_row,
            )
            .optional()
        })
    }

    /// Exact (email, code) lookup.
    pub fn find_pending_verification(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<PendingVerificationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT email, code, expires_at, name, password_hash
                 FROM pending_verifications WHERE email = ?1 AND code = ?2",
                [email, code],
                pending_from_row,
            )
            .optional()
        })
    }

    /// Replace the code and expiry of an existing pending signup, keeping
    /// the stored account payload. Returns false when there is none.
    pub fn refresh_pending_code(&self, email: &str, code: &str, expires_at: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE pending_verifications SET code = ?1, expires_at = ?2 WHERE email = ?3",
                rusqlite::params![code, expires_at, email],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_pending_verification(&self, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM pending_verifications WHERE email = ?1", [email])?;
            Ok(())
        })
    }

    // -- Password resets --

    pub fn upsert_password_reset(&self, row: &PasswordResetRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO password_resets (email, token_hash, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET
                    token_hash = excluded.token_hash,
                    expires_at = excluded.expires_at",
                rusqlite::params![row.email, row.token_hash, row.expires_at],
            )?;
            Ok(())
        })
    }

    pub fn find_password_reset(
        &self,
        email: &str,
        token_hash: &str,
    ) -> Result<Option<PasswordResetRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT email, token_hash, expires_at FROM password_resets
                 WHERE email = ?1 AND token_hash = ?2",
                [email, token_hash],
                |row| {
                    Ok(PasswordResetRow {
                        email: row.get(0)?,
                        token_hash: row.get(1)?,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_password_reset(&self, email: &str, token_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM password_resets WHERE email = ?1 AND token_hash = ?2",
                [email, token_hash],
            )?;
            Ok(())
        })
    }

    // -- Rooms --

    pub fn list_rooms(&self) -> Result<Vec<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, nightly_rate, max_guests FROM rooms ORDER BY id")?;
            let rows = stmt
                .query_map([], room_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_room(&self, id: i64) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, nightly_rate, max_guests FROM rooms WHERE id = ?1",
                [id],
                room_from_row,
            )
            .optional()
        })
    }

    // -- Bookings --

    /// Insert a confirmed booking unless the room already has a confirmed
    /// booking overlapping `[check_in, check_out)`. The check and the insert
    /// share one transaction under the connection lock.
    pub fn insert_booking(&self, booking: &BookingRow) -> Result<BookingInsert> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let overlapping: i64 = tx.query_row(
                "SELECT COUNT(*) FROM bookings
                 WHERE room_id = ?1 AND status = 'confirmed'
                   AND check_in < ?3 AND ?2 < check_out",
                rusqlite::params![booking.room_id, booking.check_in, booking.check_out],
                |row| row.get(0),
            )?;
            if overlapping > 0 {
                return Ok(BookingInsert::Overlap);
            }

            tx.execute(
                &format!(
                    "INSERT INTO bookings ({BOOKING_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                rusqlite::params![
                    booking.id,
                    booking.user_id,
                    booking.user_email,
                    booking.user_name,
                    booking.room_id,
                    booking.room_name,
                    booking.check_in,
                    booking.check_out,
                    booking.guests,
                    booking.total_price,
                    booking.payment_method,
                    booking.message,
                    booking.status,
                    booking.created_at,
                ],
            )?;
            tx.commit()?;
            Ok(BookingInsert::Inserted)
        })
    }

    /// All bookings made under `email`, newest first.
    pub fn list_bookings_for_email(&self, email: &str) -> Result<Vec<BookingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE user_email = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([email], booking_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Current time in the fixed-width RFC 3339 form used for `created_at`
/// columns, so lexical order matches chronological order.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn query_account_by_email(conn: &Connection, email: &str) -> Result<Option<AccountRow>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
        [email],
        |row| {
            Ok(AccountRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                avatar_url: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()
}

fn pending_from_row(row: &Row<'_>) -> rusqlite::Result<PendingVerificationRow> {
    Ok(PendingVerificationRow {
        email: row.get(0)?,
        code: row.get(1)?,
        expires_at: row.get(2)?,
        name: row.get(3)?,
        password_hash: row.get(4)?,
    })
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<RoomRow> {
    Ok(RoomRow {
        id: row.get(0)?,
        name: row.get(1)?,
        nightly_rate: row.get(2)?,
        max_guests: row.get(3)?,
    })
}

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<BookingRow> {
    Ok(BookingRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_email: row.get(2)?,
        user_name: row.get(3)?,
        room_id: row.get(4)?,
        room_name: row.get(5)?,
        check_in: row.get(6)?,
        check_out: row.get(7)?,
        guests: row.get(8)?,
        total_price: row.get(9)?,
        payment_method: row.get(10)?,
        message: row.get(11)?,
        status: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
