use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (accounts, verification, bookings)");
        conn.execute_batch(
            "
            CREATE TABLE accounts (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                avatar_url      TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE favorites (
                account_id  TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                room_id     INTEGER NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (account_id, room_id)
            );

            -- One outstanding signup per email; re-issuing overwrites the row.
            CREATE TABLE pending_verifications (
                email           TEXT PRIMARY KEY,
                code            TEXT NOT NULL,
                expires_at      INTEGER NOT NULL,
                name            TEXT NOT NULL,
                password_hash   TEXT NOT NULL
            );

            CREATE TABLE password_resets (
                email       TEXT PRIMARY KEY,
                token_hash  TEXT NOT NULL,
                expires_at  INTEGER NOT NULL
            );

            CREATE TABLE rooms (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL,
                nightly_rate    REAL NOT NULL,
                max_guests      INTEGER NOT NULL
            );

            CREATE TABLE bookings (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                user_email      TEXT NOT NULL,
                user_name       TEXT NOT NULL,
                room_id         INTEGER NOT NULL REFERENCES rooms(id),
                room_name       TEXT NOT NULL,
                check_in        TEXT NOT NULL,
                check_out       TEXT NOT NULL,
                guests          INTEGER NOT NULL,
                total_price     REAL NOT NULL,
                payment_method  TEXT NOT NULL,
                message         TEXT,
                status          TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_bookings_user_email ON bookings(user_email, created_at);
            CREATE INDEX idx_bookings_room ON bookings(room_id, check_in);

            -- Seed the room catalog
            INSERT INTO rooms (id, name, nightly_rate, max_guests) VALUES
                (1, 'Deluxe Suite', 500, 2),
                (2, 'Super Deluxe Room', 600, 4);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
