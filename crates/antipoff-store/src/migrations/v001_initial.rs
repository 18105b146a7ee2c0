//! v001 -- Initial schema creation.
//!
//! Creates the four tables: `roles`, `users`, `queries` and `histories`.
//! Timestamps are RFC-3339 text written by SQLite itself, so callers never
//! supply them.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Roles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS roles (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL UNIQUE CHECK (length(name) <= 50),
    create_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    update_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    username   TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name  TEXT NOT NULL,
    password   TEXT NOT NULL,               -- argon2 PHC string
    email      TEXT NOT NULL UNIQUE,
    is_active  INTEGER NOT NULL DEFAULT 1,  -- boolean 0/1
    role_id    INTEGER NOT NULL DEFAULT 1,  -- FK -> roles(id)
    create_ts  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    update_ts  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),

    FOREIGN KEY (role_id) REFERENCES roles(id)
);

CREATE INDEX IF NOT EXISTS idx_users_role_id ON users(role_id);

-- ----------------------------------------------------------------
-- Queries
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS queries (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    cadastral_number TEXT NOT NULL CHECK (
        length(cadastral_number) BETWEEN 13 AND 14
        AND cadastral_number NOT GLOB '*[^0-9]*'
    ),
    latitude         REAL NOT NULL,
    longitude        REAL NOT NULL,
    create_ts        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    update_ts        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_queries_cadastral_number ON queries(cadastral_number);

-- ----------------------------------------------------------------
-- Histories (one oracle verdict per query)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS histories (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    query_id  INTEGER NOT NULL,             -- FK -> queries(id)
    history   INTEGER NOT NULL,             -- boolean 0/1
    create_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    update_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),

    FOREIGN KEY (query_id) REFERENCES queries(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_histories_query_id ON histories(query_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
