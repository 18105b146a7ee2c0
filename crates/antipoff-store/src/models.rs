//! Domain model structs persisted in the SQLite database.
//!
//! Each table has a stored struct (read back with its id and timestamps) and
//! a `New*` struct carrying only the caller-supplied columns.

use antipoff_shared::{CadastralNumber, Email};
use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub create_ts: DateTime<Utc>,
    pub update_ts: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account. `password` holds the argon2 hash, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub email: String,
    pub is_active: bool,
    pub role_id: i64,
    pub create_ts: DateTime<Utc>,
    pub update_ts: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Already hashed.
    pub password: String,
    pub email: Email,
    pub is_active: bool,
    pub role_id: i64,
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// One inbound cadastral number lookup. Immutable once stored.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Query {
    pub id: i64,
    pub cadastral_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub create_ts: DateTime<Utc>,
    pub update_ts: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQuery {
    pub cadastral_number: CadastralNumber,
    pub latitude: f64,
    pub longitude: f64,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// The oracle's verdict for a query.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct History {
    pub id: i64,
    pub query_id: i64,
    pub history: bool,
    pub create_ts: DateTime<Utc>,
    pub update_ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewHistory {
    pub query_id: i64,
    pub history: bool,
}

/// A history row with its query eagerly attached.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryWithQuery {
    pub history: History,
    pub query: Query,
}
