//! # antipoff-store
//!
//! SQLite persistence for the Antipoff backend.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection`, runs the embedded migrations on open, and a
//! generic [`Repository`] that turns typed filters into SQL for every
//! [`Entity`]: users, roles, queries and histories.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod repository;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use rusqlite::types::Value;
pub use rusqlite::Connection;
pub use repository::{Entity, Filter, ListQuery, Repository, SortOrder};
