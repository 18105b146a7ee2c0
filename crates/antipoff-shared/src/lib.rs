//! # antipoff-shared
//!
//! Types shared by the Antipoff store and server crates: validated domain
//! values, wire DTOs, password hashing and session token signing.

pub mod constants;
pub mod dto;
pub mod error;
pub mod password;
pub mod token;
pub mod types;

pub use error::{PasswordError, TokenError, ValidationError};
pub use types::{CadastralNumber, Email};
