//! Request and response bodies exchanged over the HTTP API and with the
//! history oracle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_FIELD_LEN, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use crate::error::ValidationError;
use crate::types::{CadastralNumber, Email};

// ---------------------------------------------------------------------------
// Cadastral queries
// ---------------------------------------------------------------------------

/// Body of `POST /query`.
///
/// The cadastral number stays a plain string here so that a malformed value
/// surfaces as a validation error from the pipeline rather than a generic
/// JSON rejection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryCreate {
    pub cadastral_number: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl QueryCreate {
    pub fn cadastral_number(&self) -> Result<CadastralNumber, ValidationError> {
        CadastralNumber::parse(&self.cadastral_number)
    }
}

/// Outcome of one oracle check; also the response of `POST /query`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryVerdict {
    pub history: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub id: i64,
    pub cadastral_number: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "minute_timestamp")]
    pub create_ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    pub id: i64,
    pub query_id: i64,
    pub history: bool,
    #[serde(with = "minute_timestamp")]
    pub create_ts: DateTime<Utc>,
    pub query: QueryResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PingResponse {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegister {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl UserRegister {
    /// Check field lengths and password confirmation, returning the parsed
    /// email on success.
    pub fn validate(&self) -> Result<Email, ValidationError> {
        check_len("username", &self.username, 1, MAX_FIELD_LEN)?;
        check_len("first_name", &self.first_name, 1, MAX_FIELD_LEN)?;
        check_len("last_name", &self.last_name, 1, MAX_FIELD_LEN)?;
        check_len("password", &self.password, MIN_PASSWORD_LEN, MAX_PASSWORD_LEN)?;
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Email::parse(&self.email)
    }
}

/// Check that `value`, trimmed, is `min..=max` characters long.
pub fn check_len(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(ValidationError::Length { field, min, max });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAuth {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub is_active: bool,
    pub role_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub ok: bool,
    pub message: String,
}

/// `YYYY-MM-DD HH:MM`, UTC.
pub mod minute_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::constants::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
