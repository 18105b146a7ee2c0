//! Client for the external history oracle, plus the development stub that
//! can stand in for it.
//!
//! The oracle answers one question per query: has this parcel got a
//! history? It is called once per submission, with a fixed timeout and no
//! retries.

use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use antipoff_shared::dto::HistoryVerdict;
use antipoff_store::Query;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle did not answer within {0:?}")]
    Timeout(Duration),

    #[error("oracle request failed: {0}")]
    Transport(String),

    #[error("oracle returned HTTP {0}")]
    Status(u16),

    #[error("oracle returned a malformed body: {0}")]
    Body(String),
}

/// Something that can decide whether a query has a history.
#[async_trait]
pub trait HistoryOracle: Send + Sync {
    async fn check(&self, query: &Query) -> Result<bool, OracleError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Calls `GET {url}` and expects `{"history": bool}` back.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpOracle {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            OracleError::Timeout(self.timeout)
        } else if err.is_decode() {
            OracleError::Body(err.to_string())
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl HistoryOracle for HttpOracle {
    async fn check(&self, query: &Query) -> Result<bool, OracleError> {
        debug!(query_id = query.id, url = %self.url, "Calling history oracle");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(query_id = query.id, status = status.as_u16(), "Oracle returned an error status");
            return Err(OracleError::Status(status.as_u16()));
        }

        let verdict: HistoryVerdict = response.json().await.map_err(|e| self.classify(e))?;
        debug!(query_id = query.id, history = verdict.history, "Oracle answered");
        Ok(verdict.history)
    }
}

// ---------------------------------------------------------------------------
// Development stub
// ---------------------------------------------------------------------------

/// Pick the stub's delay (between 1 s and `max_delay`, or none when the
/// bound is zero) and its random answer.
pub fn stub_verdict(max_delay: Duration) -> (Duration, bool) {
    let mut rng = rand::thread_rng();
    let max = max_delay.as_secs();
    let delay = rng.gen_range(max.min(1)..=max);
    (Duration::from_secs(delay), rng.gen_bool(0.5))
}

/// `GET /history` handler served when `STUB_ORACLE` is on.
pub async fn stub_history(max_delay: Duration) -> Json<HistoryVerdict> {
    let (delay, history) = stub_verdict(max_delay);
    debug!(?delay, history, "Stub oracle answering");
    tokio::time::sleep(delay).await;
    Json(HistoryVerdict { history })
}
