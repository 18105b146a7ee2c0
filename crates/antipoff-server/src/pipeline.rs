//! Query/History pipeline.
//!
//! A submission is recorded as a [`Query`], checked against the oracle and
//! answered with the oracle's verdict, which is stored as a [`History`] row.
//! Each storage step is its own transaction; the oracle call holds no lock.

use std::sync::Arc;

use tracing::{error, info, warn};

use antipoff_shared::dto::{HistoryVerdict, QueryCreate};
use antipoff_store::{Filter, History, HistoryWithQuery, NewHistory, NewQuery, Query, Repository};

use crate::db::DbPool;
use crate::error::ServerError;
use crate::oracle::HistoryOracle;

#[derive(Clone)]
pub struct QueryService {
    db: DbPool,
    oracle: Arc<dyn HistoryOracle>,
}

impl QueryService {
    pub fn new(db: DbPool, oracle: Arc<dyn HistoryOracle>) -> Self {
        Self { db, oracle }
    }

    /// Record a query, ask the oracle about it and store the answer.
    ///
    /// Invalid input is rejected before anything is written. If the oracle
    /// (or the final write) fails, the recorded query is deleted again so no
    /// query is left without its history.
    ///
    /// The record/check/store sequence runs on its own task, so a caller that
    /// goes away mid-call (a dropped HTTP connection) does not cut it short.
    pub async fn submit_query(&self, request: &QueryCreate) -> Result<HistoryVerdict, ServerError> {
        let cadastral_number = request.cadastral_number()?;
        let new_query = NewQuery {
            cadastral_number,
            latitude: request.latitude,
            longitude: request.longitude,
        };

        let service = self.clone();
        tokio::spawn(async move { service.record(new_query).await })
            .await
            .map_err(|e| ServerError::Internal(format!("query task failed: {e}")))?
    }

    async fn record(&self, new_query: NewQuery) -> Result<HistoryVerdict, ServerError> {
        let query = self
            .db
            .transaction(move |conn| Repository::<Query>::add(conn, &new_query))
            .await?;
        info!(
            query_id = query.id,
            cadastral_number = %query.cadastral_number,
            "Query recorded"
        );

        let verdict = match self.oracle.check(&query).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(query_id = query.id, error = %e, "History oracle call failed");
                self.discard_query(query.id).await;
                return Err(ServerError::UpstreamUnavailable(e.to_string()));
            }
        };

        let new_history = NewHistory {
            query_id: query.id,
            history: verdict,
        };
        let history = match self
            .db
            .transaction(move |conn| Repository::<History>::add(conn, &new_history))
            .await
        {
            Ok(history) => history,
            Err(e) => {
                self.discard_query(query.id).await;
                return Err(e);
            }
        };

        info!(query_id = query.id, history = history.history, "History recorded");
        Ok(HistoryVerdict {
            history: history.history,
        })
    }

    /// Compensating delete for a query whose history could not be stored.
    async fn discard_query(&self, query_id: i64) {
        let result = self
            .db
            .transaction(move |conn| Repository::<Query>::delete(conn, &Filter::by_id(query_id), false))
            .await;

        match result {
            Ok(_) => warn!(query_id, "Discarded query without history"),
            Err(e) => error!(query_id, error = %e, "Failed to discard query without history"),
        }
    }

    pub async fn list_all_queries(&self) -> Result<Vec<Query>, ServerError> {
        let queries = self
            .db
            .transaction(|conn| Repository::<Query>::find_all(conn, &Filter::new()))
            .await?;

        if queries.is_empty() {
            return Err(ServerError::NotFound("Query history not found".into()));
        }
        Ok(queries)
    }

    pub async fn find_history_by_cadastral_number(
        &self,
        cadastral_number: &str,
    ) -> Result<Vec<HistoryWithQuery>, ServerError> {
        let cadastral_number = cadastral_number.trim().to_string();
        let histories = self
            .db
            .transaction(move |conn| Repository::<History>::find_by_cadastral_number(conn, &cadastral_number))
            .await?;

        if histories.is_empty() {
            return Err(ServerError::NotFound(
                "No history found for this cadastral number".into(),
            ));
        }
        Ok(histories)
    }

    pub async fn find_result_by_query_id(&self, query_id: i64) -> Result<HistoryWithQuery, ServerError> {
        let found = self
            .db
            .transaction(move |conn| {
                let Some(history) = Repository::<History>::find_by_query_id(conn, query_id)? else {
                    return Ok(None);
                };
                let query = Repository::<Query>::find_by_id(conn, history.query_id)?;
                Ok(query.map(|query| HistoryWithQuery { history, query }))
            })
            .await?;

        found.ok_or_else(|| ServerError::NotFound(format!("No result for query {query_id}")))
    }
}
