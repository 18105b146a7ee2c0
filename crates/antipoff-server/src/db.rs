//! Shared database handle for request handlers.
//!
//! SQLite work is synchronous, so every call hops onto the blocking pool and
//! runs inside its own transaction. The mutex is held only for that step.

use std::sync::{Arc, Mutex};

use antipoff_store::{Connection, Database, StoreError};

use crate::config::DatabaseLocation;
use crate::error::ServerError;

#[derive(Clone, Debug)]
pub struct DbPool {
    inner: Arc<Mutex<Database>>,
}

impl DbPool {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(location: &DatabaseLocation) -> Result<Self, StoreError> {
        let db = match location {
            DatabaseLocation::Default => Database::open_default()?,
            DatabaseLocation::Memory => Database::open_in_memory()?,
            DatabaseLocation::Path(path) => Database::open_at(path)?,
        };
        Ok(Self::new(db))
    }

    /// Run `f` in a transaction on the blocking pool. The transaction is
    /// committed when `f` succeeds and rolled back otherwise.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> antipoff_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut db = inner.lock().unwrap_or_else(|poisoned| {
                // A panicking step has already rolled its transaction back.
                tracing::warn!("database mutex was poisoned, recovering");
                poisoned.into_inner()
            });
            db.transaction(|tx| f(tx)).map_err(ServerError::from)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("database task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antipoff_store::{Filter, NewRole, Repository, Role};

    #[tokio::test]
    async fn test_transaction_commits() {
        let pool = DbPool::open(&DatabaseLocation::Memory).unwrap();
        let role = pool
            .transaction(|conn| Repository::<Role>::add(conn, &NewRole { name: "auditor".into() }))
            .await
            .unwrap();

        let found = pool
            .transaction(move |conn| Repository::<Role>::find_by_id(conn, role.id))
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.name), Some("auditor".to_string()));
    }

    #[tokio::test]
    async fn test_failed_step_rolls_back() {
        let pool = DbPool::open(&DatabaseLocation::Memory).unwrap();
        let result: Result<(), ServerError> = pool
            .transaction(|conn| {
                Repository::<Role>::add(conn, &NewRole { name: "auditor".into() })?;
                Err(StoreError::NotFound)
            })
            .await;
        assert!(matches!(result, Err(ServerError::NotFound(_))));

        let count = pool
            .transaction(|conn| Repository::<Role>::count(conn, &Filter::new().eq("name", "auditor".to_string())))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DbPool::open(&DatabaseLocation::Path(dir.path().join("antipoff.db"))).unwrap();
        let roles = pool
            .transaction(|conn| Repository::<Role>::find_all(conn, &Filter::new()))
            .await
            .unwrap();
        assert_eq!(roles.len(), 2);
    }
}
