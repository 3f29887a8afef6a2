//! Asynchronous persistence boundary used by the scan pipeline.
//!
//! # Responsibility
//! - Expose bulk read, bulk insert and read-by-id as suspending calls.
//! - Adapt the synchronous SQLite repository to that contract.
//!
//! # Invariants
//! - `insert_many` is atomic from the caller's point of view.
//! - The SQLite lock is never held across an await point.

use crate::db::{open_db, open_db_in_memory};
use crate::model::cafe::CafeRecord;
use crate::repo::cafe_repo::{CafeRepository, RepoResult, SqliteCafeRepository};
use async_trait::async_trait;
use log::{debug, error};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Keyed record store consumed by the pipeline and the session.
#[async_trait]
pub trait CafeStore: Send + Sync {
    /// Reads every stored cafe. Used once at startup.
    async fn read_all(&self) -> RepoResult<Vec<CafeRecord>>;
    /// Inserts the batch in one all-or-nothing call.
    async fn insert_many(&self, records: &[CafeRecord]) -> RepoResult<usize>;
    async fn get_by_id(&self, id: &str) -> RepoResult<Option<CafeRecord>>;
}

/// SQLite-backed [`CafeStore`].
///
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct SqliteCafeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCafeStore {
    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a private in-memory database.
    pub fn in_memory() -> RepoResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn with_repo<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&SqliteCafeRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        // Every write is a single transaction, so a poisoned lock still guards
        // a consistent connection.
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let repo = SqliteCafeRepository::new(&conn);
        let result = f(&repo);
        match &result {
            Ok(_) => debug!("event=store_op module=repo status=ok op={op}"),
            Err(err) => error!("event=store_op module=repo status=error op={op} error={err}"),
        }
        result
    }
}

#[async_trait]
impl CafeStore for SqliteCafeStore {
    async fn read_all(&self) -> RepoResult<Vec<CafeRecord>> {
        self.with_repo("read_all", |repo| repo.list_cafes())
    }

    async fn insert_many(&self, records: &[CafeRecord]) -> RepoResult<usize> {
        self.with_repo("insert_many", |repo| repo.insert_cafes(records))
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<CafeRecord>> {
        self.with_repo("get_by_id", |repo| repo.get_cafe(id))
    }
}
