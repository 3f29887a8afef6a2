//! Cafe store bootstrap: connection setup plus the `cafes` schema.
//!
//! # Responsibility
//! - Hand out SQLite connections whose `cafes` table is ready for the repo.
//! - Refuse files written by a newer build or missing the `cafes` table.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - No cafe row is read or written before `open_db` returns `Ok`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was migrated by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The version pragma claims a current schema but the table is absent,
    /// e.g. a foreign SQLite file passed as the cafe store.
    MissingTable(&'static str),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "cafe store schema v{db_version} is newer than this build (v{latest_supported})"
            ),
            Self::MissingTable(table) => write!(f, "cafe store has no `{table}` table"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::MissingTable(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
