//! Cafe repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide bulk read, bulk insert and read-by-id over `cafes` storage.
//! - Keep SQL details inside core persistence boundary.
//!
//! # Invariants
//! - Write paths validate every record before any SQL mutation.
//! - `insert_cafes` is all-or-nothing: one transaction per call.
//! - Existing ids are never overwritten ("create if not already present").
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::cafe::{CafeRecord, CafeValidationError, LatLng};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CAFE_SELECT_SQL: &str = "SELECT
    id,
    name,
    lat,
    lng,
    rating,
    review_count,
    link,
    image_url
FROM cafes";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for cafe persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(CafeValidationError),
    Db(DbError),
    InvalidData(String),
    /// Backing store could not be reached (remote stores, closed handles).
    Unavailable(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted cafe data: {message}"),
            Self::Unavailable(message) => write!(f, "cafe store unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<CafeValidationError> for RepoError {
    fn from(value: CafeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for synchronous cafe storage.
pub trait CafeRepository {
    /// Returns every stored cafe in insertion order.
    fn list_cafes(&self) -> RepoResult<Vec<CafeRecord>>;
    /// Inserts records not already present; returns how many rows were created.
    fn insert_cafes(&self, records: &[CafeRecord]) -> RepoResult<usize>;
    fn get_cafe(&self, id: &str) -> RepoResult<Option<CafeRecord>>;
}

/// SQLite-backed cafe repository.
pub struct SqliteCafeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCafeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CafeRepository for SqliteCafeRepository<'_> {
    fn list_cafes(&self) -> RepoResult<Vec<CafeRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CAFE_SELECT_SQL} ORDER BY created_at ASC, rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut cafes = Vec::new();

        while let Some(row) = rows.next()? {
            cafes.push(parse_cafe_row(row)?);
        }

        Ok(cafes)
    }

    fn insert_cafes(&self, records: &[CafeRecord]) -> RepoResult<usize> {
        for record in records {
            record.validate()?;
        }
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO cafes (
                    id,
                    name,
                    lat,
                    lng,
                    rating,
                    review_count,
                    link,
                    image_url
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO NOTHING;",
            )?;
            for record in records {
                inserted += stmt.execute(params![
                    record.id.as_str(),
                    record.name.as_str(),
                    record.position.lat,
                    record.position.lng,
                    record.rating,
                    record.review_count,
                    record.link.as_deref(),
                    record.image_url.as_deref(),
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn get_cafe(&self, id: &str) -> RepoResult<Option<CafeRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CAFE_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_cafe_row(row)?));
        }

        Ok(None)
    }
}

fn parse_cafe_row(row: &Row<'_>) -> RepoResult<CafeRecord> {
    let id: String = row.get("id")?;

    let review_count = match row.get::<_, Option<i64>>("review_count")? {
        Some(value) => Some(u32::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid review_count `{value}` in cafes.review_count for `{id}`"
            ))
        })?),
        None => None,
    };

    let record = CafeRecord {
        name: row.get("name")?,
        position: LatLng::new(row.get("lat")?, row.get("lng")?),
        rating: row.get("rating")?,
        review_count,
        link: row.get("link")?,
        image_url: row.get("image_url")?,
        distance_km: None,
        id,
    };
    record
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("cafe `{}`: {err}", record.id)))?;
    Ok(record)
}
