//! `cafes` schema steps.
//!
//! Each step is applied at most once per file, inside the same transaction
//! that bumps `PRAGMA user_version`. Steps never drop cafe rows: the store
//! is append-only, so a later step may add columns or indexes only.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, OptionalExtension};

struct SchemaStep {
    version: u32,
    label: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    label: "create_cafes",
    sql: include_str!("0001_init.sql"),
}];

/// Tables the repository layer queries directly.
const REQUIRED_TABLES: &[&str] = &["cafes"];

/// Newest schema version this build can write.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Brings `conn` up to [`latest_version`] and checks the `cafes` table.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file is ahead of this build.
/// - `MissingTable` when the version is current but a table is absent.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = schema_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    if found < latest {
        let tx = conn.transaction()?;
        for step in STEPS.iter().filter(|step| step.version > found) {
            tx.execute_batch(step.sql)?;
            tx.pragma_update(None, "user_version", step.version)?;
            info!(
                "event=db_migrate module=db status=step version={} label={}",
                step.version, step.label
            );
        }
        tx.commit()?;
        info!("event=db_migrate module=db status=ok from_version={found} to_version={latest}");
    }

    verify_tables(conn)
}

/// Current `PRAGMA user_version` of `conn`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

fn verify_tables(conn: &Connection) -> DbResult<()> {
    for &table in REQUIRED_TABLES {
        let present = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1;",
                [table],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !present {
            return Err(DbError::MissingTable(table));
        }
    }
    Ok(())
}
