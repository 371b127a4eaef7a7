//! Versioned schema upgrades.
//!
//! The `version` table holds a single row with the number of steps from
//! [`MIGRATIONS`](super::schema::MIGRATIONS) already applied. Each pending
//! step runs in its own transaction together with the version bump, so a
//! failing step leaves the store at the previous version and is retried on
//! the next open.

use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};

use super::schema::{CREATE_VERSION_TABLE, MIGRATIONS};
use crate::errors::{Result, TagError};

/// Brings the store up to the latest schema and returns the version reached.
pub fn do_migrations(conn: &mut Connection) -> Result<i64> {
    migrate_with(conn, MIGRATIONS)
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT version FROM version", [], |row| row.get::<_, i64>(0))
        .optional()?;
    Ok(version.unwrap_or(0))
}

pub(crate) fn migrate_with(conn: &mut Connection, steps: &[&[&str]]) -> Result<i64> {
    conn.execute(CREATE_VERSION_TABLE, [])?;
    let base = current_version(conn)?;
    let latest = steps.len() as i64;

    if base > latest {
        warn!(base, latest, "store schema is newer than this build");
        return Ok(base);
    }

    for version in base..latest {
        apply_step(conn, version, steps[version as usize])
            .map_err(|source| TagError::Migration { version, source })?;
        info!(version = version + 1, "applied schema migration");
    }
    Ok(latest)
}

fn apply_step(conn: &mut Connection, version: i64, statements: &[&str]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for statement in statements {
        tx.execute_batch(statement)?;
    }
    tx.execute("DELETE FROM version", [])?;
    tx.execute("INSERT INTO version (version) VALUES (?)", [version + 1])?;
    tx.commit()
}
