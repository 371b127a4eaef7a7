//! Statements over the `tags_files` relation.
//!
//! These never touch captions; [`Batch`](super::sqlite::Batch) composes
//! them with caption re-sync.

use rusqlite::types::ToSql;
use rusqlite::{Connection, Params, params};
use tracing::debug;

use super::models::{TagAssociation, TimeRange};
use crate::errors::Result;

pub(crate) fn query_strings<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let values = stmt
        .query_map(params, |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(values)
}

/// Attaches tags; rows already present are kept as they are.
pub fn insert_tags(conn: &Connection, file: &str, tags: &[&str], range: TimeRange) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        r#"INSERT OR IGNORE INTO tags_files (file, tag, start, "end") VALUES (?, ?, ?, ?)"#,
    )?;
    for tag in tags {
        stmt.execute(params![file, tag, range.start, range.end])?;
    }
    debug!(file, ?tags, ?range, "tagged file");
    Ok(())
}

/// Detaches tags whatever range they were attached with.
pub fn delete_tags(conn: &Connection, file: &str, tags: &[&str]) -> Result<()> {
    let mut stmt = conn.prepare_cached("DELETE FROM tags_files WHERE file = ? AND tag = ?")?;
    for tag in tags {
        stmt.execute(params![file, tag])?;
    }
    debug!(file, ?tags, "untagged file");
    Ok(())
}

pub fn find_tags_by_file(conn: &Connection, file: &str) -> Result<Vec<String>> {
    query_strings(
        conn,
        "SELECT DISTINCT tag FROM tags_files WHERE file = ? ORDER BY tag",
        [file],
    )
}

/// Every row of `file`, by tag, whole-file rows first.
pub fn find_associations(conn: &Connection, file: &str) -> Result<Vec<TagAssociation>> {
    let mut stmt = conn.prepare_cached(
        r#"SELECT tag, start, "end" FROM tags_files WHERE file = ? ORDER BY tag, start, "end""#,
    )?;
    let rows = stmt
        .query_map([file], |row| {
            Ok(TagAssociation {
                file: file.to_string(),
                tag: row.get(0)?,
                range: TimeRange {
                    start: row.get(1)?,
                    end: row.get(2)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Files carrying every one of `tags`.
pub fn find_files_by_tags(conn: &Connection, tags: &[&str]) -> Result<Vec<String>> {
    let mut unique: Vec<&str> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(tag) {
            unique.push(*tag);
        }
    }
    if unique.is_empty() {
        return Ok(Vec::new());
    }

    // A tag attached over several ranges must count once.
    let placeholders = vec!["?"; unique.len()].join(", ");
    let sql = format!(
        "SELECT file FROM tags_files WHERE tag IN ({placeholders})
         GROUP BY file HAVING COUNT(DISTINCT tag) = ? ORDER BY file"
    );

    let count = unique.len() as i64;
    let mut param_refs: Vec<&dyn ToSql> = unique.iter().map(|t| t as &dyn ToSql).collect();
    param_refs.push(&count);

    let mut stmt = conn.prepare(&sql)?;
    let files = stmt
        .query_map(param_refs.as_slice(), |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(files)
}

/// Ranges over which `tag` is attached to part of `file`.
pub fn get_extras_for_file(conn: &Connection, file: &str, tag: &str) -> Result<Vec<TimeRange>> {
    let mut stmt = conn.prepare_cached(
        r#"SELECT start, "end" FROM tags_files
           WHERE file = ? AND tag = ? AND (start IS NOT NULL OR "end" IS NOT NULL)
           ORDER BY start, "end""#,
    )?;
    let ranges = stmt
        .query_map(params![file, tag], |row| {
            Ok(TimeRange {
                start: row.get(0)?,
                end: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ranges)
}

pub fn list_tags(conn: &Connection) -> Result<Vec<String>> {
    query_strings(conn, "SELECT DISTINCT tag FROM tags_files ORDER BY tag", [])
}

pub fn list_files(conn: &Connection) -> Result<Vec<String>> {
    query_strings(conn, "SELECT DISTINCT file FROM tags_files ORDER BY file", [])
}

pub fn delete_file(conn: &Connection, file: &str) -> Result<()> {
    conn.execute("DELETE FROM tags_files WHERE file = ?", [file])?;
    conn.execute("DELETE FROM caption WHERE file = ?", [file])?;
    debug!(file, "untracked file");
    Ok(())
}

pub fn delete_tag(conn: &Connection, tag: &str) -> Result<usize> {
    let removed = conn.execute("DELETE FROM tags_files WHERE tag = ?", [tag])?;
    debug!(tag, removed, "removed tag");
    Ok(removed)
}

/// Renames a tag in every association; rows that would collide with an
/// existing association of `new` are merged into it.
pub fn rename_tag(conn: &Connection, old: &str, new: &str) -> Result<usize> {
    let renamed = conn.execute(
        "UPDATE OR REPLACE tags_files SET tag = ? WHERE tag = ?",
        [new, old],
    )?;
    debug!(old, new, renamed, "renamed tag");
    Ok(renamed)
}
