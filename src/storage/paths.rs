//! Path normalization and file/folder rename propagation.

use std::path::{Component, Path, PathBuf};

use rusqlite::{Connection, params};
use tracing::info;

use crate::errors::Result;

/// Absolute, lexically cleaned form of `path` as stored in the database.
///
/// `.` and `..` components are resolved without touching the filesystem,
/// so symlinks are not followed.
pub fn normalize_path(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized.to_string_lossy().into_owned())
}

pub(crate) fn folder_prefix(folder: &str) -> String {
    if folder.ends_with('/') {
        folder.to_string()
    } else {
        format!("{folder}/")
    }
}

/// Moves every row of `old` to `new`. A caption already stored for `new`
/// is replaced. Returns the number of tag rows rewritten.
pub fn rename_file(conn: &Connection, old: &str, new: &str) -> Result<usize> {
    if old == new {
        return Ok(0);
    }
    let moved = conn.execute(
        "UPDATE OR REPLACE tags_files SET file = ? WHERE file = ?",
        [new, old],
    )?;
    conn.execute(
        "UPDATE OR REPLACE caption SET file = ? WHERE file = ?",
        [new, old],
    )?;
    info!(old, new, moved, "renamed file");
    Ok(moved)
}

/// Moves every row below folder `old` under folder `new`, keeping the
/// rest of each path. Returns the number of tag rows rewritten.
pub fn rename_folder(conn: &Connection, old: &str, new: &str) -> Result<usize> {
    let old = folder_prefix(old);
    let new = folder_prefix(new);
    if old == new {
        return Ok(0);
    }

    // Compare whole segments by length, not with LIKE, so `/aaa` never
    // matches `/aaabbb`.
    let moved = conn.execute(
        "UPDATE OR REPLACE tags_files SET file = ?2 || substr(file, length(?1) + 1)
         WHERE substr(file, 1, length(?1)) = ?1",
        params![old, new],
    )?;
    conn.execute(
        "UPDATE OR REPLACE caption SET file = ?2 || substr(file, length(?1) + 1)
         WHERE substr(file, 1, length(?1)) = ?1",
        params![old, new],
    )?;
    info!(old = %old, new = %new, moved, "renamed folder");
    Ok(moved)
}
