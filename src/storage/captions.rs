//! Captions and their synchronization with the tag relation.
//!
//! Editing a caption rewrites the file's tags to match its markers; editing
//! tags elsewhere regenerates the markers of an existing caption. Files
//! without a caption never get one from tag edits.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::models::TimeRange;
use super::tags;
use crate::caption;
use crate::errors::Result;

pub fn get_caption(conn: &Connection, file: &str) -> Result<Option<String>> {
    let caption = conn
        .query_row("SELECT caption FROM caption WHERE file = ?", [file], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()?;
    Ok(caption.flatten())
}

fn write_caption(conn: &Connection, file: &str, text: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO caption (file, caption) VALUES (?, ?)",
        params![file, text],
    )?;
    Ok(())
}

fn unique_tags(text: &str) -> Vec<String> {
    let mut tags = caption::extract_tags(text);
    tags.sort();
    tags.dedup();
    tags
}

/// Stores `text` and makes the file's tags exactly the caption's markers.
///
/// A blank caption clears the stored text but leaves the tags alone.
pub fn set_caption(conn: &Connection, file: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        debug!(file, "cleared caption");
        return write_caption(conn, file, None);
    }

    let target = unique_tags(text);
    let current = tags::find_tags_by_file(conn, file)?;
    write_caption(conn, file, Some(text))?;

    let to_remove: Vec<&str> = current
        .iter()
        .filter(|tag| !target.contains(*tag))
        .map(String::as_str)
        .collect();
    let to_add: Vec<&str> = target
        .iter()
        .filter(|tag| !current.contains(*tag))
        .map(String::as_str)
        .collect();
    tags::delete_tags(conn, file, &to_remove)?;
    tags::insert_tags(conn, file, &to_add, TimeRange::WHOLE)?;
    debug!(file, added = to_add.len(), removed = to_remove.len(), "set caption");
    Ok(())
}

/// Stores `text`, attaches its tags and keeps every other tag, listing
/// those at the end of the caption.
pub fn set_caption_keeping_tags(conn: &Connection, file: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return set_caption(conn, file, text);
    }

    let target = unique_tags(text);
    let target: Vec<&str> = target.iter().map(String::as_str).collect();
    write_caption(conn, file, Some(text))?;
    tags::insert_tags(conn, file, &target, TimeRange::WHOLE)?;
    update_caption(conn, file)
}

/// Regenerates the markers of an existing caption from the file's tags.
pub fn update_caption(conn: &Connection, file: &str) -> Result<()> {
    let Some(old) = get_caption(conn, file)? else {
        return Ok(());
    };
    let current = tags::find_tags_by_file(conn, file)?;
    let new = caption::tags_to_caption(&current, &old);
    if new != old {
        write_caption(conn, file, Some(&new))?;
        debug!(file, "resynced caption");
    }
    Ok(())
}

/// Files that carry `tag` and have a caption.
pub fn captioned_files_with_tag(conn: &Connection, tag: &str) -> Result<Vec<String>> {
    tags::query_strings(
        conn,
        "SELECT DISTINCT c.file FROM caption c
         JOIN tags_files t ON t.file = c.file
         WHERE t.tag = ? AND c.caption IS NOT NULL
         ORDER BY c.file",
        [tag],
    )
}

/// Captioned files below folder `prefix`, which must end with `/`.
pub fn captioned_files_under(conn: &Connection, prefix: &str) -> Result<Vec<String>> {
    tags::query_strings(
        conn,
        "SELECT file FROM caption
         WHERE substr(file, 1, length(?1)) = ?1 AND caption IS NOT NULL
         ORDER BY file",
        [prefix],
    )
}

/// Rewrites the `old` marker in the caption of every file tagged `old`.
///
/// Must run before the associations themselves are renamed.
pub fn rename_tag_in_captions(conn: &Connection, old: &str, new: &str) -> Result<()> {
    for file in captioned_files_with_tag(conn, old)? {
        if let Some(text) = get_caption(conn, &file)? {
            let renamed = caption::rename_tag_in_caption(&text, old, new);
            if renamed != text {
                write_caption(conn, &file, Some(&renamed))?;
            }
        }
    }
    Ok(())
}
