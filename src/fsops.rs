//! Moving files on disk while keeping tags and thumbnails attached.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::{Result, TagError};
use crate::storage::TagStorage;
use crate::storage::paths::normalize_path;

/// Lookup and registration of cached thumbnails, keyed by file path.
pub trait ThumbnailCache {
    fn lookup(&self, path: &Path) -> Option<PathBuf>;
    fn store(&self, path: &Path, thumbnail: &Path) -> Result<()>;
}

/// A cache that never has anything.
pub struct NoThumbnails;

impl ThumbnailCache for NoThumbnails {
    fn lookup(&self, _path: &Path) -> Option<PathBuf> {
        None
    }

    fn store(&self, _path: &Path, _thumbnail: &Path) -> Result<()> {
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(normalize_path(path)?))
}

#[cfg(unix)]
fn ensure_same_device(old: &Path, new: &Path) -> Result<()> {
    use std::os::unix::fs::MetadataExt;

    let target_dir = new.parent().unwrap_or(Path::new("/"));
    if fs::symlink_metadata(old)?.dev() != fs::metadata(target_dir)?.dev() {
        return Err(TagError::InvalidInput(format!(
            "cannot move {} to another filesystem",
            old.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_same_device(_old: &Path, _new: &Path) -> Result<()> {
    Ok(())
}

fn restore_thumbnail(thumbs: &impl ThumbnailCache, path: &Path, thumbnail: &Path) {
    if let Err(e) = thumbs.store(path, thumbnail) {
        warn!(path = %path.display(), error = %e, "could not keep thumbnail");
    }
}

/// Renames a file and carries its tags, caption and thumbnail along.
/// Returns the number of tag associations moved.
pub fn move_file(
    old: impl AsRef<Path>,
    new: impl AsRef<Path>,
    store: &impl TagStorage,
    thumbs: &impl ThumbnailCache,
) -> Result<usize> {
    let old = absolute(old.as_ref())?;
    let new = absolute(new.as_ref())?;
    ensure_same_device(&old, &new)?;

    let thumbnail = thumbs.lookup(&old);
    fs::rename(&old, &new)?;
    if let Some(thumbnail) = thumbnail {
        restore_thumbnail(thumbs, &new, &thumbnail);
    }
    debug!(old = %old.display(), new = %new.display(), "moved file");
    store.rename_file(&old, &new)
}

/// Renames a directory and carries along the tags, captions and
/// thumbnails of everything below it.
pub fn move_folder(
    old: impl AsRef<Path>,
    new: impl AsRef<Path>,
    store: &impl TagStorage,
    thumbs: &impl ThumbnailCache,
) -> Result<usize> {
    let old = absolute(old.as_ref())?;
    let new = absolute(new.as_ref())?;
    ensure_same_device(&old, &new)?;

    let mut thumbnails = Vec::new();
    for entry in WalkDir::new(&old).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(thumbnail) = thumbs.lookup(entry.path()) {
            if let Ok(relative) = entry.path().strip_prefix(&old) {
                thumbnails.push((relative.to_path_buf(), thumbnail));
            }
        }
    }

    fs::rename(&old, &new)?;
    for (relative, thumbnail) in &thumbnails {
        restore_thumbnail(thumbs, &new.join(relative), thumbnail);
    }
    debug!(old = %old.display(), new = %new.display(), thumbnails = thumbnails.len(), "moved folder");
    store.rename_folder(&old, &new)
}
