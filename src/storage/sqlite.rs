use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

use super::models::{TagAssociation, TimeRange};
use super::{TagStorage, captions, migrate, paths, tags};
use crate::errors::{Result, TagError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The tag database. Safe to share between threads behind an `Arc`; each
/// mutating call runs in its own transaction.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Wraps `conn` and upgrades its schema.
    pub fn new(mut conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrate::do_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::new(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::new(conn)
    }

    pub fn do_migrations(&self) -> Result<i64> {
        let mut conn = self.lock()?;
        migrate::do_migrations(&mut conn)
    }

    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.lock()?;
        migrate::current_version(&conn)
    }

    /// Runs `f` inside one transaction, committed only if `f` succeeds.
    ///
    /// The store stays locked meanwhile: use the given [`Batch`], not the
    /// store itself, from inside `f`.
    pub fn batch<T>(&self, f: impl FnOnce(&Batch<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&Batch::new(&tx))?;
        tx.commit()?;
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&Batch<'_>) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&Batch::new(&conn))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| TagError::LockPoisoned)
    }

    #[cfg(test)]
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.lock().unwrap()
    }
}

impl TagStorage for SqliteStorage {
    fn tag_file_range(&self, path: impl AsRef<Path>, tags: &[&str], range: TimeRange) -> Result<()> {
        self.batch(|b| b.tag_file_range(path, tags, range))
    }

    fn untag_file(&self, path: impl AsRef<Path>, tags: &[&str]) -> Result<()> {
        self.batch(|b| b.untag_file(path, tags))
    }

    fn find_tags_by_file(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        self.read(|b| b.find_tags_by_file(path))
    }

    fn find_associations(&self, path: impl AsRef<Path>) -> Result<Vec<TagAssociation>> {
        self.read(|b| b.find_associations(path))
    }

    fn find_files_by_tags(&self, tags: &[&str]) -> Result<Vec<String>> {
        self.read(|b| b.find_files_by_tags(tags))
    }

    fn get_extras_for_file(&self, path: impl AsRef<Path>, tag: &str) -> Result<Vec<TimeRange>> {
        self.read(|b| b.get_extras_for_file(path, tag))
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        self.read(|b| b.list_tags())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.read(|b| b.list_files())
    }

    fn remove_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.batch(|b| b.remove_file(path))
    }

    fn remove_tag(&self, tag: &str) -> Result<()> {
        self.batch(|b| b.remove_tag(tag))
    }

    fn rename_tag(&self, old: &str, new: &str) -> Result<()> {
        self.batch(|b| b.rename_tag(old, new))
    }

    fn get_caption(&self, path: impl AsRef<Path>) -> Result<Option<String>> {
        self.read(|b| b.get_caption(path))
    }

    fn set_caption(&self, path: impl AsRef<Path>, caption: &str) -> Result<()> {
        self.batch(|b| b.set_caption(path, caption))
    }

    fn set_caption_keeping_tags(&self, path: impl AsRef<Path>, caption: &str) -> Result<()> {
        self.batch(|b| b.set_caption_keeping_tags(path, caption))
    }

    fn rename_file(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<usize> {
        self.batch(|b| b.rename_file(old, new))
    }

    fn rename_folder(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<usize> {
        self.batch(|b| b.rename_folder(old, new))
    }
}

/// Operations sharing one open transaction, see [`SqliteStorage::batch`].
pub struct Batch<'a> {
    conn: &'a Connection,
}

impl<'a> Batch<'a> {
    fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn file_key(path: impl AsRef<Path>) -> Result<String> {
    paths::normalize_path(path.as_ref())
}

// An empty name has no marker form in captions.
fn check_tag_names(tags: &[&str]) -> Result<()> {
    if tags.iter().any(|tag| tag.is_empty()) {
        return Err(TagError::InvalidInput("tag names cannot be empty".into()));
    }
    Ok(())
}

impl TagStorage for Batch<'_> {
    fn tag_file_range(&self, path: impl AsRef<Path>, tags: &[&str], range: TimeRange) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        check_tag_names(tags)?;
        let file = file_key(path)?;
        tags::insert_tags(self.conn, &file, tags, range)?;
        captions::update_caption(self.conn, &file)
    }

    fn untag_file(&self, path: impl AsRef<Path>, tags: &[&str]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let file = file_key(path)?;
        tags::delete_tags(self.conn, &file, tags)?;
        captions::update_caption(self.conn, &file)
    }

    fn find_tags_by_file(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        tags::find_tags_by_file(self.conn, &file_key(path)?)
    }

    fn find_associations(&self, path: impl AsRef<Path>) -> Result<Vec<TagAssociation>> {
        tags::find_associations(self.conn, &file_key(path)?)
    }

    fn find_files_by_tags(&self, tags: &[&str]) -> Result<Vec<String>> {
        tags::find_files_by_tags(self.conn, tags)
    }

    fn get_extras_for_file(&self, path: impl AsRef<Path>, tag: &str) -> Result<Vec<TimeRange>> {
        tags::get_extras_for_file(self.conn, &file_key(path)?, tag)
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        tags::list_tags(self.conn)
    }

    fn list_files(&self) -> Result<Vec<String>> {
        tags::list_files(self.conn)
    }

    fn remove_file(&self, path: impl AsRef<Path>) -> Result<()> {
        tags::delete_file(self.conn, &file_key(path)?)
    }

    fn remove_tag(&self, tag: &str) -> Result<()> {
        let captioned = captions::captioned_files_with_tag(self.conn, tag)?;
        tags::delete_tag(self.conn, tag)?;
        for file in captioned {
            captions::update_caption(self.conn, &file)?;
        }
        Ok(())
    }

    fn rename_tag(&self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        check_tag_names(&[new])?;
        captions::rename_tag_in_captions(self.conn, old, new)?;
        tags::rename_tag(self.conn, old, new)?;
        Ok(())
    }

    fn get_caption(&self, path: impl AsRef<Path>) -> Result<Option<String>> {
        captions::get_caption(self.conn, &file_key(path)?)
    }

    fn set_caption(&self, path: impl AsRef<Path>, caption: &str) -> Result<()> {
        captions::set_caption(self.conn, &file_key(path)?, caption)
    }

    fn set_caption_keeping_tags(&self, path: impl AsRef<Path>, caption: &str) -> Result<()> {
        captions::set_caption_keeping_tags(self.conn, &file_key(path)?, caption)
    }

    fn rename_file(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<usize> {
        let new = file_key(new)?;
        let moved = paths::rename_file(self.conn, &file_key(old)?, &new)?;
        // The target may have kept tags of its own.
        captions::update_caption(self.conn, &new)?;
        Ok(moved)
    }

    fn rename_folder(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<usize> {
        let new = file_key(new)?;
        let moved = paths::rename_folder(self.conn, &file_key(old)?, &new)?;
        for file in captions::captioned_files_under(self.conn, &paths::folder_prefix(&new))? {
            captions::update_caption(self.conn, &file)?;
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::caption::extract_tags;
    use crate::storage::schema::LATEST_VERSION;

    fn test_storage() -> SqliteStorage {
        SqliteStorage::in_memory().unwrap()
    }

    fn with_a_few_tags() -> SqliteStorage {
        let storage = test_storage();
        storage.tag_file("/foo", &["tag1", "tag3"]).unwrap();
        storage.tag_file("/bar", &["tag2", "tag3"]).unwrap();
        storage
    }

    fn assert_caption_in_sync(storage: &SqliteStorage, path: &str) {
        let caption = storage.get_caption(path).unwrap().expect("caption should be set");
        let mut markers = extract_tags(&caption);
        markers.sort();
        markers.dedup();
        assert_eq!(markers, storage.find_tags_by_file(path).unwrap(), "caption {caption:?}");
    }

    // --- Schema ---

    #[test]
    fn test_in_memory_creates_tables() {
        let storage = test_storage();
        let count: i64 = storage
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('tags_files', 'caption', 'version')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(storage.schema_version().unwrap(), LATEST_VERSION);
    }

    #[test]
    fn test_do_migrations_twice() {
        let storage = test_storage();
        assert_eq!(storage.do_migrations().unwrap(), LATEST_VERSION);
        assert_eq!(storage.do_migrations().unwrap(), LATEST_VERSION);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("tags.sqlite");
        {
            let storage = SqliteStorage::open(&db_path).unwrap();
            storage.tag_file("/foo", &["kept"]).unwrap();
            storage.set_caption("/foo", "a #kept photo").unwrap();
        }
        let storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.find_tags_by_file("/foo").unwrap(), vec!["kept"]);
        assert_eq!(storage.get_caption("/foo").unwrap().as_deref(), Some("a #kept photo"));
    }

    // --- Tags ---

    #[test]
    fn test_tag_file_untag() {
        let storage = test_storage();
        storage.tag_file("/foo", &["tag1"]).unwrap();
        assert_eq!(storage.find_tags_by_file("/foo").unwrap(), vec!["tag1"]);
        assert!(storage.find_tags_by_file("/bar").unwrap().is_empty());

        storage.tag_file("/foo", &["tag2", "tag3"]).unwrap();
        assert_eq!(storage.find_tags_by_file("/foo").unwrap(), vec!["tag1", "tag2", "tag3"]);

        storage.untag_file("/foo", &["tag2"]).unwrap();
        assert_eq!(storage.find_tags_by_file("/foo").unwrap(), vec!["tag1", "tag3"]);

        storage.tag_file("/bar", &["tag2", "tag3"]).unwrap();
        assert_eq!(storage.find_tags_by_file("/foo").unwrap(), vec!["tag1", "tag3"]);
        assert_eq!(storage.find_tags_by_file("/bar").unwrap(), vec!["tag2", "tag3"]);
    }

    #[test]
    fn test_empty_tag_lists_are_noops() {
        let storage = with_a_few_tags();
        storage.tag_file("/new", &[]).unwrap();
        storage.untag_file("/foo", &[]).unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["/bar", "/foo"]);
        assert!(storage.find_files_by_tags(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_empty_tag_name_is_rejected() {
        let storage = test_storage();
        storage.set_caption("/p", "x").unwrap();
        let err = storage.tag_file("/p", &["ok", ""]).unwrap_err();
        assert!(matches!(err, TagError::InvalidInput(_)));
        assert!(storage.find_tags_by_file("/p").unwrap().is_empty());

        storage.tag_file("/p", &["a"]).unwrap();
        storage.tag_file("/p", &["b"]).unwrap();
        assert_eq!(storage.get_caption("/p").unwrap().as_deref(), Some("x #a #b"));

        assert!(matches!(storage.rename_tag("a", ""), Err(TagError::InvalidInput(_))));
        assert_eq!(storage.find_tags_by_file("/p").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_relative_paths_are_absolutized() {
        let storage = test_storage();
        storage.tag_file("relative.jpg", &["x"]).unwrap();
        let absolute = std::env::current_dir().unwrap().join("relative.jpg");
        assert_eq!(storage.find_tags_by_file(&absolute).unwrap(), vec!["x"]);
        assert_eq!(
            storage.list_files().unwrap(),
            vec![absolute.to_string_lossy().into_owned()]
        );
    }

    #[test]
    fn test_list_tags_and_files() {
        let storage = with_a_few_tags();
        assert_eq!(storage.list_tags().unwrap(), vec!["tag1", "tag2", "tag3"]);
        assert_eq!(storage.list_files().unwrap(), vec!["/bar", "/foo"]);

        storage.untag_file("/foo", &["tag1", "tag3"]).unwrap();
        assert_eq!(storage.list_tags().unwrap(), vec!["tag2", "tag3"]);
        assert_eq!(storage.list_files().unwrap(), vec!["/bar"]);
    }

    #[test]
    fn test_find_files_by_tags() {
        let storage = with_a_few_tags();
        assert_eq!(storage.find_files_by_tags(&["tag1"]).unwrap(), vec!["/foo"]);
        assert_eq!(storage.find_files_by_tags(&["tag2"]).unwrap(), vec!["/bar"]);
        assert_eq!(storage.find_files_by_tags(&["tag3"]).unwrap(), vec!["/bar", "/foo"]);
        assert_eq!(storage.find_files_by_tags(&["tag3", "tag1"]).unwrap(), vec!["/foo"]);
    }

    #[test]
    fn test_find_files_intersection() {
        let storage = test_storage();
        storage.tag_file("/a.jpg", &["red", "cat"]).unwrap();
        storage.tag_file("/b.jpg", &["red"]).unwrap();
        assert_eq!(storage.find_files_by_tags(&["red"]).unwrap(), vec!["/a.jpg", "/b.jpg"]);
        assert_eq!(storage.find_files_by_tags(&["red", "cat"]).unwrap(), vec!["/a.jpg"]);
    }

    #[test]
    fn test_find_files_with_ranged_tags() {
        let storage = test_storage();
        storage.tag_file("/a", &["x", "y"]).unwrap();
        storage.tag_file("/b", &["x"]).unwrap();
        storage.tag_file("/c", &["y"]).unwrap();
        storage.tag_file_range("/b", &["x"], TimeRange::new(0, 500)).unwrap();
        storage.tag_file_range("/b", &["x"], TimeRange::new(900, 1200)).unwrap();

        assert_eq!(storage.find_files_by_tags(&["x", "y"]).unwrap(), vec!["/a"]);
        assert_eq!(storage.find_files_by_tags(&["x"]).unwrap(), vec!["/a", "/b"]);
    }

    #[test]
    fn test_get_extras_for_file() {
        let storage = test_storage();
        storage.tag_file_range("/clip.mp4", &["goal"], TimeRange::new(100, 200)).unwrap();
        storage.tag_file("/clip.mp4", &["goal"]).unwrap();
        assert_eq!(
            storage.get_extras_for_file("/clip.mp4", "goal").unwrap(),
            vec![TimeRange::new(100, 200)]
        );

        storage.untag_file("/clip.mp4", &["goal"]).unwrap();
        assert!(storage.get_extras_for_file("/clip.mp4", "goal").unwrap().is_empty());
    }

    #[test]
    fn test_file_info() {
        let storage = test_storage();
        storage.set_caption("/v.mp4", "match #goal").unwrap();
        storage.tag_file_range("/v.mp4", &["goal"], TimeRange::new(100, 200)).unwrap();
        let info = storage.file_info("/v.mp4").unwrap();
        assert_eq!(info.file, "/v.mp4");
        assert_eq!(info.tags, vec!["goal"]);
        assert_eq!(info.caption.as_deref(), Some("match #goal"));
        assert_eq!(info.clips.len(), 1);
        assert_eq!(info.clips[0].range, TimeRange::new(100, 200));
    }

    #[test]
    fn test_remove_file() {
        let storage = with_a_few_tags();
        storage.set_caption("/foo", "#tag1 #tag3").unwrap();
        storage.remove_file("/foo").unwrap();
        assert!(storage.find_files_by_tags(&["tag1"]).unwrap().is_empty());
        assert!(storage.find_tags_by_file("/foo").unwrap().is_empty());
        assert_eq!(storage.get_caption("/foo").unwrap(), None);
        assert_eq!(storage.list_files().unwrap(), vec!["/bar"]);
        assert_eq!(storage.list_tags().unwrap(), vec!["tag2", "tag3"]);
    }

    #[test]
    fn test_remove_tag() {
        let storage = with_a_few_tags();
        storage.remove_tag("tag3").unwrap();
        assert!(storage.find_files_by_tags(&["tag3"]).unwrap().is_empty());
        assert_eq!(storage.find_tags_by_file("/foo").unwrap(), vec!["tag1"]);
        assert_eq!(storage.list_tags().unwrap(), vec!["tag1", "tag2"]);
    }

    #[test]
    fn test_remove_tag_scrubs_captions() {
        let storage = with_a_few_tags();
        storage.set_caption("/foo", "sunny #tag1 day #tag3").unwrap();
        storage.remove_tag("tag3").unwrap();
        assert_eq!(storage.get_caption("/foo").unwrap().as_deref(), Some("sunny #tag1 day"));
    }

    #[test]
    fn test_rename_tag() {
        let storage = with_a_few_tags();
        storage.rename_tag("tag3", "tag4").unwrap();
        assert!(storage.find_files_by_tags(&["tag3"]).unwrap().is_empty());
        assert_eq!(storage.find_files_by_tags(&["tag4"]).unwrap(), vec!["/bar", "/foo"]);
        assert_eq!(storage.find_tags_by_file("/foo").unwrap(), vec!["tag1", "tag4"]);
        assert_eq!(storage.list_tags().unwrap(), vec!["tag1", "tag2", "tag4"]);
    }

    #[test]
    fn test_rename_tag_rewrites_captions() {
        let storage = with_a_few_tags();
        storage.set_caption("/foo", "the #tag1 and #tag3 photo").unwrap();
        storage.rename_tag("tag3", "trip/2024").unwrap();
        assert_eq!(
            storage.get_caption("/foo").unwrap().as_deref(),
            Some("the #tag1 and #[trip/2024] photo")
        );
        assert_caption_in_sync(&storage, "/foo");
        assert_eq!(storage.get_caption("/bar").unwrap(), None);
    }

    // --- Captions ---

    #[test]
    fn test_set_caption_tags_file() {
        let storage = test_storage();
        storage.set_caption("/p.jpg", "at the #beach with #[best friends]").unwrap();
        assert_eq!(storage.find_tags_by_file("/p.jpg").unwrap(), vec!["beach", "best friends"]);
        assert_eq!(
            storage.get_caption("/p.jpg").unwrap().as_deref(),
            Some("at the #beach with #[best friends]")
        );
    }

    #[test]
    fn test_caption_deletion_preserves_tags() {
        let storage = test_storage();
        storage.set_caption("/p", "#foo bar").unwrap();
        storage.set_caption("/p", "").unwrap();
        assert_eq!(storage.find_tags_by_file("/p").unwrap(), vec!["foo"]);
        assert_eq!(storage.get_caption("/p").unwrap(), None);

        storage.tag_file("/p", &["more"]).unwrap();
        assert_eq!(storage.get_caption("/p").unwrap(), None);
    }

    #[test]
    fn test_tag_edits_resync_caption() {
        let storage = test_storage();
        storage.set_caption("/p", "holiday #beach").unwrap();
        storage.tag_file("/p", &["sunset"]).unwrap();
        assert_eq!(
            storage.get_caption("/p").unwrap().as_deref(),
            Some("holiday #beach #sunset")
        );
        storage.untag_file("/p", &["beach"]).unwrap();
        assert_eq!(storage.get_caption("/p").unwrap().as_deref(), Some("holiday #sunset"));
    }

    #[test]
    fn test_caption_stays_in_sync_through_edits() {
        let storage = test_storage();
        let p = "/p.mp4";
        storage.set_caption(p, "holiday #beach with #[family/kids]").unwrap();
        assert_caption_in_sync(&storage, p);
        storage.tag_file(p, &["sunset", "beach"]).unwrap();
        assert_caption_in_sync(&storage, p);
        storage.untag_file(p, &["beach"]).unwrap();
        assert_caption_in_sync(&storage, p);
        storage.tag_file_range(p, &["clip"], TimeRange::new(0, 3000)).unwrap();
        assert_caption_in_sync(&storage, p);
        storage.set_caption(p, "new #one").unwrap();
        assert_caption_in_sync(&storage, p);
        storage.tag_file(p, &["two"]).unwrap();
        assert_caption_in_sync(&storage, p);
        storage.rename_tag("two", "three").unwrap();
        assert_caption_in_sync(&storage, p);
        storage.remove_tag("one").unwrap();
        assert_caption_in_sync(&storage, p);
        assert_eq!(storage.get_caption(p).unwrap().as_deref(), Some("new #three"));
    }

    #[test]
    fn test_set_caption_keeping_tags() {
        let storage = test_storage();
        storage.tag_file("/p", &["existing"]).unwrap();
        storage.set_caption_keeping_tags("/p", "fresh #text").unwrap();
        assert_eq!(storage.find_tags_by_file("/p").unwrap(), vec!["existing", "text"]);
        assert_caption_in_sync(&storage, "/p");
    }

    // --- Paths ---

    #[test]
    fn test_rename_file() {
        let storage = with_a_few_tags();
        storage.set_caption("/foo", "#tag1 #tag3").unwrap();
        assert_eq!(storage.rename_file("/foo", "/folder/new").unwrap(), 2);
        assert_eq!(storage.find_files_by_tags(&["tag3"]).unwrap(), vec!["/bar", "/folder/new"]);
        assert_eq!(storage.find_tags_by_file("/folder/new").unwrap(), vec!["tag1", "tag3"]);
        assert!(storage.find_tags_by_file("/foo").unwrap().is_empty());
        assert_eq!(storage.list_files().unwrap(), vec!["/bar", "/folder/new"]);
        assert_eq!(storage.get_caption("/folder/new").unwrap().as_deref(), Some("#tag1 #tag3"));
        assert_eq!(storage.get_caption("/foo").unwrap(), None);
    }

    #[test]
    fn test_rename_file_over_captioned_target() {
        let storage = test_storage();
        storage.set_caption("/src", "moved #src").unwrap();
        storage.set_caption("/dst", "stale #dst").unwrap();
        storage.rename_file("/src", "/dst").unwrap();
        assert_eq!(storage.find_tags_by_file("/dst").unwrap(), vec!["dst", "src"]);
        assert_eq!(storage.get_caption("/dst").unwrap().as_deref(), Some("moved #src #dst"));
    }

    #[test]
    fn test_rename_folder_over_captioned_target() {
        let storage = test_storage();
        storage.set_caption("/a/x", "moved #t").unwrap();
        storage.set_caption("/b/x", "stale #u").unwrap();
        storage.set_caption("/b/y", "untouched #v").unwrap();
        storage.rename_folder("/a", "/b").unwrap();
        assert_eq!(storage.find_tags_by_file("/b/x").unwrap(), vec!["t", "u"]);
        assert_eq!(storage.get_caption("/b/x").unwrap().as_deref(), Some("moved #t #u"));
        assert_caption_in_sync(&storage, "/b/x");
        assert_eq!(storage.get_caption("/b/y").unwrap().as_deref(), Some("untouched #v"));
    }

    #[test]
    fn test_rename_folder() {
        let storage = with_a_few_tags();
        storage.rename_file("/foo", "/barfolder/new").unwrap();
        storage.set_caption("/barfolder/new", "#tag1 #tag3").unwrap();
        storage.rename_folder("/barfolder", "/other").unwrap();
        assert_eq!(storage.find_files_by_tags(&["tag3"]).unwrap(), vec!["/bar", "/other/new"]);
        assert_eq!(storage.find_tags_by_file("/other/new").unwrap(), vec!["tag1", "tag3"]);
        assert!(storage.find_tags_by_file("/foo").unwrap().is_empty());
        assert_eq!(storage.list_files().unwrap(), vec!["/bar", "/other/new"]);
        assert!(storage.get_caption("/other/new").unwrap().is_some());
    }

    #[test]
    fn test_rename_folder_boundary() {
        let storage = test_storage();
        storage.tag_file("/aaa/x", &["t"]).unwrap();
        storage.rename_folder("/aaabbb", "/other").unwrap();
        assert_eq!(storage.find_tags_by_file("/aaa/x").unwrap(), vec!["t"]);

        storage.rename_folder("/aaa", "/other").unwrap();
        assert!(storage.find_tags_by_file("/aaa/x").unwrap().is_empty());
        assert_eq!(storage.find_tags_by_file("/other/x").unwrap(), vec!["t"]);
    }

    // --- Transactions ---

    #[test]
    fn test_batch_commits_together() {
        let storage = test_storage();
        storage
            .batch(|b| {
                b.tag_file("/a", &["x"])?;
                b.set_caption("/a", "#x #y")?;
                b.rename_file("/a", "/b")
            })
            .unwrap();
        assert_eq!(storage.find_tags_by_file("/b").unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_batch_rolls_back_on_error() {
        let storage = test_storage();
        let result: Result<()> = storage.batch(|b| {
            b.tag_file("/a", &["x"])?;
            b.set_caption("/a", "#x")?;
            Err(TagError::InvalidInput("abort".into()))
        });
        assert!(matches!(result, Err(TagError::InvalidInput(_))));
        assert!(storage.find_tags_by_file("/a").unwrap().is_empty());
        assert_eq!(storage.get_caption("/a").unwrap(), None);
    }

    #[test]
    fn test_concurrent_writers() {
        let storage = Arc::new(test_storage());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let storage = Arc::clone(&storage);
                thread::spawn(move || {
                    let file = format!("/photos/{i}.jpg");
                    storage.tag_file(&file, &["shared"]).unwrap();
                    storage.set_caption(&file, &format!("#shared #own{i}")).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(storage.find_files_by_tags(&["shared"]).unwrap().len(), 8);
        assert_eq!(storage.list_tags().unwrap().len(), 9);
    }
}
