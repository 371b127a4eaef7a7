pub mod captions;
pub mod migrate;
pub mod models;
pub mod paths;
pub mod schema;
pub mod sqlite;
pub mod tags;

use std::path::Path;

use crate::errors::Result;
use models::{FileInfo, TagAssociation, TimeRange};

/// Tag and caption operations on files.
///
/// Paths are normalized to absolute strings before use. Tag lists may be
/// empty, in which case mutations do nothing. Every mutation that has a
/// caption for the touched file keeps the caption's markers in line with
/// the file's tags.
pub trait TagStorage {
    fn tag_file(&self, path: impl AsRef<Path>, tags: &[&str]) -> Result<()> {
        self.tag_file_range(path, tags, TimeRange::WHOLE)
    }
    fn tag_file_range(&self, path: impl AsRef<Path>, tags: &[&str], range: TimeRange) -> Result<()>;
    fn untag_file(&self, path: impl AsRef<Path>, tags: &[&str]) -> Result<()>;
    fn find_tags_by_file(&self, path: impl AsRef<Path>) -> Result<Vec<String>>;
    fn find_associations(&self, path: impl AsRef<Path>) -> Result<Vec<TagAssociation>>;
    fn find_files_by_tags(&self, tags: &[&str]) -> Result<Vec<String>>;
    fn get_extras_for_file(&self, path: impl AsRef<Path>, tag: &str) -> Result<Vec<TimeRange>>;
    fn list_tags(&self) -> Result<Vec<String>>;
    fn list_files(&self) -> Result<Vec<String>>;
    fn remove_file(&self, path: impl AsRef<Path>) -> Result<()>;
    fn remove_tag(&self, tag: &str) -> Result<()>;
    fn rename_tag(&self, old: &str, new: &str) -> Result<()>;
    fn get_caption(&self, path: impl AsRef<Path>) -> Result<Option<String>>;
    fn set_caption(&self, path: impl AsRef<Path>, caption: &str) -> Result<()>;
    fn set_caption_keeping_tags(&self, path: impl AsRef<Path>, caption: &str) -> Result<()>;
    fn rename_file(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<usize>;
    fn rename_folder(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<usize>;

    fn file_info(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let path = path.as_ref();
        let associations = self.find_associations(path)?;
        let mut tags: Vec<String> = associations.iter().map(|a| a.tag.clone()).collect();
        tags.dedup();
        Ok(FileInfo {
            file: paths::normalize_path(path)?,
            tags,
            caption: self.get_caption(path)?,
            clips: associations.into_iter().filter(|a| !a.range.is_whole()).collect(),
        })
    }
}
