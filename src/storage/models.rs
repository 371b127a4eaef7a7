use serde::Serialize;

/// Time span of a tagged clip, in milliseconds from the start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl TimeRange {
    /// The range covering the whole file.
    pub const WHOLE: TimeRange = TimeRange { start: None, end: None };

    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn is_whole(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::WHOLE
    }
}

/// One row of the file/tag relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagAssociation {
    pub file: String,
    pub tag: String,
    pub range: TimeRange,
}

/// Everything known about one file, as shown by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub file: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Tags attached to part of the file only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clips: Vec<TagAssociation>,
}
