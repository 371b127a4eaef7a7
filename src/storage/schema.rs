pub const CREATE_VERSION_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS version (version INTEGER PRIMARY KEY)";

// `end` is quoted everywhere: it is an SQL keyword.
pub const CREATE_TAGS_FILES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS tags_files (
        file TEXT NOT NULL,
        tag TEXT NOT NULL,
        start INTEGER,
        "end" INTEGER,
        CONSTRAINT pk_tf PRIMARY KEY (file, tag, start, "end")
    )
"#;

pub const CREATE_INDEX_TAG: &str = "CREATE INDEX IF NOT EXISTS idx_tags ON tags_files (tag)";

pub const CREATE_INDEX_FILE: &str = "CREATE INDEX IF NOT EXISTS idx_files ON tags_files (file)";

pub const CREATE_CAPTION_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS caption (
        file TEXT NOT NULL PRIMARY KEY,
        caption TEXT
    )
";

// SQLite treats NULLs as distinct in the primary key, so whole-file rows
// need their own uniqueness guarantee.
pub const DEDUPLICATE_TAGS_FILES: &str = r#"
    DELETE FROM tags_files
    WHERE rowid NOT IN (
        SELECT MIN(rowid) FROM tags_files GROUP BY file, tag, start, "end"
    )
"#;

pub const CREATE_INDEX_ASSOCIATION_KEY: &str = r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_files_key
    ON tags_files (file, tag, IFNULL(start, -1), IFNULL("end", -1))
"#;

/// Statements that move the schema from version `i` to `i + 1`.
pub const MIGRATIONS: &[&[&str]] = &[
    &[
        CREATE_TAGS_FILES_TABLE,
        CREATE_INDEX_TAG,
        CREATE_INDEX_FILE,
        CREATE_CAPTION_TABLE,
    ],
    // Version 2 makes whole-file rows unique despite their NULL ranges.
    // Stores created before captions existed reach version 1 without the table.
    &[
        CREATE_CAPTION_TABLE,
        DEDUPLICATE_TAGS_FILES,
        CREATE_INDEX_ASSOCIATION_KEY,
    ],
];

pub const LATEST_VERSION: i64 = MIGRATIONS.len() as i64;
