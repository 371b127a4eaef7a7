use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use sittagger::config::DbLocation;
use sittagger::errors::{Result, TagError};
use sittagger::fsops::{self, NoThumbnails};
use sittagger::logging;
use sittagger::storage::TagStorage;
use sittagger::storage::sqlite::SqliteStorage;

#[derive(Parser)]
#[command(name = "sittagger", version, about = "Tag files and query them by tag")]
struct Cli {
    /// Tag database to use
    #[arg(short = 'd', long = "database", value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    /// Output results as JSON
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add (+tag) or remove (-tag) tags on files
    Set {
        /// Mix of +tag, -tag and file paths
        #[arg(required = true, allow_hyphen_values = true, trailing_var_arg = true)]
        items: Vec<String>,
    },

    /// Show the tags of files
    Show {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List files carrying every given tag
    Query {
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Rename a tag everywhere, captions included
    RenameTag { old: String, new: String },

    /// Move a file on disk and keep its tags
    RenameFile {
        old: PathBuf,
        new: PathBuf,

        /// Move a whole directory
        #[arg(short, long)]
        recursive: bool,
    },

    /// List every known tag
    ListTags,

    /// List every tagged file
    ListFiles,

    /// Forget the tags and captions of files
    UntrackFiles {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the caption of a file
    GetCaption { file: PathBuf },

    /// Set the caption of a file; its #tags become the file's tags
    SetCaption {
        file: PathBuf,
        text: String,

        /// Keep tags that the caption does not mention
        #[arg(long)]
        keep_existing_tags: bool,
    },
}

#[derive(Serialize)]
struct StatusResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    changed: Option<usize>,
}

#[derive(Debug, Default, PartialEq)]
struct SetItems {
    add: Vec<String>,
    remove: Vec<String>,
    files: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    logging::init();

    if let Err(e) = run(cli) {
        if json {
            eprintln!("{}", serde_json::json!({"error": e.to_string()}));
        } else {
            eprintln!("error: {}", e);
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let storage = open_storage(cli.database)?;
    let json = cli.json;

    match cli.command {
        Commands::Set { items } => cmd_set(&storage, items, json),
        Commands::Show { files } => cmd_show(&storage, &files, json),
        Commands::Query { tags } => cmd_query(&storage, &tags, json),
        Commands::RenameTag { old, new } => cmd_rename_tag(&storage, &old, &new, json),
        Commands::RenameFile { old, new, recursive } => {
            cmd_rename_file(&storage, &old, &new, recursive, json)
        }
        Commands::ListTags => print_list(&storage.list_tags()?, json),
        Commands::ListFiles => print_list(&storage.list_files()?, json),
        Commands::UntrackFiles { files } => cmd_untrack(&storage, &files, json),
        Commands::GetCaption { file } => cmd_get_caption(&storage, &file, json),
        Commands::SetCaption {
            file,
            text,
            keep_existing_tags,
        } => cmd_set_caption(&storage, &file, &text, keep_existing_tags, json),
    }
}

fn open_storage(database: Option<PathBuf>) -> Result<SqliteStorage> {
    let path = DbLocation::from_env(database).resolve()?;
    SqliteStorage::open(&path)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn print_status(json: bool, message: String, changed: Option<usize>) -> Result<()> {
    if json {
        print_json(&StatusResponse {
            success: true,
            message,
            changed,
        })
    } else {
        println!("{}", message);
        Ok(())
    }
}

fn print_list(values: &[String], json: bool) -> Result<()> {
    if json {
        return print_json(&values);
    }
    for value in values {
        println!("{}", value);
    }
    Ok(())
}

fn parse_set_items(items: Vec<String>) -> SetItems {
    let mut parsed = SetItems::default();
    for item in items {
        if let Some(tag) = item.strip_prefix('+') {
            if !parsed.add.iter().any(|t| t == tag) {
                parsed.add.push(tag.to_string());
            }
        } else if let Some(tag) = item.strip_prefix('-') {
            if !parsed.remove.iter().any(|t| t == tag) {
                parsed.remove.push(tag.to_string());
            }
        } else {
            parsed.files.push(item);
        }
    }
    parsed
}

fn cmd_set(storage: &SqliteStorage, items: Vec<String>, json: bool) -> Result<()> {
    let items = parse_set_items(items);
    if items.files.is_empty() {
        return Err(TagError::InvalidInput("at least one file should be given".into()));
    }
    if items.add.is_empty() && items.remove.is_empty() {
        return Err(TagError::InvalidInput(
            "at least one tag should be added or removed".into(),
        ));
    }
    if items.add.iter().chain(&items.remove).any(|tag| tag.is_empty()) {
        return Err(TagError::InvalidInput("tag names cannot be empty".into()));
    }

    let add: Vec<&str> = items.add.iter().map(String::as_str).collect();
    let remove: Vec<&str> = items.remove.iter().map(String::as_str).collect();
    let mut missing = Vec::new();
    let mut updated = 0;
    for file in &items.files {
        if !Path::new(file).exists() {
            warn!(file = %file, "file not found, skipped");
            missing.push(file.as_str());
            continue;
        }
        storage.batch(|b| {
            b.tag_file(file, &add)?;
            b.untag_file(file, &remove)
        })?;
        updated += 1;
    }

    if !missing.is_empty() {
        return Err(TagError::NotFound(missing.join(", ")));
    }
    print_status(json, format!("Updated {} file(s).", updated), Some(updated))
}

fn cmd_show(storage: &SqliteStorage, files: &[PathBuf], json: bool) -> Result<()> {
    if json {
        let infos = files
            .iter()
            .map(|file| storage.file_info(file))
            .collect::<Result<Vec<_>>>()?;
        return print_json(&infos);
    }

    for file in files {
        let info = storage.file_info(file)?;
        println!("{} = [{}]", info.file, info.tags.join(", "));
    }
    Ok(())
}

fn cmd_query(storage: &SqliteStorage, tags: &[String], json: bool) -> Result<()> {
    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
    print_list(&storage.find_files_by_tags(&tags)?, json)
}

fn cmd_rename_tag(storage: &SqliteStorage, old: &str, new: &str, json: bool) -> Result<()> {
    if new.is_empty() {
        return Err(TagError::InvalidInput("the new tag name is empty".into()));
    }
    storage.rename_tag(old, new)?;
    print_status(json, format!("Renamed tag \"{}\" to \"{}\".", old, new), None)
}

fn cmd_rename_file(
    storage: &SqliteStorage,
    old: &Path,
    new: &Path,
    recursive: bool,
    json: bool,
) -> Result<()> {
    let moved = if old.is_dir() {
        if !recursive {
            return Err(TagError::InvalidInput(format!(
                "{} is a directory, use --recursive",
                old.display()
            )));
        }
        fsops::move_folder(old, new, storage, &NoThumbnails)?
    } else {
        fsops::move_file(old, new, storage, &NoThumbnails)?
    };
    print_status(
        json,
        format!("Moved {} to {}.", old.display(), new.display()),
        Some(moved),
    )
}

fn cmd_untrack(storage: &SqliteStorage, files: &[PathBuf], json: bool) -> Result<()> {
    storage.batch(|b| files.iter().try_for_each(|file| b.remove_file(file)))?;
    print_status(
        json,
        format!("Untracked {} file(s).", files.len()),
        Some(files.len()),
    )
}

fn cmd_get_caption(storage: &SqliteStorage, file: &Path, json: bool) -> Result<()> {
    let caption = storage.get_caption(file)?;
    if json {
        return print_json(&serde_json::json!({ "caption": caption }));
    }
    if let Some(caption) = caption {
        println!("{}", caption);
    }
    Ok(())
}

fn cmd_set_caption(
    storage: &SqliteStorage,
    file: &Path,
    text: &str,
    keep_existing_tags: bool,
    json: bool,
) -> Result<()> {
    if keep_existing_tags {
        storage.set_caption_keeping_tags(file, text)?;
    } else {
        storage.set_caption(file, text)?;
    }
    if json {
        return print_json(&storage.file_info(file)?);
    }
    let tags = storage.find_tags_by_file(file)?;
    println!("{} = [{}]", file.display(), tags.join(", "));
    Ok(())
}
