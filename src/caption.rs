//! Conversion between caption text and the tags it embeds.
//!
//! A caption may contain inline tag markers: `#word` for tags made only of
//! word characters and hyphens, or `#[any text]` for everything else, with
//! `]` and `\` escaped by a backslash. A marker only counts when it starts
//! the text or follows whitespace, so `foo#bar` holds no tag.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static CAPTION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(#[\w-]+|#\[(?:\\.|[^\]])+\])").expect("static regex must compile")
});
static COMPLEX_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w-]").expect("static regex must compile"));

/// A tag marker found in a caption, with its byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMarker {
    pub tag: String,
    pub start: usize,
    pub end: usize,
}

/// Strips the marker syntax and resolves backslash escapes.
pub fn unhash_tag(marker: &str) -> String {
    let inner = marker.strip_prefix('#').unwrap_or(marker);
    let inner = inner.strip_prefix('[').unwrap_or(inner);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped) => out.push(escaped),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Renders a tag as the shortest marker that parses back to it. The empty
/// name has no such marker; `#[]` is returned for it and never matches.
pub fn hash_tag(tag: &str) -> String {
    if !tag.is_empty() && !COMPLEX_TAG.is_match(tag) {
        return format!("#{tag}");
    }
    let mut escaped = String::with_capacity(tag.len() + 3);
    escaped.push_str("#[");
    for c in tag.chars() {
        if matches!(c, '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push(']');
    escaped
}

pub fn extract_tags_with_positions(caption: &str) -> Vec<TagMarker> {
    CAPTION_TAG
        .captures_iter(caption)
        .filter_map(|caps| caps.get(1))
        .map(|m| TagMarker {
            tag: unhash_tag(m.as_str()),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Tags in order of appearance; duplicates are kept.
pub fn extract_tags(caption: &str) -> Vec<String> {
    extract_tags_with_positions(caption)
        .into_iter()
        .map(|marker| marker.tag)
        .collect()
}

/// Replaces the first marker of `old` with a marker of `new`.
pub fn rename_tag_in_caption(caption: &str, old: &str, new: &str) -> String {
    match extract_tags_with_positions(caption)
        .into_iter()
        .find(|marker| marker.tag == old)
    {
        Some(marker) => {
            let replaced = format!(
                "{} {} {}",
                &caption[..marker.start],
                hash_tag(new),
                &caption[marker.end..]
            );
            clean_spaces(&replaced)
        }
        None => caption.to_string(),
    }
}

/// Rewrites `caption` so its markers name exactly `tags`.
///
/// Markers for tags no longer wanted are cut out; missing tags are appended
/// at the end in the order given. Text around the markers is preserved.
/// Empty tag names are skipped.
pub fn tags_to_caption<S: AsRef<str>>(tags: &[S], caption: &str) -> String {
    let markers = extract_tags_with_positions(caption);
    let present: HashSet<&str> = markers.iter().map(|m| m.tag.as_str()).collect();
    let wanted: HashSet<&str> = tags.iter().map(|t| t.as_ref()).collect();

    let mut text = caption.to_string();
    for marker in markers.iter().rev() {
        if !wanted.contains(marker.tag.as_str()) {
            text.replace_range(marker.start..marker.end, "");
        }
    }
    let mut text = clean_spaces(&text);

    let mut added = HashSet::new();
    let to_add: Vec<String> = tags
        .iter()
        .map(|t| t.as_ref())
        .filter(|tag| !tag.is_empty() && !present.contains(tag) && added.insert(*tag))
        .map(hash_tag)
        .collect();
    if !to_add.is_empty() {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&to_add.join(" "));
    }
    text
}

/// Drops leading and trailing spaces of every line and squeezes runs of
/// spaces. Newlines and other whitespace are left alone.
pub fn clean_spaces(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let mut out = String::with_capacity(line.len());
            for c in line.trim_matches(' ').chars() {
                if c == ' ' && out.ends_with(' ') {
                    continue;
                }
                out.push(c);
            }
            out
        })
        .collect::<Vec<_>>()
        .join("\n")
}
