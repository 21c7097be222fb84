//! Identifier normalization: free-form user text -> filesystem-safe tokens.
//!
//! Pure functions, no I/O (the only clock read is the default snapshot id).

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::VaultError;

/// Characters illegal in a path component on at least one supported platform.
static ILLEGAL_PATH_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NON_SNAPSHOT_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9A-Za-z_-]").unwrap());
static NON_PIECE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\x{4e00}-\x{9fff}+\-]+").unwrap());
static UNDERSCORE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());
static ROLE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+,，、/;；\s]+").unwrap());

pub const ANNOTATION_MAX_CHARS: usize = 20;
pub const FILENAME_PIECE_MAX_CHARS: usize = 32;

fn trim_dots_underscores(s: &str) -> &str {
    s.trim_matches(|c| c == '.' || c == '_')
}

fn take_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

pub fn normalize_campaign_id(value: &str) -> Result<String> {
    let text = WHITESPACE_RUN.replace_all(value.trim(), "_");
    let text = ILLEGAL_PATH_CHARS.replace_all(&text, "");
    let text = trim_dots_underscores(&text);
    if text.is_empty() {
        return Err(VaultError::EmptyIdentifier { what: "campaign" }.into());
    }
    Ok(text.to_string())
}

/// `None` (or blank) derives the id from the local clock as `YYYYMMDD_HHMMSS`.
pub fn normalize_snapshot_id(value: Option<&str>) -> Result<String> {
    let raw = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(default_snapshot_id()),
    };
    let text = ILLEGAL_PATH_CHARS.replace_all(raw, "_");
    let text = NON_SNAPSHOT_CHAR.replace_all(&text, "_");
    let text = trim_dots_underscores(&text);
    if text.is_empty() {
        return Err(VaultError::EmptyIdentifier { what: "snapshot" }.into());
    }
    Ok(text.to_string())
}

pub fn default_snapshot_id() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Short free-text annotation ("AI blip"): whitespace collapsed, at most 20 chars.
pub fn normalize_annotation(value: &str) -> String {
    let text = WHITESPACE_RUN.replace_all(value.trim(), " ");
    take_chars(&text, ANNOTATION_MAX_CHARS)
}

/// One `_`-separated piece of a derived file name. Returns `fallback` when nothing survives.
pub fn normalize_filename_piece(value: &str, fallback: &str) -> String {
    let text = ILLEGAL_PATH_CHARS.replace_all(value.trim(), "");
    let text = WHITESPACE_RUN.replace_all(&text, "_");
    let text = NON_PIECE_RUN.replace_all(&text, "_");
    let text = UNDERSCORE_RUN.replace_all(&text, "_");
    let text = trim_dots_underscores(&text);
    if text.is_empty() {
        return fallback.to_string();
    }
    take_chars(text, FILENAME_PIECE_MAX_CHARS)
}

/// Split role text on `+ , ， 、 / ; ；` and whitespace, keeping first-seen order.
pub fn parse_roles(value: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in ROLE_SEPARATORS.split(value.trim()) {
        let name = part.trim();
        if name.is_empty() || out.iter().any(|n| n == name) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}
