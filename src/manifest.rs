//! manifest — the authoritative, write-once record of one snapshot.
//!
//! Файл манифеста (JSON, pretty) хранится в
//! `<archive_dir>/<campaign_id>/<snapshot_id>/manifest.json`, рядом — `summary.md`.
//!
//! Структура (schema_version = 1):
//! - campaign_id, snapshot_id, created_at, archive_mode
//! - main_roles / main_roles_label / ai_blip / save_filename_hint / note / source_root
//! - scope_counts: scope -> count
//! - counts { files, bytes, bytes_human }
//! - files: [FileRecord { relative_path, scope, size_bytes, mtime, sha256 }]
//!
//! Reader rules: `files`, `campaign_id`, `snapshot_id` are mandatory and a newer
//! schema_version is refused; everything else falls back to serde defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::ident::{normalize_filename_piece, parse_roles};
use crate::scope::Scope;
use crate::util::glob::GlobPattern;
use crate::util::{human_size, sha256_file, system_time_iso};

pub const SCHEMA_VERSION: u32 = 1;
pub const MANIFEST_TYPE: &str = "trpg_runtime_archive";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SUMMARY_FILE: &str = "summary.md";

/// Label used when a snapshot has no main roles.
pub const ROLES_PLACEHOLDER: &str = "party";
const BLIP_FALLBACK: &str = "summary";

/// Move or copy, both at archive time and (independently) at restore time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Move,
    Copy,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferMode::Move => "move",
            TransferMode::Copy => "copy",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub relative_path: String,
    pub scope: Scope,
    pub size_bytes: u64,
    pub mtime: String,
    #[serde(default)]
    pub sha256: String,
}

impl FileRecord {
    /// Stat + hash `path` (the payload copy, or the live file in preview mode).
    pub fn from_path(path: &Path, relative: &str, scope: Scope) -> Result<Self> {
        let md = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        let mtime = md
            .modified()
            .with_context(|| format!("mtime of {}", path.display()))?;
        Ok(Self {
            relative_path: relative.to_string(),
            scope,
            size_bytes: md.len(),
            mtime: system_time_iso(mtime),
            sha256: sha256_file(path)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub files: usize,
    pub bytes: u64,
    pub bytes_human: String,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_manifest_type() -> String {
    MANIFEST_TYPE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(rename = "type", default = "default_manifest_type")]
    pub kind: String,
    pub campaign_id: String,
    pub snapshot_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub archive_mode: TransferMode,
    #[serde(default)]
    pub main_roles: Vec<String>,
    #[serde(default)]
    pub main_roles_label: String,
    #[serde(default)]
    pub ai_blip: String,
    #[serde(default)]
    pub save_filename_hint: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub source_root: String,
    #[serde(default)]
    pub scope_counts: BTreeMap<String, usize>,
    #[serde(default)]
    pub counts: Counts,
    pub files: Vec<FileRecord>,
}

/// Caller-side fields of a manifest (everything except per-file data).
#[derive(Debug, Clone)]
pub struct ManifestParams {
    pub campaign_id: String,
    pub snapshot_id: String,
    pub mode: TransferMode,
    pub main_roles: Vec<String>,
    pub ai_blip: String,
    pub note: String,
    pub source_root: String,
}

impl Manifest {
    /// Assemble a manifest; counts are derived from `files` so the invariants hold.
    pub fn assemble(
        params: ManifestParams,
        created_at: String,
        scope_counts: BTreeMap<String, usize>,
        files: Vec<FileRecord>,
    ) -> Self {
        let bytes: u64 = files.iter().map(|f| f.size_bytes).sum();
        let label = roles_label(&params.main_roles);
        let hint = save_filename_hint(&params.snapshot_id, &params.main_roles, &params.ai_blip);
        Self {
            schema_version: SCHEMA_VERSION,
            kind: MANIFEST_TYPE.to_string(),
            campaign_id: params.campaign_id,
            snapshot_id: params.snapshot_id,
            created_at,
            archive_mode: params.mode,
            main_roles: params.main_roles,
            main_roles_label: label,
            ai_blip: params.ai_blip,
            save_filename_hint: hint,
            note: params.note,
            source_root: params.source_root,
            scope_counts,
            counts: Counts {
                files: files.len(),
                bytes,
                bytes_human: human_size(bytes),
            },
            files,
        }
    }

    /// Label shown in listings; tolerates manifests written without one.
    pub fn roles_label(&self) -> &str {
        if self.main_roles_label.is_empty() {
            ROLES_PLACEHOLDER
        } else {
            &self.main_roles_label
        }
    }
}

// ---------------- roles ----------------

pub fn roles_label(roles: &[String]) -> String {
    if roles.is_empty() {
        ROLES_PLACEHOLDER.to_string()
    } else {
        roles.join("+")
    }
}

/// `save_{snapshot}_{roles}[_{blip}].md`; advisory only.
pub fn save_filename_hint(snapshot_id: &str, roles: &[String], ai_blip: &str) -> String {
    let role_part = normalize_filename_piece(&roles_label(roles), ROLES_PLACEHOLDER);
    if ai_blip.is_empty() {
        format!("save_{snapshot_id}_{role_part}.md")
    } else {
        let blip_part = normalize_filename_piece(ai_blip, BLIP_FALLBACK);
        format!("save_{snapshot_id}_{role_part}_{blip_part}.md")
    }
}

fn canonical_character_name<'a>(stem: &'a str, deceased_suffix: &str) -> &'a str {
    let name = stem.trim();
    match name.strip_suffix(deceased_suffix) {
        Some(rest) if !deceased_suffix.is_empty() && !rest.trim().is_empty() => rest.trim(),
        _ => name,
    }
}

/// Most recently modified living character sheets, newest first, up to `limit`.
pub fn detect_main_roles(root: &Path, cfg: &VaultConfig, limit: usize) -> Result<Vec<String>> {
    let pattern = GlobPattern::new(crate::scope::CHARACTERS_GLOB)?;
    let mut sheets: Vec<(std::time::SystemTime, String, String)> = Vec::new();
    for (path, relative) in pattern.matches(root, |_| false) {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let mtime = fs::metadata(&path)
            .and_then(|m| m.modified())
            .with_context(|| format!("stat {}", path.display()))?;
        sheets.push((mtime, relative, stem.to_string()));
    }
    sheets.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut names: Vec<String> = Vec::new();
    for (_, _, stem) in &sheets {
        if !cfg.deceased_suffix.is_empty() && stem.ends_with(&cfg.deceased_suffix) {
            continue;
        }
        if cfg
            .excluded_role_prefixes
            .iter()
            .any(|p| !p.is_empty() && stem.starts_with(p.as_str()))
        {
            continue;
        }
        let name = canonical_character_name(stem, &cfg.deceased_suffix);
        if name.is_empty() || names.iter().any(|n| n == name) {
            continue;
        }
        names.push(name.to_string());
        if names.len() >= limit {
            break;
        }
    }
    Ok(names)
}

/// Explicit role text wins when it yields at least one name; otherwise auto-detect.
pub fn resolve_main_roles(
    root: &Path,
    cfg: &VaultConfig,
    explicit: &str,
    limit: usize,
) -> Result<Vec<String>> {
    let limit = limit.max(1);
    if !explicit.trim().is_empty() {
        let mut roles = parse_roles(explicit);
        if !roles.is_empty() {
            roles.truncate(limit);
            return Ok(roles);
        }
    }
    detect_main_roles(root, cfg, limit)
}

// ---------------- summary ----------------

fn or_dash(s: &str, dash: &str) -> String {
    if s.is_empty() {
        dash.to_string()
    } else {
        s.to_string()
    }
}

/// Human-readable companion of manifest.json.
pub fn summary_markdown(m: &Manifest) -> String {
    let mut lines: Vec<String> = vec![
        format!("# Archived snapshot `{}`", m.snapshot_id),
        String::new(),
        "## Metadata".to_string(),
        format!("- Campaign: `{}`", m.campaign_id),
        format!("- Snapshot: `{}`", m.snapshot_id),
        format!("- Created at: `{}`", m.created_at),
        format!("- Archive mode: `{}`", m.archive_mode),
        format!("- Main roles: `{}`", m.roles_label()),
        format!("- AI blip: `{}`", or_dash(&m.ai_blip, "(none)")),
        format!(
            "- Suggested save name: `{}`",
            or_dash(&m.save_filename_hint, "(not generated)")
        ),
        format!("- Source root: `{}`", m.source_root),
        format!("- Files: `{}`", m.counts.files),
        format!("- Total size: `{}`", m.counts.bytes_human),
        String::new(),
        "## Note".to_string(),
        or_dash(&m.note, "(none)"),
        String::new(),
        "## Scope counts".to_string(),
        "| Scope | Files |".to_string(),
        "|---|---:|".to_string(),
    ];
    for (scope, count) in &m.scope_counts {
        lines.push(format!("| `{scope}` | {count} |"));
    }

    lines.push(String::new());
    lines.push("## Files".to_string());
    lines.push("| File | Scope | Size |".to_string());
    lines.push("|---|---|---:|".to_string());
    for f in &m.files {
        lines.push(format!(
            "| `{}` | {} | {} |",
            f.relative_path,
            f.scope,
            human_size(f.size_bytes)
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

// ---------------- IO ----------------

/// Read and validate a manifest. Any schema problem is `CorruptManifest`.
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let corrupt = |reason: String| -> anyhow::Error {
        VaultError::CorruptManifest {
            path: path.to_path_buf(),
            reason,
        }
        .into()
    };

    let bytes = fs::read(path).with_context(|| format!("read manifest {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("invalid json: {e}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| corrupt("top level is not an object".to_string()))?;
    if obj.is_empty() {
        return Err(corrupt("manifest is empty".to_string()));
    }
    for key in ["files", "campaign_id", "snapshot_id"] {
        if !obj.contains_key(key) {
            return Err(corrupt(format!("missing required key `{key}`")));
        }
    }
    let m: Manifest =
        serde_json::from_value(value).map_err(|e| corrupt(format!("schema mismatch: {e}")))?;
    if m.schema_version > SCHEMA_VERSION {
        return Err(corrupt(format!(
            "unsupported schema_version {} (supported up to {})",
            m.schema_version, SCHEMA_VERSION
        )));
    }
    Ok(m)
}

pub fn write_manifest(path: &Path, m: &Manifest) -> Result<()> {
    crate::util::write_json_atomic(path, m)
}
