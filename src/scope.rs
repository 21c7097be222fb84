//! Scope resolution: which runtime files are currently "in play".
//!
//! Six fixed scopes, each bound to one root-relative glob, are resolved in declaration
//! order into a map keyed by relative path (first writer wins); caller-supplied extra
//! patterns follow with the `extra` tag. The archive directory is never descended into.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::util::glob::GlobPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Characters,
    SessionLogs,
    CombatLogs,
    ExplorationLogs,
    SystemLogs,
    Saves,
    Extra,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Characters => "characters",
            Scope::SessionLogs => "session_logs",
            Scope::CombatLogs => "combat_logs",
            Scope::ExplorationLogs => "exploration_logs",
            Scope::SystemLogs => "system_logs",
            Scope::Saves => "saves",
            Scope::Extra => "extra",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed scopes in precedence order.
pub const RUNTIME_SCOPES: [(Scope, &str); 6] = [
    (Scope::Characters, "characters/active/*.md"),
    (Scope::SessionLogs, "logs/session/*.md"),
    (Scope::CombatLogs, "logs/combat/*.md"),
    (Scope::ExplorationLogs, "logs/exploration/*.md"),
    (Scope::SystemLogs, "logs/system/*.md"),
    (Scope::Saves, "saves/save_*.md"),
];

/// Directory holding active character sheets (also the role auto-detection source).
pub const CHARACTERS_GLOB: &str = "characters/active/*.md";

/// Template and tool files that live next to runtime files but are never runtime state.
pub const EXCLUDED_BASENAMES_LOWER: [&str; 3] = [
    "save_initial_template.md",
    "save_manager.md",
    "save_manager.py",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFile {
    pub path: PathBuf,
    /// POSIX-style, relative to the project root. Identity key.
    pub relative: String,
    pub scope: Scope,
}

fn is_excluded_basename(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| {
            let lower = n.to_lowercase();
            EXCLUDED_BASENAMES_LOWER.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

fn claim(
    seen: &mut BTreeMap<String, RuntimeFile>,
    pattern: &GlobPattern,
    root: &Path,
    archive_root: &Path,
    scope: Scope,
    apply_denylist: bool,
) {
    let mut hits = pattern.matches(root, |p| p.starts_with(archive_root));
    hits.sort_by(|a, b| a.1.cmp(&b.1));
    for (path, relative) in hits {
        if apply_denylist && is_excluded_basename(&path) {
            continue;
        }
        seen.entry(relative.clone()).or_insert(RuntimeFile {
            path,
            relative,
            scope,
        });
    }
}

/// Resolve the runtime file set, sorted by relative path.
///
/// `archive_root` is an absolute path; nothing beneath it is ever returned.
pub fn resolve(root: &Path, archive_root: &Path, extra: &[String]) -> Result<Vec<RuntimeFile>> {
    let mut seen: BTreeMap<String, RuntimeFile> = BTreeMap::new();

    for (scope, glob) in RUNTIME_SCOPES {
        let pattern = GlobPattern::new(glob)?;
        claim(&mut seen, &pattern, root, archive_root, scope, true);
    }

    for raw in extra {
        if raw.trim().is_empty() {
            continue;
        }
        let pattern = GlobPattern::new(raw)?;
        claim(&mut seen, &pattern, root, archive_root, Scope::Extra, false);
    }

    log::debug!("scope: resolved {} runtime file(s) under {}", seen.len(), root.display());
    // BTreeMap iteration is already ordered by relative path.
    Ok(seen.into_values().collect())
}

/// Per-scope counts, keyed by scope name.
pub fn scope_counts(files: &[RuntimeFile]) -> BTreeMap<String, usize> {
    let mut out = BTreeMap::new();
    for f in files {
        *out.entry(f.scope.as_str().to_string()).or_insert(0) += 1;
    }
    out
}

/// Sum of current on-disk sizes; files that vanished since resolution count as 0.
pub fn total_bytes(files: &[RuntimeFile]) -> u64 {
    files
        .iter()
        .map(|f| std::fs::metadata(&f.path).map(|m| m.len()).unwrap_or(0))
        .sum()
}
