//! Domain failures of the archive/restore engine.
//!
//! Операции возвращают `anyhow::Result`; доменные отказы упакованы как `VaultError`,
//! так что граница команды (и тесты) могут сделать `downcast_ref::<VaultError>()`.

use std::path::PathBuf;

use thiserror::Error;

/// How many paths a list-carrying error prints before collapsing into "... and N more".
pub const DISPLAY_CAP: usize = 20;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("{what} id is empty after normalization")]
    EmptyIdentifier { what: &'static str },

    #[error("no runtime files to archive under {}", root.display())]
    NothingToArchive { root: PathBuf },

    #[error("snapshot already exists: {}", path.display())]
    SnapshotAlreadyExists { path: PathBuf },

    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    #[error(
        "snapshot not found: {campaign}/{}",
        snapshot.as_deref().unwrap_or("<latest>")
    )]
    SnapshotNotFound {
        campaign: String,
        snapshot: Option<String>,
    },

    #[error("corrupt manifest {}: {reason}", path.display())]
    CorruptManifest { path: PathBuf, reason: String },

    #[error("archive index {} is unreadable: {source}", path.display())]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid relative path in manifest: {0:?}")]
    PathTraversal(String),

    #[error("snapshot payload is missing {} file(s): {}", files.len(), capped_list(files))]
    MissingPayload { files: Vec<String> },

    #[error(
        "{} destination file(s) already exist; archive the current session first or pass --force: {}",
        files.len(),
        capped_list(files)
    )]
    DestinationCollision { files: Vec<String> },

    #[error("hash mismatch after restore: {path} (expected {expected}, got {actual})")]
    IntegrityViolation {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Join at most `DISPLAY_CAP` items, then summarize the remainder.
pub fn capped_list(items: &[String]) -> String {
    let mut out = items
        .iter()
        .take(DISPLAY_CAP)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > DISPLAY_CAP {
        out.push_str(&format!(" ... and {} more", items.len() - DISPLAY_CAP));
    }
    out
}
