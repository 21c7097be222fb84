//! archive — snapshot the runtime tree into `<archive_dir>/<campaign>/<snapshot>/`.
//!
//! Phases: Resolved -> PayloadWritten -> ManifestWritten -> Committed -> Indexed.
//!
//! Payload, manifest.json and summary.md are first built in a hidden staging directory
//! next to the final one and published with a single directory rename. Until that
//! rename succeeds a `StagingGuard` owns the work: on any early return it moves files
//! taken in `move` mode back to their runtime paths and removes the staging directory.
//! A failure after commit (index update) leaves a complete, listable snapshot.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::ident::{normalize_annotation, normalize_campaign_id, normalize_snapshot_id};
use crate::index::{upsert, IndexEntry};
use crate::lock::try_acquire_exclusive_lock;
use crate::manifest::{
    resolve_main_roles, summary_markdown, write_manifest, FileRecord, Manifest, ManifestParams,
    TransferMode, MANIFEST_FILE, SUMMARY_FILE,
};
use crate::scope::{self, RuntimeFile};
use crate::store::{ArchiveStore, DATA_DIR};
use crate::util::{copy_file_preserving_mtime, move_file, now_iso, safe_relative_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePhase {
    Resolved,
    PayloadWritten,
    ManifestWritten,
    Committed,
    Indexed,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveRequest {
    /// Raw campaign text (normalized here).
    pub campaign: String,
    /// Raw snapshot text; None derives a timestamp id.
    pub snapshot: Option<String>,
    /// Explicit main roles text; empty means auto-detect.
    pub main_roles: String,
    /// Overrides `VaultConfig::role_limit`.
    pub role_limit: Option<usize>,
    pub ai_blip: String,
    pub mode: TransferMode,
    pub note: String,
    pub extra: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct ArchiveReport {
    pub manifest: Manifest,
    /// Final snapshot directory (not created in dry-run).
    pub snapshot_dir: PathBuf,
    /// Files taken out of the runtime tree (move mode).
    pub moved: usize,
    pub dry_run: bool,
}

/// Owns an in-flight staging directory; rolls back on drop unless committed.
struct StagingGuard {
    dir: PathBuf,
    /// (runtime path, staged path) for files relocated in move mode.
    moved: Vec<(PathBuf, PathBuf)>,
    committed: bool,
}

impl StagingGuard {
    fn begin(dir: PathBuf) -> Result<Self> {
        if dir.exists() {
            // leftover of a crashed run with the same pid; never listed, safe to drop
            warn!("archive: removing stale staging dir {}", dir.display());
            fs::remove_dir_all(&dir).with_context(|| format!("remove {}", dir.display()))?;
        }
        fs::create_dir_all(dir.join(DATA_DIR))
            .with_context(|| format!("create staging dir {}", dir.display()))?;
        Ok(Self {
            dir,
            moved: Vec::new(),
            committed: false,
        })
    }

    fn commit(mut self, target: &Path) -> Result<()> {
        fs::rename(&self.dir, target).with_context(|| {
            format!("publish {} -> {}", self.dir.display(), target.display())
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (runtime, staged) in self.moved.iter().rev() {
            if let Err(e) = move_file(staged, runtime) {
                warn!(
                    "archive rollback: could not return {} to {}: {:#}",
                    staged.display(),
                    runtime.display(),
                    e
                );
            }
        }
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            warn!(
                "archive rollback: could not remove staging dir {}: {}",
                self.dir.display(),
                e
            );
        }
    }
}

fn staging_dir(store: &ArchiveStore, campaign_id: &str, snapshot_id: &str) -> PathBuf {
    store
        .campaign_dir(campaign_id)
        .join(format!(".staging-{}-{}", snapshot_id, std::process::id()))
}

fn write_payload(
    guard: &mut StagingGuard,
    files: &[RuntimeFile],
    mode: TransferMode,
) -> Result<Vec<FileRecord>> {
    let data_dir = guard.dir.join(DATA_DIR);
    let mut records = Vec::with_capacity(files.len());
    for f in files {
        let dest = data_dir.join(safe_relative_path(&f.relative)?);
        match mode {
            TransferMode::Move => {
                move_file(&f.path, &dest)?;
                guard.moved.push((f.path.clone(), dest.clone()));
            }
            TransferMode::Copy => {
                copy_file_preserving_mtime(&f.path, &dest)?;
            }
        }
        records.push(FileRecord::from_path(&dest, &f.relative, f.scope)?);
    }
    Ok(records)
}

/// Run the archive flow. Dry-run hashes the live files and writes nothing.
pub fn archive(cfg: &VaultConfig, req: &ArchiveRequest) -> Result<ArchiveReport> {
    let campaign_id = normalize_campaign_id(&req.campaign)?;
    let snapshot_id = normalize_snapshot_id(req.snapshot.as_deref())?;
    let store = ArchiveStore::open(cfg);
    let root = store.root().to_path_buf();

    let files = scope::resolve(&root, store.archive_root(), &req.extra)?;
    if files.is_empty() {
        return Err(VaultError::NothingToArchive { root }.into());
    }
    debug!(
        "archive: {}/{} phase={:?} files={}",
        campaign_id,
        snapshot_id,
        ArchivePhase::Resolved,
        files.len()
    );

    let limit = req.role_limit.unwrap_or(cfg.role_limit).max(1);
    // roles are detected before any file leaves the runtime tree
    let main_roles = resolve_main_roles(&root, cfg, &req.main_roles, limit)?;
    let params = ManifestParams {
        campaign_id: campaign_id.clone(),
        snapshot_id: snapshot_id.clone(),
        mode: req.mode,
        main_roles,
        ai_blip: normalize_annotation(&req.ai_blip),
        note: req.note.clone(),
        source_root: root.display().to_string(),
    };
    let scope_counts = scope::scope_counts(&files);

    let snapshot_dir = store.snapshot_dir(&campaign_id, &snapshot_id);
    if snapshot_dir.exists() {
        return Err(VaultError::SnapshotAlreadyExists { path: snapshot_dir }.into());
    }

    if req.dry_run {
        let records = files
            .iter()
            .map(|f| FileRecord::from_path(&f.path, &f.relative, f.scope))
            .collect::<Result<Vec<_>>>()?;
        let manifest = Manifest::assemble(params, now_iso(), scope_counts, records);
        return Ok(ArchiveReport {
            manifest,
            snapshot_dir,
            moved: 0,
            dry_run: true,
        });
    }

    let _lock = try_acquire_exclusive_lock(store.archive_root())?;
    if snapshot_dir.exists() {
        return Err(VaultError::SnapshotAlreadyExists { path: snapshot_dir }.into());
    }

    let mut guard = StagingGuard::begin(staging_dir(&store, &campaign_id, &snapshot_id))?;
    let records = write_payload(&mut guard, &files, req.mode)?;
    let moved = guard.moved.len();
    debug!(
        "archive: {}/{} phase={:?} moved={}",
        campaign_id,
        snapshot_id,
        ArchivePhase::PayloadWritten,
        moved
    );

    let manifest = Manifest::assemble(params, now_iso(), scope_counts, records);
    write_manifest(&guard.dir.join(MANIFEST_FILE), &manifest)?;
    let summary = guard.dir.join(SUMMARY_FILE);
    fs::write(&summary, summary_markdown(&manifest))
        .with_context(|| format!("write {}", summary.display()))?;
    debug!(
        "archive: {}/{} phase={:?}",
        campaign_id,
        snapshot_id,
        ArchivePhase::ManifestWritten
    );

    guard.commit(&snapshot_dir)?;
    debug!(
        "archive: {}/{} phase={:?}",
        campaign_id,
        snapshot_id,
        ArchivePhase::Committed
    );

    upsert(store.archive_root(), IndexEntry::from_manifest(&manifest)).with_context(|| {
        format!(
            "snapshot {} was written but the archive index was not updated",
            snapshot_dir.display()
        )
    })?;
    info!(
        "archive: {}/{} indexed ({} files, {})",
        campaign_id, snapshot_id, manifest.counts.files, manifest.counts.bytes_human
    );
    debug!("archive: phase={:?}", ArchivePhase::Indexed);

    Ok(ArchiveReport {
        manifest,
        snapshot_dir,
        moved,
        dry_run: false,
    })
}
