//! restore — re-materialize a stored snapshot into the runtime tree.
//!
//! Сценарий:
//! 1) резолвим манифест (явный snapshot id или самый свежий в кампании);
//! 2) проверяем наличие data/; пустой список файлов — no-op;
//! 3) все relative_path проверяются на выход за корень ДО любых изменений;
//! 4) pre-flight: отсутствующие в payload файлы (фатально) и занятые цели
//!    (фатально без force), включая файл на месте родительского каталога цели;
//! 5) перенос copy/move, независимо от режима, которым снапшот создавался;
//! 6) сверка SHA-256 с манифестом (если не отключена).
//!
//! Each file goes to a hidden temporary sibling first and is renamed into place only
//! after its digest checks out. A mismatch stops the restore; files restored before it
//! stay where they are.

use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::ident::{normalize_campaign_id, normalize_snapshot_id};
use crate::lock::try_acquire_exclusive_lock;
use crate::manifest::{FileRecord, TransferMode};
use crate::store::{ArchiveStore, StoredSnapshot, DATA_DIR};
use crate::util::{
    copy_file_preserving_mtime, move_file, remove_existing_path, safe_relative_path, sha256_file,
};

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub campaign: String,
    /// None restores the newest snapshot of the campaign.
    pub snapshot: Option<String>,
    /// Overwrite files already present in the runtime tree.
    pub force: bool,
    /// Copy (default) or move files out of the archive payload.
    pub mode: TransferMode,
    /// Re-hash every restored file against the manifest.
    pub verify: bool,
    pub dry_run: bool,
}

impl Default for RestoreRequest {
    fn default() -> Self {
        Self {
            campaign: String::new(),
            snapshot: None,
            force: false,
            mode: TransferMode::Copy,
            verify: true,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestoreItem {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Non-directory sitting where a parent directory of `target` belongs.
    pub blocked_by: Option<PathBuf>,
    pub record: FileRecord,
}

#[derive(Debug, Clone, Default)]
pub struct RestorePlan {
    pub items: Vec<RestoreItem>,
    pub missing: Vec<String>,
    pub collisions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub campaign_id: String,
    pub snapshot_id: String,
    pub snapshot_dir: PathBuf,
    pub mode: TransferMode,
    pub planned: usize,
    pub overwrites: Vec<String>,
    pub restored: usize,
    pub dry_run: bool,
}

fn path_occupied(p: &Path) -> bool {
    fs::symlink_metadata(p).is_ok()
}

/// Topmost ancestor of `target` below `root` that exists but is not a directory.
fn blocking_ancestor(root: &Path, target: &Path) -> Option<PathBuf> {
    let mut blocking = None;
    for dir in target.ancestors().skip(1) {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if let Ok(md) = fs::symlink_metadata(dir) {
            if !md.is_dir() {
                blocking = Some(dir.to_path_buf());
            }
        }
    }
    blocking
}

/// Compute source/target pairs and the pre-flight findings. Touches nothing.
pub fn plan_restore(root: &Path, snap: &StoredSnapshot) -> Result<RestorePlan> {
    let data_dir = snap.data_dir();

    // every path is validated before any existence probing
    let mut rels = Vec::with_capacity(snap.manifest.files.len());
    for record in &snap.manifest.files {
        rels.push(safe_relative_path(&record.relative_path)?);
    }

    let mut plan = RestorePlan::default();
    for (record, rel) in snap.manifest.files.iter().zip(rels) {
        let source = data_dir.join(&rel);
        let target = root.join(&rel);
        if !source.is_file() {
            plan.missing.push(record.relative_path.clone());
        }
        let blocked_by = blocking_ancestor(root, &target);
        if blocked_by.is_some() || path_occupied(&target) {
            plan.collisions.push(record.relative_path.clone());
        }
        plan.items.push(RestoreItem {
            source,
            target,
            blocked_by,
            record: record.clone(),
        });
    }
    Ok(plan)
}

fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.restore-tmp"))
}

fn materialize(item: &RestoreItem, mode: TransferMode, force: bool, verify: bool) -> Result<()> {
    let tmp = temp_sibling(&item.target);
    remove_existing_path(&tmp)?;
    match mode {
        TransferMode::Copy => {
            copy_file_preserving_mtime(&item.source, &tmp)?;
        }
        TransferMode::Move => move_file(&item.source, &tmp)?,
    }

    let expected = item.record.sha256.trim();
    if verify && !expected.is_empty() {
        let actual = sha256_file(&tmp)?;
        if !actual.eq_ignore_ascii_case(expected) {
            // give the payload back untouched, leave the destination as it was
            let cleanup = match mode {
                TransferMode::Copy => remove_existing_path(&tmp),
                TransferMode::Move => move_file(&tmp, &item.source),
            };
            if let Err(e) = cleanup {
                log::warn!("restore: cleanup of {} failed: {:#}", tmp.display(), e);
            }
            return Err(VaultError::IntegrityViolation {
                path: item.record.relative_path.clone(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
    }

    if force {
        remove_existing_path(&item.target)?;
    }
    fs::rename(&tmp, &item.target)
        .with_context(|| format!("rename {} -> {}", tmp.display(), item.target.display()))?;
    Ok(())
}

/// Run the restore flow. Dry-run stops after the pre-flight checks.
pub fn restore(cfg: &VaultConfig, req: &RestoreRequest) -> Result<RestoreReport> {
    let campaign_id = normalize_campaign_id(&req.campaign)?;
    let snapshot_id = match req.snapshot.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(normalize_snapshot_id(Some(s))?),
        _ => None,
    };
    let store = ArchiveStore::open(cfg);
    let snap = store.resolve(&campaign_id, snapshot_id.as_deref())?;
    let m = &snap.manifest;

    let mut report = RestoreReport {
        campaign_id: m.campaign_id.clone(),
        snapshot_id: m.snapshot_id.clone(),
        snapshot_dir: snap.dir.clone(),
        mode: req.mode,
        planned: m.files.len(),
        overwrites: Vec::new(),
        restored: 0,
        dry_run: req.dry_run,
    };

    if !snap.data_dir().is_dir() {
        let mut files: Vec<String> = m.files.iter().map(|f| f.relative_path.clone()).collect();
        if files.is_empty() {
            files.push(format!("{DATA_DIR}/"));
        }
        return Err(VaultError::MissingPayload { files }.into());
    }
    if m.files.is_empty() {
        debug!("restore: {}/{} has no files", m.campaign_id, m.snapshot_id);
        return Ok(report);
    }

    let plan = plan_restore(store.root(), &snap)?;
    if !plan.missing.is_empty() {
        return Err(VaultError::MissingPayload {
            files: plan.missing,
        }
        .into());
    }
    if !plan.collisions.is_empty() && !req.force {
        return Err(VaultError::DestinationCollision {
            files: plan.collisions,
        }
        .into());
    }
    report.overwrites = plan.collisions;

    if req.dry_run {
        return Ok(report);
    }

    let _lock = try_acquire_exclusive_lock(store.archive_root())?;
    for item in &plan.items {
        // an earlier item may already have cleared the same blocker
        if let Some(blocker) = &item.blocked_by {
            if fs::symlink_metadata(blocker).map(|m| !m.is_dir()).unwrap_or(false) {
                debug!("restore: removing {} to make room", blocker.display());
                remove_existing_path(blocker)?;
            }
        }
        if let Some(parent) = item.target.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        if let Err(e) = materialize(item, req.mode, req.force, req.verify) {
            log::warn!(
                "restore: stopped at {} after {} restored file(s)",
                item.record.relative_path,
                report.restored
            );
            return Err(e);
        }
        report.restored += 1;
    }
    info!(
        "restore: {}/{} restored {} file(s) (mode={}, verified={})",
        report.campaign_id, report.snapshot_id, report.restored, report.mode, req.verify
    );
    Ok(report)
}
