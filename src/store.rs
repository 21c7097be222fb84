//! Archive store: on-disk layout of campaigns and snapshots.
//!
//! ```text
//! <archive_dir>/index.json
//! <archive_dir>/LOCK
//! <archive_dir>/<campaign_id>/<snapshot_id>/manifest.json
//! <archive_dir>/<campaign_id>/<snapshot_id>/summary.md
//! <archive_dir>/<campaign_id>/<snapshot_id>/data/<relative path...>
//! ```
//!
//! Dot-prefixed directories (in-flight staging) are never treated as snapshots.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::index::newest_first;
use crate::manifest::{read_manifest, Manifest, MANIFEST_FILE};

pub const DATA_DIR: &str = "data";

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
    archive_root: PathBuf,
}

/// A manifest together with the snapshot directory it was read from.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub dir: PathBuf,
    pub manifest: Manifest,
}

impl StoredSnapshot {
    pub fn data_dir(&self) -> PathBuf {
        self.dir.join(DATA_DIR)
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Visible subdirectories of `dir`, sorted by name.
fn sorted_subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for e in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let e = e?;
        let p = e.path();
        if !p.is_dir() {
            continue;
        }
        let name = e.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        out.push((name, p));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

impl ArchiveStore {
    pub fn open(cfg: &VaultConfig) -> Self {
        Self {
            root: cfg.root.clone(),
            archive_root: cfg.archive_root(),
        }
    }

    /// Project root (the runtime tree).
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    pub fn campaign_dir(&self, campaign_id: &str) -> PathBuf {
        self.archive_root.join(campaign_id)
    }

    pub fn snapshot_dir(&self, campaign_id: &str, snapshot_id: &str) -> PathBuf {
        self.campaign_dir(campaign_id).join(snapshot_id)
    }

    pub fn manifest_path(&self, campaign_id: &str, snapshot_id: &str) -> PathBuf {
        self.snapshot_dir(campaign_id, snapshot_id).join(MANIFEST_FILE)
    }

    /// Every readable snapshot (optionally of one campaign), newest first.
    ///
    /// Best-effort: directories without a manifest or with a corrupt one are skipped.
    pub fn list(&self, campaign: Option<&str>) -> Result<Vec<StoredSnapshot>> {
        if !self.archive_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for (name, campaign_dir) in sorted_subdirs(&self.archive_root)? {
            if campaign.map(|c| c != name).unwrap_or(false) {
                continue;
            }
            for (_, snapshot_dir) in sorted_subdirs(&campaign_dir)? {
                let mpath = snapshot_dir.join(MANIFEST_FILE);
                if !mpath.is_file() {
                    continue;
                }
                match read_manifest(&mpath) {
                    Ok(manifest) => out.push(StoredSnapshot {
                        dir: snapshot_dir,
                        manifest,
                    }),
                    Err(e) => log::warn!("list: skip unreadable manifest: {:#}", e),
                }
            }
        }
        out.sort_by(|a, b| {
            newest_first(
                (a.manifest.created_at.as_str(), a.manifest.snapshot_id.as_str()),
                (b.manifest.created_at.as_str(), b.manifest.snapshot_id.as_str()),
            )
        });
        Ok(out)
    }

    /// Explicit snapshot must exist; `None` picks the newest snapshot of the campaign.
    pub fn resolve(&self, campaign_id: &str, snapshot_id: Option<&str>) -> Result<StoredSnapshot> {
        let campaign_dir = self.campaign_dir(campaign_id);
        if !campaign_dir.is_dir() {
            return Err(VaultError::CampaignNotFound(campaign_id.to_string()).into());
        }

        match snapshot_id {
            Some(sid) => {
                let mpath = self.manifest_path(campaign_id, sid);
                if !mpath.is_file() {
                    return Err(VaultError::SnapshotNotFound {
                        campaign: campaign_id.to_string(),
                        snapshot: Some(sid.to_string()),
                    }
                    .into());
                }
                let manifest = read_manifest(&mpath)?;
                Ok(StoredSnapshot {
                    dir: self.snapshot_dir(campaign_id, sid),
                    manifest,
                })
            }
            None => self
                .list(Some(campaign_id))?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    anyhow::Error::from(VaultError::SnapshotNotFound {
                        campaign: campaign_id.to_string(),
                        snapshot: None,
                    })
                }),
        }
    }
}
