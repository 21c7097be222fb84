//! Archive index: a cross-campaign ledger of snapshot summaries.
//!
//! Формат: <archive_dir>/index.json
//! {
//!   "schema_version": 1,
//!   "entries": [
//!     {"campaign_id":"zhao","snapshot_id":"20260227_160000","created_at":"...", ...},
//!     ...
//!   ]
//! }
//!
//! Замечания:
//! - Уникальность по (campaign_id, snapshot_id): upsert заменяет прежнюю запись.
//! - Порядок хранения: (created_at, snapshot_id) по убыванию.
//! - Запись атомарная через tmp+rename; нечитаемый index.json — громкая ошибка,
//!   а не молчаливый сброс.
//! - Пути удаления записей нет (снапшоты не удаляются).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::VaultError;
use crate::manifest::{Manifest, TransferMode, SCHEMA_VERSION};
use crate::util::write_json_atomic;

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub campaign_id: String,
    pub snapshot_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub archive_mode: TransferMode,
    #[serde(default)]
    pub main_roles_label: String,
    #[serde(default)]
    pub ai_blip: String,
    #[serde(default)]
    pub save_filename_hint: String,
    #[serde(default)]
    pub file_count: usize,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub note: String,
}

impl IndexEntry {
    pub fn from_manifest(m: &Manifest) -> Self {
        Self {
            campaign_id: m.campaign_id.clone(),
            snapshot_id: m.snapshot_id.clone(),
            created_at: m.created_at.clone(),
            archive_mode: m.archive_mode,
            main_roles_label: m.main_roles_label.clone(),
            ai_blip: m.ai_blip.clone(),
            save_filename_hint: m.save_filename_hint.clone(),
            file_count: m.counts.files,
            total_bytes: m.counts.bytes,
            note: m.note.clone(),
        }
    }

    fn same_key(&self, other: &IndexEntry) -> bool {
        self.campaign_id == other.campaign_id && self.snapshot_id == other.snapshot_id
    }
}

/// Newest first by `(created_at, snapshot_id)`; shared by index and manifest listing.
pub fn newest_first(a: (&str, &str), b: (&str, &str)) -> Ordering {
    b.cmp(&a)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveIndex {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub entries: Vec<IndexEntry>,
}

impl Default for ArchiveIndex {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entries: Vec::new(),
        }
    }
}

pub fn index_path(archive_root: &Path) -> PathBuf {
    archive_root.join(INDEX_FILE)
}

impl ArchiveIndex {
    /// Absent file -> empty index. Unparsable file -> `CorruptIndex`.
    pub fn load(archive_root: &Path) -> Result<Self> {
        let p = index_path(archive_root);
        if !p.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(&p).with_context(|| format!("read {}", p.display()))?;
        let idx: ArchiveIndex = serde_json::from_slice(&bytes)
            .map_err(|source| VaultError::CorruptIndex { path: p.clone(), source })?;
        Ok(idx)
    }

    pub fn save(&self, archive_root: &Path) -> Result<()> {
        write_json_atomic(&index_path(archive_root), self)
    }

    /// Replace-or-insert in memory and restore the ordering invariant.
    pub fn insert(&mut self, entry: IndexEntry) {
        self.entries.retain(|e| !e.same_key(&entry));
        self.entries.push(entry);
        self.entries.sort_by(|a, b| {
            newest_first(
                (a.created_at.as_str(), a.snapshot_id.as_str()),
                (b.created_at.as_str(), b.snapshot_id.as_str()),
            )
        });
        self.schema_version = SCHEMA_VERSION;
    }

    pub fn for_campaign<'a>(&'a self, campaign: &'a str) -> impl Iterator<Item = &'a IndexEntry> {
        self.entries.iter().filter(move |e| e.campaign_id == campaign)
    }
}

/// Read-modify-write of the index for one new snapshot.
pub fn upsert(archive_root: &Path, entry: IndexEntry) -> Result<()> {
    let mut idx = ArchiveIndex::load(archive_root)?;
    log::debug!(
        "index: upsert {}/{} ({} existing entries)",
        entry.campaign_id,
        entry.snapshot_id,
        idx.entries.len()
    );
    idx.insert(entry);
    idx.save(archive_root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(c: &str, s: &str, at: &str, files: usize) -> IndexEntry {
        IndexEntry {
            campaign_id: c.into(),
            snapshot_id: s.into(),
            created_at: at.into(),
            archive_mode: TransferMode::Copy,
            main_roles_label: "party".into(),
            ai_blip: String::new(),
            save_filename_hint: String::new(),
            file_count: files,
            total_bytes: 0,
            note: String::new(),
        }
    }

    #[test]
    fn insert_sorts_newest_first_with_snapshot_tiebreak() {
        let mut idx = ArchiveIndex::default();
        idx.insert(entry("a", "s1", "2026-01-01T10:00:00+00:00", 1));
        idx.insert(entry("b", "s3", "2026-01-02T10:00:00+00:00", 1));
        idx.insert(entry("a", "s2", "2026-01-01T10:00:00+00:00", 1));
        let keys: Vec<&str> = idx.entries.iter().map(|e| e.snapshot_id.as_str()).collect();
        assert_eq!(keys, vec!["s3", "s2", "s1"]);
    }

    #[test]
    fn upsert_replaces_same_key() -> Result<()> {
        let dir = tempfile::tempdir()?;
        upsert(dir.path(), entry("a", "s1", "2026-01-01T10:00:00+00:00", 1))?;
        upsert(dir.path(), entry("a", "s1", "2026-01-03T10:00:00+00:00", 7))?;
        upsert(dir.path(), entry("b", "s1", "2026-01-02T10:00:00+00:00", 2))?;

        let idx = ArchiveIndex::load(dir.path())?;
        assert_eq!(idx.entries.len(), 2);
        assert_eq!(idx.entries[0].campaign_id, "a");
        assert_eq!(idx.entries[0].file_count, 7);
        assert_eq!(idx.for_campaign("b").count(), 1);
        assert!(!dir.path().join("index.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn corrupt_index_fails_loudly() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(index_path(dir.path()), b"{ not json")?;
        let e = ArchiveIndex::load(dir.path()).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<VaultError>(),
            Some(VaultError::CorruptIndex { .. })
        ));
        // upsert must not clobber the unreadable file
        assert!(upsert(dir.path(), entry("a", "s", "t", 1)).is_err());
        assert_eq!(fs::read(index_path(dir.path()))?, b"{ not json");
        Ok(())
    }
}
