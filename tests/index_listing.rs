use anyhow::Result;
use std::fs;
use std::path::Path;

use trpg_vault::cli::list::collect;
use trpg_vault::{
    archive, ArchiveIndex, ArchiveRequest, ArchiveStore, TransferMode, VaultBuilder, VaultConfig,
    VaultError,
};

fn put(root: &Path, rel: &str, body: &[u8]) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, body).unwrap();
}

fn cfg(root: &Path) -> VaultConfig {
    VaultBuilder::from_default().root(root).build()
}

fn archive_as(cfg: &VaultConfig, campaign: &str, snapshot: &str) -> Result<()> {
    archive(
        cfg,
        &ArchiveRequest {
            campaign: campaign.into(),
            snapshot: Some(snapshot.into()),
            mode: TransferMode::Copy,
            ..ArchiveRequest::default()
        },
    )?;
    Ok(())
}

#[test]
fn reusing_a_key_keeps_one_index_entry() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    put(root, "logs/session/a.md", b"a");
    let cfg = cfg(root);

    archive_as(&cfg, "camp", "s1")?;
    // operator deletes the snapshot dir by hand and archives again under the same id
    fs::remove_dir_all(cfg.archive_root().join("camp/s1"))?;
    put(root, "logs/session/b.md", b"b");
    archive_as(&cfg, "camp", "s1")?;

    let idx = ArchiveIndex::load(&cfg.archive_root())?;
    let rows: Vec<_> = idx.for_campaign("camp").collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].file_count, 2);
    Ok(())
}

#[test]
fn listing_is_newest_first_and_repeatable() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    put(root, "saves/save_01.md", b"x");
    let cfg = cfg(root);

    archive_as(&cfg, "camp", "s1")?;
    archive_as(&cfg, "camp", "s2")?;
    archive_as(&cfg, "other", "s1")?;

    let first = collect(&cfg, Some("camp"), false)?;
    let ids: Vec<_> = first.iter().map(|e| e.snapshot_id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s1"]);

    let again = collect(&cfg, Some("camp"), false)?;
    assert_eq!(
        serde_json::to_string(&first)?,
        serde_json::to_string(&again)?
    );

    assert_eq!(collect(&cfg, None, false)?.len(), 3);
    let from_index = collect(&cfg, Some("other"), true)?;
    assert_eq!(from_index.len(), 1);
    assert_eq!(from_index[0].campaign_id, "other");
    Ok(())
}

#[test]
fn corrupt_manifest_is_skipped_by_listing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    put(root, "saves/save_01.md", b"x");
    let cfg = cfg(root);
    archive_as(&cfg, "camp", "good")?;
    archive_as(&cfg, "camp", "bad")?;
    fs::write(cfg.archive_root().join("camp/bad/manifest.json"), b"[]")?;
    // a directory without a manifest is not a snapshot either
    fs::create_dir_all(cfg.archive_root().join("camp/stray"))?;

    let store = ArchiveStore::open(&cfg);
    let listed = store.list(Some("camp"))?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].manifest.snapshot_id, "good");
    Ok(())
}

#[test]
fn empty_archive_lists_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = cfg(dir.path());
    assert!(collect(&cfg, None, false)?.is_empty());
    assert!(collect(&cfg, None, true)?.is_empty());
    Ok(())
}

#[test]
fn corrupt_index_fails_loudly() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    put(root, "saves/save_01.md", b"x");
    let cfg = cfg(root);
    archive_as(&cfg, "camp", "s1")?;
    fs::write(cfg.archive_root().join("index.json"), b"garbage")?;

    let e = ArchiveIndex::load(&cfg.archive_root()).unwrap_err();
    assert!(matches!(
        e.downcast_ref::<VaultError>(),
        Some(VaultError::CorruptIndex { .. })
    ));

    // the snapshot itself is committed before the index update fails
    put(root, "saves/save_02.md", b"y");
    let e = archive(
        &cfg,
        &ArchiveRequest {
            campaign: "camp".into(),
            snapshot: Some("s2".into()),
            mode: TransferMode::Copy,
            ..ArchiveRequest::default()
        },
    )
    .unwrap_err();
    assert!(format!("{:#}", e).contains("not updated"));
    assert!(cfg.archive_root().join("camp/s2/manifest.json").is_file());
    assert_eq!(collect(&cfg, Some("camp"), false)?.len(), 2);
    Ok(())
}

#[test]
fn unknown_campaign_filter_is_campaign_not_found() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    put(root, "saves/save_01.md", b"x");
    let cfg = cfg(root);
    archive_as(&cfg, "real", "s1")?;

    for from_index in [false, true] {
        let e = collect(&cfg, Some("ghost"), from_index).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<VaultError>(),
            Some(VaultError::CampaignNotFound(c)) if c == "ghost"
        ));
    }
    assert_eq!(collect(&cfg, Some("real"), true)?.len(), 1);
    Ok(())
}
