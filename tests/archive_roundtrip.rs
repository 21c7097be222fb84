use anyhow::Result;
use std::fs;
use std::path::Path;

use trpg_vault::manifest::read_manifest;
use trpg_vault::util::sha256_file;
use trpg_vault::{
    archive, resolve_scope, restore, ArchiveIndex, ArchiveRequest, RestoreRequest, TransferMode,
    VaultBuilder, VaultConfig, VaultError,
};

// ---------- helpers ----------

fn put(root: &Path, rel: &str, body: &[u8]) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, body).unwrap();
}

fn seed_runtime(root: &Path) {
    put(root, "characters/active/Lin.md", b"# Lin\nHP 12\n");
    put(root, "characters/active/Zhao.md", "# 赵\nHP 9\n".as_bytes());
    put(root, "logs/session/day1.md", b"day one");
    put(root, "logs/combat/fight.md", b"round 1");
    put(root, "logs/exploration/tunnel.md", b"dark");
    put(root, "saves/save_01.md", b"save body");
    put(root, "saves/save_initial_template.md", b"template");
}

fn cfg(root: &Path) -> VaultConfig {
    VaultBuilder::from_default().root(root).build()
}

fn request(campaign: &str, snapshot: &str, mode: TransferMode) -> ArchiveRequest {
    ArchiveRequest {
        campaign: campaign.to_string(),
        snapshot: Some(snapshot.to_string()),
        mode,
        ..ArchiveRequest::default()
    }
}

fn domain(e: &anyhow::Error) -> Option<&VaultError> {
    e.downcast_ref::<VaultError>()
}

// ---------- tests ----------

#[test]
fn copy_archive_then_forced_restore_is_byte_identical() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    seed_runtime(root);
    let cfg = cfg(root);

    let before = resolve_scope(root, &cfg.archive_root(), &[])?;
    assert_eq!(before.len(), 6, "template must be excluded");
    let originals: Vec<(String, Vec<u8>)> = before
        .iter()
        .map(|f| (f.relative.clone(), fs::read(&f.path).unwrap()))
        .collect();

    let report = archive(&cfg, &request("zhao yu", "s1", TransferMode::Copy))?;
    assert!(!report.dry_run);
    assert_eq!(report.moved, 0);
    assert_eq!(report.manifest.campaign_id, "zhao_yu");
    assert_eq!(report.manifest.counts.files, 6);
    assert_eq!(
        report.manifest.counts.bytes,
        report.manifest.files.iter().map(|f| f.size_bytes).sum::<u64>()
    );

    let snap_dir = cfg.archive_root().join("zhao_yu").join("s1");
    assert!(snap_dir.join("manifest.json").is_file());
    assert!(snap_dir.join("summary.md").is_file());
    assert!(snap_dir.join("data/logs/session/day1.md").is_file());
    // copy mode leaves the runtime tree alone
    assert_eq!(resolve_scope(root, &cfg.archive_root(), &[])?.len(), 6);

    // scribble over the runtime tree, then restore on top of it
    for (rel, _) in &originals {
        fs::write(root.join(rel), b"changed during play")?;
    }
    let r = restore(
        &cfg,
        &RestoreRequest {
            campaign: "zhao_yu".into(),
            snapshot: Some("s1".into()),
            force: true,
            ..RestoreRequest::default()
        },
    )?;
    assert_eq!(r.restored, 6);
    assert_eq!(r.overwrites.len(), 6);

    let manifest = read_manifest(&snap_dir.join("manifest.json"))?;
    for (rel, body) in &originals {
        assert_eq!(&fs::read(root.join(rel))?, body, "{rel} must round-trip");
        let rec = manifest
            .files
            .iter()
            .find(|f| &f.relative_path == rel)
            .expect("record present");
        assert_eq!(sha256_file(&root.join(rel))?, rec.sha256);
    }
    // copy restore keeps the payload intact
    assert!(snap_dir.join("data/saves/save_01.md").is_file());
    Ok(())
}

#[test]
fn move_archive_clears_runtime_and_restore_brings_it_back() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    seed_runtime(root);
    let cfg = cfg(root);

    let report = archive(&cfg, &request("camp", "s1", TransferMode::Move))?;
    assert_eq!(report.moved, 6);
    assert!(
        resolve_scope(root, &cfg.archive_root(), &[])?.is_empty(),
        "new game ready after move"
    );
    // the template is not runtime state and stays put
    assert!(root.join("saves/save_initial_template.md").is_file());
    // no staging leftovers
    let leftovers: Vec<_> = fs::read_dir(cfg.archive_root().join("camp"))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(leftovers.is_empty());

    let r = restore(
        &cfg,
        &RestoreRequest {
            campaign: "camp".into(),
            mode: TransferMode::Move,
            ..RestoreRequest::default()
        },
    )?;
    assert_eq!(r.restored, 6);
    assert_eq!(fs::read(root.join("logs/combat/fight.md"))?, b"round 1");
    assert!(!cfg
        .archive_root()
        .join("camp/s1/data/logs/combat/fight.md")
        .exists());
    // the manifest is never rewritten by a restore
    assert_eq!(
        read_manifest(&cfg.archive_root().join("camp/s1/manifest.json"))?.counts.files,
        6
    );
    Ok(())
}

#[test]
fn empty_runtime_refuses_to_archive() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    put(root, "saves/save_initial_template.md", b"template");
    let cfg = cfg(root);

    let e = archive(&cfg, &request("camp", "s1", TransferMode::Move)).unwrap_err();
    assert!(matches!(domain(&e), Some(VaultError::NothingToArchive { .. })));
    assert!(!cfg.archive_root().exists(), "nothing may be created");
    Ok(())
}

#[test]
fn existing_snapshot_is_never_merged() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    seed_runtime(root);
    let cfg = cfg(root);

    archive(&cfg, &request("camp", "s1", TransferMode::Copy))?;
    put(root, "logs/session/day2.md", b"day two");
    let e = archive(&cfg, &request("camp", "s1", TransferMode::Move)).unwrap_err();
    assert!(matches!(
        domain(&e),
        Some(VaultError::SnapshotAlreadyExists { .. })
    ));
    // refused before anything moved
    assert!(root.join("logs/session/day2.md").is_file());
    assert!(!cfg
        .archive_root()
        .join("camp/s1/data/logs/session/day2.md")
        .exists());
    Ok(())
}

#[test]
fn dry_run_hashes_live_files_and_writes_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    seed_runtime(root);
    let cfg = cfg(root);

    let mut req = request("camp", "preview", TransferMode::Move);
    req.dry_run = true;
    req.ai_blip = "  tunnel   sneak ".into();
    let report = archive(&cfg, &req)?;
    assert!(report.dry_run);
    assert_eq!(report.manifest.ai_blip, "tunnel sneak");
    assert_eq!(report.manifest.counts.files, 6);
    let day1 = report
        .manifest
        .files
        .iter()
        .find(|f| f.relative_path == "logs/session/day1.md")
        .unwrap();
    assert_eq!(day1.sha256, sha256_file(&root.join("logs/session/day1.md"))?);

    assert!(!cfg.archive_root().exists());
    assert_eq!(resolve_scope(root, &cfg.archive_root(), &[])?.len(), 6);
    Ok(())
}

#[test]
fn roles_and_index_entry_follow_the_manifest() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    seed_runtime(root);
    let cfg = cfg(root);

    let mut req = request("camp", "20260227_160000", TransferMode::Copy);
    req.main_roles = "Zhao, Lin + Zhao".into();
    req.note = "Day1 tunnel checkpoint".into();
    let report = archive(&cfg, &req)?;
    assert_eq!(report.manifest.main_roles, vec!["Zhao", "Lin"]);
    assert_eq!(report.manifest.main_roles_label, "Zhao+Lin");
    assert_eq!(
        report.manifest.save_filename_hint,
        "save_20260227_160000_Zhao+Lin.md"
    );

    let idx = ArchiveIndex::load(&cfg.archive_root())?;
    assert_eq!(idx.entries.len(), 1);
    let e = &idx.entries[0];
    assert_eq!(e.snapshot_id, "20260227_160000");
    assert_eq!(e.main_roles_label, "Zhao+Lin");
    assert_eq!(e.file_count, 6);
    assert_eq!(e.note, "Day1 tunnel checkpoint");
    Ok(())
}

#[test]
fn extra_patterns_are_archived_under_extra_scope() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    put(root, "world/map/region.json", b"{}");
    let cfg = cfg(root);

    let mut req = request("camp", "s1", TransferMode::Copy);
    req.extra = vec!["world/**/*.json".into()];
    let report = archive(&cfg, &req)?;
    assert_eq!(report.manifest.files.len(), 1);
    assert_eq!(report.manifest.scope_counts.get("extra"), Some(&1));
    assert!(cfg
        .archive_root()
        .join("camp/s1/data/world/map/region.json")
        .is_file());
    Ok(())
}
