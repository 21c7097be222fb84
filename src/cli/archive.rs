use anyhow::Result;

use crate::archive::{archive, ArchiveRequest};
use crate::config::VaultConfig;
use crate::manifest::{TransferMode, MANIFEST_FILE, SUMMARY_FILE};

pub fn exec(cfg: &VaultConfig, req: ArchiveRequest) -> Result<()> {
    let report = archive(cfg, &req)?;
    let m = &report.manifest;

    if report.dry_run {
        println!("== Archive Dry Run ==");
    } else {
        println!("== Archive ==");
    }
    println!("campaign: {}", m.campaign_id);
    println!("snapshot: {}", m.snapshot_id);
    println!("mode: {}", m.archive_mode);
    println!("main_roles: {}", m.roles_label());
    if !m.ai_blip.is_empty() {
        println!("ai_blip: {}", m.ai_blip);
    }
    println!("save_filename_hint: {}", m.save_filename_hint);
    println!("files: {} ({})", m.counts.files, m.counts.bytes_human);
    if !m.note.is_empty() {
        println!("note: {}", m.note);
    }

    if report.dry_run {
        for f in &m.files {
            println!("  - {} [{}] {}", f.relative_path, f.scope, f.sha256);
        }
        println!("dry-run complete, no files changed.");
        return Ok(());
    }

    println!("archived: {} files", m.counts.files);
    println!("archive_path: {}", report.snapshot_dir.display());
    if m.archive_mode == TransferMode::Move {
        println!("migrated_out_of_runtime: {}", report.moved);
    }
    println!("written: {}, {}", MANIFEST_FILE, SUMMARY_FILE);
    Ok(())
}
