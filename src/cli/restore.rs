use anyhow::Result;

use crate::config::VaultConfig;
use crate::restore::{restore, RestoreRequest};

pub fn exec(cfg: &VaultConfig, req: RestoreRequest) -> Result<()> {
    let report = restore(cfg, &req)?;

    if report.planned == 0 {
        println!(
            "snapshot {}/{} contains no files, nothing to restore.",
            report.campaign_id, report.snapshot_id
        );
        return Ok(());
    }

    if report.dry_run {
        println!("== Restore Dry Run ==");
    } else {
        println!("== Restore ==");
    }
    println!("campaign: {}", report.campaign_id);
    println!("snapshot: {}", report.snapshot_id);
    println!("mode: {}", report.mode);
    println!("files: {}", report.planned);
    if !report.overwrites.is_empty() {
        println!("overwrites: {} (via --force)", report.overwrites.len());
    }
    if !req.verify {
        println!("hash_check: skipped");
    }

    if report.dry_run {
        println!("dry-run complete, no files changed.");
        return Ok(());
    }
    println!("restored: {} files", report.restored);
    println!("from: {}", report.snapshot_dir.display());
    Ok(())
}
