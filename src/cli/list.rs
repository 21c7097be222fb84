use anyhow::Result;

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::ident::normalize_campaign_id;
use crate::index::{ArchiveIndex, IndexEntry};
use crate::manifest::ROLES_PLACEHOLDER;
use crate::store::ArchiveStore;
use crate::util::human_size;

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

/// Snapshot rows, newest first, from manifests (default) or from the index.
///
/// A campaign filter naming a campaign that has nothing stored is `CampaignNotFound`;
/// an unfiltered listing of an empty archive is just empty.
pub fn collect(
    cfg: &VaultConfig,
    campaign: Option<&str>,
    from_index: bool,
) -> Result<Vec<IndexEntry>> {
    let campaign = campaign.map(normalize_campaign_id).transpose()?;
    if from_index {
        let idx = ArchiveIndex::load(&cfg.archive_root())?;
        let Some(c) = campaign else {
            return Ok(idx.entries);
        };
        let rows: Vec<IndexEntry> = idx.for_campaign(&c).cloned().collect();
        if rows.is_empty() {
            return Err(VaultError::CampaignNotFound(c).into());
        }
        return Ok(rows);
    }
    let store = ArchiveStore::open(cfg);
    if let Some(c) = &campaign {
        if !store.campaign_dir(c).is_dir() {
            return Err(VaultError::CampaignNotFound(c.clone()).into());
        }
    }
    Ok(store
        .list(campaign.as_deref())?
        .iter()
        .map(|s| IndexEntry::from_manifest(&s.manifest))
        .collect())
}

pub fn exec(
    cfg: &VaultConfig,
    campaign: Option<String>,
    from_index: bool,
    json: bool,
) -> Result<()> {
    let rows = collect(cfg, campaign.as_deref(), from_index)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("(no snapshots)");
        return Ok(());
    }

    println!("== Archive Snapshots ==");
    for e in &rows {
        let roles = if e.main_roles_label.is_empty() {
            ROLES_PLACEHOLDER
        } else {
            e.main_roles_label.as_str()
        };
        println!(
            "- {}/{} | {} | roles={} | blip={} | files={} | size={} | note={}",
            e.campaign_id,
            e.snapshot_id,
            e.created_at,
            roles,
            or_dash(&e.ai_blip),
            e.file_count,
            human_size(e.total_bytes),
            or_dash(&e.note)
        );
    }
    Ok(())
}
