use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::VaultConfig;
use crate::scope::{self, RUNTIME_SCOPES};
use crate::util::human_size;

#[derive(Debug, Serialize)]
struct StatusJson<'a> {
    project_root: String,
    runtime_files: usize,
    runtime_bytes: u64,
    runtime_bytes_human: String,
    scope_counts: &'a BTreeMap<String, usize>,
    new_game_ready: bool,
    files: Vec<&'a str>,
}

/// Read-only report of the runtime tree.
pub fn exec(cfg: &VaultConfig, extra: Vec<String>, verbose: bool, json: bool) -> Result<()> {
    let files = scope::resolve(&cfg.root, &cfg.archive_root(), &extra)?;
    let counts = scope::scope_counts(&files);
    let total = scope::total_bytes(&files);
    let ready = files.is_empty();

    if json {
        let out = StatusJson {
            project_root: cfg.root.display().to_string(),
            runtime_files: files.len(),
            runtime_bytes: total,
            runtime_bytes_human: human_size(total),
            scope_counts: &counts,
            new_game_ready: ready,
            files: files.iter().map(|f| f.relative.as_str()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("== Runtime Status ==");
    println!("project_root: {}", cfg.root.display());
    println!("runtime_files: {}", files.len());
    println!("runtime_bytes: {}", human_size(total));
    println!();
    println!("scope_counts:");
    for (scope, _) in RUNTIME_SCOPES {
        println!("  - {}: {}", scope, counts.get(scope.as_str()).copied().unwrap_or(0));
    }
    if !extra.is_empty() {
        println!("  - extra: {}", counts.get("extra").copied().unwrap_or(0));
    }
    println!();
    println!("new_game_ready: {}", if ready { "yes" } else { "no" });

    if verbose && !files.is_empty() {
        println!();
        println!("files:");
        for f in &files {
            println!("  - {}", f.relative);
        }
    }
    Ok(())
}
