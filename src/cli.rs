use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::VaultConfig;
use crate::manifest::TransferMode;

pub mod archive;
pub mod list;
pub mod restore;
pub mod status;

/// Archive and restore the runtime tree of a tabletop-RPG session.
#[derive(Parser, Debug)]
#[command(
    name = "trpg-vault",
    version,
    about = "Snapshot TRPG runtime files into verified archives and restore them",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Project root holding the runtime tree (default: $TRPG_VAULT_ROOT or the cwd)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Archive directory, relative to the root unless absolute (default: saves/archives)
    #[arg(long, global = true)]
    pub archive_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Show the runtime files currently in play and whether a new game can start
    ///
    /// Пример:
    ///   trpg-vault status --verbose
    ///   trpg-vault status --extra "notes/*.md" --json
    Status {
        /// Extra glob (relative to the root) to include; repeatable
        #[arg(long)]
        extra: Vec<String>,
        /// List every resolved file
        #[arg(long, default_value_t = false)]
        verbose: bool,
        /// JSON output (single object)
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Archive the runtime files into <archive_dir>/<campaign>/<snapshot>/
    ///
    /// Пример:
    ///   trpg-vault archive -c zhaoyutong --main-roles "赵雨桐+林立" --ai-blip "隧道潜行" --note "Day1"
    Archive {
        /// Campaign id
        #[arg(short = 'c', long)]
        campaign: String,
        /// Snapshot id (default: local time YYYYMMDD_HHMMSS)
        #[arg(long)]
        snapshot: Option<String>,
        /// Main roles separated by + , / ; or whitespace; empty = detect from characters/active
        #[arg(long, default_value = "")]
        main_roles: String,
        /// Max number of main roles kept (default: config, 3)
        #[arg(long)]
        role_limit: Option<usize>,
        /// Ultra-short annotation (<= 20 chars) stored in the manifest and the save name hint
        #[arg(long, default_value = "")]
        ai_blip: String,
        /// move = take files out of the runtime tree, copy = leave them in place
        #[arg(long, value_enum, default_value_t = TransferMode::Move)]
        mode: TransferMode,
        /// Free-text note
        #[arg(long, default_value = "")]
        note: String,
        /// Extra glob (relative to the root) to archive; repeatable
        #[arg(long)]
        extra: Vec<String>,
        /// Preview only, write nothing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// List stored snapshots, newest first
    List {
        /// Only this campaign
        #[arg(short = 'c', long)]
        campaign: Option<String>,
        /// Read the archive index instead of scanning manifests
        #[arg(long, default_value_t = false)]
        index: bool,
        /// JSON output (array)
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Restore a snapshot back into the runtime tree
    ///
    /// Пример:
    ///   trpg-vault restore -c zhaoyutong --snapshot 20260227_160000
    ///   trpg-vault restore -c zhaoyutong --force --move-from-archive
    Restore {
        /// Campaign id
        #[arg(short = 'c', long)]
        campaign: String,
        /// Snapshot id (default: newest of the campaign)
        #[arg(long)]
        snapshot: Option<String>,
        /// Overwrite files already present in the runtime tree
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Move files out of the archive instead of copying them
        #[arg(long, default_value_t = false)]
        move_from_archive: bool,
        /// Skip the post-restore SHA-256 verification
        #[arg(long, default_value_t = false)]
        skip_hash_check: bool,
        /// Preview only, write nothing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

fn load_config(cli: &Cli) -> Result<VaultConfig> {
    let mut cfg = VaultConfig::from_env();
    if let Some(root) = &cli.root {
        cfg = cfg.with_root(root.clone());
    }
    if let Some(dir) = &cli.archive_dir {
        cfg = cfg.with_archive_dir(dir.clone());
    }
    let shown = cfg.root.display().to_string();
    let cfg = cfg
        .canonicalized()
        .with_context(|| format!("project root {} is not accessible", shown))?;
    log::debug!("config: {}", cfg);
    Ok(cfg)
}

/// Parse process arguments (clap exits on usage errors/--help) and run.
pub fn run() -> Result<()> {
    dispatch(<Cli as Parser>::parse())
}

/// Same as `run`, for an explicit argv (first item is the program name).
pub fn run_from<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    dispatch(Cli::try_parse_from(args)?)
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli)?;
    match cli.cmd {
        Cmd::Status {
            extra,
            verbose,
            json,
        } => status::exec(&cfg, extra, verbose, json),

        Cmd::Archive {
            campaign,
            snapshot,
            main_roles,
            role_limit,
            ai_blip,
            mode,
            note,
            extra,
            dry_run,
        } => archive::exec(
            &cfg,
            crate::archive::ArchiveRequest {
                campaign,
                snapshot,
                main_roles,
                role_limit,
                ai_blip,
                mode,
                note,
                extra,
                dry_run,
            },
        ),

        Cmd::List {
            campaign,
            index,
            json,
        } => list::exec(&cfg, campaign, index, json),

        Cmd::Restore {
            campaign,
            snapshot,
            force,
            move_from_archive,
            skip_hash_check,
            dry_run,
        } => restore::exec(
            &cfg,
            crate::restore::RestoreRequest {
                campaign,
                snapshot,
                force,
                mode: if move_from_archive {
                    TransferMode::Move
                } else {
                    TransferMode::Copy
                },
                verify: !skip_hash_check,
                dry_run,
            },
        ),
    }
}
