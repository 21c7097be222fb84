//! Centralized configuration and builder for trpg-vault.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - VaultConfig::from_env() reads the TRPG_VAULT_* variables; CLI flags override on top.
//! - VaultBuilder returns a VaultConfig which every operation consumes explicitly
//!   (no ambient process state below the command boundary).
//!
//! Defaults:
//! - root = current working directory
//! - archive_dir = saves/archives (relative to root)
//! - role_limit = 3
//! - deceased_suffix = "_已死亡", excluded_role_prefixes = ["示例角色"]

use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_ARCHIVE_DIR: &str = "saves/archives";
pub const DEFAULT_ROLE_LIMIT: usize = 3;
pub const DEFAULT_DECEASED_SUFFIX: &str = "_已死亡";
pub const DEFAULT_EXCLUDED_ROLE_PREFIX: &str = "示例角色";

/// Top-level configuration of the archive engine.
#[derive(Clone, Debug)]
pub struct VaultConfig {
    /// Project root holding the runtime tree.
    /// Env: TRPG_VAULT_ROOT (default ".")
    pub root: PathBuf,

    /// Archive storage directory; relative paths are resolved against `root`.
    /// Env: TRPG_VAULT_ARCHIVE_DIR (default "saves/archives")
    pub archive_dir: PathBuf,

    /// Upper bound on main roles recorded per snapshot.
    /// Env: TRPG_VAULT_ROLE_LIMIT (default 3, clamped to >= 1)
    pub role_limit: usize,

    /// Character sheet stem suffix marking a dead character.
    /// Env: TRPG_VAULT_DECEASED_SUFFIX
    pub deceased_suffix: String,

    /// Stem prefixes of example characters never picked as main roles.
    /// Env: TRPG_VAULT_EXCLUDED_ROLE_PREFIXES (comma-separated)
    pub excluded_role_prefixes: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            role_limit: DEFAULT_ROLE_LIMIT,
            deceased_suffix: DEFAULT_DECEASED_SUFFIX.to_string(),
            excluded_role_prefixes: vec![DEFAULT_EXCLUDED_ROLE_PREFIX.to_string()],
        }
    }
}

impl VaultConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TRPG_VAULT_ROOT") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.root = PathBuf::from(s);
            }
        }

        if let Ok(v) = std::env::var("TRPG_VAULT_ARCHIVE_DIR") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.archive_dir = PathBuf::from(s);
            }
        }

        if let Ok(v) = std::env::var("TRPG_VAULT_ROLE_LIMIT") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.role_limit = n.max(1);
            }
        }

        if let Ok(v) = std::env::var("TRPG_VAULT_DECEASED_SUFFIX") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.deceased_suffix = s.to_string();
            }
        }

        if let Ok(v) = std::env::var("TRPG_VAULT_EXCLUDED_ROLE_PREFIXES") {
            cfg.excluded_role_prefixes = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        cfg
    }

    /// Absolute (or root-joined) archive storage directory.
    pub fn archive_root(&self) -> PathBuf {
        if self.archive_dir.is_absolute() {
            self.archive_dir.clone()
        } else {
            self.root.join(&self.archive_dir)
        }
    }

    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_archive_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.archive_dir = dir.into();
        self
    }

    /// Resolve `root` to a canonical absolute path (it must exist).
    pub fn canonicalized(mut self) -> std::io::Result<Self> {
        self.root = std::fs::canonicalize(&self.root)?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl fmt::Display for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VaultConfig {{ \
             root: {}, \
             archive_dir: {}, \
             role_limit: {}, \
             deceased_suffix: {}, \
             excluded_role_prefixes: [{}] \
             }}",
            self.root.display(),
            self.archive_dir.display(),
            self.role_limit,
            self.deceased_suffix,
            self.excluded_role_prefixes.join(", "),
        )
    }
}

/// Lightweight builder that produces a VaultConfig.
#[derive(Clone, Debug)]
pub struct VaultBuilder {
    cfg: VaultConfig,
}

impl Default for VaultBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: VaultConfig::from_env(),
        }
    }
}

impl VaultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: VaultConfig::default(),
        }
    }

    pub fn root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.cfg.root = root.into();
        self
    }

    pub fn archive_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.cfg.archive_dir = dir.into();
        self
    }

    pub fn role_limit(mut self, limit: usize) -> Self {
        self.cfg.role_limit = limit.max(1);
        self
    }

    pub fn deceased_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.cfg.deceased_suffix = suffix.into();
        self
    }

    pub fn excluded_role_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.excluded_role_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> VaultConfig {
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_root_is_joined_when_relative() {
        let cfg = VaultBuilder::from_default().root("/tmp/campaign").build();
        assert_eq!(
            cfg.archive_root(),
            PathBuf::from("/tmp/campaign/saves/archives")
        );
    }

    #[test]
    fn archive_root_absolute_is_kept() {
        let cfg = VaultBuilder::from_default()
            .root("/tmp/campaign")
            .archive_dir("/var/archives")
            .build();
        assert_eq!(cfg.archive_root(), PathBuf::from("/var/archives"));
    }

    #[test]
    fn with_setters_override_fields() {
        let cfg = VaultConfig::default()
            .with_root("/srv/table")
            .with_archive_dir("vault");
        assert_eq!(cfg.root(), Path::new("/srv/table"));
        assert_eq!(cfg.archive_root(), PathBuf::from("/srv/table/vault"));
    }

    #[test]
    fn role_limit_never_zero() {
        let cfg = VaultBuilder::from_default().role_limit(0).build();
        assert_eq!(cfg.role_limit, 1);
    }
}
