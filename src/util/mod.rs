//! util — общие утилиты файлового уровня.
//!
//! Содержит:
//! - now_iso()/system_time_iso(): ISO-8601 со смещением, точность до секунды.
//! - human_size(): двоичные префиксы B/KB/MB/GB/TB.
//! - sha256_file(): потоковый SHA-256 (чанки по 1 MiB).
//! - safe_relative_path(): защита от выхода за пределы корня.
//! - copy/move/remove хелперы и атомарная запись JSON (tmp+rename).

pub mod glob;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::error::VaultError;

/// Read chunk for streaming digests.
pub const HASH_CHUNK_BYTES: usize = 1024 * 1024;

/// Текущее локальное время, ISO-8601 со смещением (например 2026-02-27T16:00:00+08:00).
pub fn now_iso() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub fn system_time_iso(t: SystemTime) -> String {
    DateTime::<Local>::from(t).to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Bytes as an integer (`512B`), otherwise one decimal per 1024 step up to TB.
pub fn human_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut n = size as f64;
    for (i, unit) in UNITS.iter().enumerate() {
        let last = i == UNITS.len() - 1;
        if n < 1024.0 || last {
            return if i == 0 {
                format!("{}B", size)
            } else {
                format!("{:.1}{}", n, unit)
            };
        }
        n /= 1024.0;
    }
    format!("{}B", size)
}

/// Lowercase hex SHA-256 of a file, read in fixed 1 MiB chunks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// POSIX-style path of `path` relative to `root`, or None if it lies outside.
pub fn to_posix_relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Validate a manifest-recorded relative path: no root, no prefix, no `..`, not empty.
pub fn safe_relative_path(relative: &str) -> Result<PathBuf> {
    let rel = relative.trim();
    let p = Path::new(rel);
    let mut out = PathBuf::new();
    for c in p.components() {
        match c {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(VaultError::PathTraversal(relative.to_string()).into());
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(VaultError::PathTraversal(relative.to_string()).into());
    }
    Ok(out)
}

/// Remove whatever sits at `path` (file, symlink or directory tree). Absent is fine.
pub fn remove_existing_path(path: &Path) -> Result<()> {
    let md = match fs::symlink_metadata(path) {
        Ok(md) => md,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("stat {}", path.display())),
    };
    if md.is_dir() {
        fs::remove_dir_all(path).with_context(|| format!("remove dir {}", path.display()))?;
    } else {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    Ok(())
}

/// Copy bytes and carry the source modification time over.
pub fn copy_file_preserving_mtime(src: &Path, dst: &Path) -> Result<u64> {
    ensure_parent(dst)?;
    let n = fs::copy(src, dst)
        .with_context(|| format!("copy {} -> {}", src.display(), dst.display()))?;
    let mtime = fs::metadata(src)
        .and_then(|m| m.modified())
        .with_context(|| format!("stat {}", src.display()))?;
    let f = OpenOptions::new()
        .write(true)
        .open(dst)
        .with_context(|| format!("open {}", dst.display()))?;
    f.set_modified(mtime)
        .with_context(|| format!("set mtime on {}", dst.display()))?;
    Ok(n)
}

/// Rename, falling back to copy+remove when the rename crosses filesystems.
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    ensure_parent(dst)?;
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            log::debug!(
                "move_file: rename {} -> {} failed ({}), falling back to copy",
                src.display(),
                dst.display(),
                rename_err
            );
            copy_file_preserving_mtime(src, dst)?;
            fs::remove_file(src).with_context(|| format!("remove {}", src.display()))?;
            Ok(())
        }
    }
}

/// Pretty JSON + trailing newline, written through a tmp sibling and renamed into place.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut json = serde_json::to_string_pretty(value).context("serialize json")?;
    json.push('\n');
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .with_context(|| format!("open tmp {}", tmp.display()))?;
        f.write_all(json.as_bytes())?;
        let _ = f.sync_all();
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
