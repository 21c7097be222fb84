//! Root-relative glob patterns (`*`, `?`, `[...]`, `[!...]`, `**`) over a directory tree.
//!
//! A pattern is translated into an anchored regex over the POSIX relative path and
//! enumerated with walkdir starting from its literal directory prefix, so
//! `logs/session/*.md` only ever reads `logs/session/`.

use anyhow::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::VaultError;

#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
    /// Literal directory prefix (relative to root) the walk starts from.
    base: PathBuf,
    /// Walk depth below `base`; None when the pattern contains `**`.
    max_depth: Option<usize>,
}

fn has_meta(component: &str) -> bool {
    component.contains(['*', '?', '['])
}

fn invalid(pattern: &str, reason: &str) -> anyhow::Error {
    VaultError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Translate one path component (no `/`) into regex syntax.
fn translate_component(component: &str) -> String {
    let chars: Vec<char> = component.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                // closing bracket may not be the first class char
                let mut j = i + 1;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str(r"\[");
                } else {
                    let mut inner: &[char] = &chars[i + 1..j];
                    out.push('[');
                    if inner.first() == Some(&'!') {
                        out.push('^');
                        inner = &inner[1..];
                    }
                    for &c in inner {
                        match c {
                            '\\' | '[' | ']' | '^' | '&' | '~' => {
                                out.push('\\');
                                out.push(c);
                            }
                            _ => out.push(c),
                        }
                    }
                    out.push(']');
                    i = j;
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        let stripped = trimmed.trim_start_matches("./");
        if stripped.is_empty() {
            return Err(invalid(pattern, "empty pattern"));
        }
        if stripped.starts_with('/') || Path::new(stripped).is_absolute() {
            return Err(invalid(pattern, "pattern must be relative to the project root"));
        }
        let comps: Vec<&str> = stripped.split('/').filter(|c| !c.is_empty()).collect();
        if comps.iter().any(|c| *c == "..") {
            return Err(invalid(pattern, "parent-directory segments are not allowed"));
        }

        let mut re = String::from("^");
        for (i, c) in comps.iter().enumerate() {
            let last = i + 1 == comps.len();
            if *c == "**" {
                re.push_str(if last { ".*" } else { "(?:[^/]+/)*" });
            } else if *c == "." {
                continue;
            } else {
                re.push_str(&translate_component(c));
                if !last {
                    re.push('/');
                }
            }
        }
        re.push('$');
        let regex = Regex::new(&re).map_err(|e| invalid(pattern, &e.to_string()))?;

        let literal = comps[..comps.len() - 1]
            .iter()
            .take_while(|c| !has_meta(c) && **c != ".")
            .count();
        let base: PathBuf = comps[..literal].iter().collect();
        let max_depth = if comps.iter().any(|c| *c == "**") {
            None
        } else {
            Some(comps.len() - literal)
        };

        Ok(Self {
            pattern: stripped.to_string(),
            regex,
            base,
            max_depth,
        })
    }

    pub fn is_match(&self, relative: &str) -> bool {
        self.regex.is_match(relative)
    }

    /// Regular files under `root` matching the pattern, skipping any subtree for which
    /// `prune` returns true. Returned as (absolute path, POSIX relative path), unsorted.
    pub fn matches<F>(&self, root: &Path, prune: F) -> Vec<(PathBuf, String)>
    where
        F: Fn(&Path) -> bool,
    {
        let start = root.join(&self.base);
        if !start.is_dir() {
            return Vec::new();
        }
        let mut walker = WalkDir::new(&start).min_depth(1);
        if let Some(d) = self.max_depth {
            walker = walker.max_depth(d);
        }

        let mut out = Vec::new();
        for entry in walker.into_iter().filter_entry(|e| !prune(e.path())) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("glob {}: skip unreadable entry: {}", self.pattern, e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(rel) = crate::util::to_posix_relative(root, path) else {
                continue;
            };
            if self.is_match(&rel) {
                out.push((path.to_path_buf(), rel));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn star_does_not_cross_directories() {
        let g = GlobPattern::new("logs/session/*.md").unwrap();
        assert!(g.is_match("logs/session/a.md"));
        assert!(!g.is_match("logs/session/sub/a.md"));
        assert!(!g.is_match("logs/session/a.txt"));
        assert_eq!(g.base, PathBuf::from("logs/session"));
        assert_eq!(g.max_depth, Some(1));
    }

    #[test]
    fn prefix_and_classes() {
        let g = GlobPattern::new("saves/save_*.md").unwrap();
        assert!(g.is_match("saves/save_01.md"));
        assert!(!g.is_match("saves/other.md"));

        let g = GlobPattern::new("notes/[!x]?.md").unwrap();
        assert!(g.is_match("notes/ab.md"));
        assert!(!g.is_match("notes/xb.md"));
    }

    #[test]
    fn bracket_class_edge_cases() {
        let g = GlobPattern::new("n/[]a]x").unwrap();
        assert!(g.is_match("n/]x"));
        assert!(g.is_match("n/ax"));
        assert!(!g.is_match("n/bx"));

        let g = GlobPattern::new("n/[^&~]x").unwrap();
        assert!(g.is_match("n/^x"));
        assert!(g.is_match("n/&x"));
        assert!(g.is_match("n/~x"));
        assert!(!g.is_match("n/bx"));

        let g = GlobPattern::new("n/[!]]x").unwrap();
        assert!(g.is_match("n/bx"));
        assert!(!g.is_match("n/]x"));

        // unterminated class is a literal bracket
        let g = GlobPattern::new("n/[ab").unwrap();
        assert!(g.is_match("n/[ab"));
    }

    #[test]
    fn double_star_matches_any_depth() {
        let g = GlobPattern::new("./world/**/*.json").unwrap();
        assert!(g.is_match("world/a.json"));
        assert!(g.is_match("world/x/y/a.json"));
        assert!(!g.is_match("other/a.json"));
        assert_eq!(g.max_depth, None);
    }

    #[test]
    fn rejects_absolute_and_parent() {
        assert!(GlobPattern::new("/etc/*").is_err());
        assert!(GlobPattern::new("../x/*.md").is_err());
        assert!(GlobPattern::new("   ").is_err());
    }

    #[test]
    fn walk_prunes_subtrees() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        fs::create_dir_all(root.join("w/keep"))?;
        fs::create_dir_all(root.join("w/skip"))?;
        fs::write(root.join("w/keep/a.md"), "a")?;
        fs::write(root.join("w/skip/b.md"), "b")?;

        let g = GlobPattern::new("w/**/*.md")?;
        let skip = root.join("w/skip");
        let mut got: Vec<String> = g
            .matches(root, |p| p.starts_with(&skip))
            .into_iter()
            .map(|(_, rel)| rel)
            .collect();
        got.sort();
        assert_eq!(got, vec!["w/keep/a.md".to_string()]);
        Ok(())
    }
}
