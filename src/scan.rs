//! # File Scanner
//!
//! Walks the live disk tree under a set of glob masks and produces
//! normalized [`FileRecord`]s.
//!
//! Masks are separated by `;`. Inside a mask `*` matches within one path
//! segment, `?` matches one character and `**` spans any number of
//! directories. Matching is case-insensitive. Hidden files are skipped and
//! hidden directories below the walk root are not entered.

use crate::common::{self, FileRecord};
use crate::KilnError;

use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A single compiled mask.
#[derive(Debug)]
struct Mask {
    /// Literal directory prefix to start walking from (relative to root).
    base: String,
    /// Walk depth limit when the mask does not recurse.
    max_depth: Option<usize>,
    matcher: Regex,
}

fn is_wild(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

/// Translate one glob mask into an anchored regular expression.
fn glob_to_regex(mask: &str) -> String {
    let mut re = String::with_capacity(mask.len() * 2 + 2);
    re.push('^');
    let bytes: Vec<char> = mask.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            '*' if bytes.get(i + 1) == Some(&'*') => {
                if bytes.get(i + 2) == Some(&'/') {
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');
    re
}

impl Mask {
    fn compile(raw: &str, root: &str) -> Result<Self, KilnError> {
        let mask = common::rebase(raw.trim(), root);
        let segments: Vec<&str> = mask.split('/').collect();
        let literal = segments.iter().take_while(|s| !is_wild(s)).count();
        // The last segment is the file pattern even when it has no wildcard.
        let literal = literal.min(segments.len().saturating_sub(1));
        let base = segments[..literal].join("/");
        let max_depth = if mask.contains("**") {
            None
        } else {
            Some(segments.len() - literal)
        };
        let matcher = RegexBuilder::new(&glob_to_regex(&mask))
            .case_insensitive(true)
            .build()
            .map_err(|source| KilnError::Mask { mask: raw.to_string(), source })?;
        Ok(Self { base, max_depth, matcher })
    }
}

/// Scans a program root for files matching glob masks.
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    /// Creates a scanner rooted at `root`; every produced path is relative to it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the normalized relative paths of all regular files matching any
    /// of the `;`-separated masks, sorted and without duplicates.
    ///
    /// A mask matching nothing contributes nothing; an empty result is not
    /// an error.
    pub fn list(&self, masks: &str) -> Result<Vec<String>, KilnError> {
        let root_str = self.root.to_string_lossy();
        let mut found = BTreeSet::new();

        for raw in masks.split(';').filter(|m| !m.trim().is_empty()) {
            let mask = Mask::compile(raw, &root_str)?;
            let start = if mask.base.is_empty() {
                self.root.clone()
            } else {
                self.root.join(&mask.base)
            };
            if !start.is_dir() {
                continue;
            }

            let mut walker = WalkDir::new(&start).follow_links(true);
            if let Some(depth) = mask.max_depth {
                walker = walker.max_depth(depth);
            }
            let entries = walker.into_iter().filter_entry(|e| {
                e.depth() == 0 || !common::is_hidden(&e.file_name().to_string_lossy())
            });

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(mask = raw, error = %e, "skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = match entry.path().strip_prefix(&self.root) {
                    Ok(rel) => common::normalize_path(&rel.to_string_lossy()),
                    Err(_) => continue,
                };
                if common::is_hidden(common::file_name(&rel)) {
                    continue;
                }
                if mask.matcher.is_match(&rel) {
                    found.insert(rel);
                }
            }
        }

        Ok(found.into_iter().collect())
    }

    /// Stats a list of relative paths into file records. Directories, hidden
    /// files and paths that vanished since listing are dropped.
    pub fn records(&self, paths: &[String]) -> Vec<FileRecord> {
        let root_str = self.root.to_string_lossy();
        paths
            .iter()
            .filter_map(|p| {
                let path = common::rebase(p, &root_str);
                if common::is_hidden(common::file_name(&path)) {
                    return None;
                }
                let full = self.root.join(&path);
                let meta = std::fs::metadata(&full).ok()?;
                if !meta.is_file() {
                    return None;
                }
                let stamp = meta.modified().map(common::human_stamp).unwrap_or(0);
                Some(FileRecord { path, size: meta.len(), stamp })
            })
            .collect()
    }

    /// Lists and stats in one go.
    pub fn scan(&self, masks: &str) -> Result<Vec<FileRecord>, KilnError> {
        let paths = self.list(masks)?;
        Ok(self.records(&paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn glob_translation() {
        assert_eq!(glob_to_regex("assets/*.txt"), r"^assets/[^/]*\.txt$");
        assert_eq!(glob_to_regex("**/*.png"), r"^(?:.*/)?[^/]*\.png$");
        assert_eq!(glob_to_regex("**.png"), r"^.*\.png$");
    }

    #[test]
    fn single_star_does_not_recurse() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "assets/a.txt", b"0123456789");
        touch(dir.path(), "assets/sub/b.txt", b"x");
        touch(dir.path(), "assets/c.png", b"x");

        let scanner = FileScanner::new(dir.path());
        let records = scanner.scan("assets/*.txt").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "assets/a.txt");
        assert_eq!(records[0].size, 10);
        assert!(records[0].stamp > 19700101000000);
    }

    #[test]
    fn double_star_recurses_and_masks_merge_sorted() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b/deep/x.png", b"x");
        touch(dir.path(), "a/y.PNG", b"x");
        touch(dir.path(), "a/z.txt", b"x");

        let scanner = FileScanner::new(dir.path());
        let paths = scanner.list("**/*.png;a/*.txt;**/*.png").unwrap();
        assert_eq!(paths, vec!["a/y.PNG", "a/z.txt", "b/deep/x.png"]);
    }

    #[test]
    fn hidden_files_and_directories_are_skipped() {
        let dir = tempdir().unwrap();
        touch(dir.path(), ".cook[0].zip", b"x");
        touch(dir.path(), "assets/.hidden.txt", b"x");
        touch(dir.path(), ".git/config.txt", b"x");
        touch(dir.path(), "assets/shown.txt", b"x");

        let scanner = FileScanner::new(dir.path());
        let paths = scanner.list("**").unwrap();
        assert_eq!(paths, vec!["assets/shown.txt"]);
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let dir = tempdir().unwrap();
        let scanner = FileScanner::new(dir.path());
        assert!(scanner.scan("missing/*.txt").unwrap().is_empty());
        assert!(scanner.scan("").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlinks_are_skipped() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "assets/a.txt", b"x");
        std::os::unix::fs::symlink(dir.path().join("assets/nowhere.txt"), dir.path().join("assets/broken.txt")).unwrap();

        let scanner = FileScanner::new(dir.path());
        assert_eq!(scanner.list("assets/*.txt").unwrap(), vec!["assets/a.txt"]);
        assert_eq!(scanner.scan("**").unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loops_are_skipped() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "assets/a.txt", b"x");
        std::os::unix::fs::symlink(dir.path().join("assets"), dir.path().join("assets/loop")).unwrap();

        let scanner = FileScanner::new(dir.path());
        assert_eq!(scanner.list("assets/**").unwrap(), vec!["assets/a.txt"]);
    }

    #[test]
    fn records_drop_directories_and_vanished_files() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a/file.txt", b"abc");
        let scanner = FileScanner::new(dir.path());
        let records = scanner.records(&["a".into(), "a/file.txt".into(), "a/gone.txt".into()]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "a/file.txt");
        assert_eq!(records[0].size, 3);
    }
}
