//! Common utilities and types module.
// Shared records, path helpers and timestamp conversion.

use chrono::{Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;

/// One regular file found on disk by the scanner.
///
/// Records are created fresh on every scan and are never mutated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Normalized path relative to the program root, `/` separated.
    pub path: String,
    /// Size on disk in bytes.
    pub size: u64,
    /// Modification time as a base-10 local datetime (`YYYYMMDDhhmmss`).
    pub stamp: u64,
}

/// Normalize a path string: unify separators to `/`, strip any leading `./`
/// and collapse doubled slashes.
/// Example: ".\\dir1//dir2/file.txt" becomes "dir1/dir2/file.txt"
pub fn normalize_path(path: &str) -> String {
    let mut s = path.replace('\\', "/");
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    let mut trimmed = s.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

/// Rebase `path` onto `root`: if the normalized path starts with the
/// normalized root it is made relative, and leading slashes are dropped.
pub fn rebase(path: &str, root: &str) -> String {
    let path = normalize_path(path);
    let root = normalize_path(root);
    let root = root.trim_end_matches('/');
    let rest = if !root.is_empty() && root != "." {
        match path.strip_prefix(root) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path.as_str(),
        }
    } else {
        path.as_str()
    };
    normalize_path(rest.trim_start_matches('/'))
}

/// Final component of a `/` or `\` separated path.
pub fn file_name(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Directory part of a path, including its trailing separator.
pub fn file_dir(path: &str) -> &str {
    &path[..path.len() - file_name(path).len()]
}

/// Extension of the file name including the leading dot (".png"), or an
/// empty string when the name has none.
pub fn file_ext(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(pos) => &name[pos..],
        None => "",
    }
}

/// True for names the scanner treats as hidden/system files.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Paths that live outside the virtual namespace: rooted paths and
/// drive-letter paths.
pub fn is_absolute_like(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || path.as_bytes().get(1) == Some(&b':')
}

/// Convert a system time into the human base-10 stamp `YYYYMMDDhhmmss`
/// using local time.
pub fn human_stamp(time: SystemTime) -> u64 {
    let dt: chrono::DateTime<Local> = time.into();
    dt.year().max(0) as u64 * 10_000_000_000
        + dt.month() as u64 * 100_000_000
        + dt.day() as u64 * 1_000_000
        + dt.hour() as u64 * 10_000
        + dt.minute() as u64 * 100
        + dt.second() as u64
}

/// Human stamp of a file on disk, `0` when the metadata is unavailable.
pub fn file_stamp(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(human_stamp)
        .unwrap_or(0)
}

/// Split a human stamp back into `(year, month, day, hour, minute, second)`.
pub fn split_stamp(stamp: u64) -> (u16, u8, u8, u8, u8, u8) {
    (
        (stamp / 10_000_000_000) as u16,
        (stamp / 100_000_000 % 100) as u8,
        (stamp / 1_000_000 % 100) as u8,
        (stamp / 10_000 % 100) as u8,
        (stamp / 100 % 100) as u8,
        (stamp % 100) as u8,
    )
}

/// Join the pieces produced by [`split_stamp`].
pub fn join_stamp(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> u64 {
    year as u64 * 10_000_000_000
        + month as u64 * 100_000_000
        + day as u64 * 1_000_000
        + hour as u64 * 10_000
        + minute as u64 * 100
        + second as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unifies_separators_and_strips_dot_slash() {
        assert_eq!(normalize_path(".\\dir1//dir2/file.txt"), "dir1/dir2/file.txt");
        assert_eq!(normalize_path("././a.txt"), "a.txt");
        assert_eq!(normalize_path("a/b"), "a/b");
    }

    #[test]
    fn rebase_strips_root_prefix_only_on_segment_boundary() {
        assert_eq!(rebase("/prj/game/assets/a.png", "/prj/game"), "assets/a.png");
        assert_eq!(rebase("/prj/gamedata/a.png", "/prj/game"), "prj/gamedata/a.png");
        assert_eq!(rebase("./assets/a.png", "."), "assets/a.png");
    }

    #[test]
    fn name_dir_and_extension() {
        assert_eq!(file_name("c:/prj/dir/file.ext"), "file.ext");
        assert_eq!(file_dir("c:/prj/dir/file.ext"), "c:/prj/dir/");
        assert_eq!(file_ext("c:/prj/dir/file.tar.gz"), ".gz");
        assert_eq!(file_ext("dir.d/Makefile"), "");
    }

    #[test]
    fn absolute_like_paths() {
        assert!(is_absolute_like("/usr/share/a.png"));
        assert!(is_absolute_like("C:/games/a.png"));
        assert!(is_absolute_like("\\server\\a.png"));
        assert!(!is_absolute_like("assets/a.png"));
    }

    #[test]
    fn stamp_split_and_join_agree() {
        let stamp = 20210319113316;
        let (y, mo, d, h, mi, s) = split_stamp(stamp);
        assert_eq!((y, mo, d, h, mi, s), (2021, 3, 19, 11, 33, 16));
        assert_eq!(join_stamp(y, mo, d, h, mi, s), stamp);
    }

    #[test]
    fn human_stamp_has_fourteen_digits() {
        let stamp = human_stamp(SystemTime::now());
        assert_eq!(stamp.to_string().len(), 14);
    }
}
