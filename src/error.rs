use std::path::PathBuf;

/// The primary error type for all operations in the `kiln` crate.
///
/// Per-file transform failures are not represented here: they are reported
/// through [`crate::cooker::TransformError`] and never abort a cook pass.
#[derive(Debug, thiserror::Error)]
pub enum KilnError {
    /// An I/O error occurred, typically while reading or writing a file.
    /// Includes the path where the error happened.
    #[error("I/O error on path '{}': {source}", path.display())]
    Io { source: std::io::Error, path: PathBuf },

    /// The zip backend rejected an archive or an entry.
    #[error("zip error in '{}': {source}", path.display())]
    Zip { source: zip::result::ZipError, path: PathBuf },

    /// Directory traversal failed while scanning or listing a mount.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A scan mask could not be compiled into a matcher.
    #[error("invalid mask '{mask}': {source}")]
    Mask { mask: String, source: regex::Error },

    /// The cook database could not be opened for update, even after
    /// deleting and recreating it once.
    #[error("cannot open '{}' for updating: {reason}", path.display())]
    ArchiveOpen { path: PathBuf, reason: String },

    /// A mount point is neither a directory (trailing separator) nor a
    /// readable zip, tar or pak archive.
    #[error("'{}' is not a mountable archive or directory", path.display())]
    UnsupportedMount { path: PathBuf },

    /// A pak container is truncated or its directory is malformed.
    #[error("invalid pak archive '{}': {reason}", path.display())]
    Pak { path: PathBuf, reason: String },

    /// The configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// A cook worker thread panicked before reporting back.
    #[error("cook worker {0} panicked")]
    WorkerPanicked(usize),

    /// A wrapper for any other error that doesn't fit the specific variants.
    #[error("an unexpected error occurred: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl KilnError {
    pub(crate) fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        KilnError::Io { source, path: path.into() }
    }

    pub(crate) fn zip(source: zip::result::ZipError, path: impl Into<PathBuf>) -> Self {
        KilnError::Zip { source, path: path.into() }
    }
}

// Generic IO error conversion that doesn't require a path
impl From<std::io::Error> for KilnError {
    fn from(err: std::io::Error) -> Self {
        KilnError::Io { source: err, path: PathBuf::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display_mentions_path() {
        let err = KilnError::io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            "assets/a.txt",
        );
        let msg = err.to_string();
        assert!(msg.contains("assets/a.txt"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn archive_open_display() {
        let err = KilnError::ArchiveOpen {
            path: PathBuf::from(".cook[0].zip"),
            reason: "permission denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("for updating"));
        assert!(msg.contains(".cook[0].zip"));
    }

    #[test]
    fn bare_io_conversion_has_empty_path() {
        let err: KilnError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        match err {
            KilnError::Io { path, .. } => assert!(path.as_os_str().is_empty()),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
