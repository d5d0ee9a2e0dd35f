//! Error types for reading packages and moving files.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading metadata out of a package archive.
#[derive(Debug, Error)]
pub enum ApkError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a valid package archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Package has no {0} entry")]
    MissingEntry(String),

    #[error("Malformed {what} at offset {offset}: {reason}")]
    Malformed {
        what: &'static str,
        offset: usize,
        reason: String,
    },

    #[error("Manifest has no package name")]
    MissingPackageName,

    #[error("Could not resolve resource 0x{0:08x}")]
    UnresolvedResource(u32),

    #[error("Invalid bundle manifest: {0}")]
    BundleManifest(#[from] serde_json::Error),
}

impl ApkError {
    pub fn malformed(what: &'static str, offset: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            offset,
            reason: reason.into(),
        }
    }
}

/// Errors raised by directory listing, creation and file moves.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("{} directory path is not valid! Please choose a valid path", .0.display())]
    NotADirectory(PathBuf),

    #[error("{} is empty. Please load some APKs in it!", .0.display())]
    EmptyDirectory(PathBuf),

    #[error("Failed to make folder {name} in path {}: {source}", .parent.display())]
    CreateDirectory {
        name: String,
        parent: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exists and is not a directory", .0.display())]
    NotADirectoryTarget(PathBuf),

    #[error("Error moving {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
