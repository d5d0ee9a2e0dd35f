//! General file management: listing package files, creating folders and
//! moving files between them.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::error::FileError;

pub const DEFAULT_EXTENSIONS: &[&str] = &["apk"];

/// What to do when the destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    #[default]
    Skip,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved(PathBuf),
    /// The copy landed but the original could not be removed.
    CopiedNotDeleted(PathBuf),
    Skipped(PathBuf),
}

pub struct FileUtilities {
    supported_extensions: Vec<String>,
}

impl Default for FileUtilities {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()))
    }
}

impl FileUtilities {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let supported_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { supported_extensions }
    }

    pub fn supported_extensions(&self) -> &[String] {
        &self.supported_extensions
    }

    pub fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| self.supported_extensions.iter().any(|e| *e == ext))
            .unwrap_or(false)
    }

    /// Lists the supported files directly inside `directory`, sorted by path.
    pub fn get_file_paths(&self, directory: &Path) -> Result<Vec<PathBuf>, FileError> {
        if !directory.is_dir() {
            debug!("invalid directory path: {}", directory.display());
            return Err(FileError::NotADirectory(directory.to_path_buf()));
        }
        let io_err = |source| FileError::Io {
            path: directory.to_path_buf(),
            source,
        };
        let mut entries = fs::read_dir(directory).map_err(io_err)?.peekable();
        if entries.peek().is_none() {
            debug!("Empty directory: {}", directory.display());
            return Err(FileError::EmptyDirectory(directory.to_path_buf()));
        }
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            // follows symlinks, so linked packages are listed too
            if !path.is_file() {
                if entry.file_type().map_err(io_err)?.is_symlink() {
                    debug!("Skipping dangling or non-file link: {}", path.display());
                }
                continue;
            }
            if self.is_supported_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        debug!("Found {} supported file(s) in {}", paths.len(), directory.display());
        Ok(paths)
    }

    /// Creates `parent/name` unless it already exists as a directory.
    pub fn create_new_directory(&self, name: &str, parent: &Path) -> Result<PathBuf, FileError> {
        let folder = parent.join(name);
        if folder.is_dir() {
            return Ok(folder);
        }
        if folder.exists() {
            error!("Failed to make folder: {} exists and is not a directory", folder.display());
            return Err(FileError::NotADirectoryTarget(folder));
        }
        match fs::create_dir_all(&folder) {
            Ok(()) => {
                info!("Folder created successfully: {}", name);
                Ok(folder)
            }
            Err(_) if folder.is_dir() => Ok(folder),
            Err(source) => {
                error!("Failed to make folder: {} in path: {}", name, parent.display());
                Err(FileError::CreateDirectory {
                    name: name.to_string(),
                    parent: parent.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Moves `file` into `directory`, keeping its file name.
    ///
    /// A rename is tried first; across filesystems the file is copied next to
    /// the destination, renamed into place and the original removed
    /// afterwards. A failed copy leaves the destination untouched.
    pub fn move_file_to_directory(
        &self,
        file: &Path,
        directory: &Path,
        policy: ConflictPolicy,
    ) -> Result<MoveOutcome, FileError> {
        let file_name = file.file_name().ok_or_else(|| FileError::Io {
            path: file.to_path_buf(),
            source: std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
        })?;
        let destination = directory.join(file_name);
        let move_err = |source| FileError::Move {
            from: file.to_path_buf(),
            to: destination.clone(),
            source,
        };

        if destination.exists() {
            match policy {
                ConflictPolicy::Skip => {
                    warn!("{} already exists, skipping", destination.display());
                    return Ok(MoveOutcome::Skipped(destination));
                }
                ConflictPolicy::Overwrite => {
                    debug!("Overwriting {}", destination.display());
                }
            }
        }

        if fs::rename(file, &destination).is_ok() {
            info!("{} Successfully moved to: {}", file_name.to_string_lossy(), directory.display());
            return Ok(MoveOutcome::Moved(destination));
        }

        copy_into_place(file, &destination).map_err(move_err)?;
        match fs::remove_file(file) {
            Ok(()) => {
                info!("{} Successfully moved to: {}", file_name.to_string_lossy(), directory.display());
                Ok(MoveOutcome::Moved(destination))
            }
            Err(e) => {
                error!("{}'s old file was copied but not deleted: {}", file_name.to_string_lossy(), e);
                Ok(MoveOutcome::CopiedNotDeleted(destination))
            }
        }
    }
}

/// Copies `file` to a hidden sibling of `destination` and renames it over
/// `destination`, removing the partial copy on any error.
fn copy_into_place(file: &Path, destination: &Path) -> std::io::Result<()> {
    let name = destination.file_name().unwrap_or_default().to_string_lossy();
    let partial = destination.with_file_name(format!(".{}.part", name));
    let result = fs::copy(file, &partial).and_then(|_| fs::rename(&partial, destination));
    if result.is_err() {
        match fs::remove_file(&partial) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                warn!("Could not remove partial copy {}: {}", partial.display(), e);
            }
            _ => {}
        }
    }
    result
}

fn invalid_chars() -> &'static Regex {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    INVALID.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"))
}

/// Turns a label into a name usable as a single directory component.
pub fn sanitize_dir_name(label: &str) -> String {
    let replaced = invalid_chars().replace_all(label, "_");
    let cleaned = replaced.trim().trim_end_matches('.').trim_end();
    match cleaned {
        "" | "." | ".." => "_".to_string(),
        name => name.to_string(),
    }
}
