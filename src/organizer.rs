//! Organizes package files into folders named after their label and version.
//!
//! The organizer runs through a list of files once, reporting progress after
//! every file. A failure on one file is recorded and the run moves on; the
//! report tells whether every app ended up organized.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::apk;
use crate::file_utils::{sanitize_dir_name, ConflictPolicy, FileUtilities, MoveOutcome};

#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    /// Root to create the label folders in; the source directory when unset.
    pub target_dir: Option<PathBuf>,
    pub dry_run: bool,
    pub conflict: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Moved { label: String, destination: PathBuf },
    CopiedNotDeleted { label: String, destination: PathBuf },
    Skipped { label: String, destination: PathBuf },
    Planned { label: String, destination: PathBuf },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Started { total: usize },
    Processed {
        index: usize,
        total: usize,
        file: PathBuf,
        outcome: FileOutcome,
    },
    Finished,
}

#[derive(Debug, Clone, Default)]
pub struct OrganizeReport {
    pub target: PathBuf,
    pub total: usize,
    pub moved: usize,
    pub skipped: usize,
    pub planned: usize,
    /// Files copied into place whose original could not be removed.
    pub leftovers: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

impl OrganizeReport {
    pub fn organized(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// No file failed. An interrupted run counts as long as nothing it
    /// touched went wrong.
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Organizer {
    utils: FileUtilities,
    options: OrganizeOptions,
    cancelled: Arc<AtomicBool>,
}

impl Organizer {
    pub fn new(utils: FileUtilities, options: OrganizeOptions) -> Self {
        Self {
            utils,
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the run before the next file once set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn run<F>(&self, source_dir: &Path, paths: &[PathBuf], mut on_progress: F) -> OrganizeReport
    where
        F: FnMut(Progress),
    {
        let target = self
            .options
            .target_dir
            .clone()
            .unwrap_or_else(|| source_dir.to_path_buf());
        let total = paths.len();
        let mut report = OrganizeReport {
            target: target.clone(),
            total,
            ..Default::default()
        };
        info!("Organizing {} file(s) from {} into {}", total, source_dir.display(), target.display());
        on_progress(Progress::Started { total });

        for (index, path) in paths.iter().enumerate() {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("Organizing cancelled after {} of {} file(s)", index, total);
                report.cancelled = true;
                break;
            }
            let outcome = match self.organize_file(path, &target) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Failed to organize {}: {:#}", path.display(), e);
                    FileOutcome::Failed {
                        reason: format!("{:#}", e),
                    }
                }
            };
            match &outcome {
                FileOutcome::Moved { .. } => report.moved += 1,
                FileOutcome::CopiedNotDeleted { .. } => {
                    report.moved += 1;
                    report.leftovers.push(path.clone());
                }
                FileOutcome::Skipped { .. } => report.skipped += 1,
                FileOutcome::Planned { .. } => report.planned += 1,
                FileOutcome::Failed { reason } => report.failures.push((path.clone(), reason.clone())),
            }
            on_progress(Progress::Processed {
                index: index + 1,
                total,
                file: path.clone(),
                outcome,
            });
        }

        on_progress(Progress::Finished);
        report
    }

    fn organize_file(&self, path: &Path, target: &Path) -> Result<FileOutcome> {
        let app = apk::read_app(path)?;
        let label = app.label_and_version();
        let folder = sanitize_dir_name(&label);
        debug!("{} -> {}", path.display(), folder);

        if self.options.dry_run {
            let file_name = path.file_name().unwrap_or_default();
            let destination = target.join(&folder).join(file_name);
            if destination.exists() && self.options.conflict == ConflictPolicy::Skip {
                return Ok(FileOutcome::Skipped { label, destination });
            }
            return Ok(FileOutcome::Planned { label, destination });
        }

        let directory = self.utils.create_new_directory(&folder, target)?;
        let outcome = match self.utils.move_file_to_directory(path, &directory, self.options.conflict)? {
            MoveOutcome::Moved(destination) => FileOutcome::Moved { label, destination },
            MoveOutcome::CopiedNotDeleted(destination) => FileOutcome::CopiedNotDeleted { label, destination },
            MoveOutcome::Skipped(destination) => FileOutcome::Skipped { label, destination },
        };
        Ok(outcome)
    }
}

/// Runs the organizer on a blocking worker, streaming its progress.
pub fn spawn_organize(
    organizer: Organizer,
    source_dir: PathBuf,
    paths: Vec<PathBuf>,
) -> (JoinHandle<OrganizeReport>, UnboundedReceiver<Progress>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::task::spawn_blocking(move || {
        organizer.run(&source_dir, &paths, |progress| {
            // receiver gone means nobody is watching; keep organizing
            let _ = tx.send(progress);
        })
    });
    (handle, rx)
}
