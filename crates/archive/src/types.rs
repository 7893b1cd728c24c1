//! Data types for archive runs.

use std::path::PathBuf;

use coldvault_transfer::{ByteRange, DEFAULT_PART_SIZE};

use crate::pipeline::FileReport;

/// Default number of chunks buffered between reader and part builder.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// Settings shared by every file of an archive run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub account_id: String,
    pub vault: String,
    pub part_size: usize,
    pub channel_capacity: usize,
    /// Subtrees left out of the scan, e.g. a local sink's storage root.
    pub exclude: Vec<PathBuf>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            account_id: "-".into(),
            vault: "backups".into(),
            part_size: DEFAULT_PART_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            exclude: Vec::new(),
        }
    }
}

/// Progress event emitted during an archive run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    /// A file's upload session is about to be opened.
    FileStarted { path: String, size: u64 },
    /// The sink accepted a part.
    PartUploaded {
        path: String,
        range: ByteRange,
        bytes_done: u64,
    },
    /// Every part was accepted and the session completed.
    FileCompleted {
        path: String,
        archive_id: String,
        parts: u64,
        bytes: u64,
    },
    /// The file's pipeline aborted on an error.
    FileFailed { path: String, error: String },
    /// The file's pipeline aborted because shutdown was requested.
    FileCancelled { path: String },
}

/// How a single file ended.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Completed(FileReport),
    Failed(String),
    Cancelled,
    /// Never started because the run was cancelled first.
    Skipped,
}

/// Outcome for one file of a run.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub path: String,
    pub outcome: FileOutcome,
}

/// Outcomes of a whole archive run, in processing order.
#[derive(Debug, Clone, Default)]
pub struct ArchiveRunReport {
    pub files: Vec<FileResult>,
}

impl ArchiveRunReport {
    /// Number of files uploaded successfully.
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Completed(_)))
    }

    /// Number of files whose pipeline failed.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    /// Returns `true` if the run stopped because of a shutdown request.
    pub fn was_cancelled(&self) -> bool {
        self.files
            .iter()
            .any(|f| matches!(f.outcome, FileOutcome::Cancelled | FileOutcome::Skipped))
    }

    /// Total bytes uploaded across completed files.
    pub fn bytes_uploaded(&self) -> u64 {
        self.files
            .iter()
            .filter_map(|f| match &f.outcome {
                FileOutcome::Completed(report) => Some(report.bytes),
                _ => None,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}
