//! Multipart archive uploads for local files.
//!
//! This crate implements the **upload pipeline**: it knows nothing about any
//! particular cloud service. Callers provide an [`UploadSink`] that performs
//! the actual network calls.
//!
//! # Pipeline
//!
//! 1. **Scan**: walk the source tree ([`scan_tree`])
//! 2. **Open**: start one upload session per file
//! 3. **Stream**: a reader task and a part builder task exchange chunks
//!    through a bounded channel; each chunk becomes one checksummed part
//! 4. **Complete**: hand the sink the archive size and checksum
//!
//! A shared cancellation token stops every stage promptly.

pub mod error;
pub mod local;
pub mod orchestrator;
pub mod pipeline;
pub mod scanner;
pub mod sink;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use error::{ArchiveError, SinkError};
pub use local::DirectorySink;
pub use orchestrator::ArchiveOrchestrator;
pub use pipeline::{FilePipeline, FileReport, PipelineOptions, PipelineState};
pub use scanner::{FileEntry, scan_tree, scan_tree_excluding};
pub use sink::{
    ArchiveReceipt, ArchiveSummary, PartAck, SessionConfig, SessionHandle, SinkFuture, UploadSink,
};
pub use types::{
    ArchiveEvent, ArchiveOptions, ArchiveRunReport, DEFAULT_CHANNEL_CAPACITY, FileOutcome,
    FileResult,
};
