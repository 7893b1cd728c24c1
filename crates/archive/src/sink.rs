//! Upload sink trait and session types.
//!
//! `UploadSink` is the only thing the pipeline knows about the remote
//! archive service. Cloud clients, local stores and test doubles all
//! implement it; retry policy, if any, lives behind it.

use std::future::Future;
use std::pin::Pin;

use coldvault_transfer::{ByteRange, Part};
use serde::{Deserialize, Serialize};

use crate::error::SinkError;

/// Boxed future returned by [`UploadSink`] methods.
pub type SinkFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SinkError>> + Send + 'a>>;

/// Per-file upload session parameters.
///
/// Built fresh for every file and never shared between files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Account owning the vault (`-` selects the credentials' own account).
    pub account_id: String,
    /// Destination vault or bucket.
    pub vault: String,
    /// Free-form archive description, usually the source path.
    pub description: String,
    /// Size of every part except the last, in bytes.
    pub part_size: usize,
}

/// Handle to an open multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Identifier assigned by the sink.
    pub upload_id: String,
    /// The configuration the session was opened with.
    pub config: SessionConfig,
}

/// Acknowledgement of one accepted part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartAck {
    pub range: ByteRange,
    pub checksum: String,
}

/// Totals handed to the sink when a file's upload completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    /// Number of parts submitted.
    pub parts: u64,
    /// Total bytes across all parts.
    pub archive_size: u64,
    /// SHA-256 over the concatenated part bodies, lowercase hex.
    pub checksum: String,
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReceipt {
    pub archive_id: String,
    pub location: String,
    pub checksum: String,
    pub archive_size: u64,
}

/// Destination of a multipart upload.
///
/// One part builder calls `submit_part` per session, in ascending range
/// order, so implementations need no extra synchronisation per session.
pub trait UploadSink: Send + Sync {
    /// Opens a multipart upload for one file.
    fn open_session<'a>(&'a self, config: &'a SessionConfig) -> SinkFuture<'a, SessionHandle>;

    /// Uploads one part and waits for the service to accept or reject it.
    fn submit_part<'a>(
        &'a self,
        session: &'a SessionHandle,
        part: &'a Part,
    ) -> SinkFuture<'a, PartAck>;

    /// Finalises the upload after every part has been accepted.
    fn complete_session<'a>(
        &'a self,
        session: &'a SessionHandle,
        summary: &'a ArchiveSummary,
    ) -> SinkFuture<'a, ArchiveReceipt> {
        Box::pin(async move {
            Ok(ArchiveReceipt {
                archive_id: session.upload_id.clone(),
                location: session.config.vault.clone(),
                checksum: summary.checksum.clone(),
                archive_size: summary.archive_size,
            })
        })
    }

    /// Discards a failed upload. Best effort.
    fn abort_session<'a>(&'a self, _session: &'a SessionHandle) -> SinkFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}
