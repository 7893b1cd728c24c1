//! Archive error types.

use coldvault_transfer::{ByteRange, ChannelError, ChecksumError, TransferError};

/// Errors reported by an upload sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("session open failed: {0}")]
    Open(String),

    #[error("part {range} rejected: {reason}")]
    Rejected { range: ByteRange, reason: String },

    #[error("session completion failed: {0}")]
    Complete(String),

    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a file's pipeline or an archive run.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The source file could not be opened or read.
    #[error("read error: {0}")]
    Read(#[source] std::io::Error),

    #[error("checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Shutdown was requested. Not a failure.
    #[error("cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pipeline task failed: {0}")]
    Task(String),
}

impl ArchiveError {
    /// Returns `true` for a clean, requested shutdown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<TransferError> for ArchiveError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(e) => Self::Read(e),
            TransferError::Checksum(e) => Self::Checksum(e),
            TransferError::InvalidChunkSize => {
                Self::InvalidConfig("part size must be greater than zero".into())
            }
            TransferError::InvalidPath(msg) => Self::InvalidConfig(msg),
        }
    }
}

impl From<ChannelError> for ArchiveError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Cancelled => Self::Cancelled,
            // The consumer only goes away after reporting its own error.
            ChannelError::Closed => Self::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_io_maps_to_read() {
        let err: ArchiveError = TransferError::Io(std::io::Error::other("boom")).into();
        assert!(matches!(err, ArchiveError::Read(_)));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn zero_chunk_size_is_config_error() {
        let err: ArchiveError = TransferError::InvalidChunkSize.into();
        assert!(matches!(err, ArchiveError::InvalidConfig(_)));
    }

    #[test]
    fn channel_errors_are_cancellations() {
        assert!(ArchiveError::from(ChannelError::Cancelled).is_cancelled());
        assert!(ArchiveError::from(ChannelError::Closed).is_cancelled());
    }

    #[test]
    fn sink_error_message_names_range() {
        let err = ArchiveError::from(SinkError::Rejected {
            range: ByteRange::from_span(4, 4).unwrap(),
            reason: "throttled".into(),
        });
        assert_eq!(err.to_string(), "sink error: part 4-7 rejected: throttled");
    }
}
