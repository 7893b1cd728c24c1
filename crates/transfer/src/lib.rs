//! Chunked file reading and checksummed multipart parts.
//!
//! A source file is read by a [`ChunkReader`] into ordered [`Chunk`]s, which
//! travel through a bounded, cancellation-aware [`chunk_channel`] and are
//! turned one-for-one into [`Part`]s ready for a multipart upload.

mod channel;
mod chunked;
mod part;
mod types;
mod validation;

pub use channel::{ChannelError, ChunkReceiver, ChunkSender, chunk_channel};
pub use chunked::{ChunkReader, calculate_file_checksum, checksum_bytes};
pub use part::{ChecksumError, Part};
pub use types::{ByteRange, Chunk};
pub use validation::validate_name;

/// Default part size: 1 MiB.
///
/// Cold-storage multipart APIs expect a power-of-two number of MiB per part;
/// 1 MiB is the smallest accepted size.
pub const DEFAULT_PART_SIZE: usize = 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("invalid name: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}
