//! Checksummed, range-addressed upload parts.

use crate::chunked::checksum_bytes;
use crate::types::{ByteRange, Chunk};

/// Errors raised while building or verifying a [`Part`].
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    /// An empty chunk has no byte range and must never reach the builder.
    #[error("chunk {sequence_index} at offset {offset} is empty")]
    EmptyChunk { sequence_index: u64, offset: u64 },

    #[error("checksum mismatch for range {range}: expected {expected}, got {actual}")]
    Mismatch {
        range: ByteRange,
        expected: String,
        actual: String,
    },
}

/// One multipart-upload segment.
///
/// A part can only be created by consuming a [`Chunk`], so its range, checksum
/// and body always describe the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Sequence index of the chunk this part was built from.
    pub sequence_index: u64,
    /// Inclusive byte span within the source file.
    pub range: ByteRange,
    /// Lowercase hex SHA-256 of `body`.
    pub checksum: String,
    /// The chunk's bytes.
    pub body: Vec<u8>,
}

impl Part {
    /// Builds the part for `chunk`, taking ownership of its data.
    pub fn from_chunk(chunk: Chunk) -> Result<Self, ChecksumError> {
        let Some(range) = ByteRange::from_span(chunk.offset, chunk.data.len() as u64) else {
            return Err(ChecksumError::EmptyChunk {
                sequence_index: chunk.sequence_index,
                offset: chunk.offset,
            });
        };
        let checksum = checksum_bytes(&chunk.data);
        Ok(Self {
            sequence_index: chunk.sequence_index,
            range,
            checksum,
            body: chunk.data,
        })
    }

    /// Recomputes the body digest and compares it with `checksum`.
    pub fn verify(&self) -> Result<(), ChecksumError> {
        let actual = checksum_bytes(&self.body);
        if actual != self.checksum {
            return Err(ChecksumError::Mismatch {
                range: self.range,
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Number of payload bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Always `false` for a part built by [`Part::from_chunk`].
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
