use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::TransferError;
use crate::types::Chunk;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = match file.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a source sequentially in fixed-size chunks.
///
/// Every chunk except the last is exactly `chunk_size` bytes long. The reader
/// looks one chunk ahead so that the final chunk is flagged `is_last` even
/// when the source length is an exact multiple of the chunk size. An empty
/// source yields no chunks.
///
/// The sequence is finite and cannot be restarted: once `next_chunk` returns
/// `None` or an error, every later call returns `None`.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    offset: u64,
    next_index: u64,
    lookahead: Option<Vec<u8>>,
    pending_error: Option<std::io::Error>,
    finished: bool,
}

impl ChunkReader<tokio::fs::File> {
    /// Opens `path` for chunked reading.
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        let file = tokio::fs::File::open(path).await?;
        Self::new(file, chunk_size)
    }
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wraps an async reader.
    pub fn new(reader: R, chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        Ok(Self {
            reader,
            chunk_size,
            offset: 0,
            next_index: 0,
            lookahead: None,
            pending_error: None,
            finished: false,
        })
    }

    /// Reads the next chunk. Returns `None` at end of stream.
    ///
    /// Any I/O error other than [`ErrorKind::Interrupted`] is fatal and
    /// terminates the sequence.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.finished {
            return Ok(None);
        }
        if let Some(e) = self.pending_error.take() {
            self.finished = true;
            return Err(e.into());
        }

        let data = match self.lookahead.take() {
            Some(buf) => buf,
            None => match self.fill().await {
                Ok(buf) => buf,
                Err(e) => {
                    self.finished = true;
                    return Err(e.into());
                }
            },
        };

        if data.is_empty() {
            self.finished = true;
            return Ok(None);
        }

        let is_last = if data.len() < self.chunk_size {
            true
        } else {
            match self.fill().await {
                Ok(next) if next.is_empty() => true,
                Ok(next) => {
                    self.lookahead = Some(next);
                    false
                }
                // The current chunk is intact; report the failure on the next call.
                Err(e) => {
                    self.pending_error = Some(e);
                    false
                }
            }
        };
        if is_last {
            self.finished = true;
        }

        let chunk = Chunk {
            sequence_index: self.next_index,
            offset: self.offset,
            data,
            is_last,
        };
        self.next_index += 1;
        self.offset += chunk.data.len() as u64;
        Ok(Some(chunk))
    }

    /// Byte offset of the next chunk to be returned.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads until `chunk_size` bytes are buffered or the stream ends.
    async fn fill(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }
}
