//! Bounded, cancellation-aware handoff between the chunk reader and the part
//! builder.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::Chunk;

/// Why a channel operation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("cancelled")]
    Cancelled,

    #[error("chunk channel closed")]
    Closed,
}

/// Creates a bounded FIFO chunk channel tied to `cancel`.
///
/// A capacity of 0 is raised to 1: the producer can be at most one chunk
/// ahead of the consumer.
pub fn chunk_channel(capacity: usize, cancel: CancellationToken) -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChunkSender {
            tx,
            cancel: cancel.clone(),
        },
        ChunkReceiver { rx, cancel },
    )
}

/// Producer half. Dropping it ends the stream for the receiver.
pub struct ChunkSender {
    tx: mpsc::Sender<Chunk>,
    cancel: CancellationToken,
}

impl ChunkSender {
    /// Enqueues `chunk`, waiting while the channel is full.
    ///
    /// Cancellation is checked before the enqueue is attempted and raced
    /// against it while waiting for space.
    pub async fn send(&self, chunk: Chunk) -> Result<(), ChannelError> {
        if self.cancel.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChannelError::Cancelled),
            res = self.tx.send(chunk) => res.map_err(|_| ChannelError::Closed),
        }
    }
}

/// Consumer half. There is exactly one per channel.
pub struct ChunkReceiver {
    rx: mpsc::Receiver<Chunk>,
    cancel: CancellationToken,
}

impl ChunkReceiver {
    /// Dequeues the next chunk, waiting while the channel is empty.
    ///
    /// Returns `Ok(None)` once the sender is dropped and every queued chunk
    /// has been delivered.
    pub async fn recv(&mut self) -> Result<Option<Chunk>, ChannelError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChannelError::Cancelled),
            chunk = self.rx.recv() => Ok(chunk),
        }
    }
}
