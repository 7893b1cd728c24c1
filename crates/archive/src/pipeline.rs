//! Per-file upload pipeline.
//!
//! A file moves through `Idle -> SessionOpen -> Streaming -> Completed`, or
//! to `Aborted` from any state. While streaming, a reader task and a part
//! builder task run concurrently and share nothing but a bounded chunk
//! channel and a per-file cancellation token derived from the process-wide
//! one. The coordinator always joins both tasks before it reports an outcome.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use coldvault_transfer::{ChunkReader, ChunkReceiver, ChunkSender, Part, chunk_channel};
use sha2::{Digest, Sha256};
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ArchiveError, SinkError};
use crate::sink::{ArchiveReceipt, ArchiveSummary, SessionConfig, SessionHandle, UploadSink};
use crate::types::{ArchiveEvent, DEFAULT_CHANNEL_CAPACITY};

/// Lifecycle of one file's upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    SessionOpen,
    Streaming,
    Completed,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::SessionOpen => "session-open",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Tuning knobs for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Chunks buffered between reader and builder (0 behaves as 1).
    pub channel_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Outcome of a completed file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub description: String,
    pub upload_id: String,
    pub state: PipelineState,
    pub parts: u64,
    pub bytes: u64,
    pub checksum: String,
    pub receipt: ArchiveReceipt,
    pub elapsed: Duration,
}

/// Uploads one file through an [`UploadSink`].
pub struct FilePipeline {
    sink: Arc<dyn UploadSink>,
    cancel: CancellationToken,
    options: PipelineOptions,
    events: Option<mpsc::Sender<ArchiveEvent>>,
    state: watch::Sender<PipelineState>,
}

impl FilePipeline {
    /// Creates a pipeline. `cancel` is usually the process-wide token.
    pub fn new(
        sink: Arc<dyn UploadSink>,
        cancel: CancellationToken,
        options: PipelineOptions,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            sink,
            cancel,
            options,
            events: None,
            state,
        }
    }

    /// Publishes a [`ArchiveEvent::PartUploaded`] for every accepted part.
    ///
    /// Events are dropped rather than awaited when the receiver lags.
    pub fn with_events(mut self, events: mpsc::Sender<ArchiveEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Opens `path` and uploads it.
    pub async fn run_file(
        &self,
        path: &Path,
        config: SessionConfig,
    ) -> Result<FileReport, ArchiveError> {
        let started = Instant::now();
        let result = match ChunkReader::open(path, config.part_size).await {
            Ok(reader) => self.drive(reader, config, started).await,
            Err(e) => Err(e.into()),
        };
        self.finish(result)
    }

    /// Uploads everything `source` yields.
    pub async fn run_reader<R>(
        &self,
        source: R,
        config: SessionConfig,
    ) -> Result<FileReport, ArchiveError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let started = Instant::now();
        let result = match ChunkReader::new(source, config.part_size) {
            Ok(reader) => self.drive(reader, config, started).await,
            Err(e) => Err(e.into()),
        };
        self.finish(result)
    }

    fn finish(&self, result: Result<FileReport, ArchiveError>) -> Result<FileReport, ArchiveError> {
        match &result {
            Ok(_) => self.transition(PipelineState::Completed),
            Err(_) => self.transition(PipelineState::Aborted),
        }
        result
    }

    fn transition(&self, next: PipelineState) {
        let prev = self.state.send_replace(next);
        debug!(from = %prev, to = %next, "pipeline state");
    }

    async fn drive<R>(
        &self,
        reader: ChunkReader<R>,
        config: SessionConfig,
        started: Instant,
    ) -> Result<FileReport, ArchiveError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }

        let session = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ArchiveError::Cancelled),
            res = self.sink.open_session(&config) => res?,
        };
        self.transition(PipelineState::SessionOpen);
        debug!(
            upload_id = %session.upload_id,
            description = %config.description,
            part_size = config.part_size,
            "upload session opened"
        );
        let session = Arc::new(session);

        let file_cancel = self.cancel.child_token();
        // Tears both tasks down if this future is dropped mid-stream.
        let _guard = file_cancel.clone().drop_guard();
        let (tx, rx) = chunk_channel(self.options.channel_capacity, file_cancel.clone());

        let reader_task = tokio::spawn(read_chunks(reader, tx, file_cancel.clone()));
        let builder_task = tokio::spawn(build_parts(
            rx,
            Arc::clone(&self.sink),
            Arc::clone(&session),
            file_cancel.clone(),
            self.events.clone(),
        ));
        self.transition(PipelineState::Streaming);

        let (read_res, build_res) = tokio::join!(reader_task, builder_task);
        let read_res = read_res
            .map_err(|e| ArchiveError::Task(format!("reader: {e}")))
            .and_then(|r| r);
        let build_res = build_res
            .map_err(|e| ArchiveError::Task(format!("part builder: {e}")))
            .and_then(|r| r);

        let outcome = match (read_res, build_res) {
            (Ok(chunks), Ok(summary)) if chunks == summary.parts => Ok(summary),
            (Ok(chunks), Ok(summary)) => Err(ArchiveError::Task(format!(
                "read {chunks} chunks but submitted {} parts",
                summary.parts
            ))),
            // Prefer the root cause over the other side's cancellation.
            (Err(read_err), Err(build_err)) => Err(if read_err.is_cancelled() {
                build_err
            } else {
                read_err
            }),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        };

        let summary = match outcome {
            Ok(summary) => summary,
            Err(e) => {
                self.abort(&session, &e).await;
                return Err(e);
            }
        };

        let receipt = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ArchiveError::Cancelled),
            res = self.sink.complete_session(&session, &summary) => match res {
                Ok(receipt) => receipt,
                Err(e) => {
                    let e = ArchiveError::from(e);
                    self.abort(&session, &e).await;
                    return Err(e);
                }
            },
        };

        let elapsed = started.elapsed();
        info!(
            upload_id = %session.upload_id,
            description = %config.description,
            parts = summary.parts,
            bytes = summary.archive_size,
            elapsed_ms = elapsed.as_millis() as u64,
            "upload completed"
        );

        Ok(FileReport {
            description: config.description,
            upload_id: session.upload_id.clone(),
            state: PipelineState::Completed,
            parts: summary.parts,
            bytes: summary.archive_size,
            checksum: summary.checksum,
            receipt,
            elapsed,
        })
    }

    /// Releases the remote session after a failure.
    ///
    /// Skipped on cancellation: no sink calls are issued after shutdown is
    /// requested.
    async fn abort(&self, session: &SessionHandle, cause: &ArchiveError) {
        if cause.is_cancelled() {
            info!(upload_id = %session.upload_id, "upload cancelled");
            return;
        }
        error!(upload_id = %session.upload_id, error = %cause, "upload failed");
        if let Err(e) = self.sink.abort_session(session).await {
            warn!(upload_id = %session.upload_id, error = %e, "failed to abort upload session");
        }
    }
}

/// Producer: reads chunks in offset order and hands them to the channel.
///
/// Owns the source; it is dropped when this task returns on any path.
async fn read_chunks<R>(
    mut reader: ChunkReader<R>,
    tx: ChunkSender,
    cancel: CancellationToken,
) -> Result<u64, ArchiveError>
where
    R: AsyncRead + Unpin,
{
    let result = pump_chunks(&mut reader, &tx, &cancel).await;
    if result.is_err() {
        cancel.cancel();
    }
    result
}

async fn pump_chunks<R>(
    reader: &mut ChunkReader<R>,
    tx: &ChunkSender,
    cancel: &CancellationToken,
) -> Result<u64, ArchiveError>
where
    R: AsyncRead + Unpin,
{
    let mut sent = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ArchiveError::Cancelled),
            chunk = reader.next_chunk() => chunk?,
        };
        let Some(chunk) = next else {
            return Ok(sent);
        };
        trace!(offset = chunk.offset, len = chunk.len(), "chunk read");
        tx.send(chunk).await?;
        sent += 1;
    }
}

/// Consumer: turns each chunk into one part and submits it to the sink.
async fn build_parts(
    mut rx: ChunkReceiver,
    sink: Arc<dyn UploadSink>,
    session: Arc<SessionHandle>,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<ArchiveEvent>>,
) -> Result<ArchiveSummary, ArchiveError> {
    let result = submit_parts(&mut rx, sink.as_ref(), &session, &cancel, events.as_ref()).await;
    if result.is_err() {
        cancel.cancel();
    }
    result
}

async fn submit_parts(
    rx: &mut ChunkReceiver,
    sink: &dyn UploadSink,
    session: &SessionHandle,
    cancel: &CancellationToken,
    events: Option<&mpsc::Sender<ArchiveEvent>>,
) -> Result<ArchiveSummary, ArchiveError> {
    let mut hasher = Sha256::new();
    let mut parts = 0u64;
    let mut next_offset = 0u64;

    while let Some(chunk) = rx.recv().await? {
        let part = Part::from_chunk(chunk)?;
        if part.range.start != next_offset {
            return Err(ArchiveError::Task(format!(
                "part {} out of order, expected offset {next_offset}",
                part.range
            )));
        }

        if cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }
        let ack = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ArchiveError::Cancelled),
            ack = sink.submit_part(session, &part) => ack?,
        };
        if ack.range != part.range {
            return Err(SinkError::Rejected {
                range: part.range,
                reason: format!("acknowledged range {}", ack.range),
            }
            .into());
        }
        if ack.checksum != part.checksum {
            return Err(SinkError::Rejected {
                range: part.range,
                reason: format!("acknowledged checksum {}", ack.checksum),
            }
            .into());
        }

        hasher.update(&part.body);
        parts += 1;
        next_offset = part.range.end + 1;
        trace!(upload_id = %session.upload_id, range = %part.range, "part accepted");

        if let Some(events) = events {
            let _ = events.try_send(ArchiveEvent::PartUploaded {
                path: session.config.description.clone(),
                range: part.range,
                bytes_done: next_offset,
            });
        }
    }

    Ok(ArchiveSummary {
        parts,
        archive_size: next_offset,
        checksum: hex::encode(hasher.finalize()),
    })
}
