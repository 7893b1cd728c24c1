//! Test doubles shared by the crate's unit tests.

use std::io::Cursor;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll, ready};

use coldvault_transfer::Part;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::SinkError;
use crate::sink::{ArchiveSummary, PartAck, SessionConfig, SessionHandle, SinkFuture, UploadSink};

/// Records every call and can be scripted to fail or stall.
#[derive(Default)]
pub(crate) struct MockSink {
    pub opened: Mutex<Vec<SessionConfig>>,
    pub parts: Mutex<Vec<Part>>,
    pub completed: Mutex<Vec<ArchiveSummary>>,
    pub aborted: AtomicUsize,
    submit_calls: AtomicUsize,
    fail_on_call: Option<usize>,
    stall_on_call: Option<usize>,
    reject_description: Option<String>,
    wrong_ack_checksum: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the `call`-th (0-based) `submit_part` call.
    pub fn failing_on_part(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    /// Never resolves the `call`-th (0-based) `submit_part` call.
    pub fn stalling_on_part(call: usize) -> Self {
        Self {
            stall_on_call: Some(call),
            ..Self::default()
        }
    }

    /// Refuses to open a session for `description`.
    pub fn rejecting(description: &str) -> Self {
        Self {
            reject_description: Some(description.into()),
            ..Self::default()
        }
    }

    /// Accepts every part but acknowledges a checksum it did not receive.
    pub fn acking_wrong_checksum() -> Self {
        Self {
            wrong_ack_checksum: true,
            ..Self::default()
        }
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn ranges(&self) -> Vec<String> {
        let parts = self.parts.lock().unwrap();
        parts.iter().map(|p| p.range.to_string()).collect()
    }

    /// Concatenates accepted part bodies by ascending range start.
    pub fn reassemble(&self) -> Vec<u8> {
        let mut parts = self.parts.lock().unwrap().clone();
        parts.sort_by_key(|p| p.range.start);
        parts.into_iter().flat_map(|p| p.body).collect()
    }
}

impl UploadSink for MockSink {
    fn open_session<'a>(&'a self, config: &'a SessionConfig) -> SinkFuture<'a, SessionHandle> {
        Box::pin(async move {
            if self.reject_description.as_deref() == Some(config.description.as_str()) {
                return Err(SinkError::Open("vault locked".into()));
            }
            let mut opened = self.opened.lock().unwrap();
            opened.push(config.clone());
            Ok(SessionHandle {
                upload_id: format!("upload-{}", opened.len()),
                config: config.clone(),
            })
        })
    }

    fn submit_part<'a>(
        &'a self,
        _session: &'a SessionHandle,
        part: &'a Part,
    ) -> SinkFuture<'a, PartAck> {
        Box::pin(async move {
            let call = self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if self.stall_on_call == Some(call) {
                std::future::pending::<()>().await;
            }
            if self.fail_on_call == Some(call) {
                return Err(SinkError::Rejected {
                    range: part.range,
                    reason: "service unavailable".into(),
                });
            }
            self.parts.lock().unwrap().push(part.clone());
            let checksum = if self.wrong_ack_checksum {
                coldvault_transfer::checksum_bytes(b"something else")
            } else {
                part.checksum.clone()
            };
            Ok(PartAck {
                range: part.range,
                checksum,
            })
        })
    }

    fn complete_session<'a>(
        &'a self,
        session: &'a SessionHandle,
        summary: &'a ArchiveSummary,
    ) -> SinkFuture<'a, crate::sink::ArchiveReceipt> {
        Box::pin(async move {
            self.completed.lock().unwrap().push(summary.clone());
            Ok(crate::sink::ArchiveReceipt {
                archive_id: format!("archive-{}", session.upload_id),
                location: session.config.vault.clone(),
                checksum: summary.checksum.clone(),
                archive_size: summary.archive_size,
            })
        })
    }

    fn abort_session<'a>(&'a self, _session: &'a SessionHandle) -> SinkFuture<'a, ()> {
        Box::pin(async move {
            self.aborted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// In-memory source that flags when it is dropped.
pub(crate) struct TrackedSource {
    inner: Cursor<Vec<u8>>,
    dropped: Arc<AtomicBool>,
    fail_at_end: bool,
}

impl TrackedSource {
    pub fn new(data: Vec<u8>) -> (Self, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (
            Self {
                inner: Cursor::new(data),
                dropped: Arc::clone(&dropped),
                fail_at_end: false,
            },
            dropped,
        )
    }

    /// Yields `data`, then fails with an I/O error instead of reporting EOF.
    pub fn failing_after(data: Vec<u8>) -> (Self, Arc<AtomicBool>) {
        let (mut source, dropped) = Self::new(data);
        source.fail_at_end = true;
        (source, dropped)
    }
}

impl AsyncRead for TrackedSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.inner).poll_read(cx, buf))?;
        if self.fail_at_end && buf.remaining() > 0 && buf.filled().len() == before {
            return Poll::Ready(Err(std::io::Error::other("disk gone")));
        }
        Poll::Ready(Ok(()))
    }
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Deterministic test payload of `len` bytes.
pub(crate) fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
