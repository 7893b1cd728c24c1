//! Archive orchestrator for a whole source tree.
//!
//! Uploads files one session at a time, aggregates progress events and
//! supports cancellation.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ArchiveError;
use crate::pipeline::{FilePipeline, PipelineOptions};
use crate::scanner::{FileEntry, scan_tree_excluding, total_size};
use crate::sink::{SessionConfig, UploadSink};
use crate::types::{ArchiveEvent, ArchiveOptions, ArchiveRunReport, FileOutcome, FileResult};

/// Archives files into a vault, one at a time.
pub struct ArchiveOrchestrator {
    options: ArchiveOptions,
    events_tx: mpsc::Sender<ArchiveEvent>,
    events_rx: Option<mpsc::Receiver<ArchiveEvent>>,
    cancel: CancellationToken,
}

impl ArchiveOrchestrator {
    /// Creates a new orchestrator.
    pub fn new(options: ArchiveOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            options,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ArchiveEvent>> {
        self.events_rx.take()
    }

    /// Returns the token that stops the run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Builds the session parameters for one file.
    pub fn session_config(&self, entry: &FileEntry) -> SessionConfig {
        SessionConfig {
            account_id: self.options.account_id.clone(),
            vault: self.options.vault.clone(),
            description: entry.relative_path.clone(),
            part_size: self.options.part_size,
        }
    }

    /// Scans `root` and archives every regular file beneath it.
    pub async fn archive_tree(
        &self,
        root: &Path,
        sink: Arc<dyn UploadSink>,
    ) -> Result<ArchiveRunReport, ArchiveError> {
        let files = tokio::task::spawn_blocking({
            let root = root.to_path_buf();
            let exclude = self.options.exclude.clone();
            move || scan_tree_excluding(&root, &exclude)
        })
        .await
        .map_err(|e| ArchiveError::Task(format!("scan: {e}")))??;

        info!(
            root = %root.display(),
            files = files.len(),
            total_bytes = total_size(&files),
            "scan complete"
        );

        Ok(self.archive_files(&files, sink).await)
    }

    /// Archives `files` in order.
    ///
    /// A failing file is recorded and the run moves on; cancellation stops
    /// the run and marks the remaining files as skipped.
    pub async fn archive_files(
        &self,
        files: &[FileEntry],
        sink: Arc<dyn UploadSink>,
    ) -> ArchiveRunReport {
        let mut report = ArchiveRunReport::default();
        let pipeline_options = PipelineOptions {
            channel_capacity: self.options.channel_capacity,
        };

        for entry in files {
            if self.cancel.is_cancelled() {
                report.files.push(FileResult {
                    path: entry.relative_path.clone(),
                    outcome: FileOutcome::Skipped,
                });
                continue;
            }

            self.emit(ArchiveEvent::FileStarted {
                path: entry.relative_path.clone(),
                size: entry.size,
            });

            let pipeline = FilePipeline::new(Arc::clone(&sink), self.cancel.clone(), pipeline_options)
                .with_events(self.events_tx.clone());
            let result = pipeline
                .run_file(&entry.path, self.session_config(entry))
                .await;

            let outcome = match result {
                Ok(file_report) => {
                    self.emit(ArchiveEvent::FileCompleted {
                        path: entry.relative_path.clone(),
                        archive_id: file_report.receipt.archive_id.clone(),
                        parts: file_report.parts,
                        bytes: file_report.bytes,
                    });
                    FileOutcome::Completed(file_report)
                }
                Err(e) if e.is_cancelled() => {
                    warn!(path = %entry.relative_path, "archive run cancelled");
                    self.emit(ArchiveEvent::FileCancelled {
                        path: entry.relative_path.clone(),
                    });
                    FileOutcome::Cancelled
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    error!(path = %entry.relative_path, error = %err_msg, "archive failed");
                    self.emit(ArchiveEvent::FileFailed {
                        path: entry.relative_path.clone(),
                        error: err_msg.clone(),
                    });
                    FileOutcome::Failed(err_msg)
                }
            };

            report.files.push(FileResult {
                path: entry.relative_path.clone(),
                outcome,
            });
        }

        info!(
            completed = report.completed(),
            failed = report.failed(),
            bytes = report.bytes_uploaded(),
            cancelled = report.was_cancelled(),
            "archive run finished"
        );
        report
    }

    fn emit(&self, event: ArchiveEvent) {
        let _ = self.events_tx.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSink, payload};
    use std::time::Duration;

    fn options() -> ArchiveOptions {
        ArchiveOptions {
            account_id: "-".into(),
            vault: "pop-os".into(),
            part_size: 16,
            channel_capacity: 2,
            exclude: Vec::new(),
        }
    }

    fn make_tree(sizes: &[(&str, usize)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, size) in sizes {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, payload(*size)).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn archives_every_file_with_own_session() {
        let dir = make_tree(&[("a.bin", 40), ("docs/b.txt", 0), ("docs/c.txt", 16)]);
        let sink = Arc::new(MockSink::new());
        let orch = ArchiveOrchestrator::new(options());

        let report = orch
            .archive_tree(dir.path(), Arc::clone(&sink) as Arc<dyn UploadSink>)
            .await
            .unwrap();

        assert_eq!(report.completed(), 3);
        assert_eq!(report.failed(), 0);
        assert!(!report.was_cancelled());
        assert_eq!(report.bytes_uploaded(), 56);

        let opened = sink.opened.lock().unwrap();
        let descriptions: Vec<&str> = opened.iter().map(|c| c.description.as_str()).collect();
        assert_eq!(descriptions, vec!["a.bin", "docs/b.txt", "docs/c.txt"]);
        assert!(opened.iter().all(|c| c.vault == "pop-os" && c.part_size == 16));
        assert_eq!(sink.completed.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failing_file_does_not_stop_the_run() {
        let dir = make_tree(&[("a.bin", 20), ("b.bin", 20), ("c.bin", 20)]);
        let sink = Arc::new(MockSink::rejecting("b.bin"));
        let orch = ArchiveOrchestrator::new(options());

        let report = orch
            .archive_tree(dir.path(), Arc::clone(&sink) as Arc<dyn UploadSink>)
            .await
            .unwrap();

        assert_eq!(report.completed(), 2);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.files[1].outcome, FileOutcome::Failed(ref e) if e.contains("vault locked")));
    }

    #[tokio::test]
    async fn cancellation_skips_remaining_files() {
        let dir = make_tree(&[("a.bin", 64), ("b.bin", 64), ("c.bin", 64)]);
        // Stalls on the second part of the first file.
        let sink = Arc::new(MockSink::stalling_on_part(1));
        let orch = ArchiveOrchestrator::new(options());
        let cancel = orch.cancel_token();

        let run = {
            let sink = Arc::clone(&sink) as Arc<dyn UploadSink>;
            let root = dir.path().to_path_buf();
            tokio::spawn(async move { orch.archive_tree(&root, sink).await })
        };

        while sink.submit_calls() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("run should stop after cancel")
            .expect("no panic")
            .unwrap();

        assert!(report.was_cancelled());
        assert!(matches!(report.files[0].outcome, FileOutcome::Cancelled));
        assert!(matches!(report.files[1].outcome, FileOutcome::Skipped));
        assert!(matches!(report.files[2].outcome, FileOutcome::Skipped));
        assert_eq!(sink.opened.lock().unwrap().len(), 1);
        assert_eq!(sink.submit_calls(), 2);
    }

    #[tokio::test]
    async fn events_follow_file_lifecycle() {
        let dir = make_tree(&[("a.bin", 33)]);
        let sink = Arc::new(MockSink::new());
        let mut orch = ArchiveOrchestrator::new(options());
        let mut events_rx = orch.take_events().unwrap();

        orch.archive_tree(dir.path(), sink as Arc<dyn UploadSink>)
            .await
            .unwrap();
        drop(orch);

        let mut events = Vec::new();
        while let Some(e) = events_rx.recv().await {
            events.push(e);
        }

        assert!(matches!(events.first(), Some(ArchiveEvent::FileStarted { size: 33, .. })));
        let parts = events
            .iter()
            .filter(|e| matches!(e, ArchiveEvent::PartUploaded { .. }))
            .count();
        assert_eq!(parts, 3);
        assert!(matches!(
            events.last(),
            Some(ArchiveEvent::FileCompleted { parts: 3, bytes: 33, .. })
        ));
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let orch = ArchiveOrchestrator::new(options());
        let sink = Arc::new(MockSink::new()) as Arc<dyn UploadSink>;
        let result = orch
            .archive_tree(Path::new("/nonexistent/coldvault/root"), sink)
            .await;
        assert!(matches!(result, Err(ArchiveError::Io(_))));
    }

    #[tokio::test]
    async fn take_events_once() {
        let mut orch = ArchiveOrchestrator::new(options());
        assert!(orch.take_events().is_some());
        assert!(orch.take_events().is_none());
    }
}
