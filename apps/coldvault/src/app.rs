//! Archive run wiring: sink, orchestrator, shutdown signal and event log.

use std::sync::Arc;

use anyhow::Result;
use coldvault_archive::{
    ArchiveEvent, ArchiveOrchestrator, ArchiveRunReport, DirectorySink, UploadSink,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Archives the configured tree into the local vault sink.
///
/// Ctrl-C cancels the run: in-flight files are aborted and the rest are
/// skipped. Returns an error if any file failed.
pub async fn run(config: Config) -> Result<()> {
    let sink: Arc<dyn UploadSink> = Arc::new(DirectorySink::new(config.sink_path()));
    let report = archive(&config, sink).await?;

    if report.failed() > 0 {
        anyhow::bail!("{} of {} files failed", report.failed(), report.files.len());
    }
    Ok(())
}

async fn archive(config: &Config, sink: Arc<dyn UploadSink>) -> Result<ArchiveRunReport> {
    let mut orchestrator = ArchiveOrchestrator::new(config.archive_options());
    let events = orchestrator
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("event receiver already taken"))?;
    let logger = tokio::spawn(log_events(events));

    let cancel = orchestrator.cancel_token();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown requested, cancelling archive run");
            cancel.cancel();
        }
    });

    info!(
        root = %config.root_path().display(),
        vault = %config.vault,
        sink = %config.sink_path().display(),
        part_size = config.part_size,
        "starting archive run"
    );
    let result = orchestrator.archive_tree(&config.root_path(), sink).await;

    signal.abort();
    // Closes the event channel so the logger drains and exits.
    drop(orchestrator);
    let _ = logger.await;

    let report = result?;
    info!(
        files = report.files.len(),
        completed = report.completed(),
        failed = report.failed(),
        bytes = report.bytes_uploaded(),
        cancelled = report.was_cancelled(),
        "archive summary"
    );
    Ok(report)
}

async fn log_events(mut events: mpsc::Receiver<ArchiveEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ArchiveEvent::FileStarted { path, size } => {
                info!(%path, size, "archiving file");
            }
            ArchiveEvent::PartUploaded {
                path,
                range,
                bytes_done,
            } => {
                debug!(%path, %range, bytes_done, "part uploaded");
            }
            ArchiveEvent::FileCompleted {
                path,
                archive_id,
                parts,
                bytes,
            } => {
                info!(%path, %archive_id, parts, bytes, "file archived");
            }
            ArchiveEvent::FileFailed { path, error } => {
                warn!(%path, %error, "file failed");
            }
            ArchiveEvent::FileCancelled { path } => {
                info!(%path, "file cancelled");
            }
        }
    }
}
