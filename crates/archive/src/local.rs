//! Upload sink backed by a local directory.
//!
//! Each upload lives in `<root>/<vault>/<upload_id>/`:
//! - `session.json`: the session parameters
//! - `archive.bin`: parts written at their byte offsets
//! - `receipt.json`: written once the upload completes

use std::io::SeekFrom;
use std::path::PathBuf;

use coldvault_transfer::{Part, calculate_file_checksum, validate_name};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::error::SinkError;
use crate::sink::{
    ArchiveReceipt, ArchiveSummary, PartAck, SessionConfig, SessionHandle, SinkFuture, UploadSink,
};

const SESSION_FILE: &str = "session.json";
const ARCHIVE_FILE: &str = "archive.bin";
const RECEIPT_FILE: &str = "receipt.json";

/// Stores uploads on the local filesystem.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Creates a sink rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding one upload.
    pub fn upload_dir(&self, session: &SessionHandle) -> Result<PathBuf, SinkError> {
        validate_name(&session.config.vault).map_err(|e| SinkError::Open(e.to_string()))?;
        validate_name(&session.upload_id).map_err(|e| SinkError::Open(e.to_string()))?;
        Ok(self
            .root
            .join(&session.config.vault)
            .join(&session.upload_id))
    }

    /// Path of the assembled archive for `session`.
    pub fn archive_path(&self, session: &SessionHandle) -> Result<PathBuf, SinkError> {
        Ok(self.upload_dir(session)?.join(ARCHIVE_FILE))
    }

    async fn open(&self, config: &SessionConfig) -> Result<SessionHandle, SinkError> {
        if config.part_size == 0 {
            return Err(SinkError::Open("part size must be greater than zero".into()));
        }
        let session = SessionHandle {
            upload_id: uuid::Uuid::new_v4().to_string(),
            config: config.clone(),
        };
        let dir = self.upload_dir(&session)?;

        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(SESSION_FILE), serde_json::to_vec_pretty(config)?).await?;
        tokio::fs::File::create(dir.join(ARCHIVE_FILE)).await?;

        debug!(upload_id = %session.upload_id, dir = %dir.display(), "local upload opened");
        Ok(session)
    }

    async fn write_part(
        &self,
        session: &SessionHandle,
        part: &Part,
    ) -> Result<PartAck, SinkError> {
        let reject = |reason: String| SinkError::Rejected {
            range: part.range,
            reason,
        };

        part.verify().map_err(|e| reject(e.to_string()))?;

        let part_size = session.config.part_size as u64;
        if part.range.start % part_size != 0 {
            return Err(reject(format!("start not aligned to part size {part_size}")));
        }
        if part.range.len() > part_size {
            return Err(reject(format!("larger than part size {part_size}")));
        }

        let path = self.archive_path(session)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .await?;
        file.seek(SeekFrom::Start(part.range.start)).await?;
        file.write_all(&part.body).await?;
        file.flush().await?;

        Ok(PartAck {
            range: part.range,
            checksum: part.checksum.clone(),
        })
    }

    async fn complete(
        &self,
        session: &SessionHandle,
        summary: &ArchiveSummary,
    ) -> Result<ArchiveReceipt, SinkError> {
        let dir = self.upload_dir(session)?;
        let path = dir.join(ARCHIVE_FILE);

        let archive_size = tokio::fs::metadata(&path).await?.len();
        if archive_size != summary.archive_size {
            return Err(SinkError::Complete(format!(
                "archive has {archive_size} bytes, expected {}",
                summary.archive_size
            )));
        }

        let checksum = tokio::task::spawn_blocking(move || calculate_file_checksum(&path))
            .await
            .map_err(|e| SinkError::Unavailable(format!("checksum task: {e}")))?
            .map_err(|e| SinkError::Complete(e.to_string()))?;
        if checksum != summary.checksum {
            return Err(SinkError::Complete(format!(
                "archive checksum {checksum} does not match {}",
                summary.checksum
            )));
        }

        let receipt = ArchiveReceipt {
            archive_id: session.upload_id.clone(),
            location: dir.display().to_string(),
            checksum,
            archive_size,
        };
        tokio::fs::write(dir.join(RECEIPT_FILE), serde_json::to_vec_pretty(&receipt)?).await?;
        Ok(receipt)
    }

    async fn abort(&self, session: &SessionHandle) -> Result<(), SinkError> {
        let dir = self.upload_dir(session)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl UploadSink for DirectorySink {
    fn open_session<'a>(&'a self, config: &'a SessionConfig) -> SinkFuture<'a, SessionHandle> {
        Box::pin(self.open(config))
    }

    fn submit_part<'a>(
        &'a self,
        session: &'a SessionHandle,
        part: &'a Part,
    ) -> SinkFuture<'a, PartAck> {
        Box::pin(self.write_part(session, part))
    }

    fn complete_session<'a>(
        &'a self,
        session: &'a SessionHandle,
        summary: &'a ArchiveSummary,
    ) -> SinkFuture<'a, ArchiveReceipt> {
        Box::pin(self.complete(session, summary))
    }

    fn abort_session<'a>(&'a self, session: &'a SessionHandle) -> SinkFuture<'a, ()> {
        Box::pin(self.abort(session))
    }
}
