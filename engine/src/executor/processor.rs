//! Work processors run by the executor.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::spool::Entry;

/// Error returned by a processor. The entry stays queued for retry.
#[derive(Debug)]
pub struct ProcessError(pub String);

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ProcessError {}

impl From<std::io::Error> for ProcessError {
    fn from(e: std::io::Error) -> Self {
        ProcessError(e.to_string())
    }
}

#[async_trait]
pub trait Processor<E: Entry>: Send + Sync + 'static {
    async fn process(&self, entry: &E) -> Result<(), ProcessError>;
}

/// "Uploads" payload files by copying them into an outbox directory.
#[derive(Debug, Clone)]
pub struct CopyProcessor {
    outbox: PathBuf,
}

impl CopyProcessor {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
        }
    }
}

#[async_trait]
impl<E: Entry> Processor<E> for CopyProcessor {
    async fn process(&self, entry: &E) -> Result<(), ProcessError> {
        let source = entry
            .payload_file()
            .ok_or_else(|| ProcessError(format!("entry {} has no payload file", entry.id())))?;
        let name = source
            .file_name()
            .ok_or_else(|| ProcessError(format!("{} has no file name", source.display())))?;
        let target = self.outbox.join(name);
        let bytes = tokio::fs::copy(source, &target).await?;
        debug!(entry_id = entry.id(), target = %target.display(), bytes, "Payload copied to outbox");
        Ok(())
    }
}
