//! Lifecycle controller
//!
//! Owns the record channel and the writer task. `start` opens both table
//! stores per the configured mode and spawns the single writer; `stop`
//! requests shutdown, lets the writer perform its final flush, and joins it
//! with a bounded timeout. The store handles move into the writer task, so
//! nothing outside it can touch the tables while the engine runs.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::{EngineConfig, Mode};
use crate::decoder::DecodedRecord;
use crate::listener::EventSink;
use crate::records::{AuthorRecord, PostRecord};
use crate::shutdown::{shutdown_pair, ShutdownHandle};
use crate::store::{StoreError, TableStore};
use crate::writer::{run_writer, WriterStats};

/// File names of the two entity tables under the configured save path.
pub const POSTS_FILE: &str = "posts.jsonl";
pub const AUTHORS_FILE: &str = "authors.jsonl";

const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum EngineError {
    Store(StoreError),
    /// The writer task panicked instead of returning.
    WriterPanic(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Store(err)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Store(e) => write!(f, "Store error: {}", e),
            EngineError::WriterPanic(msg) => write!(f, "Writer task panicked: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// The running persistence engine. One per save path.
pub struct ArchiveEngine {
    tx: mpsc::UnboundedSender<DecodedRecord>,
    shutdown: ShutdownHandle,
    writer: Option<JoinHandle<Result<WriterStats, StoreError>>>,
}

impl ArchiveEngine {
    /// Open the table stores and spawn the writer task. Must run inside a
    /// tokio runtime.
    pub fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        std::fs::create_dir_all(&config.save_path).map_err(StoreError::Io)?;

        let posts_path = config.save_path.join(POSTS_FILE);
        let authors_path = config.save_path.join(AUTHORS_FILE);
        log::info!("Writing posts to {}", posts_path.display());
        log::info!("Writing authors to {}", authors_path.display());

        let (posts, authors) = match config.mode {
            Mode::Append => (
                TableStore::open_append(&posts_path)?,
                TableStore::open_append(&authors_path)?,
            ),
            Mode::Overwrite => {
                log::warn!("Mode is overwrite - existing tables will be replaced at first flush");
                (
                    TableStore::open_overwrite(&posts_path)?,
                    TableStore::open_overwrite(&authors_path)?,
                )
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, token) = shutdown_pair();

        log::info!("Starting writer task (backlog threshold: {})", config.backlog_sz);
        let writer = tokio::spawn(run_writer(rx, token, posts, authors, config.backlog_sz));

        Ok(Self {
            tx,
            shutdown,
            writer: Some(writer),
        })
    }

    /// Producer handle for the source's delivery context.
    pub fn sink(&self) -> EventSink {
        EventSink::new(self.tx.clone())
    }

    /// Request shutdown, wait for the final flush, and join the writer.
    /// A join timeout is logged as a warning, not escalated; a store error
    /// from the writer's last flush is.
    pub async fn stop(mut self) -> Result<Option<WriterStats>, EngineError> {
        log::info!("Stopping writer task");
        self.shutdown.request();

        let handle = match self.writer.take() {
            Some(handle) => handle,
            None => return Ok(None),
        };

        match timeout(JOIN_TIMEOUT, handle).await {
            Ok(Ok(Ok(stats))) => {
                log::info!(
                    "✅ Writer stopped: {} records in {} flushes",
                    stats.records_received,
                    stats.flushes
                );
                Ok(Some(stats))
            }
            Ok(Ok(Err(store_err))) => Err(EngineError::Store(store_err)),
            Ok(Err(join_err)) => Err(EngineError::WriterPanic(join_err.to_string())),
            Err(_) => {
                log::warn!("Timed out while joining writer task");
                Ok(None)
            }
        }
    }
}

impl Drop for ArchiveEngine {
    fn drop(&mut self) {
        if self.writer.is_some() {
            // stop() was never awaited; the writer will still observe the
            // request and drain, but nobody collects its result.
            self.shutdown.request();
            log::warn!("ArchiveEngine dropped without stop(); writer left to drain on its own");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_rejects_unwritable_path() {
        let config = EngineConfig::new("/dev/null/not-a-dir");
        assert!(matches!(
            ArchiveEngine::start(&config),
            Err(EngineError::Store(StoreError::Io(_)))
        ));
    }

    #[tokio::test]
    async fn test_stop_without_records_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::new(dir.path());

        let engine = ArchiveEngine::start(&config).unwrap();
        let stats = engine.stop().await.unwrap().unwrap();

        assert_eq!(stats.records_received, 0);
        assert_eq!(stats.flushes, 0);
    }
}
