//! Document store sink
//!
//! Stores each record as a JSON document, one per line, in
//! `<store_dir>/<collection>.jsonl`. Records are queued to a single writer
//! task so they land in submission order without blocking the caller.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    core::error::SinkError,
    sink::value_sink::{ValueRecord, ValueSink},
};

/// Document as persisted in a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: ValueRecord,
}

/// Append-only document collection on the local filesystem
#[derive(Debug)]
pub struct DocumentStoreSink {
    tx: mpsc::UnboundedSender<ValueRecord>,
    writer: JoinHandle<()>,
    path: PathBuf,
}

impl DocumentStoreSink {
    /// Start the writer task for `collection` inside `store_dir`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(store_dir: impl Into<PathBuf>, collection: &str) -> Self {
        let store_dir = store_dir.into();
        let path = store_dir.join(format!("{collection}.jsonl"));
        let (tx, rx) = mpsc::unbounded_channel();

        info!("Document store collection: {}", path.display());
        let writer = tokio::spawn(Self::run_writer(store_dir, path.clone(), rx));

        Self { tx, writer, path }
    }

    /// Path of the collection file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop accepting records and wait until queued ones are written
    pub async fn flush(self) {
        drop(self.tx);
        if let Err(e) = self.writer.await {
            warn!("Document store writer task failed: {}", e);
        }
    }

    async fn run_writer(
        store_dir: PathBuf,
        path: PathBuf,
        mut rx: mpsc::UnboundedReceiver<ValueRecord>,
    ) {
        let mut file: Option<File> = None;

        while let Some(record) = rx.recv().await {
            if let Err(e) = Self::write_record(&store_dir, &path, &mut file, record).await {
                warn!("Dropping document store write: {}", e);
                // Reopen on the next record
                file = None;
            }
        }

        debug!("Document store writer stopped");
    }

    async fn write_record(
        store_dir: &Path,
        path: &Path,
        file: &mut Option<File>,
        record: ValueRecord,
    ) -> Result<(), SinkError> {
        let document = StoredDocument {
            id: Uuid::new_v4(),
            record,
        };
        let mut line = serde_json::to_vec(&document)?;
        line.push(b'\n');

        if file.is_none() {
            fs::create_dir_all(store_dir).await?;
            let opened = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            *file = Some(opened);
        }

        if let Some(handle) = file.as_mut() {
            handle.write_all(&line).await?;
            handle.flush().await?;
        }

        debug!(id = %document.id, "Document stored");
        Ok(())
    }
}

impl ValueSink for DocumentStoreSink {
    fn append(&self, record: ValueRecord) {
        if self.tx.send(record).is_err() {
            warn!("Document store writer gone, dropping record");
        }
    }
}
