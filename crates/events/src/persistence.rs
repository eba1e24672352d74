//! Durable event log.
//!
//! [`EventLog`] subscribes to an [`EventBus`](crate::bus::EventBus) and
//! appends every record it receives to a JSON Lines file. It runs as a
//! long-lived background task and shuts down when the bus is dropped.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::broadcast;

use crate::error::{EventLogError, Result};

/// Background service that appends bus records to a JSONL file.
pub struct EventLog;

impl EventLog {
    /// Run the writer loop.
    ///
    /// Everything already queued on `receiver` is written as one batch and
    /// flushed, so a crash loses at most the batch in flight. The loop
    /// exits once the channel is closed and drained.
    pub async fn run<T>(path: impl AsRef<Path>, mut receiver: broadcast::Receiver<T>) -> Result<u64>
    where
        T: Serialize + Clone,
    {
        let path = path.as_ref();
        let mut writer = open_append(path).await?;
        let mut written = 0u64;

        loop {
            let first = match receiver.recv().await {
                Ok(record) => record,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        path = %path.display(),
                        "Event log lagged, some records were not written"
                    );
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(path = %path.display(), records = written, "Event bus closed, event log shutting down");
                    break;
                }
            };

            let mut batch = vec![first];
            let mut closed = false;
            loop {
                match receiver.try_recv() {
                    Ok(record) => batch.push(record),
                    Err(broadcast::error::TryRecvError::Empty) => break,
                    Err(broadcast::error::TryRecvError::Lagged(n)) => {
                        tracing::warn!(
                            skipped = n,
                            path = %path.display(),
                            "Event log lagged, some records were not written"
                        );
                    }
                    Err(broadcast::error::TryRecvError::Closed) => {
                        closed = true;
                        break;
                    }
                }
            }

            written += Self::write_batch(&mut writer, path, &batch).await?;

            if closed {
                tracing::info!(path = %path.display(), records = written, "Event bus closed, event log shutting down");
                break;
            }
        }

        Ok(written)
    }

    async fn write_batch<T: Serialize>(
        writer: &mut BufWriter<fs::File>,
        path: &Path,
        batch: &[T],
    ) -> Result<u64> {
        for record in batch {
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');
            writer
                .write_all(&line)
                .await
                .map_err(|e| EventLogError::io(path, e))?;
        }
        writer.flush().await.map_err(|e| EventLogError::io(path, e))?;
        Ok(batch.len() as u64)
    }
}

/// `<dir>/<session_id>.jsonl`
pub fn event_log_path(dir: impl AsRef<Path>, session_id: &uuid::Uuid) -> PathBuf {
    dir.as_ref().join(format!("{session_id}.jsonl"))
}

/// `<dir>/<session_id>.summaries.jsonl`
pub fn summary_log_path(dir: impl AsRef<Path>, session_id: &uuid::Uuid) -> PathBuf {
    dir.as_ref().join(format!("{session_id}.summaries.jsonl"))
}

async fn open_append(path: &Path) -> Result<BufWriter<fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| EventLogError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| EventLogError::io(path, e))?;
    Ok(BufWriter::new(file))
}
