//! One logging session, from attaching to the game until it exits.
//!
//! Wires the pieces together: offsets and game data are loaded, the
//! agent waits for the game process and attaches, the output tasks
//! (JSONL writers, optional WebSocket sender, optional webhook) subscribe
//! to the buses, and the [`CombatLogger`] samples until the game exits or
//! the session is cancelled. Dropping the buses afterwards lets every
//! output task drain and stop. A log writer that fails stops sampling,
//! since nothing would be recorded.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use d4log_events::{
    event_log_path, summary_log_path, EventBus, EventLog, EventLogError, LoggedEvent,
    LoggedSummary, SessionSequencer, WebhookDelivery,
};
use d4log_miner::{GameDatabase, Parser};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::collector::{wait_for_process, Collector};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::logger::{CombatLogger, LoggerSinks, RunReport};
use crate::offsets::load_offsets;
use crate::sender::{self, ReconnectConfig, SenderInput, SenderReport};

/// How often to look for the game process while it is not running.
pub const PROCESS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long the sender may keep draining after sampling stopped.
pub const SENDER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub run: RunReport,
    pub events_written: u64,
    pub summaries_written: u64,
    pub sender: Option<SenderReport>,
}

/// Run one session. Returns `Ok(None)` when cancelled before the game
/// process showed up.
pub async fn run(config: &AgentConfig, cancel: CancellationToken) -> Result<Option<SessionReport>> {
    let table = load_offsets(&config.offsets_path)?;
    let game_data = match &config.game_data_dir {
        Some(dir) => load_game_data(dir).await?,
        None => None,
    };

    let Some(process) = wait_for_process(&config.process_name, PROCESS_POLL_INTERVAL, &cancel).await
    else {
        return Ok(None);
    };
    let collector = Collector::attach(&process, table)?;

    let sequencer = SessionSequencer::new();
    let session_id = sequencer.session_id();
    let started_at = sequencer.started_at();

    let events = EventBus::<LoggedEvent>::default();
    let summaries = EventBus::<LoggedSummary>::default();
    let sampling = cancel.child_token();

    let event_writer = spawn_log_writer(
        event_log_path(&config.log_dir, &session_id),
        events.subscribe(),
        sampling.clone(),
    );
    let summary_writer = spawn_log_writer(
        summary_log_path(&config.log_dir, &session_id),
        summaries.subscribe(),
        sampling.clone(),
    );

    let sender_cancel = CancellationToken::new();
    let sender_task: Option<JoinHandle<SenderReport>> = config.ws_url.clone().map(|url| {
        let input = SenderInput {
            session_id,
            started_at,
            events: events.subscribe(),
            summaries: summaries.subscribe(),
        };
        let token = sender_cancel.clone();
        tokio::spawn(async move { sender::run(&url, input, ReconnectConfig::default(), token).await })
    });

    let webhook_task = match &config.webhook_url {
        Some(url) => {
            let delivery = WebhookDelivery::new(url.as_str())?;
            Some(tokio::spawn(delivery.run(summaries.subscribe())))
        }
        None => None,
    };

    tracing::info!(
        %session_id,
        pid = process.pid(),
        log_dir = %config.log_dir.display(),
        streaming = config.ws_url.is_some(),
        webhook = config.webhook_url.is_some(),
        "Logging session started",
    );

    let mut logger = CombatLogger::new(config.idle_timeout, sequencer);
    if let Some(db) = game_data {
        logger = logger.with_game_data(db);
    }
    let run_report = logger
        .run(
            &collector,
            config.sample_interval,
            || process.is_alive(),
            LoggerSinks {
                events: &events,
                summaries: &summaries,
            },
            sampling,
        )
        .await;

    // Closing the buses ends every output task once it has drained. Every
    // task is joined before the first failure is reported.
    drop(events);
    drop(summaries);

    let events_written = event_writer.await;
    let summaries_written = summary_writer.await;
    let sender = match sender_task {
        Some(task) => Some(finish_sender(task, &sender_cancel).await),
        None => None,
    };
    let webhook = match webhook_task {
        Some(task) => task.await,
        None => Ok(()),
    };

    let events_written = events_written??;
    let summaries_written = summaries_written??;
    let sender = sender.transpose()?;
    webhook?;

    let report = SessionReport {
        session_id,
        run: run_report,
        events_written,
        summaries_written,
        sender,
    };
    tracing::info!(
        %session_id,
        events_written,
        summaries_written,
        encounters = report.run.encounters,
        "Logging session finished",
    );
    Ok(Some(report))
}

/// Spawn a JSONL writer for `receiver`. If it fails, `stop` is cancelled.
fn spawn_log_writer<T>(
    path: PathBuf,
    receiver: broadcast::Receiver<T>,
    stop: CancellationToken,
) -> JoinHandle<std::result::Result<u64, EventLogError>>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let result = EventLog::run(&path, receiver).await;
        if let Err(e) = &result {
            tracing::error!(path = %path.display(), error = %e, "Log writer failed, stopping session");
            stop.cancel();
        }
        result
    })
}

/// Give the sender [`SENDER_SHUTDOWN_GRACE`] to drain, then cancel it.
async fn finish_sender(
    mut task: JoinHandle<SenderReport>,
    sender_cancel: &CancellationToken,
) -> std::result::Result<SenderReport, tokio::task::JoinError> {
    match tokio::time::timeout(SENDER_SHUTDOWN_GRACE, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::warn!("Sender still busy after shutdown grace period, stopping it");
            sender_cancel.cancel();
            task.await
        }
    }
}

/// Parse the mined game data on the blocking pool. A missing or
/// unreadable directory only disables power names.
async fn load_game_data(dir: &Path) -> Result<Option<Arc<GameDatabase>>> {
    let root = dir.to_path_buf();
    let parsed = tokio::task::spawn_blocking(move || Parser::new().parse_dir(root)).await?;

    match parsed {
        Ok(db) => {
            let counts = db.counts();
            tracing::info!(
                dir = %dir.display(),
                powers = counts.powers,
                warnings = counts.warnings,
                "Game data loaded",
            );
            Ok(Some(Arc::new(db)))
        }
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Game data unavailable, power names disabled");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::AgentError;

    #[tokio::test]
    async fn missing_offsets_file_fails_before_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig {
            offsets_path: dir.path().join("offsets.json"),
            ..Default::default()
        };
        let result = run(&config, CancellationToken::new()).await;
        assert_matches!(result, Err(AgentError::OffsetsIo { .. }));
    }

    #[tokio::test]
    async fn unreadable_game_data_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_game_data(&dir.path().join("missing")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn log_writer_failure_stops_sampling() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the log directory should be.
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, b"").unwrap();

        let bus = EventBus::<LoggedEvent>::default();
        let stop = CancellationToken::new();
        let writer = spawn_log_writer(blocker.join("session.jsonl"), bus.subscribe(), stop.clone());

        let result = tokio::time::timeout(Duration::from_secs(5), writer)
            .await
            .expect("writer should fail without waiting for the bus")
            .unwrap();
        assert_matches!(result, Err(EventLogError::Io { .. }));
        assert!(stop.is_cancelled());
    }

    #[tokio::test]
    async fn writer_closing_normally_leaves_sampling_running() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::<LoggedEvent>::default();
        let stop = CancellationToken::new();
        let writer = spawn_log_writer(dir.path().join("session.jsonl"), bus.subscribe(), stop.clone());

        drop(bus);
        assert_eq!(writer.await.unwrap().unwrap(), 0);
        assert!(!stop.is_cancelled());
    }
}
