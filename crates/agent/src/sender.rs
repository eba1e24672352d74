//! Live streaming to a remote collector over WebSocket.
//!
//! Forwards every [`LoggedEvent`] and [`LoggedSummary`] from the event
//! buses as a JSON text frame. Each frame is an envelope:
//!
//! ```json
//! {"type": "combat_event", "session_id": "...", "sent_at": "...", "data": {...}}
//! ```
//!
//! A `session_start` frame opens every connection and a `session_end`
//! frame is sent when the buses close or the agent shuts down. Dropped
//! connections are retried with exponential backoff; events published
//! while disconnected stay queued in the broadcast receivers up to the
//! bus capacity. A record whose send failed is held back and sent first on
//! the next connection.

use std::time::Duration;

use chrono::{DateTime, Utc};
use d4log_core::message_types::{
    MSG_TYPE_COMBAT_EVENT, MSG_TYPE_ENCOUNTER_SUMMARY, MSG_TYPE_SESSION_END,
    MSG_TYPE_SESSION_START,
};
use d4log_events::{LoggedEvent, LoggedSummary};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    r#type: &'static str,
    session_id: Uuid,
    sent_at: DateTime<Utc>,
    data: &'a T,
}

#[derive(Debug, Serialize)]
struct SessionStart {
    started_at: DateTime<Utc>,
    /// Frames already delivered on earlier connections of this session.
    resumed_after: u64,
}

#[derive(Debug, Serialize)]
struct SessionEnd {
    events_sent: u64,
    summaries_sent: u64,
}

/// Serialize one envelope frame.
pub fn encode_message<T: Serialize>(
    msg_type: &'static str,
    session_id: Uuid,
    data: &T,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        r#type: msg_type,
        session_id,
        sent_at: Utc::now(),
        data,
    })
}

/// Frames delivered over the lifetime of [`run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderReport {
    pub connections: u32,
    pub events_sent: u64,
    pub summaries_sent: u64,
}

/// Why a connection ended.
enum SessionEnded {
    /// Both buses closed; the logging session is over.
    Drained,
    Cancelled,
    /// Connection lost; reconnect.
    Disconnected,
}

/// A record taken off a bus.
#[derive(Debug)]
enum Outgoing {
    Event(LoggedEvent),
    Summary(LoggedSummary),
}

impl Outgoing {
    /// Send the record, handing it back if the connection failed.
    async fn deliver<S>(
        self,
        sink: &mut S,
        session_id: Uuid,
        report: &mut SenderReport,
    ) -> Result<(), Outgoing>
    where
        S: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        let sent = match &self {
            Outgoing::Event(event) => send(sink, MSG_TYPE_COMBAT_EVENT, session_id, event).await,
            Outgoing::Summary(summary) => {
                send(sink, MSG_TYPE_ENCOUNTER_SUMMARY, session_id, summary).await
            }
        };
        if sent.is_err() {
            return Err(self);
        }
        match self {
            Outgoing::Event(_) => report.events_sent += 1,
            Outgoing::Summary(_) => report.summaries_sent += 1,
        }
        Ok(())
    }
}

/// Open the receivers to stream. Subscribe before the logger starts so
/// no event is missed.
pub struct SenderInput {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub events: broadcast::Receiver<LoggedEvent>,
    pub summaries: broadcast::Receiver<LoggedSummary>,
}

/// Stream the buses to `ws_url` until both close or `cancel` fires.
pub async fn run(
    ws_url: &str,
    mut input: SenderInput,
    config: ReconnectConfig,
    cancel: CancellationToken,
) -> SenderReport {
    let mut report = SenderReport::default();
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;
    let mut pending = None;

    loop {
        attempt += 1;
        tracing::info!(url = %ws_url, attempt, "Connecting to collector WebSocket");

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_async(ws_url) => result,
        };

        match connected {
            Ok((ws_stream, _response)) => {
                tracing::info!(url = %ws_url, "WebSocket connected");
                report.connections += 1;
                attempt = 0;
                delay = config.initial_delay;

                let (sink, stream) = ws_stream.split();
                let ended =
                    run_session(sink, stream, &mut input, &mut pending, &mut report, &cancel).await;
                match ended {
                    SessionEnded::Drained | SessionEnded::Cancelled => break,
                    SessionEnded::Disconnected => {
                        tracing::warn!("WebSocket session ended, reconnecting");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Connect attempt {attempt} failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay, &config);
    }

    tracing::info!(
        connections = report.connections,
        events = report.events_sent,
        summaries = report.summaries_sent,
        "Sender stopped",
    );
    report
}

/// Drive one connection: forward bus records and watch the socket.
///
/// `pending` carries a record whose send failed over to the next
/// connection.
async fn run_session<S, St>(
    mut sink: S,
    mut stream: St,
    input: &mut SenderInput,
    pending: &mut Option<Outgoing>,
    report: &mut SenderReport,
    cancel: &CancellationToken,
) -> SessionEnded
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
    St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let session_id = input.session_id;

    let start = SessionStart {
        started_at: input.started_at,
        resumed_after: report.events_sent + report.summaries_sent,
    };
    if send(&mut sink, MSG_TYPE_SESSION_START, session_id, &start)
        .await
        .is_err()
    {
        return SessionEnded::Disconnected;
    }
    if let Some(record) = pending.take() {
        if let Err(record) = record.deliver(&mut sink, session_id, report).await {
            *pending = Some(record);
            return SessionEnded::Disconnected;
        }
    }

    let mut events_open = true;
    let mut summaries_open = true;

    let ended = loop {
        if !events_open && !summaries_open {
            break SessionEnded::Drained;
        }

        tokio::select! {
            _ = cancel.cancelled() => break SessionEnded::Cancelled,

            received = input.events.recv(), if events_open => match received {
                Ok(event) => {
                    let record = Outgoing::Event(event);
                    if let Err(record) = record.deliver(&mut sink, session_id, report).await {
                        *pending = Some(record);
                        break SessionEnded::Disconnected;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Sender lagged, events dropped");
                }
                Err(RecvError::Closed) => events_open = false,
            },

            received = input.summaries.recv(), if summaries_open => match received {
                Ok(summary) => {
                    let record = Outgoing::Summary(summary);
                    if let Err(record) = record.deliver(&mut sink, session_id, report).await {
                        *pending = Some(record);
                        break SessionEnded::Disconnected;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Sender lagged, summaries dropped");
                }
                Err(RecvError::Closed) => summaries_open = false,
            },

            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(raw = %text, "Ignoring message from collector");
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Collector closed WebSocket");
                    break SessionEnded::Disconnected;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "WebSocket receive error");
                    break SessionEnded::Disconnected;
                }
                None => {
                    tracing::info!("WebSocket stream exhausted");
                    break SessionEnded::Disconnected;
                }
            },
        }
    };

    if !matches!(ended, SessionEnded::Disconnected) {
        let end = SessionEnd {
            events_sent: report.events_sent,
            summaries_sent: report.summaries_sent,
        };
        if send(&mut sink, MSG_TYPE_SESSION_END, session_id, &end).await.is_ok() {
            let _ = sink.send(Message::Close(None)).await;
        }
    }
    ended
}

async fn send<S, T>(
    sink: &mut S,
    msg_type: &'static str,
    session_id: Uuid,
    data: &T,
) -> Result<(), tungstenite::Error>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
    T: Serialize,
{
    let json = match encode_message(msg_type, session_id, data) {
        Ok(json) => json,
        Err(e) => {
            // Not a connection problem; drop the frame and keep going.
            tracing::error!(msg_type, error = %e, "Failed to serialize message");
            return Ok(());
        }
    };
    sink.send(Message::Text(json)).await.map_err(|e| {
        tracing::error!(msg_type, error = %e, "Failed to send message");
        e
    })
}
