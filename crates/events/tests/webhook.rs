//! Webhook delivery against a throwaway HTTP server on localhost.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use d4log_core::{EncounterOutcome, EncounterStats};
use d4log_events::{LoggedSummary, SessionSequencer, WebhookDelivery, WebhookError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Answers each request with the next status in `statuses` (the last one
/// repeats) and records the request bodies.
async fn serve(statuses: Vec<u16>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());
    let bodies = Arc::new(Mutex::new(Vec::new()));

    let seen = bodies.clone();
    tokio::spawn(async move {
        let mut served = 0usize;
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let status = statuses[served.min(statuses.len() - 1)];
            served += 1;
            handle(stream, status, &seen).await;
        }
    });

    (url, bodies)
}

async fn handle(mut stream: TcpStream, status: u16, seen: &Mutex<Vec<String>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    // Record before answering so the client never sees a reply first.
    seen.lock()
        .unwrap()
        .push(String::from_utf8_lossy(&buf[header_end..]).into_owned());

    let response = format!("HTTP/1.1 {status} X\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();
}

fn summary() -> LoggedSummary {
    SessionSequencer::new().summary(EncounterStats::new(9, Utc::now()).finish(EncounterOutcome::Victory))
}

fn fast_retries(delivery: WebhookDelivery) -> WebhookDelivery {
    delivery.with_retry_delays(vec![Duration::from_millis(10); 3])
}

#[tokio::test]
async fn retries_until_success() {
    let (url, bodies) = serve(vec![503, 500, 200]).await;
    let delivery = fast_retries(WebhookDelivery::new(url).unwrap());

    delivery.deliver(&summary()).await.expect("third attempt succeeds");

    let bodies = bodies.lock().unwrap();
    assert_eq!(bodies.len(), 3);
    let json: serde_json::Value = serde_json::from_str(&bodies[2]).unwrap();
    assert_eq!(json["encounter_id"], 9);
    assert_eq!(json["outcome"], "victory");
}

#[tokio::test]
async fn gives_up_after_final_attempt() {
    let (url, bodies) = serve(vec![502]).await;
    let delivery = fast_retries(WebhookDelivery::new(url).unwrap());

    let err = delivery.deliver(&summary()).await.unwrap_err();
    assert!(matches!(err, WebhookError::HttpStatus(502)));
    // Three retries plus the final attempt.
    assert_eq!(bodies.lock().unwrap().len(), 4);
}
