use chrono::{Duration, Utc};
use d4log_core::{CombatEvent, EncounterOutcome, EncounterStats};
use d4log_events::{
    event_log_path, read_event_log, summary_log_path, EventBus, EventLog, LoggedEvent,
    LoggedSummary, SessionSequencer,
};

#[tokio::test]
async fn events_written_by_the_log_replay_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut seq = SessionSequencer::new();
    let path = event_log_path(dir.path(), &seq.session_id());

    let bus: EventBus<LoggedEvent> = EventBus::default();
    let writer = tokio::spawn(EventLog::run(path.clone(), bus.subscribe()));

    let start = Utc::now();
    let published: Vec<LoggedEvent> = (0..50)
        .map(|i| {
            seq.stamp(
                start + Duration::milliseconds(i * 100),
                Some(1),
                CombatEvent::DamageTaken {
                    amount: i as f32,
                    health_after: 1000.0 - i as f32,
                },
            )
        })
        .collect();
    for event in &published {
        bus.publish(event.clone());
    }
    drop(bus);

    let written = writer.await.unwrap().unwrap();
    assert_eq!(written, 50);

    let replayed: Vec<LoggedEvent> = read_event_log(&path).unwrap();
    assert_eq!(replayed, published);
    assert!(replayed.windows(2).all(|w| w[1].sequence == w[0].sequence + 1));
}

#[tokio::test]
async fn summaries_round_trip_with_session_id() {
    let dir = tempfile::tempdir().unwrap();
    let seq = SessionSequencer::new();
    let path = summary_log_path(dir.path(), &seq.session_id());

    let bus: EventBus<LoggedSummary> = EventBus::default();
    let writer = tokio::spawn(EventLog::run(path.clone(), bus.subscribe()));

    let summary = seq.summary(EncounterStats::new(3, Utc::now()).finish(EncounterOutcome::Disengaged));
    bus.publish(summary.clone());
    drop(bus);
    writer.await.unwrap().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
    assert_eq!(json["encounter_id"], 3);
    assert_eq!(json["outcome"], "disengaged");
    assert_eq!(json["session_id"], seq.session_id().to_string());

    let replayed: Vec<LoggedSummary> = read_event_log(&path).unwrap();
    assert_eq!(replayed, vec![summary]);
}
