//! End-to-end tests for the combat logger: scripted snapshots in, logged
//! events and encounter summaries out.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use d4log_agent::collector::Collector;
use d4log_agent::logger::{CombatLogger, LoggerSinks};
use d4log_core::snapshot::{
    EnemyRank, EnemySnapshot, GameSnapshot, PlayerSnapshot, SkillSlot, Vec3,
};
use d4log_core::types::Timestamp;
use d4log_core::{CombatEvent, EncounterOutcome};
use d4log_events::{
    read_event_log, EventBus, EventLog, LoggedEvent, LoggedSummary, SessionSequencer,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::*;

fn at(millis: i64) -> Timestamp {
    Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
}

fn snapshot(millis: i64, enemy_health: f32, cooldown: f32) -> GameSnapshot {
    let mut s = GameSnapshot::new(
        at(millis),
        PlayerSnapshot {
            level: 50,
            health: 2000.0,
            max_health: 2000.0,
            ..Default::default()
        },
    );
    s.enemies.push(EnemySnapshot {
        entity_id: 42,
        monster_id: 7001,
        health: enemy_health,
        max_health: 1000.0,
        position: Vec3::default(),
        rank: EnemyRank::Elite,
    });
    s.skills.push(SkillSlot {
        slot: 0,
        power_id: 111,
        cooldown_remaining: cooldown,
    });
    s
}

fn kinds(events: &[LoggedEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event.event_name()).collect()
}

fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(record) = rx.try_recv() {
        out.push(record);
    }
    out
}

// ---------------------------------------------------------------------------
// Test: scripted snapshots
// ---------------------------------------------------------------------------

/// Cast, two hits and a kill make one encounter; the summary attributes
/// all damage to the cast power.
#[test]
fn scripted_fight_produces_events_and_summary() {
    let session_id = Uuid::new_v4();
    let mut logger = CombatLogger::new(
        Duration::from_secs(5),
        SessionSequencer::with_session_id(session_id),
    );

    let mut events = Vec::new();
    let mut summaries = Vec::new();
    for s in [
        snapshot(0, 1000.0, 0.0),
        snapshot(1000, 600.0, 5.0),
        snapshot(2000, 0.0, 4.0),
    ] {
        let out = logger.process(&s);
        events.extend(out.events);
        summaries.extend(out.summaries);
    }
    assert!(summaries.is_empty(), "encounter still open before idle timeout");

    let out = logger.idle(at(8000));
    events.extend(out.events);
    summaries.extend(out.summaries);

    assert_eq!(
        kinds(&events),
        vec![
            "enemy_spotted",
            "encounter_started",
            "skill_cast",
            "damage_dealt",
            "damage_dealt",
            "enemy_killed",
            "encounter_ended",
        ]
    );
    assert!(events.iter().all(|e| e.session_id == session_id));
    assert_eq!(events[0].encounter_id, None, "spotting alone is not combat");
    assert!(events[1..].iter().all(|e| e.encounter_id == Some(1)));
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=7).collect::<Vec<u64>>());

    assert!(matches!(
        events[3].event,
        CombatEvent::DamageDealt { amount, power_id: Some(111), .. } if amount == 400.0
    ));

    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0].summary;
    assert_eq!(summaries[0].session_id, session_id);
    assert_eq!(summary.outcome, EncounterOutcome::Victory);
    assert_eq!(summary.damage_dealt, 1000.0);
    assert_eq!(summary.unattributed_damage, 0.0);
    assert_eq!(summary.kills.elite, 1);
    assert_eq!(summary.duration_secs, 1.0);
    assert_eq!(summary.powers.len(), 1);
    assert_eq!(summary.powers[0].power_id, 111);
    assert_eq!(summary.powers[0].hits, 2);
    assert_eq!(summary.powers[0].casts, 1);
}

#[test]
fn player_death_ends_encounter_as_defeat() {
    let mut logger = CombatLogger::new(Duration::from_secs(5), SessionSequencer::new());
    logger.process(&snapshot(0, 1000.0, 0.0));
    logger.process(&snapshot(1000, 900.0, 0.0));

    let mut dead = snapshot(2000, 900.0, 0.0);
    dead.player.health = 0.0;
    let out = logger.process(&dead);

    assert_eq!(
        kinds(&out.events),
        vec!["damage_taken", "player_died", "encounter_ended"]
    );
    assert_eq!(out.summaries.len(), 1);
    assert_eq!(out.summaries[0].summary.outcome, EncounterOutcome::Defeat);
    assert_eq!(out.summaries[0].summary.deaths, 1);
}

#[test]
fn encounter_ids_increase_across_fights() {
    let mut logger = CombatLogger::new(Duration::from_secs(2), SessionSequencer::new());
    logger.process(&snapshot(0, 1000.0, 0.0));
    logger.process(&snapshot(500, 800.0, 0.0));
    let first = logger.idle(at(3000));
    logger.process(&snapshot(4000, 700.0, 0.0));
    let second = logger.finish(at(4500));

    assert_eq!(first.summaries[0].summary.encounter_id, 1);
    assert_eq!(second.summaries[0].summary.encounter_id, 2);
    assert_eq!(
        second.summaries[0].summary.outcome,
        EncounterOutcome::Disengaged
    );
}

// ---------------------------------------------------------------------------
// Test: sampling loop
// ---------------------------------------------------------------------------

/// Drives `run` over a fake game image. The liveness callback doubles as
/// the script: each call advances the fight by one step, and the fourth
/// call reports the game as exited.
#[tokio::test]
async fn run_samples_until_game_exits() {
    let mut image = game_image();
    set_counts(&mut image, 1, 1, 0, 0);
    put_enemy(&mut image, 0, 42, 7001, 1000.0, 1000.0, 2);
    put_skill(&mut image, 0, 111, 0.0);
    let image = SharedImage::new(image);
    let collector = Collector::new(image.clone(), table(), MODULE_BASE);

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("events.jsonl");
    let events = EventBus::<LoggedEvent>::default();
    let summaries = EventBus::<LoggedSummary>::default();
    let writer = tokio::spawn(EventLog::run(log_path.clone(), events.subscribe()));
    let mut summary_rx = summaries.subscribe();

    let calls = AtomicU32::new(0);
    let alive = || {
        match calls.fetch_add(1, Ordering::SeqCst) {
            0 => {}
            1 => image.update(|d| {
                put_skill(d, 0, 111, 6.0);
                set_enemy_health(d, 0, 350.0);
            }),
            2 => image.update(|d| set_enemy_health(d, 0, 0.0)),
            _ => return false,
        }
        true
    };

    let logger = CombatLogger::new(Duration::from_secs(30), SessionSequencer::new());
    let session_id = logger.session_id();
    let report = logger
        .run(
            &collector,
            Duration::from_millis(10),
            alive,
            LoggerSinks {
                events: &events,
                summaries: &summaries,
            },
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.session_id, session_id);
    assert_eq!(report.snapshots, 3);
    assert_eq!(report.failed_snapshots, 0);
    assert_eq!(report.encounters, 1);
    assert_eq!(report.events, 7);

    let finished = drain(&mut summary_rx);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].summary.outcome, EncounterOutcome::Victory);
    assert_eq!(finished[0].summary.damage_dealt, 1000.0);

    drop(events);
    let written = writer.await.unwrap().unwrap();
    assert_eq!(written, 7);
    let logged: Vec<LoggedEvent> = read_event_log(&log_path).unwrap();
    assert_eq!(
        kinds(&logged),
        vec![
            "enemy_spotted",
            "encounter_started",
            "skill_cast",
            "damage_dealt",
            "damage_dealt",
            "enemy_killed",
            "encounter_ended",
        ]
    );
}

/// Unreadable snapshots are counted and skipped; the loop keeps going.
#[tokio::test]
async fn run_survives_failed_snapshots() {
    let image = SharedImage::new(game_image());
    let collector = Collector::new(image.clone(), table(), MODULE_BASE);
    let events = EventBus::<LoggedEvent>::default();
    let summaries = EventBus::<LoggedSummary>::default();

    let calls = AtomicU32::new(0);
    let alive = || {
        match calls.fetch_add(1, Ordering::SeqCst) {
            0 => {}
            1 => image.update(|d| d.put_u64(MODULE_BASE + 0x100, 0).unwrap()),
            2 => image.update(|d| d.put_u64(MODULE_BASE + 0x100, PLAYER).unwrap()),
            _ => return false,
        }
        true
    };

    let report = CombatLogger::new(Duration::from_secs(5), SessionSequencer::new())
        .run(
            &collector,
            Duration::from_millis(10),
            alive,
            LoggerSinks {
                events: &events,
                summaries: &summaries,
            },
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.snapshots, 2);
    assert_eq!(report.failed_snapshots, 1);
    assert_eq!(report.encounters, 0);
}

/// A stat block that reads as NaN is discarded rather than diffed, so it
/// never turns into a stream of stat changes.
#[tokio::test]
async fn run_discards_non_finite_snapshots() {
    let image = SharedImage::new(game_image());
    let collector = Collector::new(image.clone(), table(), MODULE_BASE);
    let events = EventBus::<LoggedEvent>::default();
    let summaries = EventBus::<LoggedSummary>::default();
    let mut event_rx = events.subscribe();

    let calls = AtomicU32::new(0);
    let alive = || {
        match calls.fetch_add(1, Ordering::SeqCst) {
            0 => {}
            1 => image.update(|d| d.put_f32(PLAYER + 0x78, f32::NAN).unwrap()),
            2 => {}
            _ => return false,
        }
        true
    };

    let report = CombatLogger::new(Duration::from_secs(5), SessionSequencer::new())
        .run(
            &collector,
            Duration::from_millis(10),
            alive,
            LoggerSinks {
                events: &events,
                summaries: &summaries,
            },
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.snapshots, 1);
    assert_eq!(report.failed_snapshots, 2);
    assert_eq!(report.events, 0);
    assert!(drain(&mut event_rx).is_empty());
}

#[tokio::test]
async fn run_stops_on_cancel() {
    let collector = Collector::new(game_image(), table(), MODULE_BASE);
    let events = EventBus::<LoggedEvent>::default();
    let summaries = EventBus::<LoggedSummary>::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = CombatLogger::new(Duration::from_secs(5), SessionSequencer::new())
        .run(
            &collector,
            Duration::from_millis(10),
            || true,
            LoggerSinks {
                events: &events,
                summaries: &summaries,
            },
            cancel,
        )
        .await;
    assert_eq!(report.snapshots, 0);
}
