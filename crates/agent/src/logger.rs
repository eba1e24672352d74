//! Combat logging pipeline.
//!
//! [`CombatLogger`] turns a stream of snapshots into session-stamped events
//! and encounter summaries: snapshot diffing in the
//! [`EventDetector`], segmentation in the [`EncounterTracker`], totals in
//! [`EncounterStats`], numbering in the [`SessionSequencer`].
//! [`CombatLogger::run`] drives it from a [`Collector`] on a fixed interval
//! and publishes everything on the event buses.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use d4log_core::snapshot::BuffSnapshot;
use d4log_core::types::Timestamp;
use d4log_core::{
    CombatEvent, DetectorConfig, EncounterStats, EncounterSummary, EncounterTracker, EventDetector,
    GameSnapshot, TrackedEvent,
};
use d4log_events::{EventBus, LoggedEvent, LoggedSummary, SessionSequencer};
use d4log_memory::ReadMemory;
use d4log_miner::GameDatabase;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::collector::Collector;

/// Events and summaries produced by one step of the logger.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoggerOutput {
    pub events: Vec<LoggedEvent>,
    pub summaries: Vec<LoggedSummary>,
}

impl LoggerOutput {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.summaries.is_empty()
    }
}

/// Totals for a finished sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub session_id: Uuid,
    pub snapshots: u64,
    pub failed_snapshots: u64,
    pub events: u64,
    pub encounters: u64,
}

/// Where [`CombatLogger::run`] publishes its output.
pub struct LoggerSinks<'a> {
    pub events: &'a EventBus<LoggedEvent>,
    pub summaries: &'a EventBus<LoggedSummary>,
}

impl LoggerSinks<'_> {
    fn publish(&self, output: LoggerOutput) {
        for event in output.events {
            self.events.publish(event);
        }
        for summary in output.summaries {
            self.summaries.publish(summary);
        }
    }
}

pub struct CombatLogger {
    detector: EventDetector,
    tracker: EncounterTracker,
    stats: Option<EncounterStats>,
    sequencer: SessionSequencer,
    /// Buffs of the previous snapshot, to seed a new encounter with.
    active_buffs: Vec<BuffSnapshot>,
    game_data: Option<Arc<GameDatabase>>,
}

impl CombatLogger {
    pub fn new(idle_timeout: Duration, sequencer: SessionSequencer) -> Self {
        Self::with_detector(DetectorConfig::default(), idle_timeout, sequencer)
    }

    pub fn with_detector(
        config: DetectorConfig,
        idle_timeout: Duration,
        sequencer: SessionSequencer,
    ) -> Self {
        Self {
            detector: EventDetector::new(config),
            tracker: EncounterTracker::new(idle_timeout),
            stats: None,
            sequencer,
            active_buffs: Vec::new(),
            game_data: None,
        }
    }

    /// Use mined game data to name powers in log output.
    pub fn with_game_data(mut self, game_data: Arc<GameDatabase>) -> Self {
        self.game_data = Some(game_data);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.sequencer.session_id()
    }

    /// Encounter in progress, if any.
    pub fn current_encounter(&self) -> Option<u64> {
        self.tracker.current()
    }

    /// Feed one snapshot.
    pub fn process(&mut self, snapshot: &GameSnapshot) -> LoggerOutput {
        let at = snapshot.taken_at;
        let detected = self.detector.observe(snapshot);
        let tracked = self.tracker.track(at, detected);
        let output = self.apply(at, tracked);
        self.active_buffs = snapshot.buffs.clone();
        output
    }

    /// Advance time without a snapshot, so an idle encounter can close
    /// while snapshots are failing.
    pub fn idle(&mut self, at: Timestamp) -> LoggerOutput {
        let tracked = self.tracker.tick(at).into_iter().collect();
        self.apply(at, tracked)
    }

    /// Close the encounter in progress, e.g. when the game exits.
    pub fn finish(&mut self, at: Timestamp) -> LoggerOutput {
        let tracked = self.tracker.finish().into_iter().collect();
        self.apply(at, tracked)
    }

    fn apply(&mut self, at: Timestamp, tracked: Vec<TrackedEvent>) -> LoggerOutput {
        let mut output = LoggerOutput::default();

        for tracked in tracked {
            match &tracked.event {
                CombatEvent::EncounterStarted { encounter_id } => {
                    let mut stats = EncounterStats::new(*encounter_id, at);
                    for buff in &self.active_buffs {
                        stats.seed_buff(buff.power_id, buff.is_debuff);
                    }
                    self.stats = Some(stats);
                    tracing::info!(encounter_id, "Encounter started");
                }
                CombatEvent::EncounterEnded {
                    encounter_id,
                    outcome,
                } => match self.stats.take() {
                    Some(stats) if stats.encounter_id() == *encounter_id => {
                        let summary = stats.finish(*outcome);
                        let top_power = self.top_power_name(&summary);
                        tracing::info!(
                            encounter_id,
                            outcome = ?outcome,
                            duration_secs = summary.duration_secs,
                            damage = summary.damage_dealt,
                            dps = summary.dps,
                            kills = summary.kills.total(),
                            top_power = top_power.as_deref().unwrap_or("-"),
                            "Encounter finished",
                        );
                        output.summaries.push(self.sequencer.summary(summary));
                    }
                    other => {
                        tracing::warn!(encounter_id, "Encounter ended without matching stats");
                        self.stats = other;
                    }
                },
                event => {
                    if let Some(stats) = self.stats.as_mut() {
                        if tracked.encounter_id == Some(stats.encounter_id()) {
                            stats.record(at, event);
                        }
                    }
                    self.trace_event(event);
                }
            }
            output.events.push(self.sequencer.stamp_tracked(at, tracked));
        }

        output
    }

    fn power_name(&self, power_id: u32) -> Option<&str> {
        self.game_data.as_deref()?.power_name(power_id)
    }

    fn top_power_name(&self, summary: &EncounterSummary) -> Option<String> {
        let top = summary
            .powers
            .iter()
            .max_by(|a, b| a.damage.total_cmp(&b.damage))?;
        Some(
            self.power_name(top.power_id)
                .map(str::to_string)
                .unwrap_or_else(|| top.power_id.to_string()),
        )
    }

    fn trace_event(&self, event: &CombatEvent) {
        match event {
            CombatEvent::SkillCast { power_id, slot, .. } => tracing::debug!(
                slot,
                power_id,
                power = self.power_name(*power_id).unwrap_or("?"),
                "Skill cast"
            ),
            CombatEvent::EnemyKilled { target_id, rank, .. } => {
                tracing::debug!(target_id, rank = rank.as_str(), "Enemy killed")
            }
            CombatEvent::PlayerDied => tracing::info!("Player died"),
            CombatEvent::LevelUp { to, .. } => tracing::info!(level = to, "Level up"),
            _ => tracing::trace!(kind = event.event_name(), "Combat event"),
        }
    }

    /// Sample `collector` every `interval` until `cancel` fires or
    /// `process_alive` reports that the game has exited.
    ///
    /// A failed or implausible snapshot is logged and skipped; time still
    /// advances so idle encounters close.
    pub async fn run<R, A>(
        mut self,
        collector: &Collector<R>,
        interval: Duration,
        process_alive: A,
        sinks: LoggerSinks<'_>,
        cancel: CancellationToken,
    ) -> RunReport
    where
        R: ReadMemory,
        A: Fn() -> bool,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut report = RunReport {
            session_id: self.session_id(),
            snapshots: 0,
            failed_snapshots: 0,
            events: 0,
            encounters: 0,
        };
        let mut failing = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Sampling cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if !process_alive() {
                tracing::info!("Game process exited");
                break;
            }

            let output = match collector.snapshot() {
                Ok(snapshot) => match snapshot.validate() {
                    Ok(()) => {
                        if failing {
                            tracing::info!("Snapshots recovered");
                            failing = false;
                        }
                        report.snapshots += 1;
                        self.process(&snapshot)
                    }
                    Err(e) => {
                        report.failed_snapshots += 1;
                        tracing::debug!(error = %e, "Discarding implausible snapshot");
                        self.idle(Utc::now())
                    }
                },
                Err(e) => {
                    report.failed_snapshots += 1;
                    if !failing {
                        tracing::warn!(error = %e, "Failed to read snapshot");
                        failing = true;
                    }
                    self.idle(Utc::now())
                }
            };

            report.events += output.events.len() as u64;
            report.encounters += output.summaries.len() as u64;
            sinks.publish(output);
        }

        let last = self.finish(Utc::now());
        report.events += last.events.len() as u64;
        report.encounters += last.summaries.len() as u64;
        sinks.publish(last);

        tracing::info!(
            session_id = %report.session_id,
            snapshots = report.snapshots,
            failed = report.failed_snapshots,
            events = report.events,
            encounters = report.encounters,
            "Sampling stopped",
        );
        report
    }
}
