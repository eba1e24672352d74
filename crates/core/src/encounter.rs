//! Encounter segmentation.
//!
//! Groups the detector's event stream into encounters: an encounter opens
//! on the first combat activity while idle and closes when the player dies
//! or when no combat activity has been seen for `idle_timeout`.

use std::collections::HashSet;
use std::time::Duration;

use crate::combat::{CombatEvent, EncounterOutcome};
use crate::types::{EncounterId, EntityId, Timestamp};

/// Default idle period after which an encounter is considered over.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// An event tagged with the encounter it belongs to, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    pub encounter_id: Option<EncounterId>,
    pub event: CombatEvent,
}

#[derive(Debug)]
struct ActiveEncounter {
    id: EncounterId,
    last_activity: Timestamp,
    /// Enemies damaged (or killed) during this encounter.
    engaged: HashSet<EntityId>,
    /// Subset of `engaged` not yet seen dying.
    alive: HashSet<EntityId>,
}

impl ActiveEncounter {
    fn outcome(&self) -> EncounterOutcome {
        if !self.engaged.is_empty() && self.alive.is_empty() {
            EncounterOutcome::Victory
        } else {
            EncounterOutcome::Disengaged
        }
    }
}

#[derive(Debug)]
pub struct EncounterTracker {
    idle_timeout: Duration,
    active: Option<ActiveEncounter>,
    next_id: EncounterId,
}

impl Default for EncounterTracker {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl EncounterTracker {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            active: None,
            next_id: 1,
        }
    }

    /// Id of the encounter in progress.
    pub fn current(&self) -> Option<EncounterId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Feed the events detected at `at`.
    ///
    /// Returns the same events in order, tagged with their encounter and
    /// with `EncounterStarted` / `EncounterEnded` markers inserted.
    pub fn track(&mut self, at: Timestamp, events: Vec<CombatEvent>) -> Vec<TrackedEvent> {
        let mut out = Vec::with_capacity(events.len() + 2);
        out.extend(self.tick(at));

        for event in events {
            if event.is_combat_activity() && self.active.is_none() {
                let id = self.open(at);
                out.push(TrackedEvent {
                    encounter_id: Some(id),
                    event: CombatEvent::EncounterStarted { encounter_id: id },
                });
            }

            let died = matches!(event, CombatEvent::PlayerDied);
            if let Some(active) = self.active.as_mut() {
                match &event {
                    CombatEvent::DamageDealt { target_id, .. } => {
                        active.engaged.insert(*target_id);
                        active.alive.insert(*target_id);
                    }
                    CombatEvent::EnemyKilled { target_id, .. } => {
                        active.engaged.insert(*target_id);
                        active.alive.remove(target_id);
                    }
                    _ => {}
                }
                if event.is_combat_activity() {
                    active.last_activity = at;
                }
            }

            out.push(TrackedEvent {
                encounter_id: self.current(),
                event,
            });

            if died {
                out.extend(self.close(EncounterOutcome::Defeat));
            }
        }

        out
    }

    /// Close the active encounter if it has been idle for longer than the
    /// timeout. Call periodically even when no events are flowing.
    pub fn tick(&mut self, at: Timestamp) -> Option<TrackedEvent> {
        let active = self.active.as_ref()?;
        let idle = (at - active.last_activity).to_std().ok()?;
        if idle <= self.idle_timeout {
            return None;
        }
        let outcome = active.outcome();
        self.close(outcome)
    }

    /// Close whatever is in progress, e.g. when the game process exits.
    pub fn finish(&mut self) -> Option<TrackedEvent> {
        let outcome = self.active.as_ref()?.outcome();
        self.close(outcome)
    }

    fn open(&mut self, at: Timestamp) -> EncounterId {
        let id = self.next_id;
        self.next_id += 1;
        self.active = Some(ActiveEncounter {
            id,
            last_activity: at,
            engaged: HashSet::new(),
            alive: HashSet::new(),
        });
        id
    }

    fn close(&mut self, outcome: EncounterOutcome) -> Option<TrackedEvent> {
        let active = self.active.take()?;
        Some(TrackedEvent {
            encounter_id: Some(active.id),
            event: CombatEvent::EncounterEnded {
                encounter_id: active.id,
                outcome,
            },
        })
    }
}
