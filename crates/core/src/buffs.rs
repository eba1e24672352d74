//! Buff and debuff uptime.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::combat::CombatEvent;
use crate::types::{PowerId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffUptime {
    pub power_id: PowerId,
    pub is_debuff: bool,
    pub applications: u32,
    /// Fraction of the window the buff was active, in `[0, 1]`.
    pub uptime: f64,
}

#[derive(Debug, Clone)]
struct BuffRecord {
    is_debuff: bool,
    applications: u32,
    accumulated: Duration,
    active_since: Option<Timestamp>,
}

/// Accumulates active time per buff from `BuffApplied` / `BuffExpired`.
#[derive(Debug, Default)]
pub struct BuffTracker {
    buffs: BTreeMap<PowerId, BuffRecord>,
}

impl BuffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a buff as active from `at`. Used both for applications and to
    /// seed buffs that were already up when tracking began.
    pub fn begin(&mut self, power_id: PowerId, is_debuff: bool, at: Timestamp) {
        let record = self.buffs.entry(power_id).or_insert(BuffRecord {
            is_debuff,
            applications: 0,
            accumulated: Duration::ZERO,
            active_since: None,
        });
        record.applications += 1;
        if record.active_since.is_none() {
            record.active_since = Some(at);
        }
    }

    pub fn end(&mut self, power_id: PowerId, at: Timestamp) {
        let Some(record) = self.buffs.get_mut(&power_id) else {
            return;
        };
        if let Some(since) = record.active_since.take() {
            record.accumulated += (at - since).to_std().unwrap_or_default();
        }
    }

    pub fn record(&mut self, at: Timestamp, event: &CombatEvent) {
        match *event {
            CombatEvent::BuffApplied {
                power_id,
                is_debuff,
                ..
            } => self.begin(power_id, is_debuff, at),
            CombatEvent::BuffExpired { power_id, .. } => self.end(power_id, at),
            _ => {}
        }
    }

    /// Total time `power_id` has been active up to `now`.
    pub fn active_time(&self, power_id: PowerId, now: Timestamp) -> Duration {
        let Some(record) = self.buffs.get(&power_id) else {
            return Duration::ZERO;
        };
        let open = record
            .active_since
            .and_then(|since| (now - since).to_std().ok())
            .unwrap_or_default();
        record.accumulated + open
    }

    /// Active fraction of the window `[since, now]`.
    pub fn uptime(&self, power_id: PowerId, since: Timestamp, now: Timestamp) -> f64 {
        let window = (now - since).to_std().unwrap_or_default();
        if window.is_zero() {
            return 0.0;
        }
        let active = self.active_time(power_id, now).as_secs_f64();
        (active / window.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn summarize(&self, since: Timestamp, now: Timestamp) -> Vec<BuffUptime> {
        self.buffs
            .iter()
            .map(|(&power_id, record)| BuffUptime {
                power_id,
                is_debuff: record.is_debuff,
                applications: record.applications,
                uptime: self.uptime(power_id, since, now),
            })
            .collect()
    }
}
