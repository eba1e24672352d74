//! Skill cooldown bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::CombatEvent;
use crate::types::{PowerId, Timestamp};

/// Usage of one skill bar slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillUsage {
    pub slot: u8,
    pub power_id: PowerId,
    pub casts: u32,
    /// Cooldown observed right after the most recent cast, in seconds.
    pub observed_cooldown: f32,
    #[serde(skip)]
    last_cast: Option<Timestamp>,
}

/// Tracks casts and cooldowns per skill slot from `SkillCast` / `SkillReady`.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    slots: BTreeMap<u8, SkillUsage>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at: Timestamp, event: &CombatEvent) {
        match *event {
            CombatEvent::SkillCast {
                slot,
                power_id,
                cooldown,
            } => {
                let usage = self.slots.entry(slot).or_insert_with(|| SkillUsage {
                    slot,
                    power_id,
                    casts: 0,
                    observed_cooldown: 0.0,
                    last_cast: None,
                });
                if usage.power_id != power_id {
                    // Slot was rebound; start over for the new skill.
                    usage.power_id = power_id;
                    usage.casts = 0;
                }
                usage.casts += 1;
                usage.observed_cooldown = cooldown;
                usage.last_cast = Some(at);
            }
            CombatEvent::SkillReady { slot, .. } => {
                if let Some(usage) = self.slots.get_mut(&slot) {
                    usage.last_cast = None;
                }
            }
            _ => {}
        }
    }

    /// Seconds until `slot` is usable again, based on the cooldown seen at
    /// the last cast. `None` if the slot was never cast; `Some(0.0)` once
    /// ready.
    pub fn time_until_ready(&self, slot: u8, now: Timestamp) -> Option<f32> {
        let usage = self.slots.get(&slot)?;
        let Some(cast_at) = usage.last_cast else {
            return Some(0.0);
        };
        let elapsed = (now - cast_at).num_milliseconds() as f32 / 1000.0;
        Some((usage.observed_cooldown - elapsed).max(0.0))
    }

    pub fn casts(&self, slot: u8) -> u32 {
        self.slots.get(&slot).map(|u| u.casts).unwrap_or(0)
    }

    pub fn usage(&self) -> Vec<SkillUsage> {
        self.slots.values().cloned().collect()
    }
}
