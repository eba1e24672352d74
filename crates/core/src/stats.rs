//! Per-encounter statistics.
//!
//! [`EncounterStats`] folds the tagged events of one encounter into running
//! totals; [`EncounterStats::finish`] produces the serializable
//! [`EncounterSummary`] that is logged and delivered to webhooks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::buffs::{BuffTracker, BuffUptime};
use crate::combat::{CombatEvent, EncounterOutcome};
use crate::cooldowns::{CooldownTracker, SkillUsage};
use crate::snapshot::EnemyRank;
use crate::types::{EncounterId, PowerId, Timestamp};

/// Durations shorter than this are rounded up when computing rates, so a
/// one-sample encounter does not report infinite DPS.
const MIN_RATE_WINDOW_SECS: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KillCounts {
    pub normal: u32,
    pub champion: u32,
    pub elite: u32,
    pub boss: u32,
}

impl KillCounts {
    fn add(&mut self, rank: EnemyRank) {
        match rank {
            EnemyRank::Normal => self.normal += 1,
            EnemyRank::Champion => self.champion += 1,
            EnemyRank::Elite => self.elite += 1,
            EnemyRank::Boss => self.boss += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.normal + self.champion + self.elite + self.boss
    }
}

/// Damage and usage attributed to one power.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerBreakdown {
    pub power_id: PowerId,
    pub damage: f64,
    pub hits: u32,
    pub casts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterSummary {
    pub encounter_id: EncounterId,
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
    pub duration_secs: f64,
    pub outcome: EncounterOutcome,
    pub damage_dealt: f64,
    /// Damage that could not be tied to a recent skill cast.
    pub unattributed_damage: f64,
    pub damage_taken: f64,
    pub healing: f64,
    pub dps: f64,
    pub dtps: f64,
    pub kills: KillCounts,
    pub deaths: u32,
    pub distance_moved: f64,
    pub items_changed: u32,
    pub powers: Vec<PowerBreakdown>,
    pub buffs: Vec<BuffUptime>,
    pub skills: Vec<SkillUsage>,
}

#[derive(Debug)]
pub struct EncounterStats {
    encounter_id: EncounterId,
    started_at: Timestamp,
    last_activity: Timestamp,
    died_at: Option<Timestamp>,
    damage_dealt: f64,
    unattributed_damage: f64,
    damage_taken: f64,
    healing: f64,
    kills: KillCounts,
    deaths: u32,
    distance_moved: f64,
    items_changed: u32,
    powers: BTreeMap<PowerId, PowerBreakdown>,
    buffs: BuffTracker,
    cooldowns: CooldownTracker,
}

impl EncounterStats {
    pub fn new(encounter_id: EncounterId, started_at: Timestamp) -> Self {
        Self {
            encounter_id,
            started_at,
            last_activity: started_at,
            died_at: None,
            damage_dealt: 0.0,
            unattributed_damage: 0.0,
            damage_taken: 0.0,
            healing: 0.0,
            kills: KillCounts::default(),
            deaths: 0,
            distance_moved: 0.0,
            items_changed: 0,
            powers: BTreeMap::new(),
            buffs: BuffTracker::new(),
            cooldowns: CooldownTracker::new(),
        }
    }

    pub fn encounter_id(&self) -> EncounterId {
        self.encounter_id
    }

    /// Count a buff that was already active when the encounter started.
    pub fn seed_buff(&mut self, power_id: PowerId, is_debuff: bool) {
        self.buffs.begin(power_id, is_debuff, self.started_at);
    }

    pub fn record(&mut self, at: Timestamp, event: &CombatEvent) {
        if event.is_combat_activity() && at > self.last_activity {
            self.last_activity = at;
        }
        self.buffs.record(at, event);
        self.cooldowns.record(at, event);

        match *event {
            CombatEvent::DamageDealt {
                amount, power_id, ..
            } => {
                let amount = f64::from(amount);
                self.damage_dealt += amount;
                match power_id {
                    Some(power_id) => {
                        let entry = self.power(power_id);
                        entry.damage += amount;
                        entry.hits += 1;
                    }
                    None => self.unattributed_damage += amount,
                }
            }
            CombatEvent::SkillCast { power_id, .. } => {
                self.power(power_id).casts += 1;
            }
            CombatEvent::DamageTaken { amount, .. } => {
                self.damage_taken += f64::from(amount);
            }
            CombatEvent::Healed { amount, .. } => {
                self.healing += f64::from(amount);
            }
            CombatEvent::EnemyKilled { rank, .. } => self.kills.add(rank),
            CombatEvent::PlayerDied => {
                self.deaths += 1;
                self.died_at = Some(at);
            }
            CombatEvent::Moved { distance, .. } => {
                self.distance_moved += f64::from(distance);
            }
            CombatEvent::ItemEquipped { .. } | CombatEvent::ItemUnequipped { .. } => {
                self.items_changed += 1;
            }
            _ => {}
        }
    }

    fn power(&mut self, power_id: PowerId) -> &mut PowerBreakdown {
        self.powers.entry(power_id).or_insert_with(|| PowerBreakdown {
            power_id,
            ..Default::default()
        })
    }

    fn ended_at(&self) -> Timestamp {
        match self.died_at {
            Some(died) if died > self.last_activity => died,
            _ => self.last_activity,
        }
    }

    /// Damage per second over the encounter so far.
    pub fn dps(&self) -> f64 {
        self.damage_dealt / self.rate_window()
    }

    fn rate_window(&self) -> f64 {
        let secs = (self.ended_at() - self.started_at).num_milliseconds() as f64 / 1000.0;
        secs.max(MIN_RATE_WINDOW_SECS)
    }

    pub fn finish(&self, outcome: EncounterOutcome) -> EncounterSummary {
        let ended_at = self.ended_at();
        let duration_secs = (ended_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        let window = self.rate_window();

        EncounterSummary {
            encounter_id: self.encounter_id,
            started_at: self.started_at,
            ended_at,
            duration_secs,
            outcome,
            damage_dealt: self.damage_dealt,
            unattributed_damage: self.unattributed_damage,
            damage_taken: self.damage_taken,
            healing: self.healing,
            dps: self.damage_dealt / window,
            dtps: self.damage_taken / window,
            kills: self.kills.clone(),
            deaths: self.deaths,
            distance_moved: self.distance_moved,
            items_changed: self.items_changed,
            powers: self.powers.values().cloned().collect(),
            buffs: self.buffs.summarize(self.started_at, ended_at),
            skills: self.cooldowns.usage(),
        }
    }
}
