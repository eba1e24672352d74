//! Snapshot diffing: turns consecutive [`GameSnapshot`]s into [`CombatEvent`]s.
//!
//! Pure logic, no memory access. The collector feeds snapshots in sampling
//! order and forwards whatever [`EventDetector::observe`] returns.
//!
//! Memory only holds current values, so every event here is inferred from a
//! difference between two samples:
//!
//! | Change                                   | Event                       |
//! |------------------------------------------|-----------------------------|
//! | enemy health dropped                     | `DamageDealt`               |
//! | enemy health reached zero / vanished dead| `EnemyKilled`               |
//! | enemy vanished alive                     | `EnemyLost`                 |
//! | cooldown went up                         | `SkillCast`                 |
//! | cooldown reached zero                    | `SkillReady`                |
//! | buff appeared / stacks / disappeared     | `BuffApplied` / `BuffStacksChanged` / `BuffExpired` |
//! | player health dropped / rose             | `DamageTaken` / `Healed`    |
//!
//! Skills without a cooldown never show up as casts, since nothing in the
//! sampled state changes when they are used.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use crate::combat::CombatEvent;
use crate::snapshot::{BuffSnapshot, EnemySnapshot, EquipSlot, GameSnapshot, SkillSlot, Vec3};
use crate::types::{EntityId, PowerId, Timestamp};

/// Cooldown increases smaller than this are sampling noise, not casts.
const COOLDOWN_EPSILON: f32 = 0.05;

/// Tunables for [`EventDetector`].
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Damage is attributed to the last skill cast no longer ago than this.
    pub attribution_window: Duration,
    /// Minimum distance in yards before a `Moved` event is emitted.
    pub movement_threshold: f32,
    /// Health changes smaller than this are ignored.
    pub health_epsilon: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            attribution_window: Duration::from_secs(2),
            movement_threshold: 1.0,
            health_epsilon: 0.5,
        }
    }
}

/// Stateful diff engine over a stream of snapshots.
#[derive(Debug)]
pub struct EventDetector {
    config: DetectorConfig,
    previous: Option<GameSnapshot>,
    last_reported_position: Option<Vec3>,
    last_cast: Option<(PowerId, Timestamp)>,
    player_dead: bool,
    /// Enemies already reported as killed and still visible (corpses).
    killed: HashSet<EntityId>,
}

impl Default for EventDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl EventDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            previous: None,
            last_reported_position: None,
            last_cast: None,
            player_dead: false,
            killed: HashSet::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Forget all state; the next snapshot becomes a new baseline.
    pub fn reset(&mut self) {
        self.previous = None;
        self.last_reported_position = None;
        self.last_cast = None;
        self.player_dead = false;
        self.killed.clear();
    }

    /// Diff `snapshot` against the previous one and return the events
    /// that explain the change.
    ///
    /// The first snapshot only establishes a baseline and reports the
    /// enemies already in view.
    pub fn observe(&mut self, snapshot: &GameSnapshot) -> Vec<CombatEvent> {
        let Some(previous) = self.previous.take() else {
            let events = self.baseline(snapshot);
            self.previous = Some(snapshot.clone());
            return events;
        };

        let mut events = Vec::new();
        self.diff_skills(&previous.skills, &snapshot.skills, snapshot.taken_at, &mut events);
        self.diff_enemies(&previous.enemies, &snapshot.enemies, snapshot.taken_at, &mut events);
        self.diff_player_health(&previous, snapshot, &mut events);
        diff_buffs(&previous.buffs, &snapshot.buffs, &mut events);
        diff_equipment(&previous, snapshot, &mut events);
        self.diff_position(snapshot.player.position, &mut events);
        diff_progression(&previous, snapshot, &mut events);

        self.previous = Some(snapshot.clone());
        events
    }

    fn baseline(&mut self, snapshot: &GameSnapshot) -> Vec<CombatEvent> {
        self.last_reported_position = Some(snapshot.player.position);
        self.player_dead = snapshot.player.is_dead();

        let mut events = Vec::new();
        for enemy in &snapshot.enemies {
            if enemy.is_dead() {
                // Corpses present before logging started are not our kills.
                self.killed.insert(enemy.entity_id);
            } else {
                events.push(spotted(enemy));
            }
        }
        events
    }

    fn diff_skills(
        &mut self,
        previous: &[SkillSlot],
        current: &[SkillSlot],
        at: Timestamp,
        events: &mut Vec<CombatEvent>,
    ) {
        for skill in current {
            let Some(before) = previous.iter().find(|s| s.slot == skill.slot) else {
                continue;
            };
            // A different power in the same slot is a loadout change.
            if before.power_id != skill.power_id {
                continue;
            }

            if skill.cooldown_remaining > before.cooldown_remaining + COOLDOWN_EPSILON {
                events.push(CombatEvent::SkillCast {
                    slot: skill.slot,
                    power_id: skill.power_id,
                    cooldown: skill.cooldown_remaining,
                });
                self.last_cast = Some((skill.power_id, at));
            } else if !before.is_ready() && skill.is_ready() {
                events.push(CombatEvent::SkillReady {
                    slot: skill.slot,
                    power_id: skill.power_id,
                });
            }
        }
    }

    fn attributed_power(&self, at: Timestamp) -> Option<PowerId> {
        let (power_id, cast_at) = self.last_cast?;
        let elapsed = (at - cast_at).to_std().ok()?;
        (elapsed <= self.config.attribution_window).then_some(power_id)
    }

    fn diff_enemies(
        &mut self,
        previous: &[EnemySnapshot],
        current: &[EnemySnapshot],
        at: Timestamp,
        events: &mut Vec<CombatEvent>,
    ) {
        let before: HashMap<EntityId, &EnemySnapshot> =
            previous.iter().map(|e| (e.entity_id, e)).collect();
        let power_id = self.attributed_power(at);

        for enemy in current {
            match before.get(&enemy.entity_id) {
                None => {
                    // The game reuses entity ids once an actor despawns.
                    self.killed.remove(&enemy.entity_id);
                    if enemy.is_dead() {
                        self.killed.insert(enemy.entity_id);
                    } else {
                        events.push(spotted(enemy));
                    }
                }
                Some(prev) => {
                    let drop = prev.health - enemy.health.max(0.0);
                    if drop > self.config.health_epsilon {
                        events.push(CombatEvent::DamageDealt {
                            target_id: enemy.entity_id,
                            monster_id: enemy.monster_id,
                            amount: drop,
                            overkill: 0.0,
                            power_id,
                        });
                    }
                    if enemy.is_dead() && self.killed.insert(enemy.entity_id) {
                        events.push(killed(enemy));
                    }
                }
            }
        }

        for prev in previous {
            if current.iter().any(|e| e.entity_id == prev.entity_id) {
                continue;
            }
            if self.killed.remove(&prev.entity_id) {
                continue;
            }
            if prev.is_dead() {
                events.push(killed(prev));
            } else {
                events.push(CombatEvent::EnemyLost {
                    target_id: prev.entity_id,
                });
            }
        }
    }

    fn diff_player_health(
        &mut self,
        previous: &GameSnapshot,
        current: &GameSnapshot,
        events: &mut Vec<CombatEvent>,
    ) {
        let before = previous.player.health.max(0.0);
        let after = current.player.health.max(0.0);
        let delta = after - before;

        if delta < -self.config.health_epsilon {
            events.push(CombatEvent::DamageTaken {
                amount: -delta,
                health_after: after,
            });
        } else if delta > self.config.health_epsilon && !self.player_dead {
            events.push(CombatEvent::Healed {
                amount: delta,
                health_after: after,
            });
        }

        if current.player.is_dead() {
            if !self.player_dead {
                events.push(CombatEvent::PlayerDied);
            }
            self.player_dead = true;
        } else {
            self.player_dead = false;
        }
    }

    fn diff_position(&mut self, position: Vec3, events: &mut Vec<CombatEvent>) {
        let Some(from) = self.last_reported_position else {
            self.last_reported_position = Some(position);
            return;
        };
        let distance = from.distance(&position);
        if distance > self.config.movement_threshold {
            events.push(CombatEvent::Moved {
                from,
                to: position,
                distance,
            });
            self.last_reported_position = Some(position);
        }
    }
}

fn spotted(enemy: &EnemySnapshot) -> CombatEvent {
    CombatEvent::EnemySpotted {
        target_id: enemy.entity_id,
        monster_id: enemy.monster_id,
        rank: enemy.rank,
        max_health: enemy.max_health,
    }
}

fn killed(enemy: &EnemySnapshot) -> CombatEvent {
    CombatEvent::EnemyKilled {
        target_id: enemy.entity_id,
        monster_id: enemy.monster_id,
        rank: enemy.rank,
    }
}

fn diff_buffs(previous: &[BuffSnapshot], current: &[BuffSnapshot], events: &mut Vec<CombatEvent>) {
    let before: HashMap<PowerId, &BuffSnapshot> =
        previous.iter().map(|b| (b.power_id, b)).collect();

    for buff in current {
        match before.get(&buff.power_id) {
            None => events.push(CombatEvent::BuffApplied {
                power_id: buff.power_id,
                stacks: buff.stacks,
                duration: buff.remaining.max(0.0),
                is_debuff: buff.is_debuff,
            }),
            Some(prev) if prev.stacks != buff.stacks => {
                events.push(CombatEvent::BuffStacksChanged {
                    power_id: buff.power_id,
                    from: prev.stacks,
                    to: buff.stacks,
                });
            }
            Some(_) => {}
        }
    }

    for prev in previous {
        if !current.iter().any(|b| b.power_id == prev.power_id) {
            events.push(CombatEvent::BuffExpired {
                power_id: prev.power_id,
                is_debuff: prev.is_debuff,
            });
        }
    }
}

fn diff_equipment(previous: &GameSnapshot, current: &GameSnapshot, events: &mut Vec<CombatEvent>) {
    let mut slots: BTreeMap<EquipSlot, (u32, u32)> = BTreeMap::new();
    for item in &previous.equipment {
        slots.entry(item.slot).or_default().0 = item.item_id;
    }
    for item in &current.equipment {
        slots.entry(item.slot).or_default().1 = item.item_id;
    }

    for (slot, (old, new)) in slots {
        if old == new {
            continue;
        }
        if old != 0 {
            events.push(CombatEvent::ItemUnequipped { slot, item_id: old });
        }
        if new != 0 {
            events.push(CombatEvent::ItemEquipped { slot, item_id: new });
        }
    }
}

fn diff_progression(previous: &GameSnapshot, current: &GameSnapshot, events: &mut Vec<CombatEvent>) {
    let (before, after) = (&previous.player, &current.player);

    if after.level > before.level {
        events.push(CombatEvent::LevelUp {
            from: before.level,
            to: after.level,
        });
    }
    // Experience resets on level up; only count forward movement.
    if after.experience > before.experience {
        events.push(CombatEvent::ExperienceGained {
            amount: after.experience - before.experience,
        });
    }
    if after.gold != before.gold {
        events.push(CombatEvent::GoldChanged {
            from: before.gold,
            to: after.gold,
        });
    }
    if after.stats != before.stats {
        events.push(CombatEvent::StatsChanged {
            stats: after.stats.clone(),
        });
    }
}
