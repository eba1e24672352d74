//! Typed combat events.
//!
//! Produced by the [`EventDetector`](crate::detector::EventDetector) and the
//! [`EncounterTracker`](crate::encounter::EncounterTracker), serialized into
//! the event log as internally-tagged JSON (`{"kind": "damage_dealt", ...}`).

use serde::{Deserialize, Serialize};

use crate::snapshot::{CharacterStats, EnemyRank, EquipSlot, Vec3};
use crate::types::{EncounterId, EntityId, PowerId};

/// How an encounter finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterOutcome {
    /// Every enemy damaged during the encounter died.
    Victory,
    /// The player died.
    Defeat,
    /// Combat stopped with enemies still alive (ran away, despawned, etc.).
    Disengaged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombatEvent {
    DamageDealt {
        target_id: EntityId,
        monster_id: u32,
        amount: f32,
        /// Damage beyond what was needed to kill. Health in memory is
        /// clamped at zero, so this is only non-zero when reported by the game.
        overkill: f32,
        /// Most recently cast skill within the attribution window.
        power_id: Option<PowerId>,
    },
    DamageTaken {
        amount: f32,
        health_after: f32,
    },
    Healed {
        amount: f32,
        health_after: f32,
    },
    EnemySpotted {
        target_id: EntityId,
        monster_id: u32,
        rank: EnemyRank,
        max_health: f32,
    },
    EnemyKilled {
        target_id: EntityId,
        monster_id: u32,
        rank: EnemyRank,
    },
    /// Enemy left the visible list while still alive.
    EnemyLost {
        target_id: EntityId,
    },
    SkillCast {
        slot: u8,
        power_id: PowerId,
        cooldown: f32,
    },
    SkillReady {
        slot: u8,
        power_id: PowerId,
    },
    BuffApplied {
        power_id: PowerId,
        stacks: u32,
        duration: f32,
        is_debuff: bool,
    },
    BuffStacksChanged {
        power_id: PowerId,
        from: u32,
        to: u32,
    },
    BuffExpired {
        power_id: PowerId,
        is_debuff: bool,
    },
    ItemEquipped {
        slot: EquipSlot,
        item_id: u32,
    },
    ItemUnequipped {
        slot: EquipSlot,
        item_id: u32,
    },
    Moved {
        from: Vec3,
        to: Vec3,
        distance: f32,
    },
    LevelUp {
        from: u32,
        to: u32,
    },
    ExperienceGained {
        amount: u64,
    },
    GoldChanged {
        from: u64,
        to: u64,
    },
    StatsChanged {
        stats: CharacterStats,
    },
    PlayerDied,
    EncounterStarted {
        encounter_id: EncounterId,
    },
    EncounterEnded {
        encounter_id: EncounterId,
        outcome: EncounterOutcome,
    },
}

impl CombatEvent {
    /// The snake_case tag used in serialized form.
    pub fn event_name(&self) -> &'static str {
        match self {
            CombatEvent::DamageDealt { .. } => "damage_dealt",
            CombatEvent::DamageTaken { .. } => "damage_taken",
            CombatEvent::Healed { .. } => "healed",
            CombatEvent::EnemySpotted { .. } => "enemy_spotted",
            CombatEvent::EnemyKilled { .. } => "enemy_killed",
            CombatEvent::EnemyLost { .. } => "enemy_lost",
            CombatEvent::SkillCast { .. } => "skill_cast",
            CombatEvent::SkillReady { .. } => "skill_ready",
            CombatEvent::BuffApplied { .. } => "buff_applied",
            CombatEvent::BuffStacksChanged { .. } => "buff_stacks_changed",
            CombatEvent::BuffExpired { .. } => "buff_expired",
            CombatEvent::ItemEquipped { .. } => "item_equipped",
            CombatEvent::ItemUnequipped { .. } => "item_unequipped",
            CombatEvent::Moved { .. } => "moved",
            CombatEvent::LevelUp { .. } => "level_up",
            CombatEvent::ExperienceGained { .. } => "experience_gained",
            CombatEvent::GoldChanged { .. } => "gold_changed",
            CombatEvent::StatsChanged { .. } => "stats_changed",
            CombatEvent::PlayerDied => "player_died",
            CombatEvent::EncounterStarted { .. } => "encounter_started",
            CombatEvent::EncounterEnded { .. } => "encounter_ended",
        }
    }

    /// Events that start an encounter or keep it alive.
    pub fn is_combat_activity(&self) -> bool {
        matches!(
            self,
            CombatEvent::DamageDealt { .. }
                | CombatEvent::DamageTaken { .. }
                | CombatEvent::EnemyKilled { .. }
                | CombatEvent::SkillCast { .. }
        )
    }
}
