//! Point-in-time views of game state.
//!
//! A [`GameSnapshot`] is what the collector reads out of the game process
//! on every sampling tick. Snapshots carry raw values only; everything
//! derived (damage, kills, casts) comes from diffing two of them in the
//! [`detector`](crate::detector).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{EntityId, PowerId, Timestamp};

/// Highest character level the game has shipped with.
const MAX_LEVEL: u32 = 100;

/// Largest plausible world coordinate. Squared distances between positions
/// inside this bound stay finite in `f32`.
const MAX_COORDINATE: f32 = 1.0e6;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// World-space position in yards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Finite and inside the world bounds.
    pub fn is_plausible(&self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|c| c.is_finite() && c.abs() <= MAX_COORDINATE)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Primary and secondary character statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub strength: u32,
    pub intelligence: u32,
    pub willpower: u32,
    pub dexterity: u32,
    pub armor: u32,
    /// Attacks per second multiplier (1.0 = base speed).
    pub attack_speed: f32,
    /// Fraction in `[0, 1]`.
    pub crit_chance: f32,
    /// Bonus multiplier, e.g. `0.5` for +50% critical damage.
    pub crit_damage: f32,
}

impl CharacterStats {
    pub fn is_finite(&self) -> bool {
        self.attack_speed.is_finite() && self.crit_chance.is_finite() && self.crit_damage.is_finite()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub level: u32,
    pub experience: u64,
    pub gold: u64,
    pub health: f32,
    pub max_health: f32,
    /// Class resource (mana, fury, spirit, essence, energy).
    pub resource: f32,
    pub max_resource: f32,
    pub position: Vec3,
    pub stats: CharacterStats,
}

impl PlayerSnapshot {
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Health as a fraction of maximum, `0.0` when max health is unknown.
    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            (self.health / self.max_health).clamp(0.0, 1.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Enemies
// ---------------------------------------------------------------------------

/// Monster rank as encoded by the game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyRank {
    #[default]
    Normal,
    Champion,
    Elite,
    Boss,
}

impl EnemyRank {
    /// Decode the raw rank value. Unknown values fall back to `Normal`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => EnemyRank::Champion,
            2 => EnemyRank::Elite,
            3 => EnemyRank::Boss,
            _ => EnemyRank::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnemyRank::Normal => "normal",
            EnemyRank::Champion => "champion",
            EnemyRank::Elite => "elite",
            EnemyRank::Boss => "boss",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub entity_id: EntityId,
    /// SNO id of the monster type.
    pub monster_id: u32,
    pub health: f32,
    pub max_health: f32,
    pub position: Vec3,
    pub rank: EnemyRank,
}

impl EnemySnapshot {
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

// ---------------------------------------------------------------------------
// Skills, buffs, equipment
// ---------------------------------------------------------------------------

/// One skill bar slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSlot {
    pub slot: u8,
    pub power_id: PowerId,
    /// Seconds until the skill is usable again; `0.0` when ready.
    pub cooldown_remaining: f32,
}

impl SkillSlot {
    pub fn is_ready(&self) -> bool {
        self.cooldown_remaining <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffSnapshot {
    pub power_id: PowerId,
    pub stacks: u32,
    /// Seconds remaining; negative or zero for permanent auras.
    pub remaining: f32,
    pub is_debuff: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Helm,
    Chest,
    Gloves,
    Pants,
    Boots,
    Amulet,
    RingLeft,
    RingRight,
    MainHand,
    OffHand,
    TwoHandBludgeon,
    TwoHandSlashing,
    Ranged,
}

impl EquipSlot {
    pub const ALL: [EquipSlot; 13] = [
        EquipSlot::Helm,
        EquipSlot::Chest,
        EquipSlot::Gloves,
        EquipSlot::Pants,
        EquipSlot::Boots,
        EquipSlot::Amulet,
        EquipSlot::RingLeft,
        EquipSlot::RingRight,
        EquipSlot::MainHand,
        EquipSlot::OffHand,
        EquipSlot::TwoHandBludgeon,
        EquipSlot::TwoHandSlashing,
        EquipSlot::Ranged,
    ];

    /// Decode the inventory slot index used by the game.
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub slot: EquipSlot,
    /// SNO id of the item; `0` means the slot is empty.
    pub item_id: u32,
}

// ---------------------------------------------------------------------------
// GameSnapshot
// ---------------------------------------------------------------------------

/// Everything sampled from the game in one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub taken_at: Timestamp,
    pub player: PlayerSnapshot,
    #[serde(default)]
    pub enemies: Vec<EnemySnapshot>,
    #[serde(default)]
    pub skills: Vec<SkillSlot>,
    #[serde(default)]
    pub buffs: Vec<BuffSnapshot>,
    #[serde(default)]
    pub equipment: Vec<EquippedItem>,
}

impl GameSnapshot {
    /// An empty snapshot with only the player set.
    pub fn new(taken_at: Timestamp, player: PlayerSnapshot) -> Self {
        Self {
            taken_at,
            player,
            enemies: Vec::new(),
            skills: Vec::new(),
            buffs: Vec::new(),
            equipment: Vec::new(),
        }
    }

    pub fn enemy(&self, entity_id: EntityId) -> Option<&EnemySnapshot> {
        self.enemies.iter().find(|e| e.entity_id == entity_id)
    }

    /// Reject snapshots that cannot be real game state. Stale offsets after
    /// a game patch typically read garbage that fails these checks.
    pub fn validate(&self) -> Result<(), CoreError> {
        let player = &self.player;
        let floats = [
            player.health,
            player.max_health,
            player.resource,
            player.max_resource,
        ];
        if !floats.iter().all(|v| v.is_finite()) {
            return Err(CoreError::Validation("player value is not finite".into()));
        }
        if player.max_health < 0.0 || player.health > player.max_health * 1.01 + 1.0 {
            return Err(CoreError::Validation(format!(
                "player health {} outside [0, {}]",
                player.health, player.max_health
            )));
        }
        if player.level > MAX_LEVEL {
            return Err(CoreError::Validation(format!(
                "player level {} above {MAX_LEVEL}",
                player.level
            )));
        }
        if !player.position.is_plausible() {
            return Err(CoreError::Validation(format!(
                "player position {:?} outside the world",
                player.position
            )));
        }
        if !player.stats.is_finite() {
            return Err(CoreError::Validation("player stats are not finite".into()));
        }
        for enemy in &self.enemies {
            let health_ok = enemy.health.is_finite()
                && enemy.max_health.is_finite()
                && enemy.max_health >= 0.0;
            if !health_ok {
                return Err(CoreError::Validation(format!(
                    "enemy {} has invalid health",
                    enemy.entity_id
                )));
            }
            if !enemy.position.is_plausible() {
                return Err(CoreError::Validation(format!(
                    "enemy {} position outside the world",
                    enemy.entity_id
                )));
            }
        }
        if let Some(skill) = self.skills.iter().find(|s| !s.cooldown_remaining.is_finite()) {
            return Err(CoreError::Validation(format!(
                "skill slot {} cooldown is not finite",
                skill.slot
            )));
        }
        if let Some(buff) = self.buffs.iter().find(|b| !b.remaining.is_finite()) {
            return Err(CoreError::Validation(format!(
                "buff {} duration is not finite",
                buff.power_id
            )));
        }
        Ok(())
    }
}
