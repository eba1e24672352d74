//! Offset table: where game values live in memory.
//!
//! Offsets change with every game patch, so they are kept in a JSON file
//! next to the binary rather than compiled in. Player values are pointer
//! chains from the game module base. Lists (enemies, skills, buffs,
//! equipment) are an [`ArraySpec`]: a chain to the first element, a chain
//! to the element count, the element stride, and field offsets inside one
//! element.

use std::fs;
use std::path::Path;

use d4log_memory::{PointerChain, ReadMemory};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Pointer chain from the module base to a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerSpec {
    pub offsets: PointerChain,
}

impl PointerSpec {
    pub fn new(offsets: impl Into<Vec<i64>>) -> Self {
        Self {
            offsets: PointerChain::new(offsets),
        }
    }

    pub fn resolve<R: ReadMemory + ?Sized>(
        &self,
        reader: &R,
        module_base: u64,
    ) -> d4log_memory::Result<u64> {
        self.offsets.resolve(reader, module_base)
    }
}

/// A contiguous array of fixed-size game structs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySpec<F> {
    /// Resolves to the address of element 0.
    pub pointer: PointerSpec,
    /// Resolves to the address of the `u32` element count.
    pub count: PointerSpec,
    /// Bytes between consecutive elements.
    pub stride: u64,
    pub fields: F,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOffsets {
    pub level: PointerSpec,
    pub health: PointerSpec,
    pub max_health: PointerSpec,
    /// Three consecutive `f32`s (x, y, z).
    pub position: PointerSpec,
    #[serde(default)]
    pub experience: Option<PointerSpec>,
    #[serde(default)]
    pub gold: Option<PointerSpec>,
    #[serde(default)]
    pub resource: Option<PointerSpec>,
    #[serde(default)]
    pub max_resource: Option<PointerSpec>,
    /// Start of the stat block, laid out as [`STATS_LAYOUT`].
    #[serde(default)]
    pub stats: Option<PointerSpec>,
}

/// Byte offsets inside the character stat block: strength, intelligence,
/// willpower, dexterity and armor as `u32`, then attack speed, critical
/// chance and critical damage as `f32`.
pub const STATS_LAYOUT: [u64; 8] = [0x00, 0x04, 0x08, 0x0c, 0x10, 0x14, 0x18, 0x1c];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyFields {
    pub entity_id: u64,
    pub monster_id: u64,
    pub health: u64,
    pub max_health: u64,
    /// Three consecutive `f32`s.
    pub position: u64,
    /// Raw rank: 0 normal, 1 champion, 2 elite, 3 boss.
    pub rank: u64,
}

/// Skill bar entries; the slot number is the element index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillFields {
    pub power_id: u64,
    pub cooldown_remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffFields {
    pub power_id: u64,
    pub stacks: u64,
    pub remaining: u64,
    /// Non-zero `u32` for debuffs.
    pub is_debuff: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentFields {
    /// `u32` slot index, see `EquipSlot::from_index`.
    pub slot: u64,
    pub item_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetTable {
    /// File name of the module all chains are relative to.
    pub module: String,
    /// Game build the offsets were taken from. Informational.
    #[serde(default)]
    pub game_version: Option<String>,
    pub player: PlayerOffsets,
    pub enemies: ArraySpec<EnemyFields>,
    pub skills: ArraySpec<SkillFields>,
    pub buffs: ArraySpec<BuffFields>,
    pub equipment: ArraySpec<EquipmentFields>,
}

impl OffsetTable {
    /// Reject tables that cannot describe real memory.
    pub fn validate(&self) -> Result<()> {
        if self.module.trim().is_empty() {
            return Err(AgentError::InvalidOffsets("module name is empty".into()));
        }
        for (name, stride) in [
            ("enemies", self.enemies.stride),
            ("skills", self.skills.stride),
            ("buffs", self.buffs.stride),
            ("equipment", self.equipment.stride),
        ] {
            if stride == 0 {
                return Err(AgentError::InvalidOffsets(format!("{name} stride is zero")));
            }
        }
        Ok(())
    }
}

pub fn load_offsets(path: impl AsRef<Path>) -> Result<OffsetTable> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| AgentError::OffsetsIo {
        path: path.to_path_buf(),
        source,
    })?;
    let table: OffsetTable =
        serde_json::from_str(&raw).map_err(|source| AgentError::OffsetsFormat {
            path: path.to_path_buf(),
            source,
        })?;
    table.validate()?;
    tracing::debug!(
        path = %path.display(),
        module = %table.module,
        game_version = table.game_version.as_deref().unwrap_or("unknown"),
        "Loaded offset table",
    );
    Ok(table)
}

pub fn save_offsets(path: impl AsRef<Path>, table: &OffsetTable) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(table).map_err(|source| AgentError::OffsetsFormat {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| AgentError::OffsetsIo {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sample_table() -> OffsetTable {
        OffsetTable {
            module: "Diablo IV.exe".into(),
            game_version: Some("1.2.3.47954".into()),
            player: PlayerOffsets {
                level: PointerSpec::new(vec![0x100, 0x10]),
                health: PointerSpec::new(vec![0x100, 0x20]),
                max_health: PointerSpec::new(vec![0x100, 0x24]),
                position: PointerSpec::new(vec![0x100, 0x30]),
                experience: None,
                gold: Some(PointerSpec::new(vec![0x100, 0x48])),
                resource: None,
                max_resource: None,
                stats: None,
            },
            enemies: ArraySpec {
                pointer: PointerSpec::new(vec![0x108, 0]),
                count: PointerSpec::new(vec![0x110]),
                stride: 0x40,
                fields: EnemyFields {
                    entity_id: 0x0,
                    monster_id: 0x4,
                    health: 0x8,
                    max_health: 0xc,
                    position: 0x10,
                    rank: 0x1c,
                },
            },
            skills: ArraySpec {
                pointer: PointerSpec::new(vec![0x118, 0]),
                count: PointerSpec::new(vec![0x120]),
                stride: 0x10,
                fields: SkillFields {
                    power_id: 0x0,
                    cooldown_remaining: 0x4,
                },
            },
            buffs: ArraySpec {
                pointer: PointerSpec::new(vec![0x128, 0]),
                count: PointerSpec::new(vec![0x130]),
                stride: 0x10,
                fields: BuffFields {
                    power_id: 0x0,
                    stacks: 0x4,
                    remaining: 0x8,
                    is_debuff: 0xc,
                },
            },
            equipment: ArraySpec {
                pointer: PointerSpec::new(vec![0x138, 0]),
                count: PointerSpec::new(vec![0x140]),
                stride: 0x8,
                fields: EquipmentFields {
                    slot: 0x0,
                    item_id: 0x4,
                },
            },
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.json");
        let table = sample_table();

        save_offsets(&path, &table).unwrap();
        assert_eq!(load_offsets(&path).unwrap(), table);
    }

    #[test]
    fn chains_serialize_as_plain_arrays() {
        let json = serde_json::to_value(sample_table()).unwrap();
        assert_eq!(json["player"]["health"]["offsets"], serde_json::json!([0x100, 0x20]));
        assert_eq!(json["enemies"]["stride"], 0x40);
    }

    #[test]
    fn optional_player_fields_may_be_omitted() {
        let mut json = serde_json::to_value(sample_table()).unwrap();
        let player = json["player"].as_object_mut().unwrap();
        player.remove("gold");
        player.remove("experience");
        json.as_object_mut().unwrap().remove("game_version");

        let table: OffsetTable = serde_json::from_value(json).unwrap();
        assert_eq!(table.player.gold, None);
        assert_eq!(table.game_version, None);
    }

    #[test]
    fn example_file_is_valid() {
        let raw = include_str!("../../../offsets.example.json");
        let table: OffsetTable = serde_json::from_str(raw).unwrap();
        table.validate().unwrap();
        assert_eq!(table.player.level, sample_table().player.level);
        assert_eq!(table.enemies, sample_table().enemies);
    }

    #[test]
    fn zero_stride_is_rejected() {
        let mut table = sample_table();
        table.buffs.stride = 0;
        assert_matches!(table.validate(), Err(AgentError::InvalidOffsets(msg)) if msg.contains("buffs"));
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            load_offsets(dir.path().join("missing.json")),
            Err(AgentError::OffsetsIo { .. })
        );

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"module": "x"}"#).unwrap();
        assert_matches!(load_offsets(&bad), Err(AgentError::OffsetsFormat { .. }));
    }
}
