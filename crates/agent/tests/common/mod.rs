//! Shared fixtures: an offset table and a fake game image that matches it.
//!
//! Layout relative to the module base:
//!
//! | Offset  | Contents                          |
//! |---------|-----------------------------------|
//! | `0x100` | pointer to the player struct      |
//! | `0x108` | pointer to the enemy array        |
//! | `0x110` | enemy count (`u32`)               |
//! | `0x118` | pointer to the skill bar          |
//! | `0x120` | skill count                       |
//! | `0x128` | pointer to the buff array         |
//! | `0x130` | buff count                        |
//! | `0x138` | pointer to the equipment array    |
//! | `0x140` | equipment count                   |

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use d4log_agent::offsets::{
    ArraySpec, BuffFields, EnemyFields, EquipmentFields, OffsetTable, PlayerOffsets, PointerSpec,
    SkillFields,
};
use d4log_memory::{MemoryDump, ReadMemory};

pub const MODULE_BASE: u64 = 0x1_4000_0000;
pub const IMAGE_SIZE: usize = 0x2000;

pub const PLAYER: u64 = MODULE_BASE + 0x400;
pub const ENEMIES: u64 = MODULE_BASE + 0x800;
pub const SKILLS: u64 = MODULE_BASE + 0xc00;
pub const BUFFS: u64 = MODULE_BASE + 0xd00;
pub const EQUIPMENT: u64 = MODULE_BASE + 0xe00;

pub const ENEMY_STRIDE: u64 = 0x40;
pub const SKILL_STRIDE: u64 = 0x10;
pub const BUFF_STRIDE: u64 = 0x10;
pub const EQUIPMENT_STRIDE: u64 = 0x8;

pub fn table() -> OffsetTable {
    OffsetTable {
        module: "Diablo IV.exe".into(),
        game_version: Some("test".into()),
        player: PlayerOffsets {
            level: PointerSpec::new(vec![0x100, 0x10]),
            health: PointerSpec::new(vec![0x100, 0x20]),
            max_health: PointerSpec::new(vec![0x100, 0x24]),
            position: PointerSpec::new(vec![0x100, 0x30]),
            experience: Some(PointerSpec::new(vec![0x100, 0x40])),
            gold: Some(PointerSpec::new(vec![0x100, 0x48])),
            resource: None,
            max_resource: None,
            stats: Some(PointerSpec::new(vec![0x100, 0x60])),
        },
        enemies: ArraySpec {
            pointer: PointerSpec::new(vec![0x108, 0]),
            count: PointerSpec::new(vec![0x110]),
            stride: ENEMY_STRIDE,
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
            stride: SKILL_STRIDE,
            fields: SkillFields {
                power_id: 0x0,
                cooldown_remaining: 0x4,
            },
        },
        buffs: ArraySpec {
            pointer: PointerSpec::new(vec![0x128, 0]),
            count: PointerSpec::new(vec![0x130]),
            stride: BUFF_STRIDE,
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
            stride: EQUIPMENT_STRIDE,
            fields: EquipmentFields {
                slot: 0x0,
                item_id: 0x4,
            },
        },
    }
}

/// A game image with every list pointer wired up, all lists empty and a
/// level 20 player at full health.
pub fn game_image() -> MemoryDump {
    let mut dump = MemoryDump::zeroed(MODULE_BASE, IMAGE_SIZE);
    dump.put_u64(MODULE_BASE + 0x100, PLAYER).unwrap();
    dump.put_u64(MODULE_BASE + 0x108, ENEMIES).unwrap();
    dump.put_u64(MODULE_BASE + 0x118, SKILLS).unwrap();
    dump.put_u64(MODULE_BASE + 0x128, BUFFS).unwrap();
    dump.put_u64(MODULE_BASE + 0x138, EQUIPMENT).unwrap();

    dump.put_u32(PLAYER + 0x10, 20).unwrap();
    set_player_health(&mut dump, 1000.0);
    dump.put_f32(PLAYER + 0x24, 1000.0).unwrap();
    dump
}

pub fn set_player_health(dump: &mut MemoryDump, health: f32) {
    dump.put_f32(PLAYER + 0x20, health).unwrap();
}

pub fn set_position(dump: &mut MemoryDump, x: f32, y: f32, z: f32) {
    dump.put_f32(PLAYER + 0x30, x).unwrap();
    dump.put_f32(PLAYER + 0x34, y).unwrap();
    dump.put_f32(PLAYER + 0x38, z).unwrap();
}

pub fn set_counts(dump: &mut MemoryDump, enemies: u32, skills: u32, buffs: u32, equipment: u32) {
    dump.put_u32(MODULE_BASE + 0x110, enemies).unwrap();
    dump.put_u32(MODULE_BASE + 0x120, skills).unwrap();
    dump.put_u32(MODULE_BASE + 0x130, buffs).unwrap();
    dump.put_u32(MODULE_BASE + 0x140, equipment).unwrap();
}

pub fn put_enemy(
    dump: &mut MemoryDump,
    index: u64,
    entity_id: u32,
    monster_id: u32,
    health: f32,
    max_health: f32,
    rank: u32,
) {
    let entry = ENEMIES + index * ENEMY_STRIDE;
    dump.put_u32(entry, entity_id).unwrap();
    dump.put_u32(entry + 0x4, monster_id).unwrap();
    dump.put_f32(entry + 0x8, health).unwrap();
    dump.put_f32(entry + 0xc, max_health).unwrap();
    dump.put_u32(entry + 0x1c, rank).unwrap();
}

pub fn set_enemy_health(dump: &mut MemoryDump, index: u64, health: f32) {
    dump.put_f32(ENEMIES + index * ENEMY_STRIDE + 0x8, health).unwrap();
}

pub fn put_skill(dump: &mut MemoryDump, index: u64, power_id: u32, cooldown: f32) {
    let entry = SKILLS + index * SKILL_STRIDE;
    dump.put_u32(entry, power_id).unwrap();
    dump.put_f32(entry + 0x4, cooldown).unwrap();
}

pub fn put_buff(dump: &mut MemoryDump, index: u64, power_id: u32, stacks: u32, remaining: f32, debuff: bool) {
    let entry = BUFFS + index * BUFF_STRIDE;
    dump.put_u32(entry, power_id).unwrap();
    dump.put_u32(entry + 0x4, stacks).unwrap();
    dump.put_f32(entry + 0x8, remaining).unwrap();
    dump.put_u32(entry + 0xc, u32::from(debuff)).unwrap();
}

pub fn put_item(dump: &mut MemoryDump, index: u64, slot: u32, item_id: u32) {
    let entry = EQUIPMENT + index * EQUIPMENT_STRIDE;
    dump.put_u32(entry, slot).unwrap();
    dump.put_u32(entry + 0x4, item_id).unwrap();
}

/// A game image the test can change while a collector reads it.
#[derive(Clone)]
pub struct SharedImage(pub Arc<Mutex<MemoryDump>>);

impl SharedImage {
    pub fn new(dump: MemoryDump) -> Self {
        Self(Arc::new(Mutex::new(dump)))
    }

    pub fn update(&self, change: impl FnOnce(&mut MemoryDump)) {
        change(&mut self.0.lock().unwrap());
    }
}

impl ReadMemory for SharedImage {
    fn read_bytes(&self, address: u64, buf: &mut [u8]) -> d4log_memory::Result<()> {
        self.0.lock().unwrap().read_bytes(address, buf)
    }
}
