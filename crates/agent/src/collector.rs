//! Game state collection.
//!
//! [`Collector`] reads one [`GameSnapshot`] per call through any
//! [`ReadMemory`] implementation, following an [`OffsetTable`]. Against a
//! live game it wraps a [`MemoryReader`]; tests drive it with a
//! [`MemoryDump`](d4log_memory::MemoryDump).
//!
//! Player values are required: failing to read any of them fails the
//! snapshot. List entries are best-effort: an unreadable entry is skipped
//! with a warning, and a list whose base pointer is null is read as empty
//! (the game frees the enemy list on loading screens).

use std::time::Duration;

use chrono::Utc;
use d4log_core::snapshot::{
    BuffSnapshot, CharacterStats, EnemyRank, EnemySnapshot, EquipSlot, EquippedItem,
    GameSnapshot, PlayerSnapshot, SkillSlot, Vec3,
};
use d4log_memory::{offset_address, MemoryError, MemoryReader, ProcessHandle, ReadMemory};
use tokio_util::sync::CancellationToken;

use crate::offsets::{ArraySpec, OffsetTable, PointerSpec, STATS_LAYOUT};

/// Upper bound on entries read from any list. Counts above this are
/// garbage reads (or a very crowded screen) and are clamped.
pub const MAX_ARRAY_ENTRIES: usize = 256;

/// Reads snapshots of the game state from memory.
pub struct Collector<R> {
    reader: R,
    table: OffsetTable,
    module_base: u64,
}

impl Collector<MemoryReader> {
    /// Attach to a running game: locate the module named in `table` and
    /// read through `process_vm_readv`.
    pub fn attach(process: &ProcessHandle, table: OffsetTable) -> Result<Self, MemoryError> {
        let module = process.module(&table.module)?;
        tracing::info!(
            pid = process.pid(),
            module = %table.module,
            base = module.base,
            size = module.size,
            "Attached to game module",
        );
        Ok(Self::new(MemoryReader::new(process), table, module.base))
    }
}

impl<R: ReadMemory> Collector<R> {
    pub fn new(reader: R, table: OffsetTable, module_base: u64) -> Self {
        Self {
            reader,
            table,
            module_base,
        }
    }

    pub fn module_base(&self) -> u64 {
        self.module_base
    }

    pub fn table(&self) -> &OffsetTable {
        &self.table
    }

    /// Read a full snapshot, stamped with the current time.
    pub fn snapshot(&self) -> Result<GameSnapshot, MemoryError> {
        let mut snapshot = GameSnapshot::new(Utc::now(), self.player()?);
        snapshot.enemies = self.read_array("enemies", &self.table.enemies, |r, _, entry, f| {
            let entity_id = r.read_u32(offset_address(entry, f.entity_id)?)?;
            if entity_id == 0 {
                return Ok(None);
            }
            Ok(Some(EnemySnapshot {
                entity_id,
                monster_id: r.read_u32(offset_address(entry, f.monster_id)?)?,
                health: r.read_f32(offset_address(entry, f.health)?)?,
                max_health: r.read_f32(offset_address(entry, f.max_health)?)?,
                position: read_vec3(r, offset_address(entry, f.position)?)?,
                rank: EnemyRank::from_raw(r.read_u32(offset_address(entry, f.rank)?)?),
            }))
        });
        snapshot.skills = self.read_array("skills", &self.table.skills, |r, index, entry, f| {
            let power_id = r.read_u32(offset_address(entry, f.power_id)?)?;
            if power_id == 0 {
                return Ok(None);
            }
            let cooldown = r.read_f32(offset_address(entry, f.cooldown_remaining)?)?;
            Ok(Some(SkillSlot {
                slot: index as u8,
                power_id,
                cooldown_remaining: cooldown.max(0.0),
            }))
        });
        snapshot.buffs = self.read_array("buffs", &self.table.buffs, |r, _, entry, f| {
            let power_id = r.read_u32(offset_address(entry, f.power_id)?)?;
            if power_id == 0 {
                return Ok(None);
            }
            Ok(Some(BuffSnapshot {
                power_id,
                stacks: r.read_u32(offset_address(entry, f.stacks)?)?,
                remaining: r.read_f32(offset_address(entry, f.remaining)?)?,
                is_debuff: r.read_u32(offset_address(entry, f.is_debuff)?)? != 0,
            }))
        });
        snapshot.equipment = self.read_array("equipment", &self.table.equipment, |r, _, entry, f| {
            let item_id = r.read_u32(offset_address(entry, f.item_id)?)?;
            let raw_slot = r.read_u32(offset_address(entry, f.slot)?)?;
            if item_id == 0 {
                return Ok(None);
            }
            match EquipSlot::from_index(raw_slot) {
                Some(slot) => Ok(Some(EquippedItem { slot, item_id })),
                None => {
                    tracing::warn!(raw_slot, item_id, "Unknown equipment slot, skipping item");
                    Ok(None)
                }
            }
        });
        Ok(snapshot)
    }

    fn player(&self) -> Result<PlayerSnapshot, MemoryError> {
        let p = &self.table.player;
        let r = &self.reader;

        Ok(PlayerSnapshot {
            level: r.read_u32(self.resolve(&p.level)?)?,
            experience: self.optional(&p.experience, |a| r.read_u64(a))?.unwrap_or(0),
            gold: self.optional(&p.gold, |a| r.read_u64(a))?.unwrap_or(0),
            health: r.read_f32(self.resolve(&p.health)?)?,
            max_health: r.read_f32(self.resolve(&p.max_health)?)?,
            resource: self.optional(&p.resource, |a| r.read_f32(a))?.unwrap_or(0.0),
            max_resource: self.optional(&p.max_resource, |a| r.read_f32(a))?.unwrap_or(0.0),
            position: read_vec3(r, self.resolve(&p.position)?)?,
            stats: self
                .optional(&p.stats, |a| read_stats(r, a))?
                .unwrap_or_default(),
        })
    }

    fn resolve(&self, spec: &PointerSpec) -> Result<u64, MemoryError> {
        spec.resolve(&self.reader, self.module_base)
    }

    fn optional<T>(
        &self,
        spec: &Option<PointerSpec>,
        read: impl FnOnce(u64) -> Result<T, MemoryError>,
    ) -> Result<Option<T>, MemoryError> {
        spec.as_ref()
            .map(|spec| self.resolve(spec).and_then(read))
            .transpose()
    }

    /// Read up to `count` entries of a list. `read_entry` gets the entry
    /// index and address and returns `None` for empty entries.
    fn read_array<F, T>(
        &self,
        name: &'static str,
        spec: &ArraySpec<F>,
        read_entry: impl Fn(&R, usize, u64, &F) -> Result<Option<T>, MemoryError>,
    ) -> Vec<T> {
        let base = match self.resolve(&spec.pointer) {
            Ok(base) => base,
            Err(MemoryError::NullPointer { .. }) => return Vec::new(),
            Err(e) => {
                tracing::warn!(list = name, error = %e, "Failed to resolve list pointer");
                return Vec::new();
            }
        };
        let count = match self
            .resolve(&spec.count)
            .and_then(|address| self.reader.read_u32(address))
        {
            Ok(count) => count as usize,
            Err(e) => {
                tracing::warn!(list = name, error = %e, "Failed to read list length");
                return Vec::new();
            }
        };
        if count > MAX_ARRAY_ENTRIES {
            tracing::warn!(list = name, count, max = MAX_ARRAY_ENTRIES, "List length clamped");
        }

        let mut out = Vec::new();
        for index in 0..count.min(MAX_ARRAY_ENTRIES) {
            let Some(entry) = (index as u64)
                .checked_mul(spec.stride)
                .and_then(|offset| base.checked_add(offset))
            else {
                tracing::warn!(list = name, base, index, "List runs past the address space");
                break;
            };
            match read_entry(&self.reader, index, entry, &spec.fields) {
                Ok(Some(value)) => out.push(value),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(list = name, index, error = %e, "Skipping unreadable list entry");
                }
            }
        }
        out
    }
}

fn read_vec3<R: ReadMemory + ?Sized>(reader: &R, address: u64) -> Result<Vec3, MemoryError> {
    Ok(Vec3::new(
        reader.read_f32(address)?,
        reader.read_f32(offset_address(address, 4)?)?,
        reader.read_f32(offset_address(address, 8)?)?,
    ))
}

fn read_stats<R: ReadMemory + ?Sized>(reader: &R, base: u64) -> Result<CharacterStats, MemoryError> {
    let [strength, intelligence, willpower, dexterity, armor, attack_speed, crit_chance, crit_damage] =
        STATS_LAYOUT;
    Ok(CharacterStats {
        strength: reader.read_u32(offset_address(base, strength)?)?,
        intelligence: reader.read_u32(offset_address(base, intelligence)?)?,
        willpower: reader.read_u32(offset_address(base, willpower)?)?,
        dexterity: reader.read_u32(offset_address(base, dexterity)?)?,
        armor: reader.read_u32(offset_address(base, armor)?)?,
        attack_speed: reader.read_f32(offset_address(base, attack_speed)?)?,
        crit_chance: reader.read_f32(offset_address(base, crit_chance)?)?,
        crit_damage: reader.read_f32(offset_address(base, crit_damage)?)?,
    })
}

/// Poll for the game process until it appears or `cancel` fires.
pub async fn wait_for_process(
    name: &str,
    poll: Duration,
    cancel: &CancellationToken,
) -> Option<ProcessHandle> {
    let mut announced = false;
    loop {
        match ProcessHandle::open(name) {
            Ok(handle) => {
                tracing::info!(pid = handle.pid(), process = name, "Game process found");
                return Some(handle);
            }
            Err(MemoryError::ProcessNotFound(_)) => {
                if !announced {
                    tracing::info!(process = name, "Waiting for game process");
                    announced = true;
                }
            }
            Err(e) => {
                tracing::warn!(process = name, error = %e, "Process lookup failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(poll) => {}
        }
    }
}
