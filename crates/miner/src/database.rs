//! In-memory index over a parsed data dump.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::files::{AffFile, PowFile, SklFile, StlFile};

/// Label of a power's display name inside its string list.
const POWER_NAME_LABEL: &str = "name";

/// A file that was skipped while parsing a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub path: PathBuf,
    pub message: String,
}

/// How many files of each kind were loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseCounts {
    pub string_lists: usize,
    pub affixes: usize,
    pub skill_kits: usize,
    pub powers: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GameDatabase {
    strings: BTreeMap<String, StlFile>,
    affixes: BTreeMap<u32, AffFile>,
    skill_kits: BTreeMap<u32, SklFile>,
    powers: BTreeMap<u32, PowFile>,
    warnings: Vec<ParseWarning>,
}

impl GameDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_string_list(&mut self, file: StlFile) {
        self.strings.insert(file.name.clone(), file);
    }

    pub fn insert_affix(&mut self, file: AffFile) {
        self.affixes.insert(file.sno_id, file);
    }

    pub fn insert_skill_kit(&mut self, file: SklFile) {
        self.skill_kits.insert(file.sno_id, file);
    }

    pub fn insert_power(&mut self, file: PowFile) {
        self.powers.insert(file.sno_id, file);
    }

    pub fn push_warning(&mut self, warning: ParseWarning) {
        self.warnings.push(warning);
    }

    /// Text of `label` in the string list named `file`.
    pub fn string(&self, file: &str, label: &str) -> Option<&str> {
        self.strings.get(file)?.get(label)
    }

    pub fn string_list(&self, file: &str) -> Option<&StlFile> {
        self.strings.get(file)
    }

    /// Display name of a power, e.g. `"Bash"` for the Barbarian's basic
    /// skill. Requires both the power file and its `Power_<name>` string
    /// list to have been loaded.
    pub fn power_name(&self, sno_id: u32) -> Option<&str> {
        let power = self.powers.get(&sno_id)?;
        self.string(&power.string_list_name(), POWER_NAME_LABEL)
    }

    pub fn power(&self, sno_id: u32) -> Option<&PowFile> {
        self.powers.get(&sno_id)
    }

    pub fn affix(&self, sno_id: u32) -> Option<&AffFile> {
        self.affixes.get(&sno_id)
    }

    pub fn skill_kit(&self, sno_id: u32) -> Option<&SklFile> {
        self.skill_kits.get(&sno_id)
    }

    /// Skill kit by asset name, e.g. `"Barbarian"`.
    pub fn skill_kit_named(&self, name: &str) -> Option<&SklFile> {
        self.skill_kits.values().find(|kit| kit.name == name)
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn counts(&self) -> DatabaseCounts {
        DatabaseCounts {
            string_lists: self.strings.len(),
            affixes: self.affixes.len(),
            skill_kits: self.skill_kits.len(),
            powers: self.powers.len(),
            warnings: self.warnings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
            && self.affixes.is_empty()
            && self.skill_kits.is_empty()
            && self.powers.is_empty()
    }
}
