//! Individual data file formats.
//!
//! The dumps are the JSON export of the game's CASC archive: one file per
//! asset, named `<asset>.<kind>.json`. Only the fields the logger needs are
//! modelled; everything else in a file is ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};

/// Kinds of data file the miner understands, keyed by double extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// `*.stl.json`, a string list.
    StringList,
    /// `*.aff.json`, an item affix.
    Affix,
    /// `*.skl.json`, a class skill kit.
    SkillKit,
    /// `*.pow.json`, a power definition.
    Power,
}

impl FileKind {
    pub const ALL: [FileKind; 4] = [
        FileKind::StringList,
        FileKind::Affix,
        FileKind::SkillKit,
        FileKind::Power,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            FileKind::StringList => ".stl.json",
            FileKind::Affix => ".aff.json",
            FileKind::SkillKit => ".skl.json",
            FileKind::Power => ".pow.json",
        }
    }

    /// Classify a path by its file name. Unknown files yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        Self::ALL.into_iter().find(|kind| name.ends_with(kind.suffix()))
    }

    /// Asset name: the file name with the double extension removed.
    pub fn asset_name(self, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        name.strip_suffix(self.suffix())
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
    }
}

/// An SNO reference as it appears in the dumps: either a bare id or an
/// object carrying the id in `__raw__`. Non-positive ids mean "none".
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum SnoRef {
    Id(i64),
    Ref {
        #[serde(rename = "__raw__")]
        raw: i64,
    },
}

impl SnoRef {
    fn id(self) -> Option<u32> {
        let raw = match self {
            SnoRef::Id(id) => id,
            SnoRef::Ref { raw } => raw,
        };
        u32::try_from(raw).ok().filter(|&id| id > 0)
    }
}

// ---------------------------------------------------------------------------
// String lists
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawStl {
    #[serde(rename = "arStrings", default)]
    strings: Vec<RawStlEntry>,
}

#[derive(Deserialize)]
struct RawStlEntry {
    #[serde(rename = "szLabel")]
    label: String,
    #[serde(rename = "szText", default)]
    text: String,
}

/// Localised strings of one asset, label to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StlFile {
    pub name: String,
    pub fields: BTreeMap<String, String>,
}

impl StlFile {
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let raw: RawStl = serde_json::from_str(json)?;
        Ok(Self::from_raw(name.into(), raw))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw: RawStl = read_json(path)?;
        Ok(Self::from_raw(asset_name(FileKind::StringList, path), raw))
    }

    fn from_raw(name: String, raw: RawStl) -> Self {
        let fields = raw
            .strings
            .into_iter()
            .map(|entry| (entry.label, entry.text))
            .collect();
        Self { name, fields }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Affixes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawAff {
    #[serde(rename = "__snoID__")]
    sno_id: u32,
    #[serde(rename = "arAttributes", default)]
    attributes: Vec<RawAffAttribute>,
}

#[derive(Deserialize)]
struct RawAffAttribute {
    #[serde(rename = "szFormula", default)]
    formula: Option<String>,
    #[serde(rename = "nValue", default)]
    value: Option<serde_json::Number>,
}

impl RawAffAttribute {
    fn into_value(self) -> Option<String> {
        self.formula
            .filter(|f| !f.trim().is_empty())
            .or_else(|| self.value.map(|v| v.to_string()))
    }
}

/// An item affix: the formula (or constant) of each attribute it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffFile {
    pub sno_id: u32,
    pub name: String,
    pub values: Vec<String>,
}

impl AffFile {
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let raw: RawAff = serde_json::from_str(json)?;
        Ok(Self::from_raw(name.into(), raw))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw: RawAff = read_json(path)?;
        Ok(Self::from_raw(asset_name(FileKind::Affix, path), raw))
    }

    fn from_raw(name: String, raw: RawAff) -> Self {
        Self {
            sno_id: raw.sno_id,
            name,
            values: raw
                .attributes
                .into_iter()
                .filter_map(RawAffAttribute::into_value)
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Skill kits
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawSkl {
    #[serde(rename = "__snoID__")]
    sno_id: u32,
    #[serde(rename = "arNodes", default)]
    nodes: Vec<RawSklNode>,
}

#[derive(Deserialize)]
struct RawSklNode {
    #[serde(rename = "snoPower", default)]
    power: Option<SnoRef>,
    #[serde(rename = "snoReward", default)]
    reward: Option<SnoRef>,
}

/// A class skill tree: the powers its nodes grant, in node order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SklFile {
    pub sno_id: u32,
    pub name: String,
    pub powers: Vec<u32>,
}

impl SklFile {
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let raw: RawSkl = serde_json::from_str(json)?;
        Ok(Self::from_raw(name.into(), raw))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw: RawSkl = read_json(path)?;
        Ok(Self::from_raw(asset_name(FileKind::SkillKit, path), raw))
    }

    fn from_raw(name: String, raw: RawSkl) -> Self {
        let powers = raw
            .nodes
            .into_iter()
            .filter_map(|node| {
                node.power
                    .and_then(SnoRef::id)
                    .or_else(|| node.reward.and_then(SnoRef::id))
            })
            .collect();
        Self {
            sno_id: raw.sno_id,
            name,
            powers,
        }
    }
}

// ---------------------------------------------------------------------------
// Powers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawPow {
    #[serde(rename = "__snoID__")]
    sno_id: u32,
}

/// A power definition. Only the id to asset-name mapping is kept; display
/// names live in the matching `Power_<name>` string list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowFile {
    pub sno_id: u32,
    pub name: String,
}

impl PowFile {
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let raw: RawPow = serde_json::from_str(json)?;
        Ok(Self {
            sno_id: raw.sno_id,
            name: name.into(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw: RawPow = read_json(path)?;
        Ok(Self {
            sno_id: raw.sno_id,
            name: asset_name(FileKind::Power, path),
        })
    }

    /// Name of the string list holding this power's display strings.
    pub fn string_list_name(&self) -> String {
        format!("Power_{}", self.name)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn asset_name(kind: FileKind, path: &Path) -> String {
    kind.asset_name(path)
        .unwrap_or_else(|| path.display().to_string())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).map_err(|source| MinerError::OpenFile {
        path: PathBuf::from(path),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| MinerError::ParseFile {
        path: PathBuf::from(path),
        source,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn classifies_by_double_extension() {
        assert_eq!(
            FileKind::from_path(Path::new("json/enUS_Text/Power_Bash.stl.json")),
            Some(FileKind::StringList)
        );
        assert_eq!(
            FileKind::from_path(Path::new("Barbarian.skl.json")),
            Some(FileKind::SkillKit)
        );
        assert_eq!(FileKind::from_path(Path::new("notes.json")), None);
        assert_eq!(FileKind::from_path(Path::new(".pow.json")), Some(FileKind::Power));
        assert_eq!(FileKind::Power.asset_name(Path::new(".pow.json")), None);
    }

    #[test]
    fn string_list_maps_labels_to_text() {
        let stl = StlFile::from_json(
            "Power_Barbarian_Bash",
            r#"{"__snoID__": 9, "arStrings": [
                {"szLabel": "name", "szText": "Bash"},
                {"szLabel": "desc", "szText": "Bash the enemy."}
            ]}"#,
        )
        .unwrap();
        assert_eq!(stl.get("name"), Some("Bash"));
        assert_eq!(stl.get("desc"), Some("Bash the enemy."));
        assert_eq!(stl.get("missing"), None);
    }

    #[test]
    fn affix_prefers_formula_over_constant() {
        let aff = AffFile::from_json(
            "CritChance",
            r#"{"__snoID__": 1001, "arAttributes": [
                {"szFormula": "Affix_Value_1 * 100", "nValue": 3},
                {"szFormula": "", "nValue": 12},
                {"nValue": 0.5},
                {}
            ]}"#,
        )
        .unwrap();
        assert_eq!(aff.sno_id, 1001);
        assert_eq!(aff.values, vec!["Affix_Value_1 * 100", "12", "0.5"]);
    }

    #[test]
    fn skill_kit_falls_back_to_reward() {
        let skl = SklFile::from_json(
            "Barbarian",
            r#"{"__snoID__": 7, "arNodes": [
                {"snoPower": 200765},
                {"snoPower": -1, "snoReward": {"__raw__": 301, "name": "Reward"}},
                {"snoPower": {"__raw__": 302}},
                {"snoPower": 0}
            ]}"#,
        )
        .unwrap();
        assert_eq!(skl.powers, vec![200765, 301, 302]);
    }

    #[test]
    fn power_links_to_its_string_list() {
        let pow = PowFile::from_json("Barbarian_Bash", r#"{"__snoID__": 200765}"#).unwrap();
        assert_eq!(pow.string_list_name(), "Power_Barbarian_Bash");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert_matches!(PowFile::from_json("x", "{"), Err(MinerError::Json(_)));
        assert_matches!(
            PowFile::from_json("x", r#"{"other": 1}"#),
            Err(MinerError::Json(_))
        );
    }

    #[test]
    fn missing_file_is_open_error() {
        assert_matches!(
            StlFile::from_path(Path::new("/nonexistent/d4log/x.stl.json")),
            Err(MinerError::OpenFile { .. })
        );
    }
}
