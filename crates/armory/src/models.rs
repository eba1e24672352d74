//! Response models for the armory API.
//!
//! The API mixes camelCase and snake_case keys between endpoints, and
//! reports times either as RFC 3339 strings or as Unix timestamps, so the
//! models accept both.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Not part of the response body; filled in from the request.
    #[serde(default)]
    pub account_id: u64,
    #[serde(default, alias = "dungeonsCompleted")]
    pub dungeons_completed: u64,
    #[serde(default, alias = "playersKilled")]
    pub players_killed: u64,
    #[serde(default, alias = "clanId")]
    pub clan_id: Option<String>,
    #[serde(default, alias = "clanTag")]
    pub clan_tag: Option<String>,
    #[serde(default)]
    pub twitch: Option<String>,
    #[serde(default)]
    pub characters: Vec<Character>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub id: String,
    pub class: String,
    pub level: u32,
    #[serde(
        default,
        alias = "lastUpdate",
        deserialize_with = "flexible_time::deserialize_option"
    )]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hardcore: bool,
    #[serde(default)]
    pub seasonal: bool,
    #[serde(default)]
    pub dead: bool,
}

// ---------------------------------------------------------------------------
// Hero
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hero {
    pub name: String,
    pub class: String,
    pub level: u32,
    #[serde(default, alias = "secondsPlayed", alias = "playTime")]
    pub play_time_secs: u64,
    #[serde(
        default,
        alias = "lastLogin",
        alias = "lastTimePlayed",
        deserialize_with = "flexible_time::deserialize_option"
    )]
    pub last_time_played: Option<DateTime<Utc>>,
    #[serde(default, alias = "monstersKilled")]
    pub monsters_killed: u64,
    #[serde(default, alias = "elitesKilled")]
    pub elites_killed: u64,
    #[serde(default, alias = "goldCollected")]
    pub gold_collected: u64,
    #[serde(default)]
    pub power: u32,
    #[serde(default, alias = "worldTier")]
    pub world_tier: Option<WorldTier>,
    #[serde(default)]
    pub equipment: Vec<HeroItem>,
}

impl Hero {
    pub fn play_time(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.play_time_secs).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroItem {
    pub name: String,
    #[serde(default, alias = "itemType")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub power: u32,
    #[serde(default)]
    pub upgrades: u32,
    #[serde(default)]
    pub affixes: Vec<String>,
}

/// Difficulty tier, 1 (Adventurer) through 4 (Torment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct WorldTier(u32);

#[derive(Debug, thiserror::Error)]
#[error("World tier must be between 1 and 4, got {0}")]
pub struct InvalidWorldTier(pub u32);

impl WorldTier {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 4;

    pub fn new(tier: u32) -> Result<Self, InvalidWorldTier> {
        if (Self::MIN..=Self::MAX).contains(&tier) {
            Ok(Self(tier))
        } else {
            Err(InvalidWorldTier(tier))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for WorldTier {
    type Error = InvalidWorldTier;

    fn try_from(tier: u32) -> Result<Self, Self::Error> {
        Self::new(tier)
    }
}

impl From<WorldTier> for u32 {
    fn from(tier: WorldTier) -> Self {
        tier.0
    }
}

// ---------------------------------------------------------------------------
// World events
// ---------------------------------------------------------------------------

/// Latest and upcoming world events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentEvents {
    #[serde(default)]
    pub boss: Option<BossEvent>,
    #[serde(default)]
    pub helltide: Option<WorldEvent>,
    #[serde(default)]
    pub legion: Option<WorldEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossEvent {
    pub name: String,
    #[serde(default, alias = "expectedName")]
    pub expected_name: Option<String>,
    #[serde(default, alias = "nextExpectedName")]
    pub next_expected_name: Option<String>,
    #[serde(flatten)]
    pub schedule: WorldEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    /// When the event last started.
    #[serde(default, deserialize_with = "flexible_time::deserialize_option")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_time::deserialize_option")]
    pub expected: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "nextExpected",
        deserialize_with = "flexible_time::deserialize_option"
    )]
    pub next_expected: Option<DateTime<Utc>>,
    #[serde(default)]
    pub territory: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

mod flexible_time {
    use super::*;

    /// Unix timestamps above this are taken to be milliseconds.
    const MILLIS_THRESHOLD: i64 = 100_000_000_000;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<Raw> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(Raw::Number(0)) => Ok(None),
            Some(Raw::Number(n)) => {
                let parsed = if n.abs() >= MILLIS_THRESHOLD {
                    Utc.timestamp_millis_opt(n).single()
                } else {
                    Utc.timestamp_opt(n, 0).single()
                };
                parsed
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("timestamp {n} out of range")))
            }
            Some(Raw::Text(s)) if s.is_empty() => Ok(None),
            Some(Raw::Text(s)) => DateTime::parse_from_rfc3339(&s)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_tier_bounds() {
        assert!(WorldTier::new(0).is_err());
        assert_eq!(WorldTier::new(1).unwrap().get(), 1);
        assert_eq!(WorldTier::new(4).unwrap().get(), 4);
        assert_eq!(
            WorldTier::new(5).unwrap_err().to_string(),
            "World tier must be between 1 and 4, got 5"
        );
    }

    #[test]
    fn world_tier_validates_when_deserializing() {
        assert_eq!(serde_json::from_str::<WorldTier>("3").unwrap().get(), 3);
        assert!(serde_json::from_str::<WorldTier>("7").is_err());
        assert_eq!(serde_json::to_string(&WorldTier::new(2).unwrap()).unwrap(), "2");
    }

    #[test]
    fn times_accept_strings_seconds_and_millis() {
        let event: WorldEvent = serde_json::from_str(
            r#"{"timestamp": 1690000000, "expected": 1690000000000,
                "nextExpected": "2023-07-22T04:26:40Z"}"#,
        )
        .unwrap();
        let expected = Utc.timestamp_opt(1_690_000_000, 0).unwrap();
        assert_eq!(event.timestamp, Some(expected));
        assert_eq!(event.expected, Some(expected));
        assert_eq!(event.next_expected, Some(expected));
    }

    #[test]
    fn zero_and_null_times_are_absent() {
        let event: WorldEvent =
            serde_json::from_str(r#"{"timestamp": 0, "expected": null, "nextExpected": ""}"#).unwrap();
        assert_eq!(event, WorldEvent::default());
    }

    #[test]
    fn play_time_is_duration() {
        let hero: Hero = serde_json::from_str(
            r#"{"name": "Lilith", "class": "Sorcerer", "level": 50, "secondsPlayed": 3600}"#,
        )
        .unwrap();
        assert_eq!(hero.play_time(), chrono::Duration::hours(1));
        assert!(hero.world_tier.is_none());
    }
}
