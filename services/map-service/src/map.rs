use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod defaults {
    pub const GAME_TIME_MINUTES: i64 = 10;
    pub const GLOBAL_DAMAGE_MULTIPLIER: i64 = 100;
    pub const HUMAN_PLAYERS: i64 = 32;
    pub const FRIENDLY_FIRE: bool = false;
    pub const SQUAD_REVIVE: bool = true;
    pub const SQUAD_SIZE: i64 = 4;

    pub(crate) fn game_time_minutes() -> i64 {
        GAME_TIME_MINUTES
    }
    pub(crate) fn global_damage_multiplier() -> i64 {
        GLOBAL_DAMAGE_MULTIPLIER
    }
    pub(crate) fn human_players() -> i64 {
        HUMAN_PLAYERS
    }
    pub(crate) fn squad_revive() -> bool {
        SQUAD_REVIVE
    }
    pub(crate) fn squad_size() -> i64 {
        SQUAD_SIZE
    }
}

/// A published map configuration as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    pub slug: String,
    pub title: String,
    /// Access code; only ever returned by the reveal action.
    pub code: String,
    pub author_name: String,
    pub screenshots: Vec<String>,
    pub game_time_minutes: i32,
    pub map_rotation: Vec<String>,
    /// Percent.
    pub global_damage_multiplier: i32,
    pub human_players: i32,
    pub friendly_fire: bool,
    pub squad_revive: bool,
    pub squad_size: i32,
    pub tags: Vec<String>,
    pub code_reveal_count: i64,
    pub owner_subject: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Map {
    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.owner_subject == subject
    }

    /// Editable state of this record, for merging a partial update.
    pub fn to_draft(&self) -> MapDraft {
        MapDraft {
            slug: self.slug.clone(),
            title: self.title.clone(),
            code: self.code.clone(),
            author_name: self.author_name.clone(),
            screenshots: self.screenshots.clone(),
            game_time_minutes: self.game_time_minutes.into(),
            map_rotation: self.map_rotation.clone(),
            global_damage_multiplier: self.global_damage_multiplier.into(),
            human_players: self.human_players.into(),
            friendly_fire: self.friendly_fire,
            squad_revive: self.squad_revive,
            squad_size: self.squad_size.into(),
            tags: self.tags.clone(),
        }
    }
}

/// Candidate values for every client-controlled field, before validation.
///
/// Integers stay 64-bit here so out-of-range input reaches the validator
/// instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDraft {
    pub slug: String,
    pub title: String,
    pub code: String,
    pub author_name: String,
    pub screenshots: Vec<String>,
    pub game_time_minutes: i64,
    pub map_rotation: Vec<String>,
    pub global_damage_multiplier: i64,
    pub human_players: i64,
    pub friendly_fire: bool,
    pub squad_revive: bool,
    pub squad_size: i64,
    pub tags: Vec<String>,
}

/// Body of `POST /api/maps`.
///
/// Required strings default to empty so a missing field is reported by the
/// validator alongside every other violation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMap {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default = "defaults::game_time_minutes")]
    pub game_time_minutes: i64,
    #[serde(default)]
    pub map_rotation: Vec<String>,
    #[serde(default = "defaults::global_damage_multiplier")]
    pub global_damage_multiplier: i64,
    #[serde(default = "defaults::human_players")]
    pub human_players: i64,
    #[serde(default)]
    pub friendly_fire: bool,
    #[serde(default = "defaults::squad_revive")]
    pub squad_revive: bool,
    #[serde(default = "defaults::squad_size")]
    pub squad_size: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewMap {
    /// `author_fallback` is used when the body names no author.
    pub fn into_draft(self, author_fallback: &str) -> MapDraft {
        MapDraft {
            slug: self.slug,
            title: self.title,
            code: self.code,
            author_name: self
                .author_name
                .unwrap_or_else(|| author_fallback.to_string()),
            screenshots: self.screenshots,
            game_time_minutes: self.game_time_minutes,
            map_rotation: self.map_rotation,
            global_damage_multiplier: self.global_damage_multiplier,
            human_players: self.human_players,
            friendly_fire: self.friendly_fire,
            squad_revive: self.squad_revive,
            squad_size: self.squad_size,
            tags: self.tags,
        }
    }
}

/// Body of `PUT /api/maps/{slug}`: absent fields keep their stored value.
/// The slug is not part of it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapChanges {
    pub title: Option<String>,
    pub code: Option<String>,
    pub author_name: Option<String>,
    pub screenshots: Option<Vec<String>>,
    pub game_time_minutes: Option<i64>,
    pub map_rotation: Option<Vec<String>>,
    pub global_damage_multiplier: Option<i64>,
    pub human_players: Option<i64>,
    pub friendly_fire: Option<bool>,
    pub squad_revive: Option<bool>,
    pub squad_size: Option<i64>,
    pub tags: Option<Vec<String>>,
}

impl MapChanges {
    pub fn apply(self, draft: &mut MapDraft) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut draft.title, self.title);
        set(&mut draft.code, self.code);
        set(&mut draft.author_name, self.author_name);
        set(&mut draft.screenshots, self.screenshots);
        set(&mut draft.game_time_minutes, self.game_time_minutes);
        set(&mut draft.map_rotation, self.map_rotation);
        set(
            &mut draft.global_damage_multiplier,
            self.global_damage_multiplier,
        );
        set(&mut draft.human_players, self.human_players);
        set(&mut draft.friendly_fire, self.friendly_fire);
        set(&mut draft.squad_revive, self.squad_revive);
        set(&mut draft.squad_size, self.squad_size);
        set(&mut draft.tags, self.tags);
    }
}

/// What readers see of a map: everything except the access code and owner.
#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub slug: String,
    pub title: String,
    pub author_name: String,
    pub screenshots: Vec<String>,
    pub game_time_minutes: i32,
    pub map_rotation: Vec<String>,
    pub global_damage_multiplier: i32,
    pub human_players: i32,
    pub friendly_fire: bool,
    pub squad_revive: bool,
    pub squad_size: i32,
    pub tags: Vec<String>,
    pub code_reveal_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Map> for MapView {
    fn from(map: Map) -> Self {
        Self {
            slug: map.slug,
            title: map.title,
            author_name: map.author_name,
            screenshots: map.screenshots,
            game_time_minutes: map.game_time_minutes,
            map_rotation: map.map_rotation,
            global_damage_multiplier: map.global_damage_multiplier,
            human_players: map.human_players,
            friendly_fire: map.friendly_fire,
            squad_revive: map.squad_revive,
            squad_size: map.squad_size,
            tags: map.tags,
            code_reveal_count: map.code_reveal_count,
            created_at: map.created_at,
            updated_at: map.updated_at,
        }
    }
}

/// Result of disclosing a map's access code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeReveal {
    pub slug: String,
    pub code: String,
    pub code_reveal_count: i64,
}
