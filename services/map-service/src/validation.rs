use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, FieldError};
use thiserror::Error;
use url::Url;

use crate::map::{Map, MapDraft};

pub const SLUG_MAX: usize = 180;
pub const TITLE_MAX: usize = 120;
pub const CODE_MAX: usize = 32;
pub const AUTHOR_NAME_MAX: usize = 80;

pub const GAME_TIME_MINUTES: RangeInclusive<i64> = 10..=60;
pub const GLOBAL_DAMAGE_MULTIPLIER: RangeInclusive<i64> = 10..=500;
pub const HUMAN_PLAYERS: RangeInclusive<i64> = 1..=32;
pub const SQUAD_SIZE: RangeInclusive<i64> = 1..=4;

/// Every field a draft violates, in field order.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{} invalid field(s)", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|err| err.field.as_str())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::validation(errors.0)
    }
}

/// A draft that passed [`validate`]; the only way to build a [`Map`].
#[derive(Debug, Clone)]
pub struct ValidDraft(MapDraft);

impl ValidDraft {
    pub fn slug(&self) -> &str {
        &self.0.slug
    }

    /// Record for first insertion: no reveals yet, both timestamps `now`.
    pub fn into_new_map(self, owner_subject: &str, now: DateTime<Utc>) -> Map {
        self.into_map(owner_subject.to_string(), 0, now, now)
    }

    /// `existing` with this draft's values and `updated_at` bumped to `now`.
    pub fn apply_to(self, existing: &Map, now: DateTime<Utc>) -> Map {
        let updated_at = now.max(existing.created_at);
        self.into_map(
            existing.owner_subject.clone(),
            existing.code_reveal_count,
            existing.created_at,
            updated_at,
        )
    }

    fn into_map(
        self,
        owner_subject: String,
        code_reveal_count: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Map {
        let d = self.0;
        // Ranges were checked in `validate`, so every value fits an i32.
        Map {
            slug: d.slug,
            title: d.title,
            code: d.code,
            author_name: d.author_name,
            screenshots: d.screenshots,
            game_time_minutes: d.game_time_minutes as i32,
            map_rotation: d.map_rotation,
            global_damage_multiplier: d.global_damage_multiplier as i32,
            human_players: d.human_players as i32,
            friendly_fire: d.friendly_fire,
            squad_revive: d.squad_revive,
            squad_size: d.squad_size as i32,
            tags: d.tags,
            code_reveal_count,
            owner_subject,
            created_at,
            updated_at,
        }
    }
}

#[derive(Default)]
struct Collector(Vec<FieldError>);

impl Collector {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    fn text(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().is_empty() {
            self.push(field, "must not be blank");
        } else if value.chars().count() > max {
            self.push(field, format!("must be at most {max} characters"));
        }
    }

    fn range(&mut self, field: &str, value: i64, range: RangeInclusive<i64>) {
        if !range.contains(&value) {
            self.push(
                field,
                format!("must be between {} and {}", range.start(), range.end()),
            );
        }
    }
}

fn is_slug_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn is_web_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Check a draft against the map invariants, reporting every violation.
pub fn validate(draft: MapDraft) -> Result<ValidDraft, ValidationErrors> {
    let mut errors = Collector::default();

    errors.text("slug", &draft.slug, SLUG_MAX);
    if !draft.slug.trim().is_empty()
        && draft.slug.chars().count() <= SLUG_MAX
        && !draft.slug.chars().all(is_slug_char)
    {
        errors.push("slug", "may only contain letters, digits, '-' and '_'");
    }
    errors.text("title", &draft.title, TITLE_MAX);
    errors.text("code", &draft.code, CODE_MAX);
    errors.text("author_name", &draft.author_name, AUTHOR_NAME_MAX);

    for (index, screenshot) in draft.screenshots.iter().enumerate() {
        if !is_web_url(screenshot) {
            errors.push(
                format!("screenshots[{index}]"),
                "must be an http or https URL",
            );
        }
    }

    errors.range("game_time_minutes", draft.game_time_minutes, GAME_TIME_MINUTES);
    errors.range(
        "global_damage_multiplier",
        draft.global_damage_multiplier,
        GLOBAL_DAMAGE_MULTIPLIER,
    );
    errors.range("human_players", draft.human_players, HUMAN_PLAYERS);
    errors.range("squad_size", draft.squad_size, SQUAD_SIZE);

    if errors.0.is_empty() {
        Ok(ValidDraft(draft))
    } else {
        Err(ValidationErrors(errors.0))
    }
}
