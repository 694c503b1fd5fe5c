use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::error;

use crate::map::{CodeReveal, Map};

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("slug '{0}' is already taken")]
    SlugTaken(String),
    #[error("map '{0}' not found")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::SlugTaken(slug) => ApiError::Conflict {
                code: "slug_taken",
                message: Some(format!("slug '{slug}' is already taken")),
            },
            RepoError::NotFound(_) => ApiError::not_found("map_not_found"),
            RepoError::Database(err) => {
                error!(error = %err, "map repository failure");
                ApiError::internal(err)
            }
        }
    }
}

/// Listing filter; `limit` is clamped to `1..=MAX_LIST_LIMIT`.
#[derive(Debug, Clone, Default)]
pub struct MapQuery {
    pub tag: Option<String>,
    pub limit: Option<i64>,
}

impl MapQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// Map persistence. Each call is atomic for the record it touches.
#[async_trait]
pub trait MapRepository: Send + Sync {
    /// Fails with [`RepoError::SlugTaken`] when the slug exists.
    async fn insert(&self, map: Map) -> RepoResult<Map>;

    async fn find(&self, slug: &str) -> RepoResult<Option<Map>>;

    /// Newest first.
    async fn list(&self, query: &MapQuery) -> RepoResult<Vec<Map>>;

    /// Overwrite the editable fields and `updated_at` of the record with
    /// `map.slug`. Slug, owner, creation time and reveal counter are never
    /// written here, so a concurrent reveal is not lost.
    async fn update(&self, map: &Map) -> RepoResult<Map>;

    /// `false` when no record had that slug.
    async fn delete(&self, slug: &str) -> RepoResult<bool>;

    /// Increment the reveal counter and bump `updated_at`; `None` when absent.
    async fn reveal(&self, slug: &str, at: DateTime<Utc>) -> RepoResult<Option<CodeReveal>>;
}

// ---------------- Postgres Implementation ----------------

#[derive(FromRow)]
struct MapRow {
    slug: String,
    title: String,
    code: String,
    author_name: String,
    screenshots: Json<Vec<String>>,
    game_time_minutes: i32,
    map_rotation: Json<Vec<String>>,
    global_damage_multiplier: i32,
    human_players: i32,
    friendly_fire: bool,
    squad_revive: bool,
    squad_size: i32,
    tags: Json<Vec<String>>,
    code_reveal_count: i64,
    owner_subject: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MapRow> for Map {
    fn from(row: MapRow) -> Self {
        Map {
            slug: row.slug,
            title: row.title,
            code: row.code,
            author_name: row.author_name,
            screenshots: row.screenshots.0,
            game_time_minutes: row.game_time_minutes,
            map_rotation: row.map_rotation.0,
            global_damage_multiplier: row.global_damage_multiplier,
            human_players: row.human_players,
            friendly_fire: row.friendly_fire,
            squad_revive: row.squad_revive,
            squad_size: row.squad_size,
            tags: row.tags.0,
            code_reveal_count: row.code_reveal_count,
            owner_subject: row.owner_subject,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct RevealRow {
    slug: String,
    code: String,
    code_reveal_count: i64,
}

const MAP_COLUMNS: &str = "slug, title, code, author_name, screenshots, game_time_minutes, \
     map_rotation, global_damage_multiplier, human_players, friendly_fire, squad_revive, \
     squad_size, tags, code_reveal_count, owner_subject, created_at, updated_at";

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[derive(Clone)]
pub struct PgMapRepository {
    db: PgPool,
}

impl PgMapRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }
}

#[async_trait]
impl MapRepository for PgMapRepository {
    async fn insert(&self, map: Map) -> RepoResult<Map> {
        let sql = format!(
            "INSERT INTO maps ({MAP_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {MAP_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MapRow>(&sql)
            .bind(&map.slug)
            .bind(&map.title)
            .bind(&map.code)
            .bind(&map.author_name)
            .bind(Json(&map.screenshots))
            .bind(map.game_time_minutes)
            .bind(Json(&map.map_rotation))
            .bind(map.global_damage_multiplier)
            .bind(map.human_players)
            .bind(map.friendly_fire)
            .bind(map.squad_revive)
            .bind(map.squad_size)
            .bind(Json(&map.tags))
            .bind(map.code_reveal_count)
            .bind(&map.owner_subject)
            .bind(map.created_at)
            .bind(map.updated_at)
            .fetch_one(&self.db)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    RepoError::SlugTaken(map.slug.clone())
                } else {
                    RepoError::Database(err)
                }
            })?;
        Ok(row.into())
    }

    async fn find(&self, slug: &str) -> RepoResult<Option<Map>> {
        let sql = format!("SELECT {MAP_COLUMNS} FROM maps WHERE slug = $1");
        let row = sqlx::query_as::<_, MapRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Map::from))
    }

    async fn list(&self, query: &MapQuery) -> RepoResult<Vec<Map>> {
        let sql = format!(
            "SELECT {MAP_COLUMNS} FROM maps \
             WHERE ($1::text IS NULL OR tags @> jsonb_build_array($1::text)) \
             ORDER BY created_at DESC, slug ASC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, MapRow>(&sql)
            .bind(query.tag.as_deref())
            .bind(query.effective_limit())
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Map::from).collect())
    }

    async fn update(&self, map: &Map) -> RepoResult<Map> {
        let sql = format!(
            "UPDATE maps SET title = $2, code = $3, author_name = $4, screenshots = $5, \
             game_time_minutes = $6, map_rotation = $7, global_damage_multiplier = $8, \
             human_players = $9, friendly_fire = $10, squad_revive = $11, squad_size = $12, \
             tags = $13, updated_at = GREATEST($14, created_at) \
             WHERE slug = $1 \
             RETURNING {MAP_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MapRow>(&sql)
            .bind(&map.slug)
            .bind(&map.title)
            .bind(&map.code)
            .bind(&map.author_name)
            .bind(Json(&map.screenshots))
            .bind(map.game_time_minutes)
            .bind(Json(&map.map_rotation))
            .bind(map.global_damage_multiplier)
            .bind(map.human_players)
            .bind(map.friendly_fire)
            .bind(map.squad_revive)
            .bind(map.squad_size)
            .bind(Json(&map.tags))
            .bind(map.updated_at)
            .fetch_optional(&self.db)
            .await?;
        row.map(Map::from)
            .ok_or_else(|| RepoError::NotFound(map.slug.clone()))
    }

    async fn delete(&self, slug: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM maps WHERE slug = $1")
            .bind(slug)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reveal(&self, slug: &str, at: DateTime<Utc>) -> RepoResult<Option<CodeReveal>> {
        let row = sqlx::query_as::<_, RevealRow>(
            "UPDATE maps SET code_reveal_count = code_reveal_count + 1, \
             updated_at = GREATEST($2, updated_at) \
             WHERE slug = $1 \
             RETURNING slug, code, code_reveal_count",
        )
        .bind(slug)
        .bind(at)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|row| CodeReveal {
            slug: row.slug,
            code: row.code,
            code_reveal_count: row.code_reveal_count,
        }))
    }
}

// ---------------- In-Memory Implementation ----------------

#[derive(Clone, Default)]
pub struct InMemoryMapRepository {
    inner: Arc<RwLock<HashMap<String, Map>>>,
}

impl InMemoryMapRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MapRepository for InMemoryMapRepository {
    async fn insert(&self, map: Map) -> RepoResult<Map> {
        let mut guard = self.inner.write().await;
        if guard.contains_key(&map.slug) {
            return Err(RepoError::SlugTaken(map.slug));
        }
        guard.insert(map.slug.clone(), map.clone());
        Ok(map)
    }

    async fn find(&self, slug: &str) -> RepoResult<Option<Map>> {
        Ok(self.inner.read().await.get(slug).cloned())
    }

    async fn list(&self, query: &MapQuery) -> RepoResult<Vec<Map>> {
        let guard = self.inner.read().await;
        let mut maps: Vec<Map> = guard
            .values()
            .filter(|map| match &query.tag {
                Some(tag) => map.tags.iter().any(|t| t == tag),
                None => true,
            })
            .cloned()
            .collect();
        maps.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        maps.truncate(query.effective_limit() as usize);
        Ok(maps)
    }

    async fn update(&self, map: &Map) -> RepoResult<Map> {
        let mut guard = self.inner.write().await;
        let stored = guard
            .get_mut(&map.slug)
            .ok_or_else(|| RepoError::NotFound(map.slug.clone()))?;
        stored.title = map.title.clone();
        stored.code = map.code.clone();
        stored.author_name = map.author_name.clone();
        stored.screenshots = map.screenshots.clone();
        stored.game_time_minutes = map.game_time_minutes;
        stored.map_rotation = map.map_rotation.clone();
        stored.global_damage_multiplier = map.global_damage_multiplier;
        stored.human_players = map.human_players;
        stored.friendly_fire = map.friendly_fire;
        stored.squad_revive = map.squad_revive;
        stored.squad_size = map.squad_size;
        stored.tags = map.tags.clone();
        stored.updated_at = map.updated_at.max(stored.created_at);
        Ok(stored.clone())
    }

    async fn delete(&self, slug: &str) -> RepoResult<bool> {
        Ok(self.inner.write().await.remove(slug).is_some())
    }

    async fn reveal(&self, slug: &str, at: DateTime<Utc>) -> RepoResult<Option<CodeReveal>> {
        let mut guard = self.inner.write().await;
        Ok(guard.get_mut(slug).map(|map| {
            map.code_reveal_count += 1;
            map.updated_at = map.updated_at.max(at);
            CodeReveal {
                slug: map.slug.clone(),
                code: map.code.clone(),
                code_reveal_count: map.code_reveal_count,
            }
        }))
    }
}
