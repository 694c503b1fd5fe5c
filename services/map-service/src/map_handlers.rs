use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::map::{CodeReveal, Map, MapChanges, MapView, NewMap};
use crate::metrics::MAP_CODE_REVEALS;
use crate::repo::MapQuery;
use crate::validation::validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub tag: Option<String>,
    pub limit: Option<i64>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request("invalid_body", rejection.body_text()))
}

async fn load(state: &AppState, slug: &str) -> ApiResult<Map> {
    state
        .repo
        .find(slug)
        .await?
        .ok_or_else(|| ApiError::not_found("map_not_found"))
}

async fn load_owned(state: &AppState, slug: &str, ctx: &AuthContext) -> ApiResult<Map> {
    let map = load(state, slug).await?;
    if !map.is_owned_by(ctx.subject()) {
        debug!(slug, subject = ctx.subject(), "caller does not own map");
        return Err(ApiError::Forbidden { code: "not_map_owner" });
    }
    Ok(map)
}

pub async fn list_maps(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<MapView>>> {
    let Query(params) = params
        .map_err(|rejection| ApiError::bad_request("invalid_query", rejection.body_text()))?;
    let query = MapQuery {
        tag: params.tag.filter(|tag| !tag.is_empty()),
        limit: params.limit,
    };
    let maps = state.repo.list(&query).await?;
    Ok(Json(maps.into_iter().map(MapView::from).collect()))
}

pub async fn get_map(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<MapView>> {
    let map = load(&state, &slug).await?;
    Ok(Json(map.into()))
}

pub async fn create_map(
    State(state): State<AppState>,
    ctx: AuthContext,
    payload: Result<Json<NewMap>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MapView>)> {
    let draft = body(payload)?.into_draft(ctx.principal());
    let valid = validate(draft)?;
    let map = valid.into_new_map(ctx.subject(), Utc::now());
    let stored = state.repo.insert(map).await?;
    info!(slug = %stored.slug, owner = %stored.owner_subject, "map created");
    Ok((StatusCode::CREATED, Json(stored.into())))
}

pub async fn update_map(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(slug): Path<String>,
    payload: Result<Json<MapChanges>, JsonRejection>,
) -> ApiResult<Json<MapView>> {
    let changes = body(payload)?;
    let existing = load_owned(&state, &slug, &ctx).await?;

    let mut draft = existing.to_draft();
    changes.apply(&mut draft);
    let updated = validate(draft)?.apply_to(&existing, Utc::now());

    let stored = state.repo.update(&updated).await?;
    info!(slug = %stored.slug, "map updated");
    Ok(Json(stored.into()))
}

pub async fn delete_map(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    load_owned(&state, &slug, &ctx).await?;
    if !state.repo.delete(&slug).await? {
        return Err(ApiError::not_found("map_not_found"));
    }
    info!(slug = %slug, "map deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reveal_code(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<CodeReveal>> {
    let revealed = state
        .repo
        .reveal(&slug, Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("map_not_found"))?;
    MAP_CODE_REVEALS.inc();
    debug!(slug = %revealed.slug, count = revealed.code_reveal_count, "map code revealed");
    Ok(Json(revealed))
}
