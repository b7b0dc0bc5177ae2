//! Per-device watch history.

use super::{required, success, Success};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use anyhow::anyhow;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{HistoryEntry, HistoryStore, NewHistoryEntry};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Saved {
    id: i64,
}

#[derive(Debug, Serialize)]
pub struct History {
    count: usize,
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct Entry {
    entry: HistoryEntry,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    deleted: usize,
}

/// Run a store operation off the async runtime
async fn with_store<T, F>(state: &AppState, op: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut HistoryStore) -> anyhow::Result<T> + Send + 'static,
{
    let history = state.history.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut store = history
            .lock()
            .map_err(|_| anyhow!("History store lock poisoned"))?;
        op(&mut store)
    })
    .await
    .map_err(|e| anyhow!("History task failed: {e}"))?;

    Ok(outcome?)
}

/// `POST /api/history`
pub async fn save(
    State(state): State<AppState>,
    body: Result<Json<NewHistoryEntry>, JsonRejection>,
) -> AppResult<Json<Success<Saved>>> {
    let Json(mut entry) = body?;
    entry.validate().map_err(AppError::bad_request)?;

    entry.device_id = entry.device_id.trim().to_string();
    entry.anime_slug = entry.anime_slug.trim().to_string();
    entry.episode_slug = entry.episode_slug.trim().to_string();

    let id = with_store(&state, move |store| store.save(&entry)).await?;
    Ok(success(Saved { id }))
}

/// `GET /api/history/{device_id}?limit=`
pub async fn list(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<Json<Success<History>>> {
    let Query(params) = params?;
    let device_id = required(&device_id, "deviceId")?.to_string();
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let history = with_store(&state, move |store| store.list(&device_id, limit)).await?;
    Ok(success(History {
        count: history.len(),
        history,
    }))
}

/// `GET /api/history/{device_id}/{anime_slug}/{episode_slug}`
pub async fn get(
    State(state): State<AppState>,
    Path((device_id, anime_slug, episode_slug)): Path<(String, String, String)>,
) -> AppResult<Json<Success<Entry>>> {
    let device_id = required(&device_id, "deviceId")?.to_string();
    let anime_slug = required(&anime_slug, "animeSlug")?.to_string();
    let episode_slug = required(&episode_slug, "episodeSlug")?.to_string();

    let entry = with_store(&state, move |store| {
        store.get(&device_id, &anime_slug, &episode_slug)
    })
    .await?
    .ok_or_else(|| AppError::not_found("No history for this episode"))?;

    Ok(success(Entry { entry }))
}

/// `DELETE /api/history/{device_id}/{anime_slug}`
pub async fn delete(
    State(state): State<AppState>,
    Path((device_id, anime_slug)): Path<(String, String)>,
) -> AppResult<Json<Success<Deleted>>> {
    let device_id = required(&device_id, "deviceId")?.to_string();
    let anime_slug = required(&anime_slug, "animeSlug")?.to_string();

    let deleted = with_store(&state, move |store| store.delete(&device_id, &anime_slug)).await?;
    Ok(success(Deleted { deleted }))
}

/// `DELETE /api/history/{device_id}`
pub async fn clear(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> AppResult<Json<Success<Deleted>>> {
    let device_id = required(&device_id, "deviceId")?.to_string();

    let deleted = with_store(&state, move |store| store.clear(&device_id)).await?;
    Ok(success(Deleted { deleted }))
}
