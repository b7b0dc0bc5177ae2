//! Upstream metadata passthrough.

use super::{required, success, Success};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Data {
    data: Value,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

/// `GET /api/anime/{slug}`
pub async fn anime(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Success<Data>>> {
    let slug = required(&slug, "slug")?;
    let data = state
        .scraper
        .upstream()
        .anime(slug)
        .await
        .map_err(|e| AppError::upstream("Failed to fetch anime", e))?;
    Ok(success(Data { data }))
}

/// `GET /api/episode/{slug}`
pub async fn episode(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Success<Data>>> {
    let slug = required(&slug, "slug")?;
    let data = state
        .scraper
        .upstream()
        .episode(slug)
        .await
        .map_err(|e| AppError::upstream("Failed to fetch episode", e))?;
    Ok(success(Data { data }))
}

/// `GET /api/search?q=`
pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> AppResult<Json<Success<Data>>> {
    let Query(params) = params?;
    let query = required(&params.q, "q")?;
    let data = state
        .scraper
        .upstream()
        .search(query)
        .await
        .map_err(|e| AppError::upstream("Search failed", e))?;
    Ok(success(Data { data }))
}
