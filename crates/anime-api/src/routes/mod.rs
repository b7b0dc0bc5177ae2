//! HTTP routes.
//!
//! Every response uses the same envelope: `{"status": "success", ...payload}`
//! on success and `{"status": "error", "message", "error"?}` on failure.

pub mod anime;
pub mod health;
pub mod history;
pub mod videos;

use crate::rate_limiter::limit_requests;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Success envelope around a payload whose fields sit next to `status`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    status: &'static str,
    #[serde(flatten)]
    payload: T,
}

pub fn success<T: Serialize>(payload: T) -> Json<Success<T>> {
    Json(Success {
        status: "success",
        payload,
    })
}

/// Reject empty path or body values
pub(crate) fn required<'a>(value: &'a str, name: &str) -> crate::error::AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(crate::error::AppError::bad_request(format!("{name} is required")))
    } else {
        Ok(value)
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/anime/{slug}", get(anime::anime))
        .route("/episode/{slug}", get(anime::episode))
        .route("/search", get(anime::search))
        .route("/videos/{slug}", get(videos::videos))
        .route("/resolve", post(videos::resolve))
        .route("/stream", post(videos::stream))
        .route("/gateway", post(videos::gateway))
        .route("/history", post(history::save))
        .route(
            "/history/{device_id}",
            get(history::list).delete(history::clear),
        )
        .route("/history/{device_id}/{anime_slug}", delete(history::delete))
        .route(
            "/history/{device_id}/{anime_slug}/{episode_slug}",
            get(history::get),
        )
        .layer(middleware::from_fn_with_state(state.clone(), limit_requests));

    let mut router = Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http());

    if state.config.server.cors_allow_any {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use shared::{Config, Database, HistoryStore};
    use tower::ServiceExt;

    /// State with headless disabled, rate limiting off, in-memory history
    pub fn state(upstream_base: &str) -> AppState {
        let mut config = Config::default();
        config.upstream.base_url = upstream_base.to_string();
        config.upstream.timeout_secs = 5;
        config.scraper.timeout_secs = 5;
        config.headless.enabled = false;
        config.rate_limit.enabled = false;

        let history = HistoryStore::new(Database::open_in_memory().unwrap());
        AppState::new(config, history).unwrap()
    }

    pub async fn send(
        state: AppState,
        request: Request<Body>,
    ) -> (StatusCode, serde_json::Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }
}
