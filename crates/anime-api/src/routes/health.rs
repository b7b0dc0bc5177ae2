use super::{success, Success};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
    service: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<Success<Health>> {
    success(Health {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
