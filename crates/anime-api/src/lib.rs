//! HTTP API over the stream scraper and the watch-history store.

pub mod error;
pub mod rate_limiter;
pub mod routes;
pub mod state;

pub use error::{AppError, AppResult};
pub use routes::router;
pub use state::AppState;
