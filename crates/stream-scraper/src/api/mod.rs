//! Upstream metadata API client implementation.
//!
//! The upstream is a JSON API over the anime site; it provides anime and
//! episode metadata, including the episode page that holds the video links.

pub mod client;
pub mod types;

pub use client::UpstreamClient;
pub use types::*;
