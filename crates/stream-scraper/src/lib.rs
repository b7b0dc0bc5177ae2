//! Stream link scraping library.
//!
//! This library provides the static scraping path (upstream metadata API,
//! episode page link extraction, embed page resolution) and a headless
//! browser fallback for pages that only reveal their media to JavaScript.

pub mod api;
pub mod embed;
pub mod episode;
pub mod error;
pub mod fetch;
pub mod headless;
pub mod links;

pub use api::{EpisodeDetail, UpstreamClient};
pub use embed::{find_direct_stream, EmbedResolver};
pub use episode::{EpisodeLinks, EpisodeScraper};
pub use error::ScrapeError;
pub use fetch::PageFetcher;
pub use headless::{BrowserSession, ExtractionResult, HeadlessExtractor, StreamKind};
pub use links::{dedup_by_url, extract_links, LinkType, VideoLink};
