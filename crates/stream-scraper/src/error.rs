//! Errors raised on the static scraping path.
//!
//! Soft misses (no links, nothing resolved) are not errors; these variants
//! cover failures to reach or understand the upstream at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status
    #[error("upstream returned {status} for {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// The body could not be read or did not have the expected structure
    #[error("unexpected response from {url}: {reason}")]
    UnexpectedShape { url: String, reason: String },

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    /// The upstream knew the episode but its page could not be fetched
    #[error("failed to fetch episode page: {0}")]
    EpisodePage(#[source] Box<ScrapeError>),
}

impl ScrapeError {
    /// Whether the upstream reported the resource as missing
    ///
    /// A missing episode page is not a missing episode.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScrapeError::Status { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_carries_upstream_text() {
        let err = ScrapeError::Status {
            url: "https://api.example/episode/x".to_string(),
            status: 502,
            message: "bad gateway".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("502"));
        assert!(text.contains("bad gateway"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found() {
        let err = ScrapeError::Status {
            url: "u".to_string(),
            status: 404,
            message: String::new(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn test_missing_episode_page_is_not_not_found() {
        let err = ScrapeError::EpisodePage(Box::new(ScrapeError::Status {
            url: "https://anime.example/episode/x/".to_string(),
            status: 404,
            message: "page removed".to_string(),
        }));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("page removed"));
    }
}
