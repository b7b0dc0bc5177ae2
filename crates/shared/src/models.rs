//! Data models for the watch-history store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved playback position for one episode on one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub device_id: String,
    pub anime_slug: String,
    pub episode_slug: String,
    pub title: Option<String>,

    // Playback
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Fraction watched, when the duration is known
    pub fn progress(&self) -> Option<f64> {
        match self.duration_seconds {
            Some(d) if d > 0.0 => Some((self.position_seconds / d).clamp(0.0, 1.0)),
            _ => None,
        }
    }
}

/// Position update to be saved
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    pub device_id: String,
    pub anime_slug: String,
    pub episode_slug: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub position_seconds: f64,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

impl NewHistoryEntry {
    /// Check required fields, returning a message describing the first problem
    pub fn validate(&self) -> Result<(), String> {
        if self.device_id.trim().is_empty() {
            return Err("deviceId is required".to_string());
        }
        if self.anime_slug.trim().is_empty() {
            return Err("animeSlug is required".to_string());
        }
        if self.episode_slug.trim().is_empty() {
            return Err("episodeSlug is required".to_string());
        }
        if !self.position_seconds.is_finite() || self.position_seconds < 0.0 {
            return Err("positionSeconds must be a non-negative number".to_string());
        }
        if let Some(d) = self.duration_seconds {
            if !d.is_finite() || d < 0.0 {
                return Err("durationSeconds must be a non-negative number".to_string());
            }
        }
        Ok(())
    }
}
