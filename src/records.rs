#![forbid(unsafe_code)]

//! Typed records produced at the provider boundary.
//!
//! These structs mirror how payloads are serialized into the cache file, so a
//! record read back from the cache is identical to the one that was fetched.
//! Counts default to zero when the API omits them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single uploaded video as reported by the videos endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    /// Length in seconds.
    #[serde(default)]
    pub duration_secs: u64,
    pub upload_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl VideoRecord {
    pub fn duration_minutes(&self) -> f64 {
        self.duration_secs as f64 / 60.0
    }
}

/// Channel statistics used by the competition and potential scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default)]
    pub subscriber_count: u64,
    #[serde(default)]
    pub video_count: u64,
    /// Missing for channels whose snippet was not returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Channels can hide their subscriber count; the API then reports none.
    #[serde(default)]
    pub hidden_subscribers: bool,
}

/// Entry of a related-videos lookup. Only carries what the search endpoint
/// returns in its snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedVideo {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
}
