#![forbid(unsafe_code)]

//! The external YouTube collaborator.
//!
//! [`YouTubeApi`] names the only four outbound operations the pipeline needs.
//! [`DataApiClient`] implements them against the Data API v3 with a blocking
//! HTTP agent and normalizes the loosely typed JSON (counts arrive as strings,
//! durations as ISO-8601) into the records in [`crate::records`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    error::ProviderError,
    filter::DurationBucket,
    metrics::parse_iso8601_duration,
    records::{ChannelRecord, RelatedVideo, VideoRecord},
};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Largest page the search endpoint will return.
pub const MAX_PAGE_SIZE: usize = 50;

pub trait YouTubeApi {
    fn video(&self, video_id: &str) -> Result<VideoRecord, ProviderError>;

    fn channel(&self, channel_id: &str) -> Result<ChannelRecord, ProviderError>;

    fn related(&self, video_id: &str, max_results: usize)
    -> Result<Vec<RelatedVideo>, ProviderError>;

    /// Returns matching video ids in the order the API ranked them.
    fn search(
        &self,
        keyword: &str,
        duration: DurationBucket,
        max_results: usize,
    ) -> Result<Vec<String>, ProviderError>;
}

/// Blocking client for the YouTube Data API v3 authenticated by API key.
pub struct DataApiClient {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

impl DataApiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        debug!("GET {url} {params:?}");

        let mut request = self.agent.get(&url).query("key", &self.api_key);
        for (name, value) in params {
            request = request.query(name, value);
        }

        match request.call() {
            Ok(response) => response
                .into_json::<T>()
                .map_err(|err| ProviderError::Malformed(format!("{endpoint}: {err}"))),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(status_error(status, &body))
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(ProviderError::Network(transport.to_string()))
            }
        }
    }
}

impl YouTubeApi for DataApiClient {
    fn video(&self, video_id: &str) -> Result<VideoRecord, ProviderError> {
        let response: ListResponse<VideoItem> = self.get(
            "videos",
            &[("part", "snippet,statistics,contentDetails"), ("id", video_id)],
        )?;
        response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound {
                kind: "video",
                id: video_id.to_owned(),
            })?
            .into_record()
    }

    fn channel(&self, channel_id: &str) -> Result<ChannelRecord, ProviderError> {
        let response: ListResponse<ChannelItem> =
            self.get("channels", &[("part", "snippet,statistics"), ("id", channel_id)])?;
        response
            .items
            .into_iter()
            .next()
            .map(ChannelItem::into_record)
            .ok_or_else(|| ProviderError::NotFound {
                kind: "channel",
                id: channel_id.to_owned(),
            })
    }

    fn related(
        &self,
        video_id: &str,
        max_results: usize,
    ) -> Result<Vec<RelatedVideo>, ProviderError> {
        let max = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let response: ListResponse<SearchItem> = self.get(
            "search",
            &[
                ("part", "snippet"),
                ("type", "video"),
                ("relatedToVideoId", video_id),
                ("maxResults", &max),
            ],
        )?;
        Ok(response
            .items
            .into_iter()
            .filter_map(SearchItem::into_related)
            .collect())
    }

    fn search(
        &self,
        keyword: &str,
        duration: DurationBucket,
        max_results: usize,
    ) -> Result<Vec<String>, ProviderError> {
        let max = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let response: ListResponse<SearchItem> = self.get(
            "search",
            &[
                ("part", "snippet"),
                ("type", "video"),
                ("q", keyword),
                ("videoDuration", duration.as_str()),
                ("maxResults", &max),
            ],
        )?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }
}

impl<T: YouTubeApi + ?Sized> YouTubeApi for Box<T> {
    fn video(&self, video_id: &str) -> Result<VideoRecord, ProviderError> {
        (**self).video(video_id)
    }

    fn channel(&self, channel_id: &str) -> Result<ChannelRecord, ProviderError> {
        (**self).channel(channel_id)
    }

    fn related(
        &self,
        video_id: &str,
        max_results: usize,
    ) -> Result<Vec<RelatedVideo>, ProviderError> {
        (**self).related(video_id, max_results)
    }

    fn search(
        &self,
        keyword: &str,
        duration: DurationBucket,
        max_results: usize,
    ) -> Result<Vec<String>, ProviderError> {
        (**self).search(keyword, duration, max_results)
    }
}

/// Collaborator that never reaches the network. Runs backed by it answer
/// strictly from the cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineApi;

impl YouTubeApi for OfflineApi {
    fn video(&self, video_id: &str) -> Result<VideoRecord, ProviderError> {
        Err(ProviderError::Offline(format!("video {video_id}")))
    }

    fn channel(&self, channel_id: &str) -> Result<ChannelRecord, ProviderError> {
        Err(ProviderError::Offline(format!("channel {channel_id}")))
    }

    fn related(&self, video_id: &str, _: usize) -> Result<Vec<RelatedVideo>, ProviderError> {
        Err(ProviderError::Offline(format!("related videos of {video_id}")))
    }

    fn search(
        &self,
        keyword: &str,
        _: DurationBucket,
        _: usize,
    ) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Offline(format!("search {keyword:?}")))
    }
}

/// Maps an error response onto the provider error taxonomy. Quota problems
/// come back as 403 with a reason code inside the JSON body.
fn status_error(status: u16, body: &str) -> ProviderError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = envelope
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| body.trim().to_owned());
    let quota = envelope.is_some_and(|e| {
        e.error.errors.iter().any(|detail| {
            matches!(
                detail.reason.as_deref(),
                Some("quotaExceeded" | "dailyLimitExceeded")
            )
        })
    });

    if status == 403 && quota {
        ProviderError::QuotaExceeded { message }
    } else {
        ProviderError::Api { status, message }
    }
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|raw| raw.trim().parse().ok()).unwrap_or(0)
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value?.trim())
        .ok()
        .map(|datetime| datetime.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    channel_id: Option<String>,
    channel_title: Option<String>,
    published_at: Option<String>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
    subscriber_count: Option<String>,
    video_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
    #[serde(default)]
    content_details: ContentDetails,
}

impl VideoItem {
    /// The upload timestamp and owning channel are required; everything else
    /// falls back to zero or empty.
    fn into_record(self) -> Result<VideoRecord, ProviderError> {
        let upload_date = parse_timestamp(self.snippet.published_at.as_deref()).ok_or_else(|| {
            ProviderError::Malformed(format!("video {} has no valid publishedAt", self.id))
        })?;
        let channel_id = self
            .snippet
            .channel_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::Malformed(format!("video {} has no channelId", self.id))
            })?;

        Ok(VideoRecord {
            title: self.snippet.title.unwrap_or_else(|| self.id.clone()),
            channel_id,
            channel_title: self.snippet.channel_title.unwrap_or_default(),
            views: parse_count(self.statistics.view_count.as_deref()),
            likes: parse_count(self.statistics.like_count.as_deref()),
            comments: parse_count(self.statistics.comment_count.as_deref()),
            duration_secs: self
                .content_details
                .duration
                .as_deref()
                .map_or(0, parse_iso8601_duration),
            upload_date,
            tags: self.snippet.tags.unwrap_or_default(),
            video_id: self.id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
}

impl ChannelItem {
    fn into_record(self) -> ChannelRecord {
        ChannelRecord {
            title: self.snippet.title.unwrap_or_default(),
            subscriber_count: parse_count(self.statistics.subscriber_count.as_deref()),
            video_count: parse_count(self.statistics.video_count.as_deref()),
            created_at: parse_timestamp(self.snippet.published_at.as_deref()),
            hidden_subscribers: self.statistics.hidden_subscriber_count,
            channel_id: self.id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: SearchId,
    #[serde(default)]
    snippet: Snippet,
}

impl SearchItem {
    fn into_related(self) -> Option<RelatedVideo> {
        Some(RelatedVideo {
            video_id: self.id.video_id?,
            title: self.snippet.title.unwrap_or_default(),
            channel_title: self.snippet.channel_title.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}
