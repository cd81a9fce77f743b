#![forbid(unsafe_code)]

//! Search and filtering constraints for a run.
//!
//! Lower bounds are inclusive and upper bounds on subscribers/views are
//! exclusive, so `max_subs = 0` admits nothing. The channel-age limit is
//! inclusive ("at most N days old").

use std::{fmt, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::metrics::AnalyzedVideo;

pub const DEFAULT_MAX_RESULTS: usize = 25;

/// Upper length of a "short" video in seconds, as defined by the search API.
pub const SHORT_MAX_SECS: u64 = 4 * 60;
/// Upper length of a "medium" video in seconds.
pub const MEDIUM_MAX_SECS: u64 = 20 * 60;

/// Duration classes accepted by the YouTube search endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationBucket {
    /// Under four minutes.
    Short,
    /// Four to twenty minutes.
    Medium,
    /// Over twenty minutes.
    Long,
    #[default]
    Any,
}

impl DurationBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            DurationBucket::Short => "short",
            DurationBucket::Medium => "medium",
            DurationBucket::Long => "long",
            DurationBucket::Any => "any",
        }
    }

    pub fn contains(self, duration_secs: u64) -> bool {
        match self {
            DurationBucket::Short => duration_secs < SHORT_MAX_SECS,
            DurationBucket::Medium => (SHORT_MAX_SECS..=MEDIUM_MAX_SECS).contains(&duration_secs),
            DurationBucket::Long => duration_secs > MEDIUM_MAX_SECS,
            DurationBucket::Any => true,
        }
    }
}

impl fmt::Display for DurationBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword plus constraints. Every field is optional; the defaults accept
/// every video and cap the result list at [`DEFAULT_MAX_RESULTS`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchFilter {
    pub keyword: Option<String>,
    pub duration: DurationBucket,
    pub min_duration_minutes: Option<f64>,
    pub max_duration_minutes: Option<f64>,
    pub min_subs: Option<u64>,
    pub max_subs: Option<u64>,
    pub min_views: Option<u64>,
    pub max_views: Option<u64>,
    pub max_channel_age_days: Option<i64>,
    pub max_results: Option<usize>,
}

impl SearchFilter {
    pub fn with_keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            ..Self::default()
        }
    }

    /// Reads a TOML preset, e.g.
    ///
    /// ```toml
    /// keyword = "home espresso"
    /// duration = "medium"
    /// max_subs = 50000
    /// ```
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Parsing filter preset {}", path.display()))
    }

    pub fn max_results(&self) -> usize {
        self.max_results.unwrap_or(DEFAULT_MAX_RESULTS)
    }

    /// Trimmed keyword, `None` when absent or blank.
    pub fn trimmed_keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
    }

    pub fn matches(&self, video: &AnalyzedVideo) -> bool {
        let minutes = video.duration_minutes;
        self.duration.contains(video.video.duration_secs)
            && self.min_duration_minutes.is_none_or(|min| minutes >= min)
            && self.max_duration_minutes.is_none_or(|max| minutes <= max)
            && self.min_subs.is_none_or(|min| video.channel_subscribers >= min)
            && self.max_subs.is_none_or(|max| video.channel_subscribers < max)
            && self.min_views.is_none_or(|min| video.video.views >= min)
            && self.max_views.is_none_or(|max| video.video.views < max)
            && self.max_channel_age_days.is_none_or(|max| {
                video.channel_age_days.is_some_and(|age| age <= max)
            })
    }
}
