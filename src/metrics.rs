#![forbid(unsafe_code)]

//! Opportunity metrics. Every function here is total: zero denominators are
//! guarded so that missing statistics degrade to a zero score instead of an
//! error. The thresholds are user-visible and must not drift.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    niche::extract_keywords,
    records::{ChannelRecord, VideoRecord},
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Subscriber count below which a channel is considered small.
pub const SMALL_CHANNEL_SUBS: u64 = 10_000;
/// Subscriber count below which a channel is considered mid-sized.
pub const MID_CHANNEL_SUBS: u64 = 50_000;

/// Video count assumed for a channel whose statistics could not be fetched.
pub const UNKNOWN_CHANNEL_VIDEO_COUNT: u64 = 1;

/// `main_keyword` of a video whose title has no usable keyword.
pub const UNKNOWN_KEYWORD: &str = "unknown";

/// Whole days elapsed from `since` to `now`, rounded towards negative
/// infinity. Future timestamps yield negative values.
pub fn days_since(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// `100 × (likes + comments) / views`, or 0 for unwatched videos.
pub fn engagement_pct(likes: u64, comments: u64, views: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    (likes as f64 + comments as f64) / views as f64 * 100.0
}

/// Views per day since upload. Videos younger than a day count as one day old.
pub fn view_velocity(views: u64, upload: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    views as f64 / days_since(upload, now).max(1) as f64
}

/// Saturation estimate in `[0, 100]` weighted 40/30/30 across subscribers,
/// channel size and velocity.
pub fn competition_score(subscribers: u64, video_count: u64, view_velocity: f64) -> f64 {
    let score = subscribers as f64 / 1_000_000.0 * 40.0
        + video_count as f64 / 1_000.0 * 30.0
        + view_velocity / 10_000.0 * 30.0;
    score.clamp(0.0, 100.0)
}

/// Boost applied to small channels whose videos outperform their audience.
pub fn potential_multiplier(subscribers: u64) -> f64 {
    if subscribers < SMALL_CHANNEL_SUBS {
        1.5
    } else if subscribers < MID_CHANNEL_SUBS {
        1.2
    } else {
        1.0
    }
}

/// Views-to-subscribers ratio (in percent) scaled by the tier multiplier.
pub fn potential_score(views: u64, subscribers: u64) -> f64 {
    views as f64 / subscribers.max(1) as f64 * 100.0 * potential_multiplier(subscribers)
}

/// Age of a channel in days, never negative even when clocks disagree.
pub fn channel_age_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    days_since(created_at, now).max(0)
}

/// Parses an ISO-8601 duration such as `PT1H2M3S` or `P1DT5M` into seconds.
/// Unparseable or out-of-range input yields 0.
pub fn parse_iso8601_duration(text: &str) -> u64 {
    let Some(body) = text.trim().strip_prefix('P') else {
        return 0;
    };

    let mut seconds = 0u64;
    let mut number = String::new();
    let mut in_time = false;
    for c in body.chars() {
        match c {
            'T' => {
                in_time = true;
                number.clear();
            }
            '0'..='9' => number.push(c),
            unit => {
                let Ok(value) = number.parse::<u64>() else {
                    return 0;
                };
                number.clear();
                let factor = match (unit, in_time) {
                    ('W', false) => 7 * SECONDS_PER_DAY as u64,
                    ('D', false) => SECONDS_PER_DAY as u64,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return 0,
                };
                let Some(total) = value
                    .checked_mul(factor)
                    .and_then(|part| seconds.checked_add(part))
                else {
                    return 0;
                };
                seconds = total;
            }
        }
    }

    if number.is_empty() { seconds } else { 0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoMetrics {
    pub engagement_pct: f64,
    pub view_velocity: f64,
    pub competition_score: f64,
    pub potential_score: f64,
}

impl VideoMetrics {
    pub fn compute(
        video: &VideoRecord,
        subscribers: u64,
        channel_video_count: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let view_velocity = view_velocity(video.views, video.upload_date, now);
        Self {
            engagement_pct: engagement_pct(video.likes, video.comments, video.views),
            view_velocity,
            competition_score: competition_score(subscribers, channel_video_count, view_velocity),
            potential_score: potential_score(video.views, subscribers),
        }
    }
}

/// A fetched video together with everything derived from it during a run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedVideo {
    #[serde(flatten)]
    pub video: VideoRecord,
    pub channel_subscribers: u64,
    pub channel_video_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_age_days: Option<i64>,
    pub days_since_upload: i64,
    pub duration_minutes: f64,
    #[serde(flatten)]
    pub metrics: VideoMetrics,
    pub main_keyword: String,
    pub niche: String,
}

impl AnalyzedVideo {
    /// `channel` is `None` when the channel lookup failed; the video is still
    /// scored, with zero subscribers and an unknown channel age.
    pub fn new(
        video: VideoRecord,
        channel: Option<&ChannelRecord>,
        niche: String,
        now: DateTime<Utc>,
    ) -> Self {
        let subscribers = channel.map_or(0, |c| c.subscriber_count);
        let channel_video_count = channel.map_or(UNKNOWN_CHANNEL_VIDEO_COUNT, |c| c.video_count);
        let channel_age_days = channel
            .and_then(|c| c.created_at)
            .map(|created| channel_age_days(created, now));
        let metrics = VideoMetrics::compute(&video, subscribers, channel_video_count, now);
        let main_keyword = extract_keywords([video.title.as_str()], 1)
            .into_iter()
            .next()
            .unwrap_or_else(|| UNKNOWN_KEYWORD.to_owned());

        Self {
            days_since_upload: days_since(video.upload_date, now).max(1),
            duration_minutes: video.duration_minutes(),
            video,
            channel_subscribers: subscribers,
            channel_video_count,
            channel_age_days,
            metrics,
            main_keyword,
            niche,
        }
    }
}
