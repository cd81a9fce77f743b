#![forbid(unsafe_code)]

//! Groups analyzed videos into niches (dominant title keywords) or channels
//! and summarizes each group.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use regex::Regex;
use serde::Serialize;

use crate::{metrics::AnalyzedVideo, records::VideoRecord};

/// Members listed in a group's top performers.
pub const TOP_PERFORMERS: usize = 5;

pub const FALLBACK_NICHE: &str = "general";

const MIN_KEYWORD_CHARS: usize = 4;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "how", "what", "why", "when", "where", "who", "this", "that", "these", "those", "i",
    "you", "we", "they", "my", "your", "our", "their", "is", "are", "was", "were", "be", "been",
    "being",
];

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Most frequent keywords across `titles`, ties resolved by first appearance.
/// Titles are lowercased and stripped of punctuation; stop-words and tokens
/// shorter than four characters are ignored.
pub fn extract_keywords<'a>(
    titles: impl IntoIterator<Item = &'a str>,
    top_n: usize,
) -> Vec<String> {
    let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for title in titles {
        let cleaned = NON_WORD.replace_all(&title.to_lowercase(), "").into_owned();
        for token in cleaned.split_whitespace() {
            if stop_words.contains(token) || token.chars().count() < MIN_KEYWORD_CHARS {
                continue;
            }
            match positions.get(token) {
                Some(&index) => counts[index].1 += 1,
                None => {
                    positions.insert(token.to_owned(), counts.len());
                    counts.push((token.to_owned(), 1));
                }
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(top_n).map(|(word, _)| word).collect()
}

/// Key and human-readable label of the group a video belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub key: String,
    pub label: String,
}

/// Decides which group a video belongs to. Swapping the strategy changes
/// the grouping without touching the pipeline.
pub trait ClusterStrategy {
    fn cluster(&self, video: &VideoRecord) -> Cluster;
}

/// Clusters by the dominant keywords of the video's own title.
#[derive(Debug, Clone, Copy)]
pub struct TitleKeywords {
    pub top_n: usize,
}

impl Default for TitleKeywords {
    fn default() -> Self {
        Self { top_n: 2 }
    }
}

impl ClusterStrategy for TitleKeywords {
    fn cluster(&self, video: &VideoRecord) -> Cluster {
        let keywords = extract_keywords([video.title.as_str()], self.top_n);
        let key = if keywords.is_empty() {
            FALLBACK_NICHE.to_owned()
        } else {
            keywords.join(" ")
        };
        Cluster {
            label: key.clone(),
            key,
        }
    }
}

/// Clusters by owning channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByChannel;

impl ClusterStrategy for ByChannel {
    fn cluster(&self, video: &VideoRecord) -> Cluster {
        let label = if video.channel_title.is_empty() {
            video.channel_id.clone()
        } else {
            video.channel_title.clone()
        };
        Cluster {
            key: video.channel_id.clone(),
            label,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NicheGroup {
    pub key: String,
    pub label: String,
    pub member_count: usize,
    pub video_ids: Vec<String>,
    pub avg_engagement_pct: f64,
    pub avg_competition_score: f64,
    pub top_performers: Vec<AnalyzedVideo>,
}

/// Ranking order: potential score descending, then views descending, then
/// earlier upload first.
pub fn rank_order(a: &AnalyzedVideo, b: &AnalyzedVideo) -> Ordering {
    b.metrics
        .potential_score
        .total_cmp(&a.metrics.potential_score)
        .then_with(|| b.video.views.cmp(&a.video.views))
        .then_with(|| a.video.upload_date.cmp(&b.video.upload_date))
}

/// Sorts in place by [`rank_order`]; remaining ties keep input order.
pub fn rank(videos: &mut [AnalyzedVideo]) {
    videos.sort_by(rank_order);
}

/// Buckets `videos` with `strategy` and summarizes each bucket. Groups are
/// ordered by size, larger first, ties by first appearance.
pub fn aggregate(videos: &[AnalyzedVideo], strategy: &dyn ClusterStrategy) -> Vec<NicheGroup> {
    let mut buckets: Vec<(Cluster, Vec<&AnalyzedVideo>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for video in videos {
        let cluster = strategy.cluster(&video.video);
        match positions.get(&cluster.key) {
            Some(&index) => buckets[index].1.push(video),
            None => {
                positions.insert(cluster.key.clone(), buckets.len());
                buckets.push((cluster, vec![video]));
            }
        }
    }

    let mut groups: Vec<NicheGroup> = buckets
        .into_iter()
        .map(|(cluster, members)| summarize(cluster, &members))
        .collect();
    groups.sort_by(|a, b| b.member_count.cmp(&a.member_count));
    groups
}

fn summarize(cluster: Cluster, members: &[&AnalyzedVideo]) -> NicheGroup {
    let count = members.len();
    let average = |value: fn(&AnalyzedVideo) -> f64| {
        if count == 0 {
            0.0
        } else {
            members.iter().map(|video| value(*video)).sum::<f64>() / count as f64
        }
    };

    let mut top: Vec<AnalyzedVideo> = members.iter().map(|video| (*video).clone()).collect();
    rank(&mut top);
    top.truncate(TOP_PERFORMERS);

    NicheGroup {
        key: cluster.key,
        label: cluster.label,
        member_count: count,
        video_ids: members.iter().map(|video| video.video.video_id.clone()).collect(),
        avg_engagement_pct: average(|video| video.metrics.engagement_pct),
        avg_competition_score: average(|video| video.metrics.competition_score),
        top_performers: top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ChannelRecord;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn record(id: &str, title: &str, channel: &str, views: u64, age_days: i64) -> VideoRecord {
        VideoRecord {
            video_id: id.into(),
            title: title.into(),
            channel_id: channel.into(),
            channel_title: format!("{channel} title"),
            views,
            likes: views / 10,
            comments: 0,
            duration_secs: 600,
            upload_date: now() - Duration::days(age_days),
            tags: Vec::new(),
        }
    }

    fn analyzed(id: &str, title: &str, channel: &str, views: u64, subs: u64) -> AnalyzedVideo {
        analyzed_at(id, title, channel, views, subs, 10)
    }

    fn analyzed_at(
        id: &str,
        title: &str,
        channel: &str,
        views: u64,
        subs: u64,
        age_days: i64,
    ) -> AnalyzedVideo {
        let channel_record = ChannelRecord {
            channel_id: channel.into(),
            title: String::new(),
            subscriber_count: subs,
            video_count: 100,
            created_at: None,
            hidden_subscribers: false,
        };
        let video = record(id, title, channel, views, age_days);
        let niche = TitleKeywords::default().cluster(&video).label;
        AnalyzedVideo::new(video, Some(&channel_record), niche, now())
    }

    #[test]
    fn keywords_skip_stop_words_and_short_tokens() {
        let keywords = extract_keywords(["How to Brew the BEST Espresso at home!"], 3);
        assert_eq!(keywords, vec!["brew", "best", "espresso"]);
    }

    #[test]
    fn keywords_rank_by_frequency_then_first_seen() {
        let keywords = extract_keywords(
            [
                "Budget travel guide",
                "Travel hacks: budget edition",
                "Japan travel",
            ],
            3,
        );
        assert_eq!(keywords, vec!["travel", "budget", "guide"]);
    }

    #[test]
    fn keywords_keep_unicode_words() {
        let keywords = extract_keywords(["Café crème brûlée"], 2);
        assert_eq!(keywords, vec!["café", "crème"]);
    }

    #[test]
    fn title_strategy_falls_back_to_general() {
        let strategy = TitleKeywords::default();
        assert_eq!(
            strategy.cluster(&record("a", "How to do it", "UC", 1, 1)).key,
            FALLBACK_NICHE
        );
        assert_eq!(
            strategy
                .cluster(&record("a", "Sourdough bread basics", "UC", 1, 1))
                .key,
            "sourdough bread"
        );
        let single = TitleKeywords { top_n: 1 };
        assert_eq!(
            single
                .cluster(&record("a", "Sourdough bread basics", "UC", 1, 1))
                .key,
            "sourdough"
        );
    }

    #[test]
    fn channel_strategy_labels_with_title() {
        let cluster = ByChannel.cluster(&record("a", "x", "UC9", 1, 1));
        assert_eq!(cluster.key, "UC9");
        assert_eq!(cluster.label, "UC9 title");
    }

    #[test]
    fn rank_breaks_ties_by_views_then_upload_date() {
        // Same potential: views/subs ratio identical, same multiplier tier.
        let mut videos = vec![
            analyzed_at("older-low", "t", "UC1", 1_000, 1_000, 20),
            analyzed_at("newer-high", "t", "UC2", 2_000, 2_000, 5),
            analyzed_at("older-high", "t", "UC3", 2_000, 2_000, 30),
            analyzed_at("best", "t", "UC4", 9_000, 1_000, 1),
        ];
        rank(&mut videos);
        let order: Vec<_> = videos.iter().map(|v| v.video.video_id.as_str()).collect();
        assert_eq!(order, vec!["best", "older-high", "newer-high", "older-low"]);
    }

    #[test]
    fn ranked_output_is_descending() {
        let mut videos = vec![
            analyzed("a", "t", "UC1", 10, 100),
            analyzed("b", "t", "UC1", 1_000, 100),
            analyzed("c", "t", "UC1", 100, 100),
        ];
        rank(&mut videos);
        assert!(
            videos
                .windows(2)
                .all(|w| w[0].metrics.potential_score >= w[1].metrics.potential_score)
        );
    }

    #[test]
    fn aggregate_by_channel_summarizes_members() {
        let videos = vec![
            analyzed("a", "Espresso tips", "UC1", 1_000, 100),
            analyzed("b", "Latte art", "UC2", 500, 100),
            analyzed("c", "Espresso beans", "UC1", 3_000, 100),
        ];
        let groups = aggregate(&videos, &ByChannel);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "UC1");
        assert_eq!(groups[0].member_count, 2);
        assert_eq!(groups[0].video_ids, vec!["a", "c"]);
        assert_eq!(groups[0].top_performers[0].video.video_id, "c");
        assert!((groups[0].avg_engagement_pct - 10.0).abs() < 1e-9);
        assert_eq!(groups[1].key, "UC2");
    }

    #[test]
    fn aggregate_caps_top_performers() {
        let videos: Vec<_> = (0..8)
            .map(|i| analyzed(&format!("v{i}"), "Sourdough bread", "UC1", 100 * (i + 1), 50))
            .collect();
        let groups = aggregate(&videos, &TitleKeywords::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "sourdough bread");
        assert_eq!(groups[0].member_count, 8);
        assert_eq!(groups[0].top_performers.len(), TOP_PERFORMERS);
        assert_eq!(groups[0].top_performers[0].video.video_id, "v7");
    }

    #[test]
    fn aggregate_orders_equal_sized_groups_by_first_seen() {
        let videos = vec![
            analyzed("a", "Knitting socks", "UC1", 1, 1),
            analyzed("b", "Guitar chords", "UC1", 1, 1),
            analyzed("c", "Guitar chords", "UC1", 1, 1),
            analyzed("d", "Pottery wheel", "UC1", 1, 1),
        ];
        let labels: Vec<_> = aggregate(&videos, &TitleKeywords::default())
            .into_iter()
            .map(|g| g.label)
            .collect();
        assert_eq!(labels, vec!["guitar chords", "knitting socks", "pottery wheel"]);
    }

    #[test]
    fn aggregate_of_nothing_is_empty() {
        assert!(aggregate(&[], &ByChannel).is_empty());
    }
}
