#![forbid(unsafe_code)]

//! Drives one analysis run: resolve inputs, fetch, compute, filter,
//! aggregate, rank. The run always completes; every item that fails along
//! the way is logged, recorded in the report and left out.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::LazyLock,
};

use chrono::{DateTime, Utc};
use log::{info, warn};
use regex::Regex;
use serde::Serialize;

use crate::{
    cache::CacheStore,
    error::ScoutError,
    filter::SearchFilter,
    metrics::AnalyzedVideo,
    niche::{self, ByChannel, ClusterStrategy, NicheGroup, TitleKeywords},
    provider::DataProvider,
    records::{ChannelRecord, RelatedVideo, VideoRecord},
    youtube::YouTubeApi,
};

static VIDEO_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:v=|/)([0-9A-Za-z_-]{11})",
        r"(?:embed/)([0-9A-Za-z_-]{11})",
        r"^([0-9A-Za-z_-]{11})$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Pulls the 11-character video id out of a watch/short/embed URL or accepts
/// a bare id.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(input))
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_owned())
}

/// Where the candidate videos come from.
#[derive(Debug, Clone)]
pub enum RunInput {
    /// Seed video URLs or ids.
    Seeds(Vec<String>),
    /// Keyword search driven by the request's filter.
    Search,
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input: RunInput,
    pub filter: SearchFilter,
    /// Related videos fetched per ranked video; 0 disables the lookup.
    pub related_per_video: usize,
}

impl RunRequest {
    pub fn seeds(seeds: Vec<String>, filter: SearchFilter) -> Self {
        Self {
            input: RunInput::Seeds(seeds),
            filter,
            related_per_video: 0,
        }
    }

    pub fn search(filter: SearchFilter) -> Self {
        Self {
            input: RunInput::Search,
            filter,
            related_per_video: 0,
        }
    }

    pub fn with_related(mut self, per_video: usize) -> Self {
        self.related_per_video = per_video;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolve,
    Search,
    FetchVideo,
    FetchChannel,
    Related,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub input: String,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub filter: SearchFilter,
    /// Videos that were fetched and scored before filtering.
    pub candidates: usize,
    pub ranked: Vec<AnalyzedVideo>,
    pub niches: Vec<NicheGroup>,
    pub channels: Vec<NicheGroup>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub related: BTreeMap<String, Vec<RelatedVideo>>,
    pub skipped: Vec<SkippedItem>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

pub struct Pipeline<A, S> {
    provider: DataProvider<A, S>,
    niche_strategy: Box<dyn ClusterStrategy>,
    skipped: Vec<SkippedItem>,
}

impl<A: YouTubeApi, S: CacheStore> Pipeline<A, S> {
    pub fn new(provider: DataProvider<A, S>) -> Self {
        Self {
            provider,
            niche_strategy: Box::new(TitleKeywords::default()),
            skipped: Vec::new(),
        }
    }

    pub fn with_niche_strategy(mut self, strategy: impl ClusterStrategy + 'static) -> Self {
        self.niche_strategy = Box::new(strategy);
        self
    }

    pub fn provider(&self) -> &DataProvider<A, S> {
        &self.provider
    }

    pub fn run(&mut self, request: &RunRequest) -> RunReport {
        self.run_at(request, Utc::now())
    }

    /// Same as [`Pipeline::run`] with an explicit clock.
    pub fn run_at(&mut self, request: &RunRequest, now: DateTime<Utc>) -> RunReport {
        self.skipped.clear();
        let filter = &request.filter;

        let video_ids = self.resolve(&request.input, filter);
        info!("resolved {} video id(s)", video_ids.len());

        let videos = self.fetch_videos(&video_ids);
        let channels = self.fetch_channels(&videos);
        info!(
            "fetched {} video(s) across {} channel(s)",
            videos.len(),
            channels.len()
        );

        let analyzed: Vec<AnalyzedVideo> = videos
            .into_iter()
            .map(|video| {
                let niche = self.niche_strategy.cluster(&video).label;
                let channel = channels.get(&video.channel_id);
                AnalyzedVideo::new(video, channel, niche, now)
            })
            .collect();
        let candidates = analyzed.len();

        let mut kept: Vec<AnalyzedVideo> = analyzed
            .into_iter()
            .filter(|video| filter.matches(video))
            .collect();
        info!("{} of {candidates} candidate(s) passed the filter", kept.len());

        let niches = niche::aggregate(&kept, self.niche_strategy.as_ref());
        let channel_groups = niche::aggregate(&kept, &ByChannel);

        niche::rank(&mut kept);
        kept.truncate(filter.max_results());

        let related = self.fetch_related(&kept, request.related_per_video);

        if let Err(err) = self.provider.flush() {
            warn!("cache not persisted: {err}");
        }

        RunReport {
            generated_at: now,
            filter: filter.clone(),
            candidates,
            ranked: kept,
            niches,
            channels: channel_groups,
            related,
            skipped: std::mem::take(&mut self.skipped),
        }
    }

    fn skip(&mut self, input: &str, stage: Stage, reason: impl ToString) {
        let reason = reason.to_string();
        warn!("skipping {input} ({stage:?}): {reason}");
        self.skipped.push(SkippedItem {
            input: input.to_owned(),
            stage,
            reason,
        });
    }

    fn resolve(&mut self, input: &RunInput, filter: &SearchFilter) -> Vec<String> {
        match input {
            RunInput::Seeds(seeds) => {
                let mut seen = HashSet::new();
                let mut ids = Vec::new();
                for seed in seeds {
                    match extract_video_id(seed) {
                        Some(id) => {
                            if seen.insert(id.clone()) {
                                ids.push(id);
                            }
                        }
                        None => {
                            let err = ScoutError::invalid_input(seed.as_str(), "no video id found");
                            self.skip(seed, Stage::Resolve, err);
                        }
                    }
                }
                ids
            }
            RunInput::Search => match self.provider.search_by_keyword(filter) {
                Ok(ids) => ids,
                Err(err) => {
                    let keyword = filter.keyword.clone().unwrap_or_default();
                    let stage = match err {
                        ScoutError::InvalidInput { .. } => Stage::Resolve,
                        _ => Stage::Search,
                    };
                    self.skip(&keyword, stage, err);
                    Vec::new()
                }
            },
        }
    }

    fn fetch_videos(&mut self, video_ids: &[String]) -> Vec<VideoRecord> {
        let mut videos = Vec::with_capacity(video_ids.len());
        for id in video_ids {
            match self.provider.fetch_video(id) {
                Ok(video) => videos.push(video),
                Err(err) => self.skip(id, Stage::FetchVideo, err),
            }
        }
        videos
    }

    /// Looks up each distinct channel once, in order of first appearance.
    fn fetch_channels(&mut self, videos: &[VideoRecord]) -> HashMap<String, ChannelRecord> {
        let mut channels = HashMap::new();
        let mut attempted = HashSet::new();
        for video in videos {
            if !attempted.insert(video.channel_id.as_str()) {
                continue;
            }
            match self.provider.fetch_channel(&video.channel_id) {
                Ok(channel) => {
                    channels.insert(video.channel_id.clone(), channel);
                }
                Err(err) => self.skip(&video.channel_id, Stage::FetchChannel, err),
            }
        }
        channels
    }

    fn fetch_related(
        &mut self,
        ranked: &[AnalyzedVideo],
        per_video: usize,
    ) -> BTreeMap<String, Vec<RelatedVideo>> {
        let mut related = BTreeMap::new();
        if per_video == 0 {
            return related;
        }
        for video in ranked {
            let id = &video.video.video_id;
            let list = match self.provider.fetch_related(id, per_video) {
                Ok(list) => list,
                Err(err) => {
                    self.skip(id, Stage::Related, err);
                    Vec::new()
                }
            };
            related.insert(id.clone(), list);
        }
        related
    }
}
