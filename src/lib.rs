#![forbid(unsafe_code)]

//! Finds under-served YouTube niches: fetches videos and their channels,
//! scores each video's opportunity, filters and ranks them, and groups the
//! survivors by niche and by channel. All external lookups go through a
//! persistent JSON cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod niche;
pub mod pipeline;
pub mod provider;
pub mod records;
pub mod youtube;

pub use cache::{CacheStore, JsonFileCache, MemoryCache, Namespace};
pub use error::{CacheError, ProviderError, ScoutError};
pub use filter::{DurationBucket, SearchFilter};
pub use metrics::{AnalyzedVideo, VideoMetrics};
pub use niche::{ByChannel, ClusterStrategy, NicheGroup, TitleKeywords};
pub use pipeline::{Pipeline, RunInput, RunReport, RunRequest, SkippedItem, Stage};
pub use provider::DataProvider;
pub use records::{ChannelRecord, RelatedVideo, VideoRecord};
pub use youtube::{DataApiClient, OfflineApi, YouTubeApi};
