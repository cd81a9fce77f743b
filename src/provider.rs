#![forbid(unsafe_code)]

//! Cache-first access to the YouTube collaborator. Each lookup consults the
//! cache and, on a miss, issues exactly one external call whose normalized
//! result is stored before being returned. Failed calls are never cached.

use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    cache::{CacheStore, Namespace},
    error::{CacheError, ProviderError, Result, ScoutError},
    filter::{DurationBucket, SearchFilter},
    records::{ChannelRecord, RelatedVideo, VideoRecord},
    youtube::{MAX_PAGE_SIZE, YouTubeApi},
};

/// Page size sent to the API. Cache keys are built from it.
fn page_size(max_results: usize) -> usize {
    max_results.clamp(1, MAX_PAGE_SIZE)
}

pub fn related_cache_key(video_id: &str, max_results: usize) -> String {
    format!("related_{video_id}_{max_results}")
}

pub fn search_cache_key(keyword: &str, duration: DurationBucket, max_results: usize) -> String {
    format!(
        "search_{}_{}_{}",
        keyword.trim().to_lowercase(),
        duration,
        max_results
    )
}

pub struct DataProvider<A, S> {
    api: A,
    cache: S,
}

impl<A: YouTubeApi, S: CacheStore> DataProvider<A, S> {
    pub fn new(api: A, cache: S) -> Self {
        Self { api, cache }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn cache(&self) -> &S {
        &self.cache
    }

    pub fn flush(&mut self) -> Result<(), CacheError> {
        self.cache.flush()
    }

    pub fn fetch_video(&mut self, video_id: &str) -> Result<VideoRecord, ProviderError> {
        let api = &self.api;
        cached_or_fetch(&mut self.cache, Namespace::Videos, video_id, || {
            api.video(video_id)
        })
    }

    pub fn fetch_channel(&mut self, channel_id: &str) -> Result<ChannelRecord, ProviderError> {
        let api = &self.api;
        cached_or_fetch(&mut self.cache, Namespace::Channels, channel_id, || {
            api.channel(channel_id)
        })
    }

    pub fn fetch_related(
        &mut self,
        video_id: &str,
        max_results: usize,
    ) -> Result<Vec<RelatedVideo>, ProviderError> {
        let api = &self.api;
        let max_results = page_size(max_results);
        let key = related_cache_key(video_id, max_results);
        cached_or_fetch(&mut self.cache, Namespace::Related, &key, || {
            api.related(video_id, max_results)
        })
    }

    /// Runs the keyword search described by `filter`. A missing or blank
    /// keyword is rejected before any call is made.
    pub fn search_by_keyword(&mut self, filter: &SearchFilter) -> Result<Vec<String>> {
        let keyword = filter
            .trimmed_keyword()
            .ok_or_else(|| ScoutError::invalid_input("", "search requires a keyword"))?;
        let max_results = page_size(filter.max_results());
        let key = search_cache_key(keyword, filter.duration, max_results);
        let api = &self.api;
        let ids = cached_or_fetch(&mut self.cache, Namespace::Search, &key, || {
            api.search(keyword, filter.duration, max_results)
        })?;
        Ok(ids)
    }
}

fn cached_or_fetch<T, S, F>(
    cache: &mut S,
    namespace: Namespace,
    key: &str,
    fetch: F,
) -> Result<T, ProviderError>
where
    T: Serialize + DeserializeOwned,
    S: CacheStore,
    F: FnOnce() -> Result<T, ProviderError>,
{
    if let Some(payload) = cache.get(namespace, key) {
        match serde_json::from_value::<T>(payload.clone()) {
            Ok(value) => {
                debug!("cache hit {namespace}/{key}");
                return Ok(value);
            }
            Err(err) => warn!("discarding unreadable cache entry {namespace}/{key}: {err}"),
        }
    }

    debug!("cache miss {namespace}/{key}");
    let value = fetch()?;
    match serde_json::to_value(&value) {
        Ok(payload) => cache.put(namespace, key, payload),
        Err(err) => warn!("could not cache {namespace}/{key}: {err}"),
    }
    Ok(value)
}
