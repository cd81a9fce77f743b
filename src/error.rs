#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single call to the YouTube collaborator. The pipeline skips
/// the offending item and keeps going.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("YouTube API quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("YouTube API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network failure: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("offline mode: {0} is not cached")]
    Offline(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("reading cache file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cache file {path} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("writing cache file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("invalid input {input:?}: {reason}")]
    InvalidInput { input: String, reason: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ScoutError {
    pub fn invalid_input(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = ScoutError> = std::result::Result<T, E>;
