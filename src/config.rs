#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::youtube::DEFAULT_API_BASE;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_CACHE_FILE: &str = "data/cache.json";
pub const DEFAULT_RESULTS_FILE: &str = "data/results.json";
pub const DEFAULT_SEEDS_FILE: &str = "seeds.txt";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub cache_file: PathBuf,
    pub results_file: PathBuf,
    pub seeds_file: PathBuf,
    pub api_base: String,
    pub timeout: Duration,
}

impl Settings {
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("YOUTUBE_API_KEY not set (use --offline to run from cache)"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub cache_file: Option<PathBuf>,
    pub results_file: Option<PathBuf>,
    pub seeds_file: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_settings_with_overrides(
        &file_vars,
        env_var_string,
        overrides,
    ))
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Settings {
    let path_setting = |value: Option<PathBuf>, key: &str, default: &str| {
        value
            .or_else(|| lookup_value(key, file_vars, &env_lookup).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(default))
    };

    let cache_file = path_setting(overrides.cache_file, "TUBESCOUT_CACHE_FILE", DEFAULT_CACHE_FILE);
    let results_file = path_setting(
        overrides.results_file,
        "TUBESCOUT_RESULTS_FILE",
        DEFAULT_RESULTS_FILE,
    );
    let seeds_file = path_setting(overrides.seeds_file, "TUBESCOUT_SEEDS_FILE", DEFAULT_SEEDS_FILE);
    let api_base = lookup_value("YOUTUBE_API_BASE", file_vars, &env_lookup)
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let timeout_secs = lookup_value("TUBESCOUT_TIMEOUT_SECS", file_vars, &env_lookup)
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Settings {
        api_key: lookup_value("YOUTUBE_API_KEY", file_vars, &env_lookup),
        cache_file,
        results_file,
        seeds_file,
        api_base,
        timeout: Duration::from_secs(timeout_secs),
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .filter(|value| !value.trim().is_empty())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

/// One seed URL or id per line; blank lines and `#` comments are skipped.
pub fn read_seeds_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Reading seeds file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
