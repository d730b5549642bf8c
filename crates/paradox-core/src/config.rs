//! ============================================================================
//! Configuration - Environment-driven settings for the access core
//! ============================================================================
//! PARADOX_DB_PATH         subscriber database file (default ~/.paradox/subscribers.redb)
//! PARADOX_CACHE_SECS      tier cache lifetime in seconds (default 300)
//! PARADOX_FREE_CHAPTERS   chapters open to every tier (default 3)
//! PARADOX_TOTAL_CHAPTERS  chapters in the book (default 24)
//! PARADOX_ERROR_BUFFER    captured errors kept in memory (default 200)
//! ============================================================================

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::access::{DEFAULT_CACHE_DURATION_SECS, FREE_CHAPTER_COUNT, TOTAL_CHAPTERS};
use crate::telemetry::DEFAULT_ERROR_CAPACITY;

/// Runtime settings shared by the store, the gate and the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParadoxConfig {
    pub db_path: Option<PathBuf>,
    pub cache_duration_secs: i64,
    pub free_chapter_count: u32,
    pub total_chapters: u32,
    pub error_buffer: usize,
}

impl Default for ParadoxConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            cache_duration_secs: DEFAULT_CACHE_DURATION_SECS,
            free_chapter_count: FREE_CHAPTER_COUNT,
            total_chapters: TOTAL_CHAPTERS,
            error_buffer: DEFAULT_ERROR_CAPACITY,
        }
    }
}

impl ParadoxConfig {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup; unset keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            db_path: lookup("PARADOX_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            cache_duration_secs: parse_or(&lookup, "PARADOX_CACHE_SECS", defaults.cache_duration_secs)?,
            free_chapter_count: parse_or(&lookup, "PARADOX_FREE_CHAPTERS", defaults.free_chapter_count)?,
            total_chapters: parse_or(&lookup, "PARADOX_TOTAL_CHAPTERS", defaults.total_chapters)?,
            error_buffer: parse_or(&lookup, "PARADOX_ERROR_BUFFER", defaults.error_buffer)?,
        };

        if config.cache_duration_secs < 0 {
            return Err(anyhow!(
                "PARADOX_CACHE_SECS must not be negative, got {}",
                config.cache_duration_secs
            ));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", key, raw, e)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ParadoxConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ParadoxConfig::default());
        assert_eq!(config.cache_duration_secs, 300);
    }

    #[test]
    fn test_overrides() {
        let config = ParadoxConfig::from_lookup(lookup_from(&[
            ("PARADOX_DB_PATH", "/tmp/paradox.redb"),
            ("PARADOX_CACHE_SECS", "60"),
            ("PARADOX_FREE_CHAPTERS", " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/paradox.redb")));
        assert_eq!(config.cache_duration_secs, 60);
        assert_eq!(config.free_chapter_count, 5);
        assert_eq!(config.total_chapters, 24);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = ParadoxConfig::from_lookup(lookup_from(&[("PARADOX_TOTAL_CHAPTERS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("PARADOX_TOTAL_CHAPTERS"));
    }

    #[test]
    fn test_negative_cache_rejected() {
        assert!(ParadoxConfig::from_lookup(lookup_from(&[("PARADOX_CACHE_SECS", "-1")])).is_err());
    }
}
