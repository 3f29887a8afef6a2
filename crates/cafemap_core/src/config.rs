//! Runtime configuration for the cafe map core.
//!
//! # Responsibility
//! - Hold the fixed timings and provider limits used across components.
//! - Resolve store path and provider key from the environment.
//!
//! # Invariants
//! - `max_results` is always within `1..=MAX_PROVIDER_PAGE_SIZE` after
//!   normalization.

use crate::model::cafe::LatLng;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Provider page-size limit for one text search.
pub const MAX_PROVIDER_PAGE_SIZE: u32 = 20;

/// Environment variable overriding the SQLite file location.
pub const DB_PATH_ENV: &str = "CAFEMAP_DB_PATH";
/// Environment variable carrying the place-search API key.
pub const PLACES_API_KEY_ENV: &str = "CAFEMAP_PLACES_API_KEY";

const DEFAULT_DB_FILE_NAME: &str = "cafemap.sqlite3";

/// Initial map center (Mérida, Yucatán).
pub const DEFAULT_MAP_CENTER: LatLng = LatLng::new(20.9753, -89.6178);
pub const DEFAULT_MAP_ZOOM: u8 = 14;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub search_query: String,
    pub max_results: u32,
    pub stagger_ms: u64,
    pub notification_ttl_ms: u64,
    pub marker_transition_ms: u64,
    pub geolocation_timeout_ms: u64,
    pub photo_max_width_px: u32,
    pub db_path: Option<PathBuf>,
    pub places_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search_query: "cafetería".to_string(),
            max_results: MAX_PROVIDER_PAGE_SIZE,
            stagger_ms: 600,
            notification_ttl_ms: 4_000,
            marker_transition_ms: 1_000,
            geolocation_timeout_ms: 10_000,
            photo_max_width_px: 400,
            db_path: None,
            places_api_key: None,
        }
    }
}

impl AppConfig {
    /// Defaults with `CAFEMAP_DB_PATH` and `CAFEMAP_PLACES_API_KEY` applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(raw)?;
        Ok(config.normalized())
    }

    /// Applies environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = non_empty_env(DB_PATH_ENV) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(key) = non_empty_env(PLACES_API_KEY_ENV) {
            self.places_api_key = Some(key);
        }
        self.normalized()
    }

    /// Clamps `max_results` into the provider page-size range.
    pub fn normalized(mut self) -> Self {
        self.max_results = self.max_results.clamp(1, MAX_PROVIDER_PAGE_SIZE);
        self
    }

    /// Resolves the database file, falling back to the temp directory.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }

    pub fn marker_transition(&self) -> Duration {
        Duration::from_millis(self.marker_transition_ms)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, MAX_PROVIDER_PAGE_SIZE};
    use std::time::Duration;

    #[test]
    fn defaults_match_provider_and_ui_timings() {
        let config = AppConfig::default();
        assert_eq!(config.search_query, "cafetería");
        assert_eq!(config.max_results, 20);
        assert_eq!(config.stagger(), Duration::from_millis(600));
        assert_eq!(config.notification_ttl(), Duration::from_secs(4));
        assert_eq!(config.marker_transition(), Duration::from_secs(1));
        assert_eq!(config.geolocation_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn json_fills_missing_fields_and_clamps_page_size() {
        let config =
            AppConfig::from_json_str(r#"{"max_results": 50, "search_query": "coffee"}"#)
                .expect("valid config");
        assert_eq!(config.max_results, MAX_PROVIDER_PAGE_SIZE);
        assert_eq!(config.search_query, "coffee");
        assert_eq!(config.stagger_ms, 600);

        let config = AppConfig::from_json_str(r#"{"max_results": 0}"#).expect("valid config");
        assert_eq!(config.max_results, 1);
    }

    #[test]
    fn json_rejects_unknown_fields() {
        assert!(AppConfig::from_json_str(r#"{"surprise": true}"#).is_err());
    }

    #[test]
    fn db_path_falls_back_to_temp_dir() {
        let config = AppConfig::default();
        assert!(config.resolved_db_path().ends_with("cafemap.sqlite3"));
    }
}
