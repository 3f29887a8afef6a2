//! Core domain logic for the cafe map.
//! This crate is the single source of truth for scan, dedup and marker invariants.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod geo;
pub mod geolocation;
pub mod logging;
pub mod marker;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use cache::{CafeCache, DuplicateIdError};
pub use catalog::{
    CatalogError, CatalogResult, GooglePlacesClient, LatLngBounds, PlaceSearch, RawPlace,
    SearchArea, SearchRequest,
};
pub use config::AppConfig;
pub use geolocation::{locate_user, Geolocation, GeolocationError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use marker::{MapSurface, MarkerAction, MarkerController, MarkerPhase, MarkerView, Navigator};
pub use model::cafe::{CafeId, CafeRecord, CafeValidationError, LatLng};
pub use notify::{Notification, NotificationEvent, NotificationKind, NotificationQueue};
pub use repo::cafe_repo::{CafeRepository, RepoError, RepoResult, SqliteCafeRepository};
pub use repo::store::{CafeStore, SqliteCafeStore};
pub use service::scan_pipeline::{ScanError, ScanOutcome, ScanPipeline, SharedCache};
pub use service::session::{CafeMapSession, ExportFile, SessionError, SessionResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
