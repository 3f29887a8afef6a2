//! Host-facing façade for one map screen.
//!
//! # Responsibility
//! - Own the cache, notification queue, scan pipeline and marker registry.
//! - Expose the use-cases a UI needs: load, scan, detail, export, locate.
//! - Keep exactly one marker controller per cached cafe, in cache order.
//!
//! # Invariants
//! - The session is the only writer of its cache.
//! - After `shutdown`, every marker is detached and no scan mutates state.

use crate::cache::CafeCache;
use crate::catalog::{PlaceSearch, SearchArea};
use crate::config::AppConfig;
use crate::geolocation::{self, Geolocation};
use crate::marker::{MapSurface, MarkerAction, MarkerController};
use crate::model::cafe::{CafeRecord, LatLng};
use crate::notify::{NotificationKind, NotificationQueue};
use crate::repo::cafe_repo::RepoError;
use crate::repo::store::CafeStore;
use crate::service::scan_pipeline::{ScanError, ScanOutcome, ScanPipeline, SharedCache};
use log::{error, info};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

const EXPORT_FILE_PREFIX: &str = "mapeo_cafes_";

#[derive(Debug)]
pub enum SessionError {
    /// `shutdown` already ran.
    ShutDown,
    /// Startup load requested while a scan or another load is running.
    Busy,
    Scan(ScanError),
    Store(RepoError),
    Export(serde_json::Error),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShutDown => write!(f, "session is shut down"),
            Self::Busy => write!(f, "a scan is in progress"),
            Self::Scan(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Export(err) => write!(f, "export failed: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Scan(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Export(err) => Some(err),
            Self::ShutDown | Self::Busy => None,
        }
    }
}

impl From<ScanError> for SessionError {
    fn from(value: ScanError) -> Self {
        match value {
            ScanError::Closed => Self::ShutDown,
            other => Self::Scan(other),
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Serialized cache snapshot plus its proposed file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

pub struct CafeMapSession {
    config: AppConfig,
    store: Arc<dyn CafeStore>,
    cache: SharedCache,
    notifications: NotificationQueue,
    pipeline: ScanPipeline,
    surface: Arc<dyn MapSurface>,
    action: MarkerAction,
    markers: Mutex<Vec<Arc<MarkerController>>>,
    shut_down: AtomicBool,
}

impl CafeMapSession {
    /// Wires a session around injected capabilities.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: AppConfig,
        catalog: Arc<dyn PlaceSearch>,
        store: Arc<dyn CafeStore>,
        surface: Arc<dyn MapSurface>,
        action: MarkerAction,
    ) -> Self {
        let config = config.normalized();
        let cache: SharedCache = Arc::new(RwLock::new(CafeCache::new()));
        let notifications = NotificationQueue::new(config.notification_ttl());
        let pipeline = ScanPipeline::new(
            &config,
            catalog,
            Arc::clone(&store),
            Arc::clone(&cache),
            notifications.clone(),
        );
        Self {
            config,
            store,
            cache,
            notifications,
            pipeline,
            surface,
            action,
            markers: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn pipeline(&self) -> &ScanPipeline {
        &self.pipeline
    }

    pub fn is_scanning(&self) -> bool {
        self.pipeline.is_scanning()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Fills the cache from the store and renders a marker per record.
    ///
    /// A store failure posts one error notification and leaves the cache
    /// empty; the session stays usable. Returns the number of loaded records.
    ///
    /// Scans are rejected with `AlreadyScanning` until the load finishes,
    /// and `is_scanning` reports `true` meanwhile.
    pub async fn load(&self) -> SessionResult<usize> {
        self.ensure_running()?;
        let Some(_exclusive) = self.pipeline.try_exclusive() else {
            return Err(SessionError::Busy);
        };

        let loaded = match self.store.read_all().await {
            Ok(records) => records,
            Err(err) => {
                error!("event=session_load module=session status=error error={err}");
                self.notifications
                    .push("Could not load saved cafes.", NotificationKind::Error);
                return Ok(0);
            }
        };
        self.ensure_running()?;

        let count = loaded.len();
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .load_all(loaded);
        self.sync_markers();
        info!("event=session_load module=session status=ok count={count}");
        Ok(count)
    }

    /// Scans `area` and renders markers for anything added.
    ///
    /// # Errors
    /// - `ShutDown` when the session closed before or during the scan.
    /// - `Scan(AlreadyScanning)` while another scan is running.
    pub async fn scan(&self, area: SearchArea) -> SessionResult<ScanOutcome> {
        self.ensure_running()?;
        let outcome = self.pipeline.scan(area).await?;
        if matches!(outcome, ScanOutcome::Added(_)) {
            self.sync_markers();
        }
        Ok(outcome)
    }

    /// Cached cafes in insertion order.
    pub fn cafes(&self) -> Vec<CafeRecord> {
        self.read_cache().records().to_vec()
    }

    /// Cached cafes annotated with their distance from `origin`.
    pub fn cafes_from(&self, origin: LatLng) -> Vec<CafeRecord> {
        self.read_cache()
            .records()
            .iter()
            .map(|record| record.with_distance_from(origin))
            .collect()
    }

    /// Reads one cafe from the store for the detail view.
    pub async fn cafe_detail(&self, id: &str) -> SessionResult<Option<CafeRecord>> {
        Ok(self.store.get_by_id(id).await?)
    }

    /// Serializes the cache as a pretty JSON array.
    pub fn export_json(&self) -> SessionResult<ExportFile> {
        let cache = self.read_cache();
        let contents =
            serde_json::to_string_pretty(cache.records()).map_err(SessionError::Export)?;
        Ok(ExportFile {
            file_name: export_file_name(cache.len()),
            contents,
        })
    }

    /// Requests the user's position within the configured timeout.
    pub async fn locate_user(&self, provider: &dyn Geolocation) -> Option<LatLng> {
        geolocation::locate_user(
            provider,
            self.config.geolocation_timeout(),
            &self.notifications,
        )
        .await
    }

    pub fn marker(&self, id: &str) -> Option<Arc<MarkerController>> {
        self.lock_markers()
            .iter()
            .find(|marker| marker.cafe_id() == id)
            .cloned()
    }

    /// Live controllers in cache order.
    pub fn markers(&self) -> Vec<Arc<MarkerController>> {
        self.lock_markers().clone()
    }

    /// Closes the pipeline and detaches every marker. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.pipeline.close();
        let markers = std::mem::take(&mut *self.lock_markers());
        for marker in &markers {
            marker.detach();
        }
        info!(
            "event=session_shutdown module=session status=ok detached={}",
            markers.len()
        );
    }

    fn ensure_running(&self) -> SessionResult<()> {
        if self.is_shut_down() {
            return Err(SessionError::ShutDown);
        }
        Ok(())
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, CafeCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_markers(&self) -> MutexGuard<'_, Vec<Arc<MarkerController>>> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reconciles the registry with the cache: one controller per record.
    fn sync_markers(&self) {
        let records = self.cafes();
        let wanted: HashSet<&str> = records.iter().map(|record| record.id.as_str()).collect();

        let mut markers = self.lock_markers();
        let mut kept = Vec::with_capacity(records.len());
        for marker in markers.drain(..) {
            if wanted.contains(marker.cafe_id().as_str()) {
                kept.push(marker);
            } else {
                marker.detach();
            }
        }

        let mut ordered = Vec::with_capacity(records.len());
        for record in records {
            let position = kept
                .iter()
                .position(|marker| marker.cafe_id() == record.id);
            let existing = position.map(|index| kept.swap_remove(index));
            let marker = existing.unwrap_or_else(|| {
                Arc::new(MarkerController::new(
                    record,
                    self.config.marker_transition(),
                    Arc::clone(&self.surface),
                    self.action.clone(),
                ))
            });
            ordered.push(marker);
        }
        *markers = ordered;
    }
}

impl Drop for CafeMapSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// `mapeo_cafes_<count>_items.json`
pub fn export_file_name(count: usize) -> String {
    format!("{EXPORT_FILE_PREFIX}{count}_items.json")
}
