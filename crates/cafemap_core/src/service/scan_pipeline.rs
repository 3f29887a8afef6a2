//! Scan, dedupe and persist pipeline.
//!
//! # Responsibility
//! - Query the place catalog for one area and normalize the hits.
//! - Diff hits against the cache, persist the delta in one bulk insert,
//!   then merge it into the cache.
//! - Surface every outcome as notifications (staggered for new items).
//!
//! # Invariants
//! - At most one scan is in flight; concurrent requests are rejected, not queued.
//! - The cache only ever contains persisted records: merge happens strictly
//!   after a successful insert, never after a failed one.
//! - Query and persist failures mutate nothing and post exactly one error.
//! - After `close`, no in-flight scan mutates the cache or posts anything.

use crate::cache::{CafeCache, DuplicateIdError};
use crate::catalog::{normalize_places, PlaceField, PlaceSearch, SearchArea, SearchRequest};
use crate::config::AppConfig;
use crate::model::cafe::CafeRecord;
use crate::notify::{NotificationKind, NotificationQueue, StaggeredEmitter};
use crate::repo::store::CafeStore;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use uuid::Uuid;

/// Cache handle shared between the pipeline, the session and readers.
pub type SharedCache = Arc<RwLock<CafeCache>>;

type ScanListener = Box<dyn Fn(&ScanOutcome) + Send + Sync>;

/// Terminal result of one scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Every hit was already known; nothing was written.
    NoNewItems,
    /// New records, persisted and merged, in catalog order.
    Added(Vec<CafeRecord>),
    QueryFailed,
    PersistFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Another scan is still running.
    AlreadyScanning,
    /// The owner closed the pipeline while the scan was suspended.
    Closed,
    /// `merge` collided after a fresh diff; indicates a caller ordering bug.
    CacheInvariant(DuplicateIdError),
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyScanning => write!(f, "a scan is already in progress"),
            Self::Closed => write!(f, "scan pipeline is closed"),
            Self::CacheInvariant(err) => write!(f, "cache invariant violated: {err}"),
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CacheInvariant(err) => Some(err),
            Self::AlreadyScanning | Self::Closed => None,
        }
    }
}

/// Exclusive hold on the pipeline's in-flight flag, released on drop.
///
/// While any guard is alive, `scan` returns `AlreadyScanning`.
pub struct ScanGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ScanGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct ScanPipeline {
    catalog: Arc<dyn PlaceSearch>,
    store: Arc<dyn CafeStore>,
    cache: SharedCache,
    notifications: NotificationQueue,
    emitter: StaggeredEmitter,
    text_query: String,
    max_results: u32,
    in_flight: AtomicBool,
    closed: AtomicBool,
    listeners: Mutex<Vec<ScanListener>>,
}

impl ScanPipeline {
    /// Builds the pipeline and starts its staggered emitter.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: &AppConfig,
        catalog: Arc<dyn PlaceSearch>,
        store: Arc<dyn CafeStore>,
        cache: SharedCache,
        notifications: NotificationQueue,
    ) -> Self {
        let config = config.clone().normalized();
        let emitter = StaggeredEmitter::spawn(notifications.clone(), config.stagger());
        Self {
            catalog,
            store,
            cache,
            notifications,
            emitter,
            text_query: config.search_query,
            max_results: config.max_results,
            in_flight: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Registers a callback invoked with every completed outcome.
    pub fn on_scan_complete(&self, listener: impl Fn(&ScanOutcome) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// Whether a scan is currently in flight (drives the disabled trigger).
    pub fn is_scanning(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Takes the in-flight guard without scanning, so cache-wide writers
    /// can run with scans locked out. `None` while a scan or another
    /// holder is active.
    pub fn try_exclusive(&self) -> Option<ScanGuard<'_>> {
        ScanGuard::try_acquire(&self.in_flight)
    }

    /// Abandons in-flight work and stops pending new-item notifications.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.emitter.close();
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Runs one scan over `area`.
    ///
    /// # Errors
    /// - `AlreadyScanning` when another scan holds the in-flight guard.
    /// - `Closed` when the pipeline is (or becomes) closed.
    /// - `CacheInvariant` if the cache changed under the guard.
    pub async fn scan(&self, area: SearchArea) -> Result<ScanOutcome, ScanError> {
        if self.is_closed() {
            return Err(ScanError::Closed);
        }
        let Some(_guard) = ScanGuard::try_acquire(&self.in_flight) else {
            info!("event=scan module=scan status=rejected reason=already_scanning");
            return Err(ScanError::AlreadyScanning);
        };

        let scan_id = Uuid::new_v4();
        let started_at = Instant::now();
        info!("event=scan module=scan status=start scan_id={scan_id}");

        let request = SearchRequest {
            text_query: self.text_query.clone(),
            area,
            fields: PlaceField::SCAN_FIELDS,
            max_results: self.max_results,
        };
        let queried = self.catalog.search_by_text(&request).await;
        self.ensure_open()?;

        let mut raw = match queried {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    "event=scan module=scan status=error stage=query scan_id={} error={}",
                    scan_id, err
                );
                self.notifications.push(
                    "Could not search this area. Try again.",
                    NotificationKind::Error,
                );
                return Ok(self.finish(scan_id, started_at, ScanOutcome::QueryFailed));
            }
        };
        raw.truncate(self.max_results as usize);
        let normalized = normalize_places(raw);

        let new_records = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .diff_new(&normalized);
        if new_records.is_empty() {
            self.notifications
                .push("No new cafes in this area.", NotificationKind::Info);
            return Ok(self.finish(scan_id, started_at, ScanOutcome::NoNewItems));
        }

        let persisted = self.store.insert_many(&new_records).await;
        self.ensure_open()?;

        if let Err(err) = persisted {
            error!(
                "event=scan module=scan status=error stage=persist scan_id={} count={} error={}",
                scan_id,
                new_records.len(),
                err
            );
            self.notifications.push(
                format!("Could not save {} new cafes. Try again.", new_records.len()),
                NotificationKind::Error,
            );
            return Ok(self.finish(scan_id, started_at, ScanOutcome::PersistFailed));
        }

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(new_records.clone())
            .map_err(|err| {
                error!(
                    "event=scan module=scan status=error stage=merge scan_id={} error={}",
                    scan_id, err
                );
                ScanError::CacheInvariant(err)
            })?;

        self.emitter.enqueue_batch(
            new_records
                .iter()
                .map(|record| (format!("New cafe: {}", record.name), NotificationKind::NewItem)),
        );

        Ok(self.finish(scan_id, started_at, ScanOutcome::Added(new_records)))
    }

    fn ensure_open(&self) -> Result<(), ScanError> {
        if self.is_closed() {
            info!("event=scan module=scan status=abandoned reason=closed");
            return Err(ScanError::Closed);
        }
        Ok(())
    }

    fn finish(&self, scan_id: Uuid, started_at: Instant, outcome: ScanOutcome) -> ScanOutcome {
        let added = match &outcome {
            ScanOutcome::Added(records) => records.len(),
            _ => 0,
        };
        info!(
            "event=scan module=scan status=done scan_id={} outcome={} added={} duration_ms={}",
            scan_id,
            outcome_label(&outcome),
            added,
            started_at.elapsed().as_millis()
        );
        for listener in self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            listener(&outcome);
        }
        outcome
    }
}

fn outcome_label(outcome: &ScanOutcome) -> &'static str {
    match outcome {
        ScanOutcome::NoNewItems => "no_new_items",
        ScanOutcome::Added(_) => "added",
        ScanOutcome::QueryFailed => "query_failed",
        ScanOutcome::PersistFailed => "persist_failed",
    }
}
