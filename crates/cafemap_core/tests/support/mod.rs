//! Test doubles shared by the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use cafemap_core::marker::{MapClickListener, MapListenerId};
use cafemap_core::{
    CafeId, CafeRecord, CafeStore, CatalogError, CatalogResult, LatLng, LatLngBounds,
    MapSurface, PlaceSearch, RawPlace, RepoError, RepoResult, SearchArea, SearchRequest,
    SqliteCafeStore,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn raw(id: &str, name: &str, lat: f64, lng: f64) -> RawPlace {
    RawPlace {
        id: id.to_string(),
        display_name: Some(name.to_string()),
        location: Some(LatLng::new(lat, lng)),
        ..RawPlace::default()
    }
}

pub fn cafe_a() -> RawPlace {
    raw("a", "Café A", 20.97, -89.61)
}

pub fn cafe_b() -> RawPlace {
    raw("b", "Café B", 20.98, -89.62)
}

pub fn viewport() -> SearchArea {
    SearchArea::Viewport(LatLngBounds::new(
        LatLng::new(20.95, -89.65),
        LatLng::new(21.0, -89.58),
    ))
}

/// Catalog returning a configurable response, optionally held behind a gate.
#[derive(Default)]
pub struct FakeCatalog {
    places: Mutex<Vec<RawPlace>>,
    fail: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl FakeCatalog {
    pub fn returning(places: Vec<RawPlace>) -> Arc<Self> {
        let catalog = Self::default();
        *catalog.places.lock().unwrap() = places;
        Arc::new(catalog)
    }

    pub fn set_places(&self, places: Vec<RawPlace>) {
        *self.places.lock().unwrap() = places;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Subsequent searches wait until the returned handle is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaceSearch for FakeCatalog {
    async fn search_by_text(&self, request: &SearchRequest) -> CatalogResult<Vec<RawPlace>> {
        self.requests.lock().unwrap().push(request.clone());
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CatalogError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.places.lock().unwrap().clone())
    }
}

/// In-memory SQLite store that records insert batches and can be told to fail.
pub struct RecordingStore {
    inner: SqliteCafeStore,
    fail_inserts: AtomicBool,
    fail_reads: AtomicBool,
    read_gate: Mutex<Option<Arc<Notify>>>,
    insert_calls: Mutex<Vec<Vec<CafeId>>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteCafeStore::in_memory().unwrap(),
            fail_inserts: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            read_gate: Mutex::new(None),
            insert_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_failing_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_failing_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Subsequent reads snapshot the rows, then wait on the returned handle.
    pub fn hold_reads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.read_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn insert_calls(&self) -> Vec<Vec<CafeId>> {
        self.insert_calls.lock().unwrap().clone()
    }

    pub async fn seed(&self, records: &[CafeRecord]) {
        self.inner.insert_many(records).await.unwrap();
    }
}

#[async_trait]
impl CafeStore for RecordingStore {
    async fn read_all(&self) -> RepoResult<Vec<CafeRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable("read refused".to_string()));
        }
        let snapshot = self.inner.read_all().await;
        let gate = self.read_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        snapshot
    }

    async fn insert_many(&self, records: &[CafeRecord]) -> RepoResult<usize> {
        self.insert_calls
            .lock()
            .unwrap()
            .push(records.iter().map(|record| record.id.clone()).collect());
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable("write refused".to_string()));
        }
        self.inner.insert_many(records).await
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<CafeRecord>> {
        self.inner.get_by_id(id).await
    }
}

/// Map surface keeping listeners in a map; `click_map` fires all of them.
#[derive(Default)]
pub struct FakeSurface {
    next_id: AtomicUsize,
    listeners: Mutex<BTreeMap<MapListenerId, MapClickListener>>,
}

impl FakeSurface {
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn click_map(&self) {
        let snapshot: Vec<MapClickListener> =
            self.listeners.lock().unwrap().values().cloned().collect();
        for listener in snapshot {
            listener();
        }
    }
}

impl MapSurface for FakeSurface {
    fn add_click_listener(&self, listener: MapClickListener) -> MapListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as MapListenerId;
        self.listeners.lock().unwrap().insert(id, listener);
        id
    }

    fn remove_click_listener(&self, id: MapListenerId) {
        self.listeners.lock().unwrap().remove(&id);
    }
}
