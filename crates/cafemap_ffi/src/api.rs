//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Own the process-wide Tokio runtime and the single active map session.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported through `ok=false` envelopes, never thrown.
//! - At most one session is active; opening a new one shuts the old one down.

use crate::surface::BridgeMapSurface;
use cafemap_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AppConfig, CafeMapSession, CafeRecord, GooglePlacesClient, LatLng, LatLngBounds,
    MarkerAction, MarkerView, Notification, ScanError, ScanOutcome, SearchArea, SessionError,
    SqliteCafeStore,
};
use log::{error, info};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::runtime::Runtime;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static ACTIVE: Mutex<Option<ActiveSession>> = Mutex::new(None);

#[derive(Clone)]
struct ActiveSession {
    session: Arc<CafeMapSession>,
    surface: Arc<BridgeMapSurface>,
    /// Links requested by marker clicks, drained by `marker_event`.
    navigations: Arc<Mutex<Vec<String>>>,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Cafe projection for list and detail views.
#[derive(Debug, Clone, PartialEq)]
pub struct CafeItem {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub link: Option<String>,
    pub image_url: Option<String>,
    /// Set only when the caller supplied an origin.
    pub distance_km: Option<f64>,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Result of one viewport scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResponse {
    pub ok: bool,
    /// `added|no_new_items|query_failed|persist_failed|already_scanning|error`.
    pub outcome: String,
    /// Newly added cafes in catalog order.
    pub added: Vec<CafeItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CafeListResponse {
    pub ok: bool,
    pub items: Vec<CafeItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CafeDetailResponse {
    pub ok: bool,
    /// `None` when the id is unknown.
    pub item: Option<CafeItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResponse {
    pub ok: bool,
    pub file_name: String,
    /// Pretty-printed JSON array.
    pub contents: String,
    pub message: String,
}

/// Declarative marker state for the map widget.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerViewItem {
    pub cafe_id: String,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
    /// `collapsed|expanding|expanded`.
    pub phase: String,
    pub elevated: bool,
    /// Photo to render while expanded.
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerEventResponse {
    pub ok: bool,
    pub view: Option<MarkerViewItem>,
    /// External link the host should open, when the click navigated.
    pub navigate_to: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationItem {
    pub id: u64,
    pub message: String,
    /// `info|error|success|new_item`.
    pub kind: String,
}

/// Opens (or reopens) the map session and loads persisted cafes.
///
/// Input semantics:
/// - `db_path`: SQLite file; `None` uses `CAFEMAP_DB_PATH` or the temp dir.
/// - `api_key`: place-search key; `None` uses `CAFEMAP_PLACES_API_KEY`.
///
/// # FFI contract
/// - Async (worker thread), DB-backed execution.
/// - Never panics.
pub fn open_session(db_path: Option<String>, api_key: Option<String>) -> ActionResponse {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(message) => return ActionResponse::failure(message),
    };

    let mut config = AppConfig::from_env();
    if let Some(path) = non_empty(db_path) {
        config.db_path = Some(PathBuf::from(path));
    }
    if let Some(key) = non_empty(api_key) {
        config.places_api_key = Some(key);
    }

    let store = match SqliteCafeStore::open(config.resolved_db_path()) {
        Ok(store) => store,
        Err(err) => return ActionResponse::failure(format!("open_session failed: {err}")),
    };

    let surface = Arc::new(BridgeMapSurface::default());
    let navigations = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&navigations);
    let action = MarkerAction::Callback(Arc::new(move |record: &CafeRecord| {
        if let Some(link) = record.navigable_link() {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(link.to_string());
        }
    }));

    let catalog = Arc::new(GooglePlacesClient::from_config(&config));
    let session = {
        let _entered = runtime.enter();
        Arc::new(CafeMapSession::new(
            config,
            catalog,
            Arc::new(store),
            surface.clone(),
            action,
        ))
    };

    let loaded = runtime.block_on(session.load());
    let previous = lock_active().replace(ActiveSession {
        session: Arc::clone(&session),
        surface,
        navigations,
    });
    if let Some(previous) = previous {
        previous.session.shutdown();
    }

    match loaded {
        Ok(count) => {
            info!("event=ffi_open_session module=ffi status=ok count={count}");
            ActionResponse::success(format!("Loaded {count} cafe(s)."))
        }
        Err(err) => ActionResponse::failure(format!("open_session failed: {err}")),
    }
}

/// Shuts the active session down. No-op without one.
#[flutter_rust_bridge::frb(sync)]
pub fn close_session() -> ActionResponse {
    match lock_active().take() {
        Some(active) => {
            active.session.shutdown();
            ActionResponse::success("Session closed.")
        }
        None => ActionResponse::success("No active session."),
    }
}

/// Scans the visible map rectangle for new cafes.
///
/// # FFI contract
/// - Async (worker thread); performs network and DB work.
/// - Rejected immediately while another scan is running.
/// - Never panics.
pub fn scan_viewport(south: f64, west: f64, north: f64, east: f64) -> ScanResponse {
    let area = SearchArea::Viewport(LatLngBounds::new(
        LatLng::new(south, west),
        LatLng::new(north, east),
    ));
    let result = with_session(|session, runtime| Ok(runtime.block_on(session.scan(area))));

    match result {
        Ok(Ok(ScanOutcome::Added(records))) => ScanResponse {
            ok: true,
            outcome: "added".to_string(),
            message: format!("Added {} cafe(s).", records.len()),
            added: records.iter().map(to_cafe_item).collect(),
        },
        Ok(Ok(ScanOutcome::NoNewItems)) => scan_response(true, "no_new_items", "No new cafes."),
        Ok(Ok(ScanOutcome::QueryFailed)) => {
            scan_response(false, "query_failed", "Search failed.")
        }
        Ok(Ok(ScanOutcome::PersistFailed)) => {
            scan_response(false, "persist_failed", "Saving failed.")
        }
        Ok(Err(SessionError::Scan(ScanError::AlreadyScanning))) => {
            scan_response(false, "already_scanning", "A scan is already running.")
        }
        Ok(Err(err)) => scan_response(false, "error", format!("scan_viewport failed: {err}")),
        Err(message) => scan_response(false, "error", message),
    }
}

/// Lists cached cafes in insertion order, optionally annotated with distance.
#[flutter_rust_bridge::frb(sync)]
pub fn list_cafes(origin_lat: Option<f64>, origin_lng: Option<f64>) -> CafeListResponse {
    let origin = origin_lat.zip(origin_lng).map(|(lat, lng)| LatLng::new(lat, lng));
    match with_session(|session, _| {
        Ok(match origin {
            Some(origin) => session.cafes_from(origin),
            None => session.cafes(),
        })
    }) {
        Ok(records) => CafeListResponse {
            ok: true,
            message: format!("{} cafe(s).", records.len()),
            items: records.iter().map(to_cafe_item).collect(),
        },
        Err(message) => CafeListResponse {
            ok: false,
            items: Vec::new(),
            message,
        },
    }
}

/// Reads one cafe for the detail screen.
pub fn cafe_detail(id: String) -> CafeDetailResponse {
    let id = id.trim().to_string();
    match with_session(|session, runtime| Ok(runtime.block_on(session.cafe_detail(&id)))) {
        Ok(Ok(item)) => CafeDetailResponse {
            ok: true,
            message: if item.is_some() {
                "Found.".to_string()
            } else {
                "Not found.".to_string()
            },
            item: item.as_ref().map(to_cafe_item),
        },
        Ok(Err(err)) => CafeDetailResponse {
            ok: false,
            item: None,
            message: format!("cafe_detail failed: {err}"),
        },
        Err(message) => CafeDetailResponse {
            ok: false,
            item: None,
            message,
        },
    }
}

/// Serializes the cache for download.
#[flutter_rust_bridge::frb(sync)]
pub fn export_cafes() -> ExportResponse {
    match with_session(|session, _| Ok(session.export_json())) {
        Ok(Ok(export)) => ExportResponse {
            ok: true,
            file_name: export.file_name,
            contents: export.contents,
            message: "Exported.".to_string(),
        },
        Ok(Err(err)) => export_failure(format!("export_cafes failed: {err}")),
        Err(message) => export_failure(message),
    }
}

/// Forwards a pointer event to one marker.
///
/// Input semantics:
/// - `event`: `hover_enter|hover_leave|click`.
#[flutter_rust_bridge::frb(sync)]
pub fn marker_event(cafe_id: String, event: String) -> MarkerEventResponse {
    let result = with_active(|active, runtime| {
        let marker = active
            .session
            .marker(cafe_id.trim())
            .ok_or_else(|| format!("unknown marker `{}`", cafe_id.trim()))?;
        let _entered = runtime.enter();
        match event.trim().to_ascii_lowercase().as_str() {
            "hover_enter" => marker.hover_enter(),
            "hover_leave" => marker.hover_leave(),
            "click" => marker.click(),
            other => return Err(format!("unsupported marker event `{other}`")),
        }
        let navigate_to = active
            .navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .last();
        Ok((to_marker_view_item(&marker.view()), navigate_to))
    });

    match result {
        Ok((view, navigate_to)) => MarkerEventResponse {
            ok: true,
            view: Some(view),
            navigate_to,
            message: String::new(),
        },
        Err(message) => MarkerEventResponse {
            ok: false,
            view: None,
            navigate_to: None,
            message,
        },
    }
}

/// Forwards a tap on the bare map; returns how many markers reacted.
#[flutter_rust_bridge::frb(sync)]
pub fn map_clicked() -> u32 {
    with_active(|active, runtime| {
        let _entered = runtime.enter();
        Ok(u32::try_from(active.surface.click()).unwrap_or(u32::MAX))
    })
    .unwrap_or(0)
}

/// Current view of one marker; `None` when unknown or no session.
#[flutter_rust_bridge::frb(sync)]
pub fn marker_view(cafe_id: String) -> Option<MarkerViewItem> {
    with_session(|session, _| Ok(session.marker(cafe_id.trim())))
        .ok()
        .flatten()
        .map(|marker| to_marker_view_item(&marker.view()))
}

/// Live notifications, oldest first.
#[flutter_rust_bridge::frb(sync)]
pub fn live_notifications() -> Vec<NotificationItem> {
    with_session(|session, _| Ok(session.notifications().live()))
        .map(|live| live.iter().map(to_notification_item).collect())
        .unwrap_or_default()
}

/// Dismisses one notification before its TTL.
#[flutter_rust_bridge::frb(sync)]
pub fn dismiss_notification(id: u64) -> bool {
    with_session(|session, _| Ok(session.notifications().remove(id))).unwrap_or(false)
}

fn runtime() -> Result<&'static Runtime, String> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let built = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .enable_io()
        .thread_name("cafemap-worker")
        .build()
        .map_err(|err| {
            error!("event=ffi_runtime module=ffi status=error error={err}");
            format!("runtime init failed: {err}")
        })?;
    // A concurrent caller may have won the race; its runtime is kept.
    Ok(RUNTIME.get_or_init(|| built))
}

fn lock_active() -> std::sync::MutexGuard<'static, Option<ActiveSession>> {
    ACTIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_active<T>(
    f: impl FnOnce(&ActiveSession, &'static Runtime) -> Result<T, String>,
) -> Result<T, String> {
    let runtime = runtime()?;
    // Cloned out so long calls (scans) never hold the registry lock.
    let active = lock_active()
        .clone()
        .ok_or_else(|| "no active session; call open_session first".to_string())?;
    f(&active, runtime)
}

fn with_session<T>(
    f: impl FnOnce(&CafeMapSession, &'static Runtime) -> Result<T, String>,
) -> Result<T, String> {
    with_active(|active, runtime| f(&active.session, runtime))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn scan_response(ok: bool, outcome: &str, message: impl Into<String>) -> ScanResponse {
    ScanResponse {
        ok,
        outcome: outcome.to_string(),
        added: Vec::new(),
        message: message.into(),
    }
}

fn export_failure(message: String) -> ExportResponse {
    ExportResponse {
        ok: false,
        file_name: String::new(),
        contents: String::new(),
        message,
    }
}

fn to_cafe_item(record: &CafeRecord) -> CafeItem {
    CafeItem {
        id: record.id.clone(),
        name: record.name.clone(),
        lat: record.position.lat,
        lng: record.position.lng,
        rating: record.rating,
        review_count: record.review_count,
        link: record.link.clone(),
        image_url: record.image_url.clone(),
        distance_km: record.distance_km,
    }
}

fn to_marker_view_item(view: &MarkerView) -> MarkerViewItem {
    use cafemap_core::marker::{MarkerPhase, StackOrder};

    MarkerViewItem {
        cafe_id: view.cafe_id.clone(),
        title: view.title.clone(),
        lat: view.position.lat,
        lng: view.position.lng,
        phase: match view.phase {
            MarkerPhase::Collapsed => "collapsed",
            MarkerPhase::Expanding => "expanding",
            MarkerPhase::Expanded => "expanded",
        }
        .to_string(),
        elevated: view.stack_order == StackOrder::Elevated,
        image_url: view.image_url.clone(),
    }
}

fn to_notification_item(notification: &Notification) -> NotificationItem {
    NotificationItem {
        id: notification.id,
        message: notification.message.clone(),
        kind: notification.kind.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        close_session, core_version, export_cafes, init_logging, list_cafes, live_notifications,
        map_clicked, marker_event, marker_view, open_session, ping, scan_viewport,
    };

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn session_lifecycle_without_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cafemap.sqlite3");

        std::env::remove_var("CAFEMAP_PLACES_API_KEY");
        let opened = open_session(Some(db_path.display().to_string()), None);
        assert!(opened.ok, "{}", opened.message);

        let scan = scan_viewport(20.95, -89.65, 21.0, -89.58);
        assert!(!scan.ok);
        assert_eq!(scan.outcome, "query_failed");
        assert!(live_notifications()
            .iter()
            .any(|notification| notification.kind == "error"));

        let listed = list_cafes(None, None);
        assert!(listed.ok);

        let export = export_cafes();
        assert!(export.ok, "{}", export.message);
        assert!(export.file_name.starts_with("mapeo_cafes_"));

        let missing = marker_event("missing".to_string(), "click".to_string());
        assert!(!missing.ok);
        assert!(marker_view("missing".to_string()).is_none());
        assert_eq!(map_clicked(), 0);

        assert!(close_session().ok);
        assert!(!list_cafes(None, None).ok);
    }
}
