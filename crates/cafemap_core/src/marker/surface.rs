//! Host capabilities a marker controller depends on.
//!
//! The map provider and the browser are injected; no marker ever reaches for a
//! process-wide handle.

use crate::model::cafe::CafeRecord;
use log::warn;
use std::sync::Arc;

pub type MapListenerId = u64;

/// Listener invoked on a click anywhere on the map surface.
pub type MapClickListener = Arc<dyn Fn() + Send + Sync>;

/// Map surface hosting the markers.
///
/// Implementations must not hold internal locks while invoking listeners:
/// a listener removes itself from inside its own invocation.
pub trait MapSurface: Send + Sync {
    fn add_click_listener(&self, listener: MapClickListener) -> MapListenerId;
    /// Removing an unknown id is a no-op.
    fn remove_click_listener(&self, id: MapListenerId);
}

/// Opens external links.
pub trait Navigator: Send + Sync {
    fn open_link(&self, url: &str) -> std::io::Result<()>;
}

/// Opens links with the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Navigator for SystemBrowser {
    fn open_link(&self, url: &str) -> std::io::Result<()> {
        open::that_detached(url)
    }
}

/// What a click on an already expanded marker does.
#[derive(Clone)]
pub enum MarkerAction {
    /// Opens the record's link; no-op when the record has none.
    OpenLink(Arc<dyn Navigator>),
    /// Caller-supplied navigation, e.g. routing to a detail screen.
    Callback(Arc<dyn Fn(&CafeRecord) + Send + Sync>),
}

impl MarkerAction {
    pub fn system_browser() -> Self {
        Self::OpenLink(Arc::new(SystemBrowser))
    }

    pub(crate) fn run(&self, record: &CafeRecord) {
        match self {
            Self::Callback(callback) => callback(record),
            Self::OpenLink(navigator) => {
                let Some(link) = record.navigable_link() else {
                    return;
                };
                if let Err(err) = navigator.open_link(link) {
                    warn!(
                        "event=marker_navigate module=marker status=error id={} error={}",
                        record.id, err
                    );
                }
            }
        }
    }
}
