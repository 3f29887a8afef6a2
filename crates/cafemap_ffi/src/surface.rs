//! Map surface backed by the Dart map widget.
//!
//! Dart cannot hand closures across the bridge, so listeners live here and
//! the widget forwards raw map taps through `api::map_clicked`.

use cafemap_core::marker::{MapClickListener, MapListenerId, MapSurface};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
pub(crate) struct BridgeMapSurface {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<MapListenerId, MapClickListener>>,
}

impl BridgeMapSurface {
    /// Fires every registered listener; returns how many ran.
    pub(crate) fn click(&self) -> usize {
        // Listeners remove themselves, so never call them under the lock.
        let snapshot: Vec<MapClickListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in &snapshot {
            listener();
        }
        snapshot.len()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl MapSurface for BridgeMapSurface {
    fn add_click_listener(&self, listener: MapClickListener) -> MapListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, listener);
        id
    }

    fn remove_click_listener(&self, id: MapListenerId) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}
