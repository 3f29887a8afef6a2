//! Runtime owner of one marker's state machine.
//!
//! # Responsibility
//! - Feed pointer and map events into `MarkerStateMachine`.
//! - Run its effects: transition timers, the one-shot map-click listener and
//!   navigation.
//! - Publish a declarative `MarkerView` on a watch channel after every event.
//!
//! # Invariants
//! - Only this marker's timer touches this marker's state.
//! - After `detach`, no timer, listener or navigation callback fires.
//! - Map surface and navigation calls happen outside the state lock.

use super::state::{MarkerEffect, MarkerEvent, MarkerPhase, MarkerStateMachine, StackOrder};
use super::surface::{MapListenerId, MapSurface, MarkerAction};
use crate::model::cafe::{CafeId, CafeRecord, LatLng};
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// What the rendering layer binds to.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerView {
    pub cafe_id: CafeId,
    pub title: String,
    pub position: LatLng,
    pub phase: MarkerPhase,
    pub stack_order: StackOrder,
    /// Photo to show while expanded; `None` falls back to the marker color.
    pub image_url: Option<String>,
    pub detached: bool,
}

impl MarkerView {
    pub fn is_expanded(&self) -> bool {
        self.phase != MarkerPhase::Collapsed
    }
}

struct ControllerInner {
    record: CafeRecord,
    machine: MarkerStateMachine,
    surface: Arc<dyn MapSurface>,
    action: MarkerAction,
    timer: Option<JoinHandle<()>>,
    map_listener: Option<MapListenerId>,
    view_tx: watch::Sender<MarkerView>,
    detached: bool,
}

impl ControllerInner {
    fn view(&self) -> MarkerView {
        MarkerView {
            cafe_id: self.record.id.clone(),
            title: self.record.name.clone(),
            position: self.record.position,
            phase: self.machine.phase(),
            stack_order: self.machine.stack_order(),
            image_url: self.record.image_url.clone(),
            detached: self.detached,
        }
    }

    fn publish(&self) {
        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }
}

/// Surface/navigation work collected under the lock and run after it.
enum Deferred {
    Register,
    Remove(MapListenerId),
    Navigate(MarkerAction, CafeRecord),
}

/// One controller per rendered cafe.
pub struct MarkerController {
    shared: Arc<Mutex<ControllerInner>>,
    view_rx: watch::Receiver<MarkerView>,
}

impl MarkerController {
    /// Creates a collapsed marker bound to `record.position`.
    pub fn new(
        record: CafeRecord,
        transition: Duration,
        surface: Arc<dyn MapSurface>,
        action: MarkerAction,
    ) -> Self {
        let machine = MarkerStateMachine::new(transition);
        let initial = MarkerView {
            cafe_id: record.id.clone(),
            title: record.name.clone(),
            position: record.position,
            phase: machine.phase(),
            stack_order: machine.stack_order(),
            image_url: record.image_url.clone(),
            detached: false,
        };
        let (view_tx, view_rx) = watch::channel(initial);
        Self {
            shared: Arc::new(Mutex::new(ControllerInner {
                record,
                machine,
                surface,
                action,
                timer: None,
                map_listener: None,
                view_tx,
                detached: false,
            })),
            view_rx,
        }
    }

    pub fn cafe_id(&self) -> CafeId {
        lock(&self.shared).record.id.clone()
    }

    /// Current view snapshot.
    pub fn view(&self) -> MarkerView {
        self.view_rx.borrow().clone()
    }

    /// Subscribes to view changes.
    pub fn subscribe(&self) -> watch::Receiver<MarkerView> {
        self.view_rx.clone()
    }

    pub fn hover_enter(&self) {
        dispatch(&self.shared, MarkerEvent::HoverEnter);
    }

    pub fn hover_leave(&self) {
        dispatch(&self.shared, MarkerEvent::HoverLeave);
    }

    /// Timer-driven transitions need a Tokio runtime.
    pub fn click(&self) {
        dispatch(&self.shared, MarkerEvent::Click);
    }

    pub fn is_detached(&self) -> bool {
        lock(&self.shared).detached
    }

    /// Releases the timer and listener. Terminal and idempotent.
    pub fn detach(&self) {
        let (surface, listener) = {
            let mut inner = lock(&self.shared);
            if inner.detached {
                return;
            }
            inner.detached = true;
            if let Some(timer) = inner.timer.take() {
                timer.abort();
            }
            let listener = inner.map_listener.take();
            inner.publish();
            (Arc::clone(&inner.surface), listener)
        };
        if let Some(id) = listener {
            surface.remove_click_listener(id);
        }
        debug!("event=marker_detach module=marker status=ok");
    }
}

impl Drop for MarkerController {
    fn drop(&mut self) {
        self.detach();
    }
}

fn lock(shared: &Arc<Mutex<ControllerInner>>) -> MutexGuard<'_, ControllerInner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn dispatch(shared: &Arc<Mutex<ControllerInner>>, event: MarkerEvent) {
    let (deferred, surface) = {
        let mut inner = lock(shared);
        if inner.detached {
            return;
        }

        let effects = inner.machine.handle(event, Instant::now());
        let mut deferred = Vec::new();
        for effect in effects {
            match effect {
                MarkerEffect::StartTransitionTimer { deadline } => {
                    let timer = spawn_transition_timer(Arc::downgrade(shared), deadline);
                    if let Some(previous) = inner.timer.replace(timer) {
                        previous.abort();
                    }
                }
                MarkerEffect::RegisterMapClick => deferred.push(Deferred::Register),
                MarkerEffect::RemoveMapClick => {
                    if let Some(id) = inner.map_listener.take() {
                        deferred.push(Deferred::Remove(id));
                    }
                }
                MarkerEffect::Navigate => {
                    deferred.push(Deferred::Navigate(inner.action.clone(), inner.record.clone()))
                }
            }
        }
        if event == MarkerEvent::TransitionElapsed {
            inner.timer = None;
        }
        inner.publish();
        (deferred, Arc::clone(&inner.surface))
    };

    for work in deferred {
        match work {
            Deferred::Register => {
                let weak = Arc::downgrade(shared);
                let id = surface.add_click_listener(Arc::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        dispatch(&shared, MarkerEvent::MapClick);
                    }
                }));
                let mut inner = lock(shared);
                if inner.detached || !inner.machine.map_click_armed() {
                    drop(inner);
                    surface.remove_click_listener(id);
                } else {
                    inner.map_listener = Some(id);
                }
            }
            Deferred::Remove(id) => surface.remove_click_listener(id),
            Deferred::Navigate(action, record) => action.run(&record),
        }
    }
}

fn spawn_transition_timer(weak: Weak<Mutex<ControllerInner>>, deadline: Instant) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep_until(deadline).await;
        if let Some(shared) = weak.upgrade() {
            dispatch(&shared, MarkerEvent::TransitionElapsed);
        }
    })
}
