//! Pure expand/collapse state machine for one marker.
//!
//! The machine never touches clocks, timers or the map. Each event returns the
//! effects the owner must perform, and the owner feeds `TransitionElapsed`
//! back once the deadline it was given passes.
//!
//! # Invariants
//! - `Expanding` or `Expanded` implies elevated stacking; `Collapsed` implies default.
//! - `Expanded` implies `hovered`.
//! - A transition deadline is pending iff the phase is `Expanding`.
//! - At most one map-click listener is armed at a time.
//! - Hover re-entering during a transition never restarts its timer.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerPhase {
    Collapsed,
    /// Transition animating; resolves when the transition timer elapses.
    Expanding,
    Expanded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOrder {
    Default,
    Elevated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerEvent {
    HoverEnter,
    HoverLeave,
    Click,
    /// Click anywhere on the map surface outside the marker.
    MapClick,
    TransitionElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerEffect {
    StartTransitionTimer { deadline: Instant },
    RegisterMapClick,
    RemoveMapClick,
    Navigate,
}

/// Transient per-marker visual state. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerVisualState {
    pub phase: MarkerPhase,
    pub hovered: bool,
    pub pending_collapse_deadline: Option<Instant>,
}

impl Default for MarkerVisualState {
    fn default() -> Self {
        Self {
            phase: MarkerPhase::Collapsed,
            hovered: false,
            pending_collapse_deadline: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkerStateMachine {
    state: MarkerVisualState,
    transition: Duration,
    map_click_armed: bool,
}

impl MarkerStateMachine {
    pub fn new(transition: Duration) -> Self {
        Self {
            state: MarkerVisualState::default(),
            transition,
            map_click_armed: false,
        }
    }

    pub fn state(&self) -> MarkerVisualState {
        self.state
    }

    pub fn phase(&self) -> MarkerPhase {
        self.state.phase
    }

    /// Externally observable expansion: `Expanding` already counts.
    pub fn is_expanded(&self) -> bool {
        self.state.phase != MarkerPhase::Collapsed
    }

    pub fn stack_order(&self) -> StackOrder {
        if self.is_expanded() {
            StackOrder::Elevated
        } else {
            StackOrder::Default
        }
    }

    pub fn map_click_armed(&self) -> bool {
        self.map_click_armed
    }

    /// Applies one event at time `now` and returns the effects to perform.
    pub fn handle(&mut self, event: MarkerEvent, now: Instant) -> Vec<MarkerEffect> {
        let mut effects = Vec::new();
        match event {
            MarkerEvent::HoverEnter => {
                self.state.hovered = true;
                self.start_expand(now, &mut effects);
            }
            MarkerEvent::HoverLeave => {
                self.state.hovered = false;
                self.collapse_unless_animating();
            }
            MarkerEvent::Click => {
                if self.is_expanded() {
                    effects.push(MarkerEffect::Navigate);
                } else {
                    // Touch path: a click stands in for hover until the map is clicked.
                    self.state.hovered = true;
                    self.start_expand(now, &mut effects);
                    if !self.map_click_armed {
                        self.map_click_armed = true;
                        effects.push(MarkerEffect::RegisterMapClick);
                    }
                }
            }
            MarkerEvent::MapClick => {
                if self.map_click_armed {
                    self.map_click_armed = false;
                    effects.push(MarkerEffect::RemoveMapClick);
                    self.state.hovered = false;
                    self.collapse_unless_animating();
                }
            }
            MarkerEvent::TransitionElapsed => {
                if self.state.phase == MarkerPhase::Expanding {
                    self.state.pending_collapse_deadline = None;
                    self.state.phase = if self.state.hovered {
                        MarkerPhase::Expanded
                    } else {
                        MarkerPhase::Collapsed
                    };
                }
            }
        }
        effects
    }

    fn start_expand(&mut self, now: Instant, effects: &mut Vec<MarkerEffect>) {
        if self.state.phase != MarkerPhase::Collapsed {
            return;
        }
        let deadline = now + self.transition;
        self.state.phase = MarkerPhase::Expanding;
        self.state.pending_collapse_deadline = Some(deadline);
        effects.push(MarkerEffect::StartTransitionTimer { deadline });
    }

    fn collapse_unless_animating(&mut self) {
        if self.state.phase == MarkerPhase::Expanded {
            self.state.phase = MarkerPhase::Collapsed;
        }
    }
}
