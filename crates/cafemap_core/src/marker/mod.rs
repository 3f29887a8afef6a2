//! Interactive map markers.
//!
//! `state` is the pure expand/collapse machine, `controller` drives it with
//! real timers and map listeners, `surface` names the host capabilities.

pub mod controller;
pub mod state;
pub mod surface;

pub use controller::{MarkerController, MarkerView};
pub use state::{MarkerEffect, MarkerEvent, MarkerPhase, MarkerStateMachine, StackOrder};
pub use surface::{MapClickListener, MapListenerId, MapSurface, MarkerAction, Navigator, SystemBrowser};
