//! Flutter bridge for the cafe map core.

pub mod api;
mod surface;
