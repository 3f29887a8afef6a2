//! Core domain model definitions.
//!
//! # Responsibility
//! - Define the canonical cafe record shared by cache, store and markers.
//! - Keep identity and coordinate validation close to the data shape.

pub mod cafe;
