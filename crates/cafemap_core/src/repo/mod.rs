//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the keyed cafe store contract consumed by the scan pipeline.
//! - Isolate SQLite query details from pipeline orchestration.
//!
//! # Invariants
//! - Repository writes validate records before persistence.
//! - A bulk insert either lands completely or not at all.

pub mod cafe_repo;
pub mod store;
