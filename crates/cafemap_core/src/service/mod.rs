//! Use-case orchestration on top of cache, catalog and store.

pub mod scan_pipeline;
pub mod session;
