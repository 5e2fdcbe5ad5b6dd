//! Observability Module
//!
//! In-memory fetch metrics

pub mod metrics;

pub use metrics::{FetchMetrics, FetchRecord, FetchResult, HISTORY_LIMIT};
