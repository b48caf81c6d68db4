// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod dashboard;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod retry;
pub mod severity;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{EventAggregator, FeedSnapshot};
pub use crate::api::{create_router, AppState};
pub use crate::dashboard::{calculate_percentage_change, DashboardMetrics};
pub use crate::event::{Category, Coordinates, Event, Severity, SourceKind, ThreatLevel};
pub use crate::ingest::config::AggregatorConfig;
pub use crate::ingest::types::{RawRecord, SourceAdapter};
pub use crate::retry::{RetryPolicy, SourceStatus};
