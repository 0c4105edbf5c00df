//! Observability: structured logging setup and per-client counters

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{DispatchMetrics, DropReason, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{dispatch_span, mqtt_span};
