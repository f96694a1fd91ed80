//! Relay statistics and health reporting for quietrelay.
//!
//! [`Monitor`] keeps the persisted processed/error counters and per-day
//! message counts. It is constructed once at startup, passed to the polling
//! loop, and flushed on shutdown. [`HealthReport`] renders a point-in-time
//! summary combining those counters with a connectivity check.
//!
//! Metric names for the `metrics` facade live in [`definitions`]; crates
//! record them behind their `metrics` feature. [`init_metrics`] installs the
//! Prometheus recorder (`prometheus` feature) so the recorded values can be
//! scraped.
//!
//! ```rust,ignore
//! use quietrelay_metrics::{counter, telegram};
//!
//! counter!(telegram::POSTS_RELAYED_TOTAL, "kind" => "photo").increment(1);
//! ```

mod definitions;
pub mod error;
mod recorder;
mod report;
mod stats;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, init_metrics},
    report::{HealthReport, HealthStatus},
    stats::{DailyCount, Monitor, Stats},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
