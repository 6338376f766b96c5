//! Service layer module
//!
//! Contains the handler registry, request context, process-wide statistics
//! and the observer entry point

pub mod context;
pub mod observer;
pub mod registry;
pub mod stats;

pub use context::{RequestContext, UsageTotals};
pub use observer::UsageObserver;
pub use registry::{HandlerRegistry, DEFAULT_ORDER};
pub use stats::{global_stats, AiStats, AiStatsSnapshot, ModelStats, ProviderStats, RouteStats};
