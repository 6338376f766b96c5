//! LLM usage observer library
//!
//! Extracts normalized usage (model, input and output tokens) from the results
//! of AI client libraries and accumulates it per request, without ever
//! changing what the instrumented application sees.
//!
//! ```no_run
//! use llmusage::{RequestContext, Settings, UsageObserver};
//! use serde_json::json;
//!
//! let observer = UsageObserver::new(&Settings::default(), None);
//! let ctx = RequestContext::with_route("POST /chat");
//!
//! let raw = json!({"model": "gpt-4o", "usage": {"prompt_tokens": 12, "completion_tokens": 3}});
//! observer.on_call_completed("OpenAI", "OpenAI.Chat.ChatClient.CompleteChat", &raw, &ctx);
//!
//! assert_eq!(ctx.usage().input_tokens(), 12);
//! ```

pub mod config;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod services;
pub mod utils;

// Re-export common types
pub use config::{LibraryConfig, Settings};
pub use handlers::{AggregationState, Fallible, Infallible, ObservedStream, Passthrough, ResponseHandler};
pub use models::{CallSite, LibraryIdentity, ProviderKind, UsageRecord, UNKNOWN_MODEL};
pub use providers::ResponseParser;
pub use services::{AiStats, AiStatsSnapshot, HandlerRegistry, RequestContext, UsageObserver};
pub use utils::error::{UsageError, UsageResult};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

