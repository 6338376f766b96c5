//! Usage observer
//!
//! Entry point for the interception layer. Every method is infallible from
//! the caller's point of view; a disabled observer or an unsupported library
//! leaves results and streams untouched.

use crate::config::{LibraryConfig, Settings};
use crate::handlers::{Infallible, ObservedStream, ResponseHandler};
use crate::services::{global_stats, AiStats, HandlerRegistry, RequestContext};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, trace};

#[derive(Debug)]
pub struct UsageObserver {
    enabled: bool,
    registry: HandlerRegistry,
    stats: Option<Arc<AiStats>>,
}

impl UsageObserver {
    /// Build an observer from settings and an optional library configuration
    ///
    /// Statistics go to the process-wide instance when enabled.
    pub fn new(settings: &Settings, library_config: Option<&LibraryConfig>) -> Self {
        let stats = settings.observer.record_stats.then(global_stats);
        let registry =
            HandlerRegistry::from_settings(&settings.observer, library_config).with_stats(stats.clone());

        info!(
            "{} v{} observer {} with providers {:?}",
            crate::NAME,
            crate::VERSION,
            if settings.observer.enabled { "enabled" } else { "disabled" },
            registry.kinds()
        );

        Self {
            enabled: settings.observer.enabled,
            registry,
            stats,
        }
    }

    /// Build an observer from the environment and the library config file
    ///
    /// An explicit `USAGE_OBSERVER_LIBRARY_CONFIG` path must load; otherwise
    /// the default locations are searched and may be absent.
    pub fn from_env() -> Result<Self> {
        let settings = Settings::new()?;
        let library_config = match &settings.observer.library_config {
            Some(path) => Some(LibraryConfig::load(path)?),
            None => LibraryConfig::load_default()?,
        };
        Ok(Self::new(&settings, library_config.as_ref()))
    }

    /// Observer that never records anything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            registry: HandlerRegistry::new(),
            stats: None,
        }
    }

    /// Route statistics to `stats` instead of the process-wide instance
    pub fn with_stats(mut self, stats: Arc<AiStats>) -> Self {
        self.registry = self.registry.with_stats(Some(stats.clone()));
        self.stats = Some(stats);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn stats(&self) -> Option<&Arc<AiStats>> {
        self.stats.as_ref()
    }

    /// Record the usage of a completed call
    pub fn on_call_completed(&self, library: &str, call_site: &str, raw: &Value, context: &RequestContext) {
        if !self.enabled {
            return;
        }

        match self.registry.resolve(library) {
            Some(handler) => handler.observe(raw, library, call_site, context),
            None => trace!("Skipping result of {} from unsupported library {}", call_site, library),
        }
    }

    /// Wrap a returned stream of `Result` items; the caller keeps pulling
    /// from the wrapper
    pub fn on_stream<S>(
        &self,
        library: &str,
        call_site: &str,
        stream: S,
        context: &RequestContext,
    ) -> ObservedStream<S> {
        match self.handler_for(library, call_site) {
            Some(handler) => handler.observe_stream(stream, library, call_site, context),
            None => ObservedStream::unobserved(stream),
        }
    }

    /// Wrap a returned stream whose items are chunks themselves
    pub fn on_infallible_stream<S>(
        &self,
        library: &str,
        call_site: &str,
        stream: S,
        context: &RequestContext,
    ) -> ObservedStream<S, Infallible> {
        match self.handler_for(library, call_site) {
            Some(handler) => handler.observe_infallible_stream(stream, library, call_site, context),
            None => ObservedStream::unobserved(stream),
        }
    }

    fn handler_for(&self, library: &str, call_site: &str) -> Option<&ResponseHandler> {
        if !self.enabled {
            return None;
        }

        let handler = self.registry.resolve(library);
        if handler.is_none() {
            trace!("Passing through stream of {} from unsupported library {}", call_site, library);
        }
        handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observer() -> UsageObserver {
        UsageObserver::new(&Settings::default(), None).with_stats(Arc::new(AiStats::new()))
    }

    #[test]
    fn test_disabled_observer_records_nothing() {
        let mut settings = Settings::default();
        settings.observer.enabled = false;
        let observer = UsageObserver::new(&settings, None);
        let ctx = RequestContext::new();

        let raw = json!({"model": "gpt-4o", "usage": {"prompt_tokens": 1, "completion_tokens": 1}});
        observer.on_call_completed("OpenAI", "CompleteChat", &raw, &ctx);
        assert!(ctx.is_empty());

        let stream = observer.on_infallible_stream("OpenAI", "CompleteChatStreaming", vec![raw].into_iter(), &ctx);
        assert!(!stream.is_observed());
        assert!(!UsageObserver::disabled().is_enabled());
    }

    #[test]
    fn test_unsupported_library_is_skipped() {
        let observer = observer();
        let ctx = RequestContext::new();
        observer.on_call_completed("System.Net.Http", "SendAsync", &json!({"Model": "x"}), &ctx);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_null_result_counts_a_default_call() {
        let observer = observer();
        let ctx = RequestContext::new();
        observer.on_call_completed("Anthropic", "CreateMessageAsync", &Value::Null, &ctx);
        assert_eq!(ctx.totals().calls, 1);
        assert_eq!(ctx.usage().model(), "unknown");
    }

    #[test]
    fn test_stats_are_recorded() {
        let observer = observer();
        let ctx = RequestContext::new();
        let raw = json!({"Model": "gpt-4o", "Usage": {"InputTokenCount": 3, "OutputTokenCount": 4}});
        observer.on_call_completed("OpenAI", "CompleteChatAsync", &raw, &ctx);

        let snapshot = observer.stats().unwrap().snapshot();
        assert_eq!(snapshot.total_calls(), 1);
        assert_eq!(snapshot.providers[0].stats.total_tokens, 7);
    }
}
