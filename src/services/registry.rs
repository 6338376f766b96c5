//! Handler registry
//!
//! Maps a library identity to the handler responsible for it

use crate::config::{LibraryConfig, ObserverConfig};
use crate::handlers::ResponseHandler;
use crate::models::ProviderKind;
use crate::services::AiStats;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Registration order of the built-in handlers
///
/// Azure and Rystem identities also contain `OpenAI`, so they must come
/// before the plain OpenAI handler.
pub const DEFAULT_ORDER: [ProviderKind; 5] = [
    ProviderKind::AzureOpenAi,
    ProviderKind::RystemOpenAi,
    ProviderKind::AwsBedrock,
    ProviderKind::Anthropic,
    ProviderKind::OpenAi,
];

/// Ordered set of handlers; the first one claiming a library wins
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<ResponseHandler>,
}

impl HandlerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in SDK handlers with default stream markers, no fallback
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kind in DEFAULT_ORDER {
            registry.register(ResponseHandler::new(kind));
        }
        registry
    }

    /// Build the registry described by observer settings and library config
    pub fn from_settings(observer: &ObserverConfig, library_config: Option<&LibraryConfig>) -> Self {
        let mut registry = Self::new();

        let mut kinds: Vec<ProviderKind> = DEFAULT_ORDER.to_vec();
        if observer.generic_fallback {
            kinds.push(ProviderKind::Generic);
        }

        for kind in kinds {
            if library_config.is_some_and(|config| config.is_disabled(kind)) {
                info!("Provider {} disabled by library configuration", kind);
                continue;
            }

            let mut markers = observer.stream_markers.clone();
            let mut aliases = Vec::new();
            if let Some(config) = library_config {
                markers.extend(config.stream_methods_for(kind).iter().cloned());
                aliases = config.aliases_for(kind);
            }

            registry.register(
                ResponseHandler::new(kind)
                    .with_stream_markers(markers)
                    .with_aliases(aliases),
            );
        }

        info!(
            "Usage handler registry ready with {} providers",
            registry.handlers.len()
        );
        registry
    }

    /// Append a handler; it loses ties against everything registered before it
    pub fn register(&mut self, handler: ResponseHandler) -> &mut Self {
        debug!("Registering usage handler for {}", handler.kind());
        self.handlers.push(handler);
        self
    }

    /// Attach process-wide statistics to every handler
    pub fn with_stats(mut self, stats: Option<Arc<AiStats>>) -> Self {
        for handler in &mut self.handlers {
            handler.set_stats(stats.clone());
        }
        self
    }

    /// Find the handler for a library identity
    ///
    /// Unknown or blank identities are not an error; they just have no handler.
    pub fn resolve(&self, library: &str) -> Option<&ResponseHandler> {
        let handler = self.handlers.iter().find(|h| h.claims(library));
        match handler {
            Some(h) => trace!("Library {} resolved to {}", library, h.kind()),
            None => trace!("No usage handler for library {}", library),
        }
        handler
    }

    /// Registered providers, in resolution order
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.handlers.iter().map(ResponseHandler::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
