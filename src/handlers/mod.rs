//! Response handlers module
//!
//! A handler binds one provider's parser to the call sites of its SDK:
//! it decides whether a call streams, runs the parser with panics
//! contained, and commits the result to the request context.

pub mod stream;

pub use stream::{
    AggregationState, Fallible, Infallible, ObserveMode, ObservedStream, Passthrough, StreamAggregator,
};

use crate::models::{CallSite, LibraryIdentity, ProviderKind, UsageRecord};
use crate::providers::{parser_for, ResponseParser};
use crate::services::{AiStats, RequestContext};
use crate::utils::error::{log_usage_error, UsageError};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// Default method-name fragment marking a streaming call
pub const DEFAULT_STREAM_MARKER: &str = "stream";

/// Run a parser, turning a panic into a default record
///
/// Containment happens after unwinding, so the process panic hook still
/// runs first: the default hook prints the panic to stderr and a host's
/// custom hook (crash reporter, abort) fires as for any other panic. Under
/// `panic = "abort"` nothing is contained at all.
pub(crate) fn guarded_extract(
    parser: &dyn ResponseParser,
    raw: &Value,
    library: &str,
    call_site: &str,
    chunk: bool,
) -> UsageRecord {
    let identity = LibraryIdentity::new(library);
    let site = CallSite::new(call_site);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        if chunk {
            parser.extract_chunk(raw, identity, site)
        } else {
            parser.extract(raw, identity, site)
        }
    }));

    match result {
        Ok(record) => record,
        Err(payload) => {
            log_usage_error(&UsageError::from_panic(payload.as_ref()), library, "Usage extraction");
            UsageRecord::unknown()
        }
    }
}

/// Record one finished call in the request context and the global stats
pub(crate) fn commit_usage(
    kind: ProviderKind,
    record: &UsageRecord,
    context: &RequestContext,
    stats: Option<&AiStats>,
) {
    context.commit(record);
    if let Some(stats) = stats {
        stats.on_ai_call(kind, record, context.route());
    }
}

/// Handler for one provider
pub struct ResponseHandler {
    kind: ProviderKind,
    parser: &'static dyn ResponseParser,
    /// Extra library identity substrings claimed besides the parser's marker
    aliases: Vec<String>,
    /// Lowercased method-name fragments marking a streaming call
    stream_markers: Vec<String>,
    stats: Option<Arc<AiStats>>,
}

impl ResponseHandler {
    /// Handler with the built-in parser for `kind`
    pub fn new(kind: ProviderKind) -> Self {
        Self::with_parser(kind, parser_for(kind))
    }

    /// Handler driving a custom parser
    pub fn with_parser(kind: ProviderKind, parser: &'static dyn ResponseParser) -> Self {
        Self {
            kind,
            parser,
            aliases: Vec::new(),
            stream_markers: vec![DEFAULT_STREAM_MARKER.to_string()],
            stats: None,
        }
    }

    pub fn with_aliases(mut self, aliases: impl IntoIterator<Item = String>) -> Self {
        self.aliases = aliases
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        self
    }

    /// Replace the stream markers; blank markers are ignored
    pub fn with_stream_markers(mut self, markers: impl IntoIterator<Item = String>) -> Self {
        let mut normalized: Vec<String> = Vec::new();
        for marker in markers {
            let marker = marker.trim().to_lowercase();
            if !marker.is_empty() && !normalized.contains(&marker) {
                normalized.push(marker);
            }
        }
        self.stream_markers = normalized;
        self
    }

    pub fn with_stats(mut self, stats: Arc<AiStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub(crate) fn set_stats(&mut self, stats: Option<Arc<AiStats>>) {
        self.stats = stats;
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn stream_markers(&self) -> &[String] {
        &self.stream_markers
    }

    /// Whether this handler is authoritative for `library`
    pub fn claims(&self, library: &str) -> bool {
        let identity = LibraryIdentity::new(library);
        if identity.is_blank() {
            return false;
        }

        self.parser.claims(identity) || self.aliases.iter().any(|alias| identity.contains_marker(alias))
    }

    /// Classify a call site by its simple method name alone
    pub fn is_streaming_call_site(&self, call_site: &str) -> bool {
        let method = CallSite::new(call_site).method_name().to_lowercase();
        self.stream_markers.iter().any(|marker| method.contains(marker.as_str()))
    }

    /// Observe a materialized result and commit its usage
    ///
    /// For a streaming call site, a JSON array is taken as the chunk
    /// sequence and any other value as a single chunk.
    pub fn observe(&self, raw: &Value, library: &str, call_site: &str, context: &RequestContext) {
        if self.is_streaming_call_site(call_site) {
            let mut aggregator = self.aggregator(library, call_site, context);
            match raw {
                Value::Array(chunks) => chunks.iter().for_each(|chunk| aggregator.observe_value(chunk)),
                chunk => aggregator.observe_value(chunk),
            }
            aggregator.commit();
            return;
        }

        let record = guarded_extract(self.parser, raw, library, call_site, false);
        debug!("Extracted {} from {} call {}", record, self.kind, call_site);
        commit_usage(self.kind, &record, context, self.stats.as_deref());
    }

    /// Wrap a lazily produced sequence of `Result` items so its usage is
    /// committed as it is consumed; the first `Err` item ends the call
    pub fn observe_stream<S>(
        &self,
        stream: S,
        library: &str,
        call_site: &str,
        context: &RequestContext,
    ) -> ObservedStream<S> {
        self.wrap(stream, library, call_site, context)
    }

    /// Wrap a sequence whose items are chunks themselves
    pub fn observe_infallible_stream<S>(
        &self,
        stream: S,
        library: &str,
        call_site: &str,
        context: &RequestContext,
    ) -> ObservedStream<S, Infallible> {
        self.wrap(stream, library, call_site, context)
    }

    fn wrap<S, M>(&self, stream: S, library: &str, call_site: &str, context: &RequestContext) -> ObservedStream<S, M> {
        if !self.is_streaming_call_site(call_site) {
            debug!(
                "Call site {} is not classified as streaming; observing its items as chunks",
                call_site
            );
        }
        ObservedStream::new(stream, self.aggregator(library, call_site, context))
    }

    fn aggregator(&self, library: &str, call_site: &str, context: &RequestContext) -> StreamAggregator {
        StreamAggregator::new(self.kind, self.parser, library, call_site, context, self.stats.clone())
    }
}

impl std::fmt::Debug for ResponseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandler")
            .field("kind", &self.kind)
            .field("aliases", &self.aliases)
            .field("stream_markers", &self.stream_markers)
            .field("records_stats", &self.stats.is_some())
            .finish()
    }
}
