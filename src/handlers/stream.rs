//! Stream observation
//!
//! [`ObservedStream`] wraps the stream (or iterator) an SDK returned and is
//! handed back to the caller in its place. Items pass through unchanged and
//! in order; each one is also parsed and folded into an aggregate that is
//! committed exactly once, when the sequence ends, yields an error, or is
//! dropped early.
//!
//! The item mode decides how items are read: [`Fallible`] sequences yield
//! `Result` items and end the call on the first error, [`Infallible`] ones
//! yield chunks directly, and [`Passthrough`] wrappers read nothing.

use super::{commit_usage, guarded_extract};
use crate::models::{ProviderKind, UsageRecord};
use crate::providers::ResponseParser;
use crate::services::{AiStats, RequestContext};
use crate::utils::error::{log_usage_error, UsageError};
use pin_project_lite::pin_project;
use serde::Serialize;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_stream::Stream;
use tracing::{debug, trace};

/// Lifecycle of one stream aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationState {
    /// Nothing pulled yet
    Idle,
    /// At least one chunk observed
    Accumulating,
    /// Aggregate handed to the request context; terminal
    Committed,
}

/// Running aggregate for one observed stream
///
/// Dropping an aggregator that has not committed yet commits it, which is
/// how early termination by the caller is recorded.
pub struct StreamAggregator {
    kind: ProviderKind,
    parser: &'static dyn ResponseParser,
    library: String,
    call_site: String,
    context: RequestContext,
    stats: Option<Arc<AiStats>>,
    state: AggregationState,
    aggregate: UsageRecord,
    chunks: u64,
}

impl StreamAggregator {
    pub(crate) fn new(
        kind: ProviderKind,
        parser: &'static dyn ResponseParser,
        library: &str,
        call_site: &str,
        context: &RequestContext,
        stats: Option<Arc<AiStats>>,
    ) -> Self {
        Self {
            kind,
            parser,
            library: library.to_string(),
            call_site: call_site.to_string(),
            context: context.clone(),
            stats,
            state: AggregationState::Idle,
            aggregate: UsageRecord::unknown(),
            chunks: 0,
        }
    }

    pub fn state(&self) -> AggregationState {
        self.state
    }

    pub fn aggregate(&self) -> &UsageRecord {
        &self.aggregate
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Serialize and fold one pulled item
    pub fn observe_item<T: Serialize>(&mut self, item: &T) {
        if self.state == AggregationState::Committed {
            trace!("Ignoring chunk after commit for {}", self.call_site);
            return;
        }

        // Serialization runs user code, so it is guarded like parsing; the
        // panic hook still sees a panic here (see `guarded_extract`)
        let value = match panic::catch_unwind(AssertUnwindSafe(|| serde_json::to_value(item))) {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                log_usage_error(&UsageError::from(e), &self.library, "Stream chunk serialization");
                self.count_chunk(UsageRecord::unknown());
                return;
            }
            Err(payload) => {
                log_usage_error(&UsageError::from_panic(payload.as_ref()), &self.library, "Stream chunk serialization");
                self.count_chunk(UsageRecord::unknown());
                return;
            }
        };

        self.observe_value(&value);
    }

    /// Fold one chunk that is already a JSON value
    pub fn observe_value(&mut self, chunk: &Value) {
        if self.state == AggregationState::Committed {
            trace!("Ignoring chunk after commit for {}", self.call_site);
            return;
        }

        let contribution = guarded_extract(self.parser, chunk, &self.library, &self.call_site, true);
        self.count_chunk(contribution);
    }

    fn count_chunk(&mut self, contribution: UsageRecord) {
        self.aggregate = self.aggregate.merge(&contribution);
        self.chunks += 1;
        self.state = AggregationState::Accumulating;
    }

    /// Hand the aggregate to the request context; later calls do nothing
    pub fn commit(&mut self) {
        if self.state == AggregationState::Committed {
            return;
        }

        debug!(
            "Stream {} finished after {} chunks: {}",
            self.call_site, self.chunks, self.aggregate
        );
        self.state = AggregationState::Committed;
        commit_usage(self.kind, &self.aggregate, &self.context, self.stats.as_deref());
    }
}

impl Drop for StreamAggregator {
    fn drop(&mut self) {
        if self.state != AggregationState::Committed {
            trace!("Stream {} dropped before completion", self.call_site);
            self.commit();
        }
    }
}

impl std::fmt::Debug for StreamAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAggregator")
            .field("kind", &self.kind)
            .field("call_site", &self.call_site)
            .field("state", &self.state)
            .field("aggregate", &self.aggregate)
            .field("chunks", &self.chunks)
            .finish()
    }
}

/// Items are `Result<T, E>`; an `Err` item commits the aggregate
#[derive(Debug, Clone, Copy, Default)]
pub struct Fallible;

/// Every item is a chunk
#[derive(Debug, Clone, Copy, Default)]
pub struct Infallible;

/// Items are forwarded without being read
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

/// How an [`ObservedStream`] folds the items it forwards
pub trait ObserveMode<I> {
    fn observe(aggregator: &mut StreamAggregator, item: &I);
}

impl<T: Serialize, E> ObserveMode<Result<T, E>> for Fallible {
    fn observe(aggregator: &mut StreamAggregator, item: &Result<T, E>) {
        match item {
            Ok(chunk) => aggregator.observe_item(chunk),
            // The error goes back to the caller untouched
            Err(_) => aggregator.commit(),
        }
    }
}

impl<T: Serialize> ObserveMode<T> for Infallible {
    fn observe(aggregator: &mut StreamAggregator, item: &T) {
        aggregator.observe_item(item);
    }
}

impl<T> ObserveMode<T> for Passthrough {
    fn observe(_aggregator: &mut StreamAggregator, _item: &T) {}
}

pin_project! {
    /// Transparent decorator over an SDK stream or iterator
    ///
    /// Without an aggregator it is a plain pass-through, which is what
    /// callers get for unsupported libraries or a disabled observer.
    #[derive(Debug)]
    pub struct ObservedStream<S, M = Fallible> {
        #[pin]
        inner: S,
        aggregator: Option<StreamAggregator>,
        mode: PhantomData<M>,
    }
}

impl<S, M> ObservedStream<S, M> {
    pub(crate) fn new(inner: S, aggregator: StreamAggregator) -> Self {
        Self {
            inner,
            aggregator: Some(aggregator),
            mode: PhantomData,
        }
    }

    pub(crate) fn unobserved(inner: S) -> Self {
        Self {
            inner,
            aggregator: None,
            mode: PhantomData,
        }
    }

    pub fn is_observed(&self) -> bool {
        self.aggregator.is_some()
    }

    /// Aggregation state; `None` for a pass-through
    pub fn state(&self) -> Option<AggregationState> {
        self.aggregator.as_ref().map(StreamAggregator::state)
    }

    /// Usage folded in so far; `None` for a pass-through
    pub fn aggregate(&self) -> Option<&UsageRecord> {
        self.aggregator.as_ref().map(StreamAggregator::aggregate)
    }
}

impl<S> ObservedStream<S, Passthrough> {
    /// Wrap without observing anything; any item type is accepted
    pub fn passthrough(inner: S) -> Self {
        Self::unobserved(inner)
    }
}

impl<S, M> Stream for ObservedStream<S, M>
where
    S: Stream,
    M: ObserveMode<S::Item>,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let item = match this.inner.poll_next(cx) {
            Poll::Ready(item) => item,
            Poll::Pending => return Poll::Pending,
        };

        if let Some(aggregator) = this.aggregator.as_mut() {
            match &item {
                Some(chunk) => M::observe(aggregator, chunk),
                None => aggregator.commit(),
            }
        }

        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S, M> Iterator for ObservedStream<S, M>
where
    S: Iterator,
    M: ObserveMode<S::Item>,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        let item = self.inner.next();

        if let Some(aggregator) = self.aggregator.as_mut() {
            match &item {
                Some(chunk) => M::observe(aggregator, chunk),
                None => aggregator.commit(),
            }
        }

        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::parser_for;
    use serde_json::json;

    fn aggregator(ctx: &RequestContext) -> StreamAggregator {
        StreamAggregator::new(
            ProviderKind::Generic,
            parser_for(ProviderKind::Generic),
            "Some.Sdk",
            "Some.Sdk.Client.CompleteStreaming",
            ctx,
            None,
        )
    }

    #[test]
    fn test_state_transitions() {
        let ctx = RequestContext::new();
        let mut agg = aggregator(&ctx);
        assert_eq!(agg.state(), AggregationState::Idle);

        agg.observe_value(&json!({"Model": "m", "InputTokens": 2}));
        assert_eq!(agg.state(), AggregationState::Accumulating);

        agg.commit();
        assert_eq!(agg.state(), AggregationState::Committed);

        // No transition leaves Committed
        agg.observe_value(&json!({"InputTokens": 100}));
        agg.commit();
        assert_eq!(agg.chunks(), 1);
        assert_eq!(ctx.totals().calls, 1);
        assert_eq!(ctx.usage(), UsageRecord::new("m", 2, 0));
    }

    #[test]
    fn test_drop_commits_once() {
        let ctx = RequestContext::new();
        {
            let mut agg = aggregator(&ctx);
            agg.observe_value(&json!({"OutputTokens": 4}));
        }
        assert_eq!(ctx.totals().calls, 1);
        assert_eq!(ctx.usage(), UsageRecord::new("unknown", 0, 4));

        {
            let mut agg = aggregator(&ctx);
            agg.commit();
        }
        assert_eq!(ctx.totals().calls, 2);
    }

    #[test]
    fn test_passthrough_iterator() {
        let items = vec![json!({"InputTokens": 1}), json!({"InputTokens": 2})];
        let observed: Vec<Value> = ObservedStream::passthrough(items.clone().into_iter()).collect();
        assert_eq!(observed, items);

        // Items need not be serializable
        struct Opaque(u8);
        let observed = ObservedStream::passthrough(vec![Opaque(1), Opaque(2)].into_iter());
        assert_eq!(observed.map(|o| o.0).sum::<u8>(), 3);
    }

    #[test]
    fn test_fallible_iterator_commits_on_error() {
        let ctx = RequestContext::new();
        let items: Vec<Result<Value, String>> = vec![
            Ok(json!({"Model": "m", "InputTokens": 3})),
            Err("reset".to_string()),
            Ok(json!({"InputTokens": 50})),
        ];

        let mut stream = ObservedStream::<_, Fallible>::new(items.clone().into_iter(), aggregator(&ctx));
        assert_eq!(stream.next(), Some(items[0].clone()));
        assert_eq!(stream.next(), Some(items[1].clone()));
        assert_eq!(stream.state(), Some(AggregationState::Committed));
        assert_eq!(stream.next(), Some(items[2].clone()));

        drop(stream);
        assert_eq!(ctx.usage(), UsageRecord::new("m", 3, 0));
        assert_eq!(ctx.totals().calls, 1);
    }

    #[test]
    fn test_observed_iterator_commits_at_end() {
        let ctx = RequestContext::new();
        let items = vec![
            json!({"Model": "m1", "InputTokens": 1}),
            json!({"Model": "m2", "OutputTokens": 2}),
        ];

        let mut stream = ObservedStream::<_, Infallible>::new(items.clone().into_iter(), aggregator(&ctx));
        assert_eq!(stream.next(), Some(items[0].clone()));
        assert_eq!(stream.state(), Some(AggregationState::Accumulating));
        assert_eq!(stream.next(), Some(items[1].clone()));
        assert_eq!(stream.next(), None);
        assert_eq!(stream.state(), Some(AggregationState::Committed));

        assert_eq!(ctx.usage(), UsageRecord::new("m2", 1, 2));
        drop(stream);
        assert_eq!(ctx.totals().calls, 1);
    }
}
