//! Request-scoped usage accumulator
//!
//! The enclosing request lifecycle creates a [`RequestContext`] and hands a
//! clone to every observed call; all of them commit into the same totals.

use crate::models::{UsageRecord, UNKNOWN_MODEL};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Accumulated usage of one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    /// Last known model; stays at the sentinel until one is seen
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Number of committed records (one per observed call or stream)
    pub calls: u64,
}

impl Default for UsageTotals {
    fn default() -> Self {
        Self {
            model: UNKNOWN_MODEL.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            calls: 0,
        }
    }
}

impl UsageTotals {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    fn absorb(&mut self, record: &UsageRecord) {
        if record.has_known_model() {
            self.model = record.model().to_string();
        }
        self.input_tokens = self.input_tokens.saturating_add(record.input_tokens());
        self.output_tokens = self.output_tokens.saturating_add(record.output_tokens());
        self.calls = self.calls.saturating_add(1);
    }
}

#[derive(Debug)]
struct ContextInner {
    id: Uuid,
    route: Option<String>,
    totals: Mutex<UsageTotals>,
}

/// Shared handle to the usage of one request
///
/// Cloning is cheap and every clone commits into the same totals. Each
/// commit is a single merge under the lock, so concurrent commits in any
/// order give the same token sums.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Context attributed to a route (e.g. `POST /api/chat`)
    pub fn with_route(route: impl Into<String>) -> Self {
        Self::build(Some(route.into()))
    }

    fn build(route: Option<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: Uuid::new_v4(),
                route,
                totals: Mutex::new(UsageTotals::default()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn route(&self) -> Option<&str> {
        self.inner.route.as_deref()
    }

    /// Merge one record into the totals
    pub fn commit(&self, record: &UsageRecord) {
        // A panic elsewhere while holding the lock leaves the totals intact
        let (calls, input_tokens, output_tokens) = {
            let mut totals = self
                .inner
                .totals
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            totals.absorb(record);
            (totals.calls, totals.input_tokens, totals.output_tokens)
        };

        debug!(
            "Committed {} to request {} (calls: {}, in: {}, out: {})",
            record, self.inner.id, calls, input_tokens, output_tokens
        );
    }

    /// Copy of the current totals
    pub fn totals(&self) -> UsageTotals {
        self.inner
            .totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current totals as a usage record
    pub fn usage(&self) -> UsageRecord {
        let totals = self.totals();
        UsageRecord::new(totals.model, totals.input_tokens, totals.output_tokens)
    }

    /// Whether nothing has been committed yet
    pub fn is_empty(&self) -> bool {
        self.totals().calls == 0
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
