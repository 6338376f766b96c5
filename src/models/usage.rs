//! Canonical usage record
//!
//! The normalized output every parser produces, whatever the SDK shape was

use serde::Serialize;
use std::fmt;

/// Model identifier used when none could be extracted
pub const UNKNOWN_MODEL: &str = "unknown";

/// Normalized usage of a single AI call (or a part of one, for stream chunks)
///
/// The model is never empty: blank identifiers collapse to [`UNKNOWN_MODEL`].
/// Records are values; combining two of them goes through [`UsageRecord::merge`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UsageRecord {
    /// Model identifier
    model: String,
    /// Input (prompt) token count
    input_tokens: u64,
    /// Output (completion) token count
    output_tokens: u64,
}

impl UsageRecord {
    /// Create a record, normalizing a blank model to the sentinel
    pub fn new(model: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        let model = model.into();
        let model = if model.trim().is_empty() {
            UNKNOWN_MODEL.to_string()
        } else {
            model
        };

        Self {
            model,
            input_tokens,
            output_tokens,
        }
    }

    /// The all-defaults record: unknown model, zero tokens
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_MODEL, 0, 0)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Whether the model is something other than the sentinel
    pub fn has_known_model(&self) -> bool {
        self.model != UNKNOWN_MODEL
    }

    /// Whether this record carries no information at all
    pub fn is_empty(&self) -> bool {
        !self.has_known_model() && self.input_tokens == 0 && self.output_tokens == 0
    }

    /// Combine two records into a new one
    ///
    /// Token counts add (saturating). The model of `later` wins unless it is
    /// the sentinel, in which case the current model is kept.
    pub fn merge(&self, later: &UsageRecord) -> UsageRecord {
        let model = if later.has_known_model() {
            later.model.clone()
        } else {
            self.model.clone()
        };

        UsageRecord {
            model,
            input_tokens: self.input_tokens.saturating_add(later.input_tokens),
            output_tokens: self.output_tokens.saturating_add(later.output_tokens),
        }
    }
}

impl Default for UsageRecord {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for UsageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (in: {}, out: {})",
            self.model, self.input_tokens, self.output_tokens
        )
    }
}
