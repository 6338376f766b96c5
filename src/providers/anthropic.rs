//! Anthropic parser
//!
//! Messages carry `model` + `usage`. Streams are server-sent events where
//! `message_start` reports the model and input tokens and `message_delta`
//! reports the output tokens; every other event carries no usage.

use super::schema::{extract_with, lookup, UsageSchema};
use super::ResponseParser;
use crate::models::{CallSite, LibraryIdentity, ProviderKind, UsageRecord};
use serde_json::Value;
use tracing::trace;

const MESSAGE_SCHEMAS: &[UsageSchema] = &[UsageSchema {
    name: "message",
    model: &[&["model"]],
    input_tokens: &[&["usage", "input_tokens"]],
    output_tokens: &[&["usage", "output_tokens"]],
}];

// message_start repeats a placeholder output count; only input is taken here
const MESSAGE_START_SCHEMAS: &[UsageSchema] = &[UsageSchema {
    name: "message-start",
    model: &[&["message", "model"]],
    input_tokens: &[&["message", "usage", "input_tokens"]],
    output_tokens: &[],
}];

const MESSAGE_DELTA_SCHEMAS: &[UsageSchema] = &[UsageSchema {
    name: "message-delta",
    model: &[],
    input_tokens: &[],
    output_tokens: &[&["usage", "output_tokens"]],
}];

#[derive(Debug, Default)]
pub struct AnthropicParser;

impl ResponseParser for AnthropicParser {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn extract(&self, raw: &Value, library: LibraryIdentity<'_>, _call_site: CallSite<'_>) -> UsageRecord {
        extract_with(MESSAGE_SCHEMAS, raw, library)
    }

    fn extract_chunk(&self, chunk: &Value, library: LibraryIdentity<'_>, call_site: CallSite<'_>) -> UsageRecord {
        let event = lookup(chunk, &["type"]).ok().and_then(Value::as_str);

        match event {
            Some("message_start") => extract_with(MESSAGE_START_SCHEMAS, chunk, library),
            Some("message_delta") => extract_with(MESSAGE_DELTA_SCHEMAS, chunk, library),
            // A whole message yielded by a helper stream
            Some("message") | None => self.extract(chunk, library, call_site),
            Some(other) => {
                trace!("Skipping Anthropic stream event without usage: {}", other);
                UsageRecord::unknown()
            }
        }
    }
}
