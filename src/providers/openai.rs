//! OpenAI parser
//!
//! Reads the official OpenAI SDK results and the REST payloads they wrap.
//! Azure OpenAI returns the same types, so one parser serves both.

use super::schema::{extract_with, UsageSchema};
use super::ResponseParser;
use crate::models::{CallSite, LibraryIdentity, ProviderKind, UsageRecord};
use serde_json::Value;

/// Shapes produced by the OpenAI SDK family, most specific first
const OPENAI_SCHEMAS: &[UsageSchema] = &[
    // ClientResult<ChatCompletion> wrapper
    UsageSchema {
        name: "client-result",
        model: &[&["Value", "Model"]],
        input_tokens: &[&["Value", "Usage", "InputTokenCount"]],
        output_tokens: &[&["Value", "Usage", "OutputTokenCount"]],
    },
    // ChatCompletion and StreamingChatCompletionUpdate
    UsageSchema {
        name: "chat-completion",
        model: &[&["Model"]],
        input_tokens: &[&["Usage", "InputTokenCount"]],
        output_tokens: &[&["Usage", "OutputTokenCount"]],
    },
    UsageSchema {
        name: "rest-chat",
        model: &[&["model"]],
        input_tokens: &[&["usage", "prompt_tokens"]],
        output_tokens: &[&["usage", "completion_tokens"]],
    },
    UsageSchema {
        name: "rest-responses",
        model: &[&["model"], &["response", "model"]],
        input_tokens: &[&["usage", "input_tokens"], &["response", "usage", "input_tokens"]],
        output_tokens: &[&["usage", "output_tokens"], &["response", "usage", "output_tokens"]],
    },
];

/// Parser for `OpenAI` and `Azure.AI.OpenAI`
#[derive(Debug)]
pub struct OpenAiParser {
    kind: ProviderKind,
}

impl OpenAiParser {
    pub const fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }
}

impl ResponseParser for OpenAiParser {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn extract(&self, raw: &Value, library: LibraryIdentity<'_>, _call_site: CallSite<'_>) -> UsageRecord {
        extract_with(OPENAI_SCHEMAS, raw, library)
    }
}
