//! Rystem OpenAI parser

use super::schema::{extract_with, UsageSchema};
use super::ResponseParser;
use crate::models::{CallSite, LibraryIdentity, ProviderKind, UsageRecord};
use serde_json::Value;

/// Responses and stream chunks share one shape
const RYSTEM_SCHEMAS: &[UsageSchema] = &[UsageSchema {
    name: "rystem-chat",
    model: &[&["Model"]],
    input_tokens: &[&["Usage", "PromptTokens"]],
    output_tokens: &[&["Usage", "CompletionTokens"]],
}];

#[derive(Debug, Default)]
pub struct RystemParser;

impl ResponseParser for RystemParser {
    fn kind(&self) -> ProviderKind {
        ProviderKind::RystemOpenAi
    }

    fn extract(&self, raw: &Value, library: LibraryIdentity<'_>, _call_site: CallSite<'_>) -> UsageRecord {
        extract_with(RYSTEM_SCHEMAS, raw, library)
    }
}
