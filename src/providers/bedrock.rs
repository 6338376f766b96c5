//! AWS Bedrock runtime parser
//!
//! Bedrock results differ per operation, so extraction dispatches on the
//! call site rather than on the result shape alone.

use super::schema::{decode_embedded, extract_with, lookup, UsageSchema};
use super::ResponseParser;
use crate::models::{CallSite, LibraryIdentity, ProviderKind, UsageRecord};
use crate::utils::error::{log_usage_error, UsageError};
use serde_json::Value;

/// Bedrock runtime operations with a known result shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedrockOperation {
    Converse,
    ConverseStream,
    InvokeModel,
    InvokeModelWithResponseStream,
}

impl BedrockOperation {
    /// Map a call site to its operation, ignoring the `Async` suffix
    pub fn from_call_site(call_site: CallSite<'_>) -> Option<Self> {
        match call_site.operation() {
            "Converse" => Some(Self::Converse),
            "ConverseStream" => Some(Self::ConverseStream),
            "InvokeModel" => Some(Self::InvokeModel),
            "InvokeModelWithResponseStream" => Some(Self::InvokeModelWithResponseStream),
            _ => None,
        }
    }
}

const CONVERSE_SCHEMAS: &[UsageSchema] = &[UsageSchema {
    name: "converse",
    model: &[&["Trace", "PromptRouter", "InvokedModelId"]],
    input_tokens: &[&["Usage", "InputTokens"]],
    output_tokens: &[&["Usage", "OutputTokens"]],
}];

/// Metadata event, either wrapped in its union member or bare
const CONVERSE_STREAM_SCHEMAS: &[UsageSchema] = &[UsageSchema {
    name: "converse-stream-metadata",
    model: &[
        &["Metadata", "Trace", "PromptRouter", "InvokedModelId"],
        &["Trace", "PromptRouter", "InvokedModelId"],
    ],
    input_tokens: &[&["Metadata", "Usage", "InputTokens"], &["Usage", "InputTokens"]],
    output_tokens: &[&["Metadata", "Usage", "OutputTokens"], &["Usage", "OutputTokens"]],
}];

/// Model-native bodies returned by InvokeModel
const INVOKE_BODY_SCHEMAS: &[UsageSchema] = &[
    UsageSchema {
        name: "anthropic-body",
        model: &[&["model"]],
        input_tokens: &[&["usage", "input_tokens"]],
        output_tokens: &[&["usage", "output_tokens"]],
    },
    UsageSchema {
        name: "llama-body",
        model: &[],
        input_tokens: &[&["prompt_token_count"]],
        output_tokens: &[&["generation_token_count"]],
    },
];

/// Decoded payload of one InvokeModelWithResponseStream chunk
const INVOKE_STREAM_SCHEMAS: &[UsageSchema] = &[UsageSchema {
    name: "invocation-metrics",
    model: &[&["message", "model"]],
    input_tokens: &[&["amazon-bedrock-invocationMetrics", "inputTokenCount"]],
    output_tokens: &[&["amazon-bedrock-invocationMetrics", "outputTokenCount"]],
}];

#[derive(Debug, Default)]
pub struct BedrockParser;

impl BedrockParser {
    /// Parse a JSON body nested under `container` at one of the `paths`
    fn extract_embedded(
        &self,
        container: &Value,
        paths: &[&[&str]],
        schemas: &[UsageSchema],
        library: LibraryIdentity<'_>,
    ) -> UsageRecord {
        let Some((path, body)) = paths
            .iter()
            .find_map(|path| lookup(container, path).ok().map(|body| (path.join("."), body)))
        else {
            log_usage_error(
                &UsageError::MissingField(paths.iter().map(|p| p.join(".")).collect::<Vec<_>>().join(" | ")),
                library.as_str(),
                "Bedrock body lookup",
            );
            return UsageRecord::unknown();
        };

        match decode_embedded(body, &path) {
            Ok(decoded) => extract_with(schemas, &decoded, library),
            Err(e) => {
                log_usage_error(&e, library.as_str(), "Bedrock body decoding");
                UsageRecord::unknown()
            }
        }
    }

    fn unsupported(&self, library: LibraryIdentity<'_>, call_site: CallSite<'_>) -> UsageRecord {
        log_usage_error(
            &UsageError::UnsupportedCallSite(call_site.method_name().to_string()),
            library.as_str(),
            "Bedrock extraction",
        );
        UsageRecord::unknown()
    }
}

impl ResponseParser for BedrockParser {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AwsBedrock
    }

    fn extract(&self, raw: &Value, library: LibraryIdentity<'_>, call_site: CallSite<'_>) -> UsageRecord {
        match BedrockOperation::from_call_site(call_site) {
            Some(BedrockOperation::Converse) => extract_with(CONVERSE_SCHEMAS, raw, library),
            Some(BedrockOperation::InvokeModel) => {
                self.extract_embedded(raw, &[&["Body"]], INVOKE_BODY_SCHEMAS, library)
            }
            // A materialized stream result (e.g. the final metadata event)
            Some(BedrockOperation::ConverseStream) | Some(BedrockOperation::InvokeModelWithResponseStream) => {
                self.extract_chunk(raw, library, call_site)
            }
            None => self.unsupported(library, call_site),
        }
    }

    fn extract_chunk(&self, chunk: &Value, library: LibraryIdentity<'_>, call_site: CallSite<'_>) -> UsageRecord {
        match BedrockOperation::from_call_site(call_site) {
            Some(BedrockOperation::ConverseStream) => extract_with(CONVERSE_STREAM_SCHEMAS, chunk, library),
            Some(BedrockOperation::InvokeModelWithResponseStream) => self.extract_embedded(
                chunk,
                &[&["chunk", "bytes"], &["bytes"]],
                INVOKE_STREAM_SCHEMAS,
                library,
            ),
            Some(BedrockOperation::Converse) | Some(BedrockOperation::InvokeModel) => {
                self.extract(chunk, library, call_site)
            }
            None => self.unsupported(library, call_site),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CLIENT: &str = "Amazon.BedrockRuntime.AmazonBedrockRuntimeClient";

    fn library() -> LibraryIdentity<'static> {
        LibraryIdentity::new("AWSSDK.BedrockRuntime")
    }

    fn site(method: &str) -> String {
        format!("{}.{}", CLIENT, method)
    }

    #[test]
    fn test_operation_mapping() {
        assert_eq!(
            BedrockOperation::from_call_site(CallSite::new("ConverseAsync")),
            Some(BedrockOperation::Converse)
        );
        assert_eq!(
            BedrockOperation::from_call_site(CallSite::new(&site("InvokeModelWithResponseStreamAsync"))),
            Some(BedrockOperation::InvokeModelWithResponseStream)
        );
        assert_eq!(BedrockOperation::from_call_site(CallSite::new("ListFoundationModels")), None);
    }

    #[test]
    fn test_converse() {
        let raw = json!({
            "Output": {"Message": {"Role": "assistant"}},
            "StopReason": "end_turn",
            "Usage": {"InputTokens": 30, "OutputTokens": 12, "TotalTokens": 42},
            "Trace": {"PromptRouter": {"InvokedModelId": "anthropic.claude-3-haiku"}}
        });
        let site = site("ConverseAsync");
        assert_eq!(
            BedrockParser.extract(&raw, library(), CallSite::new(&site)),
            UsageRecord::new("anthropic.claude-3-haiku", 30, 12)
        );

        // camelCase wire form without a prompt router
        let raw = json!({"usage": {"inputTokens": 3, "outputTokens": 4}});
        assert_eq!(
            BedrockParser.extract(&raw, library(), CallSite::new(&site)),
            UsageRecord::new("unknown", 3, 4)
        );
    }

    #[test]
    fn test_invoke_model_bodies() {
        let site = site("InvokeModelAsync");

        let anthropic_body = json!({
            "Body": "{\"model\":\"claude-3-5-sonnet\",\"usage\":{\"input_tokens\":10,\"output_tokens\":20}}"
        });
        assert_eq!(
            BedrockParser.extract(&anthropic_body, library(), CallSite::new(&site)),
            UsageRecord::new("claude-3-5-sonnet", 10, 20)
        );

        let llama_body = json!({"Body": {"generation": "Hi", "prompt_token_count": 7, "generation_token_count": 3}});
        assert_eq!(
            BedrockParser.extract(&llama_body, library(), CallSite::new(&site)),
            UsageRecord::new("unknown", 7, 3)
        );

        let broken_body = json!({"Body": "{not json"});
        assert_eq!(
            BedrockParser.extract(&broken_body, library(), CallSite::new(&site)),
            UsageRecord::unknown()
        );

        assert_eq!(
            BedrockParser.extract(&json!({"ContentType": "application/json"}), library(), CallSite::new(&site)),
            UsageRecord::unknown()
        );
    }

    #[test]
    fn test_converse_stream_chunks() {
        let site = site("ConverseStreamAsync");
        let wrapped = json!({"Metadata": {"Usage": {"InputTokens": 11, "OutputTokens": 22}}});
        let bare = json!({"usage": {"inputTokens": 1, "outputTokens": 2}});
        let delta = json!({"ContentBlockDelta": {"Delta": {"Text": "Hi"}}});

        assert_eq!(
            BedrockParser.extract_chunk(&wrapped, library(), CallSite::new(&site)),
            UsageRecord::new("unknown", 11, 22)
        );
        assert_eq!(
            BedrockParser.extract_chunk(&bare, library(), CallSite::new(&site)),
            UsageRecord::new("unknown", 1, 2)
        );
        assert_eq!(
            BedrockParser.extract_chunk(&delta, library(), CallSite::new(&site)),
            UsageRecord::unknown()
        );
    }

    #[test]
    fn test_invoke_with_response_stream_chunks() {
        let site = site("InvokeModelWithResponseStream");
        let first = json!({
            "chunk": {"bytes": "{\"type\":\"message_start\",\"message\":{\"model\":\"claude-3-haiku\"}}"}
        });
        let last = json!({
            "bytes": "{\"type\":\"message_stop\",\"amazon-bedrock-invocationMetrics\":{\"inputTokenCount\":40,\"outputTokenCount\":9}}"
        });

        assert_eq!(
            BedrockParser.extract_chunk(&first, library(), CallSite::new(&site)),
            UsageRecord::new("claude-3-haiku", 0, 0)
        );
        assert_eq!(
            BedrockParser.extract_chunk(&last, library(), CallSite::new(&site)),
            UsageRecord::new("unknown", 40, 9)
        );
    }

    #[test]
    fn test_unsupported_method() {
        let site = site("ApplyGuardrailAsync");
        let raw = json!({"Usage": {"InputTokens": 1, "OutputTokens": 1}});
        assert_eq!(BedrockParser.extract(&raw, library(), CallSite::new(&site)), UsageRecord::unknown());
        assert_eq!(BedrockParser.extract_chunk(&raw, library(), CallSite::new(&site)), UsageRecord::unknown());
    }
}
