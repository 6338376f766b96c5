//! Provider module
//!
//! Defines the ResponseParser trait and the per-SDK parser implementations

pub mod anthropic;
pub mod bedrock;
pub mod generic;
pub mod openai;
pub mod rystem;
pub mod schema;

use crate::models::{CallSite, LibraryIdentity, ProviderKind, UsageRecord};
use serde_json::Value;

/// Parser trait for SDK results
///
/// Parsers are pure: the same input always yields the same record, and a
/// missing or mistyped field degrades to its default instead of failing.
pub trait ResponseParser: Send + Sync {
    /// The provider this parser reads
    fn kind(&self) -> ProviderKind;

    /// Whether this parser understands results from `library`
    fn claims(&self, library: LibraryIdentity<'_>) -> bool {
        match self.kind().library_marker() {
            Some(marker) => library.contains_marker(marker),
            None => !library.is_blank(),
        }
    }

    /// Extract usage from a complete (non-streaming) result
    fn extract(&self, raw: &Value, library: LibraryIdentity<'_>, call_site: CallSite<'_>) -> UsageRecord;

    /// Extract the usage contribution of one stream chunk
    fn extract_chunk(&self, chunk: &Value, library: LibraryIdentity<'_>, call_site: CallSite<'_>) -> UsageRecord {
        self.extract(chunk, library, call_site)
    }
}

static OPENAI: OpenAiParser = OpenAiParser::new(ProviderKind::OpenAi);
static AZURE_OPENAI: OpenAiParser = OpenAiParser::new(ProviderKind::AzureOpenAi);
static RYSTEM: RystemParser = RystemParser;
static ANTHROPIC: AnthropicParser = AnthropicParser;
static BEDROCK: BedrockParser = BedrockParser;
static GENERIC: GenericParser = GenericParser;

/// The stateless parser for a provider
pub fn parser_for(kind: ProviderKind) -> &'static dyn ResponseParser {
    match kind {
        ProviderKind::OpenAi => &OPENAI,
        ProviderKind::AzureOpenAi => &AZURE_OPENAI,
        ProviderKind::RystemOpenAi => &RYSTEM,
        ProviderKind::Anthropic => &ANTHROPIC,
        ProviderKind::AwsBedrock => &BEDROCK,
        ProviderKind::Generic => &GENERIC,
    }
}

pub use anthropic::AnthropicParser;
pub use bedrock::BedrockParser;
pub use generic::GenericParser;
pub use openai::OpenAiParser;
pub use rystem::RystemParser;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_for_every_kind() {
        for kind in ProviderKind::ALL {
            assert_eq!(parser_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_default_claims_use_marker() {
        let parser = parser_for(ProviderKind::AzureOpenAi);
        assert!(parser.claims(LibraryIdentity::new("Azure.AI.OpenAI")));
        assert!(!parser.claims(LibraryIdentity::new("OpenAI")));

        // The plain OpenAI marker is contained in the Azure identity too
        assert!(parser_for(ProviderKind::OpenAi).claims(LibraryIdentity::new("Azure.AI.OpenAI")));
    }
}
