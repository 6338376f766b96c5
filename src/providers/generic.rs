//! Generic fallback parser
//!
//! Only registered when the fallback is switched on; it claims every
//! non-blank library and reads root-level fields.

use super::schema::{extract_with, UsageSchema};
use super::ResponseParser;
use crate::models::{CallSite, LibraryIdentity, ProviderKind, UsageRecord};
use serde_json::Value;

const GENERIC_SCHEMAS: &[UsageSchema] = &[UsageSchema {
    name: "root-fields",
    model: &[&["Model"]],
    input_tokens: &[&["InputTokens"]],
    output_tokens: &[&["OutputTokens"]],
}];

#[derive(Debug, Default)]
pub struct GenericParser;

impl ResponseParser for GenericParser {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Generic
    }

    fn claims(&self, library: LibraryIdentity<'_>) -> bool {
        !library.is_blank()
    }

    fn extract(&self, raw: &Value, library: LibraryIdentity<'_>, _call_site: CallSite<'_>) -> UsageRecord {
        extract_with(GENERIC_SCHEMAS, raw, library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(raw: &Value) -> UsageRecord {
        GenericParser.extract(raw, LibraryIdentity::new("Some.Llm.Sdk"), CallSite::new("Complete"))
    }

    #[test]
    fn test_root_fields() {
        let raw = json!({"Model": "mistral-large", "InputTokens": 150, "OutputTokens": 50});
        assert_eq!(extract(&raw), UsageRecord::new("mistral-large", 150, 50));

        // snake_case spelling resolves the same keys
        let raw = json!({"model": "mistral-large", "input_tokens": "150", "output_tokens": 50});
        assert_eq!(extract(&raw), UsageRecord::new("mistral-large", 150, 50));
    }

    #[test]
    fn test_partial_and_missing() {
        assert_eq!(extract(&json!({"InputTokens": 3})), UsageRecord::new("unknown", 3, 0));
        assert_eq!(extract(&json!({"Name": "x"})), UsageRecord::unknown());
        assert_eq!(extract(&Value::Null), UsageRecord::unknown());
    }

    #[test]
    fn test_claims_any_non_blank_library() {
        assert!(GenericParser.claims(LibraryIdentity::new("Anything")));
        assert!(!GenericParser.claims(LibraryIdentity::new("")));
    }
}
