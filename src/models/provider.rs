//! Supported AI SDK providers
//!
//! The closed set of SDKs the observer knows how to read

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An AI client library the observer has a parser for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Official OpenAI SDK
    #[serde(rename = "openai")]
    OpenAi,
    /// Azure OpenAI SDK (wraps the OpenAI types)
    #[serde(rename = "azure-openai")]
    AzureOpenAi,
    /// Rystem OpenAI client
    #[serde(rename = "rystem-openai")]
    RystemOpenAi,
    /// Anthropic SDK
    #[serde(rename = "anthropic")]
    Anthropic,
    /// AWS Bedrock runtime SDK
    #[serde(rename = "aws-bedrock")]
    AwsBedrock,
    /// Root-level `Model` / `InputTokens` / `OutputTokens` fallback
    #[serde(rename = "generic")]
    Generic,
}

impl ProviderKind {
    /// Every provider, in declaration order
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::OpenAi,
        ProviderKind::AzureOpenAi,
        ProviderKind::RystemOpenAi,
        ProviderKind::Anthropic,
        ProviderKind::AwsBedrock,
        ProviderKind::Generic,
    ];

    /// Stable name used in logs, stats and configuration
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::AzureOpenAi => "azure-openai",
            ProviderKind::RystemOpenAi => "rystem-openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::AwsBedrock => "aws-bedrock",
            ProviderKind::Generic => "generic",
        }
    }

    /// Substring of the library identity that marks this SDK
    ///
    /// The generic fallback has no marker; it claims everything.
    pub fn library_marker(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OpenAI"),
            ProviderKind::AzureOpenAi => Some("Azure.AI.OpenAI"),
            ProviderKind::RystemOpenAi => Some("Rystem.OpenAi"),
            ProviderKind::Anthropic => Some("Anthropic"),
            ProviderKind::AwsBedrock => Some("AWSSDK.BedrockRuntime"),
            ProviderKind::Generic => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ProviderKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| format!("Unknown provider: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trips_through_from_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.name().parse::<ProviderKind>(), Ok(kind));
        }
        assert!("cohere".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&ProviderKind::AwsBedrock).unwrap();
        assert_eq!(json, "\"aws-bedrock\"");

        let kind: ProviderKind = serde_json::from_str("\"rystem-openai\"").unwrap();
        assert_eq!(kind, ProviderKind::RystemOpenAi);
    }

    #[test]
    fn test_only_generic_has_no_marker() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.library_marker().is_none(), kind == ProviderKind::Generic);
        }
    }
}
