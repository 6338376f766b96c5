//! Data models module
//!
//! Defines the usage record, the provider set and the call identity types

pub mod provider;
pub mod usage;

pub use provider::ProviderKind;
pub use usage::{UsageRecord, UNKNOWN_MODEL};

use std::fmt;

/// Name of the SDK/library that produced a raw result (assembly or package name)
///
/// Untrusted input; only ever used as a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryIdentity<'a>(&'a str);

impl<'a> LibraryIdentity<'a> {
    pub fn new(name: &'a str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Case-insensitive substring test against a library marker
    pub fn contains_marker(&self, marker: &str) -> bool {
        !marker.is_empty() && self.0.to_lowercase().contains(&marker.to_lowercase())
    }
}

impl<'a> From<&'a str> for LibraryIdentity<'a> {
    fn from(name: &'a str) -> Self {
        Self(name)
    }
}

impl fmt::Display for LibraryIdentity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Qualified name of the intercepted method
///
/// e.g. `Amazon.BedrockRuntime.AmazonBedrockRuntimeClient.ConverseStreamAsync`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite<'a>(&'a str);

impl<'a> CallSite<'a> {
    pub fn new(qualified: &'a str) -> Self {
        Self(qualified)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }

    /// Simple method name: the last `.` or `::` separated segment
    pub fn method_name(&self) -> &'a str {
        let trimmed = self.0.trim();
        let after_dot = trimmed.rsplit('.').next().unwrap_or(trimmed);
        after_dot.rsplit("::").next().unwrap_or(after_dot)
    }

    /// Method name with a trailing `Async` removed
    ///
    /// `ConverseAsync` and `Converse` describe the same operation.
    pub fn operation(&self) -> &'a str {
        let name = self.method_name();
        match name.strip_suffix("Async") {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => name,
        }
    }
}

impl<'a> From<&'a str> for CallSite<'a> {
    fn from(qualified: &'a str) -> Self {
        Self(qualified)
    }
}

impl fmt::Display for CallSite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_marker_matching() {
        let library = LibraryIdentity::new("Azure.AI.OpenAI, Version=2.1.0");
        assert!(library.contains_marker("openai"));
        assert!(library.contains_marker("Azure.AI.OpenAI"));
        assert!(!library.contains_marker("Anthropic"));
        assert!(!library.contains_marker(""));
        assert!(LibraryIdentity::new("  ").is_blank());
    }

    #[test]
    fn test_call_site_method_name() {
        let site = CallSite::new("Amazon.BedrockRuntime.AmazonBedrockRuntimeClient.ConverseStreamAsync");
        assert_eq!(site.method_name(), "ConverseStreamAsync");
        assert_eq!(site.operation(), "ConverseStream");

        let site = CallSite::new("openai::chat::ChatClient::complete_chat");
        assert_eq!(site.method_name(), "complete_chat");

        let site = CallSite::new("CompleteChat");
        assert_eq!(site.method_name(), "CompleteChat");
        assert_eq!(site.operation(), "CompleteChat");
    }

    #[test]
    fn test_operation_keeps_bare_async() {
        assert_eq!(CallSite::new("Async").operation(), "Async");
    }
}
