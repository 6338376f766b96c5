//! File-based library configuration
//!
//! Loads library aliases and provider switches from a JSON file

use crate::models::ProviderKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Library configuration loaded from JSON file
///
/// ```json
/// {
///   "aliases": { "Contoso.Llm.Client": "openai" },
///   "disabled": ["rystem-openai"],
///   "streamMethods": { "aws-bedrock": ["WithResponseStream"] }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Extra library identity substrings claimed by a provider
    #[serde(default)]
    pub aliases: HashMap<String, ProviderKind>,

    /// Providers that must not be registered
    #[serde(default)]
    pub disabled: Vec<ProviderKind>,

    /// Extra stream markers per provider, on top of the global ones
    #[serde(rename = "streamMethods", default)]
    pub stream_methods: HashMap<ProviderKind, Vec<String>>,
}

impl LibraryConfig {
    /// Load configuration from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading library configuration from: {:?}", path);

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read library config file: {:?}", path))?;

        let config: LibraryConfig =
            serde_json::from_str(&content).with_context(|| "Failed to parse library config JSON")?;

        config.validate()?;

        debug!(
            "Loaded {} library aliases, {} disabled providers",
            config.aliases.len(),
            config.disabled.len()
        );
        Ok(config)
    }

    /// Load configuration from default locations
    /// Searches in order:
    /// 1. ~/.config/llmusage/llmusage.json
    /// 2. ./llmusage.json
    ///
    /// Returns `Ok(None)` when neither file exists; the built-in table is
    /// complete on its own.
    pub fn load_default() -> Result<Option<Self>> {
        // Try home config directory first
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("llmusage").join("llmusage.json");
            if config_path.exists() {
                return Self::load(&config_path).map(Some);
            }
        }

        // Try current directory
        let local_path = Path::new("llmusage.json");
        if local_path.exists() {
            return Self::load(local_path).map(Some);
        }

        debug!("No library configuration file found, using built-in providers only");
        Ok(None)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        for (alias, provider) in &self.aliases {
            if alias.trim().is_empty() {
                anyhow::bail!("Library alias for provider '{}' cannot be blank", provider);
            }
            if self.disabled.contains(provider) {
                anyhow::bail!(
                    "Library alias '{}' points at disabled provider '{}'",
                    alias,
                    provider
                );
            }
        }

        for (provider, markers) in &self.stream_methods {
            if markers.iter().any(|m| m.trim().is_empty()) {
                anyhow::bail!("Stream method markers for provider '{}' cannot be blank", provider);
            }
        }

        Ok(())
    }

    /// Whether a provider is switched off
    pub fn is_disabled(&self, provider: ProviderKind) -> bool {
        self.disabled.contains(&provider)
    }

    /// Aliases configured for a provider, sorted for deterministic matching
    pub fn aliases_for(&self, provider: ProviderKind) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .aliases
            .iter()
            .filter(|(_, p)| **p == provider)
            .map(|(alias, _)| alias.trim().to_string())
            .collect();
        aliases.sort();
        aliases
    }

    /// Extra stream markers configured for a provider
    pub fn stream_methods_for(&self, provider: ProviderKind) -> &[String] {
        self.stream_methods
            .get(&provider)
            .map(|m| m.as_slice())
            .unwrap_or(&[])
    }
}
