//! Logging utilities
//!
//! Subscriber setup and helpers that keep raw SDK payloads out of logs

use crate::config::LoggingConfig;
use serde_json::Value;

/// Maximum characters kept from any string in a raw result preview
const PREVIEW_STRING_LEN: usize = 80;

/// Maximum entries kept from arrays and objects in a raw result preview
const PREVIEW_ENTRIES: usize = 8;

/// Maximum nesting shown in a raw result preview
const PREVIEW_DEPTH: usize = 4;

/// Initialize the global tracing subscriber
///
/// Hosts that already installed a subscriber get an error back instead of a
/// panic; the observer keeps working with whatever subscriber is active.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let result = if config.format == "json" {
        // JSON format logs (production environment)
        tracing_subscriber::fmt()
            .with_env_filter(config.level.as_str())
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .try_init()
    } else {
        // Human readable format (development environment)
        tracing_subscriber::fmt()
            .with_env_filter(config.level.as_str())
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;
    tracing::info!("Logging system initialized");
    Ok(())
}

/// Truncate a string with a note about original length
fn truncate_content(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_len {
        let kept: String = s.chars().take(max_len).collect();
        format!("{}... ({} chars truncated)", kept, char_count - max_len)
    } else {
        s.to_string()
    }
}

/// Create a bounded preview of a raw result for debug logs
///
/// Keeps the original structure (which is what matters when a shape is not
/// recognized) but truncates message content, long arrays and deep nesting.
pub fn summarize_raw(raw: &Value) -> Value {
    summarize_at(raw, 0)
}

fn summarize_at(raw: &Value, depth: usize) -> Value {
    match raw {
        Value::String(s) => Value::String(truncate_content(s, PREVIEW_STRING_LEN)),
        Value::Array(items) if depth >= PREVIEW_DEPTH => {
            Value::String(format!("[...{} items]", items.len()))
        }
        Value::Object(map) if depth >= PREVIEW_DEPTH => {
            Value::String(format!("{{...{} fields}}", map.len()))
        }
        Value::Array(items) => {
            let mut preview: Vec<Value> = items
                .iter()
                .take(PREVIEW_ENTRIES)
                .map(|item| summarize_at(item, depth + 1))
                .collect();
            if items.len() > PREVIEW_ENTRIES {
                preview.push(Value::String(format!(
                    "...and {} more items",
                    items.len() - PREVIEW_ENTRIES
                )));
            }
            Value::Array(preview)
        }
        Value::Object(map) => {
            let mut preview = serde_json::Map::new();
            for (key, value) in map.iter().take(PREVIEW_ENTRIES) {
                preview.insert(key.clone(), summarize_at(value, depth + 1));
            }
            if map.len() > PREVIEW_ENTRIES {
                preview.insert(
                    "...".to_string(),
                    Value::String(format!("{} more fields", map.len() - PREVIEW_ENTRIES)),
                );
            }
            Value::Object(preview)
        }
        other => other.clone(),
    }
}
