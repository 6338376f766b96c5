//! Usage schema tables and structural field probing
//!
//! Every parser describes the shapes its SDK produces as [`UsageSchema`]
//! tables. Probing walks a raw result along field paths; keys compare
//! case-insensitively with `_` and `-` ignored, so `InputTokenCount`,
//! `inputTokenCount` and `input_token_count` all resolve the same field.

use crate::models::{LibraryIdentity, UsageRecord, UNKNOWN_MODEL};
use crate::utils::error::{log_usage_error, ErrorContext, UsageError, UsageResult};
use crate::utils::logging::summarize_raw;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::debug;

/// A path of keys from the root of a raw result
pub type FieldPath = &'static [&'static str];

/// One known shape of an SDK result
///
/// Each field lists alternative paths, tried in order; the first that
/// resolves wins.
#[derive(Debug, Clone, Copy)]
pub struct UsageSchema {
    /// Shape name, used in debug logs
    pub name: &'static str,
    pub model: &'static [FieldPath],
    pub input_tokens: &'static [FieldPath],
    pub output_tokens: &'static [FieldPath],
}

/// Result of applying one schema to a raw result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMatch {
    pub schema: &'static str,
    pub record: UsageRecord,
    /// How many of the three fields resolved
    pub resolved: usize,
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn keys_match(actual: &str, wanted: &str) -> bool {
    actual == wanted || normalize_key(actual) == normalize_key(wanted)
}

/// Walk `path` from `raw`
///
/// `null` anywhere along the way counts as absent.
pub fn lookup<'v>(raw: &'v Value, path: &[&str]) -> UsageResult<&'v Value> {
    let mut current = raw;
    for key in path {
        let map = match current {
            Value::Object(map) => map,
            _ => return Err(UsageError::MissingField(path.join("."))),
        };

        // Exact key first, then the normalized comparison
        current = match map.get(*key) {
            Some(value) => value,
            None => map
                .iter()
                .find(|(k, _)| keys_match(k, key))
                .map(|(_, v)| v)
                .ok_or_else(|| UsageError::MissingField(path.join(".")))?,
        };
    }

    if current.is_null() {
        return Err(UsageError::MissingField(path.join(".")));
    }
    Ok(current)
}

/// Coerce a value into a token count
///
/// Accepts non-negative integers, integral non-negative floats and strings
/// holding a non-negative integer.
pub fn coerce_tokens(value: &Value, path: &str) -> UsageResult<u64> {
    let mistyped = || UsageError::MistypedField {
        path: path.to_string(),
        found: value.to_string(),
    };

    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                    Ok(f as u64)
                }
                _ => Err(mistyped()),
            }
        }
        Value::String(s) => s.trim().parse::<u64>().field_context(path),
        _ => Err(mistyped()),
    }
}

/// Coerce a value into a model identifier; blank strings count as absent
pub fn coerce_model(value: &Value, path: &str) -> UsageResult<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => Err(UsageError::MissingField(path.to_string())),
        Value::String(s) => Ok(s.trim().to_string()),
        other => Err(UsageError::MistypedField {
            path: path.to_string(),
            found: other.to_string(),
        }),
    }
}

pub fn read_tokens(raw: &Value, path: &[&str]) -> UsageResult<u64> {
    let value = lookup(raw, path)?;
    coerce_tokens(value, &path.join("."))
}

pub fn read_model(raw: &Value, path: &[&str]) -> UsageResult<String> {
    let value = lookup(raw, path)?;
    coerce_model(value, &path.join("."))
}

/// Try alternatives in order, returning the first success
///
/// Mistyped values are reported at debug level; absence is expected and silent.
fn first_resolved<T>(
    raw: &Value,
    alternatives: &[FieldPath],
    library: LibraryIdentity<'_>,
    read: impl Fn(&Value, &[&str]) -> UsageResult<T>,
) -> Option<T> {
    for path in alternatives {
        match read(raw, *path) {
            Ok(value) => return Some(value),
            Err(e) if e.is_absence() => continue,
            Err(e) => log_usage_error(&e, library.as_str(), "Usage field probing"),
        }
    }
    None
}

impl UsageSchema {
    /// Apply this schema, counting the fields that resolved
    pub fn apply(&self, raw: &Value, library: LibraryIdentity<'_>) -> SchemaMatch {
        let mut resolved = 0;

        let model = first_resolved(raw, self.model, library, read_model);
        let input = first_resolved(raw, self.input_tokens, library, read_tokens);
        let output = first_resolved(raw, self.output_tokens, library, read_tokens);

        resolved += usize::from(model.is_some());
        resolved += usize::from(input.is_some());
        resolved += usize::from(output.is_some());

        SchemaMatch {
            schema: self.name,
            record: UsageRecord::new(
                model.unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
                input.unwrap_or(0),
                output.unwrap_or(0),
            ),
            resolved,
        }
    }
}

/// Pick the schema resolving the most fields; ties go to the earlier one
pub fn best_schema(
    schemas: &[UsageSchema],
    raw: &Value,
    library: LibraryIdentity<'_>,
) -> Option<SchemaMatch> {
    let mut best: Option<SchemaMatch> = None;
    for schema in schemas {
        let candidate = schema.apply(raw, library);
        let better = match &best {
            Some(current) => candidate.resolved > current.resolved,
            None => candidate.resolved > 0,
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Extract a record with the best matching schema, or the default record
pub fn extract_with(
    schemas: &[UsageSchema],
    raw: &Value,
    library: LibraryIdentity<'_>,
) -> UsageRecord {
    match best_schema(schemas, raw, library) {
        Some(found) => {
            debug!(
                "Matched '{}' shape ({} of 3 fields) for library {}",
                found.schema, found.resolved, library
            );
            found.record
        }
        None => {
            log_usage_error(&UsageError::UnknownShape, library.as_str(), "Usage extraction");
            debug!("Unrecognized result: {}", summarize_raw(raw));
            UsageRecord::unknown()
        }
    }
}

/// Decode a body that is embedded JSON text, a base64 blob of JSON, or
/// already structured
pub fn decode_embedded(value: &Value, path: &str) -> UsageResult<Value> {
    match value {
        Value::String(text) => match serde_json::from_str(text) {
            Ok(decoded) => Ok(decoded),
            Err(e) => match STANDARD.decode(text.trim()) {
                Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
                // Not a blob either; report the JSON error
                Err(_) => Err(e.into()),
            },
        },
        Value::Object(_) | Value::Array(_) => Ok(value.clone()),
        Value::Null => Err(UsageError::MissingField(path.to_string())),
        other => Err(UsageError::MistypedField {
            path: path.to_string(),
            found: other.to_string(),
        }),
    }
}
