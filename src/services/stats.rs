//! Process-wide AI usage statistics
//!
//! Every committed record is also counted here, keyed by provider and model
//! and broken down by the route of the request that made the call, so a
//! reporter can periodically take a snapshot of the whole process.

use crate::models::{ProviderKind, UsageRecord};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

// Shared instance used by observers built from settings
static GLOBAL_STATS: Lazy<Arc<AiStats>> = Lazy::new(|| Arc::new(AiStats::new()));

/// The process-wide statistics instance
pub fn global_stats() -> Arc<AiStats> {
    Arc::clone(&GLOBAL_STATS)
}

/// Counters for one provider + model pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl ModelStats {
    fn record(&mut self, record: &UsageRecord) {
        self.calls = self.calls.saturating_add(1);
        self.input_tokens = self.input_tokens.saturating_add(record.input_tokens());
        self.output_tokens = self.output_tokens.saturating_add(record.output_tokens());
        self.total_tokens = self.total_tokens.saturating_add(record.total_tokens());
    }
}

/// Calls of one provider + model made while serving one route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteStats {
    pub path: String,
    #[serde(flatten)]
    pub stats: ModelStats,
}

/// One row of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(flatten)]
    pub stats: ModelStats,
    /// Sorted by path; calls outside a routed request are not listed
    pub routes: Vec<RouteStats>,
}

/// Serializable view of one statistics period
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiStatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Sorted by provider, then model
    pub providers: Vec<ProviderStats>,
}

impl AiStatsSnapshot {
    pub fn total_calls(&self) -> u64 {
        self.providers.iter().map(|p| p.stats.calls).sum()
    }
}

#[derive(Debug, Default)]
struct ModelEntry {
    stats: ModelStats,
    routes: HashMap<String, ModelStats>,
}

#[derive(Debug)]
struct StatsPeriod {
    started_at: DateTime<Utc>,
    entries: HashMap<(ProviderKind, String), ModelEntry>,
}

impl StatsPeriod {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            entries: HashMap::new(),
        }
    }

    fn snapshot(&self) -> AiStatsSnapshot {
        let mut providers: Vec<ProviderStats> = self
            .entries
            .iter()
            .map(|((provider, model), entry)| {
                let mut routes: Vec<RouteStats> = entry
                    .routes
                    .iter()
                    .map(|(path, stats)| RouteStats {
                        path: path.clone(),
                        stats: stats.clone(),
                    })
                    .collect();
                routes.sort_by(|a, b| a.path.cmp(&b.path));

                ProviderStats {
                    provider: *provider,
                    model: model.clone(),
                    stats: entry.stats.clone(),
                    routes,
                }
            })
            .collect();
        providers.sort_by(|a, b| (a.provider, &a.model).cmp(&(b.provider, &b.model)));

        AiStatsSnapshot {
            started_at: self.started_at,
            ended_at: Utc::now(),
            providers,
        }
    }
}

/// Thread-safe statistics keyed by provider + model
#[derive(Debug)]
pub struct AiStats {
    period: Mutex<StatsPeriod>,
}

impl AiStats {
    pub fn new() -> Self {
        Self {
            period: Mutex::new(StatsPeriod::new()),
        }
    }

    /// Count one completed AI call, made while serving `route` if known
    pub fn on_ai_call(&self, provider: ProviderKind, record: &UsageRecord, route: Option<&str>) {
        {
            let mut period = self.period.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = period
                .entries
                .entry((provider, record.model().to_string()))
                .or_default();
            entry.stats.record(record);
            if let Some(route) = route.map(str::trim).filter(|r| !r.is_empty()) {
                entry.routes.entry(route.to_string()).or_default().record(record);
            }
        }
        debug!("Recorded AI call for {} / {}", provider, record.model());
    }

    pub fn snapshot(&self) -> AiStatsSnapshot {
        self.period
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Snapshot the current period and start a new one atomically
    pub fn take(&self) -> AiStatsSnapshot {
        let mut period = self.period.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = period.snapshot();
        *period = StatsPeriod::new();
        snapshot
    }

    pub fn reset(&self) {
        *self.period.lock().unwrap_or_else(PoisonError::into_inner) = StatsPeriod::new();
    }

    pub fn is_empty(&self) -> bool {
        self.period
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .is_empty()
    }
}

impl Default for AiStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_per_provider_and_model() {
        let stats = AiStats::new();
        assert!(stats.is_empty());

        stats.on_ai_call(ProviderKind::OpenAi, &UsageRecord::new("gpt-4o", 10, 5), None);
        stats.on_ai_call(ProviderKind::OpenAi, &UsageRecord::new("gpt-4o", 1, 1), None);
        stats.on_ai_call(ProviderKind::AzureOpenAi, &UsageRecord::new("gpt-4o", 2, 2), None);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.providers.len(), 2);
        assert_eq!(snapshot.total_calls(), 3);

        let openai = &snapshot.providers[0];
        assert_eq!(openai.provider, ProviderKind::OpenAi);
        assert_eq!(
            openai.stats,
            ModelStats {
                calls: 2,
                input_tokens: 11,
                output_tokens: 6,
                total_tokens: 17
            }
        );
    }

    #[test]
    fn test_take_starts_new_period() {
        let stats = AiStats::new();
        stats.on_ai_call(ProviderKind::Anthropic, &UsageRecord::new("claude", 1, 2), None);

        let first = stats.take();
        assert_eq!(first.total_calls(), 1);
        assert!(first.ended_at >= first.started_at);
        assert!(stats.is_empty());

        stats.on_ai_call(ProviderKind::Anthropic, &UsageRecord::new("claude", 1, 2), None);
        stats.reset();
        assert!(stats.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = AiStats::new();
        stats.on_ai_call(ProviderKind::AwsBedrock, &UsageRecord::unknown(), Some("GET /summary"));

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert!(json["startedAt"].is_string());
        assert_eq!(json["providers"][0]["provider"], "aws-bedrock");
        assert_eq!(json["providers"][0]["model"], "unknown");
        assert_eq!(json["providers"][0]["calls"], 1);
        assert_eq!(json["providers"][0]["routes"][0]["path"], "GET /summary");
        assert_eq!(json["providers"][0]["routes"][0]["calls"], 1);
    }

    #[test]
    fn test_records_per_route() {
        let stats = AiStats::new();
        stats.on_ai_call(ProviderKind::OpenAi, &UsageRecord::new("gpt-4o", 10, 5), Some("POST /chat"));
        stats.on_ai_call(ProviderKind::OpenAi, &UsageRecord::new("gpt-4o", 2, 1), Some("POST /chat"));
        stats.on_ai_call(ProviderKind::OpenAi, &UsageRecord::new("gpt-4o", 1, 1), Some("GET /agent"));
        stats.on_ai_call(ProviderKind::OpenAi, &UsageRecord::new("gpt-4o", 4, 4), None);
        stats.on_ai_call(ProviderKind::OpenAi, &UsageRecord::new("gpt-4o", 4, 4), Some("  "));

        let snapshot = stats.snapshot();
        let entry = &snapshot.providers[0];
        assert_eq!(entry.stats.calls, 5);

        let paths: Vec<&str> = entry.routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["GET /agent", "POST /chat"]);
        assert_eq!(
            entry.routes[1].stats,
            ModelStats {
                calls: 2,
                input_tokens: 12,
                output_tokens: 6,
                total_tokens: 18
            }
        );
    }
}
