//! Environment-driven configuration. Every knob has a default; env vars
//! override individually.

use crate::model::{ScopeField, ScopeFilter};
use crate::snapshots::{RetentionPolicy, DEDUP_WINDOW_MS, RETENTION_MAX_AGE_MS, RETENTION_MAX_ROWS};

#[derive(Debug, Clone)]
pub struct Config {
    pub events_csv: String,
    pub campaigns_csv: String,
    pub stores_csv: String,
    pub targets_csv: String,
    pub document_path: String,
    pub sqlite_path: String,
    /// Metrics as-of date (`YYYY-MM-DD`); empty means today.
    pub as_of: Option<String>,
    pub scope_field: Option<String>,
    pub scope_values: Vec<String>,
    pub export_path: Option<String>,
    pub dedup_window_mins: i64,
    pub retention_days: i64,
    pub max_snapshot_rows: usize,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            events_csv: env_or("EVENTS_CSV", "data/events.csv"),
            campaigns_csv: env_or("CAMPAIGNS_CSV", "data/campaigns.csv"),
            stores_csv: env_or("STORES_CSV", "data/stores.csv"),
            targets_csv: env_or("TARGETS_CSV", "data/event_targets.csv"),
            document_path: env_or("DOCUMENT_PATH", "data/promotrack.json"),
            sqlite_path: env_or("SNAPSHOT_DB", "data/snapshots.sqlite"),
            as_of: std::env::var("AS_OF").ok().filter(|v| !v.trim().is_empty()),
            scope_field: std::env::var("SCOPE_FIELD").ok().filter(|v| !v.trim().is_empty()),
            scope_values: std::env::var("SCOPE_VALUES")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            export_path: std::env::var("EXPORT_PATH").ok().filter(|v| !v.trim().is_empty()),
            dedup_window_mins: env_parse("SNAPSHOT_DEDUP_MINS", DEDUP_WINDOW_MS / 60_000),
            retention_days: env_parse("SNAPSHOT_RETENTION_DAYS", RETENTION_MAX_AGE_MS / 86_400_000),
            max_snapshot_rows: env_parse("SNAPSHOT_MAX_ROWS", RETENTION_MAX_ROWS),
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            dedup_window_ms: self.dedup_window_mins * 60_000,
            max_age_ms: self.retention_days * 86_400_000,
            max_rows: self.max_snapshot_rows,
        }
    }

    /// The active scope selection, when both field and values are set.
    pub fn scope_filter(&self) -> Option<ScopeFilter> {
        let field = ScopeField::parse(self.scope_field.as_deref()?)?;
        if self.scope_values.is_empty() {
            return None;
        }
        Some(ScopeFilter {
            field,
            values: self.scope_values.clone(),
        })
    }
}
