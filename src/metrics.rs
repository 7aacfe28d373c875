//! Per-event coverage metrics.
//!
//! An event with at least one valid target row is *scoped*: its footprint
//! is the target set and campaigns only count inside it. An event with no
//! valid targets is *open*: the footprint is its declared `target_stores`
//! field and only date/scope gating applies. Recomputed in full on every
//! as-of change.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::model::{Campaign, Event, EventTarget, Store};

/// Optional scoping inputs. All absent means: trust the raw rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeOptions<'a> {
    pub stores_by_id: Option<&'a HashMap<String, Store>>,
    pub allowed_store_ids: Option<&'a HashSet<String>>,
    pub event_targets: Option<&'a [EventTarget]>,
}

impl<'a> ScopeOptions<'a> {
    /// Catalog + scope-filter gate for a single store id.
    pub fn store_in_scope(&self, store_id: &str) -> bool {
        if let Some(catalog) = self.stores_by_id {
            if !catalog.contains_key(store_id) {
                return false;
            }
        }
        if let Some(allowed) = self.allowed_store_ids {
            if !allowed.contains(store_id) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMetrics {
    pub event_id: String,
    pub event_name: String,
    pub status: String,
    pub scoped: bool,
    pub target_stores: u32,
    pub stores_to_date: u32,
    pub stores_pct: f64,
    pub fill_rate: f64,
    pub target_promos: u32,
    pub promos_to_date: u32,
    pub promos_pct: f64,
    pub gap_promos: u32,
    pub gap_stores: u32,
    pub days_to_start: i64,
    pub gmv_target: f64,
    pub gmv_covered: f64,
    pub gmv_coverage: f64,
    pub gmv_gap: f64,
}

pub fn pct(n: u32, d: u32) -> f64 {
    if d == 0 {
        0.0
    } else {
        f64::from(n) / f64::from(d) * 100.0
    }
}

fn pct_f64(n: f64, d: f64) -> f64 {
    if d > 0.0 {
        n / d * 100.0
    } else {
        0.0
    }
}

/// Resolve the target set for one event under the scope options.
pub fn target_set(event_id: &str, opts: &ScopeOptions) -> HashSet<String> {
    let mut set = HashSet::new();
    if let Some(targets) = opts.event_targets {
        for t in targets {
            if t.event_id == event_id && opts.store_in_scope(&t.store_id) {
                set.insert(t.store_id.clone());
            }
        }
    }
    set
}

pub fn compute_event_metrics(
    events: &[Event],
    campaigns: &[Campaign],
    as_of: NaiveDate,
    opts: &ScopeOptions,
) -> Vec<EventMetrics> {
    events
        .iter()
        .map(|event| compute_one(event, campaigns, as_of, opts))
        .collect()
}

pub fn compute_one(
    event: &Event,
    campaigns: &[Campaign],
    as_of: NaiveDate,
    opts: &ScopeOptions,
) -> EventMetrics {
    let targets = target_set(&event.id, opts);
    let scoped = !targets.is_empty();
    let target_stores = if scoped {
        targets.len() as u32
    } else {
        event.target_stores
    };

    let mut promos_to_date = 0u32;
    let mut covered_stores = HashSet::new();
    for c in campaigns {
        if c.event_id != event.id || !opts.store_in_scope(&c.store_id) {
            continue;
        }
        if scoped && !targets.contains(&c.store_id) {
            continue;
        }
        // A campaign whose creation date does not parse is skipped, never fatal.
        match c.created_at {
            Some(created) if created <= as_of => {}
            _ => continue,
        }
        promos_to_date += 1;
        covered_stores.insert(c.store_id.as_str());
    }
    let stores_to_date = covered_stores.len() as u32;

    let fill_rate = pct(stores_to_date, target_stores);
    let promos_pct = pct(promos_to_date, event.target_promos);

    let days_to_start = event
        .start_date
        .map(|start| (start - as_of).num_days())
        .unwrap_or(0);

    // GMV weighting exists only for scoped events with a catalog to read
    // volumes from; open events have no target set to weight by.
    let (gmv_target, gmv_covered) = match (scoped, opts.stores_by_id) {
        (true, Some(catalog)) => {
            let mut total = 0.0;
            let mut covered = 0.0;
            for store_id in &targets {
                if let Some(store) = catalog.get(store_id) {
                    total += store.gmv_last_30d;
                    if covered_stores.contains(store_id.as_str()) {
                        covered += store.gmv_last_30d;
                    }
                }
            }
            (total, covered)
        }
        _ => (0.0, 0.0),
    };

    EventMetrics {
        event_id: event.id.clone(),
        event_name: event.name.clone(),
        status: event.status.clone(),
        scoped,
        target_stores,
        stores_to_date,
        stores_pct: fill_rate,
        fill_rate,
        target_promos: event.target_promos,
        promos_to_date,
        promos_pct,
        gap_promos: event.target_promos.saturating_sub(promos_to_date),
        gap_stores: target_stores.saturating_sub(stores_to_date),
        days_to_start,
        gmv_target,
        gmv_covered,
        gmv_coverage: pct_f64(gmv_covered, gmv_target),
        gmv_gap: (gmv_target - gmv_covered).max(0.0),
    }
}
