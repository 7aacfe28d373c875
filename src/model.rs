//! Entity model: raw CSV-shaped rows and the typed records built from them.
//!
//! Raw rows keep every field as text so the validator can classify bad
//! input precisely. Typed entities are built leniently afterwards: a date
//! that does not parse becomes `None` and the metrics engine skips the row
//! instead of aborting the event.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const DATE_FMT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` field, tolerating surrounding whitespace.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FMT).ok()
}

fn parse_count(s: &str) -> u32 {
    s.trim().parse().unwrap_or(0)
}

fn parse_gmv(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}

// =============================================================================
// Raw rows (one struct per input table, all fields text)
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_id: String,
    pub event_name: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub target_promos: String,
    pub target_stores: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCampaign {
    pub campaign_id: String,
    pub event_id: String,
    pub store_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStore {
    pub store_id: String,
    pub brand: String,
    pub region: String,
    pub city: String,
    pub commercial: String,
    pub segment: String,
    pub ops_zone: String,
    pub gmv_last_30d: String,
    pub gmv_last_7d: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTarget {
    pub event_id: String,
    pub store_id: String,
}

/// One ingestion batch: the four tables as read from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBatch {
    pub events: Vec<RawEvent>,
    pub campaigns: Vec<RawCampaign>,
    pub stores: Vec<RawStore>,
    pub targets: Vec<RawTarget>,
}

// =============================================================================
// Typed entities
// =============================================================================

#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub target_promos: u32,
    /// Fallback footprint for events with no explicit targets.
    pub target_stores: u32,
}

#[derive(Debug, Clone)]
pub struct Campaign {
    pub id: String,
    pub event_id: String,
    pub store_id: String,
    pub created_at: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct Store {
    pub id: String,
    pub brand: String,
    pub region: String,
    pub city: String,
    pub commercial: String,
    pub segment: String,
    pub ops_zone: String,
    pub gmv_last_30d: f64,
    pub gmv_last_7d: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventTarget {
    pub event_id: String,
    pub store_id: String,
}

/// Validated batch in typed form, held immutable for the session.
#[derive(Debug, Clone, Default)]
pub struct Entities {
    pub events: Vec<Event>,
    pub campaigns: Vec<Campaign>,
    pub stores_by_id: HashMap<String, Store>,
    pub targets: Vec<EventTarget>,
}

impl Entities {
    /// Lenient raw → typed conversion. The validator is the gate for bad
    /// input; here unparsable dates become `None` and unparsable numbers
    /// become zero so metrics can degrade per-row.
    pub fn from_raw(batch: &RawBatch) -> Self {
        let events = batch
            .events
            .iter()
            .map(|r| Event {
                id: r.event_id.trim().to_string(),
                name: r.event_name.trim().to_string(),
                description: r.description.trim().to_string(),
                status: r.status.trim().to_string(),
                start_date: parse_date(&r.start_date),
                end_date: parse_date(&r.end_date),
                target_promos: parse_count(&r.target_promos),
                target_stores: parse_count(&r.target_stores),
            })
            .collect();

        let campaigns = batch
            .campaigns
            .iter()
            .map(|r| Campaign {
                id: r.campaign_id.trim().to_string(),
                event_id: r.event_id.trim().to_string(),
                store_id: r.store_id.trim().to_string(),
                created_at: parse_date(&r.created_at),
            })
            .collect();

        let mut stores_by_id = HashMap::new();
        for r in &batch.stores {
            let store = Store {
                id: r.store_id.trim().to_string(),
                brand: r.brand.trim().to_string(),
                region: r.region.trim().to_string(),
                city: r.city.trim().to_string(),
                commercial: r.commercial.trim().to_string(),
                segment: r.segment.trim().to_string(),
                ops_zone: r.ops_zone.trim().to_string(),
                gmv_last_30d: parse_gmv(&r.gmv_last_30d),
                gmv_last_7d: r
                    .gmv_last_7d
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .and_then(|s| s.parse().ok()),
            };
            stores_by_id.insert(store.id.clone(), store);
        }

        let mut seen = HashSet::new();
        let targets = batch
            .targets
            .iter()
            .map(|r| EventTarget {
                event_id: r.event_id.trim().to_string(),
                store_id: r.store_id.trim().to_string(),
            })
            .filter(|t| seen.insert((t.event_id.clone(), t.store_id.clone())))
            .collect();

        Entities {
            events,
            campaigns,
            stores_by_id,
            targets,
        }
    }
}

// =============================================================================
// Scope filter (the persisted "active scope selection")
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeField {
    Region,
    City,
    Commercial,
    Segment,
    OpsZone,
    Brand,
}

impl ScopeField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::City => "city",
            Self::Commercial => "commercial",
            Self::Segment => "segment",
            Self::OpsZone => "ops_zone",
            Self::Brand => "brand",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "region" => Some(Self::Region),
            "city" => Some(Self::City),
            "commercial" => Some(Self::Commercial),
            "segment" => Some(Self::Segment),
            "ops_zone" => Some(Self::OpsZone),
            "brand" => Some(Self::Brand),
            _ => None,
        }
    }
}

/// Attribute-based store scope: `field ∈ values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub field: ScopeField,
    pub values: Vec<String>,
}

impl ScopeFilter {
    /// Resolve the filter against the store catalog into a set of store ids.
    pub fn resolve(&self, stores_by_id: &HashMap<String, Store>) -> HashSet<String> {
        stores_by_id
            .values()
            .filter(|s| {
                let attr = match self.field {
                    ScopeField::Region => &s.region,
                    ScopeField::City => &s.city,
                    ScopeField::Commercial => &s.commercial,
                    ScopeField::Segment => &s.segment,
                    ScopeField::OpsZone => &s.ops_zone,
                    ScopeField::Brand => &s.brand,
                };
                self.values.iter().any(|v| v == attr)
            })
            .map(|s| s.id.clone())
            .collect()
    }
}
