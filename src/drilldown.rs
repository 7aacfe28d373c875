//! Drilldown aggregation for one event.
//!
//! Every level recomputes its numbers from the same campaign/target data.
//! A level is never a roll-up of its child rows, so "with promo" counts
//! always agree with the date-scoped campaign filter. The in-scope store
//! set is the target set for scoped events and the scope-filtered catalog
//! for open ones.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::metrics::{self, pct, EventMetrics, ScopeOptions};
use crate::model::{Campaign, Event, EventTarget, Store};

/// One drilldown position. Each case carries exactly the keys needed to
/// recompute its level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrillPath {
    EventList,
    Event {
        event_id: String,
    },
    City {
        event_id: String,
        city: String,
    },
    Commercial {
        event_id: String,
        city: String,
        commercial: String,
    },
    Brand {
        event_id: String,
        city: String,
        commercial: String,
        brand: String,
    },
    Store {
        event_id: String,
        city: String,
        commercial: String,
        brand: String,
        store_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Risk,
    Critical,
}

impl RiskLevel {
    fn classify(fill_rate: f64) -> Self {
        if fill_rate / 100.0 < 0.10 {
            RiskLevel::Critical
        } else if fill_rate / 100.0 < 0.30 {
            RiskLevel::Risk
        } else {
            RiskLevel::None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CityRow {
    pub city: String,
    pub target_stores: u32,
    pub stores_with_promo: u32,
    pub fill_rate: f64,
    pub promos_created: u32,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommercialRow {
    pub commercial: String,
    pub target_stores: u32,
    pub stores_with_promo: u32,
    pub fill_rate: f64,
    pub gmv_target: f64,
    pub gmv_covered: f64,
    pub gmv_coverage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrandRow {
    pub brand: String,
    pub target_stores: u32,
    pub stores_with_promo: u32,
    pub fill_rate: f64,
    pub cities: u32,
    pub gmv_target: f64,
    pub gmv_covered: f64,
    pub gmv_gap: f64,
}

#[derive(Debug, Clone)]
pub struct StoreRow {
    pub store_id: String,
    pub has_promo: bool,
    pub promo_count: u32,
    pub latest_promo: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct CampaignRow {
    pub campaign_id: String,
    pub store_id: String,
    pub created_at: Option<NaiveDate>,
}

/// Headline view for one event: the metric cards plus the two priority lists.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub metrics: EventMetrics,
    pub worst_cities: Vec<CityRow>,
    pub top_gap_brands: Vec<BrandRow>,
}

/// Everything a drill level needs, borrowed from the session state.
#[derive(Debug, Clone, Copy)]
pub struct DrillContext<'a> {
    pub event: &'a Event,
    pub campaigns: &'a [Campaign],
    pub stores_by_id: &'a HashMap<String, Store>,
    pub targets: &'a [EventTarget],
    pub allowed_store_ids: Option<&'a HashSet<String>>,
    pub as_of: NaiveDate,
}

impl<'a> DrillContext<'a> {
    fn scope_options(&self) -> ScopeOptions<'a> {
        ScopeOptions {
            stores_by_id: Some(self.stores_by_id),
            allowed_store_ids: self.allowed_store_ids,
            event_targets: Some(self.targets),
        }
    }

    /// Target set for scoped events, scope-filtered catalog for open ones.
    pub fn in_scope_store_ids(&self) -> HashSet<String> {
        let opts = self.scope_options();
        let targets = metrics::target_set(&self.event.id, &opts);
        if !targets.is_empty() {
            return targets;
        }
        self.stores_by_id
            .keys()
            .filter(|id| opts.store_in_scope(id))
            .cloned()
            .collect()
    }

    /// Campaigns that count as of the context date: right event, store in
    /// the in-scope set, parseable creation date not after as-of.
    fn surviving_campaigns(&self, scope: &HashSet<String>) -> Vec<&'a Campaign> {
        self.campaigns
            .iter()
            .filter(|c| c.event_id == self.event.id && scope.contains(&c.store_id))
            .filter(|c| matches!(c.created_at, Some(d) if d <= self.as_of))
            .collect()
    }

    fn risk_applies(&self) -> bool {
        let finished = self
            .event
            .end_date
            .map(|end| self.as_of > end)
            .unwrap_or(false);
        if finished {
            return false;
        }
        // Imminent (≤7 days out) or already ongoing.
        self.event
            .start_date
            .map(|start| (start - self.as_of).num_days() <= 7)
            .unwrap_or(false)
    }
}

struct GroupAgg {
    store_ids: Vec<String>,
    covered: HashSet<String>,
    promos: u32,
}

impl GroupAgg {
    fn new() -> Self {
        GroupAgg {
            store_ids: Vec::new(),
            covered: HashSet::new(),
            promos: 0,
        }
    }
}

/// Partition the in-scope set by an attribute and count surviving campaigns
/// per group. BTreeMap keeps group iteration deterministic.
fn aggregate_by<F>(ctx: &DrillContext, scope: &HashSet<String>, key_of: F) -> BTreeMap<String, GroupAgg>
where
    F: Fn(&Store) -> String,
{
    let mut groups: BTreeMap<String, GroupAgg> = BTreeMap::new();
    for store_id in scope {
        if let Some(store) = ctx.stores_by_id.get(store_id) {
            let agg = groups.entry(key_of(store)).or_insert_with(GroupAgg::new);
            agg.store_ids.push(store_id.clone());
        }
    }
    for c in ctx.surviving_campaigns(scope) {
        if let Some(store) = ctx.stores_by_id.get(&c.store_id) {
            if let Some(agg) = groups.get_mut(&key_of(store)) {
                agg.promos += 1;
                agg.covered.insert(c.store_id.clone());
            }
        }
    }
    groups
}

fn gmv_of(ctx: &DrillContext, agg: &GroupAgg) -> (f64, f64) {
    let mut target = 0.0;
    let mut covered = 0.0;
    for store_id in &agg.store_ids {
        if let Some(store) = ctx.stores_by_id.get(store_id) {
            target += store.gmv_last_30d;
            if agg.covered.contains(store_id) {
                covered += store.gmv_last_30d;
            }
        }
    }
    (target, covered)
}

fn sub_scope<F>(ctx: &DrillContext, scope: &HashSet<String>, keep: F) -> HashSet<String>
where
    F: Fn(&Store) -> bool,
{
    scope
        .iter()
        .filter(|id| ctx.stores_by_id.get(*id).map(&keep).unwrap_or(false))
        .cloned()
        .collect()
}

/// City rows, worst coverage first.
pub fn city_rows(ctx: &DrillContext) -> Vec<CityRow> {
    let scope = ctx.in_scope_store_ids();
    let risk_applies = ctx.risk_applies();
    let mut rows: Vec<CityRow> = aggregate_by(ctx, &scope, |s| s.city.clone())
        .into_iter()
        .map(|(city, agg)| {
            let fill_rate = pct(agg.covered.len() as u32, agg.store_ids.len() as u32);
            CityRow {
                city,
                target_stores: agg.store_ids.len() as u32,
                stores_with_promo: agg.covered.len() as u32,
                fill_rate,
                promos_created: agg.promos,
                risk: if risk_applies {
                    RiskLevel::classify(fill_rate)
                } else {
                    RiskLevel::None
                },
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.fill_rate
            .partial_cmp(&b.fill_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.city.cmp(&b.city))
    });
    rows
}

/// Commercial-owner rows within one city, worst coverage first.
pub fn commercial_rows(ctx: &DrillContext, city: &str) -> Vec<CommercialRow> {
    let scope = ctx.in_scope_store_ids();
    let scope = sub_scope(ctx, &scope, |s| s.city == city);
    let mut rows: Vec<CommercialRow> = aggregate_by(ctx, &scope, |s| s.commercial.clone())
        .into_iter()
        .map(|(commercial, agg)| {
            let (gmv_target, gmv_covered) = gmv_of(ctx, &agg);
            CommercialRow {
                commercial,
                target_stores: agg.store_ids.len() as u32,
                stores_with_promo: agg.covered.len() as u32,
                fill_rate: pct(agg.covered.len() as u32, agg.store_ids.len() as u32),
                gmv_target,
                gmv_covered,
                gmv_coverage: if gmv_target > 0.0 {
                    gmv_covered / gmv_target * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.fill_rate
            .partial_cmp(&b.fill_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.commercial.cmp(&b.commercial))
    });
    rows
}

/// Brand rows, biggest GMV gap first. `within` narrows to one
/// city + commercial; `None` is the whole-event brand tab.
pub fn brand_rows(ctx: &DrillContext, within: Option<(&str, &str)>) -> Vec<BrandRow> {
    let scope = ctx.in_scope_store_ids();
    let scope = match within {
        Some((city, commercial)) => {
            sub_scope(ctx, &scope, |s| s.city == city && s.commercial == commercial)
        }
        None => scope,
    };
    let mut rows: Vec<BrandRow> = aggregate_by(ctx, &scope, |s| s.brand.clone())
        .into_iter()
        .map(|(brand, agg)| {
            let (gmv_target, gmv_covered) = gmv_of(ctx, &agg);
            let cities: HashSet<&str> = agg
                .store_ids
                .iter()
                .filter_map(|id| ctx.stores_by_id.get(id))
                .map(|s| s.city.as_str())
                .collect();
            BrandRow {
                brand,
                target_stores: agg.store_ids.len() as u32,
                stores_with_promo: agg.covered.len() as u32,
                fill_rate: pct(agg.covered.len() as u32, agg.store_ids.len() as u32),
                cities: cities.len() as u32,
                gmv_target,
                gmv_covered,
                gmv_gap: (gmv_target - gmv_covered).max(0.0),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.gmv_gap
            .partial_cmp(&a.gmv_gap)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.brand.cmp(&b.brand))
    });
    rows
}

/// Store rows within city + commercial + brand. Stores still missing a
/// promo sort first; covered stores follow, earliest latest-promo first.
pub fn store_rows(
    ctx: &DrillContext,
    city: &str,
    commercial: &str,
    brand: &str,
    only_missing: bool,
) -> Vec<StoreRow> {
    let scope = ctx.in_scope_store_ids();
    let scope = sub_scope(ctx, &scope, |s| {
        s.city == city && s.commercial == commercial && s.brand == brand
    });
    let surviving = ctx.surviving_campaigns(&scope);

    let mut rows: Vec<StoreRow> = scope
        .iter()
        .map(|store_id| {
            let mut promo_count = 0u32;
            let mut latest_promo: Option<NaiveDate> = None;
            for c in surviving.iter().filter(|c| &c.store_id == store_id) {
                promo_count += 1;
                latest_promo = latest_promo.max(c.created_at);
            }
            StoreRow {
                store_id: store_id.clone(),
                has_promo: promo_count > 0,
                promo_count,
                latest_promo,
            }
        })
        .filter(|r| !only_missing || !r.has_promo)
        .collect();

    rows.sort_by(|a, b| {
        a.has_promo
            .cmp(&b.has_promo)
            .then_with(|| a.latest_promo.cmp(&b.latest_promo))
            .then_with(|| a.store_id.cmp(&b.store_id))
    });
    rows
}

/// One store's surviving campaigns for the event, chronological.
pub fn campaign_rows(ctx: &DrillContext, store_id: &str) -> Vec<CampaignRow> {
    let scope: HashSet<String> = [store_id.to_string()].into();
    let mut rows: Vec<CampaignRow> = ctx
        .surviving_campaigns(&scope)
        .into_iter()
        .map(|c| CampaignRow {
            campaign_id: c.id.clone(),
            store_id: c.store_id.clone(),
            created_at: c.created_at,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.campaign_id.cmp(&b.campaign_id))
    });
    rows
}

/// In-scope stores without a single surviving promo, biggest GMV first.
/// This is the "target stores lacking a promo" export feed.
pub fn uncovered_stores<'a>(ctx: &DrillContext<'a>) -> Vec<&'a Store> {
    let scope = ctx.in_scope_store_ids();
    let covered: HashSet<&str> = ctx
        .surviving_campaigns(&scope)
        .iter()
        .map(|c| c.store_id.as_str())
        .collect();
    let mut stores: Vec<&Store> = scope
        .iter()
        .filter(|id| !covered.contains(id.as_str()))
        .filter_map(|id| ctx.stores_by_id.get(id))
        .collect();
    stores.sort_by(|a, b| {
        b.gmv_last_30d
            .partial_cmp(&a.gmv_last_30d)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    stores
}

/// Event-level summary: headline metric cards + top-3 priority lists.
pub fn event_summary(ctx: &DrillContext) -> EventSummary {
    let opts = ctx.scope_options();
    let metrics = metrics::compute_one(ctx.event, ctx.campaigns, ctx.as_of, &opts);

    let worst_cities = city_rows(ctx).into_iter().take(3).collect();
    let top_gap_brands = brand_rows(ctx, None).into_iter().take(3).collect();

    EventSummary {
        metrics,
        worst_cities,
        top_gap_brands,
    }
}
