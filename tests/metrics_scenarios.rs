//! Metrics engine scenarios over typed entities.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use promotrack::metrics::{compute_event_metrics, ScopeOptions};
use promotrack::model::{Campaign, Event, EventTarget, Store};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn event(id: &str, target_promos: u32, target_stores: u32) -> Event {
    Event {
        id: id.to_string(),
        name: format!("Event {}", id),
        description: String::new(),
        status: "active".to_string(),
        start_date: Some(date("2025-05-01")),
        end_date: Some(date("2025-06-30")),
        target_promos,
        target_stores,
    }
}

fn campaign(id: &str, event_id: &str, store_id: &str, created: &str) -> Campaign {
    Campaign {
        id: id.to_string(),
        event_id: event_id.to_string(),
        store_id: store_id.to_string(),
        created_at: Some(date(created)),
    }
}

fn store(id: &str, city: &str, gmv: f64) -> Store {
    Store {
        id: id.to_string(),
        brand: "Acme".to_string(),
        region: "Sul".to_string(),
        city: city.to_string(),
        commercial: "ana".to_string(),
        segment: "A".to_string(),
        ops_zone: "Z1".to_string(),
        gmv_last_30d: gmv,
        gmv_last_7d: None,
    }
}

fn catalog(stores: Vec<Store>) -> HashMap<String, Store> {
    stores.into_iter().map(|s| (s.id.clone(), s)).collect()
}

fn targets(pairs: &[(&str, &str)]) -> Vec<EventTarget> {
    pairs
        .iter()
        .map(|(e, s)| EventTarget {
            event_id: e.to_string(),
            store_id: s.to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// The canonical scoped-event scenario: E1 targets S1 only, two campaigns
// before "today" and one after
// ---------------------------------------------------------------------------
#[test]
fn scoped_event_counts_to_date_only() {
    let events = vec![event("E1", 10, 5)];
    let stores = catalog(vec![store("S1", "Lisboa", 100.0), store("S2", "Porto", 50.0)]);
    let tgts = targets(&[("E1", "S1")]);
    let campaigns = vec![
        campaign("C1", "E1", "S1", "2025-05-10"),
        campaign("C2", "E1", "S1", "2025-05-14"),
        campaign("C3", "E1", "S1", "2025-06-10"),
    ];
    let opts = ScopeOptions {
        stores_by_id: Some(&stores),
        allowed_store_ids: None,
        event_targets: Some(&tgts),
    };
    let rows = compute_event_metrics(&events, &campaigns, date("2025-05-20"), &opts);
    assert_eq!(rows.len(), 1);
    let m = &rows[0];
    assert_eq!(m.promos_to_date, 2, "the June campaign must not count yet");
    assert_eq!(m.stores_to_date, 1);
    assert_eq!(m.target_stores, 1, "only S1 is targeted");
    assert_eq!(m.fill_rate, 100.0);
    assert_eq!(m.gap_promos, 8);
}

// ---------------------------------------------------------------------------
// Open-event fallback to the declared footprint
// ---------------------------------------------------------------------------
#[test]
fn open_event_falls_back_to_declared_target_stores() {
    let events = vec![event("E1", 10, 5)];
    let stores = catalog(vec![store("S1", "Lisboa", 100.0)]);
    let campaigns = vec![campaign("C1", "E1", "S1", "2025-05-10")];
    let opts = ScopeOptions {
        stores_by_id: Some(&stores),
        allowed_store_ids: None,
        event_targets: Some(&[]),
    };
    let m = &compute_event_metrics(&events, &campaigns, date("2025-05-20"), &opts)[0];
    assert!(!m.scoped);
    assert_eq!(m.target_stores, 5);
    assert_eq!(m.fill_rate, 20.0);
    // No target set: GMV figures are intentionally absent.
    assert_eq!(m.gmv_target, 0.0);
    assert_eq!(m.gmv_coverage, 0.0);
}

// ---------------------------------------------------------------------------
// Invariants over a mixed batch
// ---------------------------------------------------------------------------
#[test]
fn gaps_are_nonnegative_and_stores_pct_tracks_fill_rate() {
    let events = vec![event("E1", 2, 1), event("E2", 0, 0), event("E3", 5, 10)];
    let stores = catalog(vec![
        store("S1", "Lisboa", 100.0),
        store("S2", "Porto", 50.0),
        store("S3", "Braga", 75.0),
    ]);
    let tgts = targets(&[("E1", "S1"), ("E1", "S2"), ("E3", "S3")]);
    let campaigns = vec![
        campaign("C1", "E1", "S1", "2025-05-02"),
        campaign("C2", "E1", "S1", "2025-05-03"),
        campaign("C3", "E1", "S2", "2025-05-04"),
        campaign("C4", "E2", "S2", "2025-05-05"),
        campaign("C5", "E2", "S3", "2025-05-06"),
    ];
    let opts = ScopeOptions {
        stores_by_id: Some(&stores),
        allowed_store_ids: None,
        event_targets: Some(&tgts),
    };
    for m in compute_event_metrics(&events, &campaigns, date("2025-05-20"), &opts) {
        assert!(m.gap_promos <= m.target_promos, "{}", m.event_id);
        assert_eq!(
            m.gap_stores,
            m.target_stores.saturating_sub(m.stores_to_date),
            "{}",
            m.event_id
        );
        assert_eq!(m.stores_pct, m.fill_rate, "{}", m.event_id);
        assert!(m.gmv_gap >= 0.0);
    }
}

// ---------------------------------------------------------------------------
// Zero targets in formulas never divide by zero
// ---------------------------------------------------------------------------
#[test]
fn zero_denominators_produce_zero_pcts() {
    let events = vec![event("E1", 0, 0)];
    let campaigns = vec![campaign("C1", "E1", "S1", "2025-05-10")];
    let m = &compute_event_metrics(&events, &campaigns, date("2025-05-20"), &ScopeOptions::default())[0];
    assert_eq!(m.promos_pct, 0.0);
    assert_eq!(m.fill_rate, 0.0);
    assert_eq!(m.promos_to_date, 1, "counts still accumulate");
}

// ---------------------------------------------------------------------------
// Scope filter narrows both footprint and campaign counting
// ---------------------------------------------------------------------------
#[test]
fn scope_filter_gates_targets_and_campaigns() {
    let events = vec![event("E1", 10, 9)];
    let stores = catalog(vec![
        store("S1", "Lisboa", 100.0),
        store("S2", "Porto", 50.0),
    ]);
    let tgts = targets(&[("E1", "S1"), ("E1", "S2")]);
    let campaigns = vec![
        campaign("C1", "E1", "S1", "2025-05-10"),
        campaign("C2", "E1", "S2", "2025-05-10"),
    ];
    let allowed: HashSet<String> = ["S1".to_string()].into();
    let opts = ScopeOptions {
        stores_by_id: Some(&stores),
        allowed_store_ids: Some(&allowed),
        event_targets: Some(&tgts),
    };
    let m = &compute_event_metrics(&events, &campaigns, date("2025-05-20"), &opts)[0];
    assert!(m.scoped);
    assert_eq!(m.target_stores, 1, "S2 is outside the scope filter");
    assert_eq!(m.promos_to_date, 1, "S2's campaign is gated out too");
    assert_eq!(m.gmv_target, 100.0);
}

// ---------------------------------------------------------------------------
// Recomputing with a different as-of moves the numbers, not the footprint
// ---------------------------------------------------------------------------
#[test]
fn as_of_shifts_counts_only() {
    let events = vec![event("E1", 10, 5)];
    let stores = catalog(vec![store("S1", "Lisboa", 100.0), store("S2", "Porto", 50.0)]);
    let tgts = targets(&[("E1", "S1"), ("E1", "S2")]);
    let campaigns = vec![
        campaign("C1", "E1", "S1", "2025-05-10"),
        campaign("C2", "E1", "S2", "2025-06-01"),
    ];
    let opts = ScopeOptions {
        stores_by_id: Some(&stores),
        allowed_store_ids: None,
        event_targets: Some(&tgts),
    };
    let early = &compute_event_metrics(&events, &campaigns, date("2025-05-15"), &opts)[0];
    let late = &compute_event_metrics(&events, &campaigns, date("2025-06-15"), &opts)[0];
    assert_eq!(early.target_stores, late.target_stores);
    assert_eq!(early.stores_to_date, 1);
    assert_eq!(late.stores_to_date, 2);
    assert!(early.days_to_start > late.days_to_start);
}
