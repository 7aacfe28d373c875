//! End-to-end validation: CSV files on disk → ingest → validator verdict.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use chrono::Utc;
use promotrack::ingest::read_batch;
use promotrack::model::RawBatch;
use promotrack::validate::validate;

fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn batch_from(
    events: &str,
    campaigns: &str,
    stores: &str,
    targets: Option<&str>,
) -> (RawBatch, TempDir) {
    let dir = TempDir::new().unwrap();
    let events_path = write_csv(&dir, "events.csv", events);
    let campaigns_path = write_csv(&dir, "campaigns.csv", campaigns);
    let stores_path = write_csv(&dir, "stores.csv", stores);
    let targets_path = match targets {
        Some(content) => write_csv(&dir, "targets.csv", content),
        None => dir.path().join("absent_targets.csv"),
    };
    let (batch, _manifests) = read_batch(
        Path::new(&events_path),
        Path::new(&campaigns_path),
        Path::new(&stores_path),
        Path::new(&targets_path),
        Utc::now().timestamp(),
    )
    .unwrap();
    (batch, dir)
}

const GOOD_EVENTS: &str = "event_id,event_name,description,start_date,end_date,status,target_promos,target_stores\n\
    E1,Spring relaunch,desc,2025-05-01,2025-06-30,active,10,1\n";
const GOOD_CAMPAIGNS: &str = "campaign_id,event_id,store_id,created_at\n\
    C1,E1,S1,2025-05-10\n";
const GOOD_STORES: &str = "store_id,brand,region,city,commercial,segment,ops_zone,gmv_last_30d,gmv_last_7d\n\
    S1,Acme,Sul,Lisboa,ana,A,Z1,1000,250\n";
const GOOD_TARGETS: &str = "event_id,store_id\nE1,S1\n";

// ---------------------------------------------------------------------------
// Clean batch: adoptable, and validation is idempotent
// ---------------------------------------------------------------------------
#[test]
fn clean_batch_is_adoptable() {
    let (batch, _dir) = batch_from(GOOD_EVENTS, GOOD_CAMPAIGNS, GOOD_STORES, Some(GOOD_TARGETS));
    let report = validate(&batch);
    assert!(
        report.hard_errors.is_empty(),
        "unexpected hard errors: {:?}",
        report.hard_errors
    );
    assert!(report.is_adoptable());
}

#[test]
fn revalidation_is_deterministic() {
    let (batch, _dir) = batch_from(GOOD_EVENTS, GOOD_CAMPAIGNS, GOOD_STORES, Some(GOOD_TARGETS));
    let r1 = validate(&batch);
    let r2 = validate(&batch);
    assert_eq!(r1, r2, "same batch must produce the same report");
}

// ---------------------------------------------------------------------------
// Negative GMV blocks adoption and names the store
// ---------------------------------------------------------------------------
#[test]
fn negative_gmv_blocks_the_batch() {
    let stores = "store_id,brand,region,city,commercial,segment,ops_zone,gmv_last_30d\n\
        S1,Acme,Sul,Lisboa,ana,A,Z1,1000\n\
        S2,Acme,Sul,Lisboa,ana,A,Z1,-5\n";
    let (batch, _dir) = batch_from(GOOD_EVENTS, GOOD_CAMPAIGNS, stores, Some(GOOD_TARGETS));
    let report = validate(&batch);
    assert!(!report.is_adoptable());
    assert!(
        report.hard_errors.iter().any(|e| e.contains("S2")),
        "error must reference S2: {:?}",
        report.hard_errors
    );
}

// ---------------------------------------------------------------------------
// Missing targets table: every event is open, with a warning
// ---------------------------------------------------------------------------
#[test]
fn absent_targets_table_means_open_events() {
    let (batch, _dir) = batch_from(GOOD_EVENTS, GOOD_CAMPAIGNS, GOOD_STORES, None);
    assert!(batch.targets.is_empty());
    let report = validate(&batch);
    assert!(report.is_adoptable());
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("E1") && w.contains("treated as open")),
        "expected open-event warning: {:?}",
        report.warnings
    );
}

// ---------------------------------------------------------------------------
// Case/order-insensitive headers survive the full path
// ---------------------------------------------------------------------------
#[test]
fn shuffled_headers_parse_identically() {
    let events = "TARGET_STORES,Event_Name,event_id,description,START_DATE,end_date,status,target_promos\n\
        1,Spring relaunch,E1,desc,2025-05-01,2025-06-30,active,10\n";
    let (batch, _dir) = batch_from(events, GOOD_CAMPAIGNS, GOOD_STORES, Some(GOOD_TARGETS));
    assert_eq!(batch.events[0].event_id, "E1");
    assert_eq!(batch.events[0].target_stores, "1");
    let report = validate(&batch);
    assert!(report.is_adoptable(), "{:?}", report.hard_errors);
}

// ---------------------------------------------------------------------------
// Dangling references across files are caught
// ---------------------------------------------------------------------------
#[test]
fn cross_table_references_are_enforced() {
    let campaigns = "campaign_id,event_id,store_id,created_at\n\
        C1,E1,S1,2025-05-10\n\
        C2,E9,S1,2025-05-10\n\
        C3,E1,S9,2025-05-10\n";
    let targets = "event_id,store_id\nE1,S1\nE9,S1\nE1,S9\n";
    let (batch, _dir) = batch_from(GOOD_EVENTS, campaigns, GOOD_STORES, Some(targets));
    let report = validate(&batch);
    assert!(report
        .hard_errors
        .iter()
        .any(|e| e.contains("C2") && e.contains("unknown event_id")));
    assert!(report
        .hard_errors
        .iter()
        .any(|e| e.contains("C3") && e.contains("unknown store_id")));
    assert!(report
        .hard_errors
        .iter()
        .any(|e| e.contains("(E9, S1)") && e.contains("unknown event_id")));
    assert!(report
        .hard_errors
        .iter()
        .any(|e| e.contains("(E1, S9)") && e.contains("unknown store_id")));
}
