//! Per-event drilldown report: summary cards, city/brand tables, and the
//! uncovered-store export for one event.
//!
//! Usage: report <event_id> [missing_stores.csv]

use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

use promotrack::config::Config;
use promotrack::drilldown::{self, DrillContext};
use promotrack::export;
use promotrack::ingest;
use promotrack::model::{parse_date, Entities, DATE_FMT};
use promotrack::validate::validate;

fn main() {
    let event_id = match env::args().nth(1) {
        Some(id) => id,
        None => {
            eprintln!("usage: report <event_id> [missing_stores.csv]");
            std::process::exit(1);
        }
    };
    let missing_out = env::args().nth(2);

    let cfg = Config::from_env();
    let now_epoch = Utc::now().timestamp();
    let (batch, _manifests) = match ingest::read_batch(
        Path::new(&cfg.events_csv),
        Path::new(&cfg.campaigns_csv),
        Path::new(&cfg.stores_csv),
        Path::new(&cfg.targets_csv),
        now_epoch,
    ) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("ingest failed: {:#}", err);
            std::process::exit(1);
        }
    };

    let report = validate(&batch);
    if !report.is_adoptable() {
        for error in &report.hard_errors {
            eprintln!("error: {}", error);
        }
        std::process::exit(2);
    }

    let entities = Entities::from_raw(&batch);
    let event = match entities.events.iter().find(|e| e.id == event_id) {
        Some(e) => e,
        None => {
            eprintln!("unknown event: {}", event_id);
            std::process::exit(3);
        }
    };

    let scope = cfg.scope_filter();
    let allowed = scope.as_ref().map(|f| f.resolve(&entities.stores_by_id));
    let as_of = cfg
        .as_of
        .as_deref()
        .and_then(parse_date)
        .unwrap_or_else(|| Utc::now().date_naive());

    let ctx = DrillContext {
        event,
        campaigns: &entities.campaigns,
        stores_by_id: &entities.stores_by_id,
        targets: &entities.targets,
        allowed_store_ids: allowed.as_ref(),
        as_of,
    };

    let summary = drilldown::event_summary(&ctx);
    let m = &summary.metrics;
    println!("{} - {} ({})", m.event_id, m.event_name, m.status);
    println!("as of {}", as_of.format(DATE_FMT));
    println!(
        "coverage   {:>5.1}%  ({}/{} stores, {})",
        m.fill_rate,
        m.stores_to_date,
        m.target_stores,
        if m.scoped { "scoped" } else { "open" }
    );
    println!(
        "promos     {:>5.1}%  ({}/{}, gap {})",
        m.promos_pct, m.promos_to_date, m.target_promos, m.gap_promos
    );
    println!(
        "gmv        {:>5.1}%  ({:.0}/{:.0}, gap {:.0})",
        m.gmv_coverage, m.gmv_covered, m.gmv_target, m.gmv_gap
    );

    println!("\nworst cities:");
    for row in drilldown::city_rows(&ctx) {
        println!(
            "  {:<16} {:>5.1}%  {}/{} stores, {} promos  [{:?}]",
            row.city,
            row.fill_rate,
            row.stores_with_promo,
            row.target_stores,
            row.promos_created,
            row.risk,
        );
    }

    println!("\nbrands by gmv gap:");
    for row in drilldown::brand_rows(&ctx, None) {
        println!(
            "  {:<16} gap {:>10.2}  {:>5.1}% of {} stores in {} cities",
            row.brand, row.gmv_gap, row.fill_rate, row.target_stores, row.cities,
        );
    }

    if let Some(out_path) = missing_out {
        let uncovered = drilldown::uncovered_stores(&ctx);
        let csv = export::missing_stores_csv(&event_id, &uncovered);
        if let Err(err) = fs::write(&out_path, csv) {
            eprintln!("failed to write {}: {}", out_path, err);
            std::process::exit(4);
        }
        println!("\nwrote {} uncovered stores to {}", uncovered.len(), out_path);
    }
}
