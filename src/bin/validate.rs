//! Validation report tool: read the four tables, print manifests and the
//! validation report as JSON, exit non-zero when the batch is blocked.

use chrono::Utc;
use serde_json::json;
use std::path::Path;

use promotrack::config::Config;
use promotrack::ingest;
use promotrack::validate::validate;

fn main() {
    let cfg = Config::from_env();
    let now_epoch = Utc::now().timestamp();

    let (batch, manifests) = match ingest::read_batch(
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
    let payload = json!({
        "manifests": manifests,
        "hard_errors": report.hard_errors,
        "warnings": report.warnings,
        "adoptable": report.is_adoptable(),
    });
    println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());

    if !report.is_adoptable() {
        std::process::exit(2);
    }
}
