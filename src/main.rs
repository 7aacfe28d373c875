use anyhow::{bail, Result};
use chrono::Utc;
use std::path::Path;

use promotrack::config::Config;
use promotrack::deltas::compute_trend_deltas;
use promotrack::document::{Document, DocumentStore, JsonFileStore};
use promotrack::drilldown::{self, DrillContext};
use promotrack::export;
use promotrack::ingest;
use promotrack::logging::{json_log, log, obj, ts_epoch_ms, ts_now, v_num, v_str, Domain, Level};
use promotrack::metrics::{compute_event_metrics, ScopeOptions};
use promotrack::model::{parse_date, Entities};
use promotrack::snapshots::{SnapshotStore, SqliteBackend};
use promotrack::validate::validate;

fn main() -> Result<()> {
    let cfg = Config::from_env();
    json_log(
        Domain::System,
        "startup",
        obj(&[
            ("events_csv", v_str(&cfg.events_csv)),
            ("campaigns_csv", v_str(&cfg.campaigns_csv)),
            ("stores_csv", v_str(&cfg.stores_csv)),
            ("targets_csv", v_str(&cfg.targets_csv)),
            ("snapshot_db", v_str(&cfg.sqlite_path)),
        ]),
    );

    // Ingest the four tables.
    let now_epoch = Utc::now().timestamp();
    let (batch, manifests) = ingest::read_batch(
        Path::new(&cfg.events_csv),
        Path::new(&cfg.campaigns_csv),
        Path::new(&cfg.stores_csv),
        Path::new(&cfg.targets_csv),
        now_epoch,
    )?;
    for m in &manifests {
        json_log(
            Domain::Ingest,
            "table_read",
            obj(&[
                ("table", v_str(&m.table)),
                ("rows", v_num(m.row_count as f64)),
                ("bad_rows", v_num(m.bad_rows as f64)),
                ("hash", v_str(&m.hash_sha256)),
                ("warnings", v_num(m.warnings.len() as f64)),
            ]),
        );
    }

    // Validation gates adoption; warnings are surfaced but non-blocking.
    let report = validate(&batch);
    for warning in &report.warnings {
        log(
            Level::Warn,
            Domain::Validate,
            "warning",
            obj(&[("detail", v_str(warning))]),
        );
    }
    if !report.is_adoptable() {
        for error in &report.hard_errors {
            log(
                Level::Error,
                Domain::Validate,
                "hard_error",
                obj(&[("detail", v_str(error))]),
            );
            eprintln!("error: {}", error);
        }
        bail!(
            "batch rejected: {} hard errors, {} warnings",
            report.hard_errors.len(),
            report.warnings.len()
        );
    }

    let entities = Entities::from_raw(&batch);
    let scope = cfg.scope_filter();
    let allowed = scope.as_ref().map(|f| f.resolve(&entities.stores_by_id));

    // Persist the adopted batch as the session document.
    let mut doc_store = JsonFileStore::new(&cfg.document_path);
    let doc = Document::new(batch, scope, ts_now());
    doc_store.save(&doc)?;
    json_log(
        Domain::Audit,
        "batch_adopted",
        obj(&[
            ("document", v_str(&cfg.document_path)),
            ("events", v_num(entities.events.len() as f64)),
            ("campaigns", v_num(entities.campaigns.len() as f64)),
            ("stores", v_num(entities.stores_by_id.len() as f64)),
            ("targets", v_num(entities.targets.len() as f64)),
        ]),
    );

    // Metrics as of today unless overridden.
    let as_of = match cfg.as_of.as_deref() {
        Some(raw) => match parse_date(raw) {
            Some(d) => d,
            None => bail!("AS_OF is not a valid YYYY-MM-DD date: {}", raw),
        },
        None => Utc::now().date_naive(),
    };
    let opts = ScopeOptions {
        stores_by_id: Some(&entities.stores_by_id),
        allowed_store_ids: allowed.as_ref(),
        event_targets: Some(&entities.targets),
    };
    let metrics = compute_event_metrics(&entities.events, &entities.campaigns, as_of, &opts);
    for m in &metrics {
        json_log(
            Domain::Metrics,
            "event",
            obj(&[
                ("event_id", v_str(&m.event_id)),
                ("scoped", v_str(if m.scoped { "scoped" } else { "open" })),
                ("fill_rate", v_num(m.fill_rate)),
                ("promos_pct", v_num(m.promos_pct)),
                ("gmv_coverage", v_num(m.gmv_coverage)),
                ("days_to_start", v_num(m.days_to_start as f64)),
            ]),
        );
    }

    // Record the reading and report trends against history.
    let mut backend = SqliteBackend::open(&cfg.sqlite_path)?;
    backend.init()?;
    let mut snapshots = SnapshotStore::with_policy(backend, cfg.retention_policy());
    let now_ms = ts_epoch_ms();
    let outcome = snapshots.record(&metrics, now_ms);
    if !outcome.persisted {
        eprintln!("warning: snapshot write lost, trend history will have a hole");
    }

    for m in &metrics {
        let deltas = compute_trend_deltas(m, &mut snapshots, now_ms);
        let fmt = |d: Option<f64>| d.map(|v| format!("{:+.1}", v)).unwrap_or_else(|| "--".to_string());
        println!(
            "{:<12} fill {:>5.1}% (Δ48h {:>6}, Δ7d {:>6})  promos {}/{}  gmv {:>5.1}%",
            m.event_id,
            m.fill_rate,
            fmt(deltas.fill_rate_48h),
            fmt(deltas.fill_rate_7d),
            m.promos_to_date,
            m.target_promos,
            m.gmv_coverage,
        );
    }

    // Worst coverage first across every event's cities, as a console digest.
    for event in &entities.events {
        let ctx = DrillContext {
            event,
            campaigns: &entities.campaigns,
            stores_by_id: &entities.stores_by_id,
            targets: &entities.targets,
            allowed_store_ids: allowed.as_ref(),
            as_of,
        };
        let summary = drilldown::event_summary(&ctx);
        for city in &summary.worst_cities {
            json_log(
                Domain::Drill,
                "city_coverage",
                obj(&[
                    ("event_id", v_str(&event.id)),
                    ("city", v_str(&city.city)),
                    ("fill_rate", v_num(city.fill_rate)),
                    ("risk", v_str(&format!("{:?}", city.risk).to_lowercase())),
                ]),
            );
        }
    }

    if let Some(export_path) = &cfg.export_path {
        std::fs::write(export_path, export::event_metrics_csv(&metrics))?;
        json_log(
            Domain::Audit,
            "export_written",
            obj(&[
                ("path", v_str(export_path)),
                ("rows", v_num(metrics.len() as f64)),
            ]),
        );
    }

    Ok(())
}
