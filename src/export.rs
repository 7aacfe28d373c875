//! Delimited-text export rows, consumed by the UI layer.

use crate::metrics::EventMetrics;
use crate::model::Store;

/// Event metrics table, one row per event.
pub fn event_metrics_csv(rows: &[EventMetrics]) -> String {
    let mut out = String::from(
        "event_id,event_name,status,scoped,target_stores,stores_to_date,fill_rate,\
         target_promos,promos_to_date,promos_pct,gap_promos,gap_stores,days_to_start,\
         gmv_target,gmv_covered,gmv_coverage,gmv_gap\n",
    );
    for m in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{:.2},{},{},{:.2},{},{},{},{:.2},{:.2},{:.2},{:.2}\n",
            m.event_id,
            sanitize(&m.event_name),
            sanitize(&m.status),
            m.scoped,
            m.target_stores,
            m.stores_to_date,
            m.fill_rate,
            m.target_promos,
            m.promos_to_date,
            m.promos_pct,
            m.gap_promos,
            m.gap_stores,
            m.days_to_start,
            m.gmv_target,
            m.gmv_covered,
            m.gmv_coverage,
            m.gmv_gap,
        ));
    }
    out
}

/// Target stores still lacking a promo for one event.
pub fn missing_stores_csv(event_id: &str, stores: &[&Store]) -> String {
    let mut out =
        String::from("event_id,store_id,brand,region,city,commercial,gmv_last_30d\n");
    for s in stores {
        out.push_str(&format!(
            "{},{},{},{},{},{},{:.2}\n",
            event_id,
            s.id,
            sanitize(&s.brand),
            sanitize(&s.region),
            sanitize(&s.city),
            sanitize(&s.commercial),
            s.gmv_last_30d,
        ));
    }
    out
}

// Flatten delimiter collisions instead of quoting.
fn sanitize(field: &str) -> String {
    field.replace(',', " ")
}
