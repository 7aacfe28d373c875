//! Trend deltas: current metrics vs the two nearest historical readings.

use serde::Serialize;

use crate::metrics::EventMetrics;
use crate::snapshots::{SnapshotBackend, SnapshotStore};

pub const LOOKBACK_48H_MS: i64 = 48 * 3600 * 1000;
pub const TOLERANCE_48H_MS: i64 = 24 * 3600 * 1000;
pub const LOOKBACK_7D_MS: i64 = 7 * 24 * 3600 * 1000;
pub const TOLERANCE_7D_MS: i64 = 2 * 24 * 3600 * 1000;

/// `None` means no qualifying snapshot (or, for GMV, no positive target).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrendDeltas {
    pub fill_rate_48h: Option<f64>,
    pub fill_rate_7d: Option<f64>,
    pub gmv_coverage_48h: Option<f64>,
    pub gmv_coverage_7d: Option<f64>,
}

pub fn compute_trend_deltas<B: SnapshotBackend>(
    current: &EventMetrics,
    store: &mut SnapshotStore<B>,
    now_ms: i64,
) -> TrendDeltas {
    let near_48h = store.find_closest(
        &current.event_id,
        now_ms - LOOKBACK_48H_MS,
        Some(TOLERANCE_48H_MS),
    );
    let near_7d = store.find_closest(
        &current.event_id,
        now_ms - LOOKBACK_7D_MS,
        Some(TOLERANCE_7D_MS),
    );

    // GMV deltas are only meaningful while the event has a GMV footprint.
    let gmv_meaningful = current.gmv_target > 0.0;

    TrendDeltas {
        fill_rate_48h: near_48h.as_ref().map(|s| current.fill_rate - s.fill_rate),
        fill_rate_7d: near_7d.as_ref().map(|s| current.fill_rate - s.fill_rate),
        gmv_coverage_48h: near_48h
            .as_ref()
            .filter(|_| gmv_meaningful)
            .map(|s| current.gmv_coverage - s.gmv_coverage),
        gmv_coverage_7d: near_7d
            .as_ref()
            .filter(|_| gmv_meaningful)
            .map(|s| current.gmv_coverage - s.gmv_coverage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshots::MemoryBackend;

    const HOUR_MS: i64 = 3600 * 1000;

    fn metrics(fill_rate: f64, gmv_coverage: f64, gmv_target: f64) -> EventMetrics {
        EventMetrics {
            event_id: "E1".to_string(),
            event_name: "Event E1".to_string(),
            status: "active".to_string(),
            scoped: true,
            target_stores: 10,
            stores_to_date: 4,
            stores_pct: fill_rate,
            fill_rate,
            target_promos: 20,
            promos_to_date: 5,
            promos_pct: 25.0,
            gap_promos: 15,
            gap_stores: 6,
            days_to_start: -3,
            gmv_target,
            gmv_covered: gmv_coverage * gmv_target / 100.0,
            gmv_coverage,
            gmv_gap: 0.0,
        }
    }

    #[test]
    fn delta_48h_against_near_snapshot() {
        let mut store = SnapshotStore::new(MemoryBackend::new());
        let now = 10_000 * HOUR_MS;
        // Reading ~48h ago, just inside the 24h tolerance.
        store.record(&[metrics(40.0, 30.0, 500.0)], now - 50 * HOUR_MS);

        let current = metrics(70.0, 55.0, 500.0);
        let deltas = compute_trend_deltas(&current, &mut store, now);
        assert_eq!(deltas.fill_rate_48h, Some(30.0));
        assert_eq!(deltas.gmv_coverage_48h, Some(25.0));
        // Nothing near 7d back.
        assert_eq!(deltas.fill_rate_7d, None);
    }

    #[test]
    fn snapshot_outside_tolerance_is_ignored() {
        let mut store = SnapshotStore::new(MemoryBackend::new());
        let now = 10_000 * HOUR_MS;
        // 80h ago: outside [now-72h, now-36h].
        store.record(&[metrics(40.0, 30.0, 500.0)], now - 80 * HOUR_MS);

        let current = metrics(70.0, 55.0, 500.0);
        let deltas = compute_trend_deltas(&current, &mut store, now);
        assert_eq!(deltas.fill_rate_48h, None);
    }

    #[test]
    fn delta_7d_window_spans_two_days() {
        let mut store = SnapshotStore::new(MemoryBackend::new());
        let now = 10_000 * HOUR_MS;
        store.record(&[metrics(20.0, 10.0, 500.0)], now - 8 * 24 * HOUR_MS);

        let current = metrics(50.0, 35.0, 500.0);
        let deltas = compute_trend_deltas(&current, &mut store, now);
        assert_eq!(deltas.fill_rate_7d, Some(30.0));
        assert_eq!(deltas.gmv_coverage_7d, Some(25.0));
    }

    #[test]
    fn gmv_delta_needs_positive_target() {
        let mut store = SnapshotStore::new(MemoryBackend::new());
        let now = 10_000 * HOUR_MS;
        store.record(&[metrics(40.0, 0.0, 0.0)], now - 48 * HOUR_MS);

        let current = metrics(70.0, 0.0, 0.0);
        let deltas = compute_trend_deltas(&current, &mut store, now);
        assert_eq!(deltas.fill_rate_48h, Some(30.0));
        assert_eq!(deltas.gmv_coverage_48h, None);
    }
}
