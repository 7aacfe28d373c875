//! Historical snapshot store for per-event metric readings.
//!
//! Append-only with two bounds: a dedup window (a re-write for the same
//! event within 30 minutes replaces the prior reading) and retention
//! (rows older than 30 days, and anything beyond the 2000 most recent,
//! are evicted oldest-first). Backends are dumb load/save collaborators;
//! the policy lives here. A backend failure never propagates: the write
//! degrades to a logged no-op and the `WriteOutcome` flag records it.

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::logging::{json_log, log, obj, v_num, v_str, Domain, Level};
use crate::metrics::EventMetrics;

pub const DEDUP_WINDOW_MS: i64 = 30 * 60 * 1000;
pub const RETENTION_MAX_AGE_MS: i64 = 30 * 24 * 3600 * 1000;
pub const RETENTION_MAX_ROWS: usize = 2000;

/// One immutable metric reading for one event at one capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub event_id: String,
    pub captured_at_ms: i64,
    pub target_stores: u32,
    pub stores_to_date: u32,
    pub fill_rate: f64,
    pub target_promos: u32,
    pub promos_to_date: u32,
    pub gmv_target: f64,
    pub gmv_covered: f64,
    pub gmv_coverage: f64,
}

impl SnapshotRow {
    pub fn from_metrics(m: &EventMetrics, captured_at_ms: i64) -> Self {
        SnapshotRow {
            event_id: m.event_id.clone(),
            captured_at_ms,
            target_stores: m.target_stores,
            stores_to_date: m.stores_to_date,
            fill_rate: m.fill_rate,
            target_promos: m.target_promos,
            promos_to_date: m.promos_to_date,
            gmv_target: m.gmv_target,
            gmv_covered: m.gmv_covered,
            gmv_coverage: m.gmv_coverage,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub dedup_window_ms: i64,
    pub max_age_ms: i64,
    pub max_rows: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy {
            dedup_window_ms: DEDUP_WINDOW_MS,
            max_age_ms: RETENTION_MAX_AGE_MS,
            max_rows: RETENTION_MAX_ROWS,
        }
    }
}

/// What a write actually did. `persisted == false` means the reading was
/// lost to a backend failure; callers never see an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOutcome {
    pub persisted: bool,
    pub written: usize,
    pub deduped: usize,
    pub pruned: usize,
}

pub trait SnapshotBackend {
    fn load(&mut self) -> Result<Vec<SnapshotRow>>;
    fn save(&mut self, rows: &[SnapshotRow]) -> Result<()>;
}

pub struct SnapshotStore<B: SnapshotBackend> {
    backend: B,
    policy: RetentionPolicy,
}

impl<B: SnapshotBackend> SnapshotStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, RetentionPolicy::default())
    }

    pub fn with_policy(backend: B, policy: RetentionPolicy) -> Self {
        SnapshotStore { backend, policy }
    }

    /// Merge one batch of current readings into history.
    pub fn record(&mut self, batch: &[EventMetrics], captured_at_ms: i64) -> WriteOutcome {
        let mut history = match self.backend.load() {
            Ok(rows) => rows,
            Err(err) => {
                self.log_lost("load", batch.len(), &err);
                return WriteOutcome::default();
            }
        };

        let batch_events: HashSet<&str> = batch.iter().map(|m| m.event_id.as_str()).collect();

        // Dedup: a second reading for the same event within the window
        // replaces the prior one.
        let before = history.len();
        history.retain(|row| {
            !(batch_events.contains(row.event_id.as_str())
                && (captured_at_ms - row.captured_at_ms).abs() < self.policy.dedup_window_ms)
        });
        let deduped = before - history.len();

        let written = batch.len();
        for m in batch {
            history.push(SnapshotRow::from_metrics(m, captured_at_ms));
        }

        // Retention: age bound first, then the overall row cap, both
        // evicting oldest-first.
        let before = history.len();
        let cutoff = captured_at_ms - self.policy.max_age_ms;
        history.retain(|row| row.captured_at_ms >= cutoff);
        history.sort_by(|a, b| {
            b.captured_at_ms
                .cmp(&a.captured_at_ms)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        history.truncate(self.policy.max_rows);
        let pruned = before - history.len();

        if let Err(err) = self.backend.save(&history) {
            self.log_lost("save", written, &err);
            return WriteOutcome {
                persisted: false,
                written: 0,
                deduped,
                pruned,
            };
        }

        json_log(
            Domain::Snapshot,
            "recorded",
            obj(&[
                ("events", v_num(written as f64)),
                ("deduped", v_num(deduped as f64)),
                ("pruned", v_num(pruned as f64)),
                ("history_rows", v_num(history.len() as f64)),
            ]),
        );
        WriteOutcome {
            persisted: true,
            written,
            deduped,
            pruned,
        }
    }

    /// Closest reading to `target_ms` for one event, optionally bounded by
    /// a tolerance window. First-seen wins on exact distance ties.
    pub fn find_closest(
        &mut self,
        event_id: &str,
        target_ms: i64,
        tolerance_ms: Option<i64>,
    ) -> Option<SnapshotRow> {
        let history = match self.backend.load() {
            Ok(rows) => rows,
            Err(err) => {
                self.log_lost("query", 0, &err);
                return None;
            }
        };

        let mut best: Option<SnapshotRow> = None;
        let mut best_dist = i64::MAX;
        for row in history {
            if row.event_id != event_id {
                continue;
            }
            let dist = (row.captured_at_ms - target_ms).abs();
            if let Some(tol) = tolerance_ms {
                if dist > tol {
                    continue;
                }
            }
            if dist < best_dist {
                best_dist = dist;
                best = Some(row);
            }
        }
        best
    }

    fn log_lost(&self, op: &str, readings: usize, err: &anyhow::Error) {
        log(
            Level::Warn,
            Domain::Snapshot,
            "history_lost",
            obj(&[
                ("op", v_str(op)),
                ("readings", v_num(readings as f64)),
                ("error", v_str(&err.to_string())),
            ]),
        );
    }
}

// =============================================================================
// Backends
// =============================================================================

/// In-memory backend for tests and single-session use. The failure toggles
/// make the best-effort no-op path observable.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    pub rows: Vec<SnapshotRow>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn load(&mut self) -> Result<Vec<SnapshotRow>> {
        if self.fail_reads {
            anyhow::bail!("memory backend: reads disabled");
        }
        Ok(self.rows.clone())
    }

    fn save(&mut self, rows: &[SnapshotRow]) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("memory backend: writes disabled");
        }
        self.rows = rows.to_vec();
        Ok(())
    }
}

/// SQLite backend: one flat `snapshots` table, rewritten wholesale on save
/// since the store's merge already produced the full retained history.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(path: &str) -> Result<Self> {
        Ok(SqliteBackend {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(SqliteBackend {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS snapshots (
                event_id TEXT NOT NULL,
                captured_at_ms INTEGER NOT NULL,
                target_stores INTEGER NOT NULL,
                stores_to_date INTEGER NOT NULL,
                fill_rate REAL NOT NULL,
                target_promos INTEGER NOT NULL,
                promos_to_date INTEGER NOT NULL,
                gmv_target REAL NOT NULL,
                gmv_covered REAL NOT NULL,
                gmv_coverage REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_event_ts
                ON snapshots (event_id, captured_at_ms);
            COMMIT;",
        )?;
        Ok(())
    }
}

impl SnapshotBackend for SqliteBackend {
    fn load(&mut self) -> Result<Vec<SnapshotRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, captured_at_ms, target_stores, stores_to_date, fill_rate,
                    target_promos, promos_to_date, gmv_target, gmv_covered, gmv_coverage
             FROM snapshots
             ORDER BY captured_at_ms DESC, event_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SnapshotRow {
                    event_id: row.get(0)?,
                    captured_at_ms: row.get(1)?,
                    target_stores: row.get(2)?,
                    stores_to_date: row.get(3)?,
                    fill_rate: row.get(4)?,
                    target_promos: row.get(5)?,
                    promos_to_date: row.get(6)?,
                    gmv_target: row.get(7)?,
                    gmv_covered: row.get(8)?,
                    gmv_coverage: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn save(&mut self, rows: &[SnapshotRow]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM snapshots", [])?;
        for row in rows {
            tx.execute(
                "INSERT INTO snapshots (event_id, captured_at_ms, target_stores, stores_to_date,
                    fill_rate, target_promos, promos_to_date, gmv_target, gmv_covered, gmv_coverage)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    row.event_id,
                    row.captured_at_ms,
                    row.target_stores,
                    row.stores_to_date,
                    row.fill_rate,
                    row.target_promos,
                    row.promos_to_date,
                    row.gmv_target,
                    row.gmv_covered,
                    row.gmv_coverage
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
