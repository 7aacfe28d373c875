//! CSV ingestion for the four entity tables.
//!
//! Headers are matched case-insensitively and order-independently; unknown
//! columns are ignored. A row missing a required column is counted as a bad
//! row with a warning instead of aborting the table. Every read produces a
//! manifest with a SHA-256 fingerprint so an adopted batch can be traced
//! back to the exact file contents.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::model::{RawBatch, RawCampaign, RawEvent, RawStore, RawTarget};

pub const EVENT_COLUMNS: [&str; 8] = [
    "event_id",
    "event_name",
    "description",
    "start_date",
    "end_date",
    "status",
    "target_promos",
    "target_stores",
];
pub const CAMPAIGN_COLUMNS: [&str; 4] = ["campaign_id", "event_id", "store_id", "created_at"];
pub const STORE_COLUMNS: [&str; 8] = [
    "store_id",
    "brand",
    "region",
    "city",
    "commercial",
    "segment",
    "ops_zone",
    "gmv_last_30d",
];
pub const TARGET_COLUMNS: [&str; 2] = ["event_id", "store_id"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableManifest {
    pub table: String,
    pub path: String,
    pub hash_sha256: String,
    pub row_count: u64,
    pub bad_rows: u64,
    pub columns: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_at_epoch: i64,
}

/// Header → column index, matched lowercase.
struct HeaderMap {
    index: HashMap<String, usize>,
    columns: Vec<String>,
}

impl HeaderMap {
    fn parse(line: &str) -> Self {
        let columns: Vec<String> = if line.trim().is_empty() {
            Vec::new()
        } else {
            line.split(',').map(|s| s.trim().to_string()).collect()
        };
        let mut index = HashMap::new();
        for (i, col) in columns.iter().enumerate() {
            index.entry(col.to_lowercase()).or_insert(i);
        }
        HeaderMap { index, columns }
    }

    fn get<'a>(&self, parts: &'a [&str], name: &str) -> Option<&'a str> {
        self.index
            .get(name)
            .and_then(|&i| parts.get(i))
            .map(|s| s.trim())
    }

    fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.index.contains_key(**c))
            .map(|c| c.to_string())
            .collect()
    }
}

struct TableReader {
    header: HeaderMap,
    row_count: u64,
    bad_rows: u64,
    warnings: Vec<String>,
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("read error in {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push(trimmed.to_string());
    }
    Ok(lines)
}

fn read_table<T>(
    path: &Path,
    table: &str,
    required: &[&str],
    now_epoch: i64,
    mut build: impl FnMut(&HeaderMap, &[&str]) -> Result<T, String>,
) -> Result<(Vec<T>, TableManifest)> {
    let hash = file_sha256(path)?;
    let lines = read_lines(path)?;

    let mut rows = Vec::new();
    let mut reader = match lines.first() {
        Some(first) => {
            let header = HeaderMap::parse(first);
            let mut warnings = Vec::new();
            for col in header.missing(required) {
                warnings.push(format!("missing_column: {}", col));
            }
            TableReader {
                header,
                row_count: 0,
                bad_rows: 0,
                warnings,
            }
        }
        None => TableReader {
            header: HeaderMap::parse(""),
            row_count: 0,
            bad_rows: 0,
            warnings: vec!["empty_table".to_string()],
        },
    };

    for line in lines.iter().skip(1) {
        let parts: Vec<&str> = line.split(',').collect();
        match build(&reader.header, &parts) {
            Ok(row) => {
                reader.row_count += 1;
                rows.push(row);
            }
            Err(err) => {
                reader.bad_rows += 1;
                reader.warnings.push(format!("bad_row: {}", err));
            }
        }
    }

    let manifest = TableManifest {
        table: table.to_string(),
        path: path.display().to_string(),
        hash_sha256: hash,
        row_count: reader.row_count,
        bad_rows: reader.bad_rows,
        columns: reader.header.columns.clone(),
        warnings: reader.warnings,
        generated_at_epoch: now_epoch,
    };
    Ok((rows, manifest))
}

fn required<'a>(h: &HeaderMap, parts: &'a [&str], name: &str) -> Result<&'a str, String> {
    h.get(parts, name)
        .ok_or_else(|| format!("missing field {}", name))
}

pub fn read_events(path: &Path, now_epoch: i64) -> Result<(Vec<RawEvent>, TableManifest)> {
    read_table(path, "events", &EVENT_COLUMNS, now_epoch, |h, parts| {
        Ok(RawEvent {
            event_id: required(h, parts, "event_id")?.to_string(),
            event_name: h.get(parts, "event_name").unwrap_or("").to_string(),
            description: h.get(parts, "description").unwrap_or("").to_string(),
            start_date: h.get(parts, "start_date").unwrap_or("").to_string(),
            end_date: h.get(parts, "end_date").unwrap_or("").to_string(),
            status: h.get(parts, "status").unwrap_or("").to_string(),
            target_promos: h.get(parts, "target_promos").unwrap_or("").to_string(),
            target_stores: h.get(parts, "target_stores").unwrap_or("").to_string(),
        })
    })
}

pub fn read_campaigns(path: &Path, now_epoch: i64) -> Result<(Vec<RawCampaign>, TableManifest)> {
    read_table(path, "campaigns", &CAMPAIGN_COLUMNS, now_epoch, |h, parts| {
        Ok(RawCampaign {
            campaign_id: required(h, parts, "campaign_id")?.to_string(),
            event_id: required(h, parts, "event_id")?.to_string(),
            store_id: required(h, parts, "store_id")?.to_string(),
            created_at: h.get(parts, "created_at").unwrap_or("").to_string(),
        })
    })
}

pub fn read_stores(path: &Path, now_epoch: i64) -> Result<(Vec<RawStore>, TableManifest)> {
    read_table(path, "stores", &STORE_COLUMNS, now_epoch, |h, parts| {
        Ok(RawStore {
            store_id: required(h, parts, "store_id")?.to_string(),
            brand: h.get(parts, "brand").unwrap_or("").to_string(),
            region: h.get(parts, "region").unwrap_or("").to_string(),
            city: h.get(parts, "city").unwrap_or("").to_string(),
            commercial: h.get(parts, "commercial").unwrap_or("").to_string(),
            segment: h.get(parts, "segment").unwrap_or("").to_string(),
            ops_zone: h.get(parts, "ops_zone").unwrap_or("").to_string(),
            gmv_last_30d: h.get(parts, "gmv_last_30d").unwrap_or("").to_string(),
            gmv_last_7d: h.get(parts, "gmv_last_7d").map(|s| s.to_string()),
        })
    })
}

/// The targets table is optional: a missing file ingests as an empty table
/// with a manifest warning, and every event falls back to *open*.
pub fn read_targets(path: &Path, now_epoch: i64) -> Result<(Vec<RawTarget>, TableManifest)> {
    if !path.exists() {
        return Ok((
            Vec::new(),
            TableManifest {
                table: "event_targets".to_string(),
                path: path.display().to_string(),
                hash_sha256: String::new(),
                row_count: 0,
                bad_rows: 0,
                columns: Vec::new(),
                warnings: vec!["missing_table".to_string()],
                generated_at_epoch: now_epoch,
            },
        ));
    }
    read_table(path, "event_targets", &TARGET_COLUMNS, now_epoch, |h, parts| {
        Ok(RawTarget {
            event_id: required(h, parts, "event_id")?.to_string(),
            store_id: required(h, parts, "store_id")?.to_string(),
        })
    })
}

/// Read all four tables into one batch.
pub fn read_batch(
    events_path: &Path,
    campaigns_path: &Path,
    stores_path: &Path,
    targets_path: &Path,
    now_epoch: i64,
) -> Result<(RawBatch, Vec<TableManifest>)> {
    let (events, m_events) = read_events(events_path, now_epoch)?;
    let (campaigns, m_campaigns) = read_campaigns(campaigns_path, now_epoch)?;
    let (stores, m_stores) = read_stores(stores_path, now_epoch)?;
    let (targets, m_targets) = read_targets(targets_path, now_epoch)?;
    Ok((
        RawBatch {
            events,
            campaigns,
            stores,
            targets,
        },
        vec![m_events, m_campaigns, m_stores, m_targets],
    ))
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
