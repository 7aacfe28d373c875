//! Cross-table validation of an ingestion batch.
//!
//! Hard errors block adoption of the batch; warnings are advisory and the
//! batch is adopted anyway. The function is pure: same batch in, same
//! report out.

use std::collections::{HashMap, HashSet};

use crate::model::{parse_date, RawBatch};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub hard_errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_adoptable(&self) -> bool {
        self.hard_errors.is_empty()
    }
}

fn parse_gmv(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => None,
    }
}

pub fn validate(batch: &RawBatch) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // --- stores --------------------------------------------------------
    let mut store_ids = HashSet::new();
    for s in &batch.stores {
        let id = s.store_id.trim();
        if !store_ids.insert(id.to_string()) {
            errors.push(format!("duplicate store_id: {}", id));
        }
        if s.brand.trim().is_empty() {
            errors.push(format!("store {}: empty brand", id));
        }
        if parse_gmv(&s.gmv_last_30d).is_none() {
            errors.push(format!(
                "store {}: invalid gmv_last_30d '{}'",
                id,
                s.gmv_last_30d.trim()
            ));
        }
        if let Some(gmv7) = s.gmv_last_7d.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            if parse_gmv(gmv7).is_none() {
                errors.push(format!("store {}: invalid gmv_last_7d '{}'", id, gmv7));
            }
        }
    }

    // --- events --------------------------------------------------------
    let mut event_ids = HashSet::new();
    let mut event_ranges = HashMap::new();
    for e in &batch.events {
        let id = e.event_id.trim();
        if !event_ids.insert(id.to_string()) {
            errors.push(format!("duplicate event_id: {}", id));
        }
        let start = parse_date(&e.start_date);
        let end = parse_date(&e.end_date);
        match (start, end) {
            (Some(s), Some(en)) if s > en => {
                errors.push(format!(
                    "event {}: start_date {} after end_date {}",
                    id,
                    e.start_date.trim(),
                    e.end_date.trim()
                ));
            }
            (Some(s), Some(en)) => {
                event_ranges.insert(id.to_string(), (s, en));
            }
            _ => {
                errors.push(format!(
                    "event {}: unparsable date range '{}'..'{}'",
                    id,
                    e.start_date.trim(),
                    e.end_date.trim()
                ));
            }
        }
    }

    // --- campaigns -----------------------------------------------------
    let mut campaign_ids = HashSet::new();
    for c in &batch.campaigns {
        let id = c.campaign_id.trim();
        if !campaign_ids.insert(id.to_string()) {
            errors.push(format!("duplicate campaign_id: {}", id));
        }
        if !event_ids.contains(c.event_id.trim()) {
            errors.push(format!(
                "campaign {}: unknown event_id {}",
                id,
                c.event_id.trim()
            ));
        }
        if !store_ids.contains(c.store_id.trim()) {
            errors.push(format!(
                "campaign {}: unknown store_id {}",
                id,
                c.store_id.trim()
            ));
        }
        if let (Some(created), Some((start, end))) = (
            parse_date(&c.created_at),
            event_ranges.get(c.event_id.trim()),
        ) {
            if created < *start || created > *end {
                warnings.push(format!(
                    "campaign {}: created_at {} outside event {} range",
                    id,
                    c.created_at.trim(),
                    c.event_id.trim()
                ));
            }
        }
    }

    // --- targets -------------------------------------------------------
    let mut target_pairs = HashSet::new();
    let mut valid_targets: HashMap<String, Vec<String>> = HashMap::new();
    for t in &batch.targets {
        let event_id = t.event_id.trim();
        let store_id = t.store_id.trim();
        if !target_pairs.insert((event_id.to_string(), store_id.to_string())) {
            errors.push(format!(
                "duplicate target pair: ({}, {})",
                event_id, store_id
            ));
            continue;
        }
        let mut dangling = false;
        if !event_ids.contains(event_id) {
            errors.push(format!("target ({}, {}): unknown event_id", event_id, store_id));
            dangling = true;
        }
        if !store_ids.contains(store_id) {
            errors.push(format!("target ({}, {}): unknown store_id", event_id, store_id));
            dangling = true;
        }
        if !dangling {
            valid_targets
                .entry(event_id.to_string())
                .or_default()
                .push(store_id.to_string());
        }
    }

    // --- footprint warnings --------------------------------------------
    let stores_by_id: HashMap<&str, &crate::model::RawStore> = batch
        .stores
        .iter()
        .map(|s| (s.store_id.trim(), s))
        .collect();

    for e in &batch.events {
        let id = e.event_id.trim();
        match valid_targets.get(id) {
            Some(targets) => {
                let declared: Option<u32> = e.target_stores.trim().parse().ok();
                if declared != Some(targets.len() as u32) {
                    warnings.push(format!(
                        "event {}: declared target_stores {} != {} valid targets",
                        id,
                        e.target_stores.trim(),
                        targets.len()
                    ));
                }

                // Brand activation gap: a brand is targeted but no campaign
                // for this event touches any store of that brand.
                let mut targeted_brands = HashSet::new();
                for store_id in targets {
                    if let Some(store) = stores_by_id.get(store_id.as_str()) {
                        let brand = store.brand.trim();
                        if !brand.is_empty() {
                            targeted_brands.insert(brand.to_string());
                        }
                    }
                }
                let campaign_brands: HashSet<String> = batch
                    .campaigns
                    .iter()
                    .filter(|c| c.event_id.trim() == id)
                    .filter_map(|c| stores_by_id.get(c.store_id.trim()))
                    .map(|s| s.brand.trim().to_string())
                    .collect();
                let mut gaps: Vec<&String> = targeted_brands
                    .iter()
                    .filter(|b| !campaign_brands.contains(*b))
                    .collect();
                gaps.sort();
                for brand in gaps {
                    warnings.push(format!(
                        "event {}: brand {} targeted but has no campaigns",
                        id, brand
                    ));
                }
            }
            None => {
                warnings.push(format!(
                    "event {}: no valid targets, treated as open",
                    id
                ));
            }
        }
    }

    ValidationReport {
        hard_errors: errors,
        warnings,
    }
}
