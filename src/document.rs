//! Versioned persisted document: the validated raw tables plus the active
//! scope selection, written as one JSON record. The engine only needs
//! load/save at this boundary; everything else recomputes in memory.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{RawBatch, ScopeFilter};

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub version: u32,
    /// RFC3339 timestamp of the last adoption.
    pub updated_at: String,
    pub scope: Option<ScopeFilter>,
    pub batch: RawBatch,
}

impl Document {
    pub fn new(batch: RawBatch, scope: Option<ScopeFilter>, updated_at: String) -> Self {
        Document {
            version: DOCUMENT_VERSION,
            updated_at,
            scope,
            batch,
        }
    }
}

pub trait DocumentStore {
    fn load(&self) -> Result<Option<Document>>;
    fn save(&mut self, doc: &Document) -> Result<()>;
}

/// JSON file store. Saves go through a sibling temp file + rename so a
/// crash mid-write cannot truncate the previous document.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Result<Option<Document>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        let doc: Document = serde_json::from_str(&raw)
            .with_context(|| format!("malformed document {}", self.path.display()))?;
        if doc.version != DOCUMENT_VERSION {
            bail!(
                "unsupported document version {} in {}",
                doc.version,
                self.path.display()
            );
        }
        Ok(Some(doc))
    }

    fn save(&mut self, doc: &Document) -> Result<()> {
        let payload = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).with_context(|| format!("cannot write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("cannot replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawEvent, ScopeField};
    use tempfile::TempDir;

    fn sample_doc() -> Document {
        let batch = RawBatch {
            events: vec![RawEvent {
                event_id: "E1".to_string(),
                event_name: "Spring".to_string(),
                start_date: "2025-03-01".to_string(),
                end_date: "2025-04-01".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let scope = Some(ScopeFilter {
            field: ScopeField::Region,
            values: vec!["Sul".to_string()],
        });
        Document::new(batch, scope, "2025-03-02T10:00:00Z".to_string())
    }

    #[test]
    fn round_trips_through_file() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("doc.json"));
        store.save(&sample_doc()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.version, DOCUMENT_VERSION);
        assert_eq!(loaded.batch.events[0].event_id, "E1");
        assert_eq!(loaded.scope.unwrap().values, vec!["Sul".to_string()]);
    }

    #[test]
    fn missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        let mut doc = sample_doc();
        doc.version = 99;
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
        let store = JsonFileStore::new(path);
        assert!(store.load().is_err());
    }
}
