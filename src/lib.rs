//! Promo event coverage engine.
//!
//! Pipeline:
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌───────────┐
//! │  Ingest  │───►│ Validate │───►│ Metrics  │───►│ Snapshots │
//! │  (CSV)   │    │  (gate)  │    │ (as-of)  │    │ (history) │
//! └──────────┘    └──────────┘    └────┬─────┘    └─────┬─────┘
//!                                      │                │
//!                                      ▼                ▼
//!                                ┌──────────┐    ┌───────────┐
//!                                │Drilldown │    │  Deltas   │
//!                                │ (levels) │    │ (Δ48h/7d) │
//!                                └──────────┘    └───────────┘
//! ```
//!
//! Everything left of the snapshot store is a pure function over in-memory
//! collections, recomputed whenever the entities, the as-of date, or the
//! scope filter change. The snapshot store is the single mutating
//! collaborator and degrades to a logged no-op when its backend fails.

pub mod config;
pub mod deltas;
pub mod document;
pub mod drilldown;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod snapshots;
pub mod validate;
