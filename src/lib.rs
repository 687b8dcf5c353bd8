// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod record;
pub mod taxonomy;
pub mod config;

// Engine: annotation, grouping, selection
pub mod analyze;
pub mod select;

// Record supply
pub mod cache;
pub mod ingest;

// HTTP surface
pub mod api;
pub mod metrics;

mod devlog;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::CapConfig;
pub use crate::record::{AnnotatedRecord, Category, RawRecord, ScrapedCard};
pub use crate::select::{select, SelectionResult, Selector};
pub use crate::taxonomy::{Taxonomy, TaxonomyHandle};
