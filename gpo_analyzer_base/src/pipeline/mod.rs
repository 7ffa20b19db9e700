//! # Pipeline
//!
//! Drives decoding, normalization and analysis over a policy store and
//! projects the findings for enrichment.

pub mod batch;
pub mod engine;
pub mod enrich;

pub use batch::{process_batch, BatchConfig, BatchError, BatchResults};
pub use engine::{Engine, ProcessedDomain, ProcessedGpo};
pub use enrich::{ComputerProperty, DomainEnrichment, EnrichmentEdge, GpoEnrichment};
