//! # GPO Analyzer Base
//!
//! Normalizes decoded Group Policy settings into canonical group, registry and
//! privilege records and scans them for security-relevant findings: privileged
//! group membership, hijackable trustees, sensitive registry values, dangerous
//! user rights and stored credentials.

pub mod analysis;
pub mod api;
pub mod directory;
pub mod normalize;
pub mod pipeline;
pub mod results;
pub mod rules;

// Convenience re-exports
pub use api::*;
pub use pipeline::Engine;

pub mod prelude {
    pub use crate::api::{
        AnalyzerConfig, AnalyzerError, ConfigError, CryptoError, ObjectFilter, ObjectKind,
    };

    pub use crate::directory::{
        AccountIndex, ContainerMachineCache, DirectoryLookup, EmptyDirectory, Machine,
        OrderedGpo, StaticDirectory, TrusteeRef,
    };

    pub use crate::normalize::{
        CanonicalGroupOperation, CanonicalPrivilegeGrant, CanonicalRegistryOperation,
        NormalizedGpo,
    };

    pub use crate::analysis::AnalysisContext;
    pub use crate::results::{DomainReport, DomainStatus, Finding, FindingCategory, GpoReport};
    pub use crate::rules::RuleSet;

    pub use crate::pipeline::{DomainEnrichment, Engine, ProcessedDomain};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
