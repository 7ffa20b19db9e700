//! # Analysis Results
//!
//! - [`Finding`] - One security-relevant setting
//! - [`FindingSet`] - Findings of a GPO grouped by category
//! - [`GpoReport`] / [`DomainReport`] - Output of an analysis run

pub mod types;

pub use types::{
    CredentialFinding, DomainReport, DomainStatus, EnrichmentProperty, Finding, FindingCategory,
    FindingDetail, FindingSet, GpoReport, GroupFinding, HijackableNames, PrivilegeFinding,
    RegistryFinding, SAM_ACCOUNT_NAME_LIMIT,
};
