pub mod analysis;
pub mod dump;
pub mod order;

use crate::Selection;
use gpo_analyzer_base::AnalyzerError;
use gpo_decoders::logging::codes::{self, Code};
use gpo_decoders::search::SearchError;
use gpo_decoders::store::{DomainPolicies, GpoDirectory};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Output serialization failed: {0}")]
    Output(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    pub fn log_code(&self) -> Code {
        match self {
            CliError::Analyzer(e) => e.log_code(),
            CliError::Search(_) | CliError::Usage(_) => codes::system::INITIALIZATION_FAILURE,
            CliError::Output(_) => codes::system::INTERNAL_ERROR,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            CliError::Analyzer(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

fn same_guid(a: &str, b: &str) -> bool {
    let trim = |s: &str| s.trim_matches(|c| c == '{' || c == '}').to_ascii_lowercase();
    trim(a) == trim(b)
}

/// Apply the domain and GUID filters; domains left without GPOs are dropped
pub fn select(domains: Vec<DomainPolicies>, selection: &Selection) -> Vec<DomainPolicies> {
    domains
        .into_iter()
        .filter(|d| {
            selection.domain.is_empty()
                || selection.domain.iter().any(|name| name.eq_ignore_ascii_case(&d.domain))
        })
        .filter_map(|mut d| {
            if selection.guid.is_empty() {
                return Some(d);
            }
            d.gpos.retain(|gpo: &GpoDirectory| selection.guid.iter().any(|g| same_guid(g, &gpo.guid)));
            (!d.gpos.is_empty()).then_some(d)
        })
        .collect()
}
