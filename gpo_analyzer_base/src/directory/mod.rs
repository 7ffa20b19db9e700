//! Directory lookups
//!
//! Every lookup may come back empty, for an unknown identifier as well as for
//! an unreachable backend. Callers treat an empty answer as data.

pub mod cache;
pub mod ordering;
pub mod static_dir;
pub mod well_known;

pub use cache::{AccountIndex, ContainerMachineCache};
pub use ordering::{sort_by_precedence, OrderedGpo};
pub use static_dir::StaticDirectory;
pub use well_known::WellKnownTrustees;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Prefix every SID string carries
pub const SID_PREFIX: &str = "S-1-";

/// A trustee as named in a policy, possibly completed by the directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrusteeRef {
    pub sid: Option<String>,
    pub name: Option<String>,
}

impl TrusteeRef {
    pub fn from_sid(sid: impl Into<String>) -> Self {
        Self {
            sid: Some(sid.into()),
            name: None,
        }
    }

    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            sid: None,
            name: Some(name.into()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.sid.is_some()
    }

    /// Whatever identifies the trustee best, for messages
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.sid.as_deref())
            .unwrap_or_default()
    }
}

/// Strip the `*` marker INF files put in front of SIDs
pub fn sid_literal(identifier: &str) -> Option<&str> {
    let trimmed = identifier.trim().trim_start_matches('*');
    if trimmed.len() > SID_PREFIX.len() && trimmed[..SID_PREFIX.len()].eq_ignore_ascii_case(SID_PREFIX) {
        Some(trimmed)
    } else {
        None
    }
}

/// A computer account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Machine {
    /// Host name, optionally fully qualified
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub sid: Option<String>,
}

impl Machine {
    /// Host name without the domain suffix
    pub fn short_name(&self) -> &str {
        let name = self.name.trim_end_matches('$');
        if self.domain.is_empty() {
            return name;
        }
        let suffix_len = self.domain.len() + 1;
        if name.len() > suffix_len {
            let (host, suffix) = name.split_at(name.len() - suffix_len);
            if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(&self.domain) {
                return host;
            }
        }
        name
    }
}

/// A container GPOs can be linked to: the domain root or an OU
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub distinguished_name: String,
}

/// Directory Lookup Service
pub trait DirectoryLookup: Send + Sync {
    /// Resolve a SID (with or without a leading `*`), a `NETBIOS\name`, a UPN or
    /// a bare account name. Bare names are looked up in the domain whose SID is
    /// `domain_hint`.
    fn resolve_trustee(&self, identifier: &str, domain_hint: Option<&str>) -> Option<TrusteeRef>;

    fn machines_affected_by_gpo(&self, gpo_id: &str, domain_id: &str) -> Vec<Machine>;

    fn containers_affected_by_gpo(&self, gpo_id: &str, domain_id: &str) -> Vec<Container>;

    fn machines_in_container(&self, container_id: &str, domain_id: &str) -> Vec<Machine>;

    /// Every account name the directory knows, case preserved
    fn all_known_account_names(&self) -> HashSet<String>;

    fn domain_sid_for(&self, domain_name: &str) -> Option<String>;

    /// GPOs applied to a container, highest precedence first
    fn gpo_order(&self, _container_id: &str, _domain_id: &str) -> Vec<OrderedGpo> {
        Vec::new()
    }

    fn gpo_name(&self, _gpo_id: &str, _domain_id: &str) -> Option<String> {
        None
    }
}

/// A directory that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDirectory;

impl DirectoryLookup for EmptyDirectory {
    fn resolve_trustee(&self, _identifier: &str, _domain_hint: Option<&str>) -> Option<TrusteeRef> {
        None
    }

    fn machines_affected_by_gpo(&self, _gpo_id: &str, _domain_id: &str) -> Vec<Machine> {
        Vec::new()
    }

    fn containers_affected_by_gpo(&self, _gpo_id: &str, _domain_id: &str) -> Vec<Container> {
        Vec::new()
    }

    fn machines_in_container(&self, _container_id: &str, _domain_id: &str) -> Vec<Machine> {
        Vec::new()
    }

    fn all_known_account_names(&self) -> HashSet<String> {
        HashSet::new()
    }

    fn domain_sid_for(&self, _domain_name: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_short_name() {
        let machine = Machine {
            name: "WS01.CORP.local".to_string(),
            domain: "corp.local".to_string(),
            sid: None,
        };
        assert_eq!(machine.short_name(), "WS01");

        let bare = Machine {
            name: "SRV02$".to_string(),
            domain: "corp.local".to_string(),
            sid: None,
        };
        assert_eq!(bare.short_name(), "SRV02");
    }

    #[test]
    fn test_sid_literal() {
        assert_eq!(sid_literal("*S-1-5-32-544"), Some("S-1-5-32-544"));
        assert_eq!(sid_literal(" s-1-5-18"), Some("s-1-5-18"));
        assert_eq!(sid_literal("CORP\\helpdesk"), None);
        assert_eq!(sid_literal("S-1-"), None);
    }

    #[test]
    fn test_empty_directory_answers_nothing() {
        let dir = EmptyDirectory;
        assert!(dir.resolve_trustee("S-1-5-32-544", None).is_none());
        assert!(dir.gpo_order("DC=corp,DC=local", "S-1-5-21-1").is_empty());
    }
}
