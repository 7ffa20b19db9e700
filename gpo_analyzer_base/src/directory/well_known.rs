//! Well-known principals: BUILTIN groups and NT AUTHORITY accounts

use super::TrusteeRef;
use crate::api::errors::ConfigError;
use serde::Deserialize;
use std::sync::OnceLock;

const BUILTIN_TABLE: &str = include_str!("../../../config/well_known_trustees.toml");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WellKnownTrustee {
    pub sid: String,
    pub name: String,
    #[serde(default)]
    pub domain: String,
}

impl WellKnownTrustee {
    /// `DOMAIN\name`, or the bare name for principals without a domain prefix
    pub fn qualified_name(&self) -> String {
        if self.domain.is_empty() {
            self.name.clone()
        } else {
            format!("{}\\{}", self.domain, self.name)
        }
    }

    fn to_trustee(&self) -> TrusteeRef {
        TrusteeRef {
            sid: Some(self.sid.clone()),
            name: Some(self.name.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Table {
    trustee: Vec<WellKnownTrustee>,
}

#[derive(Debug, Clone)]
pub struct WellKnownTrustees {
    entries: Vec<WellKnownTrustee>,
}

impl WellKnownTrustees {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: Table = toml::from_str(content).map_err(|source| ConfigError::Toml {
            document: "well_known_trustees.toml".to_string(),
            source,
        })?;
        Ok(Self {
            entries: table.trustee,
        })
    }

    /// Process-wide table shipped with the binaries
    pub fn builtin() -> &'static WellKnownTrustees {
        static TABLE: OnceLock<WellKnownTrustees> = OnceLock::new();
        TABLE.get_or_init(|| {
            Self::from_toml_str(BUILTIN_TABLE).unwrap_or(WellKnownTrustees {
                entries: Vec::new(),
            })
        })
    }

    pub fn by_sid(&self, sid: &str) -> Option<&WellKnownTrustee> {
        self.entries.iter().find(|t| t.sid.eq_ignore_ascii_case(sid))
    }

    /// Match `name` or `DOMAIN\name`, ignoring case
    pub fn by_name(&self, name: &str) -> Option<&WellKnownTrustee> {
        let name = name.trim();
        match name.split_once('\\') {
            Some((domain, account)) => self.entries.iter().find(|t| {
                t.domain.eq_ignore_ascii_case(domain) && t.name.eq_ignore_ascii_case(account)
            }),
            None => self.entries.iter().find(|t| t.name.eq_ignore_ascii_case(name)),
        }
    }

    pub fn resolve(&self, identifier: &str) -> Option<TrusteeRef> {
        match super::sid_literal(identifier) {
            Some(sid) => self.by_sid(sid).map(WellKnownTrustee::to_trustee),
            None => self.by_name(identifier).map(WellKnownTrustee::to_trustee),
        }
    }

    pub fn is_known_domain_prefix(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.entries.iter().any(|t| t.domain.eq_ignore_ascii_case(prefix))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_parses() {
        let table = WellKnownTrustees::from_toml_str(BUILTIN_TABLE).unwrap();
        assert!(table.len() > 20);
        assert_eq!(WellKnownTrustees::builtin().len(), table.len());
    }

    #[test]
    fn test_lookup_by_sid_and_name() {
        let table = WellKnownTrustees::builtin();
        assert_eq!(table.by_sid("S-1-5-32-544").map(|t| t.name.as_str()), Some("Administrators"));
        assert_eq!(
            table.by_name("builtin\\remote desktop users").map(|t| t.sid.as_str()),
            Some("S-1-5-32-555")
        );
        assert_eq!(table.by_name("Everyone").map(|t| t.qualified_name()), Some("Everyone".to_string()));
        assert!(table.by_name("CORP\\Administrators").is_none());
    }

    #[test]
    fn test_resolve_accepts_starred_sids() {
        let table = WellKnownTrustees::builtin();
        let trustee = table.resolve("*S-1-5-18").unwrap();
        assert_eq!(trustee.name.as_deref(), Some("SYSTEM"));
        assert!(table.is_known_domain_prefix("NT AUTHORITY"));
        assert!(!table.is_known_domain_prefix(""));
    }
}
