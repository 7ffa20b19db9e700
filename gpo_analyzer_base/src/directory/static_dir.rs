//! Offline directory backed by a JSON document
//!
//! ```json
//! {"domains": [{
//!     "name": "corp.local", "sid": "S-1-5-21-..", "netbios": "CORP",
//!     "accounts": [{"name": "helpdesk", "sid": "S-1-5-21-..-1105", "upn": "helpdesk@corp.local"}],
//!     "gpos": [{"guid": "{..}", "name": "Workstation Admins"}],
//!     "containers": [{"dn": "OU=Workstations,DC=corp,DC=local", "block_inheritance": false,
//!                     "machines": ["WS01"], "links": [{"gpo": "{..}", "enforced": false, "order": 1}]}]
//! }]}
//! ```

use super::ordering::{sort_by_precedence, OrderedGpo};
use super::well_known::WellKnownTrustees;
use super::{sid_literal, Container, DirectoryLookup, Machine, TrusteeRef};
use crate::api::errors::ConfigError;
use gpo_decoders::log_debug;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryDocument {
    #[serde(default)]
    pub domains: Vec<DomainRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainRecord {
    pub name: String,
    pub sid: String,
    #[serde(default)]
    pub netbios: Option<String>,
    #[serde(default)]
    pub accounts: Vec<AccountRecord>,
    #[serde(default)]
    pub gpos: Vec<GpoRecord>,
    #[serde(default)]
    pub containers: Vec<ContainerRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountRecord {
    /// sAMAccountName
    pub name: String,
    pub sid: String,
    #[serde(default)]
    pub upn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GpoRecord {
    pub guid: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerRecord {
    pub dn: String,
    #[serde(default)]
    pub block_inheritance: bool,
    /// Host names of the computers placed directly in this container
    #[serde(default)]
    pub machines: Vec<String>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkRecord {
    pub gpo: String,
    #[serde(default)]
    pub enforced: bool,
    #[serde(default)]
    pub order: u32,
}

fn same_guid(a: &str, b: &str) -> bool {
    a.trim_matches(|c| c == '{' || c == '}')
        .eq_ignore_ascii_case(b.trim_matches(|c| c == '{' || c == '}'))
}

#[derive(Debug)]
struct IndexedDomain {
    record: DomainRecord,
    /// Parent container index, derived from the distinguished names
    parents: Vec<Option<usize>>,
}

impl IndexedDomain {
    fn new(record: DomainRecord) -> Self {
        let parents = record
            .containers
            .iter()
            .map(|container| {
                let dn = container.dn.as_str();
                dn.char_indices()
                    .filter(|(_, c)| *c == ',')
                    .map(|(i, _)| &dn[i + 1..])
                    .find_map(|suffix| {
                        record
                            .containers
                            .iter()
                            .position(|c| c.dn.eq_ignore_ascii_case(suffix))
                    })
            })
            .collect();
        Self { record, parents }
    }

    fn container_index(&self, container_id: &str) -> Option<usize> {
        self.record
            .containers
            .iter()
            .position(|c| c.dn.eq_ignore_ascii_case(container_id))
    }

    fn gpo_name(&self, guid: &str) -> Option<String> {
        self.record
            .gpos
            .iter()
            .find(|g| same_guid(&g.guid, guid))
            .and_then(|g| g.name.clone())
    }

    fn account_by_name(&self, name: &str) -> Option<&AccountRecord> {
        self.record
            .accounts
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    fn account_by_upn(&self, upn: &str) -> Option<&AccountRecord> {
        self.record.accounts.iter().find(|a| {
            a.upn
                .as_deref()
                .map(|u| u.eq_ignore_ascii_case(upn))
                .unwrap_or(false)
        })
    }

    fn matches_prefix(&self, prefix: &str) -> bool {
        self.record.name.eq_ignore_ascii_case(prefix)
            || self
                .record
                .netbios
                .as_deref()
                .map(|n| n.eq_ignore_ascii_case(prefix))
                .unwrap_or(false)
    }

    fn machine(&self, name: &str) -> Machine {
        let sid = self
            .account_by_name(&format!("{}$", name))
            .map(|a| a.sid.clone());
        Machine {
            name: name.to_string(),
            domain: self.record.name.clone(),
            sid,
        }
    }

    /// Links applying to a container, walking up through its parents
    fn applied_links(&self, start: usize) -> Vec<OrderedGpo> {
        let mut links = Vec::new();
        let mut current = Some(start);
        let mut distance = 0;
        let mut blocked = false;

        while let Some(index) = current {
            let container = &self.record.containers[index];
            for link in &container.links {
                if blocked && !link.enforced {
                    continue;
                }
                links.push(OrderedGpo {
                    guid: link.gpo.to_uppercase(),
                    name: self.gpo_name(&link.gpo),
                    linked_to: container.dn.clone(),
                    enforced: link.enforced,
                    distance,
                    link_order: link.order,
                });
            }
            if container.block_inheritance {
                blocked = true;
            }
            current = self.parents[index];
            distance += 1;
        }

        sort_by_precedence(&mut links);
        links
    }
}

/// [`DirectoryLookup`] over a [`DirectoryDocument`] plus the well-known table
#[derive(Debug)]
pub struct StaticDirectory {
    domains: Vec<IndexedDomain>,
    well_known: &'static WellKnownTrustees,
}

impl StaticDirectory {
    pub fn new(document: DirectoryDocument) -> Self {
        Self {
            domains: document.domains.into_iter().map(IndexedDomain::new).collect(),
            well_known: WellKnownTrustees::builtin(),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let document: DirectoryDocument = serde_json::from_str(content)?;
        Ok(Self::new(document))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Directory with only the well-known principals
    pub fn well_known_only() -> Self {
        Self::new(DirectoryDocument::default())
    }

    fn domain_by_sid(&self, sid: &str) -> Option<&IndexedDomain> {
        self.domains
            .iter()
            .find(|d| d.record.sid.eq_ignore_ascii_case(sid))
    }

    fn domain_by_prefix(&self, prefix: &str) -> Option<&IndexedDomain> {
        self.domains.iter().find(|d| d.matches_prefix(prefix))
    }

    pub fn domain_names(&self) -> Vec<&str> {
        self.domains.iter().map(|d| d.record.name.as_str()).collect()
    }

    fn resolve_sid(&self, sid: &str) -> Option<TrusteeRef> {
        if let Some(known) = self.well_known.resolve(sid) {
            return Some(known);
        }
        self.domains
            .iter()
            .flat_map(|d| d.record.accounts.iter())
            .find(|a| a.sid.eq_ignore_ascii_case(sid))
            .map(|a| TrusteeRef {
                sid: Some(a.sid.clone()),
                name: Some(a.name.clone()),
            })
    }

    fn resolve_name(&self, identifier: &str, domain_hint: Option<&str>) -> Option<TrusteeRef> {
        let found = |account: &AccountRecord| TrusteeRef {
            sid: Some(account.sid.clone()),
            name: Some(account.name.clone()),
        };

        if let Some((prefix, account)) = identifier.split_once('\\') {
            if self.well_known.is_known_domain_prefix(prefix) {
                return self.well_known.resolve(identifier);
            }
            return self
                .domain_by_prefix(prefix)
                .and_then(|d| d.account_by_name(account))
                .map(found);
        }

        if let Some((account, suffix)) = identifier.split_once('@') {
            return self
                .domain_by_prefix(suffix)
                .and_then(|d| d.account_by_upn(identifier).or_else(|| d.account_by_name(account)))
                .map(found);
        }

        domain_hint
            .and_then(|sid| self.domain_by_sid(sid))
            .and_then(|d| d.account_by_name(identifier))
            .map(found)
            .or_else(|| self.well_known.resolve(identifier))
    }
}

impl DirectoryLookup for StaticDirectory {
    fn resolve_trustee(&self, identifier: &str, domain_hint: Option<&str>) -> Option<TrusteeRef> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }
        let resolved = match sid_literal(identifier) {
            Some(sid) => self.resolve_sid(sid),
            None => self.resolve_name(identifier, domain_hint),
        };
        if resolved.is_none() {
            log_debug!("Trustee not found in directory", "identifier" => identifier);
        }
        resolved
    }

    fn machines_affected_by_gpo(&self, gpo_id: &str, domain_id: &str) -> Vec<Machine> {
        self.containers_affected_by_gpo(gpo_id, domain_id)
            .iter()
            .flat_map(|c| self.machines_in_container(&c.id, domain_id))
            .collect()
    }

    fn containers_affected_by_gpo(&self, gpo_id: &str, domain_id: &str) -> Vec<Container> {
        let Some(domain) = self.domain_by_sid(domain_id) else {
            return Vec::new();
        };
        (0..domain.record.containers.len())
            .filter(|index| {
                domain
                    .applied_links(*index)
                    .iter()
                    .any(|link| same_guid(&link.guid, gpo_id))
            })
            .map(|index| {
                let dn = domain.record.containers[index].dn.clone();
                Container {
                    id: dn.clone(),
                    distinguished_name: dn,
                }
            })
            .collect()
    }

    fn machines_in_container(&self, container_id: &str, domain_id: &str) -> Vec<Machine> {
        let Some(domain) = self.domain_by_sid(domain_id) else {
            return Vec::new();
        };
        domain
            .container_index(container_id)
            .map(|index| {
                domain.record.containers[index]
                    .machines
                    .iter()
                    .map(|name| domain.machine(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn all_known_account_names(&self) -> HashSet<String> {
        let mut names: HashSet<String> = self.well_known.names().map(str::to_string).collect();
        for domain in &self.domains {
            names.extend(domain.record.accounts.iter().map(|a| a.name.clone()));
            for container in &domain.record.containers {
                names.extend(container.machines.iter().map(|m| format!("{}$", m)));
            }
        }
        names
    }

    fn domain_sid_for(&self, domain_name: &str) -> Option<String> {
        self.domain_by_prefix(domain_name)
            .map(|d| d.record.sid.clone())
    }

    fn gpo_order(&self, container_id: &str, domain_id: &str) -> Vec<OrderedGpo> {
        self.domain_by_sid(domain_id)
            .and_then(|d| d.container_index(container_id).map(|i| d.applied_links(i)))
            .unwrap_or_default()
    }

    fn gpo_name(&self, gpo_id: &str, domain_id: &str) -> Option<String> {
        self.domain_by_sid(domain_id).and_then(|d| d.gpo_name(gpo_id))
    }
}
