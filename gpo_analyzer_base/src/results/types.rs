//! # Finding Types
//!
//! Serializable findings, grouped per GPO and per domain, for the JSON output
//! and for the enrichment projection.

use crate::directory::TrusteeRef;
use chrono::{DateTime, Utc};
use gpo_decoders::PolicyScope;
use serde::Serialize;

/// Length above which a sAMAccountName no longer fits the legacy limit
pub const SAM_ACCOUNT_NAME_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FindingCategory {
    Group,
    Registry,
    Privilege,
    CredentialLeak,
}

impl FindingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCategory::Group => "Group",
            FindingCategory::Registry => "Registry",
            FindingCategory::Privilege => "Privilege",
            FindingCategory::CredentialLeak => "CredentialLeak",
        }
    }
}

/// A security-relevant setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub category: FindingCategory,

    /// Policy scope the setting was found in
    pub scope: PolicyScope,

    /// Human-readable explanation; several sub-rules are joined by blank lines
    pub narrative: String,

    /// Documentation links, sorted and deduplicated
    pub references: Vec<String>,

    /// Relationship the finding implies between a trustee and a computer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_edge_hint: Option<String>,

    /// Category-specific payload
    pub extra: FindingDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FindingDetail {
    Group(GroupFinding),
    Registry(RegistryFinding),
    Privilege(PrivilegeFinding),
    Credential(CredentialFinding),
}

/// Hijackable names split by the legacy sAMAccountName length limit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HijackableNames {
    pub lte_20: Vec<String>,
    pub gt_20: Vec<String>,
}

impl HijackableNames {
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a String>) -> Self {
        let mut bucketed = Self::default();
        for name in names {
            if name.chars().count() <= SAM_ACCOUNT_NAME_LIMIT {
                bucketed.lte_20.push(name.clone());
            } else {
                bucketed.gt_20.push(name.clone());
            }
        }
        bucketed
    }

    pub fn is_empty(&self) -> bool {
        self.lte_20.is_empty() && self.gt_20.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lte_20.len() + self.gt_20.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFinding {
    pub sid: String,
    pub name: String,
    /// Trustees added to the group
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<TrusteeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hijackable: Option<HijackableNames>,
    /// Names built from `%computername%` that exist in the directory
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment_members: Vec<String>,
}

/// Computer property exported for a registry finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentProperty {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryFinding {
    pub rule: String,
    /// `Hive\Key`
    pub regkey: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vnc_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<EnrichmentProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivilegeFinding {
    pub privilege: String,
    pub trustees: Vec<TrusteeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialFinding {
    /// `/`-joined path of the field in the decoded settings
    pub path: String,
    pub encrypted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decrypted: Option<String>,
}

/// Findings of one GPO, by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindingSet {
    #[serde(rename = "Group", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Finding>,
    #[serde(rename = "Registry", skip_serializing_if = "Vec::is_empty")]
    pub registry: Vec<Finding>,
    #[serde(rename = "Privilege", skip_serializing_if = "Vec::is_empty")]
    pub privileges: Vec<Finding>,
    #[serde(rename = "CredentialLeak", skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<Finding>,
}

impl FindingSet {
    pub fn push(&mut self, finding: Finding) {
        match finding.category {
            FindingCategory::Group => self.groups.push(finding),
            FindingCategory::Registry => self.registry.push(finding),
            FindingCategory::Privilege => self.privileges.push(finding),
            FindingCategory::CredentialLeak => self.credentials.push(finding),
        }
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    pub fn category(&self, category: FindingCategory) -> &[Finding] {
        match category {
            FindingCategory::Group => &self.groups,
            FindingCategory::Registry => &self.registry,
            FindingCategory::Privilege => &self.privileges,
            FindingCategory::CredentialLeak => &self.credentials,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.groups
            .iter()
            .chain(&self.registry)
            .chain(&self.privileges)
            .chain(&self.credentials)
    }

    pub fn len(&self) -> usize {
        self.groups.len() + self.registry.len() + self.privileges.len() + self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Analysis result for one GPO
#[derive(Debug, Clone, Serialize)]
pub struct GpoReport {
    pub guid: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub findings: FindingSet,

    /// Distinguished names of the containers the GPO applies to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub affected_containers: Vec<String>,

    pub analyzed_at: DateTime<Utc>,
}

impl GpoReport {
    pub fn new(guid: impl Into<String>, findings: FindingSet) -> Self {
        Self {
            guid: guid.into(),
            name: None,
            findings,
            affected_containers: Vec::new(),
            analyzed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DomainStatus {
    /// The store holds no GPO for the domain
    NoGpos,
    /// GPOs were analyzed and none of them produced a finding
    NoFindings,
    Findings,
}

/// Analysis result for one domain
#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    pub domain: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_sid: Option<String>,

    pub status: DomainStatus,

    /// GPOs found in the store for this domain
    pub gpo_count: usize,

    pub generated_at: DateTime<Utc>,

    /// Reports of the GPOs that produced findings, in discovery order
    pub gpos: Vec<GpoReport>,
}

impl DomainReport {
    /// Reports without findings are dropped; the status records what remained
    pub fn new(domain: impl Into<String>, domain_sid: Option<String>, gpo_count: usize, reports: Vec<GpoReport>) -> Self {
        let gpos: Vec<GpoReport> = reports
            .into_iter()
            .filter(|r| !r.findings.is_empty())
            .collect();
        let status = if gpo_count == 0 {
            DomainStatus::NoGpos
        } else if gpos.is_empty() {
            DomainStatus::NoFindings
        } else {
            DomainStatus::Findings
        };
        Self {
            domain: domain.into(),
            domain_sid,
            status,
            gpo_count,
            generated_at: Utc::now(),
            gpos,
        }
    }

    pub fn finding_count(&self) -> usize {
        self.gpos.iter().map(|g| g.findings.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(path: &str) -> Finding {
        Finding {
            category: FindingCategory::CredentialLeak,
            scope: PolicyScope::Machine,
            narrative: "n".to_string(),
            references: Vec::new(),
            graph_edge_hint: None,
            extra: FindingDetail::Credential(CredentialFinding {
                path: path.to_string(),
                encrypted: "x".to_string(),
                decrypted: None,
            }),
        }
    }

    #[test]
    fn test_bucket_boundary() {
        let exact = "a".repeat(20);
        let over = "b".repeat(21);
        let names = [exact.clone(), over.clone()];
        let buckets = HijackableNames::from_names(names.iter());
        assert_eq!(buckets.lte_20, vec![exact]);
        assert_eq!(buckets.gt_20, vec![over]);
    }

    #[test]
    fn test_domain_status() {
        assert_eq!(DomainReport::new("a", None, 0, Vec::new()).status, DomainStatus::NoGpos);

        let empty = GpoReport::new("{A}", FindingSet::default());
        assert_eq!(
            DomainReport::new("a", None, 1, vec![empty]).status,
            DomainStatus::NoFindings
        );

        let mut findings = FindingSet::default();
        findings.push(credential("Groups.xml/User/Properties/cpassword"));
        let report = DomainReport::new("a", None, 2, vec![GpoReport::new("{B}", findings)]);
        assert_eq!(report.status, DomainStatus::Findings);
        assert_eq!(report.finding_count(), 1);
    }

    #[test]
    fn test_finding_set_groups_by_category() {
        let mut set = FindingSet::default();
        set.extend([credential("a"), credential("b")]);
        assert_eq!(set.category(FindingCategory::CredentialLeak).len(), 2);
        assert!(set.category(FindingCategory::Group).is_empty());

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["CredentialLeak"][1]["extra"]["path"], "b");
        assert!(json.get("Group").is_none());
    }
}
