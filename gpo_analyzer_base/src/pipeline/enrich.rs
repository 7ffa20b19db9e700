//! Projection of findings onto the computers they affect
//!
//! Group and privilege findings that name a relationship become edges from
//! each resolved trustee to every machine of every affected container.
//! Registry findings that carry a property become computer properties.

use crate::analysis::AnalysisContext;
use crate::directory::TrusteeRef;
use crate::results::{DomainReport, FindingDetail, GpoReport};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EnrichmentEdge {
    pub source_sid: String,
    pub edge: String,
    /// Computer name as the directory knows it
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ComputerProperty {
    pub machine: String,
    pub name: String,
    pub value: String,
}

/// Edges and properties for one GPO
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GpoEnrichment {
    pub guid: String,
    pub containers: Vec<String>,
    pub edges: Vec<EnrichmentEdge>,
    pub properties: Vec<ComputerProperty>,
}

impl GpoEnrichment {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.properties.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainEnrichment {
    pub domain: String,
    pub gpos: Vec<GpoEnrichment>,
}

fn resolved_sids<'t>(trustees: impl IntoIterator<Item = &'t TrusteeRef>) -> Vec<&'t str> {
    trustees
        .into_iter()
        .filter_map(|t| t.sid.as_deref())
        .collect()
}

pub fn project_gpo(ctx: &AnalysisContext<'_>, report: &GpoReport, domain_sid: &str) -> GpoEnrichment {
    let mut projection = GpoEnrichment {
        guid: report.guid.clone(),
        ..Default::default()
    };
    let mut seen_edges = HashSet::new();
    let mut seen_properties = HashSet::new();

    for container in ctx.directory.containers_affected_by_gpo(&report.guid, domain_sid) {
        let machines = ctx
            .container_cache
            .machines(ctx.directory, &container.id, domain_sid);
        projection.containers.push(container.distinguished_name.clone());

        for finding in report.findings.iter() {
            let sources = match &finding.extra {
                FindingDetail::Group(group) => resolved_sids(&group.members),
                FindingDetail::Privilege(privilege) => resolved_sids(&privilege.trustees),
                FindingDetail::Registry(registry) => {
                    let Some(property) = &registry.property else {
                        continue;
                    };
                    for machine in &machines {
                        let candidate = ComputerProperty {
                            machine: machine.name.clone(),
                            name: property.name.clone(),
                            value: property.value.clone(),
                        };
                        if seen_properties.insert(candidate.clone()) {
                            projection.properties.push(candidate);
                        }
                    }
                    continue;
                }
                FindingDetail::Credential(_) => continue,
            };
            let Some(edge) = finding.graph_edge_hint.as_deref() else {
                continue;
            };

            for sid in sources {
                for machine in &machines {
                    let candidate = EnrichmentEdge {
                        source_sid: sid.to_string(),
                        edge: edge.to_string(),
                        target: machine.name.clone(),
                        target_sid: machine.sid.clone(),
                    };
                    if seen_edges.insert(candidate.clone()) {
                        projection.edges.push(candidate);
                    }
                }
            }
        }
    }

    projection
}

/// Every GPO of the report with at least one edge or property
pub fn project_domain(ctx: &AnalysisContext<'_>, report: &DomainReport) -> DomainEnrichment {
    let gpos = match report.domain_sid.as_deref() {
        Some(domain_sid) => report
            .gpos
            .iter()
            .map(|gpo| project_gpo(ctx, gpo, domain_sid))
            .filter(|p| !p.is_empty())
            .collect(),
        None => Vec::new(),
    };
    DomainEnrichment {
        domain: report.domain.clone(),
        gpos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::static_dir::fixtures;
    use crate::directory::{AccountIndex, ContainerMachineCache};
    use crate::results::{
        EnrichmentProperty, Finding, FindingCategory, FindingSet, GroupFinding, RegistryFinding,
    };
    use crate::rules::RuleSet;
    use gpo_decoders::PolicyScope;

    fn report() -> GpoReport {
        let mut findings = FindingSet::default();
        findings.push(Finding {
            category: FindingCategory::Group,
            scope: PolicyScope::Machine,
            narrative: "n".to_string(),
            references: Vec::new(),
            graph_edge_hint: Some("AdminTo".to_string()),
            extra: FindingDetail::Group(GroupFinding {
                sid: "S-1-5-32-544".to_string(),
                name: "Administrators".to_string(),
                members: vec![
                    TrusteeRef::from_sid("S-1-5-21-1000-2000-3000-1105"),
                    TrusteeRef::from_name("ghost"),
                ],
                hijackable: None,
                environment_members: Vec::new(),
            }),
        });
        findings.push(Finding {
            category: FindingCategory::Registry,
            scope: PolicyScope::Machine,
            narrative: "n".to_string(),
            references: Vec::new(),
            graph_edge_hint: None,
            extra: FindingDetail::Registry(RegistryFinding {
                rule: "lm-compatibility".to_string(),
                regkey: "HKEY_LOCAL_MACHINE\\System\\X".to_string(),
                value: "1".to_string(),
                vnc_password: None,
                property: Some(EnrichmentProperty {
                    name: "lmcompatibilitylevel".to_string(),
                    value: "1".to_string(),
                }),
            }),
        });
        GpoReport::new(fixtures::WORKSTATION_POLICY, findings)
    }

    #[test]
    fn test_projection_targets_machines_of_affected_containers() {
        let directory = fixtures::directory();
        let index = AccountIndex::new();
        let cache = ContainerMachineCache::new();
        let rules = RuleSet::builtin().unwrap();
        let ctx = AnalysisContext::new(&directory, &index, &cache, &rules);

        let projection = project_gpo(&ctx, &report(), fixtures::DOMAIN_SID);
        assert_eq!(projection.containers, vec!["OU=Workstations,DC=corp,DC=local"]);

        let targets: Vec<&str> = projection.edges.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["WS01", "WS02"]);
        assert!(projection.edges.iter().all(|e| e.source_sid.ends_with("-1105")));
        assert_eq!(projection.edges[0].target_sid.as_deref(), Some("S-1-5-21-1000-2000-3000-1301"));

        assert_eq!(projection.properties.len(), 2);
        assert_eq!(projection.properties[1].machine, "WS02");
    }

    #[test]
    fn test_domain_without_sid_projects_nothing() {
        let directory = fixtures::directory();
        let index = AccountIndex::new();
        let cache = ContainerMachineCache::new();
        let rules = RuleSet::builtin().unwrap();
        let ctx = AnalysisContext::new(&directory, &index, &cache, &rules);

        let domain = DomainReport::new("lab.local", None, 1, vec![report()]);
        assert!(project_domain(&ctx, &domain).gpos.is_empty());
    }
}
