//! # Security Analysis
//!
//! Evaluates the canonical records of one GPO against the [`RuleSet`] and
//! searches its decoded settings for stored credentials. Each GPO's analysis
//! depends only on its own records and on directory answers.

pub mod credentials;
pub mod groups;
pub mod hijack;
pub mod privileges;
pub mod registry;

use crate::api::{ObjectFilter, ObjectKind};
use crate::directory::{AccountIndex, ContainerMachineCache, DirectoryLookup, Machine};
use crate::normalize::NormalizedGpo;
use crate::results::FindingSet;
use crate::rules::RuleSet;
use gpo_decoders::GpoSettings;
use std::collections::HashSet;

/// Everything an analysis call reads besides the GPO itself
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub directory: &'a dyn DirectoryLookup,
    /// Process-lifetime account name index
    pub account_index: &'a AccountIndex,
    /// Per-run container to machine cache
    pub container_cache: &'a ContainerMachineCache,
    pub rules: &'a RuleSet,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        directory: &'a dyn DirectoryLookup,
        account_index: &'a AccountIndex,
        container_cache: &'a ContainerMachineCache,
        rules: &'a RuleSet,
    ) -> Self {
        Self {
            directory,
            account_index,
            container_cache,
            rules,
        }
    }

    pub fn account_exists(&self, name: &str) -> bool {
        self.account_index.contains(self.directory, name)
    }

    /// Machines of every container the GPO applies to, first sighting wins
    pub fn affected_machines(&self, gpo_guid: &str, domain_sid: &str) -> Vec<Machine> {
        let mut seen = HashSet::new();
        let mut machines = Vec::new();
        for container in self.directory.containers_affected_by_gpo(gpo_guid, domain_sid) {
            for machine in self
                .container_cache
                .machines(self.directory, &container.id, domain_sid)
            {
                if seen.insert(machine.name.to_lowercase()) {
                    machines.push(machine);
                }
            }
        }
        machines
    }
}

/// Analyze one GPO, both scopes, limited to the selected object kinds
pub fn analyze_gpo(
    ctx: &AnalysisContext<'_>,
    gpo_guid: &str,
    domain_sid: Option<&str>,
    settings: &GpoSettings,
    normalized: &NormalizedGpo,
    objects: &ObjectFilter,
) -> FindingSet {
    let mut findings = FindingSet::default();

    for scope in NormalizedGpo::SCOPES {
        let Some(records) = normalized.scope(scope) else {
            continue;
        };
        if objects.includes(ObjectKind::Group) {
            findings.extend(groups::analyze_groups(
                scope,
                &records.groups,
                ctx,
                gpo_guid,
                domain_sid,
            ));
        }
        if objects.includes(ObjectKind::Registry) {
            findings.extend(registry::analyze_registry(scope, &records.registry, &ctx.rules.registry));
        }
        if objects.includes(ObjectKind::Privilege) {
            findings.extend(privileges::analyze_privileges(
                scope,
                &records.privileges,
                &ctx.rules.privileges,
            ));
        }
    }

    if objects.includes(ObjectKind::GppPassword) {
        findings.extend(credentials::find_gpp_passwords(&settings.to_tree()));
    }

    findings
}
