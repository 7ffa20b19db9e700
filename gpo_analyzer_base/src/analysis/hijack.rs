//! Hijackable trustee detection
//!
//! A member added by name that the directory cannot resolve can be created
//! later by anyone allowed to create accounts, and then inherits whatever the
//! GPO grants.

use super::AnalysisContext;
use crate::normalize::MemberOperation;
use gpo_decoders::log_debug;
use regex::{NoExpand, Regex};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// The only preference process variable substituted during detection
pub const COMPUTERNAME_VARIABLE: &str = "computername";

pub const HIJACK_NARRATIVE: &str = "Identified sAMAccountName(s) vulnerable to hijacking";

pub const HIJACK_REFERENCE: &str = "https://www.cogiceo.com/en/whitepaper_gpphijacking/";

pub const VARIABLES_REFERENCE: &str = "https://learn.microsoft.com/en-us/previous-versions/windows/it-pro/windows-server-2012-r2-and-2012/dn789194(v=ws.11)#preference-process-variables";

fn variable_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%([^%]+)%").ok()).as_ref()
}

fn computername_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)%computername%").ok())
        .as_ref()
}

/// Account part of `DOMAIN\name`
fn account_part(name: &str) -> &str {
    name.rsplit_once('\\').map(|(_, account)| account).unwrap_or(name)
}

/// Classification of the unresolved members of one group operation
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HijackOutcome {
    pub hijackable: BTreeSet<String>,
    /// `%computername%` names that exist for an affected machine
    pub environment_members: BTreeSet<String>,
    pub uses_variables: bool,
}

impl HijackOutcome {
    pub fn is_empty(&self) -> bool {
        self.hijackable.is_empty() && self.environment_members.is_empty() && !self.uses_variables
    }
}

pub fn classify_members(
    members: &[MemberOperation],
    ctx: &AnalysisContext<'_>,
    gpo_guid: &str,
    domain_sid: &str,
) -> HijackOutcome {
    let mut outcome = HijackOutcome::default();
    let mut machines = None;

    for member in members {
        if member.trustee.is_resolved() {
            continue;
        }
        let Some(name) = member.trustee.name.as_deref().filter(|n| !n.trim().is_empty()) else {
            continue;
        };

        let variables: Vec<&str> = variable_pattern()
            .map(|re| {
                re.captures_iter(name)
                    .filter_map(|c| c.get(1).map(|m| m.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if !variables.is_empty() {
            outcome.uses_variables = true;
            if let Some(other) = variables
                .iter()
                .find(|v| !v.eq_ignore_ascii_case(COMPUTERNAME_VARIABLE))
            {
                log_debug!("Skipping member with unsupported variable", "member" => name, "variable" => other);
                continue;
            }
            let Some(pattern) = computername_pattern() else {
                continue;
            };

            let affected = machines.get_or_insert_with(|| ctx.affected_machines(gpo_guid, domain_sid));
            for machine in affected.iter() {
                let substituted = pattern
                    .replace_all(name, NoExpand(machine.short_name()))
                    .into_owned();
                if ctx.account_exists(account_part(&substituted)) {
                    outcome.environment_members.insert(substituted);
                } else {
                    outcome.hijackable.insert(substituted);
                }
            }
            continue;
        }

        if let Some((local, _)) = name.split_once('@') {
            if !ctx.account_exists(local) {
                outcome.hijackable.insert(name.to_string());
            }
            continue;
        }

        outcome.hijackable.insert(name.to_string());
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::static_dir::fixtures;
    use crate::directory::{AccountIndex, ContainerMachineCache, TrusteeRef};
    use crate::rules::RuleSet;

    fn members(names: &[&str]) -> Vec<MemberOperation> {
        names
            .iter()
            .map(|n| MemberOperation::add(TrusteeRef::from_name(*n)))
            .collect()
    }

    #[test]
    fn test_computername_substitution() {
        let directory = fixtures::directory();
        let index = AccountIndex::new();
        let cache = ContainerMachineCache::new();
        let rules = RuleSet::builtin().unwrap();
        let ctx = AnalysisContext::new(&directory, &index, &cache, &rules);

        let outcome = classify_members(
            &members(&["%computername%_adm", "%COMPUTERNAME%\\svc"]),
            &ctx,
            fixtures::WORKSTATION_POLICY,
            fixtures::DOMAIN_SID,
        );

        assert!(outcome.uses_variables);
        assert!(outcome.environment_members.contains("WS01_adm"));
        assert!(outcome.hijackable.contains("WS02_adm"));
        assert!(outcome.hijackable.contains("WS01\\svc"));
        assert!(outcome.hijackable.contains("WS02\\svc"));
        assert!(!outcome.hijackable.iter().any(|n| n.starts_with("KIOSK")));
    }

    #[test]
    fn test_unresolved_names() {
        let directory = fixtures::directory();
        let index = AccountIndex::new();
        let cache = ContainerMachineCache::new();
        let rules = RuleSet::builtin().unwrap();
        let ctx = AnalysisContext::new(&directory, &index, &cache, &rules);

        let mut input = members(&["helpdesk@corp.local", "newhire@corp.local", "CORP\\ghost", "%username%"]);
        input.push(MemberOperation::add(TrusteeRef::from_sid("S-1-5-32-544")));

        let outcome = classify_members(&input, &ctx, fixtures::DEFAULT_POLICY, fixtures::DOMAIN_SID);
        let hijackable: Vec<&str> = outcome.hijackable.iter().map(String::as_str).collect();
        assert_eq!(hijackable, vec!["CORP\\ghost", "newhire@corp.local"]);
        assert!(outcome.uses_variables);
        assert!(outcome.environment_members.is_empty());
    }
}
