//! Sensitive local group findings

use super::hijack::{self, HIJACK_NARRATIVE, HIJACK_REFERENCE, VARIABLES_REFERENCE};
use super::AnalysisContext;
use crate::directory::TrusteeRef;
use crate::normalize::{CanonicalGroupOperation, GroupAction, OrderedBuilder};
use crate::results::{Finding, FindingCategory, FindingDetail, GroupFinding, HijackableNames};
use gpo_decoders::PolicyScope;
use std::collections::BTreeSet;

/// Group Policy Preferences local group item documentation
pub const GPPREF_GROUPS_REFERENCE: &str = "https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-gppref/4b6788a7-c106-4e55-9cfc-1a52bb786e86";

#[derive(Debug, Default)]
struct GroupEntry {
    name: String,
    edge: Option<String>,
    narratives: BTreeSet<String>,
    references: BTreeSet<String>,
    members: Vec<TrusteeRef>,
    hijackable: BTreeSet<String>,
    environment_members: BTreeSet<String>,
}

impl GroupEntry {
    fn into_finding(self, sid: String, scope: PolicyScope) -> Finding {
        let hijackable = (!self.hijackable.is_empty()).then(|| HijackableNames::from_names(&self.hijackable));
        Finding {
            category: FindingCategory::Group,
            scope,
            narrative: self.narratives.into_iter().collect::<Vec<_>>().join("\n\n"),
            references: self.references.into_iter().collect(),
            graph_edge_hint: self.edge,
            extra: FindingDetail::Group(GroupFinding {
                sid,
                name: self.name,
                members: self.members,
                hijackable,
                environment_members: self.environment_members.into_iter().collect(),
            }),
        }
    }
}

/// One finding per watched group touched in the scope
pub fn analyze_groups(
    scope: PolicyScope,
    operations: &[CanonicalGroupOperation],
    ctx: &AnalysisContext<'_>,
    gpo_guid: &str,
    domain_sid: Option<&str>,
) -> Vec<Finding> {
    let mut entries: OrderedBuilder<String, GroupEntry> = OrderedBuilder::new();

    for op in operations {
        if op.action == GroupAction::Delete {
            continue;
        }
        let Some(watched) = op.group.sid.as_deref().and_then(|sid| ctx.rules.watched_group(sid)) else {
            continue;
        };

        let entry = entries.upsert(watched.sid.to_uppercase());
        entry.name = watched.name.clone();
        let group_name = op.group.name.clone().unwrap_or_else(|| watched.name.clone());

        if !op.members.is_empty() {
            entry.narratives.insert(format!(
                "The following trustees are added to the \"{}\" local group.",
                watched.name
            ));
            entry.references.insert(watched.reference.clone());
            if entry.edge.is_none() {
                entry.edge = watched.edge.clone();
            }
            for member in &op.members {
                if !entry.members.contains(&member.trustee) {
                    entry.members.push(member.trustee.clone());
                }
            }

            if let Some(domain_sid) = domain_sid {
                let outcome = hijack::classify_members(&op.members, ctx, gpo_guid, domain_sid);
                if outcome.uses_variables {
                    entry.references.insert(VARIABLES_REFERENCE.to_string());
                }
                if !outcome.hijackable.is_empty() {
                    entry.narratives.insert(HIJACK_NARRATIVE.to_string());
                    entry.references.insert(HIJACK_REFERENCE.to_string());
                }
                entry.hijackable.extend(outcome.hijackable);
                entry.environment_members.extend(outcome.environment_members);
            }
        }

        if scope == PolicyScope::User && op.add_logged_on_user {
            entry.narratives.insert(format!(
                "Any user who can log on with a fully interactive session will be assigned to the \"{}\" local group.",
                group_name
            ));
            entry.references.insert(GPPREF_GROUPS_REFERENCE.to_string());
        }

        if let Some(new_name) = &op.rename {
            entry.narratives.insert(format!(
                "The privileged group is being renamed to \"{}\"",
                new_name
            ));
            entry.references.insert(GPPREF_GROUPS_REFERENCE.to_string());
        }
    }

    entries
        .into_iter()
        .filter(|(_, entry)| !entry.narratives.is_empty())
        .map(|(sid, entry)| entry.into_finding(sid, scope))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::static_dir::fixtures;
    use crate::directory::{AccountIndex, ContainerMachineCache};
    use crate::normalize::MemberOperation;
    use crate::rules::RuleSet;
    use assert_matches::assert_matches;

    const ADMINISTRATORS: &str = "S-1-5-32-544";

    struct Harness {
        directory: crate::directory::StaticDirectory,
        index: AccountIndex,
        cache: ContainerMachineCache,
        rules: RuleSet,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                directory: fixtures::directory(),
                index: AccountIndex::new(),
                cache: ContainerMachineCache::new(),
                rules: RuleSet::builtin().unwrap(),
            }
        }

        fn ctx(&self) -> AnalysisContext<'_> {
            AnalysisContext::new(&self.directory, &self.index, &self.cache, &self.rules)
        }
    }

    fn administrators(action: GroupAction, members: &[TrusteeRef]) -> CanonicalGroupOperation {
        CanonicalGroupOperation::new(
            TrusteeRef {
                sid: Some(ADMINISTRATORS.to_string()),
                name: Some("Administrators".to_string()),
            },
            action,
        )
        .with_members(members.iter().cloned().map(MemberOperation::add).collect())
    }

    #[test]
    fn test_delete_never_produces_finding() {
        let harness = Harness::new();
        let mut op = administrators(GroupAction::Delete, &[]);
        op.rename = Some("Admins".to_string());
        op.add_logged_on_user = true;

        let findings = analyze_groups(
            PolicyScope::User,
            &[op],
            &harness.ctx(),
            fixtures::DEFAULT_POLICY,
            Some(fixtures::DOMAIN_SID),
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_members_and_hijackable_names_accumulate() {
        let harness = Harness::new();
        let helpdesk = TrusteeRef {
            sid: Some(format!("{}-1105", fixtures::DOMAIN_SID)),
            name: Some("helpdesk".to_string()),
        };
        let ops = [
            administrators(GroupAction::Update, &[helpdesk.clone()]),
            administrators(
                GroupAction::Update,
                &[TrusteeRef::from_name("%computername%_adm")],
            ),
        ];

        let findings = analyze_groups(
            PolicyScope::Machine,
            &ops,
            &harness.ctx(),
            fixtures::WORKSTATION_POLICY,
            Some(fixtures::DOMAIN_SID),
        );

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.graph_edge_hint.as_deref(), Some("AdminTo"));
        assert!(finding.narrative.contains(HIJACK_NARRATIVE));
        assert!(finding.references.contains(&VARIABLES_REFERENCE.to_string()));
        assert_matches!(&finding.extra, FindingDetail::Group(g) => {
            assert_eq!(g.sid, ADMINISTRATORS);
            assert_eq!(g.members.len(), 2);
            assert_eq!(g.environment_members, vec!["WS01_adm".to_string()]);
            assert_eq!(g.hijackable.as_ref().map(|h| h.lte_20.clone()), Some(vec!["WS02_adm".to_string()]));
        });
    }

    #[test]
    fn test_informational_sub_rules() {
        let harness = Harness::new();
        let mut op = administrators(GroupAction::Update, &[]);
        op.add_logged_on_user = true;
        op.rename = Some("LocalAdmins".to_string());

        let machine = analyze_groups(PolicyScope::Machine, &[op.clone()], &harness.ctx(), "{X}", None);
        assert_eq!(machine.len(), 1);
        assert!(!machine[0].narrative.contains("interactive"));
        assert!(machine[0].narrative.contains("\"LocalAdmins\""));

        let user = analyze_groups(PolicyScope::User, &[op], &harness.ctx(), "{X}", None);
        assert!(user[0].narrative.contains("fully interactive session"));
        assert_eq!(user[0].references, vec![GPPREF_GROUPS_REFERENCE.to_string()]);
    }

    #[test]
    fn test_unwatched_groups_are_ignored() {
        let harness = Harness::new();
        let op = CanonicalGroupOperation::new(TrusteeRef::from_sid("S-1-5-32-545"), GroupAction::Update)
            .with_members(vec![MemberOperation::add(TrusteeRef::from_name("ghost"))]);
        assert!(analyze_groups(PolicyScope::Machine, &[op], &harness.ctx(), "{X}", None).is_empty());
    }
}
