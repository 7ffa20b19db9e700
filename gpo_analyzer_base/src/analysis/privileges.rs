//! Dangerous user rights assignments

use crate::directory::TrusteeRef;
use crate::normalize::CanonicalPrivilegeGrant;
use crate::results::{Finding, FindingCategory, FindingDetail, PrivilegeFinding};
use crate::rules::DangerousPrivilege;
use gpo_decoders::PolicyScope;
use indexmap::IndexMap;

/// `NT SERVICE\*` and `IIS APPPOOL\*`
pub const SERVICE_SID_PREFIXES: [&str; 2] = ["S-1-5-80-", "S-1-5-82-"];

fn is_excluded(trustee: &TrusteeRef, rule: &DangerousPrivilege) -> bool {
    let Some(sid) = trustee.sid.as_deref() else {
        return false;
    };
    let upper = sid.to_uppercase();
    SERVICE_SID_PREFIXES.iter().any(|p| upper.starts_with(p))
        || rule
            .default_trustees
            .iter()
            .any(|default| default.eq_ignore_ascii_case(sid))
}

pub fn analyze_privileges(
    scope: PolicyScope,
    grants: &[CanonicalPrivilegeGrant],
    privileges: &IndexMap<String, DangerousPrivilege>,
) -> Vec<Finding> {
    grants
        .iter()
        .filter_map(|grant| {
            let rule = privileges.get(&grant.privilege_name)?;
            let trustees: Vec<TrusteeRef> = grant
                .trustees
                .iter()
                .filter(|t| !is_excluded(t, rule))
                .cloned()
                .collect();
            if trustees.is_empty() {
                return None;
            }

            let mut references = rule.references.clone();
            references.sort();
            references.dedup();
            Some(Finding {
                category: FindingCategory::Privilege,
                scope,
                narrative: rule.narrative.clone(),
                references,
                graph_edge_hint: rule.edge.clone(),
                extra: FindingDetail::Privilege(PrivilegeFinding {
                    privilege: grant.privilege_name.clone(),
                    trustees,
                }),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;
    use assert_matches::assert_matches;

    fn grant(privilege: &str, trustees: Vec<TrusteeRef>) -> CanonicalPrivilegeGrant {
        CanonicalPrivilegeGrant {
            privilege_name: privilege.to_string(),
            trustees,
        }
    }

    #[test]
    fn test_default_and_service_trustees_are_excluded() {
        let rules = RuleSet::builtin().unwrap();
        let grants = [
            grant(
                "SeDebugPrivilege",
                vec![
                    TrusteeRef::from_sid("S-1-5-32-544"),
                    TrusteeRef::from_sid("S-1-5-80-3139157870-2983391045"),
                ],
            ),
            grant(
                "SeBackupPrivilege",
                vec![
                    TrusteeRef::from_sid("s-1-5-32-551"),
                    TrusteeRef::from_name("CORP\\backup-svc"),
                ],
            ),
            grant("SeChangeNotifyPrivilege", vec![TrusteeRef::from_sid("S-1-1-0")]),
        ];

        let findings = analyze_privileges(PolicyScope::Machine, &grants, &rules.privileges);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].graph_edge_hint.as_deref(), Some("AdminTo"));
        assert_matches!(&findings[0].extra, FindingDetail::Privilege(p) => {
            assert_eq!(p.privilege, "SeBackupPrivilege");
            assert_eq!(p.trustees, vec![TrusteeRef::from_name("CORP\\backup-svc")]);
        });
    }
}
