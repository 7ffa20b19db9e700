//! Group membership: preference `Groups.xml` and the template `Group Membership` section

use super::builder::OrderedBuilder;
use super::types::{CanonicalGroupOperation, GroupAction, MemberOperation};
use super::Resolver;
use crate::directory::TrusteeRef;
use gpo_decoders::Node;

fn texts(node: Option<&Node>) -> Vec<&str> {
    node.map(Node::items)
        .unwrap_or_default()
        .into_iter()
        .filter_map(Node::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn preference_group(properties: &Node, resolver: &Resolver<'_>) -> Option<TrusteeRef> {
    let sid = properties.get_str("groupSid");
    let name = properties.get_str("groupName");
    match (sid, name) {
        (Some(_), _) => resolver.fields(sid, name),
        (None, Some(name)) if name.contains('\\') => Some(resolver.qualified(name)),
        (None, Some(name)) => Some(resolver.identifier(name)),
        (None, None) => None,
    }
}

fn preference_members(properties: &Node, resolver: &Resolver<'_>) -> Vec<MemberOperation> {
    let Some(members) = properties.get("Members").and_then(|m| m.get("Member")) else {
        return Vec::new();
    };
    members
        .items()
        .into_iter()
        .filter(|member| {
            member
                .get_str("action")
                .map(|action| action.eq_ignore_ascii_case("ADD"))
                .unwrap_or(true)
        })
        .filter_map(|member| resolver.fields(member.get_str("sid"), member.get_str("name")))
        .map(MemberOperation::add)
        .collect()
}

/// `Group` elements of a `Groups.xml` body, in document order
pub fn from_preferences(body: &Node, resolver: &Resolver<'_>) -> Vec<CanonicalGroupOperation> {
    let Some(groups) = body.get("Group") else {
        return Vec::new();
    };

    let mut operations = Vec::new();
    for group in groups.items() {
        let Some(properties) = group.get("Properties") else {
            continue;
        };
        let Some(target) = preference_group(properties, resolver) else {
            continue;
        };

        let action = GroupAction::from_code(properties.get_str("action"));
        if action == GroupAction::Delete {
            // Only honored for groups named by SID
            if properties.get_str("groupSid").is_some() {
                operations.push(CanonicalGroupOperation::delete(target));
            }
            continue;
        }

        let mut operation = CanonicalGroupOperation::new(target, action)
            .with_members(preference_members(properties, resolver))
            .replacing_existing(
                properties.get_str("deleteAllUsers") == Some("1"),
                properties.get_str("deleteAllGroups") == Some("1"),
            );
        operation.rename = properties.get_str("newName").map(str::to_string);
        operation.add_logged_on_user = properties
            .get_str("userAction")
            .map(|a| a.eq_ignore_ascii_case("ADD"))
            .unwrap_or(false);
        operations.push(operation);
    }
    operations
}

/// Rows of a `Group Membership` section. `Members` replaces the group's
/// membership; `Memberof` rows naming the same target are merged into one
/// non-destructive update emitted after every replacement.
pub fn from_membership_section(section: &Node, resolver: &Resolver<'_>) -> Vec<CanonicalGroupOperation> {
    let Some(rows) = section.as_tree() else {
        return Vec::new();
    };

    let mut operations = Vec::new();
    let mut member_of: OrderedBuilder<String, Vec<String>> = OrderedBuilder::new();

    for (group, membership) in rows {
        let members: Vec<MemberOperation> = texts(membership.get("Members"))
            .into_iter()
            .map(|member| MemberOperation::add(resolver.identifier(member)))
            .collect();

        if !members.is_empty() {
            operations.push(
                CanonicalGroupOperation::new(resolver.identifier(group), GroupAction::Replace)
                    .with_members(members)
                    .replacing_existing(true, true),
            );
        }

        for target in texts(membership.get("Memberof")) {
            member_of.upsert(target.to_string()).push(group.clone());
        }
    }

    for (target, sources) in member_of {
        let members = sources
            .iter()
            .map(|source| MemberOperation::add(resolver.identifier(source)))
            .collect();
        operations.push(
            CanonicalGroupOperation::new(resolver.identifier(&target), GroupAction::Update)
                .with_members(members),
        );
    }

    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::static_dir::fixtures;
    use crate::directory::StaticDirectory;

    fn node(value: serde_json::Value) -> Node {
        serde_json::from_value(value).unwrap()
    }

    fn resolver(dir: &StaticDirectory) -> Resolver<'_> {
        Resolver::new(dir, Some(fixtures::DOMAIN_SID))
    }

    #[test]
    fn test_members_row_replaces_membership() {
        let dir = fixtures::directory();
        let section = node(serde_json::json!({
            "*S-1-5-32-544": {"Members": ["*S-1-5-21-1000-2000-3000-500"]}
        }));
        let ops = from_membership_section(&section, &resolver(&dir));

        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.action, GroupAction::Replace);
        assert!(op.delete_existing_users && op.delete_existing_groups);
        assert_eq!(op.group.sid.as_deref(), Some("S-1-5-32-544"));
        assert_eq!(op.group.name.as_deref(), Some("Administrators"));
        assert_eq!(op.members.len(), 1);
        assert_eq!(op.members[0].trustee.sid.as_deref(), Some("S-1-5-21-1000-2000-3000-500"));
        assert_eq!(op.members[0].trustee.name.as_deref(), Some("Administrator"));
    }

    #[test]
    fn test_memberof_rows_merge_per_target() {
        let dir = fixtures::directory();
        let section = node(serde_json::json!({
            "helpdesk": {"Memberof": ["*S-1-5-32-555"]},
            "Domain Admins": {"Memberof": ["*S-1-5-32-555", "*S-1-5-32-562"]},
            "*S-1-5-32-580": {"Members": [""]}
        }));
        let ops = from_membership_section(&section, &resolver(&dir));

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].group.sid.as_deref(), Some("S-1-5-32-555"));
        assert_eq!(ops[0].action, GroupAction::Update);
        assert!(!ops[0].delete_existing_users);
        let names: Vec<&str> = ops[0].members.iter().map(|m| m.trustee.display_name()).collect();
        assert_eq!(names, vec!["helpdesk", "Domain Admins"]);
        assert_eq!(ops[1].members.len(), 1);
    }

    #[test]
    fn test_preference_groups() {
        let dir = fixtures::directory();
        let body = node(serde_json::json!({
            "Group": [
                {"Properties": {
                    "action": "U", "groupSid": "S-1-5-32-544", "groupName": "Administrators (built-in)",
                    "deleteAllUsers": "1", "deleteAllGroups": "0", "newName": "Admins",
                    "Members": {"Member": [
                        {"name": "CORP\\helpdesk", "action": "ADD", "sid": ""},
                        {"name": "CORP\\old", "action": "REMOVE", "sid": ""},
                        {"name": "%computername%\\svc", "action": "ADD", "sid": ""}
                    ]}
                }},
                {"Properties": {"action": "D", "groupName": "Backup Operators"}},
                {"Properties": {"action": "D", "groupSid": "S-1-5-32-551"}},
                {"Properties": {"action": "C", "groupName": "CORP\\Domain Admins", "userAction": "ADD"}}
            ]
        }));
        let ops = from_preferences(&body, &resolver(&dir));

        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].action, GroupAction::Update);
        assert_eq!(ops[0].group.name.as_deref(), Some("Administrators (built-in)"));
        assert!(ops[0].delete_existing_users && !ops[0].delete_existing_groups);
        assert_eq!(ops[0].rename.as_deref(), Some("Admins"));
        assert_eq!(ops[0].members.len(), 2);
        assert_eq!(
            ops[0].members[0].trustee.sid.as_deref(),
            Some("S-1-5-21-1000-2000-3000-1105")
        );
        assert_eq!(ops[0].members[1].trustee, TrusteeRef::from_name("%computername%\\svc"));

        assert_eq!(ops[1].action, GroupAction::Delete);
        assert!(ops[1].members.is_empty());

        assert_eq!(ops[2].action, GroupAction::Create);
        assert_eq!(ops[2].group.sid.as_deref(), Some("S-1-5-21-1000-2000-3000-512"));
        assert!(ops[2].add_logged_on_user);
    }
}
