//! User rights assignments from the template `Privilege Rights` section

use super::builder::OrderedBuilder;
use super::types::CanonicalPrivilegeGrant;
use super::Resolver;
use crate::directory::TrusteeRef;
use gpo_decoders::Node;

pub fn from_privilege_rights(section: &Node, resolver: &Resolver<'_>) -> Vec<CanonicalPrivilegeGrant> {
    let Some(rows) = section.as_tree() else {
        return Vec::new();
    };

    let mut grants: OrderedBuilder<String, Vec<TrusteeRef>> = OrderedBuilder::new();
    for (privilege, trustees) in rows {
        let resolved = trustees
            .items()
            .into_iter()
            .filter_map(Node::as_str)
            .filter(|t| !t.trim().is_empty())
            .map(|t| resolver.identifier(t));
        grants.upsert(privilege.clone()).extend(resolved);
    }

    grants
        .into_iter()
        .filter(|(_, trustees)| !trustees.is_empty())
        .map(|(privilege_name, trustees)| CanonicalPrivilegeGrant {
            privilege_name,
            trustees,
        })
        .collect()
}
