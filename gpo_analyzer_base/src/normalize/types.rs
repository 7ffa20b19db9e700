//! Canonical setting records

use crate::directory::TrusteeRef;
use gpo_decoders::{PolicyScope, RegistryType};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupAction {
    Create,
    Update,
    Replace,
    Delete,
}

impl GroupAction {
    /// Preference action letter; anything unknown is an update
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some(c) if c.eq_ignore_ascii_case("C") => GroupAction::Create,
            Some(c) if c.eq_ignore_ascii_case("R") => GroupAction::Replace,
            Some(c) if c.eq_ignore_ascii_case("D") => GroupAction::Delete,
            _ => GroupAction::Update,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberAction {
    Add,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberOperation {
    #[serde(flatten)]
    pub trustee: TrusteeRef,
    pub action: MemberAction,
}

impl MemberOperation {
    pub fn add(trustee: TrusteeRef) -> Self {
        Self {
            trustee,
            action: MemberAction::Add,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalGroupOperation {
    pub group: TrusteeRef,
    pub action: GroupAction,
    pub members: Vec<MemberOperation>,
    pub delete_existing_users: bool,
    pub delete_existing_groups: bool,
    /// Local name the group is given on the target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// The interactively logged-on user is added to the group
    #[serde(skip_serializing_if = "is_false")]
    pub add_logged_on_user: bool,
}

impl CanonicalGroupOperation {
    pub fn new(group: TrusteeRef, action: GroupAction) -> Self {
        Self {
            group,
            action,
            members: Vec::new(),
            delete_existing_users: false,
            delete_existing_groups: false,
            rename: None,
            add_logged_on_user: false,
        }
    }

    /// A deletion, which never carries members
    pub fn delete(group: TrusteeRef) -> Self {
        Self::new(group, GroupAction::Delete)
    }

    pub fn with_members(mut self, members: Vec<MemberOperation>) -> Self {
        if self.action != GroupAction::Delete {
            self.members = members;
        }
        self
    }

    pub fn replacing_existing(mut self, users: bool, groups: bool) -> Self {
        self.delete_existing_users = users;
        self.delete_existing_groups = groups;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryAction {
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRegistryOperation {
    pub hive: String,
    /// Hive-relative `key\value` path
    pub key: String,
    pub data_type: RegistryType,
    pub data: String,
    pub action: RegistryAction,
}

impl CanonicalRegistryOperation {
    /// `Hive\Key`
    pub fn full_key(&self) -> String {
        if self.hive.is_empty() {
            self.key.clone()
        } else {
            format!("{}\\{}", self.hive, self.key)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalPrivilegeGrant {
    pub privilege_name: String,
    pub trustees: Vec<TrusteeRef>,
}

/// Records of one policy scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeRecords {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<CanonicalGroupOperation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub registry: Vec<CanonicalRegistryOperation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub privileges: Vec<CanonicalPrivilegeGrant>,
}

impl ScopeRecords {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.registry.is_empty() && self.privileges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len() + self.registry.len() + self.privileges.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedGpo {
    #[serde(rename = "Machine", skip_serializing_if = "ScopeRecords::is_empty")]
    pub machine: ScopeRecords,
    #[serde(rename = "User", skip_serializing_if = "ScopeRecords::is_empty")]
    pub user: ScopeRecords,
}

impl NormalizedGpo {
    /// Scopes in analysis order
    pub const SCOPES: [PolicyScope; 2] = [PolicyScope::User, PolicyScope::Machine];

    pub fn scope(&self, scope: PolicyScope) -> Option<&ScopeRecords> {
        match scope {
            PolicyScope::Machine => Some(&self.machine),
            PolicyScope::User => Some(&self.user),
            PolicyScope::None => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.machine.is_empty() && self.user.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.machine.len() + self.user.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_codes() {
        assert_eq!(GroupAction::from_code(Some("c")), GroupAction::Create);
        assert_eq!(GroupAction::from_code(Some("R")), GroupAction::Replace);
        assert_eq!(GroupAction::from_code(Some("D")), GroupAction::Delete);
        assert_eq!(GroupAction::from_code(Some("X")), GroupAction::Update);
        assert_eq!(GroupAction::from_code(None), GroupAction::Update);
    }

    #[test]
    fn test_delete_keeps_no_members() {
        let op = CanonicalGroupOperation::delete(TrusteeRef::from_sid("S-1-5-32-544"))
            .with_members(vec![MemberOperation::add(TrusteeRef::from_name("x"))]);
        assert!(op.members.is_empty());
    }

    #[test]
    fn test_member_serialization_is_flat() {
        let member = MemberOperation::add(TrusteeRef::from_sid("S-1-5-18"));
        let json = serde_json::to_value(&member).unwrap();
        assert_eq!(json, serde_json::json!({"sid": "S-1-5-18", "name": null, "action": "ADD"}));
    }
}
