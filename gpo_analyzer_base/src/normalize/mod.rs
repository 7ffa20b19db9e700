//! Setting Normalizer
//!
//! Reduces the decoded trees of one GPO to canonical group, registry and
//! privilege records. Resolution misses are kept as half-filled trustees.

pub mod builder;
pub mod groups;
pub mod privileges;
pub mod registry;
pub mod types;

pub use builder::OrderedBuilder;
pub use types::{
    CanonicalGroupOperation, CanonicalPrivilegeGrant, CanonicalRegistryOperation, GroupAction,
    MemberAction, MemberOperation, NormalizedGpo, RegistryAction, ScopeRecords,
};

use crate::api::config::{ObjectFilter, ObjectKind};
use crate::directory::{sid_literal, DirectoryLookup, TrusteeRef};
use gpo_decoders::formats::{inf, pol};
use gpo_decoders::{GpoSettings, PolicyScope, Tree};

/// Preference file names, matched case-insensitively against decoder labels
pub const GROUPS_XML: &str = "Groups.xml";
pub const REGISTRY_XML: &str = "Registry.xml";

/// Trustee resolution bound to one domain
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    directory: &'a dyn DirectoryLookup,
    domain_sid: Option<&'a str>,
}

impl<'a> Resolver<'a> {
    pub fn new(directory: &'a dyn DirectoryLookup, domain_sid: Option<&'a str>) -> Self {
        Self {
            directory,
            domain_sid,
        }
    }

    pub fn domain_sid(&self) -> Option<&'a str> {
        self.domain_sid
    }

    fn name_for_sid(&self, sid: &str) -> Option<String> {
        self.directory
            .resolve_trustee(sid, None)
            .and_then(|t| t.name)
    }

    fn sid_for_name(&self, name: &str) -> Option<String> {
        self.directory
            .resolve_trustee(name, self.domain_sid)
            .and_then(|t| t.sid)
    }

    /// A SID (`*`-prefixed or not) keeps the SID and gains a name; anything
    /// else keeps the name and gains a SID
    pub fn identifier(&self, raw: &str) -> TrusteeRef {
        let raw = raw.trim();
        match sid_literal(raw) {
            Some(sid) => TrusteeRef {
                sid: Some(sid.to_string()),
                name: self.name_for_sid(sid),
            },
            None => TrusteeRef {
                sid: self.sid_for_name(raw),
                name: Some(raw.to_string()),
            },
        }
    }

    /// Trustee given as separate SID and name fields, either of which may be empty
    pub fn fields(&self, sid: Option<&str>, name: Option<&str>) -> Option<TrusteeRef> {
        let sid = sid.map(str::trim).filter(|s| !s.is_empty());
        let name = name.map(str::trim).filter(|s| !s.is_empty());
        match (sid, name) {
            (Some(sid), Some(name)) => Some(TrusteeRef {
                sid: Some(sid.to_string()),
                name: Some(name.to_string()),
            }),
            (Some(sid), None) => Some(TrusteeRef {
                sid: Some(sid.to_string()),
                name: self.name_for_sid(sid),
            }),
            (None, Some(name)) => Some(self.identifier(name)),
            (None, None) => None,
        }
    }

    /// A `DOMAIN\name` resolved without the domain hint
    pub fn qualified(&self, name: &str) -> TrusteeRef {
        match self.directory.resolve_trustee(name, None) {
            Some(found) => TrusteeRef {
                sid: found.sid,
                name: found.name.or_else(|| Some(name.to_string())),
            },
            None => TrusteeRef::from_name(name),
        }
    }
}

/// Normalize one scope map, in the order its entries were decoded
pub fn normalize_scope(view: &Tree, resolver: &Resolver<'_>, objects: &ObjectFilter) -> ScopeRecords {
    let mut records = ScopeRecords::default();

    for (label, setting) in view {
        if setting.is_empty() {
            continue;
        }
        if label.eq_ignore_ascii_case(GROUPS_XML) {
            if objects.includes(ObjectKind::Group) {
                records.groups.extend(groups::from_preferences(setting, resolver));
            }
        } else if label == inf::GROUP_MEMBERSHIP {
            if objects.includes(ObjectKind::Group) {
                records.groups.extend(groups::from_membership_section(setting, resolver));
            }
        } else if label.eq_ignore_ascii_case(REGISTRY_XML) {
            if objects.includes(ObjectKind::Registry) {
                records.registry.extend(registry::from_preferences(setting));
            }
        } else if label == pol::LABEL {
            if objects.includes(ObjectKind::Registry) {
                records.registry.extend(registry::from_policy_file(setting));
            }
        } else if label == inf::REGISTRY_VALUES {
            if objects.includes(ObjectKind::Registry) {
                records.registry.extend(registry::from_registry_values(setting));
            }
        } else if label == inf::PRIVILEGE_RIGHTS && objects.includes(ObjectKind::Privilege) {
            records.privileges.extend(privileges::from_privilege_rights(setting, resolver));
        }
    }

    records
}

/// Normalize both scopes of a decoded GPO
pub fn normalize_gpo(
    settings: &GpoSettings,
    directory: &dyn DirectoryLookup,
    domain_sid: Option<&str>,
    objects: &ObjectFilter,
) -> NormalizedGpo {
    let resolver = Resolver::new(directory, domain_sid);
    NormalizedGpo {
        machine: normalize_scope(&settings.normalizer_view(PolicyScope::Machine), &resolver, objects),
        user: normalize_scope(&settings.normalizer_view(PolicyScope::User), &resolver, objects),
    }
}
