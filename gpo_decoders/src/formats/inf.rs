//! Security template (`GptTmpl.inf`) decoder
//!
//! Each configured section has a row shape. Four sections carry
//! domain-specific rows on top of the generic shapes: privilege rights,
//! group membership, registry values and the ACL sections.

use crate::config::compile_time::decoders::MAX_INF_LINES;
use crate::config::schema::{FileSchema, InfSection, InfSectionKind};
use crate::error::DecodeError;
use crate::reg_types::RegistryType;
use crate::text::decode_text;
use crate::tree::{DecodedTree, Node, Tree};
use crate::log_debug;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

const FORMAT: &str = "INF";

pub const PRIVILEGE_RIGHTS: &str = "Privilege Rights";
pub const GROUP_MEMBERSHIP: &str = "Group Membership";
pub const REGISTRY_VALUES: &str = "Registry Values";
pub const REGISTRY_KEYS: &str = "Registry Keys";
pub const FILE_SECURITY: &str = "File Security";
pub const SERVICE_GENERAL_SETTING: &str = "Service General Setting";

pub const MEMBERS_SUFFIX: &str = "__Members";
pub const MEMBEROF_SUFFIX: &str = "__Memberof";

fn section_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\[\s*(.*?)\s*\]").ok())
        .as_ref()
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"')
}

fn split_list(value: &str) -> Node {
    Node::List(
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(Node::text)
            .collect(),
    )
}

fn project(entry: Vec<(&str, Node)>, config: &InfSection) -> Tree {
    entry
        .into_iter()
        .filter(|(name, _)| config.allows(name))
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn key_value_row(section_name: &str, config: &InfSection, line: &str, section: &mut Tree) {
    let Some((key, value)) = line.split_once('=') else {
        return;
    };
    let key = unquote(key);
    let value = value.trim();

    match section_name {
        PRIVILEGE_RIGHTS => {
            if config.allows(key) {
                section.insert(key.to_string(), split_list(value));
            }
        }
        GROUP_MEMBERSHIP => {
            if value.is_empty() {
                return;
            }
            let (group, membership) = if let Some(group) = key.strip_suffix(MEMBERS_SUFFIX) {
                (group, "Members")
            } else if let Some(group) = key.strip_suffix(MEMBEROF_SUFFIX) {
                (group, "Memberof")
            } else {
                return;
            };
            if !config.allows(membership) {
                return;
            }
            let group_entry = section
                .entry(group.to_string())
                .or_insert_with(Node::empty_tree);
            if let Some(group_entry) = group_entry.as_tree_mut() {
                group_entry.insert(membership.to_string(), split_list(value));
            }
        }
        REGISTRY_VALUES => {
            let Some((type_code, data)) = value.split_once(',') else {
                log_debug!("Registry value row without type", "key" => key);
                return;
            };
            let Some(reg_type) = RegistryType::from_code_str(type_code.trim()) else {
                log_debug!("Registry value row with unknown type", "key" => key, "type" => type_code);
                return;
            };
            let hive = if key.starts_with("USER") {
                "HKEY_USERS"
            } else {
                "HKEY_LOCAL_MACHINE"
            };
            let entry = vec![
                ("Hive", Node::text(hive)),
                ("Type", Node::text(reg_type.as_str())),
                ("Data", Node::text(unquote(data))),
            ];
            section.insert(key.to_string(), Node::Tree(project(entry, config)));
        }
        _ => {
            if config.allows(key) {
                section.insert(key.to_string(), Node::text(unquote(value)));
            }
        }
    }
}

fn comma_separated_row(section_name: &str, config: &InfSection, line: &str, section: &mut Tree) {
    let mut parts = line.splitn(3, ',');
    let (Some(key), Some(first), Some(second)) = (parts.next(), parts.next(), parts.next()) else {
        return;
    };
    let (key, first, second) = (unquote(key), unquote(first), unquote(second));

    let entry = match section_name {
        REGISTRY_KEYS | FILE_SECURITY => vec![
            ("PermPropagationMode", Node::text(first)),
            ("AclString", Node::text(second)),
        ],
        SERVICE_GENERAL_SETTING => vec![
            ("StartupMode", Node::text(first)),
            ("AclString", Node::text(second)),
        ],
        _ => vec![("Value", Node::text(first)), ("AclString", Node::text(second))],
    };
    section.insert(key.to_string(), Node::Tree(project(entry, config)));
}

/// Decode into `{"<stem>.inf": {section: rows}}`. `stem` is the file name
/// without extension and selects the schema entry.
pub fn decode(bytes: &[u8], stem: &str, schema: &FileSchema) -> Result<Option<DecodedTree>, DecodeError> {
    let Some(file_config) = schema.inf_file(stem) else {
        return Ok(None);
    };

    let decoded = decode_text(bytes);
    let mut results: IndexMap<String, Tree> = IndexMap::new();
    let mut current: Option<(&str, &InfSection)> = None;

    for (count, raw_line) in decoded.text.lines().enumerate() {
        if count >= MAX_INF_LINES {
            return Err(DecodeError::Limit {
                format: FORMAT,
                what: format!("more than {} lines", MAX_INF_LINES),
            });
        }

        let line = raw_line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        if let Some(captures) = section_pattern().and_then(|p| p.captures(line)) {
            let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            current = file_config
                .get_key_value(name)
                .filter(|(_, config)| config.include)
                .map(|(name, config)| (name.as_str(), config));
            if let Some((name, _)) = current {
                results.entry(name.to_string()).or_default();
            }
            continue;
        }

        let Some((section_name, config)) = current else {
            continue;
        };
        let section = results.entry(section_name.to_string()).or_default();

        match config.kind {
            InfSectionKind::StringList => {
                let index = section.len() + 1;
                section.insert(index.to_string(), Node::text(unquote(line)));
            }
            InfSectionKind::KeyValue => key_value_row(section_name, config, line, section),
            InfSectionKind::CommaSeparated => comma_separated_row(section_name, config, line, section),
        }
    }

    if results.is_empty() {
        return Ok(None);
    }
    let body: Tree = results
        .into_iter()
        .map(|(name, section)| (name, Node::Tree(section)))
        .collect();
    Ok(Some(DecodedTree::new(format!("{}.inf", stem), Node::Tree(body))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const TEMPLATE: &str = r#"[Unicode]
Unicode=yes
[System Access]
MinimumPasswordLength = 7
PasswordComplexity = 1
NotWhitelisted = 5
[Privilege Rights]
SeDebugPrivilege = *S-1-5-32-544,CORP\helpdesk
SeNotARight = *S-1-1-0
[Group Membership]
*S-1-5-32-544__Memberof =
*S-1-5-32-544__Members = *S-1-5-21-1-2-3-500
*S-1-5-21-1-2-3-1107__Memberof = *S-1-5-32-555
[Registry Values]
MACHINE\System\CurrentControlSet\Control\Lsa\LmCompatibilityLevel=4,1
USER\Software\X\Name=1,"quoted"
[Service General Setting]
"Spooler",4,"D:AR(A;;CCLCSWRPWPDTLOCRRC;;;SY)"
[Registry Keys]
"MACHINE\SOFTWARE\Private",0,"D:PAR(A;CI;KA;;;BA)"
[Profile Description]
"First line"
Second line
[Event Audit]
; auditing
AuditLogonEvents = 3
[Not Configured]
Anything = 1
"#;

    fn decode_template() -> Tree {
        let schema = FileSchema::builtin().unwrap();
        let tree = decode(TEMPLATE.as_bytes(), "GptTmpl", &schema).unwrap().unwrap();
        assert_eq!(tree.label, "GptTmpl.inf");
        match tree.body {
            Node::Tree(t) => t,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_key_value_whitelist() {
        let t = decode_template();
        let access = t["System Access"].as_tree().unwrap();
        assert_eq!(access.get("MinimumPasswordLength"), Some(&Node::text("7")));
        assert!(access.get("NotWhitelisted").is_none());
        assert!(t.get("Not Configured").is_none());
    }

    #[test]
    fn test_privilege_rights_split() {
        let t = decode_template();
        let rights = t["Privilege Rights"].as_tree().unwrap();
        assert_eq!(
            rights["SeDebugPrivilege"],
            Node::List(vec![Node::text("*S-1-5-32-544"), Node::text("CORP\\helpdesk")])
        );
        assert!(rights.get("SeNotARight").is_none());
    }

    #[test]
    fn test_group_membership_compound_keys() {
        let t = decode_template();
        let groups = t["Group Membership"].as_tree().unwrap();
        let admins = groups["*S-1-5-32-544"].as_tree().unwrap();
        assert_eq!(admins["Members"], Node::List(vec![Node::text("*S-1-5-21-1-2-3-500")]));
        // Empty Memberof value is skipped
        assert!(admins.get("Memberof").is_none());
        assert!(groups["*S-1-5-21-1-2-3-1107"].get("Memberof").is_some());
    }

    #[test]
    fn test_registry_values_rows() {
        let t = decode_template();
        let values = t["Registry Values"].as_tree().unwrap();
        let lm = &values["MACHINE\\System\\CurrentControlSet\\Control\\Lsa\\LmCompatibilityLevel"];
        assert_eq!(lm.get_str("Hive"), Some("HKEY_LOCAL_MACHINE"));
        assert_eq!(lm.get_str("Type"), Some("REG_DWORD"));
        assert_eq!(lm.get_str("Data"), Some("1"));
        let user = &values["USER\\Software\\X\\Name"];
        assert_eq!(user.get_str("Hive"), Some("HKEY_USERS"));
        assert_eq!(user.get_str("Data"), Some("quoted"));
    }

    #[test]
    fn test_comma_separated_sections() {
        let t = decode_template();
        let spooler = &t["Service General Setting"].as_tree().unwrap()["Spooler"];
        assert_eq!(spooler.get_str("StartupMode"), Some("4"));
        assert_eq!(spooler.get_str("AclString"), Some("D:AR(A;;CCLCSWRPWPDTLOCRRC;;;SY)"));
        let key = &t["Registry Keys"].as_tree().unwrap()["MACHINE\\SOFTWARE\\Private"];
        assert_eq!(key.get_str("PermPropagationMode"), Some("0"));
    }

    #[test]
    fn test_string_list_numbering() {
        let t = decode_template();
        let profile = t["Profile Description"].as_tree().unwrap();
        assert_eq!(profile["1"], Node::text("First line"));
        assert_eq!(profile["2"], Node::text("Second line"));
    }

    #[test]
    fn test_unconfigured_file_is_no_data() {
        let schema = FileSchema::builtin().unwrap();
        assert_matches!(decode(b"[Unicode]\nUnicode=yes\n", "Other", &schema), Ok(None));
    }
}
