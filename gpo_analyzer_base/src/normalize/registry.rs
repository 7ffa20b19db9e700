//! Registry settings from `Registry.xml`, `registry.pol` and `Registry Values`

use super::types::{CanonicalRegistryOperation, RegistryAction};
use gpo_decoders::logging::codes;
use gpo_decoders::tree::find_keys;
use gpo_decoders::{log_warning, Node, RegistryType};

/// Key fragment `registry.pol` uses to mark a deletion
pub const DELETE_MARKER: &str = "**del";

fn data_text(node: Option<&Node>) -> String {
    match node {
        Some(Node::Text(s)) => s.clone(),
        Some(Node::Int(n)) => n.to_string(),
        Some(Node::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn record(
    hive: &str,
    key: String,
    type_name: Option<&str>,
    data: String,
    action: RegistryAction,
) -> Option<CanonicalRegistryOperation> {
    let type_name = type_name.unwrap_or_default();
    let Some(data_type) = RegistryType::from_name(type_name) else {
        log_warning!(
            code = codes::normalization::UNKNOWN_REGISTRY_TYPE,
            "Skipping registry setting with unknown type",
            "key" => key,
            "type" => type_name
        );
        return None;
    };
    Some(CanonicalRegistryOperation {
        hive: hive.to_string(),
        key,
        data_type,
        data,
        action,
    })
}

/// `registry.pol` entries keyed `key\value`
pub fn from_policy_file(body: &Node) -> Vec<CanonicalRegistryOperation> {
    let Some(entries) = body.as_tree() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|(key, entry)| {
            let action = if key.to_lowercase().contains(DELETE_MARKER) {
                RegistryAction::Delete
            } else {
                RegistryAction::Update
            };
            record(
                entry.get_str("Hive").unwrap_or_default(),
                key.clone(),
                entry.get_str("Type"),
                data_text(entry.get("Data")),
                action,
            )
        })
        .collect()
}

/// `Registry Values` rows keyed `MACHINE\...`; the leading hive segment is dropped
pub fn from_registry_values(section: &Node) -> Vec<CanonicalRegistryOperation> {
    let Some(rows) = section.as_tree() else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|(key, entry)| {
            let relative = key.split_once('\\').map(|(_, rest)| rest).unwrap_or(key);
            record(
                entry.get_str("Hive").unwrap_or_default(),
                relative.to_string(),
                entry.get_str("Type"),
                data_text(entry.get("Data")),
                RegistryAction::Update,
            )
        })
        .collect()
}

/// Hex DWORD text as a decimal string
fn dword_to_decimal(value: &str) -> Option<String> {
    let digits = value.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    u64::from_str_radix(digits, 16).ok().map(|n| n.to_string())
}

fn preference_entry(item: &Node) -> Option<CanonicalRegistryOperation> {
    let properties = item.get("Properties")?;
    let key = properties.get_str("key").unwrap_or_default();
    let key = match properties.get_str("name") {
        Some(name) => format!("{}\\{}", key, name),
        None => key.to_string(),
    };
    let type_name = properties.get_str("type");
    let raw = data_text(properties.get("value"));

    let data = if type_name == Some(RegistryType::Dword.as_str()) && !raw.is_empty() {
        match dword_to_decimal(&raw) {
            Some(decimal) => decimal,
            None => {
                log_warning!(
                    code = codes::normalization::MALFORMED_SETTING,
                    "DWORD preference value is not hexadecimal",
                    "key" => key,
                    "value" => raw
                );
                raw
            }
        }
    } else {
        raw
    };

    let action = match properties.get_str("action") {
        Some(a) if a.eq_ignore_ascii_case("D") => RegistryAction::Delete,
        _ => RegistryAction::Update,
    };
    record(
        properties.get_str("hive").unwrap_or_default(),
        key,
        type_name,
        data,
        action,
    )
}

/// `Registry` elements anywhere in a `Registry.xml` body, collections included
pub fn from_preferences(body: &Node) -> Vec<CanonicalRegistryOperation> {
    let Some(tree) = body.as_tree() else {
        return Vec::new();
    };
    find_keys(tree, "Registry")
        .into_iter()
        .flat_map(|found| found.value.items())
        .filter_map(preference_entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(value: serde_json::Value) -> Node {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_policy_file_dword() {
        let body = node(serde_json::json!({
            "Software\\Policies\\X\\Enabled": {"Hive": "HKEY_LOCAL_MACHINE", "Type": "REG_DWORD", "Size": "4", "Data": "1"},
            "Software\\Policies\\X\\**del.Old": {"Hive": "HKEY_LOCAL_MACHINE", "Type": "REG_SZ", "Data": ""}
        }));
        let records = from_policy_file(&body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data, "1");
        assert_eq!(records[0].data_type, RegistryType::Dword);
        assert_eq!(records[0].action, RegistryAction::Update);
        assert_eq!(records[0].full_key(), "HKEY_LOCAL_MACHINE\\Software\\Policies\\X\\Enabled");
        assert_eq!(records[1].action, RegistryAction::Delete);
    }

    #[test]
    fn test_registry_values_strip_hive_segment() {
        let section = node(serde_json::json!({
            "MACHINE\\System\\CurrentControlSet\\Control\\Lsa\\LmCompatibilityLevel":
                {"Hive": "HKEY_LOCAL_MACHINE", "Type": "REG_DWORD", "Data": "1"}
        }));
        let records = from_registry_values(&section);
        assert_eq!(records[0].key, "System\\CurrentControlSet\\Control\\Lsa\\LmCompatibilityLevel");
    }

    #[test]
    fn test_preferences_hex_dword_and_collections() {
        let body = node(serde_json::json!({
            "Registry": {"Properties": {
                "action": "U", "hive": "HKEY_LOCAL_MACHINE", "key": "SOFTWARE\\RealVNC\\vncserver",
                "name": "Password", "type": "REG_BINARY", "value": "A8A2B3C4D5E6F708"
            }},
            "Collection": {"Registry": [
                {"Properties": {"action": "D", "hive": "HKEY_LOCAL_MACHINE", "key": "SOFTWARE\\X",
                                "name": "Level", "type": "REG_DWORD", "value": "0000000A"}},
                {"Properties": {"action": "U", "hive": "HKEY_LOCAL_MACHINE", "key": "SOFTWARE\\X",
                                "name": "Odd", "type": "REG_WEIRD", "value": "1"}}
            ]}
        }));
        let records = from_preferences(&body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "SOFTWARE\\RealVNC\\vncserver\\Password");
        assert_eq!(records[1].data, "10");
        assert_eq!(records[1].action, RegistryAction::Delete);
    }
}
