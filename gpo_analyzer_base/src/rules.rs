//! # Rule Set
//!
//! Watched groups, registry rules and dangerous privileges, read from three TOML
//! documents. The builtin documents are embedded; a rules directory replaces
//! any of them file by file. Everything is validated here so evaluation never
//! meets an unknown condition.

use crate::api::config::AnalyzerConfig;
use crate::api::errors::ConfigError;
use crate::normalize::CanonicalRegistryOperation;
use gpo_decoders::log_debug;
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const GROUPS_DOCUMENT: &str = "groups.toml";
pub const REGISTRY_DOCUMENT: &str = "registry.toml";
pub const PRIVILEGES_DOCUMENT: &str = "privilege_rights.toml";

const BUILTIN_GROUPS: &str = include_str!("../../config/analysis/groups.toml");
const BUILTIN_REGISTRY: &str = include_str!("../../config/analysis/registry.toml");
const BUILTIN_PRIVILEGES: &str = include_str!("../../config/analysis/privilege_rights.toml");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchedGroup {
    pub sid: String,
    pub name: String,
    #[serde(default)]
    pub edge: Option<String>,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DangerousPrivilege {
    pub narrative: String,
    #[serde(default)]
    pub edge: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub default_trustees: Vec<String>,
}

/// Registry condition kinds
#[derive(Debug, Clone)]
pub enum RegistryCondition {
    ValueEquals { key: String, value: String },
    ValueLessThan { key: String, threshold: i64 },
    KeyEndsWith { suffix: String },
    KeyRegex(Regex),
}

impl RegistryCondition {
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryCondition::ValueEquals { .. } => "value_equals",
            RegistryCondition::ValueLessThan { .. } => "value_less_than",
            RegistryCondition::KeyEndsWith { .. } => "key_ends_with",
            RegistryCondition::KeyRegex(_) => "key_regex",
        }
    }

    /// Keys compare without the hive and ignoring case
    pub fn matches(&self, record: &CanonicalRegistryOperation) -> bool {
        let key = record.key.to_lowercase();
        match self {
            RegistryCondition::ValueEquals { key: wanted, value } => {
                key == *wanted && record.data.trim().to_lowercase() == *value
            }
            RegistryCondition::ValueLessThan {
                key: wanted,
                threshold,
            } => {
                if key != *wanted {
                    return false;
                }
                match record.data.trim().parse::<i64>() {
                    Ok(data) => data < *threshold,
                    Err(_) => {
                        log_debug!(
                            "Registry data is not numeric",
                            "key" => record.key,
                            "data" => record.data
                        );
                        false
                    }
                }
            }
            RegistryCondition::KeyEndsWith { suffix } => key.ends_with(suffix.as_str()),
            RegistryCondition::KeyRegex(pattern) => pattern.is_match(&record.key),
        }
    }
}

/// Credential recovery applied to a matched value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decryption {
    Vnc,
}

#[derive(Debug, Clone)]
pub struct RegistryRule {
    pub name: String,
    pub condition: RegistryCondition,
    pub narrative: String,
    pub references: Vec<String>,
    pub decrypt: Option<Decryption>,
    /// Computer property the value is exported as
    pub property: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRegistryRule {
    #[serde(default)]
    name: Option<String>,
    condition: String,
    key: String,
    #[serde(default)]
    value: Option<toml::Value>,
    narrative: String,
    #[serde(default)]
    references: Vec<String>,
    #[serde(default)]
    decrypt: Option<String>,
    #[serde(default)]
    property: Option<String>,
}

fn value_text(rule: &str, value: Option<toml::Value>) -> Result<String, ConfigError> {
    match value {
        Some(toml::Value::String(s)) => Ok(s),
        Some(toml::Value::Integer(n)) => Ok(n.to_string()),
        Some(toml::Value::Boolean(b)) => Ok(b.to_string()),
        Some(other) => Err(ConfigError::invalid_rule(
            rule,
            format!("unsupported value type {}", other.type_str()),
        )),
        None => Err(ConfigError::invalid_rule(rule, "missing value")),
    }
}

impl RawRegistryRule {
    fn validate(self, index: usize) -> Result<RegistryRule, ConfigError> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("registry rule {}", index + 1));
        let key = self.key.to_lowercase();

        let condition = match self.condition.as_str() {
            "value_equals" => RegistryCondition::ValueEquals {
                key,
                value: value_text(&name, self.value)?.trim().to_lowercase(),
            },
            "value_less_than" => {
                let text = value_text(&name, self.value)?;
                let threshold = text.trim().parse::<i64>().map_err(|_| {
                    ConfigError::invalid_rule(&name, format!("threshold '{}' is not an integer", text))
                })?;
                RegistryCondition::ValueLessThan { key, threshold }
            }
            "key_ends_with" => RegistryCondition::KeyEndsWith { suffix: key },
            "key_regex" => RegistryCondition::KeyRegex(
                RegexBuilder::new(&self.key)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::invalid_rule(&name, e.to_string()))?,
            ),
            other => {
                return Err(ConfigError::invalid_rule(
                    &name,
                    format!("unknown condition '{}'", other),
                ))
            }
        };

        let decrypt = match self.decrypt.as_deref() {
            None => None,
            Some(d) if d.eq_ignore_ascii_case("vnc") => Some(Decryption::Vnc),
            Some(d) => {
                return Err(ConfigError::invalid_rule(
                    &name,
                    format!("unknown decryption '{}'", d),
                ))
            }
        };

        Ok(RegistryRule {
            name,
            condition,
            narrative: self.narrative,
            references: self.references,
            decrypt,
            property: self.property,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GroupsDocument {
    #[serde(default)]
    group: Vec<WatchedGroup>,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    rule: Vec<RawRegistryRule>,
}

#[derive(Debug, Deserialize)]
struct PrivilegesDocument {
    #[serde(default)]
    privilege: IndexMap<String, DangerousPrivilege>,
}

fn parse<T: for<'de> Deserialize<'de>>(document: &str, content: &str) -> Result<T, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Toml {
        document: document.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Keyed by group SID
    pub groups: IndexMap<String, WatchedGroup>,
    pub registry: Vec<RegistryRule>,
    /// Keyed by privilege constant
    pub privileges: IndexMap<String, DangerousPrivilege>,
}

impl RuleSet {
    pub fn from_documents(groups: &str, registry: &str, privileges: &str) -> Result<Self, ConfigError> {
        let groups: GroupsDocument = parse(GROUPS_DOCUMENT, groups)?;
        let registry: RegistryDocument = parse(REGISTRY_DOCUMENT, registry)?;
        let privileges: PrivilegesDocument = parse(PRIVILEGES_DOCUMENT, privileges)?;

        let registry = registry
            .rule
            .into_iter()
            .enumerate()
            .map(|(index, rule)| rule.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            groups: groups
                .group
                .into_iter()
                .map(|g| (g.sid.to_uppercase(), g))
                .collect(),
            registry,
            privileges: privileges.privilege,
        })
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_documents(BUILTIN_GROUPS, BUILTIN_REGISTRY, BUILTIN_PRIVILEGES)
    }

    /// Documents present in `dir` replace the builtin ones
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let read = |name: &str, builtin: &'static str| -> Result<String, ConfigError> {
            let path = dir.join(name);
            if !path.is_file() {
                return Ok(builtin.to_string());
            }
            fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })
        };
        Self::from_documents(
            &read(GROUPS_DOCUMENT, BUILTIN_GROUPS)?,
            &read(REGISTRY_DOCUMENT, BUILTIN_REGISTRY)?,
            &read(PRIVILEGES_DOCUMENT, BUILTIN_PRIVILEGES)?,
        )
    }

    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, ConfigError> {
        match &config.rules_dir {
            Some(dir) => Self::load_dir(dir),
            None => Self::builtin(),
        }
    }

    pub fn watched_group(&self, sid: &str) -> Option<&WatchedGroup> {
        self.groups.get(&sid.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RegistryAction;
    use assert_matches::assert_matches;
    use gpo_decoders::RegistryType;

    fn record(key: &str, data: &str) -> CanonicalRegistryOperation {
        CanonicalRegistryOperation {
            hive: "HKEY_LOCAL_MACHINE".to_string(),
            key: key.to_string(),
            data_type: RegistryType::Dword,
            data: data.to_string(),
            action: RegistryAction::Update,
        }
    }

    fn single_rule(body: &str) -> Result<RuleSet, ConfigError> {
        RuleSet::from_documents("", &format!("[[rule]]\nnarrative = \"n\"\n{}", body), "")
    }

    #[test]
    fn test_builtin_rules_load() {
        let rules = RuleSet::builtin().unwrap();
        assert!(rules.watched_group("s-1-5-32-544").is_some());
        assert!(rules.privileges.contains_key("SeDebugPrivilege"));
        assert!(rules.registry.iter().any(|r| r.decrypt == Some(Decryption::Vnc)));
    }

    #[test]
    fn test_value_less_than_is_strict() {
        let rules = single_rule("condition = \"value_less_than\"\nkey = 'A\\Level'\nvalue = 3").unwrap();
        let condition = &rules.registry[0].condition;
        assert!(condition.matches(&record("a\\level", "2")));
        assert!(!condition.matches(&record("A\\Level", "3")));
        assert!(!condition.matches(&record("A\\Level", "five")));
        assert!(!condition.matches(&record("B\\Level", "0")));
    }

    #[test]
    fn test_value_equals_ignores_case() {
        let rules = single_rule("condition = \"value_equals\"\nkey = 'A\\Mode'\nvalue = \"On\"").unwrap();
        assert!(rules.registry[0].condition.matches(&record("a\\MODE", "on")));
        assert!(!rules.registry[0].condition.matches(&record("a\\MODE", "off")));
    }

    #[test]
    fn test_key_conditions() {
        let ends = single_rule("condition = \"key_ends_with\"\nkey = 'Winlogon\\DefaultPassword'").unwrap();
        assert!(ends.registry[0]
            .condition
            .matches(&record("SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\WINLOGON\\DefaultPassword", "x")));

        let vnc = RuleSet::builtin().unwrap();
        let vnc = vnc.registry.iter().find(|r| r.name == "vnc-password").unwrap();
        assert!(vnc.condition.matches(&record("SOFTWARE\\RealVNC\\vncserver\\Password", "00")));
        assert!(!vnc.condition.matches(&record("SOFTWARE\\RealVNC\\vncserver\\Encryption", "00")));
    }

    #[test]
    fn test_invalid_rules_fail_at_load() {
        assert_matches!(
            single_rule("condition = \"value_greater_than\"\nkey = 'A'\nvalue = 1"),
            Err(ConfigError::InvalidRule { .. })
        );
        assert_matches!(
            single_rule("condition = \"value_less_than\"\nkey = 'A'\nvalue = \"three\""),
            Err(ConfigError::InvalidRule { .. })
        );
        assert_matches!(
            single_rule("condition = \"key_regex\"\nkey = '(unclosed'"),
            Err(ConfigError::InvalidRule { .. })
        );
        assert_matches!(
            single_rule("condition = \"key_ends_with\"\nkey = 'A'\ndecrypt = \"rot13\""),
            Err(ConfigError::InvalidRule { .. })
        );
        assert_matches!(
            RuleSet::from_documents("[[group]]\nsid = 1", "", ""),
            Err(ConfigError::Toml { .. })
        );
    }

    #[test]
    fn test_rules_dir_overrides_per_document() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(GROUPS_DOCUMENT),
            "[[group]]\nsid = \"S-1-5-32-555\"\nname = \"RDP\"\nreference = \"r\"\n",
        )
        .unwrap();

        let rules = RuleSet::load_dir(dir.path()).unwrap();
        assert_eq!(rules.groups.len(), 1);
        assert!(rules.watched_group("S-1-5-32-544").is_none());
        assert!(!rules.registry.is_empty());
    }
}
