//! Per-format field whitelists
//!
//! The schema is an immutable document loaded once at startup and passed by
//! reference into every decoder. A node that is present but lacks
//! `include = true` is a deliberate opt-out, distinct from a node that is absent.

use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::runtime::DecoderPreferences;

/// File name of the schema document inside a configuration directory
pub const SCHEMA_FILE_NAME: &str = "gpo_files_structure.toml";

const BUILTIN_SCHEMA: &str = include_str!("../../../config/gpo_files_structure.toml");

/// Schema loading errors (fatal at startup)
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema document: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid schema: {message}")]
    Invalid { message: String },
}

/// A flat whitelist with an include flag
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSet {
    #[serde(default)]
    pub include: bool,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl FieldSet {
    pub fn allows(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

/// XML element configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaNode {
    #[serde(default)]
    pub include: bool,
    /// `None` or empty keeps every attribute
    #[serde(default)]
    pub attributes: Option<Vec<String>>,
    #[serde(default)]
    pub elements: IndexMap<String, SchemaNode>,
}

/// Outcome of looking up the configuration of a child element
#[derive(Debug, Clone, Copy)]
pub enum ChildConfig<'a> {
    /// No configuration anywhere below the parent; captured permissively
    NotFound,
    /// Configured without the include flag; dropped
    Excluded,
    Included(&'a SchemaNode),
}

impl SchemaNode {
    /// Configuration used for elements the schema does not know about
    pub fn permissive() -> Self {
        Self {
            include: true,
            attributes: None,
            elements: IndexMap::new(),
        }
    }

    /// Attribute whitelist, if one is configured
    pub fn attribute_whitelist(&self) -> Option<&[String]> {
        match &self.attributes {
            Some(list) if !list.is_empty() => Some(list.as_slice()),
            _ => None,
        }
    }

    /// Depth-first search over the whole subtree: direct children first, then
    /// each child subtree in document order. The first match wins.
    pub fn find_child(&self, tag: &str) -> Option<&SchemaNode> {
        if let Some(node) = self.elements.get(tag) {
            return Some(node);
        }
        self.elements.values().find_map(|child| child.find_child(tag))
    }

    pub fn child_config(&self, tag: &str) -> ChildConfig<'_> {
        match self.find_child(tag) {
            None => ChildConfig::NotFound,
            Some(node) if node.include => ChildConfig::Included(node),
            Some(_) => ChildConfig::Excluded,
        }
    }
}

/// Row shape of an INF section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InfSectionKind {
    KeyValue,
    StringList,
    CommaSeparated,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfSection {
    #[serde(default)]
    pub include: bool,
    #[serde(rename = "type")]
    pub kind: InfSectionKind,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl InfSection {
    pub fn allows(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IniSchema {
    /// GPT.ini: section name to whitelisted keys
    #[serde(default)]
    pub gpt: IndexMap<String, FieldSet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvSchema {
    #[serde(rename = "Audit", default)]
    pub audit: FieldSet,
}

/// The complete schema document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSchema {
    /// Lower-cased file names collected from a GPO directory
    pub policy_files: Vec<String>,
    #[serde(default)]
    pub xml: IndexMap<String, SchemaNode>,
    /// Registry type name to whitelisted record attributes
    #[serde(default)]
    pub pol: IndexMap<String, FieldSet>,
    /// Lower-cased INF file stem to section configuration
    #[serde(default)]
    pub inf: IndexMap<String, IndexMap<String, InfSection>>,
    #[serde(default)]
    pub ini: IniSchema,
    #[serde(default)]
    pub csv: CsvSchema,
    #[serde(default)]
    pub aas: FieldSet,
}

impl FileSchema {
    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        let mut schema: FileSchema = toml::from_str(content)?;
        schema.policy_files = schema
            .policy_files
            .iter()
            .map(|name| name.to_lowercase())
            .collect();
        schema.validate()?;
        Ok(schema)
    }

    /// Schema shipped with the binaries
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_toml_str(BUILTIN_SCHEMA)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Schema from the preferred directory, falling back to the builtin document
    pub fn from_preferences(prefs: &DecoderPreferences) -> Result<Self, SchemaError> {
        match &prefs.schema_dir {
            Some(dir) => Self::load(&dir.join(SCHEMA_FILE_NAME)),
            None => Self::builtin(),
        }
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for type_name in self.pol.keys() {
            if crate::reg_types::RegistryType::from_name(type_name).is_none() {
                return Err(SchemaError::Invalid {
                    message: format!("unknown registry type '{}' in [pol]", type_name),
                });
            }
        }
        Ok(())
    }

    pub fn wants_file(&self, lower_name: &str) -> bool {
        self.policy_files.iter().any(|f| f == lower_name)
    }

    pub fn wants_scripts(&self) -> bool {
        self.wants_file("scripts.ini") || self.wants_file("psscripts.ini")
    }

    pub fn wants_aas(&self) -> bool {
        self.wants_file("{guid}.aas")
    }

    /// Root configuration of an XML document; only the top level is searched
    pub fn xml_root(&self, tag: &str) -> ChildConfig<'_> {
        match self.xml.get(tag) {
            None => ChildConfig::NotFound,
            Some(node) if node.include => ChildConfig::Included(node),
            Some(_) => ChildConfig::Excluded,
        }
    }

    pub fn inf_file(&self, stem: &str) -> Option<&IndexMap<String, InfSection>> {
        self.inf.get(&stem.to_lowercase())
    }
}
