//! Policy store discovery
//!
//! A store is any directory tree holding `<domain>/Policies/{GUID}` folders,
//! typically a copy of SYSVOL.

use crate::config::schema::FileSchema;
use crate::error::DecodeError;
use crate::logging::codes;
use crate::{log_debug, log_success};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Part of the policy a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyScope {
    Machine,
    User,
    None,
}

impl PolicyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyScope::Machine => "Machine",
            PolicyScope::User => "User",
            PolicyScope::None => "",
        }
    }

    /// Scope from the components of a GPO-relative path
    pub fn from_relative_path(relative: &Path) -> Self {
        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect();
        if components.iter().any(|c| c == "machine") {
            PolicyScope::Machine
        } else if components.iter().any(|c| c == "user") {
            PolicyScope::User
        } else {
            PolicyScope::None
        }
    }
}

/// Script folder a file was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptPhase {
    Startup,
    Shutdown,
    Logon,
    Logoff,
}

impl ScriptPhase {
    pub const ALL: [ScriptPhase; 4] = [
        ScriptPhase::Startup,
        ScriptPhase::Shutdown,
        ScriptPhase::Logon,
        ScriptPhase::Logoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptPhase::Startup => "Startup",
            ScriptPhase::Shutdown => "Shutdown",
            ScriptPhase::Logon => "Logon",
            ScriptPhase::Logoff => "Logoff",
        }
    }

    pub fn from_folder(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == name)
    }
}

/// A policy file selected for decoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFile {
    /// File stem
    pub name: String,
    /// Extension with its leading dot, or empty
    pub extension: String,
    pub relative_path: PathBuf,
    pub policy_scope: PolicyScope,
    pub full_path: PathBuf,
    pub size: u64,
    /// Set for files found under `Scripts/<phase>/`
    pub script_phase: Option<ScriptPhase>,
}

impl PolicyFile {
    pub fn from_path(gpo_root: &Path, full_path: &Path, size: u64) -> Self {
        let relative_path = full_path
            .strip_prefix(gpo_root)
            .unwrap_or(full_path)
            .to_path_buf();
        let name = full_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = full_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Self {
            name,
            extension,
            policy_scope: PolicyScope::from_relative_path(&relative_path),
            relative_path,
            full_path: full_path.to_path_buf(),
            size,
            script_phase: None,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }
}

/// One `{GUID}` folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpoDirectory {
    /// Upper-cased, braces included
    pub guid: String,
    pub path: PathBuf,
    pub files: Vec<PolicyFile>,
}

/// Every GPO found for a domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPolicies {
    /// Lower-cased domain name
    pub domain: String,
    pub gpos: Vec<GpoDirectory>,
}

fn guid_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\{[0-9A-Fa-f-]{36}\}$").ok())
        .as_ref()
}

fn component_name(path: Option<&Path>) -> Option<String> {
    path.and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
}

/// Domain and GUID of a `<domain>/Policies/{GUID}` directory
fn gpo_location(dir: &Path) -> Option<(String, String)> {
    let guid = component_name(Some(dir))?;
    if !guid_pattern()?.is_match(&guid) {
        return None;
    }
    let policies = dir.parent()?;
    if !component_name(Some(policies))?.eq_ignore_ascii_case("policies") {
        return None;
    }
    let domain = component_name(policies.parent())?;
    Some((domain.to_lowercase(), guid.to_uppercase()))
}

/// Select the files of one GPO that the schema asks for
pub fn gpo_files(gpo_root: &Path, schema: &FileSchema) -> Vec<PolicyFile> {
    let mut files = Vec::new();

    for entry in WalkDir::new(gpo_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let lower_name = entry.file_name().to_string_lossy().to_lowercase();
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let parent = component_name(path.parent());
        let grandparent = component_name(path.parent().and_then(Path::parent));

        if schema.wants_file(&lower_name) {
            files.push(PolicyFile::from_path(gpo_root, path, size));
            continue;
        }

        if schema.wants_scripts() && grandparent.as_deref() == Some("Scripts") {
            if let Some(phase) = parent.as_deref().and_then(ScriptPhase::from_folder) {
                let mut file = PolicyFile::from_path(gpo_root, path, size);
                file.script_phase = Some(phase);
                files.push(file);
                continue;
            }
        }

        let in_applications = parent
            .as_deref()
            .map(|p| p.eq_ignore_ascii_case("applications"))
            .unwrap_or(false);
        let under_scope = grandparent
            .as_deref()
            .map(|g| g.eq_ignore_ascii_case("machine") || g.eq_ignore_ascii_case("user"))
            .unwrap_or(false);
        if schema.wants_aas() && lower_name.ends_with(".aas") && in_applications && under_scope {
            files.push(PolicyFile::from_path(gpo_root, path, size));
        }
    }

    files
}

/// Find every GPO below `root`, grouped by domain in discovery order
pub fn discover_store(root: &Path, schema: &FileSchema) -> Result<Vec<DomainPolicies>, DecodeError> {
    if !root.is_dir() {
        return Err(DecodeError::NotFound {
            path: root.to_path_buf(),
        });
    }

    let mut domains: IndexMap<String, Vec<GpoDirectory>> = IndexMap::new();

    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log_debug!("Skipping unreadable store entry", "error" => e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some((domain, guid)) = gpo_location(entry.path()) else {
            continue;
        };

        let files = gpo_files(entry.path(), schema);
        log_debug!("Found GPO", "domain" => domain, "guid" => guid, "files" => files.len());
        domains.entry(domain).or_default().push(GpoDirectory {
            guid,
            path: entry.path().to_path_buf(),
            files,
        });
        // The GPO folder has been enumerated already
        walker.skip_current_dir();
    }

    let total: usize = domains.values().map(Vec::len).sum();
    log_success!(
        codes::success::STORE_DISCOVERED,
        "Policy store discovered",
        "root" => root.display(),
        "domains" => domains.len(),
        "gpos" => total
    );

    Ok(domains
        .into_iter()
        .map(|(domain, gpos)| DomainPolicies { domain, gpos })
        .collect())
}
