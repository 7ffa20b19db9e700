//! Per-file decode dispatch and per-GPO settings assembly

use crate::config::runtime::DecoderPreferences;
use crate::config::schema::FileSchema;
use crate::error::DecodeError;
use crate::formats::{self, aas, audit_csv, inf, ini, pol, xml, FileFormat};
use crate::logging::{self, codes};
use crate::store::{GpoDirectory, PolicyFile, PolicyScope, ScriptPhase};
use crate::text::decode_text;
use crate::tree::{DecodedTree, Node, Tree};
use crate::{log_debug, log_error, log_success};
use serde::Serialize;

/// Key of the security template inside the Machine map
pub const SECURITY_TEMPLATE: &str = "GptTmpl.inf";

/// Result of decoding one [`PolicyFile`]
#[derive(Debug)]
pub enum DecodeOutcome {
    Decoded(DecodedTree),
    /// The schema excludes the file, or it holds nothing worth keeping
    NoData,
    Failed(DecodeError),
}

impl DecodeOutcome {
    pub fn is_decoded(&self) -> bool {
        matches!(self, DecodeOutcome::Decoded(_))
    }
}

impl From<Result<Option<DecodedTree>, DecodeError>> for DecodeOutcome {
    fn from(result: Result<Option<DecodedTree>, DecodeError>) -> Self {
        match result {
            Ok(Some(tree)) => DecodeOutcome::Decoded(tree),
            Ok(None) => DecodeOutcome::NoData,
            Err(e) => DecodeOutcome::Failed(e),
        }
    }
}

fn script_tree(file: &PolicyFile, phase: ScriptPhase, bytes: &[u8], prefs: &DecoderPreferences) -> DecodedTree {
    let mut body = Tree::new();
    body.insert(
        "file".to_string(),
        Node::text(file.relative_path.to_string_lossy().replace('\\', "/")),
    );
    if prefs.retain_script_content {
        body.insert("content".to_string(), Node::text(decode_text(bytes).text));
    }
    DecodedTree::new(phase.as_str(), Node::Tree(body))
}

fn decode_bytes(
    file: &PolicyFile,
    bytes: &[u8],
    schema: &FileSchema,
    prefs: &DecoderPreferences,
) -> Result<Option<DecodedTree>, DecodeError> {
    if let Some(phase) = file.script_phase {
        return Ok(Some(script_tree(file, phase, bytes, prefs)));
    }

    let file_name = file.file_name();
    match FileFormat::from_extension(&file.extension) {
        Some(FileFormat::Xml) => xml::decode(bytes, &file_name, schema),
        Some(FileFormat::Pol) => pol::decode(bytes, file.policy_scope, schema),
        Some(FileFormat::Inf) => inf::decode(bytes, &file.name, schema),
        Some(FileFormat::Ini) => ini::decode(bytes, &file_name.to_lowercase(), schema),
        Some(FileFormat::Csv) => audit_csv::decode(bytes, schema),
        Some(FileFormat::Aas) => aas::decode(bytes, &file_name, schema),
        None => Ok(None),
    }
}

/// Decode with default preferences
pub fn decode_policy_file(file: &PolicyFile, schema: &FileSchema) -> DecodeOutcome {
    decode_policy_file_with(file, schema, &DecoderPreferences::default(), 0)
}

/// Read and decode one file. Failures are logged against the file and never
/// propagate further.
pub fn decode_policy_file_with(
    file: &PolicyFile,
    schema: &FileSchema,
    prefs: &DecoderPreferences,
    file_id: usize,
) -> DecodeOutcome {
    logging::with_file_context(file.full_path.clone(), file_id, || {
        let outcome: DecodeOutcome = formats::read_policy_bytes(&file.full_path)
            .and_then(|bytes| decode_bytes(file, &bytes, schema, prefs))
            .into();

        match &outcome {
            DecodeOutcome::Decoded(tree) => {
                log_success!(
                    codes::success::FILE_DECODED,
                    "Policy file decoded",
                    "file" => file.relative_path.display(),
                    "label" => tree.label
                );
            }
            DecodeOutcome::NoData => {
                if prefs.log_excluded_files {
                    log_debug!("Policy file yielded no data", "file" => file.relative_path.display());
                }
            }
            DecodeOutcome::Failed(e) => {
                log_error!(
                    e.log_code(),
                    "Failed to decode policy file",
                    "file" => file.full_path.display(),
                    "error" => e
                );
            }
        }
        outcome
    })
}

/// Decoded settings of one GPO, keyed by decoder label within each scope
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpoSettings {
    pub machine: Tree,
    pub user: Tree,
    /// Files outside both scopes, such as `GPT.ini`
    pub root: Tree,
}

impl GpoSettings {
    pub fn scope(&self, scope: PolicyScope) -> &Tree {
        match scope {
            PolicyScope::Machine => &self.machine,
            PolicyScope::User => &self.user,
            PolicyScope::None => &self.root,
        }
    }

    fn scope_mut(&mut self, scope: PolicyScope) -> &mut Tree {
        match scope {
            PolicyScope::Machine => &mut self.machine,
            PolicyScope::User => &mut self.user,
            PolicyScope::None => &mut self.root,
        }
    }

    /// Place a decoded tree in its scope. Advertisement scripts are grouped
    /// under one label; several scripts of one phase become a list.
    pub fn insert(&mut self, scope: PolicyScope, file: &PolicyFile, tree: DecodedTree) {
        let target = self.scope_mut(scope);

        if file.script_phase.is_some() {
            match target.get_mut(&tree.label) {
                Some(Node::List(items)) => items.push(tree.body),
                Some(existing) => {
                    let first = std::mem::replace(existing, Node::Null);
                    *existing = Node::List(vec![first, tree.body]);
                }
                None => {
                    target.insert(tree.label, tree.body);
                }
            }
            return;
        }

        if FileFormat::from_extension(&file.extension) == Some(FileFormat::Aas) {
            let group = target
                .entry(aas::LABEL.to_string())
                .or_insert_with(Node::empty_tree);
            if let Some(group) = group.as_tree_mut() {
                group.insert(tree.label, tree.body);
            }
            return;
        }

        target.insert(tree.label, tree.body);
    }

    pub fn is_empty(&self) -> bool {
        self.machine.is_empty() && self.user.is_empty() && self.root.is_empty()
    }

    /// `{"Machine": .., "User": .., <root entries>}`; empty scopes are omitted
    pub fn to_tree(&self) -> Tree {
        let mut tree = Tree::new();
        if !self.machine.is_empty() {
            tree.insert("Machine".to_string(), Node::Tree(self.machine.clone()));
        }
        if !self.user.is_empty() {
            tree.insert("User".to_string(), Node::Tree(self.user.clone()));
        }
        for (key, value) in &self.root {
            tree.insert(key.clone(), value.clone());
        }
        tree
    }

    /// Machine map with the sections of the security template lifted to the
    /// top level, the shape the normalizers read
    pub fn machine_with_template_sections(&self) -> Tree {
        let mut machine = Tree::new();
        for (key, value) in &self.machine {
            if key == SECURITY_TEMPLATE {
                if let Some(sections) = value.as_tree() {
                    for (section, rows) in sections {
                        machine.insert(section.clone(), rows.clone());
                    }
                }
                continue;
            }
            machine.insert(key.clone(), value.clone());
        }
        machine
    }

    /// Scope map as read by the normalizers
    pub fn normalizer_view(&self, scope: PolicyScope) -> Tree {
        match scope {
            PolicyScope::Machine => self.machine_with_template_sections(),
            other => self.scope(other).clone(),
        }
    }
}

/// Decoded GPO plus per-file accounting
#[derive(Debug, Clone, Serialize)]
pub struct DecodedGpo {
    pub guid: String,
    pub settings: GpoSettings,
    pub decoded_files: usize,
    pub empty_files: usize,
    pub failed_files: usize,
}

pub fn decode_gpo(gpo: &GpoDirectory, schema: &FileSchema) -> DecodedGpo {
    decode_gpo_with(gpo, schema, &DecoderPreferences::default())
}

/// Decode every selected file of a GPO. A file that fails contributes nothing.
pub fn decode_gpo_with(gpo: &GpoDirectory, schema: &FileSchema, prefs: &DecoderPreferences) -> DecodedGpo {
    let mut decoded = DecodedGpo {
        guid: gpo.guid.clone(),
        settings: GpoSettings::default(),
        decoded_files: 0,
        empty_files: 0,
        failed_files: 0,
    };

    for (file_id, file) in gpo.files.iter().enumerate() {
        match decode_policy_file_with(file, schema, prefs, file_id) {
            DecodeOutcome::Decoded(tree) => {
                decoded.settings.insert(file.policy_scope, file, tree);
                decoded.decoded_files += 1;
            }
            DecodeOutcome::NoData => decoded.empty_files += 1,
            DecodeOutcome::Failed(_) => decoded.failed_files += 1,
        }
    }

    log_success!(
        codes::success::GPO_DECODED,
        "GPO decoded",
        "guid" => gpo.guid,
        "decoded" => decoded.decoded_files,
        "failed" => decoded.failed_files
    );
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::discover_store;
    use assert_matches::assert_matches;
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, bytes: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn pol_with_dword(key: &str, value: &str, data: u32) -> Vec<u8> {
        let mut out = pol::POL_MAGIC.to_vec();
        let utf16 = |s: &str| -> Vec<u8> {
            let mut v: Vec<u8> = s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
            v.extend_from_slice(&[0, 0]);
            v
        };
        let sep = [b';', 0];
        out.extend_from_slice(&[b'[', 0]);
        out.extend(utf16(key));
        out.extend_from_slice(&sep);
        out.extend(utf16(value));
        out.extend_from_slice(&sep);
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&sep);
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&sep);
        out.extend_from_slice(&data.to_le_bytes());
        out.extend_from_slice(&[b']', 0]);
        out
    }

    fn sample_store() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let gpo = dir
            .path()
            .join("corp.local/Policies/{6AC1786C-016F-11D2-945F-00C04FB984F9}");
        write(&gpo.join("GPT.INI"), b"[General]\r\nVersion=7\r\n");
        write(
            &gpo.join("Machine/Registry.pol"),
            &pol_with_dword("Software\\Policies\\X", "Enabled", 1),
        );
        write(
            &gpo.join("Machine/Microsoft/Windows NT/SecEdit/GptTmpl.inf"),
            b"[Privilege Rights]\r\nSeDebugPrivilege = *S-1-5-32-544\r\n",
        );
        write(&gpo.join("User/Scripts/Logon/a.bat"), b"net use");
        write(&gpo.join("User/Scripts/Logon/b.bat"), b"echo");
        write(&gpo.join("Machine/Preferences/Groups/Groups.xml"), b"<Groups><broken");
        dir
    }

    #[test]
    fn test_decode_gpo_assembles_scopes() {
        let dir = sample_store();
        let schema = FileSchema::builtin().unwrap();
        let domains = discover_store(dir.path(), &schema).unwrap();
        let prefs = DecoderPreferences::default().with_script_content(true);
        let decoded = decode_gpo_with(&domains[0].gpos[0], &schema, &prefs);

        assert_eq!(decoded.failed_files, 1);
        assert_eq!(decoded.decoded_files, 5);

        let settings = &decoded.settings;
        assert!(settings.root.contains_key("GPT.ini"));
        let pol_entry = settings.machine["registry.pol"].get("Software\\Policies\\X\\Enabled").unwrap();
        assert_eq!(pol_entry.get_str("Data"), Some("1"));

        let logon = settings.user["Logon"].items();
        assert_eq!(logon.len(), 2);
        assert_eq!(logon[0].get_str("file"), Some("User/Scripts/Logon/a.bat"));
        assert_eq!(logon[0].get_str("content"), Some("net use"));
        assert!(!settings.machine.contains_key("Groups.xml"));
    }

    #[test]
    fn test_template_sections_hoisted() {
        let dir = sample_store();
        let schema = FileSchema::builtin().unwrap();
        let domains = discover_store(dir.path(), &schema).unwrap();
        let decoded = decode_gpo(&domains[0].gpos[0], &schema);

        let view = decoded.settings.normalizer_view(PolicyScope::Machine);
        assert!(view.contains_key("Privilege Rights"));
        assert!(!view.contains_key(SECURITY_TEMPLATE));
        assert!(view.contains_key("registry.pol"));

        let tree = decoded.settings.to_tree();
        let keys: Vec<&String> = tree.keys().collect();
        assert_eq!(keys, vec!["Machine", "User", "GPT.ini"]);
    }

    #[test]
    fn test_missing_file_is_failure_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let file = PolicyFile::from_path(dir.path(), &dir.path().join("Machine/Registry.pol"), 0);
        let schema = FileSchema::builtin().unwrap();
        assert_matches!(
            decode_policy_file(&file, &schema),
            DecodeOutcome::Failed(DecodeError::NotFound { .. })
        );
    }

    #[test]
    fn test_unknown_extension_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();
        let file = PolicyFile::from_path(dir.path(), &path, 5);
        let schema = FileSchema::builtin().unwrap();
        assert_matches!(decode_policy_file(&file, &schema), DecodeOutcome::NoData);
    }
}
