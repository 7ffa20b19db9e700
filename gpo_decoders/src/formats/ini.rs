//! INI decoders: `GPT.ini`, `Scripts.ini` and `PSscripts.ini`

use crate::config::schema::FileSchema;
use crate::error::DecodeError;
use crate::text::decode_text;
use crate::tree::{DecodedTree, Node, Tree};
use indexmap::IndexMap;

const FORMAT: &str = "INI";

pub const GPT_LABEL: &str = "GPT.ini";
pub const SCRIPTS_LABEL: &str = "Scripts.ini";
pub const PSSCRIPTS_LABEL: &str = "PSscripts.ini";

const SCRIPT_SECTIONS: [&str; 4] = ["Startup", "Shutdown", "Logon", "Logoff"];
const SCRIPTS_CONFIG: &str = "ScriptsConfig";
const SCRIPTS_CONFIG_KEYS: [&str; 2] = ["startexecutepsfirst", "endexecutepsfirst"];

/// Parsed INI content: section name to lower-cased keys and values, in file order
#[derive(Debug, Default)]
pub struct IniDocument {
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Self {
        let mut doc = IniDocument::default();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let line = line.trim().trim_start_matches('\u{feff}');
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim().to_string();
                doc.sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            // Lines before the first section header carry no meaning
            let Some(section) = current.as_ref() else { continue };
            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (line, ""),
            };
            if let Some(entries) = doc.sections.get_mut(section) {
                entries.insert(key.to_lowercase(), value.to_string());
            }
        }
        doc
    }

    pub fn section(&self, name: &str) -> Option<&IndexMap<String, String>> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&String, &IndexMap<String, String>)> {
        self.sections.iter()
    }
}

fn parse_bytes(bytes: &[u8]) -> Result<IniDocument, DecodeError> {
    let decoded = decode_text(bytes);
    if decoded.had_errors && decoded.text.trim().is_empty() {
        return Err(DecodeError::Encoding { format: FORMAT });
    }
    Ok(IniDocument::parse(&decoded.text))
}

/// `GPT.ini`: whitelisted keys of whitelisted sections
pub fn decode_gpt(bytes: &[u8], schema: &FileSchema) -> Result<Option<DecodedTree>, DecodeError> {
    let doc = parse_bytes(bytes)?;
    let mut output = Tree::new();

    for (section_name, fields) in &schema.ini.gpt {
        if !fields.include {
            continue;
        }
        let Some(entries) = doc.section(section_name) else {
            continue;
        };
        let mut section = Tree::new();
        for attribute in &fields.attributes {
            if let Some(value) = entries.get(&attribute.to_lowercase()) {
                section.insert(attribute.clone(), Node::text(value.as_str()));
            }
        }
        output.insert(section_name.clone(), Node::Tree(section));
    }

    Ok(Some(DecodedTree::new(GPT_LABEL, Node::Tree(output))))
}

fn index_order(index: &str) -> (u8, u64, String) {
    match index.parse::<u64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, index.to_string()),
    }
}

/// Command pairs of one script section ordered by numeric index. A pair
/// missing either half is dropped.
fn script_commands(entries: &IndexMap<String, String>) -> Node {
    let mut commands: Vec<(String, &str, &str)> = Vec::new();

    for (key, cmdline) in entries {
        let Some(index) = key.strip_suffix("cmdline") else {
            continue;
        };
        let Some(parameters) = entries.get(&format!("{}parameters", index)) else {
            continue;
        };
        commands.push((index.to_string(), cmdline.as_str(), parameters.as_str()));
    }

    commands.sort_by_key(|(index, _, _)| index_order(index));

    Node::List(
        commands
            .into_iter()
            .map(|(index, cmdline, parameters)| {
                let mut command = Tree::new();
                command.insert("index".to_string(), Node::text(index));
                command.insert("CmdLine".to_string(), Node::text(cmdline));
                command.insert("Parameters".to_string(), Node::text(parameters));
                Node::Tree(command)
            })
            .collect(),
    )
}

fn decode_script_dialect(bytes: &[u8], powershell: bool) -> Result<Option<DecodedTree>, DecodeError> {
    let doc = parse_bytes(bytes)?;
    let mut output = Tree::new();

    for (name, entries) in doc.sections() {
        if SCRIPT_SECTIONS.contains(&name.as_str()) {
            output.insert(name.clone(), script_commands(entries));
        } else if powershell && name == SCRIPTS_CONFIG {
            let mut settings = Tree::new();
            for key in SCRIPTS_CONFIG_KEYS {
                if let Some(value) = entries.get(key) {
                    settings.insert(key.to_string(), Node::Bool(value.eq_ignore_ascii_case("true")));
                }
            }
            if !settings.is_empty() {
                output.insert(name.clone(), Node::Tree(settings));
            }
        }
    }

    let label = if powershell { PSSCRIPTS_LABEL } else { SCRIPTS_LABEL };
    Ok(Some(DecodedTree::new(label, Node::Tree(output))))
}

pub fn decode_scripts(bytes: &[u8]) -> Result<Option<DecodedTree>, DecodeError> {
    decode_script_dialect(bytes, false)
}

pub fn decode_psscripts(bytes: &[u8]) -> Result<Option<DecodedTree>, DecodeError> {
    decode_script_dialect(bytes, true)
}

/// Dispatch on the lower-cased file name. Any other INI file is not decoded.
pub fn decode(
    bytes: &[u8],
    lower_file_name: &str,
    schema: &FileSchema,
) -> Result<Option<DecodedTree>, DecodeError> {
    match lower_file_name {
        "gpt.ini" => decode_gpt(bytes, schema),
        "scripts.ini" => decode_scripts(bytes),
        "psscripts.ini" => decode_psscripts(bytes),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn utf16le_bom(s: &str) -> Vec<u8> {
        let mut out = vec![0xFF, 0xFE];
        for unit in s.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_single_complete_pair() {
        let bytes = utf16le_bom("\r\n[Logon]\r\n1CmdLine=foo.bat\r\n1Parameters=/q\r\n");
        let tree = decode_scripts(&bytes).unwrap().unwrap();
        assert_eq!(tree.label, "Scripts.ini");

        let logon = tree.body.get("Logon").unwrap();
        let expected: Node = serde_json::from_value(serde_json::json!([
            {"index": "1", "CmdLine": "foo.bat", "Parameters": "/q"}
        ]))
        .unwrap();
        assert_eq!(logon, &expected);
    }

    #[test]
    fn test_commands_sorted_numerically_and_halves_dropped() {
        let text = "[Startup]\n10CmdLine=ten.cmd\n10Parameters=\n2CmdLine=two.cmd\n2Parameters=-x\n3CmdLine=orphan.cmd\n";
        let tree = decode_scripts(text.as_bytes()).unwrap().unwrap();
        let startup = tree.body.get("Startup").unwrap().items();
        let indexes: Vec<&str> = startup.iter().filter_map(|c| c.get_str("index")).collect();
        assert_eq!(indexes, vec!["2", "10"]);
    }

    #[test]
    fn test_unknown_sections_discarded() {
        let text = "[Logon]\n0CmdLine=a\n0Parameters=b\n[Random]\n0CmdLine=c\n0Parameters=d\n";
        let tree = decode_scripts(text.as_bytes()).unwrap().unwrap();
        assert!(tree.body.get("Random").is_none());
    }

    #[test]
    fn test_psscripts_config_booleans() {
        let text = "[ScriptsConfig]\nStartExecutePSFirst=TRUE\nEndExecutePSFirst=false\n[Logoff]\n0CmdLine=x.ps1\n0Parameters=\n";
        let tree = decode_psscripts(text.as_bytes()).unwrap().unwrap();
        assert_eq!(tree.label, "PSscripts.ini");
        let config = tree.body.get("ScriptsConfig").unwrap();
        assert_eq!(config.get("startexecutepsfirst"), Some(&Node::Bool(true)));
        assert_eq!(config.get("endexecutepsfirst"), Some(&Node::Bool(false)));
        assert_eq!(tree.body.get("Logoff").unwrap().items().len(), 1);
    }

    #[test]
    fn test_gpt_whitelist() {
        let schema = FileSchema::builtin().unwrap();
        let text = "; comment\n[General]\nversion=65537\ndisplayName=Default Domain Policy\ngPCMachineExtensionNames=[{x}]\n";
        let tree = decode(text.as_bytes(), "gpt.ini", &schema).unwrap().unwrap();
        let general = tree.body.get("General").unwrap();
        assert_eq!(general.get_str("Version"), Some("65537"));
        assert_eq!(general.get_str("displayName"), Some("Default Domain Policy"));
        assert!(general.get("gPCMachineExtensionNames").is_none());
    }

    #[test]
    fn test_other_ini_files_are_ignored() {
        let schema = FileSchema::builtin().unwrap();
        assert_matches!(decode(b"[a]\nb=c\n", "desktop.ini", &schema), Ok(None));
    }
}
