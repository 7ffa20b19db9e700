//! `Registry.pol` decoder
//!
//! Body grammar after the 8-byte header, all delimiters UTF-16LE:
//! `[key;value;type;size;data]` where type and size are little-endian `u32`.

use crate::config::compile_time::decoders::MAX_POL_RECORDS;
use crate::config::schema::FileSchema;
use crate::error::DecodeError;
use crate::reg_types::RegistryType;
use crate::store::PolicyScope;
use crate::text::decode_utf16le;
use crate::tree::{DecodedTree, Node, Tree};

const FORMAT: &str = "POL";

/// `PReg` followed by version 1
pub const POL_MAGIC: [u8; 8] = [0x50, 0x52, 0x65, 0x67, 0x01, 0x00, 0x00, 0x00];

pub const LABEL: &str = "registry.pol";

const OPEN: [u8; 2] = [b'[', 0];
const CLOSE: [u8; 2] = [b']', 0];
const SEMICOLON: [u8; 2] = [b';', 0];

/// One raw record, before rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolRecord {
    pub key: String,
    pub value_name: String,
    pub reg_type: RegistryType,
    pub data: Vec<u8>,
}

impl PolRecord {
    /// Entry key used in the decoded tree
    pub fn entry_key(&self) -> String {
        format!("{}\\{}", self.key, self.value_name)
    }

    /// Render the data for its type
    pub fn render_data(&self) -> Node {
        render_data(self.reg_type, &self.data)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn eat(&mut self, delimiter: [u8; 2]) -> bool {
        if self.bytes[self.pos..].starts_with(&delimiter) {
            self.pos += 2;
            true
        } else {
            false
        }
    }

    /// UTF-16LE string up to the next `;` code unit, consuming the delimiter
    fn string_field(&mut self) -> Option<String> {
        let start = self.pos;
        let mut at = start;
        while at + 1 < self.bytes.len() {
            if self.bytes[at] == SEMICOLON[0] && self.bytes[at + 1] == SEMICOLON[1] {
                let text = decode_utf16le(&self.bytes[start..at]).replace('\0', "");
                self.pos = at + 2;
                return Some(text);
            }
            at += 2;
        }
        None
    }

    fn u32_field(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        self.pos += 4;
        Some(u32::from_le_bytes(raw))
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Some(slice)
    }
}

/// Parse every well-formed record. The loop stops at the first malformed
/// delimiter; records read before it are kept.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<PolRecord>, DecodeError> {
    if !bytes.starts_with(&POL_MAGIC) {
        return Err(DecodeError::malformed(FORMAT, "missing PReg header"));
    }

    let mut cursor = Cursor {
        bytes,
        pos: POL_MAGIC.len(),
    };
    let mut records = Vec::new();

    while cursor.remaining() >= 2 && cursor.eat(OPEN) {
        if records.len() >= MAX_POL_RECORDS {
            return Err(DecodeError::Limit {
                format: FORMAT,
                what: format!("more than {} records", MAX_POL_RECORDS),
            });
        }

        let Some(key) = cursor.string_field() else { break };
        let Some(value_name) = cursor.string_field() else { break };

        let Some(code) = cursor.u32_field() else { break };
        let reg_type = RegistryType::from_code(code)
            .ok_or_else(|| DecodeError::malformed(FORMAT, format!("unknown registry type {}", code)))?;
        if !cursor.eat(SEMICOLON) {
            break;
        }

        let Some(size) = cursor.u32_field() else { break };
        if !cursor.eat(SEMICOLON) {
            break;
        }

        let Some(data) = cursor.take(size as usize) else { break };

        records.push(PolRecord {
            key,
            value_name,
            reg_type,
            data: data.to_vec(),
        });

        if cursor.remaining() < 2 || !cursor.eat(CLOSE) {
            break;
        }
    }

    Ok(records)
}

fn little_endian_uint(data: &[u8]) -> u64 {
    data.iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

/// Hex rendering of the data read as one little-endian integer
fn little_endian_hex(data: &[u8]) -> String {
    let digits: String = data
        .iter()
        .rev()
        .skip_while(|byte| **byte == 0)
        .map(|byte| format!("{:02X}", byte))
        .collect();
    let digits = digits.trim_start_matches('0');
    format!("0x{:0>8}", digits)
}

/// Per-type string rendering of record data
pub fn render_data(reg_type: RegistryType, data: &[u8]) -> Node {
    match reg_type {
        RegistryType::Dword | RegistryType::Qword => {
            Node::text(little_endian_uint(data).to_string())
        }
        RegistryType::Sz | RegistryType::ExpandSz => {
            Node::text(decode_utf16le(data).replace('\0', ""))
        }
        RegistryType::MultiSz => {
            let text = decode_utf16le(data);
            let parts: Vec<&str> = text.split('\0').filter(|s| !s.is_empty()).collect();
            Node::text(parts.join(","))
        }
        RegistryType::None => Node::Null,
        _ => Node::text(little_endian_hex(data)),
    }
}

/// Hive implied by the scope of the file
pub fn hive_for_scope(scope: PolicyScope) -> &'static str {
    match scope {
        PolicyScope::User => "HKEY_CURRENT_USER",
        _ => "HKEY_LOCAL_MACHINE",
    }
}

/// Decode into `{"registry.pol": {"key\\value": {Hive, Type, Size, Data}}}`
pub fn decode(
    bytes: &[u8],
    scope: PolicyScope,
    schema: &FileSchema,
) -> Result<Option<DecodedTree>, DecodeError> {
    let records = parse_records(bytes)?;
    let hive = hive_for_scope(scope);
    let mut entries = Tree::new();

    for record in records {
        let Some(fields) = schema.pol.get(record.reg_type.as_str()) else {
            continue;
        };
        if !fields.include {
            continue;
        }

        let mut entry = Tree::new();
        for attribute in &fields.attributes {
            let value = match attribute.as_str() {
                "Hive" => Node::text(hive),
                "Type" => Node::text(record.reg_type.as_str()),
                "Size" => Node::text(record.data.len().to_string()),
                "Data" => record.render_data(),
                _ => continue,
            };
            entry.insert(attribute.clone(), value);
        }
        entries.insert(record.entry_key(), Node::Tree(entry));
    }

    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(DecodedTree::new(LABEL, Node::Tree(entries))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn utf16z(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for unit in s.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out.extend_from_slice(&[0, 0]);
        out
    }

    fn record(key: &str, value: &str, reg_type: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&OPEN);
        out.extend(utf16z(key));
        out.extend_from_slice(&SEMICOLON);
        out.extend(utf16z(value));
        out.extend_from_slice(&SEMICOLON);
        out.extend_from_slice(&reg_type.to_le_bytes());
        out.extend_from_slice(&SEMICOLON);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&SEMICOLON);
        out.extend_from_slice(data);
        out.extend_from_slice(&CLOSE);
        out
    }

    fn pol(records: &[Vec<u8>]) -> Vec<u8> {
        let mut out = POL_MAGIC.to_vec();
        for r in records {
            out.extend_from_slice(r);
        }
        out
    }

    fn schema() -> FileSchema {
        FileSchema::builtin().unwrap()
    }

    #[test]
    fn test_dword_renders_decimal() {
        let bytes = pol(&[record(
            "Software\\Policies\\Microsoft\\Windows NT\\Terminal Services",
            "fDenyTSConnections",
            4,
            &[0x01, 0x00, 0x00, 0x00],
        )]);
        let tree = decode(&bytes, PolicyScope::Machine, &schema()).unwrap().unwrap();
        let entry = tree
            .body
            .get("Software\\Policies\\Microsoft\\Windows NT\\Terminal Services\\fDenyTSConnections")
            .unwrap();
        assert_eq!(entry.get_str("Data"), Some("1"));
        assert_eq!(entry.get_str("Type"), Some("REG_DWORD"));
        assert_eq!(entry.get_str("Size"), Some("4"));
        assert_eq!(entry.get_str("Hive"), Some("HKEY_LOCAL_MACHINE"));
    }

    #[test]
    fn test_string_is_not_reversed() {
        let bytes = pol(&[record("Software\\ORL\\WinVNC3", "Name", 1, &utf16z("ABC"))]);
        let records = parse_records(&bytes).unwrap();
        assert_eq!(records[0].render_data(), Node::text("ABC"));
    }

    #[test]
    fn test_synthetic_record_round_trip() {
        let bytes = pol(&[
            record("Software\\A", "Path", 2, &utf16z("%SystemRoot%\\x")),
            record("Software\\A", "Big", 11, &5_000_000_000u64.to_le_bytes()),
            record("Software\\A", "Blob", 3, &[0xAB, 0xCD]),
        ]);
        let records = parse_records(&bytes).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].key, "Software\\A");
        assert_eq!(records[0].value_name, "Path");
        assert_eq!(records[0].reg_type, RegistryType::ExpandSz);
        assert_eq!(records[0].render_data(), Node::text("%SystemRoot%\\x"));
        assert_eq!(records[1].render_data(), Node::text("5000000000"));
        assert_eq!(records[2].render_data(), Node::text("0x0000CDAB"));
    }

    #[test]
    fn test_multi_sz_joins_with_commas() {
        let mut data = Vec::new();
        for part in ["one", "two"] {
            data.extend(utf16z(part));
        }
        data.extend_from_slice(&[0, 0]);
        assert_eq!(render_data(RegistryType::MultiSz, &data), Node::text("one,two"));
    }

    #[test]
    fn test_user_scope_uses_current_user_hive() {
        let bytes = pol(&[record("Software\\X", "**del.Y", 1, &utf16z(""))]);
        let tree = decode(&bytes, PolicyScope::User, &schema()).unwrap().unwrap();
        let entry = tree.body.get("Software\\X\\**del.Y").unwrap();
        assert_eq!(entry.get_str("Hive"), Some("HKEY_CURRENT_USER"));
    }

    #[test]
    fn test_reg_none_data_is_null() {
        assert_eq!(render_data(RegistryType::None, &[]), Node::Null);
    }

    #[test]
    fn test_truncated_body_keeps_earlier_records() {
        let mut bytes = pol(&[record("Software\\A", "One", 4, &[2, 0, 0, 0])]);
        bytes.extend_from_slice(&OPEN);
        bytes.extend(utf16z("Software\\B"));
        let records = parse_records(&bytes).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_bad_header_is_malformed() {
        assert_matches!(
            decode(b"PReg\x02\x00\x00\x00", PolicyScope::Machine, &schema()),
            Err(DecodeError::Malformed { .. })
        );
    }

    #[test]
    fn test_empty_body_is_no_data() {
        assert_matches!(decode(&POL_MAGIC, PolicyScope::Machine, &schema()), Ok(None));
    }
}
