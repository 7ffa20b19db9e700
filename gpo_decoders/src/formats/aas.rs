//! Application advertisement script decoder
//!
//! A script is a sequence of `(opcode: u8, arg_count: u8)` records followed by
//! their arguments. Each argument starts with a `u16` type word whose top two
//! bits select ASCII, integer, blob or UTF-16LE. UTF-16LE lengths count
//! characters.

use crate::config::compile_time::decoders::{MAX_AAS_ARGS_PER_RECORD, MAX_AAS_RECORDS};
use crate::config::schema::FileSchema;
use crate::error::DecodeError;
use crate::log_debug;
use crate::text::decode_utf16le_strict;
use crate::tree::{DecodedTree, Node, Tree};

const FORMAT: &str = "AAS";

pub const LABEL: &str = "Application Advertise Script";

const DATA_TYPE_NULL: u16 = 0x0000;
const DATA_TYPE_INT32: u16 = 0x4000;
const DATA_TYPE_NULL_ARG: u16 = 0x8000;
const DATA_TYPE_EXTENDED: u16 = 0xC000;
const DATA_CLASS_MASK: u16 = 0xC000;
const EXTENDED_UNICODE: u32 = 3;

pub const OPCODE_END: u8 = 3;
pub const OPCODE_PRODUCT_INFO: u8 = 4;
pub const OPCODE_SOURCE_LIST_PUBLISH: u8 = 9;

/// A decoded argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AasArg {
    Null,
    Int(i32),
    Text(String),
    Blob(Vec<u8>),
}

impl AasArg {
    fn to_node(&self) -> Node {
        match self {
            AasArg::Null => Node::Null,
            AasArg::Int(value) => Node::Int(i64::from(*value)),
            AasArg::Text(text) => Node::text(text.as_str()),
            AasArg::Blob(bytes) => Node::text(hex::encode(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AasRecord {
    pub opcode: u8,
    pub args: Vec<AasArg>,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.bytes.len() - self.pos < len {
            return Err(DecodeError::malformed(
                FORMAT,
                format!("unexpected end of script at offset {}", self.pos),
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn i32(&mut self) -> Result<i32, DecodeError> {
        let raw = self.take(4)?;
        Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// ASCII payload; invalid text degrades to a blob
    fn ascii(&mut self, len: usize, file_name: &str) -> Result<AasArg, DecodeError> {
        let raw = self.take(len)?;
        match std::str::from_utf8(raw) {
            Ok(text) => Ok(AasArg::Text(text.to_string())),
            Err(e) => {
                log_debug!("Undecodable AAS string, keeping hex", "file" => file_name, "error" => e);
                Ok(AasArg::Blob(raw.to_vec()))
            }
        }
    }

    fn utf16(&mut self, chars: usize, file_name: &str) -> Result<AasArg, DecodeError> {
        let len = chars.checked_mul(2).ok_or_else(|| {
            DecodeError::malformed(FORMAT, format!("string length {} overflows", chars))
        })?;
        let raw = self.take(len)?;
        match decode_utf16le_strict(raw) {
            Some(text) => Ok(AasArg::Text(text)),
            None => {
                log_debug!("Undecodable AAS UTF-16 string, keeping hex", "file" => file_name);
                Ok(AasArg::Blob(raw.to_vec()))
            }
        }
    }

    fn arg(&mut self, file_name: &str) -> Result<AasArg, DecodeError> {
        let dtype = self.u16()?;
        match dtype {
            DATA_TYPE_NULL | DATA_TYPE_NULL_ARG => Ok(AasArg::Null),
            DATA_TYPE_INT32 => Ok(AasArg::Int(self.i32()?)),
            DATA_TYPE_EXTENDED => {
                let extended = self.u32()?;
                let real_type = (extended >> 30) & 0x3;
                let len = (extended & 0x3FFF_FFFF) as usize;
                match real_type {
                    0 => self.ascii(len, file_name),
                    EXTENDED_UNICODE => self.utf16(len, file_name),
                    _ => Ok(AasArg::Blob(self.take(len)?.to_vec())),
                }
            }
            _ => {
                let len = (dtype & 0x3FFF) as usize;
                match dtype & DATA_CLASS_MASK {
                    DATA_TYPE_NULL => self.ascii(len, file_name),
                    DATA_TYPE_EXTENDED => self.utf16(len, file_name),
                    _ => Ok(AasArg::Blob(self.take(len)?.to_vec())),
                }
            }
        }
    }
}

/// Parse records up to and including the end opcode
pub fn parse_records(bytes: &[u8], file_name: &str) -> Result<Vec<AasRecord>, DecodeError> {
    let mut reader = Reader { bytes, pos: 0 };
    let mut records = Vec::new();

    loop {
        if records.len() >= MAX_AAS_RECORDS {
            return Err(DecodeError::Limit {
                format: FORMAT,
                what: format!("more than {} records", MAX_AAS_RECORDS),
            });
        }

        let opcode = reader.u8()?;
        let arg_count = reader.u8()? as usize;
        if arg_count > MAX_AAS_ARGS_PER_RECORD {
            return Err(DecodeError::Limit {
                format: FORMAT,
                what: format!("{} arguments in one record", arg_count),
            });
        }

        let args = (0..arg_count)
            .map(|_| reader.arg(file_name))
            .collect::<Result<Vec<_>, _>>()?;
        records.push(AasRecord { opcode, args });

        if opcode == OPCODE_END {
            break;
        }
    }

    Ok(records)
}

fn first_with_opcode(records: &[AasRecord], opcode: u8) -> Option<&AasRecord> {
    records.iter().find(|r| r.opcode == opcode)
}

fn arg_node(record: &AasRecord, index: usize) -> Node {
    record
        .args
        .get(index)
        .map(AasArg::to_node)
        .unwrap_or(Node::Null)
}

/// Decode into `{file_name: {Product Key, Product Name, Launch Path, Package Name}}`.
/// The label is attached by the caller, which groups every script of a scope.
pub fn decode(
    bytes: &[u8],
    file_name: &str,
    schema: &FileSchema,
) -> Result<Option<DecodedTree>, DecodeError> {
    if !schema.aas.include {
        return Ok(None);
    }

    let records = parse_records(bytes, file_name)?;
    let (Some(product), Some(source)) = (
        first_with_opcode(&records, OPCODE_PRODUCT_INFO),
        first_with_opcode(&records, OPCODE_SOURCE_LIST_PUBLISH),
    ) else {
        return Ok(None);
    };

    let raw = [
        ("Product Key", arg_node(product, 0)),
        ("Product Name", arg_node(product, 1)),
        ("Launch Path", arg_node(source, 8)),
        ("Package Name", arg_node(product, 2)),
    ];

    let mut output = Tree::new();
    for attribute in &schema.aas.attributes {
        if let Some((name, value)) = raw.iter().find(|(name, _)| *name == attribute.as_str()) {
            output.insert(name.to_string(), value.clone());
        }
    }

    Ok(Some(DecodedTree::new(file_name, Node::Tree(output))))
}
