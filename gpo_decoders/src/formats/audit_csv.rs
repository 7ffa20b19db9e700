//! Advanced audit policy (`audit.csv`) decoder

use crate::config::schema::FileSchema;
use crate::error::DecodeError;
use crate::log_debug;
use crate::text::decode_text;
use crate::tree::{DecodedTree, Node, Tree};

const FORMAT: &str = "CSV";

pub const LABEL: &str = "audit.csv";

/// Decode into `{"audit.csv": [row, ..]}`. The first row after the header is
/// a repeated label row and is skipped; a file without data rows decodes to
/// `{"audit.csv": null}`.
pub fn decode(bytes: &[u8], schema: &FileSchema) -> Result<Option<DecodedTree>, DecodeError> {
    let columns = &schema.csv.audit;
    if !columns.include {
        return Ok(None);
    }

    let text = decode_text(bytes).text;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| DecodeError::malformed(FORMAT, e.to_string()))?
        .clone();

    let mut records = reader.records();
    match records.next() {
        Some(Ok(_)) => {}
        Some(Err(e)) => return Err(DecodeError::malformed(FORMAT, e.to_string())),
        None => {
            log_debug!("Audit policy file has no data rows");
            return Ok(Some(DecodedTree::new(LABEL, Node::Null)));
        }
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| DecodeError::malformed(FORMAT, e.to_string()))?;
        let mut row = Tree::new();
        for column in &columns.attributes {
            let value = headers
                .iter()
                .position(|h| h == column.as_str())
                .and_then(|index| record.get(index));
            if let Some(value) = value {
                row.insert(column.clone(), Node::text(value));
            }
        }
        rows.push(Node::Tree(row));
    }

    Ok(Some(DecodedTree::new(LABEL, Node::List(rows))))
}
