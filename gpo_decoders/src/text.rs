//! Text encoding detection for policy files
//!
//! Policy text files are written either as UTF-16LE (usually with a BOM) or as
//! UTF-8 (with or without BOM). Malformed sequences are replaced, not rejected.

use encoding_rs::{Encoding, UTF_16LE, UTF_8};

/// Encoding that was detected for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// Decoded text plus what was detected
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: DetectedEncoding,
    pub had_errors: bool,
}

pub fn detect_encoding(bytes: &[u8]) -> (DetectedEncoding, usize) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let detected = if encoding == UTF_16LE {
            DetectedEncoding::Utf16Le
        } else if encoding == UTF_8 {
            DetectedEncoding::Utf8
        } else {
            DetectedEncoding::Utf16Be
        };
        return (detected, bom_len);
    }

    // BOM-less UTF-16LE: ASCII text has a NUL in every odd position
    if bytes.len() >= 2 && bytes[0] != 0 && bytes[1] == 0 {
        return (DetectedEncoding::Utf16Le, 0);
    }

    (DetectedEncoding::Utf8, 0)
}

pub fn decode_text(bytes: &[u8]) -> DecodedText {
    let (detected, bom_len) = detect_encoding(bytes);
    let body = &bytes[bom_len..];
    let encoding = match detected {
        DetectedEncoding::Utf8 => UTF_8,
        DetectedEncoding::Utf16Le => UTF_16LE,
        DetectedEncoding::Utf16Be => encoding_rs::UTF_16BE,
    };
    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    DecodedText {
        text: text.into_owned(),
        encoding: detected,
        had_errors,
    }
}

/// Decode UTF-16LE bytes, replacing invalid sequences
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let (text, _) = UTF_16LE.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Strict UTF-16LE decode; `None` on odd length or unpaired surrogates
pub fn decode_utf16le_strict(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str, bom: bool) -> Vec<u8> {
        let mut out = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
        for unit in s.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_utf16le_with_bom() {
        let decoded = decode_text(&utf16le("[Logon]\r\n", true));
        assert_eq!(decoded.encoding, DetectedEncoding::Utf16Le);
        assert_eq!(decoded.text, "[Logon]\r\n");
    }

    #[test]
    fn test_utf16le_without_bom() {
        let decoded = decode_text(&utf16le("[Unicode]", false));
        assert_eq!(decoded.encoding, DetectedEncoding::Utf16Le);
        assert_eq!(decoded.text, "[Unicode]");
    }

    #[test]
    fn test_utf8_with_and_without_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("[General]".as_bytes());
        assert_eq!(decode_text(&bytes).text, "[General]");
        assert_eq!(decode_text(b"[General]").encoding, DetectedEncoding::Utf8);
    }

    #[test]
    fn test_strict_decode_rejects_odd_length() {
        assert_eq!(decode_utf16le_strict(&[0x41]), None);
        assert_eq!(decode_utf16le_strict(&[0x41, 0x00]), Some("A".to_string()));
    }
}
