//! # Credential Recovery
//!
//! Group Policy Preference passwords (`cpassword`) are AES-256-CBC encrypted
//! with a key Microsoft published. VNC passwords stored in the registry are
//! DES-CBC encrypted with the key every VNC server ships with.

use crate::api::CryptoError;
use crate::results::{CredentialFinding, Finding, FindingCategory, FindingDetail};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use gpo_decoders::logging::codes;
use gpo_decoders::tree::find_keys;
use gpo_decoders::{log_debug, log_success, Node, PolicyScope, Tree};

/// Field holding an encrypted preference password
pub const CPASSWORD_FIELD: &str = "cpassword";

/// AES-256 key from MS-GPPREF 2.2.1.1.4
pub const GPP_AES_KEY_HEX: &str = "4e9906e8fcb66cc9faf49310620ffee8f496e806cc057990209b09a433b66c1b";

/// DES key shared by RealVNC, TightVNC and TigerVNC
pub const VNC_DES_KEY_HEX: &str = "e84ad660c4721ae0";

pub const GPP_NARRATIVE: &str =
    "A Group Policy Preference item stores a password encrypted with a publicly known key.";

pub const GPP_REFERENCES: [&str; 2] = [
    "https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-gppref/2c15cbf0-f086-4c74-8b70-1f2fa45dd4be",
    "https://support.microsoft.com/en-us/topic/ms14-025-vulnerability-in-group-policy-preferences-could-allow-elevation-of-privilege-may-13-2014-60734e15-af79-26ca-ea53-8cd617073c30",
];

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type DesCbcDec = cbc::Decryptor<des::Des>;

/// Decrypt a `cpassword` value into its plaintext
pub fn decrypt_gpp_password(cpassword: &str) -> Result<String, CryptoError> {
    let mut encoded = cpassword.trim().to_string();
    while encoded.len() % 4 != 0 {
        encoded.push('=');
    }
    let mut buffer = STANDARD.decode(encoded.as_bytes())?;
    if buffer.is_empty() || buffer.len() % 16 != 0 {
        return Err(CryptoError::Length { len: buffer.len() });
    }

    let key = hex::decode(GPP_AES_KEY_HEX)?;
    let iv = [0u8; 16];
    let plaintext = Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|_| CryptoError::KeyLength)?
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| CryptoError::Unpad)?;

    utf16le_to_string(plaintext)
}

fn utf16le_to_string(bytes: &[u8]) -> Result<String, CryptoError> {
    if bytes.len() % 2 != 0 {
        return Err(CryptoError::Utf16);
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| CryptoError::Utf16)
}

/// Ciphertext bytes of a registry value.
///
/// Values from `Registry.xml` are plain hex. Values from `registry.pol` are
/// rendered as a little-endian `0x` number, so their bytes come back reversed
/// and without the high zero bytes.
pub fn vnc_ciphertext(value: &str) -> Result<Vec<u8>, CryptoError> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) => {
            let width = digits.len().div_ceil(16).max(1) * 16;
            let padded = format!("{:0>width$}", digits, width = width);
            let mut bytes = hex::decode(padded)?;
            bytes.reverse();
            Ok(bytes)
        }
        None => Ok(hex::decode(value)?),
    }
}

/// Decrypt a VNC password stored as hex
pub fn decrypt_vnc_password(value: &str) -> Result<String, CryptoError> {
    let mut buffer = vnc_ciphertext(value)?;
    if buffer.is_empty() || buffer.len() % 8 != 0 {
        return Err(CryptoError::Length { len: buffer.len() });
    }

    let key = hex::decode(VNC_DES_KEY_HEX)?;
    let iv = [0u8; 8];
    let plaintext = DesCbcDec::new_from_slices(&key, &iv)
        .map_err(|_| CryptoError::KeyLength)?
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| CryptoError::Unpad)?;

    let end = plaintext
        .iter()
        .rposition(|b| *b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    Ok(String::from_utf8(plaintext[..end].to_vec())?)
}

fn scope_of(path: &[String]) -> PolicyScope {
    match path.first().map(String::as_str) {
        Some("Machine") => PolicyScope::Machine,
        Some("User") => PolicyScope::User,
        _ => PolicyScope::None,
    }
}

/// Every `cpassword` in the decoded settings of a GPO, decrypted where possible
pub fn find_gpp_passwords(settings: &Tree) -> Vec<Finding> {
    find_keys(settings, CPASSWORD_FIELD)
        .into_iter()
        .filter_map(|found| {
            let Node::Text(encrypted) = found.value else {
                return None;
            };
            if encrypted.trim().is_empty() {
                return None;
            }
            let path = found.path.join("/");

            let decrypted = match decrypt_gpp_password(encrypted) {
                Ok(plaintext) => {
                    log_success!(
                        codes::success::CREDENTIAL_RECOVERED,
                        "Preference password recovered",
                        "path" => path
                    );
                    Some(plaintext)
                }
                Err(e) => {
                    log_debug!("Preference password could not be decrypted", "path" => path, "error" => e);
                    None
                }
            };

            let mut references: Vec<String> = GPP_REFERENCES.iter().map(|r| r.to_string()).collect();
            references.sort();
            Some(Finding {
                category: FindingCategory::CredentialLeak,
                scope: scope_of(&found.path),
                narrative: GPP_NARRATIVE.to_string(),
                references,
                graph_edge_hint: None,
                extra: FindingDetail::Credential(CredentialFinding {
                    path,
                    encrypted: encrypted.clone(),
                    decrypted,
                }),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cbc::cipher::BlockEncryptMut;

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
    type DesCbcEnc = cbc::Encryptor<des::Des>;

    fn encrypt_gpp(plaintext: &str) -> String {
        let bytes: Vec<u8> = plaintext.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let mut buffer = vec![0u8; (bytes.len() / 16 + 1) * 16];
        buffer[..bytes.len()].copy_from_slice(&bytes);
        let key = hex::decode(GPP_AES_KEY_HEX).unwrap();
        let ciphertext = Aes256CbcEnc::new_from_slices(&key, &[0u8; 16])
            .unwrap()
            .encrypt_padded_mut::<Pkcs7>(&mut buffer, bytes.len())
            .unwrap();
        STANDARD.encode(ciphertext).trim_end_matches('=').to_string()
    }

    fn encrypt_vnc(plaintext: &str) -> Vec<u8> {
        let mut buffer = [0u8; 8];
        buffer[..plaintext.len()].copy_from_slice(plaintext.as_bytes());
        let key = hex::decode(VNC_DES_KEY_HEX).unwrap();
        DesCbcEnc::new_from_slices(&key, &[0u8; 8])
            .unwrap()
            .encrypt_padded_mut::<NoPadding>(&mut buffer, 8)
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_gpp_round_trip_without_padding_characters() {
        let cpassword = encrypt_gpp("Sup3r$ecret!");
        assert_eq!(decrypt_gpp_password(&cpassword).unwrap(), "Sup3r$ecret!");
    }

    #[test]
    fn test_gpp_published_sample() {
        assert_eq!(
            decrypt_gpp_password("j1Uyj3Vx8TY9LtLZil2uAuZkFQA/4latT76ZwgdHdhw").unwrap(),
            "Local*P4ssword!"
        );
    }

    #[test]
    fn test_gpp_failures() {
        assert_matches!(decrypt_gpp_password("!!!"), Err(CryptoError::Base64(_)));
        assert_matches!(decrypt_gpp_password("AAAA"), Err(CryptoError::Length { len: 3 }));
    }

    #[test]
    fn test_vnc_round_trip() {
        let ciphertext = encrypt_vnc("vncpass");
        assert_eq!(decrypt_vnc_password(&hex::encode_upper(&ciphertext)).unwrap(), "vncpass");

        let mut reversed = ciphertext.clone();
        reversed.reverse();
        let pol_rendering = format!("0x{}", hex::encode(&reversed));
        assert_eq!(decrypt_vnc_password(&pol_rendering).unwrap(), "vncpass");
    }

    #[test]
    fn test_vnc_rejects_partial_blocks() {
        assert_matches!(decrypt_vnc_password("A1B2C3"), Err(CryptoError::Length { len: 3 }));
        assert_matches!(decrypt_vnc_password("zz"), Err(CryptoError::Hex(_)));
    }

    #[test]
    fn test_find_gpp_passwords_keeps_undecryptable_values() {
        let good = encrypt_gpp("P@ss");
        let settings: Tree = serde_json::from_value(serde_json::json!({
            "Machine": {"Groups.xml": {"User": [
                {"Properties": {"userName": "svc", "cpassword": good}},
                {"Properties": {"userName": "old", "cpassword": "AAAA"}},
                {"Properties": {"userName": "blank", "cpassword": ""}}
            ]}}
        }))
        .unwrap();

        let findings = find_gpp_passwords(&settings);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].scope, PolicyScope::Machine);
        assert_matches!(
            &findings[0].extra,
            FindingDetail::Credential(c) if c.decrypted.as_deref() == Some("P@ss")
                && c.path == "Machine/Groups.xml/User/0/Properties/cpassword"
        );
        assert_matches!(&findings[1].extra, FindingDetail::Credential(c) if c.decrypted.is_none());
    }
}
