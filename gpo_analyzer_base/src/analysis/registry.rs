//! Sensitive registry value findings

use super::credentials::decrypt_vnc_password;
use crate::normalize::{CanonicalRegistryOperation, RegistryAction};
use crate::results::{EnrichmentProperty, Finding, FindingCategory, FindingDetail, RegistryFinding};
use crate::rules::{Decryption, RegistryRule};
use gpo_decoders::{log_debug, PolicyScope};

fn finding(scope: PolicyScope, rule: &RegistryRule, record: &CanonicalRegistryOperation) -> Finding {
    let regkey = record.full_key();
    let mut vnc_password = None;
    let mut property_value = Some(record.data.clone());

    if rule.decrypt == Some(Decryption::Vnc) {
        property_value = None;
        if !record.data.is_empty() {
            match decrypt_vnc_password(&record.data) {
                Ok(password) => {
                    property_value = Some(password.clone());
                    vnc_password = Some(password);
                }
                Err(e) => {
                    log_debug!("VNC password could not be decrypted", "regkey" => regkey, "error" => e);
                }
            }
        }
    }

    let property = rule
        .property
        .clone()
        .zip(property_value)
        .map(|(name, value)| EnrichmentProperty { name, value });

    let mut references = rule.references.clone();
    references.sort();
    references.dedup();

    Finding {
        category: FindingCategory::Registry,
        scope,
        narrative: rule.narrative.clone(),
        references,
        graph_edge_hint: None,
        extra: FindingDetail::Registry(RegistryFinding {
            rule: rule.name.clone(),
            regkey,
            value: record.data.clone(),
            vnc_password,
            property,
        }),
    }
}

/// Deleted values configure nothing and are not matched
pub fn analyze_registry(
    scope: PolicyScope,
    records: &[CanonicalRegistryOperation],
    rules: &[RegistryRule],
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for rule in rules {
        for record in records {
            if record.action == RegistryAction::Delete || !rule.condition.matches(record) {
                continue;
            }
            findings.push(finding(scope, rule, record));
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;
    use assert_matches::assert_matches;
    use cbc::cipher::block_padding::NoPadding;
    use cbc::cipher::{BlockEncryptMut, KeyIvInit};
    use gpo_decoders::RegistryType;

    fn record(key: &str, data_type: RegistryType, data: &str) -> CanonicalRegistryOperation {
        CanonicalRegistryOperation {
            hive: "HKEY_LOCAL_MACHINE".to_string(),
            key: key.to_string(),
            data_type,
            data: data.to_string(),
            action: RegistryAction::Update,
        }
    }

    fn vnc_hex(plaintext: &str) -> String {
        let mut buffer = [0u8; 8];
        buffer[..plaintext.len()].copy_from_slice(plaintext.as_bytes());
        let key = hex::decode(super::super::credentials::VNC_DES_KEY_HEX).unwrap();
        let ciphertext = cbc::Encryptor::<des::Des>::new_from_slices(&key, &[0u8; 8])
            .unwrap()
            .encrypt_padded_mut::<NoPadding>(&mut buffer, 8)
            .unwrap();
        hex::encode_upper(ciphertext)
    }

    #[test]
    fn test_vnc_password_is_recovered() {
        let rules = RuleSet::builtin().unwrap();
        let records = [record(
            "SOFTWARE\\RealVNC\\vncserver\\Password",
            RegistryType::Binary,
            &vnc_hex("s3cret"),
        )];

        let findings = analyze_registry(PolicyScope::Machine, &records, &rules.registry);
        assert_eq!(findings.len(), 1);
        assert_matches!(&findings[0].extra, FindingDetail::Registry(r) => {
            assert_eq!(r.vnc_password.as_deref(), Some("s3cret"));
            assert_eq!(r.property.as_ref().map(|p| p.value.as_str()), Some("s3cret"));
            assert_eq!(r.regkey, "HKEY_LOCAL_MACHINE\\SOFTWARE\\RealVNC\\vncserver\\Password");
        });
    }

    #[test]
    fn test_undecryptable_vnc_value_keeps_base_finding() {
        let rules = RuleSet::builtin().unwrap();
        let records = [record(
            "SOFTWARE\\TightVNC\\Server\\Password",
            RegistryType::Binary,
            "ABCDEF",
        )];

        let findings = analyze_registry(PolicyScope::Machine, &records, &rules.registry);
        assert_eq!(findings.len(), 1);
        assert_matches!(&findings[0].extra, FindingDetail::Registry(r) => {
            assert!(r.vnc_password.is_none());
            assert!(r.property.is_none());
            assert_eq!(r.value, "ABCDEF");
        });
    }

    #[test]
    fn test_threshold_and_deletes() {
        let rules = RuleSet::builtin().unwrap();
        let lm = "System\\CurrentControlSet\\Control\\Lsa\\LmCompatibilityLevel";
        let mut deleted = record(lm, RegistryType::Dword, "0");
        deleted.action = RegistryAction::Delete;
        let records = [
            record(lm, RegistryType::Dword, "3"),
            record(lm, RegistryType::Dword, "2"),
            deleted,
        ];

        let findings = analyze_registry(PolicyScope::Machine, &records, &rules.registry);
        assert_eq!(findings.len(), 1);
        assert_matches!(&findings[0].extra, FindingDetail::Registry(r) if r.value == "2");
    }
}
