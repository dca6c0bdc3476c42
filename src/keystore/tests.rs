use super::*;
use crate::algorithm::Purposes;
use crate::keys::{TransparentPrivateKey, TransparentSecretKey};

const RSA_KEY_1: &[u8] = include_bytes!("../../tests/data/rsa_key_1.pk8");
const RSA_USER_1: &[u8] = include_bytes!("../../tests/data/rsa_user_1.der");
const RSA_CA_1: &[u8] = include_bytes!("../../tests/data/rsa_ca_1.der");
const EC_KEY_1: &[u8] = include_bytes!("../../tests/data/ec_key_1.pk8");
const EC_USER_1: &[u8] = include_bytes!("../../tests/data/ec_user_1.der");
const EC_CA_1: &[u8] = include_bytes!("../../tests/data/ec_ca_1.der");

fn loaded_keystore() -> Keystore {
    let mut keystore = KeystoreService::default().keystore();
    keystore.load(None, None).unwrap();
    keystore
}

fn cert(der: &[u8]) -> Certificate {
    Certificate::from_der(der).unwrap()
}

fn rsa_private_entry() -> Entry {
    let key = TransparentPrivateKey::from_pkcs8_der(RSA_KEY_1).unwrap();
    PrivateKeyEntry::new(key, vec![cert(RSA_USER_1), cert(RSA_CA_1)])
        .unwrap()
        .into()
}

fn ec_private_entry() -> Entry {
    let key = TransparentPrivateKey::from_pkcs8_der(EC_KEY_1).unwrap();
    PrivateKeyEntry::new(key, vec![cert(EC_USER_1), cert(EC_CA_1)])
        .unwrap()
        .into()
}

fn aes_protection() -> KeyProtection {
    KeyProtection::builder(Purposes::ENCRYPT | Purposes::DECRYPT)
        .block_modes(&["GCM"])
        .build()
        .unwrap()
}

#[test]
fn test_operations_before_load_fail() {
    let keystore = KeystoreService::default().keystore();
    for result in [
        keystore.aliases().map(|_| ()),
        keystore.size().map(|_| ()),
        keystore.contains_alias("a").map(|_| ()),
        keystore.delete_entry("a"),
    ] {
        let err = result.unwrap_err();
        assert_eq!(err.error_code(), error_codes::STORE_NOT_LOADED);
    }
}

#[test]
fn test_load_rejects_stream_and_password() {
    let mut keystore = KeystoreService::default().keystore();
    let err = keystore.load(None, Some(b"secret")).unwrap_err();
    assert_eq!(err.error_code(), error_codes::STORE_LOAD_REJECTED);

    let mut stream: &[u8] = b"blob";
    let err = keystore.load(Some(&mut stream), None).unwrap_err();
    assert!(matches!(err, KeystoreError::StoreState { .. }));
    assert!(!keystore.is_loaded());

    keystore.load(None, None).unwrap();
    assert!(keystore.is_loaded());
}

#[test]
fn test_store_unsupported() {
    let keystore = loaded_keystore();
    let mut out = Vec::new();
    let err = keystore.store(&mut out, None).unwrap_err();
    assert!(matches!(err, KeystoreError::UnsupportedOperation { .. }));
    assert!(out.is_empty());
}

#[test]
fn test_delete_is_idempotent() {
    let keystore = loaded_keystore();
    keystore.delete_entry("test1").unwrap();
    keystore.set_certificate_entry("test1", &cert(RSA_CA_1)).unwrap();
    keystore.delete_entry("test1").unwrap();
    keystore.delete_entry("test1").unwrap();
    assert!(!keystore.contains_alias("test1").unwrap());
    assert!(keystore.get_entry("test1", None).unwrap().is_none());
}

#[test]
fn test_private_key_entry_queries() {
    let keystore = loaded_keystore();
    keystore.set_entry("rsa", rsa_private_entry(), None).unwrap();

    assert!(keystore.is_key_entry("rsa").unwrap());
    assert!(!keystore.is_certificate_entry("rsa").unwrap());
    assert_eq!(keystore.get_certificate("rsa").unwrap(), Some(cert(RSA_USER_1)));
    assert_eq!(
        keystore.get_certificate_chain("rsa").unwrap(),
        Some(vec![cert(RSA_USER_1), cert(RSA_CA_1)])
    );
    assert!(keystore.get_creation_date("rsa").unwrap().is_some());

    let key = keystore.get_key("rsa", None).unwrap().unwrap();
    assert_eq!(key.alias(), "rsa");
    assert!(key.is_private());
    assert_eq!(key.key_info().origin(), KeyOrigin::Imported);
    // Legacy import without protection is unrestricted
    assert_eq!(key.key_info().purposes(), Purposes::all());
    assert!(!key.key_info().is_randomized_encryption_required());
}

#[test]
fn test_trusted_certificate_queries() {
    let keystore = loaded_keystore();
    keystore.set_certificate_entry("ca", &cert(RSA_CA_1)).unwrap();

    assert!(keystore.is_certificate_entry("ca").unwrap());
    assert!(!keystore.is_key_entry("ca").unwrap());
    assert_eq!(keystore.get_certificate("ca").unwrap(), Some(cert(RSA_CA_1)));
    assert_eq!(keystore.get_certificate_chain("ca").unwrap(), None);
    assert_eq!(keystore.get_key("ca", None).unwrap(), None);
}

#[test]
fn test_get_entry_returns_opaque_key() {
    let keystore = loaded_keystore();
    keystore.set_entry("ec", ec_private_entry(), None).unwrap();

    match keystore.get_entry("ec", None).unwrap() {
        Some(Entry::PrivateKey(entry)) => {
            let key = entry.private_key().as_opaque().unwrap();
            assert_eq!(key.algorithm(), KeyAlgorithm::Ec);
            assert_eq!(entry.certificate(), &cert(EC_USER_1));
            assert_eq!(entry.certificate_chain().len(), 2);
        }
        other => panic!("unexpected entry {:?}", other),
    }
}

#[test]
fn test_password_arguments_rejected() {
    let keystore = loaded_keystore();
    keystore.set_entry("rsa", rsa_private_entry(), None).unwrap();

    let err = keystore.get_key("rsa", Some(b"pw")).unwrap_err();
    assert_eq!(err.error_code(), error_codes::PASSWORD_PROTECTION_UNSUPPORTED);
    assert!(keystore.get_entry("rsa", Some(b"pw")).is_err());

    let key = TransparentPrivateKey::from_pkcs8_der(EC_KEY_1).unwrap();
    let err = keystore
        .set_key_entry("ec", key, Some(b"pw"), &[cert(EC_USER_1)])
        .unwrap_err();
    assert!(matches!(err, KeystoreError::StoreState { .. }));
    assert!(!keystore.contains_alias("ec").unwrap());
}

#[test]
fn test_kind_changing_replacement() {
    let keystore = loaded_keystore();

    keystore
        .set_entry("alias", TrustedCertificateEntry::new(cert(RSA_CA_1)).into(), None)
        .unwrap();
    keystore.set_entry("alias", rsa_private_entry(), None).unwrap();
    assert!(keystore.is_key_entry("alias").unwrap());
    assert_eq!(keystore.size().unwrap(), 1);

    keystore
        .set_entry("alias", TrustedCertificateEntry::new(cert(EC_CA_1)).into(), None)
        .unwrap();
    assert!(keystore.is_certificate_entry("alias").unwrap());
    assert_eq!(keystore.size().unwrap(), 1);
}

#[test]
fn test_set_certificate_entry_cannot_demote_key() {
    let keystore = loaded_keystore();
    keystore.set_entry("rsa", rsa_private_entry(), None).unwrap();

    let err = keystore.set_certificate_entry("rsa", &cert(RSA_CA_1)).unwrap_err();
    assert_eq!(err.error_code(), error_codes::ENTRY_KIND_CONFLICT);
    assert!(keystore.is_key_entry("rsa").unwrap());
}

#[test]
fn test_set_key_entry_checks_leaf() {
    let keystore = loaded_keystore();
    let key = TransparentPrivateKey::from_pkcs8_der(RSA_KEY_1).unwrap();

    // CA certificate does not certify the user key
    let err = keystore
        .set_key_entry("rsa", key.clone(), None, &[cert(RSA_CA_1)])
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::INVALID_CHAIN);

    let err = keystore.set_key_entry("rsa", key.clone(), None, &[]).unwrap_err();
    assert_eq!(err.error_code(), error_codes::INVALID_CHAIN);
    assert!(!keystore.contains_alias("rsa").unwrap());

    keystore
        .set_key_entry("rsa", key, None, &[cert(RSA_USER_1), cert(RSA_CA_1)])
        .unwrap();
    assert!(keystore.is_key_entry("rsa").unwrap());
}

#[test]
fn test_replaced_chain_same_key() {
    let keystore = loaded_keystore();
    keystore.set_entry("rsa", rsa_private_entry(), None).unwrap();
    let key = keystore.get_key("rsa", None).unwrap().unwrap();

    keystore
        .set_key_entry("rsa", key.clone(), None, &[cert(RSA_USER_1)])
        .unwrap();
    assert_eq!(
        keystore.get_certificate_chain("rsa").unwrap(),
        Some(vec![cert(RSA_USER_1)])
    );
    // The handle still refers to the stored key
    assert_eq!(keystore.get_key("rsa", None).unwrap(), Some(key));
}

#[test]
fn test_replaced_chain_different_key_rejected() {
    let keystore = loaded_keystore();
    keystore.set_entry("rsa", rsa_private_entry(), None).unwrap();
    keystore.set_entry("ec", ec_private_entry(), None).unwrap();
    let ec_key = keystore.get_key("ec", None).unwrap().unwrap();

    let err = keystore
        .set_key_entry("rsa", ec_key, None, &[cert(EC_USER_1)])
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::KEY_ALIAS_MISMATCH);
    assert_eq!(keystore.get_certificate("rsa").unwrap(), Some(cert(RSA_USER_1)));
}

#[test]
fn test_replaced_with_same_entry() {
    let keystore = loaded_keystore();
    keystore.set_entry("ec", ec_private_entry(), None).unwrap();
    let entry = keystore.get_entry("ec", None).unwrap().unwrap();

    keystore.set_entry("ec", entry.clone(), None).unwrap();
    assert_eq!(keystore.get_entry("ec", None).unwrap(), Some(entry));
}

#[test]
fn test_secret_key_requires_protection() {
    let keystore = loaded_keystore();
    let aes = TransparentSecretKey::new(&[0x11; 16], "AES").unwrap();

    let err = keystore
        .set_entry("aes", SecretKeyEntry::new(aes.clone()).unwrap().into(), None)
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::PROTECTION_REQUIRED);

    let err = keystore.set_key_entry("aes", aes.clone(), None, &[]).unwrap_err();
    assert!(matches!(err, KeystoreError::StoreState { .. }));

    keystore
        .set_entry("aes", SecretKeyEntry::new(aes).unwrap().into(), Some(&aes_protection()))
        .unwrap();
    let key = keystore.get_key("aes", None).unwrap().unwrap();
    assert!(key.is_secret());
    assert_eq!(key.key_size(), 128);
    assert!(keystore.get_certificate("aes").unwrap().is_none());
}

#[test]
fn test_failed_secret_import_leaves_no_entry() {
    let keystore = loaded_keystore();

    let short = TransparentSecretKey::new(&[0x11; 15], "AES").unwrap();
    let err = keystore
        .set_entry("aes", SecretKeyEntry::new(short).unwrap().into(), Some(&aes_protection()))
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::UNSUPPORTED_KEY_SIZE);
    assert!(!keystore.contains_alias("aes").unwrap());

    let empty = TransparentSecretKey::new(&[], "HmacSHA256").unwrap();
    let protection = KeyProtection::builder(Purposes::SIGN).build().unwrap();
    let err = keystore
        .set_entry("hmac", SecretKeyEntry::new(empty).unwrap().into(), Some(&protection))
        .unwrap_err();
    assert!(matches!(err, KeystoreError::InvalidParameter { .. }));
    assert!(!keystore.contains_alias("hmac").unwrap());
}

#[test]
fn test_failed_import_keeps_previous_entry() {
    let keystore = loaded_keystore();
    keystore.set_certificate_entry("slot", &cert(RSA_CA_1)).unwrap();

    let hmac = TransparentSecretKey::new(&[1; 32], "HmacSHA256").unwrap();
    let protection = KeyProtection::builder(Purposes::SIGN)
        .digests(&["SHA-256", "SHA-512"])
        .build()
        .unwrap();
    assert!(keystore
        .set_entry("slot", SecretKeyEntry::new(hmac).unwrap().into(), Some(&protection))
        .is_err());
    assert_eq!(keystore.get_certificate("slot").unwrap(), Some(cert(RSA_CA_1)));
}

#[test]
fn test_certificate_alias_prefers_trusted_entry() {
    let keystore = loaded_keystore();
    keystore.set_entry("key", rsa_private_entry(), None).unwrap();
    assert_eq!(
        keystore.get_certificate_alias(&cert(RSA_USER_1)).unwrap(),
        Some("key".to_string())
    );

    keystore.set_certificate_entry("trusted", &cert(RSA_USER_1)).unwrap();
    assert_eq!(
        keystore.get_certificate_alias(&cert(RSA_USER_1)).unwrap(),
        Some("trusted".to_string())
    );

    // Non-leaf chain members are not matched
    keystore.delete_entry("trusted").unwrap();
    assert_eq!(keystore.get_certificate_alias(&cert(RSA_CA_1)).unwrap(), None);
}

#[test]
fn test_aliases_snapshot_and_restart() {
    let keystore = loaded_keystore();
    for i in 0..5 {
        keystore
            .set_certificate_entry(&format!("cert{}", i), &cert(RSA_CA_1))
            .unwrap();
    }
    let mut aliases = keystore.aliases().unwrap();
    assert_eq!(aliases.len(), 5);

    keystore.delete_entry("cert0").unwrap();
    let mut seen: Vec<String> = aliases.by_ref().collect();
    seen.sort();
    assert_eq!(seen, vec!["cert0", "cert1", "cert2", "cert3", "cert4"]);

    aliases.restart();
    assert_eq!(aliases.count(), 5);
    assert_eq!(keystore.aliases().unwrap().count(), 4);
}

#[test]
fn test_handles_share_namespace() {
    let service = KeystoreService::default();
    let mut first = service.keystore();
    let mut second = service.keystore();
    first.load(None, None).unwrap();
    second.load(None, None).unwrap();

    first.set_certificate_entry("shared", &cert(EC_CA_1)).unwrap();
    assert!(second.contains_alias("shared").unwrap());
}

#[test]
fn test_deleted_key_handle_is_invalid() {
    let keystore = loaded_keystore();
    keystore.set_entry("rsa", rsa_private_entry(), None).unwrap();
    let key = keystore.get_key("rsa", None).unwrap().unwrap();
    assert!(key.resolve("test").is_ok());

    keystore.delete_entry("rsa").unwrap();
    let err = key.resolve("test").unwrap_err();
    assert_eq!(err.error_code(), error_codes::KEY_NOT_FOUND);

    // Re-importing under the same alias creates a different key
    keystore.set_entry("rsa", rsa_private_entry(), None).unwrap();
    assert!(key.resolve("test").is_err());
}

#[test]
fn test_capacity_limit() {
    let config = KeystoreConfig {
        max_entries: Some(2),
        ..KeystoreConfig::default()
    };
    let mut keystore = KeystoreService::new(config).unwrap().keystore();
    keystore.load(None, None).unwrap();

    keystore.set_certificate_entry("a", &cert(RSA_CA_1)).unwrap();
    keystore.set_certificate_entry("b", &cert(RSA_CA_1)).unwrap();
    let err = keystore.set_certificate_entry("c", &cert(RSA_CA_1)).unwrap_err();
    assert_eq!(err.error_code(), error_codes::CAPACITY_EXCEEDED);

    // Replacing an existing alias is still allowed
    keystore.set_certificate_entry("a", &cert(EC_CA_1)).unwrap();
}

#[test]
fn test_encryption_required_needs_lock_screen() {
    let keystore = loaded_keystore();
    let protection = KeyProtection::builder(Purposes::SIGN | Purposes::VERIFY)
        .digests(&["SHA-256"])
        .encryption_required(true)
        .build()
        .unwrap();
    let key = TransparentPrivateKey::from_pkcs8_der(EC_KEY_1).unwrap();
    let entry = PrivateKeyEntry::new(key, vec![cert(EC_USER_1)]).unwrap();

    let err = keystore
        .set_entry("ec", entry.clone().into(), Some(&protection))
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::ENCRYPTED_STORAGE_UNAVAILABLE);

    let config = KeystoreConfig {
        lock_screen_configured: true,
        ..KeystoreConfig::default()
    };
    let mut unlocked = KeystoreService::new(config).unwrap().keystore();
    unlocked.load(None, None).unwrap();
    unlocked.set_entry("ec", entry.into(), Some(&protection)).unwrap();
}

#[test]
fn test_private_key_entry_validation() {
    let ec_key = TransparentPrivateKey::from_pkcs8_der(EC_KEY_1).unwrap();
    assert!(PrivateKeyEntry::new(ec_key.clone(), vec![]).is_err());
    assert!(PrivateKeyEntry::new(ec_key, vec![cert(RSA_USER_1)]).is_err());

    let secret = TransparentSecretKey::new(&[0; 16], "AES").unwrap();
    assert!(PrivateKeyEntry::new(secret, vec![cert(RSA_USER_1)]).is_err());

    let private = TransparentPrivateKey::from_pkcs8_der(RSA_KEY_1).unwrap();
    assert!(SecretKeyEntry::new(private).is_err());
}
