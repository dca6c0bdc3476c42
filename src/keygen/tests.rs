use super::*;
use chrono::{TimeZone, Utc};
use rsa::traits::PublicKeyParts;

use crate::algorithm::Purposes;
use crate::config::KeystoreConfig;
use crate::error::{error_codes, KeystoreError};
use crate::keys::{EcCurve, KeyOrigin, PublicKey};
use crate::keystore::{Keystore, KeystoreService};
use crate::operation::{Cipher, CipherMode, Mac, Signature};
use crate::utils::CountingRng;

fn service_and_keystore() -> (KeystoreService, Keystore) {
    let service = KeystoreService::default();
    let mut keystore = service.keystore();
    keystore.load(None, None).unwrap();
    (service, keystore)
}

fn signing_spec(alias: &str) -> KeyGenParameterSpecBuilder {
    KeyGenParameterSpec::builder(alias, Purposes::SIGN | Purposes::VERIFY)
        .digests(&["SHA-256", "NONE"])
        .signature_paddings(&["PKCS1"])
}

#[test]
fn test_generate_rsa_pair_with_default_certificate() {
    let (service, keystore) = service_and_keystore();
    let mut generator = KeyPairGenerator::get_instance(&service, "RSA").unwrap();
    generator
        .initialize(signing_spec("rsa").key_size(512).build().unwrap())
        .unwrap();
    let pair = generator.generate_key_pair().unwrap();

    assert_eq!(pair.public.key_size(), 512);
    assert_eq!(pair.private.algorithm(), crate::algorithm::KeyAlgorithm::Rsa);
    assert_eq!(pair.private.key_info().origin(), KeyOrigin::Generated);
    match &pair.public {
        PublicKey::Rsa(key) => assert_eq!(key.e(), &rsa::BigUint::from(65_537u32)),
        other => panic!("unexpected public key {:?}", other),
    }

    let certificate = keystore.get_certificate("rsa").unwrap().unwrap();
    assert_eq!(certificate.public_key().unwrap(), pair.public);
    assert!(certificate.verify_signed_by(&pair.public).unwrap());
    assert_eq!(certificate.subject().unwrap(), "CN=fake");
    assert_eq!(certificate.issuer().unwrap(), "CN=fake");
    assert_eq!(certificate.serial_number().unwrap(), vec![1]);
    assert_eq!(certificate.not_before().unwrap().timestamp(), 0);
    assert_eq!(
        certificate.not_after().unwrap(),
        Utc.with_ymd_and_hms(2048, 1, 1, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_generated_certificate_fields_from_spec() {
    let (service, keystore) = service_and_keystore();
    let not_before = Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap();
    let not_after = Utc.with_ymd_and_hms(2060, 6, 1, 12, 0, 0).unwrap();
    let spec = signing_spec("ec")
        .ec_curve("secp256r1")
        .certificate_subject("CN=test1,O=keystore")
        .certificate_serial_number(0x1234_5678)
        .certificate_not_before(not_before)
        .certificate_not_after(not_after)
        .build()
        .unwrap();
    let mut generator = KeyPairGenerator::get_instance(&service, "EC").unwrap();
    generator.initialize(spec).unwrap();
    let pair = generator.generate_key_pair().unwrap();

    let certificate = keystore.get_certificate("ec").unwrap().unwrap();
    assert!(certificate.verify_signed_by(&pair.public).unwrap());
    assert_eq!(certificate.subject().unwrap(), "CN=test1,O=keystore");
    assert_eq!(certificate.serial_number().unwrap(), vec![0x12, 0x34, 0x56, 0x78]);
    assert_eq!(certificate.not_before().unwrap(), not_before);
    // Past 2049 the validity is encoded as GeneralizedTime
    assert_eq!(certificate.not_after().unwrap(), not_after);
}

#[test]
fn test_generated_keys_sign_within_authorizations() {
    let (service, _keystore) = service_and_keystore();
    let mut generator = KeyPairGenerator::get_instance(&service, "EC").unwrap();
    generator.initialize(signing_spec("ec").key_size(256).build().unwrap()).unwrap();
    let pair = generator.generate_key_pair().unwrap();

    let mut signer = Signature::get_instance("SHA256withECDSA").unwrap();
    signer.init_sign(&pair.private).unwrap();
    signer.update(b"payload").unwrap();
    let signature = signer.sign().unwrap();

    let mut verifier = Signature::get_instance("SHA256withECDSA").unwrap();
    verifier.init_verify(&pair.public).unwrap();
    verifier.update(b"payload").unwrap();
    assert!(verifier.verify(&signature).unwrap());

    let mut denied = Signature::get_instance("SHA512withECDSA").unwrap();
    let err = denied.init_sign(&pair.private).unwrap_err();
    assert_eq!(err.error_code(), error_codes::DIGEST_NOT_AUTHORIZED);
}

#[test]
fn test_every_curve_by_size_and_name() {
    let (service, _keystore) = service_and_keystore();
    let mut generator = KeyPairGenerator::get_instance(&service, "EC").unwrap();
    for (bits, name, curve) in [
        (224, "P-224", EcCurve::P224),
        (256, "prime256v1", EcCurve::P256),
        (384, "secp384r1", EcCurve::P384),
        (521, "P-521", EcCurve::P521),
    ] {
        generator
            .initialize(signing_spec("by-size").key_size(bits).build().unwrap())
            .unwrap();
        assert_eq!(generator.generate_key_pair().unwrap().public.key_size(), bits);

        generator
            .initialize(signing_spec("by-name").ec_curve(name).build().unwrap())
            .unwrap();
        let pair = generator.generate_key_pair().unwrap();
        match pair.public {
            PublicKey::Ec(key) => assert_eq!(key.curve(), curve),
            other => panic!("unexpected public key {:?}", other),
        }
    }
}

#[test]
fn test_ec_size_errors_surface_at_initialize() {
    let (service, _keystore) = service_and_keystore();
    let mut generator = KeyPairGenerator::get_instance(&service, "EC").unwrap();

    let err = generator
        .initialize(signing_spec("ec").key_size(200).build().unwrap())
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::UNSUPPORTED_KEY_SIZE);
    assert!(matches!(err, KeystoreError::InvalidParameter { .. }));

    let conflicting = signing_spec("ec").ec_curve("P-256").key_size(384).build().unwrap();
    assert!(matches!(
        generator.initialize(conflicting).unwrap_err(),
        KeystoreError::InvalidParameter { .. }
    ));

    // The failed initialize left nothing to generate from
    let err = generator.generate_key_pair().unwrap_err();
    assert_eq!(err.error_code(), error_codes::NOT_INITIALIZED);
    assert!(matches!(err, KeystoreError::IllegalState { .. }));
}

#[test]
fn test_unknown_curve_name_rejected_by_builder() {
    let err = signing_spec("ec").ec_curve("secp256k1").build().unwrap_err();
    assert_eq!(err.error_code(), error_codes::UNRECOGNIZED_NAME);
}

#[test]
fn test_rsa_size_bounds() {
    let (service, _keystore) = service_and_keystore();
    let mut generator = KeyPairGenerator::get_instance(&service, "RSA").unwrap();
    for bits in [256, 504, 1004, 8200] {
        let err = generator
            .initialize(signing_spec("rsa").key_size(bits).build().unwrap())
            .unwrap_err();
        assert_eq!(err.error_code(), error_codes::UNSUPPORTED_KEY_SIZE, "{} bits", bits);
    }
    let with_curve = signing_spec("rsa").ec_curve("P-256").build().unwrap();
    assert!(generator.initialize(with_curve).is_err());
}

#[test]
fn test_rsa_public_exponent_override() {
    let (service, _keystore) = service_and_keystore();
    let mut generator = KeyPairGenerator::get_instance(&service, "RSA").unwrap();
    generator
        .initialize(signing_spec("rsa").key_size(512).rsa_public_exponent(3).build().unwrap())
        .unwrap();
    match generator.generate_key_pair().unwrap().public {
        PublicKey::Rsa(key) => assert_eq!(key.e(), &rsa::BigUint::from(3u32)),
        other => panic!("unexpected public key {:?}", other),
    }

    assert!(signing_spec("rsa").rsa_public_exponent(4).build().is_err());
    assert!(signing_spec("rsa").rsa_public_exponent(1).build().is_err());
}

#[test]
fn test_key_pair_entropy_matches_key_size() {
    let (service, _keystore) = service_and_keystore();
    for (algorithm, bits, expected) in [("RSA", 512, 64), ("RSA", 1024, 128), ("EC", 256, 32), ("EC", 521, 66)] {
        let mut generator = KeyPairGenerator::get_instance(&service, algorithm).unwrap();
        let rng = CountingRng::os();
        let counter = rng.counter();
        generator
            .initialize_with_random(signing_spec("counted").key_size(bits).build().unwrap(), Box::new(rng))
            .unwrap();
        assert_eq!(counter.bytes_drawn(), 0);
        generator.generate_key_pair().unwrap();
        assert_eq!(counter.bytes_drawn(), expected, "{} {}", algorithm, bits);
    }
}

#[test]
fn test_generation_replaces_only_its_alias() {
    let (service, keystore) = service_and_keystore();
    let mut generator = KeyPairGenerator::get_instance(&service, "EC").unwrap();
    generator.initialize(signing_spec("other").build().unwrap()).unwrap();
    let other = generator.generate_key_pair().unwrap();

    generator.initialize(signing_spec("target").build().unwrap()).unwrap();
    let first = generator.generate_key_pair().unwrap();
    let second = generator.generate_key_pair().unwrap();
    assert_ne!(first.public, second.public);
    assert_eq!(keystore.size().unwrap(), 2);

    let stored = keystore.get_certificate("target").unwrap().unwrap();
    assert_eq!(stored.public_key().unwrap(), second.public);
    let untouched = keystore.get_certificate("other").unwrap().unwrap();
    assert_eq!(untouched.public_key().unwrap(), other.public);

    // The replaced key can no longer start operations
    let mut signer = Signature::get_instance("SHA256withECDSA").unwrap();
    let err = signer.init_sign(&first.private).unwrap_err();
    assert_eq!(err.error_code(), error_codes::KEY_NOT_FOUND);
    signer.init_sign(&second.private).unwrap();
}

#[test]
fn test_encryption_required_needs_lock_screen() {
    let (service, keystore) = service_and_keystore();
    let mut generator = KeyPairGenerator::get_instance(&service, "EC").unwrap();
    generator
        .initialize(signing_spec("locked").encryption_required(true).build().unwrap())
        .unwrap();
    let err = generator.generate_key_pair().unwrap_err();
    assert_eq!(err.error_code(), error_codes::ENCRYPTED_STORAGE_UNAVAILABLE);
    assert!(!keystore.contains_alias("locked").unwrap());

    let config = KeystoreConfig {
        lock_screen_configured: true,
        ..KeystoreConfig::default()
    };
    let secured = KeystoreService::new(config).unwrap();
    let mut generator = KeyPairGenerator::get_instance(&secured, "EC").unwrap();
    generator
        .initialize(signing_spec("locked").encryption_required(true).build().unwrap())
        .unwrap();
    generator.generate_key_pair().unwrap();
}

#[test]
fn test_generate_aes_key() {
    let (service, keystore) = service_and_keystore();
    let mut generator = KeyGenerator::get_instance(&service, "AES").unwrap();
    let spec = KeyGenParameterSpec::builder("aes", Purposes::ENCRYPT | Purposes::DECRYPT)
        .block_modes(&["GCM"])
        .encryption_paddings(&["NoPadding"])
        .build()
        .unwrap();
    let rng = CountingRng::os();
    let counter = rng.counter();
    generator.init_with_random(spec, Box::new(rng)).unwrap();
    let key = generator.generate_key().unwrap();
    assert_eq!(key.key_size(), 128);
    assert_eq!(counter.bytes_drawn(), 16);
    assert!(keystore.is_key_entry("aes").unwrap());

    let mut cipher = Cipher::get_instance("AES/GCM/NoPadding").unwrap();
    cipher.init(CipherMode::Encrypt, &key).unwrap();
    let ciphertext = cipher.do_final(b"generated").unwrap();
    let params = cipher.parameters().cloned().unwrap();
    cipher.init_with_params(CipherMode::Decrypt, &key, &params).unwrap();
    assert_eq!(cipher.do_final(&ciphertext).unwrap(), b"generated");
}

#[test]
fn test_aes_key_sizes() {
    let (service, _keystore) = service_and_keystore();
    let mut generator = KeyGenerator::get_instance(&service, "AES").unwrap();
    let spec = |bits| {
        KeyGenParameterSpec::builder("aes", Purposes::ENCRYPT)
            .block_modes(&["CBC"])
            .encryption_paddings(&["PKCS7Padding"])
            .key_size(bits)
            .build()
            .unwrap()
    };
    for bits in [128, 192, 256] {
        generator.init(spec(bits)).unwrap();
        assert_eq!(generator.generate_key().unwrap().key_size(), bits);
    }
    for bits in [0, 64, 100, 512] {
        let err = generator.init(spec(bits)).unwrap_err();
        assert_eq!(err.error_code(), error_codes::UNSUPPORTED_KEY_SIZE);
    }
}

#[test]
fn test_aes_randomized_conflict_rejected_at_init() {
    let (service, _keystore) = service_and_keystore();
    let mut generator = KeyGenerator::get_instance(&service, "AES").unwrap();
    let spec = KeyGenParameterSpec::builder("ecb", Purposes::ENCRYPT)
        .block_modes(&["ECB"])
        .encryption_paddings(&["NoPadding"])
        .build()
        .unwrap();
    assert!(matches!(generator.init(spec).unwrap_err(), KeystoreError::InvalidParameter { .. }));
    assert_eq!(generator.generate_key().unwrap_err().error_code(), error_codes::NOT_INITIALIZED);
}

#[test]
fn test_generate_hmac_keys() {
    let (service, _keystore) = service_and_keystore();
    let mut generator = KeyGenerator::get_instance(&service, "HmacSHA256").unwrap();
    let rng = CountingRng::os();
    let counter = rng.counter();
    generator
        .init_with_random(KeyGenParameterSpec::builder("hmac", Purposes::SIGN).build().unwrap(), Box::new(rng))
        .unwrap();
    let key = generator.generate_key().unwrap();
    assert_eq!(key.key_size(), 256);
    assert_eq!(counter.bytes_drawn(), 32);
    assert_eq!(key.key_info().digests(), &[crate::algorithm::Digest::Sha256]);

    let mut mac = Mac::get_instance("HmacSHA256").unwrap();
    mac.init(&key).unwrap();
    mac.update(b"message").unwrap();
    assert_eq!(mac.do_final().unwrap().len(), 32);

    for bits in [64, 72, 1024] {
        let spec = KeyGenParameterSpec::builder("hmac", Purposes::SIGN).key_size(bits).build().unwrap();
        generator.init(spec).unwrap();
        assert_eq!(generator.generate_key().unwrap().key_size(), bits);
    }
    for bits in [0, 56, 60, 1032] {
        let spec = KeyGenParameterSpec::builder("hmac", Purposes::SIGN).key_size(bits).build().unwrap();
        assert_eq!(generator.init(spec).unwrap_err().error_code(), error_codes::UNSUPPORTED_KEY_SIZE);
    }
}

#[test]
fn test_unknown_generator_algorithms() {
    let (service, _keystore) = service_and_keystore();
    assert!(matches!(
        KeyPairGenerator::get_instance(&service, "AES").unwrap_err(),
        KeystoreError::NoSuchAlgorithm { .. }
    ));
    assert!(KeyGenerator::get_instance(&service, "RSA").is_err());
    assert!(KeyGenerator::get_instance(&service, "HmacMD5").is_err());
}

#[test]
fn test_empty_alias_rejected() {
    assert!(KeyGenParameterSpec::builder("", Purposes::SIGN).build().is_err());
}
