use super::*;

#[test]
fn test_names_are_case_insensitive() {
    assert_eq!(KeyAlgorithm::from_name("hmacsha256").unwrap(), KeyAlgorithm::HmacSha256);
    assert_eq!(Digest::from_name("sha-384").unwrap(), Digest::Sha384);
    assert_eq!(Digest::from_name("SHA1").unwrap(), Digest::Sha1);
    assert_eq!(BlockMode::from_name("gcm").unwrap(), BlockMode::Gcm);
    assert_eq!(EncryptionPadding::from_name("pkcs5padding").unwrap(), EncryptionPadding::Pkcs7);
    assert_eq!(SignaturePadding::from_name("pss").unwrap(), SignaturePadding::RsaPss);
}

#[test]
fn test_unrecognized_names_are_parameter_errors() {
    for err in [
        Digest::from_name("SHA-3").unwrap_err(),
        BlockMode::from_name("OFB").unwrap_err(),
        EncryptionPadding::from_name("ISO10126Padding").unwrap_err(),
        KeyAlgorithm::from_name("DES").unwrap_err(),
    ] {
        assert_eq!(err.error_type(), "InvalidParameter");
    }
}

#[test]
fn test_purposes_bit_operations() {
    let p = Purposes::ENCRYPT | Purposes::DECRYPT;
    assert!(p.contains(Purposes::ENCRYPT));
    assert!(!p.contains(Purposes::SIGN));
    assert!(Purposes::NONE.is_empty());
    assert!(Purposes::all().contains(Purposes::WRAP | Purposes::VERIFY));
    assert_eq!(p.names(), vec!["ENCRYPT", "DECRYPT"]);
}

#[test]
fn test_parse_aes_transformations() {
    let t = parse_cipher_transformation("aes/cbc/pkcs7padding").unwrap();
    assert_eq!(t.algorithm, KeyAlgorithm::Aes);
    assert_eq!(t.block_mode, Some(BlockMode::Cbc));
    assert_eq!(t.padding, EncryptionPadding::Pkcs7);
    assert_eq!(t.name(), "AES/CBC/PKCS7Padding");

    assert!(parse_cipher_transformation("AES/GCM/PKCS7Padding").is_err());
    assert!(parse_cipher_transformation("AES/CTR/PKCS7Padding").is_err());
    assert!(parse_cipher_transformation("AES/CBC").is_err());
}

#[test]
fn test_parse_rsa_transformations() {
    let t = parse_cipher_transformation("RSA/ECB/OAEPWithSHA-256AndMGF1Padding").unwrap();
    assert_eq!(t.padding, EncryptionPadding::RsaOaep);
    assert_eq!(t.oaep_digest, Some(Digest::Sha256));
    assert_eq!(t.block_mode, None);

    let t = parse_cipher_transformation("RSA/NONE/NOPADDING").unwrap();
    assert_eq!(t.padding, EncryptionPadding::None);

    let t = parse_cipher_transformation("RSA/ECB/OAEPPadding").unwrap();
    assert_eq!(t.oaep_digest, Some(Digest::Sha1));

    let err = parse_cipher_transformation("RSA/CBC/PKCS1Padding").unwrap_err();
    assert_eq!(err.error_type(), "NoSuchAlgorithm");
}

#[test]
fn test_parse_signature_algorithms() {
    let s = parse_signature_algorithm("SHA256withECDSA").unwrap();
    assert_eq!(s.digest, Digest::Sha256);
    assert_eq!(s.key_algorithm, KeyAlgorithm::Ec);

    let s = parse_signature_algorithm("ECDSA").unwrap();
    assert_eq!(s.digest, Digest::Sha1);

    let s = parse_signature_algorithm("sha512withrsa/pss").unwrap();
    assert_eq!(s.padding, Some(SignaturePadding::RsaPss));
    assert_eq!(s.name(), "SHA512withRSA/PSS");

    let s = parse_signature_algorithm("NONEwithRSA").unwrap();
    assert_eq!(s.digest, Digest::None);

    assert!(parse_signature_algorithm("MD5withECDSA").is_err());
    assert!(parse_signature_algorithm("NONEwithRSA/PSS").is_err());
}

#[test]
fn test_registry_resolves_registered_names_only() {
    let registry = ServiceRegistry::global();

    match registry.resolve(ServiceType::Cipher, "aes/gcm/nopadding").unwrap() {
        ServiceDescriptor::Cipher(t) => assert_eq!(t.block_mode, Some(BlockMode::Gcm)),
        other => panic!("unexpected descriptor {:?}", other),
    }
    match registry.resolve(ServiceType::Mac, "HMACSHA384").unwrap() {
        ServiceDescriptor::Mac(alg) => assert_eq!(alg, KeyAlgorithm::HmacSha384),
        other => panic!("unexpected descriptor {:?}", other),
    }

    let err = registry.resolve(ServiceType::Mac, "AES").unwrap_err();
    assert_eq!(err.error_type(), "NoSuchAlgorithm");
    assert!(registry.resolve(ServiceType::KeyPairGenerator, "DSA").is_err());
    assert!(!registry.contains(ServiceType::Cipher, "AES/OFB/NoPadding"));
}

#[test]
fn test_registry_service_listing() {
    let registry = ServiceRegistry::global();
    let signatures = registry.services(ServiceType::Signature);
    assert!(signatures.contains(&"SHA256withRSA/PSS".to_string()));
    assert!(signatures.contains(&"MD5withRSA".to_string()));
    assert_eq!(registry.services(ServiceType::KeyPairGenerator), vec!["EC", "RSA"]);

    for name in registry.services(ServiceType::Cipher) {
        assert!(registry.resolve(ServiceType::Cipher, &name).is_ok(), "{}", name);
    }
}
