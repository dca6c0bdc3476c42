//! Self-signed certificates for generated key pairs.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use der::asn1::{BitString, GeneralizedTime, UtcTime};
use der::{Any, Decode, Encode};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate as X509Certificate, TbsCertificate, Version};

use crate::algorithm::{Digest, KeyAlgorithm, SignatureAlgorithm, SignaturePadding};
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{oid_for_signature_algorithm, Certificate, KeyMaterial};
use crate::utils::{default_source, positive_integer_bytes};

/// First year that must be encoded as GeneralizedTime
const GENERALIZED_TIME_FROM_YEAR: i32 = 2050;

/// Fields of the certificate issued for a new key pair
#[derive(Debug, Clone)]
pub(crate) struct CertificateTemplate {
    pub(crate) subject: String,
    pub(crate) serial: u64,
    pub(crate) not_before: DateTime<Utc>,
    pub(crate) not_after: DateTime<Utc>,
}

fn encoding_failed(structure: &str, cause: impl std::fmt::Display) -> KeystoreError {
    KeystoreError::encoding(structure, cause, error_codes::CERTIFICATE_ENCODING_FAILED)
}

fn x509_time(at: DateTime<Utc>) -> KeystoreResult<Time> {
    let seconds = u64::try_from(at.timestamp()).map_err(|_| {
        KeystoreError::invalid_parameter("certificate validity", "a time after the epoch", &at.to_rfc3339())
    })?;
    let since_epoch = Duration::from_secs(seconds);
    let time = if at.year() < GENERALIZED_TIME_FROM_YEAR {
        UtcTime::from_unix_duration(since_epoch).map(Time::UtcTime)
    } else {
        GeneralizedTime::from_unix_duration(since_epoch).map(Time::GeneralTime)
    };
    time.map_err(|e| encoding_failed("certificate validity", e))
}

/// Certificate signature scheme for the key's algorithm
fn signing_algorithm(material: &KeyMaterial) -> KeystoreResult<SignatureAlgorithm> {
    match material.asymmetric_algorithm() {
        Some(KeyAlgorithm::Rsa) => Ok(SignatureAlgorithm {
            digest: Digest::Sha256,
            key_algorithm: KeyAlgorithm::Rsa,
            padding: Some(SignaturePadding::RsaPkcs1),
        }),
        Some(KeyAlgorithm::Ec) => Ok(SignatureAlgorithm {
            digest: Digest::Sha256,
            key_algorithm: KeyAlgorithm::Ec,
            padding: None,
        }),
        _ => Err(KeystoreError::invalid_key(
            "issue certificate",
            "certificates are only issued for key pairs",
            error_codes::KEY_TYPE_MISMATCH,
        )),
    }
}

/// Issue an X.509 v3 certificate for `material`, signed by itself.
///
/// Signing randomness comes from the system source so that the caller's
/// entropy budget covers key generation only.
pub(crate) fn self_signed(material: &KeyMaterial, template: &CertificateTemplate) -> KeystoreResult<Certificate> {
    let algorithm = signing_algorithm(material)?;
    let oid = oid_for_signature_algorithm(&algorithm)
        .ok_or_else(|| KeystoreError::Internal(format!("no certificate OID for {}", algorithm.name())))?;
    // RSA signature identifiers carry explicit NULL parameters, ECDSA ones none
    let parameters = match algorithm.key_algorithm {
        KeyAlgorithm::Rsa => Some(Any::null()),
        _ => None,
    };
    let signature_algorithm = AlgorithmIdentifierOwned { oid, parameters };

    let public_key = material
        .public_key()
        .ok_or_else(|| KeystoreError::Internal("key pair without a public half".to_string()))?;
    let spki = SubjectPublicKeyInfoOwned::from_der(&public_key.encoded()?)
        .map_err(|e| encoding_failed("subject public key info", e))?;
    let name = Name::from_str(&template.subject).map_err(|e| {
        KeystoreError::invalid_parameter("certificate subject", "an RFC 4514 name", &e.to_string())
    })?;
    let serial_number = SerialNumber::new(&positive_integer_bytes(template.serial))
        .map_err(|e| encoding_failed("certificate serial number", e))?;

    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number,
        signature: signature_algorithm.clone(),
        issuer: name.clone(),
        validity: Validity {
            not_before: x509_time(template.not_before)?,
            not_after: x509_time(template.not_after)?,
        },
        subject: name,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };

    let tbs = tbs_certificate
        .to_der()
        .map_err(|e| encoding_failed("TBSCertificate", e))?;
    let mut random = default_source();
    let signature = crate::operation::sign_message(material, algorithm, &tbs, random.as_mut())?;

    let certificate = X509Certificate {
        tbs_certificate,
        signature_algorithm,
        signature: BitString::from_bytes(&signature).map_err(|e| encoding_failed("certificate signature", e))?,
    };
    Certificate::from_parsed(&certificate)
}
