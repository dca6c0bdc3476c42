use std::fmt;

use chrono::{DateTime, Utc};
use der::asn1::ObjectIdentifier;
use der::{Decode, Encode};
use x509_cert::time::Time;

use super::PublicKey;
use crate::algorithm::{Digest, KeyAlgorithm, SignatureAlgorithm, SignaturePadding};
use crate::error::{error_codes, KeystoreError, KeystoreResult};

pub(crate) const OID_MD5_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");
pub(crate) const OID_SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
pub(crate) const OID_SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub(crate) const OID_SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
pub(crate) const OID_SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
pub(crate) const OID_SHA224_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.14");
pub(crate) const OID_ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
pub(crate) const OID_ECDSA_WITH_SHA224: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");
pub(crate) const OID_ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
pub(crate) const OID_ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
pub(crate) const OID_ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// Signature algorithm named by a certificate signature OID
pub(crate) fn signature_algorithm_for_oid(oid: &ObjectIdentifier) -> Option<SignatureAlgorithm> {
    let rsa = |digest| SignatureAlgorithm {
        digest,
        key_algorithm: KeyAlgorithm::Rsa,
        padding: Some(SignaturePadding::RsaPkcs1),
    };
    let ecdsa = |digest| SignatureAlgorithm {
        digest,
        key_algorithm: KeyAlgorithm::Ec,
        padding: None,
    };
    let table = [
        (OID_MD5_WITH_RSA, rsa(Digest::Md5)),
        (OID_SHA1_WITH_RSA, rsa(Digest::Sha1)),
        (OID_SHA224_WITH_RSA, rsa(Digest::Sha224)),
        (OID_SHA256_WITH_RSA, rsa(Digest::Sha256)),
        (OID_SHA384_WITH_RSA, rsa(Digest::Sha384)),
        (OID_SHA512_WITH_RSA, rsa(Digest::Sha512)),
        (OID_ECDSA_WITH_SHA1, ecdsa(Digest::Sha1)),
        (OID_ECDSA_WITH_SHA224, ecdsa(Digest::Sha224)),
        (OID_ECDSA_WITH_SHA256, ecdsa(Digest::Sha256)),
        (OID_ECDSA_WITH_SHA384, ecdsa(Digest::Sha384)),
        (OID_ECDSA_WITH_SHA512, ecdsa(Digest::Sha512)),
    ];
    table
        .into_iter()
        .find(|(candidate, _)| candidate == oid)
        .map(|(_, alg)| alg)
}

/// Certificate signature OID for a signing algorithm, if one is defined
pub(crate) fn oid_for_signature_algorithm(alg: &SignatureAlgorithm) -> Option<ObjectIdentifier> {
    let oid = match (alg.key_algorithm, alg.padding, alg.digest) {
        (KeyAlgorithm::Rsa, Some(SignaturePadding::RsaPkcs1), Digest::Md5) => OID_MD5_WITH_RSA,
        (KeyAlgorithm::Rsa, Some(SignaturePadding::RsaPkcs1), Digest::Sha1) => OID_SHA1_WITH_RSA,
        (KeyAlgorithm::Rsa, Some(SignaturePadding::RsaPkcs1), Digest::Sha224) => OID_SHA224_WITH_RSA,
        (KeyAlgorithm::Rsa, Some(SignaturePadding::RsaPkcs1), Digest::Sha256) => OID_SHA256_WITH_RSA,
        (KeyAlgorithm::Rsa, Some(SignaturePadding::RsaPkcs1), Digest::Sha384) => OID_SHA384_WITH_RSA,
        (KeyAlgorithm::Rsa, Some(SignaturePadding::RsaPkcs1), Digest::Sha512) => OID_SHA512_WITH_RSA,
        (KeyAlgorithm::Ec, None, Digest::Sha1) => OID_ECDSA_WITH_SHA1,
        (KeyAlgorithm::Ec, None, Digest::Sha224) => OID_ECDSA_WITH_SHA224,
        (KeyAlgorithm::Ec, None, Digest::Sha256) => OID_ECDSA_WITH_SHA256,
        (KeyAlgorithm::Ec, None, Digest::Sha384) => OID_ECDSA_WITH_SHA384,
        (KeyAlgorithm::Ec, None, Digest::Sha512) => OID_ECDSA_WITH_SHA512,
        _ => return None,
    };
    Some(oid)
}

/// An X.509 certificate held as its DER encoding.
///
/// Two certificates are equal exactly when their encodings are.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    der: Vec<u8>,
}

fn malformed(cause: impl fmt::Display) -> KeystoreError {
    KeystoreError::encoding("X.509 certificate", cause, error_codes::CERTIFICATE_MALFORMED)
}

fn time_to_datetime(time: &Time) -> KeystoreResult<DateTime<Utc>> {
    let since_epoch = match time {
        Time::UtcTime(t) => t.to_unix_duration(),
        Time::GeneralTime(t) => t.to_unix_duration(),
    };
    DateTime::<Utc>::from_timestamp(since_epoch.as_secs() as i64, 0)
        .ok_or_else(|| malformed("validity time out of range"))
}

impl Certificate {
    /// Parse and keep a DER-encoded certificate
    pub fn from_der(der: &[u8]) -> KeystoreResult<Self> {
        x509_cert::Certificate::from_der(der).map_err(malformed)?;
        Ok(Self { der: der.to_vec() })
    }

    pub(crate) fn from_parsed(cert: &x509_cert::Certificate) -> KeystoreResult<Self> {
        let der = cert.to_der().map_err(|e| {
            KeystoreError::encoding(
                "X.509 certificate",
                e,
                error_codes::CERTIFICATE_ENCODING_FAILED,
            )
        })?;
        Ok(Self { der })
    }

    pub fn encoded(&self) -> &[u8] {
        &self.der
    }

    fn parsed(&self) -> KeystoreResult<x509_cert::Certificate> {
        x509_cert::Certificate::from_der(&self.der).map_err(malformed)
    }

    /// The subject public key
    pub fn public_key(&self) -> KeystoreResult<PublicKey> {
        let spki = self
            .parsed()?
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(malformed)?;
        PublicKey::from_spki_der(&spki)
    }

    /// Subject distinguished name in RFC 4514 form
    pub fn subject(&self) -> KeystoreResult<String> {
        Ok(self.parsed()?.tbs_certificate.subject.to_string())
    }

    pub fn issuer(&self) -> KeystoreResult<String> {
        Ok(self.parsed()?.tbs_certificate.issuer.to_string())
    }

    /// Serial number as big-endian INTEGER content bytes
    pub fn serial_number(&self) -> KeystoreResult<Vec<u8>> {
        Ok(self.parsed()?.tbs_certificate.serial_number.as_bytes().to_vec())
    }

    pub fn not_before(&self) -> KeystoreResult<DateTime<Utc>> {
        time_to_datetime(&self.parsed()?.tbs_certificate.validity.not_before)
    }

    pub fn not_after(&self) -> KeystoreResult<DateTime<Utc>> {
        time_to_datetime(&self.parsed()?.tbs_certificate.validity.not_after)
    }

    /// Check the certificate signature against `issuer_key`.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not verify.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` for signature algorithms outside the RSA
    /// PKCS#1 and ECDSA families.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> KeystoreResult<bool> {
        let cert = self.parsed()?;
        let algorithm = signature_algorithm_for_oid(&cert.signature_algorithm.oid).ok_or_else(|| {
            KeystoreError::unsupported(
                "certificate verification",
                &format!("signature algorithm {}", cert.signature_algorithm.oid),
                error_codes::GENERIC_PARAMETER,
            )
        })?;
        if algorithm.key_algorithm != issuer_key.algorithm() {
            return Ok(false);
        }
        let tbs = cert.tbs_certificate.to_der().map_err(malformed)?;
        let signature = cert
            .signature
            .as_bytes()
            .ok_or_else(|| malformed("signature BIT STRING has unused bits"))?;
        crate::operation::verify_message(issuer_key, algorithm, &tbs, signature)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self.subject().unwrap_or_else(|_| "<unparseable>".to_string());
        let serial = self
            .serial_number()
            .map(hex::encode)
            .unwrap_or_else(|_| "<unparseable>".to_string());
        f.debug_struct("Certificate")
            .field("subject", &subject)
            .field("serial", &serial)
            .field("length", &self.der.len())
            .finish()
    }
}
