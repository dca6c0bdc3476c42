use std::fmt;

use zeroize::Zeroizing;

use super::{KeyMaterial, PublicKey};
use crate::algorithm::KeyAlgorithm;
use crate::error::{error_codes, KeystoreError, KeystoreResult};

/// Private key material in PKCS#8 form, as supplied for import or produced
/// by unwrapping.
#[derive(Clone)]
pub struct TransparentPrivateKey {
    der: Zeroizing<Vec<u8>>,
    algorithm: KeyAlgorithm,
}

impl TransparentPrivateKey {
    /// Validate and wrap a PKCS#8 `PrivateKeyInfo`
    pub fn from_pkcs8_der(der: &[u8]) -> KeystoreResult<Self> {
        let material = KeyMaterial::from_pkcs8_der(der)?;
        let algorithm = material.asymmetric_algorithm().ok_or_else(|| {
            KeystoreError::encoding(
                "PKCS#8 private key",
                "symmetric material in PKCS#8",
                error_codes::PRIVATE_KEY_MALFORMED,
            )
        })?;
        Ok(Self {
            der: Zeroizing::new(der.to_vec()),
            algorithm,
        })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn format(&self) -> &'static str {
        "PKCS#8"
    }

    pub fn encoded(&self) -> &[u8] {
        &self.der
    }

    /// Public half derived from the private material
    pub fn public_key(&self) -> KeystoreResult<PublicKey> {
        self.to_material()?.public_key().ok_or_else(|| {
            KeystoreError::encoding(
                "PKCS#8 private key",
                "no public half",
                error_codes::PRIVATE_KEY_MALFORMED,
            )
        })
    }

    pub(crate) fn to_material(&self) -> KeystoreResult<KeyMaterial> {
        KeyMaterial::from_pkcs8_der(&self.der)
    }
}

impl PartialEq for TransparentPrivateKey {
    fn eq(&self, other: &Self) -> bool {
        crate::utils::constant_time_eq(&self.der, &other.der)
    }
}

impl Eq for TransparentPrivateKey {}

impl fmt::Debug for TransparentPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransparentPrivateKey")
            .field("algorithm", &self.algorithm)
            .field("der", &"[REDACTED]")
            .finish()
    }
}

/// Raw secret key bytes with the algorithm they are meant for.
///
/// Length is not checked here; the keystore validates it against the
/// algorithm on import.
#[derive(Clone)]
pub struct TransparentSecretKey {
    bytes: Zeroizing<Vec<u8>>,
    algorithm: KeyAlgorithm,
}

impl TransparentSecretKey {
    /// # Errors
    ///
    /// `InvalidParameter` if `algorithm` is not a symmetric key algorithm.
    pub fn new(bytes: &[u8], algorithm: &str) -> KeystoreResult<Self> {
        let algorithm = KeyAlgorithm::from_name(algorithm)?;
        if !algorithm.is_symmetric() {
            return Err(KeystoreError::invalid_parameter(
                "secret key algorithm",
                "AES or an HMAC algorithm",
                algorithm.name(),
            ));
        }
        Ok(Self {
            bytes: Zeroizing::new(bytes.to_vec()),
            algorithm,
        })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn format(&self) -> &'static str {
        "RAW"
    }

    pub fn encoded(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for TransparentSecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && crate::utils::constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for TransparentSecretKey {}

impl fmt::Debug for TransparentSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransparentSecretKey")
            .field("algorithm", &self.algorithm)
            .field("length", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
