use pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use zeroize::Zeroizing;

use super::{EcCurve, EcPublicKey, PublicKey};
use crate::algorithm::KeyAlgorithm;
use crate::error::{error_codes, KeystoreError, KeystoreResult};

/// EC private scalar on one of the supported curves
#[derive(Clone)]
pub(crate) enum EcPrivateKey {
    P224(p224::SecretKey),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

impl EcPrivateKey {
    pub(crate) fn curve(&self) -> EcCurve {
        match self {
            EcPrivateKey::P224(_) => EcCurve::P224,
            EcPrivateKey::P256(_) => EcCurve::P256,
            EcPrivateKey::P384(_) => EcCurve::P384,
            EcPrivateKey::P521(_) => EcCurve::P521,
        }
    }

    pub(crate) fn public_key(&self) -> EcPublicKey {
        match self {
            EcPrivateKey::P224(k) => EcPublicKey::P224(k.public_key()),
            EcPrivateKey::P256(k) => EcPublicKey::P256(k.public_key()),
            EcPrivateKey::P384(k) => EcPublicKey::P384(k.public_key()),
            EcPrivateKey::P521(k) => EcPublicKey::P521(k.public_key()),
        }
    }

    fn from_pkcs8_der(der: &[u8]) -> Option<Self> {
        if let Ok(k) = p256::SecretKey::from_pkcs8_der(der) {
            return Some(EcPrivateKey::P256(k));
        }
        if let Ok(k) = p384::SecretKey::from_pkcs8_der(der) {
            return Some(EcPrivateKey::P384(k));
        }
        if let Ok(k) = p521::SecretKey::from_pkcs8_der(der) {
            return Some(EcPrivateKey::P521(k));
        }
        if let Ok(k) = p224::SecretKey::from_pkcs8_der(der) {
            return Some(EcPrivateKey::P224(k));
        }
        None
    }
}

/// Private or secret material held behind an opaque handle
pub(crate) enum KeyMaterial {
    Rsa(RsaPrivateKey),
    Ec(EcPrivateKey),
    Symmetric(Zeroizing<Vec<u8>>),
}

impl KeyMaterial {
    /// Decode PKCS#8 private key material, detecting RSA or the EC curve
    pub(crate) fn from_pkcs8_der(der: &[u8]) -> KeystoreResult<Self> {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(KeyMaterial::Rsa(key));
        }
        EcPrivateKey::from_pkcs8_der(der)
            .map(KeyMaterial::Ec)
            .ok_or_else(|| {
                KeystoreError::encoding(
                    "PKCS#8 private key",
                    "not an RSA or supported EC private key",
                    error_codes::PRIVATE_KEY_MALFORMED,
                )
            })
    }

    /// Algorithm of asymmetric material; symmetric material carries its
    /// algorithm in the authorization set instead
    pub(crate) fn asymmetric_algorithm(&self) -> Option<KeyAlgorithm> {
        match self {
            KeyMaterial::Rsa(_) => Some(KeyAlgorithm::Rsa),
            KeyMaterial::Ec(_) => Some(KeyAlgorithm::Ec),
            KeyMaterial::Symmetric(_) => None,
        }
    }

    pub(crate) fn key_size(&self) -> u32 {
        match self {
            KeyMaterial::Rsa(k) => k.n().bits() as u32,
            KeyMaterial::Ec(k) => k.curve().key_size(),
            KeyMaterial::Symmetric(bytes) => (bytes.len() * 8) as u32,
        }
    }

    pub(crate) fn public_key(&self) -> Option<PublicKey> {
        match self {
            KeyMaterial::Rsa(k) => Some(PublicKey::Rsa(k.to_public_key())),
            KeyMaterial::Ec(k) => Some(PublicKey::Ec(k.public_key())),
            KeyMaterial::Symmetric(_) => None,
        }
    }
}
