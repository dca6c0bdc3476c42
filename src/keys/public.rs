use std::fmt;

use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use spki::{DecodePublicKey, EncodePublicKey};

use super::EcCurve;
use crate::algorithm::KeyAlgorithm;
use crate::error::{error_codes, KeystoreError, KeystoreResult};

/// EC public point on one of the supported curves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcPublicKey {
    P224(p224::PublicKey),
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    P521(p521::PublicKey),
}

impl EcPublicKey {
    pub fn curve(&self) -> EcCurve {
        match self {
            EcPublicKey::P224(_) => EcCurve::P224,
            EcPublicKey::P256(_) => EcCurve::P256,
            EcPublicKey::P384(_) => EcCurve::P384,
            EcPublicKey::P521(_) => EcCurve::P521,
        }
    }
}

/// Exportable public key
#[derive(Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Ec(EcPublicKey),
}

impl PublicKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Rsa(_) => KeyAlgorithm::Rsa,
            PublicKey::Ec(_) => KeyAlgorithm::Ec,
        }
    }

    /// Key size in bits: modulus length for RSA, curve size for EC
    pub fn key_size(&self) -> u32 {
        match self {
            PublicKey::Rsa(k) => k.n().bits() as u32,
            PublicKey::Ec(k) => k.curve().key_size(),
        }
    }

    /// Encoding format of [`encoded`](Self::encoded)
    pub fn format(&self) -> &'static str {
        "X.509"
    }

    /// X.509 SubjectPublicKeyInfo DER
    pub fn encoded(&self) -> KeystoreResult<Vec<u8>> {
        let document = match self {
            PublicKey::Rsa(k) => k.to_public_key_der(),
            PublicKey::Ec(EcPublicKey::P224(k)) => k.to_public_key_der(),
            PublicKey::Ec(EcPublicKey::P256(k)) => k.to_public_key_der(),
            PublicKey::Ec(EcPublicKey::P384(k)) => k.to_public_key_der(),
            PublicKey::Ec(EcPublicKey::P521(k)) => k.to_public_key_der(),
        }
        .map_err(|e| {
            KeystoreError::encoding("SubjectPublicKeyInfo", e, error_codes::PUBLIC_KEY_MALFORMED)
        })?;
        Ok(document.as_bytes().to_vec())
    }

    /// Decode an X.509 SubjectPublicKeyInfo
    pub fn from_spki_der(der: &[u8]) -> KeystoreResult<Self> {
        if let Ok(k) = RsaPublicKey::from_public_key_der(der) {
            return Ok(PublicKey::Rsa(k));
        }
        if let Ok(k) = p256::PublicKey::from_public_key_der(der) {
            return Ok(PublicKey::Ec(EcPublicKey::P256(k)));
        }
        if let Ok(k) = p384::PublicKey::from_public_key_der(der) {
            return Ok(PublicKey::Ec(EcPublicKey::P384(k)));
        }
        if let Ok(k) = p521::PublicKey::from_public_key_der(der) {
            return Ok(PublicKey::Ec(EcPublicKey::P521(k)));
        }
        if let Ok(k) = p224::PublicKey::from_public_key_der(der) {
            return Ok(PublicKey::Ec(EcPublicKey::P224(k)));
        }
        Err(KeystoreError::encoding(
            "SubjectPublicKeyInfo",
            "not an RSA or supported EC public key",
            error_codes::PUBLIC_KEY_MALFORMED,
        ))
    }

    pub fn as_rsa(&self) -> Option<&RsaPublicKey> {
        match self {
            PublicKey::Rsa(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_ec(&self) -> Option<&EcPublicKey> {
        match self {
            PublicKey::Ec(k) => Some(k),
            _ => None,
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("PublicKey");
        s.field("algorithm", &self.algorithm())
            .field("key_size", &self.key_size());
        if let PublicKey::Ec(k) = self {
            s.field("curve", &k.curve().name());
        }
        s.finish()
    }
}
