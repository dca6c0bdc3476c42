/*!
 * Key objects
 *
 * Keys come in two shapes. An `OpaqueKey` is a handle to material held by
 * the keystore backend; it can drive operations but never yields bytes.
 * Transparent keys (`PublicKey`, `TransparentPrivateKey`,
 * `TransparentSecretKey`) carry their encoding and exist to cross the
 * boundary: import, export of public halves, wrap and unwrap.
 */

mod certificate;
mod material;
mod public;
mod transparent;

pub use certificate::*;
pub use public::*;
pub use transparent::*;

pub(crate) use certificate::oid_for_signature_algorithm;
pub(crate) use material::*;

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::algorithm::{
    BlockMode, Digest, EncryptionPadding, KeyAlgorithm, Purposes, SignaturePadding,
};
use crate::authorization::{AuthorizationSet, KeyClass};
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keystore::Backend;

/// Named elliptic curves supported for EC keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcCurve {
    P224,
    P256,
    P384,
    P521,
}

impl EcCurve {
    pub const ALL: [EcCurve; 4] = [EcCurve::P224, EcCurve::P256, EcCurve::P384, EcCurve::P521];

    pub fn key_size(&self) -> u32 {
        match self {
            EcCurve::P224 => 224,
            EcCurve::P256 => 256,
            EcCurve::P384 => 384,
            EcCurve::P521 => 521,
        }
    }

    /// Size of a field element in bytes
    pub fn field_size(&self) -> usize {
        (self.key_size() as usize + 7) / 8
    }

    /// Map a key size in bits to its curve
    pub fn from_key_size(bits: u32) -> KeystoreResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.key_size() == bits)
            .ok_or_else(|| {
                KeystoreError::invalid_parameter_with_code(
                    "EC key size",
                    "224, 256, 384 or 521",
                    &bits.to_string(),
                    error_codes::UNSUPPORTED_KEY_SIZE,
                )
            })
    }

    /// Accepts SEC, X9.62 and NIST names
    pub fn from_name(name: &str) -> KeystoreResult<Self> {
        let curve = match name.to_ascii_lowercase().as_str() {
            "secp224r1" | "p-224" => EcCurve::P224,
            "secp256r1" | "prime256v1" | "p-256" => EcCurve::P256,
            "secp384r1" | "p-384" => EcCurve::P384,
            "secp521r1" | "p-521" => EcCurve::P521,
            _ => {
                return Err(KeystoreError::invalid_parameter_with_code(
                    "EC curve",
                    "secp224r1, secp256r1, secp384r1 or secp521r1",
                    name,
                    error_codes::UNRECOGNIZED_NAME,
                ))
            }
        };
        Ok(curve)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EcCurve::P224 => "secp224r1",
            EcCurve::P256 => "secp256r1",
            EcCurve::P384 => "secp384r1",
            EcCurve::P521 => "secp521r1",
        }
    }
}

/// How a key came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOrigin {
    Generated,
    Imported,
}

/// Material and metadata for one stored key, shared by every handle to it
pub(crate) struct KeyBlob {
    pub(crate) id: u64,
    pub(crate) alias: String,
    pub(crate) material: KeyMaterial,
    pub(crate) authorizations: AuthorizationSet,
    pub(crate) origin: KeyOrigin,
    pub(crate) inside_secure_hardware: bool,
}

impl KeyBlob {
    pub(crate) fn class(&self) -> KeyClass {
        match self.material {
            KeyMaterial::Symmetric(_) => KeyClass::Secret,
            _ => KeyClass::Private,
        }
    }
}

impl fmt::Debug for KeyBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBlob")
            .field("id", &self.id)
            .field("alias", &self.alias)
            .field("algorithm", &self.authorizations.algorithm())
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Handle to a private or secret key held by the keystore.
///
/// The handle exposes metadata only. It stays usable while its alias still
/// maps to the same key; once the entry is deleted or replaced by a different
/// key, operations initialized with it fail with an invalid-key error.
#[derive(Clone)]
pub struct OpaqueKey {
    blob: Arc<KeyBlob>,
    backend: Weak<Backend>,
}

impl OpaqueKey {
    pub(crate) fn new(blob: Arc<KeyBlob>, backend: Weak<Backend>) -> Self {
        Self { blob, backend }
    }

    pub fn alias(&self) -> &str {
        &self.blob.alias
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.blob.authorizations.algorithm()
    }

    pub fn key_size(&self) -> u32 {
        self.blob.authorizations.key_size()
    }

    pub fn is_private(&self) -> bool {
        self.blob.class() == KeyClass::Private
    }

    pub fn is_secret(&self) -> bool {
        self.blob.class() == KeyClass::Secret
    }

    /// Authorizations and provenance of the key
    pub fn key_info(&self) -> KeyInfo {
        KeyInfo {
            alias: self.blob.alias.clone(),
            authorizations: self.blob.authorizations.clone(),
            origin: self.blob.origin,
            inside_secure_hardware: self.blob.inside_secure_hardware,
        }
    }

    /// Public half of a private key
    pub fn public_key(&self) -> Option<PublicKey> {
        self.blob.material.public_key()
    }

    pub(crate) fn blob(&self) -> &Arc<KeyBlob> {
        &self.blob
    }

    /// The blob, provided the alias still maps to this exact key
    pub(crate) fn resolve(&self, operation: &str) -> KeystoreResult<Arc<KeyBlob>> {
        let current = self
            .backend
            .upgrade()
            .map(|backend| backend.is_current_key(&self.blob.alias, self.blob.id))
            .unwrap_or(false);
        if !current {
            return Err(KeystoreError::invalid_key(
                operation,
                &format!("key '{}' no longer exists in the keystore", self.blob.alias),
                error_codes::KEY_NOT_FOUND,
            ));
        }
        Ok(Arc::clone(&self.blob))
    }

    pub(crate) fn same_key(&self, other_id: u64) -> bool {
        self.blob.id == other_id
    }
}

impl PartialEq for OpaqueKey {
    fn eq(&self, other: &Self) -> bool {
        self.blob.id == other.blob.id
    }
}

impl Eq for OpaqueKey {}

impl fmt::Debug for OpaqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueKey")
            .field("alias", &self.blob.alias)
            .field("algorithm", &self.algorithm())
            .field("key_size", &self.key_size())
            .finish()
    }
}

/// Description of a stored key's authorizations and provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    alias: String,
    authorizations: AuthorizationSet,
    origin: KeyOrigin,
    inside_secure_hardware: bool,
}

impl KeyInfo {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.authorizations.algorithm()
    }

    pub fn key_size(&self) -> u32 {
        self.authorizations.key_size()
    }

    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    pub fn is_inside_secure_hardware(&self) -> bool {
        self.inside_secure_hardware
    }

    pub fn purposes(&self) -> Purposes {
        self.authorizations.purposes()
    }

    pub fn digests(&self) -> &[Digest] {
        self.authorizations.digests()
    }

    pub fn block_modes(&self) -> &[BlockMode] {
        self.authorizations.block_modes()
    }

    pub fn encryption_paddings(&self) -> &[EncryptionPadding] {
        self.authorizations.encryption_paddings()
    }

    pub fn signature_paddings(&self) -> &[SignaturePadding] {
        self.authorizations.signature_paddings()
    }

    pub fn key_validity_start(&self) -> Option<DateTime<Utc>> {
        self.authorizations.key_validity_start()
    }

    pub fn key_validity_for_origination_end(&self) -> Option<DateTime<Utc>> {
        self.authorizations.key_validity_for_origination_end()
    }

    pub fn key_validity_for_consumption_end(&self) -> Option<DateTime<Utc>> {
        self.authorizations.key_validity_for_consumption_end()
    }

    pub fn is_randomized_encryption_required(&self) -> bool {
        self.authorizations.is_randomized_encryption_required()
    }

    pub fn authorizations(&self) -> &AuthorizationSet {
        &self.authorizations
    }
}

/// Any key a caller can hand to the keystore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A key already held by the keystore
    Opaque(OpaqueKey),
    /// PKCS#8-encoded private key material
    PrivateMaterial(TransparentPrivateKey),
    /// Raw secret key bytes
    SecretMaterial(TransparentSecretKey),
}

impl Key {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Key::Opaque(k) => k.algorithm(),
            Key::PrivateMaterial(k) => k.algorithm(),
            Key::SecretMaterial(k) => k.algorithm(),
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueKey> {
        match self {
            Key::Opaque(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_private(&self) -> bool {
        match self {
            Key::Opaque(k) => k.is_private(),
            Key::PrivateMaterial(_) => true,
            Key::SecretMaterial(_) => false,
        }
    }
}

impl From<OpaqueKey> for Key {
    fn from(key: OpaqueKey) -> Self {
        Key::Opaque(key)
    }
}

impl From<TransparentPrivateKey> for Key {
    fn from(key: TransparentPrivateKey) -> Self {
        Key::PrivateMaterial(key)
    }
}

impl From<TransparentSecretKey> for Key {
    fn from(key: TransparentSecretKey) -> Self {
        Key::SecretMaterial(key)
    }
}

/// A freshly generated key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: OpaqueKey,
}
