use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{Certificate, Key, OpaqueKey};

/// A private key together with its certificate chain, leaf first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKeyEntry {
    key: Key,
    chain: Vec<Certificate>,
}

impl PrivateKeyEntry {
    /// # Errors
    ///
    /// `InvalidParameter` if `key` is not a private key, the chain is empty,
    /// or the leaf certificate carries a key of another algorithm.
    pub fn new(key: impl Into<Key>, chain: Vec<Certificate>) -> KeystoreResult<Self> {
        let key = key.into();
        if !key.is_private() {
            return Err(KeystoreError::invalid_parameter(
                "private key entry",
                "a private key",
                key.algorithm().name(),
            ));
        }
        let leaf = chain.first().ok_or_else(|| {
            KeystoreError::invalid_parameter_with_code(
                "certificate chain",
                "at least one certificate",
                "empty chain",
                error_codes::INVALID_CHAIN,
            )
        })?;
        let leaf_algorithm = leaf.public_key()?.algorithm();
        if leaf_algorithm != key.algorithm() {
            return Err(KeystoreError::invalid_parameter_with_code(
                "certificate chain",
                &format!("a leaf certificate for a {} key", key.algorithm()),
                leaf_algorithm.name(),
                error_codes::INVALID_CHAIN,
            ));
        }
        Ok(Self { key, chain })
    }

    pub(crate) fn from_parts(key: Key, chain: Vec<Certificate>) -> Self {
        Self { key, chain }
    }

    pub fn private_key(&self) -> &Key {
        &self.key
    }

    /// The leaf certificate
    pub fn certificate(&self) -> &Certificate {
        &self.chain[0]
    }

    pub fn certificate_chain(&self) -> &[Certificate] {
        &self.chain
    }

    pub(crate) fn into_parts(self) -> (Key, Vec<Certificate>) {
        (self.key, self.chain)
    }
}

/// A symmetric key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKeyEntry {
    key: Key,
}

impl SecretKeyEntry {
    pub fn new(key: impl Into<Key>) -> KeystoreResult<Self> {
        let key = key.into();
        if key.is_private() || key.algorithm().is_asymmetric() {
            return Err(KeystoreError::invalid_parameter(
                "secret key entry",
                "a secret key",
                key.algorithm().name(),
            ));
        }
        Ok(Self { key })
    }

    pub(crate) fn from_opaque(key: OpaqueKey) -> Self {
        Self {
            key: Key::Opaque(key),
        }
    }

    pub fn secret_key(&self) -> &Key {
        &self.key
    }

    pub(crate) fn into_key(self) -> Key {
        self.key
    }
}

/// A certificate trusted on its own, with no private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCertificateEntry {
    certificate: Certificate,
}

impl TrustedCertificateEntry {
    pub fn new(certificate: Certificate) -> Self {
        Self { certificate }
    }

    pub fn trusted_certificate(&self) -> &Certificate {
        &self.certificate
    }
}

/// One keystore entry as seen by callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    PrivateKey(PrivateKeyEntry),
    SecretKey(SecretKeyEntry),
    TrustedCertificate(TrustedCertificateEntry),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::PrivateKey(_) => EntryKind::PrivateKey,
            Entry::SecretKey(_) => EntryKind::SecretKey,
            Entry::TrustedCertificate(_) => EntryKind::TrustedCertificate,
        }
    }
}

impl From<PrivateKeyEntry> for Entry {
    fn from(entry: PrivateKeyEntry) -> Self {
        Entry::PrivateKey(entry)
    }
}

impl From<SecretKeyEntry> for Entry {
    fn from(entry: SecretKeyEntry) -> Self {
        Entry::SecretKey(entry)
    }
}

impl From<TrustedCertificateEntry> for Entry {
    fn from(entry: TrustedCertificateEntry) -> Self {
        Entry::TrustedCertificate(entry)
    }
}

/// Discriminant of an [`Entry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    PrivateKey,
    SecretKey,
    TrustedCertificate,
}
