/*!
 * Key store
 *
 * A `KeystoreService` owns one alias namespace. Callers reach it through
 * `Keystore` handles, which must be loaded before use and only ever in the
 * one supported shape: no input stream, no password. Key material stays in
 * the service; handles hand out `OpaqueKey`s.
 */

mod backend;
mod entry;

pub(crate) use backend::*;
pub use entry::*;

use std::io::{Read, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::algorithm::KeyAlgorithm;
use crate::authorization::{AuthorizationSet, KeyProtection};
use crate::config::KeystoreConfig;
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{
    Certificate, Key, KeyMaterial, KeyOrigin, OpaqueKey, PublicKey, TransparentSecretKey,
};

/// The keystore backend: one shared alias namespace plus its configuration
#[derive(Clone)]
pub struct KeystoreService {
    backend: Arc<Backend>,
}

impl KeystoreService {
    /// Create a service with its own empty namespace
    pub fn new(config: KeystoreConfig) -> KeystoreResult<Self> {
        config.validate()?;
        log::info!(
            "Starting keystore service (security level {:?})",
            config.security_level
        );
        Ok(Self {
            backend: Arc::new(Backend::new(config)),
        })
    }

    /// A new, not yet loaded, client handle on this service's namespace
    pub fn keystore(&self) -> Keystore {
        Keystore {
            backend: Arc::clone(&self.backend),
            loaded: false,
        }
    }

    pub fn config(&self) -> &KeystoreConfig {
        self.backend.config()
    }

    pub(crate) fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Default for KeystoreService {
    fn default() -> Self {
        Self {
            backend: Arc::new(Backend::new(KeystoreConfig::default())),
        }
    }
}

/// Snapshot of the aliases present when enumeration started.
///
/// Cloning yields an independent cursor over the same snapshot, so an
/// enumeration can be restarted.
#[derive(Debug, Clone)]
pub struct Aliases {
    names: Arc<[String]>,
    position: usize,
}

impl Aliases {
    /// Rewind to the first alias
    pub fn restart(&mut self) {
        self.position = 0;
    }
}

impl Iterator for Aliases {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let name = self.names.get(self.position)?.clone();
        self.position += 1;
        Some(name)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.names.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Aliases {}

fn reject_password(operation: &str, password: Option<&[u8]>) -> KeystoreResult<()> {
    match password {
        Some(_) => Err(KeystoreError::store_state(
            operation,
            "entries are protected by authorizations, not passwords",
            error_codes::PASSWORD_PROTECTION_UNSUPPORTED,
        )),
        None => Ok(()),
    }
}

fn check_leaf_matches(key_public: Option<PublicKey>, chain: &[Certificate]) -> KeystoreResult<()> {
    let leaf = chain.first().ok_or_else(|| {
        KeystoreError::store_state(
            "set private key",
            "a private key needs a certificate chain",
            error_codes::INVALID_CHAIN,
        )
    })?;
    if key_public.as_ref() != Some(&leaf.public_key()?) {
        return Err(KeystoreError::store_state(
            "set private key",
            "leaf certificate does not certify the private key",
            error_codes::INVALID_CHAIN,
        ));
    }
    Ok(())
}

fn validate_secret_length(key: &TransparentSecretKey) -> KeystoreResult<()> {
    let bits = key.encoded().len() * 8;
    match key.algorithm() {
        KeyAlgorithm::Aes if !matches!(bits, 128 | 192 | 256) => {
            Err(KeystoreError::invalid_parameter_with_code(
                "AES key size",
                "128, 192 or 256 bits",
                &bits.to_string(),
                error_codes::UNSUPPORTED_KEY_SIZE,
            ))
        }
        alg if alg.is_hmac() && bits == 0 => Err(KeystoreError::invalid_parameter_with_code(
            "HMAC key size",
            "a non-empty key",
            "0",
            error_codes::UNSUPPORTED_KEY_SIZE,
        )),
        _ => Ok(()),
    }
}

/// A client handle on a keystore namespace
pub struct Keystore {
    backend: Arc<Backend>,
    loaded: bool,
}

impl Keystore {
    /// Initialize the handle.
    ///
    /// # Errors
    ///
    /// `StoreState` if a stream or a password is supplied; this store is
    /// persisted by its service and cannot be loaded from a blob.
    pub fn load(&mut self, stream: Option<&mut dyn Read>, password: Option<&[u8]>) -> KeystoreResult<()> {
        if stream.is_some() || password.is_some() {
            return Err(KeystoreError::store_state(
                "load",
                "only a load with neither stream nor password is supported",
                error_codes::STORE_LOAD_REJECTED,
            ));
        }
        self.loaded = true;
        log::info!("Keystore loaded with {} entries", self.backend.len()?);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn ensure_loaded(&self, operation: &str) -> KeystoreResult<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(KeystoreError::not_loaded(operation))
        }
    }

    /// Serializing the store is not supported
    pub fn store(&self, _stream: &mut dyn Write, _password: Option<&[u8]>) -> KeystoreResult<()> {
        self.ensure_loaded("store")?;
        Err(KeystoreError::unsupported(
            "store",
            "the keystore is persisted by its service",
            error_codes::STORE_SERIALIZATION_UNSUPPORTED,
        ))
    }

    pub fn aliases(&self) -> KeystoreResult<Aliases> {
        self.ensure_loaded("aliases")?;
        Ok(Aliases {
            names: self.backend.aliases()?.into(),
            position: 0,
        })
    }

    pub fn contains_alias(&self, alias: &str) -> KeystoreResult<bool> {
        self.ensure_loaded("contains alias")?;
        self.backend.contains(alias)
    }

    pub fn size(&self) -> KeystoreResult<usize> {
        self.ensure_loaded("size")?;
        self.backend.len()
    }

    /// Whether `alias` holds a private or secret key
    pub fn is_key_entry(&self, alias: &str) -> KeystoreResult<bool> {
        self.ensure_loaded("is key entry")?;
        Ok(self
            .backend
            .get(alias)?
            .map(|e| e.kind.blob().is_some())
            .unwrap_or(false))
    }

    /// Whether `alias` holds a trusted certificate
    pub fn is_certificate_entry(&self, alias: &str) -> KeystoreResult<bool> {
        self.ensure_loaded("is certificate entry")?;
        Ok(self
            .backend
            .get(alias)?
            .map(|e| e.kind.kind() == EntryKind::TrustedCertificate)
            .unwrap_or(false))
    }

    pub fn get_key(&self, alias: &str, password: Option<&[u8]>) -> KeystoreResult<Option<OpaqueKey>> {
        self.ensure_loaded("get key")?;
        reject_password("get key", password)?;
        Ok(self
            .backend
            .get(alias)?
            .and_then(|e| e.kind.blob().map(|blob| Backend::handle(&self.backend, blob))))
    }

    /// Leaf certificate of a private key entry, or the trusted certificate
    pub fn get_certificate(&self, alias: &str) -> KeystoreResult<Option<Certificate>> {
        self.ensure_loaded("get certificate")?;
        Ok(self.backend.get(alias)?.and_then(|e| match e.kind {
            StoredKind::PrivateKey { chain, .. } => chain.into_iter().next(),
            StoredKind::TrustedCertificate { certificate } => Some(certificate),
            StoredKind::SecretKey { .. } => None,
        }))
    }

    /// Chain of a private key entry; `None` for every other kind
    pub fn get_certificate_chain(&self, alias: &str) -> KeystoreResult<Option<Vec<Certificate>>> {
        self.ensure_loaded("get certificate chain")?;
        Ok(self.backend.get(alias)?.and_then(|e| match e.kind {
            StoredKind::PrivateKey { chain, .. } => Some(chain),
            _ => None,
        }))
    }

    pub fn get_creation_date(&self, alias: &str) -> KeystoreResult<Option<DateTime<Utc>>> {
        self.ensure_loaded("get creation date")?;
        Ok(self.backend.get(alias)?.map(|e| e.created))
    }

    /// Alias whose trusted certificate, or failing that whose leaf
    /// certificate, has exactly these bytes
    pub fn get_certificate_alias(&self, certificate: &Certificate) -> KeystoreResult<Option<String>> {
        self.ensure_loaded("get certificate alias")?;
        self.backend.read_with(|entries| {
            let mut trusted: Option<&String> = None;
            let mut leaf: Option<&String> = None;
            for (alias, entry) in entries {
                let slot = match &entry.kind {
                    StoredKind::TrustedCertificate { certificate: c } if c == certificate => &mut trusted,
                    StoredKind::PrivateKey { chain, .. } if chain.first() == Some(certificate) => &mut leaf,
                    _ => continue,
                };
                if slot.map_or(true, |current| alias < current) {
                    *slot = Some(alias);
                }
            }
            trusted.or(leaf).cloned()
        })
    }

    pub fn get_entry(&self, alias: &str, password: Option<&[u8]>) -> KeystoreResult<Option<Entry>> {
        self.ensure_loaded("get entry")?;
        reject_password("get entry", password)?;
        Ok(self.backend.get(alias)?.map(|e| match e.kind {
            StoredKind::PrivateKey { blob, chain } => Entry::PrivateKey(PrivateKeyEntry::from_parts(
                Key::Opaque(Backend::handle(&self.backend, &blob)),
                chain,
            )),
            StoredKind::SecretKey { blob } => Entry::SecretKey(SecretKeyEntry::from_opaque(
                Backend::handle(&self.backend, &blob),
            )),
            StoredKind::TrustedCertificate { certificate } => {
                Entry::TrustedCertificate(TrustedCertificateEntry::new(certificate))
            }
        }))
    }

    /// Insert or replace the entry under `alias`.
    ///
    /// Key material is imported with `protection` as its authorizations. A
    /// private key without protection is imported with unrestricted
    /// authorizations; a secret key always needs protection. An opaque key
    /// can only be set back under the alias it came from, and then
    /// `protection` must be `None`.
    pub fn set_entry(&self, alias: &str, entry: Entry, protection: Option<&KeyProtection>) -> KeystoreResult<()> {
        self.ensure_loaded("set entry")?;
        match entry {
            Entry::TrustedCertificate(e) => {
                if protection.is_some() {
                    return Err(KeystoreError::store_state(
                        "set entry",
                        "a trusted certificate takes no protection parameters",
                        error_codes::PASSWORD_PROTECTION_UNSUPPORTED,
                    ));
                }
                self.backend.insert(
                    alias,
                    StoredKind::TrustedCertificate {
                        certificate: e.trusted_certificate().clone(),
                    },
                )?;
                log::info!("Stored trusted certificate under alias '{}'", alias);
                Ok(())
            }
            Entry::PrivateKey(e) => {
                let (key, chain) = e.into_parts();
                self.set_private_key(alias, key, chain, protection)
            }
            Entry::SecretKey(e) => self.set_secret_key(alias, e.into_key(), protection),
        }
    }

    /// Insert or replace a key under `alias`.
    ///
    /// A transparent private key is imported with unrestricted
    /// authorizations and needs a chain whose leaf certifies it. An opaque
    /// key must come from `alias` itself; for a private key its chain is
    /// replaced.
    pub fn set_key_entry(
        &self,
        alias: &str,
        key: impl Into<Key>,
        password: Option<&[u8]>,
        chain: &[Certificate],
    ) -> KeystoreResult<()> {
        self.ensure_loaded("set key entry")?;
        reject_password("set key entry", password)?;
        let key = key.into();
        if let Key::SecretMaterial(_) = key {
            return Err(KeystoreError::store_state(
                "set key entry",
                "secret keys are imported through set_entry with protection parameters",
                error_codes::PROTECTION_REQUIRED,
            ));
        }
        let opaque_secret = key.as_opaque().map(OpaqueKey::is_secret).unwrap_or(false);
        if opaque_secret {
            self.set_secret_key(alias, key, None)
        } else {
            self.set_private_key(alias, key, chain.to_vec(), None)
        }
    }

    /// Store `certificate` as a trusted entry.
    ///
    /// # Errors
    ///
    /// `StoreState` if `alias` holds a key entry.
    pub fn set_certificate_entry(&self, alias: &str, certificate: &Certificate) -> KeystoreResult<()> {
        self.ensure_loaded("set certificate entry")?;
        self.backend.update(alias, |current| {
            if let Some(existing) = current {
                if existing.kind.blob().is_some() {
                    return Err(KeystoreError::store_state(
                        "set certificate entry",
                        &format!("alias '{}' holds a key entry", alias),
                        error_codes::ENTRY_KIND_CONFLICT,
                    ));
                }
            }
            Ok(StoredEntry {
                kind: StoredKind::TrustedCertificate {
                    certificate: certificate.clone(),
                },
                created: Utc::now(),
            })
        })
    }

    /// Remove `alias`; absent aliases are not an error
    pub fn delete_entry(&self, alias: &str) -> KeystoreResult<()> {
        self.ensure_loaded("delete entry")?;
        if self.backend.remove(alias)? {
            log::info!("Deleted keystore entry '{}'", alias);
        }
        Ok(())
    }

    /// The handle's backend, for generators bound to this keystore
    pub(crate) fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    fn set_private_key(
        &self,
        alias: &str,
        key: Key,
        chain: Vec<Certificate>,
        protection: Option<&KeyProtection>,
    ) -> KeystoreResult<()> {
        match key {
            Key::PrivateMaterial(material) => {
                check_leaf_matches(Some(material.public_key()?), &chain)?;
                let algorithm = material.algorithm();
                let material = material.to_material()?;
                let key_size = material.key_size();
                let authorizations = match protection {
                    Some(p) => AuthorizationSet::resolve(p, algorithm, key_size)?,
                    None => AuthorizationSet::unrestricted(algorithm, key_size),
                };
                Backend::store_key(
                    &self.backend,
                    alias,
                    material,
                    authorizations,
                    KeyOrigin::Imported,
                    Some(chain),
                )?;
                Ok(())
            }
            Key::Opaque(opaque) => {
                self.check_same_alias(alias, &opaque, protection)?;
                if !opaque.is_private() {
                    return Err(KeystoreError::store_state(
                        "set private key",
                        "a secret key cannot carry a certificate chain",
                        error_codes::ENTRY_KIND_CONFLICT,
                    ));
                }
                check_leaf_matches(opaque.public_key(), &chain)?;
                let blob = Arc::clone(opaque.blob());
                self.backend.update(alias, |current| {
                    let created = match current {
                        Some(entry) if entry.kind.blob().map(|b| b.id) == Some(blob.id) => entry.created,
                        _ => {
                            return Err(KeystoreError::store_state(
                                "set private key",
                                &format!("alias '{}' no longer holds this key", alias),
                                error_codes::KEY_ALIAS_MISMATCH,
                            ))
                        }
                    };
                    Ok(StoredEntry {
                        kind: StoredKind::PrivateKey { blob, chain },
                        created,
                    })
                })?;
                log::info!("Replaced certificate chain of '{}'", alias);
                Ok(())
            }
            Key::SecretMaterial(_) => Err(KeystoreError::store_state(
                "set private key",
                "a secret key cannot be stored as a private key entry",
                error_codes::ENTRY_KIND_CONFLICT,
            )),
        }
    }

    fn set_secret_key(&self, alias: &str, key: Key, protection: Option<&KeyProtection>) -> KeystoreResult<()> {
        match key {
            Key::SecretMaterial(secret) => {
                let protection = protection.ok_or_else(|| {
                    KeystoreError::store_state(
                        "set secret key",
                        "secret keys must be imported with protection parameters",
                        error_codes::PROTECTION_REQUIRED,
                    )
                })?;
                validate_secret_length(&secret)?;
                let key_size = (secret.encoded().len() * 8) as u32;
                let authorizations = AuthorizationSet::resolve(protection, secret.algorithm(), key_size)?;
                let material = KeyMaterial::Symmetric(zeroize::Zeroizing::new(secret.encoded().to_vec()));
                Backend::store_key(
                    &self.backend,
                    alias,
                    material,
                    authorizations,
                    KeyOrigin::Imported,
                    None,
                )?;
                Ok(())
            }
            Key::Opaque(opaque) => {
                self.check_same_alias(alias, &opaque, protection)?;
                if !opaque.is_secret() {
                    return Err(KeystoreError::store_state(
                        "set secret key",
                        "a private key cannot be stored as a secret key entry",
                        error_codes::ENTRY_KIND_CONFLICT,
                    ));
                }
                Ok(())
            }
            Key::PrivateMaterial(_) => Err(KeystoreError::store_state(
                "set secret key",
                "a private key cannot be stored as a secret key entry",
                error_codes::ENTRY_KIND_CONFLICT,
            )),
        }
    }

    /// An opaque key may only be set back onto the alias that still holds it
    fn check_same_alias(&self, alias: &str, key: &OpaqueKey, protection: Option<&KeyProtection>) -> KeystoreResult<()> {
        if protection.is_some() {
            return Err(KeystoreError::store_state(
                "set entry",
                "authorizations of a stored key cannot be changed",
                error_codes::PASSWORD_PROTECTION_UNSUPPORTED,
            ));
        }
        let current = self
            .backend
            .get(alias)?
            .and_then(|e| e.kind.blob().map(|b| key.same_key(b.id)))
            .unwrap_or(false);
        if key.alias() != alias || !current {
            return Err(KeystoreError::store_state(
                "set entry",
                &format!("key from alias '{}' cannot be stored under '{}'", key.alias(), alias),
                error_codes::KEY_ALIAS_MISMATCH,
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field("loaded", &self.loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests;
