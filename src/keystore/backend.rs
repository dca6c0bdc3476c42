//! The alias namespace behind every `Keystore` handle.
//!
//! All mutations take the write lock for the whole check-then-insert, so a
//! reader observes either the previous entry or the committed new one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::EntryKind;
use crate::authorization::AuthorizationSet;
use crate::config::KeystoreConfig;
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{Certificate, KeyBlob, KeyMaterial, KeyOrigin, OpaqueKey};

/// What an alias maps to inside the backend
#[derive(Clone)]
pub(crate) enum StoredKind {
    PrivateKey {
        blob: Arc<KeyBlob>,
        chain: Vec<Certificate>,
    },
    SecretKey {
        blob: Arc<KeyBlob>,
    },
    TrustedCertificate {
        certificate: Certificate,
    },
}

impl StoredKind {
    pub(crate) fn kind(&self) -> EntryKind {
        match self {
            StoredKind::PrivateKey { .. } => EntryKind::PrivateKey,
            StoredKind::SecretKey { .. } => EntryKind::SecretKey,
            StoredKind::TrustedCertificate { .. } => EntryKind::TrustedCertificate,
        }
    }

    pub(crate) fn blob(&self) -> Option<&Arc<KeyBlob>> {
        match self {
            StoredKind::PrivateKey { blob, .. } | StoredKind::SecretKey { blob } => Some(blob),
            StoredKind::TrustedCertificate { .. } => None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct StoredEntry {
    pub(crate) kind: StoredKind,
    pub(crate) created: DateTime<Utc>,
}

pub(crate) struct Backend {
    config: KeystoreConfig,
    entries: RwLock<HashMap<String, StoredEntry>>,
    next_key_id: AtomicU64,
}

impl Backend {
    pub(crate) fn new(config: KeystoreConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            next_key_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn config(&self) -> &KeystoreConfig {
        &self.config
    }

    /// Whether `alias` still maps to the key with `key_id`
    pub(crate) fn is_current_key(&self, alias: &str, key_id: u64) -> bool {
        match self.entries.read() {
            Ok(entries) => entries
                .get(alias)
                .and_then(|entry| entry.kind.blob())
                .map(|blob| blob.id == key_id)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    pub(crate) fn get(&self, alias: &str) -> KeystoreResult<Option<StoredEntry>> {
        Ok(self.entries.read()?.get(alias).cloned())
    }

    pub(crate) fn contains(&self, alias: &str) -> KeystoreResult<bool> {
        Ok(self.entries.read()?.contains_key(alias))
    }

    pub(crate) fn len(&self) -> KeystoreResult<usize> {
        Ok(self.entries.read()?.len())
    }

    pub(crate) fn aliases(&self) -> KeystoreResult<Vec<String>> {
        Ok(self.entries.read()?.keys().cloned().collect())
    }

    /// Run `f` over a consistent view of the namespace
    pub(crate) fn read_with<R>(&self, f: impl FnOnce(&HashMap<String, StoredEntry>) -> R) -> KeystoreResult<R> {
        Ok(f(&*self.entries.read()?))
    }

    /// Check and mutate under one write lock. `f` sees the current entry for
    /// `alias` and returns the replacement; an error leaves the namespace
    /// untouched.
    pub(crate) fn update(
        &self,
        alias: &str,
        f: impl FnOnce(Option<&StoredEntry>) -> KeystoreResult<StoredEntry>,
    ) -> KeystoreResult<()> {
        let mut entries = self.entries.write()?;
        let current = entries.get(alias);
        if current.is_none() {
            if let Some(limit) = self.config.max_entries {
                if entries.len() >= limit {
                    return Err(KeystoreError::store_state(
                        "insert entry",
                        &format!("keystore already holds the maximum of {} entries", limit),
                        error_codes::CAPACITY_EXCEEDED,
                    ));
                }
            }
        }
        let replacement = f(current)?;
        entries.insert(alias.to_string(), replacement);
        Ok(())
    }

    pub(crate) fn insert(&self, alias: &str, kind: StoredKind) -> KeystoreResult<()> {
        self.update(alias, |_| {
            Ok(StoredEntry {
                kind,
                created: Utc::now(),
            })
        })
    }

    /// Remove `alias`, reporting whether it existed
    pub(crate) fn remove(&self, alias: &str) -> KeystoreResult<bool> {
        Ok(self.entries.write()?.remove(alias).is_some())
    }

    /// Bind new key material to `alias`, replacing whatever was there.
    ///
    /// `chain` must be `Some` for private keys and `None` for secret keys.
    pub(crate) fn store_key(
        backend: &Arc<Backend>,
        alias: &str,
        material: KeyMaterial,
        authorizations: AuthorizationSet,
        origin: KeyOrigin,
        chain: Option<Vec<Certificate>>,
    ) -> KeystoreResult<OpaqueKey> {
        if authorizations.is_encryption_required() && !backend.config.lock_screen_configured {
            return Err(KeystoreError::store_state(
                "store key",
                "encryption at rest requires a configured lock screen",
                error_codes::ENCRYPTED_STORAGE_UNAVAILABLE,
            ));
        }

        let blob = Arc::new(KeyBlob {
            id: backend.next_key_id.fetch_add(1, Ordering::SeqCst),
            alias: alias.to_string(),
            material,
            authorizations,
            origin,
            inside_secure_hardware: backend.config.security_level.is_secure_hardware(),
        });
        let kind = match chain {
            Some(chain) => StoredKind::PrivateKey {
                blob: Arc::clone(&blob),
                chain,
            },
            None => StoredKind::SecretKey {
                blob: Arc::clone(&blob),
            },
        };
        backend.insert(alias, kind)?;

        log::info!(
            "Stored {} {} key under alias '{}' ({:?})",
            blob.authorizations.key_size(),
            blob.authorizations.algorithm(),
            alias,
            origin
        );
        Ok(OpaqueKey::new(blob, Arc::downgrade(backend)))
    }

    pub(crate) fn handle(backend: &Arc<Backend>, blob: &Arc<KeyBlob>) -> OpaqueKey {
        OpaqueKey::new(Arc::clone(blob), Arc::downgrade(backend))
    }
}
