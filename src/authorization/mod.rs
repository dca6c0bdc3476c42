/*!
 * Authorization engine
 *
 * Every key carries an immutable `AuthorizationSet` fixed at generation or
 * import time. Operations are checked against it once, when they are
 * initialized; a denial surfaces as an invalid-key error and never later.
 */

mod enforcement;
mod protection;

pub use enforcement::*;
pub use protection::*;

use chrono::{DateTime, Utc};

use crate::algorithm::{BlockMode, Digest, EncryptionPadding, KeyAlgorithm, Purposes, SignaturePadding};
use crate::error::{error_codes, KeystoreError, KeystoreResult};

/// The enforced envelope of a stored key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationSet {
    algorithm: KeyAlgorithm,
    key_size: u32,
    purposes: Purposes,
    digests: Vec<Digest>,
    block_modes: Vec<BlockMode>,
    encryption_paddings: Vec<EncryptionPadding>,
    signature_paddings: Vec<SignaturePadding>,
    key_validity_start: Option<DateTime<Utc>>,
    key_validity_for_origination_end: Option<DateTime<Utc>>,
    key_validity_for_consumption_end: Option<DateTime<Utc>>,
    randomized_encryption_required: bool,
    encryption_required: bool,
}

impl AuthorizationSet {
    /// Resolve caller protection parameters into the set bound to a new key.
    ///
    /// Unspecified digests default from context: an HMAC key gets the single
    /// digest its algorithm implies, any other key gets none. Unspecified
    /// block modes and paddings resolve to the empty set.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` when the protection is inconsistent with the key:
    /// an HMAC key authorized for anything other than exactly its own digest,
    /// a symmetric key with no purposes, or randomized encryption required
    /// while a deterministic mode or padding is authorized.
    pub fn resolve(
        protection: &KeyProtection,
        algorithm: KeyAlgorithm,
        key_size: u32,
    ) -> KeystoreResult<Self> {
        let digests = match (algorithm.hmac_digest(), protection.digests()) {
            (Some(implied), None) => vec![implied],
            (Some(implied), Some(requested)) => {
                if requested.len() != 1 || requested[0] != implied {
                    return Err(KeystoreError::invalid_parameter_with_code(
                        "digests",
                        &format!("exactly [{}] for {}", implied, algorithm),
                        &format_list(requested),
                        error_codes::INVALID_DIGEST_SET,
                    ));
                }
                vec![implied]
            }
            (None, requested) => requested.map(<[Digest]>::to_vec).unwrap_or_default(),
        };

        if algorithm.is_symmetric() && protection.purposes().is_empty() {
            return Err(KeystoreError::invalid_parameter_with_code(
                "purposes",
                "at least one purpose for a secret key",
                "none",
                error_codes::INVALID_AUTHORIZATION,
            ));
        }

        let block_modes = protection.block_modes().map(<[BlockMode]>::to_vec).unwrap_or_default();
        let encryption_paddings = protection
            .encryption_paddings()
            .map(<[EncryptionPadding]>::to_vec)
            .unwrap_or_default();
        let signature_paddings = protection
            .signature_paddings()
            .map(<[SignaturePadding]>::to_vec)
            .unwrap_or_default();

        let encrypts = protection.purposes().contains(Purposes::ENCRYPT)
            || protection.purposes().contains(Purposes::WRAP);
        if protection.is_randomized_encryption_required() && encrypts {
            if let Some(mode) = block_modes.iter().find(|m| m.is_deterministic()) {
                return Err(randomization_conflict("block mode", mode.name()));
            }
            if algorithm == KeyAlgorithm::Rsa && encryption_paddings.contains(&EncryptionPadding::None) {
                return Err(randomization_conflict("encryption padding", EncryptionPadding::None.name()));
            }
        }

        Ok(Self {
            algorithm,
            key_size,
            purposes: protection.purposes(),
            digests,
            block_modes,
            encryption_paddings,
            signature_paddings,
            key_validity_start: protection.key_validity_start(),
            key_validity_for_origination_end: protection.key_validity_for_origination_end(),
            key_validity_for_consumption_end: protection.key_validity_for_consumption_end(),
            randomized_encryption_required: protection.is_randomized_encryption_required(),
            encryption_required: protection.is_encryption_required(),
        })
    }

    /// Authorizations for a private key imported without protection
    /// parameters: every purpose, digest and padding, no validity bounds and
    /// no randomization requirement.
    pub fn unrestricted(algorithm: KeyAlgorithm, key_size: u32) -> Self {
        Self {
            algorithm,
            key_size,
            purposes: Purposes::all(),
            digests: Digest::ALL.to_vec(),
            block_modes: Vec::new(),
            encryption_paddings: match algorithm {
                KeyAlgorithm::Rsa => vec![
                    EncryptionPadding::None,
                    EncryptionPadding::RsaPkcs1,
                    EncryptionPadding::RsaOaep,
                ],
                _ => Vec::new(),
            },
            signature_paddings: match algorithm {
                KeyAlgorithm::Rsa => SignaturePadding::ALL.to_vec(),
                _ => Vec::new(),
            },
            key_validity_start: None,
            key_validity_for_origination_end: None,
            key_validity_for_consumption_end: None,
            randomized_encryption_required: false,
            encryption_required: false,
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn key_size(&self) -> u32 {
        self.key_size
    }

    pub fn purposes(&self) -> Purposes {
        self.purposes
    }

    pub fn digests(&self) -> &[Digest] {
        &self.digests
    }

    pub fn block_modes(&self) -> &[BlockMode] {
        &self.block_modes
    }

    pub fn encryption_paddings(&self) -> &[EncryptionPadding] {
        &self.encryption_paddings
    }

    pub fn signature_paddings(&self) -> &[SignaturePadding] {
        &self.signature_paddings
    }

    pub fn key_validity_start(&self) -> Option<DateTime<Utc>> {
        self.key_validity_start
    }

    pub fn key_validity_for_origination_end(&self) -> Option<DateTime<Utc>> {
        self.key_validity_for_origination_end
    }

    pub fn key_validity_for_consumption_end(&self) -> Option<DateTime<Utc>> {
        self.key_validity_for_consumption_end
    }

    pub fn is_randomized_encryption_required(&self) -> bool {
        self.randomized_encryption_required
    }

    pub fn is_encryption_required(&self) -> bool {
        self.encryption_required
    }
}

fn randomization_conflict(what: &str, name: &str) -> KeystoreError {
    KeystoreError::invalid_parameter_with_code(
        what,
        "a randomized scheme while randomized encryption is required",
        name,
        error_codes::INVALID_AUTHORIZATION,
    )
}

fn format_list<T: std::fmt::Display>(items: &[T]) -> String {
    let names: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    format!("[{}]", names.join(", "))
}
