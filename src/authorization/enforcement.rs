use chrono::{DateTime, Utc};
use log::warn;

use super::AuthorizationSet;
use crate::algorithm::{BlockMode, Digest, EncryptionPadding, KeyAlgorithm, Purposes, SignaturePadding};
use crate::error::{error_codes, KeystoreError, KeystoreResult};

/// Which half of a key an operation is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Public,
    Private,
    Secret,
}

/// What an operation asks to do with a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationRequest {
    /// Exactly one purpose bit
    pub purpose: Purposes,
    pub key_class: KeyClass,
    pub digest: Option<Digest>,
    pub block_mode: Option<BlockMode>,
    pub encryption_padding: Option<EncryptionPadding>,
    pub signature_padding: Option<SignaturePadding>,
    /// The caller supplied the IV or nonce for an encryption
    pub caller_supplied_iv: bool,
}

impl OperationRequest {
    pub fn new(purpose: Purposes, key_class: KeyClass) -> Self {
        Self {
            purpose,
            key_class,
            digest: None,
            block_mode: None,
            encryption_padding: None,
            signature_padding: None,
            caller_supplied_iv: false,
        }
    }

    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn with_block_mode(mut self, mode: BlockMode) -> Self {
        self.block_mode = Some(mode);
        self
    }

    pub fn with_encryption_padding(mut self, padding: EncryptionPadding) -> Self {
        self.encryption_padding = Some(padding);
        self
    }

    pub fn with_signature_padding(mut self, padding: SignaturePadding) -> Self {
        self.signature_padding = Some(padding);
        self
    }

    pub fn with_caller_iv(mut self, supplied: bool) -> Self {
        self.caller_supplied_iv = supplied;
        self
    }

    fn is_public_operation(&self) -> bool {
        self.key_class == KeyClass::Public
            && (self.purpose == Purposes::ENCRYPT || self.purpose == Purposes::VERIFY)
    }

    fn originates(&self) -> bool {
        self.purpose == Purposes::ENCRYPT || self.purpose == Purposes::SIGN || self.purpose == Purposes::WRAP
    }

    fn consumes(&self) -> bool {
        self.purpose == Purposes::DECRYPT || self.purpose == Purposes::VERIFY
    }
}

/// Check a request against a key's authorizations at time `now`.
///
/// Public-key encryption and verification are never restricted. Everything
/// else must match the set exactly: purpose, validity window, block mode,
/// padding, digest and the randomized-encryption requirement.
///
/// # Errors
///
/// `InvalidKey` with an authorization error code describing the first
/// failed check.
pub fn check_authorized_for_operation(
    auth: &AuthorizationSet,
    request: &OperationRequest,
    now: DateTime<Utc>,
) -> KeystoreResult<()> {
    if request.is_public_operation() {
        return Ok(());
    }

    let result = check_strict(auth, request, now);
    if let Err(err) = &result {
        warn!("authorization denied for {} key: {}", auth.algorithm(), err);
    }
    result
}

fn check_strict(
    auth: &AuthorizationSet,
    request: &OperationRequest,
    now: DateTime<Utc>,
) -> KeystoreResult<()> {
    if !auth.purposes().contains(request.purpose) {
        return Err(denied(
            error_codes::PURPOSE_NOT_AUTHORIZED,
            format!(
                "purpose {:?} not in {:?}",
                request.purpose,
                auth.purposes()
            ),
        ));
    }

    if let Some(start) = auth.key_validity_start() {
        if now < start {
            return Err(denied(
                error_codes::KEY_NOT_YET_VALID,
                format!("key not valid until {}", start.to_rfc3339()),
            ));
        }
    }
    if request.originates() {
        if let Some(end) = auth.key_validity_for_origination_end() {
            if now > end {
                return Err(denied(
                    error_codes::KEY_EXPIRED,
                    format!("key expired for origination at {}", end.to_rfc3339()),
                ));
            }
        }
    }
    if request.consumes() {
        if let Some(end) = auth.key_validity_for_consumption_end() {
            if now > end {
                return Err(denied(
                    error_codes::KEY_EXPIRED,
                    format!("key expired for consumption at {}", end.to_rfc3339()),
                ));
            }
        }
    }

    if let Some(mode) = request.block_mode {
        if !auth.block_modes().contains(&mode) {
            return Err(denied(
                error_codes::BLOCK_MODE_NOT_AUTHORIZED,
                format!("block mode {} not authorized", mode),
            ));
        }
    }
    if let Some(padding) = request.encryption_padding {
        if !auth.encryption_paddings().contains(&padding) {
            return Err(denied(
                error_codes::PADDING_NOT_AUTHORIZED,
                format!("encryption padding {} not authorized", padding),
            ));
        }
    }
    if let Some(padding) = request.signature_padding {
        if !auth.signature_paddings().contains(&padding) {
            return Err(denied(
                error_codes::PADDING_NOT_AUTHORIZED,
                format!("signature padding {} not authorized", padding),
            ));
        }
    }
    if let Some(digest) = request.digest {
        if !auth.digests().contains(&digest) {
            return Err(denied(
                error_codes::DIGEST_NOT_AUTHORIZED,
                format!("digest {} not authorized", digest),
            ));
        }
    }

    if auth.is_randomized_encryption_required()
        && (request.purpose == Purposes::ENCRYPT || request.purpose == Purposes::WRAP)
    {
        let deterministic_mode = request.block_mode.map(|m| m.is_deterministic()).unwrap_or(false);
        let deterministic_rsa = auth.algorithm() == KeyAlgorithm::Rsa
            && request.encryption_padding == Some(EncryptionPadding::None);
        if deterministic_mode || deterministic_rsa {
            return Err(denied(
                error_codes::RANDOMIZATION_REQUIRED,
                "randomized encryption required but the requested scheme is deterministic"
                    .to_string(),
            ));
        }
        if request.caller_supplied_iv {
            return Err(denied(
                error_codes::RANDOMIZATION_REQUIRED,
                "randomized encryption required; caller-provided IV not permitted".to_string(),
            ));
        }
    }

    Ok(())
}

fn denied(error_code: u32, cause: String) -> KeystoreError {
    KeystoreError::invalid_key("authorization", &cause, error_code)
}
