use std::ops::Range;
use std::sync::Arc;

use chrono::Utc;
use zeroize::Zeroizing;

use super::rsa_engine::{RsaEngine, RsaKeyRef, RsaOperation};
use super::symmetric::{AesCore, BlockEngine, CtrEngine, GcmEngine, AES_BLOCK_SIZE, GCM_NONCE_LEN};
use super::CipherSpi;
use crate::algorithm::{
    BlockMode, CipherTransformation, Digest, EncryptionPadding, KeyAlgorithm, Purposes,
    ServiceDescriptor, ServiceRegistry, ServiceType, SignaturePadding,
};
use crate::authorization::{check_authorized_for_operation, KeyClass, OperationRequest};
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{Key, KeyBlob, KeyMaterial, OpaqueKey, PublicKey, TransparentPrivateKey, TransparentSecretKey};
use crate::utils::{default_source, mixed_bytes, EntropySource};

/// Default GCM tag length when the cipher generates its own nonce
pub const DEFAULT_GCM_TAG_LEN_BITS: u32 = 128;

/// What a cipher session is initialized to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Encrypt,
    Decrypt,
    /// Encrypt exported key material through [`Cipher::wrap`]
    Wrap,
    /// Decrypt key material through [`Cipher::unwrap`]
    Unwrap,
}

impl CipherMode {
    fn encrypts(&self) -> bool {
        matches!(self, CipherMode::Encrypt | CipherMode::Wrap)
    }

    /// The key purpose this mode is authorized against
    fn purpose(&self) -> Purposes {
        if self.encrypts() {
            Purposes::ENCRYPT
        } else {
            Purposes::DECRYPT
        }
    }
}

/// Kind of key produced by [`Cipher::unwrap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Private,
    Secret,
}

/// Algorithm parameters for cipher init
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherParameters {
    /// 16-byte IV for CBC or initial counter block for CTR
    Iv(Vec<u8>),
    /// 12-byte nonce and tag length in bits (96..=128, multiple of 8)
    Gcm { tag_len_bits: u32, nonce: Vec<u8> },
    /// OAEP main digest and MGF1 digest
    Oaep { digest: Digest, mgf1_digest: Digest },
}

/// A key a cipher can be initialized with
#[derive(Debug, Clone)]
pub enum BoundKey {
    Opaque(OpaqueKey),
    Public(PublicKey),
}

impl From<OpaqueKey> for BoundKey {
    fn from(key: OpaqueKey) -> Self {
        BoundKey::Opaque(key)
    }
}

impl From<&OpaqueKey> for BoundKey {
    fn from(key: &OpaqueKey) -> Self {
        BoundKey::Opaque(key.clone())
    }
}

impl From<PublicKey> for BoundKey {
    fn from(key: PublicKey) -> Self {
        BoundKey::Public(key)
    }
}

impl From<&PublicKey> for BoundKey {
    fn from(key: &PublicKey) -> Self {
        BoundKey::Public(key.clone())
    }
}

struct CipherSession {
    mode: CipherMode,
    engine: Box<dyn CipherSpi>,
    iv: Option<Vec<u8>>,
    parameters: Option<CipherParameters>,
    /// Encryption under an IV: refuse further input after `do_final`
    single_shot: bool,
    finished: bool,
}

/// A stateful encryption or decryption session.
///
/// # Examples
///
/// ```no_run
/// use hwkeystore::operation::{Cipher, CipherMode};
/// # fn demo(key: &hwkeystore::keys::OpaqueKey) -> hwkeystore::error::KeystoreResult<()> {
/// let mut cipher = Cipher::get_instance("AES/GCM/NoPadding")?;
/// cipher.init(CipherMode::Encrypt, key)?;
/// let ciphertext = cipher.do_final(b"attack at dawn")?;
/// let params = cipher.parameters().cloned();
/// # Ok(())
/// # }
/// ```
pub struct Cipher {
    transformation: CipherTransformation,
    session: Option<CipherSession>,
}

impl Cipher {
    /// # Errors
    ///
    /// `NoSuchAlgorithm` for an unsupported transformation.
    pub fn get_instance(transformation: &str) -> KeystoreResult<Self> {
        match ServiceRegistry::global().resolve(ServiceType::Cipher, transformation)? {
            ServiceDescriptor::Cipher(transformation) => Ok(Self {
                transformation,
                session: None,
            }),
            _ => Err(KeystoreError::no_such_algorithm("Cipher", transformation)),
        }
    }

    pub fn transformation(&self) -> &CipherTransformation {
        &self.transformation
    }

    pub fn algorithm(&self) -> String {
        self.transformation.name()
    }

    pub fn init(&mut self, mode: CipherMode, key: impl Into<BoundKey>) -> KeystoreResult<()> {
        self.init_with_random(mode, key, None, default_source())
    }

    pub fn init_with_params(
        &mut self,
        mode: CipherMode,
        key: impl Into<BoundKey>,
        params: &CipherParameters,
    ) -> KeystoreResult<()> {
        self.init_with_random(mode, key, Some(params), default_source())
    }

    /// Initialize, drawing any generated IV and any padding randomness from
    /// `random`.
    ///
    /// Any previous session is discarded first, so a failed init leaves the
    /// cipher uninitialized.
    ///
    /// # Errors
    ///
    /// * `InvalidKey` when the key does not fit the transformation, the key's
    ///   authorizations deny the request, the key was deleted, or decryption
    ///   is requested without an IV.
    /// * `InvalidParameter` for malformed IVs, nonces or tag lengths.
    pub fn init_with_random(
        &mut self,
        mode: CipherMode,
        key: impl Into<BoundKey>,
        params: Option<&CipherParameters>,
        mut random: Box<dyn EntropySource>,
    ) -> KeystoreResult<()> {
        self.session = None;
        let key = key.into();
        let session = match self.transformation.algorithm {
            KeyAlgorithm::Aes => self.init_aes(mode, &key, params, random.as_mut())?,
            KeyAlgorithm::Rsa => self.init_rsa(mode, &key, params, random)?,
            other => {
                return Err(KeystoreError::Internal(format!(
                    "cipher transformation with key algorithm {}",
                    other
                )))
            }
        };
        log::debug!("Cipher {} initialized for {:?}", self.transformation.name(), mode);
        self.session = Some(session);
        Ok(())
    }

    fn init_aes(
        &self,
        mode: CipherMode,
        key: &BoundKey,
        params: Option<&CipherParameters>,
        random: &mut dyn EntropySource,
    ) -> KeystoreResult<CipherSession> {
        let block_mode = self
            .transformation
            .block_mode
            .ok_or_else(|| KeystoreError::Internal("AES transformation without a block mode".to_string()))?;
        let padding = self.transformation.padding;

        let blob = resolve_opaque(key, KeyAlgorithm::Aes, "cipher init")?;
        let request = OperationRequest::new(mode.purpose(), KeyClass::Secret)
            .with_block_mode(block_mode)
            .with_encryption_padding(padding)
            .with_caller_iv(mode.encrypts() && params.is_some());
        check_authorized_for_operation(&blob.authorizations, &request, Utc::now())?;

        let key_bytes = match &blob.material {
            KeyMaterial::Symmetric(bytes) => bytes,
            _ => return Err(key_type_mismatch("AES cipher", "an AES secret key")),
        };

        let (iv, tag_len_bits) = resolve_iv(block_mode, mode, params, random)?;
        let encrypting = mode.encrypts();
        let engine: Box<dyn CipherSpi> = match block_mode {
            BlockMode::Ecb | BlockMode::Cbc => Box::new(BlockEngine::new(
                AesCore::new(key_bytes)?,
                iv.as_deref(),
                encrypting,
                padding == EncryptionPadding::Pkcs7,
            )?),
            BlockMode::Ctr => Box::new(CtrEngine::new(key_bytes, iv.as_deref().unwrap_or_default())?),
            BlockMode::Gcm => Box::new(GcmEngine::new(
                key_bytes,
                iv.as_deref().unwrap_or_default(),
                tag_len_bits,
                encrypting,
            )?),
        };

        let parameters = iv.as_ref().map(|iv| match block_mode {
            BlockMode::Gcm => CipherParameters::Gcm {
                tag_len_bits,
                nonce: iv.clone(),
            },
            _ => CipherParameters::Iv(iv.clone()),
        });

        Ok(CipherSession {
            mode,
            engine,
            single_shot: encrypting && block_mode != BlockMode::Ecb,
            iv,
            parameters,
            finished: false,
        })
    }

    fn init_rsa(
        &self,
        mode: CipherMode,
        key: &BoundKey,
        params: Option<&CipherParameters>,
        random: Box<dyn EntropySource>,
    ) -> KeystoreResult<CipherSession> {
        let padding = self.transformation.padding;
        let oaep = match (padding, params) {
            (EncryptionPadding::RsaOaep, Some(CipherParameters::Oaep { digest, mgf1_digest })) => {
                Some((*digest, *mgf1_digest))
            }
            (EncryptionPadding::RsaOaep, None) => Some((
                self.transformation.oaep_digest.unwrap_or(Digest::Sha1),
                Digest::Sha1,
            )),
            (_, None) => None,
            (_, Some(other)) => {
                return Err(KeystoreError::invalid_parameter(
                    "cipher parameters",
                    &format!("no parameters for {}", self.transformation.name()),
                    &format!("{:?}", other),
                ))
            }
        };

        let (key_ref, operation) = match key {
            BoundKey::Public(PublicKey::Rsa(public)) => {
                if !mode.encrypts() {
                    return Err(key_type_mismatch("RSA cipher", "a private key for decryption"));
                }
                (RsaKeyRef::Public(public.clone()), RsaOperation::Encrypt)
            }
            BoundKey::Public(_) => return Err(key_type_mismatch("RSA cipher", "an RSA key")),
            BoundKey::Opaque(_) => {
                let blob = resolve_opaque(key, KeyAlgorithm::Rsa, "cipher init")?;
                let request = if mode.encrypts() {
                    private_encrypt_request(padding)?
                } else {
                    let mut request = OperationRequest::new(Purposes::DECRYPT, KeyClass::Private)
                        .with_encryption_padding(padding);
                    if let Some((digest, _)) = oaep {
                        request = request.with_digest(digest);
                    }
                    request
                };
                check_authorized_for_operation(&blob.authorizations, &request, Utc::now())?;
                let operation = if mode.encrypts() {
                    RsaOperation::PrivateEncrypt
                } else {
                    RsaOperation::Decrypt
                };
                (RsaKeyRef::Private(blob), operation)
            }
        };

        Ok(CipherSession {
            mode,
            engine: Box::new(RsaEngine::new(key_ref, operation, padding, oaep, random)),
            iv: None,
            parameters: oaep.map(|(digest, mgf1_digest)| CipherParameters::Oaep { digest, mgf1_digest }),
            single_shot: false,
            finished: false,
        })
    }

    fn session_for(&mut self, operation: &str, wrapping: bool) -> KeystoreResult<&mut CipherSession> {
        let session = self.session.as_mut().ok_or_else(|| {
            KeystoreError::illegal_state(operation, "cipher not initialized", error_codes::NOT_INITIALIZED)
        })?;
        let wrap_mode = matches!(session.mode, CipherMode::Wrap | CipherMode::Unwrap);
        if wrap_mode != wrapping {
            return Err(KeystoreError::illegal_state(
                operation,
                &format!("not available in {:?} mode", session.mode),
                error_codes::WRONG_MODE,
            ));
        }
        if session.finished {
            return Err(KeystoreError::illegal_state(
                operation,
                "encryption finished; re-initialize to avoid IV reuse",
                error_codes::SESSION_FINALIZED,
            ));
        }
        Ok(session)
    }

    /// Continue a multi-part operation
    pub fn update(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        self.session_for("update", false)?.engine.update(input)
    }

    /// Supply additional authenticated data. Only valid for GCM, and only
    /// before the first `update` with data.
    pub fn update_aad(&mut self, aad: &[u8]) -> KeystoreResult<()> {
        self.session_for("update AAD", false)?.engine.update_aad(aad)
    }

    /// Finish the operation. Decryption and ECB sessions can be reused
    /// afterwards; IV-bearing encryption must be re-initialized.
    pub fn do_final(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        let session = self.session_for("do final", false)?;
        let result = session.engine.do_final(input);
        if session.single_shot {
            session.finished = true;
        }
        result
    }

    /// `update` into a caller buffer; returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `output` cannot hold the result, checked before
    /// any state changes. The exact output length is used when the mode
    /// allows it, otherwise the [`get_output_size`](Self::get_output_size)
    /// bound.
    pub fn update_into(&mut self, input: &[u8], output: &mut [u8]) -> KeystoreResult<usize> {
        check_output_capacity(self.required_capacity(input, false)?, output.len())?;
        let out = self.update(input)?;
        output[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }

    pub fn do_final_into(&mut self, input: &[u8], output: &mut [u8]) -> KeystoreResult<usize> {
        check_output_capacity(self.required_capacity(input, true)?, output.len())?;
        let out = self.do_final(input)?;
        output[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }

    /// `update` with input and output in one buffer. The regions may
    /// overlap: input is fully consumed before output is written.
    pub fn update_in_place(
        &mut self,
        buffer: &mut [u8],
        input: Range<usize>,
        output_offset: usize,
    ) -> KeystoreResult<usize> {
        let data = take_input(buffer, &input)?;
        let start = output_offset.min(buffer.len());
        self.update_into(&data, &mut buffer[start..])
    }

    pub fn do_final_in_place(
        &mut self,
        buffer: &mut [u8],
        input: Range<usize>,
        output_offset: usize,
    ) -> KeystoreResult<usize> {
        let data = take_input(buffer, &input)?;
        let start = output_offset.min(buffer.len());
        self.do_final_into(&data, &mut buffer[start..])
    }

    /// Upper bound on the output of the next `update` or `do_final` given
    /// `input_len` more bytes
    pub fn get_output_size(&self, input_len: usize) -> KeystoreResult<usize> {
        self.session
            .as_ref()
            .map(|s| s.engine.output_size(input_len))
            .ok_or_else(|| {
                KeystoreError::illegal_state("get output size", "cipher not initialized", error_codes::NOT_INITIALIZED)
            })
    }

    fn required_capacity(&self, input: &[u8], finishing: bool) -> KeystoreResult<usize> {
        let bound = self.get_output_size(input.len())?;
        Ok(self
            .session
            .as_ref()
            .and_then(|s| s.engine.exact_output_size(input, finishing))
            .unwrap_or(bound))
    }

    /// The IV or nonce in use, whether supplied or generated
    pub fn iv(&self) -> Option<&[u8]> {
        self.session.as_ref().and_then(|s| s.iv.as_deref())
    }

    /// Parameters needed to decrypt what this session encrypts
    pub fn parameters(&self) -> Option<&CipherParameters> {
        self.session.as_ref().and_then(|s| s.parameters.as_ref())
    }

    pub fn block_size(&self) -> usize {
        match &self.session {
            Some(session) => session.engine.block_size(),
            None if self.transformation.algorithm == KeyAlgorithm::Aes => AES_BLOCK_SIZE,
            None => 0,
        }
    }

    /// Encrypt exportable key material. Only transparent keys can be wrapped.
    pub fn wrap(&mut self, key: &Key) -> KeystoreResult<Vec<u8>> {
        let encoded = match key {
            Key::Opaque(k) => {
                return Err(KeystoreError::invalid_key(
                    "wrap",
                    &format!("key '{}' is held by the keystore and cannot be exported", k.alias()),
                    error_codes::KEY_NOT_EXPORTABLE,
                ))
            }
            Key::PrivateMaterial(k) => k.encoded(),
            Key::SecretMaterial(k) => k.encoded(),
        };
        let session = self.session_for("wrap", true)?;
        if session.mode != CipherMode::Wrap {
            return Err(KeystoreError::illegal_state("wrap", "cipher is in unwrap mode", error_codes::WRONG_MODE));
        }
        let result = session.engine.do_final(encoded);
        if session.single_shot {
            session.finished = true;
        }
        result
    }

    /// Decrypt wrapped key material into a transparent key of `algorithm`
    pub fn unwrap(&mut self, wrapped: &[u8], algorithm: &str, key_type: KeyType) -> KeystoreResult<Key> {
        let session = self.session_for("unwrap", true)?;
        if session.mode != CipherMode::Unwrap {
            return Err(KeystoreError::illegal_state("unwrap", "cipher is in wrap mode", error_codes::WRONG_MODE));
        }
        let plaintext = Zeroizing::new(session.engine.do_final(wrapped)?);
        match key_type {
            KeyType::Secret => Ok(Key::SecretMaterial(TransparentSecretKey::new(&plaintext, algorithm)?)),
            KeyType::Private => {
                let expected = KeyAlgorithm::from_name(algorithm)?;
                let key = TransparentPrivateKey::from_pkcs8_der(&plaintext)?;
                if key.algorithm() != expected {
                    return Err(KeystoreError::invalid_parameter(
                        "unwrapped key algorithm",
                        expected.name(),
                        key.algorithm().name(),
                    ));
                }
                Ok(Key::PrivateMaterial(key))
            }
        }
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("transformation", &self.transformation.name())
            .field("mode", &self.session.as_ref().map(|s| s.mode))
            .finish()
    }
}

fn key_type_mismatch(operation: &str, expected: &str) -> KeystoreError {
    KeystoreError::invalid_key(operation, &format!("expected {}", expected), error_codes::KEY_TYPE_MISMATCH)
}

/// The blob behind an opaque key of `algorithm`
pub(crate) fn resolve_opaque(key: &BoundKey, algorithm: KeyAlgorithm, operation: &str) -> KeystoreResult<Arc<KeyBlob>> {
    match key {
        BoundKey::Opaque(k) if k.algorithm() == algorithm => k.resolve(operation),
        BoundKey::Opaque(k) => Err(key_type_mismatch(operation, &format!("a {} key, got {}", algorithm, k.algorithm()))),
        BoundKey::Public(_) => Err(key_type_mismatch(operation, &format!("a {} keystore key", algorithm))),
    }
}

/// Private-key encryption is raw signing and is authorized as such
fn private_encrypt_request(padding: EncryptionPadding) -> KeystoreResult<OperationRequest> {
    let request = OperationRequest::new(Purposes::SIGN, KeyClass::Private).with_digest(Digest::None);
    match padding {
        EncryptionPadding::None => Ok(request),
        EncryptionPadding::RsaPkcs1 => Ok(request.with_signature_padding(SignaturePadding::RsaPkcs1)),
        other => Err(key_type_mismatch(
            "RSA cipher",
            &format!("a public key for {} encryption", other),
        )),
    }
}

/// Pick the IV for an AES session, generating one for encryption when the
/// caller supplied none
fn resolve_iv(
    block_mode: BlockMode,
    mode: CipherMode,
    params: Option<&CipherParameters>,
    random: &mut dyn EntropySource,
) -> KeystoreResult<(Option<Vec<u8>>, u32)> {
    let iv_len = block_mode.iv_length();
    match (block_mode, params) {
        (BlockMode::Ecb, None) => Ok((None, 0)),
        (BlockMode::Ecb, Some(_)) => Err(KeystoreError::invalid_parameter_with_code(
            "IV",
            "no IV for ECB",
            "an IV",
            error_codes::INVALID_IV,
        )),
        (BlockMode::Cbc | BlockMode::Ctr, Some(CipherParameters::Iv(iv))) => {
            if iv.len() != iv_len {
                return Err(KeystoreError::invalid_parameter_with_code(
                    "IV",
                    &format!("{} bytes", iv_len),
                    &iv.len().to_string(),
                    error_codes::INVALID_IV,
                ));
            }
            Ok((Some(iv.clone()), 0))
        }
        (BlockMode::Gcm, Some(CipherParameters::Gcm { tag_len_bits, nonce })) => {
            if nonce.len() != GCM_NONCE_LEN {
                return Err(KeystoreError::invalid_parameter_with_code(
                    "GCM nonce",
                    "12 bytes",
                    &nonce.len().to_string(),
                    error_codes::INVALID_IV,
                ));
            }
            Ok((Some(nonce.clone()), *tag_len_bits))
        }
        (_, Some(other)) => Err(KeystoreError::invalid_parameter(
            "cipher parameters",
            &format!("parameters for {}", block_mode),
            &format!("{:?}", other),
        )),
        (_, None) if mode.encrypts() => {
            let tag = if block_mode == BlockMode::Gcm { DEFAULT_GCM_TAG_LEN_BITS } else { 0 };
            Ok((Some(mixed_bytes(random, iv_len)?), tag))
        }
        (_, None) => Err(KeystoreError::invalid_key(
            "cipher init",
            &format!("{} decryption requires the IV used for encryption", block_mode),
            error_codes::IV_REQUIRED,
        )),
    }
}

fn check_output_capacity(needed: usize, available: usize) -> KeystoreResult<()> {
    if available < needed {
        return Err(KeystoreError::invalid_parameter(
            "output buffer",
            &format!("at least {} bytes", needed),
            &available.to_string(),
        ));
    }
    Ok(())
}

fn take_input(buffer: &[u8], input: &Range<usize>) -> KeystoreResult<Vec<u8>> {
    buffer
        .get(input.clone())
        .map(<[u8]>::to_vec)
        .ok_or_else(|| {
            KeystoreError::invalid_parameter(
                "input range",
                &format!("within a {}-byte buffer", buffer.len()),
                &format!("{:?}", input),
            )
        })
}
