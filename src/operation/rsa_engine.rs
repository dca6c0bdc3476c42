//! RSA encryption engine. Input is buffered and transformed in one step at
//! `do_final`; `update` never produces output.

use std::sync::Arc;

use rsa::hazmat::{rsa_decrypt_and_check, rsa_encrypt};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use super::{new_hasher, CipherSpi, DynHasher};
use crate::algorithm::{Digest, EncryptionPadding};
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{KeyBlob, KeyMaterial};
use crate::utils::{mixed_rng, EntropySource};

pub(crate) enum RsaKeyRef {
    Public(RsaPublicKey),
    Private(Arc<KeyBlob>),
}

/// Which RSA primitive a session applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RsaOperation {
    /// Public-key encryption
    Encrypt,
    /// Private-key decryption
    Decrypt,
    /// Raw private-key operation over caller data (legacy signing path)
    PrivateEncrypt,
}

pub(crate) fn rsa_private_key(blob: &KeyBlob) -> KeystoreResult<&RsaPrivateKey> {
    match &blob.material {
        KeyMaterial::Rsa(key) => Ok(key),
        _ => Err(KeystoreError::invalid_key(
            "RSA operation",
            &format!("key '{}' is not an RSA key", blob.alias),
            error_codes::KEY_TYPE_MISMATCH,
        )),
    }
}

pub(crate) struct RsaEngine {
    key: RsaKeyRef,
    operation: RsaOperation,
    padding: EncryptionPadding,
    /// OAEP main and MGF1 digests
    oaep: Option<(Digest, Digest)>,
    random: Box<dyn EntropySource>,
    buffer: Zeroizing<Vec<u8>>,
}

impl RsaEngine {
    pub(crate) fn new(
        key: RsaKeyRef,
        operation: RsaOperation,
        padding: EncryptionPadding,
        oaep: Option<(Digest, Digest)>,
        random: Box<dyn EntropySource>,
    ) -> Self {
        Self {
            key,
            operation,
            padding,
            oaep,
            random,
            buffer: Zeroizing::new(Vec::new()),
        }
    }

    /// Modulus length in bytes
    fn modulus_len(&self) -> KeystoreResult<usize> {
        let len = match &self.key {
            RsaKeyRef::Public(key) => key.size(),
            RsaKeyRef::Private(blob) => rsa_private_key(blob)?.size(),
        };
        Ok(len)
    }

    fn oaep_padding(&self) -> KeystoreResult<Oaep> {
        let (digest, mgf_digest) = self.oaep.unwrap_or((Digest::Sha1, Digest::Sha1));
        let hasher = |d: Digest| -> KeystoreResult<DynHasher> {
            new_hasher(d).ok_or_else(|| {
                KeystoreError::invalid_parameter("OAEP digest", "a hash function", d.name())
            })
        };
        Ok(Oaep {
            digest: hasher(digest)?,
            mgf_digest: hasher(mgf_digest)?,
            label: None,
        })
    }

    fn run(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        let k = self.modulus_len()?;
        match (self.operation, self.padding) {
            (RsaOperation::Encrypt, EncryptionPadding::None) => {
                let key = self.public_key()?;
                let m = raw_input(input, k, key.n())?;
                let c = rsa_encrypt(&key, &m).map_err(rsa_failure)?;
                Ok(left_pad(&c.to_bytes_be(), k))
            }
            (RsaOperation::Encrypt, EncryptionPadding::RsaPkcs1) => {
                let key = self.public_key()?;
                let mut rng = mixed_rng(self.random.as_mut(), k)?;
                key.encrypt(&mut rng, Pkcs1v15Encrypt, input).map_err(rsa_failure)
            }
            (RsaOperation::Encrypt, EncryptionPadding::RsaOaep) => {
                let key = self.public_key()?;
                let padding = self.oaep_padding()?;
                let draw = self.oaep.map(|(d, _)| d.output_size()).unwrap_or(20);
                let mut rng = mixed_rng(self.random.as_mut(), draw)?;
                key.encrypt(&mut rng, padding, input).map_err(rsa_failure)
            }
            (RsaOperation::Decrypt, padding) | (RsaOperation::PrivateEncrypt, padding) => {
                let blob = match &self.key {
                    RsaKeyRef::Private(blob) => Arc::clone(blob),
                    RsaKeyRef::Public(_) => {
                        return Err(KeystoreError::invalid_key(
                            "RSA private operation",
                            "a public key cannot decrypt",
                            error_codes::KEY_TYPE_MISMATCH,
                        ))
                    }
                };
                let key = rsa_private_key(&blob)?;
                let mut rng = mixed_rng(self.random.as_mut(), 0)?;
                match (self.operation, padding) {
                    (_, EncryptionPadding::None) => {
                        let c = raw_input(input, k, key.n())?;
                        let m = rsa_decrypt_and_check(key, Some(&mut rng), &c).map_err(rsa_failure)?;
                        Ok(left_pad(&m.to_bytes_be(), k))
                    }
                    (RsaOperation::Decrypt, EncryptionPadding::RsaPkcs1) => key
                        .decrypt_blinded(&mut rng, Pkcs1v15Encrypt, input)
                        .map_err(rsa_failure),
                    (RsaOperation::Decrypt, EncryptionPadding::RsaOaep) => key
                        .decrypt_blinded(&mut rng, self.oaep_padding()?, input)
                        .map_err(rsa_failure),
                    (RsaOperation::PrivateEncrypt, EncryptionPadding::RsaPkcs1) => key
                        .sign_with_rng(&mut rng, Pkcs1v15Sign::new_unprefixed(), input)
                        .map_err(rsa_failure),
                    (_, other) => Err(KeystoreError::invalid_key(
                        "RSA private operation",
                        &format!("{} is not usable with a private key here", other),
                        error_codes::KEY_TYPE_MISMATCH,
                    )),
                }
            }
            (_, other) => Err(KeystoreError::invalid_key(
                "RSA operation",
                &format!("{} is not an RSA padding", other),
                error_codes::KEY_TYPE_MISMATCH,
            )),
        }
    }

    fn public_key(&self) -> KeystoreResult<RsaPublicKey> {
        match &self.key {
            RsaKeyRef::Public(key) => Ok(key.clone()),
            RsaKeyRef::Private(blob) => Ok(rsa_private_key(blob)?.to_public_key()),
        }
    }
}

/// Interpret `input` as a big-endian integer below the modulus
fn raw_input(input: &[u8], k: usize, n: &BigUint) -> KeystoreResult<BigUint> {
    let too_large = || {
        KeystoreError::bad_padding(
            "RSA without padding",
            "input is larger than the modulus",
            error_codes::MESSAGE_TOO_LARGE,
        )
    };
    if input.len() > k {
        return Err(too_large());
    }
    let value = BigUint::from_bytes_be(input);
    if &value >= n {
        return Err(too_large());
    }
    Ok(value)
}

fn left_pad(bytes: &[u8], k: usize) -> Vec<u8> {
    let mut out = vec![0u8; k.saturating_sub(bytes.len())];
    out.extend_from_slice(bytes);
    out
}

fn rsa_failure(err: rsa::Error) -> KeystoreError {
    match err {
        rsa::Error::MessageTooLong => KeystoreError::illegal_block_size(
            "RSA do final",
            "input too long for the modulus and padding",
        ),
        rsa::Error::Decryption | rsa::Error::Verification => {
            KeystoreError::bad_padding("RSA do final", "decryption failed", error_codes::PADDING_INVALID)
        }
        other => KeystoreError::Internal(format!("RSA primitive failed: {}", other)),
    }
}

impl CipherSpi for RsaEngine {
    fn update(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        self.buffer.extend_from_slice(input);
        Ok(Vec::new())
    }

    fn do_final(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        let mut data = std::mem::replace(&mut self.buffer, Zeroizing::new(Vec::new()));
        data.extend_from_slice(input);
        self.run(&data)
    }

    fn output_size(&self, _input_len: usize) -> usize {
        self.modulus_len().unwrap_or(0)
    }

    fn block_size(&self) -> usize {
        0
    }
}
