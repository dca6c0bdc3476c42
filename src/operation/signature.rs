use std::sync::Arc;

use chrono::Utc;
use ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use md5::Md5;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use super::{new_hasher, DynHasher};
use crate::algorithm::{
    Digest, KeyAlgorithm, Purposes, ServiceDescriptor, ServiceRegistry, ServiceType,
    SignatureAlgorithm, SignaturePadding,
};
use crate::authorization::{check_authorized_for_operation, KeyClass, OperationRequest};
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{Certificate, EcPrivateKey, EcPublicKey, KeyBlob, KeyMaterial, OpaqueKey, PublicKey};
use crate::utils::{default_source, mixed_rng, EntropySource};

/// Bytes drawn from the caller's source for an RSA-PSS signature
const PSS_ENTROPY_DRAW: usize = 20;

/// PKCS#1 v1.5 type 1 padding overhead
const PKCS1_OVERHEAD: usize = 11;

/// Accumulates the message: a running digest, or the raw bytes for `NONE`
enum MessageHasher {
    Raw(Zeroizing<Vec<u8>>),
    Digest(DynHasher),
}

impl MessageHasher {
    fn new(digest: Digest) -> Self {
        match new_hasher(digest) {
            Some(hasher) => MessageHasher::Digest(hasher),
            None => MessageHasher::Raw(Zeroizing::new(Vec::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            MessageHasher::Raw(buffer) => buffer.extend_from_slice(data),
            MessageHasher::Digest(hasher) => hasher.update(data),
        }
    }

    /// Digest (or raw message) so far, leaving the hasher empty
    fn finalize_reset(&mut self) -> Zeroizing<Vec<u8>> {
        match self {
            MessageHasher::Raw(buffer) => std::mem::replace(buffer, Zeroizing::new(Vec::new())),
            MessageHasher::Digest(hasher) => Zeroizing::new(hasher.finalize_reset().to_vec()),
        }
    }
}

enum SignatureState {
    Sign {
        blob: Arc<KeyBlob>,
        random: Box<dyn EntropySource>,
        hasher: MessageHasher,
    },
    Verify {
        key: PublicKey,
        hasher: MessageHasher,
    },
}

/// A signing or verification session.
///
/// `sign` and `verify` reset the session for another message under the same
/// key.
pub struct Signature {
    algorithm: SignatureAlgorithm,
    state: Option<SignatureState>,
}

impl Signature {
    pub fn get_instance(algorithm: &str) -> KeystoreResult<Self> {
        match ServiceRegistry::global().resolve(ServiceType::Signature, algorithm)? {
            ServiceDescriptor::Signature(algorithm) => Ok(Self {
                algorithm,
                state: None,
            }),
            _ => Err(KeystoreError::no_such_algorithm("Signature", algorithm)),
        }
    }

    pub fn algorithm(&self) -> &SignatureAlgorithm {
        &self.algorithm
    }

    pub fn init_sign(&mut self, key: &OpaqueKey) -> KeystoreResult<()> {
        self.init_sign_with_random(key, default_source())
    }

    /// # Errors
    ///
    /// `InvalidKey` if the key is not a private key of the signature's
    /// algorithm, was deleted, or is not authorized to sign with this digest
    /// and padding.
    pub fn init_sign_with_random(&mut self, key: &OpaqueKey, random: Box<dyn EntropySource>) -> KeystoreResult<()> {
        self.state = None;
        if !key.is_private() || key.algorithm() != self.algorithm.key_algorithm {
            return Err(KeystoreError::invalid_key(
                "signature init",
                &format!("{} needs a {} private key", self.algorithm.name(), self.algorithm.key_algorithm),
                error_codes::KEY_TYPE_MISMATCH,
            ));
        }
        let blob = key.resolve("signature init")?;

        let mut request = OperationRequest::new(Purposes::SIGN, KeyClass::Private).with_digest(self.algorithm.digest);
        if let Some(padding) = self.algorithm.padding {
            request = request.with_signature_padding(padding);
        }
        check_authorized_for_operation(&blob.authorizations, &request, Utc::now())?;

        log::debug!("Signature {} initialized for signing with '{}'", self.algorithm.name(), key.alias());
        self.state = Some(SignatureState::Sign {
            blob,
            random,
            hasher: MessageHasher::new(self.algorithm.digest),
        });
        Ok(())
    }

    /// Verification with a public key is never restricted by authorizations
    pub fn init_verify(&mut self, key: &PublicKey) -> KeystoreResult<()> {
        self.state = None;
        if key.algorithm() != self.algorithm.key_algorithm {
            return Err(KeystoreError::invalid_key(
                "signature init",
                &format!("{} needs a {} public key", self.algorithm.name(), self.algorithm.key_algorithm),
                error_codes::KEY_TYPE_MISMATCH,
            ));
        }
        log::debug!("Signature {} initialized for verification", self.algorithm.name());
        self.state = Some(SignatureState::Verify {
            key: key.clone(),
            hasher: MessageHasher::new(self.algorithm.digest),
        });
        Ok(())
    }

    /// Verify with the public key carried by `certificate`
    pub fn init_verify_certificate(&mut self, certificate: &Certificate) -> KeystoreResult<()> {
        self.init_verify(&certificate.public_key()?)
    }

    pub fn update(&mut self, data: &[u8]) -> KeystoreResult<()> {
        match &mut self.state {
            Some(SignatureState::Sign { hasher, .. }) | Some(SignatureState::Verify { hasher, .. }) => {
                hasher.update(data);
                Ok(())
            }
            None => Err(not_initialized("update")),
        }
    }

    pub fn sign(&mut self) -> KeystoreResult<Vec<u8>> {
        let algorithm = self.algorithm;
        match &mut self.state {
            Some(SignatureState::Sign { blob, random, hasher }) => {
                let prehash = hasher.finalize_reset();
                sign_prehash(&blob.material, algorithm, &prehash, random.as_mut())
            }
            Some(SignatureState::Verify { .. }) => Err(KeystoreError::illegal_state(
                "sign",
                "session initialized for verification",
                error_codes::WRONG_MODE,
            )),
            None => Err(not_initialized("sign")),
        }
    }

    /// `Ok(false)` for a signature that does not verify, including one that
    /// is malformed
    pub fn verify(&mut self, signature: &[u8]) -> KeystoreResult<bool> {
        let algorithm = self.algorithm;
        match &mut self.state {
            Some(SignatureState::Verify { key, hasher }) => {
                let prehash = hasher.finalize_reset();
                verify_prehash(key, algorithm, &prehash, signature)
            }
            Some(SignatureState::Sign { .. }) => Err(KeystoreError::illegal_state(
                "verify",
                "session initialized for signing",
                error_codes::WRONG_MODE,
            )),
            None => Err(not_initialized("verify")),
        }
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            Some(SignatureState::Sign { .. }) => "sign",
            Some(SignatureState::Verify { .. }) => "verify",
            None => "uninitialized",
        };
        f.debug_struct("Signature")
            .field("algorithm", &self.algorithm.name())
            .field("state", &state)
            .finish()
    }
}

fn not_initialized(operation: &str) -> KeystoreError {
    KeystoreError::illegal_state(operation, "signature not initialized", error_codes::NOT_INITIALIZED)
}

fn signing_failed(err: impl std::fmt::Display) -> KeystoreError {
    KeystoreError::signature_error("sign", &err.to_string(), error_codes::SIGNING_FAILED)
}

fn unsupported_digest(digest: Digest, scheme: &str) -> KeystoreError {
    KeystoreError::invalid_parameter("digest", &format!("a digest usable with {}", scheme), digest.name())
}

fn pkcs1_scheme(digest: Digest) -> Pkcs1v15Sign {
    match digest {
        Digest::None => Pkcs1v15Sign::new_unprefixed(),
        Digest::Md5 => Pkcs1v15Sign::new::<Md5>(),
        Digest::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        Digest::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
        Digest::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        Digest::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        Digest::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

/// PSS with a salt as long as the digest and MGF1 over the same digest
fn pss_scheme(digest: Digest) -> KeystoreResult<Pss> {
    let scheme = match digest {
        Digest::Sha1 => Pss::new::<Sha1>(),
        Digest::Sha224 => Pss::new::<Sha224>(),
        Digest::Sha256 => Pss::new::<Sha256>(),
        Digest::Sha384 => Pss::new::<Sha384>(),
        Digest::Sha512 => Pss::new::<Sha512>(),
        other => return Err(unsupported_digest(other, "RSA-PSS")),
    };
    Ok(scheme)
}

/// Bring a prehash to the length the curve's ECDSA expects. Short inputs
/// are left-padded, which keeps their integer value; long ones are
/// truncated to their leftmost bits by the signer itself.
fn ecdsa_prehash(prehash: &[u8], field_size: usize) -> Vec<u8> {
    if prehash.len() >= field_size {
        return prehash.to_vec();
    }
    let mut padded = vec![0u8; field_size - prehash.len()];
    padded.extend_from_slice(prehash);
    padded
}

macro_rules! ecdsa_sign {
    ($curve:ident, $secret:expr, $prehash:expr, $rng:expr) => {{
        let signing_key = $curve::ecdsa::SigningKey::from_bytes(&$secret.to_bytes()).map_err(signing_failed)?;
        let signature: $curve::ecdsa::Signature = signing_key
            .sign_prehash_with_rng($rng, $prehash)
            .map_err(signing_failed)?;
        signature.to_der().as_bytes().to_vec()
    }};
}

macro_rules! ecdsa_verify {
    ($curve:ident, $public:expr, $prehash:expr, $signature:expr) => {{
        let point = $public.to_encoded_point(false);
        let verifying_key = $curve::ecdsa::VerifyingKey::from_sec1_bytes(point.as_bytes()).map_err(|e| {
            KeystoreError::encoding("EC public key", e, error_codes::PUBLIC_KEY_MALFORMED)
        })?;
        match $curve::ecdsa::Signature::from_der($signature) {
            Ok(signature) => verifying_key.verify_prehash($prehash, &signature).is_ok(),
            Err(_) => false,
        }
    }};
}

fn rsa_sign(
    key: &RsaPrivateKey,
    algorithm: SignatureAlgorithm,
    prehash: &[u8],
    random: &mut dyn EntropySource,
) -> KeystoreResult<Vec<u8>> {
    match algorithm.padding {
        Some(SignaturePadding::RsaPss) => {
            let scheme = pss_scheme(algorithm.digest)?;
            let mut rng = mixed_rng(random, PSS_ENTROPY_DRAW)?;
            key.sign_with_rng(&mut rng, scheme, prehash).map_err(signing_failed)
        }
        _ => {
            if algorithm.digest == Digest::None && prehash.len() > key.size().saturating_sub(PKCS1_OVERHEAD) {
                return Err(KeystoreError::invalid_parameter_with_code(
                    "message",
                    &format!("at most {} bytes for NONEwithRSA", key.size().saturating_sub(PKCS1_OVERHEAD)),
                    &prehash.len().to_string(),
                    error_codes::INPUT_TOO_LONG,
                ));
            }
            let mut rng = mixed_rng(random, 0)?;
            key.sign_with_rng(&mut rng, pkcs1_scheme(algorithm.digest), prehash)
                .map_err(signing_failed)
        }
    }
}

fn rsa_verify(key: &RsaPublicKey, algorithm: SignatureAlgorithm, prehash: &[u8], signature: &[u8]) -> KeystoreResult<bool> {
    let verified = match algorithm.padding {
        Some(SignaturePadding::RsaPss) => key.verify(pss_scheme(algorithm.digest)?, prehash, signature),
        _ => key.verify(pkcs1_scheme(algorithm.digest), prehash, signature),
    };
    Ok(verified.is_ok())
}

/// Sign an already-digested message (or the raw message for `NONE`)
pub(crate) fn sign_prehash(
    material: &KeyMaterial,
    algorithm: SignatureAlgorithm,
    prehash: &[u8],
    random: &mut dyn EntropySource,
) -> KeystoreResult<Vec<u8>> {
    match (material, algorithm.key_algorithm) {
        (KeyMaterial::Rsa(key), KeyAlgorithm::Rsa) => rsa_sign(key, algorithm, prehash, random),
        (KeyMaterial::Ec(key), KeyAlgorithm::Ec) => {
            let field_size = key.curve().field_size();
            let prehash = ecdsa_prehash(prehash, field_size);
            let mut rng = mixed_rng(random, field_size)?;
            let der = match key {
                EcPrivateKey::P224(secret) => ecdsa_sign!(p224, secret, &prehash, &mut rng),
                EcPrivateKey::P256(secret) => ecdsa_sign!(p256, secret, &prehash, &mut rng),
                EcPrivateKey::P384(secret) => ecdsa_sign!(p384, secret, &prehash, &mut rng),
                EcPrivateKey::P521(secret) => ecdsa_sign!(p521, secret, &prehash, &mut rng),
            };
            Ok(der)
        }
        _ => Err(KeystoreError::invalid_key(
            "sign",
            &format!("key material does not fit {}", algorithm.name()),
            error_codes::KEY_TYPE_MISMATCH,
        )),
    }
}

/// Check a signature over an already-digested message
pub(crate) fn verify_prehash(
    key: &PublicKey,
    algorithm: SignatureAlgorithm,
    prehash: &[u8],
    signature: &[u8],
) -> KeystoreResult<bool> {
    match (key, algorithm.key_algorithm) {
        (PublicKey::Rsa(key), KeyAlgorithm::Rsa) => rsa_verify(key, algorithm, prehash, signature),
        (PublicKey::Ec(key), KeyAlgorithm::Ec) => {
            let prehash = ecdsa_prehash(prehash, key.curve().field_size());
            let verified = match key {
                EcPublicKey::P224(public) => ecdsa_verify!(p224, public, &prehash, signature),
                EcPublicKey::P256(public) => ecdsa_verify!(p256, public, &prehash, signature),
                EcPublicKey::P384(public) => ecdsa_verify!(p384, public, &prehash, signature),
                EcPublicKey::P521(public) => ecdsa_verify!(p521, public, &prehash, signature),
            };
            Ok(verified)
        }
        _ => Ok(false),
    }
}

fn digest_message(digest: Digest, message: &[u8]) -> Vec<u8> {
    let mut hasher = MessageHasher::new(digest);
    hasher.update(message);
    hasher.finalize_reset().to_vec()
}

/// One-shot signature over `message`
pub(crate) fn sign_message(
    material: &KeyMaterial,
    algorithm: SignatureAlgorithm,
    message: &[u8],
    random: &mut dyn EntropySource,
) -> KeystoreResult<Vec<u8>> {
    sign_prehash(material, algorithm, &digest_message(algorithm.digest, message), random)
}

/// One-shot verification of `signature` over `message`
pub(crate) fn verify_message(
    key: &PublicKey,
    algorithm: SignatureAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> KeystoreResult<bool> {
    verify_prehash(key, algorithm, &digest_message(algorithm.digest, message), signature)
}
