use std::sync::Arc;

use zeroize::Zeroizing;

use super::spec::KeyGenParameterSpec;
use crate::algorithm::{KeyAlgorithm, ServiceDescriptor, ServiceRegistry, ServiceType};
use crate::authorization::AuthorizationSet;
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{KeyMaterial, KeyOrigin, OpaqueKey};
use crate::keystore::{Backend, KeystoreService};
use crate::utils::{default_source, mixed_bytes, EntropySource};

pub const MIN_HMAC_KEY_SIZE: u32 = 64;
pub const MAX_HMAC_KEY_SIZE: u32 = 1024;

struct SecretRequest {
    spec: KeyGenParameterSpec,
    bits: u32,
    authorizations: AuthorizationSet,
    random: Box<dyn EntropySource>,
}

/// Generates AES and HMAC secret keys directly into a keystore
pub struct KeyGenerator {
    algorithm: KeyAlgorithm,
    backend: Arc<Backend>,
    request: Option<SecretRequest>,
}

fn unsupported_size(algorithm: KeyAlgorithm, expected: &str, bits: u32) -> KeystoreError {
    KeystoreError::invalid_parameter_with_code(
        &format!("{} key size", algorithm),
        expected,
        &bits.to_string(),
        error_codes::UNSUPPORTED_KEY_SIZE,
    )
}

impl KeyGenerator {
    /// Generator for `"AES"` or `"HmacSHA*"` keys stored in `service`
    pub fn get_instance(service: &KeystoreService, algorithm: &str) -> KeystoreResult<Self> {
        match ServiceRegistry::global().resolve(ServiceType::KeyGenerator, algorithm)? {
            ServiceDescriptor::KeyGenerator(algorithm) => Ok(Self {
                algorithm,
                backend: Arc::clone(service.backend()),
                request: None,
            }),
            _ => Err(KeystoreError::no_such_algorithm("KeyGenerator", algorithm)),
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn init(&mut self, spec: KeyGenParameterSpec) -> KeystoreResult<()> {
        self.init_with_random(spec, default_source())
    }

    /// # Errors
    ///
    /// `InvalidParameter` when the size is not supported for the algorithm
    /// (AES: 128, 192 or 256; HMAC: a multiple of 8 from 64 to 1024) or the
    /// authorizations cannot apply to the key.
    pub fn init_with_random(&mut self, spec: KeyGenParameterSpec, random: Box<dyn EntropySource>) -> KeystoreResult<()> {
        self.request = None;
        let bits = match self.algorithm.hmac_digest() {
            Some(digest) => {
                let bits = spec.key_size().unwrap_or(digest.output_size() as u32 * 8);
                if !(MIN_HMAC_KEY_SIZE..=MAX_HMAC_KEY_SIZE).contains(&bits) || bits % 8 != 0 {
                    return Err(unsupported_size(self.algorithm, "a multiple of 8 from 64 to 1024", bits));
                }
                bits
            }
            None => {
                let bits = spec.key_size().unwrap_or(self.backend.config().default_aes_key_size);
                if !matches!(bits, 128 | 192 | 256) {
                    return Err(unsupported_size(self.algorithm, "128, 192 or 256", bits));
                }
                bits
            }
        };
        if spec.ec_curve().is_some() {
            return Err(KeystoreError::invalid_parameter("EC curve", "no curve for a secret key", "a curve"));
        }
        let authorizations = AuthorizationSet::resolve(spec.protection(), self.algorithm, bits)?;

        log::debug!(
            "KeyGenerator {} initialized for '{}' ({} bits)",
            self.algorithm,
            spec.alias(),
            bits
        );
        self.request = Some(SecretRequest {
            spec,
            bits,
            authorizations,
            random,
        });
        Ok(())
    }

    /// Generate a key, store it under the spec's alias and return a handle
    pub fn generate_key(&mut self) -> KeystoreResult<OpaqueKey> {
        let request = self.request.as_mut().ok_or_else(|| {
            KeystoreError::illegal_state("generate key", "generator not initialized", error_codes::NOT_INITIALIZED)
        })?;
        let bytes = mixed_bytes(request.random.as_mut(), request.bits as usize / 8)?;
        Backend::store_key(
            &self.backend,
            request.spec.alias(),
            KeyMaterial::Symmetric(Zeroizing::new(bytes)),
            request.authorizations.clone(),
            KeyOrigin::Generated,
            None,
        )
    }
}

impl std::fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGenerator")
            .field("algorithm", &self.algorithm)
            .field("alias", &self.request.as_ref().map(|r| r.spec.alias()))
            .finish()
    }
}
