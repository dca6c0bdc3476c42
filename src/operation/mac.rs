use chrono::Utc;
use hmac::{Hmac, Mac as _};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::algorithm::{KeyAlgorithm, Purposes, ServiceDescriptor, ServiceRegistry, ServiceType};
use crate::authorization::{check_authorized_for_operation, KeyClass, OperationRequest};
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{KeyMaterial, OpaqueKey};

enum HmacState {
    Sha1(Hmac<Sha1>),
    Sha224(Hmac<Sha224>),
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
}

impl HmacState {
    fn new(algorithm: KeyAlgorithm, key: &[u8]) -> KeystoreResult<Self> {
        let state = match algorithm {
            KeyAlgorithm::HmacSha1 => Hmac::<Sha1>::new_from_slice(key).map(HmacState::Sha1),
            KeyAlgorithm::HmacSha224 => Hmac::<Sha224>::new_from_slice(key).map(HmacState::Sha224),
            KeyAlgorithm::HmacSha256 => Hmac::<Sha256>::new_from_slice(key).map(HmacState::Sha256),
            KeyAlgorithm::HmacSha384 => Hmac::<Sha384>::new_from_slice(key).map(HmacState::Sha384),
            KeyAlgorithm::HmacSha512 => Hmac::<Sha512>::new_from_slice(key).map(HmacState::Sha512),
            other => {
                return Err(KeystoreError::invalid_key(
                    "mac init",
                    &format!("{} is not an HMAC algorithm", other),
                    error_codes::KEY_TYPE_MISMATCH,
                ))
            }
        };
        state.map_err(|_| KeystoreError::invalid_key("mac init", "invalid HMAC key length", error_codes::KEY_TYPE_MISMATCH))
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            HmacState::Sha1(m) => m.update(data),
            HmacState::Sha224(m) => m.update(data),
            HmacState::Sha256(m) => m.update(data),
            HmacState::Sha384(m) => m.update(data),
            HmacState::Sha512(m) => m.update(data),
        }
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        match self {
            HmacState::Sha1(m) => m.finalize_reset().into_bytes().to_vec(),
            HmacState::Sha224(m) => m.finalize_reset().into_bytes().to_vec(),
            HmacState::Sha256(m) => m.finalize_reset().into_bytes().to_vec(),
            HmacState::Sha384(m) => m.finalize_reset().into_bytes().to_vec(),
            HmacState::Sha512(m) => m.finalize_reset().into_bytes().to_vec(),
        }
    }
}

/// HMAC session over a keystore key. Computing a MAC is authorized as SIGN.
pub struct Mac {
    algorithm: KeyAlgorithm,
    state: Option<HmacState>,
}

impl Mac {
    pub fn get_instance(algorithm: &str) -> KeystoreResult<Self> {
        match ServiceRegistry::global().resolve(ServiceType::Mac, algorithm)? {
            ServiceDescriptor::Mac(algorithm) => Ok(Self { algorithm, state: None }),
            _ => Err(KeystoreError::no_such_algorithm("Mac", algorithm)),
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Tag length in bytes
    pub fn mac_length(&self) -> usize {
        self.algorithm.hmac_digest().map(|d| d.output_size()).unwrap_or(0)
    }

    pub fn init(&mut self, key: &OpaqueKey) -> KeystoreResult<()> {
        self.state = None;
        if key.algorithm() != self.algorithm {
            return Err(KeystoreError::invalid_key(
                "mac init",
                &format!("{} needs a {} key, got {}", self.algorithm, self.algorithm, key.algorithm()),
                error_codes::KEY_TYPE_MISMATCH,
            ));
        }
        let blob = key.resolve("mac init")?;
        let mut request = OperationRequest::new(Purposes::SIGN, KeyClass::Secret);
        if let Some(digest) = self.algorithm.hmac_digest() {
            request = request.with_digest(digest);
        }
        check_authorized_for_operation(&blob.authorizations, &request, Utc::now())?;

        let state = match &blob.material {
            KeyMaterial::Symmetric(bytes) => HmacState::new(self.algorithm, bytes)?,
            _ => {
                return Err(KeystoreError::invalid_key(
                    "mac init",
                    "HMAC needs a secret key",
                    error_codes::KEY_TYPE_MISMATCH,
                ))
            }
        };
        log::debug!("Mac {} initialized with '{}'", self.algorithm, key.alias());
        self.state = Some(state);
        Ok(())
    }

    pub fn update(&mut self, data: &[u8]) -> KeystoreResult<()> {
        self.active("update")?.update(data);
        Ok(())
    }

    /// Finish and return the tag. The session is ready for the next message
    /// under the same key.
    pub fn do_final(&mut self) -> KeystoreResult<Vec<u8>> {
        Ok(self.active("do final")?.finalize_reset())
    }

    fn active(&mut self, operation: &str) -> KeystoreResult<&mut HmacState> {
        self.state
            .as_mut()
            .ok_or_else(|| KeystoreError::illegal_state(operation, "mac not initialized", error_codes::NOT_INITIALIZED))
    }
}

impl std::fmt::Debug for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mac")
            .field("algorithm", &self.algorithm)
            .field("initialized", &self.state.is_some())
            .finish()
    }
}
