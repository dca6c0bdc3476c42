use std::sync::Arc;

use rsa::RsaPrivateKey;

use super::certificate::{self_signed, CertificateTemplate};
use super::spec::KeyGenParameterSpec;
use crate::algorithm::{KeyAlgorithm, ServiceDescriptor, ServiceRegistry, ServiceType};
use crate::authorization::AuthorizationSet;
use crate::config::KeystoreConfig;
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::{EcCurve, EcPrivateKey, KeyMaterial, KeyOrigin, KeyPair};
use crate::keystore::{Backend, KeystoreService};
use crate::utils::{datetime_from_millis, default_source, mixed_rng, EntropySource};

pub const MIN_RSA_KEY_SIZE: u32 = 512;
pub const MAX_RSA_KEY_SIZE: u32 = 8192;

/// Shape of the key pair an initialized generator produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairShape {
    Rsa { bits: u32 },
    Ec(EcCurve),
}

impl PairShape {
    fn key_size(&self) -> u32 {
        match self {
            PairShape::Rsa { bits } => *bits,
            PairShape::Ec(curve) => curve.key_size(),
        }
    }

    /// Caller entropy drawn per key: one byte per eight bits of key size
    fn entropy_draw(&self) -> usize {
        (self.key_size() as usize + 7) / 8
    }
}

struct PairRequest {
    spec: KeyGenParameterSpec,
    shape: PairShape,
    authorizations: AuthorizationSet,
    certificate: CertificateTemplate,
    random: Box<dyn EntropySource>,
}

/// Generates RSA or EC key pairs directly into a keystore.
///
/// Every pair is stored as a private key entry whose chain is a single
/// self-signed certificate. An existing entry under the alias is replaced.
pub struct KeyPairGenerator {
    algorithm: KeyAlgorithm,
    backend: Arc<Backend>,
    request: Option<PairRequest>,
}

fn resolve_rsa_size(spec: &KeyGenParameterSpec, config: &KeystoreConfig) -> KeystoreResult<u32> {
    if let Some(curve) = spec.ec_curve() {
        return Err(KeystoreError::invalid_parameter(
            "EC curve",
            "no curve for an RSA key",
            curve.name(),
        ));
    }
    let bits = spec.key_size().unwrap_or(config.default_rsa_key_size);
    if !(MIN_RSA_KEY_SIZE..=MAX_RSA_KEY_SIZE).contains(&bits) || bits % 8 != 0 {
        return Err(KeystoreError::invalid_parameter_with_code(
            "RSA key size",
            &format!("a multiple of 8 in {}..={}", MIN_RSA_KEY_SIZE, MAX_RSA_KEY_SIZE),
            &bits.to_string(),
            error_codes::UNSUPPORTED_KEY_SIZE,
        ));
    }
    Ok(bits)
}

fn resolve_curve(spec: &KeyGenParameterSpec, config: &KeystoreConfig) -> KeystoreResult<EcCurve> {
    match (spec.ec_curve(), spec.key_size()) {
        (Some(curve), Some(bits)) if curve.key_size() != bits => Err(KeystoreError::invalid_parameter_with_code(
            "EC key size",
            &format!("{} for {}", curve.key_size(), curve.name()),
            &bits.to_string(),
            error_codes::UNSUPPORTED_KEY_SIZE,
        )),
        (Some(curve), _) => Ok(curve),
        (None, Some(bits)) => EcCurve::from_key_size(bits),
        (None, None) => EcCurve::from_key_size(config.default_ec_key_size),
    }
}

fn certificate_template(spec: &KeyGenParameterSpec, config: &KeystoreConfig) -> KeystoreResult<CertificateTemplate> {
    let not_before = match spec.certificate_not_before() {
        Some(at) => at,
        None => datetime_from_millis(config.default_certificate_not_before_ms)?,
    };
    let not_after = match spec.certificate_not_after() {
        Some(at) => at,
        None => datetime_from_millis(config.default_certificate_not_after_ms)?,
    };
    if not_after < not_before {
        return Err(KeystoreError::invalid_parameter(
            "certificate validity",
            "not_after at or after not_before",
            &format!("{} .. {}", not_before.to_rfc3339(), not_after.to_rfc3339()),
        ));
    }
    Ok(CertificateTemplate {
        subject: spec
            .certificate_subject()
            .unwrap_or(&config.default_certificate_subject)
            .to_string(),
        serial: spec
            .certificate_serial_number()
            .unwrap_or(config.default_certificate_serial),
        not_before,
        not_after,
    })
}

impl KeyPairGenerator {
    /// Generator for `"RSA"` or `"EC"` key pairs stored in `service`
    pub fn get_instance(service: &KeystoreService, algorithm: &str) -> KeystoreResult<Self> {
        match ServiceRegistry::global().resolve(ServiceType::KeyPairGenerator, algorithm)? {
            ServiceDescriptor::KeyPairGenerator(algorithm) => Ok(Self {
                algorithm,
                backend: Arc::clone(service.backend()),
                request: None,
            }),
            _ => Err(KeystoreError::no_such_algorithm("KeyPairGenerator", algorithm)),
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn initialize(&mut self, spec: KeyGenParameterSpec) -> KeystoreResult<()> {
        self.initialize_with_random(spec, default_source())
    }

    /// Validate `spec` and prepare to generate, drawing key entropy from
    /// `random`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for an unsupported size, a curve that disagrees
    /// with the key size, authorizations that cannot apply to the key, or an
    /// inverted certificate validity window. A failed call leaves the
    /// generator uninitialized.
    pub fn initialize_with_random(
        &mut self,
        spec: KeyGenParameterSpec,
        random: Box<dyn EntropySource>,
    ) -> KeystoreResult<()> {
        self.request = None;
        let config = self.backend.config();
        let shape = match self.algorithm {
            KeyAlgorithm::Rsa => PairShape::Rsa {
                bits: resolve_rsa_size(&spec, config)?,
            },
            KeyAlgorithm::Ec => PairShape::Ec(resolve_curve(&spec, config)?),
            other => return Err(KeystoreError::no_such_algorithm("KeyPairGenerator", other.name())),
        };
        let authorizations = AuthorizationSet::resolve(spec.protection(), self.algorithm, shape.key_size())?;
        let certificate = certificate_template(&spec, config)?;

        log::debug!(
            "KeyPairGenerator {} initialized for '{}' ({} bits)",
            self.algorithm,
            spec.alias(),
            shape.key_size()
        );
        self.request = Some(PairRequest {
            spec,
            shape,
            authorizations,
            certificate,
            random,
        });
        Ok(())
    }

    /// Generate a pair, store it under the spec's alias and return it.
    ///
    /// The generator stays initialized, so repeated calls replace the entry
    /// with a fresh pair.
    pub fn generate_key_pair(&mut self) -> KeystoreResult<KeyPair> {
        let request = self.request.as_mut().ok_or_else(|| {
            KeystoreError::illegal_state(
                "generate key pair",
                "generator not initialized",
                error_codes::NOT_INITIALIZED,
            )
        })?;

        let mut rng = mixed_rng(request.random.as_mut(), request.shape.entropy_draw())?;
        let material = match request.shape {
            PairShape::Rsa { bits } => {
                let key = RsaPrivateKey::new_with_exp(&mut rng, bits as usize, &request.spec.public_exponent())
                    .map_err(|e| {
                        KeystoreError::invalid_parameter("RSA key generation", "a generatable key", &e.to_string())
                    })?;
                KeyMaterial::Rsa(key)
            }
            PairShape::Ec(EcCurve::P224) => KeyMaterial::Ec(EcPrivateKey::P224(p224::SecretKey::random(&mut rng))),
            PairShape::Ec(EcCurve::P256) => KeyMaterial::Ec(EcPrivateKey::P256(p256::SecretKey::random(&mut rng))),
            PairShape::Ec(EcCurve::P384) => KeyMaterial::Ec(EcPrivateKey::P384(p384::SecretKey::random(&mut rng))),
            PairShape::Ec(EcCurve::P521) => KeyMaterial::Ec(EcPrivateKey::P521(p521::SecretKey::random(&mut rng))),
        };

        let public = material
            .public_key()
            .ok_or_else(|| KeystoreError::Internal("generated pair without a public half".to_string()))?;
        let certificate = self_signed(&material, &request.certificate)?;
        let private = Backend::store_key(
            &self.backend,
            request.spec.alias(),
            material,
            request.authorizations.clone(),
            KeyOrigin::Generated,
            Some(vec![certificate]),
        )?;
        Ok(KeyPair { public, private })
    }
}

impl std::fmt::Debug for KeyPairGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPairGenerator")
            .field("algorithm", &self.algorithm)
            .field("alias", &self.request.as_ref().map(|r| r.spec.alias()))
            .finish()
    }
}
