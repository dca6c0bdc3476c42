use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use super::{
    parse_cipher_transformation, parse_mac_algorithm, parse_signature_algorithm,
    CipherTransformation, KeyAlgorithm, SignatureAlgorithm,
};
use crate::error::{KeystoreError, KeystoreResult};

/// Kind of session or generator object a name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Cipher,
    Signature,
    Mac,
    KeyPairGenerator,
    KeyGenerator,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceType::Cipher => "Cipher",
            ServiceType::Signature => "Signature",
            ServiceType::Mac => "Mac",
            ServiceType::KeyPairGenerator => "KeyPairGenerator",
            ServiceType::KeyGenerator => "KeyGenerator",
        };
        f.write_str(name)
    }
}

/// What a registered name instantiates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceDescriptor {
    Cipher(CipherTransformation),
    Signature(SignatureAlgorithm),
    Mac(KeyAlgorithm),
    KeyPairGenerator(KeyAlgorithm),
    KeyGenerator(KeyAlgorithm),
}

type Factory = fn(&str) -> KeystoreResult<ServiceDescriptor>;

struct Service {
    name: String,
    factory: Factory,
}

/// Maps `(ServiceType, algorithm name)` to the factory that resolves it.
///
/// Lookups are ASCII case-insensitive. The process-wide registry is built on
/// first use and never changes afterwards.
pub struct ServiceRegistry {
    services: HashMap<(ServiceType, String), Service>,
}

const RSA_CIPHER_PADDINGS: [&str; 8] = [
    "NoPadding",
    "PKCS1Padding",
    "OAEPPadding",
    "OAEPWithSHA-1AndMGF1Padding",
    "OAEPWithSHA-224AndMGF1Padding",
    "OAEPWithSHA-256AndMGF1Padding",
    "OAEPWithSHA-384AndMGF1Padding",
    "OAEPWithSHA-512AndMGF1Padding",
];

const DIGEST_PREFIXES: [&str; 5] = ["SHA1", "SHA224", "SHA256", "SHA384", "SHA512"];

impl ServiceRegistry {
    /// The process-wide registry
    pub fn global() -> &'static ServiceRegistry {
        static REGISTRY: OnceLock<ServiceRegistry> = OnceLock::new();
        REGISTRY.get_or_init(ServiceRegistry::with_default_services)
    }

    fn empty() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    fn with_default_services() -> Self {
        let mut registry = Self::empty();

        for mode_padding in [
            "ECB/NoPadding",
            "ECB/PKCS7Padding",
            "ECB/PKCS5Padding",
            "CBC/NoPadding",
            "CBC/PKCS7Padding",
            "CBC/PKCS5Padding",
            "CTR/NoPadding",
            "GCM/NoPadding",
        ] {
            registry.register(ServiceType::Cipher, &format!("AES/{}", mode_padding), cipher_factory);
        }
        for mode in ["ECB", "NONE"] {
            for padding in RSA_CIPHER_PADDINGS {
                registry.register(
                    ServiceType::Cipher,
                    &format!("RSA/{}/{}", mode, padding),
                    cipher_factory,
                );
            }
        }

        registry.register(ServiceType::Signature, "NONEwithRSA", signature_factory);
        registry.register(ServiceType::Signature, "MD5withRSA", signature_factory);
        registry.register(ServiceType::Signature, "NONEwithECDSA", signature_factory);
        registry.register(ServiceType::Signature, "ECDSA", signature_factory);
        for digest in DIGEST_PREFIXES {
            registry.register(ServiceType::Signature, &format!("{}withRSA", digest), signature_factory);
            registry.register(ServiceType::Signature, &format!("{}withRSA/PSS", digest), signature_factory);
            registry.register(ServiceType::Signature, &format!("{}withECDSA", digest), signature_factory);
        }

        for digest in DIGEST_PREFIXES {
            let name = format!("Hmac{}", digest);
            registry.register(ServiceType::Mac, &name, mac_factory);
            registry.register(ServiceType::KeyGenerator, &name, key_generator_factory);
        }
        registry.register(ServiceType::KeyGenerator, "AES", key_generator_factory);
        registry.register(ServiceType::KeyPairGenerator, "RSA", key_pair_generator_factory);
        registry.register(ServiceType::KeyPairGenerator, "EC", key_pair_generator_factory);

        registry
    }

    fn register(&mut self, service_type: ServiceType, name: &str, factory: Factory) {
        self.services.insert(
            (service_type, name.to_ascii_lowercase()),
            Service {
                name: name.to_string(),
                factory,
            },
        );
    }

    /// Resolve a name to the descriptor its factory produces
    pub fn resolve(&self, service_type: ServiceType, name: &str) -> KeystoreResult<ServiceDescriptor> {
        let service = self
            .services
            .get(&(service_type, name.trim().to_ascii_lowercase()))
            .ok_or_else(|| KeystoreError::no_such_algorithm(&service_type.to_string(), name))?;
        (service.factory)(&service.name)
    }

    /// Registered names for a service type, sorted
    pub fn services(&self, service_type: ServiceType) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .iter()
            .filter(|((t, _), _)| *t == service_type)
            .map(|(_, service)| service.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn contains(&self, service_type: ServiceType, name: &str) -> bool {
        self.services
            .contains_key(&(service_type, name.trim().to_ascii_lowercase()))
    }
}

fn cipher_factory(name: &str) -> KeystoreResult<ServiceDescriptor> {
    parse_cipher_transformation(name).map(ServiceDescriptor::Cipher)
}

fn signature_factory(name: &str) -> KeystoreResult<ServiceDescriptor> {
    parse_signature_algorithm(name).map(ServiceDescriptor::Signature)
}

fn mac_factory(name: &str) -> KeystoreResult<ServiceDescriptor> {
    parse_mac_algorithm(name).map(ServiceDescriptor::Mac)
}

fn key_generator_factory(name: &str) -> KeystoreResult<ServiceDescriptor> {
    match KeyAlgorithm::from_name(name) {
        Ok(alg) if alg.is_symmetric() => Ok(ServiceDescriptor::KeyGenerator(alg)),
        _ => Err(KeystoreError::no_such_algorithm("KeyGenerator", name)),
    }
}

fn key_pair_generator_factory(name: &str) -> KeystoreResult<ServiceDescriptor> {
    match KeyAlgorithm::from_name(name) {
        Ok(alg) if alg.is_asymmetric() => Ok(ServiceDescriptor::KeyPairGenerator(alg)),
        _ => Err(KeystoreError::no_such_algorithm("KeyPairGenerator", name)),
    }
}

