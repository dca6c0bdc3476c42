/*!
 * Hardware-backed style key store
 *
 * This crate implements the client-visible contract of a keystore whose key
 * material never leaves the backend. Keys are bound at creation or import to
 * an authorization set (purposes, digests, block modes, paddings, validity
 * window, randomized-encryption requirement) that is enforced every time an
 * operation is started.
 *
 * The main pieces are:
 *
 * - `KeystoreService` and `Keystore` for alias-addressed entries
 * - `KeyProtection` and `AuthorizationSet` for per-key authorizations
 * - `Cipher`, `Signature` and `Mac` sessions over AES, RSA, ECDSA and HMAC
 * - `KeyPairGenerator` and `KeyGenerator` for keys created in place
 */

/// Common error types for the keystore
pub mod error;

/// Runtime configuration of a keystore service
pub mod config;

/// Randomness, entropy accounting and comparison helpers
pub mod utils;

/// Algorithm names, transformation parsing and the service registry
pub mod algorithm;

/// Per-key authorization sets and their enforcement
pub mod authorization;

/// Opaque and transparent key objects, public keys and certificates
pub mod keys;

/// Alias namespace and client handles
pub mod keystore;

/// Cipher, signature and MAC sessions
pub mod operation;

/// In-place key and key pair generation
pub mod keygen;

pub use error::{KeystoreError, KeystoreResult};
pub use keystore::{Keystore, KeystoreService};

/// Initialize the keystore library.
///
/// Builds the process-wide algorithm registry up front so that the first
/// `get_instance` call does not pay for it. Calling this is optional.
///
/// # Example
///
/// ```
/// use hwkeystore::prelude::*;
///
/// fn main() -> Result<(), KeystoreError> {
///     init()?;
///
///     let service = KeystoreService::default();
///     let mut keystore = service.keystore();
///     keystore.load(None, None)?;
///     assert_eq!(keystore.size()?, 0);
///
///     Ok(())
/// }
/// ```
pub fn init() -> Result<(), KeystoreError> {
    let registry = algorithm::ServiceRegistry::global();
    log::debug!(
        "Registered {} cipher transformations",
        registry.services(algorithm::ServiceType::Cipher).len()
    );
    Ok(())
}

/// The types most callers need
pub mod prelude {
    pub use crate::algorithm::{Digest, KeyAlgorithm, Purposes};
    pub use crate::authorization::{KeyProtection, KeyProtectionBuilder};
    pub use crate::config::{KeystoreConfig, SecurityLevel};
    pub use crate::error::{KeystoreError, KeystoreResult};
    pub use crate::init;
    pub use crate::keygen::{KeyGenParameterSpec, KeyGenerator, KeyPairGenerator};
    pub use crate::keys::{
        Certificate, Key, KeyInfo, KeyPair, OpaqueKey, PublicKey, TransparentPrivateKey,
        TransparentSecretKey,
    };
    pub use crate::keystore::{
        Entry, Keystore, KeystoreService, PrivateKeyEntry, SecretKeyEntry,
        TrustedCertificateEntry,
    };
    pub use crate::operation::{Cipher, CipherMode, CipherParameters, KeyType, Mac, Signature};
    pub use crate::utils::{CountingRng, EntropySource};
}
