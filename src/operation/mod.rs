/*!
 * Cryptographic sessions
 *
 * `Cipher`, `Signature` and `Mac` are sequential, single-caller sessions.
 * Each one is checked against its key's authorizations once, at init, and
 * then moves through update calls to a final step:
 *
 * ```text
 * UNINITIALIZED -> INITIALIZED -> (update)* -> FINALIZED
 * ```
 *
 * Ciphers that generated their own IV for encryption stay FINALIZED until
 * re-initialized; every other session returns to INITIALIZED.
 */

mod cipher;
mod mac;
mod rsa_engine;
mod signature;
mod symmetric;

pub use cipher::*;
pub use mac::*;
pub use signature::*;

pub(crate) use signature::{sign_message, verify_message};

use md5::Md5;
use sha1::Sha1;
use sha2::digest::DynDigest;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::algorithm::Digest;
use crate::error::KeystoreResult;

/// Streaming transform behind a `Cipher` session.
///
/// `do_final` returns the engine to its initial state even when it fails.
pub(crate) trait CipherSpi: Send {
    fn update(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>>;

    fn update_aad(&mut self, _aad: &[u8]) -> KeystoreResult<()> {
        Err(crate::error::KeystoreError::illegal_state(
            "update AAD",
            "AAD is only accepted by AEAD modes",
            crate::error::error_codes::WRONG_MODE,
        ))
    }

    fn do_final(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>>;

    /// Upper bound on the bytes the next `update` or `do_final` of
    /// `input_len` bytes can produce
    fn output_size(&self, input_len: usize) -> usize;

    /// Exact length of the next `update` (or `do_final` when `finishing`) of
    /// `input`, when it can be known without changing state
    fn exact_output_size(&self, _input: &[u8], _finishing: bool) -> Option<usize> {
        None
    }

    /// Block size in bytes; zero for RSA
    fn block_size(&self) -> usize;
}

pub(crate) type DynHasher = Box<dyn DynDigest + Send + Sync>;

/// Incremental hasher for `digest`; `None` for `Digest::None`
pub(crate) fn new_hasher(digest: Digest) -> Option<DynHasher> {
    let hasher: DynHasher = match digest {
        Digest::None => return None,
        Digest::Md5 => Box::new(Md5::default()),
        Digest::Sha1 => Box::new(Sha1::default()),
        Digest::Sha224 => Box::new(Sha224::default()),
        Digest::Sha256 => Box::new(Sha256::default()),
        Digest::Sha384 => Box::new(Sha384::default()),
        Digest::Sha512 => Box::new(Sha512::default()),
    };
    Some(hasher)
}
