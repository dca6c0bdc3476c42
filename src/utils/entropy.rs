//! Caller-supplied entropy and its accounting.
//!
//! Every operation that needs randomness draws an exact, documented number of
//! bytes from the caller's source. Those bytes are mixed with fresh system
//! entropy through HKDF-SHA256 into a ChaCha20 DRBG, so a weak or replayed
//! caller source never becomes the only input to key or IV generation.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{KeystoreError, KeystoreResult};

const MIXER_INFO: &[u8] = b"hwkeystore entropy mixer v1";

/// A randomness provider that can be handed to an operation
pub trait EntropySource: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send + ?Sized> EntropySource for T {}

/// The default source used when a caller does not supply one
pub fn default_source() -> Box<dyn EntropySource> {
    Box::new(OsRng)
}

/// Draw exactly `draw` bytes from `source` and derive a DRBG from them and
/// system entropy.
pub(crate) fn mixed_rng(source: &mut dyn EntropySource, draw: usize) -> KeystoreResult<ChaCha20Rng> {
    let mut caller = Zeroizing::new(vec![0u8; draw]);
    if draw > 0 {
        source
            .try_fill_bytes(&mut caller)
            .map_err(|e| KeystoreError::Internal(format!("entropy source failure: {}", e)))?;
    }

    let local = Zeroizing::new(super::random_bytes(32)?);

    let hk = Hkdf::<Sha256>::new(Some(&local[..]), &caller);
    let mut seed = Zeroizing::new([0u8; 32]);
    hk.expand(MIXER_INFO, &mut seed[..])
        .map_err(|_| KeystoreError::Internal("entropy mixer expansion failed".to_string()))?;

    Ok(ChaCha20Rng::from_seed(*seed))
}

/// Produce `len` random bytes, drawing exactly `len` bytes from `source`.
pub(crate) fn mixed_bytes(source: &mut dyn EntropySource, len: usize) -> KeystoreResult<Vec<u8>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let mut rng = mixed_rng(source, len)?;
    let mut out = vec![0u8; len];
    rng.fill_bytes(&mut out);
    Ok(out)
}

/// Shared view of how many bytes a `CountingRng` has handed out
#[derive(Clone, Default)]
pub struct EntropyCounter(Arc<AtomicUsize>);

impl EntropyCounter {
    pub fn bytes_drawn(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }

    fn add(&self, n: usize) {
        self.0.fetch_add(n, Ordering::SeqCst);
    }
}

impl fmt::Debug for EntropyCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntropyCounter")
            .field(&self.bytes_drawn())
            .finish()
    }
}

/// Wraps an RNG and counts the bytes drawn from it.
///
/// The counter is shared, so it stays readable after the RNG itself has been
/// moved into an operation.
///
/// # Examples
///
/// ```
/// use hwkeystore::utils::CountingRng;
/// use rand::RngCore;
///
/// let mut rng = CountingRng::os();
/// let counter = rng.counter();
/// let mut buf = [0u8; 12];
/// rng.fill_bytes(&mut buf);
/// assert_eq!(counter.bytes_drawn(), 12);
/// ```
pub struct CountingRng<R> {
    inner: R,
    counter: EntropyCounter,
}

impl CountingRng<OsRng> {
    pub fn os() -> Self {
        Self::new(OsRng)
    }
}

impl<R> CountingRng<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            counter: EntropyCounter::default(),
        }
    }

    pub fn counter(&self) -> EntropyCounter {
        self.counter.clone()
    }
}

impl<R> fmt::Debug for CountingRng<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingRng")
            .field("bytes_drawn", &self.counter.bytes_drawn())
            .finish()
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.counter.add(4);
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.counter.add(8);
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.counter.add(dest.len());
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.counter.add(dest.len());
        self.inner.try_fill_bytes(dest)
    }
}

impl<R: CryptoRng> CryptoRng for CountingRng<R> {}
