/*!
 * Key generation
 *
 * `KeyPairGenerator` creates RSA and EC key pairs and `KeyGenerator` creates
 * AES and HMAC keys. Both write straight into a `KeystoreService`: material
 * never leaves the backend, and the caller gets back an opaque handle (plus
 * the public half for pairs).
 *
 * Each generated pair gets a self-signed X.509 certificate built from the
 * `KeyGenParameterSpec`, falling back to the service configuration for
 * subject, serial number and validity window.
 */

mod certificate;
mod pair;
mod spec;
mod symmetric;

pub use pair::*;
pub use spec::*;
pub use symmetric::*;

#[cfg(test)]
mod tests;
