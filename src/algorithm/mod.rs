/*!
 * Algorithm vocabulary
 *
 * Key algorithms, digests, block modes, paddings and purposes, with the
 * case-insensitive name matching used by authorization building and by
 * transformation strings such as `"AES/GCM/NoPadding"`.
 */

mod registry;
mod transformation;

pub use registry::*;
pub use transformation::*;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::error::{error_codes, KeystoreError, KeystoreResult};

fn unrecognized(kind: &str, name: &str) -> KeystoreError {
    KeystoreError::invalid_parameter_with_code(
        kind,
        "a recognized name",
        name,
        error_codes::UNRECOGNIZED_NAME,
    )
}

/// Algorithm of a key held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Aes,
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
    Rsa,
    Ec,
}

impl KeyAlgorithm {
    pub const ALL: [KeyAlgorithm; 8] = [
        KeyAlgorithm::Aes,
        KeyAlgorithm::HmacSha1,
        KeyAlgorithm::HmacSha224,
        KeyAlgorithm::HmacSha256,
        KeyAlgorithm::HmacSha384,
        KeyAlgorithm::HmacSha512,
        KeyAlgorithm::Rsa,
        KeyAlgorithm::Ec,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::Aes => "AES",
            KeyAlgorithm::HmacSha1 => "HmacSHA1",
            KeyAlgorithm::HmacSha224 => "HmacSHA224",
            KeyAlgorithm::HmacSha256 => "HmacSHA256",
            KeyAlgorithm::HmacSha384 => "HmacSHA384",
            KeyAlgorithm::HmacSha512 => "HmacSHA512",
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Ec => "EC",
        }
    }

    pub fn from_name(name: &str) -> KeystoreResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|alg| alg.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| unrecognized("key algorithm", name))
    }

    pub fn is_symmetric(&self) -> bool {
        !self.is_asymmetric()
    }

    pub fn is_asymmetric(&self) -> bool {
        matches!(self, KeyAlgorithm::Rsa | KeyAlgorithm::Ec)
    }

    pub fn is_hmac(&self) -> bool {
        self.hmac_digest().is_some()
    }

    /// The digest an HMAC key algorithm is bound to
    pub fn hmac_digest(&self) -> Option<Digest> {
        match self {
            KeyAlgorithm::HmacSha1 => Some(Digest::Sha1),
            KeyAlgorithm::HmacSha224 => Some(Digest::Sha224),
            KeyAlgorithm::HmacSha256 => Some(Digest::Sha256),
            KeyAlgorithm::HmacSha384 => Some(Digest::Sha384),
            KeyAlgorithm::HmacSha512 => Some(Digest::Sha512),
            _ => None,
        }
    }

    pub fn hmac_for_digest(digest: Digest) -> Option<Self> {
        match digest {
            Digest::Sha1 => Some(KeyAlgorithm::HmacSha1),
            Digest::Sha224 => Some(KeyAlgorithm::HmacSha224),
            Digest::Sha256 => Some(KeyAlgorithm::HmacSha256),
            Digest::Sha384 => Some(KeyAlgorithm::HmacSha384),
            Digest::Sha512 => Some(KeyAlgorithm::HmacSha512),
            _ => None,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Message digest algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Digest {
    None,
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl Digest {
    pub const ALL: [Digest; 7] = [
        Digest::None,
        Digest::Md5,
        Digest::Sha1,
        Digest::Sha224,
        Digest::Sha256,
        Digest::Sha384,
        Digest::Sha512,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Digest::None => "NONE",
            Digest::Md5 => "MD5",
            Digest::Sha1 => "SHA-1",
            Digest::Sha224 => "SHA-224",
            Digest::Sha256 => "SHA-256",
            Digest::Sha384 => "SHA-384",
            Digest::Sha512 => "SHA-512",
        }
    }

    /// Accepts both `SHA-256` and `SHA256` spellings
    pub fn from_name(name: &str) -> KeystoreResult<Self> {
        let compact: String = name.chars().filter(|c| *c != '-').collect();
        Self::ALL
            .iter()
            .copied()
            .find(|d| {
                let canonical: String = d.name().chars().filter(|c| *c != '-').collect();
                canonical.eq_ignore_ascii_case(&compact)
            })
            .ok_or_else(|| unrecognized("digest", name))
    }

    /// Output length in bytes; zero for `NONE`
    pub fn output_size(&self) -> usize {
        match self {
            Digest::None => 0,
            Digest::Md5 => 16,
            Digest::Sha1 => 20,
            Digest::Sha224 => 28,
            Digest::Sha256 => 32,
            Digest::Sha384 => 48,
            Digest::Sha512 => 64,
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Symmetric block cipher mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockMode {
    Ecb,
    Cbc,
    Ctr,
    Gcm,
}

impl BlockMode {
    pub const ALL: [BlockMode; 4] = [BlockMode::Ecb, BlockMode::Cbc, BlockMode::Ctr, BlockMode::Gcm];

    pub fn name(&self) -> &'static str {
        match self {
            BlockMode::Ecb => "ECB",
            BlockMode::Cbc => "CBC",
            BlockMode::Ctr => "CTR",
            BlockMode::Gcm => "GCM",
        }
    }

    pub fn from_name(name: &str) -> KeystoreResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| unrecognized("block mode", name))
    }

    /// Length of the IV or nonce this mode needs with a 128-bit block cipher
    pub fn iv_length(&self) -> usize {
        match self {
            BlockMode::Ecb => 0,
            BlockMode::Cbc | BlockMode::Ctr => 16,
            BlockMode::Gcm => 12,
        }
    }

    /// Whether encryption under this mode is deterministic for a fixed key
    pub fn is_deterministic(&self) -> bool {
        matches!(self, BlockMode::Ecb)
    }
}

impl fmt::Display for BlockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Padding scheme for encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionPadding {
    None,
    Pkcs7,
    RsaPkcs1,
    RsaOaep,
}

impl EncryptionPadding {
    pub const ALL: [EncryptionPadding; 4] = [
        EncryptionPadding::None,
        EncryptionPadding::Pkcs7,
        EncryptionPadding::RsaPkcs1,
        EncryptionPadding::RsaOaep,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EncryptionPadding::None => "NoPadding",
            EncryptionPadding::Pkcs7 => "PKCS7Padding",
            EncryptionPadding::RsaPkcs1 => "PKCS1Padding",
            EncryptionPadding::RsaOaep => "OAEPPadding",
        }
    }

    pub fn from_name(name: &str) -> KeystoreResult<Self> {
        if name.eq_ignore_ascii_case("PKCS5Padding") {
            return Ok(EncryptionPadding::Pkcs7);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| unrecognized("encryption padding", name))
    }
}

impl fmt::Display for EncryptionPadding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Padding scheme for RSA signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignaturePadding {
    RsaPkcs1,
    RsaPss,
}

impl SignaturePadding {
    pub const ALL: [SignaturePadding; 2] = [SignaturePadding::RsaPkcs1, SignaturePadding::RsaPss];

    pub fn name(&self) -> &'static str {
        match self {
            SignaturePadding::RsaPkcs1 => "PKCS1",
            SignaturePadding::RsaPss => "PSS",
        }
    }

    pub fn from_name(name: &str) -> KeystoreResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| unrecognized("signature padding", name))
    }
}

impl fmt::Display for SignaturePadding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of purposes a key is authorized for
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Purposes(u8);

impl Purposes {
    pub const NONE: Purposes = Purposes(0);
    pub const ENCRYPT: Purposes = Purposes(1);
    pub const DECRYPT: Purposes = Purposes(1 << 1);
    pub const SIGN: Purposes = Purposes(1 << 2);
    pub const VERIFY: Purposes = Purposes(1 << 3);
    pub const WRAP: Purposes = Purposes(1 << 5);

    pub const fn all() -> Self {
        Purposes(1 | (1 << 1) | (1 << 2) | (1 << 3) | (1 << 5))
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: Purposes) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn names(&self) -> Vec<&'static str> {
        [
            (Purposes::ENCRYPT, "ENCRYPT"),
            (Purposes::DECRYPT, "DECRYPT"),
            (Purposes::SIGN, "SIGN"),
            (Purposes::VERIFY, "VERIFY"),
            (Purposes::WRAP, "WRAP"),
        ]
        .iter()
        .filter(|(p, _)| self.contains(*p))
        .map(|(_, name)| *name)
        .collect()
    }
}

impl BitOr for Purposes {
    type Output = Purposes;

    fn bitor(self, rhs: Purposes) -> Purposes {
        Purposes(self.0 | rhs.0)
    }
}

impl BitOrAssign for Purposes {
    fn bitor_assign(&mut self, rhs: Purposes) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Purposes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Purposes({})", self.names().join(" | "))
    }
}

#[cfg(test)]
mod tests;
