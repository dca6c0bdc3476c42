use super::{BlockMode, Digest, EncryptionPadding, KeyAlgorithm, SignaturePadding};
use crate::error::{KeystoreError, KeystoreResult};

/// A parsed `"ALG/MODE/PADDING"` cipher transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherTransformation {
    pub algorithm: KeyAlgorithm,
    /// `None` for RSA, whose `ECB`/`NONE` mode component is nominal
    pub block_mode: Option<BlockMode>,
    pub padding: EncryptionPadding,
    /// OAEP main digest; `None` for every other padding
    pub oaep_digest: Option<Digest>,
}

impl CipherTransformation {
    pub fn name(&self) -> String {
        let mode = self.block_mode.map(|m| m.name()).unwrap_or("ECB");
        let padding = match (self.padding, self.oaep_digest) {
            (EncryptionPadding::RsaOaep, Some(d)) => format!("OAEPWith{}AndMGF1Padding", d.name()),
            (p, _) => p.name().to_string(),
        };
        format!("{}/{}/{}", self.algorithm.name(), mode, padding)
    }
}

/// Parse a cipher transformation string, case-insensitively.
///
/// # Errors
///
/// Returns `NoSuchAlgorithm` if the string does not name a supported
/// combination.
pub fn parse_cipher_transformation(transformation: &str) -> KeystoreResult<CipherTransformation> {
    let fail = || KeystoreError::no_such_algorithm("Cipher", transformation);

    let parts: Vec<&str> = transformation.split('/').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(fail());
    }

    let algorithm = KeyAlgorithm::from_name(parts[0]).map_err(|_| fail())?;
    match algorithm {
        KeyAlgorithm::Aes => {
            let mode = BlockMode::from_name(parts[1]).map_err(|_| fail())?;
            let padding = EncryptionPadding::from_name(parts[2]).map_err(|_| fail())?;
            let valid = match mode {
                BlockMode::Ecb | BlockMode::Cbc => {
                    matches!(padding, EncryptionPadding::None | EncryptionPadding::Pkcs7)
                }
                BlockMode::Ctr | BlockMode::Gcm => padding == EncryptionPadding::None,
            };
            if !valid {
                return Err(fail());
            }
            Ok(CipherTransformation {
                algorithm,
                block_mode: Some(mode),
                padding,
                oaep_digest: None,
            })
        }
        KeyAlgorithm::Rsa => {
            if !(parts[1].eq_ignore_ascii_case("ECB") || parts[1].eq_ignore_ascii_case("NONE")) {
                return Err(fail());
            }
            let (padding, oaep_digest) = parse_rsa_padding(parts[2]).ok_or_else(fail)?;
            Ok(CipherTransformation {
                algorithm,
                block_mode: None,
                padding,
                oaep_digest,
            })
        }
        _ => Err(fail()),
    }
}

fn parse_rsa_padding(name: &str) -> Option<(EncryptionPadding, Option<Digest>)> {
    if name.eq_ignore_ascii_case("NoPadding") {
        return Some((EncryptionPadding::None, None));
    }
    if name.eq_ignore_ascii_case("PKCS1Padding") {
        return Some((EncryptionPadding::RsaPkcs1, None));
    }
    if name.eq_ignore_ascii_case("OAEPPadding") {
        return Some((EncryptionPadding::RsaOaep, Some(Digest::Sha1)));
    }

    let lower = name.to_ascii_lowercase();
    let digest = lower
        .strip_prefix("oaepwith")?
        .strip_suffix("andmgf1padding")?;
    match Digest::from_name(digest).ok()? {
        Digest::None | Digest::Md5 => None,
        d => Some((EncryptionPadding::RsaOaep, Some(d))),
    }
}

/// A parsed signature algorithm such as `"SHA256withECDSA"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAlgorithm {
    pub digest: Digest,
    pub key_algorithm: KeyAlgorithm,
    /// `None` for ECDSA
    pub padding: Option<SignaturePadding>,
}

impl SignatureAlgorithm {
    pub fn name(&self) -> String {
        let digest = self.digest.name().replace('-', "");
        match (self.key_algorithm, self.padding) {
            (KeyAlgorithm::Rsa, Some(SignaturePadding::RsaPss)) => format!("{}withRSA/PSS", digest),
            (KeyAlgorithm::Rsa, _) => format!("{}withRSA", digest),
            _ => format!("{}withECDSA", digest),
        }
    }
}

/// Parse a signature algorithm name, case-insensitively.
pub fn parse_signature_algorithm(name: &str) -> KeystoreResult<SignatureAlgorithm> {
    let fail = || KeystoreError::no_such_algorithm("Signature", name);
    let lower = name.trim().to_ascii_lowercase();

    if lower == "ecdsa" {
        return Ok(SignatureAlgorithm {
            digest: Digest::Sha1,
            key_algorithm: KeyAlgorithm::Ec,
            padding: None,
        });
    }

    let (digest_part, scheme) = lower.split_once("with").ok_or_else(fail)?;
    let digest = Digest::from_name(digest_part).map_err(|_| fail())?;

    match scheme {
        "ecdsa" => {
            if digest == Digest::Md5 {
                return Err(fail());
            }
            Ok(SignatureAlgorithm {
                digest,
                key_algorithm: KeyAlgorithm::Ec,
                padding: None,
            })
        }
        "rsa" => Ok(SignatureAlgorithm {
            digest,
            key_algorithm: KeyAlgorithm::Rsa,
            padding: Some(SignaturePadding::RsaPkcs1),
        }),
        "rsa/pss" | "rsaandmgf1" => {
            if matches!(digest, Digest::None | Digest::Md5) {
                return Err(fail());
            }
            Ok(SignatureAlgorithm {
                digest,
                key_algorithm: KeyAlgorithm::Rsa,
                padding: Some(SignaturePadding::RsaPss),
            })
        }
        _ => Err(fail()),
    }
}

/// Parse an HMAC algorithm name into the HMAC key algorithm it uses
pub fn parse_mac_algorithm(name: &str) -> KeystoreResult<KeyAlgorithm> {
    match KeyAlgorithm::from_name(name.trim()) {
        Ok(alg) if alg.is_hmac() => Ok(alg),
        _ => Err(KeystoreError::no_such_algorithm("Mac", name)),
    }
}
