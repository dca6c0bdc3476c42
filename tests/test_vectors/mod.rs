// Known-answer vectors for the symmetric algorithms
// Values were produced with an independent AES/HMAC implementation

pub mod aes;
pub mod hmac;

/// Shared plaintext for most vectors
pub const FOX: &[u8] = b"The quick brown fox jumps over the lazy dog";

pub fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).expect("test vector hex")
}
