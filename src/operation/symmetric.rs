//! AES engines: ECB/CBC block modes with optional PKCS#7 padding, CTR, and
//! GCM.
//!
//! Each engine restarts from its initial IV after `do_final`, whether or not
//! the final step succeeded.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use ghash::universal_hash::{KeyInit as _, UniversalHash};
use ghash::GHash;
use zeroize::Zeroizing;

use super::CipherSpi;
use crate::error::{error_codes, KeystoreError, KeystoreResult};

pub(crate) const AES_BLOCK_SIZE: usize = 16;

fn bad_key_length(len: usize) -> KeystoreError {
    KeystoreError::invalid_key(
        "cipher init",
        &format!("{}-byte key is not an AES key", len),
        error_codes::KEY_TYPE_MISMATCH,
    )
}

/// The AES block function for one of the three key sizes
pub(crate) enum AesCore {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesCore {
    pub(crate) fn new(key: &[u8]) -> KeystoreResult<Self> {
        let core = match key.len() {
            16 => Aes128::new_from_slice(key).map(AesCore::Aes128),
            24 => Aes192::new_from_slice(key).map(AesCore::Aes192),
            32 => Aes256::new_from_slice(key).map(AesCore::Aes256),
            n => return Err(bad_key_length(n)),
        };
        core.map_err(|_| bad_key_length(key.len()))
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = aes::Block::from_mut_slice(block);
        match self {
            AesCore::Aes128(c) => c.encrypt_block(block),
            AesCore::Aes192(c) => c.encrypt_block(block),
            AesCore::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = aes::Block::from_mut_slice(block);
        match self {
            AesCore::Aes128(c) => c.decrypt_block(block),
            AesCore::Aes192(c) => c.decrypt_block(block),
            AesCore::Aes256(c) => c.decrypt_block(block),
        }
    }
}

/// ECB or CBC, with or without PKCS#7 padding
pub(crate) struct BlockEngine {
    core: AesCore,
    /// Initial chaining value; `None` for ECB
    iv: Option<[u8; AES_BLOCK_SIZE]>,
    chain: [u8; AES_BLOCK_SIZE],
    encrypting: bool,
    padded: bool,
    buffer: Vec<u8>,
}

impl BlockEngine {
    pub(crate) fn new(core: AesCore, iv: Option<&[u8]>, encrypting: bool, padded: bool) -> KeystoreResult<Self> {
        let iv = match iv {
            Some(bytes) => {
                let mut block = [0u8; AES_BLOCK_SIZE];
                if bytes.len() != AES_BLOCK_SIZE {
                    return Err(KeystoreError::invalid_parameter_with_code(
                        "IV",
                        "16 bytes",
                        &bytes.len().to_string(),
                        error_codes::INVALID_IV,
                    ));
                }
                block.copy_from_slice(bytes);
                Some(block)
            }
            None => None,
        };
        Ok(Self {
            core,
            iv,
            chain: iv.unwrap_or([0u8; AES_BLOCK_SIZE]),
            encrypting,
            padded,
            buffer: Vec::new(),
        })
    }

    fn process_blocks(&mut self, data: &mut [u8]) {
        for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            match (self.iv.is_some(), self.encrypting) {
                (false, true) => self.core.encrypt_block(block),
                (false, false) => self.core.decrypt_block(block),
                (true, true) => {
                    block.iter_mut().zip(self.chain.iter()).for_each(|(b, c)| *b ^= c);
                    self.core.encrypt_block(block);
                    self.chain.copy_from_slice(block);
                }
                (true, false) => {
                    let mut next = [0u8; AES_BLOCK_SIZE];
                    next.copy_from_slice(block);
                    self.core.decrypt_block(block);
                    block.iter_mut().zip(self.chain.iter()).for_each(|(b, c)| *b ^= c);
                    self.chain = next;
                }
            }
        }
    }

    fn finish(&mut self, mut data: Vec<u8>) -> KeystoreResult<Vec<u8>> {
        if self.encrypting && self.padded {
            let pad = AES_BLOCK_SIZE - data.len() % AES_BLOCK_SIZE;
            data.resize(data.len() + pad, pad as u8);
        }
        if data.len() % AES_BLOCK_SIZE != 0 {
            return Err(KeystoreError::illegal_block_size(
                "do final",
                &format!("{} bytes is not a multiple of the AES block size", data.len()),
            ));
        }
        self.process_blocks(&mut data);
        if !self.encrypting && self.padded {
            strip_pkcs7(&mut data)?;
        }
        Ok(data)
    }
}

fn strip_pkcs7(data: &mut Vec<u8>) -> KeystoreResult<()> {
    let invalid = || KeystoreError::bad_padding("do final", "invalid PKCS#7 padding", error_codes::PADDING_INVALID);
    let pad = *data.last().ok_or_else(invalid)? as usize;
    if pad == 0 || pad > AES_BLOCK_SIZE || pad > data.len() {
        return Err(invalid());
    }
    // Check every pad byte before reporting, so timing does not depend on
    // where the first mismatch is
    let mismatch = data[data.len() - pad..]
        .iter()
        .fold(0u8, |acc, b| acc | (b ^ pad as u8));
    if mismatch != 0 {
        return Err(invalid());
    }
    data.truncate(data.len() - pad);
    Ok(())
}

impl CipherSpi for BlockEngine {
    fn update(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        self.buffer.extend_from_slice(input);
        let total = self.buffer.len();
        let mut ready = total - total % AES_BLOCK_SIZE;
        // Padded decryption keeps the last full block: it may be all padding
        if !self.encrypting && self.padded && ready == total && ready > 0 {
            ready -= AES_BLOCK_SIZE;
        }
        let mut out: Vec<u8> = self.buffer.drain(..ready).collect();
        self.process_blocks(&mut out);
        Ok(out)
    }

    fn do_final(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        let mut data = std::mem::take(&mut self.buffer);
        data.extend_from_slice(input);
        let result = self.finish(data);
        self.chain = self.iv.unwrap_or([0u8; AES_BLOCK_SIZE]);
        result
    }

    fn output_size(&self, input_len: usize) -> usize {
        let total = self.buffer.len() + input_len;
        if self.encrypting && self.padded {
            (total / AES_BLOCK_SIZE + 1) * AES_BLOCK_SIZE
        } else {
            total
        }
    }

    fn exact_output_size(&self, input: &[u8], finishing: bool) -> Option<usize> {
        let total = self.buffer.len() + input.len();
        if !finishing {
            let ready = total - total % AES_BLOCK_SIZE;
            if !self.encrypting && self.padded && ready == total && ready > 0 {
                return Some(ready - AES_BLOCK_SIZE);
            }
            return Some(ready);
        }
        if self.encrypting || !self.padded {
            return Some(self.output_size(input.len()));
        }
        if total == 0 || total % AES_BLOCK_SIZE != 0 {
            return None;
        }
        // Decrypt a copy of the final block to read its pad length
        let byte_at = |i: usize| {
            if i < self.buffer.len() {
                self.buffer[i]
            } else {
                input[i - self.buffer.len()]
            }
        };
        let mut last = [0u8; AES_BLOCK_SIZE];
        last.iter_mut()
            .enumerate()
            .for_each(|(i, b)| *b = byte_at(total - AES_BLOCK_SIZE + i));
        self.core.decrypt_block(&mut last);
        if self.iv.is_some() {
            let previous = |i: usize| {
                if total > AES_BLOCK_SIZE {
                    byte_at(total - 2 * AES_BLOCK_SIZE + i)
                } else {
                    self.chain[i]
                }
            };
            last.iter_mut().enumerate().for_each(|(i, b)| *b ^= previous(i));
        }
        let pad = last[AES_BLOCK_SIZE - 1] as usize;
        (1..=AES_BLOCK_SIZE).contains(&pad).then(|| total - pad)
    }

    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }
}

/// AES keystream with a 128-bit big-endian counter (CTR mode)
enum Ctr128 {
    Aes128(ctr::Ctr128BE<Aes128>),
    Aes192(ctr::Ctr128BE<Aes192>),
    Aes256(ctr::Ctr128BE<Aes256>),
}

/// AES keystream with a 32-bit big-endian counter (GCM's GCTR)
enum Ctr32 {
    Aes128(ctr::Ctr32BE<Aes128>),
    Aes192(ctr::Ctr32BE<Aes192>),
    Aes256(ctr::Ctr32BE<Aes256>),
}

macro_rules! keystream_impl {
    ($name:ident, $mode:ident) => {
        impl $name {
            fn new(key: &[u8], counter_block: &[u8]) -> KeystoreResult<Self> {
                let stream = match key.len() {
                    16 => ctr::$mode::<Aes128>::new_from_slices(key, counter_block).map($name::Aes128),
                    24 => ctr::$mode::<Aes192>::new_from_slices(key, counter_block).map($name::Aes192),
                    32 => ctr::$mode::<Aes256>::new_from_slices(key, counter_block).map($name::Aes256),
                    n => return Err(bad_key_length(n)),
                };
                stream.map_err(|_| {
                    KeystoreError::invalid_parameter_with_code(
                        "IV",
                        "16 bytes",
                        &counter_block.len().to_string(),
                        error_codes::INVALID_IV,
                    )
                })
            }

            fn apply(&mut self, data: &mut [u8]) {
                match self {
                    $name::Aes128(s) => s.apply_keystream(data),
                    $name::Aes192(s) => s.apply_keystream(data),
                    $name::Aes256(s) => s.apply_keystream(data),
                }
            }
        }
    };
}

keystream_impl!(Ctr128, Ctr128BE);
keystream_impl!(Ctr32, Ctr32BE);

/// AES in CTR mode
pub(crate) struct CtrEngine {
    key: Zeroizing<Vec<u8>>,
    iv: Vec<u8>,
    stream: Ctr128,
}

impl CtrEngine {
    pub(crate) fn new(key: &[u8], iv: &[u8]) -> KeystoreResult<Self> {
        Ok(Self {
            key: Zeroizing::new(key.to_vec()),
            iv: iv.to_vec(),
            stream: Ctr128::new(key, iv)?,
        })
    }
}

impl CipherSpi for CtrEngine {
    fn update(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        let mut out = input.to_vec();
        self.stream.apply(&mut out);
        Ok(out)
    }

    fn do_final(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        let out = self.update(input)?;
        self.stream = Ctr128::new(&self.key, &self.iv)?;
        Ok(out)
    }

    fn output_size(&self, input_len: usize) -> usize {
        input_len
    }

    fn exact_output_size(&self, input: &[u8], _finishing: bool) -> Option<usize> {
        Some(input.len())
    }

    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }
}

pub(crate) const GCM_NONCE_LEN: usize = 12;

/// AES-GCM with a 96-bit nonce.
///
/// Encryption streams ciphertext as input arrives, hashing it into GHASH on
/// the way out, and appends the tag at `do_final`. Decryption releases nothing
/// until the tag has been checked.
pub(crate) struct GcmEngine {
    key: Zeroizing<Vec<u8>>,
    nonce: [u8; GCM_NONCE_LEN],
    tag_len: usize,
    encrypting: bool,
    hash_key: Zeroizing<[u8; AES_BLOCK_SIZE]>,
    /// E(K, J0), XORed into the GHASH output
    tag_mask: Zeroizing<[u8; AES_BLOCK_SIZE]>,
    ghash: GHash,
    aad_len: u64,
    text_len: u64,
    /// Bytes not yet forming a whole GHASH block
    tail: Vec<u8>,
    /// Ciphertext and tag when decrypting
    buffer: Zeroizing<Vec<u8>>,
    data_started: bool,
    stream: Ctr32,
}

impl GcmEngine {
    pub(crate) fn new(key: &[u8], nonce: &[u8], tag_len_bits: u32, encrypting: bool) -> KeystoreResult<Self> {
        if nonce.len() != GCM_NONCE_LEN {
            return Err(KeystoreError::invalid_parameter_with_code(
                "GCM nonce",
                "12 bytes",
                &nonce.len().to_string(),
                error_codes::INVALID_IV,
            ));
        }
        if !(96..=128).contains(&tag_len_bits) || tag_len_bits % 8 != 0 {
            return Err(KeystoreError::invalid_parameter_with_code(
                "GCM tag length",
                "96 to 128 bits in steps of 8",
                &tag_len_bits.to_string(),
                error_codes::INVALID_TAG_LENGTH,
            ));
        }
        let mut fixed = [0u8; GCM_NONCE_LEN];
        fixed.copy_from_slice(nonce);

        let core = AesCore::new(key)?;
        let mut hash_key = Zeroizing::new([0u8; AES_BLOCK_SIZE]);
        core.encrypt_block(&mut hash_key[..]);
        let mut tag_mask = Zeroizing::new([0u8; AES_BLOCK_SIZE]);
        tag_mask[..GCM_NONCE_LEN].copy_from_slice(&fixed);
        tag_mask[AES_BLOCK_SIZE - 1] = 1;
        core.encrypt_block(&mut tag_mask[..]);

        Ok(Self {
            key: Zeroizing::new(key.to_vec()),
            nonce: fixed,
            tag_len: (tag_len_bits / 8) as usize,
            encrypting,
            ghash: GHash::new(&ghash::Key::from(*hash_key)),
            hash_key,
            tag_mask,
            aad_len: 0,
            text_len: 0,
            tail: Vec::with_capacity(AES_BLOCK_SIZE),
            buffer: Zeroizing::new(Vec::new()),
            data_started: false,
            stream: Ctr32::new(key, &first_counter_block(&fixed))?,
        })
    }

    /// Feed `data` into GHASH, keeping a trailing partial block in `tail`
    fn absorb(&mut self, mut data: &[u8]) {
        if !self.tail.is_empty() {
            let take = (AES_BLOCK_SIZE - self.tail.len()).min(data.len());
            self.tail.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.tail.len() < AES_BLOCK_SIZE {
                return;
            }
            self.ghash.update(&[ghash::Block::clone_from_slice(&self.tail)]);
            self.tail.clear();
        }
        let whole = data.len() - data.len() % AES_BLOCK_SIZE;
        for block in data[..whole].chunks_exact(AES_BLOCK_SIZE) {
            self.ghash.update(&[ghash::Block::clone_from_slice(block)]);
        }
        self.tail.extend_from_slice(&data[whole..]);
    }

    /// Zero-pad whatever partial block is pending
    fn pad_tail(&mut self) {
        self.ghash.update_padded(&self.tail);
        self.tail.clear();
    }

    /// Mark the switch from AAD to data; AAD is padded to a block boundary
    fn start_data(&mut self) {
        if !self.data_started {
            self.pad_tail();
            self.data_started = true;
        }
    }

    fn hash_text(&mut self, ciphertext: &[u8]) {
        self.start_data();
        self.absorb(ciphertext);
        self.text_len += ciphertext.len() as u64;
    }

    /// Full 16-byte tag over everything hashed so far
    fn compute_tag(&mut self) -> [u8; AES_BLOCK_SIZE] {
        self.start_data();
        self.pad_tail();
        let mut lengths = [0u8; AES_BLOCK_SIZE];
        lengths[..8].copy_from_slice(&(self.aad_len * 8).to_be_bytes());
        lengths[8..].copy_from_slice(&(self.text_len * 8).to_be_bytes());
        self.ghash.update(&[ghash::Block::from(lengths)]);

        let fresh = GHash::new(&ghash::Key::from(*self.hash_key));
        let hashed = std::mem::replace(&mut self.ghash, fresh).finalize();
        let mut tag = [0u8; AES_BLOCK_SIZE];
        for (out, (h, m)) in tag.iter_mut().zip(hashed.iter().zip(self.tag_mask.iter())) {
            *out = h ^ m;
        }
        tag
    }

    fn finish(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        if self.encrypting {
            let mut out = self.update(input)?;
            let tag = self.compute_tag();
            out.extend_from_slice(&tag[..self.tag_len]);
            return Ok(out);
        }

        self.buffer.extend_from_slice(input);
        if self.buffer.len() < self.tag_len {
            return Err(KeystoreError::bad_padding(
                "do final",
                "ciphertext shorter than the authentication tag",
                error_codes::AUTHENTICATION_TAG_MISMATCH,
            ));
        }
        let split = self.buffer.len() - self.tag_len;
        let ciphertext = std::mem::replace(&mut self.buffer, Zeroizing::new(Vec::new()));
        self.hash_text(&ciphertext[..split]);
        let expected = self.compute_tag();
        if !crate::utils::constant_time_eq(&expected[..self.tag_len], &ciphertext[split..]) {
            return Err(KeystoreError::bad_padding(
                "do final",
                "GCM authentication tag mismatch",
                error_codes::AUTHENTICATION_TAG_MISMATCH,
            ));
        }
        let mut plaintext = ciphertext[..split].to_vec();
        self.stream.apply(&mut plaintext);
        Ok(plaintext)
    }

    fn reset(&mut self) -> KeystoreResult<()> {
        self.ghash = GHash::new(&ghash::Key::from(*self.hash_key));
        self.aad_len = 0;
        self.text_len = 0;
        self.tail.clear();
        self.buffer = Zeroizing::new(Vec::new());
        self.data_started = false;
        self.stream = Ctr32::new(&self.key, &first_counter_block(&self.nonce))?;
        Ok(())
    }
}

/// inc32(J0) for a 96-bit nonce: the first counter block used for data
fn first_counter_block(nonce: &[u8; GCM_NONCE_LEN]) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[..GCM_NONCE_LEN].copy_from_slice(nonce);
    block[15] = 2;
    block
}

impl CipherSpi for GcmEngine {
    fn update(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        if !self.encrypting {
            self.start_data();
            self.buffer.extend_from_slice(input);
            return Ok(Vec::new());
        }
        let mut out = input.to_vec();
        self.stream.apply(&mut out);
        self.hash_text(&out);
        Ok(out)
    }

    fn update_aad(&mut self, aad: &[u8]) -> KeystoreResult<()> {
        if self.data_started {
            return Err(KeystoreError::illegal_state(
                "update AAD",
                "AAD must be supplied before any data",
                error_codes::AAD_AFTER_DATA,
            ));
        }
        self.absorb(aad);
        self.aad_len += aad.len() as u64;
        Ok(())
    }

    fn do_final(&mut self, input: &[u8]) -> KeystoreResult<Vec<u8>> {
        let result = self.finish(input);
        self.reset()?;
        result
    }

    fn output_size(&self, input_len: usize) -> usize {
        if self.encrypting {
            input_len + self.tag_len
        } else {
            (self.buffer.len() + input_len).saturating_sub(self.tag_len)
        }
    }

    fn exact_output_size(&self, input: &[u8], finishing: bool) -> Option<usize> {
        match (self.encrypting, finishing) {
            (true, false) => Some(input.len()),
            (true, true) => Some(input.len() + self.tag_len),
            (false, false) => Some(0),
            (false, true) => Some(self.output_size(input.len())),
        }
    }

    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }
}
