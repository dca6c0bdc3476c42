// Property tests for cipher sessions: output-size bounds, chunking and
// overlapping in-place buffers

use hwkeystore::prelude::*;
use proptest::prelude::*;

const TRANSFORMATIONS: [&str; 6] = [
    "AES/ECB/PKCS7Padding",
    "AES/CBC/PKCS7Padding",
    "AES/CBC/NoPadding",
    "AES/CTR/NoPadding",
    "AES/GCM/NoPadding",
    "AES/ECB/NoPadding",
];

/// Opaque handles only weakly reference their store, so the keystore is
/// returned alongside the key and must outlive every session.
fn aes_key() -> (Keystore, OpaqueKey) {
    let mut keystore = KeystoreService::default().keystore();
    keystore.load(None, None).unwrap();
    let protection = KeyProtection::builder(Purposes::ENCRYPT | Purposes::DECRYPT)
        .block_modes(&["ECB", "CBC", "CTR", "GCM"])
        .encryption_paddings(&["NoPadding", "PKCS7Padding"])
        .randomized_encryption_required(false)
        .build()
        .unwrap();
    let entry = SecretKeyEntry::new(TransparentSecretKey::new(&[0x5c; 16], "AES").unwrap()).unwrap();
    keystore.set_entry("prop", entry.into(), Some(&protection)).unwrap();
    let key = keystore.get_key("prop", None).unwrap().unwrap();
    (keystore, key)
}

fn params_for(transformation: &str) -> Option<CipherParameters> {
    if transformation.contains("ECB") {
        None
    } else if transformation.contains("GCM") {
        Some(CipherParameters::Gcm {
            tag_len_bits: 128,
            nonce: vec![7u8; 12],
        })
    } else {
        Some(CipherParameters::Iv(vec![3u8; 16]))
    }
}

fn start(transformation: &str, mode: CipherMode, key: &OpaqueKey) -> Cipher {
    let mut cipher = Cipher::get_instance(transformation).unwrap();
    match params_for(transformation) {
        Some(params) => cipher.init_with_params(mode, key, &params).unwrap(),
        None => cipher.init(mode, key).unwrap(),
    }
    cipher
}

/// Unpadded block modes only take whole blocks
fn usable_len(transformation: &str, len: usize) -> usize {
    if transformation.ends_with("ECB/NoPadding") || transformation.ends_with("CBC/NoPadding") {
        len - len % 16
    } else {
        len
    }
}

proptest! {
    #[test]
    fn proptest_output_never_exceeds_reported_size(
        index in 0..TRANSFORMATIONS.len(),
        data in prop::collection::vec(any::<u8>(), 0..200),
        split in 0usize..200,
    ) {
        let transformation = TRANSFORMATIONS[index];
        let data = &data[..usable_len(transformation, data.len())];
        let split = split.min(data.len());
        let (_keystore, key) = aes_key();

        let mut cipher = start(transformation, CipherMode::Encrypt, &key);
        let bound = cipher.get_output_size(split).unwrap();
        let head = cipher.update(&data[..split]).unwrap();
        prop_assert!(head.len() <= bound);
        let bound = cipher.get_output_size(data.len() - split).unwrap();
        let tail = cipher.do_final(&data[split..]).unwrap();
        prop_assert!(tail.len() <= bound);

        let ciphertext = [head, tail].concat();
        let mut decipher = start(transformation, CipherMode::Decrypt, &key);
        let bound = decipher.get_output_size(ciphertext.len()).unwrap();
        let plaintext = decipher.do_final(&ciphertext).unwrap();
        prop_assert!(plaintext.len() <= bound);
        prop_assert_eq!(plaintext.as_slice(), data);
    }

    #[test]
    fn proptest_chunking_does_not_change_output(
        index in 0..TRANSFORMATIONS.len(),
        data in prop::collection::vec(any::<u8>(), 0..160),
        chunk in 1usize..40,
    ) {
        let transformation = TRANSFORMATIONS[index];
        let data = &data[..usable_len(transformation, data.len())];
        let (_keystore, key) = aes_key();

        let one_shot = start(transformation, CipherMode::Encrypt, &key).do_final(data).unwrap();
        let mut cipher = start(transformation, CipherMode::Encrypt, &key);
        let mut chunked = Vec::new();
        for piece in data.chunks(chunk) {
            chunked.extend(cipher.update(piece).unwrap());
        }
        chunked.extend(cipher.do_final(&[]).unwrap());
        prop_assert_eq!(chunked, one_shot);
    }

    #[test]
    fn proptest_in_place_matches_separate_buffers(
        index in 0..TRANSFORMATIONS.len(),
        data in prop::collection::vec(any::<u8>(), 0..96),
        input_offset in 0usize..32,
        output_offset in 0usize..32,
    ) {
        let transformation = TRANSFORMATIONS[index];
        let data = &data[..usable_len(transformation, data.len())];
        let (_keystore, key) = aes_key();
        let expected = start(transformation, CipherMode::Encrypt, &key).do_final(data).unwrap();

        let mut buffer = vec![0u8; input_offset.max(output_offset) + data.len() + 32];
        buffer[input_offset..input_offset + data.len()].copy_from_slice(data);
        let mut cipher = start(transformation, CipherMode::Encrypt, &key);
        let written = cipher
            .do_final_in_place(&mut buffer, input_offset..input_offset + data.len(), output_offset)
            .unwrap();
        prop_assert_eq!(written, expected.len());
        prop_assert_eq!(&buffer[output_offset..output_offset + written], expected.as_slice());
    }
}
