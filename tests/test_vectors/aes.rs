// AES vectors in ECB, CBC, CTR and GCM modes

/// One AES known answer. `iv` holds the nonce for GCM.
#[derive(Debug, Clone)]
pub struct AesTestVector {
    pub name: &'static str,
    pub transformation: &'static str,
    pub key: &'static str,
    pub iv: Option<&'static str>,
    pub aad: Option<&'static [u8]>,
    pub plaintext: &'static [u8],
    /// Ciphertext, with the 128-bit tag appended for GCM
    pub ciphertext: &'static str,
}

const KEY_128: &str = "7d9f11a0da111e9d8bdd14f04648ed91";
const KEY_192: &str = "000102030405060708090a0b0c0d0e0f1011121314151617";
const KEY_256: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
const IV_0_15: &str = "000102030405060708090a0b0c0d0e0f";
const GCM_NONCE: &str = "cafebabefacedbaddecaf888";

pub fn standard_test_vectors() -> Vec<AesTestVector> {
    vec![
        AesTestVector {
            name: "ECB PKCS7 AES-128",
            transformation: "AES/ECB/PKCS7Padding",
            key: KEY_128,
            iv: None,
            aad: None,
            plaintext: super::FOX,
            ciphertext: "0da2da0fc7caa81acd5e360a148231c9bc4630394c95edfdcd043d9c6a62bf32a80736d09b625d160c927eaf80e05c1c",
        },
        AesTestVector {
            name: "ECB NoPadding AES-128 two blocks",
            transformation: "AES/ECB/NoPadding",
            key: KEY_128,
            iv: None,
            aad: None,
            plaintext: &[
                0x03, 0x83, 0x91, 0x1b, 0xb1, 0x51, 0x9d, 0x58, 0xe6, 0x65, 0x6f, 0x3f, 0xd3, 0x56, 0x39, 0xc5,
                0x02, 0xdb, 0xeb, 0x21, 0x96, 0xce, 0xa9, 0x37, 0xfc, 0xa2, 0x72, 0x66, 0x6c, 0xb4, 0xa8, 0x0b,
            ],
            ciphertext: "6574c5065283b89e0c930019e4655d8516b98170db6516cd83e589bd9c5e5adc",
        },
        AesTestVector {
            name: "ECB NoPadding AES-256 zero block",
            transformation: "AES/ECB/NoPadding",
            key: KEY_256,
            iv: None,
            aad: None,
            plaintext: &[0u8; 16],
            ciphertext: "f29000b62a499fd0a9f39a6add2e7780",
        },
        AesTestVector {
            name: "CBC PKCS7 AES-128",
            transformation: "AES/CBC/PKCS5Padding",
            key: KEY_128,
            iv: Some(IV_0_15),
            aad: None,
            plaintext: super::FOX,
            ciphertext: "6b98f482117eb906a6d03d5c831a5d6911ba5bbe8be27dac5679a745daaa163502378624657b4e54f5fe337a993df46b",
        },
        AesTestVector {
            name: "CBC PKCS7 AES-256",
            transformation: "AES/CBC/PKCS7Padding",
            key: KEY_256,
            iv: Some("101112131415161718191a1b1c1d1e1f"),
            aad: None,
            plaintext: super::FOX,
            ciphertext: "b746e4f1bce2352d20440b8a2e0eb8fd68c1fcd0d00fcac779ecaadacde7e51a41da205eac66749510362db1c9f3e6d5",
        },
        AesTestVector {
            name: "CTR AES-128",
            transformation: "AES/CTR/NoPadding",
            key: KEY_128,
            iv: Some(IV_0_15),
            aad: None,
            plaintext: super::FOX,
            ciphertext: "7c0f5e0449575365ed86f0014101905fbfa2cb090fd76996a1becbee2b2b72b179660fe54b9d6cc45a3983",
        },
        AesTestVector {
            name: "CTR AES-192 zero counter",
            transformation: "AES/CTR/NoPadding",
            key: KEY_192,
            iv: Some("00000000000000000000000000000000"),
            aad: None,
            plaintext: super::FOX,
            ciphertext: "c50a34a26d06cc41a8b6b4555776f8272f21407a214ac2c760ca83de6d104763b36632e7d6375d0ce72d25",
        },
        AesTestVector {
            name: "CTR AES-128 counter carries past 64 bits",
            transformation: "AES/CTR/NoPadding",
            key: KEY_128,
            iv: Some("0102030405060708ffffffffffffffff"),
            aad: None,
            plaintext: &[0u8; 48],
            ciphertext: "5eded859a9b978759e565c4a8d1e37313e4d91b67bf76c2af4507a030f1e45a76b22814aea020c81d390a8333c37f832",
        },
        AesTestVector {
            name: "GCM AES-128 with AAD",
            transformation: "AES/GCM/NoPadding",
            key: KEY_128,
            iv: Some(GCM_NONCE),
            aad: Some(b"header"),
            plaintext: super::FOX,
            ciphertext: "869eac0c8b89118892d43d2c708b9e2ebce8ff6f968c8e4fc2b02918a3321de65ef6a8ba80894b8104aaff73d217c8cf6ab31b75508191db5c6b1b",
        },
        AesTestVector {
            name: "GCM AES-128 empty",
            transformation: "AES/GCM/NoPadding",
            key: KEY_128,
            iv: Some(GCM_NONCE),
            aad: None,
            plaintext: b"",
            ciphertext: "0463537c304beadb0967edb50cd72184",
        },
        AesTestVector {
            name: "GCM AES-192 with AAD",
            transformation: "AES/GCM/NoPadding",
            key: KEY_192,
            iv: Some(GCM_NONCE),
            aad: Some(b"header"),
            plaintext: super::FOX,
            ciphertext: "984edf192f48d111e9444dc3af7451478c051b11361d3babf84690ca24d156cc06655b782e2939ada0a2b349ff01cd2250be033ae1348ba794bb55",
        },
    ]
}
