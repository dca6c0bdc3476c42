// HMAC vectors, key "key" over the shared plaintext

#[derive(Debug, Clone)]
pub struct HmacTestVector {
    pub algorithm: &'static str,
    pub key: &'static [u8],
    pub message: &'static [u8],
    pub tag: &'static str,
}

pub fn standard_test_vectors() -> Vec<HmacTestVector> {
    let vector = |algorithm, tag| HmacTestVector {
        algorithm,
        key: b"key",
        message: super::FOX,
        tag,
    };
    vec![
        vector("HmacSHA1", "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"),
        vector("HmacSHA224", "88ff8b54675d39b8f72322e65ff945c52d96379988ada25639747e69"),
        vector("HmacSHA256", "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"),
        vector(
            "HmacSHA384",
            "d7f4727e2c0b39ae0f1e40cc96f60242d5b7801841cea6fc592c5d3e1ae50700582a96cf35e1e554995fe4e03381c237",
        ),
        vector(
            "HmacSHA512",
            "b42af09057bac1e2d41708e48a902e09b5ff7f12ab428a4fe86653c73dd248fb82f948a549f7b791a5b41915ee4d1ec3935357e4e2317250d0372afa2ebeeb3a",
        ),
    ]
}
