use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hwkeystore::prelude::*;

const STORE_SIZE: usize = 1500;

fn loaded_keystore() -> Keystore {
    let mut keystore = KeystoreService::default().keystore();
    keystore.load(None, None).unwrap();
    keystore
}

fn aes_protection() -> KeyProtection {
    KeyProtection::builder(Purposes::ENCRYPT | Purposes::DECRYPT)
        .block_modes(&["CBC", "CTR", "GCM"])
        .encryption_paddings(&["NoPadding", "PKCS7Padding"])
        .randomized_encryption_required(false)
        .build()
        .unwrap()
}

fn import_aes(keystore: &Keystore, alias: &str, byte: u8) {
    let entry = SecretKeyEntry::new(TransparentSecretKey::new(&[byte; 16], "AES").unwrap()).unwrap();
    keystore
        .set_entry(alias, entry.into(), Some(&aes_protection()))
        .unwrap();
}

fn store_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.sample_size(10);

    group.bench_function("import_1500_entries", |b| {
        b.iter(|| {
            let keystore = loaded_keystore();
            for i in 0..STORE_SIZE {
                import_aes(&keystore, &format!("key-{}", i), i as u8);
            }
            keystore.size().unwrap()
        })
    });

    let keystore = loaded_keystore();
    for i in 0..STORE_SIZE {
        import_aes(&keystore, &format!("key-{}", i), i as u8);
    }

    group.bench_function("get_key", |b| {
        b.iter(|| keystore.get_key("key-750", None).unwrap())
    });

    group.bench_function("contains_alias", |b| {
        b.iter(|| keystore.contains_alias("key-1499").unwrap())
    });

    group.bench_function("aliases", |b| {
        b.iter(|| keystore.aliases().unwrap().count())
    });

    group.finish();
}

fn cipher_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("cipher");
    let keystore = loaded_keystore();
    import_aes(&keystore, "bench", 0x42);
    let key = keystore.get_key("bench", None).unwrap().unwrap();

    for size in [1024usize, 16 * 1024] {
        let data = vec![0xa5u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        for (transformation, params) in [
            ("AES/CBC/PKCS7Padding", CipherParameters::Iv(vec![1u8; 16])),
            ("AES/CTR/NoPadding", CipherParameters::Iv(vec![2u8; 16])),
            (
                "AES/GCM/NoPadding",
                CipherParameters::Gcm {
                    tag_len_bits: 128,
                    nonce: vec![3u8; 12],
                },
            ),
        ] {
            let mut cipher = Cipher::get_instance(transformation).unwrap();
            group.bench_with_input(BenchmarkId::new(transformation, size), &data, |b, data| {
                b.iter(|| {
                    cipher.init_with_params(CipherMode::Encrypt, &key, &params).unwrap();
                    cipher.do_final(data).unwrap()
                })
            });
        }
    }

    group.finish();
}

fn mac_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("mac");
    let keystore = loaded_keystore();
    let protection = KeyProtection::builder(Purposes::SIGN).build().unwrap();
    let entry = SecretKeyEntry::new(TransparentSecretKey::new(&[7u8; 32], "HmacSHA256").unwrap()).unwrap();
    keystore.set_entry("hmac", entry.into(), Some(&protection)).unwrap();
    let key = keystore.get_key("hmac", None).unwrap().unwrap();

    let data = vec![0x5au8; 16 * 1024];
    group.throughput(Throughput::Bytes(data.len() as u64));
    let mut mac = Mac::get_instance("HmacSHA256").unwrap();
    group.bench_function("hmac_sha256_16k", |b| {
        b.iter(|| {
            mac.init(&key).unwrap();
            mac.update(&data).unwrap();
            mac.do_final().unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, store_benchmarks, cipher_benchmarks, mac_benchmarks);
criterion_main!(benches);
