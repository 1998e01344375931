use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use base64::{Engine, engine::general_purpose::STANDARD};
use sealgcm::crypto::aead;
use sealgcm::crypto::kdf::{self, KdfHash};
use sealgcm::format::envelope;
use sealgcm::{EnvelopeFormat, ErrorKind, SealConfig, Sealer};

fn sealer() -> Sealer {
    Sealer::new(SealConfig::default().with_sweep_interval(None)).expect("create sealer")
}

fn legacy_blob(password: &str, iterations: u32, plaintext: &[u8]) -> Vec<u8> {
    let salt = [0xAAu8; 16];
    let nonce = [0x11u8; 12];
    let key = kdf::derive_key(password.as_bytes(), &salt, iterations, KdfHash::Sha1)
        .expect("derive legacy key");

    let mut blob = salt.to_vec();
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&aead::seal(plaintext, key.as_bytes(), &nonce).expect("seal"));
    blob
}

#[test]
fn correct_horse_scenario() {
    let sealer = sealer();
    let salt = [0u8; 16];

    let envelope = sealer
        .encrypt_with_password(b"hello", "correct horse", Some(&salt[..]), Some(2000))
        .expect("encrypt");

    assert_eq!(envelope.len(), 53);
    assert_eq!(&envelope[..4], &16u32.to_le_bytes());
    assert_eq!(&envelope[4..20], &salt);

    let plaintext = sealer
        .decrypt_with_password(&envelope, "correct horse", Some(2000))
        .expect("decrypt");
    assert_eq!(plaintext, b"hello");

    let err = sealer
        .decrypt_with_password(&envelope, "wrong horse", Some(2000))
        .expect_err("wrong password must fail");
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
}

#[test]
fn roundtrip_empty_and_large_payloads() {
    let sealer = sealer();
    let large: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();

    for plaintext in [Vec::new(), b"x".to_vec(), large] {
        let envelope = sealer
            .encrypt_with_password(&plaintext, "pw", None, None)
            .expect("encrypt");
        assert_eq!(envelope.len(), 4 + 16 + 12 + plaintext.len() + 16);

        let decrypted = sealer
            .decrypt_with_password(&envelope, "pw", None)
            .expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }
}

#[test]
fn fresh_salt_and_nonce_per_encryption() {
    let sealer = sealer();
    let a = sealer
        .encrypt_with_password(b"same", "pw", None, None)
        .expect("encrypt");
    let b = sealer
        .encrypt_with_password(b"same", "pw", None, None)
        .expect("encrypt");

    assert_ne!(a, b);
    assert_ne!(&a[4..20], &b[4..20]);
}

#[test]
fn every_tampered_byte_fails_authentication() {
    let sealer = sealer();
    let envelope = sealer
        .encrypt_with_password(b"attack at dawn", "pw", None, Some(100))
        .expect("encrypt");

    // 长度前缀之后的每个字节：salt、nonce、密文、tag
    for index in 4..envelope.len() {
        let mut tampered = envelope.clone();
        tampered[index] ^= 0x80;

        let err = sealer
            .decrypt_with_password(&tampered, "pw", Some(100))
            .expect_err("tampered envelope must fail");
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure, "byte {index}");
    }
}

#[test]
fn truncated_envelopes_are_rejected() {
    let sealer = sealer();

    for len in [0, 3, 16, 43] {
        let err = sealer
            .decrypt_with_password(&vec![0u8; len], "pw", None)
            .expect_err("short input must fail");
        assert_eq!(err.kind(), ErrorKind::Format, "len {len}");
    }
}

#[test]
fn legacy_blob_is_detected_and_decrypted() {
    let sealer = sealer();
    let blob = legacy_blob("pw", 2000, b"legacy payload");

    assert_eq!(envelope::detect(&blob), EnvelopeFormat::Legacy);

    let plaintext = sealer
        .decrypt_with_password(&blob, "pw", None)
        .expect("decrypt legacy via detection");
    assert_eq!(plaintext, b"legacy payload");
}

#[test]
fn standalone_legacy_decode_defaults_to_ten_thousand_iterations() {
    let sealer = sealer();
    let blob = legacy_blob("pw", 10_000, b"old data");

    let plaintext = sealer.decrypt_legacy(&blob, "pw", None).expect("decrypt");
    assert_eq!(plaintext, b"old data");

    let err = sealer
        .decrypt_legacy(&blob, "pw", Some(2000))
        .expect_err("other iteration count must fail");
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
}

#[test]
fn legacy_blob_under_current_key_fails() {
    // 布局相同但密钥由 SHA-256 派生：旧格式路径必须拒绝
    let salt = [0xAAu8; 16];
    let nonce = [0x11u8; 12];
    let key = kdf::derive_key(b"pw", &salt, 2000, KdfHash::Sha256).expect("derive");

    let mut blob = salt.to_vec();
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&aead::seal(b"data", key.as_bytes(), &nonce).expect("seal"));

    let err = sealer()
        .decrypt_with_password(&blob, "pw", None)
        .expect_err("hash mismatch must fail");
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
}

#[test]
fn cached_key_token_roundtrip_and_interop() {
    let sealer = sealer();
    let salt = [7u8; 16];

    let token = sealer
        .derive_and_cache_key("pw", Some(&salt[..]), Some(1500))
        .expect("derive");
    let envelope = sealer
        .encrypt_with_cached_key(b"cached", &token)
        .expect("encrypt with token");

    assert_eq!(
        sealer
            .decrypt_with_cached_key(&envelope, &token)
            .expect("decrypt with token"),
        b"cached"
    );
    assert_eq!(
        sealer
            .decrypt_with_password(&envelope, "pw", Some(1500))
            .expect("decrypt with password"),
        b"cached"
    );
}

#[test]
fn cached_key_matches_direct_derivation() {
    let sealer = sealer();
    let salt = [3u8; 16];

    let token = sealer
        .derive_and_cache_key("pw", Some(&salt[..]), Some(1000))
        .expect("derive");
    let raw = STANDARD.decode(&token).expect("token is base64");
    let direct = kdf::derive_key(b"pw", &salt, 1000, KdfHash::Sha256).expect("derive");

    assert_eq!(raw.len(), 4 + 16 + 32);
    assert_eq!(&raw[4..20], &salt);
    assert_eq!(&raw[20..], direct.as_bytes());
}

#[test]
fn repeated_derivation_hits_the_cache() {
    let sealer = sealer();
    let salt = [1u8; 16];

    let first = sealer
        .derive_and_cache_key("pw", Some(&salt[..]), None)
        .expect("derive");
    let second = sealer
        .derive_and_cache_key("pw", Some(&salt[..]), None)
        .expect("derive");

    assert_eq!(first, second);
    let stats = sealer.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[test]
fn salt_mismatch_is_reported_before_decryption() {
    let sealer = sealer();
    let token_a = sealer
        .derive_and_cache_key("pw", Some(&[1u8; 16][..]), None)
        .expect("derive");
    let token_b = sealer
        .derive_and_cache_key("pw", Some(&[2u8; 16][..]), None)
        .expect("derive");

    let envelope = sealer
        .encrypt_with_cached_key(b"data", &token_a)
        .expect("encrypt");
    let err = sealer
        .decrypt_with_cached_key(&envelope, &token_b)
        .expect_err("salt mismatch");

    assert_eq!(err.kind(), ErrorKind::SaltMismatch);
}

#[test]
fn token_salt_outside_current_window_is_rejected() {
    let sealer = sealer();

    for salt_len in [4usize, 65] {
        let mut raw = (salt_len as u32).to_le_bytes().to_vec();
        raw.extend_from_slice(&vec![9u8; salt_len]);
        raw.extend_from_slice(&[0x42u8; 32]);
        let token = STANDARD.encode(&raw);

        let err = sealer
            .encrypt_with_cached_key(b"data", &token)
            .expect_err("out-of-window token salt must be rejected");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "salt len {salt_len}");
    }
}

#[test]
fn cached_key_envelopes_always_decode_as_current() {
    let sealer = sealer();

    for salt_len in [8usize, 64] {
        let salt = vec![9u8; salt_len];
        let token = sealer
            .derive_and_cache_key("pw", Some(&salt[..]), Some(200))
            .expect("derive");
        let envelope = sealer
            .encrypt_with_cached_key(b"data", &token)
            .expect("encrypt");

        assert_eq!(envelope::detect(&envelope), EnvelopeFormat::Current);
        assert_eq!(
            sealer
                .decrypt_with_password(&envelope, "pw", Some(200))
                .expect("decrypt"),
            b"data"
        );
    }
}

#[test]
fn expired_keys_are_swept() {
    let sealer = Sealer::new(
        SealConfig::default()
            .with_cache_ttl(Duration::from_millis(20))
            .with_sweep_interval(None),
    )
    .expect("create sealer");

    sealer
        .derive_and_cache_key("pw", None, Some(100))
        .expect("derive");
    assert_eq!(sealer.cache().len(), 1);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(sealer.cache().sweep(), 1);
    assert!(sealer.cache().is_empty());

    sealer
        .derive_and_cache_key("pw", None, Some(100))
        .expect("derive again");
    let stats = sealer.cache().stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.entries, 1);
}

#[test]
fn background_sweeper_runs_without_traffic() {
    let sealer = Sealer::new(
        SealConfig::default()
            .with_cache_ttl(Duration::from_millis(10))
            .with_sweep_interval(Some(Duration::from_millis(10))),
    )
    .expect("create sealer");
    assert!(sealer.has_sweeper());

    sealer
        .derive_and_cache_key("pw", None, Some(100))
        .expect("derive");

    let deadline = Instant::now() + Duration::from_secs(5);
    while !sealer.cache().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(sealer.cache().is_empty());
}

#[test]
fn concurrent_callers_share_one_sealer() {
    let sealer = Arc::new(sealer());
    let salt = [5u8; 16];

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let sealer = Arc::clone(&sealer);
            thread::spawn(move || {
                let token = sealer
                    .derive_and_cache_key("shared", Some(&salt[..]), Some(500))
                    .expect("derive");
                let message = format!("message {i}");
                let envelope = sealer
                    .encrypt_with_cached_key(message.as_bytes(), &token)
                    .expect("encrypt");
                let plaintext = sealer
                    .decrypt_with_password(&envelope, "shared", Some(500))
                    .expect("decrypt");
                assert_eq!(plaintext, message.as_bytes());
                token
            })
        })
        .collect();

    let tokens: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();

    assert!(tokens.iter().all(|t| t == &tokens[0]));
    assert_eq!(sealer.cache().len(), 1);
}

#[test]
fn raw_key_parameters_are_exact() {
    let key = [0u8; 32];
    let nonce = [0u8; 12];

    for bad_key in [&[0u8; 31][..], &[0u8; 33][..]] {
        let err = sealgcm::encrypt_bytes(b"x", bad_key, &nonce).expect_err("bad key");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    for bad_nonce in [&[0u8; 11][..], &[0u8; 13][..]] {
        let err = sealgcm::encrypt_bytes(b"x", &key, bad_nonce).expect_err("bad nonce");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    let err = sealgcm::decrypt_bytes(&[0u8; 15], &key, &nonce).expect_err("short input");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let sealed = sealgcm::encrypt_bytes(b"raw", &key, &nonce).expect("encrypt");
    assert_eq!(sealed.len(), 3 + 16);
    assert_eq!(
        sealgcm::decrypt_bytes(&sealed, &key, &nonce).expect("decrypt"),
        b"raw"
    );
}

#[test]
fn text_forms_through_default_sealer() {
    let encoded = sealgcm::encrypt_text_with_password("grüße", "pw", None, Some(500))
        .expect("encrypt text");
    let decoded =
        sealgcm::decrypt_text_with_password(&encoded, "pw", Some(500)).expect("decrypt text");

    assert_eq!(decoded, "grüße");

    let err = sealgcm::decrypt_text_with_password("%%%", "pw", None).expect_err("bad base64");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn crate_root_cached_key_operations() {
    let token = sealgcm::derive_and_cache_key("root", None, Some(500)).expect("derive");
    let envelope = sealgcm::encrypt_with_cached_key(b"root data", &token).expect("encrypt");

    assert_eq!(
        sealgcm::decrypt_with_cached_key(&envelope, &token).expect("decrypt"),
        b"root data"
    );

    let err = sealgcm::encrypt_with_cached_key(b"x", "").expect_err("empty token");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
