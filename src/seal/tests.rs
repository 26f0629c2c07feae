// Copyright (C) Microsoft Corporation. All rights reserved.

use super::*;
use crate::crypto::Environment;
use crate::digest::DigestAlgorithm;

fn rsa_keypair() -> (Key, Key) {
    let private = Key::generate(KeyType::RsaPrivate, 2048).expect("generate RSA key");
    let public = private.extract_public().expect("extract public key");
    (private, public)
}

/// Seals `plaintext` in one update, opens it in one update, and returns the
/// recovered plaintext.
fn seal_open_roundtrip(
    algo: EncryptionAlgorithm,
    mode: BlockCipherMode,
    key_bits: usize,
    plaintext: &[u8],
) -> Vec<u8> {
    let (private, public) = rsa_keypair();

    let (mut seal, session_key, iv) =
        Context::seal_initialize(&public, algo, mode, key_bits).expect("seal init");

    let mut buf = vec![0u8; seal.output_length(plaintext.len()).unwrap()];
    let n = seal.seal_update(plaintext, &mut buf).expect("seal update");
    let mut ciphertext = buf[..n].to_vec();
    let mut tail = vec![0u8; seal.output_length(0).unwrap()];
    let n = seal.seal_finalize(&mut tail).expect("seal finalize");
    ciphertext.extend_from_slice(&tail[..n]);

    let mut open = Context::open_initialize(
        &private,
        algo,
        mode,
        key_bits,
        &session_key,
        iv.as_ref(),
    )
    .expect("open init");

    let mut buf = vec![0u8; open.output_length(ciphertext.len()).unwrap()];
    let n = open.open_update(&ciphertext, &mut buf).expect("open update");
    let mut recovered = buf[..n].to_vec();
    let mut last = vec![0u8; open.output_length(0).unwrap()];
    let n = open.open_finalize(&mut last).expect("open finalize");
    recovered.extend_from_slice(&last[..n]);
    recovered
}

#[test]
fn test_seal_open_aes_cbc_roundtrip() {
    let _env = Environment::initialize().unwrap();

    let plaintext = b"sixteen byte msg";
    let recovered = seal_open_roundtrip(
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
        plaintext,
    );
    assert_eq!(recovered, plaintext);
}

#[test]
fn test_seal_open_streaming_split_updates() {
    let _env = Environment::initialize().unwrap();

    let (private, public) = rsa_keypair();
    let plaintext = b"The quick brown fox jumps over the lazy dog, repeatedly and at length.";

    let (mut seal, session_key, iv) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        128,
    )
    .unwrap();

    let mut ciphertext = Vec::new();
    for chunk in plaintext.chunks(7) {
        let mut out = vec![0u8; seal.output_length(chunk.len()).unwrap()];
        let n = seal.seal_update(chunk, &mut out).unwrap();
        ciphertext.extend_from_slice(&out[..n]);
    }
    let mut out = vec![0u8; seal.output_length(0).unwrap()];
    let n = seal.seal_finalize(&mut out).unwrap();
    ciphertext.extend_from_slice(&out[..n]);

    let mut open = Context::open_initialize(
        &private,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        128,
        &session_key,
        iv.as_ref(),
    )
    .unwrap();

    let mut recovered = Vec::new();
    for chunk in ciphertext.chunks(31) {
        let mut out = vec![0u8; open.output_length(chunk.len()).unwrap()];
        let n = open.open_update(chunk, &mut out).unwrap();
        recovered.extend_from_slice(&out[..n]);
    }
    let mut out = vec![0u8; open.output_length(0).unwrap()];
    let n = open.open_finalize(&mut out).unwrap();
    recovered.extend_from_slice(&out[..n]);

    assert_eq!(recovered, plaintext);
}

#[test]
fn test_seal_emits_iv_for_cbc_but_not_ecb() {
    let _env = Environment::initialize().unwrap();

    let (_, public) = rsa_keypair();

    let (_, _, iv) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
    )
    .unwrap();
    let iv = iv.expect("CBC seal must produce an IV");
    assert_eq!(iv.key_type(), KeyType::Iv);
    assert_eq!(iv.bits().unwrap(), 128);

    let (_, _, iv) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Ecb,
        256,
    )
    .unwrap();
    assert!(iv.is_none(), "ECB seal must not produce an IV");
}

#[test]
fn test_seal_open_ecb_without_iv() {
    let _env = Environment::initialize().unwrap();

    let plaintext = b"no iv in this mode at all";
    let recovered = seal_open_roundtrip(
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Ecb,
        256,
        plaintext,
    );
    assert_eq!(recovered, plaintext);
}

#[test]
fn test_seal_rejects_aead_and_unavailable_ciphers() {
    let _env = Environment::initialize().unwrap();

    let (_, public) = rsa_keypair();

    // A GCM or CCM seal would produce a stream that can never authenticate
    // on open, so initialization must refuse it outright.
    for mode in [BlockCipherMode::Gcm, BlockCipherMode::Ccm] {
        let err = Context::seal_initialize(&public, EncryptionAlgorithm::Aes, mode, 256)
            .err()
            .unwrap();
        assert_eq!(err, CryptoError::InvalidParameter);
    }

    let err = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::UnsafeRc4,
        BlockCipherMode::None,
        128,
    )
    .err()
    .unwrap();
    assert_eq!(err, CryptoError::InvalidParameter);
}

#[test]
fn test_output_length_bounds() {
    let _env = Environment::initialize().unwrap();

    let (_, public) = rsa_keypair();
    let (seal, _, _) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
    )
    .unwrap();

    // Zero input still needs room for one flushed block.
    assert_eq!(seal.output_length(0).unwrap(), 16);
    assert_eq!(seal.output_length(5).unwrap(), 20);
    assert_eq!(seal.output_length(16).unwrap(), 31);
    assert_eq!(
        seal.output_length(usize::MAX),
        Err(CryptoError::InvalidParameter)
    );
}

#[test]
fn test_seal_rejects_wrong_key_types() {
    let _env = Environment::initialize().unwrap();

    let (private, _) = rsa_keypair();
    let symmetric = Key::generate(KeyType::Symmetric, 256).unwrap();

    for key in [&private, &symmetric] {
        let err = Context::seal_initialize(
            key,
            EncryptionAlgorithm::Aes,
            BlockCipherMode::Cbc,
            256,
        )
        .err()
        .unwrap();
        assert_eq!(err, CryptoError::InvalidParameter);
    }
}

#[test]
fn test_open_rejects_wrong_key_types() {
    let _env = Environment::initialize().unwrap();

    let (private, public) = rsa_keypair();
    let (_, session_key, iv) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
    )
    .unwrap();

    // Public key where the private key belongs.
    let err = Context::open_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
        &session_key,
        iv.as_ref(),
    )
    .err()
    .unwrap();
    assert_eq!(err, CryptoError::InvalidParameter);

    // An IV handle where the session key belongs.
    let bogus = Key::generate(KeyType::Iv, 128).unwrap();
    let err = Context::open_initialize(
        &private,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
        &bogus,
        iv.as_ref(),
    )
    .err()
    .unwrap();
    assert_eq!(err, CryptoError::InvalidParameter);
}

#[test]
fn test_open_iv_rules() {
    let _env = Environment::initialize().unwrap();

    let (private, public) = rsa_keypair();
    let (_, session_key, iv) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
    )
    .unwrap();

    // CBC with no IV.
    let err = Context::open_initialize(
        &private,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
        &session_key,
        None,
    )
    .err()
    .unwrap();
    assert_eq!(err, CryptoError::InvalidParameter);

    // CBC with a wrong-length IV.
    let short_iv = Key::generate(KeyType::Iv, 64).unwrap();
    let err = Context::open_initialize(
        &private,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
        &session_key,
        Some(&short_iv),
    )
    .err()
    .unwrap();
    assert_eq!(err, CryptoError::InvalidParameter);

    // ECB with a surplus IV.
    let (_, ecb_session_key, _) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Ecb,
        256,
    )
    .unwrap();
    let err = Context::open_initialize(
        &private,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Ecb,
        256,
        &ecb_session_key,
        iv.as_ref(),
    )
    .err()
    .unwrap();
    assert_eq!(err, CryptoError::InvalidParameter);
}

#[test]
fn test_context_kind_mismatch_is_rejected() {
    let _env = Environment::initialize().unwrap();

    let (private, public) = rsa_keypair();
    let (mut seal, session_key, iv) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
    )
    .unwrap();

    let mut buf = [0u8; 64];

    // A seal context is not an open context, nor a digest context.
    assert_eq!(
        seal.open_update(b"data", &mut buf),
        Err(CryptoError::InvalidParameter)
    );
    assert_eq!(seal.digest_update(b"data"), Err(CryptoError::InvalidParameter));

    let mut open = Context::open_initialize(
        &private,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
        &session_key,
        iv.as_ref(),
    )
    .unwrap();
    assert_eq!(
        open.seal_update(b"data", &mut buf),
        Err(CryptoError::InvalidParameter)
    );

    let mut digest = Context::digest_initialize(DigestAlgorithm::Sha256).unwrap();
    assert_eq!(
        digest.seal_update(b"data", &mut buf),
        Err(CryptoError::InvalidParameter)
    );
    assert_eq!(
        digest.seal_finalize(&mut buf),
        Err(CryptoError::InvalidParameter)
    );
}

#[test]
fn test_seal_is_single_cycle() {
    let _env = Environment::initialize().unwrap();

    let (_, public) = rsa_keypair();
    let (mut seal, _, _) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
    )
    .unwrap();

    let mut buf = [0u8; 64];
    seal.seal_update(b"payload", &mut buf).unwrap();
    seal.seal_finalize(&mut buf).unwrap();

    assert_eq!(
        seal.seal_update(b"more", &mut buf),
        Err(CryptoError::InvalidParameter)
    );
    assert_eq!(seal.seal_finalize(&mut buf), Err(CryptoError::InvalidParameter));
}

#[test]
fn test_seal_update_rejects_empty_input_and_short_output() {
    let _env = Environment::initialize().unwrap();

    let (_, public) = rsa_keypair();
    let (mut seal, _, _) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
    )
    .unwrap();

    let mut buf = [0u8; 64];
    assert_eq!(
        seal.seal_update(&[], &mut buf),
        Err(CryptoError::InvalidParameter)
    );

    let mut short = [0u8; 4];
    assert_eq!(
        seal.seal_update(b"longer than four", &mut short),
        Err(CryptoError::InvalidParameter)
    );
}

#[test]
fn test_open_fails_on_corrupted_ciphertext() {
    let _env = Environment::initialize().unwrap();

    let (private, public) = rsa_keypair();
    let plaintext = b"integrity matters";

    let (mut seal, session_key, iv) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
    )
    .unwrap();
    let mut ciphertext = vec![0u8; seal.output_length(plaintext.len()).unwrap()];
    let n = seal.seal_update(plaintext, &mut ciphertext).unwrap();
    let mut tail = vec![0u8; seal.output_length(0).unwrap()];
    let m = seal.seal_finalize(&mut tail).unwrap();
    ciphertext.truncate(n);
    ciphertext.extend_from_slice(&tail[..m]);

    // Flip a bit in the last block; CBC padding validation must fail.
    let last = ciphertext.len() - 1;
    ciphertext[last] ^= 0x01;

    let mut open = Context::open_initialize(
        &private,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
        &session_key,
        iv.as_ref(),
    )
    .unwrap();
    let mut recovered = vec![0u8; open.output_length(ciphertext.len()).unwrap()];
    let _ = open.open_update(&ciphertext, &mut recovered).unwrap();
    let mut out = vec![0u8; open.output_length(0).unwrap()];
    assert_eq!(open.open_finalize(&mut out), Err(CryptoError::Internal));
}

#[test]
fn test_open_with_wrong_private_key_fails() {
    let _env = Environment::initialize().unwrap();

    let (_, public) = rsa_keypair();
    let (other_private, _) = rsa_keypair();

    let (_, session_key, iv) = Context::seal_initialize(
        &public,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
    )
    .unwrap();

    let result = Context::open_initialize(
        &other_private,
        EncryptionAlgorithm::Aes,
        BlockCipherMode::Cbc,
        256,
        &session_key,
        iv.as_ref(),
    );
    assert!(result.is_err(), "session key must not decrypt under an unrelated key");
}
