// Copyright (C) Microsoft Corporation. All rights reserved.

//! Symmetric cipher selection.
//!
//! Maps an (algorithm, chaining mode, key size) triple onto a concrete
//! OpenSSL cipher. The table below is the set of combinations the seal/open
//! engine can carry end to end; everything else is rejected up front with
//! [`CryptoError::InvalidParameter`] so no backend call ever sees an
//! unsupported combination.

use openssl::symm::Cipher;

use super::*;

/// Symmetric encryption algorithms.
///
/// Algorithms prefixed `Unsafe` are provided for interoperability with
/// legacy data only and must not be used to protect new data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    /// AES. Key sizes 128, 192 or 256 bits; CBC, ECB, CTR, OFB and the CFB
    /// variants.
    Aes,
    /// Single DES, 64-bit key (with parity bits). CBC or ECB.
    UnsafeDes,
    /// 3-key triple DES, 192-bit key. CBC, ECB or CFB.
    TripleDes,
    /// RC4 stream cipher. Kept for naming legacy data; the backend's
    /// default provider no longer ships RC4, so no combination resolves.
    UnsafeRc4,
}

/// Chaining modes for block ciphers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCipherMode {
    /// For ciphers that do not support chaining modes (stream ciphers).
    None,
    /// Electronic codebook. No IV.
    Ecb,
    /// Counter mode. 16-byte IV.
    Ctr,
    /// Cipher block chaining. Block-sized IV.
    Cbc,
    /// Galois/counter mode (AEAD). Not resolvable until the streaming
    /// kinds expose the tag/AAD properties.
    Gcm,
    /// Cipher feedback, full-block shift.
    Cfb,
    /// Cipher feedback, 1-bit shift.
    Cfb1,
    /// Cipher feedback, 8-bit shift.
    Cfb8,
    /// Output feedback.
    Ofb,
    /// Counter with CBC-MAC (AEAD). Not resolvable until the streaming
    /// kinds expose the tag/AAD properties.
    Ccm,
}

/// Resolves an (algorithm, mode, key size) triple to a backend cipher.
///
/// The resolved cipher's native key length always equals `key_bits / 8`;
/// a mismatch means the caller asked for a key size the algorithm does not
/// take and is reported as `InvalidParameter`.
pub(crate) fn resolve_cipher(
    algo: EncryptionAlgorithm,
    mode: BlockCipherMode,
    key_bits: usize,
) -> Result<Cipher, CryptoError> {
    use BlockCipherMode as Bcm;
    use EncryptionAlgorithm as Enc;

    if key_bits == 0 || key_bits % 8 != 0 {
        return Err(CryptoError::InvalidParameter);
    }

    let cipher = match (algo, mode, key_bits) {
        (Enc::Aes, Bcm::Cbc, 128) => Cipher::aes_128_cbc(),
        (Enc::Aes, Bcm::Cbc, 192) => Cipher::aes_192_cbc(),
        (Enc::Aes, Bcm::Cbc, 256) => Cipher::aes_256_cbc(),
        (Enc::Aes, Bcm::Ecb, 128) => Cipher::aes_128_ecb(),
        (Enc::Aes, Bcm::Ecb, 192) => Cipher::aes_192_ecb(),
        (Enc::Aes, Bcm::Ecb, 256) => Cipher::aes_256_ecb(),
        (Enc::Aes, Bcm::Ctr, 128) => Cipher::aes_128_ctr(),
        (Enc::Aes, Bcm::Ctr, 192) => Cipher::aes_192_ctr(),
        (Enc::Aes, Bcm::Ctr, 256) => Cipher::aes_256_ctr(),
        (Enc::Aes, Bcm::Cfb, 128) => Cipher::aes_128_cfb128(),
        (Enc::Aes, Bcm::Cfb, 192) => Cipher::aes_192_cfb128(),
        (Enc::Aes, Bcm::Cfb, 256) => Cipher::aes_256_cfb128(),
        (Enc::Aes, Bcm::Cfb1, 128) => Cipher::aes_128_cfb1(),
        (Enc::Aes, Bcm::Cfb1, 192) => Cipher::aes_192_cfb1(),
        (Enc::Aes, Bcm::Cfb1, 256) => Cipher::aes_256_cfb1(),
        (Enc::Aes, Bcm::Cfb8, 128) => Cipher::aes_128_cfb8(),
        (Enc::Aes, Bcm::Cfb8, 192) => Cipher::aes_192_cfb8(),
        (Enc::Aes, Bcm::Cfb8, 256) => Cipher::aes_256_cfb8(),
        (Enc::Aes, Bcm::Ofb, 128) => Cipher::aes_128_ofb(),
        (Enc::Aes, Bcm::Ofb, 192) => Cipher::aes_192_ofb(),
        (Enc::Aes, Bcm::Ofb, 256) => Cipher::aes_256_ofb(),

        (Enc::UnsafeDes, Bcm::Cbc, 64) => Cipher::des_cbc(),
        (Enc::UnsafeDes, Bcm::Ecb, 64) => Cipher::des_ecb(),

        (Enc::TripleDes, Bcm::Cbc, 192) => Cipher::des_ede3_cbc(),
        (Enc::TripleDes, Bcm::Ecb, 192) => Cipher::des_ede3(),
        (Enc::TripleDes, Bcm::Cfb, 192) => Cipher::des_ede3_cfb64(),

        // GCM/CCM stay out of the table until the seal/open kinds carry the
        // tag/AAD properties; a sealed AEAD stream without its tag could
        // never be opened. RC4 is gone from the backend's default provider.
        _ => return Err(CryptoError::InvalidParameter),
    };

    // DES-family key lengths include parity bits, so the backend's notion
    // of key length already matches bits / 8.
    if cipher.key_len() != key_bits / 8 {
        return Err(CryptoError::InvalidParameter);
    }

    Ok(cipher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_supported_combinations() {
        let cipher = resolve_cipher(EncryptionAlgorithm::Aes, BlockCipherMode::Cbc, 256)
            .expect("AES-256-CBC");
        assert_eq!(cipher.key_len(), 32);
        assert_eq!(cipher.block_size(), 16);
        assert_eq!(cipher.iv_len(), Some(16));

        let cipher = resolve_cipher(EncryptionAlgorithm::Aes, BlockCipherMode::Ecb, 128)
            .expect("AES-128-ECB");
        assert_eq!(cipher.key_len(), 16);

        let cipher = resolve_cipher(EncryptionAlgorithm::TripleDes, BlockCipherMode::Cbc, 192)
            .expect("3DES-CBC");
        assert_eq!(cipher.key_len(), 24);
    }

    #[test]
    fn test_resolve_rejects_aead_modes() {
        // No tag/AAD plumbing in the streaming kinds, so an AEAD stream
        // could never authenticate on open.
        for mode in [BlockCipherMode::Gcm, BlockCipherMode::Ccm] {
            for bits in [128, 192, 256] {
                assert_eq!(
                    resolve_cipher(EncryptionAlgorithm::Aes, mode, bits).err(),
                    Some(CryptoError::InvalidParameter)
                );
            }
        }
    }

    #[test]
    fn test_resolve_rejects_rc4() {
        assert_eq!(
            resolve_cipher(EncryptionAlgorithm::UnsafeRc4, BlockCipherMode::None, 128).err(),
            Some(CryptoError::InvalidParameter)
        );
    }

    #[test]
    fn test_resolve_rejects_unsupported_combinations() {
        // Wrong key size for the algorithm.
        assert_eq!(
            resolve_cipher(EncryptionAlgorithm::Aes, BlockCipherMode::Cbc, 512).err(),
            Some(CryptoError::InvalidParameter)
        );
        // Stream cipher with a chaining mode.
        assert_eq!(
            resolve_cipher(EncryptionAlgorithm::UnsafeRc4, BlockCipherMode::Cbc, 128).err(),
            Some(CryptoError::InvalidParameter)
        );
        // Block cipher without a chaining mode.
        assert_eq!(
            resolve_cipher(EncryptionAlgorithm::Aes, BlockCipherMode::None, 128).err(),
            Some(CryptoError::InvalidParameter)
        );
        // Zero and non-byte-aligned key sizes.
        assert_eq!(
            resolve_cipher(EncryptionAlgorithm::Aes, BlockCipherMode::Cbc, 0).err(),
            Some(CryptoError::InvalidParameter)
        );
        assert_eq!(
            resolve_cipher(EncryptionAlgorithm::Aes, BlockCipherMode::Cbc, 129).err(),
            Some(CryptoError::InvalidParameter)
        );
    }
}
