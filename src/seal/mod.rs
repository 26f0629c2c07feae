// Copyright (C) Microsoft Corporation. All rights reserved.

//! Hybrid (envelope) encryption.
//!
//! Sealing generates a fresh symmetric session key, encrypts it to the
//! recipient's RSA public key and then streams the payload through the
//! symmetric cipher. Opening recovers the session key with the RSA private
//! key and streams the ciphertext back into plaintext. The encrypted
//! session key travels as an opaque symmetric [`Key`] handle and is only
//! ever decrypted inside the backend.
//!
//! Seal and open contexts are separate [`ContextKind`]s, so feeding
//! ciphertext to a seal context (or vice versa) fails the kind check
//! up front.

use openssl::envelope::{Open, Seal};
use tracing::debug;
use zeroize::Zeroize;

use super::*;
use crate::cipher::resolve_cipher;
use crate::context::ContextKind;
use crate::key::{EvpKey, KeyRepr, SimpleKey, WrappedKey};

#[cfg(test)]
mod tests;

/// In-progress seal operation.
pub(crate) struct SealState {
    engine: Seal,
    block_size: usize,
    finalized: bool,
}

impl SealState {
    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }
}

/// In-progress open operation.
pub(crate) struct OpenState {
    engine: Open,
    block_size: usize,
    finalized: bool,
}

impl OpenState {
    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }
}

/// Upper bound on the output of a single envelope update or finalize call
/// fed `input_len` bytes.
///
/// A finalize (zero input) flushes at most one block; an update of `n`
/// bytes emits at most `n + block_size - 1` bytes. Pure arithmetic, no
/// backend calls.
pub(crate) fn envelope_output_length(
    block_size: usize,
    input_len: usize,
) -> Result<usize, CryptoError> {
    if block_size == 0 {
        return Err(CryptoError::Internal);
    }
    if input_len == 0 {
        return Ok(block_size);
    }
    input_len
        .checked_add(block_size - 1)
        .ok_or(CryptoError::InvalidParameter)
}

fn rsa_public(key: &Key) -> Result<&WrappedKey, CryptoError> {
    match key.as_wrapped() {
        Some(wrapped) if wrapped.key_type() == KeyType::RsaPublic => Ok(wrapped),
        _ => Err(CryptoError::InvalidParameter),
    }
}

fn rsa_private(key: &Key) -> Result<&WrappedKey, CryptoError> {
    match key.as_wrapped() {
        Some(wrapped) if wrapped.key_type() == KeyType::RsaPrivate => Ok(wrapped),
        _ => Err(CryptoError::InvalidParameter),
    }
}

/// Checks the caller-supplied IV against the cipher's requirement.
/// Returns the IV bytes to hand to the backend, if the cipher takes one.
fn check_iv<'a>(
    iv_len: Option<usize>,
    iv: Option<&'a Key>,
) -> Result<Option<&'a [u8]>, CryptoError> {
    let required = iv_len.unwrap_or(0);
    match (required, iv) {
        (0, None) => Ok(None),
        // Cipher takes no IV; supplying one is a contract violation.
        (0, Some(_)) => Err(CryptoError::InvalidParameter),
        (_, None) => Err(CryptoError::InvalidParameter),
        (required, Some(key)) => {
            let simple = key.as_simple().ok_or(CryptoError::InvalidParameter)?;
            if simple.key_type() != KeyType::Iv || simple.bits() != required * 8 {
                return Err(CryptoError::InvalidParameter);
            }
            Ok(Some(simple.bytes()))
        }
    }
}

impl Context {
    /// Starts a seal operation: generates a fresh session key and IV,
    /// encrypts the session key to `public_key`, and returns the streaming
    /// context together with the encrypted session key and the IV (when
    /// the cipher takes one).
    ///
    /// The encrypted session key and IV must travel with the ciphertext;
    /// both are inputs to [`open_initialize`](Self::open_initialize).
    ///
    /// # Arguments
    ///
    /// * `public_key` - recipient's RSA public key
    /// * `algo` - symmetric cipher for the payload
    /// * `mode` - block cipher mode
    /// * `sym_key_bits` - session key length in bits
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - wrong key type, or an unsupported
    ///   algorithm/mode/size combination
    /// - `Internal` - backend setup failed
    pub fn seal_initialize(
        public_key: &Key,
        algo: EncryptionAlgorithm,
        mode: BlockCipherMode,
        sym_key_bits: usize,
    ) -> Result<(Context, Key, Option<Key>), CryptoError> {
        let wrapped = rsa_public(public_key)?;
        let cipher = resolve_cipher(algo, mode, sym_key_bits)?;

        let pkey = match wrapped.evp() {
            EvpKey::Public(pkey) => pkey,
            EvpKey::Private(_) => return Err(CryptoError::InvalidParameter),
        };
        let engine = Seal::new(cipher, std::slice::from_ref(pkey))?;

        // One recipient, so exactly one transported session key.
        let encrypted = engine
            .encrypted_keys()
            .first()
            .ok_or(CryptoError::Internal)?;
        if encrypted.is_empty() {
            return Err(CryptoError::Internal);
        }
        let session_key = Key {
            repr: KeyRepr::Simple(SimpleKey::new(KeyType::Symmetric, encrypted.clone())),
        };

        let iv_key = match engine.iv() {
            Some(iv) if !iv.is_empty() => Some(Key {
                repr: KeyRepr::Simple(SimpleKey::new(KeyType::Iv, iv.to_vec())),
            }),
            _ => None,
        };

        debug!(?algo, ?mode, sym_key_bits, "seal context initialized");
        let ctx = Context {
            kind: ContextKind::Seal(SealState {
                engine,
                block_size: cipher.block_size(),
                finalized: false,
            }),
        };
        Ok((ctx, session_key, iv_key))
    }

    /// Starts an open operation for a payload sealed with
    /// [`seal_initialize`](Self::seal_initialize).
    ///
    /// The cipher parameters must match the sealing side exactly; the IV is
    /// required precisely when the cipher takes one and its length must
    /// match the cipher's.
    ///
    /// # Arguments
    ///
    /// * `private_key` - recipient's RSA private key
    /// * `algo` - symmetric cipher used when sealing
    /// * `mode` - block cipher mode used when sealing
    /// * `sym_key_bits` - session key length in bits used when sealing
    /// * `session_key` - the encrypted session key produced by sealing
    /// * `iv` - the IV produced by sealing, when there was one
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - wrong key or IV type/length, or an
    ///   unsupported algorithm/mode/size combination
    /// - `Internal` - backend setup failed, including a session key that
    ///   does not decrypt under `private_key`
    pub fn open_initialize(
        private_key: &Key,
        algo: EncryptionAlgorithm,
        mode: BlockCipherMode,
        sym_key_bits: usize,
        session_key: &Key,
        iv: Option<&Key>,
    ) -> Result<Context, CryptoError> {
        let wrapped = rsa_private(private_key)?;
        let cipher = resolve_cipher(algo, mode, sym_key_bits)?;

        let encrypted = match session_key.as_simple() {
            Some(simple) if simple.key_type() == KeyType::Symmetric => simple.bytes(),
            _ => return Err(CryptoError::InvalidParameter),
        };
        let iv_bytes = check_iv(cipher.iv_len(), iv)?;

        let pkey = match wrapped.evp() {
            EvpKey::Private(pkey) => pkey,
            EvpKey::Public(_) => return Err(CryptoError::InvalidParameter),
        };
        let engine = Open::new(cipher, pkey, iv_bytes, encrypted)?;

        debug!(?algo, ?mode, sym_key_bits, "open context initialized");
        Ok(Context {
            kind: ContextKind::Open(OpenState {
                engine,
                block_size: cipher.block_size(),
                finalized: false,
            }),
        })
    }

    /// Encrypts a chunk of plaintext into `ciphertext`, returning the number
    /// of bytes written. Size `ciphertext` with
    /// [`output_length`](Self::output_length); a call may emit anywhere
    /// between zero bytes and that bound.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - not a seal context, already finalized, empty
    ///   input, or an undersized output buffer
    /// - `Internal` - backend encryption failed
    pub fn seal_update(
        &mut self,
        plaintext: &[u8],
        ciphertext: &mut [u8],
    ) -> Result<usize, CryptoError> {
        let state = match &mut self.kind {
            ContextKind::Seal(state) if !state.finalized => state,
            _ => return Err(CryptoError::InvalidParameter),
        };
        if plaintext.is_empty() {
            return Err(CryptoError::InvalidParameter);
        }
        let bound = envelope_output_length(state.block_size, plaintext.len())?;
        if ciphertext.len() < bound {
            return Err(CryptoError::InvalidParameter);
        }

        // The backend writer wants room for a full extra block; stage into
        // a scratch buffer and copy out only what was produced.
        let mut scratch = vec![0u8; plaintext.len() + state.block_size];
        let written = state.engine.update(plaintext, &mut scratch)?;
        ciphertext[..written].copy_from_slice(&scratch[..written]);
        Ok(written)
    }

    /// Flushes the final cipher block into `ciphertext` and closes the seal
    /// context, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - not a seal context, already finalized, or an
    ///   undersized output buffer
    /// - `Internal` - backend encryption failed
    pub fn seal_finalize(&mut self, ciphertext: &mut [u8]) -> Result<usize, CryptoError> {
        let state = match &mut self.kind {
            ContextKind::Seal(state) if !state.finalized => state,
            _ => return Err(CryptoError::InvalidParameter),
        };
        if ciphertext.len() < state.block_size {
            return Err(CryptoError::InvalidParameter);
        }

        let mut scratch = vec![0u8; state.block_size];
        let written = state.engine.finalize(&mut scratch)?;
        state.finalized = true;
        ciphertext[..written].copy_from_slice(&scratch[..written]);
        Ok(written)
    }

    /// Decrypts a chunk of ciphertext into `plaintext`, returning the number
    /// of bytes written. Size `plaintext` with
    /// [`output_length`](Self::output_length); a call may emit anywhere
    /// between zero bytes and that bound.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - not an open context, already finalized, empty
    ///   input, or an undersized output buffer
    /// - `Internal` - backend decryption failed
    pub fn open_update(
        &mut self,
        ciphertext: &[u8],
        plaintext: &mut [u8],
    ) -> Result<usize, CryptoError> {
        let state = match &mut self.kind {
            ContextKind::Open(state) if !state.finalized => state,
            _ => return Err(CryptoError::InvalidParameter),
        };
        if ciphertext.is_empty() {
            return Err(CryptoError::InvalidParameter);
        }
        let bound = envelope_output_length(state.block_size, ciphertext.len())?;
        if plaintext.len() < bound {
            return Err(CryptoError::InvalidParameter);
        }

        let mut scratch = vec![0u8; ciphertext.len() + state.block_size];
        let written = state.engine.update(ciphertext, &mut scratch)?;
        plaintext[..written].copy_from_slice(&scratch[..written]);
        scratch.zeroize();
        Ok(written)
    }

    /// Flushes the final plaintext block into `plaintext` and closes the
    /// open context, returning the number of bytes written. Fails when the
    /// stream does not decrypt cleanly (wrong parameters or corrupted
    /// ciphertext surface as a padding failure here).
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - not an open context, already finalized, or an
    ///   undersized output buffer
    /// - `Internal` - backend decryption failed
    pub fn open_finalize(&mut self, plaintext: &mut [u8]) -> Result<usize, CryptoError> {
        let state = match &mut self.kind {
            ContextKind::Open(state) if !state.finalized => state,
            _ => return Err(CryptoError::InvalidParameter),
        };
        if plaintext.len() < state.block_size {
            return Err(CryptoError::InvalidParameter);
        }

        let mut scratch = vec![0u8; state.block_size];
        let written = match state.engine.finalize(&mut scratch) {
            Ok(written) => written,
            Err(err) => {
                state.finalized = true;
                return Err(err.into());
            }
        };
        state.finalized = true;
        plaintext[..written].copy_from_slice(&scratch[..written]);
        scratch.zeroize();
        Ok(written)
    }
}
