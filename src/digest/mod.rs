// Copyright (C) Microsoft Corporation. All rights reserved.

//! Streaming message digest engine.
//!
//! The simplest instantiation of the shared context abstraction: a digest
//! context wraps an OpenSSL hash accumulator and follows the canonical
//! init → update\* → finalize contract. Supported algorithms are MD5
//! (legacy, not for security use), SHA-1 (legacy) and the SHA-2 family.
//!
//! # Lifecycle
//!
//! `Uninitialized → Active (initialize) → Finalized (finalize)`. One
//! update/finalize cycle per context: finalizing twice, or updating after
//! finalize, is a caller error (`InvalidParameter`), not a backend error.

use openssl::hash::{Hasher, MessageDigest};

use super::*;
use crate::context::ContextKind;


/// Message digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// MD5, 16-byte digest. Cryptographically broken; legacy use only.
    Md5,
    /// SHA-1, 20-byte digest. Cryptographically broken; legacy use only.
    Sha1,
    /// SHA-224, 28-byte digest.
    Sha224,
    /// SHA-256, 32-byte digest.
    Sha256,
    /// SHA-384, 48-byte digest.
    Sha384,
    /// SHA-512, 64-byte digest.
    Sha512,
}

/// Returns the backend digest for an algorithm.
pub(crate) fn message_digest(algo: DigestAlgorithm) -> MessageDigest {
    match algo {
        DigestAlgorithm::Md5 => MessageDigest::md5(),
        DigestAlgorithm::Sha1 => MessageDigest::sha1(),
        DigestAlgorithm::Sha224 => MessageDigest::sha224(),
        DigestAlgorithm::Sha256 => MessageDigest::sha256(),
        DigestAlgorithm::Sha384 => MessageDigest::sha384(),
        DigestAlgorithm::Sha512 => MessageDigest::sha512(),
    }
}

/// Digest-kind context state: the backend accumulator plus lifecycle
/// tracking.
pub(crate) struct DigestState {
    hasher: Hasher,
    size: usize,
    finalized: bool,
}

impl DigestState {
    /// Fixed digest size for the selected algorithm, independent of input
    /// length.
    pub(crate) fn digest_size(&self) -> usize {
        self.size
    }
}

impl Context {
    /// Initializes a streaming digest operation.
    ///
    /// # Arguments
    ///
    /// * `algo` - The digest algorithm to use
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the backend fails to allocate or initialize
    /// the digest state.
    pub fn digest_initialize(algo: DigestAlgorithm) -> Result<Context, CryptoError> {
        let md = message_digest(algo);
        let hasher = Hasher::new(md).map_err(|_| CryptoError::Internal)?;

        Ok(Context {
            kind: ContextKind::Digest(DigestState {
                hasher,
                size: md.size(),
                finalized: false,
            }),
        })
    }

    /// Feeds bytes into an active digest context.
    ///
    /// May be called any number of times; each call's bytes are logically
    /// concatenated.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - this is not a digest context, `data` is
    ///   empty, or the context has already been finalized
    /// - `Internal` - the backend update failed
    pub fn digest_update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        let state = match &mut self.kind {
            ContextKind::Digest(state) => state,
            _ => return Err(CryptoError::InvalidParameter),
        };

        if data.is_empty() || state.finalized {
            return Err(CryptoError::InvalidParameter);
        }

        state.hasher.update(data)?;
        Ok(())
    }

    /// Finalizes the digest computation and writes the digest into
    /// `digest`.
    ///
    /// Returns the number of bytes written. The context may be dropped
    /// afterwards but cannot be reused for another digest cycle.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - this is not a digest context, the output
    ///   buffer is empty or smaller than the digest size, or the context
    ///   was already finalized
    /// - `Internal` - the backend finalization failed
    pub fn digest_finalize(&mut self, digest: &mut [u8]) -> Result<usize, CryptoError> {
        let state = match &mut self.kind {
            ContextKind::Digest(state) => state,
            _ => return Err(CryptoError::InvalidParameter),
        };

        if state.finalized || digest.is_empty() || digest.len() < state.size {
            return Err(CryptoError::InvalidParameter);
        }

        let bytes = state.hasher.finish()?;
        // The backend hasher resets itself after finish; the flag keeps the
        // single-cycle contract.
        state.finalized = true;

        digest[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}
