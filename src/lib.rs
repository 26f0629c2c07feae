// Copyright (C) Microsoft Corporation. All rights reserved.

//! Uniform streaming cryptographic API over OpenSSL.
//!
//! This crate provides an algorithm-agnostic API for cryptographic
//! operations — message digests, symmetric/asymmetric key lifecycle and
//! hybrid (envelope) encryption — layered over OpenSSL. It includes:
//!
//! - **Context**: one opaque handle type shared by every streaming operation
//!   kind, with a uniform update/finalize lifecycle and output-length query
//! - **Digest**: streaming message digests (MD5, SHA-1, SHA-2 family)
//! - **Key**: simple (raw-buffer) and wrapped (RSA/DSA) key handles with
//!   generation, import/export and PBKDF2 derivation
//! - **Seal/Open**: hybrid envelope encryption combining RSA key transport
//!   of a fresh session key with streaming symmetric encryption
//! - **Environment**: reference-counted process-wide backend initialization,
//!   secure random bytes and constant-time comparison
//!
//! # Lifecycle
//!
//! Every stateful operation follows the same shape: a kind-specific
//! initialize returns a [`Context`], data is fed through that kind's update
//! calls, and a final call flushes remaining output. Contexts are single-use;
//! dropping one releases its backend state.
//!
//! # Thread Safety
//!
//! Contexts and keys are not thread-safe for concurrent mutation; drive each
//! context from a single thread. Immutable key queries are safe to share.

mod cipher;
mod context;
mod crypto;
mod digest;
mod key;
mod seal;

pub use cipher::*;
pub use context::*;
pub use crypto::*;
pub use digest::*;
pub use key::*;

use openssl::error::ErrorStack;
use thiserror::Error;

/// Error type for all operations in this crate.
///
/// The set of codes is a stable contract: callers may match on it across
/// releases. Validation failures are always detected before any backend
/// call; a backend failure on already-validated input surfaces as
/// [`Internal`](CryptoError::Internal).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    /// Caller contract violation: null/empty/mismatched-type arguments,
    /// wrong-direction or wrong-kind operation, length mismatches.
    #[error("invalid parameter")]
    InvalidParameter,
    /// Memory allocation failure. All partially constructed state has been
    /// released.
    #[error("out of memory")]
    OutOfMemory,
    /// The primitive backend rejected an operation that should have
    /// succeeded given already-validated inputs. Non-recoverable for this
    /// call; other contexts and keys are unaffected.
    #[error("internal backend error")]
    Internal,
    /// Encrypted key material could not be decrypted with the supplied
    /// password.
    #[error("invalid password")]
    PasswordInvalid,
    /// Result of a constant-time comparison: compared, unequal. Distinct
    /// from "could not compare" (which is `InvalidParameter`).
    #[error("data mismatch")]
    DataMismatch,
}

impl From<ErrorStack> for CryptoError {
    fn from(_: ErrorStack) -> Self {
        CryptoError::Internal
    }
}
