// Copyright (C) Microsoft Corporation. All rights reserved.

//! Polymorphic operation contexts.
//!
//! This module defines the single opaque handle type shared by every
//! streaming operation kind. A [`Context`] carries the state of one
//! in-progress operation — a digest accumulator, or a cipher context paired
//! with an RSA-transported session key — behind a private kind discriminant.
//!
//! # Dispatch
//!
//! Each operation family (digest, seal, open) only accepts contexts of its
//! own kind. Every entry point starts with an exhaustive match on the kind
//! discriminant and answers [`CryptoError::InvalidParameter`] for a
//! mismatched context before touching any kind-specific state. There is no
//! casting and no callback table; the enum is the dispatch mechanism.
//!
//! # Lifetime
//!
//! A context is created by a kind-specific initialize, mutated only by that
//! kind's update, finalized exactly once, and released by dropping it. The
//! context exclusively owns its backend state, so releasing it twice or
//! using it after release is unrepresentable.

use super::*;
use crate::digest::DigestState;
use crate::seal::{envelope_output_length, OpenState, SealState};

/// Opaque handle carrying the state of one in-progress streaming
/// cryptographic operation.
///
/// Obtained from [`Context::digest_initialize`],
/// [`Context::seal_initialize`] or [`Context::open_initialize`]; fed through
/// the matching update/finalize calls; released by dropping.
pub struct Context {
    pub(crate) kind: ContextKind,
}

/// Kind discriminant plus kind-specific state.
///
/// The tag is set exactly once at creation and never mutated. Seal and open
/// are distinct kinds: the operation direction is part of the discriminant,
/// so a wrong-direction call fails the kind match and can never drive the
/// backend cipher the wrong way.
pub(crate) enum ContextKind {
    Digest(DigestState),
    Seal(SealState),
    Open(OpenState),
}

/// Non-standard per-operation parameters.
///
/// Extension seam for operation kinds that take parameters outside the
/// init/update/finalize data path, such as AEAD tags and additional
/// authenticated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    /// Padding scheme selection.
    Padding,
    /// GCM additional authenticated data.
    GcmAad,
    /// GCM authentication tag.
    GcmTag,
    /// GCM authentication tag length.
    GcmTagLen,
    /// CCM additional authenticated data.
    CcmAad,
    /// CCM authentication tag.
    CcmTag,
    /// CCM authentication tag length.
    CcmTagLen,
}

impl Context {
    /// Returns an upper bound on the output produced by a single update or
    /// finalize call fed `input_len` bytes.
    ///
    /// Callers use this to size output buffers before knowing which kind of
    /// operation they hold; the bound is valid for every kind.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - `input_len` is large enough to overflow the
    ///   length computation
    /// - `Internal` - the backend reported an invalid block size
    pub fn output_length(&self, input_len: usize) -> Result<usize, CryptoError> {
        match &self.kind {
            ContextKind::Digest(state) => Ok(state.digest_size()),
            ContextKind::Seal(state) => {
                envelope_output_length(state.block_size(), input_len)
            }
            ContextKind::Open(state) => {
                envelope_output_length(state.block_size(), input_len)
            }
        }
    }

    /// Sets a non-standard parameter on this context.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if this context's kind does not support the
    /// property. None of the current kinds expose properties; the dispatch
    /// stays per kind so AEAD parameters can hook in per operation.
    pub fn set_property(&mut self, property: Property, value: &[u8]) -> Result<(), CryptoError> {
        let _ = (property, value);
        match &mut self.kind {
            ContextKind::Digest(_) | ContextKind::Seal(_) | ContextKind::Open(_) => {
                Err(CryptoError::InvalidParameter)
            }
        }
    }

    /// Reads a non-standard parameter from this context.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if this context's kind does not support the
    /// property. See [`set_property`](Self::set_property).
    pub fn get_property(&self, property: Property) -> Result<Vec<u8>, CryptoError> {
        let _ = property;
        match &self.kind {
            ContextKind::Digest(_) | ContextKind::Seal(_) | ContextKind::Open(_) => {
                Err(CryptoError::InvalidParameter)
            }
        }
    }
}
