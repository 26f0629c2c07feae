// Copyright (C) Microsoft Corporation. All rights reserved.

//! Library environment lifecycle and small cryptographic utilities.
//!
//! The backend needs process-wide bring-up before use and per-thread
//! cleanup after. Both are tied to the [`Environment`] guard: the first
//! live guard in the process initializes the backend, and every thread
//! that uses the library holds its own guard for as long as it does so.
//! Dropping the last guard tears shared state down.
//!
//! The guard is intentionally `!Send`: it marks *this thread* as a library
//! user, so moving it to another thread would detach the mark from the
//! thread it covers.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Mutex;

use tracing::debug;

use super::*;

/// Count of live guards across all threads. Backend bring-up happens on
/// the 0 -> 1 transition, teardown on 1 -> 0.
static ENVIRONMENT_REFCOUNT: Mutex<usize> = Mutex::new(0);

thread_local! {
    /// Whether this thread currently holds a guard.
    static THREAD_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// RAII guard for library use on the current thread.
///
/// Acquire one per thread before calling into the library, keep it alive
/// for the duration, and let it drop when the thread is done. Guards are
/// reference-counted process-wide, so independent components may each hold
/// their own without coordination.
pub struct Environment {
    // Pins the guard to the thread that acquired it.
    _not_send: PhantomData<*const ()>,
}

impl Environment {
    /// Acquires the library environment for the current thread.
    ///
    /// The first acquisition in the process initializes the backend; later
    /// ones only bump the reference count.
    ///
    /// # Errors
    ///
    /// - `Internal` - this thread already holds a guard, or the refcount
    ///   lock is poisoned
    pub fn initialize() -> Result<Environment, CryptoError> {
        if THREAD_ACTIVE.with(|active| active.replace(true)) {
            return Err(CryptoError::Internal);
        }

        let mut count = match ENVIRONMENT_REFCOUNT.lock() {
            Ok(count) => count,
            Err(_) => {
                THREAD_ACTIVE.with(|active| active.set(false));
                return Err(CryptoError::Internal);
            }
        };
        if *count == 0 {
            openssl::init();
            debug!("crypto backend initialized");
        }
        *count += 1;

        Ok(Environment {
            _not_send: PhantomData,
        })
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        THREAD_ACTIVE.with(|active| active.set(false));
        if let Ok(mut count) = ENVIRONMENT_REFCOUNT.lock() {
            *count = count.saturating_sub(1);
            if *count == 0 {
                debug!("crypto backend released");
            }
        }
    }
}

/// Fills `data` with cryptographically strong random bytes.
///
/// # Errors
///
/// - `InvalidParameter` - `data` is empty
/// - `Internal` - the backend CSPRNG failed
pub fn randomize_bytes(data: &mut [u8]) -> Result<(), CryptoError> {
    if data.is_empty() {
        return Err(CryptoError::InvalidParameter);
    }
    openssl::rand::rand_bytes(data).map_err(|_| CryptoError::Internal)
}

/// Compares two buffers in constant time.
///
/// The comparison always scans both buffers fully, so timing reveals only
/// the length, never the position of the first difference. The lengths
/// themselves must match up front; a length mismatch is a contract
/// violation, not a mismatch result.
///
/// # Errors
///
/// - `InvalidParameter` - the buffers differ in length
/// - `DataMismatch` - equal lengths, different contents
pub fn memcmp(first: &[u8], second: &[u8]) -> Result<(), CryptoError> {
    if first.len() != second.len() {
        return Err(CryptoError::InvalidParameter);
    }
    if first.is_empty() || openssl::memcmp::eq(first, second) {
        Ok(())
    } else {
        Err(CryptoError::DataMismatch)
    }
}
