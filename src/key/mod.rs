// Copyright (C) Microsoft Corporation. All rights reserved.

//! Key handles.
//!
//! One opaque [`Key`] type covers two concrete shapes:
//!
//! - *Simple keys* — a bit length plus inline key material. Used for
//!   symmetric keys, DES keys and initialization vectors.
//! - *Wrapped keys* — an exclusively-owned backend `PKey` object. Used for
//!   RSA and DSA public/private keys.
//!
//! A key's shape is fully determined by its [`KeyType`]. Internal accessors
//! downcast by matching the type tag and answer `None` — never a
//! reinterpretation — when asked for the wrong shape; public entry points
//! translate that into `InvalidParameter`.
//!
//! Simple-key material is wiped when the handle is dropped. Dropping a
//! wrapped key releases the inner backend object with it; the handle is the
//! only owner.

use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::Rsa;
use tracing::debug;
use zeroize::Zeroize;

use super::*;

mod codec;
pub use codec::*;

#[cfg(test)]
mod tests;

/// Key types. An IV is considered a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Generic symmetric cipher key.
    Symmetric,
    /// DES-family key; carries parity bits, byte length 8, 16 or 24.
    Des,
    /// Initialization vector for symmetric algorithms.
    Iv,
    /// RSA public key.
    RsaPublic,
    /// RSA private key.
    RsaPrivate,
    /// DSA public key.
    DsaPublic,
    /// DSA private key.
    DsaPrivate,
}

/// Opaque key handle.
pub struct Key {
    pub(crate) repr: KeyRepr,
}

pub(crate) enum KeyRepr {
    Simple(SimpleKey),
    Wrapped(WrappedKey),
}

/// Raw-buffer key: symmetric keys, DES keys, IVs.
pub(crate) struct SimpleKey {
    key_type: KeyType,
    bits: usize,
    data: Vec<u8>,
}

impl SimpleKey {
    /// Builds a simple key from its material. `data` must be non-empty.
    pub(crate) fn new(key_type: KeyType, data: Vec<u8>) -> SimpleKey {
        debug_assert!(!data.is_empty());
        SimpleKey {
            key_type,
            bits: data.len() * 8,
            data,
        }
    }

    pub(crate) fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub(crate) fn bits(&self) -> usize {
        self.bits
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for SimpleKey {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

/// Asymmetric key: an exclusively-owned backend object.
pub(crate) struct WrappedKey {
    key_type: KeyType,
    evp: EvpKey,
}

pub(crate) enum EvpKey {
    Public(PKey<Public>),
    Private(PKey<Private>),
}

impl WrappedKey {
    pub(crate) fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub(crate) fn evp(&self) -> &EvpKey {
        &self.evp
    }

    /// Bit length reported by the backend object (e.g. RSA modulus bits).
    pub(crate) fn bits(&self) -> Result<usize, CryptoError> {
        let bits = match &self.evp {
            EvpKey::Public(key) => key.bits(),
            EvpKey::Private(key) => key.bits(),
        };
        if bits == 0 {
            return Err(CryptoError::Internal);
        }
        Ok(bits as usize)
    }
}

/// DES parity: the low bit of every key byte makes its popcount odd.
fn odd_parity(byte: u8) -> u8 {
    let stripped = byte & 0xfe;
    if stripped.count_ones() % 2 == 0 {
        stripped | 1
    } else {
        stripped
    }
}

/// Allocates a zeroed key-material buffer, surfacing allocation failure
/// instead of aborting.
pub(crate) fn alloc_key_buffer(len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| CryptoError::OutOfMemory)?;
    buf.resize(len, 0);
    Ok(buf)
}

impl Key {
    /// Generates a new key (or IV).
    ///
    /// Symmetric keys and IVs are drawn from the backend CSPRNG. DES keys
    /// additionally get per-byte odd parity and accept only 64-, 128- or
    /// 192-bit sizes. RSA private keys are generated by the backend;
    /// extract the public half with [`extract_public`](Self::extract_public).
    ///
    /// # Arguments
    ///
    /// * `key_type` - `Symmetric`, `Iv`, `Des` or `RsaPrivate`
    /// * `bits` - key size in bits; must be positive and a multiple of 8
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - unsupported type/size combination
    /// - `OutOfMemory` - key-material allocation failed
    /// - `Internal` - backend generation failed
    pub fn generate(key_type: KeyType, bits: usize) -> Result<Key, CryptoError> {
        if bits == 0 || bits % 8 != 0 {
            return Err(CryptoError::InvalidParameter);
        }

        let repr = match key_type {
            KeyType::Symmetric | KeyType::Iv => {
                let mut data = alloc_key_buffer(bits / 8)?;
                openssl::rand::rand_bytes(&mut data).map_err(|_| CryptoError::Internal)?;
                KeyRepr::Simple(SimpleKey::new(key_type, data))
            }
            KeyType::Des => {
                if bits != 64 && bits != 128 && bits != 192 {
                    return Err(CryptoError::InvalidParameter);
                }
                let mut data = alloc_key_buffer(bits / 8)?;
                openssl::rand::rand_bytes(&mut data).map_err(|_| CryptoError::Internal)?;
                for byte in &mut data {
                    *byte = odd_parity(*byte);
                }
                KeyRepr::Simple(SimpleKey::new(key_type, data))
            }
            KeyType::RsaPrivate => {
                // The backend refuses sub-512-bit moduli; catch it here so
                // the failure is a parameter error, not a backend one.
                if bits < 512 {
                    return Err(CryptoError::InvalidParameter);
                }
                let rsa = Rsa::generate(bits as u32).map_err(|_| CryptoError::Internal)?;
                let pkey = PKey::from_rsa(rsa).map_err(|_| CryptoError::Internal)?;
                KeyRepr::Wrapped(WrappedKey {
                    key_type,
                    evp: EvpKey::Private(pkey),
                })
            }
            // DSA/DH/EC generation is out of scope for this crate.
            _ => return Err(CryptoError::InvalidParameter),
        };

        debug!(?key_type, bits, "generated key");
        Ok(Key { repr })
    }

    /// Returns this key's type tag.
    pub fn key_type(&self) -> KeyType {
        match &self.repr {
            KeyRepr::Simple(key) => key.key_type(),
            KeyRepr::Wrapped(key) => key.key_type(),
        }
    }

    /// Returns this key's length in bits.
    ///
    /// For simple keys this is the stored material length; for wrapped keys
    /// the backend object is queried.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the backend cannot report a length for a
    /// wrapped key.
    pub fn bits(&self) -> Result<usize, CryptoError> {
        match &self.repr {
            KeyRepr::Simple(key) => Ok(key.bits()),
            KeyRepr::Wrapped(key) => key.bits(),
        }
    }

    /// Extracts the public half of an asymmetric private key.
    ///
    /// The backend object is round-tripped through its DER public-key
    /// encoding, so the new handle owns an independent object.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - the key is not an asymmetric private key
    /// - `Internal` - the backend encode/decode failed
    pub fn extract_public(&self) -> Result<Key, CryptoError> {
        let wrapped = self.as_wrapped().ok_or(CryptoError::InvalidParameter)?;

        let public_type = match wrapped.key_type() {
            KeyType::RsaPrivate => KeyType::RsaPublic,
            KeyType::DsaPrivate => KeyType::DsaPublic,
            _ => return Err(CryptoError::InvalidParameter),
        };

        let der = match wrapped.evp() {
            EvpKey::Private(key) => key.public_key_to_der()?,
            EvpKey::Public(key) => key.public_key_to_der()?,
        };
        let pkey = PKey::public_key_from_der(&der)?;

        Ok(Key {
            repr: KeyRepr::Wrapped(WrappedKey {
                key_type: public_type,
                evp: EvpKey::Public(pkey),
            }),
        })
    }

    /// Downcast to the simple-key shape. `None` when the type tag says this
    /// is not a raw-buffer key.
    pub(crate) fn as_simple(&self) -> Option<&SimpleKey> {
        match &self.repr {
            KeyRepr::Simple(key) => match key.key_type() {
                KeyType::Symmetric | KeyType::Des | KeyType::Iv => Some(key),
                _ => None,
            },
            KeyRepr::Wrapped(_) => None,
        }
    }

    /// Downcast to the wrapped-key shape. `None` when the type tag says
    /// this is not an asymmetric key.
    pub(crate) fn as_wrapped(&self) -> Option<&WrappedKey> {
        match &self.repr {
            KeyRepr::Wrapped(key) => match key.key_type() {
                KeyType::RsaPublic
                | KeyType::RsaPrivate
                | KeyType::DsaPublic
                | KeyType::DsaPrivate => Some(key),
                _ => None,
            },
            KeyRepr::Simple(_) => None,
        }
    }
}
