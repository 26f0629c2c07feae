// Copyright (C) Microsoft Corporation. All rights reserved.

//! Key import and export, plus password-based derivation.
//!
//! Import is format-sniffing: simple keys accept raw bytes or base64 text,
//! asymmetric keys accept PEM and DER in the common private/public/PKCS#8
//! layouts, including an X.509 certificate as a public-key source. Export
//! picks the encoding from an explicit ([`KeyFormat`], [`KeyFileFormat`])
//! pair.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use openssl::error::ErrorStack;
use openssl::pkcs5::pbkdf2_hmac;
use openssl::pkey::{Id, PKey, Private, Public};
use openssl::x509::X509;
use tracing::debug;

use super::*;
use crate::digest::{message_digest, DigestAlgorithm};

/// Key container format for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// Raw material for simple keys; the algorithm's legacy container
    /// (e.g. PKCS#1) for asymmetric keys.
    Default,
    /// PKCS#8 container; private asymmetric keys only, optionally
    /// password-encrypted.
    Pkcs8,
}

/// On-wire encoding for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFileFormat {
    /// Raw bytes; simple keys only.
    Raw,
    /// Base64 text of the raw bytes; simple keys only.
    Base64,
    /// PEM; asymmetric keys only.
    Pem,
    /// DER; asymmetric keys only.
    Der,
}

/// True when the backend error chain reports a decryption failure, i.e.
/// a wrong passphrase on an encrypted key container.
fn is_bad_decrypt(err: &ErrorStack) -> bool {
    err.errors()
        .iter()
        .any(|e| e.reason().is_some_and(|r| r.contains("bad decrypt")))
}

/// Strict base64 probe for simple-key import. Returns the decoded bytes
/// only when the whole input is well-formed, non-empty base64; anything
/// else means the input is raw key material.
fn try_base64(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() % 4 != 0 {
        return None;
    }
    match BASE64.decode(data) {
        Ok(decoded) if !decoded.is_empty() => Some(decoded),
        _ => None,
    }
}

fn import_simple(key_type: KeyType, data: &[u8]) -> Result<Key, CryptoError> {
    let material = match try_base64(data) {
        Some(decoded) => decoded,
        None => {
            let mut buf = alloc_key_buffer(data.len())?;
            buf.copy_from_slice(data);
            buf
        }
    };

    if key_type == KeyType::Des && !matches!(material.len(), 8 | 16 | 24) {
        return Err(CryptoError::InvalidParameter);
    }

    Ok(Key {
        repr: KeyRepr::Simple(SimpleKey::new(key_type, material)),
    })
}

enum ParsedEvp {
    Public(PKey<Public>),
    Private(PKey<Private>),
}

/// Parses an asymmetric key blob, trying PEM layouts for textual input and
/// DER layouts otherwise. A wrong passphrase on an encrypted container is
/// reported as `PasswordInvalid`; any other parse failure falls through to
/// the next candidate layout.
fn parse_evp(password: Option<&str>, data: &[u8]) -> Result<ParsedEvp, CryptoError> {
    if data.starts_with(b"-----") {
        let attempt = match password {
            Some(pass) => PKey::private_key_from_pem_passphrase(data, pass.as_bytes()),
            None => PKey::private_key_from_pem_callback(data, |_| Ok(0)),
        };
        match attempt {
            Ok(key) => return Ok(ParsedEvp::Private(key)),
            Err(err) if password.is_some() && is_bad_decrypt(&err) => {
                return Err(CryptoError::PasswordInvalid)
            }
            Err(_) => {}
        }
        if let Ok(key) = PKey::public_key_from_pem(data) {
            return Ok(ParsedEvp::Public(key));
        }
        if let Ok(cert) = X509::from_pem(data) {
            return Ok(ParsedEvp::Public(cert.public_key()?));
        }
        return Err(CryptoError::InvalidParameter);
    }

    let pkcs8 = match password {
        Some(pass) => PKey::private_key_from_pkcs8_passphrase(data, pass.as_bytes()),
        None => PKey::private_key_from_pkcs8(data),
    };
    match pkcs8 {
        Ok(key) => return Ok(ParsedEvp::Private(key)),
        Err(err) if password.is_some() && is_bad_decrypt(&err) => {
            return Err(CryptoError::PasswordInvalid)
        }
        Err(_) => {}
    }
    if let Ok(key) = PKey::private_key_from_der(data) {
        return Ok(ParsedEvp::Private(key));
    }
    if let Ok(key) = PKey::public_key_from_der(data) {
        return Ok(ParsedEvp::Public(key));
    }
    Err(CryptoError::InvalidParameter)
}

fn import_evp(key_type: KeyType, password: Option<&str>, data: &[u8]) -> Result<Key, CryptoError> {
    let parsed = parse_evp(password, data)?;

    // The decoded algorithm and visibility must agree with the caller's
    // declared type tag.
    let (decoded_type, evp) = match parsed {
        ParsedEvp::Private(key) => match key.id() {
            Id::RSA => (KeyType::RsaPrivate, EvpKey::Private(key)),
            Id::DSA => (KeyType::DsaPrivate, EvpKey::Private(key)),
            _ => return Err(CryptoError::InvalidParameter),
        },
        ParsedEvp::Public(key) => match key.id() {
            Id::RSA => (KeyType::RsaPublic, EvpKey::Public(key)),
            Id::DSA => (KeyType::DsaPublic, EvpKey::Public(key)),
            _ => return Err(CryptoError::InvalidParameter),
        },
    };
    if decoded_type != key_type {
        return Err(CryptoError::InvalidParameter);
    }

    Ok(Key {
        repr: KeyRepr::Wrapped(WrappedKey {
            key_type,
            evp,
        }),
    })
}

impl Key {
    /// Imports a key from its serialized form.
    ///
    /// The encoding is detected from the data: simple keys try strict
    /// base64 first and fall back to raw bytes; asymmetric keys try the
    /// usual PEM and DER layouts (private key, PKCS#8, public key, X.509
    /// certificate). `password` decrypts encrypted private-key containers
    /// and must be `None` for simple keys.
    ///
    /// # Arguments
    ///
    /// * `key_type` - declared type of the imported key; import fails if
    ///   the data decodes to something else
    /// * `password` - passphrase for encrypted containers, if any
    /// * `data` - the serialized key
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - empty data, undecodable data, or a type tag
    ///   that contradicts the decoded key
    /// - `PasswordInvalid` - the container is encrypted and the passphrase
    ///   does not decrypt it
    /// - `Internal` - backend failure outside of parsing
    pub fn import(
        key_type: KeyType,
        password: Option<&str>,
        data: &[u8],
    ) -> Result<Key, CryptoError> {
        if data.is_empty() {
            return Err(CryptoError::InvalidParameter);
        }
        let password = password.filter(|p| !p.is_empty());

        let key = match key_type {
            KeyType::Symmetric | KeyType::Des | KeyType::Iv => {
                if password.is_some() {
                    return Err(CryptoError::InvalidParameter);
                }
                import_simple(key_type, data)?
            }
            KeyType::RsaPublic
            | KeyType::RsaPrivate
            | KeyType::DsaPublic
            | KeyType::DsaPrivate => import_evp(key_type, password, data)?,
        };

        debug!(?key_type, len = data.len(), "imported key");
        Ok(key)
    }

    /// Exports this key into the chosen container and encoding.
    ///
    /// Simple keys export as `Default` + `Raw`/`Base64`, never encrypted.
    /// Asymmetric keys export as `Pem`/`Der`, in either the algorithm's
    /// legacy container (`Default`) or PKCS#8 (`Pkcs8`, private keys only).
    /// A password requests an encrypted container and is accepted only for
    /// PKCS#8.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - format pair unsupported for this key type,
    ///   or a password where encryption is unsupported
    /// - `Internal` - backend serialization failed
    pub fn export(
        &self,
        key_format: KeyFormat,
        file_format: KeyFileFormat,
        password: Option<&str>,
    ) -> Result<Vec<u8>, CryptoError> {
        let password = password.filter(|p| !p.is_empty());

        match &self.repr {
            KeyRepr::Simple(key) => {
                if password.is_some() || key_format != KeyFormat::Default {
                    return Err(CryptoError::InvalidParameter);
                }
                match file_format {
                    KeyFileFormat::Raw => Ok(key.bytes().to_vec()),
                    KeyFileFormat::Base64 => {
                        Ok(BASE64.encode(key.bytes()).into_bytes())
                    }
                    _ => Err(CryptoError::InvalidParameter),
                }
            }
            KeyRepr::Wrapped(key) => export_evp(key, key_format, file_format, password),
        }
    }

    /// Derives a symmetric key from a password with PBKDF2-HMAC.
    ///
    /// # Arguments
    ///
    /// * `password` - non-empty passphrase
    /// * `salt` - non-empty salt
    /// * `iterations` - positive iteration count
    /// * `algo` - digest for the HMAC
    /// * `bits` - derived key length in bits; positive multiple of 8
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` - empty password or salt, zero iterations, or
    ///   an invalid key length
    /// - `OutOfMemory` - key-material allocation failed
    /// - `Internal` - backend derivation failed
    pub fn derive_pbkdf2(
        password: &str,
        salt: &[u8],
        iterations: usize,
        algo: DigestAlgorithm,
        bits: usize,
    ) -> Result<Key, CryptoError> {
        if password.is_empty() || salt.is_empty() || iterations == 0 {
            return Err(CryptoError::InvalidParameter);
        }
        if bits == 0 || bits % 8 != 0 {
            return Err(CryptoError::InvalidParameter);
        }

        let mut data = alloc_key_buffer(bits / 8)?;
        pbkdf2_hmac(
            password.as_bytes(),
            salt,
            iterations,
            message_digest(algo),
            &mut data,
        )
        .map_err(|_| CryptoError::Internal)?;

        Ok(Key {
            repr: KeyRepr::Simple(SimpleKey::new(KeyType::Symmetric, data)),
        })
    }
}

fn export_evp(
    key: &WrappedKey,
    key_format: KeyFormat,
    file_format: KeyFileFormat,
    password: Option<&str>,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = openssl::symm::Cipher::aes_256_cbc();

    let out = match (key_format, file_format, key.evp()) {
        (KeyFormat::Default, KeyFileFormat::Pem, EvpKey::Private(pkey)) => {
            // Legacy per-algorithm container; only RSA has one here.
            let rsa = pkey.rsa().map_err(|_| CryptoError::InvalidParameter)?;
            match password {
                Some(pass) => rsa.private_key_to_pem_passphrase(cipher, pass.as_bytes())?,
                None => rsa.private_key_to_pem()?,
            }
        }
        (KeyFormat::Default, KeyFileFormat::Der, EvpKey::Private(pkey)) => {
            // The legacy DER container has no encryption layer.
            if password.is_some() {
                return Err(CryptoError::InvalidParameter);
            }
            let rsa = pkey.rsa().map_err(|_| CryptoError::InvalidParameter)?;
            rsa.private_key_to_der()?
        }
        (KeyFormat::Default, KeyFileFormat::Pem, EvpKey::Public(pkey)) => {
            if password.is_some() {
                return Err(CryptoError::InvalidParameter);
            }
            pkey.public_key_to_pem()?
        }
        (KeyFormat::Default, KeyFileFormat::Der, EvpKey::Public(pkey)) => {
            if password.is_some() {
                return Err(CryptoError::InvalidParameter);
            }
            pkey.public_key_to_der()?
        }
        (KeyFormat::Pkcs8, KeyFileFormat::Pem, EvpKey::Private(pkey)) => match password {
            Some(pass) => pkey.private_key_to_pem_pkcs8_passphrase(cipher, pass.as_bytes())?,
            None => pkey.private_key_to_pem_pkcs8()?,
        },
        (KeyFormat::Pkcs8, KeyFileFormat::Der, EvpKey::Private(pkey)) => match password {
            Some(pass) => pkey.private_key_to_pkcs8_passphrase(cipher, pass.as_bytes())?,
            None => pkey.private_key_to_pkcs8()?,
        },
        _ => return Err(CryptoError::InvalidParameter),
    };

    Ok(out)
}
