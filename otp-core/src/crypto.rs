// File:    crypto.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: XOR one-time pad encryption and the plaintext shape check used to recognise the right pad.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! This module contains the core cryptographic operations.
//!
//! Encryption and decryption are the same operation: every data byte is
//! XOR-ed with the key byte at the same offset. The key may be longer than
//! the data; the surplus is ignored and the output is exactly as long as the
//! input.
//!
//! # Soundness caveat
//!
//! [`validate_plaintext_shape`] is the only signal the receiver has that it
//! picked the right pad. It is a heuristic, not a MAC: a wrong key can, with
//! small probability, produce bytes that happen to contain at least four
//! delimited fields with numbers at positions 1 and 2. With realistic pad
//! sizes this does not happen in practice, but it is not a guarantee.

use crate::codec;
use crate::error::{OtpError, Result};

/// XORs `data` with the first `data.len()` bytes of `key`.
///
/// # Errors
///
/// Returns [`OtpError::KeyTooShort`] if `key` is shorter than `data`.
pub fn xor(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() < data.len() {
        return Err(OtpError::KeyTooShort {
            key_len: key.len(),
            data_len: data.len(),
        });
    }
    Ok(data.iter().zip(key).map(|(x, y)| x ^ y).collect())
}

/// Encrypts `plaintext` with a one-time pad.
///
/// # Errors
///
/// Returns [`OtpError::KeyTooShort`] if the pad is shorter than the plaintext.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    xor(plaintext, key)
}

/// Decrypts `ciphertext` with a one-time pad. XOR is its own inverse.
///
/// # Errors
///
/// Returns [`OtpError::KeyTooShort`] if the pad is shorter than the ciphertext.
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    xor(ciphertext, key)
}

/// Checks whether decrypted bytes look like an encoded record.
///
/// The bytes are read as UTF-8 (invalid sequences are replaced), split into
/// fields by the record codec, and accepted only if there are at least four
/// fields and the latitude and longitude fields parse as decimal numbers.
#[must_use]
pub fn validate_plaintext_shape(bytes: &[u8]) -> bool {
    let text = String::from_utf8_lossy(bytes);
    let fields = codec::decode(&text);
    fields.len() >= codec::RECORD_FIELDS
        && is_decimal(&fields[codec::LATITUDE])
        && is_decimal(&fields[codec::LONGITUDE])
}

/// Whether a field parses as a decimal number, ignoring surrounding whitespace.
pub(crate) fn is_decimal(field: &str) -> bool {
    field.trim().parse::<f64>().is_ok()
}
