// File:    pad_generator.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: Provides functionality for generating high-quality one-time pads for cryptographic use.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use rand::{TryRngCore, rngs::OsRng};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Prefix shared by every pad name.
pub const PAD_PREFIX: &str = "pad_";
/// Extension shared by every pad name.
pub const PAD_EXTENSION: &str = ".bin";

/// Draws `size` bytes of pad material from the operating system's CSPRNG.
///
/// # Errors
///
/// This function will return an error if the OS random source fails.
pub fn generate_pad(size: usize) -> std::io::Result<Zeroizing<Vec<u8>>> {
    let mut rng = OsRng;
    let mut buffer = Zeroizing::new(vec![0u8; size]);
    // Use the failable `try_fill_bytes` and map the error to an `io::Error`.
    rng.try_fill_bytes(&mut buffer)
        .map_err(std::io::Error::other)?;
    Ok(buffer)
}

/// Returns a fresh, globally unique pad name.
#[must_use]
pub fn new_pad_name() -> String {
    format!("{PAD_PREFIX}{}{PAD_EXTENSION}", Uuid::new_v4().simple())
}

/// Whether `name` is a bare pad file name (no directories, expected prefix and extension).
#[must_use]
pub fn is_pad_name(name: &str) -> bool {
    name.strip_prefix(PAD_PREFIX)
        .and_then(|rest| rest.strip_suffix(PAD_EXTENSION))
        .is_some_and(|stem| {
            !stem.is_empty()
                && stem
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}
