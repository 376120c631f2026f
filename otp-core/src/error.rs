// File:    error.rs
// Author:  apezoo
// Date:    2026-10-19
//
// Description: Error taxonomy shared by the cipher, the pad store and both message pipelines.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Error types for OTP mailbox operations.

use std::fmt;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Which of the two mirrored pad collections an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The sending ("device") copy of the pads.
    Sender,
    /// The receiving ("server") copy of the pads.
    Receiver,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Receiver => f.write_str("receiver"),
        }
    }
}

/// Errors that can occur while generating, using or consuming pads.
#[derive(Error, Debug)]
pub enum OtpError {
    /// The pad collection on the given side is empty.
    #[error("No pads available on the {side} side")]
    NoPadsAvailable {
        /// The side that was empty.
        side: Side,
    },

    /// The key is shorter than the data it was asked to cover.
    #[error("Key too short: {key_len} key bytes for {data_len} data bytes")]
    KeyTooShort {
        /// Length of the key in bytes.
        key_len: usize,
        /// Length of the data in bytes.
        data_len: usize,
    },

    /// The encoded record does not fit in the selected pad.
    #[error("Message too large: {message_len} bytes exceeds the {pad_len}-byte pad")]
    MessageTooLarge {
        /// Length of the encoded record in bytes.
        message_len: usize,
        /// Length of the selected pad in bytes.
        pad_len: usize,
    },

    /// The record would never pass the receiver's shape check.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A pad or mailbox name that does not have the expected shape.
    #[error("Invalid name: '{0}'")]
    InvalidName(String),

    /// A pad with this name already exists on the target side.
    #[error("Pad '{name}' already exists on the {side} side")]
    AlreadyExists {
        /// The pad name.
        name: String,
        /// The side that already holds it.
        side: Side,
    },

    /// Any storage read, write, list or delete failure.
    #[error("I/O error while {context}: {source}")]
    Io {
        /// What was being done when the failure happened.
        context: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The configuration file could not be parsed or serialized.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl OtpError {
    /// Wraps an I/O error with a description of the operation and the path involved.
    pub fn io(action: &str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            context: format!("{action} '{}'", path.display()),
            source,
        }
    }
}

/// Result type for OTP mailbox operations.
pub type Result<T> = std::result::Result<T, OtpError>;
