// File:    lib.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: The main library crate for otp-core, wiring the pad store, the mailbox and both message pipelines.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! # OTP Core Library
//!
//! One-time pad messaging over a shared mailbox. Pads are generated in
//! pairs (a sender copy and a receiver copy under the same name), each used
//! for exactly one message and deleted right after. The receiver does not
//! know which pad a message used and finds it by trial decryption.
//!
//! [`OtpSystem`] opens every store of one installation and hands out the
//! [`Sender`](sender::Sender) and [`Receiver`](receiver::Receiver). Periodic
//! polling is left to the caller: call [`Receiver::poll`](receiver::Receiver::poll)
//! from whatever scheduler the application owns.

use log::warn;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The delimited record format for messages.
pub mod codec;
/// Runtime configuration and on-disk layout.
pub mod config;
/// Cryptographic operations for encryption and decryption.
pub mod crypto;
/// Error types.
pub mod error;
/// Decryption notifications and subscriptions.
pub mod events;
/// Ciphertext mailbox and plaintext store.
pub mod mailbox;
/// Utilities for generating new one-time pads.
pub mod pad_generator;
/// The paired sender/receiver pad collections.
pub mod pad_store;
/// Trial-decrypting receiver pipeline.
pub mod receiver;
/// Encrypting sender pipeline.
pub mod sender;

use config::OtpConfig;
use error::Result;
use mailbox::{Mailbox, PlaintextStore};
use pad_store::PadStore;
use receiver::Receiver;
use sender::Sender;

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Passes `written` through, deleting `path` first if the write failed.
pub(crate) fn discard_on_error(path: &Path, written: io::Result<()>) -> io::Result<()> {
    if written.is_err()
        && let Err(e) = fs::remove_file(path)
    {
        warn!("Failed to remove partial file {}: {e}", path.display());
    }
    written
}

/// Every component of one installation, sharing a single pad store.
#[derive(Debug, Clone)]
pub struct OtpSystem {
    /// The configuration the system was opened with.
    pub config: OtpConfig,
    /// Both pad collections.
    pub pads: Arc<PadStore>,
    /// Pending ciphertext items.
    pub mailbox: Mailbox,
    /// The sending pipeline.
    pub sender: Sender,
    /// The receiving pipeline.
    pub receiver: Arc<Receiver>,
}

impl OtpSystem {
    /// Creates the directory layout under the configured root and opens every store.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn open(config: OtpConfig) -> Result<Self> {
        let layout = config.layout();
        layout.ensure()?;
        let pads = Arc::new(PadStore::open(&layout.sender_pads, &layout.receiver_pads)?);
        let mailbox = Mailbox::open(&layout.mailbox)?;
        let plaintexts = PlaintextStore::open(&layout.decrypted)?;
        let sender = Sender::new(Arc::clone(&pads), mailbox.clone());
        let receiver = Arc::new(
            Receiver::new(Arc::clone(&pads), mailbox.clone(), plaintexts)
                .with_preview_bytes(config.preview_bytes),
        );
        Ok(Self {
            config,
            pads,
            mailbox,
            sender,
            receiver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pad_partial.bin");
        fs::write(&path, [1, 2, 3]).unwrap();

        let result = discard_on_error(&path, Err(io::Error::other("disk full")));
        assert_eq!(result.unwrap_err().to_string(), "disk full");
        assert!(!path.exists());
    }

    #[test]
    fn successful_write_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pad_whole.bin");
        fs::write(&path, [1, 2, 3]).unwrap();

        discard_on_error(&path, Ok(())).unwrap();
        assert_eq!(fs::read(&path).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(1));
        let poisoner = Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(mutex.is_poisoned());
        assert_eq!(*lock(&mutex), 1);
    }
}
