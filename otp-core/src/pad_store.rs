// File:    pad_store.rs
// Author:  apezoo
// Date:    2026-10-19
//
// Description: The two mirrored pad collections (sender and receiver) and their serialized access.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Paired pad storage.
//!
//! Every pad exists twice: once in the sender collection and once in the
//! receiver collection, under the same name. Each collection is a directory
//! of `pad_*.bin` files guarded by its own mutex, so sender-side and
//! receiver-side work never block each other. Operations that touch both
//! sides always lock the sender side first.
//!
//! A pad present on one side only is an orphan. Orphans are expected after
//! a send whose ciphertext has not been received yet, or after a failed
//! generation; [`PadStore::purge_orphans`] is the reconciliation pass.

use crate::discard_on_error;
use crate::error::{OtpError, Result, Side};
use crate::lock;
use crate::pad_generator;
use log::{debug, error, info, warn};
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use zeroize::Zeroizing;

/// One pad read from a collection. The bytes are wiped on drop.
pub struct Pad {
    name: String,
    bytes: Zeroizing<Vec<u8>>,
}

impl Pad {
    /// The pad's name, shared by both sides.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key material.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the pad in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the pad holds no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pad")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Name and size of a stored pad, without its contents.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PadInfo {
    /// The pad's name.
    pub name: String,
    /// Size of the pad in bytes.
    pub size: u64,
}

/// Pad counts and byte totals for both sides.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatus {
    /// Number of sender-side pads.
    pub sender_pads: usize,
    /// Total bytes of sender-side pad material.
    pub sender_bytes: u64,
    /// Number of receiver-side pads.
    pub receiver_pads: usize,
    /// Total bytes of receiver-side pad material.
    pub receiver_bytes: u64,
}

/// One side's directory of pads. Only reachable through the side's mutex.
#[derive(Debug)]
pub(crate) struct PadCollection {
    side: Side,
    dir: PathBuf,
}

impl PadCollection {
    fn open(side: Side, dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| OtpError::io("creating pad directory", dir, e))?;
        Ok(Self {
            side,
            dir: dir.to_path_buf(),
        })
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        if pad_generator::is_pad_name(name) {
            Ok(self.dir.join(name))
        } else {
            Err(OtpError::InvalidName(name.to_owned()))
        }
    }

    /// All pad names on this side, sorted so one listing is stable.
    pub(crate) fn names(&self) -> Result<Vec<String>> {
        let entries =
            fs::read_dir(&self.dir).map_err(|e| OtpError::io("listing pads in", &self.dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OtpError::io("listing pads in", &self.dir, e))?;
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && pad_generator::is_pad_name(name)
            {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub(crate) fn read(&self, name: &str) -> Result<Pad> {
        let path = self.path_of(name)?;
        let bytes = fs::read(&path).map_err(|e| OtpError::io("reading pad", &path, e))?;
        Ok(Pad {
            name: name.to_owned(),
            bytes: Zeroizing::new(bytes),
        })
    }

    /// Writes a pad that must not exist yet.
    fn write_new(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(name)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    OtpError::AlreadyExists {
                        name: name.to_owned(),
                        side: self.side,
                    }
                } else {
                    OtpError::io("creating pad", &path, e)
                }
            })?;
        let written = file.write_all(bytes).and_then(|()| file.sync_all());
        drop(file);
        discard_on_error(&path, written).map_err(|e| OtpError::io("writing pad", &path, e))
    }

    /// Deletes a pad. Returns `false` if it was already gone.
    pub(crate) fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted {} pad: {name}", self.side);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} pad {name} was already gone", self.side);
                Ok(false)
            }
            Err(e) => Err(OtpError::io("deleting pad", &path, e)),
        }
    }

    /// Picks one pad uniformly at random.
    pub(crate) fn choose_random(&self) -> Result<Pad> {
        let names = self.names()?;
        if names.is_empty() {
            return Err(OtpError::NoPadsAvailable { side: self.side });
        }
        let index = rand::rng().random_range(0..names.len());
        self.read(&names[index])
    }

    fn infos(&self) -> Result<Vec<PadInfo>> {
        self.names()?
            .into_iter()
            .map(|name| {
                let path = self.dir.join(&name);
                let meta =
                    fs::metadata(&path).map_err(|e| OtpError::io("inspecting pad", &path, e))?;
                Ok(PadInfo {
                    name,
                    size: meta.len(),
                })
            })
            .collect()
    }

    fn count(&self) -> usize {
        self.names().map_or_else(
            |e| {
                error!("Failed to count {} pads: {e}", self.side);
                0
            },
            |names| names.len(),
        )
    }

    fn purge(&self) -> Result<usize> {
        let mut removed = 0;
        for name in self.names()? {
            if self.remove(&name)? {
                removed += 1;
            }
        }
        info!("Deleted all {removed} {} pads.", self.side);
        Ok(removed)
    }
}

/// The sender-side and receiver-side pad collections.
#[derive(Debug)]
pub struct PadStore {
    sender: Mutex<PadCollection>,
    receiver: Mutex<PadCollection>,
}

impl PadStore {
    /// Opens both collections, creating their directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created.
    pub fn open(sender_dir: &Path, receiver_dir: &Path) -> Result<Self> {
        debug!(
            "Opening pad store: sender={}, receiver={}",
            sender_dir.display(),
            receiver_dir.display()
        );
        Ok(Self {
            sender: Mutex::new(PadCollection::open(Side::Sender, sender_dir)?),
            receiver: Mutex::new(PadCollection::open(Side::Receiver, receiver_dir)?),
        })
    }

    pub(crate) fn lock_sender(&self) -> MutexGuard<'_, PadCollection> {
        lock(&self.sender)
    }

    pub(crate) fn lock_receiver(&self) -> MutexGuard<'_, PadCollection> {
        lock(&self.receiver)
    }

    /// Generates `count` fresh pads of `size` bytes and writes each one to both sides.
    ///
    /// Returns the new pad names. Generation is not transactional across the
    /// two sides: if the receiver write fails after the sender write
    /// succeeded, the sender copy is left behind as an orphan and the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the random source or either write fails.
    pub fn generate(&self, count: usize, size: usize) -> Result<Vec<String>> {
        info!("Generating {count} pads of {size} bytes each...");
        let sender = self.lock_sender();
        let receiver = self.lock_receiver();
        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            let bytes = pad_generator::generate_pad(size)
                .map_err(|e| OtpError::io("drawing random bytes for", &sender.dir, e))?;
            let name = pad_generator::new_pad_name();
            sender.write_new(&name, &bytes)?;
            if let Err(e) = receiver.write_new(&name, &bytes) {
                warn!("Pad {name} was written to the sender side only; it is now an orphan.");
                return Err(e);
            }
            debug!("Generated pad {name}");
            names.push(name);
        }
        info!("Pad generation complete.");
        Ok(names)
    }

    /// Picks a random sender-side pad without consuming it.
    ///
    /// The caller consumes the pad with [`PadStore::consume_sender`] once the
    /// ciphertext it protected has been delivered.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::NoPadsAvailable`] if the sender side is empty, or an
    /// I/O error if the pad cannot be read.
    pub fn select_for_send(&self) -> Result<Pad> {
        self.lock_sender().choose_random()
    }

    /// Deletes a sender-side pad. Deleting a missing pad is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or the file cannot be deleted.
    pub fn consume_sender(&self, name: &str) -> Result<()> {
        self.lock_sender().remove(name).map(|_| ())
    }

    /// Deletes a receiver-side pad. Deleting a missing pad is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or the file cannot be deleted.
    pub fn consume_receiver(&self, name: &str) -> Result<()> {
        self.lock_receiver().remove(name).map(|_| ())
    }

    /// Reads every receiver-side pad, in name order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be listed or a pad cannot be read.
    pub fn list_receiver_candidates(&self) -> Result<Vec<Pad>> {
        let receiver = self.lock_receiver();
        receiver
            .names()?
            .iter()
            .map(|name| receiver.read(name))
            .collect()
    }

    /// Number of sender-side pads. Listing failures are logged and count as zero.
    #[must_use]
    pub fn count_sender(&self) -> usize {
        self.lock_sender().count()
    }

    /// Number of receiver-side pads. Listing failures are logged and count as zero.
    #[must_use]
    pub fn count_receiver(&self) -> usize {
        self.lock_receiver().count()
    }

    /// Names and sizes of the sender-side pads.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be listed.
    pub fn sender_pads(&self) -> Result<Vec<PadInfo>> {
        self.lock_sender().infos()
    }

    /// Names and sizes of the receiver-side pads.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be listed.
    pub fn receiver_pads(&self) -> Result<Vec<PadInfo>> {
        self.lock_receiver().infos()
    }

    /// Pad counts and byte totals for both sides.
    ///
    /// # Errors
    ///
    /// Returns an error if either collection cannot be listed.
    pub fn status(&self) -> Result<StoreStatus> {
        let sender = self.sender_pads()?;
        let receiver = self.receiver_pads()?;
        Ok(StoreStatus {
            sender_pads: sender.len(),
            sender_bytes: sender.iter().map(|p| p.size).sum(),
            receiver_pads: receiver.len(),
            receiver_bytes: receiver.iter().map(|p| p.size).sum(),
        })
    }

    /// Installs externally transported pad material on the sender side.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::AlreadyExists`] if the name is taken, or an error if
    /// the name is malformed or the write fails.
    pub fn import_sender(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.lock_sender().write_new(name, bytes)?;
        info!("Imported sender pad {name} ({} bytes)", bytes.len());
        Ok(())
    }

    /// Installs externally transported pad material on the receiver side.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::AlreadyExists`] if the name is taken, or an error if
    /// the name is malformed or the write fails.
    pub fn import_receiver(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.lock_receiver().write_new(name, bytes)?;
        info!("Imported receiver pad {name} ({} bytes)", bytes.len());
        Ok(())
    }

    /// Deletes every sender-side pad and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be listed or a pad cannot be deleted.
    pub fn purge_sender(&self) -> Result<usize> {
        self.lock_sender().purge()
    }

    /// Deletes every receiver-side pad and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be listed or a pad cannot be deleted.
    pub fn purge_receiver(&self) -> Result<usize> {
        self.lock_receiver().purge()
    }

    /// Deletes every pad on both sides and returns the total removed.
    ///
    /// # Errors
    ///
    /// Returns an error if either side cannot be purged.
    pub fn purge_all(&self) -> Result<usize> {
        let sender = self.lock_sender();
        let receiver = self.lock_receiver();
        Ok(sender.purge()? + receiver.purge()?)
    }

    /// Deletes receiver-side pads that no longer exist on the sender side.
    ///
    /// Returns the names of the purged pads.
    ///
    /// # Errors
    ///
    /// Returns an error if either side cannot be listed or a pad cannot be deleted.
    pub fn purge_orphans(&self) -> Result<Vec<String>> {
        let sender = self.lock_sender();
        let receiver = self.lock_receiver();
        let live: HashSet<String> = sender.names()?.into_iter().collect();
        let mut purged = Vec::new();
        for name in receiver.names()? {
            if !live.contains(&name) && receiver.remove(&name)? {
                purged.push(name);
            }
        }
        if purged.is_empty() {
            info!("No orphaned pads found");
        } else {
            info!("Purged {} orphaned pad(s)", purged.len());
        }
        Ok(purged)
    }
}
