// File:    mailbox.rs
// Author:  apezoo
// Date:    2026-10-19
//
// Description: Directory-backed mailbox for ciphertext items and the store for decrypted plaintext records.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The shared-storage mailbox between sender and receiver.
//!
//! Ciphertext items are opaque `msg_*.bin` files. Each is written once by the
//! sender and removed by the receiver after a successful decryption. The
//! plaintext of each item is kept under the item's stem with a `.csv`
//! extension.

use crate::discard_on_error;
use crate::error::{OtpError, Result};
use chrono::Local;
use log::{debug, error, info};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ITEM_PREFIX: &str = "msg_";
const ITEM_EXTENSION: &str = ".bin";
const PLAINTEXT_EXTENSION: &str = ".csv";

/// Returns a fresh mailbox item name: creation time plus a random suffix.
#[must_use]
pub fn new_item_name() -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{ITEM_PREFIX}{stamp}_{}{ITEM_EXTENSION}", &suffix[..8])
}

/// Whether `name` is a bare mailbox item name.
#[must_use]
pub fn is_item_name(name: &str) -> bool {
    item_stem(name).is_some()
}

/// The part of an item name between the prefix and the extension.
fn item_stem(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(ITEM_EXTENSION)?;
    let body = stem.strip_prefix(ITEM_PREFIX)?;
    let valid = !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then_some(stem)
}

fn bare_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| OtpError::io("listing", dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| OtpError::io("listing", dir, e))?;
        if !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str()
            && keep(name)
        {
            names.push(name.to_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Directory of pending ciphertext items.
#[derive(Debug, Clone)]
pub struct Mailbox {
    dir: PathBuf,
}

impl Mailbox {
    /// Opens the mailbox, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| OtpError::io("creating mailbox", dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        if is_item_name(name) {
            Ok(self.dir.join(name))
        } else {
            Err(OtpError::InvalidName(name.to_owned()))
        }
    }

    /// Writes a ciphertext under a freshly generated name and returns the name.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be written.
    pub fn deliver(&self, ciphertext: &[u8]) -> Result<String> {
        let name = new_item_name();
        let path = self.path_of(&name)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| OtpError::io("creating mailbox item", &path, e))?;
        let written = file.write_all(ciphertext).and_then(|()| file.sync_all());
        drop(file);
        discard_on_error(&path, written)
            .map_err(|e| OtpError::io("writing mailbox item", &path, e))?;
        info!("Encrypted message saved to: {}", path.display());
        Ok(name)
    }

    /// Names of all pending items, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn list(&self) -> Result<Vec<String>> {
        bare_files(&self.dir, is_item_name)
    }

    /// Reads an item. Returns `None` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or the read fails.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_of(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OtpError::io("reading mailbox item", &path, e)),
        }
    }

    /// Deletes an item. Deleting a missing item is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or the file cannot be deleted.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted encrypted message: {name}");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OtpError::io("deleting mailbox item", &path, e)),
        }
    }
}

/// Directory of decrypted, receipt-stamped records.
#[derive(Debug, Clone)]
pub struct PlaintextStore {
    dir: PathBuf,
}

impl PlaintextStore {
    /// Opens the store, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| OtpError::io("creating plaintext store", dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// The file name a mailbox item's plaintext is stored under.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidName`] if `item` is not a mailbox item name.
    pub fn name_for(item: &str) -> Result<String> {
        item_stem(item)
            .map(|stem| format!("{stem}{PLAINTEXT_EXTENSION}"))
            .ok_or_else(|| OtpError::InvalidName(item.to_owned()))
    }

    /// Persists the plaintext of `item`, replacing any earlier copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or the write fails.
    pub fn save(&self, item: &str, record: &str) -> Result<PathBuf> {
        let path = self.dir.join(Self::name_for(item)?);
        fs::write(&path, record).map_err(|e| OtpError::io("writing plaintext", &path, e))?;
        debug!("Saved plaintext to {}", path.display());
        Ok(path)
    }

    /// Whether a plaintext for `item` is already stored.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidName`] if `item` is not a mailbox item name.
    pub fn contains(&self, item: &str) -> Result<bool> {
        Ok(self.dir.join(Self::name_for(item)?).is_file())
    }

    /// Every stored record, ordered by name. Unreadable or empty files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn load_all(&self) -> Result<Vec<String>> {
        let names = bare_files(&self.dir, |n| n.ends_with(PLAINTEXT_EXTENSION))?;
        let mut records = Vec::with_capacity(names.len());
        for name in names {
            let path = self.dir.join(&name);
            match fs::read_to_string(&path) {
                Ok(content) if !content.is_empty() => records.push(content),
                Ok(_) => {}
                Err(e) => error!("Error loading decrypted message {name}: {e}"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn item_names_are_unique_and_valid() {
        let a = new_item_name();
        let b = new_item_name();
        assert_ne!(a, b);
        assert!(is_item_name(&a));
        assert!(!is_item_name("pad_x.bin"));
        assert!(!is_item_name("msg_.bin"));
        assert!(!is_item_name("msg_a/b.bin"));
    }

    #[test]
    fn deliver_list_read_remove() {
        let dir = tempdir().unwrap();
        let mailbox = Mailbox::open(dir.path()).unwrap();
        let name = mailbox.deliver(&[9, 8, 7]).unwrap();
        assert_eq!(mailbox.list().unwrap(), vec![name.clone()]);
        assert_eq!(mailbox.read(&name).unwrap(), Some(vec![9, 8, 7]));

        mailbox.remove(&name).unwrap();
        mailbox.remove(&name).unwrap();
        assert!(mailbox.list().unwrap().is_empty());
        assert_eq!(mailbox.read(&name).unwrap(), None);
    }

    #[test]
    fn plaintext_is_named_after_item() {
        assert_eq!(
            PlaintextStore::name_for("msg_20250717_093005_abcd1234.bin").unwrap(),
            "msg_20250717_093005_abcd1234.csv"
        );
        assert!(PlaintextStore::name_for("../x.bin").is_err());
    }

    #[test]
    fn plaintexts_load_in_name_order() {
        let dir = tempdir().unwrap();
        let store = PlaintextStore::open(dir.path()).unwrap();
        store.save("msg_2.bin", "b,1,2,x").unwrap();
        store.save("msg_1.bin", "a,1,2,x").unwrap();
        fs::write(dir.path().join("msg_3.csv"), "").unwrap();
        assert_eq!(store.load_all().unwrap(), vec!["a,1,2,x", "b,1,2,x"]);
    }

    #[test]
    fn contains_reports_saved_plaintexts() {
        let dir = tempdir().unwrap();
        let store = PlaintextStore::open(dir.path()).unwrap();
        assert!(!store.contains("msg_1.bin").unwrap());
        store.save("msg_1.bin", "a,1,2,x").unwrap();
        assert!(store.contains("msg_1.bin").unwrap());
        assert!(store.contains("../msg_1.bin").is_err());
    }
}
