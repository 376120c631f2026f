// File:    config.rs
// Author:  apezoo
// Date:    2026-10-19
//
// Description: Runtime configuration and the on-disk layout of pads, mailbox and decrypted records.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use crate::error::{OtpError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file inside the root directory.
pub const CONFIG_FILE: &str = "otp_config.json";

/// Tunables for one installation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OtpConfig {
    /// Directory holding both pad collections, the mailbox and the decrypted records.
    #[serde(skip)]
    pub root: PathBuf,
    /// Period of the receiver's poll, in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of pads `setup` generates when none is given.
    pub pad_count: usize,
    /// Size of each generated pad, in bytes.
    pub pad_size: usize,
    /// Ciphertext bytes shown in decryption event previews.
    pub preview_bytes: usize,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            poll_interval_ms: 2000,
            pad_count: 5,
            pad_size: 4096,
            preview_bytes: 32,
        }
    }
}

impl OtpConfig {
    /// Default configuration rooted at `root`.
    #[must_use]
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..Self::default()
        }
    }

    /// Loads the configuration from `root`, falling back to defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            debug!("No {CONFIG_FILE} under {}, using defaults", root.display());
            return Ok(Self::with_root(root));
        }
        let text =
            fs::read_to_string(&path).map_err(|e| OtpError::io("reading config", &path, e))?;
        let mut config: Self = serde_json::from_str(&text)?;
        config.root = root.to_path_buf();
        Ok(config)
    }

    /// Writes the configuration to its root as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or the file cannot be written.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| OtpError::io("creating root", &self.root, e))?;
        let path = self.root.join(CONFIG_FILE);
        let text = serde_json::to_string_pretty(self)?;
        fs::write(&path, text).map_err(|e| OtpError::io("writing config", &path, e))
    }

    /// The poll period as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Directory layout under the root.
    #[must_use]
    pub fn layout(&self) -> Layout {
        Layout::new(&self.root)
    }
}

/// Where each store lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Sender-side ("device") pads.
    pub sender_pads: PathBuf,
    /// Receiver-side ("server") pads.
    pub receiver_pads: PathBuf,
    /// Pending ciphertext items.
    pub mailbox: PathBuf,
    /// Decrypted, receipt-stamped records.
    pub decrypted: PathBuf,
}

impl Layout {
    /// The standard layout under `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            sender_pads: root.join("Device").join("pads"),
            receiver_pads: root.join("Server").join("pads"),
            mailbox: root.join("Server").join("incoming"),
            decrypted: root.join("Server").join("decrypted"),
        }
    }

    /// Creates every directory of the layout.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.sender_pads,
            &self.receiver_pads,
            &self.mailbox,
            &self.decrypted,
        ] {
            fs::create_dir_all(dir).map_err(|e| OtpError::io("creating directory", dir, e))?;
        }
        Ok(())
    }
}
