// File:    sender.rs
// Author:  apezoo
// Date:    2026-10-19
//
// Description: Turns a structured message into ciphertext in the mailbox, consuming exactly one sender pad.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The sending pipeline.
//!
//! A send moves through `PadSelected -> Encrypted -> Delivered` and only
//! then consumes the pad. The sender-side pad lock is held for the whole
//! sequence, so two concurrent sends can never pick the same pad. A failure
//! at any stage before delivery leaves the pad in place.

use crate::codec::{self, Record};
use crate::crypto;
use crate::error::{OtpError, Result};
use crate::mailbox::Mailbox;
use crate::pad_store::PadStore;
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;

/// The step a send was at when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    /// Checking and encoding the record.
    Encoding,
    /// Choosing a sender-side pad.
    PadSelection,
    /// XOR-ing the record with the pad.
    Encryption,
    /// Writing the ciphertext to the mailbox.
    Delivery,
    /// Deleting the used pad after delivery.
    Consumption,
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Encoding => "encoding",
            Self::PadSelection => "pad selection",
            Self::Encryption => "encryption",
            Self::Delivery => "delivery",
            Self::Consumption => "pad consumption",
        };
        f.write_str(stage)
    }
}

/// A ciphertext that reached the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Mailbox item holding the ciphertext.
    pub item_name: String,
    /// The pad that was used and consumed.
    pub pad_name: String,
    /// Ciphertext length in bytes.
    pub ciphertext_len: usize,
}

/// Result of [`Sender::send`]. Errors never escape a send as `Err`.
#[derive(Debug)]
pub enum SendOutcome {
    /// The ciphertext was delivered and its pad consumed.
    Delivered(Delivery),
    /// The send stopped at `stage`.
    Failed {
        /// Where it stopped.
        stage: SendStage,
        /// Why it stopped.
        error: OtpError,
    },
}

impl SendOutcome {
    /// Whether the message was delivered.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    /// Human-readable failure reason, if the send failed.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Delivered(_) => None,
            Self::Failed { stage, error } => Some(format!("{stage} failed: {error}")),
        }
    }

    /// The delivery, if the send succeeded.
    #[must_use]
    pub const fn delivery(&self) -> Option<&Delivery> {
        match self {
            Self::Delivered(d) => Some(d),
            Self::Failed { .. } => None,
        }
    }
}

/// Encrypts records with sender-side pads and drops them in the mailbox.
#[derive(Debug, Clone)]
pub struct Sender {
    pads: Arc<PadStore>,
    mailbox: Mailbox,
}

impl Sender {
    /// Creates a sender over a shared pad store and a mailbox.
    #[must_use]
    pub const fn new(pads: Arc<PadStore>, mailbox: Mailbox) -> Self {
        Self { pads, mailbox }
    }

    /// Sends one message built from its four fields.
    pub fn send(&self, category: &str, latitude: &str, longitude: &str, info: &str) -> SendOutcome {
        self.send_record(&Record::new(category, latitude, longitude, info))
    }

    /// Sends one record.
    pub fn send_record(&self, record: &Record) -> SendOutcome {
        match self.try_send(record) {
            Ok(delivery) => {
                info!(
                    "Sent {} bytes as {} using pad {}",
                    delivery.ciphertext_len, delivery.item_name, delivery.pad_name
                );
                SendOutcome::Delivered(delivery)
            }
            Err((stage, error)) => {
                error!("Error sending message ({stage}): {error}");
                SendOutcome::Failed { stage, error }
            }
        }
    }

    /// Pads left on the sender side.
    #[must_use]
    pub fn remaining_pads(&self) -> usize {
        self.pads.count_sender()
    }

    fn try_send(&self, record: &Record) -> std::result::Result<Delivery, (SendStage, OtpError)> {
        let message = encode_checked(record).map_err(|e| (SendStage::Encoding, e))?;
        let message = message.as_bytes();
        debug!("Preparing to send a {}-byte record", message.len());

        let pads = self.pads.lock_sender();
        let pad = pads
            .choose_random()
            .map_err(|e| (SendStage::PadSelection, e))?;
        if pad.len() < message.len() {
            return Err((
                SendStage::PadSelection,
                OtpError::MessageTooLarge {
                    message_len: message.len(),
                    pad_len: pad.len(),
                },
            ));
        }
        debug!("Selected pad {} ({} bytes)", pad.name(), pad.len());

        let ciphertext =
            crypto::encrypt(message, pad.bytes()).map_err(|e| (SendStage::Encryption, e))?;

        let item_name = self
            .mailbox
            .deliver(&ciphertext)
            .map_err(|e| (SendStage::Delivery, e))?;

        if let Err(e) = pads.remove(pad.name()) {
            warn!(
                "Ciphertext {item_name} was delivered but pad {} could not be deleted; it must not be reused.",
                pad.name()
            );
            return Err((SendStage::Consumption, e));
        }

        Ok(Delivery {
            item_name,
            pad_name: pad.name().to_owned(),
            ciphertext_len: ciphertext.len(),
        })
    }
}

/// Encodes a record, refusing coordinates the receiver could never validate.
fn encode_checked(record: &Record) -> Result<String> {
    for (label, value) in [("latitude", &record.latitude), ("longitude", &record.longitude)] {
        if !crypto::is_decimal(value) {
            return Err(OtpError::InvalidRecord(format!(
                "{label} '{value}' is not a decimal number"
            )));
        }
    }
    Ok(codec::encode(
        &record.category,
        &record.latitude,
        &record.longitude,
        &record.info,
    ))
}
