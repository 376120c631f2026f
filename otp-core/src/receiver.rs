// File:    receiver.rs
// Author:  apezoo
// Date:    2026-10-19
//
// Description: Polls the mailbox and trial-decrypts each item against the remaining receiver pads.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The receiving pipeline.
//!
//! The receiver does not know which pad protects an item. It tries every
//! remaining receiver-side pad in name order and accepts the first one whose
//! output passes [`crypto::validate_plaintext_shape`]. On success the record
//! is stamped, persisted, and the pad and the item are both deleted. Items
//! that no pad can open are remembered in an in-memory failed set and skipped
//! by later polls until [`Receiver::retry_all`] clears it.
//!
//! Polls are serialized: overlapping calls from a scheduler and from manual
//! triggers run one after the other. Locks are always taken in the order
//! poll, receiver pads, failed set.

use crate::codec;
use crate::crypto;
use crate::error::Result;
use crate::events::{Decrypted, EventBus, Subscription, SubscriptionId};
use crate::lock;
use crate::mailbox::{Mailbox, PlaintextStore};
use crate::pad_store::PadStore;
use chrono::Local;
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Default number of ciphertext bytes shown in an event preview.
pub const DEFAULT_PREVIEW_BYTES: usize = 32;

/// What happened to one mailbox item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A pad validated; the item and the pad are gone.
    Decrypted(Decrypted),
    /// Pads exist but none validated. The item is marked failed.
    Exhausted,
    /// There were no receiver-side pads at all. The item is marked failed.
    NoPads,
    /// Nothing to decrypt: the item was not in the mailbox, or its plaintext
    /// was already stored and the leftover item has been removed.
    Missing,
}

/// Tally of one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Items decrypted in this poll.
    pub decrypted: usize,
    /// Items newly marked failed in this poll.
    pub failed: usize,
    /// Items skipped because they were already marked failed.
    pub skipped: usize,
    /// Items left untouched because of a storage error.
    pub errors: usize,
}

/// Trial-decrypting consumer of the mailbox.
#[derive(Debug)]
pub struct Receiver {
    pads: Arc<PadStore>,
    mailbox: Mailbox,
    plaintexts: PlaintextStore,
    events: EventBus,
    failed: Mutex<HashSet<String>>,
    polling: Mutex<()>,
    preview_bytes: usize,
}

impl Receiver {
    /// Creates a receiver over a shared pad store, the mailbox and the plaintext store.
    #[must_use]
    pub fn new(pads: Arc<PadStore>, mailbox: Mailbox, plaintexts: PlaintextStore) -> Self {
        Self {
            pads,
            mailbox,
            plaintexts,
            events: EventBus::default(),
            failed: Mutex::new(HashSet::new()),
            polling: Mutex::new(()),
            preview_bytes: DEFAULT_PREVIEW_BYTES,
        }
    }

    /// Sets how many ciphertext bytes event previews show.
    #[must_use]
    pub fn with_preview_bytes(mut self, preview_bytes: usize) -> Self {
        self.preview_bytes = preview_bytes;
        self
    }

    /// Registers a subscriber for [`Decrypted`] events.
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Removes a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Processes every pending item that is not marked failed.
    ///
    /// Never returns an error: storage failures are logged, counted in the
    /// report, and the affected item stays unmarked so the next poll retries it.
    pub fn poll(&self) -> PollReport {
        let _polling = lock(&self.polling);
        self.poll_locked()
    }

    /// Clears the failed set, then polls.
    pub fn retry_all(&self) -> PollReport {
        let _polling = lock(&self.polling);
        let cleared = {
            let mut failed = lock(&self.failed);
            let n = failed.len();
            failed.clear();
            n
        };
        if cleared > 0 {
            info!("Cleared {cleared} failed item(s) for retry");
        }
        self.poll_locked()
    }

    /// Processes a single mailbox item, whether or not it is marked failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the item or a pad cannot be read, or the results
    /// cannot be persisted. The item is not marked failed in that case.
    pub fn process_one(&self, item: &str) -> Result<ProcessOutcome> {
        let _polling = lock(&self.polling);
        self.process_item(item)
    }

    /// Every persisted plaintext record, ordered by item name.
    ///
    /// Survives restarts. A listing failure is logged and yields no records.
    #[must_use]
    pub fn decrypted_messages(&self) -> Vec<String> {
        self.plaintexts.load_all().unwrap_or_else(|e| {
            error!("Error loading existing decrypted messages: {e}");
            Vec::new()
        })
    }

    /// Snapshot of the items currently marked failed, sorted.
    #[must_use]
    pub fn failed_items(&self) -> Vec<String> {
        let mut items: Vec<String> = lock(&self.failed).iter().cloned().collect();
        items.sort();
        items
    }

    /// Pads left on the receiver side.
    #[must_use]
    pub fn remaining_pads(&self) -> usize {
        self.pads.count_receiver()
    }

    fn poll_locked(&self) -> PollReport {
        let mut report = PollReport::default();
        let items = match self.mailbox.list() {
            Ok(items) => items,
            Err(e) => {
                error!("Error processing messages: {e}");
                report.errors += 1;
                return report;
            }
        };

        for item in items {
            if lock(&self.failed).contains(&item) {
                report.skipped += 1;
                continue;
            }
            match self.process_item(&item) {
                Ok(ProcessOutcome::Decrypted(_)) => report.decrypted += 1,
                Ok(ProcessOutcome::Exhausted | ProcessOutcome::NoPads) => report.failed += 1,
                Ok(ProcessOutcome::Missing) => {}
                Err(e) => {
                    error!("Error processing message {item}: {e}");
                    report.errors += 1;
                }
            }
        }
        if report != PollReport::default() {
            debug!("Poll finished: {report:?}");
        }
        report
    }

    fn process_item(&self, item: &str) -> Result<ProcessOutcome> {
        let Some(ciphertext) = self.mailbox.read(item)? else {
            debug!("Mailbox item {item} is gone; nothing to do");
            return Ok(ProcessOutcome::Missing);
        };
        if self.plaintexts.contains(item)? {
            warn!("Mailbox item {item} was already decrypted; removing the leftover");
            self.mailbox.remove(item)?;
            lock(&self.failed).remove(item);
            return Ok(ProcessOutcome::Missing);
        }
        info!("Processing {item} ({} bytes)", ciphertext.len());

        let pads = self.pads.lock_receiver();
        let names = pads.names()?;
        if names.is_empty() {
            warn!("No receiver pads available to decrypt {item}");
            self.mark_failed(item);
            return Ok(ProcessOutcome::NoPads);
        }

        debug!("Attempting decryption with {} available pads...", names.len());
        for name in names {
            let pad = pads.read(&name)?;
            if pad.len() < ciphertext.len() {
                debug!("Pad {name} is too small for message {item}");
                continue;
            }
            let plaintext = crypto::decrypt(&ciphertext, pad.bytes())?;
            if !crypto::validate_plaintext_shape(&plaintext) {
                continue;
            }

            let record = codec::append_receipt(
                &String::from_utf8_lossy(&plaintext),
                Local::now().naive_local(),
            );
            self.plaintexts.save(item, &record)?;
            pads.remove(&name)?;
            drop(pads);
            if let Err(e) = self.mailbox.remove(item) {
                warn!("Decrypted {item} but could not remove it from the mailbox: {e}");
            }
            lock(&self.failed).remove(item);

            let event = Decrypted {
                record,
                ciphertext_preview: self.preview(&ciphertext),
                ciphertext_sha256: hex::encode(Sha256::digest(&ciphertext)),
                pad_name: name,
                item_name: item.to_owned(),
            };
            info!("Decrypted {item} with pad {}", event.pad_name);
            self.events.publish(&event);
            return Ok(ProcessOutcome::Decrypted(event));
        }

        warn!("Could not decrypt message {item} with any available pad.");
        self.mark_failed(item);
        Ok(ProcessOutcome::Exhausted)
    }

    fn mark_failed(&self, item: &str) {
        lock(&self.failed).insert(item.to_owned());
    }

    fn preview(&self, ciphertext: &[u8]) -> String {
        let shown = ciphertext.len().min(self.preview_bytes);
        let mut preview = hex::encode_upper(&ciphertext[..shown]);
        if shown < ciphertext.len() {
            preview.push_str("...");
        }
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OtpError;
    use crate::sender::Sender;
    use tempfile::tempdir;

    struct Fixture {
        dir: tempfile::TempDir,
        pads: Arc<PadStore>,
        sender: Sender,
        receiver: Receiver,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let pads =
            Arc::new(PadStore::open(&root.join("sender"), &root.join("receiver")).unwrap());
        let mailbox = Mailbox::open(&root.join("incoming")).unwrap();
        let plaintexts = PlaintextStore::open(&root.join("decrypted")).unwrap();
        Fixture {
            sender: Sender::new(Arc::clone(&pads), mailbox.clone()),
            receiver: Receiver::new(Arc::clone(&pads), mailbox, plaintexts),
            pads,
            dir,
        }
    }

    #[test]
    fn wrong_pads_are_skipped_until_the_right_one() {
        let f = fixture();
        f.pads.generate(1, 64).unwrap();
        assert!(f.sender.send("Alert", "1.5", "2.5", "hi").is_success());
        for n in 0..5 {
            f.pads
                .import_receiver(&format!("pad_decoy{n}.bin"), &[0x5a; 64])
                .unwrap();
        }

        let report = f.receiver.poll();
        assert_eq!(report.decrypted, 1);
        assert_eq!(f.receiver.remaining_pads(), 5);
        assert_eq!(f.receiver.decrypted_messages().len(), 1);
    }

    #[test]
    fn failed_items_are_skipped_until_retry() {
        let f = fixture();
        f.pads.generate(1, 64).unwrap();
        assert!(f.sender.send("Alert", "1", "2", "x").is_success());
        let saved = f.pads.list_receiver_candidates().unwrap();
        f.pads.purge_receiver().unwrap();

        assert_eq!(f.receiver.poll().failed, 1);
        assert_eq!(f.receiver.poll().skipped, 1);
        assert_eq!(f.receiver.failed_items().len(), 1);

        f.pads
            .import_receiver(saved[0].name(), saved[0].bytes())
            .unwrap();
        assert_eq!(f.receiver.poll().decrypted, 0);
        assert_eq!(f.receiver.retry_all().decrypted, 1);
        assert!(f.receiver.failed_items().is_empty());
    }

    #[test]
    fn event_carries_preview_digest_and_names() {
        let f = fixture();
        let pad = f.pads.generate(1, 128).unwrap().remove(0);
        let sub = f.receiver.subscribe();
        let delivery = f
            .sender
            .send("Status", "0", "0", "a fairly long message body to exceed the preview")
            .delivery()
            .cloned()
            .unwrap();

        f.receiver.poll();
        let event = sub.try_next().unwrap();
        assert_eq!(event.pad_name, pad);
        assert_eq!(event.item_name, delivery.item_name);
        assert_eq!(event.ciphertext_preview.len(), 64 + 3);
        assert!(event.ciphertext_preview.ends_with("..."));
        assert_eq!(event.ciphertext_sha256.len(), 64);
        assert_eq!(event.fields()[0], "Status");
        assert!(f.receiver.unsubscribe(sub.id()));
    }

    #[test]
    fn short_preview_is_not_truncated() {
        let f = fixture();
        let receiver = Receiver::new(
            Arc::clone(&f.pads),
            Mailbox::open(&f.dir.path().join("incoming")).unwrap(),
            PlaintextStore::open(&f.dir.path().join("decrypted")).unwrap(),
        )
        .with_preview_bytes(4);
        assert_eq!(receiver.preview(&[0xde, 0xad]), "DEAD");
        assert_eq!(receiver.preview(&[1, 2, 3, 4, 5]), "01020304...");
    }

    #[test]
    fn malformed_item_name_is_an_error_not_a_mark() {
        let f = fixture();
        assert!(matches!(
            f.receiver.process_one("../escape.bin"),
            Err(OtpError::InvalidName(_))
        ));
        assert!(f.receiver.failed_items().is_empty());
    }
}
