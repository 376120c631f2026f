// File:    events.rs
// Author:  apezoo
// Date:    2026-10-19
//
// Description: Decryption notifications and the channel-based subscriber registry that delivers them.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Notifications emitted by the receiver.
//!
//! Each subscriber gets its own unbounded channel. Publishing never blocks
//! and never fails: subscribers whose receiving end has been dropped are
//! pruned on the next publish.

use crate::codec;
use crate::lock;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// One successful decryption.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// The decrypted record with its receipt timestamp appended.
    pub record: String,
    /// Upper-case hex of the first ciphertext bytes, `...`-terminated when truncated.
    pub ciphertext_preview: String,
    /// Hex SHA-256 of the whole ciphertext.
    pub ciphertext_sha256: String,
    /// Name of the pad that decrypted it (now consumed).
    pub pad_name: String,
    /// Name of the mailbox item it came from (now removed).
    pub item_name: String,
}

impl Decrypted {
    /// The record split back into fields.
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        codec::decode(&self.record)
    }
}

/// Identifies one subscription for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    events: Receiver<Decrypted>,
}

impl Subscription {
    /// This subscription's id.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the next pending event without waiting.
    #[must_use]
    pub fn try_next(&self) -> Option<Decrypted> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next event.
    #[must_use]
    pub fn next_timeout(&self, timeout: Duration) -> Option<Decrypted> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes every event currently queued.
    #[must_use]
    pub fn drain(&self) -> Vec<Decrypted> {
        self.events.try_iter().collect()
    }
}

/// Registry of decryption subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionId, Sender<Decrypted>>>,
}

impl EventBus {
    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel();
        lock(&self.subscribers).insert(id, tx);
        debug!("Subscriber {} registered", id.0);
        Subscription { id, events: rx }
    }

    /// Removes a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.subscribers).remove(&id).is_some()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Delivers one event to every live subscriber.
    pub fn publish(&self, event: &Decrypted) {
        lock(&self.subscribers).retain(|id, tx| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                debug!("Subscriber {} is gone, dropping it", id.0);
            }
            alive
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(n: u8) -> Decrypted {
        Decrypted {
            record: format!("Info,{n},2,x,2025-07-17 00:00:00.000"),
            ciphertext_preview: "00".into(),
            ciphertext_sha256: String::new(),
            pad_name: format!("pad_{n}.bin"),
            item_name: format!("msg_{n}.bin"),
        }
    }

    #[test]
    fn every_subscriber_gets_every_event() {
        let bus = EventBus::default();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(&event(1));
        bus.publish(&event(2));
        assert_eq!(a.drain(), vec![event(1), event(2)]);
        assert_eq!(b.try_next(), Some(event(1)));
    }

    #[test]
    fn unsubscribed_and_dropped_subscribers_stop_receiving() {
        let bus = EventBus::default();
        let a = bus.subscribe();
        let b = bus.subscribe();
        assert!(bus.unsubscribe(a.id()));
        assert!(!bus.unsubscribe(a.id()));
        drop(b);
        bus.publish(&event(1));
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(a.try_next(), None);
    }

    #[test]
    fn fields_are_decoded() {
        assert_eq!(event(7).fields()[1], "7");
    }
}
