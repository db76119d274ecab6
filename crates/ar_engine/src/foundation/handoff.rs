//! Single-slot handoff between pacing domains
//!
//! A [`Mailbox`] holds at most one value. Putting a new value displaces the
//! undelivered one, so a fast producer never builds a backlog behind a slow
//! consumer. The consumer always sees the most recent value.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Why a blocking take returned without a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeError {
    /// Nothing arrived before the timeout
    Timeout,
    /// The mailbox was closed and is empty
    Closed,
}

/// Counters describing the traffic through a mailbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStats {
    /// Values accepted by `put`
    pub posted: u64,
    /// Values handed to the consumer
    pub delivered: u64,
    /// Values displaced before the consumer took them
    pub dropped: u64,
}

struct Slot<T> {
    value: Option<T>,
    closed: bool,
    stats: MailboxStats,
}

/// Single-slot, drop-oldest handoff
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Mailbox<T> {
    /// Create an empty, open mailbox
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                closed: false,
                stats: MailboxStats::default(),
            }),
            ready: Condvar::new(),
        }
    }

    /// Post a value, returning the undelivered value it displaced
    ///
    /// Posting to a closed mailbox hands the value straight back.
    pub fn put(&self, value: T) -> Option<T> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Some(value);
        }
        let displaced = slot.value.replace(value);
        slot.stats.posted += 1;
        if displaced.is_some() {
            slot.stats.dropped += 1;
        }
        drop(slot);
        self.ready.notify_one();
        displaced
    }

    /// Take the pending value without waiting
    pub fn try_take(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        let value = slot.value.take();
        if value.is_some() {
            slot.stats.delivered += 1;
        }
        value
    }

    /// Wait up to `timeout` for a value
    pub fn take_timeout(&self, timeout: Duration) -> Result<T, TakeError> {
        let mut slot = self.slot.lock();
        if slot.value.is_none() && !slot.closed {
            // A single wait: callers loop and re-check their own stop conditions.
            let _ = self.ready.wait_for(&mut slot, timeout);
        }
        match slot.value.take() {
            Some(value) => {
                slot.stats.delivered += 1;
                Ok(value)
            }
            None if slot.closed => Err(TakeError::Closed),
            None => Err(TakeError::Timeout),
        }
    }

    /// Whether a value is waiting
    pub fn has_pending(&self) -> bool {
        self.slot.lock().value.is_some()
    }

    /// Close the mailbox and wake any waiting consumer
    ///
    /// A value already in the slot can still be taken.
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.ready.notify_all();
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Traffic counters
    pub fn stats(&self) -> MailboxStats {
        self.slot.lock().stats
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_displaces_oldest() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.put(1), None);
        assert_eq!(mailbox.put(2), Some(1));
        assert_eq!(mailbox.try_take(), Some(2));
        assert_eq!(mailbox.try_take(), None);

        let stats = mailbox.stats();
        assert_eq!(stats.posted, 2);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_take_timeout_without_value() {
        let mailbox: Mailbox<u32> = Mailbox::new();
        assert_eq!(mailbox.take_timeout(Duration::from_millis(5)), Err(TakeError::Timeout));
    }

    #[test]
    fn test_close_wakes_consumer() {
        let mailbox: Arc<Mailbox<u32>> = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.take_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(10));
        mailbox.close();
        assert_eq!(consumer.join().unwrap(), Err(TakeError::Closed));
        assert_eq!(mailbox.put(7), Some(7));
    }

    #[test]
    fn test_fast_producer_never_grows_backlog() {
        let mailbox = Arc::new(Mailbox::new());
        let producer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    mailbox.put(vec![0u8; 64].into_boxed_slice());
                    if i % 1000 == 0 {
                        thread::yield_now();
                    }
                }
            })
        };

        let mut taken = 0u64;
        while !producer.is_finished() {
            if mailbox.try_take().is_some() {
                taken += 1;
            }
            thread::sleep(Duration::from_micros(200));
        }
        producer.join().unwrap();
        if mailbox.try_take().is_some() {
            taken += 1;
        }

        let stats = mailbox.stats();
        assert_eq!(stats.posted, 10_000);
        assert_eq!(stats.delivered, taken);
        assert_eq!(stats.delivered + stats.dropped, stats.posted);
        assert!(!mailbox.has_pending());
    }
}
