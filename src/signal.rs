//! Single-slot, latest-value-wins mailboxes for worker control.
//!
//! A mailbox holds at most one pending value. Posting replaces whatever is
//! still unread, so a worker always acts on the most recent instruction and
//! control messages never pile up behind each other.

use crate::lock_or_recover;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Control messages understood by the key reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Stop reading, restore the terminal and end the worker.
    Terminate,
    /// Stop polling the keyboard until the next control message.
    BlockingRead,
    /// Back to short-timeout polling.
    Reset,
}

impl Control {
    pub fn label(self) -> &'static str {
        match self {
            Control::Terminate => "terminate",
            Control::BlockingRead => "blocking-read",
            Control::Reset => "reset",
        }
    }
}

/// How long a receiver is willing to wait for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Take a pending value if there is one, never block.
    Poll,
    Timeout(Duration),
    Forever,
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

struct SlotState<T> {
    value: Option<T>,
    /// Set when the mailbox is dropped; later posts are discarded.
    closed: bool,
}

/// Sending half. Cheap to clone; every clone writes the same slot.
pub struct Notifier<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Receiving half, owned by exactly one worker.
pub struct Mailbox<T> {
    slot: Arc<Slot<T>>,
}

/// Create a connected notifier/mailbox pair with an empty slot.
pub fn mailbox<T>() -> (Notifier<T>, Mailbox<T>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState {
            value: None,
            closed: false,
        }),
        ready: Condvar::new(),
    });
    (
        Notifier {
            slot: Arc::clone(&slot),
        },
        Mailbox { slot },
    )
}

impl<T> Notifier<T> {
    /// Store `value`, dropping any unread value.
    ///
    /// Returns `false` if the receiving worker is gone and `value` was dropped.
    pub fn post(&self, value: T) -> bool {
        self.post_unless(value, |_| false)
    }

    /// Store `value` unless the unread value satisfies `keep`.
    ///
    /// Returns `false` when `value` was dropped instead of stored.
    pub fn post_unless(&self, value: T, keep: impl FnOnce(&T) -> bool) -> bool {
        let mut state = lock_or_recover(&self.slot.state, "mailbox post");
        if state.closed || state.value.as_ref().is_some_and(keep) {
            return false;
        }
        let replaced = state.value.replace(value);
        drop(state);
        // Run the old value's destructor outside the lock.
        drop(replaced);
        self.slot.ready.notify_all();
        true
    }
}

impl<T> Mailbox<T> {
    /// Take the pending value, waiting according to `mode`.
    pub fn wait(&self, mode: WaitMode) -> Option<T> {
        let mut state = lock_or_recover(&self.slot.state, "mailbox wait");
        match mode {
            WaitMode::Poll => state.value.take(),
            WaitMode::Forever => loop {
                if let Some(value) = state.value.take() {
                    return Some(value);
                }
                state = self
                    .slot
                    .ready
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            },
            WaitMode::Timeout(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(value) = state.value.take() {
                        return Some(value);
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    state = self
                        .slot
                        .ready
                        .wait_timeout(state, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                }
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        lock_or_recover(&self.slot.state, "mailbox has_pending")
            .value
            .is_some()
    }
}

impl<T> Drop for Mailbox<T> {
    fn drop(&mut self) {
        let mut state = lock_or_recover(&self.slot.state, "mailbox close");
        state.closed = true;
        let pending = state.value.take();
        drop(state);
        drop(pending);
    }
}
