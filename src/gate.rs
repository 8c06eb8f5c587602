//! Single-permit gate that keeps at most one line inside the decoder.
//!
//! The accumulator acquires the permit and hands it to the decoder together
//! with the line length. Dropping the permit puts it back, which is how the
//! decoder tells the accumulator it may continue.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

pub struct LineGate {
    release: Sender<()>,
    permits: Receiver<()>,
}

/// Proof that the holder owns the only line slot. Returns it on drop.
#[derive(Debug)]
pub struct LinePermit {
    release: Sender<()>,
}

impl LineGate {
    pub fn new() -> Self {
        let (release, permits) = bounded(1);
        let _ = release.try_send(());
        Self { release, permits }
    }

    /// Block until the permit is free and take it.
    pub fn acquire(&self) -> LinePermit {
        // The gate holds a sender, so the channel cannot disconnect under us.
        let _ = self.permits.recv();
        LinePermit {
            release: self.release.clone(),
        }
    }

    pub fn try_acquire(&self) -> Option<LinePermit> {
        match self.permits.try_recv() {
            Ok(()) => Some(LinePermit {
                release: self.release.clone(),
            }),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until whoever holds the permit has dropped it.
    pub fn wait_idle(&self) {
        drop(self.acquire());
    }

    pub fn is_idle(&self) -> bool {
        !self.permits.is_empty()
    }
}

impl Default for LineGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LinePermit {
    fn drop(&mut self) {
        let _ = self.release.try_send(());
    }
}
