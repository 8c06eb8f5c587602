use anyhow::{Context, Result};
use crossbeam_channel::{Sender, TrySendError};
use std::thread;

use crate::config::Timing;
use crate::io::{KeyRead, KeySource, Screen};
use crate::signal::{Control, Mailbox, WaitMode};
use crate::{log_debug, log_debug_content};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadMode {
    /// Short-timeout keyboard polling.
    Polling,
    /// Parked on the mailbox while a line is being rendered.
    Blocking,
}

/// Polls the key source and forwards bytes into the key queue.
pub(super) struct KeyReader<K, S> {
    source: K,
    screen: S,
    keys: Sender<u8>,
    control: Mailbox<Control>,
    timing: Timing,
}

impl<K: KeySource, S: Screen> KeyReader<K, S> {
    pub(super) fn new(
        source: K,
        screen: S,
        keys: Sender<u8>,
        control: Mailbox<Control>,
        timing: Timing,
    ) -> Self {
        Self {
            source,
            screen,
            keys,
            control,
            timing,
        }
    }

    pub(super) fn run(mut self) -> Result<()> {
        self.source
            .activate()
            .context("failed to put the key source into raw mode")?;
        let outcome = self.read_loop();
        self.teardown();
        outcome
    }

    fn read_loop(&mut self) -> Result<()> {
        let mut mode = ReadMode::Polling;
        // A byte the key queue refused; retried before anything new is read.
        let mut held: Option<u8> = None;
        loop {
            let wait = match mode {
                ReadMode::Polling => WaitMode::Poll,
                ReadMode::Blocking => WaitMode::Forever,
            };
            if let Some(control) = self.control.wait(wait) {
                tracing::debug!(control = control.label(), "key reader control");
                match control {
                    Control::Terminate => {
                        log_debug("key reader: terminate");
                        return Ok(());
                    }
                    Control::BlockingRead => {
                        mode = ReadMode::Blocking;
                        continue;
                    }
                    Control::Reset => mode = ReadMode::Polling,
                }
            }

            let byte = match held.take() {
                Some(byte) => byte,
                None => match self
                    .source
                    .read_byte(self.timing.poll)
                    .context("key source read failed")?
                {
                    KeyRead::Byte(byte) => byte,
                    KeyRead::Idle => continue,
                    KeyRead::Closed => {
                        log_debug("key reader: input closed");
                        return Ok(());
                    }
                },
            };

            match self.keys.try_send(byte) {
                Ok(()) => log_debug_content(&format!("key reader: byte {byte:#04x}")),
                Err(TrySendError::Full(byte)) => {
                    tracing::debug!(byte, "key queue full; backing off");
                    held = Some(byte);
                    thread::sleep(self.timing.backoff);
                }
                Err(TrySendError::Disconnected(_)) => {
                    log_debug("key reader: accumulator gone");
                    return Ok(());
                }
            }
        }
    }

    /// Best-effort: restore the input device and bring the cursor back.
    fn teardown(&mut self) {
        self.source.restore();
        if let Err(err) = self.screen.set_cursor_visible(true) {
            log_debug(&format!("key reader: cursor restore failed: {err}"));
        }
    }
}
