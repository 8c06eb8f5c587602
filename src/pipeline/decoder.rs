use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::gate::LinePermit;
use crate::log_debug;
use crate::morse::{self, MorsePattern};
use crate::signal::{Mailbox, WaitMode};

/// Work order for one completed line.
///
/// The permit travels with the count; dropping it resumes the accumulator.
#[derive(Debug)]
pub(super) struct DecodeRequest {
    pub(super) count: usize,
    pub(super) permit: LinePermit,
}

#[derive(Debug)]
pub(super) enum DecoderSignal {
    Decode(DecodeRequest),
    Shutdown,
}

/// Turns queued line bytes into Morse patterns, one line at a time.
pub(super) struct Decoder {
    signals: Mailbox<DecoderSignal>,
    line: Receiver<u8>,
    patterns: Sender<MorsePattern>,
    poll: Duration,
}

impl Decoder {
    pub(super) fn new(
        signals: Mailbox<DecoderSignal>,
        line: Receiver<u8>,
        patterns: Sender<MorsePattern>,
        poll: Duration,
    ) -> Self {
        Self {
            signals,
            line,
            patterns,
            poll,
        }
    }

    pub(super) fn run(self) -> Result<()> {
        loop {
            match self.signals.wait(WaitMode::Forever) {
                Some(DecoderSignal::Decode(request)) => {
                    self.decode_line(request)?;
                }
                Some(DecoderSignal::Shutdown) | None => {
                    log_debug("decoder: shutdown");
                    return Ok(());
                }
            }
        }
    }

    /// Drain exactly `count` bytes from the line queue and emit their patterns.
    ///
    /// Returns how many patterns were queued. Bytes without a Morse pattern
    /// are consumed and skipped.
    pub(super) fn decode_line(&self, request: DecodeRequest) -> Result<usize> {
        let DecodeRequest { count, permit } = request;
        let mut remaining = count;
        let mut emitted = 0usize;
        while remaining > 0 {
            let byte = match self.line.recv_timeout(self.poll) {
                Ok(byte) => byte,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!(remaining, "decoder waiting for line bytes");
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    bail!("line queue closed with {remaining} of {count} bytes outstanding")
                }
            };
            remaining -= 1;
            match morse::encode(byte) {
                Some(pattern) => {
                    self.patterns
                        .send(pattern)
                        .map_err(|_| anyhow!("renderer stopped taking patterns"))?;
                    emitted += 1;
                }
                None => {
                    tracing::warn!(byte, "no Morse pattern; skipping");
                    log_debug(&format!("decoder: skipped unmapped byte {byte:#04x}"));
                }
            }
        }
        tracing::debug!(count, emitted, "line decoded");
        drop(permit);
        Ok(emitted)
    }
}
