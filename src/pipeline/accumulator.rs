use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::decoder::{DecodeRequest, DecoderSignal};
use super::renderer::{RenderJob, RenderTicket};
use crate::gate::LineGate;
use crate::io::Screen;
use crate::morse;
use crate::signal::{Control, Notifier};
use crate::{log_debug, log_debug_content};

/// What the accumulator did with one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Step {
    /// Accepted and queued for the decoder.
    Buffered,
    /// Rejected by the character filter.
    Rejected,
    /// Accepted but the line queue was full.
    Overflow,
    /// Line end with nothing buffered.
    EmptyLine,
    /// Line of this length went through the decoder.
    LineDecoded(usize),
    Terminate,
}

fn is_line_end(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

/// Builds lines out of keystrokes and hands each finished line downstream.
pub(super) struct LineAccumulator<S> {
    keys: Receiver<u8>,
    line: Sender<u8>,
    key_control: Notifier<Control>,
    decoder: Notifier<DecoderSignal>,
    jobs: Sender<RenderJob>,
    tickets: Receiver<RenderTicket>,
    gate: LineGate,
    screen: S,
    sentinel: u8,
    count: usize,
}

impl<S: Screen> LineAccumulator<S> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        keys: Receiver<u8>,
        line: Sender<u8>,
        key_control: Notifier<Control>,
        decoder: Notifier<DecoderSignal>,
        jobs: Sender<RenderJob>,
        tickets: Receiver<RenderTicket>,
        gate: LineGate,
        screen: S,
        sentinel: u8,
    ) -> Self {
        Self {
            keys,
            line,
            key_control,
            decoder,
            jobs,
            tickets,
            gate,
            screen,
            sentinel,
            count: 0,
        }
    }

    pub(super) fn run(mut self) -> Result<()> {
        let outcome = self.consume();
        // Dropping `self` afterwards closes the renderer's job channel.
        self.decoder.post(DecoderSignal::Shutdown);
        outcome
    }

    fn consume(&mut self) -> Result<()> {
        while let Ok(byte) = self.keys.recv() {
            self.handle(byte)?;
        }
        log_debug("accumulator: key queue closed");
        Ok(())
    }

    pub(super) fn handle(&mut self, byte: u8) -> Result<Step> {
        if is_line_end(byte) {
            if self.count == 0 {
                return Ok(Step::EmptyLine);
            }
            let count = self.count;
            self.finish_line(count)?;
            return Ok(Step::LineDecoded(count));
        }
        if byte == self.sentinel {
            self.key_control.post(Control::Terminate);
            return Ok(Step::Terminate);
        }
        if !morse::is_accepted(byte) {
            return Ok(Step::Rejected);
        }
        match self.line.try_send(byte) {
            Ok(()) => {
                self.count += 1;
                log_debug_content(&format!("accumulator: buffered {:?}", byte as char));
                Ok(Step::Buffered)
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(count = self.count, "line queue full; dropping keystroke");
                log_debug("accumulator: line queue full, keystroke dropped");
                Ok(Step::Overflow)
            }
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("decoder line queue closed")),
        }
    }

    /// Start the render chain for a line of `count` bytes and wait until the
    /// decoder has drained it.
    fn finish_line(&mut self, count: usize) -> Result<()> {
        // Only one ticket exists, so this blocks while a previous line is still blinking.
        let ticket = self
            .tickets
            .recv()
            .context("render ticket was not returned")?;
        if let Err(err) = self.screen.set_cursor_visible(false) {
            log_debug(&format!("accumulator: hide cursor failed: {err}"));
        }
        self.key_control.post(Control::BlockingRead);

        let permit = self.gate.acquire();
        // A closed decoder mailbox drops the request and its permit immediately.
        if !self
            .decoder
            .post(DecoderSignal::Decode(DecodeRequest { count, permit }))
        {
            log_debug("accumulator: decoder gone; line discarded");
        }
        self.jobs
            .send(RenderJob::new(ticket, count))
            .map_err(|_| anyhow!("renderer stopped accepting lines"))?;
        tracing::info!(count, "line handed to decoder");

        self.gate.wait_idle();
        self.count = 0;
        Ok(())
    }

    #[cfg(test)]
    pub(super) fn count(&self) -> usize {
        self.count
    }
}
