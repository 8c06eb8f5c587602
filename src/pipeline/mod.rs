//! The four cooperating workers and the queues between them.
//!
//! Data moves forward: key reader -> line accumulator -> decoder -> renderer.
//! Control moves backward: the decoder drops the line permit to resume the
//! accumulator, and the renderer posts `Control::Reset` to the key reader and
//! hands the render ticket back when a line has been fully blinked.

mod accumulator;
mod decoder;
mod key_reader;
mod renderer;
#[cfg(test)]
mod tests;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::bounded;
use std::thread::{self, JoinHandle};

use crate::config::{AppConfig, Timing};
use crate::gate::LineGate;
use crate::io::{KeySource, Screen, READOUT_ORIGIN};
use crate::log_debug;
use crate::signal::mailbox;

use accumulator::LineAccumulator;
use decoder::Decoder;
use key_reader::KeyReader;
pub use renderer::RenderContext;
use renderer::{RenderTicket, Renderer};

/// Queue sizes, timings and the shutdown key shared by the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub timing: Timing,
    pub queue_capacity: usize,
    pub sentinel: u8,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timing: config.timing(),
            queue_capacity: config.queue_capacity,
            sentinel: config.sentinel_byte(),
        }
    }
}

/// Handles for the running workers.
pub struct Pipeline {
    workers: Vec<(&'static str, JoinHandle<Result<()>>)>,
}

impl Pipeline {
    /// Create the queues and mailboxes and start every worker.
    pub fn spawn<K, S>(source: K, screen: S, settings: PipelineSettings) -> Result<Self>
    where
        K: KeySource,
        S: Screen,
    {
        if settings.queue_capacity == 0 {
            return Err(anyhow!("pipeline queues need a capacity of at least 1"));
        }
        let capacity = settings.queue_capacity;
        let (key_tx, key_rx) = bounded(capacity);
        let (line_tx, line_rx) = bounded(capacity);
        let (pattern_tx, pattern_rx) = bounded(capacity);
        let (job_tx, job_rx) = bounded(1);
        let (ticket_tx, ticket_rx) = bounded(1);
        let (key_control_tx, key_control_rx) = mailbox();
        let (decoder_tx, decoder_rx) = mailbox();

        ticket_tx
            .send(RenderTicket::new(RenderContext::new(READOUT_ORIGIN)))
            .map_err(|_| anyhow!("render ticket channel closed at startup"))?;

        let mut pipeline = Pipeline {
            workers: Vec::with_capacity(4),
        };

        let renderer = Renderer::new(
            job_rx,
            ticket_tx,
            pattern_rx,
            key_control_tx.clone(),
            screen.clone(),
            settings.timing,
        );
        pipeline.start("morse-renderer", move || renderer.run())?;

        let decoder = Decoder::new(decoder_rx, line_rx, pattern_tx, settings.timing.poll);
        pipeline.start("morse-decoder", move || decoder.run())?;

        let accumulator = LineAccumulator::new(
            key_rx,
            line_tx,
            key_control_tx,
            decoder_tx,
            job_tx,
            ticket_rx,
            LineGate::new(),
            screen.clone(),
            settings.sentinel,
        );
        pipeline.start("line-accumulator", move || accumulator.run())?;

        let key_reader = KeyReader::new(source, screen, key_tx, key_control_rx, settings.timing);
        pipeline.start("key-reader", move || key_reader.run())?;

        tracing::info!(capacity, "pipeline started");
        Ok(pipeline)
    }

    fn start<F>(&mut self, name: &'static str, body: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .with_context(|| format!("failed to spawn {name} worker"))?;
        self.workers.push((name, handle));
        Ok(())
    }

    /// Block until every worker has finished, reporting the first failure.
    ///
    /// Workers wind down in a chain once the key reader stops: its queue
    /// disconnects, the accumulator shuts the decoder down and closes the
    /// renderer's job channel.
    pub fn wait(self) -> Result<()> {
        let mut first_error = None;
        for (name, handle) in self.workers.into_iter().rev() {
            let outcome = match handle.join() {
                Ok(result) => result.with_context(|| format!("{name} worker failed")),
                Err(_) => Err(anyhow!("{name} worker panicked")),
            };
            if let Err(err) = outcome {
                log_debug(&format!("{err:#}"));
                first_error.get_or_insert(err);
            } else {
                log_debug(&format!("{name} worker finished"));
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
