use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::io;
use std::thread;

use crate::config::Timing;
use crate::io::{Cell, Screen};
use crate::log_debug;
use crate::morse::{self, MorsePattern, Token};
use crate::signal::{Control, Notifier};

/// Readout cursor owned by whichever line is currently rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderContext {
    cursor: Cell,
    origin_column: u16,
}

impl RenderContext {
    pub fn new(origin: Cell) -> Self {
        Self {
            cursor: origin,
            origin_column: origin.column,
        }
    }

    pub fn cursor(&self) -> Cell {
        self.cursor
    }

    /// Cell for the next glyph; moves the cursor one column right.
    fn advance(&mut self) -> Cell {
        let at = self.cursor;
        self.cursor.column = self.cursor.column.saturating_add(1);
        at
    }

    fn next_row(&mut self) {
        self.cursor = Cell {
            column: self.origin_column,
            row: self.cursor.row.saturating_add(1),
        };
    }
}

/// The single token that allows a line to render. Whoever holds it owns the readout.
#[derive(Debug)]
pub(super) struct RenderTicket {
    context: RenderContext,
}

impl RenderTicket {
    pub(super) fn new(context: RenderContext) -> Self {
        Self { context }
    }

    #[cfg(test)]
    pub(super) fn context(&self) -> RenderContext {
        self.context
    }
}

#[derive(Debug)]
pub(super) struct RenderJob {
    ticket: RenderTicket,
    line_len: usize,
}

impl RenderJob {
    pub(super) fn new(ticket: RenderTicket, line_len: usize) -> Self {
        Self { ticket, line_len }
    }

    #[cfg(test)]
    pub(super) fn line_len(&self) -> usize {
        self.line_len
    }

    #[cfg(test)]
    pub(super) fn into_ticket(self) -> RenderTicket {
        self.ticket
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderState {
    Waiting,
    Rendering(MorsePattern),
    Terminated,
}

/// Blinks patterns on the lamp, one line per job.
pub(super) struct Renderer<S> {
    jobs: Receiver<RenderJob>,
    tickets: Sender<RenderTicket>,
    patterns: Receiver<MorsePattern>,
    key_control: Notifier<Control>,
    screen: S,
    timing: Timing,
}

impl<S: Screen> Renderer<S> {
    pub(super) fn new(
        jobs: Receiver<RenderJob>,
        tickets: Sender<RenderTicket>,
        patterns: Receiver<MorsePattern>,
        key_control: Notifier<Control>,
        screen: S,
        timing: Timing,
    ) -> Self {
        Self {
            jobs,
            tickets,
            patterns,
            key_control,
            screen,
            timing,
        }
    }

    pub(super) fn run(mut self) -> Result<()> {
        while let Ok(job) = self.jobs.recv() {
            let ticket = self.render_job(job);
            if self.tickets.send(ticket).is_err() {
                log_debug("renderer: accumulator gone; ticket dropped");
            }
        }
        log_debug("renderer: job channel closed");
        Ok(())
    }

    /// Render one line and return the ticket with the cursor on the next row.
    pub(super) fn render_job(&mut self, job: RenderJob) -> RenderTicket {
        let RenderJob {
            ticket: RenderTicket { mut context },
            line_len,
        } = job;
        let rendered = self.render_line(&mut context);
        if rendered != line_len {
            tracing::debug!(line_len, rendered, "rendered pattern count differs from line length");
        }
        // A pending Terminate must survive; the key reader is about to act on it.
        self.key_control
            .post_unless(Control::Reset, |pending| *pending == Control::Terminate);
        context.next_row();
        tracing::info!(rendered, row = context.cursor().row, "line rendered");
        RenderTicket { context }
    }

    /// Run the Waiting/Rendering state machine until no pattern arrives in time.
    fn render_line(&mut self, context: &mut RenderContext) -> usize {
        let mut rendered = 0usize;
        let mut state = RenderState::Waiting;
        loop {
            state = match state {
                RenderState::Waiting => match self.patterns.recv_timeout(self.timing.render_idle) {
                    Ok(pattern) => RenderState::Rendering(pattern),
                    Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                        RenderState::Terminated
                    }
                },
                RenderState::Rendering(pattern) => {
                    self.blink(pattern, context);
                    rendered += 1;
                    thread::sleep(self.timing.pattern_gap);
                    RenderState::Waiting
                }
                RenderState::Terminated => return rendered,
            };
        }
    }

    fn blink(&mut self, pattern: MorsePattern, context: &mut RenderContext) {
        for token in morse::tokens(pattern) {
            let at = context.advance();
            let drawn = self.screen.put_glyph(at, token.glyph());
            report("glyph", drawn);
            match token {
                Token::Dot => self.pulse(self.timing.dot),
                Token::Dash => self.pulse(self.timing.dash()),
                Token::Gap => {
                    let drawn = self.screen.set_lamp(false);
                    report("lamp off", drawn);
                    thread::sleep(self.timing.dot);
                }
            }
        }
    }

    /// Lamp on for `on`, then off for one dot.
    fn pulse(&mut self, on: std::time::Duration) {
        let drawn = self.screen.set_lamp(true);
        report("lamp on", drawn);
        thread::sleep(on);
        let drawn = self.screen.set_lamp(false);
        report("lamp off", drawn);
        thread::sleep(self.timing.dot);
    }
}

fn report(what: &str, result: io::Result<()>) {
    if let Err(err) = result {
        log_debug(&format!("renderer: {what} failed: {err}"));
    }
}
