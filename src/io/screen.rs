use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};

/// Row of the lamp inside the startup frame.
pub const LAMP_ROW: u16 = 2;

/// First cell of the dot/dash readout, just below the frame.
pub const READOUT_ORIGIN: Cell = Cell { column: 2, row: 4 };

const FRAME: [&str; 3] = [
    "╔═════════════════╗",
    "║                 ║",
    "╚═════════════════╝",
];
const LAMP_GLYPH: char = '⬤';

/// 1-based terminal cell, the way escape sequences count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub column: u16,
    pub row: u16,
}

impl Cell {
    fn move_to(self) -> MoveTo {
        MoveTo(self.column.saturating_sub(1), self.row.saturating_sub(1))
    }
}

/// Display sink for the blink sequence and its readout.
///
/// Clones share the same underlying output.
pub trait Screen: Clone + Send + 'static {
    fn draw_frame(&mut self) -> io::Result<()>;
    fn set_lamp(&mut self, lit: bool) -> io::Result<()>;
    fn put_glyph(&mut self, at: Cell, glyph: char) -> io::Result<()>;
    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()>;
}

/// Lamp and readout drawn on stdout with crossterm escapes.
#[derive(Debug, Clone, Copy)]
pub struct TerminalScreen {
    lamp: Cell,
    color: Color,
}

impl TerminalScreen {
    pub fn new(lamp_column: u16, color: Color) -> Self {
        Self {
            lamp: Cell {
                column: lamp_column,
                row: LAMP_ROW,
            },
            color,
        }
    }
}

impl Screen for TerminalScreen {
    fn draw_frame(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        queue!(stdout, Clear(ClearType::All), Hide)?;
        for (row, line) in (0u16..).zip(FRAME) {
            queue!(stdout, MoveTo(0, row), Print(line))?;
        }
        stdout.flush()
    }

    fn set_lamp(&mut self, lit: bool) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if lit {
            queue!(
                stdout,
                self.lamp.move_to(),
                SetForegroundColor(self.color),
                Print(LAMP_GLYPH),
                ResetColor
            )?;
        } else {
            queue!(
                stdout,
                self.lamp.move_to(),
                SetForegroundColor(Color::Black),
                Print(' '),
                ResetColor
            )?;
        }
        stdout.flush()
    }

    fn put_glyph(&mut self, at: Cell, glyph: char) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        queue!(stdout, at.move_to(), Print(glyph))?;
        stdout.flush()
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if visible {
            queue!(stdout, Show)?;
        } else {
            queue!(stdout, Hide)?;
        }
        stdout.flush()
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScreenEvent {
    Frame,
    Lamp(bool),
    Glyph { at: Cell, glyph: char },
    Cursor(bool),
}

/// Screen that records what would have been drawn, with timestamps.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingScreen {
    events: std::sync::Arc<std::sync::Mutex<Vec<(std::time::Instant, ScreenEvent)>>>,
}

#[cfg(test)]
impl RecordingScreen {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: ScreenEvent) {
        crate::lock_or_recover(&self.events, "recording screen")
            .push((std::time::Instant::now(), event));
    }

    pub(crate) fn events(&self) -> Vec<ScreenEvent> {
        self.timed_events().into_iter().map(|(_, e)| e).collect()
    }

    pub(crate) fn timed_events(&self) -> Vec<(std::time::Instant, ScreenEvent)> {
        crate::lock_or_recover(&self.events, "recording screen").clone()
    }

    /// Readout glyphs in drawing order.
    pub(crate) fn glyphs(&self) -> Vec<(Cell, char)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ScreenEvent::Glyph { at, glyph } => Some((at, glyph)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn readout(&self) -> String {
        self.glyphs().into_iter().map(|(_, glyph)| glyph).collect()
    }
}

#[cfg(test)]
impl Screen for RecordingScreen {
    fn draw_frame(&mut self) -> io::Result<()> {
        self.push(ScreenEvent::Frame);
        Ok(())
    }

    fn set_lamp(&mut self, lit: bool) -> io::Result<()> {
        self.push(ScreenEvent::Lamp(lit));
        Ok(())
    }

    fn put_glyph(&mut self, at: Cell, glyph: char) -> io::Result<()> {
        self.push(ScreenEvent::Glyph { at, glyph });
        Ok(())
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
        self.push(ScreenEvent::Cursor(visible));
        Ok(())
    }
}
