//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use crossterm::style::Color;
use std::time::Duration;

pub use defaults::{
    DEFAULT_BACKOFF_MS, DEFAULT_DOT_MS, DEFAULT_LAMP_COLUMN, DEFAULT_PATTERN_GAP_MS,
    DEFAULT_POLL_MS, DEFAULT_QUEUE_CAPACITY, DEFAULT_RENDER_IDLE_MS, DEFAULT_SENTINEL,
};

/// CLI options for MorseTerm. Validated values keep the worker timings sane.
#[derive(Debug, Parser, Clone)]
#[command(
    about = "MorseTerm: type a line, watch it blink in Morse code",
    author,
    version
)]
pub struct AppConfig {
    /// Length of one Morse dot (milliseconds); a dash lasts three dots
    #[arg(long = "dot-ms", default_value_t = DEFAULT_DOT_MS)]
    pub dot_ms: u64,

    /// Pause after each rendered character (milliseconds)
    #[arg(long = "pattern-gap-ms", default_value_t = DEFAULT_PATTERN_GAP_MS)]
    pub pattern_gap_ms: u64,

    /// How long the renderer waits for another pattern before ending the line (milliseconds)
    #[arg(long = "render-idle-ms", default_value_t = DEFAULT_RENDER_IDLE_MS)]
    pub render_idle_ms: u64,

    /// Keyboard poll timeout while idle (milliseconds)
    #[arg(long = "poll-ms", default_value_t = DEFAULT_POLL_MS)]
    pub poll_ms: u64,

    /// Delay before retrying a keystroke when the key queue is full (milliseconds)
    #[arg(long = "backoff-ms", default_value_t = DEFAULT_BACKOFF_MS)]
    pub backoff_ms: u64,

    /// Capacity of each pipeline queue (keys, line, patterns)
    #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Lamp color
    #[arg(long = "lamp-color", value_enum, default_value_t = LampColor::Yellow)]
    pub lamp_color: LampColor,

    /// Column of the lamp inside the frame
    #[arg(long = "lamp-column", default_value_t = DEFAULT_LAMP_COLUMN)]
    pub lamp_column: u16,

    /// Key that shuts the program down
    #[arg(long = "sentinel", default_value_t = DEFAULT_SENTINEL)]
    pub sentinel: char,

    /// Feed this text instead of reading the keyboard (`\n` ends a line)
    #[arg(long = "script", value_name = "TEXT")]
    pub script: Option<String>,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "MORSETERM_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "MORSETERM_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging typed characters (debug log only)
    #[arg(
        long = "log-content",
        env = "MORSETERM_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,
}

impl AppConfig {
    pub fn logging_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }

    /// Worker timings derived from the validated CLI values.
    pub fn timing(&self) -> Timing {
        Timing {
            dot: Duration::from_millis(self.dot_ms),
            pattern_gap: Duration::from_millis(self.pattern_gap_ms),
            render_idle: Duration::from_millis(self.render_idle_ms),
            poll: Duration::from_millis(self.poll_ms),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    /// Sentinel as a byte; `validate` guarantees it is ASCII.
    pub fn sentinel_byte(&self) -> u8 {
        u8::try_from(self.sentinel).unwrap_or(DEFAULT_SENTINEL as u8)
    }

    /// Script text with `\n` and `\r` escapes expanded.
    pub fn script_bytes(&self) -> Option<Vec<u8>> {
        self.script
            .as_deref()
            .map(|text| unescape_script(text).into_bytes())
    }
}

fn unescape_script(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Durations shared by the pipeline workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub dot: Duration,
    pub pattern_gap: Duration,
    pub render_idle: Duration,
    pub poll: Duration,
    pub backoff: Duration,
}

impl Timing {
    pub fn dash(&self) -> Duration {
        self.dot * 3
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            dot: Duration::from_millis(DEFAULT_DOT_MS),
            pattern_gap: Duration::from_millis(DEFAULT_PATTERN_GAP_MS),
            render_idle: Duration::from_millis(DEFAULT_RENDER_IDLE_MS),
            poll: Duration::from_millis(DEFAULT_POLL_MS),
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LampColor {
    Yellow,
    Red,
    Green,
    Blue,
    White,
}

impl LampColor {
    pub fn color(self) -> Color {
        match self {
            LampColor::Yellow => Color::Yellow,
            LampColor::Red => Color::Red,
            LampColor::Green => Color::Green,
            LampColor::Blue => Color::Blue,
            LampColor::White => Color::White,
        }
    }
}
