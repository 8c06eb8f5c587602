//! MorseTerm entrypoint: draws the lamp frame and runs the pipeline until the
//! sentinel key is typed.
//!
//! # Architecture
//!
//! - Key reader: polls the keyboard in raw mode
//! - Line accumulator: filters keystrokes and detects line ends
//! - Decoder: turns each finished line into Morse patterns
//! - Renderer: blinks the lamp and writes the dot/dash readout

use anyhow::{Context, Result};
use morseterm::config::AppConfig;
use morseterm::io::{Screen, ScriptedKeySource, StdinKeySource, TerminalScreen};
use morseterm::pipeline::{Pipeline, PipelineSettings};
use morseterm::telemetry::init_tracing;
use morseterm::terminal_restore::TerminalRestoreGuard;
use morseterm::{init_logging, log_debug, log_file_path};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);
    log_debug("=== MorseTerm Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let settings = PipelineSettings::from_config(&config);
    let mut screen = TerminalScreen::new(config.lamp_column, config.lamp_color.color());

    // Restores the terminal when main returns, and on panic through its hook.
    let _terminal_guard = TerminalRestoreGuard::new();
    screen
        .draw_frame()
        .context("failed to draw the lamp frame")?;

    let pipeline = match config.script_bytes() {
        Some(script) => {
            log_debug(&format!("running script of {} bytes", script.len()));
            Pipeline::spawn(ScriptedKeySource::new(script), screen, settings)?
        }
        None => Pipeline::spawn(StdinKeySource::new(), screen, settings)?,
    };
    pipeline.wait()?;

    log_debug("=== MorseTerm Exiting ===");
    Ok(())
}
