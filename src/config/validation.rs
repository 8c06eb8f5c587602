use super::defaults::{
    MAX_BACKOFF_MS, MAX_DOT_MS, MAX_LAMP_COLUMN, MAX_PATTERN_GAP_MS, MAX_POLL_MS,
    MAX_QUEUE_CAPACITY, MAX_RENDER_IDLE_MS, MIN_LAMP_COLUMN, MIN_RENDER_IDLE_MS,
};
use super::AppConfig;
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values against the bounds the workers rely on.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DOT_MS).contains(&self.dot_ms) {
            bail!(
                "--dot-ms must be between 1 and {MAX_DOT_MS}, got {}",
                self.dot_ms
            );
        }
        if self.pattern_gap_ms > MAX_PATTERN_GAP_MS {
            bail!(
                "--pattern-gap-ms must be at most {MAX_PATTERN_GAP_MS}, got {}",
                self.pattern_gap_ms
            );
        }
        if !(MIN_RENDER_IDLE_MS..=MAX_RENDER_IDLE_MS).contains(&self.render_idle_ms) {
            bail!(
                "--render-idle-ms must be between {MIN_RENDER_IDLE_MS} and {MAX_RENDER_IDLE_MS}, got {}",
                self.render_idle_ms
            );
        }
        if !(1..=MAX_POLL_MS).contains(&self.poll_ms) {
            bail!(
                "--poll-ms must be between 1 and {MAX_POLL_MS}, got {}",
                self.poll_ms
            );
        }
        if !(1..=MAX_BACKOFF_MS).contains(&self.backoff_ms) {
            bail!(
                "--backoff-ms must be between 1 and {MAX_BACKOFF_MS}, got {}",
                self.backoff_ms
            );
        }
        // A zero-capacity queue is a rendezvous channel; try_send would never succeed.
        if !(1..=MAX_QUEUE_CAPACITY).contains(&self.queue_capacity) {
            bail!(
                "--queue-capacity must be between 1 and {MAX_QUEUE_CAPACITY}, got {}",
                self.queue_capacity
            );
        }
        if !(MIN_LAMP_COLUMN..=MAX_LAMP_COLUMN).contains(&self.lamp_column) {
            bail!(
                "--lamp-column must be between {MIN_LAMP_COLUMN} and {MAX_LAMP_COLUMN}, got {}",
                self.lamp_column
            );
        }
        validate_sentinel(self.sentinel)?;
        Ok(())
    }
}

fn validate_sentinel(sentinel: char) -> Result<()> {
    if !sentinel.is_ascii_graphic() {
        bail!("--sentinel must be a printable ASCII character, got {sentinel:?}");
    }
    if sentinel.is_ascii_alphanumeric() {
        bail!("--sentinel cannot be a letter or digit, got {sentinel:?}");
    }
    Ok(())
}
