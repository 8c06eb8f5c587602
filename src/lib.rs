//! MorseTerm: type a line, watch it blink as Morse code.
//!
//! The crate is a small pipeline of threads. See [`pipeline`] for how the
//! workers hand bytes forward and control back.

pub mod config;
pub mod gate;
pub mod io;
mod lock;
mod logging;
pub mod morse;
pub mod pipeline;
pub mod signal;
pub mod telemetry;
pub mod terminal_restore;

pub(crate) use lock::lock_or_recover;
pub use logging::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
};
