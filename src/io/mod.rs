//! Adapters between the pipeline and the outside world: where bytes come
//! from and where the lamp is drawn.

mod screen;
mod source;

#[cfg(test)]
pub(crate) use screen::{RecordingScreen, ScreenEvent};
pub use screen::{Cell, Screen, TerminalScreen, LAMP_ROW, READOUT_ORIGIN};
pub use source::{KeyRead, KeySource, ScriptedKeySource, StdinKeySource};
