use crate::log_debug;
use crate::terminal_restore::TerminalRestoreGuard;
use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Outcome of one attempt to read a keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRead {
    Byte(u8),
    /// Nothing arrived within the timeout.
    Idle,
    /// The source is exhausted and will never produce another byte.
    Closed,
}

/// Byte source polled by the key reader.
///
/// `activate` and `restore` bracket the reader's lifetime so a source can
/// reconfigure the device it reads from and put it back afterwards.
pub trait KeySource: Send + 'static {
    fn activate(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<KeyRead>;

    fn restore(&mut self) {}
}

/// Keyboard on stdin, switched to raw mode while the reader runs.
#[derive(Default)]
pub struct StdinKeySource {
    guard: Option<TerminalRestoreGuard>,
}

impl StdinKeySource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeySource for StdinKeySource {
    fn activate(&mut self) -> io::Result<()> {
        let guard = TerminalRestoreGuard::new();
        guard.enable_raw_mode()?;
        self.guard = Some(guard);
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<KeyRead> {
        let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        let mut fds = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: `fds` is a valid pollfd for the duration of the call.
        let ready = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(KeyRead::Idle);
            }
            return Err(err);
        }
        if ready == 0 {
            return Ok(KeyRead::Idle);
        }

        let mut byte = 0u8;
        // SAFETY: reading at most one byte into a valid one-byte buffer.
        let n = unsafe { libc::read(libc::STDIN_FILENO, (&mut byte as *mut u8).cast(), 1) };
        match n {
            1 => Ok(KeyRead::Byte(byte)),
            0 => Ok(KeyRead::Closed),
            _ => {
                let err = io::Error::last_os_error();
                if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) {
                    Ok(KeyRead::Idle)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn restore(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.restore();
            log_debug("stdin restored from raw mode");
        }
    }
}

/// Replays a fixed byte sequence, for `--script` runs and tests.
pub struct ScriptedKeySource {
    bytes: VecDeque<u8>,
    hold_open: bool,
    restored: Arc<AtomicBool>,
}

impl ScriptedKeySource {
    /// Source that reports `Closed` once `bytes` are used up.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into().into(),
            hold_open: false,
            restored: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Keep reporting `Idle` after the script ends, like a quiet keyboard.
    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Flag set once the reader has called `restore`.
    pub fn restored_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.restored)
    }
}

impl KeySource for ScriptedKeySource {
    fn read_byte(&mut self, timeout: Duration) -> io::Result<KeyRead> {
        if let Some(byte) = self.bytes.pop_front() {
            return Ok(KeyRead::Byte(byte));
        }
        if self.hold_open {
            thread::sleep(timeout);
            return Ok(KeyRead::Idle);
        }
        Ok(KeyRead::Closed)
    }

    fn restore(&mut self) {
        self.restored.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_source_replays_then_closes() {
        let mut source = ScriptedKeySource::new(b"AB".to_vec());
        let timeout = Duration::from_millis(1);
        assert_eq!(source.read_byte(timeout).unwrap(), KeyRead::Byte(b'A'));
        assert_eq!(source.read_byte(timeout).unwrap(), KeyRead::Byte(b'B'));
        assert_eq!(source.read_byte(timeout).unwrap(), KeyRead::Closed);
    }

    #[test]
    fn held_open_source_goes_idle() {
        let mut source = ScriptedKeySource::new(Vec::new()).held_open();
        assert_eq!(
            source.read_byte(Duration::from_millis(1)).unwrap(),
            KeyRead::Idle
        );
    }

    #[test]
    fn restore_sets_flag() {
        let mut source = ScriptedKeySource::new(Vec::new());
        let flag = source.restored_flag();
        assert!(!flag.load(Ordering::SeqCst));
        source.restore();
        assert!(flag.load(Ordering::SeqCst));
    }
}
