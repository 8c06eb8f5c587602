pub const DEFAULT_DOT_MS: u64 = 500;
pub const DEFAULT_PATTERN_GAP_MS: u64 = 1000;
pub const DEFAULT_RENDER_IDLE_MS: u64 = 200;
pub const DEFAULT_POLL_MS: u64 = 100;
pub const DEFAULT_BACKOFF_MS: u64 = 500;
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;
pub const DEFAULT_LAMP_COLUMN: u16 = 6;
pub const DEFAULT_SENTINEL: char = '*';

pub(super) const MAX_DOT_MS: u64 = 5_000;
pub(super) const MAX_PATTERN_GAP_MS: u64 = 10_000;
pub(super) const MIN_RENDER_IDLE_MS: u64 = 10;
pub(super) const MAX_RENDER_IDLE_MS: u64 = 10_000;
pub(super) const MAX_POLL_MS: u64 = 1_000;
pub(super) const MAX_BACKOFF_MS: u64 = 10_000;
pub(super) const MAX_QUEUE_CAPACITY: usize = 4_096;
/// The lamp sits inside the 19-column frame drawn at startup.
pub(super) const MIN_LAMP_COLUMN: u16 = 2;
pub(super) const MAX_LAMP_COLUMN: u16 = 18;
