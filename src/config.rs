//! Crate-wide tunables.
//!
//! Collecting every compile-time constant here, the way the interface layer
//! elsewhere reaches for `crate::config::IFACE_NEIGHBOR_CACHE_COUNT`, keeps
//! the retransmission grids and capacity limits in one place that a port to
//! a new board only has to touch once.

use crate::time::Duration;

/// Size of the fixed header: destination (1) + source (1) + flags (1) +
/// packet-id (2) + length (1).
pub const HEADER_LEN: usize = 6;

/// Destination address reserved for broadcast; never expects an ACK.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Upper bound on a frame the engine will ever build or accept, header
/// included. Concrete radios report a smaller `max_data_len` at
/// `device_init` time; this is just the buffer the engine allocates.
pub const MAX_FRAME_LEN: usize = 72;

/// Number of duplicate-cache entries (one source address per entry).
pub const CACHE_CAPACITY: usize = 10;

/// Age after which a duplicate-cache entry is evicted regardless of
/// pressure (~49 hours).
pub const CACHE_DISCARD_DELAY: Duration = Duration::from_millis(176_400_000);

/// Number of concurrently in-flight send/receive tasks.
pub const TASK_POOL_CAPACITY: usize = 15;

/// Minimum time between two radio-reinitialize requests triggered by ACK
/// failures.
pub const MIN_DEVICE_RESET_DELAY: Duration = Duration::from_millis(1_000);

/// Default time a delivered-but-unretrieved frame stays available before
/// `RECEIVE_TIMEDOUT`.
pub const DEFAULT_DATA_AVAIL_DELAY: Duration = Duration::from_millis(900);

/// Default grace period a completed receive task lingers (re-ACKing
/// retransmitted duplicates) before `FINISHED`.
pub const DEFAULT_RECEIVE_PURGE_DELAY: Duration = Duration::from_millis(1_000);

/// Default grace period a completed send task lingers before `FINISHED`.
pub const DEFAULT_SEND_PURGE_DELAY: Duration = Duration::from_millis(1_000);

/// Host-tunable knobs threaded through [`crate::engine::Engine::new`].
///
/// Defaults match the values above; only the retransmission grids
/// themselves (`SND`, `SND_EXPACK`, `SND_ACK` in
/// [`crate::task::schedule`]) are fixed, not runtime-configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub own_address: u8,
    pub data_avail_delay: Duration,
    pub receive_purge_delay: Duration,
    pub send_purge_delay: Duration,
    pub min_device_reset_delay: Duration,
    /// Enable parking the radio in its deepest sleep mode when the only
    /// outstanding work is passive listening.
    pub auto_sleep: bool,
}

impl Config {
    pub const fn new(own_address: u8) -> Self {
        Config {
            own_address,
            data_avail_delay: DEFAULT_DATA_AVAIL_DELAY,
            receive_purge_delay: DEFAULT_RECEIVE_PURGE_DELAY,
            send_purge_delay: DEFAULT_SEND_PURGE_DELAY,
            min_device_reset_delay: MIN_DEVICE_RESET_DELAY,
            auto_sleep: false,
        }
    }
}
