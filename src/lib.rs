//! A link-layer protocol engine for half-duplex packet radios.
//!
//! Framing, addressing, scheduled retransmission, duplicate suppression,
//! and a cooperative task scheduler sit between a raw [`phy::Radio`] driver
//! and an application that wants to send and receive addressed frames
//! without hand-rolling ACK bookkeeping. Everything here is allocation-free
//! and built to run from a single `do_events()` pump call, on or off a
//! real-time OS.
//!
//! Module map:
//!  * [`wire`] — the six-byte header, parsed and built without copying.
//!  * [`pkbuf`] — the fixed-size frame buffer tasks and the engine share.
//!  * [`cache`] — per-source duplicate suppression.
//!  * [`task`] — the send/receive state machine and its pool.
//!  * [`phy`] — the trait a concrete radio driver implements.
//!  * [`engine`] — ties the above together around one `do_events()` tick.
//!  * [`api`] — blocking convenience wrappers around the engine.
//!  * [`config`] — compile-time tunables and the runtime [`config::Config`].
//!  * [`error`] — the [`error::Status`] codes returned across the API.
//!  * [`time`] — wraparound-tolerant millisecond `Instant`/`Duration`.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod phy;
pub mod pkbuf;
pub mod task;
pub mod time;
pub mod wire;
