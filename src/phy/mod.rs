//! The radio-driver boundary.
//!
//! A half-duplex packet radio exposes a small synchronous surface: four
//! calls plus two interrupt controls. [`Radio`] is that surface, generic
//! so the engine never depends on a concrete transceiver.

pub mod loopback;

use crate::time::Instant;

pub use self::loopback::LoopbackRadio;

/// One of the three configuration options a radio driver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOption<'a> {
    /// Set the device's own hardware address (1 byte).
    Address(u8),
    /// Disable (`true`) or re-enable (`false`) the hardware destination
    /// filter so frames for any address are received.
    SnifMode(bool),
    /// Low (`false`) or high (`true`) transmit power.
    EmissionPower(bool),
    /// Anything a concrete driver supports beyond the three named above.
    Other(&'a [u8]),
}

/// The engine's binding to a concrete half-duplex radio transceiver.
///
/// All methods are synchronous and must not block past what the hardware
/// itself takes — `do_events()` calls these directly from its tick, never
/// from an interrupt context.
pub trait Radio {
    /// Bring the hardware up and report the largest frame it can carry
    /// (header included). `reset_only` re-arms a previously initialized
    /// device without reapplying configuration — used after a
    /// reset-on-ACK-failure.
    ///
    /// Returns `None` if the hardware failed to come up
    /// (`DEVICE_NOT_REGISTERED`).
    fn device_init(&mut self, reset_only: bool) -> Option<usize>;

    /// Transmit one frame synchronously. Returns `0` on success, any other
    /// byte is a driver-specific error code.
    fn device_send(&mut self, frame: &[u8]) -> u8;

    /// Non-blocking drain of one pending frame into `buf`. Returns the
    /// number of bytes written, `0` if nothing was pending.
    fn device_receive(&mut self, buf: &mut [u8]) -> usize;

    fn device_set_option(&mut self, option: ConfigOption<'_>);

    /// Arm the data-ready interrupt.
    fn arm_interrupt(&mut self);

    /// Disarm the data-ready interrupt.
    fn disarm_interrupt(&mut self);

    /// Park the radio in its lowest-power mode. Default no-op: not every
    /// transceiver has one, and the engine only calls this when
    /// [`crate::config::Config::auto_sleep`] is set.
    fn sleep(&mut self, _now: Instant) {}
}
