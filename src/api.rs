//! Blocking convenience wrappers around the engine's non-blocking API.
//!
//! "Blocking" means exactly what it does in the underlying engine: call
//! the non-blocking counterpart once, then spin `do_events()` until the
//! task leaves its initial state. Nothing here reads a wall clock
//! itself — callers thread `now` through the same closure their own main
//! loop would use, so these wrappers work identically on a host or a
//! microcontroller's free-running timer.

use heapless::Vec as HeaplessVec;

use crate::config::MAX_FRAME_LEN;
use crate::engine::{Engine, RxConfig};
use crate::error::Status;
use crate::phy::Radio;
use crate::task::pool::TaskId;
use crate::time::Instant;

/// A delivered frame, copied out of the task that received it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: HeaplessVec<u8, MAX_FRAME_LEN>,
    pub sender: u8,
}

/// Send `payload` to `destination`, spinning `do_events()` until the
/// schedule completes (and, if `want_ack`, until an ACK arrives or the
/// schedule gives up waiting for one).
///
/// Returns `OK` iff an ACK was received when one was requested, `OK` with
/// the radio driver's own return code when none was requested,
/// `SEND_NO_ACK_RCVD` if the schedule expired unacked, or whatever
/// configuration/resource error `send_noblock` itself reported.
pub fn send_blocking<R: Radio>(
    engine: &mut Engine<R>,
    destination: u8,
    payload: &[u8],
    want_ack: bool,
    mut now: impl FnMut() -> Instant,
) -> (Status, u8) {
    let (task_id, status) = engine.send_noblock(destination, payload, want_ack, now());
    let Some(task_id) = task_id else {
        return (status, 0);
    };
    loop {
        engine.do_events(now());
        let (status, transmit_count) = engine.send_get_final_status(task_id);
        if status != Status::TaskUnderway {
            return (status, transmit_count);
        }
    }
}

/// Wait for one frame matching `rx`, spinning `do_events()` until it
/// arrives or the configured timeout elapses.
///
/// Returns the delivered payload and sender, or `TIMEOUT` / whatever
/// resource error `receive_noblock` reported up front.
pub fn receive_blocking<R: Radio>(
    engine: &mut Engine<R>,
    rx: RxConfig,
    mut now: impl FnMut() -> Instant,
) -> Result<Delivery, Status> {
    let (task_id, status) = engine.receive_noblock(rx, now());
    let task_id = task_id.ok_or(status)?;
    loop {
        let t = now();
        engine.do_events(t);
        match engine.task_get_status(task_id) {
            Status::TaskUnderway => continue,
            Status::Timeout => return Err(Status::Timeout),
            _ => {
                if let Some((payload, sender)) = engine.receive_retrieve(task_id, t) {
                    return Ok(Delivery { payload, sender });
                }
            }
        }
    }
}

/// Poll without blocking: run one tick and report the task's current
/// status. Lets an application keep its own event loop and only reach for
/// [`send_blocking`]/[`receive_blocking`] where convenient.
pub fn poll_status<R: Radio>(engine: &mut Engine<R>, task_id: TaskId, now: Instant) -> Status {
    engine.do_events(now);
    engine.task_get_status(task_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::phy::LoopbackRadio;
    use crate::task::schedule;
    use crate::time::Duration;
    use crate::wire::{Flags, Repr};
    use crate::pkbuf::PacketBuffer;

    /// Neither endpoint has a real interrupt line; a polling test drives
    /// `do_events` by just always signalling before every tick.
    fn ticking_clock(start: Instant) -> impl FnMut() -> Instant {
        let mut clock = start;
        move || {
            clock += Duration::from_millis(1);
            clock
        }
    }

    #[test]
    fn blocking_send_without_ack_runs_the_full_schedule() {
        let mut radios = LoopbackRadio::network(1, 64);
        let mut engine = Engine::new(radios.pop().unwrap(), Config::new(0x0B), Instant::ZERO).unwrap();
        let mut clock = ticking_clock(Instant::ZERO);

        let (status, count) = send_blocking(&mut engine, 0x5E, b"hi\0", false, &mut clock);
        assert_eq!(status, Status::Ok);
        assert_eq!(count, schedule::SND.len() as u8);
    }

    #[test]
    fn blocking_receive_returns_a_frame_already_queued() {
        let mut radios = LoopbackRadio::network(2, 64);
        let mut peer = radios.pop().unwrap();
        let mut engine = Engine::new(radios.pop().unwrap(), Config::new(0x5E), Instant::ZERO).unwrap();

        let mut frame = PacketBuffer::new();
        let repr = Repr {
            destination: 0x5E,
            source: 0x0B,
            flags: Flags {
                sin: false,
                ack: false,
                seq: 0,
            },
            packet_id: 1,
            payload_len: 2,
        };
        frame.prepare_for_send(repr, b"hi").unwrap();
        peer.device_send(frame.as_bytes());

        // Simulates the data-ready ISR firing once data is already on the
        // medium, ahead of the blocking call driving the engine forward.
        engine.signal_interrupt();
        let delivery = receive_blocking(&mut engine, RxConfig::default(), ticking_clock(Instant::ZERO)).unwrap();
        assert_eq!(&delivery.payload[..], b"hi");
        assert_eq!(delivery.sender, 0x0B);
    }

    #[test]
    fn blocking_receive_times_out_with_no_traffic() {
        let mut radios = LoopbackRadio::network(1, 64);
        let mut engine = Engine::new(radios.pop().unwrap(), Config::new(0x5E), Instant::ZERO).unwrap();
        let rx = RxConfig {
            sender: None,
            timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let status = receive_blocking(&mut engine, rx, ticking_clock(Instant::ZERO)).unwrap_err();
        assert_eq!(status, Status::Timeout);
    }
}
