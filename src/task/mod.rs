//! One in-flight send or receive activity.
//!
//! A [`Task`] owns its own [`PacketBuffer`] exclusively — no aliasing with
//! the engine's scratch buffer — and walks the state machine below, driven
//! entirely by the two calls [`Task::on_frame`] and [`Task::on_timer`] the
//! engine's tick makes into it.

pub mod pool;
pub mod schedule;

use crate::pkbuf::PacketBuffer;
use crate::time::{Duration, Instant};
use crate::wire::{Flags, Repr};

use self::schedule::Schedule;

/// An optional receive-completion hook: called with the delivered payload
/// and its sender the moment a RECEIVE task reaches
/// `RECEIVE_DATA_AVAILABLE`, in addition to (not instead of) polling via
/// `receive_peek`/`receive_retrieve`. A bare function pointer, not a boxed
/// closure — the engine never allocates.
pub type RxCallback = fn(&[u8], u8);

/// A task's current state. `Finished` is transient: the pool destroys any
/// task found in this state at the end of the tick that produced it, it is
/// never observed across two ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Send,
    SendDone,
    Receive,
    ReceiveDataAvailable,
    ReceiveDataRetrieved,
    ReceiveTimedOut,
    Finished,
}

/// What a task asks the engine to do in response to one frame or timer
/// event. At most one of each per call — a task only ever triggers a
/// single transmit and a single reset request per tick.
#[derive(Debug, Default)]
pub struct Outcome {
    /// The frame was consumed — no other task should see it this tick.
    pub consumed: bool,
    /// A frame the engine should hand to the radio driver.
    pub transmit: Option<PacketBuffer>,
    /// Spawn a fresh ACK-send task for (destination, packet_id). Per the
    /// ordering guarantee that ACKs are "scheduled as a fresh task", this
    /// never fires on the same tick it is requested.
    pub spawn_ack: Option<(u8, u16)>,
    /// The retransmission schedule ran out without an ACK; request a radio
    /// reset (subject to the engine's reset-throttling).
    pub request_reset: bool,
}

/// A send task's payload, ready for the application to learn the outcome,
/// or a receive task's delivered frame, ready to retrieve.
#[derive(Debug)]
pub struct Task {
    id: u16,
    state: State,
    buffer: PacketBuffer,
    own_address: u8,
    /// For SEND: the destination. For RECEIVE, set once a frame is
    /// delivered: the sender.
    peer: u8,
    packet_id: u16,
    need_ack: bool,
    has_received_ack: bool,
    sin_requested: bool,
    /// Fire-and-forget: nobody holds this task's id to call
    /// `send_get_final_status` on it, so it need not linger in
    /// `SEND_DONE` for `send_purge_delay` once its schedule exhausts.
    /// Set on engine-spawned ACK tasks ([`Task::new_ack`]).
    unattended: bool,
    schedule: Schedule,
    /// Reference timestamp the schedule's offsets are relative to.
    reference: Instant,
    deadline: Instant,
    last_send_status: u8,
    sender_filter: Option<u8>,
    configured_timeout: Option<Duration>,
    data_avail_delay: Duration,
    receive_purge_delay: Duration,
    send_purge_delay: Duration,
    rxcallback: Option<RxCallback>,
}

impl Task {
    pub fn new_send(
        id: u16,
        own_address: u8,
        destination: u8,
        payload: &[u8],
        want_ack: bool,
        packet_id: u16,
        now: Instant,
        send_purge_delay: Duration,
    ) -> crate::wire::Result<Task> {
        let mut buffer = PacketBuffer::new();
        let repr = Repr {
            destination,
            source: own_address,
            flags: Flags {
                sin: want_ack,
                ack: false,
                seq: 0,
            },
            packet_id,
            payload_len: payload.len() as u8,
        };
        buffer.prepare_for_send(repr, payload)?;

        let schedule = if want_ack {
            Schedule::send_expect_ack()
        } else {
            Schedule::send()
        };

        Ok(Task {
            id,
            state: State::Send,
            buffer,
            own_address,
            peer: destination,
            packet_id,
            need_ack: want_ack,
            has_received_ack: false,
            sin_requested: false,
            unattended: false,
            deadline: now + schedule.current_offset(),
            reference: now,
            schedule,
            last_send_status: 0,
            sender_filter: None,
            configured_timeout: None,
            data_avail_delay: Duration::ZERO,
            receive_purge_delay: Duration::ZERO,
            send_purge_delay,
            rxcallback: None,
        })
    }

    pub fn new_ack(
        id: u16,
        own_address: u8,
        destination: u8,
        packet_id: u16,
        now: Instant,
        send_purge_delay: Duration,
    ) -> crate::wire::Result<Task> {
        let mut buffer = PacketBuffer::new();
        let repr = Repr {
            destination,
            source: own_address,
            flags: Flags {
                sin: false,
                ack: true,
                seq: 0,
            },
            packet_id,
            payload_len: 0,
        };
        buffer.prepare_for_send(repr, &[])?;

        let schedule = Schedule::send_ack();
        Ok(Task {
            id,
            state: State::Send,
            buffer,
            own_address,
            peer: destination,
            packet_id,
            need_ack: false,
            has_received_ack: false,
            sin_requested: false,
            unattended: true,
            deadline: now + schedule.current_offset(),
            reference: now,
            schedule,
            last_send_status: 0,
            sender_filter: None,
            configured_timeout: None,
            data_avail_delay: Duration::ZERO,
            receive_purge_delay: Duration::ZERO,
            send_purge_delay,
            rxcallback: None,
        })
    }

    pub fn new_receive(
        id: u16,
        sender_filter: Option<u8>,
        configured_timeout: Option<Duration>,
        data_avail_delay: Duration,
        receive_purge_delay: Duration,
        rxcallback: Option<RxCallback>,
        now: Instant,
    ) -> Task {
        Task {
            id,
            state: State::Receive,
            buffer: PacketBuffer::new(),
            own_address: 0,
            peer: 0,
            packet_id: 0,
            need_ack: false,
            has_received_ack: false,
            sin_requested: false,
            unattended: false,
            schedule: Schedule::send_ack(),
            reference: now,
            deadline: now + configured_timeout.unwrap_or(Duration::ZERO),
            last_send_status: 0,
            sender_filter,
            configured_timeout,
            data_avail_delay,
            receive_purge_delay,
            send_purge_delay: Duration::ZERO,
            rxcallback,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn last_send_status(&self) -> u8 {
        self.last_send_status
    }

    pub fn has_received_ack(&self) -> bool {
        self.has_received_ack
    }

    pub fn needs_ack(&self) -> bool {
        self.need_ack
    }

    pub fn set_last_send_status(&mut self, status: u8) {
        self.last_send_status = status;
    }

    /// Transmit count, for diagnostics (`send_get_final_status`'s
    /// `transmit-count`).
    pub fn transmit_count(&self) -> u8 {
        self.schedule.sequence()
    }

    /// Every state but RECEIVE and FINISHED carries a timer subscription.
    pub fn subscribed_to_timer(&self) -> bool {
        match self.state {
            State::Send | State::SendDone => true,
            State::Receive => self.configured_timeout.is_some(),
            State::ReceiveDataAvailable => true,
            State::ReceiveDataRetrieved => true,
            State::ReceiveTimedOut => true,
            State::Finished => false,
        }
    }

    pub fn subscribed_to_frames(&self) -> bool {
        match self.state {
            State::Send => true,
            State::Receive => true,
            State::ReceiveDataRetrieved => true,
            State::SendDone | State::ReceiveDataAvailable | State::ReceiveTimedOut | State::Finished => false,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The frame a delivered RECEIVE task holds, and who sent it.
    pub fn delivered(&self) -> Option<(&[u8], u8)> {
        match self.state {
            State::ReceiveDataAvailable => Some((self.buffer.payload(), self.peer)),
            _ => None,
        }
    }

    /// Application retrieval of a delivered frame:
    /// `RECEIVE_DATA_AVAILABLE -> RECEIVE_DATA_RETRIEVED`. Returns the ACK
    /// spawn request if the sender had set SIN.
    pub fn retrieve(&mut self, now: Instant) -> Option<(u8, u16)> {
        if self.state != State::ReceiveDataAvailable {
            return None;
        }
        self.buffer.shrink_to_header();
        self.state = State::ReceiveDataRetrieved;
        self.deadline = now + self.receive_purge_delay;
        if self.sin_requested {
            Some((self.peer, self.packet_id))
        } else {
            None
        }
    }

    /// Stamp the diagnostic sequence counter into this transmit's flags
    /// byte and hand back a copy ready for `device_send`.
    fn stamp_and_clone(&mut self) -> PacketBuffer {
        self.buffer.set_sequence(self.schedule.sequence());
        self.buffer.clone()
    }

    pub fn on_frame(&mut self, repr: &Repr, raw: &PacketBuffer, already_seen: bool, now: Instant) -> Outcome {
        let mut outcome = Outcome::default();
        match self.state {
            State::Send => {
                if self.need_ack
                    && repr.flags.ack
                    && repr.packet_id == self.packet_id
                    && repr.source == self.peer
                    && repr.destination == self.own_address
                {
                    self.has_received_ack = true;
                    self.buffer.shrink_to_header();
                    self.state = State::SendDone;
                    self.deadline = now + self.send_purge_delay;
                    outcome.consumed = true;
                }
            }
            State::Receive => {
                let accepted = !already_seen
                    && !repr.flags.ack
                    && self.sender_filter.map_or(true, |filter| filter == repr.source);
                if accepted {
                    self.buffer.copy_from(raw);
                    self.peer = repr.source;
                    self.packet_id = repr.packet_id;
                    self.sin_requested = repr.flags.sin;
                    self.state = State::ReceiveDataAvailable;
                    self.deadline = now + self.data_avail_delay;
                    outcome.consumed = true;
                    if let Some(cb) = self.rxcallback {
                        cb(self.buffer.payload(), self.peer);
                    }
                }
            }
            State::ReceiveDataRetrieved => {
                if !repr.flags.ack && repr.source == self.peer && repr.packet_id == self.packet_id {
                    outcome.consumed = true;
                    if self.sin_requested {
                        outcome.spawn_ack = Some((self.peer, self.packet_id));
                    }
                }
            }
            State::SendDone | State::ReceiveDataAvailable | State::ReceiveTimedOut | State::Finished => {
                debug_assert!(false, "on_frame called on a task not subscribed to frames");
            }
        }
        outcome
    }

    pub fn on_timer(&mut self, now: Instant) -> Outcome {
        let mut outcome = Outcome::default();
        match self.state {
            State::Send => {
                if self.schedule.has_more() {
                    if !self.schedule.is_listen_window() {
                        outcome.transmit = Some(self.stamp_and_clone());
                    }
                    self.schedule.advance();
                    self.deadline = self.reference + self.schedule.current_offset();
                } else {
                    if !self.schedule.is_listen_window() {
                        outcome.transmit = Some(self.stamp_and_clone());
                    }
                    self.state = State::SendDone;
                    self.deadline = if self.unattended {
                        now
                    } else {
                        now + self.send_purge_delay
                    };
                }
            }
            State::SendDone => {
                if self.need_ack && !self.has_received_ack {
                    outcome.request_reset = true;
                }
                self.state = State::Finished;
            }
            State::Receive => {
                self.state = State::ReceiveTimedOut;
                self.deadline = now + self.receive_purge_delay.max(Duration::from_millis(1));
            }
            State::ReceiveDataAvailable => {
                self.state = State::ReceiveTimedOut;
                self.deadline = now + self.receive_purge_delay.max(Duration::from_millis(1));
            }
            State::ReceiveDataRetrieved | State::ReceiveTimedOut => {
                self.state = State::Finished;
            }
            State::Finished => {
                debug_assert!(false, "on_timer called on a finished task");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: u8 = 0x0B;
    const PEER: u8 = 0x5E;

    fn purge() -> Duration {
        Duration::from_millis(1_000)
    }

    #[test]
    fn send_without_ack_transmits_every_schedule_slot() {
        let mut task =
            Task::new_send(1, OWN, PEER, b"hi\0", false, 1, Instant::ZERO, purge()).unwrap();
        let mut transmits = 0;
        for _ in 0..schedule::SND.len() {
            let outcome = task.on_timer(task.deadline());
            if outcome.transmit.is_some() {
                transmits += 1;
            }
        }
        assert_eq!(transmits, schedule::SND.len());
        assert_eq!(task.state(), State::SendDone);
    }

    #[test]
    fn send_with_ack_reaches_send_done_on_matching_ack() {
        let mut task =
            Task::new_send(2, OWN, PEER, b"hi\0", true, 7, Instant::ZERO, purge()).unwrap();
        assert!(task.subscribed_to_frames());
        let ack = Repr {
            destination: OWN,
            source: PEER,
            flags: Flags {
                sin: false,
                ack: true,
                seq: 0,
            },
            packet_id: 7,
            payload_len: 0,
        };
        let raw = PacketBuffer::new();
        let outcome = task.on_frame(&ack, &raw, false, Instant::from_millis(10));
        assert!(outcome.consumed);
        assert_eq!(task.state(), State::SendDone);
        assert!(task.has_received_ack());
    }

    #[test]
    fn send_with_ack_requests_reset_when_schedule_exhausts_unacked() {
        let mut task =
            Task::new_send(3, OWN, PEER, b"hi\0", true, 7, Instant::ZERO, purge()).unwrap();
        for _ in 0..schedule::SND_EXPACK.len() {
            task.on_timer(task.deadline());
        }
        assert_eq!(task.state(), State::SendDone);
        let outcome = task.on_timer(task.deadline());
        assert!(outcome.request_reset);
        assert_eq!(task.state(), State::Finished);
    }

    #[test]
    fn ack_task_purges_immediately_once_unattended_schedule_exhausts() {
        let mut task = Task::new_ack(9, OWN, PEER, 1, Instant::ZERO, purge()).unwrap();
        let mut last = task.deadline();
        for _ in 0..schedule::SND_ACK.len() - 1 {
            task.on_timer(last);
            last = task.deadline();
        }
        let now = Instant::from_millis(42);
        task.on_timer(now);
        assert_eq!(task.state(), State::SendDone);
        assert_eq!(task.deadline(), now, "unattended ACK task must purge at `now`, not `now + send_purge_delay`");
    }

    #[test]
    fn receive_accepts_then_retrieve_spawns_ack_when_sin_set() {
        let mut task = Task::new_receive(4, None, None, Duration::from_millis(900), purge(), None, Instant::ZERO);
        let repr = Repr {
            destination: OWN,
            source: PEER,
            flags: Flags {
                sin: true,
                ack: false,
                seq: 0,
            },
            packet_id: 1,
            payload_len: 3,
        };
        let mut raw = PacketBuffer::new();
        raw.prepare_for_send(repr, b"hi\0").unwrap();
        let outcome = task.on_frame(&repr, &raw, false, Instant::from_millis(5));
        assert!(outcome.consumed);
        assert_eq!(task.state(), State::ReceiveDataAvailable);
        assert_eq!(task.delivered(), Some((b"hi\0".as_ref(), PEER)));

        let spawn = task.retrieve(Instant::from_millis(6));
        assert_eq!(spawn, Some((PEER, 1)));
        assert_eq!(task.state(), State::ReceiveDataRetrieved);
    }

    #[test]
    fn duplicate_retransmit_after_retrieval_resends_ack() {
        let mut task = Task::new_receive(5, None, None, Duration::from_millis(900), purge(), None, Instant::ZERO);
        let repr = Repr {
            destination: OWN,
            source: PEER,
            flags: Flags {
                sin: true,
                ack: false,
                seq: 0,
            },
            packet_id: 1,
            payload_len: 0,
        };
        let raw = PacketBuffer::new();
        task.on_frame(&repr, &raw, false, Instant::from_millis(1));
        task.retrieve(Instant::from_millis(2));

        let outcome = task.on_frame(&repr, &raw, true, Instant::from_millis(3));
        assert!(outcome.consumed);
        assert_eq!(outcome.spawn_ack, Some((PEER, 1)));
        assert_eq!(task.state(), State::ReceiveDataRetrieved);
    }

    #[test]
    fn rxcallback_fires_when_a_frame_is_delivered() {
        use core::sync::atomic::{AtomicU8, Ordering};
        static SENDER_SEEN: AtomicU8 = AtomicU8::new(0);
        static PAYLOAD_LEN_SEEN: AtomicU8 = AtomicU8::new(0);

        fn record(payload: &[u8], sender: u8) {
            SENDER_SEEN.store(sender, Ordering::Relaxed);
            PAYLOAD_LEN_SEEN.store(payload.len() as u8, Ordering::Relaxed);
        }

        let mut task = Task::new_receive(
            7,
            None,
            None,
            Duration::from_millis(900),
            purge(),
            Some(record),
            Instant::ZERO,
        );
        let repr = Repr {
            destination: OWN,
            source: PEER,
            flags: Flags {
                sin: false,
                ack: false,
                seq: 0,
            },
            packet_id: 1,
            payload_len: 3,
        };
        let mut raw = PacketBuffer::new();
        raw.prepare_for_send(repr, b"hi\0").unwrap();
        task.on_frame(&repr, &raw, false, Instant::from_millis(1));

        assert_eq!(SENDER_SEEN.load(Ordering::Relaxed), PEER);
        assert_eq!(PAYLOAD_LEN_SEEN.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn receive_times_out_without_a_frame() {
        let mut task = Task::new_receive(
            6,
            None,
            Some(Duration::from_millis(500)),
            Duration::from_millis(900),
            purge(),
            None,
            Instant::ZERO,
        );
        assert!(task.subscribed_to_timer());
        task.on_timer(Instant::from_millis(500));
        assert_eq!(task.state(), State::ReceiveTimedOut);
    }
}
