//! The protocol engine: owns the radio, the duplicate cache and the task
//! pool, and drives all three from one tick, [`Engine::do_events`].
//!
//! Everything here is single-threaded and cooperative: the only
//! concurrency boundary is the interrupt flag an ISR may set from a true
//! hardware interrupt context, read and cleared only from inside a tick.

use core::sync::atomic::{AtomicBool, Ordering};

use heapless::Vec as HeaplessVec;
use log::{debug, trace, warn};

use crate::cache::DuplicateCache;
use crate::config::{Config, HEADER_LEN, MAX_FRAME_LEN, TASK_POOL_CAPACITY};
use crate::error::Status;
use crate::pkbuf::PacketBuffer;
use crate::phy::{ConfigOption, Radio};
use crate::task::pool::{TaskId, TaskPool};
use crate::task::{Outcome, State, Task};
use crate::time::Instant;
use crate::wire::Repr;

pub use crate::task::RxCallback;

/// How a caller wants an inbound frame filtered and what should happen on
/// delivery — mirrors the radio-driver contract's `rx_config`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RxConfig {
    /// Accept frames only from this source address.
    pub sender: Option<u8>,
    /// Move to `RECEIVE_TIMEDOUT` if nothing arrives within this long.
    pub timeout: Option<crate::time::Duration>,
    /// Called with the delivered payload and its sender the moment the
    /// task reaches `RECEIVE_DATA_AVAILABLE`, independent of whether the
    /// application later polls via `receive_peek`/`receive_retrieve`.
    pub rxcallback: Option<RxCallback>,
}

pub struct Engine<R: Radio> {
    radio: R,
    config: Config,
    max_payload: usize,
    cache: DuplicateCache,
    pool: TaskPool,
    scratch: PacketBuffer,
    interrupt_flag: AtomicBool,
    next_packet_id: u16,
    last_reset: Option<Instant>,
}

impl<R: Radio> Engine<R> {
    /// Bring the radio up and build the engine around it.
    pub fn new(mut radio: R, config: Config, now: Instant) -> Result<Engine<R>, Status> {
        let max_data_len = radio.device_init(false).ok_or(Status::DeviceNotRegistered)?;
        radio.device_set_option(ConfigOption::Address(config.own_address));
        Ok(Engine {
            radio,
            config,
            max_payload: max_data_len.saturating_sub(HEADER_LEN),
            cache: DuplicateCache::new(),
            pool: TaskPool::new(),
            scratch: PacketBuffer::new(),
            interrupt_flag: AtomicBool::new(false),
            next_packet_id: 1,
            // Seeded rather than `None` so a burst of early ACK failures
            // right after boot is still throttled by `min_device_reset_delay`.
            last_reset: Some(now),
        })
    }

    /// Called from interrupt context when the radio's data-ready line
    /// fires. Must do nothing but set the flag — no other shared mutable
    /// state crosses the interrupt boundary.
    pub fn signal_interrupt(&self) {
        self.interrupt_flag.store(true, Ordering::Release);
    }

    fn allocate_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.wrapping_add(1).max(1);
        id
    }

    /// Precondition: `len <= MAX_PAYLOAD` and `(len == 0) <=>
    /// (payload.is_empty())` (always true for a slice, the check here is
    /// really just the length bound).
    pub fn send_noblock(
        &mut self,
        destination: u8,
        payload: &[u8],
        want_ack: bool,
        now: Instant,
    ) -> (Option<TaskId>, Status) {
        if payload.len() > self.max_payload {
            return (None, Status::SendDataLenAboveLimit);
        }
        let Some(raw_id) = self.pool.reserve_id() else {
            return (None, Status::UnableToCreateTask);
        };
        let packet_id = self.allocate_packet_id();
        let task = match Task::new_send(
            raw_id,
            self.config.own_address,
            destination,
            payload,
            want_ack,
            packet_id,
            now,
            self.config.send_purge_delay,
        ) {
            Ok(task) => task,
            Err(_) => return (None, Status::SendBadArguments),
        };
        match self.pool.insert(task) {
            Ok(id) => (Some(id), Status::TaskCreatedOk),
            Err(_) => (None, Status::UnableToCreateTask),
        }
    }

    pub fn receive_noblock(&mut self, rx: RxConfig, now: Instant) -> (Option<TaskId>, Status) {
        let Some(raw_id) = self.pool.reserve_id() else {
            return (None, Status::UnableToCreateTask);
        };
        let task = Task::new_receive(
            raw_id,
            rx.sender,
            rx.timeout,
            self.config.data_avail_delay,
            self.config.receive_purge_delay,
            rx.rxcallback,
            now,
        );
        match self.pool.insert(task) {
            Ok(id) => (Some(id), Status::TaskCreatedOk),
            Err(_) => (None, Status::UnableToCreateTask),
        }
    }

    /// General progress query, usable on either a SEND or a RECEIVE task.
    pub fn task_get_status(&self, id: TaskId) -> Status {
        match self.pool.get(id) {
            None => Status::UnknownTaskId,
            Some(task) => match task.state() {
                State::Send | State::Receive => Status::TaskUnderway,
                State::SendDone => send_final_status(task),
                State::ReceiveDataAvailable | State::ReceiveDataRetrieved => Status::Ok,
                State::ReceiveTimedOut => Status::Timeout,
                State::Finished => Status::Undefined,
            },
        }
    }

    /// Final outcome of a SEND task: `(status, transmit_count)`.
    pub fn send_get_final_status(&self, id: TaskId) -> (Status, u8) {
        match self.pool.get(id) {
            None => (Status::UnknownTaskId, 0),
            Some(task) => {
                let status = match task.state() {
                    State::Send => Status::TaskUnderway,
                    State::SendDone | State::Finished => send_final_status(task),
                    _ => Status::Undefined,
                };
                (status, task.transmit_count())
            }
        }
    }

    /// The payload and sender of a `RECEIVE_DATA_AVAILABLE` task, without
    /// consuming it — used by `task_get_status` callers that want to peek
    /// before retrieving.
    pub fn receive_peek(&self, id: TaskId) -> Option<(&[u8], u8)> {
        self.pool.get(id).and_then(Task::delivered)
    }

    /// Retrieve a delivered frame, moving the task on to
    /// `RECEIVE_DATA_RETRIEVED`. The ACK this may owe the sender is spawned
    /// as a fresh task, so it fires no earlier than the next tick after the
    /// frame that triggered it.
    pub fn receive_retrieve(&mut self, id: TaskId, now: Instant) -> Option<(heapless::Vec<u8, MAX_FRAME_LEN>, u8)> {
        let task = self.pool.get_mut(id)?;
        let (payload, sender) = task.delivered()?;
        let mut owned = heapless::Vec::new();
        let _ = owned.extend_from_slice(payload);
        let spawn = task.retrieve(now);
        if let Some((destination, packet_id)) = spawn {
            self.spawn_ack(destination, packet_id, now);
        }
        Some((owned, sender))
    }

    fn spawn_ack(&mut self, destination: u8, packet_id: u16, now: Instant) {
        let Some(raw_id) = self.pool.reserve_id() else {
            warn!("task pool full, dropping owed ACK to {destination:#04x}");
            return;
        };
        match Task::new_ack(
            raw_id,
            self.config.own_address,
            destination,
            packet_id,
            now,
            self.config.send_purge_delay,
        ) {
            Ok(task) => {
                let _ = self.pool.insert(task);
            }
            Err(_) => warn!("failed to build ACK frame for {destination:#04x}"),
        }
    }

    fn update_interrupt_arming(&mut self) {
        let any_listening = self.pool.iter().any(Task::subscribed_to_frames);
        if any_listening {
            self.radio.arm_interrupt();
        } else {
            self.radio.disarm_interrupt();
        }
    }

    /// Drain, validate and cache-check one pending frame. Returns the
    /// parsed representation and the duplicate-cache verdict if a valid
    /// frame was obtained.
    fn drain_one_frame(&mut self, now: Instant) -> Option<(Repr, bool)> {
        self.radio.disarm_interrupt();
        let nb_bytes = self.radio.device_receive(self.scratch.receive_target());
        self.interrupt_flag.store(false, Ordering::Release);

        let result = if nb_bytes == 0 {
            None
        } else {
            self.scratch.set_received_len(nb_bytes.min(MAX_FRAME_LEN));
            if self.scratch.validate(nb_bytes, self.max_payload) {
                let header = self.scratch.header().expect("validated frame has a header");
                let repr = Repr::parse(&header);
                let already_seen = self.cache.observe(repr.source, repr.packet_id, now);
                trace!(
                    "rx frame src={:#04x} dst={:#04x} pktid={} dup={already_seen}",
                    repr.source,
                    repr.destination,
                    repr.packet_id
                );
                Some((repr, already_seen))
            } else {
                debug!("dropped malformed frame ({nb_bytes} bytes)");
                self.scratch.free();
                None
            }
        };

        self.update_interrupt_arming();
        result
    }

    /// Run one tick of the engine. The caller supplies `now`; nothing here
    /// reads a wall clock.
    pub fn do_events(&mut self, now: Instant) {
        self.update_interrupt_arming();

        let frame = if self.interrupt_flag.load(Ordering::Acquire) {
            self.drain_one_frame(now)
        } else {
            None
        };

        let mut frame_consumed = frame.is_none();
        let mut transmits: HeaplessVec<(u16, PacketBuffer), TASK_POOL_CAPACITY> = HeaplessVec::new();
        let mut spawns: HeaplessVec<(u8, u16), TASK_POOL_CAPACITY> = HeaplessVec::new();
        let mut any_reset_requested = false;

        for task in self.pool.iter_mut() {
            let mut state_changed = false;
            let task_id = task.id();

            if !frame_consumed && task.subscribed_to_frames() {
                if let Some((repr, already_seen)) = frame.as_ref() {
                    let outcome = task.on_frame(repr, &self.scratch, *already_seen, now);
                    frame_consumed |= outcome.consumed;
                    state_changed |= outcome.consumed;
                    apply_outcome(task_id, outcome, &mut transmits, &mut spawns);
                }
            }

            if !state_changed && task.subscribed_to_timer() && now >= task.deadline() {
                let outcome = task.on_timer(now);
                any_reset_requested |= outcome.request_reset;
                apply_outcome(task_id, outcome, &mut transmits, &mut spawns);
            }
        }

        for (task_id, frame) in transmits {
            let status = self.radio.device_send(frame.as_bytes());
            trace!("tx frame ({} bytes) status={status}", frame.len());
            if let Some(task) = self.pool.iter_mut().find(|t| t.id() == task_id) {
                task.set_last_send_status(status);
            }
        }

        self.pool.reap_finished();

        for (destination, packet_id) in spawns {
            self.spawn_ack(destination, packet_id, now);
        }

        if any_reset_requested {
            let due = self
                .last_reset
                .map_or(true, |last| now.saturating_duration_since(last) >= self.config.min_device_reset_delay);
            if due {
                debug!("resetting radio after unacked send");
                if self.radio.device_init(true).is_some() {
                    self.last_reset = Some(now);
                }
            }
        }

        self.update_interrupt_arming();

        if self.config.auto_sleep && self.pool.len() == 1 {
            let lone = self.pool.iter().next().expect("len == 1");
            if lone.subscribed_to_frames() && !lone.subscribed_to_timer() {
                let _ = self.radio.device_init(true);
                self.radio.sleep(now);
            }
        }
    }
}

/// The resolved outcome of a SEND task once it reaches `SEND_DONE` (or
/// beyond, while it still lingers in the pool during its purge delay).
fn send_final_status(task: &Task) -> Status {
    if task.needs_ack() && !task.has_received_ack() {
        Status::SendNoAckRcvd
    } else if task.last_send_status() == 0 {
        Status::Ok
    } else {
        Status::SendIo
    }
}

fn apply_outcome(
    task_id: u16,
    outcome: Outcome,
    transmits: &mut HeaplessVec<(u16, PacketBuffer), TASK_POOL_CAPACITY>,
    spawns: &mut HeaplessVec<(u8, u16), TASK_POOL_CAPACITY>,
) {
    if let Some(frame) = outcome.transmit {
        let _ = transmits.push((task_id, frame));
    }
    if let Some(spawn) = outcome.spawn_ack {
        let _ = spawns.push(spawn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::LoopbackRadio;
    use crate::time::Duration;

    /// Advance both engines together by one tick, polling both radios —
    /// the loopback radio has no real interrupt line, so `signal_interrupt`
    /// is unconditional and `do_events` simply drains nothing when no frame
    /// is pending.
    fn tick(a: &mut Engine<LoopbackRadio>, b: &mut Engine<LoopbackRadio>, now: Instant) {
        a.signal_interrupt();
        a.do_events(now);
        b.signal_interrupt();
        b.do_events(now);
    }

    #[test]
    fn happy_path_round_trip_with_ack() {
        let mut radios = LoopbackRadio::network(2, 64);
        let radio_b = radios.pop().unwrap();
        let radio_a = radios.pop().unwrap();

        let mut a = Engine::new(radio_a, Config::new(0x0B), Instant::ZERO).unwrap();
        let mut b = Engine::new(radio_b, Config::new(0x5E), Instant::ZERO).unwrap();

        let (rx_id, status) = b.receive_noblock(RxConfig::default(), Instant::ZERO);
        assert_eq!(status, Status::TaskCreatedOk);
        let rx_id = rx_id.unwrap();

        let (tx_id, status) = a.send_noblock(0x5E, b"hi\0", true, Instant::ZERO);
        assert_eq!(status, Status::TaskCreatedOk);
        let tx_id = tx_id.unwrap();

        let mut now = Instant::ZERO;
        for _ in 0..1000 {
            now += Duration::from_millis(1);
            tick(&mut a, &mut b, now);
            if b.receive_peek(rx_id).is_some() {
                break;
            }
        }

        let (payload, sender) = b.receive_retrieve(rx_id, now).expect("frame delivered");
        assert_eq!(&payload[..], b"hi\0");
        assert_eq!(sender, 0x0B);

        for _ in 0..1000 {
            now += Duration::from_millis(1);
            tick(&mut a, &mut b, now);
            if a.send_get_final_status(tx_id).0 != Status::TaskUnderway {
                break;
            }
        }

        let (status, count) = a.send_get_final_status(tx_id);
        assert_eq!(status, Status::Ok);
        assert!((1..=4).contains(&count));
    }

    #[test]
    fn rxcallback_fires_without_waiting_for_receive_retrieve() {
        use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
        static FIRED: AtomicBool = AtomicBool::new(false);
        static FROM: AtomicU8 = AtomicU8::new(0);

        fn on_delivery(_payload: &[u8], sender: u8) {
            FROM.store(sender, Ordering::Relaxed);
            FIRED.store(true, Ordering::Relaxed);
        }

        let mut radios = LoopbackRadio::network(2, 64);
        let radio_b = radios.pop().unwrap();
        let radio_a = radios.pop().unwrap();

        let mut a = Engine::new(radio_a, Config::new(0x0B), Instant::ZERO).unwrap();
        let mut b = Engine::new(radio_b, Config::new(0x5E), Instant::ZERO).unwrap();

        let rx = RxConfig {
            rxcallback: Some(on_delivery),
            ..Default::default()
        };
        let (rx_id, _) = b.receive_noblock(rx, Instant::ZERO);
        let rx_id = rx_id.unwrap();

        let (_, status) = a.send_noblock(0x5E, b"hi\0", false, Instant::ZERO);
        assert_eq!(status, Status::TaskCreatedOk);

        let mut now = Instant::ZERO;
        for _ in 0..1000 {
            now += Duration::from_millis(1);
            tick(&mut a, &mut b, now);
            if FIRED.load(Ordering::Relaxed) {
                break;
            }
        }

        assert!(FIRED.load(Ordering::Relaxed), "rxcallback never fired");
        assert_eq!(FROM.load(Ordering::Relaxed), 0x0B);
        assert!(b.receive_peek(rx_id).is_some());
    }
}
