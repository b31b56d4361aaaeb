//! Two engines sharing an in-memory radio exchange a few acknowledged
//! frames, driven end to end through the blocking API. Run with:
//!
//! ```text
//! RUST_LOG=debug cargo run --example loopback-chat
//! ```
//!
//! Both boards run on one OS thread, standing in for two independent
//! devices: the `now` closure passed to board A's blocking send also
//! pumps board B's tick and retrieves any frame as soon as it arrives,
//! the way board B's own application loop would.

use std::time::{Duration as StdDuration, Instant as StdInstant};

use rflink_engine::api::send_blocking;
use rflink_engine::config::Config;
use rflink_engine::engine::{Engine, RxConfig};
use rflink_engine::error::Status;
use rflink_engine::phy::LoopbackRadio;
use rflink_engine::time::Instant;

const BOARD_A: u8 = 0x0B;
const BOARD_B: u8 = 0x5E;

fn millis_since(start: StdInstant) -> Instant {
    Instant::from_millis(start.elapsed().as_millis() as u64)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut radios = LoopbackRadio::network(2, 64);
    let radio_b = radios.pop().unwrap();
    let radio_a = radios.pop().unwrap();

    let start = StdInstant::now();
    let mut board_a = Engine::new(radio_a, Config::new(BOARD_A), Instant::ZERO).expect("radio A init");
    let mut board_b = Engine::new(radio_b, Config::new(BOARD_B), Instant::ZERO).expect("radio B init");

    for message in ["hello", "from", "board-a"] {
        let (rx_id, status) = board_b.receive_noblock(RxConfig::default(), millis_since(start));
        assert_eq!(status, Status::TaskCreatedOk);
        let rx_id = rx_id.unwrap();

        let mut delivered: Option<(String, u8)> = None;
        let (status, attempts) = send_blocking(&mut board_a, BOARD_B, message.as_bytes(), true, || {
            let now = millis_since(start);
            board_b.signal_interrupt();
            board_b.do_events(now);
            if delivered.is_none() {
                if let Some((payload, sender)) = board_b.receive_peek(rx_id) {
                    let text = std::str::from_utf8(payload).unwrap_or("<binary>").to_owned();
                    delivered = Some((text, sender));
                    board_b.receive_retrieve(rx_id, now);
                }
            }
            now
        });
        log::info!("board A sent {message:?}: {status} after {attempts} attempt(s)");

        match delivered {
            Some((text, sender)) => log::info!("board B received {text:?} from 0x{sender:02X}"),
            None => log::warn!("board B never saw {message:?}"),
        }

        std::thread::sleep(StdDuration::from_millis(20));
    }
}
