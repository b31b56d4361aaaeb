//! An in-memory [`Radio`] for tests and the bundled demo: two instances
//! sharing a channel stand in for two boards within earshot of each other.

use core::cell::RefCell;
use std::rc::Rc;
use std::collections::VecDeque;

use crate::config::MAX_FRAME_LEN;

use super::{ConfigOption, Radio};

/// The shared medium two [`LoopbackRadio`] endpoints transmit onto and
/// receive from. Frames are delivered to every endpoint but the sender —
/// there is no hardware address filter here, callers see every frame and
/// rely on the engine's own `SNIF_MODE`-equivalent behavior upstream.
#[derive(Debug, Default)]
struct Ether {
    queues: Vec<VecDeque<Vec<u8>>>,
}

/// One endpoint on a [`LoopbackRadio`] medium.
#[derive(Debug)]
pub struct LoopbackRadio {
    ether: Rc<RefCell<Ether>>,
    own_index: usize,
    armed: bool,
    max_data_len: usize,
}

impl LoopbackRadio {
    /// Build `count` endpoints all sharing one medium.
    pub fn network(count: usize, max_data_len: usize) -> Vec<LoopbackRadio> {
        let ether = Rc::new(RefCell::new(Ether {
            queues: (0..count).map(|_| VecDeque::new()).collect(),
        }));
        (0..count)
            .map(|own_index| LoopbackRadio {
                ether: ether.clone(),
                own_index,
                armed: false,
                max_data_len,
            })
            .collect()
    }

    pub fn is_interrupt_armed(&self) -> bool {
        self.armed
    }
}

impl Radio for LoopbackRadio {
    fn device_init(&mut self, _reset_only: bool) -> Option<usize> {
        Some(self.max_data_len.min(MAX_FRAME_LEN))
    }

    fn device_send(&mut self, frame: &[u8]) -> u8 {
        let mut ether = self.ether.borrow_mut();
        let count = ether.queues.len();
        for (index, queue) in ether.queues.iter_mut().enumerate() {
            if index != self.own_index && count > 1 {
                queue.push_back(frame.to_vec());
            }
        }
        0
    }

    fn device_receive(&mut self, buf: &mut [u8]) -> usize {
        let mut ether = self.ether.borrow_mut();
        match ether.queues[self.own_index].pop_front() {
            Some(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                n
            }
            None => 0,
        }
    }

    fn device_set_option(&mut self, _option: ConfigOption<'_>) {}

    fn arm_interrupt(&mut self) {
        self.armed = true;
    }

    fn disarm_interrupt(&mut self) {
        self.armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sent_by_one_endpoint_is_received_by_the_other() {
        let mut radios = LoopbackRadio::network(2, 64);
        let (mut a, mut b) = {
            let b = radios.pop().unwrap();
            let a = radios.pop().unwrap();
            (a, b)
        };
        assert_eq!(a.device_send(&[1, 2, 3]), 0);
        let mut buf = [0u8; 64];
        let n = b.device_receive(&mut buf);
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert_eq!(a.device_receive(&mut buf), 0);
    }
}
