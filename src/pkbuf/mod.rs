//! The packet buffer: one frame, owned exclusively by whichever task holds
//! it, backed by a fixed-size array rather than a heap allocation — a
//! compile-time array removes an entire allocation failure mode on a
//! microcontroller.
//!
//! A [`PacketBuffer`] is "free" when its length is zero; `allocate`,
//! `prepare_for_send` and a successful `set_received_len` all move it out of
//! that state, `free`/`shrink_to_header` move it back towards it.

use crate::config::MAX_FRAME_LEN;
use crate::wire::{self, Header, Repr, HEADER_LEN};

/// A variable-length frame: fixed header plus up to `MAX_FRAME_LEN -
/// HEADER_LEN` bytes of payload.
#[derive(Debug, Clone)]
pub struct PacketBuffer {
    raw: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuffer {
    pub const fn new() -> Self {
        PacketBuffer {
            raw: [0; MAX_FRAME_LEN],
            len: 0,
        }
    }

    /// Whether the buffer currently holds no frame.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total length of the held frame (header + payload), or 0 if free.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Release the frame: no deallocation happens, the length cursor is
    /// simply reset.
    pub fn free(&mut self) {
        self.len = 0;
    }

    /// Zero-fill `size` bytes and mark the buffer as holding a frame of
    /// that length.
    pub fn allocate(&mut self, size: usize) -> wire::Result<()> {
        if size > MAX_FRAME_LEN {
            return Err(wire::Error);
        }
        self.raw[..size].fill(0);
        self.len = size;
        Ok(())
    }

    pub fn copy_from(&mut self, other: &PacketBuffer) {
        self.len = other.len;
        self.raw[..other.len].copy_from_slice(&other.raw[..other.len]);
    }

    /// Build a full frame out of a header representation and a payload
    /// slice.
    ///
    /// Precondition: `(payload.is_empty()) == (repr.payload_len == 0)`;
    /// violating it is a programmer error, checked with `debug_assert!` and
    /// otherwise not re-validated here (the caller already rejected bad
    /// arguments at the API boundary, see [`crate::api`]).
    pub fn prepare_for_send(&mut self, repr: Repr, payload: &[u8]) -> wire::Result<()> {
        debug_assert_eq!(
            payload.is_empty(),
            repr.payload_len == 0,
            "prepare_for_send: payload presence must match declared length"
        );
        let total = HEADER_LEN + payload.len();
        if total > MAX_FRAME_LEN {
            return Err(wire::Error);
        }
        {
            let mut header = Header::new_unchecked(&mut self.raw[..HEADER_LEN]);
            repr.emit(&mut header);
        }
        self.raw[HEADER_LEN..total].copy_from_slice(payload);
        self.len = total;
        Ok(())
    }

    /// The raw receive target the radio driver's `device_receive` writes
    /// into, sized to the buffer's full capacity.
    pub fn receive_target(&mut self) -> &mut [u8; MAX_FRAME_LEN] {
        &mut self.raw
    }

    /// Record how many bytes `device_receive` actually wrote.
    pub fn set_received_len(&mut self, nb_bytes: usize) {
        self.len = nb_bytes.min(MAX_FRAME_LEN);
    }

    /// True iff the buffer is non-empty, the declared payload length is
    /// within `max_payload`, and the declared length plus header size
    /// equals the number of bytes the radio actually reported.
    pub fn validate(&self, nb_bytes_received: usize, max_payload: usize) -> bool {
        if self.is_empty() || nb_bytes_received < HEADER_LEN {
            return false;
        }
        let header = match Header::new_checked(&self.raw[..nb_bytes_received.min(MAX_FRAME_LEN)]) {
            Ok(header) => header,
            Err(_) => return false,
        };
        let declared = header.payload_len() as usize;
        declared <= max_payload && HEADER_LEN + declared == nb_bytes_received
    }

    /// Drop the payload, keeping only the header — used once an ACK has
    /// been matched or a receive's payload has been handed to the
    /// application.
    pub fn shrink_to_header(&mut self) {
        if self.len > HEADER_LEN {
            self.len = HEADER_LEN;
        }
    }

    /// Overwrite the flags byte's diagnostic sequence counter in place,
    /// leaving SIN/ACK untouched. Used by a SEND task to stamp each
    /// retransmit before handing it to the radio driver.
    pub fn set_sequence(&mut self, seq: u8) {
        if self.len >= HEADER_LEN {
            let mut flags = {
                let header = Header::new_unchecked(&self.raw[..HEADER_LEN]);
                header.flags()
            };
            flags.seq = seq;
            let mut header = Header::new_unchecked(&mut self.raw[..HEADER_LEN]);
            header.set_flags(flags);
        }
    }

    pub fn header(&self) -> Option<Header<&[u8]>> {
        if self.len < HEADER_LEN {
            None
        } else {
            Some(Header::new_unchecked(&self.raw[..HEADER_LEN]))
        }
    }

    pub fn payload(&self) -> &[u8] {
        if self.len <= HEADER_LEN {
            &[]
        } else {
            &self.raw[HEADER_LEN..self.len]
        }
    }

    /// The full frame, header and payload, ready to hand to
    /// `device_send`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw[..self.len]
    }
}
