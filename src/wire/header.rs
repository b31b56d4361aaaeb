use byteorder::{ByteOrder, LittleEndian};

use super::field::Field;
use super::{Error, Result};

const DESTINATION: Field = 0..1;
const SOURCE: Field = 1..2;
const FLAGS: Field = 2..3;
const PACKET_ID: Field = 3..5;
const LENGTH: Field = 5..6;

/// Size of the fixed header, in bytes.
pub const HEADER_LEN: usize = 6;

/// A read/write wrapper around a frame header laid directly over a byte
/// buffer.
///
/// Field order on the wire is destination, source, flags, packet-id
/// (little-endian), length — destination first, because the radio's
/// hardware address filter inspects only the first byte.
#[derive(Debug, Clone)]
pub struct Header<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Header<T> {
    /// Wrap a buffer without checking its length.
    ///
    /// Callers must ensure the buffer is at least [`HEADER_LEN`] bytes, or
    /// accessors below will panic on out-of-bounds indexing.
    pub fn new_unchecked(buffer: T) -> Header<T> {
        Header { buffer }
    }

    /// Wrap a buffer, first checking that it is long enough to hold a
    /// header.
    pub fn new_checked(buffer: T) -> Result<Header<T>> {
        let header = Self::new_unchecked(buffer);
        header.check_len()?;
        Ok(header)
    }

    /// Ensure the buffer is at least [`HEADER_LEN`] bytes long.
    pub fn check_len(&self) -> Result<()> {
        if self.buffer.as_ref().len() < HEADER_LEN {
            Err(Error)
        } else {
            Ok(())
        }
    }

    pub fn into_inner(self) -> T {
        self.buffer
    }

    pub const fn header_len() -> usize {
        HEADER_LEN
    }

    pub fn destination(&self) -> u8 {
        self.buffer.as_ref()[DESTINATION.start]
    }

    pub fn source(&self) -> u8 {
        self.buffer.as_ref()[SOURCE.start]
    }

    pub fn flags(&self) -> Flags {
        Flags::from_byte(self.buffer.as_ref()[FLAGS.start])
    }

    pub fn packet_id(&self) -> u16 {
        LittleEndian::read_u16(&self.buffer.as_ref()[PACKET_ID])
    }

    /// Declared payload length, transmitted as a single byte.
    pub fn payload_len(&self) -> u8 {
        self.buffer.as_ref()[LENGTH.start]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Header<T> {
    pub fn set_destination(&mut self, addr: u8) {
        self.buffer.as_mut()[DESTINATION.start] = addr;
    }

    pub fn set_source(&mut self, addr: u8) {
        self.buffer.as_mut()[SOURCE.start] = addr;
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.buffer.as_mut()[FLAGS.start] = flags.to_byte();
    }

    pub fn set_packet_id(&mut self, id: u16) {
        LittleEndian::write_u16(&mut self.buffer.as_mut()[PACKET_ID], id);
    }

    pub fn set_payload_len(&mut self, len: u8) {
        self.buffer.as_mut()[LENGTH.start] = len;
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> Header<&'a T> {
    pub fn payload(&self) -> &'a [u8] {
        let len = self.payload_len() as usize;
        &self.buffer.as_ref()[HEADER_LEN..HEADER_LEN + len]
    }
}

/// The flags byte: low nibble is the option bitfield, high nibble is the
/// diagnostic retransmission-attempt counter.
///
/// Bit 0 (`SIN`) — sender wants an ACK. Bit 1 (`ACK`) — this frame *is* an
/// ACK. The sequence counter in the high nibble is informational only;
/// receivers must never use it for duplicate detection (see
/// [`crate::cache`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub sin: bool,
    pub ack: bool,
    pub seq: u8,
}

impl Flags {
    const SIN_BIT: u8 = 0b0000_0001;
    const ACK_BIT: u8 = 0b0000_0010;

    pub fn from_byte(byte: u8) -> Flags {
        Flags {
            sin: byte & Self::SIN_BIT != 0,
            ack: byte & Self::ACK_BIT != 0,
            seq: (byte >> 4) & 0x0F,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = 0u8;
        if self.sin {
            byte |= Self::SIN_BIT;
        }
        if self.ack {
            byte |= Self::ACK_BIT;
        }
        byte |= (self.seq & 0x0F) << 4;
        byte
    }
}

/// An owned, high-level view of a frame header, detached from any buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repr {
    pub destination: u8,
    pub source: u8,
    pub flags: Flags,
    pub packet_id: u16,
    pub payload_len: u8,
}

impl Repr {
    /// Parse a `Repr` out of a header-sized (or larger) buffer. Does not
    /// validate that the buffer actually holds `payload_len` further bytes
    /// — see [`crate::pkbuf::PacketBuffer::validate`] for that, which needs
    /// the radio's reported frame count to do it.
    pub fn parse<T: AsRef<[u8]>>(header: &Header<T>) -> Repr {
        Repr {
            destination: header.destination(),
            source: header.source(),
            flags: header.flags(),
            packet_id: header.packet_id(),
            payload_len: header.payload_len(),
        }
    }

    /// Write this header into a buffer at least [`HEADER_LEN`] bytes long.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]>>(&self, header: &mut Header<T>) {
        header.set_destination(self.destination);
        header.set_source(self.source);
        header.set_flags(self.flags);
        header.set_packet_id(self.packet_id);
        header.set_payload_len(self.payload_len);
    }

    pub const fn buffer_len() -> usize {
        HEADER_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_roundtrip() {
        let flags = Flags {
            sin: true,
            ack: false,
            seq: 0xA,
        };
        assert_eq!(Flags::from_byte(flags.to_byte()), flags);
        assert_eq!(flags.to_byte(), 0b1010_0001);
    }

    #[test]
    fn header_roundtrip() {
        let mut buf = [0u8; HEADER_LEN];
        let repr = Repr {
            destination: 0x5E,
            source: 0x0B,
            flags: Flags {
                sin: true,
                ack: false,
                seq: 0,
            },
            packet_id: 1,
            payload_len: 3,
        };
        let mut header = Header::new_unchecked(&mut buf[..]);
        repr.emit(&mut header);

        let header = Header::new_checked(&buf[..]).unwrap();
        assert_eq!(Repr::parse(&header), repr);
    }

    #[test]
    fn destination_is_first_byte() {
        let mut buf = [0u8; HEADER_LEN];
        let mut header = Header::new_unchecked(&mut buf[..]);
        header.set_destination(0x42);
        assert_eq!(buf[0], 0x42);
    }

    #[test]
    fn too_short_buffer_rejected() {
        let buf = [0u8; HEADER_LEN - 1];
        assert!(Header::new_checked(&buf[..]).is_err());
    }
}
