/*! Low-level packet access and construction.

The `wire` module deals with the packet *representation* on the air. It
provides two levels of functionality:

 * [`Header`] extracts and inserts fields directly in a byte buffer — useful
   when the buffer is owned elsewhere (the engine's scratch buffer, a
   task's packet buffer) and we don't want to copy it.
 * [`Repr`] is an owned, high-level view of the same six-byte header, used
   when building a frame to send or when reasoning about a frame's fields
   without holding a borrow on the buffer.

`Header::new_checked` must be used on anything that arrived over the air;
`Header::new_unchecked` is for buffers this engine itself just wrote.
*/

mod header;

pub use self::header::{Flags, Header, Repr, HEADER_LEN};

use core::fmt;

mod field {
    pub type Field = core::ops::Range<usize>;
}

/// Parsing a frame failed: too short, or a field holds a value too large
/// for its slot (e.g. payload length above what the buffer can hold).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("wire::Error: malformed frame")
    }
}

pub type Result<T> = core::result::Result<T, Error>;
