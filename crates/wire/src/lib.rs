//! # Wire
//!
//! Big-endian primitives shared by every record codec in the container.
//!
//! All multi-byte integers on disk are network byte order. The composite
//! scalars used by the record formats are:
//!
//! ```text
//! timeval : [sec: u32][usec: u32]
//! rtt     : [micros: u32]
//! string  : [bytes ...][0x00]
//! address : [len: u8][type: u8][bytes: len]   (literal form)
//! ```
//!
//! Encoding is two-phase: a size pass computes the exact length of a record,
//! then a fill pass writes into a [`WireWriter`] of exactly that length. The
//! writer asserts that the two passes agree. Decoding goes through a bounds
//! checked [`WireReader`] that never reads past its window.

mod addr;
mod error;
mod reader;
mod time;
mod writer;

pub use addr::Addr;
pub use error::{DecodeError, EncodeError, ErrorKind};
pub use reader::WireReader;
pub use time::Timeval;
pub use writer::{string_size, WireWriter};
