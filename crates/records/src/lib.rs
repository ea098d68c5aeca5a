//! # Record Codecs
//!
//! Body encoders and decoders for every object kind the container carries.
//! Each codec turns an in-memory record into the bytes that follow a
//! container header, and back.
//!
//! ## Measurement record layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ PARAMS   flags | params_len (u16) | scalar fields             │
//! ├───────────────────────────────────────────────────────────────┤
//! │ COUNT    number of reply/hop blocks (u16)                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ BLOCKS   one parameter block per reply, probe fields repeated │
//! │          on each reply of the same probe                      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ ATTRS    traceroute only: (type << 12 | len) headers + bodies │
//! │          terminated by 0x0000                                 │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Addresses and interface names are interned per record, so each record
//! decodes on its own. Lists, cycles and legacy address objects are
//! file-scoped: encoders take their file ids as [`RefIds`], decoders
//! resolve them through [`FileTables`].
//!
//! Every encoder runs a size pass, allocates exactly that many bytes, and
//! fills them; a mismatch panics. No decoder publishes a partially built
//! record.

mod common;
pub mod list;
pub mod ping;
mod refs;
pub mod trace;

pub use list::{Cycle, List};
pub use ping::Ping;
pub use refs::{FileTables, RefIds};
pub use trace::Trace;

#[cfg(test)]
mod tests;
