//! # Parameter Blocks
//!
//! Every record kind stores its optional scalar fields as a parameter block:
//!
//! ```text
//! [flags: folded bitmap][params_len: u16][field data: params_len bytes]
//!                        \______ present only if any flag is set ______/
//! ```
//!
//! Field data appears in ascending id order, one entry per set flag. A
//! record kind describes its fields with a static [`Schema`] and exposes
//! them through [`ParamsWrite`] (encode) and [`ParamsRead`] (decode).
//!
//! Encoding is driven by one function, [`ParamsWrite::field`], which says
//! both whether a field is present and what its value is. [`plan`] calls it
//! to build the bitmap and total length; [`write`] calls it again to emit the
//! bytes. Because both passes consult the same function, they cannot
//! disagree about presence, and [`write`] asserts they agree about length.
//!
//! Decoding dispatches each set id to [`ParamsRead::read_field`] inside a
//! window bounded by `params_len`. Ids beyond the reader's schema belong to
//! a newer writer; they stop dispatch and the rest of the window is skipped.

mod engine;
mod field;
mod schema;

pub use engine::{plan, read, write, ParamsRead, ParamsWrite, Plan};
pub use field::{Field, Nested};
pub use schema::{FieldDesc, FieldSize, Schema};

#[cfg(test)]
mod tests;
