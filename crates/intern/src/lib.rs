//! # Interning Tables
//!
//! Records refer to repeated objects (addresses, interface names, lists,
//! cycles) by small integer ids instead of repeating them. Two table shapes
//! cover every case:
//!
//! - [`WriteTable`]: object to id, assigned in first-seen order.
//! - [`ReadTable`]: id to object, filled in the order objects appear.
//!
//! Record-scoped tables live in a [`WriteScope`] / [`ReadScope`] and start
//! at id 0. File-scoped tables (lists, cycles, legacy address objects)
//! start at id 1 and outlive individual records.
//!
//! An interned address is written in one of two forms:
//!
//! ```text
//! first occurrence : [len: u8 > 0][type: u8][bytes: len]
//! repeat           : [0x00][id: u32]
//! ```
//!
//! Interface names use a tag byte instead:
//!
//! ```text
//! first occurrence : [0x01][name ...][0x00]
//! repeat           : [0x00][id: u32]
//! ```

mod scope;
mod table;

pub use scope::{ReadScope, WriteScope};
pub use table::{Emission, ReadTable, Reservation, WriteTable};
