//! # Warts - file handle
//!
//! Ties the [`container`] framing to the [`records`] codecs and owns the
//! state that lives for the length of a file: the list and cycle tables
//! measurement records refer to, and the legacy address table of old files.
//!
//! ```text
//!           WartsWriter                         WartsReader
//!               |                                   ^
//!  record ──> encode body with                 decode body, resolving
//!             prospective list/cycle ids       ids through FileTables
//!               |                                   |
//!             emit list / cycle-def                 |  filter: skip frames
//!             frames the file lacks                 |  by length, never
//!               |                                   |  skip bookkeeping
//!               v                                   |
//!         ContainerWriter  ───────  bytes  ───> ContainerReader
//! ```
//!
//! | Module     | Purpose                                             |
//! |------------|-----------------------------------------------------|
//! | [`read`]   | `WartsReader`: frame dispatch, filter, cycle stops   |
//! | [`write`]  | `WartsWriter`: create, append, auto list/cycle defs  |
//! | [`error`]  | `WartsError`                                         |

mod error;
mod read;
mod write;

use std::sync::Arc;

pub use container::ObjectType;
pub use error::WartsError;
pub use read::{RawObject, WartsReader};
pub use records::{Cycle, FileTables, List, Ping, RefIds, Trace};
pub use wire::Addr;
pub use write::WartsWriter;

/// One decoded object from a warts file.
#[derive(Debug, Clone, PartialEq)]
pub enum WartsObject {
    List(Arc<List>),
    CycleStart(Arc<Cycle>),
    CycleDef(Arc<Cycle>),
    /// The stopped cycle, carrying its stop time.
    CycleStop(Arc<Cycle>),
    /// Deprecated file-scoped address.
    Addr(Addr),
    Trace(Box<Trace>),
    Ping(Box<Ping>),
}

impl WartsObject {
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        match self {
            WartsObject::List(_) => ObjectType::List,
            WartsObject::CycleStart(_) => ObjectType::CycleStart,
            WartsObject::CycleDef(_) => ObjectType::CycleDef,
            WartsObject::CycleStop(_) => ObjectType::CycleStop,
            WartsObject::Addr(_) => ObjectType::Addr,
            WartsObject::Trace(_) => ObjectType::Trace,
            WartsObject::Ping(_) => ObjectType::Ping,
        }
    }
}

#[cfg(test)]
mod tests;
