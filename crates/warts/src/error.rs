use std::io;

use container::{ContainerError, ObjectType};
use thiserror::Error;
use wire::{DecodeError, EncodeError};

#[derive(Debug, Error)]
pub enum WartsError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Container(#[from] ContainerError),

    /// A frame body failed to decode. The reader has already moved past it.
    #[error("bad {} object at offset {offset}: {source}", .kind.name())]
    Decode {
        kind: ObjectType,
        offset: u64,
        #[source]
        source: DecodeError,
    },

    /// A record could not be encoded. Nothing was written.
    #[error("cannot write {} object: {source}", .kind.name())]
    Encode {
        kind: ObjectType,
        #[source]
        source: EncodeError,
    },

    /// The object type can be read but is never written.
    #[error("{} objects cannot be written", .0.name())]
    ReadOnly(ObjectType),
}

impl WartsError {
    pub(crate) fn decode(kind: ObjectType, offset: u64) -> impl FnOnce(DecodeError) -> Self {
        move |source| WartsError::Decode {
            kind,
            offset,
            source,
        }
    }

    pub(crate) fn encode(kind: ObjectType) -> impl FnOnce(EncodeError) -> Self {
        move |source| WartsError::Encode { kind, source }
    }
}
