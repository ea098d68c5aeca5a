use thiserror::Error;

/// Coarse classification of a [`DecodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input ended before a declared length was satisfied.
    Truncation,
    /// A field was missing, malformed, or referenced an unknown table entry.
    SchemaViolation,
    /// Records or hops arrived in an order the format forbids.
    OrderingViolation,
    /// A declared count could not be allocated.
    ResourceExhaustion,
}

/// Errors raised while decoding a record body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("missing mandatory field: {0}")]
    MissingField(&'static str),

    #[error("malformed {0}")]
    Malformed(&'static str),

    #[error("unknown {table} reference {id}")]
    UnknownReference { table: &'static str, id: u32 },

    #[error("ordering violation: {0}")]
    Ordering(&'static str),

    #[error("cannot allocate {count} {what}")]
    ResourceExhausted { what: &'static str, count: usize },
}

impl DecodeError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Truncated { .. } => ErrorKind::Truncation,
            DecodeError::MissingField(_)
            | DecodeError::Malformed(_)
            | DecodeError::UnknownReference { .. } => ErrorKind::SchemaViolation,
            DecodeError::Ordering(_) => ErrorKind::OrderingViolation,
            DecodeError::ResourceExhausted { .. } => ErrorKind::ResourceExhaustion,
        }
    }
}

/// Errors raised while encoding a record. No bytes have been emitted when
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{what} too large: {len} exceeds {max}")]
    TooLarge {
        what: &'static str,
        len: usize,
        max: usize,
    },

    #[error("string contains an interior NUL byte")]
    InteriorNul,

    #[error("dangling reference: {0}")]
    DanglingReference(&'static str),

    #[error("inconsistent record: {0}")]
    Inconsistent(&'static str),
}

impl EncodeError {
    /// Helper for the common "does this length fit the on-disk width" check.
    pub fn check_len(what: &'static str, len: usize, max: usize) -> Result<(), EncodeError> {
        if len > max {
            Err(EncodeError::TooLarge { what, len, max })
        } else {
            Ok(())
        }
    }
}
