use flags::Flags;
use intern::{ReadScope, WriteScope};
use tracing::trace;
use wire::{DecodeError, EncodeError, WireReader, WireWriter};

use crate::{Field, FieldSize, Schema};

/// Encode side of a parameter block.
pub trait ParamsWrite {
    const SCHEMA: &'static Schema;

    /// The value of field `id`, or `None` if it is absent from this record.
    fn field(&self, id: u16) -> Option<Field<'_>>;
}

/// Decode side of a parameter block.
pub trait ParamsRead {
    const SCHEMA: &'static Schema;

    /// Consumes field `id` from `r`. Called once per set id, in ascending
    /// order, for every id the schema knows.
    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError>;
}

/// Result of the size pass for one parameter block.
#[derive(Debug, Clone)]
pub struct Plan {
    flags: Flags,
    params_len: u16,
}

impl Plan {
    #[must_use]
    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    #[must_use]
    pub fn params_len(&self) -> u16 {
        self.params_len
    }

    /// Bytes the whole block occupies: bitmap, length prefix and data.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let mut len = self.flags.encoded_len();
        if !self.flags.is_empty() {
            len += 2 + usize::from(self.params_len);
        }
        len
    }
}

/// Size pass: decides which fields are present and how many bytes they
/// take, reserving interned objects in `scope` as it goes.
///
/// # Errors
///
/// [`EncodeError::TooLarge`] if the field data exceeds the 16-bit length
/// prefix, or any error a field's own size function reports.
pub fn plan<P: ParamsWrite>(
    rec: &P,
    scope: &mut WriteScope,
) -> Result<Plan, EncodeError> {
    let mut flags = Flags::new();
    let mut len = 0usize;
    for desc in P::SCHEMA.fields {
        if desc.retired {
            continue;
        }
        let Some(field) = rec.field(desc.id) else {
            continue;
        };
        let size = field.size(scope)?;
        if let FieldSize::Fixed(n) = desc.size {
            debug_assert_eq!(
                size,
                usize::from(n),
                "{} field {} has the wrong width",
                P::SCHEMA.name,
                desc.id
            );
        }
        flags.set(desc.id);
        len += size;
    }
    EncodeError::check_len(P::SCHEMA.name, len, usize::from(u16::MAX))?;
    Ok(Plan {
        flags,
        params_len: len as u16,
    })
}

/// Fill pass: emits the block `plan` describes.
///
/// # Panics
///
/// If the bytes written for the fields differ from the planned length.
pub fn write<P: ParamsWrite>(
    rec: &P,
    plan: &Plan,
    w: &mut WireWriter,
    scope: &mut WriteScope,
) {
    plan.flags.write_to(w);
    if plan.flags.is_empty() {
        return;
    }
    w.put_u16(plan.params_len);
    let start = w.position();
    for id in plan.flags.ids() {
        if let Some(field) = rec.field(id) {
            field.write(w, scope);
        }
    }
    assert_eq!(
        w.position() - start,
        usize::from(plan.params_len),
        "{} parameter block size and fill passes disagree",
        P::SCHEMA.name
    );
}

/// Reads one parameter block into `rec`, returning the bitmap so callers
/// can apply rules that depend on which fields were present.
///
/// # Errors
///
/// Truncation if the bitmap, length prefix or window is short, or any error
/// raised by `rec` while reading a field.
pub fn read<P: ParamsRead>(
    rec: &mut P,
    r: &mut WireReader<'_>,
    scope: &mut ReadScope<'_>,
) -> Result<Flags, DecodeError> {
    let flags = Flags::read_from(r)?;
    if flags.is_empty() {
        return Ok(flags);
    }
    let len = r.u16()?;
    let mut window = r.sub(usize::from(len))?;
    let known = P::SCHEMA.max_id();
    for id in flags.ids() {
        if id > known {
            trace!(
                schema = P::SCHEMA.name,
                id,
                skipped = window.remaining(),
                "skipping fields from a newer schema"
            );
            break;
        }
        rec.read_field(id, &mut window, scope)?;
    }
    Ok(flags)
}
