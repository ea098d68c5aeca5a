use intern::WriteScope;
use wire::{string_size, Addr, EncodeError, Timeval, WireWriter};

/// A composite field value that sizes and writes itself.
///
/// Implementations must write exactly the number of bytes `size` returned,
/// and must visit interned objects in the same order in both methods.
pub trait Nested {
    fn size(&self, scope: &mut WriteScope) -> Result<usize, EncodeError>;
    fn write(&self, w: &mut WireWriter, scope: &mut WriteScope);
}

/// The value of one present field, borrowed from the record being encoded.
pub enum Field<'a> {
    U8(u8),
    U16(u16),
    U32(u32),
    /// Two bytes written back to back, such as an ICMP type and code.
    Pair(u8, u8),
    Timeval(Timeval),
    /// A 4-byte microsecond count.
    Rtt(Timeval),
    Bytes(&'a [u8]),
    Str(&'a str),
    /// Record-interned address.
    Addr(&'a Addr),
    /// Literal address that never enters the interning table.
    StaticAddr(&'a Addr),
    /// Record-interned interface name.
    IfName(&'a str),
    Nested(&'a dyn Nested),
}

impl Field<'_> {
    pub(crate) fn size(&self, scope: &mut WriteScope) -> Result<usize, EncodeError> {
        Ok(match self {
            Field::U8(_) => 1,
            Field::U16(_) | Field::Pair(..) => 2,
            Field::U32(_) => 4,
            Field::Rtt(tv) => {
                tv.rtt_micros()?;
                4
            }
            Field::Timeval(_) => 8,
            Field::Bytes(b) => b.len(),
            Field::Str(s) => string_size(s)?,
            Field::Addr(a) => scope.addr_size(a),
            Field::StaticAddr(a) => a.literal_size(),
            Field::IfName(s) => scope.ifname_size(s)?,
            Field::Nested(n) => n.size(scope)?,
        })
    }

    pub(crate) fn write(&self, w: &mut WireWriter, scope: &mut WriteScope) {
        match self {
            Field::U8(v) => w.put_u8(*v),
            Field::U16(v) => w.put_u16(*v),
            Field::U32(v) => w.put_u32(*v),
            Field::Pair(a, b) => {
                w.put_u8(*a);
                w.put_u8(*b);
            }
            Field::Timeval(tv) => w.put_timeval(tv),
            Field::Rtt(tv) => w.put_rtt(tv),
            Field::Bytes(b) => w.put_bytes(b),
            Field::Str(s) => w.put_string(s),
            Field::Addr(a) => scope.put_addr(w, a),
            Field::StaticAddr(a) => w.put_addr_literal(a),
            Field::IfName(s) => scope.put_ifname(w, s),
            Field::Nested(n) => n.write(w, scope),
        }
    }
}
