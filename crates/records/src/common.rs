use intern::{ReadScope, WriteScope};
use wire::{Addr, DecodeError, EncodeError, WireReader, WireWriter};

/// Allocates room for `count` elements, reporting failure instead of
/// aborting.
pub(crate) fn alloc_vec<T>(what: &'static str, count: usize) -> Result<Vec<T>, DecodeError> {
    let mut v = Vec::new();
    v.try_reserve_exact(count)
        .map_err(|_| DecodeError::ResourceExhausted { what, count })?;
    Ok(v)
}

/// `[count u8]` followed by `count` interned addresses.
pub(crate) fn addr_list_size(
    what: &'static str,
    ips: &[Addr],
    scope: &mut WriteScope,
) -> Result<usize, EncodeError> {
    EncodeError::check_len(what, ips.len(), usize::from(u8::MAX))?;
    Ok(1 + ips.iter().map(|a| scope.addr_size(a)).sum::<usize>())
}

pub(crate) fn put_addr_list(ips: &[Addr], w: &mut WireWriter, scope: &mut WriteScope) {
    w.put_u8(ips.len() as u8);
    for a in ips {
        scope.put_addr(w, a);
    }
}

pub(crate) fn read_addr_list(
    r: &mut WireReader<'_>,
    scope: &mut ReadScope<'_>,
) -> Result<Vec<Addr>, DecodeError> {
    let n = usize::from(r.u8()?);
    let mut ips = alloc_vec("addresses", n)?;
    for _ in 0..n {
        ips.push(scope.read_addr(r)?);
    }
    Ok(ips)
}
