use wire::{string_size, Addr, DecodeError, EncodeError, WireReader, WireWriter};

use crate::{Emission, ReadTable, Reservation, WriteTable};

const IFNAME_REF: u8 = 0x00;
const IFNAME_NEW: u8 = 0x01;

/// Record-scoped interning state for one encode.
///
/// The size pass calls the `*_size` methods and the fill pass calls the
/// `put_*` methods in the same order, so the first reservation of an object
/// lines up with its literal emission.
#[derive(Debug, Default)]
pub struct WriteScope {
    addrs: WriteTable<Addr>,
    ifnames: WriteTable<String>,
}

impl WriteScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn addr_size(&mut self, addr: &Addr) -> usize {
        match self.addrs.reserve(addr) {
            Reservation::New(_) => addr.literal_size(),
            Reservation::Existing(_) => 1 + 4,
        }
    }

    pub fn put_addr(&mut self, w: &mut WireWriter, addr: &Addr) {
        match self.addrs.emit(addr) {
            Emission::Literal => w.put_addr_literal(addr),
            Emission::Reference(id) => {
                w.put_u8(0);
                w.put_u32(id);
            }
        }
    }

    pub fn ifname_size(&mut self, name: &str) -> Result<usize, EncodeError> {
        let literal = string_size(name)?;
        Ok(match self.ifnames.reserve(name) {
            Reservation::New(_) => 1 + literal,
            Reservation::Existing(_) => 1 + 4,
        })
    }

    pub fn put_ifname(&mut self, w: &mut WireWriter, name: &str) {
        match self.ifnames.emit(name) {
            Emission::Literal => {
                w.put_u8(IFNAME_NEW);
                w.put_string(name);
            }
            Emission::Reference(id) => {
                w.put_u8(IFNAME_REF);
                w.put_u32(id);
            }
        }
    }
}

/// Record-scoped interning state for one decode, plus read access to the
/// file's legacy address table.
#[derive(Debug)]
pub struct ReadScope<'f> {
    addrs: ReadTable<Addr>,
    ifnames: ReadTable<String>,
    legacy: &'f ReadTable<Addr>,
}

impl<'f> ReadScope<'f> {
    #[must_use]
    pub fn new(legacy: &'f ReadTable<Addr>) -> Self {
        Self {
            addrs: ReadTable::new("address"),
            ifnames: ReadTable::new("interface name"),
            legacy,
        }
    }

    pub fn read_addr(&mut self, r: &mut WireReader<'_>) -> Result<Addr, DecodeError> {
        let len = r.u8()?;
        if len == 0 {
            let id = r.u32()?;
            return self.addrs.get(id).copied();
        }
        let addr = r.addr_body(len)?;
        self.addrs.push(addr)?;
        Ok(addr)
    }

    pub fn read_ifname(&mut self, r: &mut WireReader<'_>) -> Result<String, DecodeError> {
        match r.u8()? {
            IFNAME_NEW => {
                let name = r.string()?;
                self.ifnames.push(name.clone())?;
                Ok(name)
            }
            IFNAME_REF => {
                let id = r.u32()?;
                self.ifnames.get(id).cloned()
            }
            _ => Err(DecodeError::Malformed("interface name tag")),
        }
    }

    /// A 4-byte id into the file's legacy address table.
    pub fn legacy_addr(&self, r: &mut WireReader<'_>) -> Result<Addr, DecodeError> {
        let id = r.u32()?;
        self.legacy.get(id).copied()
    }
}
