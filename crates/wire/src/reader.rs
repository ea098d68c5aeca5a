use byteorder::{BigEndian, ByteOrder};

use crate::{Addr, DecodeError, Timeval};

/// Bounds-checked cursor over a borrowed byte window.
///
/// Every accessor either consumes exactly the bytes it needs or fails with
/// [`DecodeError::Truncated`] and leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        WireReader { buf, pos: 0 }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn timeval(&mut self) -> Result<Timeval, DecodeError> {
        let sec = self.u32()?;
        let usec = self.u32()?;
        Ok(Timeval { sec, usec })
    }

    /// A 4-byte microsecond RTT.
    pub fn rtt(&mut self) -> Result<Timeval, DecodeError> {
        Ok(Timeval::from_micros(self.u32()?))
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    /// A NUL-terminated string.
    ///
    /// # Errors
    ///
    /// Fails with [`DecodeError::Truncated`] if no terminator is present in
    /// the window, or [`DecodeError::Malformed`] if the bytes are not UTF-8.
    pub fn string(&mut self) -> Result<String, DecodeError> {
        let rest = &self.buf[self.pos..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(DecodeError::Truncated {
                needed: rest.len() + 1,
                remaining: rest.len(),
            });
        };
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|_| DecodeError::Malformed("string encoding"))?
            .to_owned();
        self.pos += nul + 1;
        Ok(s)
    }

    /// Type byte plus address bytes, after a non-zero length byte has
    /// already been consumed.
    pub fn addr_body(&mut self, len: u8) -> Result<Addr, DecodeError> {
        let kind = self.u8()?;
        let bytes = self.take(usize::from(len))?;
        Addr::from_parts(kind, bytes)
    }

    /// A literal `[len][type][bytes]` address.
    pub fn addr_literal(&mut self) -> Result<Addr, DecodeError> {
        let len = self.u8()?;
        if len == 0 {
            return Err(DecodeError::Malformed("zero-length literal address"));
        }
        self.addr_body(len)
    }

    /// Splits off the next `n` bytes as an independent reader, advancing
    /// this one past them.
    pub fn sub(&mut self, n: usize) -> Result<WireReader<'a>, DecodeError> {
        Ok(WireReader::new(self.take(n)?))
    }
}
