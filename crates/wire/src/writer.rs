use byteorder::{BigEndian, ByteOrder};

use crate::{Addr, EncodeError, Timeval};

/// Encoded size of a NUL-terminated string.
///
/// # Errors
///
/// [`EncodeError::InteriorNul`] if `s` contains a NUL byte, since the
/// string would not survive a round trip.
pub fn string_size(s: &str) -> Result<usize, EncodeError> {
    if s.as_bytes().contains(&0) {
        return Err(EncodeError::InteriorNul);
    }
    Ok(s.len() + 1)
}

/// Fixed-length output buffer for the fill pass.
///
/// The buffer is allocated at the length computed by the size pass. Writing
/// past it, or finishing short of it, means the passes disagree and is a
/// programming error, so both panic.
#[derive(Debug)]
pub struct WireWriter {
    buf: Vec<u8>,
    pos: usize,
}

impl WireWriter {
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        WireWriter {
            buf: vec![0u8; len],
            pos: 0,
        }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn claim(&mut self, n: usize) -> &mut [u8] {
        assert!(
            n <= self.remaining(),
            "fill pass overran size pass: need {n}, {} left",
            self.remaining()
        );
        let start = self.pos;
        self.pos += n;
        &mut self.buf[start..start + n]
    }

    pub fn put_u8(&mut self, v: u8) {
        self.claim(1)[0] = v;
    }

    pub fn put_u16(&mut self, v: u16) {
        BigEndian::write_u16(self.claim(2), v);
    }

    pub fn put_u32(&mut self, v: u32) {
        BigEndian::write_u32(self.claim(4), v);
    }

    pub fn put_timeval(&mut self, tv: &Timeval) {
        self.put_u32(tv.sec);
        self.put_u32(tv.usec);
    }

    /// # Panics
    ///
    /// If `tv` is not encodable as an RTT; the size pass checks this with
    /// [`Timeval::rtt_micros`] first.
    pub fn put_rtt(&mut self, tv: &Timeval) {
        match tv.rtt_micros() {
            Ok(us) => self.put_u32(us),
            Err(e) => panic!("unchecked rtt reached the fill pass: {e}"),
        }
    }

    pub fn put_bytes(&mut self, b: &[u8]) {
        self.claim(b.len()).copy_from_slice(b);
    }

    /// Writes `s` followed by a NUL. The size pass is expected to have
    /// rejected interior NULs through [`string_size`].
    pub fn put_string(&mut self, s: &str) {
        self.put_bytes(s.as_bytes());
        self.put_u8(0);
    }

    /// Literal `[len][type][bytes]` address.
    pub fn put_addr_literal(&mut self, addr: &Addr) {
        self.put_u8(addr.octet_len() as u8);
        self.put_u8(addr.type_code());
        self.put_bytes(&addr.octets());
    }

    /// Returns the filled buffer.
    ///
    /// # Panics
    ///
    /// If fewer bytes were written than the buffer was sized for.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        assert_eq!(
            self.pos,
            self.buf.len(),
            "fill pass wrote fewer bytes than size pass computed"
        );
        self.buf
    }
}
