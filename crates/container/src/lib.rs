//! # Container Framing
//!
//! A warts file is a flat sequence of frames. Each frame is a fixed header
//! followed by an object body whose layout depends on the object type.
//!
//! ## Frame Format
//!
//! ```text
//! [magic: u16 BE = 0x1205][type: u16 BE][len: u32 BE][body: len bytes]
//! ```
//!
//! There is no trailer and no index; a file ends where the last frame ends.
//! A ping or traceroute header with `len == 0` marks "no record" and is
//! reported as end of stream.
//!
//! ## Example
//!
//! ```rust,no_run
//! use container::{ContainerReader, ContainerWriter, ObjectType, ReadOptions};
//!
//! let mut w = ContainerWriter::new(Vec::new());
//! w.write_frame(ObjectType::CycleStop, &[0, 0, 0, 1, 0, 0, 0, 9, 0]).unwrap();
//! let bytes = w.into_inner();
//!
//! let mut r = ContainerReader::with_options(&bytes[..], ReadOptions::default());
//! while let Some(frame) = r.next_frame().unwrap() {
//!     println!("{:?} {} bytes", frame.header.object_type(), frame.body.len());
//! }
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

/// First two bytes of every frame.
pub const MAGIC: u16 = 0x1205;

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 8;

/// Largest body a reader accepts unless told otherwise.
pub const DEFAULT_MAX_RECORD_LEN: u32 = 64 * 1024 * 1024;

/// Object type codes carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum ObjectType {
    List = 1,
    CycleStart = 2,
    CycleDef = 3,
    CycleStop = 4,
    /// Deprecated file-scoped address object. Read only.
    Addr = 5,
    Trace = 6,
    Ping = 7,
    TraceLb = 8,
    Dealias = 9,
    NeighbourDisc = 10,
    Tbit = 11,
    Sting = 12,
    Sniff = 13,
    Host = 14,
    Http = 15,
    UdpProbe = 16,
}

impl ObjectType {
    pub const ALL: [ObjectType; 16] = [
        ObjectType::List,
        ObjectType::CycleStart,
        ObjectType::CycleDef,
        ObjectType::CycleStop,
        ObjectType::Addr,
        ObjectType::Trace,
        ObjectType::Ping,
        ObjectType::TraceLb,
        ObjectType::Dealias,
        ObjectType::NeighbourDisc,
        ObjectType::Tbit,
        ObjectType::Sting,
        ObjectType::Sniff,
        ObjectType::Host,
        ObjectType::Http,
        ObjectType::UdpProbe,
    ];

    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(usize::from(code).checked_sub(1)?).copied()
    }

    #[must_use]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Lower-case name, as used on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ObjectType::List => "list",
            ObjectType::CycleStart => "cycle-start",
            ObjectType::CycleDef => "cycle-def",
            ObjectType::CycleStop => "cycle-stop",
            ObjectType::Addr => "addr",
            ObjectType::Trace => "trace",
            ObjectType::Ping => "ping",
            ObjectType::TraceLb => "tracelb",
            ObjectType::Dealias => "dealias",
            ObjectType::NeighbourDisc => "neighbourdisc",
            ObjectType::Tbit => "tbit",
            ObjectType::Sting => "sting",
            ObjectType::Sniff => "sniff",
            ObjectType::Host => "host",
            ObjectType::Http => "http",
            ObjectType::UdpProbe => "udpprobe",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Ping and traceroute headers use a zero length as an end marker.
    fn zero_len_is_eof(self) -> bool {
        matches!(self, ObjectType::Ping | ObjectType::Trace)
    }
}

/// Errors raised while reading or writing frames.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A header did not start with [`MAGIC`].
    #[error("bad magic {found:#06x} at offset {offset}")]
    BadMagic { found: u16, offset: u64 },

    /// A frame body is longer than the reader accepts or the header can
    /// express.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: u64, max: u64 },

    /// The stream ended inside a header or body.
    #[error("truncated frame at offset {offset}: needed {needed} bytes, got {got}")]
    Truncated { offset: u64, needed: u64, got: u64 },
}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw type code; codes this crate does not know are kept as-is.
    pub kind: u16,
    pub len: u32,
}

impl FrameHeader {
    #[must_use]
    pub fn object_type(&self) -> Option<ObjectType> {
        ObjectType::from_code(self.kind)
    }
}

/// A header together with its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Vec<u8>,
}

// -------------------- Writer --------------------

/// Frame writer over any `Write` implementor.
///
/// Each frame is assembled in a reusable buffer and handed to the
/// underlying writer in a single `write_all` call.
pub struct ContainerWriter<W: Write> {
    out: W,
    buf: Vec<u8>,
    written: u64,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(out: W) -> Self {
        Self::with_offset(out, 0)
    }

    /// A writer whose output already holds `offset` bytes of frames, as
    /// when appending to an existing file.
    pub fn with_offset(out: W, offset: u64) -> Self {
        ContainerWriter {
            out,
            buf: Vec::with_capacity(256),
            written: offset,
        }
    }

    /// Writes one frame.
    ///
    /// # Errors
    ///
    /// [`ContainerError::TooLarge`] if `body` does not fit the 32-bit length
    /// field, or any I/O error from the underlying writer. Nothing is
    /// written in the first case.
    pub fn write_frame(&mut self, kind: ObjectType, body: &[u8]) -> Result<(), ContainerError> {
        let len = u32::try_from(body.len()).map_err(|_| ContainerError::TooLarge {
            len: body.len() as u64,
            max: u64::from(u32::MAX),
        })?;

        self.buf.clear();
        self.buf.write_u16::<BigEndian>(MAGIC)?;
        self.buf.write_u16::<BigEndian>(kind.code())?;
        self.buf.write_u32::<BigEndian>(len)?;
        self.buf.extend_from_slice(body);

        self.out.write_all(&self.buf)?;
        self.written += self.buf.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ContainerError> {
        self.out.flush()?;
        Ok(())
    }

    /// Bytes of frames in the output so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

// -------------------- Reader --------------------

/// Reader limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Frames with a longer body are rejected before any allocation.
    pub max_record_len: u32,
    /// Treat a partial frame at the end of the stream as end of stream
    /// instead of an error. Useful on files still being written.
    pub tolerate_truncated_tail: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            tolerate_truncated_tail: false,
        }
    }
}

/// Sequential frame reader.
///
/// Callers alternate [`next_header`](Self::next_header) with exactly one of
/// [`read_body`](Self::read_body) or [`skip_body`](Self::skip_body), or use
/// [`next_frame`](Self::next_frame) which does both.
pub struct ContainerReader<R: Read> {
    rdr: BufReader<R>,
    opts: ReadOptions,
    offset: u64,
}

impl ContainerReader<File> {
    /// Opens a file for sequential reading.
    pub fn open<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<Self, ContainerError> {
        let f = File::open(path)?;
        Ok(Self::with_options(f, opts))
    }
}

impl<R: Read> ContainerReader<R> {
    pub fn from_reader(reader: R) -> Self {
        Self::with_options(reader, ReadOptions::default())
    }

    pub fn with_options(reader: R, opts: ReadOptions) -> Self {
        ContainerReader {
            rdr: BufReader::new(reader),
            opts,
            offset: 0,
        }
    }

    /// Bytes consumed so far. Between frames this is the offset of the next
    /// header.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Reads the next header.
    ///
    /// Returns `None` at a clean end of stream, at a zero-length ping or
    /// traceroute header, and at a partial header when truncated tails are
    /// tolerated.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::BadMagic`] if the header does not start with [`MAGIC`].
    /// - [`ContainerError::TooLarge`] if the body exceeds `max_record_len`.
    /// - [`ContainerError::Truncated`] on a partial header, unless tolerated.
    pub fn next_header(&mut self) -> Result<Option<FrameHeader>, ContainerError> {
        let start = self.offset;
        let mut hdr = [0u8; HEADER_LEN];
        let got = self.fill(&mut hdr)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_LEN {
            return self.truncated(start, HEADER_LEN as u64, got as u64);
        }

        let mut h = &hdr[..];
        let magic = h.read_u16::<BigEndian>()?;
        let kind = h.read_u16::<BigEndian>()?;
        let len = h.read_u32::<BigEndian>()?;
        if magic != MAGIC {
            return Err(ContainerError::BadMagic {
                found: magic,
                offset: start,
            });
        }
        if len > self.opts.max_record_len {
            return Err(ContainerError::TooLarge {
                len: u64::from(len),
                max: u64::from(self.opts.max_record_len),
            });
        }

        let header = FrameHeader { kind, len };
        if len == 0 && header.object_type().is_some_and(ObjectType::zero_len_is_eof) {
            debug!(offset = start, kind, "zero-length record marks end of stream");
            return Ok(None);
        }
        Ok(Some(header))
    }

    /// Reads the body belonging to `header`. Returns `None` if the stream
    /// ends inside it and truncated tails are tolerated.
    pub fn read_body(&mut self, header: &FrameHeader) -> Result<Option<Vec<u8>>, ContainerError> {
        let start = self.offset;
        let want = u64::from(header.len);
        let mut body = Vec::with_capacity(header.len as usize);
        let got = (&mut self.rdr).take(want).read_to_end(&mut body)? as u64;
        self.offset += got;
        if got < want {
            return self.truncated(start, want, got);
        }
        Ok(Some(body))
    }

    /// Discards the body belonging to `header`. Returns `None` if the stream
    /// ends inside it and truncated tails are tolerated.
    pub fn skip_body(&mut self, header: &FrameHeader) -> Result<Option<()>, ContainerError> {
        let start = self.offset;
        let want = u64::from(header.len);
        let got = io::copy(&mut (&mut self.rdr).take(want), &mut io::sink())?;
        self.offset += got;
        if got < want {
            return self.truncated(start, want, got);
        }
        Ok(Some(()))
    }

    /// Reads the next header and its body.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ContainerError> {
        let Some(header) = self.next_header()? else {
            return Ok(None);
        };
        Ok(self
            .read_body(&header)?
            .map(|body| Frame { header, body }))
    }

    /// Reads until `buf` is full or the stream ends, returning the count.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, ContainerError> {
        let mut n = 0;
        while n < buf.len() {
            match self.rdr.read(&mut buf[n..]) {
                Ok(0) => break,
                Ok(k) => n += k,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.offset += n as u64;
        Ok(n)
    }

    fn truncated<T>(&self, offset: u64, needed: u64, got: u64) -> Result<Option<T>, ContainerError> {
        if self.opts.tolerate_truncated_tail {
            warn!(offset, needed, got, "ignoring truncated frame at end of input");
            return Ok(None);
        }
        Err(ContainerError::Truncated {
            offset,
            needed,
            got,
        })
    }
}
