use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use config::WartsConfig;
use container::{ContainerReader, ObjectType, ReadOptions};
use records::{list, ping, trace, FileTables};
use tracing::debug;
use wire::DecodeError;

use crate::{WartsError, WartsObject};

/// Sequential object reader.
///
/// Lists, cycles and legacy addresses are decoded whatever the filter says,
/// since later records refer to them; they are only returned when selected.
/// Other frames that are not selected are skipped without decoding, as are
/// object types this crate has no codec for.
pub struct WartsReader<R: Read> {
    frames: ContainerReader<R>,
    tables: FileTables,
    /// Indexed by type code; `None` selects everything.
    filter: Option<[bool; 17]>,
    skipped: u64,
}

/// An object together with the frame it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObject {
    /// Offset of the frame header.
    pub offset: u64,
    pub object: WartsObject,
    pub body: Vec<u8>,
}

impl WartsReader<File> {
    pub fn open<P: AsRef<Path>>(path: P, cfg: &WartsConfig) -> Result<Self, WartsError> {
        let f = File::open(path)?;
        Ok(Self::from_reader(f, cfg))
    }
}

impl<R: Read> WartsReader<R> {
    pub fn from_reader(reader: R, cfg: &WartsConfig) -> Self {
        let opts = ReadOptions {
            max_record_len: cfg.max_record_len,
            tolerate_truncated_tail: cfg.tolerate_truncated_tail,
        };
        WartsReader {
            frames: ContainerReader::with_options(reader, opts),
            tables: FileTables::new(),
            filter: None,
            skipped: 0,
        }
    }

    /// Restricts [`read`](Self::read) to the given object types.
    #[must_use]
    pub fn with_filter<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = ObjectType>,
    {
        let mut sel = [false; 17];
        for t in types {
            sel[usize::from(t.code())] = true;
        }
        self.filter = Some(sel);
        self
    }

    fn selected(&self, kind: ObjectType) -> bool {
        self.filter.map_or(true, |sel| sel[usize::from(kind.code())])
    }

    /// File-scoped tables built from the objects read so far.
    #[must_use]
    pub fn tables(&self) -> &FileTables {
        &self.tables
    }

    pub fn into_tables(self) -> FileTables {
        self.tables
    }

    /// Frames passed over without decoding, either filtered out or of a
    /// type this crate cannot decode.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Offset of the next frame.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.frames.position()
    }

    /// Returns the next selected object, or `None` at end of file.
    ///
    /// # Errors
    ///
    /// Framing errors end the file. A [`WartsError::Decode`] leaves the
    /// reader at the following frame, so callers may keep reading.
    pub fn read(&mut self) -> Result<Option<WartsObject>, WartsError> {
        Ok(self.read_raw()?.map(|raw| raw.object))
    }

    /// Like [`read`](Self::read), but also hands back the undecoded body.
    pub fn read_raw(&mut self) -> Result<Option<RawObject>, WartsError> {
        loop {
            let offset = self.frames.position();
            let Some(header) = self.frames.next_header()? else {
                return Ok(None);
            };

            let kind = match header.object_type() {
                Some(kind) if decodable(kind) => kind,
                other => {
                    debug!(offset, code = header.kind, known = other.is_some(), "skipping object");
                    self.skipped += 1;
                    if self.frames.skip_body(&header)?.is_none() {
                        return Ok(None);
                    }
                    continue;
                }
            };

            let selected = self.selected(kind);
            if !selected && !is_bookkeeping(kind) {
                debug!(offset, kind = kind.name(), "filtered out");
                self.skipped += 1;
                if self.frames.skip_body(&header)?.is_none() {
                    return Ok(None);
                }
                continue;
            }

            let Some(body) = self.frames.read_body(&header)? else {
                return Ok(None);
            };
            let object = self
                .decode_body(kind, &body)
                .map_err(WartsError::decode(kind, offset))?;
            if selected {
                return Ok(Some(RawObject {
                    offset,
                    object,
                    body,
                }));
            }
        }
    }

    fn decode_body(&mut self, kind: ObjectType, body: &[u8]) -> Result<WartsObject, DecodeError> {
        let t = &mut self.tables;
        let obj = match kind {
            ObjectType::List => {
                let l = Arc::new(list::decode_list(body, t)?);
                t.lists.push(Arc::clone(&l))?;
                WartsObject::List(l)
            }
            ObjectType::CycleStart | ObjectType::CycleDef => {
                let c = Arc::new(list::decode_cycle(body, t)?);
                t.cycles.push(Arc::clone(&c))?;
                if kind == ObjectType::CycleStart {
                    WartsObject::CycleStart(c)
                } else {
                    WartsObject::CycleDef(c)
                }
            }
            ObjectType::CycleStop => {
                let (id, stop) = list::decode_cycle_stop(body, t)?;
                let slot = t.cycles.get_mut(id)?;
                Arc::make_mut(slot).stop_time = stop;
                WartsObject::CycleStop(Arc::clone(slot))
            }
            ObjectType::Addr => {
                let a = list::decode_legacy_addr(body, &t.addrs)?;
                t.addrs.push(a)?;
                WartsObject::Addr(a)
            }
            ObjectType::Trace => WartsObject::Trace(Box::new(trace::decode(body, t)?)),
            ObjectType::Ping => WartsObject::Ping(Box::new(ping::decode(body, t)?)),
            _ => return Err(DecodeError::Malformed("object type without a decoder")),
        };
        Ok(obj)
    }
}

fn decodable(kind: ObjectType) -> bool {
    is_bookkeeping(kind) || matches!(kind, ObjectType::Trace | ObjectType::Ping)
}

fn is_bookkeeping(kind: ObjectType) -> bool {
    matches!(
        kind,
        ObjectType::List
            | ObjectType::CycleStart
            | ObjectType::CycleDef
            | ObjectType::CycleStop
            | ObjectType::Addr
    )
}
