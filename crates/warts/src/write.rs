use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use config::WartsConfig;
use container::{ContainerWriter, ObjectType};
use intern::WriteTable;
use records::list::{self, CycleKey};
use records::{ping, trace, Cycle, List, Ping, RefIds, Trace};
use tracing::debug;
use wire::EncodeError;

use crate::{WartsError, WartsObject, WartsReader};

/// Object writer.
///
/// Lists and cycles get file ids from 1 in the order they reach the file.
/// Writing a record whose list or cycle the file has not seen yet first
/// emits a list object and a cycle definition for it.
pub struct WartsWriter<W: Write> {
    frames: ContainerWriter<W>,
    lists: WriteTable<Arc<List>>,
    cycles: WriteTable<CycleKey>,
}

/// Bodies to emit ahead of a record, with the ids they will take.
#[derive(Default)]
struct Pending<'a> {
    lists: Vec<&'a Arc<List>>,
    cycle: Option<&'a Arc<Cycle>>,
}

impl WartsWriter<BufWriter<File>> {
    /// Creates `path`, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, WartsError> {
        let f = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(f)))
    }

    /// Opens `path` for appending, first reading it to learn which lists and
    /// cycles it already holds. A missing file is created.
    pub fn append<P: AsRef<Path>>(path: P, cfg: &WartsConfig) -> Result<Self, WartsError> {
        let path = path.as_ref();
        let strict = WartsConfig {
            tolerate_truncated_tail: false,
            ..cfg.clone()
        };

        let mut lists = WriteTable::with_base(1);
        let mut cycles = WriteTable::with_base(1);
        let mut offset = 0;
        if path.exists() {
            let mut reader = WartsReader::open(path, &strict)?.with_filter(std::iter::empty());
            while reader.read()?.is_some() {}
            offset = reader.position();
            let tables = reader.into_tables();
            for l in tables.lists.iter() {
                lists.insert(Arc::clone(l));
            }
            for c in tables.cycles.iter() {
                cycles.insert(c.key());
            }
            debug!(
                path = %path.display(),
                lists = lists.len(),
                cycles = cycles.len(),
                "appending to existing file"
            );
        }

        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(WartsWriter {
            frames: ContainerWriter::with_offset(BufWriter::new(f), offset),
            lists,
            cycles,
        })
    }
}

impl<W: Write> WartsWriter<W> {
    pub fn from_writer(out: W) -> Self {
        WartsWriter {
            frames: ContainerWriter::new(out),
            lists: WriteTable::with_base(1),
            cycles: WriteTable::with_base(1),
        }
    }

    /// Bytes written so far, including any existing file content.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.frames.position()
    }

    /// File id of `list`, if it has been written.
    #[must_use]
    pub fn list_id(&self, list: &Arc<List>) -> Option<u32> {
        self.lists.get(list)
    }

    #[must_use]
    pub fn cycle_id(&self, cycle: &Cycle) -> Option<u32> {
        self.cycles.get(&cycle.key())
    }

    /// Writes a list object unless the file already has it. Returns its
    /// file id.
    pub fn write_list(&mut self, list: &Arc<List>) -> Result<u32, WartsError> {
        let mut pending = Pending::default();
        let id = self.list_ref(list, &mut pending);
        self.emit(&pending)?;
        Ok(id)
    }

    /// Writes a cycle start object, preceded by its list if needed. A cycle
    /// the file already has is not written again. Returns its file id.
    pub fn write_cycle_start(&mut self, cycle: &Arc<Cycle>) -> Result<u32, WartsError> {
        self.write_cycle(cycle, ObjectType::CycleStart)
    }

    pub fn write_cycle_def(&mut self, cycle: &Arc<Cycle>) -> Result<u32, WartsError> {
        self.write_cycle(cycle, ObjectType::CycleDef)
    }

    fn write_cycle(&mut self, cycle: &Arc<Cycle>, kind: ObjectType) -> Result<u32, WartsError> {
        if let Some(id) = self.cycles.get(&cycle.key()) {
            return Ok(id);
        }
        let mut pending = Pending::default();
        let list_id = self.list_ref(&cycle.list, &mut pending);
        let id = self.cycles.peek_next();
        let body = list::encode_cycle(cycle, id, list_id).map_err(WartsError::encode(kind))?;
        self.emit(&pending)?;
        self.frames.write_frame(kind, &body)?;
        self.cycles.insert(cycle.key());
        Ok(id)
    }

    /// Writes a cycle stop carrying `cycle.stop_time`.
    ///
    /// # Errors
    ///
    /// [`WartsError::Encode`] if the cycle was never written to this file.
    pub fn write_cycle_stop(&mut self, cycle: &Cycle) -> Result<(), WartsError> {
        let id = self.cycles.get(&cycle.key()).ok_or(WartsError::Encode {
            kind: ObjectType::CycleStop,
            source: EncodeError::DanglingReference("cycle stop for a cycle not in this file"),
        })?;
        let body = list::encode_cycle_stop(id, cycle.stop_time);
        self.frames.write_frame(ObjectType::CycleStop, &body)?;
        Ok(())
    }

    pub fn write_ping(&mut self, p: &Ping) -> Result<(), WartsError> {
        let mut pending = Pending::default();
        let refs = self.refs(p.list.as_ref(), p.cycle.as_ref(), &mut pending);
        let body = ping::encode(p, refs).map_err(WartsError::encode(ObjectType::Ping))?;
        self.emit(&pending)?;
        self.frames.write_frame(ObjectType::Ping, &body)?;
        Ok(())
    }

    pub fn write_trace(&mut self, t: &Trace) -> Result<(), WartsError> {
        let mut pending = Pending::default();
        let refs = self.refs(t.list.as_ref(), t.cycle.as_ref(), &mut pending);
        let body = trace::encode(t, refs).map_err(WartsError::encode(ObjectType::Trace))?;
        self.emit(&pending)?;
        self.frames.write_frame(ObjectType::Trace, &body)?;
        Ok(())
    }

    /// Writes any object a [`WartsReader`] returns, except legacy
    /// addresses.
    pub fn write_object(&mut self, obj: &WartsObject) -> Result<(), WartsError> {
        match obj {
            WartsObject::List(l) => self.write_list(l).map(drop),
            WartsObject::CycleStart(c) => self.write_cycle_start(c).map(drop),
            WartsObject::CycleDef(c) => self.write_cycle_def(c).map(drop),
            WartsObject::CycleStop(c) => self.write_cycle_stop(c),
            WartsObject::Addr(_) => Err(WartsError::ReadOnly(ObjectType::Addr)),
            WartsObject::Trace(t) => self.write_trace(t),
            WartsObject::Ping(p) => self.write_ping(p),
        }
    }

    pub fn flush(&mut self) -> Result<(), WartsError> {
        self.frames.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.frames.into_inner()
    }

    // -------------------- Reference planning --------------------

    /// File id `list` has or will have once `pending` is emitted.
    fn list_ref<'a>(&self, list: &'a Arc<List>, pending: &mut Pending<'a>) -> u32 {
        if let Some(id) = self.lists.get(list) {
            return id;
        }
        let base = self.lists.peek_next();
        if let Some(i) = pending.lists.iter().position(|l| *l == list) {
            return base + i as u32;
        }
        pending.lists.push(list);
        base + (pending.lists.len() - 1) as u32
    }

    fn refs<'a>(
        &self,
        list: Option<&'a Arc<List>>,
        cycle: Option<&'a Arc<Cycle>>,
        pending: &mut Pending<'a>,
    ) -> RefIds {
        let mut refs = RefIds::default();
        if let Some(l) = list {
            refs.list = self.list_ref(l, pending);
        }
        if let Some(c) = cycle {
            refs.cycle = match self.cycles.get(&c.key()) {
                Some(id) => id,
                None => {
                    self.list_ref(&c.list, pending);
                    pending.cycle = Some(c);
                    self.cycles.peek_next()
                }
            };
        }
        refs
    }

    /// Writes the list and cycle definitions a record needs, committing
    /// each id once its frame is out.
    fn emit(&mut self, pending: &Pending<'_>) -> Result<(), WartsError> {
        let mut bodies = Vec::with_capacity(pending.lists.len());
        for (i, l) in pending.lists.iter().enumerate() {
            let id = self.lists.peek_next() + i as u32;
            bodies.push(list::encode_list(l, id).map_err(WartsError::encode(ObjectType::List))?);
        }
        let cycle_body = match pending.cycle {
            None => None,
            Some(c) => {
                let list_id = match self.lists.get(&c.list) {
                    Some(id) => id,
                    None => self.planned_list_id(pending, &c.list),
                };
                let id = self.cycles.peek_next();
                Some(
                    list::encode_cycle(c, id, list_id)
                        .map_err(WartsError::encode(ObjectType::CycleDef))?,
                )
            }
        };

        for (l, body) in pending.lists.iter().zip(&bodies) {
            self.frames.write_frame(ObjectType::List, body)?;
            let id = self.lists.insert(Arc::clone(l));
            debug!(id, name = %l.name, "wrote list definition");
        }
        if let (Some(c), Some(body)) = (pending.cycle, cycle_body) {
            self.frames.write_frame(ObjectType::CycleDef, &body)?;
            let id = self.cycles.insert(c.key());
            debug!(id, cycle = c.id, "wrote cycle definition");
        }
        Ok(())
    }

    fn planned_list_id(&self, pending: &Pending<'_>, list: &Arc<List>) -> u32 {
        let i = pending
            .lists
            .iter()
            .position(|l| *l == list)
            .unwrap_or(pending.lists.len());
        self.lists.peek_next() + i as u32
    }
}
