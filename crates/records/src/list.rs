//! Lists, cycles, and the deprecated address object.
//!
//! ```text
//! list        : [file_id u32][list_id u32][name str]   params{1 descr, 2 monitor}
//! cycle start : [file_id u32][list_file_id u32][cycle_id u32][start u32]
//!               params{1 stop_time u32, 2 hostname}
//! cycle def   : same as cycle start
//! cycle stop  : [cycle_file_id u32][stop_time u32]     params{}
//! address     : [id u8][type u8][bytes]                 (read only)
//! ```

use std::sync::Arc;

use intern::{ReadScope, ReadTable, WriteScope};
use params::{Field, FieldDesc, ParamsRead, ParamsWrite, Schema};
use wire::{string_size, Addr, DecodeError, EncodeError, WireReader, WireWriter};

use crate::FileTables;

/// A named collection of measurement targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct List {
    pub id: u32,
    pub name: String,
    pub descr: Option<String>,
    pub monitor: Option<String>,
}

impl List {
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        List {
            id,
            name: name.into(),
            descr: None,
            monitor: None,
        }
    }
}

/// One pass over a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cycle {
    pub list: Arc<List>,
    pub id: u32,
    pub start_time: u32,
    /// Zero until the cycle has been stopped.
    pub stop_time: u32,
    pub hostname: Option<String>,
}

impl Cycle {
    #[must_use]
    pub fn new(list: Arc<List>, id: u32, start_time: u32) -> Self {
        Cycle {
            list,
            id,
            start_time,
            stop_time: 0,
            hostname: None,
        }
    }

    /// Identity of a cycle independent of when it stopped, which is what a
    /// writer keys its cycle table on.
    #[must_use]
    pub fn key(&self) -> CycleKey {
        CycleKey {
            list: Arc::clone(&self.list),
            id: self.id,
            start_time: self.start_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CycleKey {
    pub list: Arc<List>,
    pub id: u32,
    pub start_time: u32,
}

// -------------------- Lists --------------------

static LIST_FIELDS: [FieldDesc; 2] = [FieldDesc::var(1), FieldDesc::var(2)];
static LIST_SCHEMA: Schema = Schema::new("list", &LIST_FIELDS);

struct ListParams<'a>(&'a List);

impl ParamsWrite for ListParams<'_> {
    const SCHEMA: &'static Schema = &LIST_SCHEMA;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        match id {
            1 => self.0.descr.as_deref().map(Field::Str),
            2 => self.0.monitor.as_deref().map(Field::Str),
            _ => None,
        }
    }
}

impl ParamsRead for List {
    const SCHEMA: &'static Schema = &LIST_SCHEMA;

    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        _scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        match id {
            1 => self.descr = Some(r.string()?),
            2 => self.monitor = Some(r.string()?),
            _ => {}
        }
        Ok(())
    }
}

/// Encodes a list object body under file id `file_id`.
pub fn encode_list(list: &List, file_id: u32) -> Result<Vec<u8>, EncodeError> {
    let mut scope = WriteScope::new();
    let p = ListParams(list);
    let plan = params::plan(&p, &mut scope)?;
    let len = 4 + 4 + string_size(&list.name)? + plan.encoded_len();

    let mut w = WireWriter::with_len(len);
    w.put_u32(file_id);
    w.put_u32(list.id);
    w.put_string(&list.name);
    params::write(&p, &plan, &mut w, &mut scope);
    Ok(w.finish())
}

/// Decodes a list object body. Its file id must be the next one `tables`
/// expects.
pub fn decode_list(body: &[u8], tables: &FileTables) -> Result<List, DecodeError> {
    let mut r = WireReader::new(body);
    let file_id = r.u32()?;
    if file_id != tables.lists.next_id() {
        return Err(DecodeError::Malformed("list file id out of sequence"));
    }
    let mut list = List::new(r.u32()?, r.string()?);
    let mut scope = ReadScope::new(&tables.addrs);
    params::read(&mut list, &mut r, &mut scope)?;
    Ok(list)
}

// -------------------- Cycles --------------------

static CYCLE_FIELDS: [FieldDesc; 2] = [FieldDesc::fixed(1, 4), FieldDesc::var(2)];
static CYCLE_SCHEMA: Schema = Schema::new("cycle", &CYCLE_FIELDS);

struct CycleParams<'a>(&'a Cycle);

impl ParamsWrite for CycleParams<'_> {
    const SCHEMA: &'static Schema = &CYCLE_SCHEMA;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        match id {
            1 if self.0.stop_time != 0 => Some(Field::U32(self.0.stop_time)),
            2 => self.0.hostname.as_deref().map(Field::Str),
            _ => None,
        }
    }
}

#[derive(Default)]
struct CycleFields {
    stop_time: u32,
    hostname: Option<String>,
}

impl ParamsRead for CycleFields {
    const SCHEMA: &'static Schema = &CYCLE_SCHEMA;

    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        _scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        match id {
            1 => self.stop_time = r.u32()?,
            2 => self.hostname = Some(r.string()?),
            _ => {}
        }
        Ok(())
    }
}

/// Encodes a cycle start or cycle definition body.
pub fn encode_cycle(cycle: &Cycle, file_id: u32, list_file_id: u32) -> Result<Vec<u8>, EncodeError> {
    let mut scope = WriteScope::new();
    let p = CycleParams(cycle);
    let plan = params::plan(&p, &mut scope)?;

    let mut w = WireWriter::with_len(16 + plan.encoded_len());
    w.put_u32(file_id);
    w.put_u32(list_file_id);
    w.put_u32(cycle.id);
    w.put_u32(cycle.start_time);
    params::write(&p, &plan, &mut w, &mut scope);
    Ok(w.finish())
}

/// Decodes a cycle start or definition body, resolving its list.
pub fn decode_cycle(body: &[u8], tables: &FileTables) -> Result<Cycle, DecodeError> {
    let mut r = WireReader::new(body);
    let file_id = r.u32()?;
    if file_id != tables.cycles.next_id() {
        return Err(DecodeError::Malformed("cycle file id out of sequence"));
    }
    let list_id = r.u32()?;
    let list = tables
        .list(list_id)?
        .ok_or(DecodeError::MissingField("cycle list"))?;
    let mut cycle = Cycle::new(list, r.u32()?, r.u32()?);

    let mut fields = CycleFields::default();
    let mut scope = ReadScope::new(&tables.addrs);
    params::read(&mut fields, &mut r, &mut scope)?;
    cycle.stop_time = fields.stop_time;
    cycle.hostname = fields.hostname;
    Ok(cycle)
}

static EMPTY_FIELDS: [FieldDesc; 0] = [];
pub(crate) static EMPTY_SCHEMA: Schema = Schema::new("empty", &EMPTY_FIELDS);

/// Parameter block with no known fields. Writes as a single zero byte and
/// skips whatever a newer writer put there.
pub(crate) struct NoParams;

impl ParamsWrite for NoParams {
    const SCHEMA: &'static Schema = &EMPTY_SCHEMA;

    fn field(&self, _id: u16) -> Option<Field<'_>> {
        None
    }
}

impl ParamsRead for NoParams {
    const SCHEMA: &'static Schema = &EMPTY_SCHEMA;

    fn read_field(
        &mut self,
        _id: u16,
        _r: &mut WireReader<'_>,
        _scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        Ok(())
    }
}

pub fn encode_cycle_stop(file_id: u32, stop_time: u32) -> Vec<u8> {
    let mut w = WireWriter::with_len(9);
    w.put_u32(file_id);
    w.put_u32(stop_time);
    w.put_u8(0);
    w.finish()
}

/// Returns the stopped cycle's file id and its stop time.
pub fn decode_cycle_stop(body: &[u8], tables: &FileTables) -> Result<(u32, u32), DecodeError> {
    let mut r = WireReader::new(body);
    let file_id = r.u32()?;
    let stop_time = r.u32()?;
    let mut scope = ReadScope::new(&tables.addrs);
    params::read(&mut NoParams, &mut r, &mut scope)?;
    Ok((file_id, stop_time))
}

// -------------------- Legacy addresses --------------------

/// Decodes a deprecated file-scoped address object. Its id byte must be
/// the table's next id modulo 256.
pub fn decode_legacy_addr(body: &[u8], table: &ReadTable<Addr>) -> Result<Addr, DecodeError> {
    let mut r = WireReader::new(body);
    let id = r.u8()?;
    if u32::from(id) != table.next_id() % 256 {
        return Err(DecodeError::Malformed("legacy address id out of sequence"));
    }
    let kind = r.u8()?;
    let rest = r.remaining();
    Addr::from_parts(kind, r.bytes(rest)?)
}
