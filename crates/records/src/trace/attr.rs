//! Attribute blocks appended after the hop sequence.
//!
//! ```text
//! [hdr u16 = type << 12 | len][body: len bytes] ... [0x0000]
//!
//! PMTUD     : params{ifmtu, pmtu, outmtu, ver, notec}
//!             [hop_count u16][hop blocks][note params] * notec
//! LASTDITCH : params{}  [hop_count u16][hop blocks]
//! DTREE     : params{lss gid, gss gid, firsthop, lss_stop, gss_stop, lss, flags}
//! ```
//!
//! Readers skip attribute types they do not know by length.

use intern::{ReadScope, WriteScope};
use params::{Field, FieldDesc, ParamsRead, ParamsWrite, Plan, Schema};
use tracing::trace;
use wire::{DecodeError, EncodeError, WireReader, WireWriter};

use super::hop::{read_hops, HopPlan};
use super::{Dtree, LastDitch, Pmtud, PmtudNote, Trace};
use crate::list::NoParams;

const ATTR_EOF: u16 = 0x0000;
const ATTR_PMTUD: u16 = 0x1;
const ATTR_LASTDITCH: u16 = 0x2;
const ATTR_DTREE: u16 = 0x3;
const ATTR_MAX_LEN: usize = 0x0fff;

// -------------------- Schemas --------------------

static PMTUD_FIELDS: [FieldDesc; 5] = [
    FieldDesc::fixed(1, 2),
    FieldDesc::fixed(2, 2),
    FieldDesc::fixed(3, 2),
    FieldDesc::fixed(4, 1),
    FieldDesc::fixed(5, 1),
];
static PMTUD_SCHEMA: Schema = Schema::new("pmtud", &PMTUD_FIELDS);

static NOTE_FIELDS: [FieldDesc; 3] = [
    FieldDesc::fixed(1, 1),
    FieldDesc::fixed(2, 2),
    FieldDesc::fixed(3, 2),
];
static NOTE_SCHEMA: Schema = Schema::new("pmtud note", &NOTE_FIELDS);

static DTREE_FIELDS: [FieldDesc; 7] = [
    FieldDesc::retired(1, 4),
    FieldDesc::retired(2, 4),
    FieldDesc::fixed(3, 1),
    FieldDesc::var(4),
    FieldDesc::var(5),
    FieldDesc::var(6),
    FieldDesc::fixed(7, 1),
];
static DTREE_SCHEMA: Schema = Schema::new("dtree", &DTREE_FIELDS);

// -------------------- Encode --------------------

struct PmtudParams<'a>(&'a Pmtud);

impl ParamsWrite for PmtudParams<'_> {
    const SCHEMA: &'static Schema = &PMTUD_SCHEMA;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        let p = self.0;
        match id {
            1 if p.ifmtu != 0 => Some(Field::U16(p.ifmtu)),
            2 if p.pmtu != 0 => Some(Field::U16(p.pmtu)),
            3 if p.outmtu != 0 => Some(Field::U16(p.outmtu)),
            4 => Some(Field::U8(p.ver)),
            5 if !p.notes.is_empty() => Some(Field::U8(p.notes.len() as u8)),
            _ => None,
        }
    }
}

struct NoteParams<'a> {
    note: &'a PmtudNote,
    ordinal: Option<u16>,
}

impl ParamsWrite for NoteParams<'_> {
    const SCHEMA: &'static Schema = &NOTE_SCHEMA;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        match id {
            1 if self.note.kind != 0 => Some(Field::U8(self.note.kind)),
            2 if self.note.nhmtu != 0 => Some(Field::U16(self.note.nhmtu)),
            3 => self.ordinal.map(Field::U16),
            _ => None,
        }
    }
}

struct DtreeParams<'a>(&'a Dtree);

impl ParamsWrite for DtreeParams<'_> {
    const SCHEMA: &'static Schema = &DTREE_SCHEMA;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        let d = self.0;
        match id {
            3 => Some(Field::U8(d.firsthop)),
            4 => d.lss_stop.as_ref().map(Field::Addr),
            5 => d.gss_stop.as_ref().map(Field::Addr),
            6 => d.lss.as_deref().map(Field::Str),
            7 if d.flags != 0 => Some(Field::U8(d.flags)),
            _ => None,
        }
    }
}

struct PmtudPlan<'a> {
    head: (PmtudParams<'a>, Plan),
    hops: HopPlan<'a>,
    notes: Vec<(NoteParams<'a>, Plan)>,
    len: usize,
}

impl<'a> PmtudPlan<'a> {
    fn new(pmtud: &'a Pmtud, scope: &mut WriteScope) -> Result<Self, EncodeError> {
        EncodeError::check_len("pmtud notes", pmtud.notes.len(), usize::from(u8::MAX))?;
        let head = PmtudParams(pmtud);
        let head_plan = params::plan(&head, scope)?;
        let hops = HopPlan::new(pmtud.probes.iter(), scope)?;
        let mut len = head_plan.encoded_len() + hops.encoded_len();

        let mut notes = Vec::with_capacity(pmtud.notes.len());
        for note in &pmtud.notes {
            let ordinal = match note.reply {
                None => None,
                Some(at) => {
                    let n = pmtud
                        .ordinal(at)
                        .ok_or(EncodeError::DanglingReference("pmtud note reply"))?;
                    EncodeError::check_len("pmtud note reply", n, usize::from(u16::MAX))?;
                    Some(n as u16)
                }
            };
            let np = NoteParams { note, ordinal };
            let plan = params::plan(&np, scope)?;
            len += plan.encoded_len();
            notes.push((np, plan));
        }
        EncodeError::check_len("pmtud attribute", len, ATTR_MAX_LEN)?;
        Ok(PmtudPlan {
            head: (head, head_plan),
            hops,
            notes,
            len,
        })
    }

    fn write(&self, w: &mut WireWriter, scope: &mut WriteScope) {
        params::write(&self.head.0, &self.head.1, w, scope);
        self.hops.write(w, scope);
        for (np, plan) in &self.notes {
            params::write(np, plan, w, scope);
        }
    }
}

struct LastDitchPlan<'a> {
    head: Plan,
    hops: HopPlan<'a>,
    len: usize,
}

impl<'a> LastDitchPlan<'a> {
    fn new(ld: &'a LastDitch, scope: &mut WriteScope) -> Result<Self, EncodeError> {
        let head = params::plan(&NoParams, scope)?;
        let hops = HopPlan::new(ld.probes.iter(), scope)?;
        let len = head.encoded_len() + hops.encoded_len();
        EncodeError::check_len("last-ditch attribute", len, ATTR_MAX_LEN)?;
        Ok(LastDitchPlan { head, hops, len })
    }

    fn write(&self, w: &mut WireWriter, scope: &mut WriteScope) {
        params::write(&NoParams, &self.head, w, scope);
        self.hops.write(w, scope);
    }
}

/// Size-pass result for every attribute a trace carries plus the
/// terminator.
pub(super) struct AttrPlan<'a> {
    pmtud: Option<PmtudPlan<'a>>,
    lastditch: Option<LastDitchPlan<'a>>,
    dtree: Option<(DtreeParams<'a>, Plan)>,
}

impl<'a> AttrPlan<'a> {
    pub(super) fn new(trace: &'a Trace, scope: &mut WriteScope) -> Result<Self, EncodeError> {
        let pmtud = trace
            .pmtud
            .as_ref()
            .map(|p| PmtudPlan::new(p, scope))
            .transpose()?;
        let lastditch = trace
            .lastditch
            .as_ref()
            .map(|ld| LastDitchPlan::new(ld, scope))
            .transpose()?;
        let dtree = match &trace.dtree {
            None => None,
            Some(d) => {
                let dp = DtreeParams(d);
                let plan = params::plan(&dp, scope)?;
                EncodeError::check_len("dtree attribute", plan.encoded_len(), ATTR_MAX_LEN)?;
                Some((dp, plan))
            }
        };
        Ok(AttrPlan {
            pmtud,
            lastditch,
            dtree,
        })
    }

    pub(super) fn encoded_len(&self) -> usize {
        let mut len = 2;
        if let Some(p) = &self.pmtud {
            len += 2 + p.len;
        }
        if let Some(ld) = &self.lastditch {
            len += 2 + ld.len;
        }
        if let Some((_, plan)) = &self.dtree {
            len += 2 + plan.encoded_len();
        }
        len
    }

    pub(super) fn write(&self, w: &mut WireWriter, scope: &mut WriteScope) {
        if let Some(p) = &self.pmtud {
            put_header(w, ATTR_PMTUD, p.len);
            p.write(w, scope);
        }
        if let Some(ld) = &self.lastditch {
            put_header(w, ATTR_LASTDITCH, ld.len);
            ld.write(w, scope);
        }
        if let Some((dp, plan)) = &self.dtree {
            put_header(w, ATTR_DTREE, plan.encoded_len());
            params::write(dp, plan, w, scope);
        }
        w.put_u16(ATTR_EOF);
    }
}

fn put_header(w: &mut WireWriter, kind: u16, len: usize) {
    w.put_u16((kind << 12) | len as u16);
}

// -------------------- Decode --------------------

struct PmtudReader(Pmtud, u8);

impl ParamsRead for PmtudReader {
    const SCHEMA: &'static Schema = &PMTUD_SCHEMA;

    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        _scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        match id {
            1 => self.0.ifmtu = r.u16()?,
            2 => self.0.pmtu = r.u16()?,
            3 => self.0.outmtu = r.u16()?,
            4 => self.0.ver = r.u8()?,
            5 => self.1 = r.u8()?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Default)]
struct NoteReader {
    note: PmtudNote,
    ordinal: Option<u16>,
}

impl ParamsRead for NoteReader {
    const SCHEMA: &'static Schema = &NOTE_SCHEMA;

    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        _scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        match id {
            1 => self.note.kind = r.u8()?,
            2 => self.note.nhmtu = r.u16()?,
            3 => self.ordinal = Some(r.u16()?),
            _ => {}
        }
        Ok(())
    }
}

impl ParamsRead for Dtree {
    const SCHEMA: &'static Schema = &DTREE_SCHEMA;

    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        match id {
            1 => self.lss_stop = Some(scope.legacy_addr(r)?),
            2 => self.gss_stop = Some(scope.legacy_addr(r)?),
            3 => self.firsthop = r.u8()?,
            4 => self.lss_stop = Some(scope.read_addr(r)?),
            5 => self.gss_stop = Some(scope.read_addr(r)?),
            6 => self.lss = Some(r.string()?),
            7 => self.flags = r.u8()?,
            _ => {}
        }
        Ok(())
    }
}

fn read_pmtud(r: &mut WireReader<'_>, scope: &mut ReadScope<'_>) -> Result<Pmtud, DecodeError> {
    let mut pr = PmtudReader(Pmtud::default(), 0);
    params::read(&mut pr, r, scope)?;
    let PmtudReader(mut pmtud, notec) = pr;

    let count = r.u16()?;
    pmtud.probes = read_hops(r, scope, count)?;

    for _ in 0..notec {
        let mut nr = NoteReader::default();
        params::read(&mut nr, r, scope)?;
        if let Some(ordinal) = nr.ordinal {
            let at = pmtud
                .resolve(usize::from(ordinal))
                .ok_or(DecodeError::Ordering("pmtud note points past the pmtud replies"))?;
            nr.note.reply = Some(at);
        }
        pmtud.notes.push(nr.note);
    }
    Ok(pmtud)
}

fn read_lastditch(
    r: &mut WireReader<'_>,
    scope: &mut ReadScope<'_>,
) -> Result<LastDitch, DecodeError> {
    params::read(&mut NoParams, r, scope)?;
    let count = r.u16()?;
    Ok(LastDitch {
        probes: read_hops(r, scope, count)?,
    })
}

/// Reads attribute blocks into `trace` up to and including the terminator.
pub(super) fn read_attrs(
    trace: &mut Trace,
    r: &mut WireReader<'_>,
    scope: &mut ReadScope<'_>,
) -> Result<(), DecodeError> {
    loop {
        let hdr = r.u16()?;
        if hdr == ATTR_EOF {
            return Ok(());
        }
        let kind = hdr >> 12;
        let len = usize::from(hdr & 0x0fff);
        let mut body = r.sub(len)?;
        match kind {
            ATTR_PMTUD => {
                if trace.pmtud.is_some() {
                    return Err(DecodeError::Malformed("repeated pmtud attribute"));
                }
                trace.pmtud = Some(read_pmtud(&mut body, scope)?);
            }
            ATTR_LASTDITCH => {
                if trace.lastditch.is_some() {
                    return Err(DecodeError::Malformed("repeated last-ditch attribute"));
                }
                trace.lastditch = Some(read_lastditch(&mut body, scope)?);
            }
            ATTR_DTREE => {
                if trace.dtree.is_some() {
                    return Err(DecodeError::Malformed("repeated dtree attribute"));
                }
                let mut dtree = Dtree::default();
                params::read(&mut dtree, &mut body, scope)?;
                trace.dtree = Some(dtree);
            }
            _ => trace!(kind, len, "skipping unknown traceroute attribute"),
        }
    }
}
