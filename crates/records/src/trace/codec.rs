//! Traceroute body codec.
//!
//! ```text
//! [params: trace schema][hop_count u16][hop blocks][attributes][0x0000]
//! ```

use intern::{ReadScope, WriteScope};
use params::{Field, FieldDesc, ParamsRead, ParamsWrite, Schema};
use wire::{Addr, DecodeError, EncodeError, Timeval, WireReader, WireWriter};

use super::attr::{read_attrs, AttrPlan};
use super::hop::{check_ttls, index_by_ttl, read_hops, HopPlan};
use super::Trace;
use crate::{FileTables, RefIds};

static TRACE_FIELDS: [FieldDesc; 33] = [
    FieldDesc::fixed(1, 4),     // list
    FieldDesc::fixed(2, 4),     // cycle
    FieldDesc::retired(3, 4),   // src gid
    FieldDesc::retired(4, 4),   // dst gid
    FieldDesc::fixed(5, 8),     // start
    FieldDesc::fixed(6, 1),     // stop reason
    FieldDesc::fixed(7, 1),     // stop data
    FieldDesc::fixed(8, 1),     // flags, low byte
    FieldDesc::fixed(9, 1),     // attempts
    FieldDesc::fixed(10, 1),    // hoplimit
    FieldDesc::fixed(11, 1),    // method
    FieldDesc::fixed(12, 2),    // probe size
    FieldDesc::fixed(13, 2),    // sport
    FieldDesc::fixed(14, 2),    // dport
    FieldDesc::fixed(15, 1),    // firsthop
    FieldDesc::fixed(16, 1),    // tos
    FieldDesc::fixed(17, 1),    // wait timeout seconds
    FieldDesc::fixed(18, 1),    // loops
    FieldDesc::fixed(19, 2),    // hop count
    FieldDesc::fixed(20, 1),    // gaplimit
    FieldDesc::fixed(21, 1),    // gapaction
    FieldDesc::fixed(22, 1),    // loopaction
    FieldDesc::fixed(23, 2),    // probec
    FieldDesc::fixed(24, 1),    // wait probe centiseconds
    FieldDesc::fixed(25, 1),    // confidence
    FieldDesc::var(26),         // src
    FieldDesc::var(27),         // dst
    FieldDesc::fixed(28, 4),    // userid
    FieldDesc::fixed(29, 2),    // fragment offset
    FieldDesc::var(30),         // rtr
    FieldDesc::fixed(31, 1),    // squeries
    FieldDesc::fixed(32, 4),    // flags
    FieldDesc::fixed(33, 1),    // stop hop
];
static TRACE_SCHEMA: Schema = Schema::new("traceroute", &TRACE_FIELDS);

const FLAGS8: u16 = 8;
const FLAGS32: u16 = 32;

struct TraceParams<'a> {
    trace: &'a Trace,
    refs: RefIds,
    wait_probe: u8,
}

impl ParamsWrite for TraceParams<'_> {
    const SCHEMA: &'static Schema = &TRACE_SCHEMA;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        let t = self.trace;
        match id {
            1 => Some(Field::U32(t.list.as_ref().map_or(0, |_| self.refs.list))),
            2 => Some(Field::U32(t.cycle.as_ref().map_or(0, |_| self.refs.cycle))),
            5 => Some(Field::Timeval(t.start)),
            6 => Some(Field::U8(t.stop_reason)),
            7 => Some(Field::U8(t.stop_data)),
            FLAGS8 if t.flags & 0xff != 0 => Some(Field::U8(t.flags as u8)),
            9 => Some(Field::U8(t.attempts)),
            10 => Some(Field::U8(t.hoplimit)),
            11 => Some(Field::U8(t.method)),
            12 => Some(Field::U16(t.probe_size)),
            13 => Some(Field::U16(t.sport)),
            14 => Some(Field::U16(t.dport)),
            15 => Some(Field::U8(t.firsthop)),
            16 => Some(Field::U8(t.tos)),
            17 => Some(Field::U8(t.wait_timeout.sec as u8)),
            18 => Some(Field::U8(t.loops)),
            19 => Some(Field::U16(t.hops.len() as u16)),
            20 => Some(Field::U8(t.gaplimit)),
            21 => Some(Field::U8(t.gapaction)),
            22 => Some(Field::U8(t.loopaction)),
            23 => Some(Field::U16(t.probec)),
            24 => Some(Field::U8(self.wait_probe)),
            25 => Some(Field::U8(t.confidence)),
            26 => t.src.as_ref().map(Field::Addr),
            27 => Some(Field::Addr(&t.dst)),
            28 if t.userid != 0 => Some(Field::U32(t.userid)),
            29 if t.offset != 0 => Some(Field::U16(t.offset)),
            30 => t.rtr.as_ref().map(Field::StaticAddr),
            31 if t.squeries >= 2 => Some(Field::U8(t.squeries)),
            FLAGS32 if t.flags & !0xff != 0 => Some(Field::U32(t.flags)),
            33 if t.stop_hop != 0 => Some(Field::U8(t.stop_hop)),
            _ => None,
        }
    }
}

/// Encodes a traceroute body. `refs` carries the file ids of the trace's
/// list and cycle.
///
/// Probes without replies are not stored. `wait_timeout` keeps whole
/// seconds and `wait_probe` hundredths of a second.
///
/// # Errors
///
/// [`EncodeError`] if a probe sits under the wrong TTL, two adjacent probes
/// could not be told apart on read, a PMTUD note points at no reply, or a
/// value or attribute does not fit its on-disk width.
///
/// # Panics
///
/// If the size and fill passes disagree, which is a codec bug.
pub fn encode(trace: &Trace, refs: RefIds) -> Result<Vec<u8>, EncodeError> {
    refs.check(trace.list.as_ref(), trace.cycle.as_ref())?;
    check_ttls(trace)?;
    EncodeError::check_len("traceroute timeout", trace.wait_timeout.sec as usize, 255)?;
    if !trace.wait_probe.is_centi_aligned() {
        return Err(EncodeError::Inconsistent(
            "traceroute probe wait finer than a hundredth of a second",
        ));
    }
    let centis = trace.wait_probe.to_centis();
    EncodeError::check_len("traceroute probe wait", centis as usize, 255)?;

    let mut scope = WriteScope::new();
    let head = TraceParams {
        trace,
        refs,
        wait_probe: centis as u8,
    };
    let head_plan = params::plan(&head, &mut scope)?;
    let hops = HopPlan::new(trace.hops.iter().flatten(), &mut scope)?;
    let attrs = AttrPlan::new(trace, &mut scope)?;

    let len = head_plan.encoded_len() + hops.encoded_len() + attrs.encoded_len();
    let mut w = WireWriter::with_len(len);
    params::write(&head, &head_plan, &mut w, &mut scope);
    hops.write(&mut w, &mut scope);
    attrs.write(&mut w, &mut scope);
    Ok(w.finish())
}

struct TraceReader<'t> {
    tables: &'t FileTables,
    trace: Trace,
    dst: Option<Addr>,
    flags8: u8,
    hop_count: u16,
    wait_timeout: u8,
    wait_probe: u8,
}

impl ParamsRead for TraceReader<'_> {
    const SCHEMA: &'static Schema = &TRACE_SCHEMA;

    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        let t = &mut self.trace;
        match id {
            1 => t.list = self.tables.list(r.u32()?)?,
            2 => t.cycle = self.tables.cycle(r.u32()?)?,
            3 => t.src = Some(scope.legacy_addr(r)?),
            4 => self.dst = Some(scope.legacy_addr(r)?),
            5 => t.start = r.timeval()?,
            6 => t.stop_reason = r.u8()?,
            7 => t.stop_data = r.u8()?,
            FLAGS8 => self.flags8 = r.u8()?,
            9 => t.attempts = r.u8()?,
            10 => t.hoplimit = r.u8()?,
            11 => t.method = r.u8()?,
            12 => t.probe_size = r.u16()?,
            13 => t.sport = r.u16()?,
            14 => t.dport = r.u16()?,
            15 => t.firsthop = r.u8()?,
            16 => t.tos = r.u8()?,
            17 => self.wait_timeout = r.u8()?,
            18 => t.loops = r.u8()?,
            19 => self.hop_count = r.u16()?,
            20 => t.gaplimit = r.u8()?,
            21 => t.gapaction = r.u8()?,
            22 => t.loopaction = r.u8()?,
            23 => t.probec = r.u16()?,
            24 => self.wait_probe = r.u8()?,
            25 => t.confidence = r.u8()?,
            26 => t.src = Some(scope.read_addr(r)?),
            27 => self.dst = Some(scope.read_addr(r)?),
            28 => t.userid = r.u32()?,
            29 => t.offset = r.u16()?,
            30 => t.rtr = Some(r.addr_literal()?),
            31 => t.squeries = r.u8()?,
            FLAGS32 => t.flags = r.u32()?,
            33 => t.stop_hop = r.u8()?,
            _ => {}
        }
        Ok(())
    }
}

/// Decodes a traceroute body, resolving list and cycle ids against
/// `tables`.
///
/// # Errors
///
/// [`DecodeError`] on truncation, a missing destination or hop address, a
/// hop with TTL 0, TTLs that decrease along the hop sequence, a hop count
/// that contradicts the hops present, a repeated attribute, or a PMTUD note
/// pointing past the PMTUD replies.
pub fn decode(body: &[u8], tables: &FileTables) -> Result<Trace, DecodeError> {
    let mut r = WireReader::new(body);
    let mut scope = ReadScope::new(&tables.addrs);

    let mut tr = TraceReader {
        tables,
        trace: Trace::new(Addr::V4(std::net::Ipv4Addr::UNSPECIFIED)),
        dst: None,
        flags8: 0,
        hop_count: 0,
        wait_timeout: 0,
        wait_probe: 0,
    };
    // Fields absent from the block read as zero, not as the constructor's
    // defaults.
    tr.trace.firsthop = 0;
    tr.trace.squeries = 0;
    tr.trace.method = 0;
    let flags = params::read(&mut tr, &mut r, &mut scope)?;

    let mut trace = tr.trace;
    trace.dst = tr.dst.ok_or(DecodeError::MissingField("traceroute destination"))?;
    if trace.firsthop == 0 {
        trace.firsthop = 1;
    }
    if trace.squeries < 2 {
        trace.squeries = 1;
    }
    trace.wait_timeout = Timeval::new(u32::from(tr.wait_timeout), 0);
    trace.wait_probe = Timeval::from_centis(u32::from(tr.wait_probe));
    if !flags.is_set(FLAGS32) && flags.is_set(FLAGS8) {
        trace.flags = u32::from(tr.flags8);
    }

    let count = r.u16()?;
    let probes = read_hops(&mut r, &mut scope, count)?;
    trace.hops = index_by_ttl(probes, tr.hop_count)?;

    read_attrs(&mut trace, &mut r, &mut scope)?;
    Ok(trace)
}
