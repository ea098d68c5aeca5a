//! Hop blocks: one parameter block per reply, probe fields repeated.

use intern::{ReadScope, WriteScope};
use params::{Field, FieldDesc, Nested, ParamsRead, ParamsWrite, Plan, Schema};
use wire::{DecodeError, EncodeError, Timeval, WireReader, WireWriter};

use super::{IcmpExt, IcmpExts, Trace, TraceProbe, TraceReply};
use crate::common::alloc_vec;

static HOP_FIELDS: [FieldDesc; 20] = [
    FieldDesc::retired(1, 4),   // addr gid
    FieldDesc::fixed(2, 1),     // probe ttl
    FieldDesc::fixed(3, 1),     // reply ttl
    FieldDesc::fixed(4, 1),     // flags
    FieldDesc::fixed(5, 1),     // probe id
    FieldDesc::fixed(6, 4),     // rtt
    FieldDesc::fixed(7, 2),     // icmp type, code
    FieldDesc::fixed(8, 2),     // probe size
    FieldDesc::fixed(9, 2),     // reply size
    FieldDesc::fixed(10, 2),    // reply ipid
    FieldDesc::fixed(11, 1),    // reply tos
    FieldDesc::fixed(12, 2),    // next-hop mtu
    FieldDesc::fixed(13, 2),    // quoted ip length
    FieldDesc::fixed(14, 1),    // quoted ttl
    FieldDesc::fixed(15, 1),    // tcp flags
    FieldDesc::fixed(16, 1),    // quoted tos
    FieldDesc::var(17),         // icmp extensions
    FieldDesc::var(18),         // addr
    FieldDesc::fixed(19, 8),    // probe tx
    FieldDesc::var(20),         // name
];
static HOP_SCHEMA: Schema = Schema::new("traceroute hop", &HOP_FIELDS);

const Q_IPLEN: u16 = 13;
const Q_IPTTL: u16 = 14;

impl Nested for IcmpExts {
    fn size(&self, _scope: &mut WriteScope) -> Result<usize, EncodeError> {
        let mut len = 0usize;
        for ext in &self.0 {
            EncodeError::check_len("icmp extension", ext.data.len(), usize::from(u16::MAX))?;
            len += 4 + ext.data.len();
        }
        EncodeError::check_len("icmp extensions", len, usize::from(u16::MAX) - 2)?;
        Ok(2 + len)
    }

    fn write(&self, w: &mut WireWriter, _scope: &mut WriteScope) {
        let total: usize = self.0.iter().map(|e| 4 + e.data.len()).sum();
        w.put_u16(total as u16);
        for ext in &self.0 {
            w.put_u16(ext.data.len() as u16);
            w.put_u8(ext.class);
            w.put_u8(ext.kind);
            w.put_bytes(&ext.data);
        }
    }
}

fn read_icmp_exts(r: &mut WireReader<'_>) -> Result<IcmpExts, DecodeError> {
    let total = usize::from(r.u16()?);
    let mut body = r.sub(total)?;
    let mut exts = Vec::new();
    while !body.is_empty() {
        let dl = usize::from(body.u16()?);
        let class = body.u8()?;
        let kind = body.u8()?;
        let data = body.bytes(dl)?.to_vec();
        exts.push(IcmpExt { class, kind, data });
    }
    Ok(IcmpExts(exts))
}

// -------------------- Encode --------------------

pub(super) struct HopParams<'a> {
    probe: &'a TraceProbe,
    reply: &'a TraceReply,
}

impl ParamsWrite for HopParams<'_> {
    const SCHEMA: &'static Schema = &HOP_SCHEMA;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        let (p, r) = (self.probe, self.reply);
        match id {
            2 => Some(Field::U8(p.ttl)),
            3 => Some(Field::U8(r.ttl)),
            4 => Some(Field::U8(r.flags)),
            5 => Some(Field::U8(p.id.wrapping_sub(1))),
            6 => Some(Field::Rtt(r.rtt)),
            7 if r.is_icmp() => Some(Field::Pair(r.icmp_type, r.icmp_code)),
            8 => Some(Field::U16(p.size)),
            9 => Some(Field::U16(r.size)),
            10 if r.ipid != 0 => Some(Field::U16(r.ipid)),
            11 => Some(Field::U8(r.tos)),
            12 if r.is_icmp_ptb() => Some(Field::U16(r.icmp_nhmtu)),
            Q_IPLEN if r.is_icmp_q() && r.icmp_q_ipl != p.size => Some(Field::U16(r.icmp_q_ipl)),
            Q_IPTTL if r.is_icmp_q() && r.icmp_q_ttl != 1 => Some(Field::U8(r.icmp_q_ttl)),
            15 if r.is_tcp() => Some(Field::U8(r.tcp_flags)),
            16 if r.is_icmp_q() => Some(Field::U8(r.icmp_q_tos)),
            17 => r.icmp_exts.as_ref().map(|e| Field::Nested(e)),
            18 => Some(Field::Addr(&r.addr)),
            19 if p.tx.sec != 0 => Some(Field::Timeval(p.tx)),
            20 => r.name.as_deref().map(Field::Str),
            _ => None,
        }
    }
}

/// Size-pass result for a hop sequence, ready to be written.
pub(super) struct HopPlan<'a> {
    hops: Vec<(HopParams<'a>, Plan)>,
    len: usize,
}

impl<'a> HopPlan<'a> {
    /// Plans the hop blocks of `probes` in order. Probes without replies
    /// contribute nothing.
    pub(super) fn new(
        probes: impl Iterator<Item = &'a TraceProbe>,
        scope: &mut WriteScope,
    ) -> Result<Self, EncodeError> {
        let mut hops = Vec::new();
        let mut len = 2;
        let mut last = None;
        for probe in probes.filter(|p| !p.replies.is_empty()) {
            if last == Some(probe.key()) {
                return Err(EncodeError::Inconsistent(
                    "adjacent probes share a ttl, id and size",
                ));
            }
            last = Some(probe.key());
            for reply in &probe.replies {
                let hp = HopParams { probe, reply };
                let plan = params::plan(&hp, scope)?;
                len += plan.encoded_len();
                hops.push((hp, plan));
            }
        }
        EncodeError::check_len("hop count", hops.len(), usize::from(u16::MAX))?;
        Ok(HopPlan { hops, len })
    }

    /// Bytes taken by the count prefix and every hop block.
    pub(super) fn encoded_len(&self) -> usize {
        self.len
    }

    pub(super) fn write(&self, w: &mut WireWriter, scope: &mut WriteScope) {
        w.put_u16(self.hops.len() as u16);
        for (hp, plan) in &self.hops {
            params::write(hp, plan, w, scope);
        }
    }
}

// -------------------- Decode --------------------

struct HopReader {
    reply: TraceReply,
    addr_seen: bool,
    probe_ttl: u8,
    probe_id: u8,
    probe_size: u16,
    probe_tx: Timeval,
}

impl ParamsRead for HopReader {
    const SCHEMA: &'static Schema = &HOP_SCHEMA;

    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        let rep = &mut self.reply;
        match id {
            1 => {
                rep.addr = scope.legacy_addr(r)?;
                self.addr_seen = true;
            }
            2 => self.probe_ttl = r.u8()?,
            3 => rep.ttl = r.u8()?,
            4 => rep.flags = r.u8()?,
            5 => self.probe_id = r.u8()?.wrapping_add(1),
            6 => rep.rtt = r.rtt()?,
            7 => {
                rep.icmp_type = r.u8()?;
                rep.icmp_code = r.u8()?;
            }
            8 => self.probe_size = r.u16()?,
            9 => rep.size = r.u16()?,
            10 => rep.ipid = r.u16()?,
            11 => rep.tos = r.u8()?,
            12 => rep.icmp_nhmtu = r.u16()?,
            Q_IPLEN => rep.icmp_q_ipl = r.u16()?,
            Q_IPTTL => rep.icmp_q_ttl = r.u8()?,
            15 => rep.tcp_flags = r.u8()?,
            16 => rep.icmp_q_tos = r.u8()?,
            17 => rep.icmp_exts = Some(read_icmp_exts(r)?),
            18 => {
                rep.addr = scope.read_addr(r)?;
                self.addr_seen = true;
            }
            19 => self.probe_tx = r.timeval()?,
            20 => rep.name = Some(r.string()?),
            _ => {}
        }
        Ok(())
    }
}

/// Reads `count` hop blocks and regroups consecutive replies to the same
/// probe. Probes come back in wire order.
pub(super) fn read_hops(
    r: &mut WireReader<'_>,
    scope: &mut ReadScope<'_>,
    count: u16,
) -> Result<Vec<TraceProbe>, DecodeError> {
    let mut probes: Vec<TraceProbe> = alloc_vec("traceroute probes", usize::from(count))?;
    for _ in 0..count {
        let mut hr = HopReader {
            reply: TraceReply::placeholder(),
            addr_seen: false,
            probe_ttl: 0,
            probe_id: 0,
            probe_size: 0,
            probe_tx: Timeval::ZERO,
        };
        let flags = params::read(&mut hr, r, scope)?;
        if !hr.addr_seen {
            return Err(DecodeError::MissingField("hop address"));
        }
        if hr.probe_ttl == 0 {
            return Err(DecodeError::Malformed("hop probe ttl of zero"));
        }

        let key = (hr.probe_ttl, hr.probe_id, hr.probe_size);
        let mut reply = hr.reply;
        if reply.is_icmp_q() {
            if !flags.is_set(Q_IPTTL) {
                reply.icmp_q_ttl = 1;
            }
            if !flags.is_set(Q_IPLEN) {
                reply.icmp_q_ipl = hr.probe_size;
            }
        }

        match probes.last_mut() {
            Some(probe) if probe.key() == key => probe.replies.push(reply),
            _ => probes.push(TraceProbe {
                ttl: hr.probe_ttl,
                id: hr.probe_id,
                size: hr.probe_size,
                tx: hr.probe_tx,
                replies: vec![reply],
            }),
        }
    }
    Ok(probes)
}

/// Places probes read from the main hop sequence into a TTL-indexed array
/// of `hop_count` entries, or of the highest TTL seen if `hop_count` is 0.
pub(super) fn index_by_ttl(
    probes: Vec<TraceProbe>,
    hop_count: u16,
) -> Result<Vec<Vec<TraceProbe>>, DecodeError> {
    let mut max_ttl = 0u8;
    for probe in &probes {
        if probe.ttl < max_ttl {
            return Err(DecodeError::Ordering("hop ttls must not decrease"));
        }
        max_ttl = probe.ttl;
    }

    let hop_count = if hop_count == 0 {
        usize::from(max_ttl)
    } else if hop_count < u16::from(max_ttl) || hop_count > 255 {
        return Err(DecodeError::Malformed("hop count"));
    } else {
        usize::from(hop_count)
    };

    let mut hops: Vec<Vec<TraceProbe>> = alloc_vec("traceroute hops", hop_count)?;
    hops.resize_with(hop_count, Vec::new);
    for probe in probes {
        hops[usize::from(probe.ttl) - 1].push(probe);
    }
    Ok(hops)
}

/// Checks that every probe sits at the index its TTL names.
pub(super) fn check_ttls(trace: &Trace) -> Result<(), EncodeError> {
    EncodeError::check_len("hop count", trace.hops.len(), usize::from(u8::MAX))?;
    for (i, probes) in trace.hops.iter().enumerate() {
        if probes.iter().any(|p| usize::from(p.ttl) != i + 1) {
            return Err(EncodeError::Inconsistent("probe stored under the wrong ttl"));
        }
    }
    Ok(())
}
