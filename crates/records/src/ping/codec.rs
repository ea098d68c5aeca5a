//! Ping body codec.
//!
//! ```text
//! [params: ping schema][reply_count u16][reply params] * reply_count
//! ```

use intern::{ReadScope, WriteScope};
use params::{Field, FieldDesc, Nested, ParamsRead, ParamsWrite, Plan, Schema};
use wire::{Addr, DecodeError, EncodeError, Timeval, WireReader, WireWriter};

use super::{flag, reply_flag, Ping, PingProbe, PingReply, TsReply, Tsps, V4Rr, V4Ts};
use crate::common::{addr_list_size, alloc_vec, put_addr_list, read_addr_list};
use crate::{FileTables, RefIds};

static PING_FIELDS: [FieldDesc; 33] = [
    FieldDesc::fixed(1, 4),     // list
    FieldDesc::fixed(2, 4),     // cycle
    FieldDesc::retired(3, 4),   // src gid
    FieldDesc::retired(4, 4),   // dst gid
    FieldDesc::fixed(5, 8),     // start
    FieldDesc::fixed(6, 1),     // stop reason
    FieldDesc::fixed(7, 1),     // stop data
    FieldDesc::fixed(8, 2),     // data length
    FieldDesc::var(9),          // data
    FieldDesc::fixed(10, 2),    // attempts
    FieldDesc::fixed(11, 2),    // size
    FieldDesc::fixed(12, 1),    // wait seconds
    FieldDesc::fixed(13, 1),    // ttl
    FieldDesc::fixed(14, 2),    // stop count
    FieldDesc::fixed(15, 2),    // ping sent
    FieldDesc::fixed(16, 1),    // method
    FieldDesc::fixed(17, 2),    // sport
    FieldDesc::fixed(18, 2),    // dport
    FieldDesc::fixed(19, 4),    // userid
    FieldDesc::var(20),         // src
    FieldDesc::var(21),         // dst
    FieldDesc::fixed(22, 1),    // flags, low byte
    FieldDesc::fixed(23, 1),    // tos
    FieldDesc::var(24),         // tsps
    FieldDesc::fixed(25, 2),    // icmp checksum
    FieldDesc::fixed(26, 2),    // pmtu
    FieldDesc::fixed(27, 1),    // timeout seconds
    FieldDesc::fixed(28, 4),    // wait microseconds
    FieldDesc::fixed(29, 4),    // tcp ack
    FieldDesc::fixed(30, 4),    // flags
    FieldDesc::fixed(31, 4),    // tcp seq
    FieldDesc::var(32),         // rtr
    FieldDesc::fixed(33, 4),    // timeout microseconds
];
static PING_SCHEMA: Schema = Schema::new("ping", &PING_FIELDS);

static REPLY_FIELDS: [FieldDesc; 21] = [
    FieldDesc::retired(1, 4),   // addr gid
    FieldDesc::fixed(2, 1),     // flags
    FieldDesc::fixed(3, 1),     // reply ttl
    FieldDesc::fixed(4, 2),     // reply size
    FieldDesc::fixed(5, 2),     // icmp type, code
    FieldDesc::fixed(6, 4),     // rtt
    FieldDesc::fixed(7, 2),     // probe id
    FieldDesc::fixed(8, 2),     // reply ipid
    FieldDesc::fixed(9, 2),     // probe ipid
    FieldDesc::fixed(10, 1),    // reply proto
    FieldDesc::fixed(11, 1),    // tcp flags
    FieldDesc::var(12),         // addr
    FieldDesc::var(13),         // v4rr
    FieldDesc::var(14),         // v4ts
    FieldDesc::fixed(15, 4),    // reply ipid32
    FieldDesc::fixed(16, 8),    // probe tx
    FieldDesc::fixed(17, 12),   // tsreply
    FieldDesc::fixed(18, 2),    // probe sport
    FieldDesc::fixed(19, 1),    // reply tos
    FieldDesc::var(20),         // ifname
    FieldDesc::fixed(21, 2),    // next-hop mtu
];
static REPLY_SCHEMA: Schema = Schema::new("ping reply", &REPLY_FIELDS);

const TIMEOUT_SEC: u16 = 27;
const FLAGS8: u16 = 22;
const FLAGS32: u16 = 30;
const REPLY_IPID: u16 = 8;
const REPLY_PROTO: u16 = 10;

// -------------------- Nested fields --------------------

impl Nested for Tsps {
    fn size(&self, scope: &mut WriteScope) -> Result<usize, EncodeError> {
        addr_list_size("tsps addresses", &self.ips, scope)
    }

    fn write(&self, w: &mut WireWriter, scope: &mut WriteScope) {
        put_addr_list(&self.ips, w, scope);
    }
}

impl Nested for V4Rr {
    fn size(&self, scope: &mut WriteScope) -> Result<usize, EncodeError> {
        addr_list_size("record route addresses", &self.ips, scope)
    }

    fn write(&self, w: &mut WireWriter, scope: &mut WriteScope) {
        put_addr_list(&self.ips, w, scope);
    }
}

impl Nested for V4Ts {
    fn size(&self, scope: &mut WriteScope) -> Result<usize, EncodeError> {
        EncodeError::check_len("timestamps", self.tss.len(), usize::from(u8::MAX))?;
        if !self.ips.is_empty() && self.ips.len() != self.tss.len() {
            return Err(EncodeError::Inconsistent(
                "timestamp option address count differs from timestamp count",
            ));
        }
        let addrs: usize = self.ips.iter().map(|a| scope.addr_size(a)).sum();
        Ok(2 + 4 * self.tss.len() + addrs)
    }

    fn write(&self, w: &mut WireWriter, scope: &mut WriteScope) {
        w.put_u8(self.tss.len() as u8);
        w.put_u8(self.ips.len() as u8);
        for ts in &self.tss {
            w.put_u32(*ts);
        }
        for a in &self.ips {
            scope.put_addr(w, a);
        }
    }
}

impl Nested for TsReply {
    fn size(&self, _scope: &mut WriteScope) -> Result<usize, EncodeError> {
        Ok(12)
    }

    fn write(&self, w: &mut WireWriter, _scope: &mut WriteScope) {
        w.put_u32(self.tso);
        w.put_u32(self.tsr);
        w.put_u32(self.tst);
    }
}

fn read_v4ts(r: &mut WireReader<'_>, scope: &mut ReadScope<'_>) -> Result<V4Ts, DecodeError> {
    let tsc = usize::from(r.u8()?);
    let ipc = usize::from(r.u8()?);
    if ipc != 0 && ipc != tsc {
        return Err(DecodeError::Malformed("timestamp option address count"));
    }
    let mut tss = alloc_vec("timestamps", tsc)?;
    for _ in 0..tsc {
        tss.push(r.u32()?);
    }
    let mut ips = alloc_vec("timestamp addresses", ipc)?;
    for _ in 0..ipc {
        ips.push(scope.read_addr(r)?);
    }
    Ok(V4Ts { tss, ips })
}

// -------------------- Encode --------------------

struct PingParams<'a> {
    ping: &'a Ping,
    refs: RefIds,
}

impl ParamsWrite for PingParams<'_> {
    const SCHEMA: &'static Schema = &PING_SCHEMA;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        let p = self.ping;
        match id {
            1 if p.list.is_some() => Some(Field::U32(self.refs.list)),
            2 if p.cycle.is_some() => Some(Field::U32(self.refs.cycle)),
            5 => Some(Field::Timeval(p.start)),
            6 => Some(Field::U8(p.stop_reason)),
            7 => Some(Field::U8(p.stop_data)),
            8 if !p.data.is_empty() => Some(Field::U16(p.data.len() as u16)),
            9 if !p.data.is_empty() => Some(Field::Bytes(&p.data)),
            10 => Some(Field::U16(p.attempts)),
            11 => Some(Field::U16(p.size)),
            12 => Some(Field::U8(p.wait_probe.sec as u8)),
            13 => Some(Field::U8(p.ttl)),
            14 if p.stop_count != 0 => Some(Field::U16(p.stop_count)),
            15 => Some(Field::U16(p.probes.len() as u16)),
            16 if p.method != 0 => Some(Field::U8(p.method)),
            17 if p.sport != 0 => Some(Field::U16(p.sport)),
            18 if p.dport != 0 => Some(Field::U16(p.dport)),
            19 if p.userid != 0 => Some(Field::U32(p.userid)),
            20 => p.src.as_ref().map(Field::Addr),
            21 => Some(Field::Addr(&p.dst)),
            FLAGS8 if p.flags & 0xff != 0 => Some(Field::U8(p.flags as u8)),
            23 if p.tos != 0 => Some(Field::U8(p.tos)),
            24 => p.tsps.as_ref().map(|t| Field::Nested(t)),
            25 if p.icmpsum != 0 && p.flags & flag::ICMPSUM != 0 => {
                Some(Field::U16(p.icmpsum))
            }
            26 if p.pmtu != 0 => Some(Field::U16(p.pmtu)),
            TIMEOUT_SEC if p.wait_timeout.sec != p.wait_probe.sec => {
                Some(Field::U8(p.wait_timeout.sec as u8))
            }
            28 if p.wait_probe.usec != 0 => Some(Field::U32(p.wait_probe.usec)),
            29 if p.tcpack != 0 => Some(Field::U32(p.tcpack)),
            FLAGS32 if p.flags & !0xff != 0 => Some(Field::U32(p.flags)),
            31 if p.tcpseq != 0 => Some(Field::U32(p.tcpseq)),
            32 => p.rtr.as_ref().map(Field::StaticAddr),
            33 if p.wait_timeout.usec != 0 => Some(Field::U32(p.wait_timeout.usec)),
            _ => None,
        }
    }
}

struct ReplyParams<'a> {
    ping: &'a Ping,
    probe: &'a PingProbe,
    reply: &'a PingReply,
}

impl ParamsWrite for ReplyParams<'_> {
    const SCHEMA: &'static Schema = &REPLY_SCHEMA;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        let (p, probe, r) = (self.ping, self.probe, self.reply);
        let v4 = p.dst.is_ipv4();
        let v6 = p.dst.is_ipv6();
        match id {
            2 if r.flags != 0 => Some(Field::U8(r.flags)),
            3 if r.flags & reply_flag::REPLY_TTL != 0 => Some(Field::U8(r.ttl)),
            4 => Some(Field::U16(r.size)),
            5 if r.is_icmp() => Some(Field::Pair(r.icmp_type, r.icmp_code)),
            6 => Some(Field::Rtt(r.rtt)),
            7 => Some(Field::U16(probe.id)),
            REPLY_IPID if v4 && r.flags & reply_flag::REPLY_IPID != 0 => {
                Some(Field::U16(r.ipid32 as u16))
            }
            9 if v4 && r.flags & reply_flag::PROBE_IPID != 0 => Some(Field::U16(probe.ipid)),
            REPLY_PROTO if !p.method_is_icmp() => Some(Field::U8(r.proto)),
            11 if r.is_tcp() => Some(Field::U8(r.tcp_flags)),
            12 => Some(Field::Addr(&r.addr)),
            13 => r.v4rr.as_ref().map(|v| Field::Nested(v)),
            14 => r.v4ts.as_ref().map(|v| Field::Nested(v)),
            15 if v6 && r.flags & reply_flag::REPLY_IPID != 0 => Some(Field::U32(r.ipid32)),
            16 if probe.tx.sec != 0 => Some(Field::Timeval(probe.tx)),
            17 => r.tsreply.as_ref().map(|t| Field::Nested(t)),
            18 if probe.sport != 0 => Some(Field::U16(probe.sport)),
            19 if r.tos != 0 => Some(Field::U8(r.tos)),
            20 => r.ifname.as_deref().map(Field::IfName),
            21 if r.is_icmp_ptb() => Some(Field::U16(r.icmp_nhmtu)),
            _ => None,
        }
    }
}

/// Rejects values the fixed-width fields cannot hold before any size
/// accounting happens.
fn check(ping: &Ping) -> Result<(), EncodeError> {
    let max16 = usize::from(u16::MAX);
    EncodeError::check_len("ping data", ping.data.len(), max16)?;
    EncodeError::check_len("ping probe count", ping.probes.len(), max16)?;
    EncodeError::check_len("ping wait", ping.wait_probe.sec as usize, 255)?;
    EncodeError::check_len("ping timeout", ping.wait_timeout.sec as usize, 255)?;
    for (i, probe) in ping.probes.iter().enumerate() {
        if let Some(probe) = probe {
            if usize::from(probe.id) != i {
                return Err(EncodeError::Inconsistent("ping probe stored under the wrong index"));
            }
            // IPv4 carries a 16-bit reply IP-ID
            let wide_ipid = |r: &PingReply| {
                r.flags & reply_flag::REPLY_IPID != 0 && r.ipid32 > u32::from(u16::MAX)
            };
            if ping.dst.is_ipv4() && probe.replies.iter().any(wide_ipid) {
                return Err(EncodeError::Inconsistent("ipv4 reply ip-id wider than 16 bits"));
            }
        }
    }
    Ok(())
}

/// Encodes a ping body. `refs` carries the file ids of the ping's list and
/// cycle; a ping that references either must have a non-zero id for it.
///
/// Probes without replies are not stored and decode as empty slots.
///
/// # Errors
///
/// [`EncodeError`] if a value does not fit its on-disk width or the record
/// is internally inconsistent. Nothing is written in that case.
///
/// # Panics
///
/// If the size and fill passes disagree, which is a codec bug.
pub fn encode(ping: &Ping, refs: RefIds) -> Result<Vec<u8>, EncodeError> {
    refs.check(ping.list.as_ref(), ping.cycle.as_ref())?;
    check(ping)?;

    let mut scope = WriteScope::new();
    let head = PingParams { ping, refs };
    let head_plan = params::plan(&head, &mut scope)?;
    let mut len = head_plan.encoded_len() + 2;

    let mut replies: Vec<(ReplyParams<'_>, Plan)> = Vec::new();
    for probe in ping.probes.iter().flatten() {
        for reply in &probe.replies {
            let rp = ReplyParams { ping, probe, reply };
            let plan = params::plan(&rp, &mut scope)?;
            len += plan.encoded_len();
            replies.push((rp, plan));
        }
    }
    EncodeError::check_len("ping reply count", replies.len(), usize::from(u16::MAX))?;

    let mut w = WireWriter::with_len(len);
    params::write(&head, &head_plan, &mut w, &mut scope);
    w.put_u16(replies.len() as u16);
    for (rp, plan) in &replies {
        params::write(rp, plan, &mut w, &mut scope);
    }
    Ok(w.finish())
}

// -------------------- Decode --------------------

struct PingReader<'t> {
    tables: &'t FileTables,
    ping: Ping,
    dst: Option<Addr>,
    ping_sent: u16,
    data_len: u16,
    flags8: u8,
    wait_probe_sec: u8,
    wait_timeout_sec: u8,
}

impl ParamsRead for PingReader<'_> {
    const SCHEMA: &'static Schema = &PING_SCHEMA;

    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        let p = &mut self.ping;
        match id {
            1 => p.list = self.tables.list(r.u32()?)?,
            2 => p.cycle = self.tables.cycle(r.u32()?)?,
            3 => p.src = Some(scope.legacy_addr(r)?),
            4 => self.dst = Some(scope.legacy_addr(r)?),
            5 => p.start = r.timeval()?,
            6 => p.stop_reason = r.u8()?,
            7 => p.stop_data = r.u8()?,
            8 => self.data_len = r.u16()?,
            9 => p.data = r.bytes(usize::from(self.data_len))?.to_vec(),
            10 => p.attempts = r.u16()?,
            11 => p.size = r.u16()?,
            12 => self.wait_probe_sec = r.u8()?,
            13 => p.ttl = r.u8()?,
            14 => p.stop_count = r.u16()?,
            15 => self.ping_sent = r.u16()?,
            16 => p.method = r.u8()?,
            17 => p.sport = r.u16()?,
            18 => p.dport = r.u16()?,
            19 => p.userid = r.u32()?,
            20 => p.src = Some(scope.read_addr(r)?),
            21 => self.dst = Some(scope.read_addr(r)?),
            FLAGS8 => self.flags8 = r.u8()?,
            23 => p.tos = r.u8()?,
            24 => {
                p.tsps = Some(Tsps {
                    ips: read_addr_list(r, scope)?,
                })
            }
            25 => p.icmpsum = r.u16()?,
            26 => p.pmtu = r.u16()?,
            TIMEOUT_SEC => self.wait_timeout_sec = r.u8()?,
            28 => p.wait_probe.usec = r.u32()?,
            29 => p.tcpack = r.u32()?,
            FLAGS32 => p.flags = r.u32()?,
            31 => p.tcpseq = r.u32()?,
            32 => p.rtr = Some(r.addr_literal()?),
            33 => p.wait_timeout.usec = r.u32()?,
            _ => {}
        }
        Ok(())
    }
}

struct ReplyReader {
    reply: PingReply,
    addr_seen: bool,
    probe_id: u16,
    probe_ipid: u16,
    probe_sport: u16,
    probe_tx: Timeval,
    reply_ipid: u16,
}

impl ParamsRead for ReplyReader {
    const SCHEMA: &'static Schema = &REPLY_SCHEMA;

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
            2 => rep.flags = r.u8()?,
            3 => rep.ttl = r.u8()?,
            4 => rep.size = r.u16()?,
            5 => {
                rep.icmp_type = r.u8()?;
                rep.icmp_code = r.u8()?;
            }
            6 => rep.rtt = r.rtt()?,
            7 => self.probe_id = r.u16()?,
            REPLY_IPID => self.reply_ipid = r.u16()?,
            9 => self.probe_ipid = r.u16()?,
            REPLY_PROTO => rep.proto = r.u8()?,
            11 => rep.tcp_flags = r.u8()?,
            12 => {
                rep.addr = scope.read_addr(r)?;
                self.addr_seen = true;
            }
            13 => {
                rep.v4rr = Some(V4Rr {
                    ips: read_addr_list(r, scope)?,
                })
            }
            14 => rep.v4ts = Some(read_v4ts(r, scope)?),
            15 => rep.ipid32 = r.u32()?,
            16 => self.probe_tx = r.timeval()?,
            17 => {
                rep.tsreply = Some(TsReply {
                    tso: r.u32()?,
                    tsr: r.u32()?,
                    tst: r.u32()?,
                })
            }
            18 => self.probe_sport = r.u16()?,
            19 => rep.tos = r.u8()?,
            20 => rep.ifname = Some(scope.read_ifname(r)?),
            21 => rep.icmp_nhmtu = r.u16()?,
            _ => {}
        }
        Ok(())
    }
}

/// Reads one reply block and files it under its probe, creating the probe
/// from the reply's copy of the probe fields the first time it is seen.
fn read_reply(
    ping: &mut Ping,
    r: &mut WireReader<'_>,
    scope: &mut ReadScope<'_>,
) -> Result<(), DecodeError> {
    let mut rr = ReplyReader {
        reply: PingReply::placeholder(),
        addr_seen: false,
        probe_id: 0,
        probe_ipid: 0,
        probe_sport: 0,
        probe_tx: Timeval::ZERO,
        reply_ipid: 0,
    };
    let flags = params::read(&mut rr, r, scope)?;
    if !rr.addr_seen {
        return Err(DecodeError::MissingField("ping reply address"));
    }

    let mut reply = rr.reply;
    if !flags.is_set(REPLY_PROTO) {
        reply.proto = ping.default_reply_proto();
    }
    if flags.is_set(REPLY_IPID) && ping.dst.is_ipv4() {
        reply.ipid32 = u32::from(rr.reply_ipid);
    }

    let slot = ping
        .probes
        .get_mut(usize::from(rr.probe_id))
        .ok_or(DecodeError::Malformed("ping reply probe id beyond probes sent"))?;
    let probe = slot.get_or_insert_with(|| PingProbe {
        id: rr.probe_id,
        tx: rr.probe_tx,
        sport: rr.probe_sport,
        ipid: rr.probe_ipid,
        replies: Vec::new(),
    });
    probe.replies.push(reply);
    Ok(())
}

/// Decodes a ping body, resolving list and cycle ids against `tables`.
///
/// # Errors
///
/// [`DecodeError`] on truncation, a missing destination or reply address,
/// an unresolvable reference, or a reply whose probe id is not below the
/// number of probes sent.
pub fn decode(body: &[u8], tables: &FileTables) -> Result<Ping, DecodeError> {
    let mut r = WireReader::new(body);
    let mut scope = ReadScope::new(&tables.addrs);

    let mut pr = PingReader {
        tables,
        ping: Ping::new(Addr::V4(std::net::Ipv4Addr::UNSPECIFIED)),
        dst: None,
        ping_sent: 0,
        data_len: 0,
        flags8: 0,
        wait_probe_sec: 0,
        wait_timeout_sec: 0,
    };
    let flags = params::read(&mut pr, &mut r, &mut scope)?;

    let mut ping = pr.ping;
    ping.dst = pr.dst.ok_or(DecodeError::MissingField("ping destination"))?;
    ping.wait_probe.sec = u32::from(pr.wait_probe_sec);
    ping.wait_timeout.sec = if flags.is_set(TIMEOUT_SEC) {
        u32::from(pr.wait_timeout_sec)
    } else {
        ping.wait_probe.sec
    };
    if !flags.is_set(FLAGS32) && flags.is_set(FLAGS8) {
        ping.flags = u32::from(pr.flags8);
    }

    let reply_count = r.u16()?;
    let sent = usize::from(pr.ping_sent);
    ping.probes = alloc_vec("ping probes", sent)?;
    ping.probes.resize_with(sent, || None);

    for _ in 0..reply_count {
        read_reply(&mut ping, &mut r, &mut scope)?;
    }
    Ok(ping)
}
