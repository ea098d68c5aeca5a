use std::net::Ipv4Addr;
use std::sync::Arc;

use config::WartsConfig;
use records::ping::{PingProbe, PingReply};
use records::trace::{TraceProbe, TraceReply};
use wire::Timeval;

use crate::{Addr, Cycle, List, Ping, Trace, WartsObject, WartsReader};

pub fn v4(a: u8, b: u8, c: u8, d: u8) -> Addr {
    Addr::V4(Ipv4Addr::new(a, b, c, d))
}

pub fn cfg() -> WartsConfig {
    WartsConfig::default()
}

pub fn list(id: u32, name: &str) -> Arc<List> {
    Arc::new(List::new(id, name))
}

pub fn cycle(list: &Arc<List>, id: u32) -> Arc<Cycle> {
    Arc::new(Cycle::new(Arc::clone(list), id, 1_700_000_000 + id))
}

/// A ping to `dst` whose single probe drew one echo reply.
pub fn ping_to(dst: Addr) -> Ping {
    let mut p = Ping::new(dst);
    p.start = Timeval::new(1_700_000_500, 0);
    p.attempts = 1;
    p.size = 84;
    p.ttl = 64;
    p.wait_probe = Timeval::new(1, 0);
    p.wait_timeout = Timeval::new(1, 0);

    let mut r = PingReply::new(dst);
    r.size = 84;
    r.rtt = Timeval::from_micros(15_250);
    p.probes = vec![Some(PingProbe {
        id: 0,
        tx: Timeval::new(1_700_000_500, 10),
        replies: vec![r],
        ..Default::default()
    })];
    p
}

/// A two-hop trace to `dst`.
pub fn trace_to(dst: Addr) -> Trace {
    let mut t = Trace::new(dst);
    t.start = Timeval::new(1_700_000_600, 0);
    t.probe_size = 44;
    t.wait_timeout = Timeval::new(5, 0);
    t.hops = vec![
        vec![probe(1, v4(10, 0, 0, 1), 11)],
        vec![probe(2, dst, 3)],
    ];
    t
}

fn probe(ttl: u8, from: Addr, icmp_type: u8) -> TraceProbe {
    let mut r = TraceReply::new(from);
    r.icmp_type = icmp_type;
    r.icmp_code = if icmp_type == 3 { 3 } else { 0 };
    r.icmp_q_ipl = 44;
    r.icmp_q_ttl = 1;
    r.rtt = Timeval::from_micros(u32::from(ttl) * 1_000);
    let mut p = TraceProbe::new(ttl, 1, 44);
    p.tx = Timeval::new(1_700_000_600, u32::from(ttl));
    p.replies.push(r);
    p
}

pub fn read_all(bytes: &[u8]) -> Vec<WartsObject> {
    let mut r = WartsReader::from_reader(bytes, &cfg());
    let mut out = Vec::new();
    while let Some(obj) = r.read().unwrap() {
        out.push(obj);
    }
    out
}

pub fn kinds(objs: &[WartsObject]) -> Vec<container::ObjectType> {
    objs.iter().map(WartsObject::object_type).collect()
}
