use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use wire::{Addr, Timeval};

use crate::ping::{method, reply_flag, PingProbe, PingReply};
use crate::trace::{TraceProbe, TraceReply};
use crate::{Cycle, FileTables, List, Ping};

pub fn v4(a: u8, b: u8, c: u8, d: u8) -> Addr {
    Addr::V4(Ipv4Addr::new(a, b, c, d))
}

pub fn v6(last: u16) -> Addr {
    Addr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, last))
}

pub fn echo_reply(addr: Addr, rtt_us: u32) -> PingReply {
    let mut r = PingReply::new(addr);
    r.icmp_type = if addr.is_ipv4() { 0 } else { 129 };
    r.flags = reply_flag::REPLY_TTL;
    r.ttl = 60;
    r.size = 84;
    r.rtt = Timeval::from_micros(rtt_us);
    r
}

pub fn probe(id: u16, replies: Vec<PingReply>) -> PingProbe {
    PingProbe {
        id,
        tx: Timeval::new(1_700_000_000 + u32::from(id), 250_000),
        sport: 0,
        ipid: 0,
        replies,
    }
}

/// A ping to 192.0.2.1 with typical parameters and no probes.
pub fn basic_ping() -> Ping {
    let mut p = Ping::new(v4(192, 0, 2, 1));
    p.src = Some(v4(198, 51, 100, 2));
    p.start = Timeval::new(1_700_000_000, 0);
    p.method = method::ICMP_ECHO;
    p.attempts = 3;
    p.size = 84;
    p.ttl = 64;
    p.wait_probe = Timeval::new(1, 0);
    p.wait_timeout = Timeval::new(1, 0);
    p
}

pub fn hop(ttl: u8, id: u8, addr: Addr, rtt_us: u32) -> TraceProbe {
    let mut reply = TraceReply::new(addr);
    reply.ttl = 64 - ttl;
    reply.size = 56;
    reply.icmp_type = if addr.is_ipv4() { 11 } else { 3 };
    reply.icmp_q_ttl = 1;
    reply.icmp_q_ipl = 60;
    reply.rtt = Timeval::from_micros(rtt_us);
    TraceProbe {
        ttl,
        id,
        size: 60,
        tx: Timeval::new(1_700_000_100, u32::from(ttl) * 1000),
        replies: vec![reply],
    }
}

/// File tables holding one list and one cycle, both under file id 1.
pub fn tables_with_cycle() -> (FileTables, Arc<List>, Arc<Cycle>) {
    let mut tables = FileTables::new();
    let mut list = List::new(7, "default");
    list.monitor = Some("mon1".to_string());
    let list = Arc::new(list);
    let cycle = Arc::new(Cycle::new(Arc::clone(&list), 3, 1_700_000_000));
    tables.lists.push(Arc::clone(&list)).unwrap();
    tables.cycles.push(Arc::clone(&cycle)).unwrap();
    (tables, list, cycle)
}
