//! Ping measurement records.
//!
//! A ping record holds the measurement parameters, one slot per probe sent,
//! and the replies each probe drew. On disk only replies are stored; each
//! reply repeats its probe's index, transmit time, source port and IPID, and
//! the decoder rebuilds a probe the first time it sees one of its replies.
//! Probes that drew no reply come back as empty slots.

mod codec;
mod stats;

use std::net::Ipv4Addr;
use std::sync::Arc;

use wire::{Addr, Timeval};

use crate::{Cycle, List};

pub use codec::{decode, encode};
pub use stats::PingStats;

/// Probe methods.
pub mod method {
    pub const ICMP_ECHO: u8 = 0x00;
    pub const TCP_ACK: u8 = 0x01;
    pub const TCP_ACK_SPORT: u8 = 0x02;
    pub const UDP: u8 = 0x03;
    pub const UDP_DPORT: u8 = 0x04;
    pub const ICMP_TIME: u8 = 0x05;
    pub const TCP_SYN: u8 = 0x06;
    pub const TCP_SYNACK: u8 = 0x07;
    pub const TCP_RST: u8 = 0x08;
    pub const TCP_SYN_SPORT: u8 = 0x09;
    pub const UDP_SPORT: u8 = 0x0a;
}

/// Bits of [`Ping::flags`].
pub mod flag {
    pub const V4RR: u32 = 0x01;
    pub const SPOOF: u32 = 0x02;
    pub const PAYLOAD: u32 = 0x04;
    pub const TSONLY: u32 = 0x08;
    pub const TSANDADDR: u32 = 0x10;
    pub const ICMPSUM: u32 = 0x20;
    pub const DL: u32 = 0x40;
    pub const TBT: u32 = 0x80;
    pub const NOSRC: u32 = 0x100;
    pub const RAW: u32 = 0x200;
    pub const SOCKRX: u32 = 0x400;
}

/// Bits of [`PingReply::flags`].
pub mod reply_flag {
    pub const REPLY_TTL: u8 = 0x01;
    pub const REPLY_IPID: u8 = 0x02;
    pub const PROBE_IPID: u8 = 0x04;
    pub const DLTX: u8 = 0x08;
    pub const DLRX: u8 = 0x10;
}

pub(crate) const IPPROTO_ICMP: u8 = 1;
pub(crate) const IPPROTO_TCP: u8 = 6;
pub(crate) const IPPROTO_UDP: u8 = 17;
pub(crate) const IPPROTO_ICMPV6: u8 = 58;

#[derive(Debug, Clone, PartialEq)]
pub struct Ping {
    pub list: Option<Arc<List>>,
    pub cycle: Option<Arc<Cycle>>,
    pub userid: u32,
    pub src: Option<Addr>,
    pub dst: Addr,
    /// Router the probes were sent through, when not the default route.
    pub rtr: Option<Addr>,
    pub start: Timeval,
    pub stop_reason: u8,
    pub stop_data: u8,
    /// Probe payload.
    pub data: Vec<u8>,
    /// Number of probes requested.
    pub attempts: u16,
    pub size: u16,
    /// Whole seconds are stored in one byte.
    pub wait_probe: Timeval,
    pub wait_timeout: Timeval,
    pub ttl: u8,
    pub tos: u8,
    pub method: u8,
    pub sport: u16,
    pub dport: u16,
    pub icmpsum: u16,
    pub tcpseq: u32,
    pub tcpack: u32,
    pub stop_count: u16,
    pub pmtu: u16,
    pub flags: u32,
    /// Pre-specified addresses for the IPv4 timestamp option.
    pub tsps: Option<Tsps>,
    /// One slot per probe sent, indexed by probe id.
    pub probes: Vec<Option<PingProbe>>,
}

impl Ping {
    #[must_use]
    pub fn new(dst: Addr) -> Self {
        Ping {
            list: None,
            cycle: None,
            userid: 0,
            src: None,
            dst,
            rtr: None,
            start: Timeval::ZERO,
            stop_reason: 0,
            stop_data: 0,
            data: Vec::new(),
            attempts: 0,
            size: 0,
            wait_probe: Timeval::ZERO,
            wait_timeout: Timeval::ZERO,
            ttl: 0,
            tos: 0,
            method: method::ICMP_ECHO,
            sport: 0,
            dport: 0,
            icmpsum: 0,
            tcpseq: 0,
            tcpack: 0,
            stop_count: 0,
            pmtu: 0,
            flags: 0,
            tsps: None,
            probes: Vec::new(),
        }
    }

    /// Number of probes sent, which is the number of probe slots.
    #[must_use]
    pub fn ping_sent(&self) -> usize {
        self.probes.len()
    }

    #[must_use]
    pub fn reply_count(&self) -> usize {
        self.probes.iter().flatten().map(|p| p.replies.len()).sum()
    }

    #[must_use]
    pub fn method_is_icmp(&self) -> bool {
        matches!(self.method, method::ICMP_ECHO | method::ICMP_TIME)
    }

    #[must_use]
    pub fn method_is_tcp(&self) -> bool {
        matches!(
            self.method,
            method::TCP_ACK
                | method::TCP_ACK_SPORT
                | method::TCP_SYN
                | method::TCP_SYNACK
                | method::TCP_RST
                | method::TCP_SYN_SPORT
        )
    }

    #[must_use]
    pub fn method_is_udp(&self) -> bool {
        matches!(
            self.method,
            method::UDP | method::UDP_DPORT | method::UDP_SPORT
        )
    }

    /// Whether `reply` is the kind of answer the probe method asks the
    /// destination for, as opposed to an error from somewhere on the path.
    #[must_use]
    pub fn reply_is_from_target(&self, reply: &PingReply) -> bool {
        match self.method {
            method::ICMP_ECHO => reply.is_icmp_echo_reply(),
            method::ICMP_TIME => reply.is_icmp_tsreply(),
            _ if self.method_is_tcp() => reply.is_tcp(),
            _ if self.method_is_udp() => reply.is_udp() || reply.is_icmp_unreach_port(),
            _ => false,
        }
    }

    /// Protocol a reply to this ping is assumed to use when an old record
    /// did not store one.
    pub(crate) fn default_reply_proto(&self) -> u8 {
        if self.dst.is_ipv4() {
            IPPROTO_ICMP
        } else {
            IPPROTO_ICMPV6
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tsps {
    pub ips: Vec<Addr>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingProbe {
    pub id: u16,
    pub tx: Timeval,
    pub sport: u16,
    pub ipid: u16,
    pub replies: Vec<PingReply>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingReply {
    pub addr: Addr,
    pub flags: u8,
    pub proto: u8,
    pub ttl: u8,
    pub tos: u8,
    pub size: u16,
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub tcp_flags: u8,
    pub rtt: Timeval,
    /// 16-bit for IPv4 replies, 32-bit for IPv6 fragment headers.
    pub ipid32: u32,
    pub icmp_nhmtu: u16,
    pub v4rr: Option<V4Rr>,
    pub v4ts: Option<V4Ts>,
    pub tsreply: Option<TsReply>,
    pub ifname: Option<String>,
}

impl PingReply {
    #[must_use]
    pub fn new(addr: Addr) -> Self {
        PingReply {
            addr,
            flags: 0,
            proto: if addr.is_ipv6() {
                IPPROTO_ICMPV6
            } else {
                IPPROTO_ICMP
            },
            ttl: 0,
            tos: 0,
            size: 0,
            icmp_type: 0,
            icmp_code: 0,
            tcp_flags: 0,
            rtt: Timeval::ZERO,
            ipid32: 0,
            icmp_nhmtu: 0,
            v4rr: None,
            v4ts: None,
            tsreply: None,
            ifname: None,
        }
    }

    pub(crate) fn placeholder() -> Self {
        Self::new(Addr::V4(Ipv4Addr::UNSPECIFIED))
    }

    #[must_use]
    pub fn is_icmp(&self) -> bool {
        self.proto == IPPROTO_ICMP || self.proto == IPPROTO_ICMPV6
    }

    #[must_use]
    pub fn is_tcp(&self) -> bool {
        self.proto == IPPROTO_TCP
    }

    #[must_use]
    pub fn is_udp(&self) -> bool {
        self.proto == IPPROTO_UDP
    }

    #[must_use]
    pub fn is_icmp_echo_reply(&self) -> bool {
        match self.proto {
            IPPROTO_ICMP => self.icmp_type == 0,
            IPPROTO_ICMPV6 => self.icmp_type == 129,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_icmp_unreach(&self) -> bool {
        match self.proto {
            IPPROTO_ICMP => self.icmp_type == 3,
            IPPROTO_ICMPV6 => self.icmp_type == 1,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_icmp_unreach_port(&self) -> bool {
        match self.proto {
            IPPROTO_ICMP => self.icmp_type == 3 && self.icmp_code == 3,
            IPPROTO_ICMPV6 => self.icmp_type == 1 && self.icmp_code == 4,
            _ => false,
        }
    }

    /// Packet-too-big: fragmentation needed, or ICMPv6 type 2.
    #[must_use]
    pub fn is_icmp_ptb(&self) -> bool {
        match self.proto {
            IPPROTO_ICMP => self.icmp_type == 3 && self.icmp_code == 4,
            IPPROTO_ICMPV6 => self.icmp_type == 2,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_icmp_ttl_exp(&self) -> bool {
        match self.proto {
            IPPROTO_ICMP => self.icmp_type == 11,
            IPPROTO_ICMPV6 => self.icmp_type == 3,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_icmp_tsreply(&self) -> bool {
        self.proto == IPPROTO_ICMP && self.icmp_type == 14
    }
}

/// IPv4 record-route option echoed in a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct V4Rr {
    pub ips: Vec<Addr>,
}

/// IPv4 timestamp option echoed in a reply. `ips` is either empty or the
/// same length as `tss`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct V4Ts {
    pub tss: Vec<u32>,
    pub ips: Vec<Addr>,
}

/// ICMP timestamp reply: originate, receive, transmit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TsReply {
    pub tso: u32,
    pub tsr: u32,
    pub tst: u32,
}
