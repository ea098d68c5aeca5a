//! Traceroute measurement records.
//!
//! Hops are kept per TTL: `hops[i]` holds the probes sent with TTL `i + 1`,
//! each with the replies it drew. On disk every reply is one hop block in a
//! single TTL-ascending sequence that repeats its probe's TTL, id, size and
//! transmit time; consecutive blocks for the same probe are regrouped on
//! read.
//!
//! Three optional attributes follow the hop sequence: path-MTU discovery
//! ([`Pmtud`]), last-ditch probing ([`LastDitch`]) and doubletree
//! bookkeeping ([`Dtree`]).

mod attr;
mod codec;
mod hop;

use std::net::Ipv4Addr;
use std::sync::Arc;

use wire::{Addr, Timeval};

use crate::{Cycle, List};

pub use codec::{decode, encode};

/// Probe methods.
pub mod method {
    pub const ICMP_ECHO: u8 = 0x01;
    pub const UDP: u8 = 0x02;
    pub const TCP: u8 = 0x03;
    pub const ICMP_ECHO_PARIS: u8 = 0x04;
    pub const UDP_PARIS: u8 = 0x05;
    pub const TCP_ACK: u8 = 0x06;
}

/// Bits of [`TraceReply::flags`].
pub mod reply_flag {
    pub const TS_SOCK_RX: u8 = 0x01;
    pub const TS_DL_TX: u8 = 0x02;
    pub const TCP: u8 = 0x04;
    pub const TS_DL_RX: u8 = 0x08;
    pub const REPLY_TTL: u8 = 0x10;
    pub const UDP: u8 = 0x20;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub list: Option<Arc<List>>,
    pub cycle: Option<Arc<Cycle>>,
    pub userid: u32,
    pub src: Option<Addr>,
    pub dst: Addr,
    pub rtr: Option<Addr>,
    pub start: Timeval,
    pub stop_reason: u8,
    pub stop_data: u8,
    pub flags: u32,
    pub attempts: u8,
    pub hoplimit: u8,
    /// Number of probes in flight at once; at least 1.
    pub squeries: u8,
    pub method: u8,
    pub probe_size: u16,
    pub sport: u16,
    pub dport: u16,
    /// TTL of the first probe; at least 1.
    pub firsthop: u8,
    pub tos: u8,
    /// Whole seconds only.
    pub wait_timeout: Timeval,
    /// Stored to the hundredth of a second.
    pub wait_probe: Timeval,
    pub loops: u8,
    pub gaplimit: u8,
    pub gapaction: u8,
    pub loopaction: u8,
    pub probec: u16,
    pub confidence: u8,
    /// IP fragment offset used by fragmenting probe methods.
    pub offset: u16,
    pub stop_hop: u8,
    /// Probes by TTL: `hops[i]` holds the probes sent with TTL `i + 1`.
    pub hops: Vec<Vec<TraceProbe>>,
    pub pmtud: Option<Pmtud>,
    pub lastditch: Option<LastDitch>,
    pub dtree: Option<Dtree>,
}

impl Trace {
    #[must_use]
    pub fn new(dst: Addr) -> Self {
        Trace {
            list: None,
            cycle: None,
            userid: 0,
            src: None,
            dst,
            rtr: None,
            start: Timeval::ZERO,
            stop_reason: 0,
            stop_data: 0,
            flags: 0,
            attempts: 0,
            hoplimit: 0,
            squeries: 1,
            method: method::UDP_PARIS,
            probe_size: 0,
            sport: 0,
            dport: 0,
            firsthop: 1,
            tos: 0,
            wait_timeout: Timeval::ZERO,
            wait_probe: Timeval::ZERO,
            loops: 0,
            gaplimit: 0,
            gapaction: 0,
            loopaction: 0,
            probec: 0,
            confidence: 0,
            offset: 0,
            stop_hop: 0,
            hops: Vec::new(),
            pmtud: None,
            lastditch: None,
            dtree: None,
        }
    }

    /// Number of TTLs the hop array covers.
    #[must_use]
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Every `(probe, reply)` pair of the main hop array, in wire order.
    pub fn replies(&self) -> impl Iterator<Item = (&TraceProbe, &TraceReply)> {
        probe_replies(self.hops.iter().flatten())
    }
}

pub(crate) fn probe_replies<'a>(
    probes: impl Iterator<Item = &'a TraceProbe>,
) -> impl Iterator<Item = (&'a TraceProbe, &'a TraceReply)> {
    probes.flat_map(|p| p.replies.iter().map(move |r| (p, r)))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceProbe {
    pub ttl: u8,
    /// Attempt number at this TTL, starting at 1.
    pub id: u8,
    pub size: u16,
    pub tx: Timeval,
    pub replies: Vec<TraceReply>,
}

impl TraceProbe {
    #[must_use]
    pub fn new(ttl: u8, id: u8, size: u16) -> Self {
        TraceProbe {
            ttl,
            id,
            size,
            ..Default::default()
        }
    }

    /// Replies to one probe share this key; adjacent hop blocks with equal
    /// keys belong to the same probe.
    pub(crate) fn key(&self) -> (u8, u8, u16) {
        (self.ttl, self.id, self.size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceReply {
    pub addr: Addr,
    pub flags: u8,
    pub ttl: u8,
    pub rtt: Timeval,
    pub size: u16,
    pub ipid: u16,
    pub tos: u8,
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub icmp_nhmtu: u16,
    /// Length, TTL and TOS of the probe as quoted in an ICMP error.
    pub icmp_q_ipl: u16,
    pub icmp_q_ttl: u8,
    pub icmp_q_tos: u8,
    pub tcp_flags: u8,
    pub icmp_exts: Option<IcmpExts>,
    /// Reverse DNS name of the reply address.
    pub name: Option<String>,
}

impl TraceReply {
    #[must_use]
    pub fn new(addr: Addr) -> Self {
        TraceReply {
            addr,
            flags: 0,
            ttl: 0,
            rtt: Timeval::ZERO,
            size: 0,
            ipid: 0,
            tos: 0,
            icmp_type: 0,
            icmp_code: 0,
            icmp_nhmtu: 0,
            icmp_q_ipl: 0,
            icmp_q_ttl: 0,
            icmp_q_tos: 0,
            tcp_flags: 0,
            icmp_exts: None,
            name: None,
        }
    }

    pub(crate) fn placeholder() -> Self {
        Self::new(Addr::V4(Ipv4Addr::UNSPECIFIED))
    }

    #[must_use]
    pub fn is_tcp(&self) -> bool {
        self.flags & reply_flag::TCP != 0
    }

    #[must_use]
    pub fn is_udp(&self) -> bool {
        self.flags & reply_flag::UDP != 0
    }

    #[must_use]
    pub fn is_icmp(&self) -> bool {
        self.flags & (reply_flag::TCP | reply_flag::UDP) == 0
    }

    /// ICMP errors that quote the probe: unreachable or time exceeded.
    #[must_use]
    pub fn is_icmp_q(&self) -> bool {
        if !self.is_icmp() {
            return false;
        }
        if self.addr.is_ipv4() {
            self.icmp_type == 3 || self.icmp_type == 11
        } else {
            self.icmp_type == 1 || self.icmp_type == 3
        }
    }

    #[must_use]
    pub fn is_icmp_ttl_exp(&self) -> bool {
        self.is_icmp()
            && if self.addr.is_ipv4() {
                self.icmp_type == 11
            } else {
                self.icmp_type == 3
            }
    }

    #[must_use]
    pub fn is_icmp_ptb(&self) -> bool {
        if !self.is_icmp() {
            return false;
        }
        if self.addr.is_ipv4() {
            self.icmp_type == 3 && self.icmp_code == 4
        } else {
            self.icmp_type == 2
        }
    }
}

/// ICMP extension structures (RFC 4884) carried by a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IcmpExts(pub Vec<IcmpExt>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpExt {
    pub class: u8,
    pub kind: u8,
    pub data: Vec<u8>,
}

/// Path-MTU discovery results.
#[derive(Debug, Clone, PartialEq)]
pub struct Pmtud {
    pub ifmtu: u16,
    pub pmtu: u16,
    pub outmtu: u16,
    pub ver: u8,
    pub probes: Vec<TraceProbe>,
    pub notes: Vec<PmtudNote>,
}

impl Default for Pmtud {
    fn default() -> Self {
        Pmtud {
            ifmtu: 0,
            pmtu: 0,
            outmtu: 0,
            ver: 1,
            probes: Vec::new(),
            notes: Vec::new(),
        }
    }
}

impl Pmtud {
    pub fn replies(&self) -> impl Iterator<Item = (&TraceProbe, &TraceReply)> {
        probe_replies(self.probes.iter())
    }

    /// The probe and reply a note points at, if it points anywhere valid.
    #[must_use]
    pub fn note_reply(&self, note: &PmtudNote) -> Option<(&TraceProbe, &TraceReply)> {
        let at = note.reply?;
        let probe = self.probes.get(at.probe)?;
        Some((probe, probe.replies.get(at.reply)?))
    }

    /// Position of a reply in [`Pmtud::replies`] order.
    pub(crate) fn ordinal(&self, at: ReplyRef) -> Option<usize> {
        let probe = self.probes.get(at.probe)?;
        if at.reply >= probe.replies.len() {
            return None;
        }
        let before: usize = self.probes[..at.probe].iter().map(|p| p.replies.len()).sum();
        Some(before + at.reply)
    }

    /// Inverse of [`Pmtud::ordinal`].
    pub(crate) fn resolve(&self, mut ordinal: usize) -> Option<ReplyRef> {
        for (i, probe) in self.probes.iter().enumerate() {
            if ordinal < probe.replies.len() {
                return Some(ReplyRef {
                    probe: i,
                    reply: ordinal,
                });
            }
            ordinal -= probe.replies.len();
        }
        None
    }
}

pub mod note_kind {
    pub const ICMP_PTB: u8 = 0x01;
    pub const ICMP_PTB_BAD: u8 = 0x02;
    pub const SILENCE: u8 = 0x03;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PmtudNote {
    pub kind: u8,
    pub nhmtu: u16,
    pub reply: Option<ReplyRef>,
}

/// Location of a reply inside [`Pmtud::probes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyRef {
    pub probe: usize,
    pub reply: usize,
}

/// Probes sent after the main trace stopped, to find out why.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastDitch {
    pub probes: Vec<TraceProbe>,
}

impl LastDitch {
    pub fn replies(&self) -> impl Iterator<Item = (&TraceProbe, &TraceReply)> {
        probe_replies(self.probes.iter())
    }
}

/// Doubletree stop-set state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dtree {
    pub firsthop: u8,
    /// Address that matched the local stop set.
    pub lss_stop: Option<Addr>,
    /// Address that matched the global stop set.
    pub gss_stop: Option<Addr>,
    /// Name of the local stop set.
    pub lss: Option<String>,
    pub flags: u8,
}
