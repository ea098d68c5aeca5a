use super::helpers::*;
use crate::ping::{self, flag, method, reply_flag, PingReply, TsReply, Tsps, V4Rr, V4Ts};
use crate::{FileTables, RefIds};
use anyhow::Result;
use flags::Flags;
use wire::{DecodeError, EncodeError, ErrorKind, Timeval};

fn round_trip(p: &crate::Ping, refs: RefIds, tables: &FileTables) -> Result<crate::Ping> {
    let bytes = ping::encode(p, refs)?;
    Ok(ping::decode(&bytes, tables)?)
}

// -------------------- Scenarios --------------------

#[test]
fn echo_and_port_unreachable_round_trip() -> Result<()> {
    let mut p = basic_ping();
    let router = v4(203, 0, 113, 5);

    let mut unreach = PingReply::new(router);
    unreach.icmp_type = 3;
    unreach.icmp_code = 3;
    unreach.size = 56;
    unreach.rtt = Timeval::from_micros(31_000);

    p.probes = vec![
        Some(probe(0, vec![echo_reply(p.dst, 12_500)])),
        None,
        Some(probe(2, vec![unreach])),
    ];

    let back = round_trip(&p, RefIds::default(), &FileTables::new())?;
    assert_eq!(back, p);
    assert_eq!(back.ping_sent(), 3);

    let counts: Vec<usize> = back
        .probes
        .iter()
        .map(|s| s.as_ref().map_or(0, |p| p.replies.len()))
        .collect();
    assert_eq!(counts, vec![1, 0, 1]);

    let far = &back.probes[2].as_ref().unwrap().replies[0];
    assert_eq!(far.addr, router);
    assert_ne!(far.addr, back.dst);
    assert!(far.is_icmp_unreach_port());
    Ok(())
}

#[test]
fn every_optional_field_round_trips() -> Result<()> {
    let (tables, list, cycle) = tables_with_cycle();
    let mut p = basic_ping();
    p.list = Some(list);
    p.cycle = Some(cycle);
    p.userid = 42;
    p.rtr = Some(v4(198, 51, 100, 254));
    p.method = method::UDP_DPORT;
    p.sport = 40_000;
    p.dport = 33_435;
    p.data = vec![0xde, 0xad, 0xbe, 0xef];
    p.flags = flag::V4RR | flag::ICMPSUM | flag::SOCKRX;
    p.icmpsum = 0xbeef;
    p.tcpseq = 7;
    p.tcpack = 9;
    p.tos = 0x10;
    p.stop_count = 2;
    p.pmtu = 1500;
    p.wait_probe = Timeval::new(1, 500_000);
    p.wait_timeout = Timeval::new(5, 250_000);
    p.tsps = Some(Tsps {
        ips: vec![v4(10, 0, 0, 1), v4(10, 0, 0, 2)],
    });

    let router = v4(203, 0, 113, 9);

    let mut udp = PingReply::new(p.dst);
    udp.proto = 17;
    udp.flags = reply_flag::REPLY_TTL | reply_flag::REPLY_IPID | reply_flag::PROBE_IPID;
    udp.ttl = 50;
    udp.ipid32 = 0x1234;
    udp.tos = 0x20;
    udp.size = 40;
    udp.rtt = Timeval::from_micros(9_000);
    udp.v4rr = Some(V4Rr {
        ips: vec![v4(10, 0, 0, 1), router, p.dst],
    });
    udp.ifname = Some("eth0".to_string());

    let mut unreach = PingReply::new(router);
    unreach.icmp_type = 3;
    unreach.icmp_code = 3;
    unreach.rtt = Timeval::from_micros(9_500);
    unreach.ifname = Some("eth0".to_string());
    unreach.v4ts = Some(V4Ts {
        tss: vec![100, 200],
        ips: vec![router, v4(10, 0, 0, 2)],
    });

    let mut ptb = PingReply::new(router);
    ptb.icmp_type = 3;
    ptb.icmp_code = 4;
    ptb.icmp_nhmtu = 1400;
    ptb.tsreply = Some(TsReply {
        tso: 1,
        tsr: 2,
        tst: 3,
    });
    ptb.v4ts = Some(V4Ts {
        tss: vec![5],
        ips: vec![],
    });

    let mut first = probe(0, vec![udp, unreach]);
    first.sport = 40_000;
    first.ipid = 0x4321;
    let mut third = probe(2, vec![ptb]);
    third.sport = 40_002;
    p.probes = vec![Some(first), None, Some(third)];

    let back = round_trip(&p, RefIds { list: 1, cycle: 1 }, &tables)?;
    assert_eq!(back, p);
    assert_eq!(back.reply_count(), 3);
    Ok(())
}

#[test]
fn ipv6_reply_ipid_uses_32_bit_field() -> Result<()> {
    let mut p = crate::Ping::new(v6(1));
    p.attempts = 1;
    let mut reply = echo_reply(p.dst, 700);
    reply.flags |= reply_flag::REPLY_IPID;
    reply.ipid32 = 0xdead_beef;
    p.probes = vec![Some(probe(0, vec![reply]))];

    let back = round_trip(&p, RefIds::default(), &FileTables::new())?;
    assert_eq!(back, p);
    let r = &back.probes[0].as_ref().unwrap().replies[0];
    assert_eq!(r.proto, 58);
    assert_eq!(r.ipid32, 0xdead_beef);
    Ok(())
}

#[test]
fn probe_without_replies_decodes_as_empty_slot() -> Result<()> {
    let mut p = basic_ping();
    p.probes = vec![Some(probe(0, vec![]))];
    let back = round_trip(&p, RefIds::default(), &FileTables::new())?;
    assert_eq!(back.probes, vec![None]);
    Ok(())
}

// -------------------- Bitmap --------------------

#[test]
fn minimal_ping_sets_only_mandatory_fields() -> Result<()> {
    let p = crate::Ping::new(v4(192, 0, 2, 1));
    let bytes = ping::encode(&p, RefIds::default())?;

    let (flags, used) = Flags::unfold(&bytes)?;
    assert_eq!(used, 3);
    assert_eq!(
        flags.ids().collect::<Vec<_>>(),
        vec![5, 6, 7, 10, 11, 12, 13, 15, 21]
    );
    // bitmap, params_len, 24 bytes of fields, reply count
    assert_eq!(bytes.len(), 3 + 2 + 24 + 2);
    Ok(())
}

#[test]
fn equal_timeout_is_not_written_and_defaults_on_read() -> Result<()> {
    let mut p = basic_ping();
    p.wait_probe = Timeval::new(2, 0);
    p.wait_timeout = Timeval::new(2, 0);
    let bytes = ping::encode(&p, RefIds::default())?;
    let (flags, _) = Flags::unfold(&bytes)?;
    assert!(!flags.is_set(27));

    let back = ping::decode(&bytes, &FileTables::new())?;
    assert_eq!(back.wait_timeout, Timeval::new(2, 0));

    p.wait_timeout = Timeval::new(4, 0);
    let bytes = ping::encode(&p, RefIds::default())?;
    assert!(Flags::unfold(&bytes)?.0.is_set(27));
    assert_eq!(ping::decode(&bytes, &FileTables::new())?.wait_timeout.sec, 4);
    Ok(())
}

#[test]
fn flag_width_follows_value() -> Result<()> {
    let mut p = basic_ping();
    p.flags = flag::V4RR;
    let (f, _) = Flags::unfold(&ping::encode(&p, RefIds::default())?)?;
    assert!(f.is_set(22));
    assert!(!f.is_set(30));

    p.flags = flag::RAW;
    let (f, _) = Flags::unfold(&ping::encode(&p, RefIds::default())?)?;
    assert!(!f.is_set(22));
    assert!(f.is_set(30));
    Ok(())
}

// -------------------- Legacy input --------------------

/// dst only, plus the given extra field bytes after it.
fn dst_body(flags: &[u8], extra: &[u8]) -> Vec<u8> {
    let mut b = flags.to_vec();
    let len = 6 + extra.len() as u16;
    b.extend_from_slice(&len.to_be_bytes());
    b.extend_from_slice(&[4, 1, 192, 0, 2, 1]);
    b.extend_from_slice(extra);
    b.extend_from_slice(&[0, 0]);
    b
}

#[test]
fn legacy_flags_byte_alone_is_promoted() -> Result<()> {
    // ids 21, 22
    let body = dst_body(&[0x80, 0x80, 0x40, 0x01], &[0x21]);
    let p = ping::decode(&body, &FileTables::new())?;
    assert_eq!(p.flags, 0x21);
    assert_eq!(p.dst, v4(192, 0, 2, 1));
    assert!(p.probes.is_empty());
    Ok(())
}

#[test]
fn wide_flags_win_over_legacy_byte() -> Result<()> {
    // ids 21, 22, 30
    let body = dst_body(&[0x80, 0x80, 0xc0, 0x81, 0x02], &[0xff, 0, 0, 0x04, 0]);
    let p = ping::decode(&body, &FileTables::new())?;
    assert_eq!(p.flags, 0x400);
    Ok(())
}

/// ping_sent = 1, dst = 192.0.2.1, one reply carrying only probe id and
/// address.
fn one_reply_body(probe_id: u8) -> Vec<u8> {
    let mut b = vec![0x80, 0x80, 0x41, 0x00, 0x08, 0x00, 0x01, 4, 1, 192, 0, 2, 1];
    b.extend_from_slice(&[0x00, 0x01]);
    b.extend_from_slice(&[0xc0, 0x10, 0x00, 0x08, 0x00, probe_id, 4, 1, 192, 0, 2, 1]);
    b
}

#[test]
fn reply_without_protocol_defaults_from_destination() -> Result<()> {
    let p = ping::decode(&one_reply_body(0), &FileTables::new())?;
    let r = &p.probes[0].as_ref().unwrap().replies[0];
    assert_eq!(r.proto, 1);
    assert_eq!(r.addr, p.dst);
    assert!(r.is_icmp());
    Ok(())
}

#[test]
fn reply_for_unsent_probe_is_rejected() {
    let err = ping::decode(&one_reply_body(1), &FileTables::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
}

#[test]
fn deprecated_destination_gid_resolves_through_file_table() -> Result<()> {
    let mut tables = FileTables::new();
    tables.addrs.push(v4(10, 9, 8, 7))?;
    // id 4 only
    let body = [0x08, 0x00, 0x04, 0, 0, 0, 1, 0, 0];
    let p = ping::decode(&body, &tables)?;
    assert_eq!(p.dst, v4(10, 9, 8, 7));
    Ok(())
}

#[test]
fn missing_destination_fails() {
    let err = ping::decode(&[0x00, 0x00, 0x00], &FileTables::new()).unwrap_err();
    assert_eq!(err, DecodeError::MissingField("ping destination"));
}

#[test]
fn truncated_body_fails() -> Result<()> {
    let mut p = basic_ping();
    p.probes = vec![Some(probe(0, vec![echo_reply(p.dst, 1_000)]))];
    let bytes = ping::encode(&p, RefIds::default())?;
    let err = ping::decode(&bytes[..bytes.len() - 1], &FileTables::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Truncation);
    Ok(())
}

// -------------------- Encode errors --------------------

#[test]
fn probe_in_wrong_slot_is_inconsistent() {
    let mut p = basic_ping();
    p.probes = vec![Some(probe(1, vec![echo_reply(p.dst, 1)]))];
    assert!(matches!(
        ping::encode(&p, RefIds::default()),
        Err(EncodeError::Inconsistent(_))
    ));
}

#[test]
fn list_without_file_id_is_dangling() {
    let (_, list, _) = tables_with_cycle();
    let mut p = basic_ping();
    p.list = Some(list);
    assert!(matches!(
        ping::encode(&p, RefIds::default()),
        Err(EncodeError::DanglingReference(_))
    ));
}

#[test]
fn wait_over_a_byte_is_too_large() {
    let mut p = basic_ping();
    p.wait_probe = Timeval::new(300, 0);
    assert!(matches!(
        ping::encode(&p, RefIds::default()),
        Err(EncodeError::TooLarge { .. })
    ));
}

#[test]
fn timestamp_addresses_must_match_timestamps() {
    let mut p = basic_ping();
    let mut r = echo_reply(p.dst, 1);
    r.v4ts = Some(V4Ts {
        tss: vec![1, 2],
        ips: vec![p.dst],
    });
    p.probes = vec![Some(probe(0, vec![r]))];
    assert!(matches!(
        ping::encode(&p, RefIds::default()),
        Err(EncodeError::Inconsistent(_))
    ));
}

#[test]
fn wide_ipv4_reply_ipid_is_inconsistent() {
    let mut p = basic_ping();
    let mut r = echo_reply(p.dst, 1);
    r.flags |= reply_flag::REPLY_IPID;
    r.ipid32 = 0x1_0000;
    p.probes = vec![Some(probe(0, vec![r]))];
    assert_eq!(
        ping::encode(&p, RefIds::default()).unwrap_err(),
        EncodeError::Inconsistent("ipv4 reply ip-id wider than 16 bits")
    );
}

#[test]
fn rtt_must_fit_a_microsecond_count() {
    let mut p = basic_ping();
    let mut r = echo_reply(p.dst, 1);
    r.rtt = Timeval::new(0, 1_500_000);
    p.probes = vec![Some(probe(0, vec![r.clone()]))];
    assert!(matches!(
        ping::encode(&p, RefIds::default()),
        Err(EncodeError::Inconsistent(_))
    ));

    r.rtt = Timeval::new(5_000, 0);
    p.probes = vec![Some(probe(0, vec![r]))];
    assert!(matches!(
        ping::encode(&p, RefIds::default()),
        Err(EncodeError::TooLarge { .. })
    ));
}

// -------------------- Hostile input --------------------

#[test]
fn full_length_bitmap_is_an_error_not_a_crash() {
    let mut body = vec![0x80; 9362];
    body.push(0x40);
    body.extend_from_slice(&[0x00, 0x00]);
    assert!(ping::decode(&body, &FileTables::new()).is_err());
}

#[test]
fn over_long_bitmap_is_malformed() {
    let mut body = vec![0x80; 9363];
    body.push(0x01);
    assert_eq!(
        ping::decode(&body, &FileTables::new()).unwrap_err(),
        DecodeError::Malformed("presence bitmap length")
    );
}

// -------------------- Statistics --------------------

#[test]
fn stats_count_first_target_reply_per_probe() {
    let mut p = basic_ping();
    let mut unreach = PingReply::new(v4(203, 0, 113, 1));
    unreach.icmp_type = 3;
    unreach.icmp_code = 1;

    p.probes = vec![
        Some(probe(
            0,
            vec![echo_reply(p.dst, 10_000), echo_reply(p.dst, 12_000)],
        )),
        None,
        Some(probe(2, vec![unreach])),
        Some(probe(3, vec![echo_reply(p.dst, 20_000)])),
    ];

    let s = p.stats();
    assert_eq!(s.replies, 2);
    assert_eq!(s.dups, 1);
    assert_eq!(s.loss, 1);
    assert_eq!(s.errors, 1);
    assert_eq!(s.min_rtt, Some(Timeval::new(0, 10_000)));
    assert_eq!(s.max_rtt, Some(Timeval::new(0, 20_000)));
    assert_eq!(s.avg_rtt, Some(Timeval::new(0, 15_000)));
    assert_eq!(s.stddev_rtt, Some(Timeval::new(0, 5_000)));
}

#[test]
fn stats_without_replies_have_no_rtt() {
    let mut p = basic_ping();
    p.probes = vec![None, None];
    let s = p.stats();
    assert_eq!(s.loss, 2);
    assert_eq!(s.min_rtt, None);
    assert_eq!(s.stddev_rtt, None);
}

#[test]
fn udp_method_counts_port_unreachable_from_target() {
    let mut p = basic_ping();
    p.method = method::UDP;
    let mut unreach = PingReply::new(p.dst);
    unreach.icmp_type = 3;
    unreach.icmp_code = 3;
    assert!(p.reply_is_from_target(&unreach));
    assert!(!p.reply_is_from_target(&echo_reply(p.dst, 1)));
}
