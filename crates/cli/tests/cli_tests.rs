use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use records::ping::{PingProbe, PingReply};
use records::trace::{TraceProbe, TraceReply};
use tempfile::tempdir;
use warts::{Addr, Cycle, List, ObjectType, Ping, Trace, WartsObject, WartsReader, WartsWriter};

// -------------------- Helpers --------------------

fn wartsutil(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wartsutil"))
        .args(args)
        .env_remove("WARTS_TOLERATE_TAIL")
        .env_remove("WARTS_MAX_RECORD_KB")
        .output()
        .expect("failed to run wartsutil")
}

fn stdout(o: &Output) -> String {
    String::from_utf8_lossy(&o.stdout).to_string()
}

fn v4(d: u8) -> Addr {
    Addr::V4(Ipv4Addr::new(192, 0, 2, d))
}

fn ping(d: u8) -> Ping {
    let mut p = Ping::new(v4(d));
    p.attempts = 1;
    p.size = 84;
    let mut r = PingReply::new(v4(d));
    r.size = 84;
    p.probes = vec![Some(PingProbe {
        id: 0,
        replies: vec![r],
        ..Default::default()
    })];
    p
}

fn trace(d: u8) -> Trace {
    let mut t = Trace::new(v4(d));
    let mut r = TraceReply::new(v4(d));
    r.icmp_type = 3;
    r.icmp_code = 3;
    let mut probe = TraceProbe::new(1, 1, 44);
    probe.replies.push(r);
    t.probe_size = 44;
    t.hops = vec![vec![probe]];
    t
}

/// list, cycle def, ping, trace, ping
fn write_sample(path: &Path) {
    let l = Arc::new(List::new(1, "sample"));
    let c = Arc::new(Cycle::new(Arc::clone(&l), 1, 1_700_000_000));
    let mut w = WartsWriter::create(path).unwrap();
    let mut p = ping(1);
    p.list = Some(Arc::clone(&l));
    p.cycle = Some(Arc::clone(&c));
    w.write_ping(&p).unwrap();
    let mut t = trace(2);
    t.list = Some(l);
    t.cycle = Some(c);
    w.write_trace(&t).unwrap();
    w.write_ping(&ping(3)).unwrap();
    w.flush().unwrap();
}

// -------------------- stat --------------------

#[test]
fn stat_counts_objects() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sample.warts");
    write_sample(&path);

    let o = wartsutil(&["stat", path.to_str().unwrap()]);
    assert!(o.status.success());
    let s = stdout(&o);
    assert!(s.contains("list            1"), "{s}");
    assert!(s.contains("cycle-def       1"), "{s}");
    assert!(s.contains("trace           1"), "{s}");
    assert!(s.contains("ping            2"), "{s}");
    assert!(s.contains("undecodable     0"), "{s}");
    assert!(s.contains("ping replies    2"), "{s}");
}

#[test]
fn stat_continues_past_bad_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.warts");
    write_sample(&path);
    let mut data = fs::read(&path).unwrap();
    // ping without a destination
    data.extend_from_slice(&[0x12, 0x05, 0x00, 0x07, 0, 0, 0, 3, 0, 0, 0]);
    fs::write(&path, &data).unwrap();

    let o = wartsutil(&["stat", path.to_str().unwrap()]);
    assert!(o.status.success());
    let s = stdout(&o);
    assert!(s.contains("undecodable     1"), "{s}");
    assert!(s.contains("ping            2"), "{s}");
}

#[test]
fn stat_missing_file_fails() {
    let dir = tempdir().unwrap();
    let o = wartsutil(&["stat", dir.path().join("absent").to_str().unwrap()]);
    assert!(!o.status.success());
}

#[test]
fn truncated_tail_needs_the_flag() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cut.warts");
    write_sample(&path);
    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..data.len() - 2]).unwrap();
    let p = path.to_str().unwrap();

    assert!(!wartsutil(&["stat", p]).status.success());
    let o = wartsutil(&["stat", "--tolerate-tail", p]);
    assert!(o.status.success());
    assert!(stdout(&o).contains("ping            1"));
}

// -------------------- check --------------------

#[test]
fn check_passes_on_written_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sample.warts");
    write_sample(&path);

    let o = wartsutil(&["check", path.to_str().unwrap()]);
    assert!(o.status.success(), "{}", stdout(&o));
    assert!(stdout(&o).contains("checked 3 records: 0 differ, 0 undecodable"));
}

#[test]
fn check_reports_legacy_encoding() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy.warts");
    // address object, then a ping naming its destination by that id
    let data = [
        &[0x12, 0x05, 0x00, 0x05, 0, 0, 0, 6, 1, 1, 10, 0, 0, 1][..],
        &[0x12, 0x05, 0x00, 0x07, 0, 0, 0, 9, 0x08, 0x00, 0x04, 0, 0, 0, 1, 0, 0][..],
    ]
    .concat();
    fs::write(&path, data).unwrap();

    let o = wartsutil(&["check", path.to_str().unwrap()]);
    assert!(!o.status.success());
    let s = stdout(&o);
    assert!(s.contains("ping at offset 14"), "{s}");
    assert!(s.contains("1 differ"), "{s}");
}

// -------------------- filter --------------------

#[test]
fn filter_copies_selected_types() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.warts");
    let output = dir.path().join("out.warts");
    write_sample(&input);

    let o = wartsutil(&[
        "filter",
        "--types",
        "trace",
        input.to_str().unwrap(),
        output.to_str().unwrap(),
    ]);
    assert!(o.status.success());
    assert!(stdout(&o).contains("copied 1 objects"));
    assert!(!dir.path().join("out.warts.tmp").exists());

    let mut r = WartsReader::open(&output, &config::WartsConfig::default()).unwrap();
    let mut kinds = Vec::new();
    while let Some(obj) = r.read().unwrap() {
        if let WartsObject::Trace(t) = &obj {
            assert_eq!(t.list.as_ref().map(|l| l.name.as_str()), Some("sample"));
        }
        kinds.push(obj.object_type());
    }
    // the trace brings its list and cycle along
    assert_eq!(
        kinds,
        vec![ObjectType::List, ObjectType::CycleDef, ObjectType::Trace]
    );
}

#[test]
fn filter_rejects_unknown_type() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.warts");
    write_sample(&input);
    let o = wartsutil(&[
        "filter",
        "-t",
        "pong",
        input.to_str().unwrap(),
        dir.path().join("out.warts").to_str().unwrap(),
    ]);
    assert!(!o.status.success());
    assert!(!dir.path().join("out.warts").exists());
}
