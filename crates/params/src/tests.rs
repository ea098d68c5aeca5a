use super::*;
use intern::{ReadScope, ReadTable, WriteScope};
use std::net::Ipv4Addr;
use wire::{Addr, DecodeError, EncodeError, WireReader, WireWriter};

// -------------------- Fixture --------------------

static PROBE_FIELDS: [FieldDesc; 6] = [
    FieldDesc::retired(1, 4),
    FieldDesc::fixed(2, 1),
    FieldDesc::fixed(3, 2),
    FieldDesc::var(4),
    FieldDesc::var(5),
    FieldDesc::var(6),
];
static PROBE: Schema = Schema::new("probe", &PROBE_FIELDS);

// Same table with one more field appended, as a newer writer would have it.
static PROBE_V2_FIELDS: [FieldDesc; 7] = [
    FieldDesc::retired(1, 4),
    FieldDesc::fixed(2, 1),
    FieldDesc::fixed(3, 2),
    FieldDesc::var(4),
    FieldDesc::var(5),
    FieldDesc::var(6),
    FieldDesc::fixed(7, 4),
];
static PROBE_V2: Schema = Schema::new("probe-v2", &PROBE_V2_FIELDS);

#[derive(Debug, Default, Clone, PartialEq)]
struct Probe {
    ttl: u8,
    size: u16,
    src: Option<Addr>,
    dst: Option<Addr>,
    name: Option<String>,
    extra: u32,
}

impl ParamsWrite for Probe {
    const SCHEMA: &'static Schema = &PROBE;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        match id {
            2 if self.ttl != 0 => Some(Field::U8(self.ttl)),
            3 if self.size != 0 => Some(Field::U16(self.size)),
            4 => self.src.as_ref().map(Field::Addr),
            5 => self.dst.as_ref().map(Field::Addr),
            6 => self.name.as_deref().map(Field::Str),
            _ => None,
        }
    }
}

impl ParamsRead for Probe {
    const SCHEMA: &'static Schema = &PROBE;

    fn read_field(
        &mut self,
        id: u16,
        r: &mut WireReader<'_>,
        scope: &mut ReadScope<'_>,
    ) -> Result<(), DecodeError> {
        match id {
            1 => self.src = Some(scope.legacy_addr(r)?),
            2 => self.ttl = r.u8()?,
            3 => self.size = r.u16()?,
            4 => self.src = Some(scope.read_addr(r)?),
            5 => self.dst = Some(scope.read_addr(r)?),
            6 => self.name = Some(r.string()?),
            _ => return Err(DecodeError::Malformed("probe field id")),
        }
        Ok(())
    }
}

struct ProbeV2(Probe);

impl ParamsWrite for ProbeV2 {
    const SCHEMA: &'static Schema = &PROBE_V2;

    fn field(&self, id: u16) -> Option<Field<'_>> {
        match id {
            7 => Some(Field::U32(self.0.extra)),
            _ => self.0.field(id),
        }
    }
}

fn encode<P: ParamsWrite>(rec: &P, trailer: &[u8]) -> Vec<u8> {
    let mut scope = WriteScope::new();
    let plan = plan(rec, &mut scope).unwrap();
    let mut w = WireWriter::with_len(plan.encoded_len() + trailer.len());
    write(rec, &plan, &mut w, &mut scope);
    w.put_bytes(trailer);
    w.finish()
}

fn v4(last: u8) -> Addr {
    Addr::V4(Ipv4Addr::new(192, 0, 2, last))
}

// -------------------- Schema --------------------

#[test]
fn schemas_are_dense() {
    assert!(PROBE.is_dense());
    assert!(PROBE_V2.is_dense());
    assert_eq!(PROBE.max_id(), 6);
    assert_eq!(PROBE.get(3), Some(&FieldDesc::fixed(3, 2)));
    assert_eq!(PROBE.get(0), None);
    assert_eq!(PROBE.get(7), None);
}

// -------------------- Plan / Write --------------------

#[test]
fn empty_block_is_a_single_zero_byte() {
    let bytes = encode(&Probe::default(), &[]);
    assert_eq!(bytes, vec![0x00]);

    let legacy = ReadTable::with_base("legacy address", 1);
    let mut scope = ReadScope::new(&legacy);
    let mut out = Probe::default();
    let mut r = WireReader::new(&bytes);
    let flags = read(&mut out, &mut r, &mut scope).unwrap();
    assert!(flags.is_empty());
    assert!(r.is_empty());
}

#[test]
fn bitmap_matches_present_fields_and_length() {
    let p = Probe {
        ttl: 5,
        src: Some(v4(1)),
        ..Probe::default()
    };
    let mut scope = WriteScope::new();
    let plan = plan(&p, &mut scope).unwrap();
    assert_eq!(plan.flags().ids().collect::<Vec<_>>(), vec![2, 4]);
    assert_eq!(plan.params_len(), 1 + 6);
    assert_eq!(plan.encoded_len(), 1 + 2 + 7);

    let bytes = encode(&p, &[]);
    assert_eq!(bytes[0], 0b0000_1010);
    assert_eq!(&bytes[1..3], &[0, 7]);
    assert_eq!(bytes[3], 5);
    assert_eq!(&bytes[4..], &[4, 1, 192, 0, 2, 1]);
}

#[test]
fn repeated_address_is_interned_within_a_block() {
    let p = Probe {
        src: Some(v4(9)),
        dst: Some(v4(9)),
        ..Probe::default()
    };
    let bytes = encode(&p, &[]);
    // literal for the first, [0][id 0] for the second
    assert_eq!(&bytes[3..], &[4, 1, 192, 0, 2, 9, 0, 0, 0, 0, 0]);

    let legacy = ReadTable::with_base("legacy address", 1);
    let mut scope = ReadScope::new(&legacy);
    let mut out = Probe::default();
    read(&mut out, &mut WireReader::new(&bytes), &mut scope).unwrap();
    assert_eq!(out, p);
}

#[test]
fn round_trip_through_read() {
    let p = Probe {
        ttl: 64,
        size: 1500,
        src: Some(v4(1)),
        dst: Some(v4(2)),
        name: Some("gw.example".into()),
        extra: 0,
    };
    let bytes = encode(&p, &[0xaa]);
    let legacy = ReadTable::with_base("legacy address", 1);
    let mut scope = ReadScope::new(&legacy);
    let mut out = Probe::default();
    let mut r = WireReader::new(&bytes);
    read(&mut out, &mut r, &mut scope).unwrap();
    assert_eq!(out, p);
    assert_eq!(r.u8().unwrap(), 0xaa);
}

#[test]
fn interior_nul_is_an_encode_error() {
    let p = Probe {
        name: Some("bad\0name".into()),
        ..Probe::default()
    };
    let err = plan(&p, &mut WriteScope::new()).unwrap_err();
    assert_eq!(err, EncodeError::InteriorNul);
}

#[test]
fn oversized_block_is_rejected() {
    let p = Probe {
        name: Some("x".repeat(70_000)),
        ..Probe::default()
    };
    let err = plan(&p, &mut WriteScope::new()).unwrap_err();
    assert!(matches!(err, EncodeError::TooLarge { .. }));
}

// -------------------- Read --------------------

#[test]
fn newer_fields_are_skipped_to_end_of_window() {
    let p = ProbeV2(Probe {
        ttl: 3,
        extra: 0xdead_beef,
        ..Probe::default()
    });
    let bytes = encode(&p, &[0x55]);
    let legacy = ReadTable::with_base("legacy address", 1);
    let mut scope = ReadScope::new(&legacy);
    let mut out = Probe::default();
    let mut r = WireReader::new(&bytes);
    let flags = read(&mut out, &mut r, &mut scope).unwrap();
    assert!(flags.is_set(7));
    assert_eq!(out.ttl, 3);
    assert_eq!(r.u8().unwrap(), 0x55);
}

#[test]
fn retired_field_reads_from_legacy_table() {
    let mut legacy = ReadTable::with_base("legacy address", 1);
    legacy.push(v4(77)).unwrap();
    // flags {1}, len 4, gid 1
    let bytes = [0x01, 0x00, 0x04, 0, 0, 0, 1];
    let mut scope = ReadScope::new(&legacy);
    let mut out = Probe::default();
    read(&mut out, &mut WireReader::new(&bytes), &mut scope).unwrap();
    assert_eq!(out.src, Some(v4(77)));
}

#[test]
fn field_overrunning_window_is_truncation() {
    // flags {3}, len 1, but field 3 needs 2 bytes
    let bytes = [0x04, 0x00, 0x01, 0xff, 0xff];
    let legacy = ReadTable::with_base("legacy address", 1);
    let mut scope = ReadScope::new(&legacy);
    let mut out = Probe::default();
    let err = read(&mut out, &mut WireReader::new(&bytes), &mut scope).unwrap_err();
    assert!(matches!(err, DecodeError::Truncated { .. }));
}

#[test]
fn short_window_is_truncation() {
    let bytes = [0x02, 0x00, 0x05, 0x01];
    let legacy = ReadTable::with_base("legacy address", 1);
    let mut scope = ReadScope::new(&legacy);
    let mut out = Probe::default();
    let err = read(&mut out, &mut WireReader::new(&bytes), &mut scope).unwrap_err();
    assert!(matches!(err, DecodeError::Truncated { .. }));
}
