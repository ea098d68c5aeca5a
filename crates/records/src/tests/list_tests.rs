use std::sync::Arc;

use super::helpers::*;
use crate::list::{
    decode_cycle, decode_cycle_stop, decode_legacy_addr, decode_list, encode_cycle,
    encode_cycle_stop, encode_list,
};
use crate::{Cycle, FileTables, List};
use anyhow::Result;
use wire::DecodeError;

// -------------------- Lists --------------------

#[test]
fn list_round_trips_with_optional_strings() -> Result<()> {
    let mut list = List::new(42, "targets-2024");
    list.descr = Some("weekly sweep".to_string());
    list.monitor = Some("ams-nl".to_string());

    let bytes = encode_list(&list, 1)?;
    assert_eq!(decode_list(&bytes, &FileTables::new())?, list);
    Ok(())
}

#[test]
fn bare_list_ends_in_empty_params() -> Result<()> {
    let bytes = encode_list(&List::new(1, "a"), 1)?;
    assert_eq!(bytes, vec![0, 0, 0, 1, 0, 0, 0, 1, b'a', 0, 0]);
    Ok(())
}

#[test]
fn list_file_id_must_be_next() -> Result<()> {
    let bytes = encode_list(&List::new(1, "a"), 2)?;
    let err = decode_list(&bytes, &FileTables::new()).unwrap_err();
    assert_eq!(err, DecodeError::Malformed("list file id out of sequence"));
    Ok(())
}

// -------------------- Cycles --------------------

#[test]
fn cycle_resolves_its_list() -> Result<()> {
    let (_, list, _) = tables_with_cycle();
    let mut tables = FileTables::new();
    tables.lists.push(Arc::clone(&list))?;

    let mut cycle = Cycle::new(Arc::clone(&list), 11, 1_700_000_000);
    cycle.hostname = Some("mon1.example.net".to_string());
    cycle.stop_time = 1_700_086_400;

    let bytes = encode_cycle(&cycle, 1, 1)?;
    let back = decode_cycle(&bytes, &tables)?;
    assert_eq!(back, cycle);
    assert!(Arc::ptr_eq(&back.list, &list));
    Ok(())
}

#[test]
fn cycle_with_unknown_list_fails() -> Result<()> {
    let list = Arc::new(List::new(1, "a"));
    let bytes = encode_cycle(&Cycle::new(list, 1, 0), 1, 3)?;
    let err = decode_cycle(&bytes, &FileTables::new()).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownReference { id: 3, .. }));
    Ok(())
}

#[test]
fn cycle_stop_is_nine_bytes() -> Result<()> {
    let bytes = encode_cycle_stop(4, 1_700_003_600);
    assert_eq!(bytes.len(), 9);
    assert_eq!(decode_cycle_stop(&bytes, &FileTables::new())?, (4, 1_700_003_600));
    Ok(())
}

// -------------------- Legacy addresses --------------------

#[test]
fn legacy_address_ids_run_in_sequence() -> Result<()> {
    let mut tables = FileTables::new();
    let a = decode_legacy_addr(&[1, 1, 10, 0, 0, 1], &tables.addrs)?;
    assert_eq!(a, v4(10, 0, 0, 1));
    tables.addrs.push(a)?;

    let b = decode_legacy_addr(&[2, 1, 10, 0, 0, 2], &tables.addrs)?;
    assert_eq!(b, v4(10, 0, 0, 2));

    let err = decode_legacy_addr(&[5, 1, 10, 0, 0, 5], &tables.addrs).unwrap_err();
    assert_eq!(err, DecodeError::Malformed("legacy address id out of sequence"));
    Ok(())
}

// -------------------- Reference ids --------------------

#[test]
fn ref_ids_find_table_entries() -> Result<()> {
    let mut tables = FileTables::new();
    let a = Arc::new(List::new(1, "a"));
    let b = Arc::new(List::new(2, "b"));
    tables.lists.push(Arc::clone(&a))?;
    tables.lists.push(Arc::clone(&b))?;
    let c = Arc::new(Cycle::new(Arc::clone(&b), 5, 1_000));
    tables.cycles.push(Arc::clone(&c))?;

    // an equal list decoded elsewhere still resolves
    let copy = Arc::new(List::new(2, "b"));
    let refs = tables.ref_ids(Some(&copy), Some(&c));
    assert_eq!((refs.list, refs.cycle), (2, 1));

    // stopping the cycle does not change which cycle it is
    let mut stopped = (*c).clone();
    stopped.stop_time = 2_000;
    *tables.cycles.get_mut(1)? = Arc::new(stopped);
    assert_eq!(tables.ref_ids(None, Some(&c)).cycle, 1);

    let stranger = Arc::new(List::new(9, "z"));
    assert_eq!(tables.ref_ids(Some(&stranger), None).list, 0);
    Ok(())
}
