use super::*;

// -------------------- Fold --------------------

#[test]
fn empty_set_folds_to_single_zero() {
    let f = Flags::new();
    assert!(f.is_empty());
    assert_eq!(f.max_id(), 0);
    assert_eq!(f.fold(), vec![0x00]);
    assert_eq!(f.encoded_len(), 1);
}

#[test]
fn first_group_has_no_continuation() {
    let f: Flags = [1, 3, 7].into_iter().collect();
    assert_eq!(f.fold(), vec![0b0100_0101]);
}

#[test]
fn id_eight_starts_second_group() {
    let f: Flags = [8].into_iter().collect();
    assert_eq!(f.fold(), vec![0x80, 0x01]);
    assert_eq!(f.encoded_len(), 2);
}

#[test]
fn trailing_empty_groups_are_not_written() {
    let (f, used) = Flags::unfold(&[0x82, 0x80, 0x00]).unwrap();
    assert_eq!(used, 3);
    assert_eq!(f.fold(), vec![0x02]);
    assert_eq!(f, [2].into_iter().collect::<Flags>());
}

#[test]
#[should_panic(expected = "field ids start at 1")]
fn id_zero_is_rejected() {
    Flags::new().set(0);
}

// -------------------- Unfold --------------------

#[test]
fn unfold_stops_at_cleared_continuation_bit() {
    let bytes = [0x81, 0x02, 0xff, 0xff];
    let (f, used) = Flags::unfold(&bytes).unwrap();
    assert_eq!(used, 2);
    assert!(f.is_set(1));
    assert!(f.is_set(9));
    assert!(!f.is_set(2));
    assert_eq!(f.ids().collect::<Vec<_>>(), vec![1, 9]);
}

#[test]
fn unfold_reports_truncation() {
    let err = Flags::unfold(&[0x80, 0x80]).unwrap_err();
    assert!(matches!(err, DecodeError::Truncated { .. }));
}

#[test]
fn wide_sets_survive_fold_unfold() {
    let ids = [1u16, 7, 8, 14, 15, 21, 22, 33];
    let f: Flags = ids.into_iter().collect();
    let bytes = f.fold();
    assert_eq!(bytes.len(), 5);
    for b in &bytes[..4] {
        assert_eq!(b & 0x80, 0x80);
    }
    assert_eq!(bytes[4] & 0x80, 0);
    let (back, used) = Flags::unfold(&bytes).unwrap();
    assert_eq!(used, bytes.len());
    assert_eq!(back.ids().collect::<Vec<_>>(), ids.to_vec());
    assert_eq!(back.max_id(), 33);
}

#[test]
fn unset_ids_beyond_bitmap_are_absent() {
    let (f, _) = Flags::unfold(&[0x01]).unwrap();
    assert!(!f.is_set(100));
    assert!(!f.is_set(0));
}

// -------------------- Length limit --------------------

#[test]
fn full_length_bitmap_reaches_last_id() {
    let mut bytes = vec![0xff; MAX_GROUPS - 1];
    bytes.push(0x7f);
    let (f, used) = Flags::unfold(&bytes).unwrap();
    assert_eq!(used, MAX_GROUPS);
    assert_eq!(f.max_id(), u16::MAX);
    assert_eq!(f.ids().count(), usize::from(u16::MAX));
}

#[test]
fn bits_past_last_id_are_ignored() {
    let mut bytes = vec![0x80; MAX_GROUPS - 1];
    bytes.push(0x71);
    let (f, _) = Flags::unfold(&bytes).unwrap();
    assert_eq!(f.ids().collect::<Vec<_>>(), vec![u16::MAX]);
    assert!(f.is_set(u16::MAX));
}

#[test]
fn over_long_bitmap_is_malformed() {
    let mut bytes = vec![0x80; MAX_GROUPS];
    bytes.push(0x01);
    assert_eq!(
        Flags::unfold(&bytes).unwrap_err(),
        DecodeError::Malformed("presence bitmap length")
    );
}
