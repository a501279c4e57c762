//! BIFF12 record framing exercised through the public API.

use pretty_assertions::assert_eq;
use sheetframe::biff12::{encode_record_size, Biff12Reader, Record};
use std::io::Cursor;

#[test]
fn small_record_roundtrip() {
    let record = Record::new(0x381, b"some datasome_other_data".to_vec());
    let mut bytes = Vec::new();
    let written = record.write_to(&mut bytes).expect("encode");
    assert_eq!(written, 27);

    let mut reader = Biff12Reader::new(Cursor::new(bytes));
    assert_eq!(reader.read().expect("scan"), Some(0x381));
    assert_eq!(reader.data(), record.data.as_slice());
    assert_eq!(reader.read().expect("scan"), None);
}

#[test]
fn large_record_uses_a_two_byte_size() {
    let mut data = b"some data".to_vec();
    for _ in 0..100 {
        data.extend_from_slice(b"some_other_data");
    }
    let record = Record::new(0x00, data.clone());
    assert_eq!(encode_record_size(data.len()).len(), 2);

    let bytes = record.encoded();
    assert_eq!(bytes.len(), 1 + 2 + data.len());

    let mut reader = Biff12Reader::new(Cursor::new(bytes));
    assert_eq!(reader.read().expect("scan"), Some(0x00));
    assert_eq!(reader.data(), data.as_slice());
}

#[test]
fn payloads_over_16k_roundtrip() {
    // Exercises the wider size varints end to end.
    for size in [0x3FFFusize, 0x4000, 0x2_0000] {
        let record = Record::new(19, vec![0x5Au8; size]);
        let mut reader = Biff12Reader::new(Cursor::new(record.encoded()));
        assert_eq!(reader.read().expect("scan"), Some(19));
        assert_eq!(reader.size(), size);
        assert_eq!(reader.data(), record.data.as_slice());
    }
}

#[test]
fn filtered_scan_yields_matching_records_in_order() {
    let mut bytes = Vec::new();
    for (id, payload) in [(1u16, "a"), (44, "b"), (1, "c"), (47, "d")] {
        Record::new(id, payload.as_bytes().to_vec())
            .write_to(&mut bytes)
            .expect("encode");
    }
    let mut reader = Biff12Reader::new(Cursor::new(bytes));
    let mut seen = Vec::new();
    while let Some(id) = reader.scan(&[44, 47]).expect("scan") {
        seen.push((id, reader.data().to_vec()));
    }
    assert_eq!(seen, vec![(44, b"b".to_vec()), (47, b"d".to_vec())]);
}

#[test]
fn break_on_enables_nested_scans() {
    let mut bytes = Vec::new();
    for (id, payload) in [(156u16, "sheet"), (144, ""), (19, "tail")] {
        Record::new(id, payload.as_bytes().to_vec())
            .write_to(&mut bytes)
            .expect("encode");
    }
    let mut reader = Biff12Reader::new(Cursor::new(bytes));

    // First scan stops in front of the terminator without consuming it.
    assert_eq!(reader.scan_until(&[156], &[144]).expect("scan"), Some(156));
    assert_eq!(reader.data(), b"sheet");
    assert_eq!(reader.scan_until(&[156], &[144]).expect("scan"), None);

    // A second scan picks up from the held-back terminator.
    assert_eq!(reader.read().expect("scan"), Some(144));
    assert_eq!(reader.read().expect("scan"), Some(19));
    assert_eq!(reader.data(), b"tail");
}
