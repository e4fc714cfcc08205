use mp4tree::{ByteCursor, ParseError};
use std::io::Cursor;

#[test]
fn position_tracks_reads_and_skips() {
    let data: Vec<u8> = (0u8..64).collect();
    let mut cur = ByteCursor::new(Cursor::new(data));

    assert_eq!(cur.position(), 0);
    assert_eq!(cur.read_u32().unwrap(), 0x0001_0203);
    assert_eq!(cur.position(), 4);

    cur.skip(10).unwrap();
    assert_eq!(cur.position(), 14);

    let mut buf = [0u8; 2];
    cur.read_exact(&mut buf).unwrap();
    assert_eq!(buf, [14, 15]);
    assert_eq!(cur.position(), 16);
}

#[test]
fn skip_past_end_is_truncated_stream() {
    let mut cur = ByteCursor::new(Cursor::new(vec![0u8; 10]));
    let err = cur.skip(11).unwrap_err();
    assert!(matches!(err, ParseError::TruncatedStream { offset: 10 }));
}

#[test]
fn skip_to_end_counts_remaining_bytes() {
    let mut cur = ByteCursor::new(Cursor::new(vec![0u8; 100]));
    cur.skip(25).unwrap();
    assert_eq!(cur.skip_to_end().unwrap(), 75);
    assert_eq!(cur.position(), 100);
    // idempotent at EOF
    assert_eq!(cur.skip_to_end().unwrap(), 0);
}

#[test]
fn read_u32_or_end_distinguishes_clean_eof_from_torn_header() {
    let mut cur = ByteCursor::new(Cursor::new(vec![0, 0, 0, 8]));
    assert_eq!(cur.read_u32_or_end().unwrap(), Some(8));
    assert_eq!(cur.read_u32_or_end().unwrap(), None);

    let mut torn = ByteCursor::new(Cursor::new(vec![0, 0, 8]));
    assert!(matches!(
        torn.read_u32_or_end().unwrap_err(),
        ParseError::TruncatedStream { .. }
    ));
}

#[test]
fn skip_up_to_stops_at_limit_or_eof() {
    let mut cur = ByteCursor::new(Cursor::new(vec![0u8; 100]));
    assert_eq!(cur.skip_up_to(30).unwrap(), 30);
    assert_eq!(cur.position(), 30);
    // fewer bytes remain than requested
    assert_eq!(cur.skip_up_to(200).unwrap(), 70);
    assert_eq!(cur.position(), 100);
    assert_eq!(cur.skip_up_to(10).unwrap(), 0);
}

#[test]
fn read_vec_materializes_exactly_n_bytes() {
    let mut cur = ByteCursor::new(Cursor::new(b"abcdef".to_vec()));
    assert_eq!(cur.read_vec(4).unwrap(), b"abcd");
    assert!(matches!(
        cur.read_vec(4).unwrap_err(),
        ParseError::TruncatedStream { .. }
    ));
}
