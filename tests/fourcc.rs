use mp4tree::FourCC;

#[test]
fn tag_roundtrip() {
    for tag in [*b"ftyp", *b"moov", *b"uuid", *b"wxyz", *b"a b\x01", [0u8, 0xff, 0x7f, 0x20]] {
        assert_eq!(FourCC::from_tag(tag).tag(), tag);
    }
}

#[test]
fn key_is_big_endian_packed() {
    assert_eq!(FourCC::from_tag(*b"ftyp").0, 0x6674_7970);
    assert_eq!(FourCC::from_tag(*b"moov").0, 0x6D6F_6F76);
}

#[test]
fn from_str_requires_four_bytes() {
    assert_eq!(FourCC::from_str("ftyp"), Some(FourCC::from_tag(*b"ftyp")));
    assert_eq!(FourCC::from_str("fty"), None);
    assert_eq!(FourCC::from_str("ftypp"), None);
}

#[test]
fn lossy_rendering_masks_non_printables() {
    assert_eq!(FourCC::from_tag(*b"ftyp").as_str_lossy(), "ftyp");
    assert_eq!(FourCC::from_tag([0x66, 0x01, 0x7f, 0x70]).as_str_lossy(), "f..p");
}
