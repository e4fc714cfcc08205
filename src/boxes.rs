use std::fmt;

/// A box type key: four ASCII bytes packed big-endian into a `u32`.
///
/// Every component keys on the integer form; the 4-byte tag is only a
/// rendering of it. Any 4-byte sequence is a valid key, including ones no
/// registry knows about.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub u32);

impl FourCC {
    pub const fn from_tag(tag: [u8; 4]) -> Self {
        FourCC(u32::from_be_bytes(tag))
    }

    pub const fn tag(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC::from_tag([b[0], b[1], b[2], b[3]]))
        } else { None }
    }

    pub fn as_str_lossy(&self) -> String {
        self.tag().iter().map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}

impl fmt::Debug for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }
impl fmt::Display for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }

pub const UUID: FourCC = FourCC::from_tag(*b"uuid");

/// Parsed box header.
///
/// `length` is the payload byte count left after the header read, with `-1`
/// meaning the payload runs to the end of the enclosing stream. For a `uuid`
/// box the 16 usertype bytes are consumed by the header read but budgeted
/// against the payload, so `header_len + length` always equals the declared
/// total extent of a sized box.
#[derive(Debug, Clone)]
pub struct BoxHeader {
    pub typ: FourCC,
    pub declared_size: u32,         // raw 32-bit size field; 0 and 1 are sentinels
    pub largesize: Option<u64>,     // present iff declared_size == 1
    pub usertype: Option<[u8; 16]>, // present iff typ == "uuid"
    pub start: u64,                 // stream offset of the header's first byte
    pub header_len: u64,            // bytes consumed: 8, 16, 24, or 32
    pub length: i64,                // payload bytes, or -1 = open-ended
}

impl BoxHeader {
    pub fn is_open_ended(&self) -> bool {
        self.length < 0
    }

    /// Total extent of the box (header + payload), `None` when open-ended.
    pub fn total_len(&self) -> Option<u64> {
        if self.length < 0 {
            None
        } else {
            Some(self.header_len + self.length as u64)
        }
    }
}

/// Body of a parsed box; the closed set of variants the tree builder
/// produces. A container exclusively owns its children in stream order.
#[derive(Debug)]
pub enum BoxBody {
    Container(Vec<Mp4Box>),
    Leaf { payload_len: u64 },
    Decoded { payload_len: u64, value: crate::registry::BoxValue },
    Opaque { payload_len: u64 },
}

#[derive(Debug)]
pub struct Mp4Box {
    pub header: BoxHeader,
    pub body: BoxBody,
}

impl Mp4Box {
    pub fn children(&self) -> &[Mp4Box] {
        match &self.body {
            BoxBody::Container(kids) => kids,
            _ => &[],
        }
    }

    /// Payload bytes this box actually covered. For an open-ended box the
    /// extent was only known at parse time, so the skipped count is stored
    /// in the body rather than the header.
    pub fn payload_len(&self) -> u64 {
        match &self.body {
            BoxBody::Container(_) => self.header.length.max(0) as u64,
            BoxBody::Leaf { payload_len }
            | BoxBody::Decoded { payload_len, .. }
            | BoxBody::Opaque { payload_len } => *payload_len,
        }
    }
}
