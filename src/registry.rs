use crate::boxes::{BoxHeader, FourCC};
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Read;

/// Container or leaf. Containers get recursed into; everything else has its
/// payload skipped or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    Container,
    Leaf,
}

/// A value returned from a box decoder.
///
/// Decoders may return either a human-readable text summary, raw bytes, or
/// structured data.
#[derive(Debug, Clone)]
pub enum BoxValue {
    Text(String),
    Bytes(Vec<u8>),
    Structured(StructuredData),
}

/// Structured payloads for the decoders this crate ships.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum StructuredData {
    /// Movie Header Box (mvhd)
    MovieHeader(MvhdData),
    /// Handler Reference Box (hdlr)
    HandlerReference(HdlrData),
    /// Edit List Box (elst)
    EditList(ElstData),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MvhdData {
    pub version: u8,
    pub flags: u32,
    pub timescale: u32,
    pub duration: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HdlrData {
    pub version: u8,
    pub flags: u32,
    pub handler_type: String,
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ElstData {
    pub version: u8,
    pub flags: u32,
    pub entry_count: u32,
    pub entries: Vec<ElstEntry>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ElstEntry {
    pub segment_duration: u64,
    pub media_time: i64,
    pub media_rate_integer: i16,
    pub media_rate_fraction: i16,
}

/// Trait for custom box payload decoders.
///
/// A decoder interprets the payload of a specific box type and returns a
/// [`BoxValue`]. The reader is already limited to the payload; FullBox types
/// read their own version/flags prefix.
pub trait BoxDecoder: Send + Sync {
    fn decode(&self, r: &mut dyn Read, hdr: &BoxHeader) -> anyhow::Result<BoxValue>;
}

/// What the registry knows about one box type.
pub struct BoxSpec {
    name: String,
    kind: BoxKind,
    decoder: Option<Box<dyn BoxDecoder>>,
}

impl BoxSpec {
    /// Human-readable box name, used for diagnostics and the JSON view.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BoxKind {
        self.kind
    }

    pub(crate) fn decoder(&self) -> Option<&dyn BoxDecoder> {
        self.decoder.as_deref()
    }
}

/// Dispatch table from type key to box variant.
///
/// Built fluently before any parse begins and immutable afterwards, so a
/// single registry can serve concurrent parses by shared reference. Lookup
/// is exact-match only; a key that is absent resolves to the opaque variant,
/// which is designed degradation rather than an error.
pub struct Registry {
    map: HashMap<FourCC, BoxSpec>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    /// Return a new registry with the given box type registered.
    pub fn with_box(mut self, typ: FourCC, name: &str, kind: BoxKind) -> Self {
        self.map.insert(typ, BoxSpec { name: name.to_string(), kind, decoder: None });
        self
    }

    /// Return a new registry with a leaf box and its payload decoder.
    pub fn with_decoder(mut self, typ: FourCC, name: &str, dec: Box<dyn BoxDecoder>) -> Self {
        self.map.insert(
            typ,
            BoxSpec { name: name.to_string(), kind: BoxKind::Leaf, decoder: Some(dec) },
        );
        self
    }

    /// Exact-match lookup. `None` means the tree builder falls back to the
    /// opaque variant: the box stays traversable, its payload skipped.
    pub fn resolve(&self, typ: FourCC) -> Option<&BoxSpec> {
        self.map.get(&typ)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------- Helpers ----------

fn read_fullbox_prefix(r: &mut dyn Read) -> anyhow::Result<(u8, u32)> {
    let version = r.read_u8()?;
    let mut f = [0u8; 3];
    r.read_exact(&mut f)?;
    let flags = ((f[0] as u32) << 16) | ((f[1] as u32) << 8) | (f[2] as u32);
    Ok((version, flags))
}

fn read_all(r: &mut dyn Read) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    Ok(buf)
}

// ---------- Decoders ----------

// ftyp: major + minor + compatible brands
pub struct FtypDecoder;

impl BoxDecoder for FtypDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<BoxValue> {
        let buf = read_all(r)?;
        if buf.len() < 8 {
            return Ok(BoxValue::Text(format!("ftyp: payload too short ({} bytes)", buf.len())));
        }

        let major = &buf[0..4];
        let minor = u32::from_be_bytes(buf[4..8].try_into().unwrap());

        let mut brands = Vec::new();
        for chunk in buf[8..].chunks(4) {
            if chunk.len() == 4 {
                brands.push(String::from_utf8_lossy(chunk).to_string());
            }
        }

        Ok(BoxValue::Text(format!(
            "major={} minor={} compatible={:?}",
            String::from_utf8_lossy(major),
            minor,
            brands
        )))
    }
}

// mvhd: timescale + duration
pub struct MvhdDecoder;

impl BoxDecoder for MvhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<BoxValue> {
        let (version, flags) = read_fullbox_prefix(r)?;

        let (timescale, duration) = if version == 1 {
            let _creation = r.read_u64::<BigEndian>()?;
            let _mod = r.read_u64::<BigEndian>()?;
            let ts = r.read_u32::<BigEndian>()?;
            let dur = r.read_u64::<BigEndian>()?;
            (ts, dur)
        } else {
            let _creation = r.read_u32::<BigEndian>()?;
            let _mod = r.read_u32::<BigEndian>()?;
            let ts = r.read_u32::<BigEndian>()?;
            let dur = r.read_u32::<BigEndian>()? as u64;
            (ts, dur)
        };

        Ok(BoxValue::Structured(StructuredData::MovieHeader(MvhdData {
            version,
            flags,
            timescale,
            duration,
        })))
    }
}

// hdlr: handler type + name
pub struct HdlrDecoder;

impl BoxDecoder for HdlrDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<BoxValue> {
        let (version, flags) = read_fullbox_prefix(r)?;

        // pre_defined (4) + handler_type (4) + reserved (12)
        let _pre_defined = r.read_u32::<BigEndian>()?;
        let mut handler_type = [0u8; 4];
        r.read_exact(&mut handler_type)?;
        let mut reserved = [0u8; 12];
        r.read_exact(&mut reserved)?;

        // name: null-terminated string (or just rest of box)
        let mut name_bytes = Vec::new();
        r.read_to_end(&mut name_bytes)?;
        while name_bytes.last() == Some(&0) {
            name_bytes.pop();
        }
        let name = String::from_utf8_lossy(&name_bytes).to_string();

        Ok(BoxValue::Structured(StructuredData::HandlerReference(HdlrData {
            version,
            flags,
            handler_type: std::str::from_utf8(&handler_type).unwrap_or("????").to_string(),
            name,
        })))
    }
}

// elst: full edit list; entry order is semantically significant
pub struct ElstDecoder;

impl BoxDecoder for ElstDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<BoxValue> {
        let (version, flags) = read_fullbox_prefix(r)?;
        let entry_count = r.read_u32::<BigEndian>()?;

        let mut entries = Vec::new();
        for _ in 0..entry_count {
            let (segment_duration, media_time) = if version == 1 {
                (r.read_u64::<BigEndian>()?, r.read_i64::<BigEndian>()?)
            } else {
                (r.read_u32::<BigEndian>()? as u64, r.read_i32::<BigEndian>()? as i64)
            };
            let media_rate_integer = r.read_i16::<BigEndian>()?;
            let media_rate_fraction = r.read_i16::<BigEndian>()?;
            entries.push(ElstEntry {
                segment_duration,
                media_time,
                media_rate_integer,
                media_rate_fraction,
            });
        }

        Ok(BoxValue::Structured(StructuredData::EditList(ElstData {
            version,
            flags,
            entry_count,
            entries,
        })))
    }
}

// ---------- Default registry ----------

/// The known ISOBMFF / MP4 table: containers, common leaves, and the
/// payload decoders this crate ships. Anything absent resolves to the
/// opaque variant at parse time.
pub fn default_registry() -> Registry {
    const CONTAINERS: &[(&[u8; 4], &str)] = &[
        (b"moov", "Movie Box"),
        (b"trak", "Track Box"),
        (b"mdia", "Media Box"),
        (b"minf", "Media Information Box"),
        (b"stbl", "Sample Table Box"),
        (b"edts", "Edit Box"),
        (b"udta", "User Data Box"),
        (b"moof", "Movie Fragment Box"),
        (b"traf", "Track Fragment Box"),
        (b"mvex", "Movie Extends Box"),
        (b"dinf", "Data Information Box"),
        (b"sinf", "Protection Scheme Information Box"),
        (b"schi", "Scheme Information Box"),
        (b"mfra", "Movie Fragment Random Access Box"),
    ];
    const LEAVES: &[(&[u8; 4], &str)] = &[
        (b"styp", "Segment Type Box"),
        (b"tkhd", "Track Header Box"),
        (b"mdhd", "Media Header Box"),
        (b"vmhd", "Video Media Header Box"),
        (b"smhd", "Sound Media Header Box"),
        (b"dref", "Data Reference Box"),
        (b"stts", "Decoding Time to Sample Box"),
        (b"ctts", "Composition Time to Sample Box"),
        (b"stsd", "Sample Description Box"),
        (b"stsc", "Sample To Chunk Box"),
        (b"stsz", "Sample Size Box"),
        (b"stco", "Chunk Offset Box"),
        (b"co64", "64-bit Chunk Offset Box"),
        (b"stss", "Sync Sample Box"),
        (b"mdat", "Media Data Box"),
        (b"free", "Free Space Box"),
        (b"skip", "Free Space Box"),
        (b"sidx", "Segment Index Box"),
        (b"mfhd", "Movie Fragment Header Box"),
        (b"tfhd", "Track Fragment Header Box"),
        (b"tfdt", "Track Fragment Decode Time Box"),
        (b"trun", "Track Fragment Run Box"),
        (b"iods", "Object Descriptor Box"),
    ];

    let mut reg = Registry::new();
    for &(tag, name) in CONTAINERS {
        reg = reg.with_box(FourCC::from_tag(*tag), name, BoxKind::Container);
    }
    for &(tag, name) in LEAVES {
        reg = reg.with_box(FourCC::from_tag(*tag), name, BoxKind::Leaf);
    }

    reg.with_decoder(FourCC::from_tag(*b"ftyp"), "File Type Box", Box::new(FtypDecoder))
        .with_decoder(FourCC::from_tag(*b"mvhd"), "Movie Header Box", Box::new(MvhdDecoder))
        .with_decoder(FourCC::from_tag(*b"hdlr"), "Handler Reference Box", Box::new(HdlrDecoder))
        .with_decoder(FourCC::from_tag(*b"elst"), "Edit List Box", Box::new(ElstDecoder))
}
