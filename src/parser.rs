use crate::boxes::{BoxBody, BoxHeader, FourCC, Mp4Box, UUID};
use crate::cursor::ByteCursor;
use crate::registry::{BoxKind, BoxValue, Registry};
use std::io::Read;

/// Why a parse aborted. Every variant carries the stream offset at which the
/// condition was detected; a corrupted tree is never partially recovered.
/// The one designed non-error is an unknown type key, which resolves to the
/// opaque variant instead.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("i/o failure at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("truncated stream at offset {offset}")]
    TruncatedStream { offset: u64 },
    #[error("malformed box header at offset {offset} (declared size {declared})")]
    MalformedHeader { offset: u64, declared: u64 },
    #[error("open-ended box at offset {offset} inside a sized container")]
    AmbiguousOpenEnded { offset: u64 },
    #[error("box at offset {offset} overruns its container by {excess} bytes")]
    BoundsViolation { offset: u64, excess: u64 },
    #[error("nesting depth limit ({depth}) hit at offset {offset}")]
    DepthLimit { offset: u64, depth: usize },
    #[error("total byte budget exhausted at offset {offset}")]
    BudgetExceeded { offset: u64 },
}

pub type Result<T> = std::result::Result<T, ParseError>;

const MIN_HEADER_LEN: u64 = 8;

// Decoders materialize the payload, so never hand them an attacker-sized
// allocation; larger known leaves are skipped verbatim instead.
const MAX_DECODE_PAYLOAD: u64 = 16 * 1024 * 1024;

/// Read and validate one box header at the cursor's current position.
///
/// Sentinels follow ISOBMFF: declared size 1 pulls a 64-bit largesize
/// (payload = largesize - 16), declared size 0 marks an open-ended payload
/// (length = -1), and a "uuid" type pulls a 16-byte usertype that is
/// budgeted against the payload.
pub fn read_box_header<R: Read>(cur: &mut ByteCursor<R>) -> Result<BoxHeader> {
    let start = cur.position();
    let size32 = cur.read_u32()?;
    finish_box_header(cur, start, size32, None)
}

// `bound` is the enclosing container's remaining byte allotment; escape
// fields (largesize, usertype) are only pulled from the stream once they are
// known to fit inside it.
fn ensure_header_room(offset: u64, need: u64, bound: Option<u64>) -> Result<()> {
    if let Some(room) = bound {
        if need > room {
            return Err(ParseError::BoundsViolation { offset, excess: need - room });
        }
    }
    Ok(())
}

fn finish_box_header<R: Read>(
    cur: &mut ByteCursor<R>,
    start: u64,
    size32: u32,
    bound: Option<u64>,
) -> Result<BoxHeader> {
    let mut tag = [0u8; 4];
    cur.read_exact(&mut tag)?;
    let typ = FourCC::from_tag(tag);

    let mut largesize = None;
    let mut header_len = 8u64;
    let mut length: i64 = match size32 {
        0 => -1,
        1 => {
            ensure_header_room(start, 16, bound)?;
            let ls = cur.read_u64()?;
            largesize = Some(ls);
            header_len = 16;
            let body = ls
                .checked_sub(16)
                .ok_or(ParseError::MalformedHeader { offset: start, declared: ls })?;
            i64::try_from(body)
                .map_err(|_| ParseError::MalformedHeader { offset: start, declared: ls })?
        }
        // too small to hold even the 8-byte header
        2..=7 => {
            return Err(ParseError::MalformedHeader { offset: start, declared: size32 as u64 });
        }
        s => s as i64 - 8,
    };

    let mut usertype = None;
    if typ == UUID {
        ensure_header_room(start, header_len + 16, bound)?;
        let mut u = [0u8; 16];
        cur.read_exact(&mut u)?;
        usertype = Some(u);
        header_len += 16;
        if length >= 0 {
            length -= 16;
            if length < 0 {
                return Err(ParseError::MalformedHeader {
                    offset: start,
                    declared: largesize.unwrap_or(size32 as u64),
                });
            }
        }
    }

    Ok(BoxHeader { typ, declared_size: size32, largesize, usertype, start, header_len, length })
}

/// Guards against adversarial input: recursion depth and an optional cap on
/// total bytes consumed by one parse.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    pub max_depth: usize,
    pub max_bytes: Option<u64>,
}

impl Default for ParseLimits {
    fn default() -> Self {
        ParseLimits { max_depth: 64, max_bytes: None }
    }
}

/// Recursive box tree builder over a forward-only cursor.
///
/// Resolves each child's variant through the registry, recurses into
/// containers with the child's payload length as the new byte budget, and
/// skips leaf payloads verbatim (or hands them to a registered decoder when
/// [`TreeBuilder::decode_payloads`] is enabled).
pub struct TreeBuilder<'a> {
    registry: &'a Registry,
    limits: ParseLimits,
    decode: bool,
    origin: u64,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        TreeBuilder { registry, limits: ParseLimits::default(), decode: false, origin: 0 }
    }

    pub fn limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn decode_payloads(mut self, decode: bool) -> Self {
        self.decode = decode;
        self
    }

    /// Parse a run of sibling boxes.
    ///
    /// `bound` is the byte budget imposed by the enclosing container, or
    /// `None` for the root/open-ended case where the run ends with the
    /// stream. Children come back in strict stream order.
    pub fn build<R: Read>(
        &mut self,
        cur: &mut ByteCursor<R>,
        bound: Option<u64>,
    ) -> Result<Vec<Mp4Box>> {
        self.origin = cur.position();
        match bound {
            Some(budget) => self.bounded_run(cur, budget, 0),
            None => self.open_run(cur, 0),
        }
    }

    /// Fail if consuming `upcoming` more bytes would overshoot `max_bytes`.
    fn check_budget<R>(&self, cur: &ByteCursor<R>, upcoming: u64) -> Result<()> {
        if let Some(cap) = self.limits.max_bytes {
            let consumed = cur.position().saturating_sub(self.origin);
            if consumed.saturating_add(upcoming) > cap {
                return Err(ParseError::BudgetExceeded { offset: cur.position() });
            }
        }
        Ok(())
    }

    /// Bytes left under `max_bytes`, `None` when no cap is set.
    fn budget_remaining<R>(&self, cur: &ByteCursor<R>) -> Option<u64> {
        self.limits
            .max_bytes
            .map(|cap| cap.saturating_sub(cur.position().saturating_sub(self.origin)))
    }

    fn bounded_run<R: Read>(
        &self,
        cur: &mut ByteCursor<R>,
        budget: u64,
        depth: usize,
    ) -> Result<Vec<Mp4Box>> {
        if depth >= self.limits.max_depth {
            return Err(ParseError::DepthLimit { offset: cur.position(), depth });
        }
        let mut out = Vec::new();
        let mut remaining = budget;
        while remaining >= MIN_HEADER_LEN {
            self.check_budget(cur, 0)?;
            let start = cur.position();
            let size32 = cur.read_u32()?;
            let hdr = finish_box_header(cur, start, size32, Some(remaining))?;
            // A sized container has a definite end; a child running to "the
            // end of the stream" inside one is ambiguous and rejected.
            if hdr.is_open_ended() {
                return Err(ParseError::AmbiguousOpenEnded { offset: hdr.start });
            }
            let total = hdr.header_len + hdr.length as u64;
            if total > remaining {
                return Err(ParseError::BoundsViolation {
                    offset: hdr.start,
                    excess: total - remaining,
                });
            }
            let node = self.read_sized_box(cur, hdr, depth)?;
            remaining -= total;
            out.push(node);
        }
        if remaining > 0 {
            // tolerated trailing padding
            cur.skip(remaining)?;
        }
        Ok(out)
    }

    fn open_run<R: Read>(&self, cur: &mut ByteCursor<R>, depth: usize) -> Result<Vec<Mp4Box>> {
        if depth >= self.limits.max_depth {
            return Err(ParseError::DepthLimit { offset: cur.position(), depth });
        }
        let mut out = Vec::new();
        loop {
            self.check_budget(cur, 0)?;
            let start = cur.position();
            let size32 = match cur.read_u32_or_end()? {
                Some(s) => s,
                None => break,
            };
            let hdr = finish_box_header(cur, start, size32, None)?;
            let node = if hdr.is_open_ended() {
                // Consumes the rest of the stream, so it is the last child
                // by construction.
                self.read_open_box(cur, hdr, depth)?
            } else {
                self.read_sized_box(cur, hdr, depth)?
            };
            out.push(node);
        }
        Ok(out)
    }

    fn read_sized_box<R: Read>(
        &self,
        cur: &mut ByteCursor<R>,
        hdr: BoxHeader,
        depth: usize,
    ) -> Result<Mp4Box> {
        let payload = hdr.length as u64;
        // The budget must trip before the payload is consumed, not after; a
        // single box declaring a huge payload is otherwise skipped in full.
        self.check_budget(cur, payload)?;
        let body = match self.registry.resolve(hdr.typ) {
            Some(spec) if spec.kind() == BoxKind::Container => {
                BoxBody::Container(self.bounded_run(cur, payload, depth + 1)?)
            }
            Some(spec) => {
                if self.decode && payload <= MAX_DECODE_PAYLOAD {
                    if let Some(dec) = spec.decoder() {
                        let buf = cur.read_vec(payload)?;
                        let value = dec.decode(&mut &buf[..], &hdr).unwrap_or_else(|e| {
                            BoxValue::Text(format!("[decode error: {}]", e))
                        });
                        BoxBody::Decoded { payload_len: payload, value }
                    } else {
                        cur.skip(payload)?;
                        BoxBody::Leaf { payload_len: payload }
                    }
                } else {
                    cur.skip(payload)?;
                    BoxBody::Leaf { payload_len: payload }
                }
            }
            None => {
                cur.skip(payload)?;
                BoxBody::Opaque { payload_len: payload }
            }
        };
        Ok(Mp4Box { header: hdr, body })
    }

    fn read_open_box<R: Read>(
        &self,
        cur: &mut ByteCursor<R>,
        hdr: BoxHeader,
        depth: usize,
    ) -> Result<Mp4Box> {
        let body = match self.registry.resolve(hdr.typ) {
            Some(spec) if spec.kind() == BoxKind::Container => {
                BoxBody::Container(self.open_run(cur, depth + 1)?)
            }
            Some(_) => BoxBody::Leaf { payload_len: self.drain_open_payload(cur)? },
            None => BoxBody::Opaque { payload_len: self.drain_open_payload(cur)? },
        };
        Ok(Mp4Box { header: hdr, body })
    }

    /// Consume an open-ended payload to the end of the stream, but never
    /// past the byte budget: on an unbounded stream the cap must still fire.
    fn drain_open_payload<R: Read>(&self, cur: &mut ByteCursor<R>) -> Result<u64> {
        match self.budget_remaining(cur) {
            None => cur.skip_to_end(),
            Some(allowed) => {
                let skipped = cur.skip_up_to(allowed.saturating_add(1))?;
                if skipped > allowed {
                    return Err(ParseError::BudgetExceeded { offset: cur.position() });
                }
                Ok(skipped)
            }
        }
    }
}

/// Parse a whole stream (e.g. an MP4 file or an fMP4 fragment run) into an
/// owned box tree, without payload decoding.
pub fn parse_boxes<R: Read>(reader: R, registry: &Registry) -> Result<Vec<Mp4Box>> {
    let mut cur = ByteCursor::new(reader);
    TreeBuilder::new(registry).build(&mut cur, None)
}
