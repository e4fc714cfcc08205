use crate::parser::{ParseError, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{ErrorKind, Read};

const SCRATCH_LEN: usize = 8 * 1024;

/// Forward-only reader over an untrusted byte stream.
///
/// Tracks the absolute read position and owns a reusable scratch buffer so
/// that `skip` can discard payload bytes without allocating per box. Never
/// seeks backward; a premature end of stream surfaces as
/// [`ParseError::TruncatedStream`] at the current offset.
pub struct ByteCursor<R> {
    inner: R,
    pos: u64,
    scratch: Vec<u8>,
}

impl<R> ByteCursor<R> {
    pub fn new(inner: R) -> Self {
        ByteCursor { inner, pos: 0, scratch: Vec::new() }
    }

    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl<R: Read> ByteCursor<R> {
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                Err(ParseError::TruncatedStream { offset: self.pos })
            }
            Err(e) => Err(ParseError::Io { offset: self.pos, source: e }),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self.inner.read_u32::<BigEndian>().map_err(|e| self.map_err(e))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let v = self.inner.read_u64::<BigEndian>().map_err(|e| self.map_err(e))?;
        self.pos += 8;
        Ok(v)
    }

    /// Read a big-endian `u32`, or report a clean end of stream.
    ///
    /// `Ok(None)` means the stream ended exactly on a box boundary; ending
    /// with 1..=3 bytes left is a torn header and fails.
    pub fn read_u32_or_end(&mut self) -> Result<Option<u32>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < 4 {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ParseError::Io { offset: self.pos, source: e }),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        self.pos += filled as u64;
        if filled < 4 {
            return Err(ParseError::TruncatedStream { offset: self.pos });
        }
        Ok(Some(u32::from_be_bytes(buf)))
    }

    /// Materialize exactly `n` payload bytes.
    pub fn read_vec(&mut self, n: u64) -> Result<Vec<u8>> {
        let n = usize::try_from(n)
            .map_err(|_| ParseError::TruncatedStream { offset: self.pos })?;
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Advance exactly `n` bytes without materializing them.
    pub fn skip(&mut self, mut n: u64) -> Result<()> {
        if self.scratch.is_empty() {
            self.scratch.resize(SCRATCH_LEN, 0);
        }
        while n > 0 {
            let want = n.min(self.scratch.len() as u64) as usize;
            match self.inner.read(&mut self.scratch[..want]) {
                Ok(0) => return Err(ParseError::TruncatedStream { offset: self.pos }),
                Ok(got) => {
                    self.pos += got as u64;
                    n -= got as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ParseError::Io { offset: self.pos, source: e }),
            }
        }
        Ok(())
    }

    /// Advance up to `n` bytes, stopping early at end of stream.
    ///
    /// Returns the number of bytes actually consumed. Lets a caller with a
    /// byte budget drain an open-ended payload without committing to an
    /// unbounded read.
    pub fn skip_up_to(&mut self, n: u64) -> Result<u64> {
        if self.scratch.is_empty() {
            self.scratch.resize(SCRATCH_LEN, 0);
        }
        let mut total = 0u64;
        while total < n {
            let want = (n - total).min(self.scratch.len() as u64) as usize;
            match self.inner.read(&mut self.scratch[..want]) {
                Ok(0) => break,
                Ok(got) => {
                    self.pos += got as u64;
                    total += got as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ParseError::Io { offset: self.pos, source: e }),
            }
        }
        Ok(total)
    }

    /// Consume the remainder of the stream, returning the byte count.
    ///
    /// Used for open-ended leaf payloads, which by definition run to the end
    /// of the enclosing stream.
    pub fn skip_to_end(&mut self) -> Result<u64> {
        if self.scratch.is_empty() {
            self.scratch.resize(SCRATCH_LEN, 0);
        }
        let mut total = 0u64;
        loop {
            match self.inner.read(&mut self.scratch) {
                Ok(0) => return Ok(total),
                Ok(got) => {
                    self.pos += got as u64;
                    total += got as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ParseError::Io { offset: self.pos, source: e }),
            }
        }
    }

    fn map_err(&self, e: std::io::Error) -> ParseError {
        if e.kind() == ErrorKind::UnexpectedEof {
            ParseError::TruncatedStream { offset: self.pos }
        } else {
            ParseError::Io { offset: self.pos, source: e }
        }
    }
}
