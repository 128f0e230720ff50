//! Sequential reading of RIFF chunks.
//!
//! RIFF is a flat sequence of `(id, size, payload)` records.  The top-level `RIFF` record's payload is a 4-byte form
//! type followed by more records, so rather than recursing we read its form type and then keep going: the records
//! inside it come out of the same loop as everything else.
use std::io::{ErrorKind, Read, Seek, SeekFrom};

use crate::error::{ContainerError, Result};
use crate::format::{FormatDescriptor, FORMAT_CHUNK_LEN};

/// A chunk identifier.
#[derive(Copy, Clone, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const RIFF: FourCc = FourCc(*b"RIFF");
    pub const WAVE: FourCc = FourCc(*b"WAVE");
    pub const FMT: FourCc = FourCc(*b"fmt ");
    pub const DATA: FourCc = FourCc(*b"data");
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            for b in self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "{:#010x}", u32::from_le_bytes(self.0))
        }
    }
}

impl std::fmt::Debug for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCc({self})")
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChunkHeader {
    pub id: FourCc,

    /// Payload size, not counting the header or the pad byte.
    pub size: u32,
}

impl ChunkHeader {
    /// Payload size plus the pad byte RIFF inserts after odd-sized payloads.
    pub fn padded_size(&self) -> u64 {
        u64::from(self.size) + u64::from(self.size & 1)
    }
}

/// Read until `buf` is full or the stream ends.  Returns how much was read.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match reader.read(&mut buf[done..]) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(done)
}

pub(crate) struct ChunkReader<R> {
    inner: R,
}

impl<R: Read + Seek> ChunkReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        ChunkReader { inner }
    }

    /// Read the next header, or `None` at the end of the stream.
    pub(crate) fn next_header(&mut self) -> Result<Option<ChunkHeader>> {
        let mut raw = [0u8; 8];
        let got = read_fully(&mut self.inner, &mut raw)?;
        if got == 0 {
            return Ok(None);
        }
        if got < raw.len() {
            log::warn!("Stream ends {got} bytes into a chunk header; treating as end of stream");
            return Ok(None);
        }

        Ok(Some(ChunkHeader {
            id: FourCc([raw[0], raw[1], raw[2], raw[3]]),
            size: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        }))
    }

    /// Read the form type which opens a `RIFF` payload.  `None` if the stream ends first.
    pub(crate) fn read_form_type(&mut self) -> Result<Option<FourCc>> {
        let mut raw = [0u8; 4];
        if read_fully(&mut self.inner, &mut raw)? < raw.len() {
            return Ok(None);
        }
        Ok(Some(FourCc(raw)))
    }

    /// Read a `fmt ` payload of the given declared size, leaving the stream at the next header.
    pub(crate) fn read_format(&mut self, size: u32) -> Result<FormatDescriptor> {
        if (size as usize) < FORMAT_CHUNK_LEN {
            return Err(ContainerError::FormatTooShort { size }.into());
        }

        let mut raw = [0u8; FORMAT_CHUNK_LEN];
        if read_fully(&mut self.inner, &mut raw)? < raw.len() {
            return Err(ContainerError::TruncatedFormat.into());
        }

        let remainder = ChunkHeader {
            id: FourCc::FMT,
            size,
        }
        .padded_size()
            - FORMAT_CHUNK_LEN as u64;
        self.skip(remainder)?;

        Ok(FormatDescriptor::from_le_bytes(&raw))
    }

    /// Fill `frame` from the stream.  Returns false if the stream ended first.
    pub(crate) fn read_frame(&mut self, frame: &mut [u8]) -> Result<bool> {
        Ok(read_fully(&mut self.inner, frame)? == frame.len())
    }

    /// Move forward without interpreting anything.
    pub(crate) fn skip(&mut self, bytes: u64) -> Result<()> {
        if bytes != 0 {
            // Chunk sizes are u32, so the offset always fits.
            self.inner.seek(SeekFrom::Current(bytes as i64))?;
        }
        Ok(())
    }
}
