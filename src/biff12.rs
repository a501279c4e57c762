//! BIFF12 record framing for Excel 2007+ binary workbooks (.xlsb).
//!
//! A BIFF12 stream is a plain sequence of records: a variable-length record
//! id (1-2 bytes, 7 data bits per byte), a variable-length payload size
//! (1-4 bytes, 7 data bits per byte, high bit continues), then the payload.
//! There is no trailer; consumers rely on sentinel record ids for logical
//! end, and a truncated tail simply ends the sequence.

use crate::helpers::string::to_f64;
use crate::helpers::string::to_i32;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u32;
use crate::helpers::string::to_usize;
use encoding_rs::UTF_16LE;
use std::borrow::Cow;
use std::io;
use std::io::Read;
use std::io::Write;
use thiserror::Error;

/// Errors specific to BIFF12 record decoding.
#[derive(Error, Debug)]
pub enum Biff12Error {
    #[error("No enough data: expect '{0}' bytes, actual '{1}' bytes")]
    NoEnoughData(usize, usize),

    #[error("{0}")]
    Io(#[from] io::Error),
}

/// An owned BIFF12 record, mainly used to emit streams.
///
/// Scanning does not materialize this type; [`Biff12Reader`] exposes the
/// current payload as a borrowed slice instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: u16,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(id: u16, data: impl Into<Vec<u8>>) -> Record {
        Record { id, data: data.into() }
    }

    /// Serializes the record as id varint, size varint and payload.
    pub fn encoded(&self) -> Vec<u8> {
        let mut bytes = encode_record_id(self.id);
        bytes.extend_from_slice(&encode_record_size(self.data.len()));
        bytes.extend_from_slice(&self.data);
        bytes
    }

    /// Writes the encoded record and returns the number of bytes written.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<usize> {
        let bytes = self.encoded();
        writer.write_all(&bytes)?;
        Ok(bytes.len())
    }
}

/// Encodes a record id as one byte (< 0x80) or two 7-bit groups.
pub fn encode_record_id(id: u16) -> Vec<u8> {
    if id < 0x80 {
        vec![id as u8]
    } else {
        vec![(id & 0x7F) as u8 | 0x80, (id >> 7) as u8]
    }
}

/// Encodes a record size as one to four 7-bit groups, low bits first.
/// Sizes are limited to 28 bits.
pub fn encode_record_size(size: usize) -> Vec<u8> {
    if size < 0x80 {
        vec![size as u8]
    } else if size < 0x4000 {
        vec![(size & 0x7F) as u8 | 0x80, (size >> 7) as u8]
    } else if size < 0x20_0000 {
        vec![
            (size & 0x7F) as u8 | 0x80,
            ((size >> 7) & 0x7F) as u8 | 0x80,
            (size >> 14) as u8,
        ]
    } else {
        vec![
            (size & 0x7F) as u8 | 0x80,
            ((size >> 7) & 0x7F) as u8 | 0x80,
            ((size >> 14) & 0x7F) as u8 | 0x80,
            (size >> 21) as u8,
        ]
    }
}

/// Streaming BIFF12 record scanner over any byte source.
///
/// Payloads are read into a reused buffer; the borrowed accessors are only
/// valid until the next record is pulled. Ids excluded by a scan filter
/// have their payloads drained without buffering. Truncation anywhere in a
/// record ends the scan silently, mirroring how Excel itself treats the
/// format as sentinel-terminated.
pub struct Biff12Reader<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    size: usize,
    /// Record id already consumed by a `break_on` stop, replayed first.
    pending: Option<u16>,
}

impl<R: Read> Biff12Reader<R> {
    pub fn new(reader: R) -> Biff12Reader<R> {
        Biff12Reader {
            reader,
            buffer: vec![0; 1024],
            size: 0,
            pending: None,
        }
    }

    /// Reads the next record into the buffer, returning its id, or `None`
    /// at end of stream.
    pub fn read(&mut self) -> Result<Option<u16>, Biff12Error> {
        self.scan_until(&[], &[])
    }

    /// Returns the next record whose id is in `only` (every record when
    /// `only` is empty), skipping other payloads without buffering them.
    pub fn scan(&mut self, only: &[u16]) -> Result<Option<u16>, Biff12Error> {
        self.scan_until(only, &[])
    }

    /// Like [`scan`](Self::scan), but stops before consuming any record
    /// whose id is in `break_on`; a later scan resumes at that record.
    pub fn scan_until(&mut self, only: &[u16], break_on: &[u16]) -> Result<Option<u16>, Biff12Error> {
        loop {
            let id = match self.pending.take() {
                Some(id) => id,
                None => match self.read_id()? {
                    Some(id) => id,
                    None => return Ok(None),
                },
            };
            if break_on.contains(&id) {
                self.pending = Some(id);
                return Ok(None);
            }
            let size = match self.read_size()? {
                Some(size) => size,
                None => return Ok(None),
            };
            if only.is_empty() || only.contains(&id) {
                if !self.fill(size)? {
                    return Ok(None);
                }
                return Ok(Some(id));
            } else if !self.drain(size)? {
                return Ok(None);
            }
        }
    }

    /// Payload of the most recently read record.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.size]
    }

    /// Payload size of the most recently read record.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reads a u16 value from the payload at the specified position.
    pub fn get_u16(&self, at: usize) -> u16 {
        to_u16(&self.buffer[at..at + 2])
    }

    /// Reads a u32 value from the payload at the specified position.
    pub fn get_u32(&self, at: usize) -> u32 {
        to_u32(&self.buffer[at..at + 4])
    }

    /// Reads an i32 value from the payload at the specified position.
    pub fn get_i32(&self, at: usize) -> i32 {
        to_i32(&self.buffer[at..at + 4])
    }

    /// Reads an f64 value from the payload at the specified position.
    pub fn get_f64(&self, at: usize) -> f64 {
        to_f64(&self.buffer[at..at + 8])
    }

    /// Reads a usize value from the payload at the specified position.
    pub fn get_usize(&self, at: usize) -> usize {
        to_usize(&self.buffer[at..at + 4])
    }

    /// Reads an XF style index from the payload (3 bytes little-endian).
    pub fn get_style(&self, at: usize) -> u32 {
        to_u32(&[self.buffer[at], self.buffer[at + 1], self.buffer[at + 2], 0])
    }

    /// Reads an `XLWideString` (u32 character count, then UTF-16LE data)
    /// from the payload. Returns the text and the position after it; a
    /// length of 0xFFFFFFFF denotes a null string. Decoding is lossy, for
    /// workbook metadata only; cell text goes through [`cell_str`](Self::cell_str).
    pub fn wide_str(&self, at: usize) -> Result<(Option<Cow<'_, str>>, usize), Biff12Error> {
        if self.size < at + 4 {
            return Err(Biff12Error::NoEnoughData(at + 4, self.size));
        }
        let count = to_u32(&self.buffer[at..at + 4]);
        if count == u32::MAX {
            return Ok((None, at + 4));
        }
        let end = at + 4 + count as usize * 2;
        if self.size < end {
            return Err(Biff12Error::NoEnoughData(end, self.size));
        }
        let (text, _, _) = UTF_16LE.decode(&self.buffer[at + 4..end]);
        Ok((Some(text), end))
    }

    /// Reads cell text (u32 character count, then UTF-16LE data) from the
    /// payload. Returns `None` when the data is not valid UTF-16, so the
    /// caller can drop the single offending cell.
    pub fn cell_str(&self, at: usize) -> Result<Option<Cow<'_, str>>, Biff12Error> {
        if self.size < at + 4 {
            return Err(Biff12Error::NoEnoughData(at + 4, self.size));
        }
        let count = to_u32(&self.buffer[at..at + 4]);
        let end = at + 4 + count as usize * 2;
        if self.size < end {
            return Err(Biff12Error::NoEnoughData(end, self.size));
        }
        Ok(UTF_16LE.decode_without_bom_handling_and_without_replacement(&self.buffer[at + 4..end]))
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Biff12Error> {
        let mut byte = [0u8; 1];
        match self.reader.read_exact(&mut byte) {
            Ok(()) => Ok(Some(byte[0])),
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Record id: one byte, or two 7-bit groups when the high bit is set.
    fn read_id(&mut self) -> Result<Option<u16>, Biff12Error> {
        let b0 = match self.read_byte()? {
            Some(byte) => byte,
            None => return Ok(None),
        };
        let mut id = (b0 & 0x7F) as u16;
        if b0 & 0x80 != 0 {
            let b1 = match self.read_byte()? {
                Some(byte) => byte,
                None => return Ok(None),
            };
            id |= (b1 as u16) << 7;
        }
        Ok(Some(id))
    }

    /// Record size: up to four 7-bit groups. A fourth byte that still asks
    /// for continuation is malformed and terminates the scan.
    fn read_size(&mut self) -> Result<Option<usize>, Biff12Error> {
        let mut size = 0usize;
        for index in 0..4 {
            let byte = match self.read_byte()? {
                Some(byte) => byte,
                None => return Ok(None),
            };
            size |= ((byte & 0x7F) as usize) << (7 * index);
            if byte & 0x80 == 0 {
                return Ok(Some(size));
            }
        }
        log::warn!("malformed BIFF12 size varint, terminating scan");
        Ok(None)
    }

    fn fill(&mut self, size: usize) -> Result<bool, Biff12Error> {
        if size > self.buffer.len() {
            self.buffer = vec![0u8; size];
        }
        match self.reader.read_exact(&mut self.buffer[..size]) {
            Ok(()) => {
                self.size = size;
                Ok(true)
            }
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                log::debug!("short read inside BIFF12 record, terminating scan");
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn drain(&mut self, size: usize) -> Result<bool, Biff12Error> {
        let copied = io::copy(&mut (&mut self.reader).take(size as u64), &mut io::sink())?;
        Ok(copied == size as u64)
    }
}
