// This file is part of OpenGMS.
//
// OpenGMS is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenGMS is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenGMS.  If not, see <http://www.gnu.org/licenses/>.
use anyhow::Result;
use log::trace;
use std::{fmt, str};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("not a FORM container: found {found:?} at start of file")]
    BadMagic { found: [u8; 4] },
    #[error("truncated read of {wanted} bytes at offset {offset:08X}, only {remain} remain")]
    Truncated {
        wanted: usize,
        offset: usize,
        remain: usize,
    },
    #[error("chunk {tag} length {len} overruns container end at {offset:08X}")]
    ChunkOverrun { tag: Tag, len: u32, offset: usize },
}

/// A four character chunk code, e.g. GEN8 or SPRT.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub fn new(name: &[u8; 4]) -> Self {
        Self(*name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "{:02X?}", self.0),
        }
    }
}

/// Little-endian cursor over a byte slice. All reads are bounds checked and
/// return FormError::Truncated rather than panicking on short data.
pub struct Reader<'a> {
    data: &'a [u8],
    // Where `data` starts, relative to the front of the container. Entry
    // tables store absolute file offsets, so error messages and absolute
    // seeks both need to know our base.
    base: usize,
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            base: 0,
            offset: 0,
        }
    }

    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            base,
            offset: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    /// Position relative to the front of the container.
    pub fn absolute_position(&self) -> usize {
        self.base + self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(FormError::Truncated {
                wanted: offset - self.data.len(),
                offset: self.base + self.data.len(),
                remain: 0,
            }
            .into());
        }
        self.offset = offset;
        Ok(())
    }

    /// Seek to an absolute file offset, which must land inside our slice.
    pub fn seek_absolute(&mut self, file_offset: usize) -> Result<()> {
        let rel = file_offset
            .checked_sub(self.base)
            .ok_or(FormError::Truncated {
                wanted: 0,
                offset: file_offset,
                remain: 0,
            })?;
        self.seek(rel)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(FormError::Truncated {
                wanted: count,
                offset: self.absolute_position(),
                remain: self.remaining(),
            }
            .into());
        }
        let out = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(out)
    }

    pub fn read_tag(&mut self) -> Result<Tag> {
        let b = self.read_bytes(4)?;
        Ok(Tag([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read a table of `count` u32 values; used everywhere the container
    /// stores pointer lists of absolute entry offsets.
    pub fn read_u32_table(&mut self, count: usize) -> Result<Vec<u32>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_u32()?);
        }
        Ok(out)
    }
}

/// One tagged record inside the FORM payload.
#[derive(Debug)]
pub struct Chunk<'a> {
    pub tag: Tag,
    /// Absolute file offset of the payload start. Entry tables inside
    /// chunks reference other file positions absolutely.
    pub offset: usize,
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub fn reader(&self) -> Reader<'a> {
        Reader::with_base(self.data, self.offset)
    }
}

/// The decoded outer container: an ordered walk of all chunks. Unknown tags
/// are retained so dump tooling can show the full layout; typed consumers
/// pick out the tags they understand.
#[derive(Debug)]
pub struct Form<'a> {
    pub chunks: Vec<Chunk<'a>>,
}

const FORM: Tag = Tag(*b"FORM");

impl<'a> Form<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let magic = r.read_tag()?;
        if magic != FORM {
            return Err(FormError::BadMagic { found: magic.0 }.into());
        }
        let total = r.read_u32()? as usize;
        if total > r.remaining() {
            return Err(FormError::ChunkOverrun {
                tag: FORM,
                len: total as u32,
                offset: 0,
            }
            .into());
        }

        let mut chunks = Vec::new();
        let end = r.position() + total;
        while r.position() < end {
            let at = r.position();
            let tag = r.read_tag()?;
            let len = r.read_u32()?;
            if len as usize > end - r.position() {
                return Err(FormError::ChunkOverrun {
                    tag,
                    len,
                    offset: at,
                }
                .into());
            }
            let offset = r.position();
            let payload = r.read_bytes(len as usize)?;
            trace!("chunk {} at {:08X}, {} bytes", tag, at, len);
            chunks.push(Chunk {
                tag,
                offset,
                data: payload,
            });
        }
        Ok(Self { chunks })
    }

    pub fn chunk(&self, name: &[u8; 4]) -> Option<&Chunk<'a>> {
        let tag = Tag(*name);
        self.chunks.iter().find(|c| c.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_bytes(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn form_bytes(chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        for c in chunks {
            body.extend_from_slice(c);
        }
        let mut out = Vec::new();
        out.extend_from_slice(b"FORM");
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn it_walks_all_chunks() -> Result<()> {
        let data = form_bytes(&[
            chunk_bytes(b"GEN8", &[1, 2, 3, 4]),
            chunk_bytes(b"STRG", &[0; 8]),
            chunk_bytes(b"WEIR", &[9; 12]),
        ]);
        let form = Form::from_bytes(&data)?;
        assert_eq!(form.chunks.len(), 3);
        assert_eq!(form.chunk(b"GEN8").unwrap().data, &[1, 2, 3, 4]);
        assert_eq!(form.chunk(b"GEN8").unwrap().offset, 16);
        assert!(form.chunk(b"WEIR").is_some());
        assert!(form.chunk(b"CODE").is_none());
        Ok(())
    }

    #[test]
    fn it_rejects_bad_magic() {
        let err = Form::from_bytes(b"MROF\x00\x00\x00\x00").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FormError>(),
            Some(FormError::BadMagic { .. })
        ));
    }

    #[test]
    fn it_rejects_overrun_chunks() {
        let mut data = Vec::new();
        data.extend_from_slice(b"FORM");
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(b"GEN8");
        data.extend_from_slice(&200u32.to_le_bytes());
        data.extend_from_slice(&[0; 4]);
        let err = Form::from_bytes(&data).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FormError>(),
            Some(FormError::ChunkOverrun { .. })
        ));
    }

    #[test]
    fn reader_reads_little_endian() -> Result<()> {
        let data = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u32()?, 1);
        assert!((r.read_f32()?).abs() < f32::EPSILON);
        assert_eq!(r.read_u16()?, 0x3FF0);
        assert_eq!(r.remaining(), 0);
        assert!(r.read_u8().is_err());
        Ok(())
    }

    #[test]
    fn reader_f64_round_trips() -> Result<()> {
        let data = std::f64::consts::PI.to_le_bytes();
        let mut r = Reader::new(&data);
        assert!((r.read_f64()? - std::f64::consts::PI).abs() < f64::EPSILON);
        Ok(())
    }
}
