//! Small helpers layered on top of `byteorder`, shared by every codec module.
//!
//! Mirrors the shape of a typical binary-format reader: primitive readers
//! that turn `UnexpectedEof` into a semantic [`CoreError::Truncated`], plus a
//! peek surface modeled as "clone the cursor, read, restore on request".

use crate::error::{CoreError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

pub fn u8<R: Read>(reader: &mut R) -> Result<u8> {
    reader.read_u8().map_err(|e| io_to_core(e, 1))
}

pub fn u16_le<R: Read>(reader: &mut R) -> Result<u16> {
    reader.read_u16::<LittleEndian>().map_err(|e| io_to_core(e, 2))
}

pub fn u32_le<R: Read>(reader: &mut R) -> Result<u32> {
    reader.read_u32::<LittleEndian>().map_err(|e| io_to_core(e, 4))
}

pub fn s16_le<R: Read>(reader: &mut R) -> Result<i16> {
    reader.read_i16::<LittleEndian>().map_err(|e| io_to_core(e, 2))
}

fn io_to_core(e: std::io::Error, expected: usize) -> CoreError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        CoreError::Truncated { expected, got: 0 }
    } else {
        CoreError::Io(e)
    }
}

pub fn take<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(|e| io_to_core(e, len))?;
    Ok(buf)
}

/// Reads bytes up to (and consuming) a trailing NUL, without the terminator.
pub fn take_cstr<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let b = u8(reader)?;
        if b == 0 {
            break;
        }
        out.push(b);
    }
    Ok(out)
}

/// A byte cursor with save/restore ("peek") support, used by the script
/// walker to look ahead without committing to consuming the bytes.
#[derive(Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(CoreError::Truncated { expected: 1, got: 0 })?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let lo = self.read_u8()? as u16;
        let hi = self.read_u8()? as u16;
        Ok(lo | (hi << 8))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let mut v = 0u32;
        for i in 0..4 {
            v |= (self.read_u8()? as u32) << (8 * i);
        }
        Ok(v)
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        Ok(self.read_u16_le()? as i16)
    }

    pub fn read_cstr(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let b = self.read_u8()?;
            if b == 0 {
                break;
            }
            out.push(b);
        }
        Ok(out)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(CoreError::Truncated {
                expected: len,
                got: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Peeks the next byte without advancing the cursor.
    pub fn peek_u8(&self) -> Result<u8> {
        let mut probe = self.clone();
        probe.read_u8()
    }

    /// Peeks the next little-endian u16 without advancing the cursor.
    pub fn peek_u16_le(&self) -> Result<u16> {
        let mut probe = self.clone();
        probe.read_u16_le()
    }
}
