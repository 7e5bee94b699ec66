//! MMDB data-section decoder.
//!
//! Decodes one self-describing value at a time from a `Buffer`, following
//! intra-file pointers as needed. Unlike a decoder hardwired to a single
//! `&[u8]` slice, this one reads through `Buffer::slice`, so the FILE backend
//! never needs the whole data section materialized to answer one lookup.

use std::collections::HashMap;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::record::Record;

/// Valid files never chain pointers this deep; anything beyond this is
/// treated as a corrupt/hostile database rather than spun on forever.
const MAX_POINTER_DEPTH: usize = 512;

/// Reads self-describing MMDB values out of a `Buffer`.
pub(crate) struct Decoder<'a> {
    buffer: &'a Buffer,
    /// Absolute file offset that pointer value 0 refers to.
    origin: usize,
    /// When set, a decoded pointer is returned as `Record::Pointer(value)`
    /// instead of being followed. Used only for the metadata pass (which
    /// must not chase pointers past its own start) and for decoder tests.
    pointer_test_mode: bool,
}

impl<'a> Decoder<'a> {
    /// A decoder whose pointers resolve into the data section starting at
    /// absolute file offset `origin`.
    pub fn new(buffer: &'a Buffer, origin: usize) -> Self {
        Decoder {
            buffer,
            origin,
            pointer_test_mode: false,
        }
    }

    /// A decoder that reports raw pointer values instead of following them.
    pub fn pointer_test(buffer: &'a Buffer, origin: usize) -> Self {
        Decoder {
            buffer,
            origin,
            pointer_test_mode: true,
        }
    }

    /// Decode the value whose pointer-relative offset is `offset`.
    pub fn decode(&self, offset: u32) -> Result<Record> {
        let mut cursor = self.origin + offset as usize;
        self.decode_at(&mut cursor, 0)
    }

    fn byte(&self, pos: usize) -> Result<u8> {
        Ok(self.buffer.slice(pos, 1)?[0])
    }

    fn decode_at(&self, cursor: &mut usize, depth: usize) -> Result<Record> {
        if depth > MAX_POINTER_DEPTH {
            return Err(Error::InvalidDatabase(
                "pointer chain exceeds maximum depth".to_string(),
            ));
        }

        let ctrl = self.byte(*cursor)?;
        *cursor += 1;

        let type_id = ctrl >> 5;
        let payload = ctrl & 0x1F;

        match type_id {
            0 => self.decode_extended(cursor, payload, depth),
            1 => self.decode_pointer(cursor, payload, depth),
            2 => self.decode_string(cursor, payload),
            3 => self.decode_double(cursor),
            4 => self.decode_bytes(cursor, payload),
            5 => self.decode_uint16(cursor, payload),
            6 => self.decode_uint32(cursor, payload),
            7 => self.decode_map(cursor, payload, depth),
            _ => Err(Error::InvalidDatabase(format!(
                "invalid control byte type tag {}",
                type_id
            ))),
        }
    }

    fn decode_extended(&self, cursor: &mut usize, size_from_ctrl: u8, depth: usize) -> Result<Record> {
        let raw_ext_type = self.byte(*cursor)?;
        let type_id = 7u16 + raw_ext_type as u16;
        *cursor += 1;

        match type_id {
            8 => self.decode_int32(cursor, size_from_ctrl),
            9 => self.decode_uint64(cursor, size_from_ctrl),
            10 => self.decode_uint128(cursor, size_from_ctrl),
            11 => self.decode_array(cursor, size_from_ctrl, depth),
            14 => Ok(Record::Bool(size_from_ctrl != 0)),
            15 => self.decode_float(cursor, size_from_ctrl),
            other => Err(Error::InvalidDatabase(format!(
                "unknown extended type tag {}",
                other
            ))),
        }
    }

    fn decode_pointer(&self, cursor: &mut usize, payload: u8, depth: usize) -> Result<Record> {
        let size_class = (payload >> 3) & 0x3;
        let low_bits = (payload & 0x7) as u32;

        let offset = match size_class {
            0 => {
                let b0 = self.byte(*cursor)? as u32;
                *cursor += 1;
                (low_bits << 8) | b0
            }
            1 => {
                let bytes = self.buffer.slice(*cursor, 2)?;
                let (b0, b1) = (bytes[0] as u32, bytes[1] as u32);
                *cursor += 2;
                2048 + ((low_bits << 16) | (b0 << 8) | b1)
            }
            2 => {
                let bytes = self.buffer.slice(*cursor, 3)?;
                let (b0, b1, b2) = (bytes[0] as u32, bytes[1] as u32, bytes[2] as u32);
                *cursor += 3;
                526_336 + ((low_bits << 24) | (b0 << 16) | (b1 << 8) | b2)
            }
            3 => {
                let bytes = self.buffer.slice(*cursor, 4)?;
                let mut arr = [0u8; 4];
                arr.copy_from_slice(&bytes);
                *cursor += 4;
                u32::from_be_bytes(arr)
            }
            _ => unreachable!("2-bit size class"),
        };

        if self.pointer_test_mode {
            return Ok(Record::Pointer(offset));
        }

        let mut target = self.origin + offset as usize;
        self.decode_at(&mut target, depth + 1)
    }

    fn decode_string(&self, cursor: &mut usize, size_bits: u8) -> Result<Record> {
        let len = self.decode_size(cursor, size_bits)?;
        let bytes = self.buffer.slice(*cursor, len)?;
        let s = std::str::from_utf8(&bytes)
            .map_err(|_| Error::InvalidUtf8("string data section entry".to_string()))?
            .to_string();
        *cursor += len;
        Ok(Record::String(s))
    }

    fn decode_double(&self, cursor: &mut usize) -> Result<Record> {
        let bytes = self.buffer.slice(*cursor, 8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&bytes);
        *cursor += 8;
        Ok(Record::Double(f64::from_be_bytes(arr)))
    }

    fn decode_bytes(&self, cursor: &mut usize, size_bits: u8) -> Result<Record> {
        let len = self.decode_size(cursor, size_bits)?;
        let bytes = self.buffer.slice(*cursor, len)?.to_vec();
        *cursor += len;
        Ok(Record::Bytes(bytes))
    }

    fn decode_uint16(&self, cursor: &mut usize, size_bits: u8) -> Result<Record> {
        let size = self.decode_size(cursor, size_bits)?;
        if size > 2 {
            return Err(Error::InvalidDatabase("uint16 size too large".to_string()));
        }
        let bytes = self.buffer.slice(*cursor, size)?;
        let mut value = 0u16;
        for b in bytes.iter() {
            value = (value << 8) | (*b as u16);
        }
        *cursor += size;
        Ok(Record::Uint16(value))
    }

    fn decode_uint32(&self, cursor: &mut usize, size_bits: u8) -> Result<Record> {
        let size = self.decode_size(cursor, size_bits)?;
        if size > 4 {
            return Err(Error::InvalidDatabase("uint32 size too large".to_string()));
        }
        let bytes = self.buffer.slice(*cursor, size)?;
        let mut value = 0u32;
        for b in bytes.iter() {
            value = (value << 8) | (*b as u32);
        }
        *cursor += size;
        Ok(Record::Uint32(value))
    }

    fn decode_map(&self, cursor: &mut usize, size_bits: u8, depth: usize) -> Result<Record> {
        let count = self.decode_size(cursor, size_bits)?;
        let mut map = HashMap::with_capacity(count);

        for _ in 0..count {
            let key_value = self.decode_at(cursor, depth)?;
            let key = match key_value {
                Record::String(s) => s,
                Record::Pointer(offset) => match self.decode(offset)? {
                    Record::String(s) => s,
                    _ => {
                        return Err(Error::InvalidDatabase(
                            "map key pointer did not resolve to a string".to_string(),
                        ))
                    }
                },
                _ => {
                    return Err(Error::InvalidDatabase(
                        "map key must be a string".to_string(),
                    ))
                }
            };

            let value = self.decode_at(cursor, depth)?;
            map.insert(key, value);
        }

        Ok(Record::Map(map))
    }

    fn decode_int32(&self, cursor: &mut usize, size_bits: u8) -> Result<Record> {
        let size = self.decode_size(cursor, size_bits)?;
        if size > 4 {
            return Err(Error::InvalidDatabase("int32 size too large".to_string()));
        }
        let bytes = self.buffer.slice(*cursor, size)?;
        let mut value = 0i32;
        if size > 0 {
            if bytes[0] & 0x80 != 0 {
                value = -1;
            }
            for b in bytes.iter() {
                value = (value << 8) | (*b as i32);
            }
        }
        *cursor += size;
        Ok(Record::Int32(value))
    }

    fn decode_uint64(&self, cursor: &mut usize, size_bits: u8) -> Result<Record> {
        let size = self.decode_size(cursor, size_bits)?;
        if size > 8 {
            return Err(Error::InvalidDatabase("uint64 size too large".to_string()));
        }
        let bytes = self.buffer.slice(*cursor, size)?;
        let mut value = 0u64;
        for b in bytes.iter() {
            value = (value << 8) | (*b as u64);
        }
        *cursor += size;
        Ok(Record::Uint64(value))
    }

    fn decode_uint128(&self, cursor: &mut usize, size_bits: u8) -> Result<Record> {
        let size = self.decode_size(cursor, size_bits)?;
        if size > 16 {
            return Err(Error::InvalidDatabase("uint128 size too large".to_string()));
        }
        let bytes = self.buffer.slice(*cursor, size)?;
        let mut value = 0u128;
        for b in bytes.iter() {
            value = (value << 8) | (*b as u128);
        }
        *cursor += size;
        Ok(Record::Uint128(value))
    }

    fn decode_array(&self, cursor: &mut usize, size_bits: u8, depth: usize) -> Result<Record> {
        let count = self.decode_size(cursor, size_bits)?;
        let mut array = Vec::with_capacity(count);
        for _ in 0..count {
            array.push(self.decode_at(cursor, depth)?);
        }
        Ok(Record::Array(array))
    }

    fn decode_float(&self, cursor: &mut usize, size_bits: u8) -> Result<Record> {
        if size_bits != 4 {
            return Err(Error::InvalidDatabase("float must be 4 bytes".to_string()));
        }
        let bytes = self.buffer.slice(*cursor, 4)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(&bytes);
        *cursor += 4;
        Ok(Record::Float(f32::from_be_bytes(arr)))
    }

    fn decode_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize> {
        match size_bits {
            0..=28 => Ok(size_bits as usize),
            29 => {
                let extra = self.byte(*cursor)? as usize;
                *cursor += 1;
                Ok(29 + extra)
            }
            30 => {
                let bytes = self.buffer.slice(*cursor, 2)?;
                let mut arr = [0u8; 2];
                arr.copy_from_slice(&bytes);
                *cursor += 2;
                Ok(29 + 256 + u16::from_be_bytes(arr) as usize)
            }
            31 => {
                let bytes = self.buffer.slice(*cursor, 3)?;
                let (b0, b1, b2) = (bytes[0] as usize, bytes[1] as usize, bytes[2] as usize);
                *cursor += 3;
                Ok(29 + 256 + 65536 + ((b0 << 16) | (b1 << 8) | b2))
            }
            _ => unreachable!("5-bit size field"),
        }
    }
}
