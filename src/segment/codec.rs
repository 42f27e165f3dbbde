//! Variable-byte integer encoding shared by the index and data formats
//!
//! Each byte carries 7 data bits, least significant group first. The high
//! bit marks the final byte of a value.

use std::io::{self, Read};

use crate::error::{FpIndexError, Result};

/// Maximum encoded length of a u64
pub const MAX_VBYTE_LEN: usize = 10;

/// Variable-byte encode a u32
pub fn encode_vbyte(value: u32, output: &mut Vec<u8>) {
    encode_vbyte_u64(value as u64, output)
}

/// Variable-byte encode a u64
pub fn encode_vbyte_u64(value: u64, output: &mut Vec<u8>) {
    let mut v = value;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            output.push(byte | 0x80); // Set high bit to indicate last byte
            break;
        } else {
            output.push(byte);
        }
    }
}

/// Number of bytes `encode_vbyte_u64` produces for `value`
pub fn vbyte_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Accumulates one vbyte group; returns `Some(value)` once the final byte is seen
struct VByteDecoder {
    result: u64,
    shift: u32,
}

impl VByteDecoder {
    fn new() -> Self {
        Self { result: 0, shift: 0 }
    }

    fn push(&mut self, byte: u8) -> Result<Option<u64>> {
        let bits = (byte & 0x7F) as u64;
        if self.shift > 63 || (self.shift == 63 && bits > 1) {
            return Err(FpIndexError::corruption("vbyte value too large"));
        }
        self.result |= bits << self.shift;
        if byte & 0x80 != 0 {
            return Ok(Some(self.result));
        }
        self.shift += 7;
        Ok(None)
    }
}

/// Decode a variable-byte encoded u64 from a slice, advancing `pos`
pub fn decode_vbyte_u64(input: &[u8], pos: &mut usize) -> Result<u64> {
    let mut decoder = VByteDecoder::new();
    loop {
        let byte = *input
            .get(*pos)
            .ok_or_else(|| FpIndexError::corruption("unexpected end of vbyte"))?;
        *pos += 1;
        if let Some(value) = decoder.push(byte)? {
            return Ok(value);
        }
    }
}

/// Decode a variable-byte encoded u32 from a slice, advancing `pos`
pub fn decode_vbyte(input: &[u8], pos: &mut usize) -> Result<u32> {
    let value = decode_vbyte_u64(input, pos)?;
    narrow(value)
}

/// Read one vbyte value from a stream.
///
/// Returns `Ok(None)` when the stream ends cleanly before the first byte;
/// ending inside a value is corruption. `pos` advances by the bytes consumed.
pub fn read_vbyte_u64<R: Read + ?Sized>(reader: &mut R, pos: &mut u64) -> Result<Option<u64>> {
    let mut decoder = VByteDecoder::new();
    let mut first = true;
    loop {
        let byte = match read_byte(reader)? {
            Some(byte) => byte,
            None if first => return Ok(None),
            None => return Err(FpIndexError::corruption("unexpected end of vbyte")),
        };
        *pos += 1;
        first = false;
        if let Some(value) = decoder.push(byte)? {
            return Ok(Some(value));
        }
    }
}

/// Stream flavour of `decode_vbyte`
pub fn read_vbyte<R: Read + ?Sized>(reader: &mut R, pos: &mut u64) -> Result<Option<u32>> {
    read_vbyte_u64(reader, pos)?.map(narrow).transpose()
}

fn narrow(value: u64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| FpIndexError::corruption(format!("vbyte value {} exceeds u32", value)))
}

fn read_byte<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
