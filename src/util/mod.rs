//! Module implement common utility functions and types.

use std::convert::TryFrom;

use crate::{Error, Result};

pub mod files;
pub mod hash;

pub use hash::CityHasher;

/// Compute IEEE CRC32 (polynomial 0xEDB88320, reversed) over `data`.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Streaming variant of [crc32], for callers that feed data piecewise.
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Default for Crc32 {
    fn default() -> Crc32 {
        Crc32 { hasher: crc32fast::Hasher::new() }
    }
}

impl Crc32 {
    pub fn new() -> Crc32 {
        Crc32::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data)
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}

// Little-endian byte readers. Return None on truncated input, callers
// translate None to the error variant appropriate for what is being decoded.

pub fn read_u16(buf: &[u8], off: &mut usize) -> Option<u16> {
    let bytes = buf.get(*off..*off + 2)?;
    *off += 2;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn read_u32(buf: &[u8], off: &mut usize) -> Option<u32> {
    let bytes = buf.get(*off..*off + 4)?;
    *off += 4;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn read_u64(buf: &[u8], off: &mut usize) -> Option<u64> {
    let bytes = buf.get(*off..*off + 8)?;
    *off += 8;
    let mut scratch = [0_u8; 8];
    scratch.copy_from_slice(bytes);
    Some(u64::from_le_bytes(scratch))
}

pub fn read_bytes<'a>(buf: &'a [u8], off: &mut usize, n: usize) -> Option<&'a [u8]> {
    let bytes = buf.get(*off..*off + n)?;
    *off += n;
    Some(bytes)
}

pub fn write_u16(buf: &mut Vec<u8>, val: u16) {
    buf.extend_from_slice(&val.to_le_bytes());
}

pub fn write_u32(buf: &mut Vec<u8>, val: u32) {
    buf.extend_from_slice(&val.to_le_bytes());
}

pub fn write_u64(buf: &mut Vec<u8>, val: u64) {
    buf.extend_from_slice(&val.to_le_bytes());
}

/// Checked usize conversion for lengths and counts read from disk.
pub fn to_usize<T>(val: T) -> Result<usize>
where
    usize: TryFrom<T>,
    <usize as TryFrom<T>>::Error: std::fmt::Display,
{
    err_at!(FailConvert, usize::try_from(val))
}
