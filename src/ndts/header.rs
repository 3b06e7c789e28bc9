use std::{collections::BTreeMap, convert::TryFrom};

use crate::{ndts, schema::Schema, util, Error, Result};

/// Decoded `.ndts` header.
///
/// Layout, all integers little-endian,
///
/// ```text
/// magic(4) version(u16) flags(u16)
/// schema_len(u32) schema_json
/// total_rows(u64) chunk_count(u32)
/// dict_len(u32) dicts_json padded with spaces to dict_len
/// header_crc32(u32)
/// ```
///
/// Everything from `total_rows` onward is the mutable tail, rewritten in
/// place after each append. The dictionary region is padded to
/// `dict_reserve` so the tail can grow without moving the chunks; when the
/// dictionaries outgrow the reserve the whole file is rewritten.
#[derive(Clone, Debug)]
pub struct Header {
    pub version: u16,
    pub flags: u16,
    pub schema: Schema,
    pub total_rows: u64,
    pub chunk_count: u32,
    /// String-column dictionaries, column name to entries in code order.
    pub dicts: BTreeMap<String, Vec<String>>,
    /// On-disk byte length of the padded dictionary region.
    pub dict_reserve: usize,
}

impl Header {
    pub fn new(schema: Schema) -> Header {
        Header {
            version: ndts::VERSION,
            flags: 0,
            schema,
            total_rows: 0,
            chunk_count: 0,
            dicts: BTreeMap::new(),
            dict_reserve: ndts::DICT_RESERVE,
        }
    }

    fn dicts_json(&self) -> Result<String> {
        err_at!(FailConvert, serde_json::to_string(&self.dicts))
    }

    /// Serialized length of the dictionaries, before padding.
    pub fn dicts_json_len(&self) -> Result<usize> {
        Ok(self.dicts_json()?.len())
    }

    /// Full on-disk header size for the current schema and reserve.
    pub fn encoded_len(&self) -> Result<usize> {
        let schema_len = self.schema.to_json()?.len();
        Ok(12 + schema_len + 8 + 4 + 4 + self.dict_reserve + 4)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let schema_json = self.schema.to_json()?;
        let dicts_json = self.dicts_json()?;
        if dicts_json.len() > self.dict_reserve {
            err_at!(
                Fatal, msg: "dicts {} overflow reserve {}",
                dicts_json.len(), self.dict_reserve
            )?;
        }

        let mut buf: Vec<u8> = vec![];
        buf.extend_from_slice(&ndts::MAGIC);
        util::write_u16(&mut buf, self.version);
        util::write_u16(&mut buf, self.flags);
        util::write_u32(&mut buf, err_at!(FailConvert, u32::try_from(schema_json.len()))?);
        buf.extend_from_slice(schema_json.as_bytes());
        util::write_u64(&mut buf, self.total_rows);
        util::write_u32(&mut buf, self.chunk_count);
        util::write_u32(&mut buf, err_at!(FailConvert, u32::try_from(self.dict_reserve))?);
        buf.extend_from_slice(dicts_json.as_bytes());
        buf.resize(buf.len() + (self.dict_reserve - dicts_json.len()), b' ');
        let crc = util::crc32(&buf);
        util::write_u32(&mut buf, crc);

        Ok(buf)
    }

    /// Decode and CRC-validate a header from the start of `buf`. Returns
    /// the header and its on-disk length.
    pub fn decode(buf: &[u8]) -> Result<(Header, usize)> {
        let mut off = 0;

        // first pass reads the raw regions and validates the CRC, JSON
        // blocks are parsed only once the bytes are known good.
        let magic_ok = match util::read_bytes(buf, &mut off, 4) {
            Some(magic) => magic == ndts::MAGIC,
            None => err_at!(CorruptHeader, msg: "truncated magic")?,
        };
        let version = match util::read_u16(buf, &mut off) {
            Some(version) => version,
            None => err_at!(CorruptHeader, msg: "truncated version")?,
        };
        let flags = match util::read_u16(buf, &mut off) {
            Some(flags) => flags,
            None => err_at!(CorruptHeader, msg: "truncated flags")?,
        };

        let schema_len = match util::read_u32(buf, &mut off) {
            Some(n) => util::to_usize(n)?,
            None => err_at!(CorruptHeader, msg: "truncated schema length")?,
        };
        let schema_bytes = match util::read_bytes(buf, &mut off, schema_len) {
            Some(bytes) => bytes,
            None => err_at!(CorruptHeader, msg: "truncated schema")?,
        };

        let total_rows = match util::read_u64(buf, &mut off) {
            Some(n) => n,
            None => err_at!(CorruptHeader, msg: "truncated total_rows")?,
        };
        let chunk_count = match util::read_u32(buf, &mut off) {
            Some(n) => n,
            None => err_at!(CorruptHeader, msg: "truncated chunk_count")?,
        };

        let dict_reserve = match util::read_u32(buf, &mut off) {
            Some(n) => util::to_usize(n)?,
            None => err_at!(CorruptHeader, msg: "truncated dict length")?,
        };
        let dict_bytes = match util::read_bytes(buf, &mut off, dict_reserve) {
            Some(bytes) => bytes,
            None => err_at!(CorruptHeader, msg: "truncated dictionaries")?,
        };

        let crc_off = off;
        let crc = match util::read_u32(buf, &mut off) {
            Some(crc) => crc,
            None => err_at!(CorruptHeader, msg: "truncated crc")?,
        };
        let computed = util::crc32(&buf[..crc_off]);
        if crc != computed {
            err_at!(CorruptHeader, msg: "crc {:x} != {:x}", crc, computed)?;
        }
        if !magic_ok {
            err_at!(CorruptHeader, msg: "bad magic")?;
        }
        if version != ndts::VERSION {
            err_at!(InvalidFile, msg: "unknown version {}", version)?;
        }

        let schema = {
            let text = err_at!(CorruptHeader, std::str::from_utf8(schema_bytes))?;
            Schema::from_json(text)
                .map_err(|e| Error::CorruptHeader(format!("{}:{}", file!(), line!()), e.to_string()))?
        };
        let dicts: BTreeMap<String, Vec<String>> = {
            let text = err_at!(CorruptHeader, std::str::from_utf8(dict_bytes))?;
            err_at!(CorruptHeader, serde_json::from_str(text.trim_end()))?
        };

        let header = Header {
            version,
            flags,
            schema,
            total_rows,
            chunk_count,
            dicts,
            dict_reserve,
        };
        Ok((header, off))
    }
}

#[cfg(test)]
#[path = "header_test.rs"]
mod header_test;
