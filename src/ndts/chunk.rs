use std::convert::TryFrom;

use crate::{
    codec,
    schema::Schema,
    table::ColumnData,
    util,
    value::ColumnType,
    Error, Result,
};

/// Location and shape of one chunk inside a file, derived by scanning.
#[derive(Clone, Debug)]
pub struct ChunkInfo {
    /// File position of the chunk header.
    pub fpos: u64,
    pub row_count: u32,
    pub payload_len: u64,
    pub codec_flags: Vec<u8>,
    /// Per-column `(offset, len)` of the payload bytes, relative to the
    /// chunk start.
    pub col_offsets: Vec<(usize, usize)>,
    /// Whole chunk length in bytes, header through trailing CRC.
    pub total_len: usize,
}

// chunk header is row_count(u32) + payload_len(u64) + one codec flag per
// column.
fn header_len(ncols: usize) -> usize {
    4 + 8 + ncols
}

/// Encode one chunk from schema-ordered column payloads. Codecs are chosen
/// opportunistically per column, see [crate::codec].
pub(crate) fn encode_chunk(datas: &[&ColumnData]) -> Result<Vec<u8>> {
    let rows = match datas.first() {
        Some(data) => data.len(),
        None => err_at!(InvalidInput, msg: "chunk without columns")?,
    };
    for data in datas.iter() {
        if data.len() != rows {
            err_at!(Fatal, msg: "ragged chunk {}/{}", data.len(), rows)?;
        }
    }

    let mut flags = Vec::with_capacity(datas.len());
    let mut payload: Vec<u8> = vec![];
    for data in datas.iter() {
        let flag = match data {
            ColumnData::I32(vals) => {
                let flag = codec::choose_codec_i32(vals);
                match flag {
                    codec::CODEC_DELTA => codec::delta_encode_i32(vals, &mut payload),
                    codec::CODEC_RLE => codec::rle_encode_i32(vals, &mut payload),
                    _ => {
                        for val in vals.iter() {
                            payload.extend_from_slice(&val.to_le_bytes());
                        }
                    }
                }
                flag
            }
            ColumnData::I64(vals) => {
                let flag = codec::choose_codec_i64(vals);
                match flag {
                    codec::CODEC_DELTA => codec::delta_encode_i64(vals, &mut payload),
                    codec::CODEC_RLE => codec::rle_encode_i64(vals, &mut payload),
                    _ => {
                        for val in vals.iter() {
                            payload.extend_from_slice(&val.to_le_bytes());
                        }
                    }
                }
                flag
            }
            ColumnData::F32(vals) => {
                for val in vals.iter() {
                    payload.extend_from_slice(&val.to_le_bytes());
                }
                codec::CODEC_RAW
            }
            ColumnData::F64(vals) => {
                for val in vals.iter() {
                    payload.extend_from_slice(&val.to_le_bytes());
                }
                codec::CODEC_RAW
            }
            ColumnData::Code(vals) => {
                let flag = codec::choose_codec_u32(vals);
                match flag {
                    codec::CODEC_RLE => codec::rle_encode_u32(vals, &mut payload),
                    _ => {
                        for val in vals.iter() {
                            payload.extend_from_slice(&val.to_le_bytes());
                        }
                    }
                }
                flag
            }
        };
        flags.push(flag);
    }

    let mut buf = Vec::with_capacity(header_len(datas.len()) + payload.len() + 4);
    util::write_u32(&mut buf, err_at!(FailConvert, u32::try_from(rows))?);
    util::write_u64(&mut buf, payload.len() as u64);
    buf.extend_from_slice(&flags);
    buf.extend_from_slice(&payload);
    let crc = util::crc32(&buf);
    util::write_u32(&mut buf, crc);

    Ok(buf)
}

/// Walk the chunk starting at `buf[0]`, computing the per-column payload
/// boundaries without materializing values. CRC is not consulted here,
/// decode and verify do that.
pub(crate) fn scan_chunk(schema: &Schema, buf: &[u8], ordinal: usize) -> Result<ChunkInfo> {
    let corrupt = |msg: &str| -> Error {
        let prefix = format!("{}:{}", file!(), line!());
        Error::CorruptChunk(prefix, ordinal, msg.to_string())
    };

    let ncols = schema.len();
    let mut off = 0;
    let row_count = util::read_u32(buf, &mut off).ok_or_else(|| corrupt("truncated rows"))?;
    let payload_len =
        util::read_u64(buf, &mut off).ok_or_else(|| corrupt("truncated payload_len"))?;
    let codec_flags = util::read_bytes(buf, &mut off, ncols)
        .ok_or_else(|| corrupt("truncated codec flags"))?
        .to_vec();

    let rows = util::to_usize(row_count)?;
    let mut col_offsets = Vec::with_capacity(ncols);
    for (flag, field) in codec_flags.iter().zip(schema.fields().iter()) {
        let width = field.kind.width();
        let len = match codec::encoded_len(&buf[off..], *flag, rows, width) {
            Ok(len) => len,
            Err(err) => return Err(corrupt(&format!("{}", err))),
        };
        if off + len > buf.len() {
            return Err(corrupt(&format!("truncated payload for {}", field.name)));
        }
        col_offsets.push((off, len));
        off += len;
    }

    let want = util::to_usize(payload_len)?;
    let got = off - header_len(ncols);
    if want != got {
        return Err(corrupt(&format!("payload {} != {}", got, want)));
    }
    if buf.len() < off + 4 {
        return Err(corrupt("truncated crc"));
    }

    Ok(ChunkInfo {
        fpos: 0,
        row_count,
        payload_len,
        codec_flags,
        col_offsets,
        total_len: off + 4,
    })
}

/// Decode and CRC-validate the chunk at `buf[0]`, returning schema-ordered
/// column payloads and the chunk's on-disk length.
pub(crate) fn decode_chunk(
    schema: &Schema,
    buf: &[u8],
    ordinal: usize,
) -> Result<(Vec<ColumnData>, ChunkInfo)> {
    let corrupt = |msg: String| -> Error {
        let prefix = format!("{}:{}", file!(), line!());
        Error::CorruptChunk(prefix, ordinal, msg)
    };

    let info = scan_chunk(schema, buf, ordinal)?;

    let crc_off = info.total_len - 4;
    let mut off = crc_off;
    let crc = util::read_u32(buf, &mut off).unwrap();
    let computed = util::crc32(&buf[..crc_off]);
    if crc != computed {
        return Err(corrupt(format!("crc {:x} != {:x}", crc, computed)));
    }

    let rows = util::to_usize(info.row_count)?;
    let mut datas = Vec::with_capacity(schema.len());
    for (i, field) in schema.fields().iter().enumerate() {
        let (off, len) = info.col_offsets[i];
        let flag = info.codec_flags[i];
        let data = decode_column(field.kind, &buf[off..off + len], flag, rows)
            .map_err(|err| corrupt(format!("column {}: {}", field.name, err)))?;
        datas.push(data);
    }

    Ok((datas, info))
}

pub(crate) fn decode_column(
    kind: ColumnType,
    bytes: &[u8],
    flag: u8,
    rows: usize,
) -> Result<ColumnData> {
    let data = match kind {
        ColumnType::Int32 => ColumnData::I32(match flag {
            codec::CODEC_DELTA => codec::delta_decode_i32(bytes, rows)?,
            codec::CODEC_RLE => codec::rle_decode_i32(bytes, rows)?,
            _ => raw_decode_i32(bytes, rows)?,
        }),
        ColumnType::Int64 => ColumnData::I64(match flag {
            codec::CODEC_DELTA => codec::delta_decode_i64(bytes, rows)?,
            codec::CODEC_RLE => codec::rle_decode_i64(bytes, rows)?,
            _ => raw_decode_i64(bytes, rows)?,
        }),
        ColumnType::Float32 => {
            let mut vals = Vec::with_capacity(rows);
            for i in 0..rows {
                let mut scratch = [0_u8; 4];
                scratch.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
                vals.push(f32::from_le_bytes(scratch));
            }
            ColumnData::F32(vals)
        }
        ColumnType::Float64 => {
            let mut vals = Vec::with_capacity(rows);
            for i in 0..rows {
                let mut scratch = [0_u8; 8];
                scratch.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
                vals.push(f64::from_le_bytes(scratch));
            }
            ColumnData::F64(vals)
        }
        ColumnType::Str => ColumnData::Code(match flag {
            codec::CODEC_RLE => codec::rle_decode_u32(bytes, rows)?,
            _ => raw_decode_u32(bytes, rows)?,
        }),
    };
    Ok(data)
}

macro_rules! impl_raw_decode {
    ($name:ident, $ty:ty, $width:expr) => {
        fn $name(bytes: &[u8], rows: usize) -> Result<Vec<$ty>> {
            if bytes.len() < rows * $width {
                err_at!(InvalidInput, msg: "short raw payload {}", bytes.len())?;
            }
            let mut vals = Vec::with_capacity(rows);
            for i in 0..rows {
                let mut scratch = [0_u8; $width];
                scratch.copy_from_slice(&bytes[i * $width..(i + 1) * $width]);
                vals.push(<$ty>::from_le_bytes(scratch));
            }
            Ok(vals)
        }
    };
}

impl_raw_decode!(raw_decode_i32, i32, 4);
impl_raw_decode!(raw_decode_i64, i64, 8);
impl_raw_decode!(raw_decode_u32, u32, 4);

#[cfg(test)]
#[path = "chunk_test.rs"]
mod chunk_test;
