//! Module implement a read-only memory-mapped pool over `.ndts` files.
//!
//! [Pool::init] maps one file per symbol under a base directory and scans
//! each file's chunk directory once. [Pool::get_column] hands out
//! [ColumnView] values, typed views over the mapped bytes: raw column
//! payloads are read in place, zero copy, and repeated access to the same
//! file+column shares the same backing map. Compressed payloads are
//! decoded into an owned buffer, for those the shared-backing guarantee is
//! best effort. The same applies when mapping fails and the pool falls
//! back to a buffered read of the file.
//!
//! Views borrow nothing, they hold a reference-counted handle on the
//! backing map; dropping the pool unmaps once the last view goes.
//!
//! [MergeStream] merge-scans several symbols ordered by a shared timestamp
//! column, yielding rows in nondecreasing timestamp order, ties broken by
//! symbol ordinal.

use log::{debug, warn};
use memmap2::Mmap;

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    ffi, fs, path,
    sync::Arc,
};

use crate::{
    codec,
    ndts::{self, ChunkInfo, Header},
    table::{ColumnData, StrDict},
    util,
    value::{ColumnType, Value},
    Error, Result,
};

#[derive(Clone)]
enum Backing {
    Mapped(Arc<Mmap>),
    Buffered(Arc<Vec<u8>>),
}

impl Backing {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Buffered(buf) => &buf[..],
        }
    }

    // identity of the backing allocation, same id means same bytes.
    fn id(&self) -> usize {
        self.as_bytes().as_ptr() as usize
    }
}

struct Mapped {
    symbol: String,
    header: Header,
    backing: Backing,
    chunks: Vec<ChunkInfo>,
    dicts: Vec<Option<Arc<StrDict>>>,
}

/// Read-only pool of memory-mapped `.ndts` files, one per symbol.
pub struct Pool {
    dir: ffi::OsString,
    mapped: Vec<Mapped>,
    by_symbol: HashMap<String, usize>,
}

impl Pool {
    /// Map `dir/{symbol}.ndts` for every symbol. Headers are decoded and
    /// chunk directories scanned once, up front.
    pub fn init(dir: &ffi::OsStr, symbols: &[&str]) -> Result<Pool> {
        let mut mapped = vec![];
        let mut by_symbol = HashMap::new();

        for symbol in symbols {
            let loc = ndts::to_table_location(dir, symbol);
            let fd = util::files::open_file_r(&loc)?;
            let backing = match unsafe { Mmap::map(&fd) } {
                Ok(mmap) => Backing::Mapped(Arc::new(mmap)),
                Err(err) => {
                    warn!(target: "mmap", "mmap {:?}: {}, buffered fallback", loc, err);
                    let buf = err_at!(IOError, fs::read(path::Path::new(&loc)))?;
                    Backing::Buffered(Arc::new(buf))
                }
            };

            let buf = backing.as_bytes();
            let (header, header_len) = Header::decode(buf)?;
            let mut chunks = vec![];
            let mut off = header_len;
            for ordinal in 0..header.chunk_count as usize {
                let mut info = ndts::scan_chunk(&header.schema, &buf[off..], ordinal)?;
                info.fpos = off as u64;
                off += info.total_len;
                chunks.push(info);
            }

            let dicts = header
                .schema
                .fields()
                .iter()
                .map(|f| match f.kind {
                    ColumnType::Str => {
                        let strings =
                            header.dicts.get(&f.name).cloned().unwrap_or_default();
                        Some(Arc::new(StrDict::from_strings(strings)))
                    }
                    _ => None,
                })
                .collect();

            debug!(
                target: "mmap",
                "mapped {:?} rows:{} chunks:{}", loc, header.total_rows, chunks.len()
            );

            by_symbol.insert(symbol.to_string(), mapped.len());
            mapped.push(Mapped {
                symbol: symbol.to_string(),
                header,
                backing,
                chunks,
                dicts,
            });
        }

        Ok(Pool { dir: dir.to_os_string(), mapped, by_symbol })
    }

    pub fn as_dir(&self) -> &ffi::OsStr {
        &self.dir
    }

    pub fn get_symbols(&self) -> Vec<String> {
        self.mapped.iter().map(|m| m.symbol.clone()).collect()
    }

    fn mapped(&self, symbol: &str) -> Result<&Mapped> {
        match self.by_symbol.get(symbol) {
            Some(i) => Ok(&self.mapped[*i]),
            None => err_at!(InvalidInput, msg: "unknown symbol {}", symbol),
        }
    }

    pub fn header(&self, symbol: &str) -> Result<&Header> {
        Ok(&self.mapped(symbol)?.header)
    }

    pub fn len_of(&self, symbol: &str) -> Result<usize> {
        util::to_usize(self.mapped(symbol)?.header.total_rows)
    }

    /// Typed view over `column` of `symbol`. Raw payload segments read the
    /// mapped bytes in place; compressed segments are decoded once, here.
    pub fn get_column(&self, symbol: &str, column: &str) -> Result<ColumnView> {
        let mapped = self.mapped(symbol)?;
        let pos = match mapped.header.schema.position(column) {
            Some(pos) => pos,
            None => err_at!(ColumnMissing, msg: "{} in {}", column, symbol)?,
        };
        let kind = mapped.header.schema.fields()[pos].kind;

        let buf = mapped.backing.as_bytes();
        let mut parts = vec![];
        let mut start = 0_usize;
        for (ordinal, info) in mapped.chunks.iter().enumerate() {
            let rows = util::to_usize(info.row_count)?;
            let (rel, len) = info.col_offsets[pos];
            let off = util::to_usize(info.fpos)? + rel;
            let flag = info.codec_flags[pos];

            let kind_part = match flag {
                codec::CODEC_RAW => PartKind::Raw { off },
                _ => {
                    let bytes = &buf[off..off + len];
                    let data = ndts::decode_column(kind, bytes, flag, rows)
                        .map_err(|e| {
                            Error::CorruptChunk(
                                format!("{}:{}", file!(), line!()),
                                ordinal,
                                format!("{}", e),
                            )
                        })?;
                    PartKind::Owned(data)
                }
            };
            parts.push(Part { start, rows, kind: kind_part });
            start += rows;
        }

        Ok(ColumnView {
            kind,
            len: start,
            backing: mapped.backing.clone(),
            parts,
            dict: mapped.dicts[pos].clone(),
        })
    }

    /// Unmap everything. Outstanding views keep their backing alive until
    /// dropped.
    pub fn close(self) {}
}

struct Part {
    start: usize,
    rows: usize,
    kind: PartKind,
}

enum PartKind {
    Raw { off: usize },
    Owned(ColumnData),
}

/// Read-only linear view over one column of one mapped file. Indexing is
/// 0-based over the file's full row count.
pub struct ColumnView {
    kind: ColumnType,
    len: usize,
    backing: Backing,
    parts: Vec<Part>,
    dict: Option<Arc<StrDict>>,
}

impl ColumnView {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn to_kind(&self) -> ColumnType {
        self.kind
    }

    // same id as another view means both read the same mapped bytes.
    pub(crate) fn backing_id(&self) -> usize {
        self.backing.id()
    }

    fn part_of(&self, row: usize) -> Option<&Part> {
        if row >= self.len {
            return None;
        }
        let at = match self.parts.binary_search_by(|p| p.start.cmp(&row)) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Some(&self.parts[at])
    }

    fn raw_at(&self, off: usize, i: usize) -> Value {
        let width = self.kind.width();
        let bytes = &self.backing.as_bytes()[off + i * width..off + (i + 1) * width];
        match self.kind {
            ColumnType::Int32 => {
                Value::I32(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            ColumnType::Int64 => {
                let mut scratch = [0_u8; 8];
                scratch.copy_from_slice(bytes);
                Value::I64(i64::from_le_bytes(scratch))
            }
            ColumnType::Float32 => {
                Value::F32(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            ColumnType::Float64 => {
                let mut scratch = [0_u8; 8];
                scratch.copy_from_slice(bytes);
                Value::F64(f64::from_le_bytes(scratch))
            }
            ColumnType::Str => {
                let code = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                match self.dict.as_ref().and_then(|d| d.lookup(code)) {
                    Some(s) => Value::Str(s.to_string()),
                    None => Value::Null,
                }
            }
        }
    }

    fn owned_at(&self, data: &ColumnData, i: usize) -> Value {
        match data {
            ColumnData::I32(v) => Value::I32(v[i]),
            ColumnData::I64(v) => Value::I64(v[i]),
            ColumnData::F32(v) => Value::F32(v[i]),
            ColumnData::F64(v) => Value::F64(v[i]),
            ColumnData::Code(v) => match self.dict.as_ref().and_then(|d| d.lookup(v[i])) {
                Some(s) => Value::Str(s.to_string()),
                None => Value::Null,
            },
        }
    }

    pub fn get(&self, row: usize) -> Option<Value> {
        let part = self.part_of(row)?;
        let i = row - part.start;
        let val = match &part.kind {
            PartKind::Raw { off } => self.raw_at(*off, i),
            PartKind::Owned(data) => self.owned_at(data, i),
        };
        Some(val)
    }

    pub fn get_i64(&self, row: usize) -> Option<i64> {
        self.get(row)?.as_i64()
    }

    pub fn get_f64(&self, row: usize) -> Option<f64> {
        self.get(row)?.as_f64()
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len).map(move |row| self.get(row).unwrap_or(Value::Null))
    }
}

/// Merge-scan over several symbols, ordered by a shared timestamp column.
///
/// Yields `(symbol ordinal, row, timestamp)` triples in nondecreasing
/// timestamp order; equal timestamps come out in symbol-ordinal order. The
/// ordinal indexes the `symbols` slice passed to [MergeStream::new].
pub struct MergeStream {
    views: Vec<ColumnView>,
    heap: BinaryHeap<Reverse<(i64, usize, usize)>>,
}

impl MergeStream {
    pub fn new(pool: &Pool, symbols: &[&str], ts_column: &str) -> Result<MergeStream> {
        let mut views = vec![];
        for symbol in symbols {
            let view = pool.get_column(symbol, ts_column)?;
            if !view.to_kind().is_integer() {
                err_at!(InvalidInput, msg: "{} is not an integer column", ts_column)?;
            }
            views.push(view);
        }

        let mut heap = BinaryHeap::new();
        for (ordinal, view) in views.iter().enumerate() {
            if let Some(ts) = view.get_i64(0) {
                heap.push(Reverse((ts, ordinal, 0)));
            }
        }

        Ok(MergeStream { views, heap })
    }
}

impl Iterator for MergeStream {
    type Item = (usize, usize, i64);

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((ts, ordinal, row)) = self.heap.pop()?;
        if let Some(next_ts) = self.views[ordinal].get_i64(row + 1) {
            self.heap.push(Reverse((next_ts, ordinal, row + 1)));
        }
        Some((ordinal, row, ts))
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
