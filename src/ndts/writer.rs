use fs2::FileExt;
use log::{debug, info, warn};

use std::{
    collections::BTreeMap,
    ffi, fmt, fs,
    io::{Read, Seek, SeekFrom},
    path, result,
};

use crate::{
    index::RowSet,
    ndts::{self, chunk, files, header::Header, tombstone, ChunkInfo, Config},
    read_file,
    schema::Schema,
    table::{columnize, ColumnBuffer, ColumnData, ColumnarTable, Record, StrDict},
    util, write_file, Result,
};

/// Single-writer append handle over one `.ndts` file.
///
/// The writer owns its file exclusively, guarded by an advisory lock; a
/// second writer on the same path fails fast. Reopening an existing file
/// reloads the header and dictionaries, further appends extend both chunks
/// and dictionaries without renumbering existing codes.
pub struct AppendWriter {
    name: String,
    loc: ffi::OsString,
    config: Config,

    fd: fs::File,
    header: Header,
    header_len: usize,
    dicts: Vec<Option<StrDict>>,
    chunks: Vec<ChunkInfo>,
    end_fpos: u64,
    tomb: RowSet,
    writes_since_compact: u64,
}

impl fmt::Display for AppendWriter {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "AppendWriter<{:?}>", self.loc)
    }
}

/// Running totals for one writer, drives the auto-compact policy.
#[derive(Clone, Debug)]
pub struct Stats {
    pub total_rows: u64,
    pub chunk_count: u32,
    pub deleted_count: usize,
    pub file_size: u64,
    pub writes_since_compact: u64,
}

/// Outcome of [delete_where].
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteStat {
    pub before_rows: u64,
    pub after_rows: u64,
    pub deleted_rows: u64,
}

/// Options for the batch-rewrite operations.
#[derive(Clone, Debug)]
pub struct RewriteOpts {
    /// Rows per chunk in the rewritten file.
    pub batch_size: usize,
    pub fsync: bool,
}

impl Default for RewriteOpts {
    fn default() -> RewriteOpts {
        RewriteOpts { batch_size: ndts::BATCH_SIZE, fsync: false }
    }
}

/// Read-only integrity report, see [verify].
#[derive(Clone, Debug, Default)]
pub struct Verify {
    pub ok: bool,
    pub errors: Vec<String>,
    pub chunks: Vec<ChunkStat>,
    pub total_rows: u64,
}

#[derive(Clone, Debug)]
pub struct ChunkStat {
    pub ordinal: usize,
    pub fpos: u64,
    pub rows: u32,
    pub len: usize,
}

impl AppendWriter {
    /// Open a writer for table `name` under `dir`. The file is created
    /// with `schema` when missing; otherwise the on-disk schema must be
    /// compatible, same column names, types and order.
    pub fn open(
        dir: &ffi::OsStr,
        name: &str,
        schema: Schema,
        config: Config,
    ) -> Result<AppendWriter> {
        let loc = files::to_table_location(dir, name);
        AppendWriter::open_at(&loc, name, schema, config)
    }

    fn open_at(
        loc: &ffi::OsStr,
        name: &str,
        schema: Schema,
        config: Config,
    ) -> Result<AppendWriter> {
        // a leftover temp file means a rewrite crashed before its rename,
        // the original file is authoritative.
        util::files::remove_file(&files::to_temp_location(loc))?;

        let (fd, header, header_len, chunks, end_fpos) = if path::Path::new(loc).exists()
        {
            let state = load_state(loc, Some(&schema))?;
            debug!(
                target: "ndts",
                "reopened {:?} rows:{} chunks:{}",
                loc, state.1.total_rows, state.1.chunk_count
            );
            state
        } else {
            let mut header = Header::new(schema);
            header.dict_reserve = ndts::DICT_RESERVE;
            let buf = header.encode()?;
            let mut fd = util::files::create_file_rw(loc)?;
            util::files::sync_write(&mut fd, &buf)?;
            let header_len = buf.len();
            debug!(target: "ndts", "created {:?}", loc);
            (fd, header, header_len, vec![], header_len as u64)
        };

        err_at!(IOError, fd.try_lock_exclusive(), "concurrent writer on {:?}", loc)?;

        let dicts = dicts_from_header(&header);
        let tomb = tombstone::load(loc)?;

        Ok(AppendWriter {
            name: name.to_string(),
            loc: loc.to_os_string(),
            config,
            fd,
            header,
            header_len,
            dicts,
            chunks,
            end_fpos,
            tomb,
            writes_since_compact: 0,
        })
    }

    pub fn to_name(&self) -> String {
        self.name.clone()
    }

    pub fn to_location(&self) -> ffi::OsString {
        self.loc.clone()
    }

    pub fn as_schema(&self) -> &Schema {
        &self.header.schema
    }

    pub fn stats(&self) -> Stats {
        Stats {
            total_rows: self.header.total_rows,
            chunk_count: self.header.chunk_count,
            deleted_count: self.tomb.len(),
            file_size: self.end_fpos,
            writes_since_compact: self.writes_since_compact,
        }
    }

    pub fn deleted_count(&self) -> usize {
        self.tomb.len()
    }

    /// Append `records` as one chunk, returns the chunk's ordinal. The
    /// chunk, including its CRC, is fully written before the header is
    /// updated; a crash in between leaves trailing bytes that the next
    /// open truncates.
    pub fn append(&mut self, records: &[Record]) -> Result<u32> {
        if records.is_empty() {
            return Ok(self.header.chunk_count);
        }

        let mut dicts = self.dicts.clone();
        let datas = columnize(&self.header.schema, records, &mut dicts)?;
        let refs: Vec<&ColumnData> = datas.iter().collect();
        let buf = chunk::encode_chunk(&refs)?;

        let ordinal = self.chunks.len();
        err_at!(IOError, self.fd.seek(SeekFrom::Start(self.end_fpos)))?;
        write_file!(self.fd, &buf, &self.loc, "ndts chunk")?;
        if self.config.fsync {
            err_at!(IOError, self.fd.sync_all())?;
        }

        let mut info = chunk::scan_chunk(&self.header.schema, &buf, ordinal)?;
        info.fpos = self.end_fpos;

        self.header.total_rows += records.len() as u64;
        self.header.chunk_count += 1;
        self.header.dicts = dicts_to_header(&self.header.schema, &dicts);
        self.dicts = dicts;
        self.end_fpos += buf.len() as u64;
        self.chunks.push(info);
        self.writes_since_compact += records.len() as u64;

        self.write_header()?;

        debug!(
            target: "ndts",
            "{} appended chunk {} with {} rows", self, ordinal, records.len()
        );
        Ok(ordinal as u32)
    }

    // rewrite the header region in place; grows the dictionary reserve by
    // rewriting the whole file when the dictionaries no longer fit.
    fn write_header(&mut self) -> Result<()> {
        let json_len = self.header.dicts_json_len()?;
        if json_len > self.header.dict_reserve {
            return self.grow_reserve(json_len * 2);
        }

        let buf = self.header.encode()?;
        if buf.len() != self.header_len {
            err_at!(Fatal, msg: "header {} != {}", buf.len(), self.header_len)?;
        }
        err_at!(IOError, self.fd.seek(SeekFrom::Start(0)))?;
        write_file!(self.fd, &buf, &self.loc, "ndts header")?;
        if self.config.fsync {
            err_at!(IOError, self.fd.sync_all())?;
        }

        Ok(())
    }

    fn grow_reserve(&mut self, reserve: usize) -> Result<()> {
        info!(
            target: "ndts",
            "{} dictionary reserve grows {} -> {}", self, self.header.dict_reserve, reserve
        );

        let chunk_bytes = {
            let n = self.end_fpos - self.header_len as u64;
            err_at!(IOError, self.fd.seek(SeekFrom::Start(self.header_len as u64)))?;
            let mut buf = vec![0_u8; util::to_usize(n)?];
            err_at!(IOError, self.fd.read_exact(&mut buf))?;
            buf
        };

        let old_header_len = self.header_len;
        self.header.dict_reserve = reserve;
        let header_bytes = self.header.encode()?;

        let temp = files::to_temp_location(&self.loc);
        util::files::remove_file(&temp)?;
        let mut fd = util::files::create_file_rw(&temp)?;
        util::files::sync_write(&mut fd, &header_bytes)?;
        util::files::sync_write(&mut fd, &chunk_bytes)?;
        util::files::commit_file(&temp, &self.loc)?;

        // the rename replaced the inode, move the lock to the new file.
        self.fd = util::files::open_file_rw(&self.loc)?;
        err_at!(IOError, self.fd.try_lock_exclusive(), "relock {:?}", self.loc)?;

        self.header_len = header_bytes.len();
        let delta = self.header_len as u64 - old_header_len as u64;
        for info in self.chunks.iter_mut() {
            info.fpos += delta;
        }
        self.end_fpos += delta;

        Ok(())
    }

    /// Logical delete: add matching rows to the tombstone sidecar. Returns
    /// the number of rows newly tombstoned. Read paths that honor
    /// tombstones skip them, [AppendWriter::compact] removes them.
    pub fn delete_where_with_tombstone<F>(&mut self, mut pred: F) -> Result<usize>
    where
        F: FnMut(&Record) -> bool,
    {
        let (_, table) = read_all(&self.loc)?;

        let mut count = 0;
        for row in 0..table.len() {
            let ordinal = row as u32;
            if self.tomb.contains(ordinal) {
                continue;
            }
            if pred(&table.record_at(row)?) {
                self.tomb.add(ordinal);
                count += 1;
            }
        }

        if count > 0 {
            tombstone::save(&self.loc, &self.tomb)?;
        }
        debug!(target: "ndts", "{} tombstoned {} rows", self, count);

        Ok(count)
    }

    /// Like [read_all] but skips tombstoned rows.
    pub fn read_all_filtered(&self) -> Result<ColumnarTable> {
        let (_, table) = read_all(&self.loc)?;
        if self.tomb.is_empty() {
            return Ok(table);
        }

        let schema = table.as_schema().clone();
        let keep = table.len() - self.tomb.len();
        let mut filtered = ColumnarTable::with_capacity(schema, std::cmp::max(keep, 1));
        for row in 0..table.len() {
            if self.tomb.contains(row as u32) {
                continue;
            }
            filtered.append(&table.record_at(row)?)?;
        }

        Ok(filtered)
    }

    /// Rewrite the file dropping tombstoned rows, then clear the sidecar.
    /// Crash safe: temp file, fsync, rename, sidecar unlink - recovery
    /// sees either the old pair or the new compacted file without sidecar.
    pub fn compact(&mut self) -> Result<DeleteStat> {
        let opts = RewriteOpts {
            batch_size: self.config.batch_size,
            fsync: self.config.fsync,
        };
        let stat = rewrite(&self.loc, &self.name, opts, |_, _| Ok(KeepRow::Keep))?;

        info!(
            target: "ndts",
            "{} compacted {} -> {} rows", self, stat.before_rows, stat.after_rows
        );

        self.reload()?;
        self.writes_since_compact = 0;

        Ok(stat)
    }

    // re-read header and chunk directory after a rewrite replaced the file.
    fn reload(&mut self) -> Result<()> {
        let (fd, header, header_len, chunks, end_fpos) = load_state(&self.loc, None)?;
        err_at!(IOError, fd.try_lock_exclusive(), "relock {:?}", self.loc)?;

        self.fd = fd;
        self.dicts = dicts_from_header(&header);
        self.header = header;
        self.header_len = header_len;
        self.chunks = chunks;
        self.end_fpos = end_fpos;
        self.tomb = tombstone::load(&self.loc)?;

        Ok(())
    }

    fn should_compact(&self) -> bool {
        let stats = self.stats();
        let config = &self.config;

        let ratio = match stats.total_rows {
            0 => 0.0,
            n => stats.deleted_count as f64 / n as f64,
        };
        (stats.total_rows >= config.compact_min_rows && ratio >= config.compact_threshold)
            || stats.chunk_count > config.compact_max_chunks
            || stats.writes_since_compact > config.compact_max_writes
            || stats.file_size > config.compact_max_file_size
    }

    /// Flush and close the writer. When [Config::auto_compact] is set and
    /// any compaction threshold holds, the file is compacted first.
    pub fn close(mut self) -> Result<()> {
        if self.config.auto_compact && self.should_compact() {
            info!(target: "ndts", "{} auto-compacting on close", self);
            self.compact()?;
        }
        err_at!(IOError, self.fd.sync_all())?;
        // advisory lock is released when fd drops.
        Ok(())
    }
}

// (fd, header, header_len, chunk directory, end of committed data)
#[allow(clippy::type_complexity)]
fn load_state(
    loc: &ffi::OsStr,
    schema: Option<&Schema>,
) -> Result<(fs::File, Header, usize, Vec<ChunkInfo>, u64)> {
    let mut fd = util::files::open_file_rw(loc)?;
    let buf = {
        let mut buf = vec![];
        err_at!(IOError, fd.seek(SeekFrom::Start(0)))?;
        err_at!(IOError, fd.read_to_end(&mut buf))?;
        buf
    };

    let (header, header_len) = Header::decode(&buf)?;
    if let Some(schema) = schema {
        header.schema.check_compatible(schema)?;
    }

    let mut chunks = vec![];
    let mut off = header_len;
    let mut rows = 0_u64;
    for ordinal in 0..header.chunk_count as usize {
        let mut info = chunk::scan_chunk(&header.schema, &buf[off..], ordinal)?;
        info.fpos = off as u64;
        rows += info.row_count as u64;
        off += info.total_len;
        chunks.push(info);
    }
    if rows != header.total_rows {
        err_at!(CorruptHeader, msg: "rows {} != {} in {:?}", rows, header.total_rows, loc)?;
    }

    if off < buf.len() {
        warn!(
            target: "ndts",
            "{:?} has {} uncommitted trailing bytes, truncating", loc, buf.len() - off
        );
        err_at!(IOError, fd.set_len(off as u64))?;
    }

    Ok((fd, header, header_len, chunks, off as u64))
}

fn dicts_from_header(header: &Header) -> Vec<Option<StrDict>> {
    header
        .schema
        .fields()
        .iter()
        .map(|f| match f.kind {
            crate::value::ColumnType::Str => {
                let strings = header.dicts.get(&f.name).cloned().unwrap_or_default();
                Some(StrDict::from_strings(strings))
            }
            _ => None,
        })
        .collect()
}

fn dicts_to_header(
    schema: &Schema,
    dicts: &[Option<StrDict>],
) -> BTreeMap<String, Vec<String>> {
    let mut map = BTreeMap::new();
    for (field, dict) in schema.fields().iter().zip(dicts.iter()) {
        if let Some(dict) = dict {
            map.insert(field.name.clone(), dict.as_strings().to_vec());
        }
    }
    map
}

fn record_from(
    schema: &Schema,
    datas: &[ColumnData],
    dicts: &[Option<StrDict>],
    row: usize,
) -> Result<Record> {
    let mut record = Record::new();
    for (i, field) in schema.fields().iter().enumerate() {
        let val = match &datas[i] {
            ColumnData::I32(v) => crate::value::Value::I32(v[row]),
            ColumnData::I64(v) => crate::value::Value::I64(v[row]),
            ColumnData::F32(v) => crate::value::Value::F32(v[row]),
            ColumnData::F64(v) => crate::value::Value::F64(v[row]),
            ColumnData::Code(v) => {
                let dict = match dicts[i].as_ref() {
                    Some(dict) => dict,
                    None => err_at!(Fatal, msg: "no dict for {}", field.name)?,
                };
                match dict.lookup(v[row]) {
                    Some(s) => crate::value::Value::Str(s.to_string()),
                    None => err_at!(Fatal, msg: "dangling code {}", v[row])?,
                }
            }
        };
        record.set(&field.name, val);
    }
    Ok(record)
}

/// Sequentially read `file`, validating header and chunk CRCs, and return
/// the header with the concatenation of all chunks as one in-memory table.
/// A bad chunk fails with [Error::CorruptChunk] carrying its ordinal.
pub fn read_all(file: &ffi::OsStr) -> Result<(Header, ColumnarTable)> {
    let buf = {
        let mut fd = util::files::open_file_r(file)?;
        let mut buf = vec![];
        err_at!(IOError, fd.read_to_end(&mut buf))?;
        buf
    };

    let (header, header_len) = Header::decode(&buf)?;
    let dicts = dicts_from_header(&header);

    let mut columns: Vec<ColumnData> = header
        .schema
        .fields()
        .iter()
        .map(|f| ColumnData::empty(f.kind))
        .collect();

    let mut off = header_len;
    let mut rows = 0_usize;
    for ordinal in 0..header.chunk_count as usize {
        let (datas, info) = chunk::decode_chunk(&header.schema, &buf[off..], ordinal)?;
        for (column, data) in columns.iter_mut().zip(datas.iter()) {
            column.extend(data)?;
        }
        rows += util::to_usize(info.row_count)?;
        off += info.total_len;
    }
    if rows as u64 != header.total_rows {
        err_at!(CorruptHeader, msg: "rows {} != {}", rows, header.total_rows)?;
    }

    let buffers: Vec<ColumnBuffer> = header
        .schema
        .fields()
        .iter()
        .zip(columns.into_iter())
        .zip(dicts.into_iter())
        .map(|((field, data), dict)| ColumnBuffer::from_parts(field.kind, data, dict))
        .collect();

    let table = ColumnarTable::from_parts(header.schema.clone(), buffers, rows);
    Ok((header, table))
}

/// Decode only the header of `file`, reading as few bytes as possible.
/// Partition discovery uses this to avoid touching chunk data.
pub fn read_header(file: &ffi::OsStr) -> Result<Header> {
    let mut fd = util::files::open_file_r(file)?;
    let flen = util::to_usize(err_at!(IOError, fd.metadata())?.len())?;

    let mut n = std::cmp::min(16 * 1024, flen);
    loop {
        let buf = read_file!(fd, SeekFrom::Start(0), n, "ndts header")?;
        match Header::decode(&buf) {
            Ok((header, _)) => break Ok(header),
            Err(err) if n >= flen => break Err(err),
            Err(_) => n = std::cmp::min(n * 4, flen),
        }
    }
}

/// Like [read_all] but drops rows present in the tombstone sidecar.
pub fn read_filtered(file: &ffi::OsStr) -> Result<(Header, ColumnarTable)> {
    let (header, table) = read_all(file)?;
    let tomb = tombstone::load(file)?;
    if tomb.is_empty() {
        return Ok((header, table));
    }

    let keep = table.len() - tomb.len();
    let mut filtered =
        ColumnarTable::with_capacity(header.schema.clone(), std::cmp::max(keep, 1));
    for row in 0..table.len() {
        if tomb.contains(row as u32) {
            continue;
        }
        filtered.append(&table.record_at(row)?)?;
    }

    Ok((header, filtered))
}

/// Read-only integrity pass. Never fails, problems land in
/// [Verify::errors]; a structurally sound chunk with a bad CRC is reported
/// and the pass continues with the next chunk.
pub fn verify(file: &ffi::OsStr) -> Verify {
    let mut report = Verify { ok: true, ..Verify::default() };

    let buf = {
        let fd = util::files::open_file_r(file);
        match fd {
            Ok(mut fd) => {
                let mut buf = vec![];
                match fd.read_to_end(&mut buf) {
                    Ok(_) => buf,
                    Err(err) => {
                        report.ok = false;
                        report.errors.push(format!("read: {}", err));
                        return report;
                    }
                }
            }
            Err(err) => {
                report.ok = false;
                report.errors.push(format!("{}", err));
                return report;
            }
        }
    };

    let (header, header_len) = match Header::decode(&buf) {
        Ok((header, n)) => (header, n),
        Err(err) => {
            report.ok = false;
            report.errors.push(format!("{}", err));
            return report;
        }
    };
    report.total_rows = header.total_rows;

    let mut off = header_len;
    let mut rows = 0_u64;
    for ordinal in 0..header.chunk_count as usize {
        let info = match chunk::scan_chunk(&header.schema, &buf[off..], ordinal) {
            Ok(info) => info,
            Err(err) => {
                // cannot locate further chunks once the structure is gone.
                report.ok = false;
                report.errors.push(format!("{}", err));
                return report;
            }
        };

        match chunk::decode_chunk(&header.schema, &buf[off..], ordinal) {
            Ok(_) => report.chunks.push(ChunkStat {
                ordinal,
                fpos: off as u64,
                rows: info.row_count,
                len: info.total_len,
            }),
            Err(err) => {
                report.ok = false;
                report.errors.push(format!("{}", err));
            }
        }

        rows += info.row_count as u64;
        off += info.total_len;
    }

    if rows != header.total_rows {
        report.ok = false;
        report.errors.push(format!("rows {} != header {}", rows, header.total_rows));
    }

    report
}

enum KeepRow {
    Keep,
    Drop,
    Replace(Record),
}

// shared rewrite machinery: stream surviving rows into a temp file in
// batch_size chunks, then atomically swap it in and drop the sidecar.
// tombstoned rows are always dropped.
fn rewrite<F>(
    file: &ffi::OsStr,
    name: &str,
    opts: RewriteOpts,
    mut keep: F,
) -> Result<DeleteStat>
where
    F: FnMut(u64, &Record) -> Result<KeepRow>,
{
    let buf = {
        let mut fd = util::files::open_file_r(file)?;
        let mut buf = vec![];
        err_at!(IOError, fd.read_to_end(&mut buf))?;
        buf
    };
    let (header, header_len) = Header::decode(&buf)?;
    let dicts = dicts_from_header(&header);
    let tomb = tombstone::load(file)?;

    let temp = files::to_temp_location(file);
    util::files::remove_file(&temp)?;
    let config = {
        let mut config = Config::new();
        config
            .set_batch_size(opts.batch_size)
            .set_fsync(opts.fsync)
            .set_auto_compact(false);
        config
    };
    let mut writer = AppendWriter::open_at(&temp, name, header.schema.clone(), config)?;

    let mut batch: Vec<Record> = Vec::with_capacity(opts.batch_size);
    let (mut ordinal, mut kept) = (0_u64, 0_u64);
    let mut off = header_len;
    for chunk_ordinal in 0..header.chunk_count as usize {
        let (datas, info) = chunk::decode_chunk(&header.schema, &buf[off..], chunk_ordinal)?;
        off += info.total_len;

        for row in 0..util::to_usize(info.row_count)? {
            let dropped = tomb.contains(ordinal as u32);
            if !dropped {
                let record = record_from(&header.schema, &datas, &dicts, row)?;
                match keep(ordinal, &record)? {
                    KeepRow::Keep => batch.push(record),
                    KeepRow::Replace(record) => batch.push(record),
                    KeepRow::Drop => (),
                }
            }
            ordinal += 1;

            if batch.len() >= opts.batch_size {
                kept += batch.len() as u64;
                writer.append(&batch)?;
                batch.clear();
            }
        }
    }
    if !batch.is_empty() {
        kept += batch.len() as u64;
        writer.append(&batch)?;
    }

    // release the temp file's lock before swapping it in.
    err_at!(IOError, writer.fd.sync_all())?;
    std::mem::drop(writer);

    util::files::commit_file(&temp, file)?;
    tombstone::unlink(file)?;

    Ok(DeleteStat {
        before_rows: header.total_rows,
        after_rows: kept,
        deleted_rows: header.total_rows - kept,
    })
}

/// Rewrite `file` dropping every row matching `pred`. Tombstoned rows are
/// dropped as well and the sidecar is cleared, rewrites renumber rows.
pub fn delete_where<F>(file: &ffi::OsStr, mut pred: F, opts: RewriteOpts) -> Result<DeleteStat>
where
    F: FnMut(&Record) -> bool,
{
    let name = rewrite_name(file);
    rewrite(file, &name, opts, |_, record| {
        Ok(match pred(record) {
            true => KeepRow::Drop,
            false => KeepRow::Keep,
        })
    })
}

/// Rewrite `file` replacing every row matching `pred` with
/// `transform(row)`. Returns `(total_rows, updated_rows)`.
pub fn update_where<F, T>(
    file: &ffi::OsStr,
    mut pred: F,
    mut transform: T,
    opts: RewriteOpts,
) -> Result<(u64, u64)>
where
    F: FnMut(&Record) -> bool,
    T: FnMut(&Record) -> Result<Record>,
{
    let name = rewrite_name(file);
    let mut updated = 0_u64;
    let stat = rewrite(file, &name, opts, |_, record| {
        Ok(match pred(record) {
            true => {
                updated += 1;
                KeepRow::Replace(transform(record)?)
            }
            false => KeepRow::Keep,
        })
    })?;

    Ok((stat.after_rows, updated))
}

fn rewrite_name(file: &ffi::OsStr) -> String {
    use std::convert::TryFrom;

    String::try_from(files::TableFileName(file.to_os_string()))
        .unwrap_or_else(|_| format!("{:?}", file))
}

/// Serialize a whole in-memory table as a single-chunk file, replacing any
/// previous file at `file`.
pub fn write_table(file: &ffi::OsStr, table: &ColumnarTable) -> Result<()> {
    let schema = table.as_schema().clone();

    let mut header = Header::new(schema.clone());
    header.total_rows = table.len() as u64;
    header.chunk_count = if table.is_empty() { 0 } else { 1 };
    header.dicts = dicts_to_header(&schema, &table.dicts());
    header.dict_reserve = std::cmp::max(ndts::DICT_RESERVE, header.dicts_json_len()?);

    let mut buf = header.encode()?;
    if !table.is_empty() {
        let datas: Vec<&ColumnData> =
            table.buffers().iter().map(|b| b.as_data()).collect();
        buf.extend_from_slice(&chunk::encode_chunk(&datas)?);
    }

    util::files::remove_file(file)?;
    let mut fd = util::files::create_file_rw(file)?;
    util::files::sync_write(&mut fd, &buf)?;

    Ok(())
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
