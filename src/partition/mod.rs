//! Module implement partitioned tables.
//!
//! A partitioned table is a directory whose leaves are `.ndts` files named
//! by partition label. Two partitioning schemes are supported,
//!
//! * time partitioning, rows are bucketed by a timestamp column into
//!   hour/day/week/month buckets; the label encodes the bucket start, so
//!   range queries prune whole partition files before reading anything.
//! * hash partitioning, rows are bucketed by `cityhash(column) % buckets`.
//!
//! Writers are opened lazily, one per touched partition, and cached until
//! [PartitionedTable::close_all], where the usual auto-compact policy of
//! [crate::ndts::Config] applies per partition file.

use chrono::{Datelike, TimeZone, Utc};
use log::debug;

use std::{
    collections::HashMap,
    convert::TryFrom,
    ffi, fs,
    hash::Hasher,
    path,
};

use crate::{
    ndts::{self, AppendWriter, TableFileName},
    schema::Schema,
    table::{ColumnarTable, Record},
    util::CityHasher,
    value::Value,
    Result,
};

/// Time bucket widths for time partitioning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interval {
    Hour,
    Day,
    Week,
    Month,
}

const MS_HOUR: i64 = 3_600_000;
const MS_DAY: i64 = 24 * MS_HOUR;

impl Interval {
    /// Label of the bucket holding `ts_ms`, encodes the bucket start.
    pub fn label_of(&self, ts_ms: i64) -> String {
        let secs = ts_ms.div_euclid(1000);
        let nanos = (ts_ms.rem_euclid(1000) * 1_000_000) as u32;
        let dt = Utc.timestamp(secs, nanos);

        match self {
            Interval::Hour => dt.format("%Y%m%d%H").to_string(),
            Interval::Day => dt.format("%Y%m%d").to_string(),
            Interval::Week => {
                let iso = dt.iso_week();
                format!("{:04}-W{:02}", iso.year(), iso.week())
            }
            Interval::Month => dt.format("%Y%m").to_string(),
        }
    }

    /// Bucket bounds `[start, end)` in epoch milliseconds for a label
    /// produced by [Interval::label_of].
    pub fn bounds_of(&self, label: &str) -> Result<(i64, i64)> {
        let digits = |s: &str| -> Result<i64> { err_at!(InvalidInput, s.parse::<i64>()) };

        let (start, end) = match self {
            Interval::Hour => {
                if label.len() != 10 {
                    err_at!(InvalidInput, msg: "bad hour label {}", label)?;
                }
                let (y, m, d, h) = (
                    digits(&label[0..4])?,
                    digits(&label[4..6])?,
                    digits(&label[6..8])?,
                    digits(&label[8..10])?,
                );
                let start = Utc
                    .ymd(y as i32, m as u32, d as u32)
                    .and_hms(h as u32, 0, 0)
                    .timestamp_millis();
                (start, start + MS_HOUR)
            }
            Interval::Day => {
                if label.len() != 8 {
                    err_at!(InvalidInput, msg: "bad day label {}", label)?;
                }
                let (y, m, d) =
                    (digits(&label[0..4])?, digits(&label[4..6])?, digits(&label[6..8])?);
                let start =
                    Utc.ymd(y as i32, m as u32, d as u32).and_hms(0, 0, 0).timestamp_millis();
                (start, start + MS_DAY)
            }
            Interval::Week => {
                let parts: Vec<&str> = label.splitn(2, "-W").collect();
                if parts.len() != 2 {
                    err_at!(InvalidInput, msg: "bad week label {}", label)?;
                }
                let (y, w) = (digits(parts[0])?, digits(parts[1])?);
                let date = chrono::NaiveDate::from_isoywd_opt(
                    y as i32,
                    w as u32,
                    chrono::Weekday::Mon,
                );
                let date = match date {
                    Some(date) => date,
                    None => err_at!(InvalidInput, msg: "bad week label {}", label)?,
                };
                let start = Utc
                    .ymd(date.year(), date.month(), date.day())
                    .and_hms(0, 0, 0)
                    .timestamp_millis();
                (start, start + 7 * MS_DAY)
            }
            Interval::Month => {
                if label.len() != 6 {
                    err_at!(InvalidInput, msg: "bad month label {}", label)?;
                }
                let (y, m) = (digits(&label[0..4])?, digits(&label[4..6])?);
                let start =
                    Utc.ymd(y as i32, m as u32, 1).and_hms(0, 0, 0).timestamp_millis();
                let (ny, nm) = match m {
                    12 => (y + 1, 1),
                    _ => (y, m + 1),
                };
                let end =
                    Utc.ymd(ny as i32, nm as u32, 1).and_hms(0, 0, 0).timestamp_millis();
                (start, end)
            }
        };

        Ok((start, end))
    }
}

/// Partitioning scheme, fixed for the life of a table directory.
#[derive(Clone, Debug)]
pub enum Scheme {
    Time { column: String, interval: Interval },
    Hash { column: String, buckets: u32 },
}

impl Scheme {
    pub fn time(column: &str, interval: Interval) -> Scheme {
        Scheme::Time { column: column.to_string(), interval }
    }

    pub fn hash(column: &str, buckets: u32) -> Scheme {
        Scheme::Hash { column: column.to_string(), buckets }
    }

    pub fn as_column(&self) -> &str {
        match self {
            Scheme::Time { column, .. } => column,
            Scheme::Hash { column, .. } => column,
        }
    }

    /// Partition label for one row.
    pub fn label_of(&self, record: &Record) -> Result<String> {
        let column = self.as_column();
        let val = match record.get(column) {
            Some(val) => val,
            None => err_at!(MissingField, msg: "column {}", column)?,
        };

        match self {
            Scheme::Time { interval, .. } => {
                let ts = match val.as_i64() {
                    Some(ts) => ts,
                    None => err_at!(TypeFail, msg: "{} is not a timestamp", val)?,
                };
                Ok(interval.label_of(ts))
            }
            Scheme::Hash { buckets, .. } => {
                Ok(format!("bucket-{}", value_digest(val)? % (*buckets as u64)))
            }
        }
    }
}

// stable digest for hash partitioning.
fn value_digest(val: &Value) -> Result<u64> {
    let mut hasher = CityHasher::new();
    match val {
        Value::I32(v) => hasher.write(&(*v as i64).to_le_bytes()),
        Value::I64(v) => hasher.write(&v.to_le_bytes()),
        Value::F32(v) => hasher.write(&(*v as f64).to_bits().to_le_bytes()),
        Value::F64(v) => hasher.write(&v.to_bits().to_le_bytes()),
        Value::Str(s) => hasher.write(s.as_bytes()),
        Value::Null => err_at!(InvalidInput, msg: "null partition key")?,
    }
    Ok(hasher.finish())
}

/// Discovered partition, label plus committed row count.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionInfo {
    pub label: String,
    pub rows: u64,
}

/// Table whose rows live in per-partition `.ndts` files under one base
/// directory.
pub struct PartitionedTable {
    dir: ffi::OsString,
    schema: Schema,
    scheme: Scheme,
    config: ndts::Config,
    writers: HashMap<String, AppendWriter>,
}

impl PartitionedTable {
    pub fn open(
        dir: &ffi::OsStr,
        schema: Schema,
        scheme: Scheme,
        config: ndts::Config,
    ) -> Result<PartitionedTable> {
        err_at!(IOError, fs::create_dir_all(path::Path::new(dir)))?;

        Ok(PartitionedTable {
            dir: dir.to_os_string(),
            schema,
            scheme,
            config,
            writers: HashMap::new(),
        })
    }

    pub fn as_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn as_scheme(&self) -> &Scheme {
        &self.scheme
    }

    fn writer_for(&mut self, label: &str) -> Result<&mut AppendWriter> {
        if !self.writers.contains_key(label) {
            let writer = AppendWriter::open(
                &self.dir,
                label,
                self.schema.clone(),
                self.config.clone(),
            )?;
            debug!(target: "partition", "opened writer for partition {}", label);
            self.writers.insert(label.to_string(), writer);
        }
        Ok(self.writers.get_mut(label).unwrap())
    }

    /// Route one row to its partition and append it as a single-row chunk.
    /// Bulk producers should prefer [PartitionedTable::append_batch].
    pub fn append(&mut self, record: &Record) -> Result<()> {
        let label = self.scheme.label_of(record)?;
        self.writer_for(&label)?.append(std::slice::from_ref(record))?;
        Ok(())
    }

    /// Group `records` by partition and append one chunk per touched
    /// partition, in label order.
    pub fn append_batch(&mut self, records: &[Record]) -> Result<()> {
        let mut groups: std::collections::BTreeMap<String, Vec<Record>> =
            std::collections::BTreeMap::new();
        for record in records {
            let label = self.scheme.label_of(record)?;
            groups.entry(label).or_insert_with(Vec::new).push(record.clone());
        }
        for (label, group) in groups.iter() {
            self.writer_for(label)?.append(group)?;
        }
        Ok(())
    }

    /// Discover partitions on disk, sorted by label.
    pub fn partitions(&self) -> Result<Vec<PartitionInfo>> {
        let mut infos = vec![];
        let entries = err_at!(IOError, fs::read_dir(path::Path::new(&self.dir)))?;
        for entry in entries {
            let entry = err_at!(IOError, entry)?;
            let fname = TableFileName(entry.file_name());
            let label = match String::try_from(fname) {
                Ok(label) => label,
                Err(_) => continue, // sidecars, temp files
            };
            let header = ndts::read_header(&entry.path().into_os_string())?;
            infos.push(PartitionInfo { label, rows: header.total_rows });
        }
        infos.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(infos)
    }

    // labels surviving the time-range prune; hash schemes never prune.
    fn prune(&self, labels: Vec<String>, range: Option<(i64, i64)>) -> Result<Vec<String>> {
        let (lo, hi) = match (&self.scheme, range) {
            (Scheme::Time { .. }, Some(range)) => range,
            _ => return Ok(labels),
        };
        let interval = match &self.scheme {
            Scheme::Time { interval, .. } => *interval,
            _ => unreachable!(),
        };

        let mut kept = vec![];
        for label in labels {
            let (start, end) = interval.bounds_of(&label)?;
            if start <= hi && lo < end {
                kept.push(label);
            } else {
                debug!(target: "partition", "pruned partition {}", label);
            }
        }
        Ok(kept)
    }

    /// Scan partitions into one in-memory table. `time_range` is a closed
    /// `[lo, hi]` range on the partition column; with a time scheme it
    /// prunes whole partition files before any I/O, and always filters
    /// rows. `pred` is applied per row. Tombstoned rows are skipped.
    pub fn query<F>(
        &self,
        mut pred: Option<F>,
        time_range: Option<(i64, i64)>,
    ) -> Result<ColumnarTable>
    where
        F: FnMut(&Record) -> bool,
    {
        let labels: Vec<String> =
            self.partitions()?.into_iter().map(|p| p.label).collect();
        let labels = self.prune(labels, time_range)?;

        let column = self.scheme.as_column();
        let mut result = ColumnarTable::new(self.schema.clone());
        for label in labels {
            let loc = ndts::to_table_location(&self.dir, &label);
            let (_, table) = ndts::read_filtered(&loc)?;
            for row in 0..table.len() {
                let record = table.record_at(row)?;
                if let Some((lo, hi)) = time_range {
                    let ts = record.get(column).and_then(|v| v.as_i64());
                    match ts {
                        Some(ts) if lo <= ts && ts <= hi => (),
                        _ => continue,
                    }
                }
                if let Some(pred) = pred.as_mut() {
                    if !pred(&record) {
                        continue;
                    }
                }
                result.append(&record)?;
            }
        }

        Ok(result)
    }

    /// Integration hook for the SQL executor: materialize the (pruned)
    /// partitions as one in-memory table.
    pub fn to_table(&self, time_range: Option<(i64, i64)>) -> Result<ColumnarTable> {
        self.query::<fn(&Record) -> bool>(None, time_range)
    }

    /// Close every cached writer, flushing and auto-compacting per
    /// [crate::ndts::Config].
    pub fn close_all(&mut self) -> Result<()> {
        for (label, writer) in self.writers.drain() {
            debug!(target: "partition", "closing partition {}", label);
            writer.close()?;
        }
        Ok(())
    }
}
