//! Module implement time-series query primitives.
//!
//! Batch kernels over column slices - SAMPLE BY tumbling-bucket
//! aggregation, OHLCV bars, LATEST ON, simple/exponential moving averages
//! and rolling standard deviation - plus streaming counterparts in
//! [stream] that hold O(window) state and accept one sample at a time.
//! Streaming and batch results agree within floating-point tolerance.

use std::collections::BTreeMap;

use crate::{Error, Result};

pub mod stream;

/// Per-column aggregator selection for [sample_by].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleAgg {
    First,
    Last,
    Sum,
    Min,
    Max,
    Avg,
    Count,
}

/// One value series to aggregate inside [sample_by] buckets.
pub struct SampleSpec<'a> {
    pub name: String,
    pub values: &'a [f64],
    pub agg: SampleAgg,
}

impl<'a> SampleSpec<'a> {
    pub fn new(name: &str, values: &'a [f64], agg: SampleAgg) -> SampleSpec<'a> {
        SampleSpec { name: name.to_string(), values, agg }
    }
}

/// One output row of [sample_by]: the bucket start and one aggregate per
/// spec, in spec order.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleRow {
    pub bucket: i64,
    pub values: Vec<f64>,
}

// running state for one (bucket, spec) cell.
#[derive(Clone, Copy)]
struct Cell {
    first: f64,
    last: f64,
    sum: f64,
    min: f64,
    max: f64,
    count: u64,
}

impl Cell {
    fn seed(v: f64) -> Cell {
        Cell { first: v, last: v, sum: v, min: v, max: v, count: 1 }
    }

    fn update(&mut self, v: f64) {
        self.last = v;
        self.sum += v;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.count += 1;
    }

    fn value(&self, agg: SampleAgg) -> f64 {
        match agg {
            SampleAgg::First => self.first,
            SampleAgg::Last => self.last,
            SampleAgg::Sum => self.sum,
            SampleAgg::Min => self.min,
            SampleAgg::Max => self.max,
            SampleAgg::Avg => self.sum / self.count as f64,
            SampleAgg::Count => self.count as f64,
        }
    }
}

/// Aggregate `specs` into fixed-width tumbling buckets of `bucket_ms`,
/// each bucket starting at `floor(ts / bucket_ms) * bucket_ms`. Output is
/// ordered by bucket start ascending.
pub fn sample_by(
    timestamps: &[i64],
    specs: &[SampleSpec],
    bucket_ms: i64,
) -> Result<Vec<SampleRow>> {
    if bucket_ms <= 0 {
        err_at!(InvalidInput, msg: "bucket width {}", bucket_ms)?;
    }
    for spec in specs {
        if spec.values.len() != timestamps.len() {
            err_at!(
                InvalidInput, msg: "column {} has {} rows, want {}",
                spec.name, spec.values.len(), timestamps.len()
            )?;
        }
    }

    let mut buckets: BTreeMap<i64, Vec<Cell>> = BTreeMap::new();
    for (i, ts) in timestamps.iter().enumerate() {
        let start = ts.div_euclid(bucket_ms) * bucket_ms;
        match buckets.get_mut(&start) {
            Some(cells) => {
                for (cell, spec) in cells.iter_mut().zip(specs.iter()) {
                    cell.update(spec.values[i]);
                }
            }
            None => {
                let cells = specs.iter().map(|spec| Cell::seed(spec.values[i])).collect();
                buckets.insert(start, cells);
            }
        }
    }

    let rows = buckets
        .into_iter()
        .map(|(bucket, cells)| SampleRow {
            bucket,
            values: cells
                .iter()
                .zip(specs.iter())
                .map(|(cell, spec)| cell.value(spec.agg))
                .collect(),
        })
        .collect();
    Ok(rows)
}

/// One OHLCV bar. Invariants: `low <= open`, `low <= close`,
/// `low <= high`, `high >= open`, `high >= close`.
#[derive(Clone, Debug, PartialEq)]
pub struct Bar {
    pub bucket: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Build OHLCV bars over tumbling `bucket_ms` buckets: open is the first
/// price, close the last, high/low the extremes, volume the sum.
pub fn ohlcv(ts: &[i64], price: &[f64], volume: &[f64], bucket_ms: i64) -> Result<Vec<Bar>> {
    if price.len() != ts.len() || volume.len() != ts.len() {
        err_at!(
            InvalidInput, msg: "ragged input {}/{}/{}", ts.len(), price.len(), volume.len()
        )?;
    }

    let rows = sample_by(
        ts,
        &[
            SampleSpec::new("open", price, SampleAgg::First),
            SampleSpec::new("high", price, SampleAgg::Max),
            SampleSpec::new("low", price, SampleAgg::Min),
            SampleSpec::new("close", price, SampleAgg::Last),
            SampleSpec::new("volume", volume, SampleAgg::Sum),
        ],
        bucket_ms,
    )?;

    Ok(rows
        .into_iter()
        .map(|row| Bar {
            bucket: row.bucket,
            open: row.values[0],
            high: row.values[1],
            low: row.values[2],
            close: row.values[3],
            volume: row.values[4],
        })
        .collect())
}

/// For each symbol id, the row holding its maximum timestamp; ties broken
/// by the later row. Output is `(symbol, row)` ordered by symbol id.
pub fn latest_on(symbols: &[u32], ts: &[i64]) -> Vec<(u32, usize)> {
    let mut latest: BTreeMap<u32, (i64, usize)> = BTreeMap::new();
    for (row, (symbol, t)) in symbols.iter().zip(ts.iter()).enumerate() {
        match latest.get(symbol) {
            Some((best, _)) if *best > *t => (),
            _ => {
                latest.insert(*symbol, (*t, row));
            }
        }
    }
    latest.into_iter().map(|(symbol, (_, row))| (symbol, row)).collect()
}

/// Simple moving average; warm-up rows average the partial window,
/// `sma[i] = mean(data[max(0, i-window+1) ..= i])`.
pub fn moving_average(data: &[f64], window: usize) -> Vec<f64> {
    let window = std::cmp::max(window, 1);
    let mut out = Vec::with_capacity(data.len());
    let mut sum = 0.0;
    for i in 0..data.len() {
        sum += data[i];
        if i >= window {
            sum -= data[i - window];
        }
        let n = std::cmp::min(i + 1, window);
        out.push(sum / n as f64);
    }
    out
}

/// Exponential moving average with `alpha = 2 / (window + 1)`, seeded with
/// the first sample.
pub fn exponential_moving_average(data: &[f64], window: usize) -> Vec<f64> {
    let alpha = 2.0 / (window as f64 + 1.0);
    let mut out = Vec::with_capacity(data.len());
    let mut ema = 0.0;
    for (i, v) in data.iter().enumerate() {
        ema = match i {
            0 => *v,
            _ => alpha * v + (1.0 - alpha) * ema,
        };
        out.push(ema);
    }
    out
}

/// Population standard deviation of the trailing window, partial windows
/// included.
pub fn rolling_std_dev(data: &[f64], window: usize) -> Vec<f64> {
    let window = std::cmp::max(window, 1);
    let mut out = Vec::with_capacity(data.len());
    for i in 0..data.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &data[start..=i];
        let n = slice.len() as f64;
        let mean = slice.iter().sum::<f64>() / n;
        let var = slice.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        out.push(var.sqrt());
    }
    out
}
