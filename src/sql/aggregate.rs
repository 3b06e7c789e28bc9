use std::cmp::Ordering;

use crate::value::Value;

/// Aggregate functions known to the executor, for GROUP BY and windows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AggKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    StdDev,
}

impl AggKind {
    pub fn from_name(name: &str) -> Option<AggKind> {
        match name {
            "COUNT" => Some(AggKind::Count),
            "SUM" => Some(AggKind::Sum),
            "AVG" => Some(AggKind::Avg),
            "MIN" => Some(AggKind::Min),
            "MAX" => Some(AggKind::Max),
            "STDDEV" => Some(AggKind::StdDev),
            _ => None,
        }
    }
}

/// Streaming reducer for one aggregate. Nulls are skipped, matching SQL
/// semantics; `COUNT(*)` callers push a non-null marker per row. Standard
/// deviation is the population form, via Welford's recurrence, matching
/// the batch kernels in [crate::series].
#[derive(Clone, Debug)]
pub struct Accum {
    kind: AggKind,
    count: u64,
    int_sum: i64,
    all_int: bool,
    sum: f64,
    mean: f64,
    m2: f64,
    min: Option<Value>,
    max: Option<Value>,
}

impl Accum {
    pub fn new(kind: AggKind) -> Accum {
        Accum {
            kind,
            count: 0,
            int_sum: 0,
            all_int: true,
            sum: 0.0,
            mean: 0.0,
            m2: 0.0,
            min: None,
            max: None,
        }
    }

    pub fn push(&mut self, val: &Value) {
        if val.is_null() {
            return;
        }
        self.count += 1;

        match val {
            Value::I32(_) | Value::I64(_) => {
                let v = val.as_i64().unwrap();
                self.int_sum = self.int_sum.wrapping_add(v);
            }
            Value::F32(_) | Value::F64(_) => self.all_int = false,
            Value::Str(_) | Value::Null => self.all_int = false,
        }

        if let Some(v) = val.as_f64() {
            self.sum += v;
            let delta = v - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (v - self.mean);
        }

        let replace_min = match &self.min {
            Some(min) => val.sort_cmp(min) == Ordering::Less,
            None => true,
        };
        if replace_min {
            self.min = Some(val.clone());
        }
        let replace_max = match &self.max {
            Some(max) => val.sort_cmp(max) == Ordering::Greater,
            None => true,
        };
        if replace_max {
            self.max = Some(val.clone());
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current value of the aggregate; empty input yields `COUNT = 0`
    /// and NULL for everything else.
    pub fn value(&self) -> Value {
        match self.kind {
            AggKind::Count => Value::I64(self.count as i64),
            AggKind::Sum if self.count == 0 => Value::Null,
            AggKind::Sum if self.all_int => Value::I64(self.int_sum),
            AggKind::Sum => Value::F64(self.sum),
            AggKind::Avg if self.count == 0 => Value::Null,
            AggKind::Avg => Value::F64(self.sum / self.count as f64),
            AggKind::Min => self.min.clone().unwrap_or(Value::Null),
            AggKind::Max => self.max.clone().unwrap_or(Value::Null),
            AggKind::StdDev if self.count == 0 => Value::Null,
            AggKind::StdDev => Value::F64((self.m2 / self.count as f64).sqrt()),
        }
    }
}

#[cfg(test)]
#[path = "aggregate_test.rs"]
mod aggregate_test;
