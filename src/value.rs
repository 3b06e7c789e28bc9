//! Module implement the tagged value type crossing the engine's API boundary.
//!
//! Producers hand rows to the engine as maps of [Value], the engine coerces
//! each value into its column's primitive kind while appending. Numeric
//! columns accept integer or float inputs, integer columns truncate to the
//! column width with two's-complement semantics, string columns accept only
//! strings.

use serde::{Deserialize, Serialize};

use std::{cmp::Ordering, fmt, result};

use crate::{Error, Result};

/// Primitive column kinds supported by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "float32")]
    Float32,
    #[serde(rename = "float64")]
    Float64,
    #[serde(rename = "string")]
    Str,
}

impl ColumnType {
    /// Width in bytes of one element's on-disk encoding. String columns
    /// store u32 dictionary codes.
    pub fn width(&self) -> usize {
        match self {
            ColumnType::Int32 => 4,
            ColumnType::Int64 => 8,
            ColumnType::Float32 => 4,
            ColumnType::Float64 => 8,
            ColumnType::Str => 4,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnType::Str)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Int32 | ColumnType::Int64)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            ColumnType::Int32 => write!(f, "int32"),
            ColumnType::Int64 => write!(f, "int64"),
            ColumnType::Float32 => write!(f, "float32"),
            ColumnType::Float64 => write!(f, "float64"),
            ColumnType::Str => write!(f, "string"),
        }
    }
}

/// Tagged value. `Null` never lands in a column buffer, it exists only at
/// SQL runtime, as LEFT JOIN padding and as the result of NULL literals.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_) | Value::F32(_) | Value::F64(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of a numeric value, floats truncate toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            Value::F32(v) => Some(*v as i64),
            Value::F64(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce into the primitive kind of a column. Numeric kinds accept any
    /// numeric value, integer kinds truncate through two's complement to the
    /// column width. [Error::TypeFail] on anything else.
    pub fn coerce(&self, to: ColumnType) -> Result<Value> {
        let val = match (to, self) {
            (ColumnType::Int32, v) if v.is_numeric() => {
                Value::I32(v.as_i64().unwrap() as i32)
            }
            (ColumnType::Int64, v) if v.is_numeric() => {
                Value::I64(v.as_i64().unwrap())
            }
            (ColumnType::Float32, v) if v.is_numeric() => {
                Value::F32(v.as_f64().unwrap() as f32)
            }
            (ColumnType::Float64, v) if v.is_numeric() => {
                Value::F64(v.as_f64().unwrap())
            }
            (ColumnType::Str, Value::Str(s)) => Value::Str(s.clone()),
            (to, v) => err_at!(TypeFail, msg: "cannot coerce {} to {}", v, to)?,
        };

        Ok(val)
    }

    /// Total order over values, used for sort keys and group keys. Nulls
    /// sort first, then numbers (compared across int/float kinds), then
    /// strings.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        use Value::*;

        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (I32(a), I32(b)) => a.cmp(b),
            (I64(a), I64(b)) => a.cmp(b),
            (I32(a), I64(b)) => (*a as i64).cmp(b),
            (I64(a), I32(b)) => a.cmp(&(*b as i64)),
            (Str(a), Str(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (a, b) = (a.as_f64().unwrap(), b.as_f64().unwrap());
                a.total_cmp(&b)
            }
            (a, _) if a.is_numeric() => Ordering::Less,
            (_, _) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

#[cfg(test)]
#[path = "value_test.rs"]
mod value_test;
