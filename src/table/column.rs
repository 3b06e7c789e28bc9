use std::collections::HashMap;

use crate::{
    schema::Schema,
    table::Record,
    value::{ColumnType, Value},
    Error, Result,
};

/// Per-column dictionary for string columns. Entries are unique strings in
/// first-seen order, append-only; a code is the entry's position and stays
/// stable for the life of the dictionary.
#[derive(Clone, Debug, Default)]
pub struct StrDict {
    strings: Vec<String>,
    codes: HashMap<String, u32>,
}

impl StrDict {
    pub fn new() -> StrDict {
        StrDict::default()
    }

    pub fn from_strings(strings: Vec<String>) -> StrDict {
        let mut codes = HashMap::with_capacity(strings.len());
        for (i, s) in strings.iter().enumerate() {
            codes.insert(s.clone(), i as u32);
        }
        StrDict { strings, codes }
    }

    /// Code for `s`, assigning the next code when unseen.
    pub fn intern(&mut self, s: &str) -> u32 {
        match self.codes.get(s) {
            Some(code) => *code,
            None => {
                let code = self.strings.len() as u32;
                self.strings.push(s.to_string());
                self.codes.insert(s.to_string(), code);
                code
            }
        }
    }

    pub fn code_of(&self, s: &str) -> Option<u32> {
        self.codes.get(s).copied()
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.strings.get(code as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn as_strings(&self) -> &[String] {
        &self.strings
    }
}

/// Typed column payload, the unit moved between buffers, chunks and files.
/// String columns travel as dictionary codes.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Code(Vec<u32>),
}

impl ColumnData {
    pub fn empty(kind: ColumnType) -> ColumnData {
        match kind {
            ColumnType::Int32 => ColumnData::I32(vec![]),
            ColumnType::Int64 => ColumnData::I64(vec![]),
            ColumnType::Float32 => ColumnData::F32(vec![]),
            ColumnType::Float64 => ColumnData::F64(vec![]),
            ColumnType::Str => ColumnData::Code(vec![]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::I32(v) => v.len(),
            ColumnData::I64(v) => v.len(),
            ColumnData::F32(v) => v.len(),
            ColumnData::F64(v) => v.len(),
            ColumnData::Code(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append other's elements, other must be of the same variant.
    pub fn extend(&mut self, other: &ColumnData) -> Result<()> {
        match (self, other) {
            (ColumnData::I32(a), ColumnData::I32(b)) => a.extend_from_slice(b),
            (ColumnData::I64(a), ColumnData::I64(b)) => a.extend_from_slice(b),
            (ColumnData::F32(a), ColumnData::F32(b)) => a.extend_from_slice(b),
            (ColumnData::F64(a), ColumnData::F64(b)) => a.extend_from_slice(b),
            (ColumnData::Code(a), ColumnData::Code(b)) => a.extend_from_slice(b),
            (_, _) => err_at!(Fatal, msg: "column data variant mismatch")?,
        }
        Ok(())
    }
}

/// Column-wise input for the hot-path builder, bypassing per-record maps.
pub enum ColumnVec {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Str(Vec<String>),
}

impl ColumnVec {
    pub fn len(&self) -> usize {
        match self {
            ColumnVec::I32(v) => v.len(),
            ColumnVec::I64(v) => v.len(),
            ColumnVec::F32(v) => v.len(),
            ColumnVec::F64(v) => v.len(),
            ColumnVec::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// grow a vector to the next power-of-two capacity that holds `additional`
// more elements.
fn grow_for<T>(vec: &mut Vec<T>, additional: usize) {
    let need = vec.len() + additional;
    if need <= vec.capacity() {
        return;
    }
    let mut cap = std::cmp::max(vec.capacity(), 1);
    while cap < need {
        cap *= 2;
    }
    vec.reserve_exact(cap - vec.len());
}

/// One growable, typed column buffer. Holds the column's [ColumnData] and,
/// for string columns, its dictionary.
#[derive(Clone, Debug)]
pub struct ColumnBuffer {
    kind: ColumnType,
    data: ColumnData,
    dict: Option<StrDict>,
}

impl ColumnBuffer {
    pub fn new(kind: ColumnType, capacity: usize) -> ColumnBuffer {
        let capacity = std::cmp::max(capacity, 1);
        let data = match kind {
            ColumnType::Int32 => ColumnData::I32(Vec::with_capacity(capacity)),
            ColumnType::Int64 => ColumnData::I64(Vec::with_capacity(capacity)),
            ColumnType::Float32 => ColumnData::F32(Vec::with_capacity(capacity)),
            ColumnType::Float64 => ColumnData::F64(Vec::with_capacity(capacity)),
            ColumnType::Str => ColumnData::Code(Vec::with_capacity(capacity)),
        };
        let dict = match kind {
            ColumnType::Str => Some(StrDict::new()),
            _ => None,
        };

        ColumnBuffer { kind, data, dict }
    }

    /// Rebuild a buffer from decoded file data and its dictionary.
    pub fn from_parts(
        kind: ColumnType,
        data: ColumnData,
        dict: Option<StrDict>,
    ) -> ColumnBuffer {
        ColumnBuffer { kind, data, dict }
    }

    pub fn to_kind(&self) -> ColumnType {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        match &self.data {
            ColumnData::I32(v) => v.capacity(),
            ColumnData::I64(v) => v.capacity(),
            ColumnData::F32(v) => v.capacity(),
            ColumnData::F64(v) => v.capacity(),
            ColumnData::Code(v) => v.capacity(),
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        match &mut self.data {
            ColumnData::I32(v) => grow_for(v, additional),
            ColumnData::I64(v) => grow_for(v, additional),
            ColumnData::F32(v) => grow_for(v, additional),
            ColumnData::F64(v) => grow_for(v, additional),
            ColumnData::Code(v) => grow_for(v, additional),
        }
    }

    /// Push a value already coerced to this column's kind.
    pub fn push(&mut self, val: &Value) -> Result<()> {
        match (&mut self.data, val) {
            (ColumnData::I32(v), Value::I32(x)) => {
                grow_for(v, 1);
                v.push(*x)
            }
            (ColumnData::I64(v), Value::I64(x)) => {
                grow_for(v, 1);
                v.push(*x)
            }
            (ColumnData::F32(v), Value::F32(x)) => {
                grow_for(v, 1);
                v.push(*x)
            }
            (ColumnData::F64(v), Value::F64(x)) => {
                grow_for(v, 1);
                v.push(*x)
            }
            (ColumnData::Code(v), Value::Str(s)) => {
                let code = self.dict.as_mut().unwrap().intern(s);
                grow_for(v, 1);
                v.push(code)
            }
            (_, val) => err_at!(TypeFail, msg: "push {} into {}", val, self.kind)?,
        }
        Ok(())
    }

    pub fn get(&self, i: usize) -> Option<Value> {
        let val = match &self.data {
            ColumnData::I32(v) => Value::I32(*v.get(i)?),
            ColumnData::I64(v) => Value::I64(*v.get(i)?),
            ColumnData::F32(v) => Value::F32(*v.get(i)?),
            ColumnData::F64(v) => Value::F64(*v.get(i)?),
            ColumnData::Code(v) => {
                let code = *v.get(i)?;
                Value::Str(self.dict.as_ref()?.lookup(code)?.to_string())
            }
        };
        Some(val)
    }

    pub fn as_data(&self) -> &ColumnData {
        &self.data
    }

    pub fn as_dict(&self) -> Option<&StrDict> {
        self.dict.as_ref()
    }

    pub fn as_ref(&self) -> ColumnRef {
        match &self.data {
            ColumnData::I32(v) => ColumnRef::I32(v),
            ColumnData::I64(v) => ColumnRef::I64(v),
            ColumnData::F32(v) => ColumnRef::F32(v),
            ColumnData::F64(v) => ColumnRef::F64(v),
            ColumnData::Code(v) => ColumnRef::Str {
                codes: v,
                dict: self.dict.as_ref().unwrap(),
            },
        }
    }
}

/// Borrowed, typed view over one column, length equals the table's row
/// count. The executor and query primitives consume columns through this
/// type, monomorphized access without boxing.
#[derive(Clone, Copy)]
pub enum ColumnRef<'a> {
    I32(&'a [i32]),
    I64(&'a [i64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
    Str { codes: &'a [u32], dict: &'a StrDict },
}

impl<'a> ColumnRef<'a> {
    pub fn len(&self) -> usize {
        match self {
            ColumnRef::I32(v) => v.len(),
            ColumnRef::I64(v) => v.len(),
            ColumnRef::F32(v) => v.len(),
            ColumnRef::F64(v) => v.len(),
            ColumnRef::Str { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_kind(&self) -> ColumnType {
        match self {
            ColumnRef::I32(_) => ColumnType::Int32,
            ColumnRef::I64(_) => ColumnType::Int64,
            ColumnRef::F32(_) => ColumnType::Float32,
            ColumnRef::F64(_) => ColumnType::Float64,
            ColumnRef::Str { .. } => ColumnType::Str,
        }
    }

    pub fn value(&self, i: usize) -> Option<Value> {
        let val = match self {
            ColumnRef::I32(v) => Value::I32(*v.get(i)?),
            ColumnRef::I64(v) => Value::I64(*v.get(i)?),
            ColumnRef::F32(v) => Value::F32(*v.get(i)?),
            ColumnRef::F64(v) => Value::F64(*v.get(i)?),
            ColumnRef::Str { codes, dict } => {
                Value::Str(dict.lookup(*codes.get(i)?)?.to_string())
            }
        };
        Some(val)
    }

    pub fn as_i64(&self, i: usize) -> Option<i64> {
        match self {
            ColumnRef::I32(v) => v.get(i).map(|x| *x as i64),
            ColumnRef::I64(v) => v.get(i).copied(),
            ColumnRef::F32(v) => v.get(i).map(|x| *x as i64),
            ColumnRef::F64(v) => v.get(i).map(|x| *x as i64),
            ColumnRef::Str { .. } => None,
        }
    }

    pub fn as_f64(&self, i: usize) -> Option<f64> {
        match self {
            ColumnRef::I32(v) => v.get(i).map(|x| *x as f64),
            ColumnRef::I64(v) => v.get(i).map(|x| *x as f64),
            ColumnRef::F32(v) => v.get(i).map(|x| *x as f64),
            ColumnRef::F64(v) => v.get(i).copied(),
            ColumnRef::Str { .. } => None,
        }
    }
}

/// Convert row records into column-major [ColumnData], coercing each value
/// to its column's kind and interning strings through `dicts`. `dicts` is
/// schema-ordered, `Some` for string columns. Used by the append writer and
/// the batch-append path.
pub fn columnize(
    schema: &Schema,
    records: &[Record],
    dicts: &mut [Option<StrDict>],
) -> Result<Vec<ColumnData>> {
    let mut cols: Vec<ColumnData> = schema
        .fields()
        .iter()
        .map(|f| ColumnData::empty(f.kind))
        .collect();

    for record in records {
        for (i, field) in schema.fields().iter().enumerate() {
            let val = match record.get(&field.name) {
                Some(val) => val.coerce(field.kind)?,
                None => err_at!(MissingField, msg: "column {}", field.name)?,
            };
            match (&mut cols[i], val) {
                (ColumnData::I32(v), Value::I32(x)) => v.push(x),
                (ColumnData::I64(v), Value::I64(x)) => v.push(x),
                (ColumnData::F32(v), Value::F32(x)) => v.push(x),
                (ColumnData::F64(v), Value::F64(x)) => v.push(x),
                (ColumnData::Code(v), Value::Str(s)) => {
                    let dict = match dicts[i].as_mut() {
                        Some(dict) => dict,
                        None => err_at!(Fatal, msg: "no dict for {}", field.name)?,
                    };
                    v.push(dict.intern(&s));
                }
                (_, _) => err_at!(Fatal, msg: "coerce broke column {}", field.name)?,
            }
        }
    }

    Ok(cols)
}

#[cfg(test)]
#[path = "column_test.rs"]
mod column_test;
