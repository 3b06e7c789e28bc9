use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
    ops::Bound,
    result,
};

use crate::{value::Value, Error, Result};

/// f64 wrapper with total ordering, so float keys can live in ordered maps.
#[derive(Clone, Copy, Debug)]
pub struct FloatKey(pub f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &FloatKey) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &FloatKey) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &FloatKey) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Key stored in ordered and composite indexes. String columns index the
/// resolved string, not the dictionary code - codes are assigned in
/// first-seen order, so code order and string order disagree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    Int(i64),
    Float(FloatKey),
    Str(String),
}

impl IndexKey {
    pub fn from_value(val: &Value) -> Result<IndexKey> {
        let key = match val {
            Value::I32(v) => IndexKey::Int(*v as i64),
            Value::I64(v) => IndexKey::Int(*v),
            Value::F32(v) => IndexKey::Float(FloatKey(*v as f64)),
            Value::F64(v) => IndexKey::Float(FloatKey(*v)),
            Value::Str(s) => IndexKey::Str(s.clone()),
            Value::Null => err_at!(InvalidInput, msg: "null is not indexable")?,
        };
        Ok(key)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            IndexKey::Int(v) => write!(f, "{}", v),
            IndexKey::Float(v) => write!(f, "{}", v.0),
            IndexKey::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Comparison operators accepted by [OrderedIndex::query_cmp].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// Ordered index over a single column, mapping key to the positions of the
/// rows holding it. Duplicates are preserved in insertion order. Query
/// results are row positions in key order, not sorted by position - callers
/// sort when they need to.
#[derive(Clone, Debug, Default)]
pub struct OrderedIndex {
    column: String,
    map: BTreeMap<IndexKey, Vec<u32>>,
}

impl OrderedIndex {
    pub fn new(column: &str) -> OrderedIndex {
        OrderedIndex { column: column.to_string(), map: BTreeMap::new() }
    }

    pub fn to_column(&self) -> String {
        self.column.clone()
    }

    pub fn as_column(&self) -> &str {
        &self.column
    }

    pub fn insert(&mut self, key: IndexKey, row: u32) {
        self.map.entry(key).or_insert_with(Vec::new).push(row);
    }

    /// Drop a single row position, used when a rewrite renumbers rows.
    pub fn remove_row(&mut self, row: u32) {
        for rows in self.map.values_mut() {
            rows.retain(|r| *r != row);
        }
        self.map.retain(|_, rows| !rows.is_empty());
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of distinct keys.
    pub fn len_keys(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn query_eq(&self, key: &IndexKey) -> Vec<u32> {
        self.map.get(key).cloned().unwrap_or_default()
    }

    /// Rows with `lo <= key <= hi`; a `None` bound is unbounded.
    pub fn query_range(&self, lo: Option<&IndexKey>, hi: Option<&IndexKey>) -> Vec<u32> {
        let lo = match lo {
            Some(key) => Bound::Included(key.clone()),
            None => Bound::Unbounded,
        };
        let hi = match hi {
            Some(key) => Bound::Included(key.clone()),
            None => Bound::Unbounded,
        };
        self.map.range((lo, hi)).flat_map(|(_, rows)| rows.iter().copied()).collect()
    }

    /// Rows within arbitrary bounds, each `(key, inclusive)`.
    pub fn query_bounds(
        &self,
        lo: Option<(&IndexKey, bool)>,
        hi: Option<(&IndexKey, bool)>,
    ) -> Vec<u32> {
        let lo = match lo {
            Some((key, true)) => Bound::Included(key.clone()),
            Some((key, false)) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        let hi = match hi {
            Some((key, true)) => Bound::Included(key.clone()),
            Some((key, false)) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        self.map.range((lo, hi)).flat_map(|(_, rows)| rows.iter().copied()).collect()
    }

    pub fn query_cmp(&self, op: CmpOp, key: &IndexKey) -> Vec<u32> {
        let range = match op {
            CmpOp::Lt => (Bound::Unbounded, Bound::Excluded(key.clone())),
            CmpOp::Le => (Bound::Unbounded, Bound::Included(key.clone())),
            CmpOp::Gt => (Bound::Excluded(key.clone()), Bound::Unbounded),
            CmpOp::Ge => (Bound::Included(key.clone()), Bound::Unbounded),
        };
        self.map.range(range).flat_map(|(_, rows)| rows.iter().copied()).collect()
    }
}

#[cfg(test)]
#[path = "ordered_test.rs"]
mod ordered_test;
