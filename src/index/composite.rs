use std::{collections::BTreeMap, ops::Bound};

use crate::{
    index::ordered::IndexKey,
    Error, Result,
};

/// Per-column predicate supplied to [CompositeIndex::query], either an
/// equality or a combination of range bounds.
#[derive(Clone, Debug, Default)]
pub struct ColumnPred {
    pub eq: Option<IndexKey>,
    pub gte: Option<IndexKey>,
    pub lte: Option<IndexKey>,
    pub gt: Option<IndexKey>,
    pub lt: Option<IndexKey>,
}

impl ColumnPred {
    pub fn new_eq(key: IndexKey) -> ColumnPred {
        ColumnPred { eq: Some(key), ..ColumnPred::default() }
    }

    pub fn is_eq(&self) -> bool {
        self.eq.is_some()
    }

    pub fn has_range(&self) -> bool {
        self.gte.is_some() || self.lte.is_some() || self.gt.is_some() || self.lt.is_some()
    }

    // lower bound of the range, and whether it is inclusive.
    fn lower(&self) -> Option<(&IndexKey, bool)> {
        match (&self.gte, &self.gt) {
            (Some(key), _) => Some((key, true)),
            (None, Some(key)) => Some((key, false)),
            (None, None) => None,
        }
    }

    fn upper(&self) -> Option<(&IndexKey, bool)> {
        match (&self.lte, &self.lt) {
            (Some(key), _) => Some((key, true)),
            (None, Some(key)) => Some((key, false)),
            (None, None) => None,
        }
    }

    // does `key` satisfy the range bounds.
    fn matches(&self, key: &IndexKey) -> bool {
        if let Some(eq) = &self.eq {
            return key == eq;
        }
        if let Some((lo, incl)) = self.lower() {
            if key < lo || (!incl && key == lo) {
                return false;
            }
        }
        if let Some((hi, incl)) = self.upper() {
            if key > hi || (!incl && key == hi) {
                return false;
            }
        }
        true
    }
}

/// Ordered index over an ordered list of columns. Keys are tuples compared
/// lexicographically, each element with its column's own comparator.
///
/// Query contract: the supplied predicates must cover a prefix of the
/// column list - equalities on all leading columns, optionally one range on
/// the next column. Predicates on columns beyond the prefix are the
/// caller's post-filters, they are not consulted here.
#[derive(Clone, Debug, Default)]
pub struct CompositeIndex {
    columns: Vec<String>,
    map: BTreeMap<Vec<IndexKey>, Vec<u32>>,
}

impl CompositeIndex {
    pub fn new(columns: &[&str]) -> CompositeIndex {
        CompositeIndex {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            map: BTreeMap::new(),
        }
    }

    pub fn as_columns(&self) -> &[String] {
        &self.columns
    }

    pub fn insert(&mut self, key: Vec<IndexKey>, row: u32) {
        self.map.entry(key).or_insert_with(Vec::new).push(row);
    }

    pub fn remove_row(&mut self, row: u32) {
        for rows in self.map.values_mut() {
            rows.retain(|r| *r != row);
        }
        self.map.retain(|_, rows| !rows.is_empty());
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len_keys(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// How many of `preds` this index can serve: the count of leading
    /// equality columns, and whether a range on the following column is
    /// usable. `(0, false)` means the index does not apply.
    pub fn coverage(&self, preds: &BTreeMap<String, ColumnPred>) -> (usize, bool) {
        let mut eqs = 0;
        for column in self.columns.iter() {
            match preds.get(column) {
                Some(pred) if pred.is_eq() => eqs += 1,
                _ => break,
            }
        }
        let range = match self.columns.get(eqs) {
            Some(column) => {
                matches!(preds.get(column), Some(pred) if pred.has_range())
            }
            None => false,
        };
        (eqs, range)
    }

    /// Row positions matching the prefix of `preds`. Fails with
    /// [Error::IndexMismatch] when the predicates do not form a usable
    /// prefix.
    pub fn query(&self, preds: &BTreeMap<String, ColumnPred>) -> Result<Vec<u32>> {
        let (eqs, range) = self.coverage(preds);
        if eqs == 0 && !range {
            let columns = self.columns.join(",");
            err_at!(IndexMismatch, msg: "predicates are not a prefix of [{}]", columns)?;
        }

        let prefix: Vec<IndexKey> = self.columns[..eqs]
            .iter()
            .map(|c| preds[c].eq.clone().unwrap())
            .collect();
        let range_pred = match range {
            true => Some(&preds[&self.columns[eqs]]),
            false => None,
        };

        // seek to the first candidate key, then sweep while the equality
        // prefix holds; the range column is ordered within the prefix, so
        // passing its upper bound ends the sweep.
        let start = {
            let mut start = prefix.clone();
            if let Some((lo, _)) = range_pred.and_then(|p| p.lower()) {
                start.push(lo.clone());
            }
            start
        };

        let mut rows = vec![];
        let iter = self.map.range((Bound::Included(start), Bound::Unbounded));
        for (key, key_rows) in iter {
            if key[..eqs] != prefix[..] {
                break;
            }
            if let Some(pred) = range_pred {
                let val = &key[eqs];
                if let Some((hi, incl)) = pred.upper() {
                    if val > hi || (!incl && val == hi) {
                        break;
                    }
                }
                if !pred.matches(val) {
                    continue;
                }
            }
            rows.extend_from_slice(key_rows);
        }

        Ok(rows)
    }
}

#[cfg(test)]
#[path = "composite_test.rs"]
mod composite_test;
