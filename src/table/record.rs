use std::{collections::BTreeMap, fmt, result};

use crate::value::Value;

/// One row at the API boundary, a map of column name to [Value].
///
/// Producers build records with the [Record::with] builder and hand them to
/// [ColumnarTable::append] or an append writer; the engine resolves every
/// schema column from the record while appending.
///
/// [ColumnarTable::append]: crate::table::ColumnarTable::append
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Record {
        Record::default()
    }

    /// Builder style setter.
    ///
    /// ```ignore
    /// let rec = Record::new().with("ts", 1700000000000_i64).with("price", 100.5);
    /// ```
    pub fn with<V: Into<Value>>(mut self, name: &str, val: V) -> Record {
        self.values.insert(name.to_string(), val.into());
        self
    }

    pub fn set<V: Into<Value>>(&mut self, name: &str, val: V) {
        self.values.insert(name.to_string(), val.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        let parts: Vec<String> =
            self.values.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(","))
    }
}
