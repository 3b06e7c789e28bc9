use log::debug;

use std::{collections::BTreeMap, ffi, fmt, result};

use crate::{
    index::{CmpOp, ColumnPred, CompositeIndex, IndexKey, OrderedIndex},
    ndts,
    schema::Schema,
    table::{ColumnBuffer, ColumnRef, ColumnVec, Record, StrDict},
    value::Value,
    Error, Result,
};

/// In-memory columnar table. One typed buffer per schema column, all
/// buffers share the same row count.
///
/// Optional ordered and composite indexes ride along and are updated as
/// rows are appended. Indexes address rows by 0-based position.
#[derive(Clone)]
pub struct ColumnarTable {
    schema: Schema,
    columns: Vec<ColumnBuffer>,
    row_count: usize,

    indexes: Vec<OrderedIndex>,
    composites: Vec<CompositeIndex>,
}

impl fmt::Debug for ColumnarTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "ColumnarTable<{},{}>", self.schema, self.row_count)
    }
}

impl ColumnarTable {
    pub fn new(schema: Schema) -> ColumnarTable {
        ColumnarTable::with_capacity(schema, 1)
    }

    /// Allocate per-column buffers of `max(capacity, 1)` elements.
    pub fn with_capacity(schema: Schema, capacity: usize) -> ColumnarTable {
        let columns = schema
            .fields()
            .iter()
            .map(|f| ColumnBuffer::new(f.kind, capacity))
            .collect();

        ColumnarTable {
            schema,
            columns,
            row_count: 0,
            indexes: vec![],
            composites: vec![],
        }
    }

    /// Hot-path builder taking column-wise vectors, bypassing per-record
    /// maps. Vectors must be schema-ordered and of equal length.
    pub fn from_columns(schema: Schema, columns: Vec<ColumnVec>) -> Result<ColumnarTable> {
        if columns.len() != schema.len() {
            err_at!(
                InvalidInput, msg: "got {} columns, schema has {}",
                columns.len(), schema.len()
            )?;
        }
        let row_count = columns.first().map(|c| c.len()).unwrap_or(0);
        for (i, col) in columns.iter().enumerate() {
            if col.len() != row_count {
                let field = &schema.fields()[i];
                err_at!(
                    InvalidInput, msg: "column {} has {} rows, want {}",
                    field.name, col.len(), row_count
                )?;
            }
        }

        let mut bufs = vec![];
        for (field, col) in schema.fields().iter().zip(columns.into_iter()) {
            let mut buf = ColumnBuffer::new(field.kind, row_count);
            match col {
                ColumnVec::I32(vals) => {
                    for val in vals {
                        buf.push(&Value::I32(val).coerce(field.kind)?)?;
                    }
                }
                ColumnVec::I64(vals) => {
                    for val in vals {
                        buf.push(&Value::I64(val).coerce(field.kind)?)?;
                    }
                }
                ColumnVec::F32(vals) => {
                    for val in vals {
                        buf.push(&Value::F32(val).coerce(field.kind)?)?;
                    }
                }
                ColumnVec::F64(vals) => {
                    for val in vals {
                        buf.push(&Value::F64(val).coerce(field.kind)?)?;
                    }
                }
                ColumnVec::Str(vals) => {
                    for val in vals {
                        buf.push(&Value::Str(val))?;
                    }
                }
            }
            bufs.push(buf);
        }

        Ok(ColumnarTable {
            schema,
            columns: bufs,
            row_count,
            indexes: vec![],
            composites: vec![],
        })
    }

    // used by the ndts decode path to rebuild a loaded table.
    pub(crate) fn from_parts(
        schema: Schema,
        columns: Vec<ColumnBuffer>,
        row_count: usize,
    ) -> ColumnarTable {
        ColumnarTable { schema, columns, row_count, indexes: vec![], composites: vec![] }
    }

    pub fn as_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub(crate) fn buffers(&self) -> &[ColumnBuffer] {
        &self.columns
    }

    /// Append one row. Every schema column must be resolvable from the
    /// record; values are coerced to their column's kind. The row is
    /// validated in full before any buffer is touched.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        let mut vals = Vec::with_capacity(self.schema.len());
        for field in self.schema.fields() {
            let val = match record.get(&field.name) {
                Some(val) => val.coerce(field.kind)?,
                None => err_at!(MissingField, msg: "column {}", field.name)?,
            };
            vals.push(val);
        }

        for (buf, val) in self.columns.iter_mut().zip(vals.iter()) {
            buf.push(val)?;
        }
        self.row_count += 1;

        self.index_row(self.row_count - 1)?;

        Ok(())
    }

    /// Amortized bulk append. Buffers grow once, by doubling, to hold the
    /// whole batch.
    pub fn append_batch(&mut self, records: &[Record]) -> Result<()> {
        for buf in self.columns.iter_mut() {
            buf.reserve(records.len());
        }
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Typed view over a column, length equals [ColumnarTable::len].
    pub fn get_column(&self, name: &str) -> Result<ColumnRef> {
        match self.schema.position(name) {
            Some(i) => Ok(self.columns[i].as_ref()),
            None => err_at!(ColumnMissing, msg: "{}", name),
        }
    }

    pub fn value_at(&self, col: usize, row: usize) -> Option<Value> {
        self.columns.get(col)?.get(row)
    }

    pub fn record_at(&self, row: usize) -> Result<Record> {
        if row >= self.row_count {
            err_at!(InvalidInput, msg: "row {} of {}", row, self.row_count)?;
        }
        let mut record = Record::new();
        for (field, buf) in self.schema.fields().iter().zip(self.columns.iter()) {
            match buf.get(row) {
                Some(val) => record.set(&field.name, val),
                None => err_at!(Fatal, msg: "short column {}", field.name)?,
            }
        }
        Ok(record)
    }

    /// Serialize the whole table as a single-chunk `.ndts` file.
    pub fn save_to_file(&self, file: &ffi::OsStr) -> Result<()> {
        ndts::write_table(file, self)
    }

    /// Reverse of [ColumnarTable::save_to_file]. Verifies the header CRC
    /// and every chunk CRC. Loaded tables carry no indexes.
    pub fn load_from_file(file: &ffi::OsStr) -> Result<ColumnarTable> {
        let (_, table) = ndts::read_all(file)?;
        Ok(table)
    }

    pub fn create_index(&mut self, column: &str) -> Result<()> {
        if self.schema.position(column).is_none() {
            err_at!(ColumnMissing, msg: "{}", column)?;
        }
        if self.has_index(column) {
            return Ok(());
        }

        let mut index = OrderedIndex::new(column);
        let pos = self.schema.position(column).unwrap();
        for row in 0..self.row_count {
            let val = self.columns[pos].get(row).unwrap();
            index.insert(IndexKey::from_value(&val)?, row as u32);
        }
        debug!(target: "table", "indexed column {} with {} keys", column, index.len_keys());
        self.indexes.push(index);

        Ok(())
    }

    pub fn has_index(&self, column: &str) -> bool {
        self.indexes.iter().any(|i| i.as_column() == column)
    }

    pub fn ordered_index(&self, column: &str) -> Option<&OrderedIndex> {
        self.indexes.iter().find(|i| i.as_column() == column)
    }

    pub fn query_index_eq(&self, column: &str, val: &Value) -> Result<Vec<u32>> {
        let index = match self.ordered_index(column) {
            Some(index) => index,
            None => err_at!(InvalidInput, msg: "no index on {}", column)?,
        };
        Ok(index.query_eq(&IndexKey::from_value(val)?))
    }

    /// Rows with `lo <= column <= hi`, `None` bounds are unbounded.
    pub fn query_index_range(
        &self,
        column: &str,
        lo: Option<&Value>,
        hi: Option<&Value>,
    ) -> Result<Vec<u32>> {
        let index = match self.ordered_index(column) {
            Some(index) => index,
            None => err_at!(InvalidInput, msg: "no index on {}", column)?,
        };
        let lo = match lo {
            Some(val) => Some(IndexKey::from_value(val)?),
            None => None,
        };
        let hi = match hi {
            Some(val) => Some(IndexKey::from_value(val)?),
            None => None,
        };
        Ok(index.query_range(lo.as_ref(), hi.as_ref()))
    }

    pub fn query_index_cmp(&self, column: &str, op: CmpOp, val: &Value) -> Result<Vec<u32>> {
        let index = match self.ordered_index(column) {
            Some(index) => index,
            None => err_at!(InvalidInput, msg: "no index on {}", column)?,
        };
        Ok(index.query_cmp(op, &IndexKey::from_value(val)?))
    }

    pub fn create_composite_index(&mut self, columns: &[&str]) -> Result<()> {
        for column in columns {
            if self.schema.position(column).is_none() {
                err_at!(ColumnMissing, msg: "{}", column)?;
            }
        }
        if self.has_composite_index(columns) {
            return Ok(());
        }

        let mut index = CompositeIndex::new(columns);
        let positions: Vec<usize> =
            columns.iter().map(|c| self.schema.position(c).unwrap()).collect();
        for row in 0..self.row_count {
            let key = self.composite_key(&positions, row)?;
            index.insert(key, row as u32);
        }
        debug!(
            target: "table",
            "composite index [{}] with {} keys", columns.join(","), index.len_keys()
        );
        self.composites.push(index);

        Ok(())
    }

    pub fn has_composite_index(&self, columns: &[&str]) -> bool {
        self.composites.iter().any(|i| {
            i.as_columns().len() == columns.len()
                && i.as_columns().iter().zip(columns.iter()).all(|(a, b)| a == b)
        })
    }

    pub fn composite_indexes(&self) -> &[CompositeIndex] {
        &self.composites
    }

    /// Query a composite index by per-column predicates, see
    /// [CompositeIndex::query] for the prefix contract.
    pub fn query_composite_index(
        &self,
        columns: &[&str],
        preds: &BTreeMap<String, ColumnPred>,
    ) -> Result<Vec<u32>> {
        let index = self.composites.iter().find(|i| {
            i.as_columns().len() == columns.len()
                && i.as_columns().iter().zip(columns.iter()).all(|(a, b)| a == b)
        });
        match index {
            Some(index) => index.query(preds),
            None => err_at!(InvalidInput, msg: "no composite index [{}]", columns.join(",")),
        }
    }

    fn composite_key(&self, positions: &[usize], row: usize) -> Result<Vec<IndexKey>> {
        let mut key = Vec::with_capacity(positions.len());
        for pos in positions {
            let val = match self.columns[*pos].get(row) {
                Some(val) => val,
                None => err_at!(Fatal, msg: "short column at {}", pos)?,
            };
            key.push(IndexKey::from_value(&val)?);
        }
        Ok(key)
    }

    // keep every index in sync with a freshly appended row.
    fn index_row(&mut self, row: usize) -> Result<()> {
        if self.indexes.is_empty() && self.composites.is_empty() {
            return Ok(());
        }

        for i in 0..self.indexes.len() {
            let pos = self.schema.position(self.indexes[i].as_column()).unwrap();
            let val = self.columns[pos].get(row).unwrap();
            let key = IndexKey::from_value(&val)?;
            self.indexes[i].insert(key, row as u32);
        }
        for i in 0..self.composites.len() {
            let positions: Vec<usize> = self.composites[i]
                .as_columns()
                .iter()
                .map(|c| self.schema.position(c).unwrap())
                .collect();
            let key = self.composite_key(&positions, row)?;
            self.composites[i].insert(key, row as u32);
        }

        Ok(())
    }

    /// Dictionaries for string columns, schema ordered, used when
    /// persisting this table.
    pub(crate) fn dicts(&self) -> Vec<Option<StrDict>> {
        self.columns.iter().map(|c| c.as_dict().cloned()).collect()
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod table_test;
