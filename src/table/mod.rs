//! Module implement the in-memory columnar table.
//!
//! A [ColumnarTable] owns one typed, growable buffer per schema column.
//! Buffers grow by power-of-two doubling and always share the same row
//! count. String columns are dictionary encoded, values are u32 codes into
//! a per-column, first-seen-order [StrDict]; codes are stable once
//! assigned.
//!
//! Tables can be saved to and loaded from single-chunk `.ndts` files, and
//! carry optional ordered / composite indexes that auto-update on append.

mod column;
mod record;
mod table;

pub use column::{columnize, ColumnBuffer, ColumnData, ColumnRef, ColumnVec, StrDict};
pub use record::Record;
pub use table::ColumnarTable;
