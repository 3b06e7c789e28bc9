//! Module implement the index layer.
//!
//! Three index shapes serve the query planner,
//!
//! * [OrderedIndex], sorted map from a single column's key to row
//!   positions, answering exact, `<`, `>` and `[lo,hi]` queries.
//! * [CompositeIndex], sorted map over tuple keys in lexicographic order,
//!   queried by a prefix of predicates - equalities on leading columns and
//!   at most one range on the next.
//! * [RowSet], roaring bitmap of row positions, the planner's candidate
//!   set representation and the pushdown for `IN` predicates.
//!
//! Indexes address rows by their 0-based position; a file rewrite renumbers
//! rows and invalidates indexes, owners rebuild them.

mod bitmap;
mod composite;
mod ordered;

pub use bitmap::RowSet;
pub use composite::{ColumnPred, CompositeIndex};
pub use ordered::{CmpOp, FloatKey, IndexKey, OrderedIndex};
