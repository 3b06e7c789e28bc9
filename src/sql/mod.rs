//! Module implement a SQL subset over columnar tables.
//!
//! The surface is SELECT (with WITH/CTEs, joins, subqueries, GROUP
//! BY/HAVING, window functions, ORDER BY and LIMIT) plus INSERT. Text is
//! lexed by [Lex], parsed by a recursive-descent [parse] into an AST, and
//! run by the interpretive [Executor],
//!
//! ```text
//! text -> Statement -> bind tables -> index planning -> scan/filter
//!      -> join -> group/having -> window -> project -> order -> limit
//! ```
//!
//! Index planning decomposes the WHERE clause into AND-factors and picks
//! the index covering the most of them - composite prefix first, then
//! single-column ordered indexes, then roaring bitmaps for `IN` literal
//! lists - producing a candidate row set for the scan; unconsumed factors
//! stay behind as residual filters.

use std::{fmt, result};

mod aggregate;
mod ast;
mod eval;
mod exec;
mod lex;
mod parser;
mod plan;
mod window;

pub use aggregate::{Accum, AggKind};
pub use ast::{
    BinaryOp, Expr, Frame, FrameBound, InList, Insert, Join, JoinKind, OrderSpec,
    Projection, Select, Statement, TableRef, UnaryOp, WindowSpec,
};
pub use exec::{Cancel, Executor, ResultSet};
pub use lex::{Lex, Token, TokenKind};
pub use parser::parse;
pub use plan::extract_time_range;

/// Type position in `(line_no, col_no)` format within the query text.
/// Both `line_no` and `col_no` start from 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position(pub usize, pub usize);

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "({},{})", self.0, self.1)
    }
}
