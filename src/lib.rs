//! Package ndtsdb implement a columnar time-series storage and query engine.
//!
//! Data is organised as tables of typed columns, where column types are
//! limited to `{int32, int64, float32, float64, string}` and string columns
//! are dictionary encoded. Tables live in memory as [ColumnarTable] and on
//! disk as `.ndts` append files made up of CRC protected chunks. An engine
//! instance is composed from the following building blocks,
//!
//! * [table] module, in-memory columnar table with typed column buffers,
//!   amortized growth and dictionary encoded strings.
//! * [ndts] module, on-disk append-log file format, its [AppendWriter],
//!   tombstone based deletes and compaction.
//! * [mmap] module, read-only memory-mapped pool over many `.ndts` files
//!   giving zero-copy column views and a merge-scan across files.
//! * [index] module, ordered single-column index, ordered composite index
//!   with prefix matching and a roaring-bitmap row-set.
//! * [partition] module, time/hash partitioned tables with partition
//!   pruning for range queries.
//! * [sql] module, a SQL subset - lexer, recursive-descent parser, and an
//!   index-aware interpretive executor.
//! * [series] module, time-series query primitives - SAMPLE BY, OHLCV,
//!   LATEST ON, moving aggregates and their streaming variants.
//!
//! Concurrency model is single-writer, multi-reader. An [AppendWriter]
//! exclusively owns its file, guarded by an advisory lock. Readers can
//! open the same file concurrently via [ndts::read_all] or [mmap::Pool].
//!
//! [ColumnarTable]: crate::table::ColumnarTable
//! [AppendWriter]: crate::ndts::AppendWriter

use std::{error, fmt, result};

/// Short form to compose Error values.
///
/// Here are few possible ways,
///
/// ```ignore
/// use crate::Error;
/// err_at!(ParseSQL, msg: "bad argument");
/// ```
///
/// ```ignore
/// use crate::Error;
/// err_at!(IOError, std::io::read(buf));
/// ```
///
/// ```ignore
/// use crate::Error;
/// err_at!(IOError, std::fs::read(file_path), "read failed");
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err($crate::Error::$v(prefix, format!($($arg),+)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(prefix, format!("{}", err)))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                let msg = format!($($arg),+);
                Err($crate::Error::$v(prefix, format!("{} {}", err, msg)))
            }
        }
    }};
}

pub mod codec;
pub mod index;
pub mod mmap;
pub mod ndts;
pub mod partition;
pub mod schema;
pub mod series;
pub mod sql;
pub mod table;
pub mod util;
pub mod value;

pub use crate::schema::{Field, Schema};
pub use crate::table::{ColumnarTable, Record};
pub use crate::value::{ColumnType, Value};

/// Type alias for Result return type, used by this package.
pub type Result<T> = result::Result<T, Error>;

/// Error variants that can be returned by this package's API.
///
/// Each variant carries a prefix, typically identifying the
/// error location, like `file:line-no`.
#[derive(Clone)]
pub enum Error {
    Fatal(String, String),
    FailConvert(String, String),
    IOError(String, String),
    InvalidFile(String, String),
    InvalidInput(String, String),
    ThreadFail(String, String),
    /// Reopen or append with an incompatible schema.
    SchemaMismatch(String, String),
    /// Append record is missing a declared column.
    MissingField(String, String),
    /// Value cannot be coerced to the column kind.
    TypeFail(String, String),
    /// Header CRC mismatch or truncated header.
    CorruptHeader(String, String),
    /// Chunk CRC mismatch or truncation, carries the chunk ordinal.
    CorruptChunk(String, usize, String),
    FileNotFound(String, String),
    /// Column access by unknown name.
    ColumnMissing(String, String),
    /// Composite-index predicates do not form a usable prefix.
    IndexMismatch(String, String),
    /// SQL syntax error, message carries the source position.
    ParseSQL(String, String),
    /// SQL planning error, like HAVING without GROUP BY.
    PlanSQL(String, String),
    /// SQL operand mismatch at runtime.
    TypeSQL(String, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        use Error::*;

        match self {
            Fatal(p, msg) => write!(f, "{} Fatal: {}", p, msg),
            FailConvert(p, msg) => write!(f, "{} FailConvert: {}", p, msg),
            IOError(p, msg) => write!(f, "{} IOError: {}", p, msg),
            InvalidFile(p, msg) => write!(f, "{} InvalidFile: {}", p, msg),
            InvalidInput(p, msg) => write!(f, "{} InvalidInput: {}", p, msg),
            ThreadFail(p, msg) => write!(f, "{} ThreadFail: {}", p, msg),
            SchemaMismatch(p, msg) => write!(f, "{} SchemaMismatch: {}", p, msg),
            MissingField(p, msg) => write!(f, "{} MissingField: {}", p, msg),
            TypeFail(p, msg) => write!(f, "{} TypeFail: {}", p, msg),
            CorruptHeader(p, msg) => write!(f, "{} CorruptHeader: {}", p, msg),
            CorruptChunk(p, i, msg) => write!(f, "{} CorruptChunk({}): {}", p, i, msg),
            FileNotFound(p, msg) => write!(f, "{} FileNotFound: {}", p, msg),
            ColumnMissing(p, msg) => write!(f, "{} ColumnMissing: {}", p, msg),
            IndexMismatch(p, msg) => write!(f, "{} IndexMismatch: {}", p, msg),
            ParseSQL(p, msg) => write!(f, "{} ParseSQL: {}", p, msg),
            PlanSQL(p, msg) => write!(f, "{} PlanSQL: {}", p, msg),
            TypeSQL(p, msg) => write!(f, "{} TypeSQL: {}", p, msg),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{}", self)
    }
}

impl error::Error for Error {}

impl Error {
    /// Ordinal of the offending chunk, for [Error::CorruptChunk] values.
    pub fn to_chunk_ordinal(&self) -> Option<usize> {
        match self {
            Error::CorruptChunk(_, i, _) => Some(*i),
            _ => None,
        }
    }
}
