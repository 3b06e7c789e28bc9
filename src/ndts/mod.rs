//! Module implement the on-disk `.ndts` append-log file format.
//!
//! A file is `Header · Chunk*`. The header carries magic, version, the
//! schema as JSON, the running `(total_rows, chunk_count)` pair, the string
//! dictionaries as JSON, and a CRC32 over everything before it. Each chunk
//! is `row_count · payload_len · codec_flags · payloads · crc32`, with one
//! payload per schema column, raw or compressed via [crate::codec].
//!
//! Readers trust only what CRC validates: `total_rows` and `chunk_count`
//! always reflect fully committed chunks, trailing bytes from an
//! interrupted append are ignored and truncated on the next open.
//!
//! Logical deletes are tombstones in a `<file>.tomb` sidecar, physical
//! deletes and updates are atomic rewrites (temp + fsync + rename), and
//! [AppendWriter::compact] folds tombstones into a rewrite. On close, the
//! writer consults [Config] thresholds and compacts automatically.

use arbitrary::{Arbitrary, Unstructured};

mod chunk;
mod files;
mod header;
mod tombstone;
mod writer;

pub use chunk::ChunkInfo;
pub(crate) use chunk::{decode_column, scan_chunk};
pub use files::{to_table_location, to_tomb_location, to_temp_location, TableFileName};
pub use header::Header;
pub use writer::{
    delete_where, read_all, read_filtered, read_header, update_where, verify, write_table,
    AppendWriter, ChunkStat, DeleteStat, RewriteOpts, Stats, Verify,
};

/// File magic, first four bytes of every `.ndts` file.
pub const MAGIC: [u8; 4] = *b"NDTS";
/// Current format version. Unknown versions are a hard error.
pub const VERSION: u16 = 1;

/// Default number of rows per chunk for rewrites.
pub const BATCH_SIZE: usize = 8 * 1024;
/// Default reserve for the header's dictionary region.
pub const DICT_RESERVE: usize = 4 * 1024;
/// Default tombstone ratio beyond which close() compacts.
pub const COMPACT_THRESHOLD: f64 = 0.3;
/// Tombstone ratio is only consulted for files at least this big.
pub const COMPACT_MIN_ROWS: u64 = 1024;
/// Default chunk-count limit beyond which close() compacts.
pub const COMPACT_MAX_CHUNKS: u32 = 256;
/// Default cumulative rows written since the last compact beyond which
/// close() compacts.
pub const COMPACT_MAX_WRITES: u64 = 8 * 1024 * 1024;
/// Default file-size limit beyond which close() compacts.
pub const COMPACT_MAX_FILE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Configuration for [AppendWriter].
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable fsync for every appended chunk and header update.
    pub fsync: bool,
    /// Rows per chunk while rewriting (delete_where, update_where,
    /// compact).
    pub batch_size: usize,
    /// Enable threshold-driven compaction on close().
    pub auto_compact: bool,
    /// Compact when `deleted/total >= compact_threshold`, provided the
    /// file holds at least `compact_min_rows`.
    pub compact_threshold: f64,
    pub compact_min_rows: u64,
    /// Compact when the file holds more than this many chunks.
    pub compact_max_chunks: u32,
    /// Compact when this many rows were appended since the last compact.
    pub compact_max_writes: u64,
    /// Compact when the file grows past this many bytes.
    pub compact_max_file_size: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            fsync: false,
            batch_size: BATCH_SIZE,
            auto_compact: true,
            compact_threshold: COMPACT_THRESHOLD,
            compact_min_rows: COMPACT_MIN_ROWS,
            compact_max_chunks: COMPACT_MAX_CHUNKS,
            compact_max_writes: COMPACT_MAX_WRITES,
            compact_max_file_size: COMPACT_MAX_FILE_SIZE,
        }
    }
}

impl<'a> Arbitrary<'a> for Config {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let batch_size = *u.choose(&[16, 256, 1024, 8192])?;
        let fsync: bool = u.arbitrary()?;
        let auto_compact: bool = u.arbitrary()?;
        let compact_max_chunks = *u.choose(&[4, 64, 256])?;

        let config = Config {
            fsync,
            batch_size,
            auto_compact,
            compact_max_chunks,
            ..Config::default()
        };
        Ok(config)
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    pub fn set_fsync(&mut self, fsync: bool) -> &mut Self {
        self.fsync = fsync;
        self
    }

    pub fn set_batch_size(&mut self, batch_size: usize) -> &mut Self {
        self.batch_size = batch_size;
        self
    }

    pub fn set_auto_compact(&mut self, auto_compact: bool) -> &mut Self {
        self.auto_compact = auto_compact;
        self
    }

    pub fn set_compact_threshold(&mut self, ratio: f64, min_rows: u64) -> &mut Self {
        self.compact_threshold = ratio;
        self.compact_min_rows = min_rows;
        self
    }

    pub fn set_compact_max_chunks(&mut self, chunks: u32) -> &mut Self {
        self.compact_max_chunks = chunks;
        self
    }

    pub fn set_compact_max_writes(&mut self, rows: u64) -> &mut Self {
        self.compact_max_writes = rows;
        self
    }

    pub fn set_compact_max_file_size(&mut self, bytes: u64) -> &mut Self {
        self.compact_max_file_size = bytes;
        self
    }
}
