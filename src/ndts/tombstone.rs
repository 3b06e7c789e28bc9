use std::ffi;

use crate::{index::RowSet, ndts, util, Error, Result};

// sidecar layout: magic(4) version(u16) len(u32) bitmap-bytes crc32(u32),
// crc over everything before it.
const TOMB_MAGIC: [u8; 4] = *b"NDTB";

/// Load the tombstone sidecar for `table_loc`. A missing sidecar is an
/// empty set.
pub(crate) fn load(table_loc: &ffi::OsStr) -> Result<RowSet> {
    let loc = ndts::to_tomb_location(table_loc);
    let buf = match util::files::open_file_r(&loc) {
        Ok(mut fd) => {
            use std::io::Read;
            let mut buf = vec![];
            err_at!(IOError, fd.read_to_end(&mut buf))?;
            buf
        }
        Err(Error::FileNotFound(_, _)) => return Ok(RowSet::new()),
        Err(err) => return Err(err),
    };

    let mut off = 0;
    match util::read_bytes(&buf, &mut off, 4) {
        Some(magic) if magic == TOMB_MAGIC => (),
        _ => err_at!(CorruptHeader, msg: "bad tombstone magic {:?}", loc)?,
    }
    match util::read_u16(&buf, &mut off) {
        Some(version) if version == ndts::VERSION => (),
        _ => err_at!(InvalidFile, msg: "bad tombstone version {:?}", loc)?,
    }
    let len = match util::read_u32(&buf, &mut off) {
        Some(len) => util::to_usize(len)?,
        None => err_at!(CorruptHeader, msg: "truncated tombstone {:?}", loc)?,
    };
    let bytes = match util::read_bytes(&buf, &mut off, len) {
        Some(bytes) => bytes,
        None => err_at!(CorruptHeader, msg: "truncated tombstone {:?}", loc)?,
    };

    let crc_off = off;
    let crc = match util::read_u32(&buf, &mut off) {
        Some(crc) => crc,
        None => err_at!(CorruptHeader, msg: "truncated tombstone crc {:?}", loc)?,
    };
    let computed = util::crc32(&buf[..crc_off]);
    if crc != computed {
        err_at!(CorruptHeader, msg: "tombstone crc {:x} != {:x}", crc, computed)?;
    }

    Ok(RowSet::from_bytes(bytes))
}

/// Persist the tombstone set, atomically replacing any previous sidecar.
pub(crate) fn save(table_loc: &ffi::OsStr, rows: &RowSet) -> Result<()> {
    use std::convert::TryFrom;

    let loc = ndts::to_tomb_location(table_loc);

    let mut buf: Vec<u8> = vec![];
    let bytes = rows.to_bytes();
    buf.extend_from_slice(&TOMB_MAGIC);
    util::write_u16(&mut buf, ndts::VERSION);
    util::write_u32(&mut buf, err_at!(FailConvert, u32::try_from(bytes.len()))?);
    buf.extend_from_slice(&bytes);
    let crc = util::crc32(&buf);
    util::write_u32(&mut buf, crc);

    let temp = ndts::to_temp_location(&loc);
    util::files::remove_file(&temp)?;
    let mut fd = util::files::create_file_rw(&temp)?;
    util::files::sync_write(&mut fd, &buf)?;
    util::files::commit_file(&temp, &loc)
}

/// Drop the sidecar, done after a compaction commits.
pub(crate) fn unlink(table_loc: &ffi::OsStr) -> Result<()> {
    util::files::remove_file(&ndts::to_tomb_location(table_loc))
}

/// Whether a sidecar exists for `table_loc`.
pub(crate) fn exists(table_loc: &ffi::OsStr) -> bool {
    std::path::Path::new(&ndts::to_tomb_location(table_loc)).exists()
}
