use std::{ffi, fs, path};

use crate::{Error, Result};

#[macro_export]
macro_rules! read_file {
    ($fd:expr, $seek:expr, $n:expr, $msg:expr) => {{
        use std::convert::TryFrom;
        use std::io::{Read, Seek};

        match $fd.seek($seek) {
            Ok(_) => {
                let mut buf = vec![0; usize::try_from($n).unwrap()];
                match $fd.read(&mut buf) {
                    Ok(n) if buf.len() == n => Ok(buf),
                    Ok(n) => {
                        let m = buf.len();
                        err_at!(Fatal, msg: concat!($msg, " {}/{} at {:?}"), m, n, $seek)
                    }
                    Err(err) => err_at!(IOError, Err(err)),
                }
            }
            Err(err) => err_at!(IOError, Err(err)),
        }
    }};
}

#[macro_export]
macro_rules! write_file {
    ($fd:expr, $buffer:expr, $file:expr, $msg:expr) => {{
        use std::io::Write;

        match err_at!(IOError, $fd.write($buffer))? {
            n if $buffer.len() == n => Ok(n),
            n => err_at!(
                Fatal, msg: "partial-wr {}, {:?}, {}/{}", $msg, $file, $buffer.len(), n
            ),
        }
    }};
}

/// Create a new file under `file` for read/write access, erroring when the
/// file already exists. Parent directories are created as required.
pub fn create_file_rw(file: &ffi::OsStr) -> Result<fs::File> {
    let os_file = path::Path::new(file);

    {
        let parent = match os_file.parent() {
            Some(parent) => Ok(parent),
            None => err_at!(InvalidFile, msg: "{:?}", file),
        }?;
        err_at!(IOError, fs::create_dir_all(parent))?;
    };

    let mut opts = fs::OpenOptions::new();
    Ok(err_at!(
        IOError,
        opts.read(true).write(true).create_new(true).open(os_file)
    )?)
}

/// Open an existing file for read/write access.
pub fn open_file_rw(file: &ffi::OsStr) -> Result<fs::File> {
    let os_file = path::Path::new(file);
    let mut opts = fs::OpenOptions::new();
    Ok(err_at!(IOError, opts.read(true).write(true).open(os_file))?)
}

/// Open file for reading. Missing file maps to [Error::FileNotFound].
pub fn open_file_r(file: &ffi::OsStr) -> Result<fs::File> {
    let os_file = path::Path::new(file);
    match fs::OpenOptions::new().read(true).open(os_file) {
        Ok(fd) => Ok(fd),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            err_at!(FileNotFound, msg: "{:?} {}", file, err)
        }
        Err(err) => err_at!(IOError, Err(err)),
    }
}

pub fn sync_write(file: &mut fs::File, data: &[u8]) -> Result<usize> {
    use std::io::Write;

    let n = err_at!(IOError, file.write(data))?;
    if n != data.len() {
        err_at!(IOError, msg: "partial write to file {} {}", n, data.len())?
    }
    err_at!(IOError, file.sync_all())?;
    Ok(n)
}

/// Atomically replace `dest` with `temp`. The temp file is synced before the
/// rename and the parent directory after, so a crash leaves either the old
/// file or the new file, never a partial one.
pub fn commit_file(temp: &ffi::OsStr, dest: &ffi::OsStr) -> Result<()> {
    {
        let fd = open_file_rw(temp)?;
        err_at!(IOError, fd.sync_all())?;
    }

    err_at!(IOError, fs::rename(temp, dest))?;

    if let Some(parent) = path::Path::new(dest).parent() {
        if let Ok(dir) = fs::File::open(parent) {
            dir.sync_all().ok();
        }
    }

    Ok(())
}

/// Remove file, missing file is not an error.
pub fn remove_file(file: &ffi::OsStr) -> Result<()> {
    match fs::remove_file(file) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => err_at!(IOError, Err(err)),
    }
}

#[cfg(test)]
#[path = "files_test.rs"]
mod files_test;
