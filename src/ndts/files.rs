use std::{convert::TryFrom, ffi, fmt, path, result};

use crate::{Error, Result};

/// A table file is uniquely locatable by providing `dir` and `name`, where
/// `dir` is the directory in which the file is located and `name` is the
/// unique name for the table. `format!("{}.ndts", name)`
#[derive(Clone)]
pub struct TableFileName(pub ffi::OsString);

impl From<String> for TableFileName {
    fn from(name: String) -> TableFileName {
        let file_name = format!("{}.ndts", name);
        TableFileName(AsRef::<ffi::OsStr>::as_ref(&file_name).to_os_string())
    }
}

impl TryFrom<TableFileName> for String {
    type Error = Error;

    fn try_from(fname: TableFileName) -> Result<String> {
        let fpath = path::Path::new(&fname.0);
        let name = || -> Option<String> {
            let fname = fpath.file_name()?.to_str()?;
            Some(fname.strip_suffix(".ndts")?.to_string())
        }();

        match name {
            Some(name) => Ok(name),
            None => err_at!(InvalidFile, msg: "{:?}", fpath),
        }
    }
}

impl From<TableFileName> for ffi::OsString {
    fn from(name: TableFileName) -> ffi::OsString {
        name.0
    }
}

impl fmt::Display for TableFileName {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self.0.to_str() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// Compose a path to the table file identified by `name` under `dir`.
pub fn to_table_location(dir: &ffi::OsStr, name: &str) -> ffi::OsString {
    let loc: path::PathBuf = [
        dir.to_os_string(),
        TableFileName::from(name.to_string()).into(),
    ]
    .iter()
    .collect();
    loc.into_os_string()
}

/// Tombstone sidecar location for a table file, `<table>.tomb`.
pub fn to_tomb_location(table_loc: &ffi::OsStr) -> ffi::OsString {
    let mut loc = table_loc.to_os_string();
    loc.push(".tomb");
    loc
}

/// Temp-file location used by rewrites, `<table>.tmp`. A leftover temp
/// file from a crashed rewrite is deleted on the next open.
pub fn to_temp_location(table_loc: &ffi::OsStr) -> ffi::OsString {
    let mut loc = table_loc.to_os_string();
    loc.push(".tmp");
    loc
}

#[cfg(test)]
#[path = "files_test.rs"]
mod files_test;
