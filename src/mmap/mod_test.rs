use super::*;
use crate::{ndts::AppendWriter, schema::Schema, table::Record, value::ColumnType};

use std::env;

fn write_symbol(dir: &ffi::OsStr, symbol: &str, base_ts: i64, rows: usize, chunks: usize) {
    let schema = Schema::from_spec(&[
        ("ts", ColumnType::Int64),
        ("price", ColumnType::Float64),
        ("venue", ColumnType::Str),
    ])
    .unwrap();

    let mut writer =
        AppendWriter::open(dir, symbol, schema, crate::ndts::Config::default()).unwrap();
    for chunk in 0..chunks {
        let records: Vec<Record> = (0..rows)
            .map(|i| {
                let n = (chunk * rows + i) as i64;
                Record::new()
                    .with("ts", base_ts + n * 2)
                    .with("price", 100.0 + n as f64)
                    .with("venue", ["spot", "perp"][i % 2])
            })
            .collect();
        writer.append(&records).unwrap();
    }
    writer.close().unwrap();
}

fn test_dir(name: &str) -> ffi::OsString {
    let dir = env::temp_dir().join(format!("ndtsdb-mmap-{}", name));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    dir.into_os_string()
}

#[test]
fn test_pool_views() {
    let dir = test_dir("views");
    write_symbol(&dir, "BTC", 0, 50, 4);
    write_symbol(&dir, "ETH", 1, 30, 2);

    let pool = Pool::init(&dir, &["BTC", "ETH"]).unwrap();
    assert_eq!(pool.get_symbols(), vec!["BTC".to_string(), "ETH".to_string()]);
    assert_eq!(pool.len_of("BTC").unwrap(), 200);
    assert_eq!(pool.len_of("ETH").unwrap(), 60);

    let ts = pool.get_column("BTC", "ts").unwrap();
    assert_eq!(ts.len(), 200);
    for row in 0..200 {
        assert_eq!(ts.get_i64(row), Some(row as i64 * 2));
    }
    assert_eq!(ts.get(200), None);

    let price = pool.get_column("BTC", "price").unwrap();
    assert_eq!(price.get_f64(7), Some(107.0));

    let venue = pool.get_column("ETH", "venue").unwrap();
    assert_eq!(venue.get(0), Some(Value::Str("spot".to_string())));
    assert_eq!(venue.get(1), Some(Value::Str("perp".to_string())));

    // same file+column shares the same backing bytes.
    let again = pool.get_column("BTC", "ts").unwrap();
    assert_eq!(ts.backing_id(), again.backing_id());

    match pool.get_column("BTC", "nope") {
        Err(Error::ColumnMissing(_, _)) => (),
        res => panic!("unexpected {:?}", res.map(|_| ())),
    }
    match pool.get_column("DOGE", "ts") {
        Err(Error::InvalidInput(_, _)) => (),
        res => panic!("unexpected {:?}", res.map(|_| ())),
    }

    pool.close();
}

#[test]
fn test_pool_missing_file() {
    let dir = test_dir("missing");
    match Pool::init(&dir, &["GONE"]) {
        Err(Error::FileNotFound(_, _)) => (),
        res => panic!("unexpected {:?}", res.map(|_| ())),
    }
}

#[test]
fn test_merge_stream() {
    let dir = test_dir("merge");
    // BTC at even timestamps 0,2,4..; ETH offset by one, odd timestamps.
    write_symbol(&dir, "BTC", 0, 40, 2);
    write_symbol(&dir, "ETH", 1, 40, 2);
    // SOL collides with BTC timestamps, ordinal breaks the tie.
    write_symbol(&dir, "SOL", 0, 10, 1);

    let pool = Pool::init(&dir, &["BTC", "ETH", "SOL"]).unwrap();
    let stream = MergeStream::new(&pool, &["BTC", "ETH", "SOL"], "ts").unwrap();
    let merged: Vec<(usize, usize, i64)> = stream.collect();

    assert_eq!(merged.len(), 80 + 80 + 10);

    // nondecreasing timestamps, ties in symbol-ordinal order.
    for pair in merged.windows(2) {
        let ((a_ord, _, a_ts), (b_ord, _, b_ts)) = (pair[0], pair[1]);
        assert!(a_ts <= b_ts, "{} > {}", a_ts, b_ts);
        if a_ts == b_ts {
            assert!(a_ord < b_ord);
        }
    }

    // first few: ts=0 from BTC then SOL, ts=1 from ETH.
    assert_eq!(merged[0], (0, 0, 0));
    assert_eq!(merged[1], (2, 0, 0));
    assert_eq!(merged[2], (1, 0, 1));

    // per-symbol row order is preserved.
    let btc_rows: Vec<usize> =
        merged.iter().filter(|(o, _, _)| *o == 0).map(|(_, r, _)| *r).collect();
    assert_eq!(btc_rows, (0..80).collect::<Vec<usize>>());
}

#[test]
fn test_column_view_iter() {
    let dir = test_dir("iter");
    write_symbol(&dir, "BTC", 0, 10, 1);

    let pool = Pool::init(&dir, &["BTC"]).unwrap();
    let view = pool.get_column("BTC", "price").unwrap();
    let got: Vec<Value> = view.iter().collect();
    assert_eq!(got.len(), 10);
    assert_eq!(got[3], Value::F64(103.0));
}
