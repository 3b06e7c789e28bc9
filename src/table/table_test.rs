use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use std::collections::BTreeMap;

use super::*;
use crate::{
    index::{ColumnPred, IndexKey},
    value::ColumnType,
};

fn tick_schema() -> Schema {
    Schema::from_spec(&[
        ("ts", ColumnType::Int64),
        ("price", ColumnType::Float64),
        ("symbol", ColumnType::Str),
    ])
    .unwrap()
}

#[test]
fn test_append_row_count() {
    let seed: u64 = random();
    println!("test_append_row_count seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut table = ColumnarTable::new(tick_schema());
    let mut want = 0;
    for _ in 0..20 {
        let n = rng.gen::<usize>() % 100;
        let records: Vec<Record> = (0..n)
            .map(|i| {
                Record::new()
                    .with("ts", (want + i) as i64)
                    .with("price", rng.gen::<f64>())
                    .with("symbol", ["BTC", "ETH"][rng.gen::<usize>() % 2])
            })
            .collect();
        if rng.gen::<bool>() {
            table.append_batch(&records).unwrap();
        } else {
            for record in records.iter() {
                table.append(record).unwrap();
            }
        }
        want += n;
    }

    assert_eq!(table.len(), want);
    for field in ["ts", "price", "symbol"].iter() {
        assert_eq!(table.get_column(field).unwrap().len(), want);
    }
}

#[test]
fn test_append_missing_field() {
    let mut table = ColumnarTable::new(tick_schema());
    let record = Record::new().with("ts", 1_i64).with("price", 1.0);
    match table.append(&record) {
        Err(crate::Error::MissingField(_, msg)) => assert!(msg.contains("symbol")),
        res => panic!("unexpected {:?}", res),
    }
    // failed append leaves the table untouched.
    assert_eq!(table.len(), 0);

    match table.get_column("nope") {
        Err(crate::Error::ColumnMissing(_, _)) => (),
        res => panic!("unexpected {:?}", res.map(|_| ())),
    }
}

#[test]
fn test_from_columns() {
    let table = ColumnarTable::from_columns(
        tick_schema(),
        vec![
            ColumnVec::I64(vec![1, 2, 3]),
            ColumnVec::F64(vec![1.5, 2.5, 3.5]),
            ColumnVec::Str(vec!["a".to_string(), "b".to_string(), "a".to_string()]),
        ],
    )
    .unwrap();

    assert_eq!(table.len(), 3);
    let rec = table.record_at(2).unwrap();
    assert_eq!(rec.get("price"), Some(&Value::F64(3.5)));
    assert_eq!(rec.get("symbol"), Some(&Value::Str("a".to_string())));

    match ColumnarTable::from_columns(
        tick_schema(),
        vec![
            ColumnVec::I64(vec![1]),
            ColumnVec::F64(vec![]),
            ColumnVec::Str(vec![]),
        ],
    ) {
        Err(crate::Error::InvalidInput(_, _)) => (),
        res => panic!("unexpected {:?}", res.map(|_| ())),
    }
}

#[test]
fn test_index_auto_update() {
    let seed: u64 = random();
    println!("test_index_auto_update seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut table = ColumnarTable::new(tick_schema());
    table.create_index("ts").unwrap();
    table.create_composite_index(&["symbol", "ts"]).unwrap();
    assert!(table.has_index("ts"));
    assert!(table.has_composite_index(&["symbol", "ts"]));
    assert!(!table.has_composite_index(&["ts", "symbol"]));

    let mut rows: Vec<(i64, &str)> = vec![];
    for i in 0..2000 {
        let sym = ["BTC", "ETH", "SOL"][rng.gen::<usize>() % 3];
        let ts = (i * 10) as i64;
        rows.push((ts, sym));
        table
            .append(
                &Record::new().with("ts", ts).with("price", rng.gen::<f64>()).with("symbol", sym),
            )
            .unwrap();
    }

    // ordered index agrees with a scan.
    let mut got = table
        .query_index_range("ts", Some(&Value::I64(5_000)), Some(&Value::I64(6_000)))
        .unwrap();
    got.sort_unstable();
    let want: Vec<u32> = rows
        .iter()
        .enumerate()
        .filter(|(_, (ts, _))| 5_000 <= *ts && *ts <= 6_000)
        .map(|(i, _)| i as u32)
        .collect();
    assert_eq!(got, want);

    // composite prefix query agrees with a scan.
    let preds: BTreeMap<String, ColumnPred> = vec![
        ("symbol".to_string(), ColumnPred::new_eq(IndexKey::Str("ETH".to_string()))),
        (
            "ts".to_string(),
            ColumnPred {
                gte: Some(IndexKey::Int(2_000)),
                lt: Some(IndexKey::Int(8_000)),
                ..ColumnPred::default()
            },
        ),
    ]
    .into_iter()
    .collect();
    let mut got = table.query_composite_index(&["symbol", "ts"], &preds).unwrap();
    got.sort_unstable();
    let want: Vec<u32> = rows
        .iter()
        .enumerate()
        .filter(|(_, (ts, sym))| *sym == "ETH" && 2_000 <= *ts && *ts < 8_000)
        .map(|(i, _)| i as u32)
        .collect();
    assert_eq!(got, want);
}

#[test]
fn test_string_roundtrip_through_file() {
    let dir = std::env::temp_dir().join("ndtsdb-table-roundtrip");
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();

    let mut table = ColumnarTable::new(tick_schema());
    for i in 0..100 {
        table
            .append(
                &Record::new()
                    .with("ts", i as i64)
                    .with("price", i as f64 * 0.5)
                    .with("symbol", ["BTC", "ETH", "SOL"][i % 3]),
            )
            .unwrap();
    }

    let loc = dir.join("t.ndts").into_os_string();
    table.save_to_file(&loc).unwrap();
    let loaded = ColumnarTable::load_from_file(&loc).unwrap();

    assert_eq!(loaded.len(), table.len());
    for row in 0..table.len() {
        assert_eq!(loaded.record_at(row).unwrap(), table.record_at(row).unwrap());
    }

    std::fs::remove_dir_all(&dir).ok();
}
