use super::*;
use crate::{
    schema::Schema,
    sql::{ast::Statement, parse},
    table::Record,
    value::ColumnType,
};

fn where_of(text: &str) -> Expr {
    match parse(text).unwrap() {
        Statement::Select(select) => select.where_.unwrap(),
        stmt => panic!("unexpected {:?}", stmt),
    }
}

fn seeded_table() -> ColumnarTable {
    let schema = Schema::from_spec(&[
        ("symbol", ColumnType::Str),
        ("timestamp", ColumnType::Int64),
        ("price", ColumnType::Float64),
    ])
    .unwrap();

    let mut table = ColumnarTable::new(schema);
    for i in 0..1000 {
        let sym = ["BTC", "ETH", "SOL", "ADA"][i % 4];
        table
            .append(
                &Record::new()
                    .with("symbol", sym)
                    .with("timestamp", (i * 1000) as i64)
                    .with("price", i as f64),
            )
            .unwrap();
    }
    table
}

#[test]
fn test_composite_preferred_over_single() {
    let mut table = seeded_table();
    table.create_index("timestamp").unwrap();
    table.create_composite_index(&["symbol", "timestamp"]).unwrap();

    let where_ = where_of(
        "SELECT * FROM t WHERE symbol = 'BTC' AND timestamp >= 100000 AND timestamp < 200000",
    );
    let factors = where_.and_factors();

    let plan = try_use_index(&table, &factors).unwrap().unwrap();
    assert_eq!(plan.chosen, "composite(symbol,timestamp)");
    assert_eq!(plan.consumed.len(), 3);

    let mut got = plan.candidate.to_vec();
    got.sort_unstable();
    let want: Vec<u32> =
        (0..1000_u32).filter(|i| i % 4 == 0 && *i >= 100 && *i < 200).collect();
    assert_eq!(got, want);
}

#[test]
fn test_single_column_range() {
    let mut table = seeded_table();
    table.create_index("timestamp").unwrap();

    let where_ = where_of("SELECT * FROM t WHERE timestamp > 5000 AND timestamp <= 9000");
    let plan = try_use_index(&table, &where_.and_factors()).unwrap().unwrap();
    assert_eq!(plan.chosen, "ordered(timestamp)");
    assert_eq!(plan.consumed.len(), 2);
    assert_eq!(plan.candidate.to_vec(), vec![6, 7, 8, 9]);
}

#[test]
fn test_in_list_bitmap() {
    let mut table = seeded_table();
    table.create_index("symbol").unwrap();

    let where_ = where_of("SELECT * FROM t WHERE symbol IN ('BTC', 'SOL')");
    let plan = try_use_index(&table, &where_.and_factors()).unwrap().unwrap();
    assert_eq!(plan.chosen, "bitmap(symbol)");
    assert_eq!(plan.candidate.len(), 500);
    assert!(plan.candidate.contains(0)); // BTC
    assert!(plan.candidate.contains(2)); // SOL
    assert!(!plan.candidate.contains(1)); // ETH
}

#[test]
fn test_no_index_no_plan() {
    let table = seeded_table();
    let where_ = where_of("SELECT * FROM t WHERE timestamp > 5000");
    assert!(try_use_index(&table, &where_.and_factors()).unwrap().is_none());

    // unrecognizable factors fall back to a full scan as well.
    let mut table = seeded_table();
    table.create_index("price").unwrap();
    let where_ = where_of("SELECT * FROM t WHERE price * 2 > 10");
    assert!(try_use_index(&table, &where_.and_factors()).unwrap().is_none());
}

#[test]
fn test_extract_time_range() {
    let where_ = where_of(
        "SELECT * FROM t WHERE symbol = 'BTC' AND timestamp >= 1000 AND timestamp < 5000",
    );
    assert_eq!(extract_time_range(&where_, "timestamp"), Some((1000, 4999)));

    let where_ = where_of("SELECT * FROM t WHERE timestamp BETWEEN 10 AND 20");
    assert_eq!(extract_time_range(&where_, "timestamp"), Some((10, 20)));

    let where_ = where_of("SELECT * FROM t WHERE timestamp > 7");
    assert_eq!(extract_time_range(&where_, "timestamp"), Some((8, i64::MAX)));

    let where_ = where_of("SELECT * FROM t WHERE price > 7");
    assert_eq!(extract_time_range(&where_, "timestamp"), None);

    // flipped operand order still recognized.
    let where_ = where_of("SELECT * FROM t WHERE 1000 <= timestamp");
    assert_eq!(extract_time_range(&where_, "timestamp"), Some((1000, i64::MAX)));
}
