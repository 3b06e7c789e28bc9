use super::*;
use crate::{schema::Schema, series, value::ColumnType, Error};

fn trades_table(n: usize) -> ColumnarTable {
    let schema = Schema::from_spec(&[
        ("symbol", ColumnType::Str),
        ("timestamp", ColumnType::Int64),
        ("price", ColumnType::Float64),
        ("qty", ColumnType::Int64),
    ])
    .unwrap();

    let mut table = ColumnarTable::new(schema);
    for i in 0..n {
        let sym = ["BTC", "ETH", "SOL"][i % 3];
        table
            .append(
                &Record::new()
                    .with("symbol", sym)
                    .with("timestamp", (i * 1000) as i64)
                    .with("price", 100.0 + (i % 50) as f64)
                    .with("qty", (i % 7) as i64),
            )
            .unwrap();
    }
    table
}

fn executor(n: usize) -> Executor {
    let mut exec = Executor::new();
    exec.register("trades", trades_table(n));
    exec
}

#[test]
fn test_select_project_filter() {
    let mut exec = executor(300);
    let rs = exec
        .execute("SELECT symbol, price * qty AS notional FROM trades WHERE qty > 5")
        .unwrap();

    assert_eq!(rs.columns, vec!["symbol".to_string(), "notional".to_string()]);
    assert_eq!(rs.row_count, 300 / 7);
    for row in rs.rows.iter() {
        assert!(matches!(row[0], Value::Str(_)));
        assert!(matches!(row[1], Value::F64(_)));
    }

    // SELECT without FROM evaluates one row.
    let rs = exec.execute("SELECT 1 + 2 AS three").unwrap();
    assert_eq!(rs.rows, vec![vec![Value::I64(3)]]);
}

#[test]
fn test_indexed_range_scan_s4() {
    let schema = Schema::from_spec(&[
        ("timestamp", ColumnType::Int64),
        ("price", ColumnType::Float64),
    ])
    .unwrap();
    let mut table = ColumnarTable::new(schema);
    for i in 0..10_000 {
        table
            .append(
                &Record::new()
                    .with("timestamp", (i * 1000) as i64)
                    .with("price", i as f64),
            )
            .unwrap();
    }
    table.create_index("timestamp").unwrap();

    let mut exec = Executor::new();
    exec.register("t", table);

    let rs = exec
        .execute(
            "SELECT price FROM t WHERE timestamp >= 5000000 AND timestamp < 6000000 \
             ORDER BY timestamp ASC",
        )
        .unwrap();
    assert_eq!(rs.row_count, 1000);
    assert_eq!(rs.chosen_index.as_deref(), Some("ordered(timestamp)"));
    assert_eq!(rs.rows[0], vec![Value::F64(5000.0)]);
    assert_eq!(rs.rows[999], vec![Value::F64(5999.0)]);

    // same result without the index.
    let mut bare = Executor::new();
    bare.register("t", {
        let schema = Schema::from_spec(&[
            ("timestamp", ColumnType::Int64),
            ("price", ColumnType::Float64),
        ])
        .unwrap();
        let mut table = ColumnarTable::new(schema);
        for i in 0..10_000 {
            table
                .append(
                    &Record::new()
                        .with("timestamp", (i * 1000) as i64)
                        .with("price", i as f64),
                )
                .unwrap();
        }
        table
    });
    let rs2 = bare
        .execute(
            "SELECT price FROM t WHERE timestamp >= 5000000 AND timestamp < 6000000 \
             ORDER BY timestamp ASC",
        )
        .unwrap();
    assert_eq!(rs2.chosen_index, None);
    assert_eq!(rs.rows, rs2.rows);
}

#[test]
fn test_composite_prefix_s5() {
    let schema = Schema::from_spec(&[
        ("region", ColumnType::Str),
        ("city", ColumnType::Str),
        ("timestamp", ColumnType::Int64),
        ("value", ColumnType::Float64),
    ])
    .unwrap();
    let mut table = ColumnarTable::new(schema);
    let rows: Vec<(&str, &str, i64, f64)> = vec![
        ("US", "NYC", 1000, 1.0),
        ("US", "NYC", 2500, 2.0),
        ("US", "SFO", 3000, 3.0),
        ("EU", "AMS", 2500, 4.0),
        ("US", "NYC", 3500, 5.0),
    ];
    for (region, city, ts, value) in rows {
        table
            .append(
                &Record::new()
                    .with("region", region)
                    .with("city", city)
                    .with("timestamp", ts)
                    .with("value", value),
            )
            .unwrap();
    }
    table.create_composite_index(&["region", "city", "timestamp"]).unwrap();

    let mut exec = Executor::new();
    exec.register("metrics", table);

    let rs = exec
        .execute(
            "SELECT value FROM metrics \
             WHERE region = 'US' AND city = 'NYC' AND timestamp >= 2000",
        )
        .unwrap();
    assert_eq!(rs.chosen_index.as_deref(), Some("composite(region,city,timestamp)"));
    assert_eq!(rs.row_count, 2);
    let mut got: Vec<f64> =
        rs.rows.iter().map(|r| r[0].as_f64().unwrap()).collect();
    got.sort_by(f64::total_cmp);
    assert_eq!(got, vec![2.0, 5.0]);
}

#[test]
fn test_group_by_having() {
    let mut exec = executor(300);
    let rs = exec
        .execute(
            "SELECT symbol, COUNT(*) AS n, AVG(price) AS avg_price, \
             MIN(qty) AS lo, MAX(qty) AS hi \
             FROM trades GROUP BY symbol HAVING COUNT(*) > 10 ORDER BY symbol",
        )
        .unwrap();

    assert_eq!(rs.row_count, 3);
    assert_eq!(rs.columns[0], "symbol");
    assert_eq!(rs.rows[0][0], Value::Str("BTC".to_string()));
    assert_eq!(rs.rows[0][1], Value::I64(100));
    assert_eq!(rs.rows[1][0], Value::Str("ETH".to_string()));
    assert_eq!(rs.rows[2][0], Value::Str("SOL".to_string()));

    // aggregates without GROUP BY fold into a single row.
    let rs = exec.execute("SELECT COUNT(*), SUM(qty), STDDEV(price) FROM trades").unwrap();
    assert_eq!(rs.row_count, 1);
    assert_eq!(rs.rows[0][0], Value::I64(300));

    match exec.execute("SELECT symbol FROM trades HAVING COUNT(*) > 1") {
        Err(Error::PlanSQL(_, msg)) => assert_eq!(msg, "HAVING requires GROUP BY"),
        res => panic!("unexpected {:?}", res),
    }
}

#[test]
fn test_joins_s12() {
    let mut exec = executor(30);

    let meta_schema = Schema::from_spec(&[
        ("symbol", ColumnType::Str),
        ("venue", ColumnType::Str),
    ])
    .unwrap();
    let mut meta = ColumnarTable::new(meta_schema);
    for (sym, venue) in [("BTC", "spot"), ("ETH", "perp")].iter() {
        meta.append(&Record::new().with("symbol", *sym).with("venue", *venue)).unwrap();
    }
    exec.register("meta", meta);

    // INNER JOIN equals the manual equi-join: SOL rows drop out.
    let rs = exec
        .execute(
            "SELECT t.symbol, m.venue FROM trades t \
             INNER JOIN meta m ON t.symbol = m.symbol",
        )
        .unwrap();
    assert_eq!(rs.row_count, 20);
    for row in rs.rows.iter() {
        match row[0].as_str().unwrap() {
            "BTC" => assert_eq!(row[1], Value::Str("spot".to_string())),
            "ETH" => assert_eq!(row[1], Value::Str("perp".to_string())),
            sym => panic!("unexpected {}", sym),
        }
    }

    // LEFT JOIN keeps one row per left row, padding with nulls.
    let rs = exec
        .execute(
            "SELECT t.symbol, m.venue FROM trades t \
             LEFT JOIN meta m ON t.symbol = m.symbol",
        )
        .unwrap();
    assert_eq!(rs.row_count, 30);
    let nulls = rs.rows.iter().filter(|r| r[1].is_null()).count();
    assert_eq!(nulls, 10); // the SOL rows

    // non-equi ON goes through the nested loop.
    let rs = exec
        .execute(
            "SELECT t.qty FROM trades t INNER JOIN meta m \
             ON t.symbol = m.symbol AND t.qty > 3",
        )
        .unwrap();
    assert!(rs.rows.iter().all(|r| r[0].as_i64().unwrap() > 3));
}

#[test]
fn test_in_subquery_s12() {
    let mut exec = executor(30);

    let ids_schema = Schema::from_spec(&[("symbol", ColumnType::Str)]).unwrap();
    let mut ids = ColumnarTable::new(ids_schema);
    ids.append(&Record::new().with("symbol", "ETH")).unwrap();
    exec.register("watchlist", ids);

    let rs = exec
        .execute(
            "SELECT COUNT(*) AS n FROM trades \
             WHERE symbol IN (SELECT symbol FROM watchlist)",
        )
        .unwrap();
    assert_eq!(rs.rows[0][0], Value::I64(10));

    // empty subquery result yields zero rows.
    let rs = exec
        .execute(
            "SELECT * FROM trades \
             WHERE symbol IN (SELECT symbol FROM watchlist WHERE symbol = 'XXX')",
        )
        .unwrap();
    assert_eq!(rs.row_count, 0);

    // integer subquery uses the bitmap path and agrees with a scan.
    let rs = exec
        .execute(
            "SELECT COUNT(*) FROM trades \
             WHERE qty IN (SELECT qty FROM trades WHERE qty > 4)",
        )
        .unwrap();
    let want = exec.execute("SELECT COUNT(*) FROM trades WHERE qty > 4").unwrap();
    assert_eq!(rs.rows[0][0], want.rows[0][0]);

    // scalar subquery in an expression.
    let rs = exec
        .execute("SELECT (SELECT MAX(qty) FROM trades) + 1 AS m")
        .unwrap();
    assert_eq!(rs.rows[0][0], Value::I64(7));
}

#[test]
fn test_derived_table_and_cte() {
    let mut exec = executor(60);

    let rs = exec
        .execute(
            "SELECT d.symbol, d.n FROM \
             (SELECT symbol, COUNT(*) AS n FROM trades GROUP BY symbol) d \
             WHERE d.n > 10 ORDER BY d.symbol",
        )
        .unwrap();
    assert_eq!(rs.row_count, 3);
    assert_eq!(rs.rows[0], vec![Value::Str("BTC".to_string()), Value::I64(20)]);

    let rs = exec
        .execute(
            "WITH hot AS (SELECT * FROM trades WHERE price > 140) \
             SELECT COUNT(*) FROM hot",
        )
        .unwrap();
    let want = exec.execute("SELECT COUNT(*) FROM trades WHERE price > 140").unwrap();
    assert_eq!(rs.rows[0][0], want.rows[0][0]);
}

#[test]
fn test_window_fast_path_s6() {
    let mut exec = executor(100);

    let rs = exec
        .execute(
            "WITH p AS (SELECT *, ROW_NUMBER() OVER \
             (PARTITION BY symbol ORDER BY timestamp DESC) rn FROM trades) \
             SELECT symbol, timestamp FROM p WHERE rn = 1 ORDER BY symbol",
        )
        .unwrap();
    assert_eq!(rs.row_count, 3);

    // equal to latest_on over the same data.
    let table = trades_table(100);
    let (symbols, ts) = {
        let sym_col = table.get_column("symbol").unwrap();
        let codes: Vec<u32> = match sym_col {
            crate::table::ColumnRef::Str { codes, .. } => codes.to_vec(),
            _ => unreachable!(),
        };
        let ts_col = table.get_column("timestamp").unwrap();
        let ts: Vec<i64> = (0..table.len()).map(|i| ts_col.as_i64(i).unwrap()).collect();
        (codes, ts)
    };
    let latest = series::latest_on(&symbols, &ts);

    for (code, row) in latest {
        let sym = match table.value_at(0, row).unwrap() {
            Value::Str(s) => s,
            _ => unreachable!(),
        };
        let want_ts = ts[row];
        let got = rs
            .rows
            .iter()
            .find(|r| r[0] == Value::Str(sym.clone()))
            .unwrap_or_else(|| panic!("missing {} (code {})", sym, code));
        assert_eq!(got[1], Value::I64(want_ts), "{}", sym);
    }

    // generic window path produces the same winners.
    let rs2 = exec
        .execute(
            "SELECT symbol, timestamp, ROW_NUMBER() OVER \
             (PARTITION BY symbol ORDER BY timestamp DESC) rn FROM trades \
             ORDER BY symbol",
        )
        .unwrap();
    let winners: Vec<&Vec<Value>> =
        rs2.rows.iter().filter(|r| r[2] == Value::I64(1)).collect();
    assert_eq!(winners.len(), 3);
    for win in winners {
        let got = rs.rows.iter().find(|r| r[0] == win[0]).unwrap();
        assert_eq!(got[1], win[1]);
    }
}

#[test]
fn test_order_limit_offset() {
    let mut exec = executor(50);

    let rs = exec
        .execute(
            "SELECT timestamp, qty FROM trades \
             ORDER BY qty DESC, timestamp ASC LIMIT 5 OFFSET 2",
        )
        .unwrap();
    assert_eq!(rs.row_count, 5);
    // qty cycles 0..6, top qty is 6; offset skips the first two.
    assert_eq!(rs.rows[0][1], Value::I64(6));
    for pair in rs.rows.windows(2) {
        let (a, b) = (pair[0][1].as_i64().unwrap(), pair[1][1].as_i64().unwrap());
        assert!(a >= b);
        if a == b {
            assert!(pair[0][0].as_i64().unwrap() < pair[1][0].as_i64().unwrap());
        }
    }
}

#[test]
fn test_insert() {
    let mut exec = executor(3);
    let rs = exec
        .execute(
            "INSERT INTO trades (symbol, timestamp, price, qty) \
             VALUES ('DOGE', 99000, 0.1, 5), ('DOGE', 100000, 0.2, 6)",
        )
        .unwrap();
    assert_eq!(rs.row_count, 2);

    let rs = exec
        .execute("SELECT COUNT(*) FROM trades WHERE symbol = 'DOGE'")
        .unwrap();
    assert_eq!(rs.rows[0][0], Value::I64(2));

    match exec.execute("INSERT INTO nope (a) VALUES (1)") {
        Err(Error::PlanSQL(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
}

#[test]
fn test_ambiguous_and_unknown() {
    let mut exec = executor(10);
    let other = trades_table(5);
    exec.register("other", other);

    match exec.execute("SELECT qty FROM trades t INNER JOIN other o ON t.qty = o.qty") {
        Err(Error::PlanSQL(_, msg)) => assert!(msg.contains("ambiguous"), "{}", msg),
        res => panic!("unexpected {:?}", res),
    }
    match exec.execute("SELECT * FROM missing") {
        Err(Error::PlanSQL(_, msg)) => assert!(msg.contains("missing"), "{}", msg),
        res => panic!("unexpected {:?}", res),
    }
}

#[test]
fn test_cancel() {
    let mut exec = executor(10);
    let cancel = Cancel::new();
    cancel.cancel();
    match exec.execute_with("SELECT * FROM trades", &cancel) {
        Err(Error::Fatal(_, msg)) => assert!(msg.contains("cancelled"), "{}", msg),
        res => panic!("unexpected {:?}", res),
    }
}
