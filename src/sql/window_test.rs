use super::*;
use crate::sql::{
    ast::{Statement, Projection},
    exec::ColMeta,
    parse,
};

fn window_expr(text: &str) -> Expr {
    match parse(&format!("SELECT {} FROM t", text)).unwrap() {
        Statement::Select(select) => match select.projections.into_iter().next().unwrap() {
            Projection::Expr { expr, .. } => expr,
            p => panic!("unexpected {:?}", p),
        },
        stmt => panic!("unexpected {:?}", stmt),
    }
}

fn sample_rows() -> Rows {
    let meta = vec![
        ColMeta { qualifier: None, name: "sym".to_string() },
        ColMeta { qualifier: None, name: "ts".to_string() },
        ColMeta { qualifier: None, name: "price".to_string() },
    ];
    let data = vec![
        vec![Value::Str("BTC".to_string()), Value::I64(1), Value::F64(10.0)],
        vec![Value::Str("ETH".to_string()), Value::I64(2), Value::F64(100.0)],
        vec![Value::Str("BTC".to_string()), Value::I64(3), Value::F64(20.0)],
        vec![Value::Str("ETH".to_string()), Value::I64(4), Value::F64(200.0)],
        vec![Value::Str("BTC".to_string()), Value::I64(5), Value::F64(30.0)],
    ];
    Rows { meta, data }
}

#[test]
fn test_row_number_desc() {
    let rows = sample_rows();
    let expr = window_expr("ROW_NUMBER() OVER (PARTITION BY sym ORDER BY ts DESC)");

    let out = compute_windows(&rows, &[expr.clone()], &[]).unwrap();
    assert_eq!(out.len(), 1);
    let (spec, vals) = &out[0];
    assert_eq!(spec, &expr);

    // BTC rows at ts 1,3,5 get rn 3,2,1; ETH rows at ts 2,4 get rn 2,1.
    assert_eq!(
        vals,
        &vec![
            Value::I64(3),
            Value::I64(2),
            Value::I64(2),
            Value::I64(1),
            Value::I64(1)
        ]
    );
}

#[test]
fn test_running_sum_default_frame() {
    let rows = sample_rows();
    let expr = window_expr("SUM(price) OVER (PARTITION BY sym ORDER BY ts)");

    let out = compute_windows(&rows, &[expr], &[]).unwrap();
    let (_, vals) = &out[0];

    // running sums within each partition.
    assert_eq!(
        vals,
        &vec![
            Value::F64(10.0),
            Value::F64(100.0),
            Value::F64(30.0),
            Value::F64(300.0),
            Value::F64(60.0)
        ]
    );
}

#[test]
fn test_frame_rows_preceding() {
    let rows = sample_rows();
    let expr = window_expr(
        "AVG(price) OVER (PARTITION BY sym ORDER BY ts \
         ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)",
    );

    let out = compute_windows(&rows, &[expr], &[]).unwrap();
    let (_, vals) = &out[0];

    assert_eq!(
        vals,
        &vec![
            Value::F64(10.0),
            Value::F64(100.0),
            Value::F64(15.0),
            Value::F64(150.0),
            Value::F64(25.0)
        ]
    );
}

#[test]
fn test_count_star_whole_partition() {
    let rows = sample_rows();
    let expr = window_expr("COUNT(*) OVER (PARTITION BY sym)");

    let out = compute_windows(&rows, &[expr], &[]).unwrap();
    let (_, vals) = &out[0];
    assert_eq!(
        vals,
        &vec![
            Value::I64(3),
            Value::I64(2),
            Value::I64(3),
            Value::I64(2),
            Value::I64(3)
        ]
    );
}
