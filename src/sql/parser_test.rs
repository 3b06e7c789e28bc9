use super::*;
use crate::sql::ast::{BinaryOp, UnaryOp};

fn parse_select(text: &str) -> Select {
    match parse(text).unwrap() {
        Statement::Select(select) => *select,
        stmt => panic!("unexpected {:?}", stmt),
    }
}

#[test]
fn test_select_shape() {
    let select = parse_select(
        "SELECT symbol, price * 2 AS doubled, COUNT(*) \
         FROM trades t \
         WHERE price > 100 AND symbol = 'BTC' \
         GROUP BY symbol HAVING COUNT(*) > 5 \
         ORDER BY symbol DESC LIMIT 10 OFFSET 2;",
    );

    assert_eq!(select.projections.len(), 3);
    match &select.projections[1] {
        Projection::Expr { expr: Expr::Binary { op: BinaryOp::Mul, .. }, alias } => {
            assert_eq!(alias.as_deref(), Some("doubled"));
        }
        p => panic!("unexpected {:?}", p),
    }
    match &select.from {
        Some(TableRef::Named { name, alias }) => {
            assert_eq!(name, "trades");
            assert_eq!(alias.as_deref(), Some("t"));
        }
        f => panic!("unexpected {:?}", f),
    }

    let factors = select.where_.as_ref().unwrap().and_factors();
    assert_eq!(factors.len(), 2);
    assert_eq!(select.group_by.len(), 1);
    assert!(select.having.is_some());
    assert_eq!(select.order_by.len(), 1);
    assert!(select.order_by[0].desc);
    assert_eq!(select.limit, Some(10));
    assert_eq!(select.offset, Some(2));
}

#[test]
fn test_expression_precedence() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    let select = parse_select("SELECT 1 + 2 * 3");
    match &select.projections[0] {
        Projection::Expr { expr: Expr::Binary { op: BinaryOp::Add, right, .. }, .. } => {
            assert!(matches!(&**right, Expr::Binary { op: BinaryOp::Mul, .. }));
        }
        p => panic!("unexpected {:?}", p),
    }

    // NOT a = 1 OR b = 2 parses as (NOT (a = 1)) OR (b = 2)
    let select = parse_select("SELECT * FROM t WHERE NOT a = 1 OR b = 2");
    match select.where_.as_ref().unwrap() {
        Expr::Binary { op: BinaryOp::Or, left, .. } => {
            assert!(matches!(&**left, Expr::Unary { op: UnaryOp::Not, .. }));
        }
        e => panic!("unexpected {:?}", e),
    }
}

#[test]
fn test_in_like_between() {
    let select = parse_select(
        "SELECT * FROM t WHERE sym IN ('a', 'b') AND name LIKE 'b%' \
         AND ts BETWEEN 1 AND 9 AND x IS NOT NULL AND y NOT IN (1, 2)",
    );
    let factors: Vec<Expr> =
        select.where_.as_ref().unwrap().and_factors().into_iter().cloned().collect();
    assert_eq!(factors.len(), 5);
    assert!(matches!(&factors[0], Expr::In { negated: false, .. }));
    assert!(matches!(&factors[1], Expr::Like { negated: false, .. }));
    assert!(matches!(&factors[2], Expr::Between { negated: false, .. }));
    assert!(matches!(&factors[3], Expr::IsNull { negated: true, .. }));
    assert!(matches!(&factors[4], Expr::In { negated: true, .. }));

    // multi-column IN with tuple rows.
    let select = parse_select("SELECT * FROM t WHERE (a, b) IN ((1, 2), (3, 4))");
    match select.where_.as_ref().unwrap() {
        Expr::In { exprs, list: InList::Exprs(rows), .. } => {
            assert_eq!(exprs.len(), 2);
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].len(), 2);
        }
        e => panic!("unexpected {:?}", e),
    }

    // IN subquery.
    let select = parse_select("SELECT * FROM t WHERE id IN (SELECT id FROM u)");
    match select.where_.as_ref().unwrap() {
        Expr::In { list: InList::Subquery(_), .. } => (),
        e => panic!("unexpected {:?}", e),
    }
}

#[test]
fn test_joins_and_ctes() {
    let select = parse_select(
        "WITH recent AS (SELECT * FROM trades WHERE ts > 100) \
         SELECT r.sym, m.name FROM recent r \
         LEFT JOIN meta m ON r.sym = m.sym \
         INNER JOIN extra e ON e.id = r.id",
    );
    assert_eq!(select.with.len(), 1);
    assert_eq!(select.with[0].0, "recent");
    assert_eq!(select.joins.len(), 2);
    assert_eq!(select.joins[0].kind, JoinKind::Left);
    assert_eq!(select.joins[1].kind, JoinKind::Inner);

    // derived table in FROM.
    let select = parse_select("SELECT * FROM (SELECT a FROM t) d WHERE a > 1");
    assert!(matches!(select.from, Some(TableRef::Derived { .. })));
}

#[test]
fn test_window_syntax() {
    let select = parse_select(
        "SELECT symbol, ROW_NUMBER() OVER (PARTITION BY symbol ORDER BY ts DESC) rn, \
         AVG(price) OVER (ORDER BY ts ROWS BETWEEN 5 PRECEDING AND CURRENT ROW) ma \
         FROM trades",
    );

    match &select.projections[1] {
        Projection::Expr { expr: Expr::Function { name, window: Some(spec), .. }, alias } => {
            assert_eq!(name, "ROW_NUMBER");
            assert_eq!(alias.as_deref(), Some("rn"));
            assert_eq!(spec.partition_by.len(), 1);
            assert_eq!(spec.order_by.len(), 1);
            assert!(spec.order_by[0].desc);
        }
        p => panic!("unexpected {:?}", p),
    }
    match &select.projections[2] {
        Projection::Expr { expr: Expr::Function { name, window: Some(spec), .. }, .. } => {
            assert_eq!(name, "AVG");
            let frame = spec.frame.as_ref().unwrap();
            assert_eq!(frame.start, FrameBound::Preceding(5));
            assert_eq!(frame.end, FrameBound::CurrentRow);
        }
        p => panic!("unexpected {:?}", p),
    }
}

#[test]
fn test_case_and_scalar_subquery() {
    let select = parse_select(
        "SELECT CASE WHEN price > 100 THEN 'high' ELSE 'low' END, \
         (SELECT MAX(ts) FROM t) FROM trades",
    );
    assert!(matches!(
        &select.projections[0],
        Projection::Expr { expr: Expr::Case { .. }, .. }
    ));
    assert!(matches!(
        &select.projections[1],
        Projection::Expr { expr: Expr::Subquery(_), .. }
    ));
}

#[test]
fn test_insert() {
    match parse("INSERT INTO trades (ts, price) VALUES (1, 2.5), (2, 3.5)").unwrap() {
        Statement::Insert(insert) => {
            assert_eq!(insert.table, "trades");
            assert_eq!(insert.columns, vec!["ts".to_string(), "price".to_string()]);
            assert_eq!(insert.values.len(), 2);
        }
        stmt => panic!("unexpected {:?}", stmt),
    }
}

#[test]
fn test_syntax_errors_carry_position() {
    match parse("SELECT FROM t") {
        Err(Error::ParseSQL(_, msg)) => assert!(msg.contains("(1,8)"), "{}", msg),
        res => panic!("unexpected {:?}", res),
    }
    match parse("SELECT * FROM") {
        Err(Error::ParseSQL(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
    match parse("SELECT * FROM t WHERE a NOT 5") {
        Err(Error::ParseSQL(_, msg)) => assert!(msg.contains("NOT"), "{}", msg),
        res => panic!("unexpected {:?}", res),
    }
}
