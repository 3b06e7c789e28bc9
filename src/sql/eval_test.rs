use super::*;
use crate::sql::{
    ast::Statement,
    exec::{ColMeta, Rows},
    parse,
};

fn eval_text(text: &str) -> Result<Value> {
    let rows = Rows {
        meta: vec![
            ColMeta { qualifier: Some("t".to_string()), name: "price".to_string() },
            ColMeta { qualifier: Some("t".to_string()), name: "symbol".to_string() },
            ColMeta { qualifier: Some("t".to_string()), name: "maybe".to_string() },
        ],
        data: vec![vec![
            Value::F64(101.5),
            Value::Str("BTC".to_string()),
            Value::Null,
        ]],
    };
    let sets = vec![];
    let env = Env::plain(&rows, 0, &sets);

    let expr = match parse(&format!("SELECT {}", text))? {
        Statement::Select(select) => match select.projections.into_iter().next().unwrap() {
            crate::sql::ast::Projection::Expr { expr, .. } => expr,
            p => panic!("unexpected {:?}", p),
        },
        stmt => panic!("unexpected {:?}", stmt),
    };
    eval(&expr, &env)
}

#[test]
fn test_arithmetic() {
    assert_eq!(eval_text("1 + 2 * 3").unwrap(), Value::I64(7));
    assert_eq!(eval_text("7 % 3").unwrap(), Value::I64(1));
    assert_eq!(eval_text("1 + 0.5").unwrap(), Value::F64(1.5));
    assert_eq!(eval_text("9 / 2").unwrap(), Value::F64(4.5)); // division is float
    assert_eq!(eval_text("1 / 0").unwrap(), Value::Null);
    assert_eq!(eval_text("-price").unwrap(), Value::F64(-101.5));
    assert_eq!(eval_text("price + NULL").unwrap(), Value::Null);

    match eval_text("symbol * 2") {
        Err(Error::TypeSQL(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
}

#[test]
fn test_comparisons_and_logic() {
    assert_eq!(eval_text("price > 100").unwrap(), Value::I64(1));
    assert_eq!(eval_text("price > 100 AND symbol = 'BTC'").unwrap(), Value::I64(1));
    assert_eq!(eval_text("price < 100 OR symbol = 'ETH'").unwrap(), Value::I64(0));
    assert_eq!(eval_text("NOT price > 100").unwrap(), Value::I64(0));
    assert_eq!(eval_text("price = 'BTC'").unwrap(), Value::I64(0)); // cross-kind eq
    assert_eq!(eval_text("maybe > 1").unwrap(), Value::Null);
    assert_eq!(eval_text("price BETWEEN 100 AND 102").unwrap(), Value::I64(1));
    assert_eq!(eval_text("price BETWEEN 102 AND 200").unwrap(), Value::I64(0));

    match eval_text("price > 'BTC'") {
        Err(Error::TypeSQL(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
}

#[test]
fn test_null_predicates() {
    assert_eq!(eval_text("maybe IS NULL").unwrap(), Value::I64(1));
    assert_eq!(eval_text("maybe IS NOT NULL").unwrap(), Value::I64(0));
    assert_eq!(eval_text("price IS NULL").unwrap(), Value::I64(0));
    assert_eq!(eval_text("COALESCE(maybe, price, 0)").unwrap(), Value::F64(101.5));
}

#[test]
fn test_in_and_like() {
    assert_eq!(eval_text("symbol IN ('ETH', 'BTC')").unwrap(), Value::I64(1));
    assert_eq!(eval_text("symbol NOT IN ('ETH', 'BTC')").unwrap(), Value::I64(0));
    assert_eq!(eval_text("2 IN (1, 2.0, 3)").unwrap(), Value::I64(1));
    assert_eq!(
        eval_text("(symbol, 1) IN (('BTC', 1), ('ETH', 2))").unwrap(),
        Value::I64(1)
    );
    assert_eq!(eval_text("maybe IN (1, 2)").unwrap(), Value::I64(0));

    assert_eq!(eval_text("symbol LIKE 'B%'").unwrap(), Value::I64(1));
    assert_eq!(eval_text("symbol LIKE '_TC'").unwrap(), Value::I64(1));
    assert_eq!(eval_text("symbol LIKE '%X%'").unwrap(), Value::I64(0));
    assert_eq!(eval_text("symbol NOT LIKE '%T%'").unwrap(), Value::I64(0));
    assert_eq!(eval_text("'' LIKE '%'").unwrap(), Value::I64(1));
}

#[test]
fn test_strings_and_case() {
    assert_eq!(
        eval_text("symbol || '-' || 'USD'").unwrap(),
        Value::Str("BTC-USD".to_string())
    );
    assert_eq!(eval_text("'n=' || 2").unwrap(), Value::Str("n=2".to_string()));
    assert_eq!(eval_text("LOWER(symbol)").unwrap(), Value::Str("btc".to_string()));
    assert_eq!(eval_text("UPPER('eth')").unwrap(), Value::Str("ETH".to_string()));

    assert_eq!(
        eval_text("CASE WHEN price > 100 THEN 'high' ELSE 'low' END").unwrap(),
        Value::Str("high".to_string())
    );
    assert_eq!(
        eval_text("CASE symbol WHEN 'ETH' THEN 1 WHEN 'BTC' THEN 2 END").unwrap(),
        Value::I64(2)
    );
    assert_eq!(eval_text("CASE WHEN price < 0 THEN 1 END").unwrap(), Value::Null);
}

#[test]
fn test_scalar_functions() {
    assert_eq!(eval_text("ROUND(2.5)").unwrap(), Value::F64(3.0));
    assert_eq!(eval_text("ROUND(2.444, 2)").unwrap(), Value::F64(2.44));
    assert_eq!(eval_text("SQRT(16)").unwrap(), Value::F64(4.0));
    assert_eq!(eval_text("ABS(-3)").unwrap(), Value::I64(3));
    assert_eq!(eval_text("ABS(-3.5)").unwrap(), Value::F64(3.5));

    match eval_text("NO_SUCH_FN(1)") {
        Err(Error::PlanSQL(_, msg)) => assert!(msg.contains("NO_SUCH_FN"), "{}", msg),
        res => panic!("unexpected {:?}", res),
    }
    match eval_text("SUM(price)") {
        Err(Error::PlanSQL(_, msg)) => assert!(msg.contains("GROUP BY"), "{}", msg),
        res => panic!("unexpected {:?}", res),
    }
}

#[test]
fn test_unknown_and_ambiguous_columns() {
    match eval_text("nope + 1") {
        Err(Error::PlanSQL(_, msg)) => assert!(msg.contains("nope"), "{}", msg),
        res => panic!("unexpected {:?}", res),
    }
    match eval_text("t.price + u.price") {
        Err(Error::PlanSQL(_, msg)) => assert!(msg.contains("u.price"), "{}", msg),
        res => panic!("unexpected {:?}", res),
    }
}
