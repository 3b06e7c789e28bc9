use super::*;

#[test]
fn test_coerce_numeric() {
    let val = Value::F64(101.7).coerce(ColumnType::Int64).unwrap();
    assert_eq!(val, Value::I64(101)); // truncate toward zero

    let val = Value::F64(-3.9).coerce(ColumnType::Int32).unwrap();
    assert_eq!(val, Value::I32(-3));

    // two's complement narrowing into the column width.
    let val = Value::I64(0x1_0000_0001).coerce(ColumnType::Int32).unwrap();
    assert_eq!(val, Value::I32(1));
    let val = Value::I64(-1).coerce(ColumnType::Int32).unwrap();
    assert_eq!(val, Value::I32(-1));

    let val = Value::I32(7).coerce(ColumnType::Float64).unwrap();
    assert_eq!(val, Value::F64(7.0));
    let val = Value::F64(1.5).coerce(ColumnType::Float32).unwrap();
    assert_eq!(val, Value::F32(1.5));
}

#[test]
fn test_coerce_fail() {
    match Value::Str("abc".to_string()).coerce(ColumnType::Int64) {
        Err(Error::TypeFail(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
    match Value::I64(1).coerce(ColumnType::Str) {
        Err(Error::TypeFail(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
    match Value::Null.coerce(ColumnType::Float64) {
        Err(Error::TypeFail(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
}

#[test]
fn test_sort_cmp() {
    use std::cmp::Ordering;

    assert_eq!(Value::Null.sort_cmp(&Value::I64(0)), Ordering::Less);
    assert_eq!(Value::I64(2).sort_cmp(&Value::F64(1.5)), Ordering::Greater);
    assert_eq!(Value::I32(5).sort_cmp(&Value::I64(5)), Ordering::Equal);
    assert_eq!(
        Value::Str("a".to_string()).sort_cmp(&Value::Str("b".to_string())),
        Ordering::Less
    );
    assert_eq!(Value::F64(1.0).sort_cmp(&Value::Str("a".to_string())), Ordering::Less);
}

#[test]
fn test_width() {
    assert_eq!(ColumnType::Int32.width(), 4);
    assert_eq!(ColumnType::Int64.width(), 8);
    assert_eq!(ColumnType::Float32.width(), 4);
    assert_eq!(ColumnType::Float64.width(), 8);
    assert_eq!(ColumnType::Str.width(), 4);
}
