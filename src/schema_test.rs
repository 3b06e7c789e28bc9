use super::*;

#[test]
fn test_schema_json() {
    let schema = Schema::from_spec(&[
        ("ts", ColumnType::Int64),
        ("price", ColumnType::Float64),
        ("symbol", ColumnType::Str),
    ])
    .unwrap();

    let text = schema.to_json().unwrap();
    assert!(text.contains(r#""name":"ts""#), "{}", text);
    assert!(text.contains(r#""type":"int64""#), "{}", text);
    assert!(text.contains(r#""type":"string""#), "{}", text);

    let back = Schema::from_json(&text).unwrap();
    assert_eq!(schema, back);
}

#[test]
fn test_schema_validate() {
    match Schema::from_spec(&[("a", ColumnType::Int32), ("a", ColumnType::Int64)]) {
        Err(Error::InvalidInput(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
    match Schema::new(vec![]) {
        Err(Error::InvalidInput(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
}

#[test]
fn test_schema_compatible() {
    let a = Schema::from_spec(&[("x", ColumnType::Int64), ("y", ColumnType::Float64)])
        .unwrap();
    let b = Schema::from_spec(&[("x", ColumnType::Int64), ("y", ColumnType::Float64)])
        .unwrap();
    a.check_compatible(&b).unwrap();

    let c = Schema::from_spec(&[("x", ColumnType::Int64), ("y", ColumnType::Float32)])
        .unwrap();
    match a.check_compatible(&c) {
        Err(Error::SchemaMismatch(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }

    let d = Schema::from_spec(&[("x", ColumnType::Int64)]).unwrap();
    match a.check_compatible(&d) {
        Err(Error::SchemaMismatch(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }

    assert_eq!(a.position("y"), Some(1));
    assert_eq!(a.position("z"), None);
    assert_eq!(a.string_columns(), Vec::<usize>::new());
}
