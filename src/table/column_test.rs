use super::*;
use crate::value::ColumnType;

#[test]
fn test_dict_first_seen_codes() {
    let mut dict = StrDict::new();
    assert_eq!(dict.intern("ETH"), 0);
    assert_eq!(dict.intern("BTC"), 1);
    assert_eq!(dict.intern("ETH"), 0);
    assert_eq!(dict.intern("SOL"), 2);

    assert_eq!(dict.len(), 3);
    assert_eq!(dict.lookup(1), Some("BTC"));
    assert_eq!(dict.lookup(3), None);
    assert_eq!(dict.code_of("SOL"), Some(2));

    let back = StrDict::from_strings(dict.as_strings().to_vec());
    assert_eq!(back.code_of("BTC"), Some(1));
    assert_eq!(back.lookup(2), Some("SOL"));
}

#[test]
fn test_buffer_growth_doubling() {
    let mut buf = ColumnBuffer::new(ColumnType::Int64, 4);
    assert_eq!(buf.capacity(), 4);

    for i in 0..5 {
        buf.push(&Value::I64(i)).unwrap();
    }
    assert_eq!(buf.len(), 5);
    assert_eq!(buf.capacity(), 8);

    buf.reserve(100); // 105 needed, next power of two is 128
    assert_eq!(buf.capacity(), 128);
    assert_eq!(buf.get(4), Some(Value::I64(4)));
}

#[test]
fn test_buffer_kind_mismatch() {
    let mut buf = ColumnBuffer::new(ColumnType::Int64, 1);
    match buf.push(&Value::Str("x".to_string())) {
        Err(crate::Error::TypeFail(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
}

#[test]
fn test_columnize() {
    let schema = Schema::from_spec(&[
        ("sym", ColumnType::Str),
        ("qty", ColumnType::Int32),
    ])
    .unwrap();
    let mut dicts = vec![Some(StrDict::new()), None];

    let records = vec![
        Record::new().with("sym", "BTC").with("qty", 10_i64),
        Record::new().with("sym", "ETH").with("qty", 20.9), // truncates
        Record::new().with("sym", "BTC").with("qty", 30_i32),
    ];
    let datas = columnize(&schema, &records, &mut dicts).unwrap();

    assert_eq!(datas[0], ColumnData::Code(vec![0, 1, 0]));
    assert_eq!(datas[1], ColumnData::I32(vec![10, 20, 30]));
    assert_eq!(dicts[0].as_ref().unwrap().as_strings(), &["BTC", "ETH"]);

    let records = vec![Record::new().with("sym", "BTC")];
    match columnize(&schema, &records, &mut dicts) {
        Err(crate::Error::MissingField(_, msg)) => assert!(msg.contains("qty")),
        res => panic!("unexpected {:?}", res),
    }
}
