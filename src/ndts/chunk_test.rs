use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use super::*;
use crate::value::ColumnType;

fn sample_schema() -> Schema {
    Schema::from_spec(&[
        ("ts", ColumnType::Int64),
        ("price", ColumnType::Float64),
        ("qty", ColumnType::Int32),
        ("symbol", ColumnType::Str),
    ])
    .unwrap()
}

fn sample_chunk(rng: &mut SmallRng, rows: usize) -> Vec<ColumnData> {
    let mut ts = vec![1_700_000_000_000_i64];
    for _ in 1..rows {
        let last = *ts.last().unwrap();
        ts.push(last + (rng.gen::<u64>() % 100) as i64);
    }
    let price: Vec<f64> = (0..rows).map(|_| rng.gen::<f64>() * 100.0).collect();
    let qty: Vec<i32> = (0..rows).map(|_| rng.gen()).collect();
    let codes: Vec<u32> = (0..rows).map(|_| rng.gen::<u32>() % 3).collect();

    vec![
        ColumnData::I64(ts),
        ColumnData::F64(price),
        ColumnData::I32(qty),
        ColumnData::Code(codes),
    ]
}

#[test]
fn test_chunk_roundtrip() {
    let seed: u64 = random();
    println!("test_chunk_roundtrip seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let schema = sample_schema();
    for rows in [1, 2, 100, 5000].iter() {
        let datas = sample_chunk(&mut rng, *rows);
        let refs: Vec<&ColumnData> = datas.iter().collect();
        let buf = encode_chunk(&refs).unwrap();

        // monotone ts column must have delta-compressed.
        let info = scan_chunk(&schema, &buf, 0).unwrap();
        if *rows > 1 {
            assert_eq!(info.codec_flags[0], codec::CODEC_DELTA);
        }
        assert_eq!(info.codec_flags[1], codec::CODEC_RAW);
        assert_eq!(info.row_count as usize, *rows);
        assert_eq!(info.total_len, buf.len());

        let (back, _) = decode_chunk(&schema, &buf, 0).unwrap();
        assert_eq!(back, datas, "rows {}", rows);
    }
}

#[test]
fn test_chunk_crc() {
    let seed: u64 = random();
    println!("test_chunk_crc seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let schema = sample_schema();
    let datas = sample_chunk(&mut rng, 500);
    let refs: Vec<&ColumnData> = datas.iter().collect();
    let buf = encode_chunk(&refs).unwrap();

    // flip one payload byte, decode must fail with the chunk ordinal.
    let mut bad = buf.clone();
    let at = 20 + (rng.gen::<usize>() % (buf.len() - 24));
    bad[at] ^= 0x01;
    match decode_chunk(&schema, &bad, 3) {
        Err(Error::CorruptChunk(_, 3, _)) => (),
        res => panic!("unexpected {:?}", res),
    }

    // truncation fails as well.
    match decode_chunk(&schema, &buf[..buf.len() - 2], 0) {
        Err(Error::CorruptChunk(_, 0, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
}
