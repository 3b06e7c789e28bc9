use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use super::*;

#[test]
fn test_ordered_index() {
    let seed: u64 = random();
    println!("test_ordered_index seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let vals: Vec<i64> = (0..10_000).map(|_| (rng.gen::<u64>() % 1000) as i64).collect();

    let mut index = OrderedIndex::new("v");
    for (row, val) in vals.iter().enumerate() {
        index.insert(IndexKey::Int(*val), row as u32);
    }

    for _ in 0..100 {
        let (a, b) = ((rng.gen::<u64>() % 1000) as i64, (rng.gen::<u64>() % 1000) as i64);
        let (lo, hi) = (std::cmp::min(a, b), std::cmp::max(a, b));

        let mut got = index.query_range(Some(&IndexKey::Int(lo)), Some(&IndexKey::Int(hi)));
        got.sort_unstable();
        let want: Vec<u32> = vals
            .iter()
            .enumerate()
            .filter(|(_, v)| lo <= **v && **v <= hi)
            .map(|(i, _)| i as u32)
            .collect();
        assert_eq!(got, want, "range [{},{}]", lo, hi);

        let mut got = index.query_eq(&IndexKey::Int(lo));
        got.sort_unstable();
        let want: Vec<u32> = vals
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == lo)
            .map(|(i, _)| i as u32)
            .collect();
        assert_eq!(got, want, "eq {}", lo);
    }

    let mut got = index.query_cmp(CmpOp::Lt, &IndexKey::Int(10));
    got.sort_unstable();
    let want: Vec<u32> = vals
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < 10)
        .map(|(i, _)| i as u32)
        .collect();
    assert_eq!(got, want);

    let got = index.query_cmp(CmpOp::Ge, &IndexKey::Int(990)).len();
    let want = vals.iter().filter(|v| **v >= 990).count();
    assert_eq!(got, want);
}

#[test]
fn test_ordered_index_strings() {
    let mut index = OrderedIndex::new("sym");
    for (row, sym) in ["ETH", "BTC", "SOL", "BTC"].iter().enumerate() {
        index.insert(IndexKey::Str(sym.to_string()), row as u32);
    }

    assert_eq!(index.query_eq(&IndexKey::Str("BTC".to_string())), vec![1, 3]);
    // string order, not first-seen code order.
    let rows = index.query_cmp(CmpOp::Le, &IndexKey::Str("ETH".to_string()));
    assert_eq!(rows, vec![1, 3, 0]);

    index.remove_row(3);
    assert_eq!(index.query_eq(&IndexKey::Str("BTC".to_string())), vec![1]);
    assert_eq!(index.len_keys(), 3);
}

#[test]
fn test_float_key_ordering() {
    let mut index = OrderedIndex::new("price");
    index.insert(IndexKey::Float(FloatKey(1.5)), 0);
    index.insert(IndexKey::Float(FloatKey(-0.5)), 1);
    index.insert(IndexKey::Float(FloatKey(99.25)), 2);

    let rows = index.query_range(
        Some(&IndexKey::Float(FloatKey(-1.0))),
        Some(&IndexKey::Float(FloatKey(2.0))),
    );
    assert_eq!(rows, vec![1, 0]);
}
