use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use super::*;
use crate::series::{exponential_moving_average, moving_average, rolling_std_dev};

fn close(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() / scale < 1e-9
}

#[test]
fn test_streaming_matches_batch() {
    let seed: u64 = random();
    println!("test_streaming_matches_batch seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    for window in [1, 2, 7, 64].iter() {
        let data: Vec<f64> = (0..5000).map(|_| rng.gen::<f64>() * 1000.0 - 500.0).collect();

        let sma_batch = moving_average(&data, *window);
        let ema_batch = exponential_moving_average(&data, *window);
        let sd_batch = rolling_std_dev(&data, *window);

        let mut sma = Sma::new(*window);
        let mut ema = Ema::new(*window);
        let mut sd = StdDev::new(*window);
        for (i, v) in data.iter().enumerate() {
            let got = sma.update(*v);
            assert!(close(got, sma_batch[i]), "sma w={} i={} {} {}", window, i, got, sma_batch[i]);
            let got = ema.update(*v);
            assert!(close(got, ema_batch[i]), "ema w={} i={} {} {}", window, i, got, ema_batch[i]);
            let got = sd.update(*v);
            assert!(close(got, sd_batch[i]), "sd w={} i={} {} {}", window, i, got, sd_batch[i]);
        }
    }
}

#[test]
fn test_streaming_min_max() {
    let seed: u64 = random();
    println!("test_streaming_min_max seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let window = 16;
    let data: Vec<f64> = (0..2000).map(|_| rng.gen::<f64>() * 100.0).collect();

    let mut min = Min::new(window);
    let mut max = Max::new(window);
    for i in 0..data.len() {
        let got_min = min.update(data[i]);
        let got_max = max.update(data[i]);

        let start = (i + 1).saturating_sub(window);
        let slice = &data[start..=i];
        let want_min = slice.iter().cloned().fold(f64::INFINITY, f64::min);
        let want_max = slice.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        assert_eq!(got_min, want_min, "min at {}", i);
        assert_eq!(got_max, want_max, "max at {}", i);
        assert_eq!(min.value(), Some(want_min));
        assert_eq!(max.value(), Some(want_max));
    }
}

#[test]
fn test_composite_aggregator() {
    let mut agg = Aggregator::new(3);
    agg.update(1.0);
    agg.update(5.0);
    let row = agg.update(3.0);

    assert_eq!(row.sma, 3.0);
    assert_eq!(row.min, 1.0);
    assert_eq!(row.max, 5.0);
    assert!(row.std_dev > 0.0);

    // window slides: 1.0 leaves after two more samples.
    agg.update(4.0);
    let row = agg.update(4.0);
    assert_eq!(row.min, 3.0);
    assert_eq!(row.max, 4.0);
}
