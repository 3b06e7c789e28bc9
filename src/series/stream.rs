//! Streaming aggregators holding O(window) state.
//!
//! Each type accepts one sample at a time through `update()` and returns
//! the aggregate's current value, matching its batch counterpart in
//! [crate::series] within floating-point tolerance. Min/Max use a
//! monotonic deque for amortized O(1) updates.

use std::collections::VecDeque;

/// Streaming simple moving average over a trailing window.
#[derive(Clone, Debug)]
pub struct Sma {
    window: usize,
    buf: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(window: usize) -> Sma {
        let window = std::cmp::max(window, 1);
        Sma { window, buf: VecDeque::with_capacity(window), sum: 0.0 }
    }

    pub fn update(&mut self, v: f64) -> f64 {
        self.buf.push_back(v);
        self.sum += v;
        if self.buf.len() > self.window {
            self.sum -= self.buf.pop_front().unwrap();
        }
        self.value()
    }

    pub fn value(&self) -> f64 {
        match self.buf.len() {
            0 => 0.0,
            n => self.sum / n as f64,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Streaming exponential moving average, `alpha = 2 / (window + 1)`,
/// seeded with the first sample.
#[derive(Clone, Debug)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(window: usize) -> Ema {
        Ema { alpha: 2.0 / (window as f64 + 1.0), value: None }
    }

    pub fn update(&mut self, v: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.alpha * v + (1.0 - self.alpha) * prev,
            None => v,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Streaming population standard deviation over a trailing window,
/// maintained through running sum and sum-of-squares.
#[derive(Clone, Debug)]
pub struct StdDev {
    window: usize,
    buf: VecDeque<f64>,
    sum: f64,
    sumsq: f64,
}

impl StdDev {
    pub fn new(window: usize) -> StdDev {
        let window = std::cmp::max(window, 1);
        StdDev { window, buf: VecDeque::with_capacity(window), sum: 0.0, sumsq: 0.0 }
    }

    pub fn update(&mut self, v: f64) -> f64 {
        self.buf.push_back(v);
        self.sum += v;
        self.sumsq += v * v;
        if self.buf.len() > self.window {
            let old = self.buf.pop_front().unwrap();
            self.sum -= old;
            self.sumsq -= old * old;
        }
        self.value()
    }

    pub fn value(&self) -> f64 {
        match self.buf.len() {
            0 => 0.0,
            n => {
                let n = n as f64;
                let mean = self.sum / n;
                // guard the tiny negatives that running sums produce.
                let var = (self.sumsq / n - mean * mean).max(0.0);
                var.sqrt()
            }
        }
    }
}

// monotonic-deque extremum tracker; `min` decides whether the deque keeps
// increasing (min) or decreasing (max) front-to-back.
#[derive(Clone, Debug)]
struct Extremum {
    window: usize,
    count: usize,
    deque: VecDeque<(usize, f64)>, // (sample ordinal, value)
    min: bool,
}

impl Extremum {
    fn new(window: usize, min: bool) -> Extremum {
        Extremum { window: std::cmp::max(window, 1), count: 0, deque: VecDeque::new(), min }
    }

    fn update(&mut self, v: f64) -> f64 {
        let keep = |back: f64, v: f64, min: bool| match min {
            true => back <= v,
            false => back >= v,
        };
        while let Some((_, back)) = self.deque.back() {
            if keep(*back, v, self.min) {
                break;
            }
            self.deque.pop_back();
        }
        self.deque.push_back((self.count, v));
        self.count += 1;

        let cutoff = self.count.saturating_sub(self.window);
        while let Some((ordinal, _)) = self.deque.front() {
            if *ordinal >= cutoff {
                break;
            }
            self.deque.pop_front();
        }

        self.deque.front().unwrap().1
    }
}

/// Streaming minimum over a trailing window, monotonic deque, amortized
/// O(1) per sample.
#[derive(Clone, Debug)]
pub struct Min {
    inner: Extremum,
}

impl Min {
    pub fn new(window: usize) -> Min {
        Min { inner: Extremum::new(window, true) }
    }

    pub fn update(&mut self, v: f64) -> f64 {
        self.inner.update(v)
    }

    pub fn value(&self) -> Option<f64> {
        self.inner.deque.front().map(|(_, v)| *v)
    }
}

/// Streaming maximum over a trailing window.
#[derive(Clone, Debug)]
pub struct Max {
    inner: Extremum,
}

impl Max {
    pub fn new(window: usize) -> Max {
        Max { inner: Extremum::new(window, false) }
    }

    pub fn update(&mut self, v: f64) -> f64 {
        self.inner.update(v)
    }

    pub fn value(&self) -> Option<f64> {
        self.inner.deque.front().map(|(_, v)| *v)
    }
}

/// Current values of a composite [Aggregator].
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateRow {
    pub sma: f64,
    pub ema: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Composite aggregator feeding one sample to every streaming kernel at
/// once.
#[derive(Clone, Debug)]
pub struct Aggregator {
    sma: Sma,
    ema: Ema,
    std_dev: StdDev,
    min: Min,
    max: Max,
}

impl Aggregator {
    pub fn new(window: usize) -> Aggregator {
        Aggregator {
            sma: Sma::new(window),
            ema: Ema::new(window),
            std_dev: StdDev::new(window),
            min: Min::new(window),
            max: Max::new(window),
        }
    }

    pub fn update(&mut self, v: f64) -> AggregateRow {
        AggregateRow {
            sma: self.sma.update(v),
            ema: self.ema.update(v),
            std_dev: self.std_dev.update(v),
            min: self.min.update(v),
            max: self.max.update(v),
        }
    }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
