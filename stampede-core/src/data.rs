use pdatastructs::tdigest::{TDigest, K1};
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Distribution of a sampled value (request and iteration durations, in milliseconds).
///
/// Quantiles come from a t-digest; count, sum, min and max are exact.
#[derive(Debug, Clone)]
pub struct Trend {
    latency: TDigest<K1>,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Trend {
    pub fn new() -> Self {
        Self {
            latency: default_tdigest(),
            count: 0,
            sum: 0.,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.latency.insert(value);
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn push_duration(&mut self, duration: Duration) {
        self.push(duration.as_secs_f64() * 1e3);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn avg(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.sum / self.count as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }

    pub fn med(&self) -> Option<f64> {
        self.quantile(0.5)
    }

    /// `quantile` in `[0, 1]`.
    pub fn quantile(&self, quantile: f64) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        let value = self.latency.quantile(quantile.clamp(0., 1.));

        // NOTE: TDigest sometimes returns NaN; the max is the safe answer for upper bounds.
        let value = if value.is_finite() {
            value
        } else {
            error!("NaN quantile calculation for q={quantile}.");
            self.max
        };

        Some(value.clamp(self.min, self.max))
    }
}

impl Default for Trend {
    fn default() -> Self {
        Self::new()
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

/// Fraction of samples which were "hits" (failed requests, passed checks).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rate {
    pub hits: u64,
    pub total: u64,
}

impl Rate {
    pub fn push(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.hits += 1;
        }
    }

    pub fn misses(&self) -> u64 {
        self.total - self.hits
    }

    pub fn rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.hits as f64 / self.total as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub count: u64,
}

impl Counter {
    pub fn add(&mut self, n: u64) {
        self.count += n;
    }

    pub fn per_second(&self, elapsed: Duration) -> Option<f64> {
        let secs = elapsed.as_secs_f64();
        (secs > 0.).then(|| self.count as f64 / secs)
    }
}

/// Last, lowest and highest observed value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Gauge {
    value: Option<f64>,
    min: f64,
    max: f64,
}

impl Gauge {
    pub fn set(&mut self, value: f64) {
        if self.value.is_none() {
            self.min = value;
            self.max = value;
        }
        self.value = Some(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn min(&self) -> Option<f64> {
        self.value.map(|_| self.min)
    }

    pub fn max(&self) -> Option<f64> {
        self.value.map(|_| self.max)
    }
}
