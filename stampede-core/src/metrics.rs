use crate::ThresholdError;
use std::fmt;
use std::str::FromStr;

/// Built-in metrics recorded for every run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Time from sending a request to receiving its result, in milliseconds.
    HttpReqDuration,
    /// Fraction of requests which failed (non-success result or no response).
    HttpReqFailed,
    HttpReqs,
    /// Fraction of checks which passed.
    Checks,
    Iterations,
    IterationDuration,
    Vus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Trend,
    Rate,
    Counter,
    Gauge,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::HttpReqDuration,
        Metric::HttpReqFailed,
        Metric::HttpReqs,
        Metric::Checks,
        Metric::Iterations,
        Metric::IterationDuration,
        Metric::Vus,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Metric::HttpReqDuration => "http_req_duration",
            Metric::HttpReqFailed => "http_req_failed",
            Metric::HttpReqs => "http_reqs",
            Metric::Checks => "checks",
            Metric::Iterations => "iterations",
            Metric::IterationDuration => "iteration_duration",
            Metric::Vus => "vus",
        }
    }

    pub const fn kind(&self) -> MetricKind {
        match self {
            Metric::HttpReqDuration | Metric::IterationDuration => MetricKind::Trend,
            Metric::HttpReqFailed | Metric::Checks => MetricKind::Rate,
            Metric::HttpReqs | Metric::Iterations => MetricKind::Counter,
            Metric::Vus => MetricKind::Gauge,
        }
    }
}

impl FromStr for Metric {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ThresholdError::UnknownMetric(s.to_string()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
