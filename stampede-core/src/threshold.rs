use crate::{Metric, MetricKind, MetricValue};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("Unknown metric \"{0}\"")]
    UnknownMetric(String),

    #[error("Malformed threshold \"{0}\", expected something like \"p(95) < 200\"")]
    Malformed(String),

    #[error("Unknown aggregation \"{0}\"")]
    UnknownAggregation(String),

    #[error("Percentile \"{0}\" must be between 0 and 100")]
    InvalidPercentile(String),

    #[error("Aggregation \"{aggregation}\" does not apply to {metric}")]
    Unsupported { aggregation: Aggregation, metric: Metric },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    /// `p(N)` with `N` in `[0, 100]`.
    Percentile(f64),
    Rate,
    Count,
    Value,
}

impl Aggregation {
    fn applies_to(&self, kind: MetricKind) -> bool {
        use Aggregation::*;
        match kind {
            MetricKind::Trend => matches!(self, Avg | Min | Max | Med | Percentile(_)),
            MetricKind::Rate => matches!(self, Rate),
            MetricKind::Counter => matches!(self, Count | Rate),
            MetricKind::Gauge => matches!(self, Value | Min | Max),
        }
    }

    /// Reduce a metric to the single number this aggregation compares against.
    pub fn observe(&self, value: MetricValue<'_>) -> Option<f64> {
        use Aggregation as A;
        match (self, value) {
            (A::Avg, MetricValue::Trend(t)) => t.avg(),
            (A::Min, MetricValue::Trend(t)) => t.min(),
            (A::Max, MetricValue::Trend(t)) => t.max(),
            (A::Med, MetricValue::Trend(t)) => t.med(),
            (A::Percentile(p), MetricValue::Trend(t)) => t.quantile(p / 100.),
            (A::Rate, MetricValue::Rate(r)) => r.rate(),
            (A::Count, MetricValue::Counter { counter, .. }) => Some(counter.count as f64),
            (A::Rate, MetricValue::Counter { counter, elapsed }) => counter.per_second(elapsed),
            (A::Value, MetricValue::Gauge(g)) => g.value(),
            (A::Min, MetricValue::Gauge(g)) => g.min(),
            (A::Max, MetricValue::Gauge(g)) => g.max(),
            _ => None,
        }
    }
}

impl FromStr for Aggregation {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s {
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "med" => Aggregation::Med,
            "rate" => Aggregation::Rate,
            "count" => Aggregation::Count,
            "value" => Aggregation::Value,
            _ => {
                let inner = s
                    .strip_prefix("p(")
                    .and_then(|s| s.strip_suffix(')'))
                    .ok_or_else(|| ThresholdError::UnknownAggregation(s.to_string()))?;

                match inner.trim().parse::<f64>() {
                    Ok(p) if (0. ..=100.).contains(&p) => Aggregation::Percentile(p),
                    _ => return Err(ThresholdError::InvalidPercentile(inner.to_string())),
                }
            }
        })
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Count => f.write_str("count"),
            Aggregation::Value => f.write_str("value"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    // NOTE: Two-character operators first so that "<=" is not read as "<".
    const OPERATORS: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
        }
    }

    pub fn as_str(&self) -> &'static str {
        Self::OPERATORS
            .iter()
            .find(|(_, c)| c == self)
            .map(|(s, _)| *s)
            .unwrap_or("?")
    }
}

/// Pass/fail condition over an aggregated run metric, e.g. `http_req_duration: p(95) < 200`.
#[derive(Clone, Debug, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub value: f64,
}

impl Threshold {
    /// Parse an expression of the form `<aggregation> <operator> <number>` for `metric`.
    pub fn new(metric: Metric, expression: &str) -> Result<Self, ThresholdError> {
        let malformed = || ThresholdError::Malformed(expression.to_string());

        let op_start = expression
            .find(['<', '>', '=', '!'])
            .ok_or_else(malformed)?;
        let (lhs, rest) = expression.split_at(op_start);

        let (op, comparison) = Comparison::OPERATORS
            .iter()
            .find(|(op, _)| rest.starts_with(op))
            .ok_or_else(malformed)?;

        let value: f64 = rest[op.len()..].trim().parse().map_err(|_| malformed())?;
        if !value.is_finite() || lhs.trim().is_empty() {
            return Err(malformed());
        }

        let aggregation: Aggregation = lhs.parse()?;
        if !aggregation.applies_to(metric.kind()) {
            return Err(ThresholdError::Unsupported {
                aggregation,
                metric,
            });
        }

        Ok(Self {
            metric,
            aggregation,
            comparison: *comparison,
            value,
        })
    }

    pub fn parse(metric: &str, expression: &str) -> Result<Self, ThresholdError> {
        Self::new(metric.parse()?, expression)
    }

    /// Evaluate against the metric's aggregated value. A metric without samples passes.
    pub fn evaluate(&self, value: MetricValue<'_>) -> ThresholdOutcome {
        let observed = self.aggregation.observe(value);
        let passed = observed.map_or(true, |v| self.comparison.holds(v, self.value));

        ThresholdOutcome {
            threshold: self.clone(),
            observed,
            passed,
        }
    }

    /// The expression half, e.g. `p(95) < 200`.
    pub fn expression(&self) -> String {
        format!(
            "{} {} {}",
            self.aggregation,
            self.comparison.as_str(),
            self.value
        )
    }
}

/// Accepts `<metric>: <expression>`.
impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (metric, expression) = s
            .split_once(':')
            .ok_or_else(|| ThresholdError::Malformed(s.to_string()))?;
        Self::parse(metric, expression)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric, self.expression())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdOutcome {
    pub threshold: Threshold,
    /// `None` when the metric had no samples.
    pub observed: Option<f64>,
    pub passed: bool,
}
