use crate::{Counter, Gauge, Metric, Rate, Threshold, ThresholdOutcome, Trend};
use std::fmt;
use std::time::Duration;

/// Borrowed view of one metric's aggregated data.
#[derive(Clone, Copy, Debug)]
pub enum MetricValue<'a> {
    Trend(&'a Trend),
    Rate(&'a Rate),
    Counter {
        counter: &'a Counter,
        elapsed: Duration,
    },
    Gauge(&'a Gauge),
}

/// Pass/fail tally for one named check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckSummary {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    pub fn pass_rate(&self) -> Option<f64> {
        (self.total() > 0).then(|| self.passes as f64 / self.total() as f64)
    }
}

/// Statistics for a completed Scenario run.
#[derive(Clone, Debug, Default)]
pub struct RunStatistics {
    pub name: String,
    pub duration: Duration,
    /// VU count recorded at every scheduler tick, keyed by elapsed time.
    pub vus_timeline: Vec<(Duration, usize)>,
    pub vus: Gauge,
    pub http_reqs: Counter,
    pub http_req_duration: Trend,
    pub http_req_failed: Rate,
    pub iterations: Counter,
    pub iteration_duration: Trend,
    pub checks: Rate,
    pub check_summaries: Vec<CheckSummary>,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunStatistics {
    pub fn metric(&self, metric: Metric) -> MetricValue<'_> {
        match metric {
            Metric::HttpReqDuration => MetricValue::Trend(&self.http_req_duration),
            Metric::IterationDuration => MetricValue::Trend(&self.iteration_duration),
            Metric::HttpReqFailed => MetricValue::Rate(&self.http_req_failed),
            Metric::Checks => MetricValue::Rate(&self.checks),
            Metric::HttpReqs => MetricValue::Counter {
                counter: &self.http_reqs,
                elapsed: self.duration,
            },
            Metric::Iterations => MetricValue::Counter {
                counter: &self.iterations,
                elapsed: self.duration,
            },
            Metric::Vus => MetricValue::Gauge(&self.vus),
        }
    }

    /// Evaluate `thresholds`, replacing any earlier outcomes.
    pub fn evaluate_thresholds(&mut self, thresholds: &[Threshold]) {
        self.thresholds = thresholds
            .iter()
            .map(|t| t.evaluate(self.metric(t.metric)))
            .collect();
    }

    /// True when every threshold passed.
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn failure_rate(&self) -> f64 {
        self.http_req_failed.rate().unwrap_or(0.)
    }

    pub fn check(&self, name: &str) -> Option<&CheckSummary> {
        self.check_summaries.iter().find(|c| c.name == name)
    }

    pub fn max_vus(&self) -> usize {
        self.vus.max().map_or(0, |v| v as usize)
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario {} ran for {} with up to {} VUs",
            self.name,
            humantime::format_duration(round_millis(self.duration)),
            self.max_vus()
        )?;
        writeln!(f)?;

        for check in &self.check_summaries {
            let mark = if check.fails == 0 { '✓' } else { '✗' };
            writeln!(
                f,
                "  {mark} {} ({} passed, {} failed)",
                check.name, check.passes, check.fails
            )?;
        }
        if !self.check_summaries.is_empty() {
            writeln!(f)?;
        }

        write_rate(f, Metric::Checks, &self.checks)?;
        write_trend(f, Metric::HttpReqDuration, &self.http_req_duration)?;
        write_rate(f, Metric::HttpReqFailed, &self.http_req_failed)?;
        write_counter(f, Metric::HttpReqs, &self.http_reqs, self.duration)?;
        write_trend(f, Metric::IterationDuration, &self.iteration_duration)?;
        write_counter(f, Metric::Iterations, &self.iterations, self.duration)?;
        writeln!(
            f,
            "  {:.<24} max={}",
            Metric::Vus.as_str(),
            self.max_vus()
        )?;

        if !self.thresholds.is_empty() {
            writeln!(f)?;
            for outcome in &self.thresholds {
                let mark = if outcome.passed { '✓' } else { '✗' };
                match outcome.observed {
                    Some(observed) => writeln!(
                        f,
                        "  {mark} {} (observed {observed:.4})",
                        outcome.threshold
                    )?,
                    None => writeln!(f, "  {mark} {} (no samples)", outcome.threshold)?,
                }
            }
        }

        Ok(())
    }
}

fn round_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

fn write_trend(f: &mut fmt::Formatter<'_>, metric: Metric, trend: &Trend) -> fmt::Result {
    let ms = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}ms"));
    writeln!(
        f,
        "  {:.<24} avg={} min={} med={} max={} p(90)={} p(95)={}",
        metric.as_str(),
        ms(trend.avg()),
        ms(trend.min()),
        ms(trend.med()),
        ms(trend.max()),
        ms(trend.quantile(0.90)),
        ms(trend.quantile(0.95)),
    )
}

fn write_rate(f: &mut fmt::Formatter<'_>, metric: Metric, rate: &Rate) -> fmt::Result {
    writeln!(
        f,
        "  {:.<24} {:.2}% {} out of {}",
        metric.as_str(),
        rate.rate().unwrap_or(0.) * 100.,
        rate.hits,
        rate.total
    )
}

fn write_counter(
    f: &mut fmt::Formatter<'_>,
    metric: Metric,
    counter: &Counter,
    elapsed: Duration,
) -> fmt::Result {
    writeln!(
        f,
        "  {:.<24} {} {:.2}/s",
        metric.as_str(),
        counter.count,
        counter.per_second(elapsed).unwrap_or(0.)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> RunStatistics {
        let mut stats = RunStatistics {
            name: "hot_event".to_string(),
            duration: Duration::from_secs(10),
            ..Default::default()
        };
        for i in 0..100 {
            stats.http_req_duration.push(20.);
            stats.http_req_failed.push(i == 0);
        }
        stats.http_reqs.add(100);
        stats.vus.set(10.);
        stats.check_summaries.push(CheckSummary {
            name: "status is 201".to_string(),
            passes: 99,
            fails: 1,
        });
        stats
    }

    #[test]
    fn thresholds_decide_the_run() {
        let mut stats = stats();
        assert!(stats.passed());

        stats.evaluate_thresholds(&[
            Threshold::parse("http_req_duration", "p(95) < 200").unwrap(),
            Threshold::parse("http_req_failed", "rate < 0.01").unwrap(),
        ]);
        assert!(stats.thresholds[0].passed);
        assert!(!stats.thresholds[1].passed);
        assert!(!stats.passed());
    }

    #[test]
    fn lookups() {
        let stats = stats();
        assert_eq!(stats.failure_rate(), 0.01);
        assert_eq!(stats.max_vus(), 10);
        assert_eq!(stats.check("status is 201").unwrap().pass_rate(), Some(0.99));
        assert!(stats.check("missing").is_none());
    }

    #[test]
    fn summary_mentions_everything() {
        let mut stats = stats();
        let failed = Threshold::parse("http_req_failed", "rate < 0.01").unwrap();
        stats.evaluate_thresholds(&[failed]);
        let summary = stats.to_string();

        assert!(summary.contains("scenario hot_event ran for 10s"));
        assert!(summary.contains("✗ status is 201 (99 passed, 1 failed)"));
        assert!(summary.contains("http_req_failed"));
        assert!(summary.contains("✗ http_req_failed: rate < 0.01 (observed 0.0100)"));
    }
}
