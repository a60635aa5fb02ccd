use crate::task_atomics::TaskAtomics;
use stampede_core::{CheckSummary, RunStatistics, Threshold};
use std::time::Duration;

/// Running aggregation of everything drained from the VUs during one run.
pub(crate) struct Measurements {
    stats: RunStatistics,
}

impl Measurements {
    pub fn new(name: &str) -> Self {
        Self {
            stats: RunStatistics {
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    /// `vus` counts every running VU, including retired ones finishing their last iteration.
    pub fn record_vus(&mut self, elapsed: Duration, vus: usize) {
        #[cfg(feature = "metrics")]
        metrics::gauge!(stampede_core::Metric::Vus.as_str()).set(vus as f64);

        self.stats.vus.set(vus as f64);
        self.stats.vus_timeline.push((elapsed, vus));
    }

    pub fn ingest(&mut self, atomics: &TaskAtomics) {
        let data = atomics.collect();
        let stats = &mut self.stats;

        stats.http_reqs.add(data.requests.len() as u64);
        for request in data.requests {
            stats.http_req_duration.push_duration(request.duration);
            stats.http_req_failed.push(request.failed);
        }

        for check in data.checks {
            stats.checks.push(check.passed);

            let summary = match stats
                .check_summaries
                .iter()
                .position(|c| c.name == check.name)
            {
                Some(idx) => &mut stats.check_summaries[idx],
                None => {
                    stats.check_summaries.push(CheckSummary {
                        name: check.name.to_string(),
                        passes: 0,
                        fails: 0,
                    });
                    let last = stats.check_summaries.len() - 1;
                    &mut stats.check_summaries[last]
                }
            };

            if check.passed {
                summary.passes += 1;
            } else {
                summary.fails += 1;
            }
        }

        stats.iterations.add(data.iterations.len() as u64);
        for iteration in data.iterations {
            stats.iteration_duration.push_duration(iteration);
        }
    }

    pub fn finish(mut self, elapsed: Duration, thresholds: &[Threshold]) -> RunStatistics {
        self.stats.duration = elapsed;
        self.stats.evaluate_thresholds(thresholds);
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_atomics::{CheckSample, RequestSample};

    #[test]
    fn aggregates_drained_samples() {
        let atomics = TaskAtomics::new(None);
        let mut measurements = Measurements::new("test");

        for (ms, failed) in [(10, false), (20, false), (300, true)] {
            atomics.record_request(RequestSample {
                duration: Duration::from_millis(ms),
                failed,
            });
            atomics.record_check(CheckSample {
                name: "status is 201",
                passed: !failed,
            });
        }
        atomics.record_check(CheckSample {
            name: "has body",
            passed: true,
        });
        atomics.record_iteration(Duration::from_secs(1));

        measurements.record_vus(Duration::ZERO, 0);
        measurements.ingest(&atomics);
        measurements.record_vus(Duration::from_millis(100), 3);
        measurements.ingest(&atomics);

        let thresholds = [Threshold::parse("http_req_failed", "rate < 0.01").unwrap()];
        let stats = measurements.finish(Duration::from_secs(2), &thresholds);

        assert_eq!(stats.http_reqs.count, 3);
        assert_eq!(stats.http_req_failed.hits, 1);
        assert_eq!(stats.checks.total, 4);
        assert_eq!(stats.checks.hits, 3);
        assert_eq!(
            stats.check("status is 201"),
            Some(&CheckSummary {
                name: "status is 201".into(),
                passes: 2,
                fails: 1,
            })
        );
        assert_eq!(stats.check_summaries[1].name, "has body");
        assert_eq!(stats.iterations.count, 1);
        assert_eq!(stats.max_vus(), 3);
        assert_eq!(stats.vus_timeline.len(), 2);
        assert!(!stats.passed());
    }
}
