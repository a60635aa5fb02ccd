use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics_util::AtomicBucket;
use std::num::NonZeroU32;
use std::time::Duration;

/// Sample buckets shared by every VU of a run. Pushes are lock-free; the scheduler drains them
/// on each tick.
pub(crate) struct TaskAtomics {
    limiter: Option<DefaultDirectRateLimiter>,
    requests: AtomicBucket<RequestSample>,
    checks: AtomicBucket<CheckSample>,
    iterations: AtomicBucket<Duration>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestSample {
    pub duration: Duration,
    pub failed: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CheckSample {
    pub name: &'static str,
    pub passed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ProvisionalData {
    pub requests: Vec<RequestSample>,
    pub checks: Vec<CheckSample>,
    pub iterations: Vec<Duration>,
}

impl TaskAtomics {
    pub fn new(max_rps: Option<NonZeroU32>) -> Self {
        Self {
            limiter: max_rps.map(rate_limiter),
            requests: AtomicBucket::new(),
            checks: AtomicBucket::new(),
            iterations: AtomicBucket::new(),
        }
    }

    pub async fn until_ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    pub fn record_request(&self, sample: RequestSample) {
        #[cfg(feature = "metrics")]
        {
            use stampede_core::Metric;
            metrics::counter!(Metric::HttpReqs.as_str()).increment(1);
            metrics::histogram!(Metric::HttpReqDuration.as_str())
                .record(sample.duration.as_secs_f64() * 1e3);
            if sample.failed {
                metrics::counter!(Metric::HttpReqFailed.as_str()).increment(1);
            }
        }

        self.requests.push(sample);
    }

    pub fn record_check(&self, sample: CheckSample) {
        #[cfg(feature = "metrics")]
        {
            let result = if sample.passed { "pass" } else { "fail" };
            metrics::counter!(
                stampede_core::Metric::Checks.as_str(),
                "check" => sample.name,
                "result" => result
            )
            .increment(1);
        }

        self.checks.push(sample);
    }

    pub fn record_iteration(&self, duration: Duration) {
        #[cfg(feature = "metrics")]
        metrics::counter!(stampede_core::Metric::Iterations.as_str()).increment(1);

        self.iterations.push(duration);
    }

    pub fn collect(&self) -> ProvisionalData {
        let mut data = ProvisionalData::default();
        self.requests
            .clear_with(|samples| data.requests.extend_from_slice(samples));
        self.checks
            .clear_with(|samples| data.checks.extend_from_slice(samples));
        self.iterations
            .clear_with(|samples| data.iterations.extend_from_slice(samples));
        data
    }
}

fn rate_limiter(max_rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(
        Quota::per_second(max_rps)
            // TODO: Make burst configurable
            .allow_burst(NonZeroU32::MIN),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_drains() {
        let atomics = TaskAtomics::new(None);
        atomics.record_request(RequestSample {
            duration: Duration::from_millis(5),
            failed: false,
        });
        atomics.record_check(CheckSample {
            name: "ok",
            passed: true,
        });
        atomics.record_iteration(Duration::from_millis(6));

        let data = atomics.collect();
        assert_eq!(data.requests.len(), 1);
        assert_eq!(data.checks.len(), 1);
        assert_eq!(data.iterations, vec![Duration::from_millis(6)]);

        let data = atomics.collect();
        assert!(data.requests.is_empty() && data.checks.is_empty() && data.iterations.is_empty());
    }

    #[tokio::test]
    async fn rate_limited() {
        let atomics = TaskAtomics::new(NonZeroU32::new(20));
        let start = tokio::time::Instant::now();
        for _ in 0..5 {
            atomics.until_ready().await;
        }
        // First permit is immediate, the remaining four are spaced 50ms apart.
        assert!(start.elapsed() >= Duration::from_millis(190));
    }
}
