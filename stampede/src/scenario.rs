//! Scenario logic and configuration
use crate::measurement::Measurements;
use crate::task_atomics::TaskAtomics;
use crate::timer::Timer;
use crate::vu_pool::VuPool;
use stampede_core::{RunStatistics, ScenarioConfig, Stage, Threshold, SCHEDULER_INTERVAL};
use std::{
    future::Future,
    num::NonZeroU32,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Load test scenario structure
///
/// Pairs an iteration function with the ramp profile and thresholds it runs under. Awaiting a
/// `Scenario` runs it and resolves to the run's [`RunStatistics`]. Usually created through the
/// [`#[scenario]`](stampede_macros::scenario) macro.
#[pin_project::pin_project]
pub struct Scenario<T> {
    func: T,
    runner_fut: Option<Pin<Box<dyn Future<Output = RunStatistics> + Send>>>,
    config: ScenarioConfig,
}

impl<T> Scenario<T> {
    #[doc(hidden)]
    pub fn new(name: &str, func: T) -> Self {
        Self {
            func,
            runner_fut: None,
            config: ScenarioConfig::new(name),
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }
}

impl<T, F> Future for Scenario<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = ()> + Send + 'static,
{
    type Output = RunStatistics;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let runner = this.runner_fut.get_or_insert_with(|| {
            let func = this.func.clone();
            let config = this.config.clone();
            Box::pin(run_scenario(func, config))
        });

        runner.as_mut().poll(cx)
    }
}

pub trait ConfigurableScenario<T: Send>: Future<Output = T> + Sized + Send {
    fn stages(self, stages: &[Stage]) -> Self;
    fn start_vus(self, vus: usize) -> Self;
    fn threshold(self, threshold: Threshold) -> Self;
    fn thresholds<I: IntoIterator<Item = Threshold>>(self, thresholds: I) -> Self;
    fn graceful_stop(self, graceful_stop: Duration) -> Self;
    fn rps(self, rps: NonZeroU32) -> Self;
}

impl<T, F> ConfigurableScenario<RunStatistics> for Scenario<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = ()> + Send + 'static,
{
    /// Ramp the VU count linearly through `stages`, replacing any earlier stages. The run ends
    /// when the last stage does.
    ///
    /// # Example
    /// ```no_run
    /// use stampede::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     my_scenario()
    ///         .stages(&[
    ///             Stage::new(Duration::from_secs(10), 10),
    ///             Stage::new(Duration::from_secs(10), 0),
    ///         ])
    ///         .await;
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn stages(mut self, stages: &[Stage]) -> Self {
        self.config.profile.stages = stages.to_vec();
        self
    }

    /// VU count the first stage ramps from (default 0).
    fn start_vus(mut self, vus: usize) -> Self {
        self.config.profile.start_vus = vus;
        self
    }

    /// Add a pass/fail threshold evaluated at the end of the run.
    ///
    /// # Example
    /// ```no_run
    /// use stampede::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let stats = my_scenario()
    ///         .stages(&[Stage::new(Duration::from_secs(30), 20)])
    ///         .threshold(Threshold::parse("http_req_duration", "p(95) < 200").unwrap())
    ///         .await;
    ///     assert!(stats.passed());
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn threshold(mut self, threshold: Threshold) -> Self {
        self.config.thresholds.push(threshold);
        self
    }

    fn thresholds<I: IntoIterator<Item = Threshold>>(mut self, thresholds: I) -> Self {
        self.config.thresholds.extend(thresholds);
        self
    }

    /// How long VUs still mid-iteration at the end of the run are waited on before being
    /// interrupted (default 30s).
    fn graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.config.graceful_stop = graceful_stop;
        self
    }

    /// Cap the request rate across all VUs.
    fn rps(mut self, rps: NonZeroU32) -> Self {
        self.config.max_rps = Some(rps);
        self
    }
}

#[instrument(name="scenario", skip_all, fields(name=config.name))]
pub(crate) async fn run_scenario<T, F>(scenario: T, config: ScenarioConfig) -> RunStatistics
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    info!("Running {} with config {:?}", config.name, &config);

    if config.profile.stages.is_empty() {
        warn!("Scenario {} has no stages; nothing to run.", config.name);
    }

    let atomics = Arc::new(TaskAtomics::new(config.max_rps));
    let mut pool = VuPool::new(scenario, atomics.clone());
    let mut measurements = Measurements::new(&config.name);
    let mut timer = Timer::new(SCHEDULER_INTERVAL).await;
    debug!("Scheduler interval {timer}");

    let start = Instant::now();

    // NOTE: This loop is time-sensitive. Any long awaits or blocking will throw off the ramp.
    loop {
        let elapsed = start.elapsed();
        let Some(target) = config.profile.target_at(elapsed) else {
            break;
        };

        if target != pool.vus() {
            trace!("Setting VUs to {target}");
        }
        pool.set_vus(target);
        measurements.record_vus(elapsed, pool.live());

        let tick = timer.tick().await;
        if tick > SCHEDULER_INTERVAL * 2 {
            warn!(
                "Scheduler tick took {}; the ramp is lagging.",
                humantime::format_duration(tick)
            );
        }
        measurements.ingest(&atomics);
    }

    pool.shutdown(config.graceful_stop).await;
    measurements.ingest(&atomics);

    let stats = measurements.finish(start.elapsed(), &config.thresholds);

    for outcome in stats.thresholds.iter().filter(|t| !t.passed) {
        warn!("Threshold {} failed", outcome.threshold);
    }
    info!("Scenario complete");

    stats
}
