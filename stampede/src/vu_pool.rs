use crate::task_atomics::TaskAtomics;
use crate::transaction::TRANSACTION_HOOK;
use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

/// The set of running virtual users.
///
/// Each VU is a task looping the scenario's iteration function. Scaling down never interrupts
/// an iteration: the VU is flagged and exits once its current iteration completes.
pub(crate) struct VuPool<T> {
    scenario: T,
    atomics: Arc<TaskAtomics>,
    active: Vec<Vu>,
    retiring: Vec<JoinHandle<()>>,
    next_id: usize,
}

struct Vu {
    handle: JoinHandle<()>,
    retired: Arc<AtomicBool>,
}

impl<T, F> VuPool<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    pub fn new(scenario: T, atomics: Arc<TaskAtomics>) -> Self {
        Self {
            scenario,
            atomics,
            active: vec![],
            retiring: vec![],
            next_id: 0,
        }
    }

    pub fn set_vus(&mut self, vus: usize) {
        self.retiring.retain(|handle| !handle.is_finished());

        let before = self.active.len();
        self.active.retain(|vu| !vu.handle.is_finished());
        if self.active.len() < before {
            warn!("{} VUs exited unexpectedly; replacing.", before - self.active.len());
        }

        if self.active.len() > vus {
            for vu in self.active.drain(vus..) {
                vu.retired.store(true, Ordering::Relaxed);
                self.retiring.push(vu.handle);
            }
        } else {
            while self.active.len() < vus {
                let vu = self.spawn_vu();
                self.active.push(vu);
            }
        }
    }

    /// VUs that will start another iteration.
    pub fn vus(&self) -> usize {
        self.active.len()
    }

    /// VUs currently running: the active ones plus retired ones still finishing an iteration.
    pub fn live(&self) -> usize {
        self.active.len() + self.retiring.iter().filter(|h| !h.is_finished()).count()
    }

    /// Retire every VU, giving in-flight iterations until `graceful_stop` to finish before
    /// they are aborted.
    pub async fn shutdown(mut self, graceful_stop: Duration) {
        self.set_vus(0);

        let deadline = Instant::now() + graceful_stop;
        let mut interrupted = 0;
        for mut handle in self.retiring.drain(..) {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_panic() => error!("VU panicked: {err}"),
                Ok(Err(_)) => {}
                Err(_) => {
                    handle.abort();
                    interrupted += 1;
                }
            }
        }

        if interrupted > 0 {
            warn!(
                "{interrupted} VUs did not finish within the graceful stop of {}; interrupted.",
                humantime::format_duration(graceful_stop)
            );
        }
    }

    fn spawn_vu(&mut self) -> Vu {
        let id = self.next_id;
        self.next_id += 1;

        let scenario = self.scenario.clone();
        let atomics = self.atomics.clone();
        let retired = Arc::new(AtomicBool::new(false));
        let flag = retired.clone();

        let handle = tokio::spawn(
            TRANSACTION_HOOK
                .scope(self.atomics.clone(), async move {
                    trace!("VU started");
                    while !flag.load(Ordering::Relaxed) {
                        let start = Instant::now();
                        scenario().await;
                        atomics.record_iteration(start.elapsed());
                    }
                    trace!("VU retired");
                })
                .instrument(tracing::debug_span!("vu", id)),
        );

        Vu { handle, retired }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_scenario(
        running: Arc<AtomicUsize>,
        pause: Duration,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> + Clone + Send + Sync
    {
        move || {
            let running = running.clone();
            Box::pin(async move {
                running.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(pause).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn scales_up_and_retires() {
        let running = Arc::new(AtomicUsize::new(0));
        let atomics = Arc::new(TaskAtomics::new(None));
        let mut pool = VuPool::new(
            counting_scenario(running.clone(), Duration::from_millis(50)),
            atomics.clone(),
        );

        pool.set_vus(8);
        assert_eq!(pool.vus(), 8);

        tokio::time::sleep(Duration::from_millis(120)).await;
        pool.set_vus(3);
        assert_eq!(pool.vus(), 3);
        assert_eq!(pool.live(), 8);

        // Retired VUs finish their iteration and exit on their own.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.live(), 3);
        pool.set_vus(3);
        assert_eq!(pool.live(), 3);

        pool.shutdown(Duration::from_secs(1)).await;
        assert_eq!(running.load(Ordering::SeqCst), 0);
        assert!(atomics.collect().iterations.len() >= 8 * 2);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn graceful_stop_interrupts_stragglers() {
        let running = Arc::new(AtomicUsize::new(0));
        let atomics = Arc::new(TaskAtomics::new(None));
        let mut pool = VuPool::new(
            counting_scenario(running.clone(), Duration::from_secs(60)),
            atomics,
        );

        pool.set_vus(2);
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.shutdown(Duration::from_millis(50)).await;

        assert!(logs_contain("2 VUs did not finish"));
    }
}
