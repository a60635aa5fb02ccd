use crate::task_atomics::{CheckSample, RequestSample, TaskAtomics};
use std::{future::Future, sync::Arc};
use tokio::time::Instant;
use tracing::warn;

/// Transaction hook used by the `#[transaction]` macro. Not intended to be used manually.
///
/// Times `func` as one request: an `Err` output is a failed request.
pub async fn transaction_hook<T, R, E>(func: T) -> T::Output
where
    T: Future<Output = Result<R, E>>,
{
    if let Ok(hook) = TRANSACTION_HOOK.try_with(Arc::clone) {
        hook.until_ready().await;

        let start = Instant::now();
        let res = func.await;

        hook.record_request(RequestSample {
            duration: start.elapsed(),
            failed: res.is_err(),
        });

        res
    } else {
        warn!("No hook available.");
        func.await
    }
}

/// Record a named assertion about `value` and return its result.
///
/// A failed check is tallied in the run's statistics; it never aborts the iteration.
///
/// ```no_run
/// # async fn example() {
/// let status = 201;
/// stampede::check(&status, "status is 201", |s| *s == 201);
/// # }
/// ```
pub fn check<T, P>(value: &T, name: &'static str, predicate: P) -> bool
where
    T: ?Sized,
    P: FnOnce(&T) -> bool,
{
    let passed = predicate(value);

    let recorded =
        TRANSACTION_HOOK.try_with(|hook| hook.record_check(CheckSample { name, passed }));
    if recorded.is_err() {
        warn!("No hook available; check \"{name}\" not recorded.");
    }

    passed
}

tokio::task_local! {
    pub(crate) static TRANSACTION_HOOK: Arc<TaskAtomics>;
}
