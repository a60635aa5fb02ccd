mod utils;
#[allow(unused)]
use utils::*;

use booking_load::{booking_load_test, create_booking, BookingClient, HOT_EVENT_ID};
use mock_service::{MockBehavior, StatusCode};
use stampede::prelude::*;
use stampede::{Metric, RampProfile};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(60_000)]
async fn healthy_service_passes() {
    init();
    let (client, state) = mock_target(MockBehavior::default()).await.unwrap();

    let stats = booking_load_test(client).stages(&compressed_stages()).await;

    assert!(stats.http_reqs.count > 0);
    assert_eq!(stats.http_reqs.count, state.requests());
    assert_eq!(stats.failure_rate(), 0.);

    let check = stats.check("status is 201").unwrap();
    assert_eq!(check.fails, 0);
    assert_eq!(check.pass_rate(), Some(1.));
    assert_eq!(check.total(), stats.iterations.count);

    assert!(stats.thresholds.iter().all(|t| t.passed));
    assert!(stats.passed(), "{stats}");
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(60_000)]
async fn server_errors_fail_the_error_rate_threshold() {
    init();
    let behavior = MockBehavior::status(StatusCode::INTERNAL_SERVER_ERROR);
    let (client, _) = mock_target(behavior).await.unwrap();

    let stats = booking_load_test(client).stages(&compressed_stages()).await;

    assert_eq!(stats.failure_rate(), 1.);
    assert_eq!(stats.check("status is 201").unwrap().passes, 0);

    let error_rate = stats
        .thresholds
        .iter()
        .find(|t| t.threshold.metric == Metric::HttpReqFailed)
        .unwrap();
    assert!(!error_rate.passed);
    assert_eq!(error_rate.observed, Some(1.));
    assert!(!stats.passed());
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(60_000)]
async fn slow_service_fails_the_latency_threshold() {
    init();
    let behavior = MockBehavior::delayed(Duration::from_millis(300));
    let (client, _) = mock_target(behavior).await.unwrap();

    let stats = booking_load_test(client).stages(&compressed_stages()).await;

    assert_eq!(stats.failure_rate(), 0.);

    let latency = stats
        .thresholds
        .iter()
        .find(|t| t.threshold.metric == Metric::HttpReqDuration)
        .unwrap();
    assert!(!latency.passed);
    assert!(latency.observed.unwrap() >= 300.);
    assert!(!stats.passed());
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(60_000)]
async fn requests_have_the_booking_shape() {
    init();
    let (client, state) = mock_target(MockBehavior::default()).await.unwrap();

    let _ = book_once(client).await;

    let request = state.last_request().unwrap();
    assert_eq!(request.event_id, HOT_EVENT_ID);
    assert_eq!(request.body, format!(r#"{{"event_id":"{HOT_EVENT_ID}"}}"#));
    assert_eq!(request.content_type.as_deref(), Some("application/json"));
}

async fn book_once(client: Arc<BookingClient>) -> RunStatistics {
    booking_load_test(client)
        .stages(&[Stage::new(Duration::from_millis(200), 1)])
        .start_vus(1)
        .await
}

type Observations = Arc<Mutex<Vec<(Duration, usize)>>>;

/// The booking iteration, also tallying how many iterations are running when each one starts.
#[scenario]
async fn counted_booking(
    client: Arc<BookingClient>,
    running: Arc<AtomicUsize>,
    observed: Observations,
    start: Instant,
) {
    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
    observed.lock().unwrap().push((start.elapsed(), now));

    let res = create_booking(&client).await;
    check(&res, "status is 201", |r| r.is_ok());
    tokio::time::sleep(client.target().pause).await;

    running.fetch_sub(1, Ordering::SeqCst);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(60_000)]
async fn vus_stay_within_the_ramp() {
    init();
    let (client, _) = mock_target(MockBehavior::default()).await.unwrap();
    let stages = compressed_stages();
    let profile = RampProfile::new(&stages);
    let running = Arc::new(AtomicUsize::new(0));
    let observed = Observations::default();

    let stats = counted_booking(client, running.clone(), observed.clone(), Instant::now())
        .stages(&stages)
        .await;

    // A retired VU may still be finishing one iteration (a local request plus a 50ms pause),
    // and retirement happens on the next scheduler tick.
    let overlap = Duration::from_millis(350);

    assert_eq!(running.load(Ordering::SeqCst), 0);
    let observed = observed.lock().unwrap();
    assert!(observed.iter().any(|(_, running)| *running >= 6));
    for (elapsed, running) in observed.iter() {
        let high = profile.peak_between(elapsed.saturating_sub(overlap), *elapsed);
        assert!(*running <= high, "{running} iterations at {elapsed:?}");
    }

    assert!(stats.vus_timeline.len() >= 15);
    for (elapsed, vus) in &stats.vus_timeline {
        let (low, _) = profile.bounds_at(*elapsed).unwrap();
        let high = profile.peak_between(elapsed.saturating_sub(overlap), *elapsed);
        assert!(low <= *vus && *vus <= high, "{vus} VUs at {elapsed:?}");
    }
    assert!(stats.max_vus() >= 8 && stats.max_vus() <= profile.max_target());
}
