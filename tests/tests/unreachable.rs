mod utils;
#[allow(unused)]
use utils::*;

use booking_load::{booking_load_test, BookingClient};
use stampede::prelude::*;
use std::sync::Arc;
use std::time::Duration;

// `traced_test` owns the global subscriber in this binary, so `init` is not called here.
#[tracing_test::traced_test]
#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(60_000)]
async fn unreachable_service_fails_every_request() {
    // Bind then drop to get a port with nothing listening.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = BookingClient::new(target(format!("http://{addr}"))).unwrap();

    let stats = booking_load_test(Arc::new(client))
        .stages(&[
            Stage::new(Duration::from_millis(300), 3),
            Stage::new(Duration::from_millis(300), 0),
        ])
        .await;

    assert!(stats.http_reqs.count > 0);
    assert_eq!(stats.failure_rate(), 1.);
    assert_eq!(stats.check("status is 201").unwrap().passes, 0);
    assert!(!stats.passed());
    assert!(logs_contain("Threshold http_req_failed: rate < 0.01 failed"));
}
