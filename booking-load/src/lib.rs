//! Booking load test: ramps virtual users booking the same "hot" event.
//!
//! Every iteration POSTs one booking, checks for `201 Created` and pauses. The ramp profile and
//! thresholds are plain data ([`default_stages`], [`default_thresholds`]) which callers may
//! override on the returned scenario.
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use stampede::prelude::*;
use stampede::{Aggregation, Comparison, Metric};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// The event every VU books, so that all load lands on one contended record.
pub const HOT_EVENT_ID: &str = "550e8400-e29b-41d4-a716-446655440000";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Where and how each VU books.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingTarget {
    pub base_url: String,
    pub event_id: String,
    /// Sleep at the end of every iteration.
    pub pause: Duration,
    /// Per-request timeout; a timed out request counts as failed.
    pub timeout: Duration,
}

impl Default for BookingTarget {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            event_id: HOT_EVENT_ID.to_string(),
            pause: DEFAULT_PAUSE,
            timeout: stampede::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl BookingTarget {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn bookings_url(&self) -> String {
        format!(
            "{}/events/{}/bookings",
            self.base_url.trim_end_matches('/'),
            self.event_id
        )
    }

    /// `{"event_id":"<id>"}`, byte for byte.
    pub fn booking_payload(&self) -> String {
        serde_json::json!({ "event_id": self.event_id }).to_string()
    }
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Booking request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Booking rejected with status {0}")]
    Status(StatusCode),

    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("Base URL \"{0}\" must be http or https")]
    Scheme(String),
}

/// HTTP client shared by every VU of a run.
#[derive(Clone, Debug)]
pub struct BookingClient {
    target: BookingTarget,
    client: Client,
}

impl BookingClient {
    pub fn new(target: BookingTarget) -> Result<Self, BookingError> {
        let base_url = url::Url::parse(&target.base_url)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(BookingError::Scheme(target.base_url));
        }

        let client = Client::builder().timeout(target.timeout).build()?;
        Ok(Self { target, client })
    }

    pub fn target(&self) -> &BookingTarget {
        &self.target
    }
}

/// 0→10 VUs over 10s, up to 50 over 30s, up to 100 over 20s, back to 0 over 10s.
pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_secs(10), 10),
        Stage::new(Duration::from_secs(30), 50),
        Stage::new(Duration::from_secs(20), 100),
        Stage::new(Duration::from_secs(10), 0),
    ]
}

/// `http_req_duration: p(95) < 200` and `http_req_failed: rate < 0.01`.
pub fn default_thresholds() -> Vec<Threshold> {
    vec![
        Threshold {
            metric: Metric::HttpReqDuration,
            aggregation: Aggregation::Percentile(95.),
            comparison: Comparison::Lt,
            value: 200.,
        },
        Threshold {
            metric: Metric::HttpReqFailed,
            aggregation: Aggregation::Rate,
            comparison: Comparison::Lt,
            value: 0.01,
        },
    ]
}

/// Book the target event once. Anything but `201 Created` is a failed request.
#[transaction]
pub async fn create_booking(client: &BookingClient) -> Result<StatusCode, BookingError> {
    let res = client
        .client
        .post(client.target.bookings_url())
        .header(CONTENT_TYPE, "application/json")
        .body(client.target.booking_payload())
        .send()
        .await?;

    let status = res.status();
    // Drain the body so the sample covers the whole response.
    res.bytes().await?;

    if status == StatusCode::CREATED {
        Ok(status)
    } else {
        Err(BookingError::Status(status))
    }
}

/// One booking iteration: request, check, pause.
#[scenario]
pub async fn book_hot_event(client: Arc<BookingClient>) {
    let res = create_booking(&client).await;

    check(&res, "status is 201", |r| {
        matches!(r, Ok(status) if *status == StatusCode::CREATED)
    });
    if let Err(err) = &res {
        debug!("{err}");
    }

    tokio::time::sleep(client.target().pause).await;
}

/// The booking scenario with the default ramp profile and thresholds applied.
pub fn booking_load_test(client: Arc<BookingClient>) -> impl ConfigurableScenario<RunStatistics> {
    book_hot_event(client)
        .stages(&default_stages())
        .thresholds(default_thresholds())
}
