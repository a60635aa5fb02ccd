//! Mock of the booking service's `POST /events/{event_id}/bookings` endpoint.
//!
//! Every request is counted and the last one is kept for inspection. The reply status and an
//! artificial delay are fixed when the service starts.
use axum::{
    debug_handler,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

pub use axum::http::StatusCode;

/// How the mock answers every booking request.
#[derive(Clone, Copy, Debug)]
pub struct MockBehavior {
    pub status: StatusCode,
    pub delay: Duration,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            status: StatusCode::CREATED,
            delay: Duration::ZERO,
        }
    }
}

impl MockBehavior {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

/// A booking request as it arrived on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub event_id: String,
    pub body: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockState {
    behavior: MockBehavior,
    requests: AtomicU64,
    last_request: Mutex<Option<RecordedRequest>>,
}

impl MockState {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            ..Default::default()
        }
    }

    pub fn behavior(&self) -> MockBehavior {
        self.behavior
    }

    /// Number of booking requests received, valid or not.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, request: RecordedRequest) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request);
    }
}

pub fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/events/:event_id/bookings", post(create_booking))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(listener: TcpListener, state: Arc<MockState>) -> std::io::Result<()> {
    info!(
        "Mock booking service listening on {} ({:?})",
        listener.local_addr()?,
        state.behavior()
    );
    axum::serve(listener, router(state)).await
}

/// Start the mock on an ephemeral localhost port in the background.
pub async fn spawn(behavior: MockBehavior) -> std::io::Result<(SocketAddr, Arc<MockState>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = Arc::new(MockState::new(behavior));

    let server_state = state.clone();
    tokio::spawn(async move {
        if let Err(err) = serve(listener, server_state).await {
            tracing::error!("Mock booking service stopped: {err}");
        }
    });

    Ok((addr, state))
}

#[derive(Deserialize)]
struct BookingRequest {
    event_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    #[serde(rename = "eventID")]
    pub event_id: Uuid,
    pub status: String,
}

#[derive(Error, Debug)]
enum HandlerError {
    #[error("Invalid event id in path: {0}")]
    EventId(#[from] uuid::Error),

    #[error("Invalid booking request: {0}")]
    Body(#[from] serde_json::Error),

    #[error("Event id in body ({body}) does not match path ({path})")]
    Mismatch { path: Uuid, body: Uuid },
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        debug!("Rejecting booking request: {self}");
        counter!("mock_service.bookings", "status" => "400").increment(1);
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

#[debug_handler]
async fn create_booking(
    State(state): State<Arc<MockState>>,
    Path(event_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, HandlerError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.record(RecordedRequest {
        event_id: event_id.clone(),
        body: body.clone(),
        content_type,
    });

    let path_id = Uuid::parse_str(&event_id)?;
    let request: BookingRequest = serde_json::from_str(&body)?;
    if request.event_id != path_id {
        return Err(HandlerError::Mismatch {
            path: path_id,
            body: request.event_id,
        });
    }

    let MockBehavior { status, delay } = state.behavior;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    counter!("mock_service.bookings", "status" => status.as_u16().to_string()).increment(1);

    if status == StatusCode::CREATED {
        let booking = Booking {
            id: Uuid::new_v4(),
            event_id: path_id,
            status: "confirmed".to_string(),
        };
        Ok((status, Json(booking)).into_response())
    } else {
        Ok(status.into_response())
    }
}
