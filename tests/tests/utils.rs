use booking_load::{BookingClient, BookingTarget};
use mock_service::{MockBehavior, MockState};
use stampede::Stage;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("stampede=debug,booking_load=debug")),
            )
            .try_init();
    });
}

/// The production profile's shape, compressed to a couple of seconds.
#[allow(unused)]
pub fn compressed_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_millis(400), 2),
        Stage::new(Duration::from_millis(800), 6),
        Stage::new(Duration::from_millis(400), 10),
        Stage::new(Duration::from_millis(400), 0),
    ]
}

#[allow(unused)]
pub fn target(base_url: String) -> BookingTarget {
    BookingTarget {
        pause: Duration::from_millis(50),
        timeout: Duration::from_secs(2),
        ..BookingTarget::new(base_url)
    }
}

/// Start a mock with `behavior` and a booking client pointed at it.
#[allow(unused)]
pub async fn mock_target(
    behavior: MockBehavior,
) -> anyhow::Result<(Arc<BookingClient>, Arc<MockState>)> {
    let (addr, state) = mock_service::spawn(behavior).await?;
    let client = BookingClient::new(target(format!("http://{addr}")))?;
    Ok((Arc::new(client), state))
}
