use anyhow::Context;
use axum::http::StatusCode;
use clap::Parser;
use mock_service::{MockBehavior, MockState};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version, about = "Mock booking service")]
struct Cli {
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Status code returned for every valid booking request.
    #[arg(short, long, default_value_t = 201)]
    status: u16,

    /// Artificial latency added to every valid booking request.
    #[arg(short, long, default_value_t = 0)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info")),
        )
        .init();

    let args = Cli::parse();
    let behavior = MockBehavior {
        status: StatusCode::from_u16(args.status)
            .with_context(|| format!("invalid status code {}", args.status))?,
        delay: Duration::from_millis(args.delay_ms),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    mock_service::serve(listener, Arc::new(MockState::new(behavior))).await?;

    Ok(())
}
