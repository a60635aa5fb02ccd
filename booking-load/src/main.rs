use anyhow::Context;
use booking_load::{
    book_hot_event, default_stages, default_thresholds, BookingClient, BookingTarget,
    DEFAULT_BASE_URL, HOT_EVENT_ID,
};
use clap::Parser;
use stampede::prelude::*;
use std::num::NonZeroU32;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const THRESHOLDS_PASSED: u8 = 0;
/// Exit code when the run completed but a threshold was crossed.
const THRESHOLDS_FAILED: u8 = 99;
const SETUP_FAILED: u8 = 1;

#[derive(Parser, Debug)]
#[command(version, about = "Ramped booking load test against a single hot event")]
struct Cli {
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, default_value = HOT_EVENT_ID)]
    event_id: String,

    /// Ramp stage as `<duration>:<vus>`; repeat to replace the default profile.
    #[arg(short, long = "stage", value_name = "DURATION:VUS")]
    stages: Vec<Stage>,

    /// Threshold as `<metric>: <expression>`; repeat to replace the default thresholds.
    #[arg(short, long = "threshold", value_name = "METRIC: EXPR")]
    thresholds: Vec<Threshold>,

    /// Sleep at the end of every iteration.
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pause: Duration,

    /// Per-request timeout.
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Cap on requests per second across all VUs.
    #[arg(long)]
    rps: Option<NonZeroU32>,

    /// Time in-flight iterations are given to finish once the profile ends.
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    graceful_stop: Duration,
}

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stampede=info,booking_load=info")),
        )
        .init();

    let args = Cli::parse();

    let stats = match run(args).await {
        Ok(stats) => stats,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::from(SETUP_FAILED);
        }
    };

    println!("{stats}");

    ExitCode::from(exit_status(&stats))
}

fn exit_status(stats: &RunStatistics) -> u8 {
    if stats.passed() {
        THRESHOLDS_PASSED
    } else {
        error!("Some thresholds have failed");
        THRESHOLDS_FAILED
    }
}

async fn run(args: Cli) -> anyhow::Result<RunStatistics> {
    let target = BookingTarget {
        base_url: args.base_url,
        event_id: args.event_id,
        pause: args.pause,
        timeout: args.timeout,
    };
    info!("Booking {}", target.bookings_url());

    let client = BookingClient::new(target).context("failed to build HTTP client")?;

    let stages = if args.stages.is_empty() {
        default_stages()
    } else {
        args.stages
    };
    let thresholds = if args.thresholds.is_empty() {
        default_thresholds()
    } else {
        args.thresholds
    };

    let mut scenario = book_hot_event(Arc::new(client))
        .stages(&stages)
        .thresholds(thresholds)
        .graceful_stop(args.graceful_stop);
    if let Some(rps) = args.rps {
        scenario = scenario.rps(rps);
    }

    Ok(scenario.await)
}
