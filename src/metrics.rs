//! Prometheus metrics for the relay.
//!
//! Exposes:
//! - `tg_relay_command_duration_seconds` (histogram)
//! - `tg_relay_command_total` (counter with status)
//! - `tg_relay_command_inflight` (gauge)
//! - `tg_relay_polls_total` (counter by outcome)
//! - `tg_relay_poll_duration_seconds` (histogram)
//! - `tg_relay_poll_consecutive_failures` (gauge)
//! - `tg_relay_messages_relayed_total` (counter)
//! - `tg_relay_sends_total` (counter by status)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, register_int_gauge, register_int_gauge_vec, Encoder, Histogram,
    HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::poller::PollOutcome;
use crate::relay::Delivery;

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 50ms up to ~3 minutes.
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "tg_relay_command_duration_seconds",
        "CLI command duration in seconds",
        &["command"],
        buckets
    )
    .expect("failed to register command duration histogram")
});

static COMMAND_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tg_relay_command_total",
        "Total command executions by status",
        &["command", "status"]
    )
    .expect("failed to register command counter")
});

static COMMAND_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "tg_relay_command_inflight",
        "Number of in-flight commands",
        &["command"]
    )
    .expect("failed to register inflight gauge")
});

static POLLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tg_relay_polls_total",
        "Successful getDifference polls by outcome",
        &["outcome"]
    )
    .expect("failed to register poll counter")
});

static POLL_DURATION: Lazy<Histogram> = Lazy::new(|| {
    // Exponential buckets from 10ms up to ~40 seconds.
    let buckets =
        prometheus::exponential_buckets(0.01, 2.0, 12).expect("failed to create histogram buckets");
    register_histogram!(
        "tg_relay_poll_duration_seconds",
        "Duration of one poll including relays",
        buckets
    )
    .expect("failed to register poll duration histogram")
});

static POLL_FAILURES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tg_relay_poll_consecutive_failures",
        "Polls failed in a row"
    )
    .expect("failed to register poll failure gauge")
});

static MESSAGES_RELAYED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tg_relay_messages_relayed_total",
        "Source messages fanned out to destinations"
    )
    .expect("failed to register relayed message counter")
});

static SENDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tg_relay_sends_total",
        "Per-destination send attempts by status",
        &["status"]
    )
    .expect("failed to register send counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&COMMAND_TOTAL);
    Lazy::force(&COMMAND_INFLIGHT);
    Lazy::force(&POLLS_TOTAL);
    Lazy::force(&POLL_DURATION);
    Lazy::force(&POLL_FAILURES);
    Lazy::force(&MESSAGES_RELAYED);
    Lazy::force(&SENDS_TOTAL);
}

/// Increment inflight gauge for a command.
pub fn record_command_start(command: &'static str) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).inc();
}

/// Record command completion with duration and status.
pub fn record_command_result(command: &'static str, duration: Duration, success: bool) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).dec();
    COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration.as_secs_f64());
    COMMAND_TOTAL
        .with_label_values(&[command, if success { "ok" } else { "error" }])
        .inc();
}

fn poll_label(outcome: &PollOutcome) -> &'static str {
    match outcome {
        PollOutcome::Idle => "idle",
        PollOutcome::Resynced { .. } => "resynced",
        PollOutcome::Processed { .. } => "difference",
    }
}

pub fn record_poll(outcome: &PollOutcome) {
    POLLS_TOTAL.with_label_values(&[poll_label(outcome)]).inc();
}

pub fn record_poll_duration(duration: Duration) {
    POLL_DURATION.observe(duration.as_secs_f64());
}

pub fn set_consecutive_failures(failures: u32) {
    POLL_FAILURES.set(i64::from(failures));
}

pub fn record_relayed_message() {
    MESSAGES_RELAYED.inc();
}

fn delivery_label(delivery: &Delivery) -> &'static str {
    match delivery {
        Delivery::Sent => "sent",
        Delivery::DryRun => "dry_run",
        Delivery::Failed(_) => "failed",
    }
}

pub fn record_delivery(delivery: &Delivery) {
    SENDS_TOTAL.with_label_values(&[delivery_label(delivery)]).inc();
}

fn with_status(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

/// Answer a scrape. Only `/metrics` exists.
fn respond(path: &str) -> Response<Full<Bytes>> {
    if path != "/metrics" {
        return with_status(StatusCode::NOT_FOUND, Bytes::new());
    }

    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut body) {
        error!("Failed to encode metrics: {}", err);
        return with_status(StatusCode::INTERNAL_SERVER_ERROR, "encode error");
    }

    let mut response = with_status(StatusCode::OK, body);
    if let Ok(value) = hyper::header::HeaderValue::from_str(encoder.format_type()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    response
}

async fn serve(listener: TcpListener) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tokio::spawn(async move {
            let service = service_fn(|req: Request<Incoming>| async move {
                Ok::<_, Infallible>(respond(req.uri().path()))
            });
            if let Err(err) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(%addr, "Cannot bind metrics endpoint: {}", err);
                return;
            }
        };
        info!(%addr, "Prometheus metrics endpoint started");
        if let Err(err) = serve(listener).await {
            error!(%addr, "Metrics server stopped: {}", err);
        }
    });
}
