//! Telemetry and structured logging for the conversion worker.

use crate::job::{ConversionJob, JobState};
use clap::ValueEnum;
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const TRACER_NAME: &str = "zpl-render-worker";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level.
pub fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Records telemetry for a completed or failed job.
///
/// Emits a structured log line and an OpenTelemetry span carrying the job's
/// outcome, duration, page geometry and any renderer warnings.
pub fn record_job_telemetry(job: &ConversionJob) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("zpl_conversion_job");

    span.set_attribute(KeyValue::new("job_id", job.id.clone()));
    span.set_attribute(KeyValue::new("state", job.state.to_string()));
    span.set_attribute(KeyValue::new("label_size", job.label_size.to_string()));
    span.set_attribute(KeyValue::new("progress", job.progress as i64));
    span.set_attribute(KeyValue::new("source_bytes", job.source_content.len() as i64));
    span.set_attribute(KeyValue::new("warning_count", job.warnings.len() as i64));

    if let Some(duration_ms) = job.processing_duration_ms() {
        span.set_attribute(KeyValue::new("duration_ms", duration_ms));

        info!(
            job_id = %job.id,
            label_size = %job.label_size,
            duration_ms = duration_ms,
            state = %job.state,
            "ZPL conversion job finished"
        );

        // Warn if exceeding performance threshold (5 seconds)
        if duration_ms > 5000 {
            warn!(
                job_id = %job.id,
                duration_ms = duration_ms,
                "ZPL conversion exceeded performance threshold (5000ms)"
            );
        }
    }

    if job.state == JobState::Failed {
        if let Some(kind) = job.failure {
            span.set_attribute(KeyValue::new("failure_kind", kind.to_string()));
            span.set_attribute(KeyValue::new("input_error", kind.is_input_error()));
        }
        span.set_attribute(KeyValue::new("error", job.message.clone()));
        warn!(
            job_id = %job.id,
            error = %job.message,
            "ZPL conversion job failed"
        );
    }

    if let Some(ref artifact) = job.artifact {
        span.set_attribute(KeyValue::new("artifact_bytes", artifact.size_bytes as i64));
    }

    span.end();
}

/// Records a worker heartbeat for monitoring worker health.
///
/// * `queue_length` - Current number of jobs waiting in the queue
/// * `job_count` - Number of job records held by the store
pub fn record_worker_heartbeat(queue_length: usize, job_count: usize) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("worker_heartbeat");

    span.set_attribute(KeyValue::new("queue_length", queue_length as i64));
    span.set_attribute(KeyValue::new("job_count", job_count as i64));
    span.end();

    info!(queue_length = queue_length, job_count = job_count, "Worker heartbeat");
}

/// Initializes OpenTelemetry with an OTLP exporter.
///
/// Must be called from within a Tokio runtime, once, at startup.
pub fn init_telemetry(endpoint: &str, service_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                KeyValue::new("service.name", service_name.to_string()),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    if let Some(provider) = tracer.provider() {
        global::set_tracer_provider(provider);
    }

    info!("Telemetry initialized: endpoint={}", endpoint);
    Ok(())
}

/// Flushes pending spans. Call before exiting.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
