//! ZPL label conversion worker
//!
//! Submits each ZPL file given on the command line as a conversion job, drives
//! the jobs through the worker pool and prints every job's final status as a
//! JSON line on stdout.
//!
//! ## Configuration
//!
//! Every flag has an environment fallback, see `--help`:
//! - `ARTIFACT_DIR`: where PDFs are written (default: ./artifacts)
//! - `WORKER_CONCURRENCY`: number of concurrent workers (default: 4)
//! - `ZPL_STRICT`: fail on unsupported ZPL commands
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP collector endpoint
//! - `RUST_LOG`: log level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use zpl_render_worker::artifact::FilesystemArtifactStore;
use zpl_render_worker::config::WorkerConfig;
use zpl_render_worker::orchestrator::JobOrchestrator;
use zpl_render_worker::queue::JobQueue;
use zpl_render_worker::store::JobStore;
use zpl_render_worker::telemetry;
use zpl_render_worker::worker::WorkerPool;
use zpl_render_worker::zpl::ConversionEngine;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::parse();

    telemetry::init_tracing(config.log_format);

    if let Some(endpoint) = &config.otlp_endpoint {
        if let Err(e) = telemetry::init_telemetry(endpoint, &config.service_name) {
            warn!("Failed to initialize telemetry: {}", e);
        }
    }

    info!(
        "Configuration: artifact_dir={}, label_size={}, concurrency={}, policy={:?}",
        config.artifact_dir.display(),
        config.label_size,
        config.concurrency,
        config.policy()
    );

    let artifacts = FilesystemArtifactStore::new(&config.artifact_dir, config.artifact_base_url.clone());
    let orchestrator = Arc::new(
        JobOrchestrator::new(
            Arc::new(JobStore::new()),
            Arc::new(ConversionEngine::new(config.policy())),
            Arc::new(artifacts),
        )
        .with_max_upload_bytes(config.max_upload_bytes),
    );
    let queue = Arc::new(JobQueue::new());
    let pool = WorkerPool::start(orchestrator.clone(), queue.clone(), config.pool_config());

    let mut job_ids = Vec::with_capacity(config.inputs.len());
    let mut rejected = 0usize;
    for input in &config.inputs {
        let bytes = tokio::fs::read(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;

        match orchestrator.submit_upload(&bytes, config.label_size) {
            Ok(job_id) => {
                info!(job_id = %job_id, input = %input.display(), "Submitted conversion job");
                queue
                    .enqueue(job_id.clone())
                    .context("Failed to enqueue job")?;
                job_ids.push(job_id);
            }
            Err(e) => {
                error!(input = %input.display(), "Rejected input: {}", e);
                rejected += 1;
            }
        }
    }

    tokio::select! {
        _ = wait_for_jobs(&orchestrator, &job_ids) => {}
        result = signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received shutdown signal, waiting for in-flight jobs...");
        }
    }

    pool.shutdown().await;

    let mut failed = rejected;
    for job_id in &job_ids {
        let report = orchestrator.status(job_id)?;
        if !report.state.is_terminal() || report.failure.is_some() {
            failed += 1;
        }
        println!(
            "{}",
            serde_json::to_string(&report).context("Failed to serialize job status")?
        );
    }

    telemetry::shutdown_telemetry();

    if failed > 0 {
        anyhow::bail!("{} of {} inputs did not convert", failed, config.inputs.len());
    }
    Ok(())
}

/// Polls until every job has reached a terminal state.
async fn wait_for_jobs(orchestrator: &JobOrchestrator, job_ids: &[String]) {
    loop {
        let pending = job_ids
            .iter()
            .filter(|id| {
                orchestrator
                    .status(id)
                    .map(|report| !report.state.is_terminal())
                    .unwrap_or(false)
            })
            .count();

        if pending == 0 {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
