//! Command line and environment configuration for the worker binary.

use crate::label::LabelSize;
use crate::telemetry::LogFormat;
use crate::validator::DEFAULT_MAX_UPLOAD_BYTES;
use crate::worker::PoolConfig;
use crate::zpl::InstructionPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command line configuration for the conversion worker.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "zpl-render-worker",
    version,
    about = "Converts ZPL label files to PDF through the conversion job pipeline"
)]
pub struct WorkerConfig {
    /// ZPL files to convert. Each file becomes one job.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory rendered documents are written to
    #[arg(long, default_value = "artifacts", env = "ARTIFACT_DIR")]
    pub artifact_dir: PathBuf,

    /// Public URL the artifact directory is served from
    #[arg(long, env = "ARTIFACT_BASE_URL")]
    pub artifact_base_url: Option<String>,

    /// Physical label size applied to every input
    #[arg(long, default_value = "4x6", env = "LABEL_SIZE")]
    pub label_size: LabelSize,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 4, env = "WORKER_CONCURRENCY")]
    pub concurrency: usize,

    /// Reject unsupported ZPL commands instead of skipping them
    #[arg(long, default_value_t = false, env = "ZPL_STRICT")]
    pub strict: bool,

    /// Largest accepted input file, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// Seconds finished jobs are retained before eviction
    #[arg(long, default_value_t = 86_400, env = "JOB_TTL_SECS")]
    pub job_ttl_secs: u64,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    /// OTLP collector endpoint. Span export is disabled when unset.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long, default_value = "zpl-render-worker", env = "OTEL_SERVICE_NAME")]
    pub service_name: String,
}

impl WorkerConfig {
    pub fn policy(&self) -> InstructionPolicy {
        if self.strict {
            InstructionPolicy::Strict
        } else {
            InstructionPolicy::Lenient
        }
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            concurrency: self.concurrency,
            job_ttl: self.job_ttl(),
            ..PoolConfig::default()
        }
    }
}
