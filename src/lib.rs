//! ZPL Label Conversion Worker Library
//!
//! Converts ZPL label markup into multi-page PDF documents through an
//! asynchronous job pipeline: content is validated and submitted as a job,
//! rendered off the caller's path, and the resulting document is stored as an
//! artifact that can be downloaded once the job completes.
//!
//! ## Module Overview
//!
//! - `validator`: structural checks run before a job is created
//! - `job` / `store`: job records, the state machine and the concurrent job store
//! - `zpl`: ZPL tokenizer, parser and label layout
//! - `converter`: label page to PDF conversion using svg2pdf
//! - `artifact`: storage for rendered documents
//! - `orchestrator`: submit / process / status / download
//! - `queue` / `worker`: in-process scheduling
//! - `telemetry`: tracing setup and OpenTelemetry spans
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zpl_render_worker::{
//!     artifact::MemoryArtifactStore,
//!     label::LabelSize,
//!     orchestrator::JobOrchestrator,
//!     store::JobStore,
//!     zpl::{ConversionEngine, InstructionPolicy},
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = JobOrchestrator::new(
//!         Arc::new(JobStore::new()),
//!         Arc::new(ConversionEngine::new(InstructionPolicy::Lenient)),
//!         Arc::new(MemoryArtifactStore::new()),
//!     );
//!
//!     let job_id = orchestrator
//!         .submit("^XA^FO50,50^A0N,40^FDHello^FS^XZ", LabelSize::FourBySix)
//!         .unwrap();
//!     orchestrator.process(&job_id).await.unwrap();
//!
//!     let artifact = orchestrator.download(&job_id).await.unwrap();
//!     println!("{}", artifact.url);
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod converter;
pub mod error;
pub mod job;
pub mod label;
pub mod orchestrator;
pub mod queue;
pub mod store;
pub mod telemetry;
pub mod validator;
pub mod worker;
pub mod zpl;
