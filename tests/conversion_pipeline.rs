//! End-to-end tests for the conversion pipeline.
//!
//! These run the full submit → process → download path against the real
//! renderer and PDF writer, and inspect the produced documents with lopdf.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use usvg::fontdb;
use zpl_render_worker::{
    artifact::{ArtifactStore, FilesystemArtifactStore, MemoryArtifactStore},
    converter::LabelPdfConverter,
    error::ConversionError,
    job::{FailureKind, JobState},
    label::LabelSize,
    orchestrator::JobOrchestrator,
    queue::JobQueue,
    store::JobStore,
    worker::{PoolConfig, WorkerPool},
    zpl::{ConversionEngine, InstructionPolicy},
};

const SHIPPING_LABEL: &str = "\
^XA
^CF0,40
^FO50,50^FDACME Logistics^FS
^FO50,110^GB700,3,3^FS
^BY3^FO80,160^BCN,120,Y,N,N^FD1Z999AA10123456784^FS
^XZ
^XA
^FO50,50^A0N,30,30^FDPackage 2 of 2^FS
^FO50,100^GC80,4,B^FS
^XZ";

fn engine(policy: InstructionPolicy) -> Arc<ConversionEngine> {
    Arc::new(ConversionEngine::with_converter(
        policy,
        LabelPdfConverter::with_fonts(fontdb::Database::new()),
    ))
}

fn orchestrator_with(artifacts: Arc<dyn ArtifactStore>) -> Arc<JobOrchestrator> {
    Arc::new(JobOrchestrator::new(
        Arc::new(JobStore::new()),
        engine(InstructionPolicy::Lenient),
        artifacts,
    ))
}

fn media_box(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> Vec<f32> {
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    page.get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|value| value.as_float().unwrap())
        .collect()
}

/// Two label blocks at 4x6 produce a two-page PDF with 288x432 pt pages.
#[tokio::test]
async fn test_two_blocks_render_two_pages() {
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let orchestrator = orchestrator_with(artifacts.clone());

    let job_id = orchestrator
        .submit(SHIPPING_LABEL, LabelSize::FourBySix)
        .unwrap();
    assert_eq!(orchestrator.status(&job_id).unwrap().state, JobState::Pending);

    orchestrator.process(&job_id).await.unwrap();

    let report = orchestrator.status(&job_id).unwrap();
    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.progress, 100);
    assert_eq!(report.failure, None);

    let artifact = orchestrator.download(&job_id).await.unwrap();
    assert!(!artifact.url.is_empty());
    assert!(!artifact.filename.is_empty());

    let pdf = artifacts.get(&job_id).unwrap();
    assert_eq!(artifact.size_bytes, pdf.len() as u64);

    let doc = lopdf::Document::load_mem(&pdf).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 2);
    for page_id in pages.values() {
        assert_eq!(media_box(&doc, *page_id), vec![0.0, 0.0, 288.0, 432.0]);
    }
}

/// An unterminated second block passes intake but fails during processing.
#[tokio::test]
async fn test_unterminated_block_fails_job() {
    let orchestrator = orchestrator_with(Arc::new(MemoryArtifactStore::new()));

    let job_id = orchestrator
        .submit("^XA^FO10,10^FDfirst^FS^XZ^XA^FO10,10^FDsecond^FS", LabelSize::FourBySix)
        .unwrap();
    orchestrator.process(&job_id).await.unwrap();

    let report = orchestrator.status(&job_id).unwrap();
    assert_eq!(report.state, JobState::Failed);
    assert_eq!(report.failure, Some(FailureKind::MalformedInput));
    assert!(report.message.contains("no matching ^XZ"), "{}", report.message);

    assert!(matches!(
        orchestrator.download(&job_id).await,
        Err(ConversionError::NotFound(_))
    ));

    // terminal jobs are never reprocessed
    assert!(matches!(
        orchestrator.process(&job_id).await,
        Err(ConversionError::AlreadyProcessed {
            state: JobState::Failed,
            ..
        })
    ));
}

#[tokio::test]
async fn test_intake_rejections() {
    let orchestrator = orchestrator_with(Arc::new(MemoryArtifactStore::new()));

    assert!(matches!(
        orchestrator.submit("", LabelSize::TwoByOne),
        Err(ConversionError::InvalidInput(_))
    ));
    assert!(matches!(
        orchestrator.submit("^FDno start marker^FS^XZ", LabelSize::TwoByOne),
        Err(ConversionError::InvalidInput(_))
    ));
    assert!(matches!(
        orchestrator.submit_upload(&[0xff, 0xfe, 0x00], LabelSize::TwoByOne),
        Err(ConversionError::InvalidInput(_))
    ));
    assert!(orchestrator.jobs().is_empty());

    assert!(matches!(
        orchestrator.status("never-issued"),
        Err(ConversionError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_strict_policy_rejects_unknown_commands() {
    let orchestrator = JobOrchestrator::new(
        Arc::new(JobStore::new()),
        engine(InstructionPolicy::Strict),
        Arc::new(MemoryArtifactStore::new()),
    );

    let job_id = orchestrator
        .submit("^XA^FO10,10^BQN,2,5^FDQA,hello^FS^XZ", LabelSize::TwoByOne)
        .unwrap();
    orchestrator.process(&job_id).await.unwrap();

    let report = orchestrator.status(&job_id).unwrap();
    assert_eq!(report.state, JobState::Failed);
    assert_eq!(report.failure, Some(FailureKind::UnsupportedInstruction));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_pool_writes_files() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(Arc::new(FilesystemArtifactStore::new(dir.path(), None)));
    let queue = Arc::new(JobQueue::new());
    let pool = WorkerPool::start(
        orchestrator.clone(),
        queue.clone(),
        PoolConfig {
            concurrency: 3,
            ..PoolConfig::default()
        },
    );

    let mut job_ids = Vec::new();
    for size in LabelSize::ALL {
        let job_id = orchestrator.submit(SHIPPING_LABEL, size).unwrap();
        queue.enqueue(job_id.clone()).unwrap();
        job_ids.push(job_id);
    }

    for _ in 0..1000 {
        let done = job_ids
            .iter()
            .all(|id| orchestrator.status(id).unwrap().state.is_terminal());
        if done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pool.shutdown().await;

    for job_id in &job_ids {
        assert_eq!(orchestrator.status(job_id).unwrap().state, JobState::Completed);
        let artifact = orchestrator.download(job_id).await.unwrap();
        assert!(artifact.url.starts_with("file://"));

        let pdf = std::fs::read(dir.path().join(&artifact.filename)).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(lopdf::Document::load_mem(&pdf).unwrap().get_pages().len(), 2);
    }
}
