//! Scheduler lifecycle integration tests.
//!
//! Admission, status counters and shutdown with the real pipeline behind the
//! scheduler.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use mediarelay_core::job::JobStatus;
use mediarelay_core::pipeline::{PipelineConfig, PipelineRunner};
use mediarelay_core::scheduler::{CapacityScope, Scheduler, SchedulerConfig, SchedulerError};
use mediarelay_core::storage::{StorageArena, StorageConfig};
use mediarelay_core::testing::{fixtures, MockProbe, MockTranscoder, MockTransport};

type Runner = PipelineRunner<MockProbe, MockTranscoder, MockTransport>;

struct TestHarness {
    scheduler: Scheduler<Runner>,
    transport: Arc<MockTransport>,
    transcoder: Arc<MockTranscoder>,
    scratch: TempDir,
}

async fn harness(config: SchedulerConfig) -> TestHarness {
    let scratch = TempDir::new().unwrap();
    let storage = StorageArena::new(StorageConfig::with_root(scratch.path()));
    storage.init().await.unwrap();

    let transport = Arc::new(MockTransport::new());
    let transcoder = Arc::new(MockTranscoder::new());
    let runner = PipelineRunner::new(
        PipelineConfig::default(),
        Arc::new(MockProbe::new()),
        Arc::clone(&transcoder),
        Arc::clone(&transport),
        storage,
    );

    let scheduler = Scheduler::new(config, Arc::new(runner));
    scheduler.start();
    TestHarness {
        scheduler,
        transport,
        transcoder,
        scratch,
    }
}

#[tokio::test]
async fn test_per_user_limit_counts_queued_and_running() {
    let h = harness(SchedulerConfig::default().with_workers(1).with_limits(10, 2)).await;
    h.transcoder.set_delay(Duration::from_secs(30));

    h.scheduler.submit(fixtures::mp4_request("7", "a")).unwrap();
    h.scheduler.submit(fixtures::mp4_request("7", "b")).unwrap();
    let err = h
        .scheduler
        .submit(fixtures::mp4_request("7", "c"))
        .unwrap_err();
    assert_eq!(
        err,
        SchedulerError::CapacityExceeded {
            scope: CapacityScope::PerUser,
            limit: 2
        }
    );

    // Another requester is unaffected.
    h.scheduler.submit(fixtures::mp4_request("8", "c")).unwrap();
    assert_eq!(h.scheduler.user_in_flight("7"), 2);

    let status = h.scheduler.status();
    assert_eq!(status.in_flight, 3);
    assert_eq!(status.max_in_flight, 10);

    h.scheduler.stop(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_slot_released_when_job_finishes() {
    let h = harness(SchedulerConfig::default().with_limits(1, 1)).await;

    let mut first = h.scheduler.submit(fixtures::mp4_request("7", "a")).unwrap();
    assert_eq!(first.wait().await, JobStatus::Done);

    let mut second = h.scheduler.submit(fixtures::mp4_request("7", "b")).unwrap();
    assert_eq!(second.wait().await, JobStatus::Done);
    assert_eq!(h.transport.uploads().len(), 2);
    assert_eq!(h.scheduler.status().in_flight, 0);
}

#[tokio::test]
async fn test_duplicate_input_rejected_until_finished() {
    let h = harness(SchedulerConfig::default()).await;
    h.transcoder.set_delay(Duration::from_millis(200));

    let mut handle = h.scheduler.submit(fixtures::mp4_request("7", "a")).unwrap();
    let err = h
        .scheduler
        .submit(fixtures::mp4_request("7", "a"))
        .unwrap_err();
    assert_eq!(
        err,
        SchedulerError::Duplicate {
            job_id: handle.job_id().to_string()
        }
    );

    handle.wait().await;
    assert!(h.scheduler.submit(fixtures::mp4_request("7", "a")).is_ok());
}

#[tokio::test]
async fn test_stop_cancels_running_and_queued_jobs() {
    let h = harness(SchedulerConfig::default().with_workers(1)).await;
    h.transcoder.set_delay(Duration::from_secs(30));

    let mut running = h.scheduler.submit(fixtures::mp4_request("7", "a")).unwrap();
    let mut queued = h.scheduler.submit(fixtures::mp4_request("8", "b")).unwrap();
    while running.status() != JobStatus::Transcoding {
        running.changed().await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), h.scheduler.stop(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(running.wait().await, JobStatus::Cancelled);
    assert_eq!(queued.wait().await, JobStatus::Cancelled);
    assert!(!h.scheduler.is_running());
    assert_eq!(
        h.scheduler
            .submit(fixtures::mp4_request("9", "c"))
            .unwrap_err(),
        SchedulerError::NotRunning
    );
    assert_eq!(std::fs::read_dir(h.scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_list_and_lookup() {
    let h = harness(SchedulerConfig::default()).await;

    let mut a = h.scheduler.submit(fixtures::mp4_request("7", "a")).unwrap();
    let mut b = h.scheduler.submit(fixtures::mp4_request("8", "b")).unwrap();
    a.wait().await;
    b.wait().await;

    let jobs = h.scheduler.list();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Done));

    let job = h.scheduler.job(a.job_id()).unwrap();
    assert_eq!(job.requester, "7");
    assert!(h.scheduler.job("missing").is_none());
    assert!(matches!(
        h.scheduler.cancel("missing"),
        Err(SchedulerError::JobNotFound(_))
    ));
    assert_eq!(h.scheduler.status().finished, 2);
}
