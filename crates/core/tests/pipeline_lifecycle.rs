//! Pipeline lifecycle integration tests.
//!
//! These tests run the pipeline under the real scheduler with mock
//! transport, probe and transcoder:
//! - Stage transitions and the single final status message
//! - Retries of transient transport failures
//! - Partial success across several outputs
//! - Cancellation while an output is being produced
//! - Scratch space left empty on every exit path

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use mediarelay_core::job::{FailureKind, JobRequest, JobStatus, OutputSpec, OutputStatus};
use mediarelay_core::pipeline::{OutputPolicy, PipelineConfig, PipelineRunner};
use mediarelay_core::probe::ProbeError;
use mediarelay_core::progress::{ProgressConfig, ProgressReporter, Stage};
use mediarelay_core::scheduler::{RetryConfig, Scheduler, SchedulerConfig, SchedulerError};
use mediarelay_core::storage::{StorageArena, StorageConfig};
use mediarelay_core::testing::{fixtures, MockProbe, MockTranscoder, MockTransport};
use mediarelay_core::transcoder::{
    AudioCodec, ContainerFormat, EncoderCapabilities, PlanKind, TranscodeError, VideoCodec,
};
use mediarelay_core::transport::{MediaKind, MediaRef, TransportError};
use mediarelay_core::Job;

type Runner = PipelineRunner<MockProbe, MockTranscoder, MockTransport>;

/// Test helper wiring a scheduler to a pipeline built from mocks.
struct TestHarness {
    scheduler: Scheduler<Runner>,
    transport: Arc<MockTransport>,
    probe: Arc<MockProbe>,
    transcoder: Arc<MockTranscoder>,
    scratch: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        Self::build(PipelineConfig::default(), |runner| runner).await
    }

    async fn with_policy(policy: OutputPolicy) -> Self {
        Self::build(PipelineConfig::default().with_output_policy(policy), |runner| runner).await
    }

    async fn build(config: PipelineConfig, customize: impl FnOnce(Runner) -> Runner) -> Self {
        let scratch = TempDir::new().unwrap();
        let storage = StorageArena::new(StorageConfig::with_root(scratch.path()));
        storage.init().await.unwrap();

        let transport = Arc::new(MockTransport::new());
        let probe = Arc::new(MockProbe::new());
        let transcoder = Arc::new(MockTranscoder::new());

        let runner = customize(PipelineRunner::new(
            config,
            Arc::clone(&probe),
            Arc::clone(&transcoder),
            Arc::clone(&transport),
            storage,
        ));

        let scheduler_config = SchedulerConfig::default()
            .with_workers(2)
            .with_retry(RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 1,
                multiplier: 2.0,
                max_delay_ms: 5,
            });
        let scheduler = Scheduler::new(scheduler_config, Arc::new(runner));
        scheduler.start();

        Self {
            scheduler,
            transport,
            probe,
            transcoder,
            scratch,
        }
    }

    /// Submits and waits for the job to finish.
    async fn run(&self, outputs: Vec<OutputSpec>) -> Job {
        self.run_request(fixtures::request("7", "file-1", outputs)).await
    }

    async fn run_request(&self, request: JobRequest) -> Job {
        let mut handle = self.scheduler.submit(request).unwrap();
        let status = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .expect("job did not finish in time");
        assert!(status.is_terminal());
        self.scheduler.job(handle.job_id()).unwrap()
    }

    fn assert_scratch_empty(&self) {
        assert_eq!(entries(self.scratch.path()), 0, "scratch root not empty");
    }

    fn final_texts(&self) -> Vec<String> {
        self.transport
            .status_updates()
            .into_iter()
            .map(|(_, text)| text)
            .collect()
    }
}

fn entries(path: &Path) -> usize {
    std::fs::read_dir(path).unwrap().count()
}

fn mp4() -> OutputSpec {
    OutputSpec::new(ContainerFormat::Mp4)
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_single_output_delivered() {
    let harness = TestHarness::new().await;

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Done);
    assert!(job.error.is_none());
    assert_eq!(job.delivered(), 1);
    assert_eq!(job.results[0].plan, Some(PlanKind::Remux));
    assert!(job.results[0].remote.is_some());

    let uploads = harness.transport.uploads();
    assert_eq!(uploads.len(), 1);
    let metadata = &uploads[0].metadata;
    assert!(metadata.file_name.ends_with(".mp4"));
    assert!(metadata.file_name.contains("S01E02"));
    assert_eq!(metadata.reply_to, Some(999));
    assert_eq!(metadata.duration_secs, Some(60));
    assert_eq!((metadata.width, metadata.height), (Some(1280), Some(720)));

    assert_eq!(harness.final_texts(), vec!["Done.".to_string()]);
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_input_downloaded_and_probed_once_for_many_outputs() {
    let harness = TestHarness::build(
        PipelineConfig::default().with_video_thumbnails(false),
        |runner| runner,
    )
    .await;

    let job = harness
        .run(vec![
            mp4(),
            OutputSpec::new(ContainerFormat::Mp3),
            OutputSpec::thumbnail(),
        ])
        .await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.delivered(), 3);
    assert_eq!(harness.transport.download_attempts(), 1);
    assert_eq!(harness.probe.probe_count(), 1);

    let plans: Vec<_> = harness.transcoder.recorded().iter().map(|r| r.plan).collect();
    assert_eq!(plans, vec![PlanKind::Remux, PlanKind::Encode, PlanKind::Thumbnail]);
    assert_eq!(
        harness.final_texts().last().unwrap(),
        "Done. Delivered 3 of 3 outputs."
    );
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_long_names_stay_out_of_scratch_paths() {
    let harness = TestHarness::new().await;
    let long_input = format!("{}.S02E03.1080p.mkv", "Very.Long.Release.Name.".repeat(10));
    let template = format!("{} {{season}}x{{episode}}", "t".repeat(230));

    let mut request = fixtures::request(
        "7",
        "file-1",
        vec![mp4().with_file_name(template), OutputSpec::new(ContainerFormat::Mkv)],
    );
    request.input = MediaRef::new("file-1")
        .with_file_name(long_input)
        .with_kind(MediaKind::Video);
    let job = harness.run_request(request).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.delivered(), 2);
    let uploads = harness.transport.uploads();
    assert!(uploads[0].metadata.file_name.ends_with("02x03.mp4"));
    assert!(uploads[0].metadata.file_name.len() <= 255);
    for upload in &uploads {
        let scratch_name = upload.path.file_name().unwrap().to_str().unwrap();
        assert!(scratch_name.len() < 32, "scratch name too long: {scratch_name}");
    }
    harness.assert_scratch_empty();
}

// =============================================================================
// Thumbnails
// =============================================================================

#[tokio::test]
async fn test_video_upload_carries_thumbnail() {
    let harness = TestHarness::new().await;

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Done);
    let uploads = harness.transport.uploads();
    let thumbnail = uploads[0].metadata.thumbnail.as_ref().expect("no thumbnail attached");
    assert_eq!(thumbnail.extension().unwrap(), "jpg");
    assert!(uploads[0].thumbnail_bytes.unwrap() > 0);

    let plans: Vec<_> = harness.transcoder.recorded().iter().map(|r| r.plan).collect();
    assert_eq!(plans, vec![PlanKind::Remux, PlanKind::Thumbnail]);
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_thumbnail_only_for_video_uploads() {
    let harness = TestHarness::new().await;

    let job = harness
        .run(vec![OutputSpec::new(ContainerFormat::Mp3), OutputSpec::thumbnail()])
        .await;

    assert_eq!(job.status, JobStatus::Done);
    let uploads = harness.transport.uploads();
    assert_eq!(uploads.len(), 2);
    assert!(uploads.iter().all(|u| u.metadata.thumbnail.is_none()));
    assert_eq!(harness.transcoder.run_count(), 2);
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_thumbnails_can_be_disabled() {
    let harness = TestHarness::build(
        PipelineConfig::default().with_video_thumbnails(false),
        |runner| runner,
    )
    .await;

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Done);
    assert!(harness.transport.uploads()[0].metadata.thumbnail.is_none());
    assert_eq!(harness.transcoder.run_count(), 1);
}

#[tokio::test]
async fn test_failed_thumbnail_does_not_fail_output() {
    let harness = TestHarness::new().await;
    harness.transcoder.fail_container(ContainerFormat::Jpeg);

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Done);
    assert!(harness.transport.uploads()[0].metadata.thumbnail.is_none());
    harness.assert_scratch_empty();
}

// =============================================================================
// Retries
// =============================================================================

#[tokio::test]
async fn test_transient_download_failures_retried() {
    let harness = TestHarness::new().await;
    harness
        .transport
        .push_download_error(TransportError::timeout("read timed out"));
    harness
        .transport
        .push_download_error(TransportError::connection("connection reset"));

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(harness.transport.download_attempts(), 3);
}

#[tokio::test]
async fn test_download_retries_exhausted() {
    let harness = TestHarness::new().await;
    for _ in 0..3 {
        harness
            .transport
            .push_download_error(TransportError::connection("connection reset"));
    }

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert_eq!(error.stage, Stage::Downloading);
    assert_eq!(error.kind, FailureKind::Transport);
    assert_eq!(harness.transport.download_attempts(), 3);
    assert_eq!(harness.probe.probe_count(), 0);
    assert!(harness.final_texts()[0].starts_with("Failed while downloading"));
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_permanent_download_failure_not_retried() {
    let harness = TestHarness::new().await;
    harness
        .transport
        .push_download_error(TransportError::from_status(404, "file not found"));

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(harness.transport.download_attempts(), 1);
    assert_eq!(
        harness.final_texts(),
        vec!["Failed while downloading: the file is no longer available".to_string()]
    );
}

#[tokio::test]
async fn test_transient_upload_failure_retried() {
    let harness = TestHarness::new().await;
    harness
        .transport
        .push_upload_error(TransportError::rate_limited(Some(Duration::from_millis(1))));

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(harness.transport.upload_attempts(), 2);
    assert_eq!(harness.transport.uploads().len(), 1);
}

#[tokio::test]
async fn test_upload_retries_exhausted() {
    let harness = TestHarness::new().await;
    for _ in 0..3 {
        harness
            .transport
            .push_upload_error(TransportError::connection("connection reset"));
    }

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert_eq!(error.stage, Stage::Uploading);
    assert_eq!(error.kind, FailureKind::Transport);
    assert_eq!(job.results[0].status, OutputStatus::Failed);
    assert_eq!(harness.transport.upload_attempts(), 3);
    assert!(harness.transport.uploads().is_empty());
    assert!(harness.final_texts()[0].starts_with("Failed while uploading"));
    harness.assert_scratch_empty();
}

// =============================================================================
// Stage deadlines
// =============================================================================

#[tokio::test]
async fn test_download_deadline_retried_then_fails() {
    let harness =
        TestHarness::build(PipelineConfig::default().with_timeouts(1, 900), |runner| runner).await;
    harness.transport.set_download_delay(Duration::from_secs(5));

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert_eq!(error.stage, Stage::Downloading);
    assert_eq!(error.kind, FailureKind::Timeout);
    assert_eq!(harness.transport.download_attempts(), 3);
    assert_eq!(harness.probe.probe_count(), 0);
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_upload_deadline_retried_then_fails() {
    let harness =
        TestHarness::build(PipelineConfig::default().with_timeouts(600, 1), |runner| runner).await;
    harness.transport.set_upload_delay(Duration::from_secs(5));

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert_eq!(error.stage, Stage::Uploading);
    assert_eq!(error.kind, FailureKind::Timeout);
    assert_eq!(harness.transport.upload_attempts(), 3);
    assert!(harness.transport.uploads().is_empty());
    harness.assert_scratch_empty();
}

// =============================================================================
// Failures at each stage
// =============================================================================

#[tokio::test]
async fn test_unreadable_input_fails_at_probing() {
    let harness = TestHarness::new().await;
    harness
        .probe
        .push_error(ProbeError::unreadable("Invalid data found when processing input"));

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert_eq!(error.stage, Stage::Probing);
    assert_eq!(error.kind, FailureKind::UnreadableMedia);
    assert_eq!(harness.transcoder.run_count(), 0);
    assert_eq!(
        harness.final_texts(),
        vec!["Failed while analysing: the file is not a readable media file".to_string()]
    );
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_transcode_failure_of_only_output_fails_job() {
    let harness = TestHarness::new().await;
    harness
        .transcoder
        .push_error(TranscodeError::failed(Some(1), "Conversion failed!"));

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert_eq!(error.stage, Stage::Transcoding);
    assert_eq!(error.kind, FailureKind::Transcode);
    assert_eq!(job.results[0].status, OutputStatus::Failed);
    assert!(harness.transport.uploads().is_empty());
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_upload_failure_removes_output() {
    let harness = TestHarness::new().await;
    harness
        .transport
        .push_upload_error(TransportError::from_status(413, "Request Entity Too Large"));

    let job = harness.run(vec![mp4()]).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert_eq!(error.stage, Stage::Uploading);
    assert_eq!(error.message, "the file is too large for the platform");
    assert_eq!(harness.transport.upload_attempts(), 1);
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_unsupported_output_fails_without_transcoding() {
    let harness = TestHarness::new().await;
    harness.probe.set_info(fixtures::audio_info());

    let job = harness.run(vec![OutputSpec::thumbnail()]).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.unwrap().kind, FailureKind::Unsupported);
    assert!(harness.transcoder.recorded().is_empty());
    harness.assert_scratch_empty();
}

// =============================================================================
// Multiple outputs
// =============================================================================

#[tokio::test]
async fn test_partial_success_reports_failed_outputs() {
    let harness = TestHarness::new().await;
    harness.transcoder.fail_container(ContainerFormat::Webm);

    let job = harness
        .run(vec![mp4(), OutputSpec::new(ContainerFormat::Webm)])
        .await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.delivered(), 1);
    assert_eq!(job.results[0].status, OutputStatus::Delivered);
    assert_eq!(job.results[1].status, OutputStatus::Failed);

    let text = harness.final_texts().pop().unwrap();
    assert!(text.starts_with("Done. Delivered 1 of 2 outputs."));
    assert!(text.contains("Output 2 failed: webm encoder crashed"));
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_fail_fast_skips_remaining_outputs() {
    let harness = TestHarness::with_policy(OutputPolicy::sequential().with_fail_fast(true)).await;
    harness.transcoder.fail_container(ContainerFormat::Mkv);

    let job = harness
        .run(vec![
            OutputSpec::new(ContainerFormat::Mkv),
            mp4(),
            OutputSpec::new(ContainerFormat::Mp3),
        ])
        .await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(harness.transcoder.run_count(), 1);
    assert_eq!(job.results[0].status, OutputStatus::Failed);
    assert_eq!(job.results[1].status, OutputStatus::Skipped);
    assert_eq!(job.results[2].status, OutputStatus::Skipped);
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_parallel_outputs_bounded_and_delivered_in_order() {
    let harness = TestHarness::with_policy(OutputPolicy::parallel(2)).await;
    harness.transcoder.set_delay(Duration::from_millis(50));

    let job = harness
        .run(vec![
            mp4(),
            OutputSpec::new(ContainerFormat::Mkv),
            OutputSpec::new(ContainerFormat::Mp3),
        ])
        .await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.delivered(), 3);
    assert!(harness.transcoder.peak_concurrency() <= 2);

    let extensions: Vec<_> = harness
        .transport
        .uploads()
        .iter()
        .map(|u| u.metadata.file_name.rsplit('.').next().unwrap().to_string())
        .collect();
    assert_eq!(extensions, vec!["mp4", "mkv", "mp3"]);
    harness.assert_scratch_empty();
}

#[tokio::test]
async fn test_parallel_fail_fast_fails_job() {
    let harness =
        TestHarness::with_policy(OutputPolicy::parallel(2).with_fail_fast(true)).await;
    harness.transcoder.fail_container(ContainerFormat::Webm);
    harness.transcoder.set_delay(Duration::from_millis(200));

    let job = harness
        .run(vec![OutputSpec::new(ContainerFormat::Webm), mp4()])
        .await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(harness.transport.uploads().is_empty());
    assert_eq!(job.results[0].status, OutputStatus::Failed);
    harness.assert_scratch_empty();
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_during_transcode() {
    let harness = TestHarness::new().await;
    harness.transcoder.set_delay(Duration::from_secs(30));

    let mut handle = harness
        .scheduler
        .submit(fixtures::mp4_request("7", "file-1"))
        .unwrap();
    while handle.status() != JobStatus::Transcoding {
        handle.changed().await.expect("job ended before transcoding");
    }

    harness.scheduler.cancel(handle.job_id()).unwrap();
    let status = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap();

    assert_eq!(status, JobStatus::Cancelled);
    assert!(harness.transport.uploads().is_empty());
    assert_eq!(harness.final_texts(), vec!["Cancelled.".to_string()]);
    harness.assert_scratch_empty();

    let err = harness.scheduler.cancel(handle.job_id()).unwrap_err();
    assert!(matches!(err, SchedulerError::AlreadyFinished { .. }));
}

// =============================================================================
// Status reporting
// =============================================================================

#[tokio::test]
async fn test_final_status_sent_once_after_progress() {
    let harness = TestHarness::new().await;

    // A second runner sharing the harness mocks, with a live reporter.
    let progress = ProgressReporter::spawn(
        ProgressConfig::default().with_interval_ms(0).with_min_delta(0.0),
        Arc::clone(&harness.transport),
    );
    let storage = StorageArena::new(StorageConfig::with_root(harness.scratch.path()));
    let runner = PipelineRunner::new(
        PipelineConfig::default(),
        Arc::clone(&harness.probe),
        Arc::clone(&harness.transcoder),
        Arc::clone(&harness.transport),
        storage,
    )
    .with_progress(progress.clone());
    let scheduler = Scheduler::new(SchedulerConfig::default(), Arc::new(runner));
    scheduler.start();

    let mut handle = scheduler.submit(fixtures::mp4_request("7", "file-1")).unwrap();
    let status = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Done);

    let texts = harness.final_texts();
    assert!(texts.len() > 1, "expected progress edits before the final one");
    assert_eq!(texts.last().unwrap(), "Done.");
    assert_eq!(texts.iter().filter(|t| t.as_str() == "Done.").count(), 1);

    progress.shutdown();
    scheduler.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_final_status_sent_as_reply_without_status_target() {
    let harness = TestHarness::new().await;
    let mut request = fixtures::mp4_request("7", "file-1");
    request.status_target = None;

    let job = harness.run_request(request).await;

    assert_eq!(job.status, JobStatus::Done);
    assert!(harness.transport.status_updates().is_empty());
    let messages = harness.transport.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].chat_id, "42");
    assert_eq!(messages[0].reply_to, Some(999));
    assert_eq!(messages[0].text, "Done.");
}

#[tokio::test]
async fn test_failure_sent_as_reply_without_status_target() {
    let harness = TestHarness::new().await;
    harness
        .transport
        .push_download_error(TransportError::from_status(404, "file not found"));
    let mut request = fixtures::mp4_request("7", "file-1");
    request.status_target = None;

    let job = harness.run_request(request).await;

    assert_eq!(job.status, JobStatus::Failed);
    let messages = harness.transport.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].text,
        "Failed while downloading: the file is no longer available"
    );
}

#[tokio::test]
async fn test_status_target_edited_not_replied() {
    let harness = TestHarness::new().await;

    harness.run(vec![mp4()]).await;

    assert_eq!(harness.final_texts(), vec!["Done.".to_string()]);
    assert!(harness.transport.messages().is_empty());
}

#[tokio::test]
async fn test_missing_encoder_rejected_at_submission() {
    let harness = TestHarness::build(PipelineConfig::default(), |runner| {
        runner.with_capabilities(EncoderCapabilities::from_encoders(["libx264", "aac"]))
    })
    .await;

    let request = fixtures::request(
        "7",
        "file-1",
        vec![OutputSpec::new(ContainerFormat::Webm)
            .with_video(VideoCodec::Vp9)
            .with_audio(AudioCodec::Opus)],
    );
    let err = harness.scheduler.submit(request).unwrap_err();

    match err {
        SchedulerError::InvalidRequest(reason) => assert!(reason.contains("libvpx-vp9")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(harness.transport.download_attempts(), 0);
}
