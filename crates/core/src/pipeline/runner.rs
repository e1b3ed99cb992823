//! Drives one job from download to delivery.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::job::{
    FailureKind, Job, JobFailure, JobRequest, JobStatus, OutputResult, OutputSpec, OutputStatus,
};
use crate::metrics;
use crate::naming;
use crate::probe::{MediaInfo, MediaProbe};
use crate::progress::{ProgressHandle, ProgressSink, Stage};
use crate::scheduler::{JobContext, JobExecutor, RetryPolicy};
use crate::storage::{JobScratch, ScratchFile, ScratchRole, StorageArena};
use crate::transcoder::{effective_duration, EncoderCapabilities, TranscodeOutput, Transcoder};
use crate::transport::{MediaKind, RemoteRef, TransportAdapter, TransportError, UploadMetadata};

use super::config::{OutputMode, PipelineConfig};
use super::error::PipelineError;

/// A stage error together with the stage it stopped.
#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    error: PipelineError,
}

impl StageFailure {
    fn new(stage: Stage, error: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    fn cancelled(stage: Stage) -> Self {
        Self::new(stage, PipelineError::Cancelled)
    }
}

/// A transcoded output waiting for upload.
struct Produced {
    index: usize,
    file_name: String,
    file: ScratchFile,
    output: TranscodeOutput,
}

/// Runs jobs through Downloading, Probing, and per output Transcoding then
/// Uploading, ending in exactly one final status message.
pub struct PipelineRunner<P: ?Sized, T: ?Sized, A: ?Sized> {
    config: PipelineConfig,
    probe: Arc<P>,
    transcoder: Arc<T>,
    transport: Arc<A>,
    storage: StorageArena,
    progress: Option<ProgressHandle>,
    capabilities: Option<EncoderCapabilities>,
}

impl<P, T, A> PipelineRunner<P, T, A>
where
    P: MediaProbe + ?Sized,
    T: Transcoder + ?Sized,
    A: TransportAdapter + ?Sized,
{
    pub fn new(
        config: PipelineConfig,
        probe: Arc<P>,
        transcoder: Arc<T>,
        transport: Arc<A>,
        storage: StorageArena,
    ) -> Self {
        Self {
            config,
            probe,
            transcoder,
            transport,
            storage,
            progress: None,
            capabilities: None,
        }
    }

    /// Reports stage progress to a running reporter.
    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Rejects outputs needing encoders the local ffmpeg lacks at submission.
    pub fn with_capabilities(mut self, capabilities: EncoderCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn sink(&self, job_id: &str, stage: Stage) -> ProgressSink {
        match &self.progress {
            Some(handle) => handle.sink(job_id, stage),
            None => ProgressSink::disabled(),
        }
    }

    async fn drive(&self, ctx: &mut JobContext, scratch: &JobScratch) -> Result<(), StageFailure> {
        checkpoint(ctx, Stage::Downloading)?;
        enter(ctx, JobStatus::Downloading, Stage::Downloading)?;
        let input = scratch.file(
            ScratchRole::Input,
            &scratch_name("source", ctx.job.input.display_name()),
        );

        let started = Instant::now();
        let result = self.download(ctx, &input.path).await;
        observe(Stage::Downloading, started, &result);
        let bytes = result.map_err(|e| StageFailure::new(Stage::Downloading, e))?;
        ctx.touch_progress();
        info!(bytes, "Input downloaded");

        checkpoint(ctx, Stage::Probing)?;
        enter(ctx, JobStatus::Probing, Stage::Probing)?;
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(PipelineError::Cancelled),
            r = self.probe.probe(&input.path) => r.map_err(PipelineError::from),
        };
        observe(Stage::Probing, started, &result);
        let info = result.map_err(|e| StageFailure::new(Stage::Probing, e))?;
        debug!(
            format = %info.format,
            duration_secs = info.duration_secs,
            tracks = info.tracks.len(),
            "Input probed"
        );

        let outcome = match self.config.output.mode {
            OutputMode::Sequential => self.run_sequential(ctx, scratch, &input.path, &info).await,
            OutputMode::Parallel => self.run_parallel(ctx, scratch, &input.path, &info).await,
        };
        scratch.remove(&input).await;
        outcome
    }

    async fn download(&self, ctx: &JobContext, dest: &Path) -> Result<u64, PipelineError> {
        let transport: &A = &self.transport;
        let media = &ctx.job.input;
        let cancel = &ctx.cancel;
        let sink = self.sink(&ctx.job.id, Stage::Downloading);
        let sink = &sink;
        let timeout = Duration::from_secs(self.config.download_timeout_secs);

        let bytes = ctx
            .retry
            .run("download", cancel, move |_| async move {
                match tokio::time::timeout(timeout, transport.download(media, dest, sink, cancel)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::timeout(format!(
                        "download exceeded {}s",
                        timeout.as_secs()
                    ))),
                }
            })
            .await?;
        sink.complete();
        Ok(bytes)
    }

    async fn run_sequential(
        &self,
        ctx: &mut JobContext,
        scratch: &JobScratch,
        input: &Path,
        info: &MediaInfo,
    ) -> Result<(), StageFailure> {
        for index in 0..ctx.job.outputs.len() {
            checkpoint(ctx, Stage::Transcoding)?;
            enter(ctx, JobStatus::Transcoding, Stage::Transcoding)?;

            let produced = self
                .transcode_output(ctx, scratch, input, info, index, &ctx.cancel)
                .await;
            let produced = match produced {
                Ok(produced) => produced,
                Err(failure) => {
                    self.record_failure(ctx, index, failure)?;
                    continue;
                }
            };

            checkpoint(ctx, Stage::Uploading)?;
            enter(ctx, JobStatus::Uploading, Stage::Uploading)?;
            if let Err(failure) = self.deliver(ctx, scratch, input, info, produced).await {
                self.record_failure(ctx, index, failure)?;
            }
        }
        Ok(())
    }

    async fn run_parallel(
        &self,
        ctx: &mut JobContext,
        scratch: &JobScratch,
        input: &Path,
        info: &MediaInfo,
    ) -> Result<(), StageFailure> {
        checkpoint(ctx, Stage::Transcoding)?;
        enter(ctx, JobStatus::Transcoding, Stage::Transcoding)?;

        let fail_fast = self.config.output.fail_fast;
        let limit = self.config.output.max_parallel.max(1);
        let batch = ctx.cancel.child_token();

        let mut produced: Vec<(usize, Result<Produced, StageFailure>)> = {
            let shared: &JobContext = ctx;
            let batch = &batch;
            stream::iter(0..shared.job.outputs.len())
                .map(move |index| async move {
                    if batch.is_cancelled() {
                        return (index, Err(StageFailure::cancelled(Stage::Transcoding)));
                    }
                    let result = self
                        .transcode_output(shared, scratch, input, info, index, batch)
                        .await;
                    if result.is_err() && fail_fast {
                        batch.cancel();
                    }
                    (index, result)
                })
                .buffer_unordered(limit)
                .collect()
                .await
        };
        produced.sort_by_key(|(index, _)| *index);

        let mut stop: Option<StageFailure> = None;
        for (index, result) in produced {
            checkpoint(ctx, Stage::Uploading)?;
            match result {
                // Stopped by a failing sibling; reported as skipped.
                Err(failure) if failure.error.is_cancelled() => {}
                Err(failure) => {
                    if let Err(failure) = self.record_failure(ctx, index, failure) {
                        stop.get_or_insert(failure);
                    }
                }
                Ok(_) if stop.is_some() => {}
                Ok(produced) => {
                    enter(ctx, JobStatus::Uploading, Stage::Uploading)?;
                    if let Err(failure) = self.deliver(ctx, scratch, input, info, produced).await {
                        self.record_failure(ctx, index, failure)?;
                    }
                }
            }
        }

        stop.map_or(Ok(()), Err)
    }

    async fn transcode_output(
        &self,
        ctx: &JobContext,
        scratch: &JobScratch,
        input: &Path,
        info: &MediaInfo,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<Produced, StageFailure> {
        let job = &ctx.job;
        let spec = &job.outputs[index];
        let file_name = output_file_name(job, spec);
        let file = scratch.file(
            ScratchRole::Output,
            &scratch_name(&(index + 1).to_string(), &file_name),
        );
        let sink = self
            .sink(&job.id, Stage::Transcoding)
            .for_output(index, job.outputs.len());

        let transcoder: &T = &self.transcoder;
        let path = file.path.as_path();
        let sink_ref = &sink;
        let started = Instant::now();
        let result = ctx
            .retry
            .run("transcode", cancel, move |_| {
                transcoder.run(input, path, spec, info, sink_ref, cancel)
            })
            .await
            .map_err(PipelineError::from);
        observe(Stage::Transcoding, started, &result);

        let output = result.map_err(|e| StageFailure::new(Stage::Transcoding, e))?;
        metrics::TRANSCODE_PLANS
            .with_label_values(&[output.plan.as_str()])
            .inc();
        info!(
            output = index + 1,
            plan = output.plan.as_str(),
            size_bytes = output.size_bytes,
            elapsed_ms = output.elapsed_ms,
            "Output transcoded"
        );

        Ok(Produced {
            index,
            file_name,
            file,
            output,
        })
    }

    async fn deliver(
        &self,
        ctx: &mut JobContext,
        scratch: &JobScratch,
        input: &Path,
        info: &MediaInfo,
        produced: Produced,
    ) -> Result<(), StageFailure> {
        let thumbnail = self.preview_frame(ctx, scratch, input, info, &produced).await;
        let started = Instant::now();
        let result = self
            .upload(ctx, info, &produced, thumbnail.as_ref().map(|f| f.path.as_path()))
            .await;
        observe(Stage::Uploading, started, &result);
        scratch.remove(&produced.file).await;
        if let Some(thumbnail) = &thumbnail {
            scratch.remove(thumbnail).await;
        }

        let remote = result.map_err(|e| StageFailure::new(Stage::Uploading, e))?;
        info!(output = produced.index + 1, locator = %remote.locator, "Output delivered");

        ctx.touch_progress();
        ctx.job.results.push(OutputResult {
            index: produced.index,
            status: OutputStatus::Delivered,
            file_name: Some(produced.file_name),
            plan: Some(produced.output.plan),
            size_bytes: Some(produced.output.size_bytes),
            remote: Some(remote),
            error: None,
        });
        ctx.publish();
        Ok(())
    }

    /// Grabs a still frame for outputs sent as video. Failures only cost the
    /// thumbnail.
    async fn preview_frame(
        &self,
        ctx: &JobContext,
        scratch: &JobScratch,
        input: &Path,
        info: &MediaInfo,
        produced: &Produced,
    ) -> Option<ScratchFile> {
        let spec = &ctx.job.outputs[produced.index];
        if !self.config.video_thumbnails
            || spec.effective_send_as() != MediaKind::Video
            || !info.has_video()
        {
            return None;
        }

        let mut frame = OutputSpec::thumbnail();
        frame.range = spec.range;
        let file = scratch.file(
            ScratchRole::Intermediate,
            &format!("preview-{}.jpg", produced.index + 1),
        );
        let result = self
            .transcoder
            .run(
                input,
                &file.path,
                &frame,
                info,
                &ProgressSink::disabled(),
                &ctx.cancel,
            )
            .await;
        match result {
            Ok(_) => Some(file),
            Err(e) => {
                debug!(output = produced.index + 1, error = %e, "No thumbnail for output");
                scratch.remove(&file).await;
                None
            }
        }
    }

    async fn upload(
        &self,
        ctx: &JobContext,
        info: &MediaInfo,
        produced: &Produced,
        thumbnail: Option<&Path>,
    ) -> Result<RemoteRef, PipelineError> {
        let job = &ctx.job;
        let spec = &job.outputs[produced.index];
        let mut metadata = self.upload_metadata(job, spec, info, &produced.file_name);
        metadata.thumbnail = thumbnail.map(Path::to_path_buf);
        let sink = self
            .sink(&job.id, Stage::Uploading)
            .for_output(produced.index, job.outputs.len());

        let transport: &A = &self.transport;
        let path = produced.output.path.as_path();
        let cancel = &ctx.cancel;
        let (metadata, sink) = (&metadata, &sink);
        let timeout = Duration::from_secs(self.config.upload_timeout_secs);

        let remote = ctx
            .retry
            .run("upload", cancel, move |_| async move {
                match tokio::time::timeout(timeout, transport.upload(path, metadata, sink, cancel)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::timeout(format!(
                        "upload exceeded {}s",
                        timeout.as_secs()
                    ))),
                }
            })
            .await?;
        sink.complete();
        Ok(remote)
    }

    fn upload_metadata(
        &self,
        job: &Job,
        spec: &OutputSpec,
        info: &MediaInfo,
        file_name: &str,
    ) -> UploadMetadata {
        let mut metadata = UploadMetadata::new(job.chat_id.clone(), file_name, spec.effective_send_as());
        metadata.caption = spec
            .caption
            .clone()
            .or_else(|| self.config.default_caption.clone());
        metadata.reply_to = job.reply_to;

        if spec.thumbnail_only {
            return metadata;
        }
        let duration = effective_duration(info.duration_secs, spec.range);
        if duration > 0.0 {
            metadata.duration_secs = Some(duration.round() as u64);
        }
        if spec.container.allows_video() {
            if let Some((width, height)) = info.video().and_then(|v| scaled_size(v.width?, v.height?, spec.max_height)) {
                metadata.width = Some(width);
                metadata.height = Some(height);
            }
        }
        metadata
    }

    /// Records a failed output. Returns the failure again when the job must stop.
    fn record_failure(
        &self,
        ctx: &mut JobContext,
        index: usize,
        failure: StageFailure,
    ) -> Result<(), StageFailure> {
        if failure.error.is_cancelled() || ctx.cancel.is_cancelled() {
            return Err(failure);
        }

        warn!(
            output = index + 1,
            stage = failure.stage.as_str(),
            error = %failure.error,
            "Output failed"
        );
        let mut result = OutputResult::failed(index, failure.error.to_failure(failure.stage));
        result.file_name = Some(output_file_name(&ctx.job, &ctx.job.outputs[index]));
        ctx.job.results.push(result);
        ctx.publish();

        if self.config.output.fail_fast {
            return Err(failure);
        }
        Ok(())
    }

    /// Moves the job to its terminal state.
    fn conclude(&self, ctx: &mut JobContext, outcome: Result<(), StageFailure>) {
        for index in 0..ctx.job.outputs.len() {
            if !ctx.job.results.iter().any(|r| r.index == index) {
                ctx.job.results.push(OutputResult::skipped(index));
            }
        }
        ctx.job.results.sort_by_key(|r| r.index);

        let delivered = ctx.job.delivered();
        let (status, failure) = match outcome {
            Err(f) if f.error.is_cancelled() || ctx.cancel.is_cancelled() => {
                (JobStatus::Cancelled, None)
            }
            Err(f) => {
                error!(
                    stage = f.stage.as_str(),
                    kind = f.error.kind().as_str(),
                    error = %f.error,
                    "Job failed"
                );
                (JobStatus::Failed, Some(f.error.to_failure(f.stage)))
            }
            Ok(()) if delivered > 0 => (JobStatus::Done, None),
            Ok(()) => {
                let failure = ctx
                    .job
                    .results
                    .iter()
                    .find_map(|r| r.error.clone())
                    .unwrap_or_else(|| {
                        JobFailure::new(Stage::Transcoding, FailureKind::Internal, "no output was produced")
                    });
                error!(stage = failure.stage.as_str(), kind = failure.kind.as_str(), "No output delivered");
                (JobStatus::Failed, Some(failure))
            }
        };

        ctx.job.error = failure;
        if let Err(e) = ctx.transition(status) {
            warn!(error = %e, "Forcing terminal state");
            ctx.job.status = status;
        }
        info!(
            status = %status,
            delivered,
            outputs = ctx.job.outputs.len(),
            "Job finished"
        );
    }

    /// Sends the one final status text, as an edit of the status message
    /// when there is one and as a reply in the chat otherwise.
    async fn notify(&self, job: &Job, retry: &RetryPolicy) {
        if let Some(progress) = &self.progress {
            progress.finish(&job.id).await;
        }

        let text = render_outcome(job);
        let transport: &A = &self.transport;
        let text = text.as_str();
        // The job's own token may have fired; the acknowledgement still goes out.
        let cancel = CancellationToken::new();
        let result = match &job.status_target {
            Some(target) => {
                retry
                    .run("notify", &cancel, move |_| transport.edit_status(target, text))
                    .await
            }
            None => {
                debug!("No status message, replying in chat");
                let chat_id = job.chat_id.as_str();
                let reply_to = job.reply_to;
                retry
                    .run("notify", &cancel, move |_| {
                        transport.send_message(chat_id, text, reply_to)
                    })
                    .await
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to send final status");
        }
    }
}

#[async_trait]
impl<P, T, A> JobExecutor for PipelineRunner<P, T, A>
where
    P: MediaProbe + ?Sized + 'static,
    T: Transcoder + ?Sized + 'static,
    A: TransportAdapter + ?Sized + 'static,
{
    fn check(&self, request: &JobRequest) -> Result<(), String> {
        let Some(capabilities) = &self.capabilities else {
            return Ok(());
        };
        for (index, spec) in request.outputs.iter().enumerate() {
            capabilities
                .check_spec(spec)
                .map_err(|e| format!("output {}: {}", index + 1, e))?;
        }
        Ok(())
    }

    async fn execute(&self, mut ctx: JobContext) -> Job {
        let span = info_span!("pipeline", job_id = %ctx.job.id);
        async move {
            info!(
                requester = %ctx.job.requester,
                outputs = ctx.job.outputs.len(),
                "Job started"
            );
            if let (Some(progress), Some(target)) = (&self.progress, &ctx.job.status_target) {
                progress.register(&ctx.job.id, target.clone()).await;
            }

            let outcome = match self.storage.acquire(&ctx.job.id).await {
                Ok(scratch) => {
                    let outcome = self.drive(&mut ctx, &scratch).await;
                    if let Err(e) = scratch.release().await {
                        warn!(error = %e, "Failed to release scratch");
                    }
                    outcome
                }
                Err(e) => Err(StageFailure::new(Stage::Downloading, e)),
            };

            self.conclude(&mut ctx, outcome);
            self.notify(&ctx.job, &ctx.retry).await;
            ctx.job
        }
        .instrument(span)
        .await
    }
}

/// Returns a cancellation failure if the job's token fired.
fn checkpoint(ctx: &JobContext, stage: Stage) -> Result<(), StageFailure> {
    if ctx.cancel.is_cancelled() {
        debug!(stage = stage.as_str(), "Cancellation observed");
        return Err(StageFailure::cancelled(stage));
    }
    Ok(())
}

/// Transitions unless the job is already in `status`.
fn enter(ctx: &mut JobContext, status: JobStatus, stage: Stage) -> Result<(), StageFailure> {
    if ctx.job.status == status {
        return Ok(());
    }
    ctx.transition(status)
        .map_err(|e| StageFailure::new(stage, e))?;
    debug!(status = %status, "Stage entered");
    Ok(())
}

fn observe<R>(stage: Stage, started: Instant, result: &Result<R, PipelineError>) {
    let label = match result {
        Ok(_) => "success",
        Err(e) if e.is_cancelled() => "cancelled",
        Err(_) => "failed",
    };
    metrics::STAGE_DURATION
        .with_label_values(&[stage.as_str(), label])
        .observe(started.elapsed().as_secs_f64());
}

fn output_file_name(job: &Job, spec: &OutputSpec) -> String {
    let source = job.input.display_name();
    let ext = spec.container.extension();
    match &spec.file_name {
        Some(template) => naming::render_file_name(template, source, ext),
        None => naming::default_file_name(source, ext),
    }
}

/// Scratch name for a stage file: a short stem plus the extension of the
/// user-facing name, which travels separately in the upload metadata.
fn scratch_name(stem: &str, display_name: &str) -> String {
    match Path::new(display_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 16)
    {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}

/// Frame size after an optional height cap, keeping the width even.
fn scaled_size(width: u32, height: u32, max_height: Option<u32>) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let target = max_height.map_or(height, |max| max.min(height));
    if target == height {
        return Some((width, height));
    }
    let scaled = (width as u64 * target as u64 / height as u64) as u32;
    Some((scaled.max(2) & !1, target))
}

/// Final status text for a terminal job.
pub fn render_outcome(job: &Job) -> String {
    match job.status {
        JobStatus::Done => {
            let total = job.outputs.len();
            let mut text = if total == 1 {
                "Done.".to_string()
            } else {
                format!("Done. Delivered {} of {} outputs.", job.delivered(), total)
            };
            for result in &job.results {
                if let (OutputStatus::Failed, Some(error)) = (result.status, &result.error) {
                    text.push_str(&format!("\nOutput {} failed: {}", result.index + 1, error.message));
                }
            }
            text
        }
        JobStatus::Failed => match &job.error {
            Some(failure) => format!(
                "Failed while {}: {}",
                failure.stage.label().to_lowercase(),
                failure.message
            ),
            None => "Failed.".to_string(),
        },
        JobStatus::Cancelled => "Cancelled.".to_string(),
        status => format!("Job is {}.", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobFailure, Priority};
    use crate::transcoder::ContainerFormat;
    use crate::transport::MediaRef;
    use chrono::Utc;

    fn job(status: JobStatus, outputs: usize) -> Job {
        Job {
            id: "job-1".to_string(),
            requester: "7".to_string(),
            chat_id: "7".to_string(),
            input: MediaRef::new("file-1"),
            outputs: vec![OutputSpec::new(ContainerFormat::Mp4); outputs],
            priority: Priority::Normal,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_progress_at: None,
            status_target: None,
            reply_to: None,
            error: None,
            results: Vec::new(),
        }
    }

    #[test]
    fn test_render_outcome() {
        assert_eq!(render_outcome(&job(JobStatus::Done, 1)), "Done.");
        assert_eq!(render_outcome(&job(JobStatus::Cancelled, 1)), "Cancelled.");

        let mut failed = job(JobStatus::Failed, 1);
        failed.error = Some(JobFailure::new(
            Stage::Probing,
            FailureKind::UnreadableMedia,
            "the file is not a readable media file",
        ));
        assert_eq!(
            render_outcome(&failed),
            "Failed while analysing: the file is not a readable media file"
        );

        let mut partial = job(JobStatus::Done, 2);
        partial.results = vec![
            OutputResult {
                status: OutputStatus::Delivered,
                ..OutputResult::skipped(0)
            },
            OutputResult::failed(
                1,
                JobFailure::new(Stage::Transcoding, FailureKind::Transcode, "bad codec"),
            ),
        ];
        assert_eq!(
            render_outcome(&partial),
            "Done. Delivered 1 of 2 outputs.\nOutput 2 failed: bad codec"
        );
    }

    #[test]
    fn test_scaled_size() {
        assert_eq!(scaled_size(1920, 1080, Some(720)), Some((1280, 720)));
        assert_eq!(scaled_size(1920, 1080, Some(2160)), Some((1920, 1080)));
        assert_eq!(scaled_size(1280, 720, None), Some((1280, 720)));
        assert_eq!(scaled_size(0, 720, None), None);
        assert_eq!(scaled_size(853, 480, Some(240)), Some((426, 240)));
    }

    #[test]
    fn test_output_file_name() {
        let mut j = job(JobStatus::Queued, 1);
        j.input = MediaRef::new("id").with_file_name("Show.S01E03.1080p.mkv");
        assert_eq!(output_file_name(&j, &j.outputs[0]), "Show S01E03 1080p.mp4");

        let spec = OutputSpec::new(ContainerFormat::Mp3).with_file_name("Ep{episode}");
        assert_eq!(output_file_name(&j, &spec), "Ep03.mp3");
    }

    #[test]
    fn test_scratch_name_drops_display_name() {
        let long = format!("{}.mkv", "a".repeat(300));
        assert_eq!(scratch_name("source", &long), "source.mkv");
        assert_eq!(scratch_name("2", "Show S01E03.mp4"), "2.mp4");
        assert_eq!(scratch_name("source", "AgADBAAD"), "source");
    }
}
