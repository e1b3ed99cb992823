//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::job::OutputSpec;
use crate::probe::MediaInfo;
use crate::progress::ProgressSink;

use super::capabilities::EncoderCapabilities;
use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::plan::{ExecutionPlan, StreamPlan};
use super::progress::ProgressParser;
use super::traits::Transcoder;
use super::types::{ContainerFormat, PlanKind, Quality, TranscodeOutput, VideoCodec};

/// Transcoder that shells out to ffmpeg.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
    capabilities: Option<EncoderCapabilities>,
}

enum Interrupted {
    Cancelled,
    TimedOut,
}

impl FfmpegTranscoder {
    /// Creates a new transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self {
            config,
            capabilities: None,
        }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Rejects plans that need encoders missing from `capabilities`.
    pub fn with_capabilities(mut self, capabilities: EncoderCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    fn common_args(&self) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ]
    }

    /// Builds arguments for a single JPEG frame.
    fn build_thumbnail_args(
        &self,
        input: &Path,
        output: &Path,
        plan: &ExecutionPlan,
    ) -> Vec<String> {
        let size = plan
            .scale_height
            .unwrap_or(self.config.thumbnail_max_size)
            .min(self.config.thumbnail_max_size);

        let mut args = self.common_args();
        args.extend([
            "-ss".to_string(),
            format!("{:.3}", plan.seek_secs.unwrap_or(0.0)),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            "-vf".to_string(),
            format!(
                "scale='min({size},iw)':'min({size},ih)':force_original_aspect_ratio=decrease"
            ),
            "-f".to_string(),
            ContainerFormat::Jpeg.muxer().to_string(),
        ]);
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.push(output.to_string_lossy().to_string());
        args
    }

    /// Builds arguments for a remux or encode.
    fn build_args(
        &self,
        input: &Path,
        output: &Path,
        spec: &OutputSpec,
        plan: &ExecutionPlan,
    ) -> Vec<String> {
        if plan.kind == PlanKind::Thumbnail {
            return self.build_thumbnail_args(input, output, plan);
        }

        let mut args = self.common_args();

        if let Some(range) = plan.range {
            if range.start_secs > 0.0 {
                args.extend(["-ss".to_string(), format!("{:.3}", range.start_secs)]);
            }
        }
        args.extend(["-i".to_string(), input.to_string_lossy().to_string()]);
        if let Some(duration) = plan.range.and_then(|r| r.duration_secs) {
            args.extend(["-t".to_string(), format!("{:.3}", duration)]);
        }

        if plan.video.is_included() {
            args.extend(["-map".to_string(), "0:v:0".to_string()]);
        }
        if plan.audio.is_included() {
            args.extend(["-map".to_string(), "0:a:0".to_string()]);
        }
        if plan.copy_subtitles {
            args.extend(["-map".to_string(), "0:s?".to_string()]);
        }

        // Video
        match plan.video {
            StreamPlan::Drop => {}
            StreamPlan::Copy => args.extend(["-c:v".to_string(), "copy".to_string()]),
            StreamPlan::Encode(codec) => {
                args.extend(["-c:v".to_string(), codec.ffmpeg_encoder().to_string()]);
                match spec.quality {
                    Quality::Crf(crf) if codec.supports_crf() => {
                        args.extend(["-crf".to_string(), crf.to_string()]);
                        // libvpx-vp9 and libaom-av1 need a zero bitrate for pure CRF.
                        if !matches!(codec, VideoCodec::H264 | VideoCodec::H265) {
                            args.extend(["-b:v".to_string(), "0".to_string()]);
                        }
                    }
                    Quality::BitrateKbps(kbps) => {
                        args.extend(["-b:v".to_string(), format!("{}k", kbps)]);
                    }
                    _ => {}
                }
                if let Some(height) = plan.scale_height {
                    args.extend(["-vf".to_string(), format!("scale=-2:'min({},ih)'", height)]);
                }
                args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
            }
        }

        // Audio
        match plan.audio {
            StreamPlan::Drop => {}
            StreamPlan::Copy => args.extend(["-c:a".to_string(), "copy".to_string()]),
            StreamPlan::Encode(codec) => {
                args.extend(["-c:a".to_string(), codec.ffmpeg_encoder().to_string()]);
                if let Quality::BitrateKbps(kbps) = spec.quality {
                    if !plan.video.is_included() && !codec.is_lossless() {
                        args.extend(["-b:a".to_string(), format!("{}k", kbps)]);
                    }
                }
            }
        }

        if plan.copy_subtitles {
            args.extend(["-c:s".to_string(), "copy".to_string()]);
        }

        if let Some(metadata) = &spec.metadata {
            args.extend(metadata.to_ffmpeg_args());
        }

        if matches!(spec.container, ContainerFormat::Mp4 | ContainerFormat::M4a) {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.extend([
            "-f".to_string(),
            spec.container.muxer().to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
        ]);
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.push(output.to_string_lossy().to_string());
        args
    }

    /// Turns the stderr tail into a short message free of scratch paths.
    fn error_message(&self, tail: &VecDeque<String>, input: &Path, output: &Path) -> String {
        let mut message = tail
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("; ");

        for path in [input, output] {
            let full = path.to_string_lossy();
            let short = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if !full.is_empty() {
                message = message.replace(full.as_ref(), &short);
            }
            if let Some(parent) = path.parent().map(|p| p.to_string_lossy().to_string()) {
                if !parent.is_empty() && parent != "/" {
                    message = message.replace(&parent, "");
                }
            }
        }

        if message.is_empty() {
            return "ffmpeg exited without an error message".to_string();
        }

        if message.chars().count() > self.config.max_error_len {
            let truncated: String = message.chars().take(self.config.max_error_len).collect();
            format!("{}...", truncated.trim_end())
        } else {
            message
        }
    }
}

/// Keeps the last `limit` lines of a child's stderr.
fn collect_tail<R>(stream: R, limit: usize) -> JoinHandle<VecDeque<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        let mut tail = VecDeque::with_capacity(limit);
        while let Ok(Some(line)) = lines.next_line().await {
            if tail.len() == limit {
                tail.pop_front();
            }
            if limit > 0 {
                tail.push_back(line);
            }
        }
        tail
    })
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial output");
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn run(
        &self,
        input: &Path,
        output: &Path,
        spec: &OutputSpec,
        info: &MediaInfo,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let start = Instant::now();

        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(TranscodeError::InputNotFound {
                path: input.to_path_buf(),
            });
        }

        let plan = ExecutionPlan::select(spec, info, self.config.thumbnail_offset_secs)?;
        if let Some(capabilities) = &self.capabilities {
            capabilities.check_plan(&plan)?;
        }

        if cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = self.build_args(input, output, spec, &plan);
        debug!(
            job_id = %progress.job_id(),
            plan = plan.kind.as_str(),
            container = spec.container.extension(),
            "Running ffmpeg"
        );

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::ToolNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        let stderr_tail = child
            .stderr
            .take()
            .map(|stderr| collect_tail(stderr, self.config.stderr_tail_lines));
        let mut stdout = child.stdout.take().map(|s| BufReader::new(s).lines());

        let deadline = sleep(Duration::from_secs(self.config.timeout_secs));
        tokio::pin!(deadline);

        let mut parser = ProgressParser::new(plan.effective_duration);
        let interval = Duration::from_millis(self.config.progress_interval_ms);
        let mut last_emit: Option<Instant> = None;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(Interrupted::Cancelled),
                _ = &mut deadline => break Err(Interrupted::TimedOut),
                line = async {
                    match stdout.as_mut() {
                        Some(lines) => lines.next_line().await,
                        None => Ok(None),
                    }
                }, if stdout.is_some() => match line {
                    Ok(Some(line)) => {
                        if let Some(update) = parser.feed(&line) {
                            let due = last_emit.is_none_or(|at| at.elapsed() >= interval);
                            if update.finished || due {
                                progress.emit(update.fraction, update.eta_secs);
                                last_emit = Some(Instant::now());
                            }
                        }
                    }
                    _ => stdout = None,
                },
                status = child.wait(), if stdout.is_none() => break Ok(status),
            }
        };

        let status = match outcome {
            Ok(status) => status?,
            Err(interrupted) => {
                let _ = child.kill().await;
                remove_partial(output).await;
                return Err(match interrupted {
                    Interrupted::Cancelled => {
                        debug!(job_id = %progress.job_id(), "ffmpeg cancelled");
                        TranscodeError::Cancelled
                    }
                    Interrupted::TimedOut => TranscodeError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    },
                });
            }
        };

        let tail = match stderr_tail {
            Some(handle) => handle.await.unwrap_or_default(),
            None => VecDeque::new(),
        };

        if !status.success() {
            remove_partial(output).await;
            let message = self.error_message(&tail, input, output);
            warn!(
                job_id = %progress.job_id(),
                exit_code = ?status.code(),
                error = %message,
                "ffmpeg failed"
            );
            return Err(TranscodeError::failed(status.code(), message));
        }

        let size_bytes = match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => meta.len(),
            _ => {
                remove_partial(output).await;
                return Err(TranscodeError::failed(
                    status.code(),
                    "ffmpeg produced no output",
                ));
            }
        };

        progress.complete();

        Ok(TranscodeOutput {
            path: output.to_path_buf(),
            size_bytes,
            plan: plan.kind,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        let result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        match result {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(TranscodeError::failed(
                status.code(),
                "ffmpeg -version failed",
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TranscodeError::ToolNotFound {
                    path: self.config.ffmpeg_path.clone(),
                })
            }
            Err(e) => Err(TranscodeError::Io(e)),
        }
    }
}
