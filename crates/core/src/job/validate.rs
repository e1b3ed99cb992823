//! Admission-time validation of job requests.

use crate::transcoder::{ContainerFormat, Quality};
use crate::transport::MediaKind;

use super::error::JobError;
use super::types::{Job, JobRequest, OutputSpec};

const MAX_OUTPUTS: usize = 16;
const MAX_FILE_NAME_LEN: usize = 255;

/// Validates a request and turns it into a queued job.
pub fn admit(request: JobRequest) -> Result<Job, JobError> {
    validate_request(&request)?;
    Ok(Job::from_request(request))
}

/// Checks a request without consuming it.
pub fn validate_request(request: &JobRequest) -> Result<(), JobError> {
    if request.requester.trim().is_empty() {
        return Err(JobError::invalid("requester must not be empty"));
    }
    if request.chat_id.trim().is_empty() {
        return Err(JobError::invalid("chat_id must not be empty"));
    }
    if request.input.locator.trim().is_empty() {
        return Err(JobError::invalid("input locator must not be empty"));
    }
    if request.outputs.is_empty() {
        return Err(JobError::invalid("at least one output is required"));
    }
    if request.outputs.len() > MAX_OUTPUTS {
        return Err(JobError::invalid(format!(
            "at most {} outputs per job",
            MAX_OUTPUTS
        )));
    }

    for (index, spec) in request.outputs.iter().enumerate() {
        validate_output(spec).map_err(|reason| {
            JobError::invalid(format!("output {}: {}", index + 1, reason))
        })?;
    }
    Ok(())
}

/// Checks one output spec against the container/codec table and value ranges.
pub fn validate_output(spec: &OutputSpec) -> Result<(), String> {
    let container = spec.container;

    if spec.thumbnail_only != (container == ContainerFormat::Jpeg) {
        return Err("thumbnails use the jpeg container and nothing else does".to_string());
    }
    if spec.thumbnail_only && (spec.video_codec.is_some() || spec.audio_codec.is_some()) {
        return Err("thumbnails take no codecs".to_string());
    }

    if let Some(codec) = spec.video_codec {
        if !container.allowed_video_codecs().contains(&codec) {
            return Err(format!(
                "{:?} video cannot be stored in {}",
                codec,
                container.extension()
            ));
        }
    }
    if let Some(codec) = spec.audio_codec {
        if !container.allowed_audio_codecs().contains(&codec) {
            return Err(format!(
                "{:?} audio cannot be stored in {}",
                codec,
                container.extension()
            ));
        }
    }

    match spec.quality {
        Quality::Crf(crf) if crf > 63 => return Err("crf must be between 0 and 63".to_string()),
        Quality::BitrateKbps(0) => return Err("bitrate must be positive".to_string()),
        _ => {}
    }

    if let Some(height) = spec.max_height {
        if !(16..=8640).contains(&height) {
            return Err("max_height must be between 16 and 8640".to_string());
        }
        if !container.allows_video() && !spec.thumbnail_only {
            return Err("max_height needs a video container".to_string());
        }
    }

    if let Some(range) = spec.range {
        if !range.start_secs.is_finite() || range.start_secs < 0.0 {
            return Err("range start must be a non-negative number".to_string());
        }
        if let Some(duration) = range.duration_secs {
            if !duration.is_finite() || duration <= 0.0 {
                return Err("range duration must be positive".to_string());
            }
        }
    }

    if let Some(template) = &spec.file_name {
        if template.trim().is_empty() || template.len() > MAX_FILE_NAME_LEN {
            return Err(format!(
                "file name must be 1 to {} bytes",
                MAX_FILE_NAME_LEN
            ));
        }
    }

    match spec.send_as {
        Some(MediaKind::Photo) if !spec.thumbnail_only => {
            Err("only thumbnails can be sent as photo".to_string())
        }
        Some(MediaKind::Video) if !container.allows_video() && !spec.thumbnail_only => {
            Err(format!("{} cannot be sent as video", container.extension()))
        }
        _ => Ok(()),
    }
}
