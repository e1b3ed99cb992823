//! Per-job scratch directories.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

use super::config::StorageConfig;
use super::error::StorageError;

/// Longest single path component most filesystems accept.
const MAX_COMPONENT_BYTES: usize = 255;

/// Longest extension kept when a name has to be shortened.
const MAX_EXTENSION_BYTES: usize = 16;

/// What a scratch file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScratchRole {
    /// The downloaded input.
    Input,
    /// Work files between stages.
    Intermediate,
    /// A finished output awaiting upload.
    Output,
}

impl ScratchRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Intermediate => "tmp",
            Self::Output => "output",
        }
    }
}

/// A file inside a job's scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchFile {
    pub path: PathBuf,
    pub job_id: String,
    pub role: ScratchRole,
}

/// Outcome of an orphan sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub removed: usize,
    pub kept: usize,
    pub errors: Vec<String>,
}

type ActiveSet = Arc<Mutex<HashSet<String>>>;

fn lock(active: &ActiveSet) -> MutexGuard<'_, HashSet<String>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Hands out scratch directories namespaced by job id.
#[derive(Debug, Clone)]
pub struct StorageArena {
    config: StorageConfig,
    active: ActiveSet,
}

impl StorageArena {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.config.scratch_root
    }

    /// Number of jobs currently holding scratch.
    pub fn active_jobs(&self) -> usize {
        lock(&self.active).len()
    }

    /// Creates the root and removes orphans left by a previous run.
    pub async fn init(&self) -> Result<SweepReport, StorageError> {
        fs::create_dir_all(self.root())
            .await
            .map_err(|source| StorageError::CreateFailed {
                path: self.root().to_path_buf(),
                source,
            })?;
        self.sweep_orphans(Duration::from_secs(self.config.orphan_max_age_secs))
            .await
    }

    /// Creates `<root>/<job_id>/` and returns a guard that deletes it.
    pub async fn acquire(&self, job_id: &str) -> Result<JobScratch, StorageError> {
        if job_id.is_empty()
            || job_id.starts_with('.')
            || job_id.contains(['/', '\\'])
            || job_id.contains('\0')
        {
            return Err(StorageError::InvalidJobId {
                job_id: job_id.to_string(),
            });
        }

        if !lock(&self.active).insert(job_id.to_string()) {
            return Err(StorageError::AlreadyAcquired {
                job_id: job_id.to_string(),
            });
        }

        let dir = self.root().join(job_id);
        // The guard exists before the directory so a failed create is still undone.
        let scratch = JobScratch {
            job_id: job_id.to_string(),
            dir,
            active: Arc::clone(&self.active),
            released: false,
        };

        fs::create_dir_all(&scratch.dir)
            .await
            .map_err(|source| StorageError::CreateFailed {
                path: scratch.dir.clone(),
                source,
            })?;

        debug!(job_id = %job_id, dir = %scratch.dir.display(), "Scratch acquired");
        Ok(scratch)
    }

    /// Removes job directories not held by a live guard and older than `older_than`.
    pub async fn sweep_orphans(&self, older_than: Duration) -> Result<SweepReport, StorageError> {
        let mut report = SweepReport::default();

        let mut entries = match fs::read_dir(self.root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    report.errors.push(format!("{}: {}", name, e));
                    continue;
                }
            };
            if !metadata.is_dir() || lock(&self.active).contains(&name) {
                report.kept += 1;
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age < older_than {
                report.kept += 1;
                continue;
            }

            match fs::remove_dir_all(&path).await {
                Ok(()) => report.removed += 1,
                Err(e) => report.errors.push(format!("{}: {}", name, e)),
            }
        }

        if report.removed > 0 || !report.errors.is_empty() {
            info!(
                removed = report.removed,
                kept = report.kept,
                errors = report.errors.len(),
                "Swept orphaned scratch directories"
            );
        }
        Ok(report)
    }
}

/// Scratch directory owned by one job.
///
/// Dropping the guard removes the directory synchronously; `release` does the
/// same without blocking the runtime.
#[derive(Debug)]
pub struct JobScratch {
    job_id: String,
    dir: PathBuf,
    active: ActiveSet,
    released: bool,
}

impl JobScratch {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a scratch file. `name` is reduced to its final component and
    /// shortened so the whole component fits the filesystem limit.
    pub fn file(&self, role: ScratchRole, name: &str) -> ScratchFile {
        let base = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "file".to_string());
        let prefix = format!("{}-", role.as_str());
        let base = fit_component(&base, MAX_COMPONENT_BYTES - prefix.len());
        ScratchFile {
            path: self.dir.join(format!("{}{}", prefix, base)),
            job_id: self.job_id.clone(),
            role,
        }
    }

    /// Deletes one file once its stage no longer needs it.
    pub async fn remove(&self, file: &ScratchFile) {
        if let Err(e) = fs::remove_file(&file.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(job_id = %self.job_id, path = %file.path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }

    /// Removes the whole directory.
    pub async fn release(mut self) -> Result<(), StorageError> {
        self.released = true;
        lock(&self.active).remove(&self.job_id);
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                debug!(job_id = %self.job_id, "Scratch released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::RemoveFailed {
                path: self.dir.clone(),
                source,
            }),
        }
    }
}

impl Drop for JobScratch {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        lock(&self.active).remove(&self.job_id);
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(job_id = %self.job_id, "Scratch removed on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %self.job_id, error = %e, "Failed to remove scratch on drop"),
        }
    }
}

/// Truncates `name` to at most `max` bytes on a char boundary, keeping a
/// short extension intact.
fn fit_component(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= MAX_EXTENSION_BYTES => {
            (stem, Some(ext))
        }
        _ => (name, None),
    };
    let budget = max - ext.map_or(0, |e| e.len() + 1);
    let mut end = stem.len().min(budget);
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    match ext {
        Some(ext) => format!("{}.{}", &stem[..end], ext),
        None => stem[..end].to_string(),
    }
}
