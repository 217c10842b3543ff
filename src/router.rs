//! Per-file routing: classify a file, work out where it belongs, copy it there.

use crate::error::RouteError;
use crate::key::{self, ClassificationKey, FileCategory};
use crate::metadata::{self, MetadataExtractor};
use crate::paths;
use crate::state::RunState;
use crate::transfer;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum RouteOutcome {
    Success,
    SkippedVolumeRemoved,
    Error(String),
}

/// What happened to one file. Used for logging and progress only.
#[derive(Debug, Clone, Serialize)]
pub struct FileClassificationResult {
    pub source_path: PathBuf,
    pub destination_path: Option<PathBuf>,
    pub category: Option<FileCategory>,
    pub key: Option<ClassificationKey>,
    pub outcome: RouteOutcome,
}

impl FileClassificationResult {
    fn failed(
        source_path: &Path,
        category: Option<FileCategory>,
        key: Option<ClassificationKey>,
        error: RouteError,
    ) -> Self {
        let outcome = match error {
            RouteError::VolumeRemoved(_) => RouteOutcome::SkippedVolumeRemoved,
            other => RouteOutcome::Error(other.to_string()),
        };
        Self {
            source_path: source_path.to_path_buf(),
            destination_path: None,
            category,
            key,
            outcome,
        }
    }
}

pub struct FileRouter {
    extractor: Arc<dyn MetadataExtractor>,
    output_root: PathBuf,
}

impl FileRouter {
    pub fn new(extractor: Arc<dyn MetadataExtractor>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            extractor,
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Route one file. Never fails and never panics: every problem becomes
    /// the result's outcome, and the file is always counted as processed.
    pub fn route(&self, path: &Path, volume_root: &Path, state: &RunState) -> FileClassificationResult {
        let routed = panic::catch_unwind(AssertUnwindSafe(|| self.try_route(path, volume_root, state)));
        let result = routed.unwrap_or_else(|payload| {
            FileClassificationResult::failed(
                path,
                None,
                None,
                RouteError::Unexpected(panic_message(payload.as_ref())),
            )
        });
        let processed = state.mark_processed();
        log::trace!("{}/{} processed", processed, state.total_files());
        result
    }

    fn try_route(&self, path: &Path, volume_root: &Path, state: &RunState) -> FileClassificationResult {
        if !volume_root.exists() {
            let error = RouteError::VolumeRemoved(volume_root.to_path_buf());
            return FileClassificationResult::failed(path, None, None, error);
        }

        let (category, key) = self.classify(path, state);
        match self.copy(path, &key) {
            Ok(destination) => FileClassificationResult {
                source_path: path.to_path_buf(),
                destination_path: Some(destination),
                category: Some(category),
                key: Some(key),
                outcome: RouteOutcome::Success,
            },
            Err(e) => FileClassificationResult::failed(path, Some(category), Some(key), e),
        }
    }

    fn classify(&self, path: &Path, state: &RunState) -> (FileCategory, ClassificationKey) {
        let category = FileCategory::from_path(path);
        match (category, self.extractor.extract(path)) {
            (FileCategory::Jpeg, Some(extracted)) => {
                let key = key::resolve(FileCategory::Jpeg, &extracted);
                state.set_last_jpeg_key(key.clone());
                (FileCategory::Jpeg, key)
            }
            (FileCategory::Jpeg, None) => (FileCategory::Jpeg, ClassificationKey::unknown()),
            (_, Some(extracted)) => (FileCategory::Raw, key::resolve(FileCategory::Raw, &extracted)),
            (_, None) => {
                let created = match metadata::filesystem_creation_date(path) {
                    Ok(date) => Some(date),
                    Err(e) => {
                        log::debug!("no creation date for {}: {}", path.display(), e);
                        None
                    }
                };
                let last_jpeg = state.last_jpeg_key();
                (FileCategory::Other, key::resolve_other(&last_jpeg, created))
            }
        }
    }

    fn copy(&self, path: &Path, key: &ClassificationKey) -> Result<PathBuf, RouteError> {
        let dir = paths::ensure_destination_dir(&self.output_root, key)
            .map_err(RouteError::access(paths::destination_dir(&self.output_root, key)))?;
        let (destination, bytes) = transfer::copy_into(path, &dir).map_err(RouteError::access(path))?;
        log::debug!("copied {} bytes to {}", bytes, destination.display());
        Ok(destination)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
