//! One run per inserted volume: enumerate, fan out, join, report.

use crate::progress::{ProgressReporter, RunEvent};
use crate::router::{FileClassificationResult, FileRouter, RouteOutcome};
use crate::scanner;
use crate::state::RunState;
use anyhow::Result;
use crossbeam_channel::Sender;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Why a volume signal did not start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Busy,
    NoMediaDir,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Busy => write!(f, "another volume is being processed"),
            DropReason::NoMediaDir => write!(f, "no media directory"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub volume: PathBuf,
    pub total: usize,
    pub processed: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub output_root: PathBuf,
}

impl RunSummary {
    fn tally(volume: &Path, output_root: &Path, state: &RunState, results: &[FileClassificationResult]) -> Self {
        let count = |wanted: fn(&RouteOutcome) -> bool| results.iter().filter(|r| wanted(&r.outcome)).count();
        Self {
            volume: volume.to_path_buf(),
            total: state.total_files(),
            processed: state.processed_files(),
            copied: count(|o| matches!(o, RouteOutcome::Success)),
            skipped: count(|o| matches!(o, RouteOutcome::SkippedVolumeRemoved)),
            failed: count(|o| matches!(o, RouteOutcome::Error(_))),
            output_root: output_root.to_path_buf(),
        }
    }
}

/// Shows the output folder once a run is done. Best-effort.
pub trait FolderOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<()>;
}

/// Opens folders in the desktop's file browser.
pub struct SystemFolderOpener;

impl FolderOpener for SystemFolderOpener {
    fn open(&self, path: &Path) -> Result<()> {
        open::that(path)?;
        Ok(())
    }
}

/// Held for the whole of a run; dropping it returns the coordinator to idle,
/// whether the run finished or unwound.
#[derive(Debug)]
pub struct RunGuard {
    busy: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                busy: Arc::clone(busy),
            })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Name of the media directory under a volume root
    pub media_dir: String,
    /// Worker threads per run; 0 picks one per CPU
    pub workers: usize,
    /// Open the output root when a run completes
    pub open_when_done: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            media_dir: scanner::DEFAULT_MEDIA_DIR.to_string(),
            workers: 0,
            open_when_done: true,
        }
    }
}

pub struct RunCoordinator {
    router: FileRouter,
    settings: RunSettings,
    busy: Arc<AtomicBool>,
    events: Sender<RunEvent>,
    opener: Arc<dyn FolderOpener>,
    pool: rayon::ThreadPool,
}

impl RunCoordinator {
    pub fn new(
        router: FileRouter,
        settings: RunSettings,
        events: Sender<RunEvent>,
        opener: Arc<dyn FolderOpener>,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .thread_name(|i| format!("route-worker-{i}"))
            .build()?;
        Ok(Self {
            router,
            settings,
            busy: Arc::new(AtomicBool::new(false)),
            events,
            opener,
            pool,
        })
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Handle a volume-insertion signal without blocking the caller.
    /// Returns the run's thread if one was started; dropped signals are
    /// reported on the event channel and never queued.
    pub fn on_volume_detected(self: &Arc<Self>, volume: PathBuf) -> Option<JoinHandle<RunSummary>> {
        let (guard, media) = self.admit(&volume).ok()?;
        let coordinator = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("volume-run".to_string())
            .spawn(move || coordinator.run(guard, &volume, &media));
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("could not start run thread: {}", e);
                None
            }
        }
    }

    /// Process a volume on the calling thread.
    pub fn process_volume(&self, volume: &Path) -> std::result::Result<RunSummary, DropReason> {
        let (guard, media) = self.admit(volume)?;
        Ok(self.run(guard, volume, &media))
    }

    fn admit(&self, volume: &Path) -> std::result::Result<(RunGuard, PathBuf), DropReason> {
        let admitted = match scanner::media_dir(volume, &self.settings.media_dir) {
            None => Err(DropReason::NoMediaDir),
            Some(media) => RunGuard::acquire(&self.busy)
                .map(|guard| (guard, media))
                .ok_or(DropReason::Busy),
        };
        if let Err(reason) = admitted {
            let _ = self.events.send(RunEvent::Dropped {
                volume: volume.to_path_buf(),
                reason,
            });
        }
        admitted
    }

    fn run(&self, _guard: RunGuard, volume: &Path, media: &Path) -> RunSummary {
        let files = scanner::scan_files(media);
        let state = RunState::new(files.len());
        let _ = self.events.send(RunEvent::Started {
            volume: volume.to_path_buf(),
            total: files.len(),
        });
        let reporter = ProgressReporter::start(self.events.clone(), files.len());

        let results: Vec<FileClassificationResult> = self.pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let result = self.router.route(file, volume, &state);
                    reporter.emit(RunEvent::Routed(result.clone()));
                    reporter.record(state.processed_files());
                    result
                })
                .collect()
        });
        // Empty runs still report 100%.
        reporter.record(state.processed_files());

        let summary = RunSummary::tally(volume, self.router.output_root(), &state, &results);
        reporter.emit(RunEvent::Finished(summary.clone()));

        if self.settings.open_when_done {
            if let Err(e) = self.opener.open(self.router.output_root()) {
                log::warn!("Could not open {}: {}", self.router.output_root().display(), e);
            }
        }
        summary
    }
}
