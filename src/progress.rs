//! Run events flowing from file workers to a single presentation consumer.

use crate::coordinator::{DropReason, RunSummary};
use crate::router::{FileClassificationResult, RouteOutcome};
use crossbeam_channel::{Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone)]
pub enum RunEvent {
    Started { volume: PathBuf, total: usize },
    Progress { processed: usize, total: usize },
    Routed(FileClassificationResult),
    Finished(RunSummary),
    Dropped { volume: PathBuf, reason: DropReason },
}

/// Sends `Progress` events for one run, at 0%, once per 10% band, and at 100%.
pub struct ProgressReporter {
    tx: Sender<RunEvent>,
    total: usize,
    last_band: AtomicUsize,
}

impl ProgressReporter {
    pub fn start(tx: Sender<RunEvent>, total: usize) -> Self {
        let reporter = Self {
            tx,
            total,
            last_band: AtomicUsize::new(0),
        };
        reporter.emit(RunEvent::Progress { processed: 0, total });
        reporter
    }

    pub fn emit(&self, event: RunEvent) {
        // Nobody listening is fine; the run carries on.
        let _ = self.tx.send(event);
    }

    pub fn record(&self, processed: usize) {
        let percent = if self.total == 0 {
            100
        } else {
            (processed * 100 / self.total).min(100)
        };
        let band = percent / 10;
        if band > self.last_band.fetch_max(band, Ordering::SeqCst) {
            self.emit(RunEvent::Progress {
                processed,
                total: self.total,
            });
        }
    }
}

/// Single consumer that renders run events to the terminal.
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn spawn(rx: Receiver<RunEvent>) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut pb: Option<ProgressBar> = None;
            for event in rx {
                Self::handle(&mut pb, event);
            }
            if let Some(pb) = pb.take() {
                pb.finish_and_clear();
            }
        })
    }

    fn handle(pb: &mut Option<ProgressBar>, event: RunEvent) {
        match event {
            RunEvent::Started { volume, total } => {
                log::info!("Found {} files on {}", total, volume.display());
                let bar = ProgressBar::new(total as u64);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{pos}/{len} processed {wide_bar} {percent}%")
                {
                    bar.set_style(style.progress_chars("=> "));
                }
                *pb = Some(bar);
            }
            RunEvent::Progress { processed, total } => {
                if let Some(bar) = pb {
                    bar.set_length(total as u64);
                    bar.set_position(processed as u64);
                }
            }
            RunEvent::Routed(result) => {
                let line = || log_routed(&result);
                match pb {
                    Some(bar) => bar.suspend(line),
                    None => line(),
                }
            }
            RunEvent::Finished(summary) => {
                if let Some(bar) = pb.take() {
                    bar.finish_and_clear();
                }
                log::info!(
                    "All files processed: {} copied, {} skipped, {} failed ({} of {}) -> {}",
                    summary.copied,
                    summary.skipped,
                    summary.failed,
                    summary.processed,
                    summary.total,
                    summary.output_root.display()
                );
            }
            RunEvent::Dropped { volume, reason } => {
                log::info!("Ignoring {}: {}", volume.display(), reason);
            }
        }
    }
}

fn log_routed(result: &FileClassificationResult) {
    let source = result.source_path.display();
    match &result.outcome {
        RouteOutcome::Success => {
            let dest = result
                .destination_path
                .as_deref()
                .and_then(|p| p.parent())
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            log::info!("Classified {} -> {}", source, dest);
        }
        RouteOutcome::SkippedVolumeRemoved => {
            log::warn!("Volume removed, skipped {}", source);
        }
        RouteOutcome::Error(msg) => log::warn!("Failed {}: {}", source, msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress_points(rx: &Receiver<RunEvent>) -> Vec<usize> {
        rx.try_iter()
            .filter_map(|e| match e {
                RunEvent::Progress { processed, .. } => Some(processed),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_throttled_to_ten_percent_bands() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let reporter = ProgressReporter::start(tx, 1000);
        for processed in 1..=1000 {
            reporter.record(processed);
        }
        assert_eq!(
            progress_points(&rx),
            [0, 100, 200, 300, 400, 500, 600, 700, 800, 900, 1000]
        );
    }

    #[test]
    fn test_small_runs_report_completion() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let reporter = ProgressReporter::start(tx, 3);
        for processed in 1..=3 {
            reporter.record(processed);
        }
        assert_eq!(progress_points(&rx), [0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_run() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let reporter = ProgressReporter::start(tx, 0);
        reporter.record(0);
        assert_eq!(progress_points(&rx), [0, 0]);
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let reporter = ProgressReporter::start(tx, 10);
        reporter.record(10);
    }

    #[test]
    fn test_console_sink_drains() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = ConsoleSink::spawn(rx);
        tx.send(RunEvent::Started {
            volume: PathBuf::from("/media/card"),
            total: 1,
        })
        .unwrap();
        tx.send(RunEvent::Progress {
            processed: 1,
            total: 1,
        })
        .unwrap();
        drop(tx);
        handle.join().unwrap();
    }
}
