//! Volume-insertion listener.
//!
//! Polls the mount roots on a background thread and reports volumes that
//! appear or disappear between polls. A volume only counts once its media
//! directory is visible, so a card whose DCIM shows up a poll after the mount
//! point is reported then. Volumes already present when the watcher starts
//! are the baseline and are not reported.

use crate::coordinator::RunCoordinator;
use crate::scanner;
use crossbeam_channel::{Receiver, Sender};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeEvent {
    Inserted(PathBuf),
    Removed(PathBuf),
}

/// Where removable volumes show up on this platform.
pub fn default_mount_roots() -> Vec<PathBuf> {
    if cfg!(windows) {
        return Vec::new();
    }
    let mut roots = Vec::new();
    if let Ok(user) = std::env::var("USER") {
        roots.push(PathBuf::from("/media").join(&user));
        roots.push(PathBuf::from("/run/media").join(&user));
    }
    roots.push(PathBuf::from("/Volumes"));
    roots.push(PathBuf::from("/mnt"));
    roots
}

/// Card volumes currently mounted: every directory directly under a mount
/// root, plus the drive letters present on Windows, that holds `media_dir`.
pub fn list_volumes(mount_roots: &[PathBuf], media_dir: &str) -> BTreeSet<PathBuf> {
    let mut volumes = BTreeSet::new();

    if cfg!(windows) {
        volumes.extend(
            ('A'..='Z')
                .map(|letter| PathBuf::from(format!("{letter}:\\")))
                .filter(|drive| scanner::media_dir(drive, media_dir).is_some()),
        );
    }

    for root in mount_roots {
        let Ok(entries) = fs::read_dir(root) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if scanner::media_dir(&path, media_dir).is_some() {
                volumes.insert(path);
            }
        }
    }
    volumes
}

/// Events turning `previous` into `current`.
fn diff(previous: &BTreeSet<PathBuf>, current: &BTreeSet<PathBuf>) -> Vec<VolumeEvent> {
    let inserted = current
        .difference(previous)
        .cloned()
        .map(VolumeEvent::Inserted);
    let removed = previous
        .difference(current)
        .cloned()
        .map(VolumeEvent::Removed);
    inserted.chain(removed).collect()
}

pub struct VolumeWatcher {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl VolumeWatcher {
    pub fn start(
        mount_roots: Vec<PathBuf>,
        media_dir: String,
        poll_interval: Duration,
        tx: Sender<VolumeEvent>,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle =
            thread::spawn(move || Self::poll_loop(mount_roots, media_dir, poll_interval, tx, flag));
        log::info!("Waiting for volumes to be inserted...");
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn poll_loop(
        mount_roots: Vec<PathBuf>,
        media_dir: String,
        poll_interval: Duration,
        tx: Sender<VolumeEvent>,
        shutdown: Arc<AtomicBool>,
    ) {
        let mut known = list_volumes(&mount_roots, &media_dir);
        log::debug!("{} volume(s) already mounted", known.len());

        while !shutdown.load(Ordering::SeqCst) {
            thread::sleep(poll_interval);
            let current = list_volumes(&mount_roots, &media_dir);
            for event in diff(&known, &current) {
                log::trace!("volume event: {:?}", event);
                if tx.send(event).is_err() {
                    return;
                }
            }
            known = current;
        }
    }
}

impl Drop for VolumeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Consume volume events one at a time until the channel closes, handing
/// insertions to the coordinator. Runs still in flight are joined before
/// returning.
pub fn listen(coordinator: &Arc<RunCoordinator>, events: Receiver<VolumeEvent>) {
    let mut runs: Vec<JoinHandle<_>> = Vec::new();

    for event in events {
        match event {
            VolumeEvent::Inserted(volume) => {
                log::info!("Detected volume {}", volume.display());
                runs.retain(|run| !run.is_finished());
                if let Some(run) = coordinator.on_volume_detected(volume) {
                    runs.push(run);
                }
            }
            VolumeEvent::Removed(volume) => {
                log::debug!("Volume {} removed", volume.display());
            }
        }
    }

    for run in runs {
        if run.join().is_err() {
            log::error!("volume run panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{FolderOpener, RunSettings};
    use crate::metadata::stub::StubExtractor;
    use crate::router::FileRouter;
    use std::path::Path;
    use tempfile::TempDir;

    struct NoOpen;

    impl FolderOpener for NoOpen {
        fn open(&self, _path: &Path) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_list_volumes() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("EOS_DIGITAL/DCIM")).unwrap();
        fs::create_dir_all(root.path().join("NIKON D850/DCIM")).unwrap();
        fs::create_dir_all(root.path().join("BACKUP/Documents")).unwrap();
        fs::write(root.path().join("not-a-volume"), b"").unwrap();

        let volumes = list_volumes(&[root.path().to_path_buf(), root.path().join("missing")], "DCIM");
        let names: Vec<_> = volumes
            .iter()
            .filter(|v| v.starts_with(root.path()))
            .map(|v| v.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["EOS_DIGITAL", "NIKON D850"]);
    }

    #[test]
    fn test_diff() {
        let before: BTreeSet<PathBuf> = ["/media/a", "/media/b"].iter().map(PathBuf::from).collect();
        let after: BTreeSet<PathBuf> = ["/media/b", "/media/c"].iter().map(PathBuf::from).collect();
        assert_eq!(
            diff(&before, &after),
            [
                VolumeEvent::Inserted(PathBuf::from("/media/c")),
                VolumeEvent::Removed(PathBuf::from("/media/a")),
            ]
        );
        assert!(diff(&after, &after).is_empty());
    }

    #[test]
    fn test_watcher_reports_new_volume() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("already-here/DCIM")).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut watcher = VolumeWatcher::start(
            vec![root.path().to_path_buf()],
            "DCIM".to_string(),
            Duration::from_millis(10),
            tx,
        );

        // Let the baseline poll happen before inserting.
        thread::sleep(Duration::from_millis(50));
        fs::create_dir_all(root.path().join("CARD/DCIM")).unwrap();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event, VolumeEvent::Inserted(root.path().join("CARD")));

        fs::remove_dir_all(root.path().join("CARD")).unwrap();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event, VolumeEvent::Removed(root.path().join("CARD")));
        watcher.stop();
    }

    #[test]
    fn test_volume_reported_once_media_dir_appears() {
        let root = TempDir::new().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut watcher = VolumeWatcher::start(
            vec![root.path().to_path_buf()],
            "DCIM".to_string(),
            Duration::from_millis(10),
            tx,
        );

        thread::sleep(Duration::from_millis(50));
        let card = root.path().join("CARD");
        fs::create_dir(&card).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        fs::create_dir(card.join("DCIM")).unwrap();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event, VolumeEvent::Inserted(card));
        watcher.stop();
    }

    #[test]
    fn test_listen_runs_inserted_volumes() {
        let tmp = TempDir::new().unwrap();
        let card = tmp.path().join("card");
        fs::create_dir_all(card.join("DCIM/100CANON")).unwrap();
        fs::write(card.join("DCIM/100CANON/IMG_0001.JPG"), b"jpg").unwrap();
        let stick = tmp.path().join("stick");
        fs::create_dir_all(&stick).unwrap();

        let (run_tx, _run_rx) = crossbeam_channel::unbounded();
        let router = FileRouter::new(Arc::new(StubExtractor::default()), tmp.path().join("out"));
        let coordinator =
            Arc::new(RunCoordinator::new(router, RunSettings::default(), run_tx, Arc::new(NoOpen)).unwrap());

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(VolumeEvent::Inserted(stick)).unwrap();
        tx.send(VolumeEvent::Inserted(card.clone())).unwrap();
        tx.send(VolumeEvent::Removed(card)).unwrap();
        drop(tx);

        listen(&coordinator, rx);
        assert!(tmp.path().join("out/Unknown/Unknown/Unknown/IMG_0001.JPG").is_file());
        assert!(!coordinator.is_busy());
    }
}
