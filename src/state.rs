use crate::key::ClassificationKey;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// State shared by every file worker of one run.
///
/// `last_jpeg_key` is a swapped snapshot: writers replace it whole, readers
/// take whatever is current. Concurrent JPEGs race last-writer-wins and a
/// sidecar routed alongside its JPEG may still see the previous value.
#[derive(Debug)]
pub struct RunState {
    total_files: usize,
    processed_files: AtomicUsize,
    last_jpeg_key: ArcSwap<ClassificationKey>,
}

impl RunState {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_files: AtomicUsize::new(0),
            last_jpeg_key: ArcSwap::from_pointee(ClassificationKey::unknown()),
        }
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn processed_files(&self) -> usize {
        self.processed_files.load(Ordering::SeqCst)
    }

    /// Count one more file as processed; returns the new count.
    pub fn mark_processed(&self) -> usize {
        self.processed_files.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn last_jpeg_key(&self) -> Arc<ClassificationKey> {
        self.last_jpeg_key.load_full()
    }

    pub fn set_last_jpeg_key(&self, key: ClassificationKey) {
        self.last_jpeg_key.store(Arc::new(key));
    }
}
