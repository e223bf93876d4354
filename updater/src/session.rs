//! Per-run install queue.
//!
//! Every file downloaded during one pipeline run is enqueued before any of
//! them is installed, so conflict resolution can see competing files from
//! the same batch. Losing candidates are marked not installable and skipped
//! when their turn comes.

use std::path::{Path, PathBuf};

/// A queued install and whether it may still be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedFile {
    /// Local path of the downloaded file.
    pub path: PathBuf,
    /// Cleared when another candidate wins a conflict.
    pub installable: bool,
}

/// Install state shared by every package processed in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSession {
    stamp: String,
    queue: Vec<QueuedFile>,
}

impl InstallSession {
    /// Start a session whose backups are grouped under `stamp`.
    #[must_use]
    pub fn new(stamp: impl Into<String>) -> Self {
        Self {
            stamp: stamp.into(),
            queue: Vec::new(),
        }
    }

    /// Backup folder name for this session.
    #[must_use]
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Queue `path` as installable. Re-queuing a known path is a no-op.
    pub fn enqueue(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.position(&path).is_none() {
            self.queue.push(QueuedFile {
                path,
                installable: true,
            });
        }
    }

    /// Whether `path` may be installed. Paths that were never queued (such
    /// as files extracted from an archive) are installable.
    #[must_use]
    pub fn is_installable(&self, path: &Path) -> bool {
        self.position(path)
            .and_then(|i| self.queue.get(i))
            .is_none_or(|queued| queued.installable)
    }

    /// Prevent `path` from being installed later in this run.
    pub fn mark_not_installable(&mut self, path: &Path) {
        if let Some(queued) = self.queue.iter_mut().find(|q| q.path == path) {
            queued.installable = false;
        }
    }

    /// Installable queued files other than `except`, in queue order.
    pub fn installable_except<'a>(&'a self, except: &'a Path) -> impl Iterator<Item = &'a Path> {
        self.queue
            .iter()
            .filter(move |q| q.installable && q.path != except)
            .map(|q| q.path.as_path())
    }

    /// Every queued file in queue order.
    #[must_use]
    pub fn queued(&self) -> &[QueuedFile] {
        &self.queue
    }

    fn position(&self, path: &Path) -> Option<usize> {
        self.queue.iter().position(|q| q.path == path)
    }
}
