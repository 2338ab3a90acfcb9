use std::sync::Arc;

/// Progress notifications emitted while a run is acquiring or merging segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A segment reached its final on-disk location.
    Downloading {
        /// Segments completed so far.
        completed: usize,
        /// Total number of segments in the playlist.
        total: usize,
    },
    /// A segment was appended to the output file.
    Merging {
        /// Segments merged so far.
        merged: usize,
        /// Total number of segments in the playlist.
        total: usize,
    },
}

impl ProgressEvent {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressEvent::Downloading { .. } => "downloading",
            ProgressEvent::Merging { .. } => "merging",
        }
    }

    /// Completed fraction in `[0, 1]`. An empty run counts as complete.
    pub fn fraction(&self) -> f64 {
        let (done, total) = self.counts();
        if total == 0 {
            return 1.0;
        }
        (done as f64 / total as f64).clamp(0.0, 1.0)
    }

    fn counts(&self) -> (usize, usize) {
        match *self {
            ProgressEvent::Downloading { completed, total } => (completed, total),
            ProgressEvent::Merging { merged, total } => (merged, total),
        }
    }

    pub fn suffix(&self) -> String {
        let (done, total) = self.counts();
        format!("{done}/{total} complete")
    }
}

/// A callback function for progress updates.
pub type OnProgress = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
