use hlsget_engine::ProgressEvent;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

/// Bar resolution; positions are fractions of this.
const BAR_SCALE: u64 = 1000;

fn phase_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg:<11} [{elapsed_precise}] [{bar:40.green/white}] {percent:>3}% {prefix}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Renders [`ProgressEvent`]s as one bar per phase.
#[derive(Clone)]
pub struct ProgressManager {
    multi: MultiProgress,
    bars: Arc<Mutex<HashMap<&'static str, ProgressBar>>>,
    disabled: bool,
}

impl ProgressManager {
    pub fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: Arc::new(Mutex::new(HashMap::new())),
            disabled: false,
        }
    }

    pub fn new_disabled(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: Arc::new(Mutex::new(HashMap::new())),
            disabled: true,
        }
    }

    pub fn handle_event(&self, event: ProgressEvent) {
        if self.disabled {
            return;
        }

        let fraction = event.fraction();
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        let bar = bars.entry(event.label()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(BAR_SCALE));
            bar.set_style(phase_style());
            bar.set_message(event.label());
            bar.enable_steady_tick(Duration::from_millis(500));
            bar
        });

        bar.set_position((fraction * BAR_SCALE as f64).round() as u64);
        bar.set_prefix(event.suffix());
        if fraction >= 1.0 {
            bar.finish();
        }
    }

    /// Finish any bar still running, e.g. a phase that ended with missing segments.
    pub fn finish_all(&self) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        for bar in bars.values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;

    fn hidden_manager() -> ProgressManager {
        ProgressManager::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    #[test]
    fn test_bar_per_phase() {
        let manager = hidden_manager();
        manager.handle_event(ProgressEvent::Downloading {
            completed: 1,
            total: 4,
        });
        manager.handle_event(ProgressEvent::Downloading {
            completed: 4,
            total: 4,
        });
        manager.handle_event(ProgressEvent::Merging { merged: 2, total: 4 });

        let bars = manager.bars.lock().unwrap();
        assert_eq!(bars.len(), 2);
        let downloading = &bars["downloading"];
        assert_eq!(downloading.position(), BAR_SCALE);
        assert!(downloading.is_finished());
        assert_eq!(downloading.prefix(), "4/4 complete");
        assert_eq!(bars["merging"].position(), BAR_SCALE / 2);
        assert!(!bars["merging"].is_finished());
    }

    #[test]
    fn test_disabled_manager_ignores_events() {
        let manager =
            ProgressManager::new_disabled(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()));
        manager.handle_event(ProgressEvent::Merging { merged: 1, total: 1 });
        assert!(manager.is_disabled());
        assert!(manager.bars.lock().unwrap().is_empty());
    }
}
