use std::sync::Arc;

use tokio::sync::watch;

/// Upload progress in percent. Values are clamped to 0..=100 and never go
/// backwards; observers read them through a `watch::Receiver`.
#[derive(Clone)]
pub struct Progress {
    tx: Arc<watch::Sender<u8>>,
}

impl Progress {
    pub fn new() -> (Self, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Progress nobody is watching.
    pub fn detached() -> Self {
        Self::new().0
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    /// Reports `round(done / total * 100)`.
    pub fn report_fraction(&self, done: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = ((done.min(total) as f64 / total as f64) * 100.0).round() as u8;
        self.report(percent);
    }

    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_never_decreases() {
        let (progress, rx) = Progress::new();
        progress.report(40);
        progress.report(10);
        assert_eq!(*rx.borrow(), 40);
        progress.report(250);
        assert_eq!(progress.current(), 100);
    }

    #[test]
    fn test_fraction_rounds() {
        let progress = Progress::detached();
        progress.report_fraction(1, 3);
        assert_eq!(progress.current(), 33);
        progress.report_fraction(2, 3);
        assert_eq!(progress.current(), 67);
        progress.report_fraction(5, 0);
        assert_eq!(progress.current(), 67);
    }
}
