use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct Statistics {
    pub num_fetches: Arc<AtomicUsize>,
    pub num_fetch_errors: Arc<AtomicUsize>,
    pub num_discoveries: Arc<AtomicUsize>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            num_fetches: Arc::new(AtomicUsize::new(0)),
            num_fetch_errors: Arc::new(AtomicUsize::new(0)),
            num_discoveries: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Statistics {
    pub fn write_to_log(&self, running_time: Duration) {
        let num_fetches = self.num_fetches.load(Ordering::Relaxed);
        let num_fetch_errors = self.num_fetch_errors.load(Ordering::Relaxed);
        let num_discoveries = self.num_discoveries.load(Ordering::Relaxed);
        tracing::info!(
            num_fetches = num_fetches,
            num_fetch_errors = num_fetch_errors,
            num_discoveries = num_discoveries,
            running_time = ?running_time,
            "statistics"
        );
    }
}
