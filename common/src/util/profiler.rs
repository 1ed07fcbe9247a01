use std::time::{Duration, Instant};

/// Logs the wall time of a flow step when it goes out of scope.
pub struct ScopedTimer {
    step: String,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(step: impl Into<String>) -> Self {
        let step = step.into();
        log::debug!("{} started", step);
        Self {
            step,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::info!("{} finished in {:.3} s", self.step, self.elapsed().as_secs_f64());
    }
}
