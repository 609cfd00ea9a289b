//! Wall-clock timer for a scoped region.
//!
//! The region is closed by a guard, so the stop timestamp is recorded on a
//! normal return, on an early `?` return and while unwinding from a panic.
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone)]
pub struct Timer {
    started: Option<Instant>,
    elapsed: Option<Duration>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start timestamp, discarding any previous measurement.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.elapsed = None;
    }

    /// Record the stop timestamp. Calling `stop` on a timer that was never
    /// started leaves it at zero.
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed = Some(started.elapsed());
        }
    }

    /// Elapsed seconds between start and stop. While the timer is still
    /// running this is the time since `start`.
    pub fn elapsed_time(&self) -> f64 {
        match (self.elapsed, self.started) {
            (Some(elapsed), _) => elapsed.as_secs_f64(),
            (None, Some(started)) => started.elapsed().as_secs_f64(),
            (None, None) => 0.0,
        }
    }

    /// Start the timer and return a guard that stops it when dropped.
    pub fn scope(&mut self) -> TimerGuard<'_> {
        self.start();
        TimerGuard { timer: self }
    }

    /// Time a closure.
    pub fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let _guard = self.scope();
        f()
    }
}

pub struct TimerGuard<'a> {
    timer: &'a mut Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::thread::sleep;

    #[test]
    fn test_unstarted_timer_reports_zero() {
        let timer = Timer::new();
        assert_eq!(timer.elapsed_time(), 0.0);
    }

    #[test]
    fn test_time_measures_closure() {
        let mut timer = Timer::new();
        let value = timer.time(|| {
            sleep(Duration::from_millis(10));
            42
        });
        assert_eq!(value, 42);
        let elapsed = timer.elapsed_time();
        assert!(elapsed >= 0.010, "elapsed {} shorter than the sleep", elapsed);
        assert!(elapsed < 1.0);

        // Stopped timers do not keep counting.
        sleep(Duration::from_millis(5));
        assert_eq!(timer.elapsed_time(), elapsed);
    }

    #[test]
    fn test_guard_stops_on_panic() {
        let mut timer = Timer::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = timer.scope();
            sleep(Duration::from_millis(5));
            panic!("fit blew up");
        }));
        assert!(result.is_err());
        let elapsed = timer.elapsed_time();
        assert!(elapsed >= 0.005);
        sleep(Duration::from_millis(5));
        assert_eq!(timer.elapsed_time(), elapsed);
    }

    #[test]
    fn test_restart_discards_previous_measurement() {
        let mut timer = Timer::new();
        timer.time(|| sleep(Duration::from_millis(20)));
        timer.time(|| ());
        assert!(timer.elapsed_time() < 0.020);
    }
}
