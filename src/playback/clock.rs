use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Direction;

/// Monotonic time measured from an arbitrary origin.
pub trait TimeSource: Send + Sync {
    /// Time elapsed since the source's origin. Never decreases.
    fn now(&self) -> Duration;
}

/// Wall-clock time from [`std::time::Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    /// Starts measuring from now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Time that only moves when told to. Clones share the same counter.
///
/// Useful for rendering offline at a fixed step and for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    nanos: Arc<AtomicU64>,
}

impl ManualTime {
    /// Starts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `step`.
    pub fn advance(&self, step: Duration) {
        self.nanos.fetch_add(step.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Time from [`tokio::time::Instant`], which honors paused test time.
#[derive(Debug, Clone)]
pub struct TokioTime {
    origin: tokio::time::Instant,
}

impl TokioTime {
    /// Starts measuring from now.
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioTime {
    fn now(&self) -> Duration {
        tokio::time::Instant::now().duration_since(self.origin)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Time elapsed between two clock ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elapsed {
    /// Unscaled real time
    pub real: Duration,
    /// Real time multiplied by the speed
    pub scaled: Duration,
    /// Direction the scaled time applies in
    pub direction: Direction,
}

/// Measures real time between successive [`Clock::delta_time`] calls.
pub struct Clock {
    source: Arc<dyn TimeSource>,
    last: Duration,
}

impl Clock {
    /// Creates a clock whose baseline is the source's current time.
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        let last = source.now();
        Self { source, last }
    }

    /// Moves the baseline to now so the next delta starts from zero.
    pub fn reset(&mut self) {
        self.last = self.source.now();
    }

    /// Time since the previous call (or reset), scaled by `speed`.
    ///
    /// Never negative; a non-positive or non-finite speed yields zero.
    pub fn delta_time(&mut self, speed: f32, direction: Direction) -> Elapsed {
        let now = self.source.now();
        let real = now.saturating_sub(self.last);
        self.last = now.max(self.last);

        let scaled = if speed.is_finite() && speed > 0.0 {
            Duration::from_nanos((real.as_nanos() as f64 * speed as f64).round() as u64)
        } else {
            Duration::ZERO
        };

        Elapsed {
            real,
            scaled,
            direction,
        }
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock").field("last", &self.last).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_since_last_call() {
        let time = ManualTime::new();
        let mut clock = Clock::new(Arc::new(time.clone()));

        time.advance(Duration::from_millis(30));
        let elapsed = clock.delta_time(1.0, Direction::Forward);
        assert_eq!(elapsed.real, Duration::from_millis(30));
        assert_eq!(elapsed.scaled, Duration::from_millis(30));

        time.advance(Duration::from_millis(10));
        assert_eq!(clock.delta_time(1.0, Direction::Forward).real, Duration::from_millis(10));
    }

    #[test]
    fn test_speed_scales_and_direction_carries() {
        let time = ManualTime::new();
        let mut clock = Clock::new(Arc::new(time.clone()));

        time.advance(Duration::from_millis(100));
        let elapsed = clock.delta_time(2.0, Direction::Backward);
        assert_eq!(elapsed.scaled, Duration::from_millis(200));
        assert_eq!(elapsed.real, Duration::from_millis(100));
        assert_eq!(elapsed.direction, Direction::Backward);
    }

    #[test]
    fn test_reset_discards_stale_time() {
        let time = ManualTime::new();
        let mut clock = Clock::new(Arc::new(time.clone()));

        time.advance(Duration::from_secs(5));
        clock.reset();
        time.advance(Duration::from_millis(20));
        assert_eq!(clock.delta_time(1.0, Direction::Forward).real, Duration::from_millis(20));
    }

    #[test]
    fn test_invalid_speed_yields_zero() {
        let time = ManualTime::new();
        let mut clock = Clock::new(Arc::new(time.clone()));
        time.advance(Duration::from_millis(20));
        assert_eq!(clock.delta_time(0.0, Direction::Forward).scaled, Duration::ZERO);
        time.advance(Duration::from_millis(20));
        assert_eq!(clock.delta_time(f32::NAN, Direction::Forward).scaled, Duration::ZERO);
    }

    #[test]
    fn test_monotonic_source_never_goes_back() {
        let time = MonotonicTime::new();
        let a = time.now();
        let b = time.now();
        assert!(b >= a);
    }
}
