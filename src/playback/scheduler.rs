use std::time::Duration;

/// Turns accumulated playback time into frame-boundary crossings.
///
/// Crossings are derived from the total time accumulated since the last
/// reset, so the count after any sequence of ticks depends only on their sum:
/// `floor(total / frame_duration)`. The remainder is carried between ticks.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    fps: f64,
    accumulated: Duration,
    crossed: u64,
    bypass: bool,
}

impl FrameScheduler {
    /// Scheduler for a stream at `fps` frames per second.
    pub fn new(fps: f64) -> Self {
        Self {
            fps: if fps.is_finite() && fps > 0.0 { fps } else { 0.0 },
            accumulated: Duration::ZERO,
            crossed: 0,
            bypass: false,
        }
    }

    /// Scheduler for a still image: never reports crossings.
    pub fn for_image() -> Self {
        Self {
            bypass: true,
            ..Self::new(0.0)
        }
    }

    /// Whether periodic advancement is disabled.
    pub fn is_bypassed(&self) -> bool {
        self.bypass || self.fps == 0.0
    }

    /// Adds `elapsed` scaled time and returns how many frame boundaries it crossed.
    pub fn advance(&mut self, elapsed: Duration) -> u64 {
        if self.is_bypassed() {
            return 0;
        }
        self.accumulated = self.accumulated.saturating_add(elapsed);
        let total = self.frames_in(self.accumulated);
        let crossed = total.saturating_sub(self.crossed);
        self.crossed = total;
        crossed
    }

    /// Number of whole frames contained in `time`.
    pub fn frames_in(&self, time: Duration) -> u64 {
        if self.fps == 0.0 {
            return 0;
        }
        (time.as_nanos() as f64 * self.fps / 1_000_000_000.0).floor() as u64
    }

    /// Drops accumulated time, e.g. after a seek or a transport change.
    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.crossed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_crossings_carry_remainder() {
        let mut scheduler = FrameScheduler::new(25.0);
        assert_eq!(scheduler.advance(Duration::from_millis(30)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(30)), 1);
        assert_eq!(scheduler.advance(Duration::from_millis(30)), 1);
        assert_eq!(scheduler.advance(Duration::from_millis(30)), 1);
        assert_eq!(scheduler.advance(Duration::from_millis(39)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(1)), 1);
    }

    #[test]
    fn test_large_tick_crosses_many() {
        let mut scheduler = FrameScheduler::new(60.0);
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 60);
    }

    #[test]
    fn test_reset_drops_accumulated_time() {
        let mut scheduler = FrameScheduler::new(25.0);
        scheduler.advance(Duration::from_millis(39));
        scheduler.reset();
        assert_eq!(scheduler.advance(Duration::from_millis(39)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(1)), 1);
    }

    #[test]
    fn test_image_bypass() {
        let mut scheduler = FrameScheduler::for_image();
        assert!(scheduler.is_bypassed());
        assert_eq!(scheduler.advance(Duration::from_secs(10)), 0);
    }

    #[quickcheck]
    fn prop_partition_does_not_drift(ticks: Vec<u32>, fps_index: u8) -> bool {
        let rates = [23.976, 24.0, 25.0, 29.97, 30.0, 50.0, 59.94, 60.0, 7.5, 120.0];
        let fps = rates[fps_index as usize % rates.len()];

        let mut scheduler = FrameScheduler::new(fps);
        let mut total = Duration::ZERO;
        let mut crossings = 0u64;
        for tick in ticks {
            let step = Duration::from_micros(tick as u64 % 200_000);
            total += step;
            crossings += scheduler.advance(step);
        }

        crossings == FrameScheduler::new(fps).frames_in(total)
    }

    #[quickcheck]
    fn prop_single_tick_matches_split(micros: u32, split: u32, fps_index: u8) -> bool {
        let rates = [24.0, 25.0, 29.97, 30.0, 60.0];
        let fps = rates[fps_index as usize % rates.len()];
        let total = Duration::from_micros(micros as u64);
        let first = Duration::from_micros(split as u64 % (micros as u64 + 1));

        let mut whole = FrameScheduler::new(fps);
        let mut parts = FrameScheduler::new(fps);
        whole.advance(total) == parts.advance(first) + parts.advance(total - first)
    }
}
