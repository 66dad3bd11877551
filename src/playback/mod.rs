//! # Playback
//!
//! The playback core: a [`PlaybackSession`] state machine driven by repeated
//! [`PlaybackSession::update`] calls, built from small components that can be
//! exercised on their own:
//!
//! - [`Clock`]: scaled real time elapsed between ticks
//! - [`FrameScheduler`]: converts elapsed time into frame-boundary crossings
//! - [`SeekController`]: frame/time/position seeks with keyframe settling
//! - [`LoopController`]: what happens when the cursor steps past a cue bound
//!
//! ```rust
//! use std::time::Duration;
//! use vdkplay::backend::{SyntheticBackend, SyntheticMedia};
//! use vdkplay::playback::{ManualTime, PlaybackSession, PlaybackState};
//! use vdkplay::PlayerConfig;
//!
//! # fn main() -> vdkplay::Result<()> {
//! vdkplay::init()?;
//! let backend = SyntheticBackend::new().with_media("clip", SyntheticMedia::video(25.0, 100));
//! let time = ManualTime::new();
//! let session = PlaybackSession::with_time_source(
//!     Box::new(backend),
//!     PlayerConfig::default(),
//!     time.clone(),
//! );
//! session.open("clip")?;
//! session.play()?;
//! time.advance(Duration::from_millis(80));
//! session.update()?;
//! assert_eq!(session.current_frame_number(), 2);
//! assert_eq!(session.state(), Some(PlaybackState::Playing));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::PlayerError;

mod clock;
mod decode;
mod looping;
mod scheduler;
mod seek;
mod session;
mod stream;
mod worker;

pub use clock::{Clock, Elapsed, ManualTime, MonotonicTime, TimeSource, TokioTime};
pub use looping::{LoopController, LoopVerdict};
pub use scheduler::FrameScheduler;
pub use seek::{SeekController, SeekRequest};
pub use session::{AvData, EventHandler, PlaybackSession};
pub use stream::FrameSnapshot;

/// Lifecycle state of an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Media opened, playback not started yet.
    Opened,
    /// Time advances on every update.
    Playing,
    /// Time is frozen; position and frame buffers are kept.
    Paused,
    /// Cursor rewound to cue-in.
    Stopped,
    /// A cue bound was reached with looping disabled.
    Eof,
    /// Open or decode failed; only a new `open` leaves this state.
    Error,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Opened => "opened",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Eof => "eof",
            PlaybackState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Direction of travel. Kept apart from the speed multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Increasing frame numbers.
    #[default]
    Forward,
    /// Decreasing frame numbers.
    Backward,
}

impl Direction {
    /// `1` for forward, `-1` for backward.
    pub fn signum(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl FromStr for Direction {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "fwd" | "1" => Ok(Direction::Forward),
            "backward" | "reverse" | "bwd" | "-1" => Ok(Direction::Backward),
            other => Err(PlayerError::Config(format!("unknown direction '{}'", other))),
        }
    }
}

/// Behavior at cue boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoopMode {
    /// Stop at the bound and enter [`PlaybackState::Eof`].
    None,
    /// Wrap to the opposite bound.
    #[default]
    Loop,
    /// Reverse direction at each bound.
    Bidi,
}

impl FromStr for LoopMode {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "once" | "noloop" => Ok(LoopMode::None),
            "loop" => Ok(LoopMode::Loop),
            "bidi" | "pingpong" => Ok(LoopMode::Bidi),
            other => Err(PlayerError::Config(format!("unknown loop mode '{}'", other))),
        }
    }
}

/// Sub-range of the media that playback and looping operate on.
///
/// Frame numbers are absolute here; the cursor counts relative to `cue_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CueRange {
    /// First playable frame (absolute).
    pub cue_in: u64,
    /// Last playable frame (absolute).
    pub cue_out: u64,
}

impl CueRange {
    /// Covers every frame of a media with `total_frames` frames.
    pub fn full(total_frames: u64) -> Self {
        Self {
            cue_in: 0,
            cue_out: total_frames.saturating_sub(1),
        }
    }

    /// Validated range: `cue_in < cue_out <= total_frames - 1`.
    pub fn new(cue_in: u64, cue_out: u64, total_frames: u64) -> crate::Result<Self> {
        if cue_in >= cue_out || cue_out >= total_frames {
            return Err(PlayerError::InvalidCueRange { cue_in, cue_out });
        }
        Ok(Self { cue_in, cue_out })
    }

    /// Largest relative frame number, `cue_out - cue_in`.
    pub fn span(&self) -> i64 {
        (self.cue_out - self.cue_in) as i64
    }

    /// Number of frames inside the range, bounds included.
    pub fn frame_count(&self) -> u64 {
        self.cue_out - self.cue_in + 1
    }

    /// Clamps a relative frame number into `[0, span]`.
    pub fn clamp(&self, relative: i64) -> i64 {
        relative.clamp(0, self.span())
    }

    /// Converts a relative frame number into an absolute one.
    pub fn to_absolute(&self, relative: i64) -> u64 {
        self.cue_in + self.clamp(relative) as u64
    }

    /// Converts an absolute frame number into a relative one (may be out of range).
    pub fn to_relative(&self, absolute: u64) -> i64 {
        absolute as i64 - self.cue_in as i64
    }
}

/// Mutable playback position and transport settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackCursor {
    /// Current frame, relative to cue-in.
    pub frame: i64,
    /// Current time in milliseconds, relative to cue-in.
    pub time_ms: f64,
    /// Direction of travel.
    pub direction: Direction,
    /// Speed multiplier, always > 0.
    pub speed: f32,
    /// Behavior at cue bounds.
    pub loop_mode: LoopMode,
}

impl Default for PlaybackCursor {
    fn default() -> Self {
        Self {
            frame: 0,
            time_ms: 0.0,
            direction: Direction::Forward,
            speed: 1.0,
            loop_mode: LoopMode::default(),
        }
    }
}

impl PlaybackCursor {
    /// Moves to `frame` and derives the matching time.
    pub fn set_frame(&mut self, frame: i64, frame_duration_ms: f64) {
        self.frame = frame;
        self.time_ms = frame as f64 * frame_duration_ms;
    }
}

/// Notifications emitted by a session after its lock has been released.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// The session moved between states.
    StateChanged {
        /// Previous state, `None` when nothing was open.
        from: Option<PlaybackState>,
        /// New state.
        to: PlaybackState,
    },
    /// A freshly decoded frame is available.
    NewFrame {
        /// Cursor frame (relative to cue-in).
        frame: i64,
    },
    /// Loop mode wrapped the cursor to the opposite bound.
    Wrapped {
        /// Frame the cursor wrapped to (relative).
        to_frame: i64,
    },
    /// Bidi loop mode reversed the direction.
    Reversed {
        /// New direction.
        direction: Direction,
    },
    /// A failure moved the session into [`PlaybackState::Error`].
    Failed {
        /// Rendered error.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_range_full() {
        let cue = CueRange::full(100);
        assert_eq!(cue.cue_in, 0);
        assert_eq!(cue.cue_out, 99);
        assert_eq!(cue.span(), 99);
        assert_eq!(cue.frame_count(), 100);
    }

    #[test]
    fn test_cue_range_validation() {
        assert!(CueRange::new(10, 50, 100).is_ok());
        assert!(CueRange::new(50, 50, 100).is_err());
        assert!(CueRange::new(60, 50, 100).is_err());
        assert!(CueRange::new(10, 100, 100).is_err());
    }

    #[test]
    fn test_cue_range_conversions() {
        let cue = CueRange::new(10, 50, 100).unwrap();
        assert_eq!(cue.to_absolute(0), 10);
        assert_eq!(cue.to_absolute(-5), 10);
        assert_eq!(cue.to_absolute(100), 50);
        assert_eq!(cue.to_relative(12), 2);
        assert_eq!(cue.to_relative(3), -7);
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("Backward".parse::<Direction>().unwrap(), Direction::Backward);
        assert_eq!("bidi".parse::<LoopMode>().unwrap(), LoopMode::Bidi);
        assert_eq!("none".parse::<LoopMode>().unwrap(), LoopMode::None);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_direction_helpers() {
        assert_eq!(Direction::Forward.signum(), 1);
        assert_eq!(Direction::Backward.signum(), -1);
        assert_eq!(Direction::Forward.reversed(), Direction::Backward);
    }
}
