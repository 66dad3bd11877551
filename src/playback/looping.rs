use super::{Direction, LoopMode};

/// What to do when the cursor would step past a cue bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopVerdict {
    /// Stay at the bound and enter `Eof`.
    Stop,
    /// Jump to the opposite bound, keeping the direction.
    Wrap {
        /// Bound to seek to (relative).
        frame: i64,
    },
    /// Stay at the bound and travel the other way.
    Reverse {
        /// Direction after the reversal.
        direction: Direction,
    },
}

/// Decides boundary behavior from the loop mode in effect at the crossing.
///
/// Mode changes apply at the next crossing; nothing already decided is revisited.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopController;

impl LoopController {
    /// Creates a controller.
    pub fn new() -> Self {
        Self
    }

    /// Verdict for stepping past the bound ahead of `direction` in a range of `[0, span]`.
    pub fn on_boundary(&self, mode: LoopMode, direction: Direction, span: i64) -> LoopVerdict {
        match mode {
            LoopMode::None => LoopVerdict::Stop,
            LoopMode::Loop => LoopVerdict::Wrap {
                frame: match direction {
                    Direction::Forward => 0,
                    Direction::Backward => span,
                },
            },
            LoopMode::Bidi => LoopVerdict::Reverse {
                direction: direction.reversed(),
            },
        }
    }

    /// Steps after which the cursor is back where it started, with the same
    /// direction. Each boundary crossing counts as one step.
    ///
    /// `None` for modes that do not repeat.
    pub fn lap_len(&self, mode: LoopMode, span: i64) -> Option<u64> {
        let frames = span.max(0) as u64 + 1;
        match mode {
            LoopMode::None => None,
            LoopMode::Loop => Some(frames),
            LoopMode::Bidi => Some(2 * frames),
        }
    }

    /// Drops whole laps from `steps`, keeping one so every boundary
    /// behavior is still exercised at least once.
    pub fn fold_laps(&self, mode: LoopMode, span: i64, steps: u64) -> u64 {
        match self.lap_len(mode, span) {
            Some(lap) if steps > lap => lap + steps % lap,
            _ => steps,
        }
    }
}
