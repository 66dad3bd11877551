use log::debug;

use super::decode::{FrameDecoder, Pulled};
use super::CueRange;
use crate::av::MediaDescriptor;
use crate::backend::{DecodingBackend, SeekTarget};
use crate::Result;

/// The three ways a caller can ask for a new position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekRequest {
    /// Frame number relative to cue-in.
    Frame(i64),
    /// Time in milliseconds relative to cue-in.
    TimeMs(f64),
    /// Normalized position, `0.0` at cue-in and `1.0` at cue-out.
    Position(f32),
}

/// Resolves seek requests to frames and performs seek-then-settle.
#[derive(Debug, Clone)]
pub struct SeekController {
    max_settle_frames: u32,
}

impl SeekController {
    /// `max_settle_frames` bounds how far past the keyframe settling decodes.
    pub fn new(max_settle_frames: u32) -> Self {
        Self { max_settle_frames }
    }

    /// Relative target frame for `request`, clamped into the cue range.
    pub fn target_frame(&self, request: SeekRequest, cue: &CueRange, frame_duration_ms: f64) -> i64 {
        let frame = match request {
            SeekRequest::Frame(frame) => frame,
            SeekRequest::TimeMs(ms) => {
                if frame_duration_ms > 0.0 && ms.is_finite() {
                    (ms / frame_duration_ms).floor() as i64
                } else {
                    0
                }
            }
            SeekRequest::Position(pos) => {
                let pos = if pos.is_nan() { 0.0 } else { pos.clamp(0.0, 1.0) };
                (pos as f64 * cue.span() as f64).round() as i64
            }
        };
        cue.clamp(frame)
    }

    /// Seeks the backend to the keyframe before `absolute` and decodes forward
    /// until a frame at or past it is in the buffers.
    ///
    /// Returns the absolute index of the frame that ended up in the buffers,
    /// `None` if the stream ended first.
    pub(crate) fn seek_and_settle<B: DecodingBackend + ?Sized>(
        &self,
        backend: &mut B,
        desc: &MediaDescriptor,
        decoder: &mut FrameDecoder,
        absolute: u64,
    ) -> Result<Option<u64>> {
        backend.seek(SeekTarget::Frame(absolute))?;
        decoder.invalidate();

        let mut discarded = 0u32;
        loop {
            match decoder.pull(backend, desc)? {
                Pulled::Frame(index) if index >= absolute => {
                    debug!(
                        "settled on frame {} (target {}, {} discarded)",
                        index, absolute, discarded
                    );
                    return Ok(Some(index));
                }
                Pulled::Frame(index) => {
                    discarded += 1;
                    if discarded > self.max_settle_frames {
                        debug!("gave up settling at frame {} (target {})", index, absolute);
                        return Ok(Some(index));
                    }
                }
                Pulled::EndOfStream => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SyntheticBackend, SyntheticMedia};
    use crate::PlayerError;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_frame_request_clamps() {
        let seek = SeekController::new(100);
        let cue = CueRange::new(10, 60, 100).unwrap();
        assert_eq!(seek.target_frame(SeekRequest::Frame(20), &cue, 40.0), 20);
        assert_eq!(seek.target_frame(SeekRequest::Frame(-3), &cue, 40.0), 0);
        assert_eq!(seek.target_frame(SeekRequest::Frame(500), &cue, 40.0), 50);
    }

    #[test]
    fn test_time_request_floors() {
        let seek = SeekController::new(100);
        let cue = CueRange::full(100);
        assert_eq!(seek.target_frame(SeekRequest::TimeMs(119.9), &cue, 40.0), 2);
        assert_eq!(seek.target_frame(SeekRequest::TimeMs(120.0), &cue, 40.0), 3);
        assert_eq!(seek.target_frame(SeekRequest::TimeMs(-50.0), &cue, 40.0), 0);
    }

    #[test]
    fn test_position_request_hits_bounds() {
        let seek = SeekController::new(100);
        let cue = CueRange::new(5, 25, 100).unwrap();
        assert_eq!(seek.target_frame(SeekRequest::Position(0.0), &cue, 40.0), 0);
        assert_eq!(seek.target_frame(SeekRequest::Position(1.0), &cue, 40.0), 20);
        assert_eq!(seek.target_frame(SeekRequest::Position(0.5), &cue, 40.0), 10);
        assert_eq!(seek.target_frame(SeekRequest::Position(7.0), &cue, 40.0), 20);
        assert_eq!(seek.target_frame(SeekRequest::Position(f32::NAN), &cue, 40.0), 0);
    }

    #[test]
    fn test_settle_decodes_from_keyframe() {
        let media = SyntheticMedia::video(25.0, 100).with_keyframe_interval(10);
        let mut backend = SyntheticBackend::new().with_media("clip", media);
        let desc = backend.open_source("clip").unwrap();
        let mut decoder = FrameDecoder::new(4);

        let seek = SeekController::new(100);
        let landed = seek.seek_and_settle(&mut backend, &desc, &mut decoder, 37).unwrap();
        assert_eq!(landed, Some(37));
        assert_eq!(decoder.position(), Some(37));
        let video = decoder.video().unwrap();
        assert_eq!(SyntheticBackend::frame_index(video), Some(37));
        // keyframe 30 up to 37
        assert_eq!(backend.decode_count(), 8);
    }

    #[test]
    fn test_settle_reports_unseekable() {
        let media = SyntheticMedia::video(25.0, 100).unseekable();
        let mut backend = SyntheticBackend::new().with_media("clip", media);
        let desc = backend.open_source("clip").unwrap();
        let mut decoder = FrameDecoder::new(4);

        let err = SeekController::new(100)
            .seek_and_settle(&mut backend, &desc, &mut decoder, 12)
            .unwrap_err();
        assert!(matches!(err, PlayerError::Unseekable(_)));
    }

    #[quickcheck]
    fn prop_frame_target_within_cue(frame: i64, cue_in: u8, len: u8) -> bool {
        let cue_in = cue_in as u64;
        let cue_out = cue_in + len as u64 + 1;
        let cue = CueRange::new(cue_in, cue_out, cue_out + 1).unwrap();
        let target = SeekController::new(10).target_frame(SeekRequest::Frame(frame), &cue, 40.0);
        let expected = frame.clamp(0, cue.span());
        target == expected
    }
}
