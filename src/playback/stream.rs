use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream};
use log::warn;
use tokio::time::{self, Interval, MissedTickBehavior};

use super::{PlaybackSession, PlaybackState};
use crate::av::{AudioFrame, VideoFrame};

/// A decoded frame together with the cursor position it was decoded for.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    /// Cursor frame, relative to cue-in
    pub frame_number: i64,
    /// Cursor time in milliseconds, relative to cue-in
    pub time_ms: f64,
    /// Latest video frame
    pub video: Option<VideoFrame>,
    /// Latest audio frame
    pub audio: Option<AudioFrame>,
}

impl FrameSnapshot {
    /// Pixel data of the video frame, if any.
    pub fn video_data(&self) -> Option<&Bytes> {
        self.video.as_ref().map(|v| &v.data)
    }
}

impl PlaybackSession {
    /// Drives the session from a tokio interval and yields every new frame.
    ///
    /// Each tick calls [`update`](Self::update) and, if a frame was decoded
    /// since the previous tick, yields a snapshot of it. The stream ends once
    /// the session is no longer `Opened`, `Playing` or `Paused`, after
    /// yielding any frame decoded on the final tick.
    ///
    /// Must be polled inside a tokio runtime.
    pub fn frame_stream(&self, period: Duration) -> impl Stream<Item = FrameSnapshot> + Send + 'static {
        let session = self.clone();
        let ticker: Option<Interval> = None;
        stream::unfold((session, ticker, false), move |(session, mut ticker, done)| async move {
            if done {
                return None;
            }
            loop {
                let live = matches!(
                    session.state(),
                    Some(PlaybackState::Opened | PlaybackState::Playing | PlaybackState::Paused)
                );
                if !live {
                    return session
                        .take_snapshot()
                        .map(|snapshot| (snapshot, (session, ticker, true)));
                }

                let interval = ticker.get_or_insert_with(|| {
                    let mut interval = time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    interval
                });
                interval.tick().await;
                if let Err(e) = session.update() {
                    warn!("frame stream update failed: {}", e);
                }
                if let Some(snapshot) = session.take_snapshot() {
                    return Some((snapshot, (session, ticker, false)));
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SyntheticBackend, SyntheticMedia};
    use crate::playback::{LoopMode, TokioTime};
    use crate::{runtime, PlayerConfig};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn test_stream_yields_every_frame_until_eof() {
        runtime::init().unwrap();
        let backend = SyntheticBackend::new().with_media("clip", SyntheticMedia::video(25.0, 10));
        let config = PlayerConfig::default().with_loop_mode(LoopMode::None);
        let session = PlaybackSession::with_time_source(Box::new(backend), config, TokioTime::new());
        session.open("clip").unwrap();
        session.play().unwrap();

        let frames: Vec<i64> = session
            .frame_stream(Duration::from_millis(10))
            .map(|snapshot| snapshot.frame_number)
            .collect()
            .await;

        assert_eq!(frames, (0..10).collect::<Vec<_>>());
        assert_eq!(session.state(), Some(PlaybackState::Eof));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_ends_when_update_fails() {
        runtime::init().unwrap();
        let media = SyntheticMedia::video(25.0, 30).with_corrupt_frames(2..20);
        let backend = SyntheticBackend::new().with_media("clip", media);
        let config = PlayerConfig::default()
            .with_loop_mode(LoopMode::None)
            .with_max_decode_failures(3);
        let session = PlaybackSession::with_time_source(Box::new(backend), config, TokioTime::new());
        session.open("clip").unwrap();
        session.play().unwrap();

        let frames: Vec<i64> = session
            .frame_stream(Duration::from_millis(10))
            .map(|snapshot| snapshot.frame_number)
            .collect()
            .await;

        assert_eq!(frames, vec![0, 1]);
        assert_eq!(session.state(), Some(PlaybackState::Error));
    }

    #[test]
    fn test_closed_session_yields_nothing() {
        let backend = SyntheticBackend::new();
        let session = PlaybackSession::new(Box::new(backend), PlayerConfig::default());
        let frames: Vec<FrameSnapshot> = tokio_test::block_on(async {
            session.frame_stream(Duration::from_millis(1)).collect().await
        });
        assert!(frames.is_empty());
    }
}
