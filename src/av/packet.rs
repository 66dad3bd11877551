use super::{AudioFrame, VideoFrame};

/// Result of decoding one packet: zero or one frame per stream plus timestamps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedPacket {
    /// Decoded picture, if the packet belonged to the video stream
    pub video: Option<VideoFrame>,
    /// Decoded samples, if the packet belonged to the audio stream
    pub audio: Option<AudioFrame>,
    /// Presentation timestamp in microseconds
    pub pts: i64,
    /// Decode timestamp in microseconds
    pub dts: i64,
}

impl DecodedPacket {
    /// Creates an empty packet at `pts`.
    pub fn new(pts: i64) -> Self {
        Self {
            video: None,
            audio: None,
            pts,
            dts: pts,
        }
    }

    /// Attaches a decoded picture.
    pub fn with_video(mut self, frame: VideoFrame) -> Self {
        self.video = Some(frame);
        self
    }

    /// Attaches a decoded block of samples.
    pub fn with_audio(mut self, frame: AudioFrame) -> Self {
        self.audio = Some(frame);
        self
    }

    /// Whether the packet carries any decoded data.
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}
