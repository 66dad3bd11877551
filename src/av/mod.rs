//! Media description and decoded sample types shared by backends and sessions.

use std::fmt;

mod frame;
mod packet;
pub use frame::*;
pub use packet::*;

/// Which streams a source carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    /// Video and audio streams.
    #[default]
    VideoWithAudio,
    /// Video stream only.
    VideoOnly,
    /// Audio stream only.
    AudioOnly,
    /// A single still picture.
    Image,
}

impl ContentType {
    /// Picks the content type from stream presence flags.
    pub fn from_streams(has_video: bool, has_audio: bool, is_image: bool) -> Self {
        match (is_image, has_video, has_audio) {
            (true, _, _) => ContentType::Image,
            (false, true, true) => ContentType::VideoWithAudio,
            (false, true, false) => ContentType::VideoOnly,
            (false, false, _) => ContentType::AudioOnly,
        }
    }

    /// Whether a video (or image) stream is present.
    pub fn has_video(self) -> bool {
        !matches!(self, ContentType::AudioOnly)
    }

    /// Whether an audio stream is present.
    pub fn has_audio(self) -> bool {
        matches!(self, ContentType::VideoWithAudio | ContentType::AudioOnly)
    }

    /// Whether the source is a still image.
    pub fn is_image(self) -> bool {
        matches!(self, ContentType::Image)
    }
}

/// Static properties of an opened source, filled in once by the backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaDescriptor {
    /// Name the source was opened with
    pub file_name: String,
    /// Stream layout
    pub content_type: ContentType,
    /// Total number of frames
    pub duration_frames: u64,
    /// Total duration in milliseconds
    pub duration_ms: f64,
    /// Nominal frame rate
    pub fps: f64,
    /// Bitrate in bits per second
    pub bitrate: u32,
    /// Video codec name, empty without video
    pub video_codec: String,
    /// Audio codec name, empty without audio
    pub audio_codec: String,
    /// Video width in pixels
    pub width: u32,
    /// Video height in pixels
    pub height: u32,
    /// Audio channel count
    pub audio_channels: u16,
    /// Audio sample rate in Hz
    pub audio_sample_rate: u32,
}

impl MediaDescriptor {
    /// Creates a descriptor for `file_name`; fill in the rest with the `with_*` helpers.
    pub fn new(file_name: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            ..Default::default()
        }
    }

    /// Sets frame count and rate, deriving the duration.
    pub fn with_timing(mut self, duration_frames: u64, fps: f64) -> Self {
        self.duration_frames = duration_frames;
        self.fps = fps;
        self.duration_ms = if fps > 0.0 {
            duration_frames as f64 * 1000.0 / fps
        } else {
            0.0
        };
        self
    }

    /// Sets the video stream properties.
    pub fn with_video(mut self, codec: impl Into<String>, width: u32, height: u32) -> Self {
        self.video_codec = codec.into();
        self.width = width;
        self.height = height;
        self
    }

    /// Sets the audio stream properties.
    pub fn with_audio(mut self, codec: impl Into<String>, channels: u16, sample_rate: u32) -> Self {
        self.audio_codec = codec.into();
        self.audio_channels = channels;
        self.audio_sample_rate = sample_rate;
        self
    }

    /// Sets the bitrate.
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Whether a video stream is present.
    pub fn has_video(&self) -> bool {
        self.content_type.has_video()
    }

    /// Whether an audio stream is present.
    pub fn has_audio(&self) -> bool {
        self.content_type.has_audio()
    }

    /// Whether the source is a still image.
    pub fn is_image(&self) -> bool {
        self.content_type.is_image()
    }

    /// Nominal duration of one frame in milliseconds, `0.0` if the rate is unknown.
    pub fn frame_duration_ms(&self) -> f64 {
        if self.fps > 0.0 {
            1000.0 / self.fps
        } else {
            0.0
        }
    }

    /// Absolute frame index for a timestamp in microseconds.
    pub fn frame_at_pts(&self, pts_us: i64) -> i64 {
        (pts_us as f64 * self.fps / 1_000_000.0).round() as i64
    }

    /// Timestamp in microseconds of an absolute frame index.
    pub fn pts_of_frame(&self, frame: u64) -> i64 {
        if self.fps > 0.0 {
            (frame as f64 * 1_000_000.0 / self.fps).round() as i64
        } else {
            0
        }
    }
}

impl fmt::Display for MediaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "file:        {}", self.file_name)?;
        writeln!(f, "content:     {:?}", self.content_type)?;
        writeln!(
            f,
            "duration:    {} frames, {:.3} ms",
            self.duration_frames, self.duration_ms
        )?;
        writeln!(f, "fps:         {:.3}", self.fps)?;
        writeln!(f, "bitrate:     {}", self.bitrate)?;
        if self.has_video() {
            writeln!(
                f,
                "video:       {} {}x{}",
                self.video_codec, self.width, self.height
            )?;
        }
        if self.has_audio() {
            writeln!(
                f,
                "audio:       {} {} ch @ {} Hz",
                self.audio_codec, self.audio_channels, self.audio_sample_rate
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_flags() {
        assert_eq!(ContentType::from_streams(true, true, false), ContentType::VideoWithAudio);
        assert_eq!(ContentType::from_streams(true, false, false), ContentType::VideoOnly);
        assert_eq!(ContentType::from_streams(false, true, false), ContentType::AudioOnly);
        assert_eq!(ContentType::from_streams(true, false, true), ContentType::Image);
        assert!(ContentType::Image.has_video());
        assert!(!ContentType::Image.has_audio());
        assert!(!ContentType::AudioOnly.has_video());
    }

    #[test]
    fn test_descriptor_timing() {
        let desc = MediaDescriptor::new("clip", ContentType::VideoOnly).with_timing(250, 25.0);
        assert_eq!(desc.duration_ms, 10_000.0);
        assert_eq!(desc.frame_duration_ms(), 40.0);
        assert_eq!(desc.pts_of_frame(3), 120_000);
        assert_eq!(desc.frame_at_pts(120_000), 3);
    }

    #[test]
    fn test_pts_frame_mapping_ntsc() {
        let desc = MediaDescriptor::new("ntsc", ContentType::VideoOnly).with_timing(1000, 30000.0 / 1001.0);
        for frame in [0u64, 1, 29, 30, 999] {
            assert_eq!(desc.frame_at_pts(desc.pts_of_frame(frame)), frame as i64);
        }
    }

    #[test]
    fn test_display_lists_streams() {
        let desc = MediaDescriptor::new("clip", ContentType::VideoWithAudio)
            .with_timing(10, 10.0)
            .with_video("h264", 640, 360)
            .with_audio("aac", 2, 48000);
        let text = desc.to_string();
        assert!(text.contains("h264 640x360"));
        assert!(text.contains("aac 2 ch @ 48000 Hz"));
    }
}
