use std::collections::{BTreeSet, HashMap};

use bytes::{BufMut, BytesMut};
use log::debug;

use super::{DecodeOutcome, DecodingBackend, SeekTarget};
use crate::av::{AudioFrame, ContentType, DecodedPacket, MediaDescriptor, VideoFrame};
use crate::{PlayerError, Result};

/// Definition of a procedurally generated source.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticMedia {
    /// Nominal frame rate
    pub fps: f64,
    /// Number of frames
    pub frames: u64,
    /// Picture width
    pub width: u32,
    /// Picture height
    pub height: u32,
    /// Distance between keyframes, at least 1
    pub keyframe_interval: u64,
    /// Stream layout
    pub content_type: ContentType,
    /// Video codec name reported in the descriptor
    pub video_codec: String,
    /// Audio codec name reported in the descriptor
    pub audio_codec: String,
    /// Audio channels
    pub audio_channels: u16,
    /// Audio sample rate
    pub audio_sample_rate: u32,
    /// Frames whose packets fail to decode
    pub corrupt_frames: BTreeSet<u64>,
    /// Reject every seek
    pub unseekable: bool,
}

impl SyntheticMedia {
    /// Video-only source with keyframes every 10 frames.
    pub fn video(fps: f64, frames: u64) -> Self {
        Self {
            fps,
            frames,
            width: 4,
            height: 4,
            keyframe_interval: 10,
            content_type: ContentType::VideoOnly,
            video_codec: "synthetic-video".to_string(),
            audio_codec: String::new(),
            audio_channels: 0,
            audio_sample_rate: 0,
            corrupt_frames: BTreeSet::new(),
            unseekable: false,
        }
    }

    /// Video with a stereo 48 kHz audio track.
    pub fn video_with_audio(fps: f64, frames: u64) -> Self {
        Self {
            content_type: ContentType::VideoWithAudio,
            audio_codec: "synthetic-pcm".to_string(),
            audio_channels: 2,
            audio_sample_rate: 48_000,
            ..Self::video(fps, frames)
        }
    }

    /// Audio-only source; every packet is one block of samples.
    pub fn audio(blocks_per_second: f64, blocks: u64) -> Self {
        Self {
            content_type: ContentType::AudioOnly,
            video_codec: String::new(),
            width: 0,
            height: 0,
            keyframe_interval: 1,
            ..Self::video_with_audio(blocks_per_second, blocks)
        }
    }

    /// A single still picture.
    pub fn image(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            keyframe_interval: 1,
            content_type: ContentType::Image,
            video_codec: "synthetic-image".to_string(),
            ..Self::video(1.0, 1)
        }
    }

    /// Sets the keyframe interval.
    pub fn with_keyframe_interval(mut self, interval: u64) -> Self {
        self.keyframe_interval = interval.max(1);
        self
    }

    /// Marks frames whose packets fail to decode.
    pub fn with_corrupt_frames(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.corrupt_frames.extend(frames);
        self
    }

    /// Makes every seek fail.
    pub fn unseekable(mut self) -> Self {
        self.unseekable = true;
        self
    }

    fn descriptor(&self, name: &str) -> MediaDescriptor {
        let mut desc = MediaDescriptor::new(name, self.content_type).with_timing(self.frames, self.fps);
        if self.content_type.has_video() {
            desc = desc.with_video(self.video_codec.clone(), self.width, self.height);
        }
        if self.content_type.has_audio() {
            desc = desc.with_audio(
                self.audio_codec.clone(),
                self.audio_channels,
                self.audio_sample_rate,
            );
        }
        let frame_bits = (self.width * self.height * 3 * 8) as f64;
        desc.with_bitrate((frame_bits * self.fps) as u32)
    }
}

#[derive(Debug)]
struct OpenSource {
    name: String,
    media: SyntheticMedia,
    descriptor: MediaDescriptor,
    next_frame: u64,
}

/// In-memory [`DecodingBackend`] serving [`SyntheticMedia`] by name.
///
/// Every video frame stores its absolute index as a little-endian `u64` in
/// the first eight bytes of its pixel data, so consumers can check exactly
/// which frame they were handed.
#[derive(Debug, Default)]
pub struct SyntheticBackend {
    library: HashMap<String, SyntheticMedia>,
    open: Option<OpenSource>,
    seeks: u64,
    decodes: u64,
}

impl SyntheticBackend {
    /// Creates a backend with no media.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `media` under `name`.
    pub fn with_media(mut self, name: &str, media: SyntheticMedia) -> Self {
        self.library.insert(name.to_string(), media);
        self
    }

    /// Number of seeks issued since creation.
    pub fn seek_count(&self) -> u64 {
        self.seeks
    }

    /// Number of decode calls since creation.
    pub fn decode_count(&self) -> u64 {
        self.decodes
    }

    /// Reads back the frame index stamped into a synthetic video frame.
    pub fn frame_index(frame: &VideoFrame) -> Option<u64> {
        let bytes: [u8; 8] = frame.data.get(..8)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    fn render(source: &OpenSource, index: u64) -> DecodedPacket {
        let media = &source.media;
        let pts = source.descriptor.pts_of_frame(index);
        let mut packet = DecodedPacket::new(pts);

        if media.content_type.has_video() {
            let size = (media.width as usize * media.height as usize * 3).max(8);
            let mut data = BytesMut::with_capacity(size);
            data.put_u64_le(index);
            data.resize(size, (index % 251) as u8);
            packet = packet.with_video(
                VideoFrame::new(media.width, media.height, 3, data.freeze()).with_timestamps(pts, pts),
            );
        }

        if media.content_type.has_audio() {
            let samples = if media.fps > 0.0 {
                (media.audio_sample_rate as f64 / media.fps).round() as u32
            } else {
                0
            };
            let len = samples as usize * media.audio_channels as usize * 2;
            let mut data = BytesMut::with_capacity(len);
            data.resize(len, (index % 256) as u8);
            packet = packet.with_audio(
                AudioFrame::new(media.audio_sample_rate, media.audio_channels, samples, data.freeze())
                    .with_timestamps(pts, pts),
            );
        }

        packet
    }
}

impl DecodingBackend for SyntheticBackend {
    fn open_source(&mut self, name: &str) -> Result<MediaDescriptor> {
        self.open = None;
        let media = self
            .library
            .get(name)
            .cloned()
            .ok_or_else(|| PlayerError::NotFound(name.to_string()))?;

        if media.frames == 0 {
            return Err(PlayerError::Corrupt(format!("{} has no frames", name)));
        }
        if !(media.fps.is_finite() && media.fps > 0.0) {
            return Err(PlayerError::UnsupportedCodec(format!(
                "{} has invalid frame rate {}",
                name, media.fps
            )));
        }

        let descriptor = media.descriptor(name);
        debug!("synthetic source {} opened: {} frames", name, media.frames);
        self.open = Some(OpenSource {
            name: name.to_string(),
            media,
            descriptor: descriptor.clone(),
            next_frame: 0,
        });
        Ok(descriptor)
    }

    fn seek(&mut self, target: SeekTarget) -> Result<()> {
        let source = self
            .open
            .as_mut()
            .ok_or_else(|| PlayerError::InvalidState("no source open".into()))?;
        if source.media.unseekable {
            return Err(PlayerError::Unseekable(source.name.clone()));
        }

        let frame = match target {
            SeekTarget::Frame(frame) => frame,
            SeekTarget::TimeMs(ms) => (ms.max(0.0) * source.media.fps / 1000.0).floor() as u64,
        };
        let frame = frame.min(source.media.frames - 1);
        let interval = source.media.keyframe_interval.max(1);
        source.next_frame = frame - frame % interval;
        self.seeks += 1;
        Ok(())
    }

    fn decode_next(&mut self) -> Result<DecodeOutcome> {
        let source = self
            .open
            .as_mut()
            .ok_or_else(|| PlayerError::InvalidState("no source open".into()))?;
        self.decodes += 1;

        let index = source.next_frame;
        if index >= source.media.frames {
            return Ok(DecodeOutcome::EndOfStream);
        }
        source.next_frame += 1;

        if source.media.corrupt_frames.contains(&index) {
            return Err(PlayerError::DecodeFailure(format!(
                "{}: corrupt packet at frame {}",
                source.name, index
            )));
        }

        Ok(DecodeOutcome::Packet(Self::render(source, index)))
    }

    fn close(&mut self) {
        if let Some(source) = self.open.take() {
            debug!("synthetic source {} closed", source.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_index(backend: &mut SyntheticBackend) -> Option<u64> {
        match backend.decode_next().unwrap() {
            DecodeOutcome::Packet(packet) => packet.video.as_ref().and_then(SyntheticBackend::frame_index),
            DecodeOutcome::EndOfStream => None,
        }
    }

    #[test]
    fn test_open_unknown_source() {
        let mut backend = SyntheticBackend::new();
        let err = backend.open_source("missing").unwrap_err();
        assert!(matches!(err, PlayerError::NotFound(_)));
    }

    #[test]
    fn test_open_empty_source_is_corrupt() {
        let mut backend = SyntheticBackend::new().with_media("empty", SyntheticMedia::video(25.0, 0));
        assert!(matches!(backend.open_source("empty"), Err(PlayerError::Corrupt(_))));
    }

    #[test]
    fn test_sequential_decode_until_end() {
        let mut backend = SyntheticBackend::new().with_media("clip", SyntheticMedia::video(25.0, 3));
        let desc = backend.open_source("clip").unwrap();
        assert_eq!(desc.duration_frames, 3);
        assert_eq!(desc.duration_ms, 120.0);

        assert_eq!(decode_index(&mut backend), Some(0));
        assert_eq!(decode_index(&mut backend), Some(1));
        assert_eq!(decode_index(&mut backend), Some(2));
        assert_eq!(decode_index(&mut backend), None);
    }

    #[test]
    fn test_seek_lands_on_keyframe() {
        let media = SyntheticMedia::video(25.0, 100).with_keyframe_interval(12);
        let mut backend = SyntheticBackend::new().with_media("clip", media);
        backend.open_source("clip").unwrap();

        backend.seek(SeekTarget::Frame(30)).unwrap();
        assert_eq!(decode_index(&mut backend), Some(24));

        backend.seek(SeekTarget::TimeMs(1000.0)).unwrap();
        assert_eq!(decode_index(&mut backend), Some(24));
        assert_eq!(backend.seek_count(), 2);
    }

    #[test]
    fn test_corrupt_packet_is_skipped() {
        let media = SyntheticMedia::video(25.0, 5).with_corrupt_frames([1]);
        let mut backend = SyntheticBackend::new().with_media("clip", media);
        backend.open_source("clip").unwrap();

        assert_eq!(decode_index(&mut backend), Some(0));
        assert!(matches!(backend.decode_next(), Err(PlayerError::DecodeFailure(_))));
        assert_eq!(decode_index(&mut backend), Some(2));
    }

    #[test]
    fn test_unseekable_source() {
        let mut backend =
            SyntheticBackend::new().with_media("live", SyntheticMedia::video(25.0, 50).unseekable());
        backend.open_source("live").unwrap();
        assert!(matches!(backend.seek(SeekTarget::Frame(10)), Err(PlayerError::Unseekable(_))));
    }

    #[test]
    fn test_audio_packets() {
        let mut backend = SyntheticBackend::new().with_media("tone", SyntheticMedia::audio(50.0, 10));
        let desc = backend.open_source("tone").unwrap();
        assert!(desc.has_audio());
        assert!(!desc.has_video());

        match backend.decode_next().unwrap() {
            DecodeOutcome::Packet(packet) => {
                let audio = packet.audio.unwrap();
                assert_eq!(audio.samples_count, 960);
                assert_eq!(audio.size_in_bytes(), 960 * 2 * 2);
                assert!(packet.video.is_none());
            }
            DecodeOutcome::EndOfStream => panic!("expected a packet"),
        }
    }
}
