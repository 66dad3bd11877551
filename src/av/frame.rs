use bytes::Bytes;

/// Latest decoded picture of the video stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoFrame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Interleaved channels per pixel
    pub channels: u8,
    /// Presentation timestamp in microseconds
    pub pts: i64,
    /// Decode timestamp in microseconds
    pub dts: i64,
    /// Pixel data
    pub data: Bytes,
}

impl VideoFrame {
    /// Creates a frame from raw pixel data.
    pub fn new(width: u32, height: u32, channels: u8, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            channels,
            pts: 0,
            dts: 0,
            data: data.into(),
        }
    }

    /// Sets presentation and decode timestamps.
    pub fn with_timestamps(mut self, pts: i64, dts: i64) -> Self {
        self.pts = pts;
        self.dts = dts;
        self
    }
}

/// Latest decoded block of audio samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioFrame {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Samples per channel in this block
    pub samples_count: u32,
    /// Presentation timestamp in microseconds
    pub pts: i64,
    /// Decode timestamp in microseconds
    pub dts: i64,
    /// Interleaved sample data
    pub data: Bytes,
}

impl AudioFrame {
    /// Creates a frame from interleaved samples.
    pub fn new(sample_rate: u32, channels: u16, samples_count: u32, data: impl Into<Bytes>) -> Self {
        Self {
            sample_rate,
            channels,
            samples_count,
            pts: 0,
            dts: 0,
            data: data.into(),
        }
    }

    /// Sets presentation and decode timestamps.
    pub fn with_timestamps(mut self, pts: i64, dts: i64) -> Self {
        self.pts = pts;
        self.dts = dts;
        self
    }

    /// Size of the sample data in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
    }
}
