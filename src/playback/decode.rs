use log::warn;

use crate::av::{AudioFrame, MediaDescriptor, VideoFrame};
use crate::backend::{DecodeOutcome, DecodingBackend};
use crate::{PlayerError, Result};

/// Result of pulling one frame out of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pulled {
    /// A frame with this absolute index now sits in the buffers.
    Frame(u64),
    /// The backend has no more packets.
    EndOfStream,
}

/// Latest-wins frame buffers plus the bookkeeping needed to decode into them.
#[derive(Debug, Default)]
pub(crate) struct FrameDecoder {
    video: Option<VideoFrame>,
    audio: Option<AudioFrame>,
    new_frame: bool,
    /// Absolute index of the last decoded frame while the backend is
    /// positioned right after it.
    position: Option<u64>,
    last_frame: Option<u64>,
    consecutive_failures: u32,
    max_failures: u32,
}

impl FrameDecoder {
    pub(crate) fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            ..Default::default()
        }
    }

    /// Decodes packets until one carries a frame of the primary stream.
    ///
    /// Corrupt packets are skipped until more than `max_failures` occur in a row.
    pub(crate) fn pull<B: DecodingBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        desc: &MediaDescriptor,
    ) -> Result<Pulled> {
        loop {
            match backend.decode_next() {
                Ok(DecodeOutcome::Packet(packet)) => {
                    self.consecutive_failures = 0;
                    let primary = if desc.has_video() {
                        packet.video.is_some()
                    } else {
                        packet.audio.is_some()
                    };
                    if let Some(audio) = packet.audio {
                        self.audio = Some(audio);
                    }
                    if let Some(video) = packet.video {
                        self.video = Some(video);
                    }
                    if !primary {
                        continue;
                    }

                    let index = desc.frame_at_pts(packet.pts).max(0) as u64;
                    self.position = Some(index);
                    self.last_frame = Some(index);
                    self.new_frame = true;
                    return Ok(Pulled::Frame(index));
                }
                Ok(DecodeOutcome::EndOfStream) => {
                    self.position = None;
                    return Ok(Pulled::EndOfStream);
                }
                Err(PlayerError::DecodeFailure(msg)) => {
                    self.position = None;
                    self.consecutive_failures += 1;
                    if self.consecutive_failures > self.max_failures {
                        return Err(PlayerError::DecodeFailure(format!(
                            "{} consecutive failures, last: {}",
                            self.consecutive_failures, msg
                        )));
                    }
                    warn!("skipping corrupt packet: {}", msg);
                }
                Err(e) => {
                    self.position = None;
                    return Err(e);
                }
            }
        }
    }

    /// Index of the last decoded frame if the backend continues right after it.
    pub(crate) fn position(&self) -> Option<u64> {
        self.position
    }

    /// Index of the most recently decoded frame.
    pub(crate) fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Forgets the backend position, e.g. after a backend seek.
    pub(crate) fn invalidate(&mut self) {
        self.position = None;
    }

    /// Reports and clears the new-frame flag.
    pub(crate) fn take_new_frame(&mut self) -> bool {
        std::mem::take(&mut self.new_frame)
    }

    pub(crate) fn video(&self) -> Option<&VideoFrame> {
        self.video.as_ref()
    }

    pub(crate) fn audio(&self) -> Option<&AudioFrame> {
        self.audio.as_ref()
    }

    /// Drops the buffers and all bookkeeping.
    pub(crate) fn release(&mut self) {
        *self = Self::new(self.max_failures);
    }
}
