//! # Decoding backends
//!
//! A [`DecodingBackend`] demuxes and decodes a source on demand. The playback
//! core only ever asks it for metadata, coarse seeks and "the next packet";
//! container parsing and codec work stay behind this trait.
//!
//! [`SyntheticBackend`] is an in-memory implementation that generates frames
//! procedurally. It backs the crate's tests and demos, and is a convenient
//! stand-in while wiring a real decoder.

use crate::av::{DecodedPacket, MediaDescriptor};
use crate::Result;

mod synthetic;
pub use synthetic::{SyntheticBackend, SyntheticMedia};

/// Where a backend seek should land.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Absolute frame index.
    Frame(u64),
    /// Absolute time in milliseconds.
    TimeMs(f64),
}

/// Outcome of a [`DecodingBackend::decode_next`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// A packet was decoded.
    Packet(DecodedPacket),
    /// No more packets in the source.
    EndOfStream,
}

/// Demuxing and decoding capability consumed by a playback session.
///
/// Implementations are driven from one thread at a time; the session
/// serializes every call behind its lock.
pub trait DecodingBackend: Send {
    /// Opens `name` and describes its streams.
    ///
    /// Fails with `NotFound`, `UnsupportedCodec` or `Corrupt`.
    fn open_source(&mut self, name: &str) -> Result<MediaDescriptor>;

    /// Repositions so the next packet is the keyframe at or before `target`.
    ///
    /// Fails with `Unseekable` when the source cannot be repositioned.
    fn seek(&mut self, target: SeekTarget) -> Result<()>;

    /// Decodes the next packet.
    ///
    /// A `DecodeFailure` error means this packet was consumed and skipped;
    /// the following call continues with the next packet.
    fn decode_next(&mut self) -> Result<DecodeOutcome>;

    /// Releases the source. Safe to call when nothing is open.
    fn close(&mut self);
}

impl<B: DecodingBackend + ?Sized> DecodingBackend for Box<B> {
    fn open_source(&mut self, name: &str) -> Result<MediaDescriptor> {
        (**self).open_source(name)
    }

    fn seek(&mut self, target: SeekTarget) -> Result<()> {
        (**self).seek(target)
    }

    fn decode_next(&mut self) -> Result<DecodeOutcome> {
        (**self).decode_next()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
