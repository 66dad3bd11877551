#![doc(html_root_url = "https://docs.rs/vdkplay/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # vdkplay - Rust Media Playback Kit
//!
//! `vdkplay` keeps decoded frames in step with real time. It sits between a
//! demuxing/decoding backend and a renderer, and decides which frame should
//! be on screen at every tick of the caller's loop.
//!
//! ## Features
//!
//! ### Timing
//! - Drift-free frame scheduling with remainder carried across ticks
//! - Speed multiplier and a separate playback direction
//! - Pluggable time sources, including manual and tokio test time
//!
//! ### Navigation
//! - Frame, millisecond and normalized seeks with keyframe settling
//! - Cue ranges restricting playback to a sub-range of the media
//! - Loop modes: play once, wrap around, or ping-pong
//!
//! ### Driving
//! - Caller-driven `update()` from a render loop
//! - Optional background driver thread
//! - Async `Stream` of frames for tokio applications
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! vdkplay = "0.1.0"
//! ```
//!
//! ### Render Loop Example
//!
//! ```rust,no_run
//! use vdkplay::backend::{SyntheticBackend, SyntheticMedia};
//! use vdkplay::{PlaybackSession, PlaybackState, PlayerConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     vdkplay::init()?;
//!
//!     let backend = SyntheticBackend::new()
//!         .with_media("intro", SyntheticMedia::video_with_audio(30.0, 300));
//!     let session = PlaybackSession::new(Box::new(backend), PlayerConfig::default());
//!     session.open("intro")?;
//!     session.play()?;
//!
//!     while session.state() == Some(PlaybackState::Playing) {
//!         session.update()?;
//!         if session.is_new_frame() {
//!             if let Some(frame) = session.video_frame() {
//!                 println!("frame {} ({} bytes)", session.current_frame_number(), frame.data.len());
//!             }
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(5));
//!     }
//!
//!     vdkplay::shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ### Async Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use futures::StreamExt;
//! use vdkplay::backend::{SyntheticBackend, SyntheticMedia};
//! use vdkplay::{LoopMode, PlaybackSession, PlayerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     vdkplay::init()?;
//!     let backend = SyntheticBackend::new().with_media("clip", SyntheticMedia::video(25.0, 50));
//!     let config = PlayerConfig::default().with_loop_mode(LoopMode::None);
//!     let session = PlaybackSession::new(Box::new(backend), config);
//!     session.open("clip")?;
//!     session.play()?;
//!
//!     let mut frames = Box::pin(session.frame_stream(Duration::from_millis(10)));
//!     while let Some(snapshot) = frames.next().await {
//!         println!("frame {} at {:.1} ms", snapshot.frame_number, snapshot.time_ms);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: media descriptors and decoded frame types
//! - `backend`: the decoding backend seam and a synthetic backend
//! - `playback`: the session state machine and its timing components
//! - `config`: session defaults from files and `VDKPLAY_*` variables
//! - `runtime`: process-wide init and shutdown
//! - `error`: error type and taxonomy

/// Media descriptors and decoded frames
pub mod av;

/// Decoding backend abstraction
pub mod backend;

/// Configuration module
pub mod config;

/// Error types and utilities
pub mod error;

pub mod playback;

pub mod runtime;

pub use config::PlayerConfig;
pub use error::{ErrorKind, PlayerError, Result};
pub use playback::{
    CueRange, Direction, FrameSnapshot, LoopMode, PlaybackCursor, PlaybackEvent, PlaybackSession,
    PlaybackState,
};
pub use runtime::{init, shutdown};
