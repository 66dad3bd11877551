use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use super::clock::{Clock, MonotonicTime, TimeSource};
use super::decode::{FrameDecoder, Pulled};
use super::looping::{LoopController, LoopVerdict};
use super::scheduler::FrameScheduler;
use super::seek::{SeekController, SeekRequest};
use super::stream::FrameSnapshot;
use super::worker::Worker;
use super::{CueRange, Direction, LoopMode, PlaybackCursor, PlaybackEvent, PlaybackState};
use crate::av::{AudioFrame, MediaDescriptor, VideoFrame};
use crate::backend::DecodingBackend;
use crate::config::PlayerConfig;
use crate::error::ErrorKind;
use crate::{runtime, PlayerError, Result};

/// Forward steps longer than this seek instead of decoding every frame in between.
const SEQUENTIAL_DECODE_LIMIT: i64 = 64;

/// Callback receiving session events. Runs with the session unlocked.
pub type EventHandler = Arc<dyn Fn(&PlaybackEvent) + Send + Sync>;

/// Latest frame of each stream, read together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AvData {
    /// Latest video frame
    pub video: Option<VideoFrame>,
    /// Latest audio frame
    pub audio: Option<AudioFrame>,
}

struct SessionInner {
    backend: Box<dyn DecodingBackend>,
    config: PlayerConfig,
    state: Option<PlaybackState>,
    media: Option<MediaDescriptor>,
    cue: CueRange,
    cursor: PlaybackCursor,
    clock: Clock,
    scheduler: FrameScheduler,
    seek: SeekController,
    looper: LoopController,
    decoder: FrameDecoder,
    events: Vec<PlaybackEvent>,
    handler: Option<EventHandler>,
}

impl SessionInner {
    fn frame_duration_ms(&self) -> f64 {
        self.media.as_ref().map_or(0.0, |m| m.frame_duration_ms())
    }

    fn set_state(&mut self, to: PlaybackState) {
        let from = self.state;
        if from == Some(to) {
            return;
        }
        match from {
            Some(from) => debug!("state {} -> {}", from, to),
            None => debug!("state -> {}", to),
        }
        self.state = Some(to);
        self.events.push(PlaybackEvent::StateChanged { from, to });
    }

    fn fail(&mut self, err: &PlayerError) {
        error!("playback failed: {}", err);
        self.set_state(PlaybackState::Error);
        self.events.push(PlaybackEvent::Failed {
            message: err.to_string(),
        });
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state {
            None => Err(PlayerError::InvalidState("no media open".into())),
            Some(PlaybackState::Error) => {
                Err(PlayerError::InvalidState("session is in error state".into()))
            }
            Some(_) => Ok(()),
        }
    }

    fn release(&mut self) {
        if self.media.take().is_some() || self.state.is_some() {
            self.backend.close();
        }
        self.state = None;
        self.decoder.release();
        self.cue = CueRange::default();
        self.cursor = PlaybackCursor::default();
        self.scheduler = FrameScheduler::new(0.0);
    }

    fn open(&mut self, name: &str) -> Result<MediaDescriptor> {
        self.release();

        if !runtime::is_initialized() {
            let err = PlayerError::NotInitialized;
            self.fail(&err);
            return Err(err);
        }

        let desc = match self.backend.open_source(name) {
            Ok(desc) => desc,
            Err(e) => {
                warn!("failed to open {}: {}", name, e);
                self.fail(&e);
                return Err(e);
            }
        };

        self.cue = CueRange::full(desc.duration_frames);
        self.cursor = PlaybackCursor {
            direction: self.config.default_direction,
            speed: self.config.default_speed,
            loop_mode: self.config.default_loop_mode,
            ..PlaybackCursor::default()
        };
        self.scheduler = if desc.is_image() {
            FrameScheduler::for_image()
        } else {
            FrameScheduler::new(desc.fps)
        };
        self.clock.reset();

        // Preload the first frame so consumers have something before play()
        match self.decoder.pull(self.backend.as_mut(), &desc) {
            Ok(Pulled::Frame(_)) => self.events.push(PlaybackEvent::NewFrame { frame: 0 }),
            Ok(Pulled::EndOfStream) => warn!("{} produced no frames", name),
            Err(e) => {
                self.media = Some(desc);
                self.fail(&e);
                return Err(e);
            }
        }

        info!(
            "opened {}: {} frames @ {:.3} fps ({:?})",
            name, desc.duration_frames, desc.fps, desc.content_type
        );
        self.media = Some(desc.clone());
        self.set_state(PlaybackState::Opened);
        Ok(desc)
    }

    fn play(&mut self) -> Result<()> {
        self.ensure_usable()?;
        match self.state {
            Some(PlaybackState::Playing) => return Ok(()),
            Some(PlaybackState::Eof) => {
                let target = match self.cursor.direction {
                    Direction::Forward => 0,
                    Direction::Backward => self.cue.span(),
                };
                self.seek_to(target)?;
            }
            _ => {}
        }
        self.clock.reset();
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.ensure_usable()?;
        match self.state {
            Some(PlaybackState::Playing) => {
                self.clock.reset();
                self.set_state(PlaybackState::Paused);
                Ok(())
            }
            Some(PlaybackState::Paused) => Ok(()),
            Some(state) => Err(PlayerError::InvalidState(format!("cannot pause while {}", state))),
            None => Err(PlayerError::InvalidState("no media open".into())),
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.cursor.direction = self.config.default_direction;
        if let Err(e) = self.seek_to(0) {
            if e.kind() != ErrorKind::SeekFailure {
                self.fail(&e);
                return Err(e);
            }
            warn!("stop could not rewind the backend: {}", e);
            let frame_ms = self.frame_duration_ms();
            self.cursor.set_frame(0, frame_ms);
            self.decoder.invalidate();
            self.scheduler.reset();
            self.clock.reset();
        }
        self.set_state(PlaybackState::Stopped);
        Ok(())
    }

    fn seek(&mut self, request: SeekRequest) -> Result<()> {
        self.ensure_usable()?;
        let target = self
            .seek
            .target_frame(request, &self.cue, self.frame_duration_ms());
        match self.seek_to(target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::SeekFailure => {
                warn!("seek to frame {} failed: {}", target, e);
                Err(e)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Seek-then-settle to a relative frame without touching timing state.
    fn settle_at(&mut self, target: i64) -> Result<bool> {
        let desc = match self.media.as_ref() {
            Some(desc) => desc,
            None => return Err(PlayerError::InvalidState("no media open".into())),
        };
        if desc.is_image() {
            self.cursor.set_frame(0, 0.0);
            return Ok(false);
        }
        let target = self.cue.clamp(target);
        let absolute = self.cue.to_absolute(target);
        let landed = self
            .seek
            .seek_and_settle(self.backend.as_mut(), desc, &mut self.decoder, absolute)?;
        let frame = match landed {
            Some(index) if index != absolute => {
                warn!("settled on frame {} instead of {}", index, absolute);
                self.cue.clamp(self.cue.to_relative(index))
            }
            _ => target,
        };
        self.cursor.set_frame(frame, desc.frame_duration_ms());
        Ok(landed.is_some())
    }

    /// Caller-initiated reposition: settle, then restart timing from there.
    fn seek_to(&mut self, target: i64) -> Result<()> {
        if self.settle_at(target)? {
            self.events.push(PlaybackEvent::NewFrame {
                frame: self.cursor.frame,
            });
        }
        self.scheduler.reset();
        self.clock.reset();
        Ok(())
    }

    fn update(&mut self) -> Result<bool> {
        match self.state {
            Some(PlaybackState::Playing) => {}
            Some(PlaybackState::Error) => {
                return Err(PlayerError::InvalidState("session is in error state".into()))
            }
            _ => return Ok(false),
        }

        if self.media.as_ref().map_or(true, |m| m.is_image()) {
            self.set_state(PlaybackState::Eof);
            return Ok(false);
        }

        let elapsed = self
            .clock
            .delta_time(self.cursor.speed, self.cursor.direction);
        let steps = self.scheduler.advance(elapsed.scaled);
        if steps == 0 {
            return Ok(false);
        }

        match self.advance(steps) {
            Ok(decoded) => Ok(decoded),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn advance(&mut self, steps: u64) -> Result<bool> {
        let span = self.cue.span();
        let frame_ms = self.frame_duration_ms();
        let mut remaining = self.looper.fold_laps(self.cursor.loop_mode, span, steps);
        if remaining != steps {
            debug!("skipped {} steps of whole laps", steps - remaining);
        }
        let mut decoded = false;

        while remaining > 0 && self.state == Some(PlaybackState::Playing) {
            let direction = self.cursor.direction;
            let room = match direction {
                Direction::Forward => span - self.cursor.frame,
                Direction::Backward => self.cursor.frame,
            };
            if room <= 0 {
                remaining -= 1;
                decoded |= self.cross_boundary()?;
                continue;
            }

            let count = remaining.min(room as u64);
            remaining -= count;
            let target = self.cursor.frame + direction.signum() * count as i64;

            match self.step_to(target) {
                Ok(Some(landed)) => {
                    let frame = self.cue.clamp(self.cue.to_relative(landed));
                    self.cursor.set_frame(frame, frame_ms);
                    decoded = true;
                }
                Ok(None) => {
                    // stream ended before the cue bound
                    if let Some(last) = self.decoder.last_frame() {
                        let frame = self.cue.clamp(self.cue.to_relative(last));
                        self.cursor.set_frame(frame, frame_ms);
                    }
                    decoded |= self.cross_boundary()?;
                }
                Err(e) if e.kind() == ErrorKind::SeekFailure => {
                    warn!("cannot step to frame {}: {}", target, e);
                    self.set_state(PlaybackState::Eof);
                }
                Err(e) => return Err(e),
            }
        }

        if decoded {
            self.events.push(PlaybackEvent::NewFrame {
                frame: self.cursor.frame,
            });
        }
        Ok(decoded)
    }

    /// Decodes the frame at relative `target` and returns the absolute index
    /// that ended up in the buffers. `Ok(None)` means the stream ended first.
    fn step_to(&mut self, target: i64) -> Result<Option<u64>> {
        let desc = match self.media.as_ref() {
            Some(desc) => desc,
            None => return Ok(None),
        };
        let absolute = self.cue.to_absolute(target);
        let current = self.cue.to_absolute(self.cursor.frame);
        let distance = target - self.cursor.frame;
        let sequential = distance > 0 && self.decoder.position() == Some(current);

        if !sequential || distance > SEQUENTIAL_DECODE_LIMIT {
            match self
                .seek
                .seek_and_settle(self.backend.as_mut(), desc, &mut self.decoder, absolute)
            {
                Ok(landed) => return Ok(landed),
                // the backend has not moved, so decoding on is still possible
                Err(e) if sequential && e.kind() == ErrorKind::SeekFailure => {
                    debug!("seek to frame {} refused, decoding forward: {}", absolute, e);
                }
                Err(e) => return Err(e),
            }
        }

        loop {
            match self.decoder.pull(self.backend.as_mut(), desc)? {
                Pulled::Frame(index) if index >= absolute => return Ok(Some(index)),
                Pulled::Frame(_) => {}
                Pulled::EndOfStream => return Ok(None),
            }
        }
    }

    fn cross_boundary(&mut self) -> Result<bool> {
        let verdict = self.looper.on_boundary(
            self.cursor.loop_mode,
            self.cursor.direction,
            self.cue.span(),
        );
        match verdict {
            LoopVerdict::Stop => {
                let frame = self.cue.clamp(self.cursor.frame);
                let frame_ms = self.frame_duration_ms();
                self.cursor.set_frame(frame, frame_ms);
                self.set_state(PlaybackState::Eof);
                Ok(false)
            }
            LoopVerdict::Wrap { frame } => match self.settle_at(frame) {
                Ok(decoded) => {
                    debug!("wrapped to frame {}", frame);
                    self.events.push(PlaybackEvent::Wrapped { to_frame: frame });
                    Ok(decoded)
                }
                Err(e) if e.kind() == ErrorKind::SeekFailure => {
                    warn!("cannot wrap to frame {}: {}", frame, e);
                    self.set_state(PlaybackState::Eof);
                    Ok(false)
                }
                Err(e) => Err(e),
            },
            LoopVerdict::Reverse { direction } => {
                debug!("reversed at frame {}", self.cursor.frame);
                self.cursor.direction = direction;
                self.events.push(PlaybackEvent::Reversed { direction });
                Ok(false)
            }
        }
    }

    fn set_cue_range(&mut self, cue_in: u64, cue_out: u64) -> Result<()> {
        self.ensure_usable()?;
        let (total, is_image) = match self.media.as_ref() {
            Some(desc) => (desc.duration_frames, desc.is_image()),
            None => return Err(PlayerError::InvalidState("no media open".into())),
        };
        if is_image {
            return Err(PlayerError::InvalidState("images have no cue range".into()));
        }

        let previous = self.cue;
        self.cue = CueRange::new(cue_in, cue_out, total)?;
        if let Err(e) = self.seek_to(0) {
            self.cue = previous;
            if e.kind() != ErrorKind::SeekFailure {
                self.fail(&e);
            }
            return Err(e);
        }
        debug!("cue range set to {}..={}", cue_in, cue_out);
        Ok(())
    }
}

struct Shared {
    inner: Mutex<SessionInner>,
    worker: Mutex<Option<Worker>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.stop();
        }
        self.inner.get_mut().release();
    }
}

/// A playback session over one [`DecodingBackend`].
///
/// Handles are cheap to clone and all refer to the same session; every
/// method takes `&self` and serializes through one internal lock, so a
/// session can be shared between a render thread, a control thread and the
/// optional background driver. The session is torn down, and the driver
/// thread joined, when the last handle is dropped.
#[derive(Clone)]
pub struct PlaybackSession {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("PlaybackSession")
            .field("state", &inner.state)
            .field("cursor", &inner.cursor)
            .field("cue", &inner.cue)
            .finish()
    }
}

impl PlaybackSession {
    /// Creates a session timed by the system's monotonic clock.
    pub fn new(backend: Box<dyn DecodingBackend>, config: PlayerConfig) -> Self {
        Self::with_time_source(backend, config, MonotonicTime::new())
    }

    /// Creates a session timed by `time`.
    pub fn with_time_source(
        backend: Box<dyn DecodingBackend>,
        config: PlayerConfig,
        time: impl TimeSource + 'static,
    ) -> Self {
        let inner = SessionInner {
            backend,
            clock: Clock::new(Arc::new(time)),
            scheduler: FrameScheduler::new(0.0),
            seek: SeekController::new(config.max_settle_frames),
            looper: LoopController::new(),
            decoder: FrameDecoder::new(config.max_consecutive_decode_failures),
            state: None,
            media: None,
            cue: CueRange::default(),
            cursor: PlaybackCursor::default(),
            events: Vec::new(),
            handler: None,
            config,
        };
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Runs `f` under the lock, then delivers queued events with the lock released.
    fn with_inner<R>(&self, f: impl FnOnce(&mut SessionInner) -> R) -> R {
        let (result, events, handler) = {
            let mut inner = self.shared.inner.lock();
            let result = f(&mut inner);
            let events = std::mem::take(&mut inner.events);
            (result, events, inner.handler.clone())
        };
        if let Some(handler) = handler {
            for event in &events {
                handler(event);
            }
        }
        result
    }

    /// Opens `name`, replacing whatever was open.
    ///
    /// On failure the session is left in [`PlaybackState::Error`].
    pub fn open(&self, name: &str) -> Result<MediaDescriptor> {
        self.stop_worker();
        self.with_inner(|inner| inner.open(name))
    }

    /// Releases the media and frame buffers and joins the driver thread.
    ///
    /// Safe in any state, including from inside an event handler.
    pub fn close(&self) {
        self.stop_worker();
        self.with_inner(|inner| {
            if let Some(desc) = inner.media.as_ref() {
                info!("closing {}", desc.file_name);
            }
            inner.release();
        });
    }

    /// Starts or resumes playback. From `Eof` playback restarts at the
    /// bound where the current direction begins.
    pub fn play(&self) -> Result<()> {
        let background = self.with_inner(|inner| {
            inner.play()?;
            Ok::<_, PlayerError>(inner.config.background_driven)
        })?;
        if background && self.state() == Some(PlaybackState::Playing) {
            self.ensure_worker();
        }
        Ok(())
    }

    /// Freezes time; the current frame stays available.
    pub fn pause(&self) -> Result<()> {
        self.with_inner(|inner| inner.pause())
    }

    /// Rewinds to cue-in, restores the configured direction and enters `Stopped`.
    pub fn stop(&self) -> Result<()> {
        self.with_inner(|inner| inner.stop())
    }

    /// Advances playback by the time elapsed since the previous call.
    ///
    /// Does nothing unless playing. Returns whether a new frame was decoded.
    pub fn update(&self) -> Result<bool> {
        self.with_inner(|inner| inner.update())
    }

    /// Reports whether a frame was decoded since the last call, and clears the flag.
    pub fn is_new_frame(&self) -> bool {
        self.shared.inner.lock().decoder.take_new_frame()
    }

    /// Current state, `None` when nothing is open.
    pub fn state(&self) -> Option<PlaybackState> {
        self.shared.inner.lock().state
    }

    /// Seeks to a frame relative to cue-in, clamped into the cue range.
    pub fn set_frame_position(&self, frame: i64) -> Result<()> {
        self.with_inner(|inner| inner.seek(SeekRequest::Frame(frame)))
    }

    /// Seeks to a time in milliseconds relative to cue-in.
    pub fn set_time_position_in_ms(&self, time_ms: f64) -> Result<()> {
        self.with_inner(|inner| inner.seek(SeekRequest::TimeMs(time_ms)))
    }

    /// Seeks to a normalized position, `0.0` at cue-in and `1.0` at cue-out.
    pub fn set_position(&self, position: f32) -> Result<()> {
        self.with_inner(|inner| inner.seek(SeekRequest::Position(position)))
    }

    /// Restricts playback to absolute frames `cue_in..=cue_out` and seeks to `cue_in`.
    pub fn set_cue_range(&self, cue_in: u64, cue_out: u64) -> Result<()> {
        self.with_inner(|inner| inner.set_cue_range(cue_in, cue_out))
    }

    /// Active cue range in absolute frames.
    pub fn cue_range(&self) -> CueRange {
        self.shared.inner.lock().cue
    }

    /// Sets the speed multiplier; must be finite and > 0.
    pub fn set_speed(&self, speed: f32) -> Result<()> {
        self.with_inner(|inner| {
            inner.ensure_usable()?;
            if !speed.is_finite() || speed <= 0.0 {
                return Err(PlayerError::InvalidState(format!(
                    "speed must be > 0, got {}",
                    speed
                )));
            }
            inner.cursor.speed = speed;
            Ok(())
        })
    }

    /// Speed multiplier.
    pub fn speed(&self) -> f32 {
        self.shared.inner.lock().cursor.speed
    }

    /// Sets the direction of travel.
    pub fn set_direction(&self, direction: Direction) -> Result<()> {
        self.with_inner(|inner| {
            inner.ensure_usable()?;
            inner.cursor.direction = direction;
            Ok(())
        })
    }

    /// Direction of travel.
    pub fn direction(&self) -> Direction {
        self.shared.inner.lock().cursor.direction
    }

    /// Sets the loop mode; it applies at the next cue boundary.
    pub fn set_loop_mode(&self, mode: LoopMode) -> Result<()> {
        self.with_inner(|inner| {
            inner.ensure_usable()?;
            inner.cursor.loop_mode = mode;
            Ok(())
        })
    }

    /// Loop mode.
    pub fn loop_mode(&self) -> LoopMode {
        self.shared.inner.lock().cursor.loop_mode
    }

    /// Installs a handler for [`PlaybackEvent`]s, replacing any previous one.
    pub fn set_event_handler<F>(&self, handler: F)
    where
        F: Fn(&PlaybackEvent) + Send + Sync + 'static,
    {
        self.shared.inner.lock().handler = Some(Arc::new(handler));
    }

    /// Removes the event handler.
    pub fn clear_event_handler(&self) {
        self.shared.inner.lock().handler = None;
    }

    /// Current frame relative to cue-in.
    pub fn current_frame_number(&self) -> i64 {
        self.shared.inner.lock().cursor.frame
    }

    /// Current time in milliseconds relative to cue-in.
    pub fn current_time_in_ms(&self) -> f64 {
        self.shared.inner.lock().cursor.time_ms
    }

    /// Current position normalized over the cue range.
    pub fn position(&self) -> f32 {
        let inner = self.shared.inner.lock();
        let span = inner.cue.span();
        if span == 0 {
            0.0
        } else {
            (inner.cursor.frame as f64 / span as f64) as f32
        }
    }

    /// Snapshot of the transport settings and position.
    pub fn cursor(&self) -> PlaybackCursor {
        self.shared.inner.lock().cursor.clone()
    }

    /// Descriptor of the open media, defaulted when nothing is open.
    pub fn descriptor(&self) -> MediaDescriptor {
        self.shared
            .inner
            .lock()
            .media
            .clone()
            .unwrap_or_default()
    }

    fn describe<T>(&self, f: impl FnOnce(&MediaDescriptor) -> T) -> T
    where
        T: Default,
    {
        self.shared.inner.lock().media.as_ref().map(f).unwrap_or_default()
    }

    /// Name the media was opened with.
    pub fn file_name(&self) -> String {
        self.describe(|d| d.file_name.clone())
    }

    /// Video width in pixels.
    pub fn width(&self) -> u32 {
        self.describe(|d| d.width)
    }

    /// Video height in pixels.
    pub fn height(&self) -> u32 {
        self.describe(|d| d.height)
    }

    /// Nominal frame rate.
    pub fn fps(&self) -> f64 {
        self.describe(|d| d.fps)
    }

    /// Bitrate in bits per second.
    pub fn bitrate(&self) -> u32 {
        self.describe(|d| d.bitrate)
    }

    /// Audio channel count.
    pub fn audio_channels(&self) -> u16 {
        self.describe(|d| d.audio_channels)
    }

    /// Audio sample rate in Hz.
    pub fn audio_sample_rate(&self) -> u32 {
        self.describe(|d| d.audio_sample_rate)
    }

    /// Video codec name.
    pub fn video_codec_name(&self) -> String {
        self.describe(|d| d.video_codec.clone())
    }

    /// Audio codec name.
    pub fn audio_codec_name(&self) -> String {
        self.describe(|d| d.audio_codec.clone())
    }

    /// Whether the media has a video stream.
    pub fn has_video(&self) -> bool {
        self.describe(|d| d.has_video())
    }

    /// Whether the media has an audio stream.
    pub fn has_audio(&self) -> bool {
        self.describe(|d| d.has_audio())
    }

    /// Whether the media is a still image.
    pub fn is_image(&self) -> bool {
        self.describe(|d| d.is_image())
    }

    /// Frames inside the cue range.
    pub fn duration_in_frames(&self) -> u64 {
        let inner = self.shared.inner.lock();
        match inner.media.as_ref() {
            Some(_) => inner.cue.frame_count(),
            None => 0,
        }
    }

    /// Duration of the cue range in milliseconds.
    pub fn duration_in_ms(&self) -> f64 {
        let inner = self.shared.inner.lock();
        match inner.media.as_ref() {
            Some(desc) if inner.cue == CueRange::full(desc.duration_frames) => desc.duration_ms,
            Some(desc) => inner.cue.frame_count() as f64 * desc.frame_duration_ms(),
            None => 0.0,
        }
    }

    /// Copy of the latest video frame. The pixel data is shared, not copied.
    pub fn video_frame(&self) -> Option<VideoFrame> {
        self.shared.inner.lock().decoder.video().cloned()
    }

    /// Copy of the latest audio frame. The sample data is shared, not copied.
    pub fn audio_frame(&self) -> Option<AudioFrame> {
        self.shared.inner.lock().decoder.audio().cloned()
    }

    /// Latest video and audio frames, read atomically.
    pub fn av_data(&self) -> AvData {
        let inner = self.shared.inner.lock();
        AvData {
            video: inner.decoder.video().cloned(),
            audio: inner.decoder.audio().cloned(),
        }
    }

    /// Reads the latest frames under the session lock without cloning them.
    ///
    /// Do not call back into the session from `f`.
    pub fn with_frames<R>(&self, f: impl FnOnce(Option<&VideoFrame>, Option<&AudioFrame>) -> R) -> R {
        let inner = self.shared.inner.lock();
        f(inner.decoder.video(), inner.decoder.audio())
    }

    /// Copy of the configuration the session was created with.
    pub fn config(&self) -> PlayerConfig {
        self.shared.inner.lock().config.clone()
    }

    /// Human-readable description of the open media; also logged at info level.
    pub fn dump_info(&self) -> String {
        let text = {
            let inner = self.shared.inner.lock();
            match (inner.media.as_ref(), inner.state) {
                (Some(desc), Some(state)) => format!(
                    "{}cue:         {}..={}\nstate:       {}\nframe:       {} ({:.3} ms)\n",
                    desc, inner.cue.cue_in, inner.cue.cue_out, state, inner.cursor.frame, inner.cursor.time_ms
                ),
                (_, Some(state)) => format!("no media open\nstate:       {}\n", state),
                _ => "no media open\n".to_string(),
            }
        };
        info!("{}", text.trim_end());
        text
    }

    /// Takes the new-frame flag and, if it was set, a snapshot of the frame.
    pub(crate) fn take_snapshot(&self) -> Option<FrameSnapshot> {
        let mut inner = self.shared.inner.lock();
        if !inner.decoder.take_new_frame() {
            return None;
        }
        Some(FrameSnapshot {
            frame_number: inner.cursor.frame,
            time_ms: inner.cursor.time_ms,
            video: inner.decoder.video().cloned(),
            audio: inner.decoder.audio().cloned(),
        })
    }

    /// One background tick. Returns whether the driver should keep running.
    fn drive_tick(&self) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| self.update())) {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("driver tick failed: {}", e),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                let err = PlayerError::DecodeFailure(format!("driver panicked: {}", message));
                self.with_inner(|inner| inner.fail(&err));
            }
        }
        matches!(
            self.state(),
            Some(PlaybackState::Playing) | Some(PlaybackState::Paused)
        )
    }

    fn ensure_worker(&self) {
        let stale = {
            let mut slot = self.shared.worker.lock();
            match slot.as_ref() {
                Some(worker) if worker.is_running() => return,
                _ => slot.take(),
            }
        };
        if let Some(stale) = stale {
            stale.stop();
        }

        let interval = self.shared.inner.lock().config.tick_interval;
        let weak = Arc::downgrade(&self.shared);
        let tick = move || match weak.upgrade() {
            Some(shared) => PlaybackSession { shared }.drive_tick(),
            None => false,
        };

        match Worker::spawn(interval, tick) {
            Ok(worker) => {
                let surplus = {
                    let mut slot = self.shared.worker.lock();
                    if slot.is_none() {
                        *slot = Some(worker);
                        None
                    } else {
                        Some(worker)
                    }
                };
                if let Some(surplus) = surplus {
                    surplus.stop();
                }
            }
            Err(e) => error!("failed to start playback driver: {}", e),
        }
    }

    fn stop_worker(&self) {
        let worker = self.shared.worker.lock().take();
        if let Some(worker) = worker {
            if worker.is_current_thread() {
                // Joined later from another thread
                worker.signal();
                *self.shared.worker.lock() = Some(worker);
            } else {
                worker.stop();
            }
        }
    }

    /// Whether a background driver thread is currently running.
    pub fn is_background_running(&self) -> bool {
        self.shared
            .worker
            .lock()
            .as_ref()
            .map_or(false, |w| w.is_running())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SyntheticBackend, SyntheticMedia};
    use crate::playback::ManualTime;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn session(media: SyntheticMedia, config: PlayerConfig) -> (PlaybackSession, ManualTime) {
        runtime::init().unwrap();
        let backend = SyntheticBackend::new().with_media("clip", media);
        let time = ManualTime::new();
        let session = PlaybackSession::with_time_source(Box::new(backend), config, time.clone());
        session.open("clip").unwrap();
        (session, time)
    }

    #[test]
    fn test_open_preloads_first_frame() {
        let (session, _) = session(SyntheticMedia::video(25.0, 50), PlayerConfig::default());
        assert_eq!(session.state(), Some(PlaybackState::Opened));
        assert!(session.is_new_frame());
        assert!(!session.is_new_frame());
        let video = session.video_frame().unwrap();
        assert_eq!(SyntheticBackend::frame_index(&video), Some(0));
    }

    #[test]
    fn test_update_is_noop_unless_playing() {
        let (session, time) = session(SyntheticMedia::video(25.0, 50), PlayerConfig::default());
        session.is_new_frame();
        time.advance(Duration::from_millis(500));
        assert_eq!(session.update().unwrap(), false);
        assert_eq!(session.current_frame_number(), 0);
        assert!(!session.is_new_frame());
    }

    #[test]
    fn test_pause_freezes_time() {
        let (session, time) = session(SyntheticMedia::video(25.0, 50), PlayerConfig::default());
        session.play().unwrap();
        time.advance(Duration::from_millis(40));
        session.update().unwrap();
        assert_eq!(session.current_frame_number(), 1);

        session.pause().unwrap();
        time.advance(Duration::from_millis(400));
        session.update().unwrap();
        session.play().unwrap();
        session.update().unwrap();
        assert_eq!(session.current_frame_number(), 1);
    }

    #[test]
    fn test_high_speed_skips_ahead() {
        let (session, time) = session(SyntheticMedia::video(25.0, 50), PlayerConfig::default());
        session.set_speed(4.0).unwrap();
        session.play().unwrap();
        time.advance(Duration::from_millis(40));
        session.update().unwrap();
        assert_eq!(session.current_frame_number(), 4);
        let video = session.video_frame().unwrap();
        assert_eq!(SyntheticBackend::frame_index(&video), Some(4));
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        let (session, _) = session(SyntheticMedia::video(25.0, 50), PlayerConfig::default());
        assert!(session.set_speed(0.0).is_err());
        assert!(session.set_speed(-1.0).is_err());
        assert_eq!(session.speed(), 1.0);
    }

    #[test]
    fn test_backward_playback_decreases_frames() {
        let (session, time) = session(SyntheticMedia::video(25.0, 50), PlayerConfig::default());
        session.set_frame_position(20).unwrap();
        session.set_direction(Direction::Backward).unwrap();
        session.play().unwrap();
        time.advance(Duration::from_millis(120));
        session.update().unwrap();
        assert_eq!(session.current_frame_number(), 17);
        let video = session.video_frame().unwrap();
        assert_eq!(SyntheticBackend::frame_index(&video), Some(17));
    }

    #[test]
    fn test_image_goes_straight_to_eof() {
        let (session, time) = session(SyntheticMedia::image(8, 8), PlayerConfig::default());
        assert!(session.is_image());
        assert!(session.is_new_frame());
        session.play().unwrap();
        time.advance(Duration::from_secs(1));
        session.update().unwrap();
        assert_eq!(session.state(), Some(PlaybackState::Eof));
        assert!(!session.is_new_frame());
        assert!(session.video_frame().is_some());
    }

    #[test]
    fn test_events_are_delivered() {
        let (session, time) = session(SyntheticMedia::video(25.0, 3), PlayerConfig::default().with_loop_mode(LoopMode::None));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.set_event_handler(move |event| sink.lock().push(event.clone()));

        session.play().unwrap();
        time.advance(Duration::from_millis(120));
        session.update().unwrap();

        let events = seen.lock().clone();
        assert_eq!(
            events,
            vec![
                PlaybackEvent::StateChanged {
                    from: Some(PlaybackState::Opened),
                    to: PlaybackState::Playing
                },
                PlaybackEvent::StateChanged {
                    from: Some(PlaybackState::Playing),
                    to: PlaybackState::Eof
                },
                PlaybackEvent::NewFrame { frame: 2 },
            ]
        );
    }

    #[test]
    fn test_dump_info_mentions_media() {
        let (session, _) = session(SyntheticMedia::video_with_audio(25.0, 50), PlayerConfig::default());
        let text = session.dump_info();
        assert!(text.contains("file:        clip"));
        assert!(text.contains("state:       opened"));
        session.close();
        assert_eq!(session.dump_info(), "no media open\n");
    }
}
