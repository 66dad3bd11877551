//! Process-wide setup and teardown.
//!
//! Sessions refuse to open media until [`init`] has been called at least once.
//! Calls are reference counted: every [`init`] should be paired with a
//! [`shutdown`], and teardown runs when the count drops back to zero.

use lazy_static::lazy_static;
use log::{debug, info};
use parking_lot::Mutex;

use crate::error::Result;

lazy_static! {
    static ref RUNTIME: Mutex<RuntimeState> = Mutex::new(RuntimeState::default());
}

#[derive(Debug, Default)]
struct RuntimeState {
    users: usize,
    generation: u64,
}

/// Crate version as `(major, minor, patch)`.
pub fn version() -> (u32, u32, u32) {
    let parse = |s: &str| s.parse::<u32>().unwrap_or(0);
    (
        parse(env!("CARGO_PKG_VERSION_MAJOR")),
        parse(env!("CARGO_PKG_VERSION_MINOR")),
        parse(env!("CARGO_PKG_VERSION_PATCH")),
    )
}

/// Initializes the playback runtime. Idempotent; reference counted.
pub fn init() -> Result<()> {
    let mut state = RUNTIME.lock();
    if state.users == 0 {
        state.generation += 1;
        let (major, minor, patch) = version();
        info!(
            "vdkplay {}.{}.{} runtime initialized (generation {})",
            major, minor, patch, state.generation
        );
    }
    state.users += 1;
    debug!("runtime users: {}", state.users);
    Ok(())
}

/// Releases one [`init`] reference; tears the runtime down at zero.
///
/// Open sessions keep working; only new `open` calls are refused afterwards.
pub fn shutdown() {
    let mut state = RUNTIME.lock();
    match state.users {
        0 => debug!("shutdown called without init"),
        1 => {
            state.users = 0;
            info!("vdkplay runtime shut down");
        }
        _ => state.users -= 1,
    }
}

/// Whether [`init`] has been called more often than [`shutdown`].
pub fn is_initialized() -> bool {
    RUNTIME.lock().users > 0
}
