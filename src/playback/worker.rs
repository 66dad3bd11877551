use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use log::debug;

/// Background thread that calls a tick function until told to stop or the
/// tick reports there is nothing left to drive.
#[derive(Debug)]
pub(crate) struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub(crate) fn spawn<F>(interval: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("vdkplay-driver".to_string())
            .spawn(move || {
                debug!("playback driver started");
                while !flag.load(Ordering::Acquire) {
                    if !tick() {
                        break;
                    }
                    thread::sleep(interval);
                }
                debug!("playback driver exited");
            })?;
        Ok(Self { stop, handle })
    }

    /// Whether the thread is alive and has not been asked to stop.
    pub(crate) fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire) && !self.handle.is_finished()
    }

    /// Whether the caller is running on this worker's thread.
    pub(crate) fn is_current_thread(&self) -> bool {
        self.thread_id() == thread::current().id()
    }

    fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    /// Asks the thread to exit after its current tick.
    pub(crate) fn signal(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Signals and joins. On the worker's own thread the handle is dropped
    /// instead; the thread exits as soon as the current tick returns.
    pub(crate) fn stop(self) {
        self.signal();
        if self.is_current_thread() {
            debug!("driver stopped from its own thread, not joining");
            return;
        }
        if self.handle.join().is_err() {
            debug!("playback driver panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_runs_until_tick_returns_false() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        let worker = Worker::spawn(Duration::from_millis(1), move || {
            seen.fetch_add(1, Ordering::SeqCst) < 4
        })
        .unwrap();
        while worker.is_running() {
            thread::sleep(Duration::from_millis(1));
        }
        worker.stop();
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_stop_joins_running_thread() {
        let worker = Worker::spawn(Duration::from_millis(1), || true).unwrap();
        assert!(worker.is_running());
        assert!(!worker.is_current_thread());
        worker.stop();
    }
}
