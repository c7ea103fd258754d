//! # Frame Loop
//!
//! The one dedicated thread that drives input polling and the audio device at
//! a fixed rate (nominally 30 Hz). Device handles must be opened on this
//! thread, so engines get an `initialize` call here before the first frame.
//!
//! ```text
//! start() ──▶ [bowser-frame]  initialize all engines
//!                  │          notify wait_for_initialized()
//!                  ▼
//!             loop { iterate all engines; sleep(remaining period) }
//!                  │          until stop() / a StopHandle fires
//!                  ▼
//!                exit
//! ```

use log::{debug, error, info};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default frame rate in frames per second.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// A unit of per-frame work owned by the frame thread.
pub trait Engine: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Opens device handles. Runs once on the frame thread before any frame.
    fn initialize(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Performs one frame of work.
    fn iterate(&mut self);
}

/// Lets code outside the loop (or an engine inside it) request shutdown.
#[derive(Clone, Default)]
pub struct StopHandle {
    stopping: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Startup {
    done: Mutex<bool>,
    ready: Condvar,
}

impl Startup {
    fn mark_done(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        *done = true;
        self.ready.notify_all();
    }

    fn wait(&self) {
        let done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        let _done = self
            .ready
            .wait_while(done, |done| !*done)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Fixed-rate loop over a set of engines, running on its own thread.
pub struct FrameLoop {
    period: Duration,
    engines: Vec<Box<dyn Engine>>,
    stop: StopHandle,
}

impl FrameLoop {
    pub fn new(frame_rate: u32) -> Self {
        let frame_rate = frame_rate.max(1);
        Self {
            period: Duration::from_secs(1) / frame_rate,
            engines: Vec::new(),
            stop: StopHandle::default(),
        }
    }

    pub fn add_engine(&mut self, engine: Box<dyn Engine>) {
        self.engines.push(engine);
    }

    /// Handle that ends the loop once the current frame finishes.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawns the frame thread.
    pub fn start(self) -> io::Result<RunningLoop> {
        let startup = Arc::new(Startup::default());
        let stop = self.stop.clone();
        let thread_startup = Arc::clone(&startup);
        let thread = thread::Builder::new()
            .name("bowser-frame".to_string())
            .spawn(move || self.run(&thread_startup))?;
        Ok(RunningLoop {
            thread: Some(thread),
            startup,
            stop,
        })
    }

    fn run(mut self, startup: &Startup) {
        let initialized = self.initialize_engines();
        startup.mark_done();
        if !initialized {
            return;
        }
        info!(
            "Frame loop running at {:?} per frame with {} engine(s)",
            self.period,
            self.engines.len()
        );
        while !self.stop.is_stopping() {
            let started = Instant::now();
            for engine in &mut self.engines {
                engine.iterate();
            }
            if let Some(remaining) = self.period.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }
        debug!("Frame loop exiting");
    }

    fn initialize_engines(&mut self) -> bool {
        for engine in &mut self.engines {
            if let Err(e) = engine.initialize() {
                error!("Failed to initialize engine {}: {}", engine.name(), e);
                self.stop.stop();
                return false;
            }
            debug!("Engine {} initialized", engine.name());
        }
        true
    }
}

/// A started frame loop.
pub struct RunningLoop {
    thread: Option<JoinHandle<()>>,
    startup: Arc<Startup>,
    stop: StopHandle,
}

impl RunningLoop {
    /// Blocks until every engine has been initialized (or failed to).
    pub fn wait_for_initialized(&self) {
        self.startup.wait();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Requests shutdown and waits for the frame thread to exit.
    pub fn stop(&mut self) {
        self.stop.stop();
        self.join();
    }

    /// Waits for the frame thread to exit on its own.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Exception occurred in frame loop thread");
            }
        }
    }
}

impl Drop for RunningLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        frames: Arc<AtomicUsize>,
        initialized_on: Arc<Mutex<Option<String>>>,
    }

    impl Engine for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn initialize(&mut self) -> io::Result<()> {
            let name = thread::current().name().map(str::to_string);
            *self.initialized_on.lock().unwrap() = name;
            Ok(())
        }

        fn iterate(&mut self) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Failing;

    impl Engine for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn initialize(&mut self) -> io::Result<()> {
            Err(io::Error::other("no device"))
        }

        fn iterate(&mut self) {
            panic!("must not iterate after failed init");
        }
    }

    #[test]
    fn test_engines_initialize_on_frame_thread_and_iterate() {
        let frames = Arc::new(AtomicUsize::new(0));
        let initialized_on = Arc::new(Mutex::new(None));
        let mut frame_loop = FrameLoop::new(200);
        frame_loop.add_engine(Box::new(Counting {
            frames: Arc::clone(&frames),
            initialized_on: Arc::clone(&initialized_on),
        }));
        let mut running = frame_loop.start().unwrap();
        running.wait_for_initialized();
        assert_eq!(
            initialized_on.lock().unwrap().as_deref(),
            Some("bowser-frame")
        );
        thread::sleep(Duration::from_millis(50));
        running.stop();
        assert!(frames.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_failed_initialization_releases_waiters_and_exits() {
        let mut frame_loop = FrameLoop::new(30);
        frame_loop.add_engine(Box::new(Failing));
        let mut running = frame_loop.start().unwrap();
        running.wait_for_initialized();
        running.join();
        assert!(running.stop_handle().is_stopping());
    }

    #[test]
    fn test_period_follows_frame_rate() {
        assert_eq!(FrameLoop::new(20).period(), Duration::from_millis(50));
        assert_eq!(FrameLoop::new(0).period(), Duration::from_secs(1));
    }
}
