//! # Browser
//!
//! Wires the systems onto one document and runs them:
//!
//! ```text
//!   WorkerPool ─▶ EventDispatcher ─▶ Document
//!                                      ├── FocusController   (window: focus_request)
//!                                      ├── ResourceLoader    (window: location)
//!                                      ├── AudioSystem       (window: device_end)
//!                                      └── Narrator          (window: focus, capture)
//!
//!   FrameLoop [bowser-frame]: AudioEngine, InputEngine (interactive only)
//! ```

use log::info;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::core::config::ResolvedConfig;
use crate::core::frame_loop::{FrameLoop, RunningLoop, StopHandle};
use crate::core::pool::WorkerPool;
use crate::dom::{Document, DomError, EventDispatcher};
use crate::systems::audio::AudioSystem;
use crate::systems::focus::FocusController;
use crate::systems::input::InputEngine;
use crate::systems::loader::ResourceLoader;
use crate::systems::narration::Narrator;

#[derive(Debug)]
pub enum AppError {
    Io(io::Error),
    Dom(DomError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(e) => write!(f, "I/O error: {e}"),
            AppError::Dom(e) => write!(f, "document error: {e}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<io::Error> for AppError {
    fn from(e: io::Error) -> Self {
        AppError::Io(e)
    }
}

impl From<DomError> for AppError {
    fn from(e: DomError) -> Self {
        AppError::Dom(e)
    }
}

pub struct Browser {
    config: ResolvedConfig,
    document: Document,
    focus: Arc<FocusController>,
    loader: Arc<ResourceLoader>,
    audio: AudioSystem,
    narrator: Arc<Narrator>,
    running: Option<RunningLoop>,
}

impl Browser {
    pub fn new(config: ResolvedConfig) -> Result<Self, AppError> {
        let pool = WorkerPool::new(config.worker_threads)?;
        let document = Document::new(EventDispatcher::new(pool));
        let focus = FocusController::install(&document)?;
        let loader = ResourceLoader::install(&document, config.default_theme)?;
        let audio = AudioSystem::new(&document, &config.audio)?;
        let narrator = Narrator::install(
            &document,
            Arc::clone(audio.speech()),
            audio.words_per_minute(),
        )?;
        Ok(Self {
            config,
            document,
            focus,
            loader,
            audio,
            narrator,
            running: None,
        })
    }

    /// Starts the frame loop, waits for the devices to open, then navigates
    /// to `location`. With `terminal_input` the keyboard drives navigation
    /// and `Esc` quits.
    pub fn start(&mut self, location: Option<&str>, terminal_input: bool) -> Result<(), AppError> {
        let mut frame_loop = FrameLoop::new(self.config.frame_rate);
        frame_loop.add_engine(Box::new(self.audio.engine(&self.document)));
        if terminal_input {
            frame_loop.add_engine(Box::new(InputEngine::new(
                self.document.clone(),
                Arc::clone(&self.focus),
                frame_loop.stop_handle(),
            )));
        }
        let running = frame_loop.start()?;
        running.wait_for_initialized();
        info!("Browser started");
        self.running = Some(running);
        if let Some(location) = location {
            self.document.set_location(location)?;
        }
        Ok(())
    }

    /// Blocks until the frame loop ends.
    pub fn join(&mut self) {
        if let Some(running) = self.running.as_mut() {
            running.join();
        }
    }

    pub fn stop(&mut self) {
        if let Some(running) = self.running.as_mut() {
            running.stop();
            info!("Browser stopped");
        }
    }

    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.running.as_ref().map(RunningLoop::stop_handle)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn focus(&self) -> &Arc<FocusController> {
        &self.focus
    }

    pub fn loader(&self) -> &Arc<ResourceLoader> {
        &self.loader
    }

    pub fn audio(&self) -> &AudioSystem {
        &self.audio
    }

    pub fn narrator(&self) -> &Arc<Narrator> {
        &self.narrator
    }
}
