//! # Input Pump
//!
//! Frame-loop engine that drains terminal input without blocking and turns
//! key presses into `key` events at the focused node. `Esc` and `Ctrl+C`
//! stop the browser.

use crossterm::event::{self, Event as TerminalEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use super::focus::FocusController;
use crate::core::frame_loop::{Engine, StopHandle};
use crate::dom::{Document, Event};

/// What a terminal event means to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Key(KeyCode, KeyModifiers),
    Quit,
    Ignore,
}

pub fn translate(event: &TerminalEvent) -> InputAction {
    let TerminalEvent::Key(KeyEvent {
        code,
        modifiers,
        kind,
        ..
    }) = *event
    else {
        return InputAction::Ignore;
    };
    if kind != KeyEventKind::Press {
        return InputAction::Ignore;
    }
    match (modifiers, code) {
        (_, KeyCode::Esc) => InputAction::Quit,
        (m, KeyCode::Char('c')) if m.contains(KeyModifiers::CONTROL) => InputAction::Quit,
        _ => InputAction::Key(code, modifiers),
    }
}

/// Puts the terminal in raw mode until dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        info!("Terminal raw mode enabled");
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

pub struct InputEngine {
    doc: Document,
    focus: Arc<FocusController>,
    stop: StopHandle,
    guard: Option<RawModeGuard>,
}

impl InputEngine {
    pub fn new(doc: Document, focus: Arc<FocusController>, stop: StopHandle) -> Self {
        Self {
            doc,
            focus,
            stop,
            guard: None,
        }
    }

    /// Acts on one terminal event.
    pub fn handle(&self, event: &TerminalEvent) {
        match translate(event) {
            InputAction::Quit => {
                info!("Quit requested from keyboard");
                self.stop.stop();
            }
            InputAction::Key(code, modifiers) => {
                debug!("Key event: {:?} with modifiers {:?}", code, modifiers);
                let Some(target) = self.focus.focused().or_else(|| self.doc.root()) else {
                    return;
                };
                if let Err(e) = self.doc.dispatch_event(target, Event::key(code, modifiers)) {
                    warn!("Could not dispatch key at {}: {}", target, e);
                }
            }
            InputAction::Ignore => {}
        }
    }
}

impl Engine for InputEngine {
    fn name(&self) -> &str {
        "input"
    }

    fn initialize(&mut self) -> io::Result<()> {
        self.guard = Some(RawModeGuard::new()?);
        Ok(())
    }

    fn iterate(&mut self) {
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    warn!("Terminal poll failed: {}", e);
                    return;
                }
            }
            match event::read() {
                Ok(event) => self.handle(&event),
                Err(e) => {
                    warn!("Terminal read failed: {}", e);
                    return;
                }
            }
        }
    }
}
