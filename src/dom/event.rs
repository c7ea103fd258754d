//! # Events
//!
//! An [`Event`] carries an immutable type name, a typed [`EventDetail`], its
//! dispatch policy (synchronous or deferred, bubbling or not) and the mutable
//! propagation state that listeners observe and steer.
//!
//! See [`super::dispatch`] for how phases advance.

use crossterm::event::{KeyCode, KeyModifiers};
use std::fmt;
use std::time::SystemTime;

use super::document::NodeId;

/// Event type names used by the browser's systems.
pub mod types {
    pub const FOCUS_REQUEST: &str = "focus_request";
    pub const FOCUS: &str = "focus";
    pub const BLUR: &str = "blur";
    pub const KEY: &str = "key";
    pub const DEVICE_END: &str = "device_end";
    pub const LOCATION: &str = "location";
}

/// Where in propagation an event currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not yet dispatched, or finished dispatching.
    None,
    /// Travelling down from the window towards the target.
    Capturing,
    /// Being delivered at the target.
    AtTarget,
    /// Travelling back up from the target to the window.
    Bubbling,
}

/// Typed payload carried alongside the event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDetail {
    None,
    Key {
        code: KeyCode,
        modifiers: KeyModifiers,
    },
    /// A playback device finished (or discarded) a unit on a channel.
    DeviceEnd { channel: u32 },
    Location {
        old: Option<String>,
        new: String,
    },
}

#[derive(Debug, Clone)]
pub struct Event {
    event_type: String,
    detail: EventDetail,
    synchronous: bool,
    bubbles: bool,
    target: Option<NodeId>,
    current_target: Option<NodeId>,
    phase: Phase,
    propagate: bool,
    propagate_immediately: bool,
    timestamp: Option<SystemTime>,
}

impl Event {
    /// A synchronous, bubbling event with no detail.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self::with_policy(event_type, true, true)
    }

    pub fn with_policy(event_type: impl Into<String>, synchronous: bool, bubbles: bool) -> Self {
        Self {
            event_type: event_type.into(),
            detail: EventDetail::None,
            synchronous,
            bubbles,
            target: None,
            current_target: None,
            phase: Phase::None,
            propagate: true,
            propagate_immediately: true,
            timestamp: None,
        }
    }

    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Raised by a node that wants focus. Bubbles up to the focus controller.
    pub fn focus_request() -> Self {
        Self::with_policy(types::FOCUS_REQUEST, true, true)
    }

    /// Raised on a node that gained focus. Does not bubble.
    pub fn focus() -> Self {
        Self::with_policy(types::FOCUS, true, false)
    }

    /// Raised on a node that lost focus. Does not bubble.
    pub fn blur() -> Self {
        Self::with_policy(types::BLUR, true, false)
    }

    pub fn key(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self::new(types::KEY).with_detail(EventDetail::Key { code, modifiers })
    }

    pub fn device_end(channel: u32) -> Self {
        Self::new(types::DEVICE_END).with_detail(EventDetail::DeviceEnd { channel })
    }

    pub fn location(old: Option<String>, new: String) -> Self {
        Self::new(types::LOCATION).with_detail(EventDetail::Location { old, new })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn detail(&self) -> &EventDetail {
        &self.detail
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// The node the event was dispatched at. Fixed after the first dispatch.
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// The node whose listeners are running. `None` outside an active fire.
    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    pub fn should_propagate(&self) -> bool {
        self.propagate
    }

    pub fn should_propagate_immediately(&self) -> bool {
        self.propagate_immediately
    }

    /// Finishes the listeners at the current target, then stops.
    pub fn stop_propagation(&mut self) {
        self.propagate = false;
    }

    /// Stops at once: no further listener runs, not even at the current target.
    pub fn stop_immediate_propagation(&mut self) {
        self.propagate = false;
        self.propagate_immediately = false;
    }

    pub(crate) fn set_target(&mut self, target: NodeId) {
        self.target = Some(target);
    }

    pub(crate) fn relocate(&mut self, current_target: NodeId, phase: Phase) {
        self.current_target = Some(current_target);
        self.phase = phase;
    }

    pub(crate) fn stamp(&mut self) {
        self.timestamp = Some(SystemTime::now());
    }

    pub(crate) fn settle(&mut self) {
        self.phase = Phase::None;
        self.current_target = None;
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Event({})>", self.event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_defaults() {
        let event = Event::new("foo");
        assert_eq!(event.event_type(), "foo");
        assert!(event.is_synchronous());
        assert!(event.bubbles());
        assert_eq!(event.phase(), Phase::None);
        assert!(event.target().is_none());
        assert!(event.timestamp().is_none());
        assert!(event.should_propagate());
    }

    #[test]
    fn test_stop_immediate_also_stops_propagation() {
        let mut event = Event::new("foo");
        event.stop_immediate_propagation();
        assert!(!event.should_propagate());
        assert!(!event.should_propagate_immediately());

        let mut event = Event::new("foo");
        event.stop_propagation();
        assert!(!event.should_propagate());
        assert!(event.should_propagate_immediately());
    }

    #[test]
    fn test_focus_events_do_not_bubble() {
        assert!(Event::focus_request().bubbles());
        assert!(!Event::focus().bubbles());
        assert!(!Event::blur().bubbles());
        assert!(Event::focus().is_synchronous());
    }

    #[test]
    fn test_key_event_carries_combo() {
        let event = Event::key(KeyCode::Right, KeyModifiers::SHIFT);
        assert_eq!(event.event_type(), types::KEY);
        assert_eq!(
            event.detail(),
            &EventDetail::Key {
                code: KeyCode::Right,
                modifiers: KeyModifiers::SHIFT
            }
        );
    }

    #[test]
    fn test_display_names_type() {
        assert_eq!(Event::device_end(3).to_string(), "<Event(device_end)>");
    }
}
