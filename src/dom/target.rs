//! # Event Target
//!
//! Per-node listener registries. Every addressable node (the window
//! included) gets one lazily, on its first registration.
//!
//! Two maps keyed by event type, one for capture listeners and one for
//! everything else. Lists keep insertion order, which is invocation order.
//! A type whose list empties is removed from its map.

use std::collections::HashMap;
use std::ptr;
use std::sync::Arc;

use super::document::Document;
use super::event::Event;

/// A registered event callback. Identity (the `Arc` allocation) is what
/// `remove_event_listener` matches on.
pub type Listener = Arc<dyn Fn(&Document, &mut Event) + Send + Sync>;

/// Wraps a closure as a [`Listener`].
pub fn listener<F>(callback: F) -> Listener
where
    F: Fn(&Document, &mut Event) + Send + Sync + 'static,
{
    Arc::new(callback)
}

#[derive(Default)]
pub struct EventTarget {
    listeners: HashMap<String, Vec<Listener>>,
    capture_listeners: HashMap<String, Vec<Listener>>,
}

impl EventTarget {
    /// Appends `listener`. Registering the same handle twice runs it twice.
    pub fn add(&mut self, event_type: &str, listener: Listener, use_capture: bool) {
        self.map_mut(use_capture)
            .entry(event_type.to_string())
            .or_default()
            .push(listener);
    }

    /// Removes the first registration of `listener`. Returns `false` when it
    /// was not registered for this type and phase.
    pub fn remove(&mut self, event_type: &str, listener: &Listener, use_capture: bool) -> bool {
        let map = self.map_mut(use_capture);
        let Some(list) = map.get_mut(event_type) else {
            return false;
        };
        let Some(index) = list.iter().position(|l| same_listener(l, listener)) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            map.remove(event_type);
        }
        true
    }

    /// Snapshot of the listeners for one type and phase.
    pub fn listeners_for(&self, event_type: &str, use_capture: bool) -> Vec<Listener> {
        self.map(use_capture)
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_type(&self, event_type: &str, use_capture: bool) -> bool {
        self.map(use_capture).contains_key(event_type)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.capture_listeners.is_empty()
    }

    fn map(&self, use_capture: bool) -> &HashMap<String, Vec<Listener>> {
        if use_capture {
            &self.capture_listeners
        } else {
            &self.listeners
        }
    }

    fn map_mut(&mut self, use_capture: bool) -> &mut HashMap<String, Vec<Listener>> {
        if use_capture {
            &mut self.capture_listeners
        } else {
            &mut self.listeners
        }
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
