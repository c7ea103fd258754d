//! # Focus
//!
//! Tracks the single focused node and is the only thing allowed to change it.
//!
//! Any node asks for focus by dispatching a `focus_request` (see
//! [`request_focus`]). The request bubbles to the window, where the
//! [`FocusController`] picks the actual target:
//!
//! 1. the candidate itself, if focusable;
//! 2. else its first focusable descendant (pre-order);
//! 3. else its nearest focusable ancestor;
//! 4. else nothing: the request is absorbed.
//!
//! A request for the already focused node is a no-op. Otherwise the old node
//! gets `blur`, the reference moves, and the new node gets `focus`.
//!
//! Requests arrive from the frame thread (keys) and from pool workers
//! (loads). A whole blur → move → focus transition runs under a gate owned by
//! one thread at a time, so requests from other threads wait their turn.
//! The owning thread may re-enter, since a `focus` listener (a container
//! redirect) may itself request focus.

use log::debug;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::dom::event::types;
use crate::dom::{Dispatch, Document, DomError, Event, NodeId, listener};

/// Asks for focus on `node`.
pub fn request_focus(doc: &Document, node: NodeId) -> Result<Dispatch, DomError> {
    doc.dispatch_event(node, Event::focus_request())
}

#[derive(Debug, Default)]
struct Gate {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Held for the length of one focus transition.
struct Transition<'a> {
    controller: &'a FocusController,
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        let mut gate = self.controller.lock_gate();
        gate.depth -= 1;
        if gate.depth == 0 {
            gate.owner = None;
            self.controller.gate_free.notify_all();
        }
    }
}

#[derive(Debug, Default)]
pub struct FocusController {
    focused: Mutex<Option<NodeId>>,
    gate: Mutex<Gate>,
    gate_free: Condvar,
}

impl FocusController {
    /// Creates the controller and starts handling focus requests that reach
    /// the window.
    pub fn install(doc: &Document) -> Result<Arc<Self>, DomError> {
        let controller = Arc::new(Self::default());
        let handler = Arc::clone(&controller);
        doc.add_event_listener(
            doc.window(),
            types::FOCUS_REQUEST,
            listener(move |doc, event| handler.on_focus_request(doc, event)),
            false,
        )?;
        Ok(controller)
    }

    /// The currently focused node, if focus has been established.
    pub fn focused(&self) -> Option<NodeId> {
        *self.focused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Where a focus request at `candidate` would land.
    pub fn find_focus_target(doc: &Document, candidate: NodeId) -> Option<NodeId> {
        if doc.is_focusable(candidate) {
            return Some(candidate);
        }
        doc.dfs(candidate, false, |node| node.is_focusable())
            .or_else(|| doc.find_first_ancestor(candidate, true, |node| node.is_focusable()))
    }

    fn on_focus_request(&self, doc: &Document, event: &mut Event) {
        let Some(candidate) = event.target() else {
            return;
        };
        let Some(target) = Self::find_focus_target(doc, candidate) else {
            debug!(
                "Focus request at {} absorbed: nothing focusable",
                doc.describe(candidate)
            );
            return;
        };
        let _transition = self.begin_transition();
        let previous = self.focused();
        if previous == Some(target) {
            return;
        }
        debug!(
            "Changing focus from: {} to: {}",
            previous.map_or_else(|| "nothing".to_string(), |p| doc.describe(p)),
            doc.describe(target)
        );
        if let Some(previous) = previous.filter(|p| doc.contains(*p)) {
            self.raise(doc, previous, Event::blur());
        }
        *self.focused.lock().unwrap_or_else(PoisonError::into_inner) = Some(target);
        self.raise(doc, target, Event::focus());
    }

    fn begin_transition(&self) -> Transition<'_> {
        let me = thread::current().id();
        let mut gate = self.lock_gate();
        while gate.owner.is_some_and(|owner| owner != me) {
            gate = self
                .gate_free
                .wait(gate)
                .unwrap_or_else(PoisonError::into_inner);
        }
        gate.owner = Some(me);
        gate.depth += 1;
        Transition { controller: self }
    }

    fn lock_gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn raise(&self, doc: &Document, node: NodeId, event: Event) {
        if let Err(e) = doc.dispatch_event(node, event) {
            debug!("Could not raise focus event on {}: {}", node, e);
        }
    }
}
