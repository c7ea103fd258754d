//! # Event Dispatcher
//!
//! Runs the DOM-style propagation algorithm for one event:
//!
//! ```text
//!   window ─┐                                 ┌─▶ window
//!   root    │ 1. capturing (capture listeners) │   root      3. bubbling
//!   parent ─┘                                 └── parent       (only if bubbles)
//!              2. at target: capture listeners, then the others
//! ```
//!
//! `stop_propagation` lets the listeners at the current target finish and
//! then ends the dispatch. `stop_immediate_propagation` ends it right after
//! the calling listener.
//!
//! A panicking listener is logged and skipped; the rest still run.
//!
//! One dispatcher instance belongs to each [`Document`] and is handed in at
//! construction. Deferred (asynchronous) events run on its worker pool, each
//! event's phases in order on a single worker.

use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};

use super::document::{Document, NodeId};
use super::event::{Event, Phase};
use crate::core::pool::{WorkerPool, panic_message};

/// What `dispatch_event` did with the event.
#[derive(Debug)]
pub enum Dispatch {
    /// Propagated inline; the event is handed back for inspection.
    Completed(Event),
    /// Queued on the worker pool.
    Deferred,
}

impl Dispatch {
    /// The propagated event, for synchronous dispatches.
    pub fn into_event(self) -> Option<Event> {
        match self {
            Dispatch::Completed(event) => Some(event),
            Dispatch::Deferred => None,
        }
    }
}

#[derive(Clone)]
pub struct EventDispatcher {
    pool: WorkerPool,
}

impl EventDispatcher {
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub(crate) fn fire(&self, doc: &Document, target: NodeId, mut event: Event) -> Dispatch {
        if event.is_synchronous() {
            Execution::new(doc, target, &mut event).fire();
            Dispatch::Completed(event)
        } else {
            let doc = doc.clone();
            self.pool.submit(move || {
                let mut event = event;
                Execution::new(&doc, target, &mut event).fire();
            });
            Dispatch::Deferred
        }
    }
}

/// One propagation run. Dropping it settles the event (phase `None`, no
/// current target) on every exit path.
struct Execution<'a> {
    doc: &'a Document,
    target: NodeId,
    event: &'a mut Event,
}

impl<'a> Execution<'a> {
    fn new(doc: &'a Document, target: NodeId, event: &'a mut Event) -> Self {
        Self { doc, target, event }
    }

    fn fire(mut self) {
        debug!(
            "Firing event: {} at target {}",
            self.event,
            self.doc.describe(self.target)
        );
        self.event.stamp();
        let path = self.doc.propagation_path(self.target);

        self.fire_capture_phase(&path);
        if !self.event.should_propagate() {
            return;
        }
        self.fire_target_phase();
        if !self.event.should_propagate() {
            return;
        }
        if self.event.bubbles() {
            self.fire_bubble_phase(&path);
        }
    }

    fn fire_capture_phase(&mut self, path: &[NodeId]) {
        for &node in path {
            self.event.relocate(node, Phase::Capturing);
            self.fire_on_listeners(node, true);
            if !self.event.should_propagate() {
                return;
            }
        }
    }

    fn fire_target_phase(&mut self) {
        self.event.relocate(self.target, Phase::AtTarget);
        self.fire_on_listeners(self.target, true);
        if !self.event.should_propagate() {
            return;
        }
        self.fire_on_listeners(self.target, false);
    }

    fn fire_bubble_phase(&mut self, path: &[NodeId]) {
        for &node in path.iter().rev() {
            self.event.relocate(node, Phase::Bubbling);
            self.fire_on_listeners(node, false);
            if !self.event.should_propagate() {
                return;
            }
        }
    }

    fn fire_on_listeners(&mut self, node: NodeId, use_capture: bool) {
        let listeners = self
            .doc
            .listeners_for(node, self.event.event_type(), use_capture);
        for listener in listeners {
            let doc = self.doc;
            let event = &mut *self.event;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(doc, event))) {
                error!(
                    "Error occurred dispatching event {} at {}: {}",
                    self.event,
                    self.doc.describe(node),
                    panic_message(payload.as_ref())
                );
            }
            if !self.event.should_propagate_immediately() {
                return;
            }
        }
    }
}

impl Drop for Execution<'_> {
    fn drop(&mut self) {
        self.event.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::listener;
    use crate::test_support::{build_tree, test_document};
    use std::sync::{Arc, Mutex, mpsc};
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, label: &str) -> crate::dom::Listener {
        let log = Arc::clone(log);
        let label = label.to_string();
        listener(move |_, event| {
            log.lock()
                .unwrap()
                .push(format!("{}:{:?}", label, event.phase()));
        })
    }

    #[test]
    fn test_phases_visit_path_in_order() {
        let doc = test_document();
        let (root, names) = build_tree(&doc);
        doc.set_root(root).unwrap();
        let log: Log = Arc::default();
        let leaf = names["ii"];
        for (node, label) in [(doc.window(), "window"), (root, "A"), (names["1"], "1"), (leaf, "ii")] {
            doc.add_event_listener(node, "foo", recorder(&log, label), true)
                .unwrap();
            doc.add_event_listener(node, "foo", recorder(&log, label), false)
                .unwrap();
        }
        doc.dispatch_event(leaf, Event::new("foo")).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            [
                "window:Capturing",
                "A:Capturing",
                "1:Capturing",
                "ii:AtTarget",
                "ii:AtTarget",
                "1:Bubbling",
                "A:Bubbling",
                "window:Bubbling",
            ]
        );
    }

    #[test]
    fn test_non_bubbling_event_stops_at_target() {
        let doc = test_document();
        let (root, names) = build_tree(&doc);
        let log: Log = Arc::default();
        doc.add_event_listener(root, "foo", recorder(&log, "A"), false)
            .unwrap();
        doc.dispatch_event(names["i"], Event::with_policy("foo", true, false))
            .unwrap();
        assert!(log.lock().unwrap().is_empty());
        doc.dispatch_event(root, Event::with_policy("foo", true, false))
            .unwrap();
        assert_eq!(*log.lock().unwrap(), ["A:AtTarget"]);
    }

    #[test]
    fn test_event_is_settled_after_dispatch() {
        let doc = test_document();
        let (root, _) = build_tree(&doc);
        let event = doc
            .dispatch_event(root, Event::new("foo"))
            .unwrap()
            .into_event()
            .unwrap();
        assert_eq!(event.phase(), Phase::None);
        assert!(event.current_target().is_none());
        assert_eq!(event.target(), Some(root));
        assert!(event.timestamp().is_some());
    }

    #[test]
    fn test_current_target_tracks_listener_owner() {
        let doc = test_document();
        let (root, names) = build_tree(&doc);
        let (tx, rx) = mpsc::channel();
        doc.add_event_listener(
            root,
            "foo",
            listener(move |_, event| tx.send((event.current_target(), event.target())).unwrap()),
            true,
        )
        .unwrap();
        doc.dispatch_event(names["j"], Event::new("foo")).unwrap();
        assert_eq!(rx.recv().unwrap(), (Some(root), Some(names["j"])));
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let doc = test_document();
        let (root, _) = build_tree(&doc);
        let log: Log = Arc::default();
        doc.add_event_listener(root, "foo", listener(|_, _| panic!("bad listener")), false)
            .unwrap();
        doc.add_event_listener(root, "foo", recorder(&log, "after"), false)
            .unwrap();
        let event = doc
            .dispatch_event(root, Event::new("foo"))
            .unwrap()
            .into_event()
            .unwrap();
        assert_eq!(*log.lock().unwrap(), ["after:AtTarget"]);
        assert_eq!(event.phase(), Phase::None);
    }

    #[test]
    fn test_async_event_runs_on_worker() {
        let doc = test_document();
        let (root, names) = build_tree(&doc);
        let (tx, rx) = mpsc::channel();
        let caller = std::thread::current().id();
        doc.add_event_listener(
            root,
            "foo",
            listener(move |_, event| {
                tx.send((event.phase(), std::thread::current().id())).unwrap();
            }),
            false,
        )
        .unwrap();
        let dispatch = doc
            .dispatch_event(names["i"], Event::with_policy("foo", false, true))
            .unwrap();
        assert!(matches!(dispatch, Dispatch::Deferred));
        let (phase, worker) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(phase, Phase::Bubbling);
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_redispatch_at_other_target_is_rejected() {
        let doc = test_document();
        let (root, names) = build_tree(&doc);
        let event = doc
            .dispatch_event(root, Event::new("foo"))
            .unwrap()
            .into_event()
            .unwrap();
        let err = doc.dispatch_event(names["1"], event).unwrap_err();
        assert!(matches!(err, crate::dom::DomError::Retargeted { .. }));
    }

    #[test]
    fn test_listener_may_dispatch_nested_events() {
        let doc = test_document();
        let (root, names) = build_tree(&doc);
        let log: Log = Arc::default();
        let leaf = names["j"];
        doc.add_event_listener(
            root,
            "outer",
            listener(move |doc, _| {
                doc.dispatch_event(leaf, Event::new("inner")).unwrap();
            }),
            false,
        )
        .unwrap();
        doc.add_event_listener(leaf, "inner", recorder(&log, "j"), false)
            .unwrap();
        doc.dispatch_event(root, Event::new("outer")).unwrap();
        assert_eq!(*log.lock().unwrap(), ["j:AtTarget"]);
    }
}
