//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::core::pool::WorkerPool;
use crate::dom::{Document, EventDispatcher, NodeId};
use crate::systems::audio::PlaybackDevice;

/// A fresh document on its own small worker pool.
pub fn test_document() -> Document {
    let pool = WorkerPool::new(2).expect("worker pool");
    Document::new(EventDispatcher::new(pool))
}

/// Builds this detached tree and returns its root with a tag → id map:
///
/// ```text
/// A
/// ├── 1
/// │   ├── i
/// │   └── ii
/// ├── 2
/// └── 3
///     └── j
/// ```
pub fn build_tree(doc: &Document) -> (NodeId, HashMap<&'static str, NodeId>) {
    let mut names = HashMap::new();
    let mut add = |tag: &'static str, parent: Option<NodeId>| {
        let id = doc.create_element(tag);
        if let Some(parent) = parent {
            doc.append_child(parent, id).expect("append");
        }
        names.insert(tag, id);
        id
    };
    let root = add("A", None);
    let one = add("1", Some(root));
    add("i", Some(one));
    add("ii", Some(one));
    add("2", Some(root));
    let three = add("3", Some(root));
    add("j", Some(three));
    (root, names)
}

/// Writes `contents` to a per-process temp file and returns its path.
pub fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("bowser-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).expect("write temp file");
    path
}

/// Playback device that records what it was asked to do.
pub struct RecordingDevice<P> {
    played: Arc<Mutex<Vec<P>>>,
    stops: Arc<Mutex<usize>>,
}

impl<P> Default for RecordingDevice<P> {
    fn default() -> Self {
        Self {
            played: Arc::default(),
            stops: Arc::default(),
        }
    }
}

impl<P> Clone for RecordingDevice<P> {
    fn clone(&self) -> Self {
        Self {
            played: Arc::clone(&self.played),
            stops: Arc::clone(&self.stops),
        }
    }
}

impl<P: Clone> RecordingDevice<P> {
    pub fn played(&self) -> Vec<P> {
        self.played.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        *self.stops.lock().unwrap()
    }
}

impl<P: Send> PlaybackDevice<P> for RecordingDevice<P> {
    fn play(&mut self, payload: P) {
        self.played.lock().unwrap().push(payload);
    }

    fn stop(&mut self) {
        *self.stops.lock().unwrap() += 1;
    }
}
