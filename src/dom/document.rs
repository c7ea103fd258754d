//! # Document
//!
//! The live node tree, stored as an arena indexed by [`NodeId`].
//!
//! ```text
//! Document
//! ├── window (NodeId 0)            // top-level event target, holds location
//! │   └── root                     // swapped in by the resource loader
//! │       ├── child                // children: ordered, owning
//! │       └── child                // parent: plain index, non-owning
//! └── dispatcher: EventDispatcher  // injected, one per document
//! ```
//!
//! Each node record carries its own listener registry, so removing a subtree
//! frees its listeners with it. Node ids are never reused.
//!
//! The whole arena sits behind one `RwLock`. It is never held while a
//! listener runs: listeners may freely read the tree, register listeners and
//! dispatch nested events.

use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::dispatch::{Dispatch, EventDispatcher};
use super::event::Event;
use super::target::{EventTarget, Listener};
use crate::systems::navigation::NavigationTheme;

/// Attribute that makes a node (un)focusable.
pub const FOCUSABLE_ATTR: &str = "focusable";
/// Container attribute naming its navigation theme.
pub const NAVIGATION_THEME_ATTR: &str = "navigation_theme";
/// Container attribute keeping the cursor across re-entry.
pub const REMEMBER_POSITION_ATTR: &str = "remember_position";

const WINDOW_TAG: &str = "#window";

/// Case-insensitive truthy tokens accepted by boolean attributes.
const TRUTHY: [&str; 5] = ["true", "t", "yes", "1", "y"];

/// Parses an attribute value as a boolean.
pub fn parse_bool(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TRUTHY.contains(&value.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// No live node has this id.
    UnknownNode(NodeId),
    /// `remove_event_listener` found no matching registration.
    ListenerNotFound { node: NodeId, event_type: String },
    /// A typed attribute setter rejected the value.
    InvalidAttribute {
        name: String,
        value: String,
        reason: String,
    },
    /// The child already has a parent.
    AlreadyAttached(NodeId),
    /// The event was already dispatched at a different target.
    Retargeted { target: NodeId, requested: NodeId },
    /// The window cannot be moved, removed or re-parented.
    WindowNotAllowed,
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::UnknownNode(id) => write!(f, "unknown node {id}"),
            DomError::ListenerNotFound { node, event_type } => {
                write!(f, "no {event_type} listener registered on {node}")
            }
            DomError::InvalidAttribute {
                name,
                value,
                reason,
            } => write!(f, "invalid value {value:?} for attribute {name}: {reason}"),
            DomError::AlreadyAttached(id) => write!(f, "node {id} already has a parent"),
            DomError::Retargeted { target, requested } => {
                write!(f, "event already targeted at {target}, cannot dispatch at {requested}")
            }
            DomError::WindowNotAllowed => write!(f, "operation not allowed on the window"),
        }
    }
}

impl std::error::Error for DomError {}

// ============================================================================
// Node Variants (typed attribute schema)
// ============================================================================

/// Typed properties of a `container` node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerProps {
    /// `None` means the configured default theme.
    pub theme: Option<NavigationTheme>,
    pub remember_position: bool,
}

/// Node variant, chosen from the tag at construction. Decides which
/// attributes have typed setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Window,
    /// Document root (`ram` / `document`). Never focusable itself.
    Document,
    Container(ContainerProps),
    /// Heading a container; skipped by linear navigation.
    Title,
    Paragraph,
    Element,
}

impl NodeKind {
    pub fn for_tag(tag: &str) -> Self {
        match tag {
            "ram" | "document" => NodeKind::Document,
            "container" => NodeKind::Container(ContainerProps::default()),
            "title" => NodeKind::Title,
            "p" | "paragraph" => NodeKind::Paragraph,
            _ => NodeKind::Element,
        }
    }

    pub fn is_title(&self) -> bool {
        matches!(self, NodeKind::Title)
    }

    pub fn container_props(&self) -> Option<&ContainerProps> {
        match self {
            NodeKind::Container(props) => Some(props),
            _ => None,
        }
    }

    fn focusable_by_default(&self) -> bool {
        !matches!(self, NodeKind::Window | NodeKind::Document)
    }
}

pub struct Node {
    tag: String,
    kind: NodeKind,
    attributes: HashMap<String, String>,
    text: Option<String>,
    focusable: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Option<EventTarget>,
}

impl Node {
    fn new(tag: &str) -> Self {
        let kind = NodeKind::for_tag(tag);
        Self {
            tag: tag.to_string(),
            focusable: kind.focusable_by_default(),
            kind,
            attributes: HashMap::new(),
            text: None,
            parent: None,
            children: Vec::new(),
            listeners: None,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Reads an attribute as a boolean, `default` when absent.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.attribute(name).map_or(default, parse_bool)
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_focusable(&self) -> bool {
        self.focusable
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Stores the raw value, then runs the typed setter for this variant.
    fn apply_attribute(&mut self, name: &str, value: &str) -> Result<(), DomError> {
        match (&mut self.kind, name) {
            (NodeKind::Window, _) => return Err(DomError::WindowNotAllowed),
            (_, FOCUSABLE_ATTR) => self.focusable = parse_bool(value),
            (NodeKind::Container(props), NAVIGATION_THEME_ATTR) => {
                let theme = value.parse::<NavigationTheme>().map_err(|e| {
                    DomError::InvalidAttribute {
                        name: name.to_string(),
                        value: value.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                props.theme = Some(theme);
            }
            (NodeKind::Container(props), REMEMBER_POSITION_ATTR) => {
                props.remember_position = parse_bool(value);
            }
            _ => {}
        }
        self.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)
    }
}

// ============================================================================
// Document
// ============================================================================

struct Tree {
    nodes: Vec<Option<Node>>,
    root: Option<NodeId>,
    location: Option<String>,
}

impl Tree {
    fn get(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(DomError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(DomError::UnknownNode(id))
    }

    /// Unlinks `id` from its parent and frees the whole subtree.
    fn remove_subtree(&mut self, id: NodeId) -> Result<(), DomError> {
        let parent = self.get(id)?.parent;
        if let Some(parent) = parent {
            if let Ok(parent) = self.get_mut(parent) {
                parent.children.retain(|child| *child != id);
            }
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        Ok(())
    }
}

struct Shared {
    tree: RwLock<Tree>,
    dispatcher: EventDispatcher,
}

/// Shared handle to a document. Clones refer to the same tree.
#[derive(Clone)]
pub struct Document {
    shared: Arc<Shared>,
}

const WINDOW: NodeId = NodeId(0);

impl Document {
    /// Creates an empty document (window only) dispatching through `dispatcher`.
    pub fn new(dispatcher: EventDispatcher) -> Self {
        Self {
            shared: Arc::new(Shared {
                tree: RwLock::new(Tree {
                    nodes: vec![Some(Node::new(WINDOW_TAG))],
                    root: None,
                    location: None,
                }),
                dispatcher,
            }),
        }
    }

    pub fn window(&self) -> NodeId {
        WINDOW
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.shared.dispatcher
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Creates a detached element. Its variant is picked from `tag`.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut tree = self.write();
        let id = NodeId(tree.nodes.len());
        tree.nodes.push(Some(Node::new(tag)));
        id
    }

    /// Appends `child` as the last child of `parent`.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if child == WINDOW {
            return Err(DomError::WindowNotAllowed);
        }
        let mut tree = self.write();
        tree.get(parent)?;
        let node = tree.get_mut(child)?;
        if node.parent.is_some() {
            return Err(DomError::AlreadyAttached(child));
        }
        node.parent = Some(parent);
        tree.get_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Removes `node` and its whole subtree, listeners included.
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        if node == WINDOW {
            return Err(DomError::WindowNotAllowed);
        }
        self.write().remove_subtree(node)
    }

    /// Makes `node` the document root under the window, removing the old root.
    pub fn set_root(&self, node: NodeId) -> Result<(), DomError> {
        if node == WINDOW {
            return Err(DomError::WindowNotAllowed);
        }
        let mut tree = self.write();
        if tree.get(node)?.parent.is_some() {
            return Err(DomError::AlreadyAttached(node));
        }
        if let Some(old) = tree.root.take() {
            debug!("Replacing root {} with {}", old, node);
            tree.remove_subtree(old)?;
        }
        tree.get_mut(node)?.parent = Some(WINDOW);
        tree.get_mut(WINDOW)?.children = vec![node];
        tree.root = Some(node);
        Ok(())
    }

    pub fn root(&self) -> Option<NodeId> {
        self.read().root
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.read().get(node).is_ok()
    }

    /// Live nodes, the window included.
    pub fn node_count(&self) -> usize {
        self.read().nodes.iter().flatten().count()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.read().get(node).ok().and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.read()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Runs `f` against a node under the read lock.
    ///
    /// `f` must not call back into the document.
    pub fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&Node) -> R) -> Option<R> {
        self.read().get(node).ok().map(f)
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.with_node(node, |n| n.tag.clone())
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.with_node(node, |n| n.kind.clone())
    }

    /// `tag(id)` for log lines.
    pub fn describe(&self, node: NodeId) -> String {
        match self.tag(node) {
            Some(tag) => format!("{}({})", tag, node.0),
            None => format!("<removed>({})", node.0),
        }
    }

    // ------------------------------------------------------------------
    // Attributes and text
    // ------------------------------------------------------------------

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.write().get_mut(node)?.apply_attribute(name, value)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.with_node(node, |n| n.attribute(name).map(str::to_string))
            .flatten()
    }

    pub fn get_bool(&self, node: NodeId, name: &str, default: bool) -> bool {
        self.with_node(node, |n| n.get_bool(name, default))
            .unwrap_or(default)
    }

    pub fn is_focusable(&self, node: NodeId) -> bool {
        self.with_node(node, Node::is_focusable).unwrap_or(false)
    }

    pub fn set_text(&self, node: NodeId, text: impl Into<String>) -> Result<(), DomError> {
        self.write().get_mut(node)?.text = Some(text.into());
        Ok(())
    }

    pub fn text(&self, node: NodeId) -> Option<String> {
        self.with_node(node, |n| n.text.clone()).flatten()
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Pre-order depth-first search from `start` for the first node matching
    /// `predicate`.
    pub fn dfs(
        &self,
        start: NodeId,
        include_self: bool,
        mut predicate: impl FnMut(&Node) -> bool,
    ) -> Option<NodeId> {
        let tree = self.read();
        let first = tree.get(start).ok()?;
        if include_self && predicate(first) {
            return Some(start);
        }
        let mut stack: Vec<NodeId> = first.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Ok(node) = tree.get(id) else { continue };
            if predicate(node) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// Visits `start` and every descendant in pre-order.
    pub fn dfs_do(&self, start: NodeId, mut visitor: impl FnMut(NodeId, &Node)) {
        let tree = self.read();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Ok(node) = tree.get(id) else { continue };
            visitor(id, node);
            stack.extend(node.children.iter().rev().copied());
        }
    }

    /// Walks up from `start` for the first node matching `predicate`.
    pub fn find_first_ancestor(
        &self,
        start: NodeId,
        include_self: bool,
        mut predicate: impl FnMut(&Node) -> bool,
    ) -> Option<NodeId> {
        let tree = self.read();
        let mut current = if include_self {
            Some(start)
        } else {
            tree.get(start).ok()?.parent
        };
        while let Some(id) = current {
            let node = tree.get(id).ok()?;
            if predicate(node) {
                return Some(id);
            }
            current = node.parent;
        }
        None
    }

    /// Ancestors of `target`, window first, direct parent last.
    pub(crate) fn propagation_path(&self, target: NodeId) -> Vec<NodeId> {
        let tree = self.read();
        let mut path = Vec::new();
        let mut current = tree.get(target).ok().and_then(|n| n.parent);
        while let Some(id) = current {
            path.push(id);
            current = tree.get(id).ok().and_then(|n| n.parent);
        }
        path.reverse();
        path
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn add_event_listener(
        &self,
        node: NodeId,
        event_type: &str,
        listener: Listener,
        use_capture: bool,
    ) -> Result<(), DomError> {
        self.write()
            .get_mut(node)?
            .listeners
            .get_or_insert_with(EventTarget::default)
            .add(event_type, listener, use_capture);
        Ok(())
    }

    /// Removes the first registration of `listener` for this type and phase.
    pub fn remove_event_listener(
        &self,
        node: NodeId,
        event_type: &str,
        listener: &Listener,
        use_capture: bool,
    ) -> Result<(), DomError> {
        let mut tree = self.write();
        let entry = tree.get_mut(node)?;
        let removed = entry
            .listeners
            .as_mut()
            .is_some_and(|target| target.remove(event_type, listener, use_capture));
        if !removed {
            return Err(DomError::ListenerNotFound {
                node,
                event_type: event_type.to_string(),
            });
        }
        if entry.listeners.as_ref().is_some_and(EventTarget::is_empty) {
            entry.listeners = None;
        }
        Ok(())
    }

    /// Snapshot of one node's listeners; empty for removed nodes.
    pub(crate) fn listeners_for(
        &self,
        node: NodeId,
        event_type: &str,
        use_capture: bool,
    ) -> Vec<Listener> {
        self.read()
            .get(node)
            .ok()
            .and_then(|n| n.listeners.as_ref())
            .map(|target| target.listeners_for(event_type, use_capture))
            .unwrap_or_default()
    }

    /// Dispatches `event` at `target`: inline when synchronous, on the worker
    /// pool otherwise.
    pub fn dispatch_event(&self, target: NodeId, mut event: Event) -> Result<Dispatch, DomError> {
        self.read().get(target)?;
        match event.target() {
            Some(existing) if existing != target => {
                return Err(DomError::Retargeted {
                    target: existing,
                    requested: target,
                });
            }
            Some(_) => {}
            None => event.set_target(target),
        }
        Ok(self.shared.dispatcher.fire(self, target, event))
    }

    // ------------------------------------------------------------------
    // Window location
    // ------------------------------------------------------------------

    pub fn location(&self) -> Option<String> {
        self.read().location.clone()
    }

    /// Updates the location and announces it with a `location` event at the
    /// window.
    pub fn set_location(&self, location: impl Into<String>) -> Result<Dispatch, DomError> {
        let location = location.into();
        let old = self.write().location.replace(location.clone());
        self.dispatch_event(WINDOW, Event::location(old, location))
    }

    fn read(&self) -> RwLockReadGuard<'_, Tree> {
        self.shared
            .tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tree> {
        self.shared
            .tree
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
