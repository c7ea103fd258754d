//! # Document Object Model
//!
//! The node tree and the event model that runs over it.
//!
//! - [`document`]: the arena-backed tree, attribute schema and traversal
//! - [`event`]: the `Event` value and its phases
//! - [`target`]: per-node listener registries
//! - [`dispatch`]: the capture → target → bubble propagation algorithm
//! - [`markup`]: building a tree from a markup document

pub mod dispatch;
pub mod document;
pub mod event;
pub mod markup;
pub mod target;

pub use dispatch::{Dispatch, EventDispatcher};
pub use document::{ContainerProps, Document, DomError, Node, NodeId, NodeKind};
pub use event::{Event, EventDetail, Phase};
pub use target::{Listener, listener};
