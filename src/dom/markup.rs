//! # Markup
//!
//! Documents are JSON trees of elements:
//!
//! ```json
//! { "tag": "ram", "children": [
//!     { "tag": "container", "attributes": { "navigation_theme": "vertical" },
//!       "children": [
//!         { "tag": "title", "text": "Menu" },
//!         { "tag": "p", "text": "First item" }
//!     ] }
//! ] }
//! ```
//!
//! [`build`] turns a parsed tree into detached document nodes, applying each
//! attribute through the node variant's typed setters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::document::{Document, DomError, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MarkupNode {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<MarkupNode>,
}

impl MarkupNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            text: None,
            children: Vec::new(),
        }
    }
}

pub fn parse(source: &str) -> Result<MarkupNode, serde_json::Error> {
    serde_json::from_str(source)
}

/// Creates the nodes for `markup` and returns the (detached) top node. On
/// error every node created so far is removed again.
pub fn build(doc: &Document, markup: &MarkupNode) -> Result<NodeId, DomError> {
    let node = doc.create_element(&markup.tag);
    if let Err(e) = populate(doc, node, markup) {
        let _ = doc.remove(node);
        return Err(e);
    }
    Ok(node)
}

fn populate(doc: &Document, node: NodeId, markup: &MarkupNode) -> Result<(), DomError> {
    for (name, value) in &markup.attributes {
        doc.set_attribute(node, name, value)?;
    }
    if let Some(text) = markup.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        doc.set_text(node, text)?;
    }
    for child in &markup.children {
        let child = build(doc, child)?;
        if let Err(e) = doc.append_child(node, child) {
            let _ = doc.remove(child);
            return Err(e);
        }
    }
    Ok(())
}
