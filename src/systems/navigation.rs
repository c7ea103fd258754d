//! # Linear Navigation
//!
//! Every `container` node gets a [`NavigationController`]: a cursor over its
//! children (title excluded) moved by a forward/backward key pair.
//!
//! ```text
//!   container [title] A  B  C        theme horizontal: → forward, ← backward
//!                     ▲
//!                   cursor           clamped at both ends, no wraparound
//! ```
//!
//! A container is never the durable focus target: when it receives `focus`
//! itself it forwards focus one level down (title first, else the cursor's
//! child) and stops the incoming event.

use crossterm::event::{KeyCode, KeyModifiers};
use log::debug;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use super::focus::request_focus;
use crate::dom::event::types;
use crate::dom::{Document, DomError, Event, EventDetail, NodeId, NodeKind, Phase, listener};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    UnknownTheme(String),
    UnknownKey(String),
    UnknownModifier(String),
    /// Sequences such as `"ctrl+x ctrl+s"` are not supported.
    MultiCombo(String),
    Empty,
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationError::UnknownTheme(theme) => {
                write!(f, "unrecognized navigation theme: {theme}")
            }
            NavigationError::UnknownKey(key) => write!(f, "the key {key} is not a valid key"),
            NavigationError::UnknownModifier(modifier) => {
                write!(f, "the modifier {modifier} is not a valid modifier")
            }
            NavigationError::MultiCombo(combo) => {
                write!(f, "multi-key sequences are not supported: {combo}")
            }
            NavigationError::Empty => write!(f, "empty key combo"),
        }
    }
}

impl std::error::Error for NavigationError {}

// ============================================================================
// Key Combos
// ============================================================================

/// A key plus the modifiers that must be held, e.g. `ctrl+shift+RIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    code: KeyCode,
    modifiers: KeyModifiers,
}

impl KeyCombo {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self {
            code: normalize(code),
            modifiers,
        }
    }

    pub fn code(&self) -> KeyCode {
        self.code
    }

    pub fn modifiers(&self) -> KeyModifiers {
        self.modifiers
    }

    /// True when the key matches and at least this combo's modifiers are held.
    pub fn matches(&self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        modifiers.contains(self.modifiers) && normalize(code) == self.code
    }
}

impl FromStr for KeyCombo {
    type Err = NavigationError;

    fn from_str(combo: &str) -> Result<Self, Self::Err> {
        let mut combos = combo.split_whitespace();
        let single = combos.next().ok_or(NavigationError::Empty)?;
        if combos.next().is_some() {
            return Err(NavigationError::MultiCombo(combo.trim().to_string()));
        }
        let parts: Vec<&str> = single.split('+').collect();
        let (key, modifier_names) = parts.split_last().ok_or(NavigationError::Empty)?;
        let mut modifiers = KeyModifiers::NONE;
        for name in modifier_names {
            modifiers |= parse_modifier(name)?;
        }
        Ok(Self::new(parse_key(key)?, modifiers))
    }
}

fn parse_modifier(name: &str) -> Result<KeyModifiers, NavigationError> {
    match name.to_lowercase().as_str() {
        "ctrl" | "control" => Ok(KeyModifiers::CONTROL),
        "shift" => Ok(KeyModifiers::SHIFT),
        "alt" => Ok(KeyModifiers::ALT),
        "meta" => Ok(KeyModifiers::META),
        "super" => Ok(KeyModifiers::SUPER),
        _ => Err(NavigationError::UnknownModifier(name.to_string())),
    }
}

fn parse_key(key: &str) -> Result<KeyCode, NavigationError> {
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Ok(KeyCode::Char(c.to_ascii_lowercase()));
        }
    }
    let code = match key.to_uppercase().as_str() {
        "LEFT" => KeyCode::Left,
        "RIGHT" => KeyCode::Right,
        "UP" => KeyCode::Up,
        "DOWN" => KeyCode::Down,
        "ENTER" | "RETURN" => KeyCode::Enter,
        "ESCAPE" | "ESC" => KeyCode::Esc,
        "TAB" => KeyCode::Tab,
        "SPACE" => KeyCode::Char(' '),
        "BACKSPACE" => KeyCode::Backspace,
        "HOME" => KeyCode::Home,
        "END" => KeyCode::End,
        "PAGEUP" => KeyCode::PageUp,
        "PAGEDOWN" => KeyCode::PageDown,
        other => other
            .strip_prefix('F')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=12).contains(n))
            .map(KeyCode::F)
            .ok_or_else(|| NavigationError::UnknownKey(key.to_string()))?,
    };
    Ok(code)
}

fn normalize(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

// ============================================================================
// Themes
// ============================================================================

/// Which directional keys move forward and backward inside a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavigationTheme {
    #[default]
    Horizontal,
    Vertical,
    ReverseHorizontal,
    ReverseVertical,
}

impl NavigationTheme {
    /// The (forward, backward) key pair.
    pub fn combos(self) -> (KeyCombo, KeyCombo) {
        let none = KeyModifiers::NONE;
        let (forward, backward) = match self {
            NavigationTheme::Horizontal => (KeyCode::Right, KeyCode::Left),
            NavigationTheme::Vertical => (KeyCode::Down, KeyCode::Up),
            NavigationTheme::ReverseHorizontal => (KeyCode::Left, KeyCode::Right),
            NavigationTheme::ReverseVertical => (KeyCode::Up, KeyCode::Down),
        };
        (KeyCombo::new(forward, none), KeyCombo::new(backward, none))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NavigationTheme::Horizontal => "horizontal",
            NavigationTheme::Vertical => "vertical",
            NavigationTheme::ReverseHorizontal => "reverse_horizontal",
            NavigationTheme::ReverseVertical => "reverse_vertical",
        }
    }
}

impl FromStr for NavigationTheme {
    type Err = NavigationError;

    fn from_str(theme: &str) -> Result<Self, Self::Err> {
        match theme.trim().to_lowercase().as_str() {
            "horizontal" => Ok(NavigationTheme::Horizontal),
            "vertical" => Ok(NavigationTheme::Vertical),
            "reverse_horizontal" => Ok(NavigationTheme::ReverseHorizontal),
            "reverse_vertical" => Ok(NavigationTheme::ReverseVertical),
            _ => Err(NavigationError::UnknownTheme(theme.to_string())),
        }
    }
}

impl fmt::Display for NavigationTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug)]
pub struct NavigationController {
    container: NodeId,
    forward: KeyCombo,
    backward: KeyCombo,
    remember_position: bool,
    cursor: Mutex<Option<usize>>,
}

impl NavigationController {
    pub fn new(container: NodeId, theme: NavigationTheme, remember_position: bool) -> Self {
        let (forward, backward) = theme.combos();
        Self {
            container,
            forward,
            backward,
            remember_position,
            cursor: Mutex::new(None),
        }
    }

    /// Whether focus landing on `node` moves on to a title or child. True
    /// for containers with any children.
    pub fn redirects_focus(doc: &Document, node: NodeId) -> bool {
        matches!(doc.kind(node), Some(NodeKind::Container(_))) && !doc.children(node).is_empty()
    }

    /// Builds a controller from the container's typed attributes and starts
    /// listening for keys and focus on it.
    pub fn attach(
        doc: &Document,
        container: NodeId,
        default_theme: NavigationTheme,
    ) -> Result<Arc<Self>, DomError> {
        let props = doc
            .kind(container)
            .ok_or(DomError::UnknownNode(container))?
            .container_props()
            .cloned()
            .unwrap_or_default();
        let theme = props.theme.unwrap_or(default_theme);
        let controller = Arc::new(Self::new(container, theme, props.remember_position));

        let on_key = Arc::clone(&controller);
        doc.add_event_listener(
            container,
            types::KEY,
            listener(move |doc, event| on_key.on_key(doc, event)),
            false,
        )?;
        let on_focus = Arc::clone(&controller);
        doc.add_event_listener(
            container,
            types::FOCUS,
            listener(move |doc, event| on_focus.on_focus(doc, event)),
            false,
        )?;
        debug!(
            "Navigation on {} uses theme {}",
            doc.describe(container),
            theme
        );
        Ok(controller)
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn cursor(&self) -> Option<usize> {
        *self.lock_cursor()
    }

    /// Moves to the next child and requests focus on it. Returns the child,
    /// or `None` at the last child.
    pub fn navigate_forwards(&self, doc: &Document) -> Option<NodeId> {
        let children = self.navigable_children(doc);
        let child = {
            let mut cursor = self.lock_cursor();
            let next = match *cursor {
                None if !children.is_empty() => 0,
                Some(index) if index + 1 < children.len() => index + 1,
                _ => return None,
            };
            *cursor = Some(next);
            children[next]
        };
        self.focus_child(doc, child);
        Some(child)
    }

    /// Moves to the previous child and requests focus on it. Returns the
    /// child, or `None` at the first child or with no cursor.
    pub fn navigate_backwards(&self, doc: &Document) -> Option<NodeId> {
        let children = self.navigable_children(doc);
        let child = {
            let mut cursor = self.lock_cursor();
            let previous = match *cursor {
                Some(index) if index > 0 => index - 1,
                _ => return None,
            };
            let child = *children.get(previous)?;
            *cursor = Some(previous);
            child
        };
        self.focus_child(doc, child);
        Some(child)
    }

    fn on_key(&self, doc: &Document, event: &mut Event) {
        let EventDetail::Key { code, modifiers } = *event.detail() else {
            return;
        };
        if self.forward.matches(code, modifiers) {
            self.navigate_forwards(doc);
        } else if self.backward.matches(code, modifiers) {
            self.navigate_backwards(doc);
        }
    }

    fn on_focus(&self, doc: &Document, event: &mut Event) {
        if event.phase() != Phase::AtTarget || event.target() != Some(self.container) {
            return;
        }
        if !self.remember_position {
            *self.lock_cursor() = None;
        }
        if let Some(component) = self.component_to_focus_on_reset(doc) {
            self.focus_child(doc, component);
            event.stop_propagation();
        }
    }

    fn component_to_focus_on_reset(&self, doc: &Document) -> Option<NodeId> {
        if let Some(title) = self.title(doc) {
            return Some(title);
        }
        let children = self.navigable_children(doc);
        let mut cursor = self.lock_cursor();
        let index = match *cursor {
            Some(index) => index,
            None if !children.is_empty() => {
                *cursor = Some(0);
                0
            }
            None => return None,
        };
        children.get(index).copied()
    }

    fn navigable_children(&self, doc: &Document) -> Vec<NodeId> {
        doc.children(self.container)
            .into_iter()
            .filter(|child| !doc.kind(*child).as_ref().is_some_and(NodeKind::is_title))
            .collect()
    }

    fn title(&self, doc: &Document) -> Option<NodeId> {
        doc.children(self.container)
            .into_iter()
            .find(|child| doc.kind(*child).as_ref().is_some_and(NodeKind::is_title))
    }

    fn focus_child(&self, doc: &Document, child: NodeId) {
        if let Err(e) = request_focus(doc, child) {
            debug!("Focus request on {} failed: {}", child, e);
        }
    }

    fn lock_cursor(&self) -> std::sync::MutexGuard<'_, Option<usize>> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
