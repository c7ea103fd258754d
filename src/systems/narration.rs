//! # Narration
//!
//! Speaks whatever gains focus. `focus` does not bubble, so the narrator
//! listens on the window during the capture phase, which every focus event
//! passes through on its way down.
//!
//! Capture runs before a container's own redirect, so containers that hand
//! focus to a title or child are skipped; the node they pick is spoken.

use log::debug;
use std::sync::Arc;

use super::audio::AudioChannel;
use super::mixer::Utterance;
use super::navigation::NavigationController;
use crate::dom::event::types;
use crate::dom::{Document, DomError, Event, NodeId, listener};

pub struct Narrator {
    speech: Arc<AudioChannel<Utterance>>,
    words_per_minute: u32,
}

impl Narrator {
    pub fn install(
        doc: &Document,
        speech: Arc<AudioChannel<Utterance>>,
        words_per_minute: u32,
    ) -> Result<Arc<Self>, DomError> {
        let narrator = Arc::new(Self {
            speech,
            words_per_minute,
        });
        let handler = Arc::clone(&narrator);
        doc.add_event_listener(
            doc.window(),
            types::FOCUS,
            listener(move |doc, event| handler.on_focus(doc, event)),
            true,
        )?;
        Ok(narrator)
    }

    /// Text of `node`'s subtree in depth-first order, joined with spaces.
    pub fn text_to_render(doc: &Document, node: NodeId) -> String {
        let mut texts = Vec::new();
        doc.dfs_do(node, |_, node| {
            if let Some(text) = node.text() {
                texts.push(text.to_string());
            }
        });
        texts.join(" ")
    }

    fn on_focus(&self, doc: &Document, event: &mut Event) {
        let Some(target) = event.target() else {
            return;
        };
        if NavigationController::redirects_focus(doc, target) {
            return;
        }
        debug!("Rendering target: {}", doc.describe(target));
        self.speech.interrupt();
        let text = Self::text_to_render(doc, target);
        if !text.is_empty() {
            self.speech
                .queue(Utterance::new(text, self.words_per_minute));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::focus::{FocusController, request_focus};
    use crate::systems::navigation::NavigationTheme;
    use crate::test_support::{RecordingDevice, test_document};

    fn speech(doc: &Document) -> (Arc<AudioChannel<Utterance>>, RecordingDevice<Utterance>) {
        let channel = Arc::new(AudioChannel::new(
            "main-tts",
            0,
            doc.dispatcher().pool().clone(),
        ));
        let device = RecordingDevice::default();
        channel.initialize(Box::new(device.clone()));
        (channel, device)
    }

    #[test]
    fn test_focused_subtree_text_is_spoken() {
        let doc = test_document();
        let root = doc.create_element("ram");
        let section = doc.create_element("section");
        let title = doc.create_element("title");
        let para = doc.create_element("p");
        doc.set_text(title, "Menu").unwrap();
        doc.set_text(para, "First item").unwrap();
        doc.append_child(root, section).unwrap();
        doc.append_child(section, title).unwrap();
        doc.append_child(section, para).unwrap();
        doc.set_root(root).unwrap();

        let (channel, device) = speech(&doc);
        FocusController::install(&doc).unwrap();
        Narrator::install(&doc, channel, 120).unwrap();
        request_focus(&doc, section).unwrap();

        let texts: Vec<String> = device.played().into_iter().map(|u| u.text).collect();
        assert_eq!(texts, ["Menu First item"]);
        assert_eq!(device.stops(), 1);
    }

    #[test]
    fn test_redirecting_container_is_not_spoken() {
        let doc = test_document();
        let root = doc.create_element("ram");
        let menu = doc.create_element("container");
        let title = doc.create_element("title");
        let para = doc.create_element("p");
        doc.set_text(title, "Menu").unwrap();
        doc.set_text(para, "First item").unwrap();
        doc.append_child(root, menu).unwrap();
        doc.append_child(menu, title).unwrap();
        doc.append_child(menu, para).unwrap();
        doc.set_root(root).unwrap();

        let (channel, device) = speech(&doc);
        FocusController::install(&doc).unwrap();
        Narrator::install(&doc, channel, 120).unwrap();
        NavigationController::attach(&doc, menu, NavigationTheme::Horizontal).unwrap();
        request_focus(&doc, menu).unwrap();

        let texts: Vec<String> = device.played().into_iter().map(|u| u.text).collect();
        assert_eq!(texts, ["Menu"]);
        assert_eq!(device.stops(), 1);
    }

    #[test]
    fn test_empty_container_is_spoken_like_any_node() {
        let doc = test_document();
        let root = doc.create_element("ram");
        let menu = doc.create_element("container");
        doc.set_text(menu, "Nothing here").unwrap();
        doc.append_child(root, menu).unwrap();
        doc.set_root(root).unwrap();

        let (channel, device) = speech(&doc);
        FocusController::install(&doc).unwrap();
        Narrator::install(&doc, channel, 120).unwrap();
        NavigationController::attach(&doc, menu, NavigationTheme::Horizontal).unwrap();
        request_focus(&doc, menu).unwrap();

        let texts: Vec<String> = device.played().into_iter().map(|u| u.text).collect();
        assert_eq!(texts, ["Nothing here"]);
    }

    #[test]
    fn test_focus_change_interrupts_previous_speech() {
        let doc = test_document();
        let root = doc.create_element("ram");
        let first = doc.create_element("p");
        let second = doc.create_element("p");
        doc.set_text(first, "one").unwrap();
        doc.set_text(second, "two").unwrap();
        doc.append_child(root, first).unwrap();
        doc.append_child(root, second).unwrap();
        doc.set_root(root).unwrap();

        let (channel, device) = speech(&doc);
        FocusController::install(&doc).unwrap();
        Narrator::install(&doc, Arc::clone(&channel), 120).unwrap();
        request_focus(&doc, first).unwrap();
        let spoken = channel.pending();
        request_focus(&doc, second).unwrap();

        assert_eq!(spoken, 1);
        assert_eq!(device.stops(), 2);
        let texts: Vec<String> = device.played().into_iter().map(|u| u.text).collect();
        assert_eq!(texts, ["one", "two"]);
    }

    #[test]
    fn test_silent_node_queues_nothing() {
        let doc = test_document();
        let root = doc.create_element("ram");
        let empty = doc.create_element("p");
        doc.append_child(root, empty).unwrap();
        doc.set_root(root).unwrap();
        let (channel, device) = speech(&doc);
        FocusController::install(&doc).unwrap();
        Narrator::install(&doc, channel, 120).unwrap();
        request_focus(&doc, empty).unwrap();
        assert!(device.played().is_empty());
    }

    #[test]
    fn test_text_to_render_is_depth_first() {
        let doc = test_document();
        let root = doc.create_element("a");
        let left = doc.create_element("b");
        let leaf = doc.create_element("c");
        let right = doc.create_element("d");
        doc.set_text(root, "1").unwrap();
        doc.set_text(leaf, "2").unwrap();
        doc.set_text(right, "3").unwrap();
        doc.append_child(root, left).unwrap();
        doc.append_child(left, leaf).unwrap();
        doc.append_child(root, right).unwrap();
        assert_eq!(Narrator::text_to_render(&doc, root), "1 2 3");
        assert_eq!(Narrator::text_to_render(&doc, left), "2");
    }
}
