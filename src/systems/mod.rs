//! # Browser Systems
//!
//! Everything that reacts to document events:
//!
//! - [`focus`]: the single focused node and the focus request protocol
//! - [`navigation`]: key-driven linear navigation inside containers
//! - [`audio`]: FIFO playback channels over a device
//! - [`mixer`]: the playback device and playable payloads
//! - [`sounds`]: named sound effects for the effects channel
//! - [`narration`]: speaks whatever gains focus
//! - [`loader`]: turns a location into the document tree
//! - [`input`]: terminal keys into `key` events

pub mod audio;
pub mod focus;
pub mod input;
pub mod loader;
pub mod mixer;
pub mod narration;
pub mod navigation;
pub mod sounds;

pub use audio::{AudioChannel, AudioSettings, AudioSystem, PlaybackDevice};
pub use focus::{FocusController, request_focus};
pub use loader::{LoadError, ResourceLoader};
pub use mixer::{Mixer, Playable, Sound, Utterance};
pub use narration::Narrator;
pub use navigation::{KeyCombo, NavigationController, NavigationError, NavigationTheme};
pub use sounds::{SoundError, SoundLibrary};
