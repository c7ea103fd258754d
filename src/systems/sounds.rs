//! # Sound Library
//!
//! Named effects for the effects channel. Definitions map an effect name to
//! its length and come from the `[audio.effects]` config table. The library
//! stays empty until [`SoundLibrary::load`] runs, which the audio engine does
//! on the frame thread right after opening the mixer.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use super::mixer::Sound;

/// Effects available when none are configured.
pub const DEFAULT_EFFECTS: &[(&str, u64)] = &[("chime", 630)];

/// The built-in effect table as `name → length`.
pub fn default_effects() -> BTreeMap<String, Duration> {
    DEFAULT_EFFECTS
        .iter()
        .map(|(name, ms)| (name.to_string(), Duration::from_millis(*ms)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundError {
    NotLoaded,
    Unknown(String),
}

impl fmt::Display for SoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundError::NotLoaded => write!(f, "sound library has not been loaded"),
            SoundError::Unknown(name) => write!(f, "no sound effect named {name:?}"),
        }
    }
}

impl std::error::Error for SoundError {}

#[derive(Debug, Default)]
pub struct SoundLibrary {
    definitions: BTreeMap<String, Duration>,
    sounds: RwLock<Option<BTreeMap<String, Sound>>>,
}

impl SoundLibrary {
    pub fn new(definitions: BTreeMap<String, Duration>) -> Self {
        Self {
            definitions,
            sounds: RwLock::new(None),
        }
    }

    /// Builds every defined effect and returns how many are available.
    /// Loading again replaces the previous set.
    pub fn load(&self) -> usize {
        let mut sounds = BTreeMap::new();
        for (name, duration) in &self.definitions {
            if duration.is_zero() {
                warn!("Skipping sound effect {}: zero length", name);
                continue;
            }
            sounds.insert(name.clone(), Sound::new(name.clone(), *duration));
        }
        let count = sounds.len();
        *self.sounds.write().unwrap_or_else(PoisonError::into_inner) = Some(sounds);
        debug!("Loaded {} sound effects", count);
        count
    }

    pub fn is_loaded(&self) -> bool {
        self.sounds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn get_effect(&self, name: &str) -> Result<Sound, SoundError> {
        let sounds = self.sounds.read().unwrap_or_else(PoisonError::into_inner);
        let sounds = sounds.as_ref().ok_or(SoundError::NotLoaded)?;
        sounds
            .get(name)
            .cloned()
            .ok_or_else(|| SoundError::Unknown(name.to_string()))
    }

    /// Names of the loaded effects, sorted.
    pub fn names(&self) -> Vec<String> {
        self.sounds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|sounds| sounds.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(pairs: &[(&str, u64)]) -> SoundLibrary {
        SoundLibrary::new(
            pairs
                .iter()
                .map(|(name, ms)| (name.to_string(), Duration::from_millis(*ms)))
                .collect(),
        )
    }

    #[test]
    fn test_lookup_before_load_fails() {
        let sounds = library(&[("chime", 630)]);
        assert!(!sounds.is_loaded());
        assert_eq!(sounds.get_effect("chime"), Err(SoundError::NotLoaded));
        assert!(sounds.names().is_empty());
    }

    #[test]
    fn test_load_then_lookup() {
        let sounds = library(&[("chime", 630), ("click", 40)]);
        assert_eq!(sounds.load(), 2);
        let chime = sounds.get_effect("chime").unwrap();
        assert_eq!(chime.name, "chime");
        assert_eq!(chime.duration, Duration::from_millis(630));
        assert_eq!(sounds.names(), ["chime", "click"]);
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let sounds = library(&[("chime", 630)]);
        sounds.load();
        let err = sounds.get_effect("gong").unwrap_err();
        assert_eq!(err, SoundError::Unknown("gong".to_string()));
        assert!(err.to_string().contains("gong"));
    }

    #[test]
    fn test_zero_length_effects_are_skipped() {
        let sounds = library(&[("silence", 0), ("click", 40)]);
        assert_eq!(sounds.load(), 1);
        assert!(matches!(
            sounds.get_effect("silence"),
            Err(SoundError::Unknown(_))
        ));
    }

    #[test]
    fn test_default_table_has_chime() {
        let sounds = SoundLibrary::new(default_effects());
        sounds.load();
        assert_eq!(
            sounds.get_effect("chime").unwrap().duration,
            Duration::from_millis(630)
        );
    }
}
