//! # Mixer
//!
//! A software playback device. Each numbered channel plays the units handed
//! to it back to back for their natural duration and reports an end signal
//! per unit when [`Mixer::pump`] observes that the unit has finished.
//!
//! ```text
//!   play(u1) play(u2)        pump(now)            pump(now)
//!   ├──── u1 ────┼──── u2 ────┤
//!   t0           t0+d1        t0+d1+d2
//!                ▲ end(ch)                ▲ end(ch)
//! ```
//!
//! `stop` drops everything on the channel at once, but the device still owes
//! one end signal per dropped unit; they are reported by the next pump, ahead
//! of any later unit's end.

use log::{debug, info};
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::audio::PlaybackDevice;

/// Speaking rate used when none is configured.
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 180;

/// Anything a channel can play.
pub trait Playable: Send + 'static {
    /// How long the unit takes to play.
    fn duration(&self) -> Duration;

    /// Short human-readable label for logs.
    fn describe(&self) -> String;
}

/// A piece of text to speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub words_per_minute: u32,
}

impl Utterance {
    pub fn new(text: impl Into<String>, words_per_minute: u32) -> Self {
        Self {
            text: text.into(),
            words_per_minute,
        }
    }
}

impl Playable for Utterance {
    fn duration(&self) -> Duration {
        let words = self.text.split_whitespace().count().max(1) as f64;
        let rate = f64::from(self.words_per_minute.max(1));
        Duration::from_secs_f64(words * 60.0 / rate)
    }

    fn describe(&self) -> String {
        format!("utterance {:?}", self.text)
    }
}

/// A named sound effect of fixed length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sound {
    pub name: String,
    pub duration: Duration,
}

impl Sound {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

impl Playable for Sound {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn describe(&self) -> String {
        format!("sound {}", self.name)
    }
}

// ============================================================================
// Device state
// ============================================================================

struct Unit {
    label: String,
    duration: Duration,
    /// When the unit was handed over; it never starts before this.
    queued_at: Instant,
}

#[derive(Default)]
struct Track {
    units: VecDeque<Unit>,
    /// When the front unit started playing.
    started_at: Option<Instant>,
    /// End signals owed for units dropped by `stop`.
    owed_ends: usize,
}

#[derive(Default)]
struct MixerState {
    tracks: BTreeMap<u32, Track>,
}

/// Handle to the shared mixer. Clones refer to the same device.
#[derive(Clone)]
pub struct Mixer {
    state: Arc<Mutex<MixerState>>,
}

impl Mixer {
    /// Opens the device. Call from the frame thread.
    pub fn open() -> io::Result<Self> {
        info!("Mixer opened");
        Ok(Self {
            state: Arc::default(),
        })
    }

    /// A playback handle bound to channel `code`.
    pub fn channel(&self, code: u32) -> MixerChannel {
        self.lock().tracks.entry(code).or_default();
        MixerChannel {
            mixer: self.clone(),
            code,
        }
    }

    /// Whether channel `code` has a unit playing.
    pub fn is_busy(&self, code: u32) -> bool {
        self.lock()
            .tracks
            .get(&code)
            .is_some_and(|track| !track.units.is_empty())
    }

    /// Advances playback to `now` and returns the channel code of every end
    /// signal raised, in order. Frame thread only.
    pub fn pump(&self, now: Instant) -> Vec<u32> {
        let mut ends = Vec::new();
        let mut state = self.lock();
        for (&code, track) in state.tracks.iter_mut() {
            ends.extend(std::iter::repeat_n(code, track.owed_ends));
            track.owed_ends = 0;
            while let (Some(unit), Some(started)) = (track.units.front(), track.started_at) {
                let finished = started + unit.duration;
                if finished > now {
                    break;
                }
                debug!("Channel {} finished {}", code, unit.label);
                track.units.pop_front();
                track.started_at = track
                    .units
                    .front()
                    .map(|next| finished.max(next.queued_at));
                ends.push(code);
            }
        }
        ends
    }

    fn play(&self, code: u32, unit: Unit) {
        let mut state = self.lock();
        let track = state.tracks.entry(code).or_default();
        debug!("Channel {} playing {}", code, unit.label);
        if track.units.is_empty() {
            track.started_at = Some(unit.queued_at);
        }
        track.units.push_back(unit);
    }

    fn stop(&self, code: u32) {
        let mut state = self.lock();
        let track = state.tracks.entry(code).or_default();
        let dropped = track.units.len();
        track.units.clear();
        track.started_at = None;
        track.owed_ends += dropped;
        debug!("Channel {} stopped, {} units dropped", code, dropped);
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One mixer channel, usable as the device behind an audio channel.
#[derive(Clone)]
pub struct MixerChannel {
    mixer: Mixer,
    code: u32,
}

impl MixerChannel {
    pub fn code(&self) -> u32 {
        self.code
    }
}

impl<P: Playable> PlaybackDevice<P> for MixerChannel {
    fn play(&mut self, payload: P) {
        self.mixer.play(
            self.code,
            Unit {
                label: payload.describe(),
                duration: payload.duration(),
                queued_at: Instant::now(),
            },
        );
    }

    fn stop(&mut self) {
        self.mixer.stop(self.code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound(ms: u64) -> Sound {
        Sound::new("tick", Duration::from_millis(ms))
    }

    #[test]
    fn test_utterance_duration_scales_with_words() {
        let short = Utterance::new("hello", 120);
        let long = Utterance::new("hello there general kenobi", 120);
        assert_eq!(short.duration(), Duration::from_millis(500));
        assert_eq!(long.duration(), Duration::from_secs(2));
        assert_eq!(Utterance::new("", 60).duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_units_play_back_to_back() {
        let mixer = Mixer::open().unwrap();
        let mut channel = mixer.channel(3);
        let start = Instant::now();
        PlaybackDevice::play(&mut channel, sound(100));
        PlaybackDevice::play(&mut channel, sound(100));
        assert!(mixer.pump(start).is_empty());
        assert_eq!(mixer.pump(start + Duration::from_millis(150)), [3]);
        assert!(mixer.is_busy(3));
        assert_eq!(mixer.pump(start + Duration::from_millis(250)), [3]);
        assert!(!mixer.is_busy(3));
    }

    fn unit(ms: u64, queued_at: Instant) -> Unit {
        Unit {
            label: "tick".to_string(),
            duration: Duration::from_millis(ms),
            queued_at,
        }
    }

    #[test]
    fn test_unit_queued_after_unpumped_end_plays_in_full() {
        let mixer = Mixer::open().unwrap();
        let start = Instant::now();
        mixer.play(2, unit(100, start));
        // The first unit ended at 100ms but nobody pumped before the second
        // arrived at 150ms.
        mixer.play(2, unit(100, start + Duration::from_millis(150)));
        assert_eq!(mixer.pump(start + Duration::from_millis(160)), [2]);
        assert!(mixer.pump(start + Duration::from_millis(240)).is_empty());
        assert_eq!(mixer.pump(start + Duration::from_millis(250)), [2]);
    }

    #[test]
    fn test_late_pump_reports_every_finished_unit() {
        let mixer = Mixer::open().unwrap();
        let mut channel = mixer.channel(0);
        for _ in 0..3 {
            PlaybackDevice::play(&mut channel, sound(10));
        }
        let ends = mixer.pump(Instant::now() + Duration::from_secs(1));
        assert_eq!(ends, [0, 0, 0]);
    }

    #[test]
    fn test_stop_owes_one_end_per_dropped_unit() {
        let mixer = Mixer::open().unwrap();
        let mut channel = mixer.channel(1);
        PlaybackDevice::play(&mut channel, sound(1_000));
        PlaybackDevice::play(&mut channel, sound(1_000));
        PlaybackDevice::<Sound>::stop(&mut channel);
        assert!(!mixer.is_busy(1));
        assert_eq!(mixer.pump(Instant::now()), [1, 1]);
        assert!(mixer.pump(Instant::now()).is_empty());
    }

    #[test]
    fn test_channels_are_independent() {
        let mixer = Mixer::open().unwrap();
        let mut speech = mixer.channel(0);
        let mut effects = mixer.channel(1);
        PlaybackDevice::play(&mut speech, Utterance::new("one two", 60));
        PlaybackDevice::play(&mut effects, sound(10));
        let ends = mixer.pump(Instant::now() + Duration::from_millis(500));
        assert_eq!(ends, [1]);
        assert!(mixer.is_busy(0));
    }
}
