//! # Audio Channels
//!
//! An [`AudioChannel`] is one FIFO playback stream (speech, or effects) in
//! front of a [`PlaybackDevice`]. Every queued payload gets an
//! [`AsyncResult`] that is fulfilled when the device reports the unit done,
//! or cancelled when the channel is interrupted.
//!
//! ```text
//!   queue ──▶ [ staged │ staged │ waiting │ waiting ]
//!                 ▲        ▲
//!                 └────────┴── at most PRESTAGE_LIMIT handed to the device
//!
//!   device end signal ──▶ pop front ──▶ fulfill ──▶ stage next waiting entry
//! ```
//!
//! ## Interruption
//!
//! The device reports completion out of band, so a stop cannot retract end
//! signals it still owes for staged units. `interrupt` therefore replaces the
//! queue with one placeholder per staged unit. Each late end signal consumes
//! a placeholder instead of being credited to work queued after the
//! interrupt. The discarded results are cancelled once the lock is released.

use log::{debug, warn};
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::mixer::{DEFAULT_WORDS_PER_MINUTE, Mixer, Sound, Utterance};
use super::sounds::{SoundError, SoundLibrary, default_effects};
use crate::core::frame_loop::Engine;
use crate::core::future::AsyncResult;
use crate::core::pool::WorkerPool;
use crate::dom::event::types;
use crate::dom::{Document, DomError, Event, EventDetail, listener};

/// How many entries may be handed to the device at once.
pub const PRESTAGE_LIMIT: usize = 2;

pub const SPEECH_CHANNEL: u32 = 0;
pub const EFFECTS_CHANNEL: u32 = 1;

/// The hardware side of a channel.
///
/// `play` queues a unit behind whatever the device is already playing.
/// `stop` silences the channel at once; the device still signals an end for
/// every unit it had accepted.
pub trait PlaybackDevice<P>: Send {
    fn play(&mut self, payload: P);
    fn stop(&mut self);
}

// ============================================================================
// Channel
// ============================================================================

enum Entry<P> {
    /// Absorbs one end signal owed for interrupted work.
    Placeholder,
    Unit {
        /// `None` once handed to the device.
        payload: Option<P>,
        result: AsyncResult<()>,
    },
}

struct ChannelState<P> {
    queue: VecDeque<Entry<P>>,
    staged: usize,
    device: Option<Box<dyn PlaybackDevice<P>>>,
}

pub struct AudioChannel<P> {
    name: String,
    code: u32,
    pool: WorkerPool,
    state: Mutex<ChannelState<P>>,
}

impl<P: Send + 'static> AudioChannel<P> {
    pub fn new(name: impl Into<String>, code: u32, pool: WorkerPool) -> Self {
        Self {
            name: name.into(),
            code,
            pool,
            state: Mutex::new(ChannelState {
                queue: VecDeque::new(),
                staged: 0,
                device: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    /// Hands the channel its device. Entries queued before this are staged
    /// now.
    pub fn initialize(&self, device: Box<dyn PlaybackDevice<P>>) {
        let mut state = self.lock();
        state.device = Some(device);
        Self::stage(&mut state);
        debug!("Audio channel {} initialized", self.name);
    }

    /// Routes `device_end` events for this channel's code into
    /// [`AudioChannel::on_device_complete`].
    pub fn attach(self: &Arc<Self>, doc: &Document) -> Result<(), DomError> {
        let channel = Arc::clone(self);
        doc.add_event_listener(
            doc.window(),
            types::DEVICE_END,
            listener(move |_, event| {
                if let EventDetail::DeviceEnd { channel: code } = *event.detail() {
                    if code == channel.code {
                        channel.on_device_complete();
                    }
                }
            }),
            false,
        )
    }

    /// Appends `payload` and returns the result that settles when it has
    /// played or is interrupted.
    pub fn queue(&self, payload: P) -> AsyncResult<()> {
        let result = AsyncResult::new(self.pool.clone());
        let mut state = self.lock();
        state.queue.push_back(Entry::Unit {
            payload: Some(payload),
            result: result.clone(),
        });
        Self::stage(&mut state);
        result
    }

    /// Handles one end signal from the device.
    pub fn on_device_complete(&self) {
        let finished = {
            let mut state = self.lock();
            let finished = match state.queue.pop_front() {
                None => {
                    warn!("Channel {} got an end signal with nothing queued", self.name);
                    None
                }
                Some(Entry::Placeholder) => None,
                Some(Entry::Unit { result, .. }) => {
                    state.staged = state.staged.saturating_sub(1);
                    Some(result)
                }
            };
            Self::stage(&mut state);
            finished
        };
        if let Some(result) = finished {
            if let Err(e) = result.fulfill(()) {
                debug!("Channel {} finished a settled unit: {}", self.name, e);
            }
        }
    }

    /// Drops all queued work, stops the device and cancels every discarded
    /// result.
    pub fn interrupt(&self) {
        let discarded = {
            let mut state = self.lock();
            let owed = state
                .queue
                .iter()
                .filter(|entry| matches!(entry, Entry::Placeholder))
                .count()
                + state.staged;
            let discarded = std::mem::replace(
                &mut state.queue,
                std::iter::repeat_with(|| Entry::Placeholder)
                    .take(owed)
                    .collect(),
            );
            state.staged = 0;
            if let Some(device) = state.device.as_mut() {
                device.stop();
            }
            discarded
        };
        let mut cancelled = 0;
        for entry in discarded {
            if let Entry::Unit { result, .. } = entry {
                if result.cancel().is_ok() {
                    cancelled += 1;
                }
            }
        }
        debug!("Channel {} interrupted, {} cancelled", self.name, cancelled);
    }

    /// Entries waiting in the queue, placeholders included.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Entries currently handed to the device.
    pub fn staged(&self) -> usize {
        self.lock().staged
    }

    fn stage(state: &mut ChannelState<P>) {
        let ChannelState {
            queue,
            staged,
            device,
        } = state;
        let Some(device) = device.as_mut() else {
            return;
        };
        for entry in queue.iter_mut() {
            if *staged >= PRESTAGE_LIMIT {
                break;
            }
            if let Entry::Unit { payload, .. } = entry {
                if let Some(payload) = payload.take() {
                    device.play(payload);
                    *staged += 1;
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Audio system
// ============================================================================

/// Channel names, speaking rate and the effect table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSettings {
    pub speech_channel: String,
    pub effects_channel: String,
    pub words_per_minute: u32,
    pub effects: BTreeMap<String, Duration>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            speech_channel: "main-tts".to_string(),
            effects_channel: "effects".to_string(),
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            effects: default_effects(),
        }
    }
}

/// The browser's two channels and its effect library. Devices are connected
/// and effects loaded by [`AudioEngine`] on the frame thread.
pub struct AudioSystem {
    speech: Arc<AudioChannel<Utterance>>,
    effects: Arc<AudioChannel<Sound>>,
    sounds: Arc<SoundLibrary>,
    words_per_minute: u32,
}

impl AudioSystem {
    pub fn new(doc: &Document, settings: &AudioSettings) -> Result<Self, DomError> {
        let pool = doc.dispatcher().pool().clone();
        let speech: Arc<AudioChannel<Utterance>> = Arc::new(AudioChannel::new(
            &settings.speech_channel,
            SPEECH_CHANNEL,
            pool.clone(),
        ));
        let effects: Arc<AudioChannel<Sound>> = Arc::new(AudioChannel::new(
            &settings.effects_channel,
            EFFECTS_CHANNEL,
            pool,
        ));
        speech.attach(doc)?;
        effects.attach(doc)?;
        Ok(Self {
            speech,
            effects,
            sounds: Arc::new(SoundLibrary::new(settings.effects.clone())),
            words_per_minute: settings.words_per_minute,
        })
    }

    pub fn speech(&self) -> &Arc<AudioChannel<Utterance>> {
        &self.speech
    }

    pub fn effects(&self) -> &Arc<AudioChannel<Sound>> {
        &self.effects
    }

    pub fn sounds(&self) -> &Arc<SoundLibrary> {
        &self.sounds
    }

    pub fn words_per_minute(&self) -> u32 {
        self.words_per_minute
    }

    /// Speaks `text` after anything already queued on the speech channel.
    pub fn speak(&self, text: impl Into<String>) -> AsyncResult<()> {
        self.speech
            .queue(Utterance::new(text, self.words_per_minute))
    }

    /// Queues the named effect on the effects channel.
    pub fn play_effect(&self, name: &str) -> Result<AsyncResult<()>, SoundError> {
        let sound = self.sounds.get_effect(name)?;
        debug!("Playing effect {}", name);
        Ok(self.effects.queue(sound))
    }

    /// The frame-loop engine that opens the mixer and pumps its end signals
    /// into the document.
    pub fn engine(&self, doc: &Document) -> AudioEngine {
        AudioEngine {
            doc: doc.clone(),
            speech: Arc::clone(&self.speech),
            effects: Arc::clone(&self.effects),
            sounds: Arc::clone(&self.sounds),
            mixer: None,
        }
    }
}

pub struct AudioEngine {
    doc: Document,
    speech: Arc<AudioChannel<Utterance>>,
    effects: Arc<AudioChannel<Sound>>,
    sounds: Arc<SoundLibrary>,
    mixer: Option<Mixer>,
}

impl Engine for AudioEngine {
    fn name(&self) -> &str {
        "audio"
    }

    fn initialize(&mut self) -> io::Result<()> {
        let mixer = Mixer::open()?;
        self.speech
            .initialize(Box::new(mixer.channel(self.speech.code())));
        self.effects
            .initialize(Box::new(mixer.channel(self.effects.code())));
        self.mixer = Some(mixer);
        self.sounds.load();
        Ok(())
    }

    fn iterate(&mut self) {
        let Some(mixer) = &self.mixer else {
            return;
        };
        for code in mixer.pump(Instant::now()) {
            if let Err(e) = self
                .doc
                .dispatch_event(self.doc.window(), Event::device_end(code))
            {
                warn!("Could not deliver end signal for channel {}: {}", code, e);
            }
        }
    }
}
