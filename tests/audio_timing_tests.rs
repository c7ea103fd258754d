use bowser::core::frame_loop::{FrameLoop, RunningLoop};
use bowser::core::pool::WorkerPool;
use bowser::dom::{Document, EventDispatcher};
use bowser::systems::{AudioSettings, AudioSystem, Sound};
use std::sync::mpsc;
use std::time::{Duration, Instant};

// ============================================================================
// Helper Functions
// ============================================================================

const UNIT: Duration = Duration::from_millis(100);

struct Rig {
    audio: AudioSystem,
    _frames: RunningLoop,
}

/// Audio system on a fast frame loop so end signals arrive promptly.
fn rig() -> Rig {
    let doc = Document::new(EventDispatcher::new(WorkerPool::new(4).unwrap()));
    let audio = AudioSystem::new(&doc, &AudioSettings::default()).unwrap();
    let mut frame_loop = FrameLoop::new(200);
    frame_loop.add_engine(Box::new(audio.engine(&doc)));
    let frames = frame_loop.start().unwrap();
    frames.wait_for_initialized();
    Rig {
        audio,
        _frames: frames,
    }
}

fn tick() -> Sound {
    Sound::new("tick", UNIT)
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn test_three_units_take_three_durations() {
    let rig = rig();
    let effects = rig.audio.effects();
    let start = Instant::now();
    let _first = effects.queue(tick());
    let _second = effects.queue(tick());
    let third = effects.queue(tick());
    assert!(third.join().value().is_some());
    assert!(start.elapsed() >= UNIT * 3);
}

#[test]
fn test_results_settle_in_queue_order() {
    let rig = rig();
    let effects = rig.audio.effects();
    let (tx, rx) = mpsc::channel();
    for index in 0..3 {
        let tx = tx.clone();
        effects
            .queue(tick())
            .add_callback(move |outcome| tx.send((index, outcome.is_cancelled())).unwrap());
    }
    let order: Vec<(i32, bool)> = (0..3)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    assert_eq!(order, [(0, false), (1, false), (2, false)]);
}

// ============================================================================
// Interruption
// ============================================================================

#[test]
fn test_interrupt_keeps_finished_unit_and_cancels_the_rest() {
    let rig = rig();
    let effects = rig.audio.effects();
    let first = effects.queue(tick());
    let second = effects.queue(tick());
    let third = effects.queue(tick());

    assert!(first.join().value().is_some());
    effects.interrupt();

    assert!(!first.is_cancelled());
    assert!(second.join().is_cancelled());
    assert!(third.join().is_cancelled());
}

#[test]
fn test_work_after_interrupt_plays_in_full() {
    let rig = rig();
    let effects = rig.audio.effects();
    let _first = effects.queue(tick());
    let _second = effects.queue(tick());
    std::thread::sleep(UNIT / 2);
    effects.interrupt();

    let start = Instant::now();
    let fresh = effects.queue(tick());
    assert!(fresh.join().value().is_some());
    assert!(start.elapsed() >= UNIT);
    assert_eq!(effects.pending(), 0);
    assert_eq!(effects.staged(), 0);
}

#[test]
fn test_channels_do_not_share_end_signals() {
    let rig = rig();
    let start = Instant::now();
    let long = rig
        .audio
        .effects()
        .queue(Sound::new("long", Duration::from_millis(300)));
    let spoken = rig.audio.speak("hi");
    assert!(long.join().value().is_some());
    assert!(spoken.join().value().is_some());
    assert!(start.elapsed() >= Duration::from_millis(300));
}
