use bowser::Browser;
use bowser::core::config::ResolvedConfig;
use bowser::dom::Event;
use crossterm::event::{KeyCode, KeyModifiers};
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn page(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("bowser-it-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

fn config() -> ResolvedConfig {
    let mut config = ResolvedConfig::default();
    config.frame_rate = 100;
    config.audio.words_per_minute = 600;
    config
}

const MENU: &str = r#"{ "tag": "ram", "children": [
    { "tag": "container", "children": [
        { "tag": "title", "text": "Menu" },
        { "tag": "p", "text": "Open" },
        { "tag": "p", "text": "Save" }
    ] }
] }"#;

#[test]
fn test_headless_browser_loads_narrates_and_navigates() {
    let path = page("menu.json", MENU);
    let mut browser = Browser::new(config()).unwrap();
    browser
        .start(path.to_str(), false)
        .unwrap();

    let doc = browser.document().clone();
    let focused = browser.focus().focused().unwrap();
    assert_eq!(doc.text(focused).as_deref(), Some("Menu"));

    doc.dispatch_event(focused, Event::key(KeyCode::Right, KeyModifiers::NONE))
        .unwrap();
    let focused = browser.focus().focused().unwrap();
    assert_eq!(doc.text(focused).as_deref(), Some("Open"));

    // Speech for the last focus change drains through the mixer
    let deadline = Instant::now() + Duration::from_secs(5);
    while browser.audio().speech().pending() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(browser.audio().speech().pending(), 0);

    browser.stop();
}

#[test]
fn test_spoken_result_resolves_through_frame_loop() {
    let mut browser = Browser::new(config()).unwrap();
    browser.start(None, false).unwrap();
    let spoken = browser.audio().speak("two words");
    assert!(spoken.join().value().is_some());
    browser.stop();
}

#[test]
fn test_stop_handle_ends_join() {
    let mut browser = Browser::new(config()).unwrap();
    browser.start(None, false).unwrap();
    let stop = browser.stop_handle().unwrap();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stop.stop();
    });
    browser.join();
    stopper.join().unwrap();
}
