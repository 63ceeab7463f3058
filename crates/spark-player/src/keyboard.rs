//! Terminal keyboard source
//!
//! Polls crossterm events on a dedicated thread and posts key transitions to
//! the host, where they are applied to the shared input tracker. Release
//! events need a terminal that supports the keyboard enhancement protocol;
//! elsewhere keys latch until pressed again.

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use spark_core::Result;
use spark_runtime::{Host, Key, Mailbox, SharedInput};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// What the polling thread sends to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMessage {
    Transition { key: Key, pressed: bool },
    /// Ctrl+C or Escape
    Quit,
}

/// Map a terminal key event to a message, if it is one we care about.
pub fn convert_key_event(event: KeyEvent) -> Option<KeyMessage> {
    let ctrl_c = event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl_c || event.code == KeyCode::Esc {
        return (event.kind == KeyEventKind::Press).then_some(KeyMessage::Quit);
    }

    let pressed = match event.kind {
        KeyEventKind::Press => true,
        KeyEventKind::Release => false,
        KeyEventKind::Repeat => return None,
    };
    convert_key_code(event.code).map(|key| KeyMessage::Transition { key, pressed })
}

fn convert_key_code(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::Left => Key::ArrowLeft,
        KeyCode::Right => Key::ArrowRight,
        KeyCode::Up => Key::ArrowUp,
        KeyCode::Down => Key::ArrowDown,
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Char(c) => Key::Char(c.to_ascii_lowercase()),
        _ => return None,
    })
}

/// Apply a message on the host thread.
pub fn apply(host: &Host, input: &SharedInput, message: KeyMessage) {
    match message {
        KeyMessage::Transition { key, pressed } => {
            if let Some(direction) = input.borrow_mut().on_key_transition(key, pressed) {
                log::trace!("{key} {} -> {direction}", if pressed { "down" } else { "up" });
            }
        }
        KeyMessage::Quit => {
            log::info!("quit requested from keyboard");
            host.stop();
        }
    }
}

/// Raw-mode terminal key reader. Restores the terminal when dropped.
pub struct KeyboardSource {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    enhanced: bool,
}

impl KeyboardSource {
    /// Put the terminal in raw mode and start the polling thread.
    pub fn spawn(host: &Host, input: SharedInput) -> Result<Self> {
        terminal::enable_raw_mode()?;
        // Every early return from here on drops `source` and restores the terminal.
        let mut source = Self::restore_on_drop();

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            source.enhanced = true;
        } else {
            log::warn!("terminal does not report key releases; keys stay down until pressed again");
        }

        let target = host.clone();
        let mailbox = host.mailbox(move |message: KeyMessage| apply(&target, &input, message));

        let shutdown = source.shutdown.clone();
        let handle = thread::Builder::new()
            .name("spark-keyboard".to_string())
            .spawn(move || poll_terminal(&shutdown, &mailbox))?;
        source.handle = Some(handle);
        Ok(source)
    }

    /// A source with no thread and no enhancement flags pushed yet.
    fn restore_on_drop() -> Self {
        Self {
            handle: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            enhanced: false,
        }
    }
}

fn poll_terminal(shutdown: &AtomicBool, mailbox: &Mailbox<KeyMessage>) {
    while !shutdown.load(Ordering::Relaxed) {
        match event::poll(POLL_TIMEOUT) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if let Some(message) = convert_key_event(key) {
                        if !mailbox.post(message) {
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("terminal read failed: {e}"),
            },
            Ok(false) => {}
            Err(e) => {
                log::error!("terminal poll failed, keyboard input stopped: {e}");
                break;
            }
        }
    }
}

impl Drop for KeyboardSource {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("failed to restore terminal: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use spark_runtime::InputTracker;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn press_and_release_become_transitions() {
        assert_eq!(
            convert_key_event(key(KeyCode::Left, KeyEventKind::Press)),
            Some(KeyMessage::Transition {
                key: Key::ArrowLeft,
                pressed: true
            })
        );
        assert_eq!(
            convert_key_event(key(KeyCode::Char('A'), KeyEventKind::Release)),
            Some(KeyMessage::Transition {
                key: Key::Char('a'),
                pressed: false
            })
        );
        assert_eq!(convert_key_event(key(KeyCode::Left, KeyEventKind::Repeat)), None);
        assert_eq!(convert_key_event(key(KeyCode::F(5), KeyEventKind::Press)), None);
    }

    #[test]
    fn quit_keys() {
        let ctrl_c = KeyEvent {
            modifiers: KeyModifiers::CONTROL,
            ..key(KeyCode::Char('c'), KeyEventKind::Press)
        };
        assert_eq!(convert_key_event(ctrl_c), Some(KeyMessage::Quit));
        assert_eq!(
            convert_key_event(key(KeyCode::Esc, KeyEventKind::Press)),
            Some(KeyMessage::Quit)
        );
        assert_eq!(convert_key_event(key(KeyCode::Esc, KeyEventKind::Release)), None);
    }

    #[test]
    fn dropping_a_partial_source_stops_its_thread() {
        let mut source = KeyboardSource::restore_on_drop();
        assert!(!source.enhanced);

        let shutdown = source.shutdown.clone();
        let flag = source.shutdown.clone();
        source.handle = Some(thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(1));
            }
        }));

        // Joins the thread; raw mode was never enabled so restoring is a no-op
        drop(source);
        assert!(shutdown.load(Ordering::Relaxed));
    }

    #[test]
    fn apply_updates_tracker_and_stops_host() {
        let host = Host::default();
        let input = InputTracker::default().shared();

        apply(
            &host,
            &input,
            KeyMessage::Transition {
                key: Key::Char('w'),
                pressed: true,
            },
        );
        assert!(input.borrow().snapshot().up);

        host.request_frame(|_| {});
        apply(&host, &input, KeyMessage::Quit);
        host.run().unwrap();
        assert_eq!(host.frames_delivered(), 0);
    }
}
