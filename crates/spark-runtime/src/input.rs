//! Input state management
//!
//! Converts discrete key transitions into the four directional signals the
//! engine reads every frame.

use serde::{Deserialize, Serialize};
use spark_core::{Result, SparkError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Platform-agnostic key identifier.
///
/// Names follow the browser's `KeyboardEvent.key` / `.code` conventions so
/// bindings can be written as `"ArrowLeft"`, `"a"` or `"KeyA"`.
/// Letters are stored lower-case: `"A"` and `"a"` are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Space,
    Enter,
    Escape,
    Tab,
    Shift,
    Control,
    Char(char),
}

impl FromStr for Key {
    type Err = SparkError;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s {
            "ArrowLeft" | "Left" => Key::ArrowLeft,
            "ArrowRight" | "Right" => Key::ArrowRight,
            "ArrowUp" | "Up" => Key::ArrowUp,
            "ArrowDown" | "Down" => Key::ArrowDown,
            "Space" | " " => Key::Space,
            "Enter" => Key::Enter,
            "Escape" | "Esc" => Key::Escape,
            "Tab" => Key::Tab,
            "Shift" | "ShiftLeft" | "ShiftRight" => Key::Shift,
            "Control" | "ControlLeft" | "ControlRight" => Key::Control,
            _ => {
                let code = s
                    .strip_prefix("Key")
                    .or_else(|| s.strip_prefix("Digit"))
                    .unwrap_or(s);
                let mut chars = code.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if !c.is_whitespace() => Key::Char(c.to_ascii_lowercase()),
                    _ => return Err(SparkError::UnknownKey(s.to_string())),
                }
            }
        };
        Ok(key)
    }
}

impl TryFrom<String> for Key {
    type Error = SparkError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::ArrowLeft => write!(f, "ArrowLeft"),
            Key::ArrowRight => write!(f, "ArrowRight"),
            Key::ArrowUp => write!(f, "ArrowUp"),
            Key::ArrowDown => write!(f, "ArrowDown"),
            Key::Space => write!(f, "Space"),
            Key::Enter => write!(f, "Enter"),
            Key::Escape => write!(f, "Escape"),
            Key::Tab => write!(f, "Tab"),
            Key::Shift => write!(f, "Shift"),
            Key::Control => write!(f, "Control"),
            Key::Char(c) => write!(f, "{c}"),
        }
    }
}

/// Logical direction, decoupled from physical keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Snapshot of the four directional signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionalInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl DirectionalInput {
    pub fn get(&self, direction: Direction) -> bool {
        match direction {
            Direction::Left => self.left,
            Direction::Right => self.right,
            Direction::Up => self.up,
            Direction::Down => self.down,
        }
    }

    pub fn set(&mut self, direction: Direction, active: bool) {
        match direction {
            Direction::Left => self.left = active,
            Direction::Right => self.right = active,
            Direction::Up => self.up = active,
            Direction::Down => self.down = active,
        }
    }

    /// Is any direction active?
    pub fn any(&self) -> bool {
        self.left || self.right || self.up || self.down
    }
}

/// Key bindings as written in config files: direction -> key names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub left: Vec<Key>,
    pub right: Vec<Key>,
    pub up: Vec<Key>,
    pub down: Vec<Key>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            left: vec![Key::ArrowLeft, Key::Char('a')],
            right: vec![Key::ArrowRight, Key::Char('d')],
            up: vec![Key::ArrowUp, Key::Char('w')],
            down: vec![Key::ArrowDown, Key::Char('s')],
        }
    }
}

impl InputConfig {
    fn keys(&self, direction: Direction) -> &[Key] {
        match direction {
            Direction::Left => &self.left,
            Direction::Right => &self.right,
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }
}

/// Every direction must stay reachable through this many distinct keys.
pub const MIN_KEYS_PER_DIRECTION: usize = 2;

/// Resolved lookup from physical key to logical direction
#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<Key, Direction>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let config = InputConfig::default();
        let mut map = HashMap::new();
        for dir in Direction::ALL {
            for &key in config.keys(dir) {
                map.insert(key, dir);
            }
        }
        Self { map }
    }
}

impl KeyBindings {
    /// Build bindings from a config, rejecting directions with fewer than two
    /// keys and keys bound to more than one direction.
    pub fn from_config(config: &InputConfig) -> Result<Self> {
        let mut map = HashMap::new();
        for dir in Direction::ALL {
            let keys = config.keys(dir);
            if keys.len() < MIN_KEYS_PER_DIRECTION {
                return Err(SparkError::Config(format!(
                    "direction '{dir}' needs at least {MIN_KEYS_PER_DIRECTION} keys, got {}",
                    keys.len()
                )));
            }
            for &key in keys {
                if let Some(previous) = map.insert(key, dir) {
                    if previous != dir {
                        return Err(SparkError::Config(format!(
                            "key '{key}' is bound to both '{previous}' and '{dir}'"
                        )));
                    }
                }
            }
        }
        Ok(Self { map })
    }

    /// Direction a key drives, if any
    pub fn direction(&self, key: Key) -> Option<Direction> {
        self.map.get(&key).copied()
    }

    /// All keys bound to a direction
    pub fn keys_for(&self, direction: Direction) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .map
            .iter()
            .filter(|(_, d)| **d == direction)
            .map(|(k, _)| *k)
            .collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }
}

/// Tracks the directional signals from raw key transitions.
///
/// Last event wins: each signal reflects the most recent transition of any
/// key bound to it. Releasing one of two held keys for the same direction
/// clears the signal even though the other key is still down.
#[derive(Debug, Clone, Default)]
pub struct InputTracker {
    bindings: KeyBindings,
    state: DirectionalInput,
}

/// The tracker as shared between the key source (writer) and the frame loop (reader)
pub type SharedInput = Rc<RefCell<InputTracker>>;

impl InputTracker {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            state: DirectionalInput::default(),
        }
    }

    /// Wrap in the shared handle used by the frame loop.
    pub fn shared(self) -> SharedInput {
        Rc::new(RefCell::new(self))
    }

    /// Process a key press (`pressed = true`) or release.
    ///
    /// Returns the affected direction; unbound keys are ignored.
    pub fn on_key_transition(&mut self, key: Key, pressed: bool) -> Option<Direction> {
        let direction = self.bindings.direction(key)?;
        self.state.set(direction, pressed);
        Some(direction)
    }

    /// Current signals
    pub fn snapshot(&self) -> DirectionalInput {
        self.state
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Key {
        name.parse().unwrap()
    }

    #[test]
    fn test_press_and_release() {
        let mut input = InputTracker::default();

        assert_eq!(input.on_key_transition(key("ArrowUp"), true), Some(Direction::Up));
        assert!(input.snapshot().up);

        input.on_key_transition(key("ArrowUp"), false);
        assert!(!input.snapshot().up);
    }

    #[test]
    fn test_last_event_wins_across_shared_keys() {
        let mut input = InputTracker::default();

        input.on_key_transition(key("a"), true);
        input.on_key_transition(key("ArrowRight"), true);
        input.on_key_transition(key("a"), false);

        assert_eq!(
            input.snapshot(),
            DirectionalInput {
                left: false,
                right: true,
                up: false,
                down: false,
            }
        );
    }

    #[test]
    fn test_partial_release_clears_signal() {
        let mut input = InputTracker::default();

        input.on_key_transition(key("a"), true);
        input.on_key_transition(key("ArrowLeft"), true);
        input.on_key_transition(key("ArrowLeft"), false);

        // "a" is still physically held but the signal follows the last event
        assert!(!input.snapshot().left);
    }

    #[test]
    fn test_release_without_press_is_idempotent() {
        let mut input = InputTracker::default();
        input.on_key_transition(key("s"), false);
        assert_eq!(input.snapshot(), DirectionalInput::default());
    }

    #[test]
    fn test_repeated_press_is_noop() {
        let mut input = InputTracker::default();
        input.on_key_transition(key("w"), true);
        input.on_key_transition(key("w"), true);
        assert!(input.snapshot().up);
        input.on_key_transition(key("w"), false);
        assert!(!input.snapshot().up);
    }

    #[test]
    fn test_unknown_key_ignored() {
        let mut input = InputTracker::default();
        assert_eq!(input.on_key_transition(key("q"), true), None);
        assert_eq!(input.on_key_transition(Key::Space, true), None);
        assert!(!input.snapshot().any());
    }

    #[test]
    fn test_most_recent_event_per_direction() {
        // Interleaved sequence; each signal must equal its last event.
        let events = [
            ("a", true),
            ("w", true),
            ("ArrowLeft", true),
            ("ArrowUp", false),
            ("d", true),
            ("ArrowDown", true),
            ("a", false),
            ("s", false),
            ("w", true),
        ];
        let mut input = InputTracker::default();
        let mut expected = DirectionalInput::default();
        for (name, pressed) in events {
            let k = key(name);
            input.on_key_transition(k, pressed);
            if let Some(dir) = KeyBindings::default().direction(k) {
                expected.set(dir, pressed);
            }
            assert_eq!(input.snapshot(), expected);
        }
        assert_eq!(
            expected,
            DirectionalInput {
                left: false,
                right: true,
                up: true,
                down: false,
            }
        );
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!(key("KeyA"), Key::Char('a'));
        assert_eq!(key("A"), Key::Char('a'));
        assert_eq!(key("Digit1"), Key::Char('1'));
        assert_eq!(key("Left"), Key::ArrowLeft);
        assert_eq!(key(" "), Key::Space);
        assert!("F13".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
        assert_eq!(Key::ArrowDown.to_string(), "ArrowDown");
    }

    #[test]
    fn test_default_bindings_have_two_keys_each() {
        let bindings = KeyBindings::default();
        for dir in Direction::ALL {
            assert_eq!(bindings.keys_for(dir).len(), 2, "direction {dir}");
        }
    }

    #[test]
    fn test_bindings_from_toml() {
        let config: InputConfig = toml::from_str(
            r#"
left = ["ArrowLeft", "KeyJ"]
right = ["ArrowRight", "l"]
"#,
        )
        .unwrap();
        let bindings = KeyBindings::from_config(&config).unwrap();
        assert_eq!(bindings.direction(Key::Char('j')), Some(Direction::Left));
        assert_eq!(bindings.direction(Key::Char('l')), Some(Direction::Right));
        // unspecified directions keep their defaults
        assert_eq!(bindings.direction(Key::Char('w')), Some(Direction::Up));
        assert_eq!(bindings.direction(Key::Char('a')), None);
    }

    #[test]
    fn test_empty_direction_rejected() {
        let config = InputConfig {
            down: vec![],
            ..InputConfig::default()
        };
        let err = KeyBindings::from_config(&config).unwrap_err();
        assert!(matches!(err, SparkError::Config(_)));
    }

    #[test]
    fn test_single_key_direction_rejected() {
        let config = InputConfig {
            left: vec![Key::ArrowLeft],
            ..InputConfig::default()
        };
        match KeyBindings::from_config(&config) {
            Err(SparkError::Config(msg)) => assert!(msg.contains("'left'"), "{msg}"),
            other => panic!("expected config error, got {other:?}"),
        }

        let config = InputConfig {
            left: vec![Key::ArrowLeft, Key::Char('j'), Key::Char('h')],
            ..InputConfig::default()
        };
        assert!(KeyBindings::from_config(&config).is_ok());
    }

    #[test]
    fn test_conflicting_binding_rejected() {
        let config = InputConfig {
            up: vec![Key::ArrowUp, Key::Char('a')],
            ..InputConfig::default()
        };
        assert!(KeyBindings::from_config(&config).is_err());
    }
}
