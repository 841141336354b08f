//! Input events delivered by the host to the engine.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Pointer button identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

/// Kind of device that produced a pointer event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    #[default]
    Mouse,
    Pen,
    Touch,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A pointer event in logical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub pointer_id: u32,
    pub kind: PointerKind,
    pub button: PointerButton,
    pub position: Point,
    pub modifiers: Modifiers,
    pub pressure: Option<f32>,
    /// Host timestamp in milliseconds.
    pub timestamp_ms: f64,
}

impl PointerEvent {
    /// Primary-button mouse event at a screen position.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            pointer_id: 1,
            kind: PointerKind::Mouse,
            button: PointerButton::Primary,
            position: Point::new(x, y),
            modifiers: Modifiers::default(),
            pressure: None,
            timestamp_ms: 0.0,
        }
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure = Some(pressure);
        self.kind = PointerKind::Pen;
        self
    }

    pub fn at(mut self, timestamp_ms: f64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn is_primary(&self) -> bool {
        self.button == PointerButton::Primary
    }
}

/// Named keys the tools care about. Everything printable arrives as `Character`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Character(String),
    Enter,
    Escape,
    Backspace,
    Delete,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    Tab,
    Other(String),
}

impl Key {
    /// Map a DOM-style key name (`"Enter"`, `"a"`, `"ArrowLeft"`) to a key.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Enter" | "Return" => Key::Enter,
            "Escape" | "Esc" => Key::Escape,
            "Backspace" => Key::Backspace,
            "Delete" => Key::Delete,
            "ArrowLeft" | "Left" => Key::ArrowLeft,
            "ArrowRight" | "Right" => Key::ArrowRight,
            "Home" => Key::Home,
            "End" => Key::End,
            "Tab" => Key::Tab,
            " " | "Space" => Key::Character(" ".to_string()),
            other if other.chars().count() == 1 => Key::Character(other.to_string()),
            other => Key::Other(other.to_string()),
        }
    }
}

/// A key press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn character(text: &str) -> Self {
        Self::new(Key::Character(text.to_string()))
    }
}

/// Double-click detection by timestamp and distance.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    window_ms: f64,
    max_distance: f64,
    last: Option<(f64, Point)>,
}

impl ClickTracker {
    pub fn new(window_ms: f64, max_distance: f64) -> Self {
        Self {
            window_ms,
            max_distance,
            last: None,
        }
    }

    /// Register a press; returns true when it completes a double click.
    pub fn register(&mut self, event: &PointerEvent) -> bool {
        let double = match self.last {
            Some((t, p)) => {
                let elapsed = event.timestamp_ms - t;
                (0.0..=self.window_ms).contains(&elapsed)
                    && (event.position - p).hypot() <= self.max_distance
            }
            None => false,
        };
        // A double click consumes the pair so a third click starts over.
        self.last = if double {
            None
        } else {
            Some((event.timestamp_ms, event.position))
        };
        double
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
