//! Gesture scripts: a JSON list of host events replayed against an engine.
//!
//! ```json
//! { "steps": [
//!     { "op": "tool", "tool": "pen" },
//!     { "op": "drag", "from": [300, 300], "to": [600, 400] },
//!     { "op": "key", "key": "z", "ctrl": true }
//! ] }
//! ```

use inkboard_core::input::{Key, KeyEvent, Modifiers, PointerEvent};
use inkboard_core::shapes::SerializableColor;
use inkboard_core::surface::Surface;
use inkboard_core::tools::ToolKind;
use inkboard_core::Engine;
use kurbo::Point;
use serde::Deserialize;

/// Spacing of the synthetic clock between steps, one display refresh.
pub const FRAME_MS: f64 = 16.0;

fn default_segments() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Chrome fields a step may change. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    pub color: Option<SerializableColor>,
    pub gradient: Option<SerializableColor>,
    pub fill: Option<SerializableColor>,
    pub size: Option<f64>,
    pub opacity: Option<f64>,
    pub font_size: Option<f64>,
    pub stamp_glyph: Option<String>,
    pub stamp_size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Tool {
        tool: ToolKind,
    },
    Settings(SettingsPatch),
    Down {
        x: f64,
        y: f64,
        #[serde(default)]
        pressure: Option<f32>,
        #[serde(flatten)]
        modifiers: Modifiers,
    },
    Move {
        x: f64,
        y: f64,
        #[serde(default)]
        pressure: Option<f32>,
        #[serde(flatten)]
        modifiers: Modifiers,
    },
    Up {
        x: f64,
        y: f64,
        #[serde(flatten)]
        modifiers: Modifiers,
    },
    /// Down, evenly spaced moves with a frame after each, up.
    Drag {
        from: [f64; 2],
        to: [f64; 2],
        #[serde(default = "default_segments")]
        segments: usize,
        #[serde(flatten)]
        modifiers: Modifiers,
    },
    /// Press and release without moving.
    Click {
        x: f64,
        y: f64,
        #[serde(flatten)]
        modifiers: Modifiers,
    },
    Key {
        key: String,
        #[serde(flatten)]
        modifiers: Modifiers,
    },
    /// Type each character of `text` as a key press.
    Type {
        text: String,
    },
    /// Run frames until `ms` have passed on the clock.
    Wait {
        #[serde(default)]
        ms: f64,
    },
    Undo,
    Redo,
    Clear,
    Zoom {
        x: f64,
        y: f64,
        factor: f64,
    },
    Resize {
        width: f64,
        height: f64,
        #[serde(default)]
        dpr: Option<f64>,
    },
}

/// Counters from a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub steps: usize,
    pub frames: usize,
    /// Events the active tool consumed.
    pub handled: usize,
}

/// Drives an engine from a script with a synthetic clock.
pub struct Replay<'a, S: Surface> {
    engine: &'a mut Engine<S>,
    clock_ms: f64,
    report: ReplayReport,
}

impl<'a, S: Surface> Replay<'a, S> {
    pub fn new(engine: &'a mut Engine<S>) -> Self {
        Self {
            engine,
            clock_ms: 0.0,
            report: ReplayReport::default(),
        }
    }

    fn tick(&mut self) {
        self.clock_ms += FRAME_MS;
        self.engine.frame(self.clock_ms);
        self.report.frames += 1;
    }

    fn pointer(&self, x: f64, y: f64, modifiers: Modifiers) -> PointerEvent {
        PointerEvent::new(x, y).with_modifiers(modifiers).at(self.clock_ms)
    }

    fn count(&mut self, handled: bool) {
        if handled {
            self.report.handled += 1;
        }
    }

    pub fn step(&mut self, step: &Step) {
        log::debug!("Replaying {step:?}");
        match step {
            Step::Tool { tool } => self.engine.set_tool(*tool),
            Step::Settings(patch) => apply_settings(self.engine, patch),
            Step::Down {
                x,
                y,
                pressure,
                modifiers,
            } => {
                let mut event = self.pointer(*x, *y, *modifiers);
                event.pressure = *pressure;
                let handled = self.engine.pointer_down(&event);
                self.count(handled);
            }
            Step::Move {
                x,
                y,
                pressure,
                modifiers,
            } => {
                let mut event = self.pointer(*x, *y, *modifiers);
                event.pressure = *pressure;
                let handled = self.engine.pointer_move(&event);
                self.count(handled);
            }
            Step::Up { x, y, modifiers } => {
                let event = self.pointer(*x, *y, *modifiers);
                let handled = self.engine.pointer_up(&event);
                self.count(handled);
            }
            Step::Drag {
                from,
                to,
                segments,
                modifiers,
            } => {
                let (a, b) = (Point::new(from[0], from[1]), Point::new(to[0], to[1]));
                let down = self.pointer(a.x, a.y, *modifiers);
                let handled = self.engine.pointer_down(&down);
                self.count(handled);
                let segments = (*segments).max(1);
                for i in 1..=segments {
                    self.tick();
                    let p = a.lerp(b, i as f64 / segments as f64);
                    let event = self.pointer(p.x, p.y, *modifiers);
                    self.engine.pointer_move(&event);
                }
                self.tick();
                let up = self.pointer(b.x, b.y, *modifiers);
                let handled = self.engine.pointer_up(&up);
                self.count(handled);
            }
            Step::Click { x, y, modifiers } => {
                let event = self.pointer(*x, *y, *modifiers);
                let handled = self.engine.pointer_down(&event);
                self.engine.pointer_up(&event);
                self.count(handled);
            }
            Step::Key { key, modifiers } => {
                let event = KeyEvent::new(Key::from_name(key)).with_modifiers(*modifiers);
                let handled = self.engine.key_down(&event);
                self.count(handled);
            }
            Step::Type { text } => {
                for c in text.chars() {
                    let handled = self.engine.key_down(&KeyEvent::character(&c.to_string()));
                    self.count(handled);
                }
            }
            Step::Wait { ms } => {
                let until = self.clock_ms + ms.max(0.0);
                while self.clock_ms < until {
                    self.tick();
                }
            }
            Step::Undo => {
                self.engine.undo();
            }
            Step::Redo => {
                self.engine.redo();
            }
            Step::Clear => self.engine.clear(),
            Step::Zoom { x, y, factor } => self.engine.zoom_at(Point::new(*x, *y), *factor),
            Step::Resize { width, height, dpr } => {
                let dpr = dpr.unwrap_or(self.engine.viewport().dpr);
                self.engine.resize(*width, *height, dpr);
            }
        }
        self.tick();
        self.report.steps += 1;
    }

    /// Replay every step, then let pending frames drain.
    pub fn run(mut self, script: &Script) -> ReplayReport {
        for step in &script.steps {
            self.step(step);
        }
        self.tick();
        log::info!(
            "Replayed {} steps over {} frames",
            self.report.steps,
            self.report.frames
        );
        self.report
    }
}

fn apply_settings<S: Surface>(engine: &mut Engine<S>, patch: &SettingsPatch) {
    let settings = engine.store_mut().settings_mut();
    if let Some(color) = patch.color {
        settings.color = color;
    }
    if patch.gradient.is_some() {
        settings.gradient = patch.gradient;
    }
    if patch.fill.is_some() {
        settings.fill = patch.fill;
    }
    if let Some(size) = patch.size {
        settings.size = size;
    }
    if let Some(opacity) = patch.opacity {
        settings.opacity = opacity.clamp(0.0, 1.0);
    }
    if let Some(font_size) = patch.font_size {
        settings.font.size = font_size;
    }
    if let Some(glyph) = &patch.stamp_glyph {
        settings.stamp_glyph = glyph.clone();
    }
    if let Some(stamp_size) = patch.stamp_size {
        settings.stamp_size = stamp_size;
    }
}
