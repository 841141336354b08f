//! Text payload and the text box estimate shared by the tool and the renderer.

use super::SerializableColor;
use kurbo::{Size, Vec2};
use serde::{Deserialize, Serialize};

/// Horizontal advance per character, in ems, for box estimation.
pub const CHAR_ADVANCE_EM: f64 = 0.6;
/// Line height in ems.
pub const LINE_HEIGHT_EM: f64 = 1.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontDescriptor {
    pub family: String,
    /// Font size in logical pixels at zoom 1.
    pub size: f64,
    pub weight: u16,
    pub italic: bool,
}

impl Default for FontDescriptor {
    fn default() -> Self {
        Self {
            family: "sans-serif".to_string(),
            size: 24.0,
            weight: 400,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Text payload. Box dimensions are logical pixels at zoom 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextData {
    pub content: String,
    #[serde(default)]
    pub font: FontDescriptor,
    pub box_width: f64,
    pub box_height: f64,
    #[serde(default)]
    pub align: TextAlign,
    #[serde(alias = "stroke")]
    pub color: SerializableColor,
}

impl TextData {
    pub fn new(content: &str, font: FontDescriptor, color: SerializableColor) -> Self {
        let size = Self::measure(content, &font);
        Self {
            content: content.to_string(),
            font,
            box_width: size.width,
            box_height: size.height,
            align: TextAlign::Left,
            color,
        }
    }

    /// Estimated box for `content`; an empty string still leaves room for the caret.
    pub fn measure(content: &str, font: &FontDescriptor) -> Size {
        let lines: Vec<&str> = content.split('\n').collect();
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
        Size::new(
            widest as f64 * font.size * CHAR_ADVANCE_EM,
            lines.len() as f64 * font.size * LINE_HEIGHT_EM,
        )
    }

    /// Replace the content and re-fit the box.
    pub fn set_content(&mut self, content: String) {
        let size = Self::measure(&content, &self.font);
        self.content = content;
        self.box_width = size.width;
        self.box_height = size.height;
    }

    /// Caret offset from the box origin for a cursor at `index` chars, in px at zoom 1.
    pub fn caret_offset(&self, index: usize) -> Vec2 {
        let before: String = self.content.chars().take(index).collect();
        let line = before.matches('\n').count();
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count());
        Vec2::new(
            column as f64 * self.font.size * CHAR_ADVANCE_EM,
            line as f64 * self.font.size * LINE_HEIGHT_EM,
        )
    }

    pub fn line_height(&self) -> f64 {
        self.font.size * LINE_HEIGHT_EM
    }
}
