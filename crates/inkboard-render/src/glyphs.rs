//! Glyph outlines for text and stamp shapes.
//!
//! Outlines are built in screen-space pixels (y down) and filled with a
//! plain translate/rotate transform, never the world → device mapping.

use crate::renderer::{RenderResult, RendererError};
use ab_glyph::{Font, FontArc, GlyphId, OutlineCurve, PxScale, ScaleFont};
use inkboard_core::shapes::TextAlign;
use resvg::tiny_skia::{Path, PathBuilder, Transform};
use std::path::Path as FsPath;

/// Fonts tried by [`GlyphSet::system`], first match wins.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Characters that join or modify glyphs and never need an outline.
fn is_joiner(c: char) -> bool {
    matches!(c, '\u{200D}' | '\u{FE0E}' | '\u{FE0F}')
}

/// A loaded font used for every text and stamp shape.
#[derive(Clone)]
pub struct GlyphSet {
    font: FontArc,
}

impl std::fmt::Debug for GlyphSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphSet")
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl GlyphSet {
    pub fn from_bytes(bytes: Vec<u8>) -> RenderResult<Self> {
        let font = FontArc::try_from_vec(bytes).map_err(|e| RendererError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    /// Load a TrueType/OpenType file.
    pub fn load(path: impl AsRef<FsPath>) -> RenderResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let set = Self::from_bytes(bytes)?;
        log::debug!("Loaded font {}", path.as_ref().display());
        Ok(set)
    }

    /// The first available font from a short list of common system paths.
    pub fn system() -> Option<Self> {
        let found = SYSTEM_FONTS.iter().find_map(|path| Self::load(path).ok());
        if found.is_none() {
            log::warn!("No system font found; text and stamps render as placeholders");
        }
        found
    }

    /// Whether every visible character of `text` has an outline in this font.
    pub fn covers(&self, text: &str) -> bool {
        text.chars()
            .filter(|c| !is_joiner(*c) && !c.is_whitespace())
            .all(|c| self.font.glyph_id(c) != GlyphId(0))
    }

    /// Width of one line of text at `px` size.
    pub fn line_width(&self, line: &str, px: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0;
        let mut previous: Option<GlyphId> = None;
        for c in line.chars().filter(|c| !is_joiner(*c)) {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }
        width
    }

    /// Append one line of outlines with its baseline starting at `origin`.
    fn push_line(&self, pb: &mut PathBuilder, line: &str, px: f32, origin: (f32, f32)) {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let (sx, sy) = (scaled.h_scale_factor(), scaled.v_scale_factor());
        let mut pen_x = origin.0;
        let mut previous: Option<GlyphId> = None;
        for c in line.chars().filter(|c| !is_joiner(*c)) {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                pen_x += scaled.kern(prev, id);
            }
            if let Some(outline) = self.font.outline(id) {
                let map = |p: ab_glyph::Point| (pen_x + p.x * sx, origin.1 - p.y * sy);
                let mut last: Option<(f32, f32)> = None;
                for curve in &outline.curves {
                    let (start, end) = match curve {
                        OutlineCurve::Line(a, b) => (map(*a), map(*b)),
                        OutlineCurve::Quad(a, _, c) => (map(*a), map(*c)),
                        OutlineCurve::Cubic(a, _, _, d) => (map(*a), map(*d)),
                    };
                    if last != Some(start) {
                        if last.is_some() {
                            pb.close();
                        }
                        pb.move_to(start.0, start.1);
                    }
                    match curve {
                        OutlineCurve::Line(_, _) => pb.line_to(end.0, end.1),
                        OutlineCurve::Quad(_, b, _) => {
                            let b = map(*b);
                            pb.quad_to(b.0, b.1, end.0, end.1);
                        }
                        OutlineCurve::Cubic(_, b, c, _) => {
                            let (b, c) = (map(*b), map(*c));
                            pb.cubic_to(b.0, b.1, c.0, c.1, end.0, end.1);
                        }
                    }
                    last = Some(end);
                }
                if last.is_some() {
                    pb.close();
                }
            }
            pen_x += scaled.h_advance(id);
            previous = Some(id);
        }
    }

    /// Outline of a text block with its top-left corner at the origin.
    ///
    /// Lines advance by `line_height`; `box_width` positions centered and
    /// right-aligned lines.
    pub fn text_path(&self, text: &str, px: f32, line_height: f32, align: TextAlign, box_width: f32) -> Option<Path> {
        let ascent = self.font.as_scaled(PxScale::from(px)).ascent();
        let mut pb = PathBuilder::new();
        for (i, line) in text.split('\n').enumerate() {
            let x = match align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (box_width - self.line_width(line, px)) / 2.0,
                TextAlign::Right => box_width - self.line_width(line, px),
            };
            self.push_line(&mut pb, line, px, (x, i as f32 * line_height + ascent));
        }
        pb.finish()
    }

    /// Outline of a glyph cluster centered on the origin.
    pub fn centered_path(&self, text: &str, px: f32) -> Option<Path> {
        let mut pb = PathBuilder::new();
        self.push_line(&mut pb, text, px, (0.0, 0.0));
        let path = pb.finish()?;
        let b = path.bounds();
        let (cx, cy) = ((b.left() + b.right()) / 2.0, (b.top() + b.bottom()) / 2.0);
        path.transform(Transform::from_translate(-cx, -cy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_font_bytes() {
        assert!(matches!(
            GlyphSet::from_bytes(vec![0, 1, 2, 3]),
            Err(RendererError::Font(_))
        ));
    }

    #[test]
    fn test_missing_font_file() {
        assert!(matches!(
            GlyphSet::load("/nonexistent/font.ttf"),
            Err(RendererError::Io(_))
        ));
    }

    #[test]
    fn test_system_font_outlines_when_available() {
        let Some(glyphs) = GlyphSet::system() else {
            return;
        };
        assert!(glyphs.covers("Hello"));
        let path = glyphs.text_path("Hi\nthere", 20.0, 24.0, TextAlign::Left, 100.0).unwrap();
        let b = path.bounds();
        assert!(b.top() >= -1.0);
        assert!(b.bottom() > 24.0);
        let centered = glyphs.centered_path("O", 40.0).unwrap();
        let c = centered.bounds();
        assert!(((c.left() + c.right()) / 2.0).abs() < 0.5);
        assert!(((c.top() + c.bottom()) / 2.0).abs() < 0.5);
    }
}
