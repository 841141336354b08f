//! Four-layer CPU renderer.
//!
//! | layer      | repainted when                                   |
//! |------------|--------------------------------------------------|
//! | background | the device size changes                          |
//! | shapes     | the mapping changes or committed shapes change   |
//! | preview    | a gesture preview exists now or did last frame   |
//! | ui         | the overlays or the mapping change               |

use crate::glyphs::GlyphSet;
use crate::paint::Painter;
use crate::renderer::{FrameInput, LayerKind, RenderConfig, RenderResult, RenderStats, RendererError};
use inkboard_core::shapes::ShapeId;
use inkboard_core::tools::Overlay;
use inkboard_core::viewport::Viewport;
use resvg::tiny_skia::{Pixmap, PixmapPaint, Transform};

pub struct LayeredRenderer {
    config: RenderConfig,
    glyphs: Option<GlyphSet>,
    /// Indexed by [`LayerKind::index`]; empty until the first frame.
    layers: Vec<Pixmap>,
    last_viewport: Option<Viewport>,
    last_in_flight: Option<ShapeId>,
    had_preview: bool,
    last_overlays: Vec<Overlay>,
    background_dirty: bool,
}

impl Default for LayeredRenderer {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl LayeredRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            glyphs: None,
            layers: Vec::new(),
            last_viewport: None,
            last_in_flight: None,
            had_preview: false,
            last_overlays: Vec::new(),
            background_dirty: true,
        }
    }

    /// Use `glyphs` for text and stamp shapes.
    pub fn with_glyphs(mut self, glyphs: GlyphSet) -> Self {
        self.glyphs = Some(glyphs);
        self
    }

    pub fn glyphs(&self) -> Option<&GlyphSet> {
        self.glyphs.as_ref()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Replace the visual settings; every layer repaints on the next frame.
    pub fn set_config(&mut self, config: RenderConfig) {
        self.config = config;
        self.invalidate();
    }

    /// Force a full repaint on the next frame.
    pub fn invalidate(&mut self) {
        self.background_dirty = true;
        self.last_viewport = None;
    }

    pub fn layer(&self, kind: LayerKind) -> Option<&Pixmap> {
        self.layers.get(kind.index())
    }

    /// Device size of the layers, once allocated.
    pub fn device_size(&self) -> Option<(u32, u32)> {
        self.layers.first().map(|p| (p.width(), p.height()))
    }

    fn allocate(&mut self, width: u32, height: u32) -> RenderResult<()> {
        let layers = LayerKind::ALL
            .iter()
            .map(|_| Pixmap::new(width, height).ok_or(RendererError::Allocation { width, height }))
            .collect::<RenderResult<Vec<_>>>()?;
        self.layers = layers;
        log::debug!("Allocated four {width}x{height} layers");
        Ok(())
    }

    /// Bring every layer up to date with `frame`, repainting only what changed.
    pub fn render(&mut self, frame: &FrameInput<'_>) -> RenderResult<RenderStats> {
        let viewport = *frame.store.viewport();
        let mapping = viewport.device_mapping();
        let (width, height) = (mapping.device_width.max(1), mapping.device_height.max(1));
        let resized = self.device_size() != Some((width, height));
        if resized {
            self.allocate(width, height)?;
        }

        let mapping_changed = resized || self.last_viewport != Some(viewport);
        let mut stats = RenderStats {
            background: resized || self.background_dirty,
            shapes: mapping_changed || frame.shapes_damaged || frame.in_flight != self.last_in_flight,
            ..RenderStats::default()
        };
        let in_flight = frame
            .in_flight
            .filter(|id| frame.preview.is_none_or(|p| p.id() != *id))
            .and_then(|id| frame.store.shape(id));
        let has_preview = frame.preview.is_some() || in_flight.is_some();
        stats.preview = has_preview || self.had_preview;
        stats.ui = mapping_changed || frame.overlays != self.last_overlays;

        let glyphs = self.glyphs.as_ref();
        let [background, shapes, preview, ui] = self.layers.as_mut_slice() else {
            return Err(RendererError::Allocation { width, height });
        };

        if stats.background {
            Painter::new(background, viewport, glyphs).background(&self.config);
        }
        if stats.shapes {
            let mut painter = Painter::new(shapes, viewport, glyphs);
            painter.clear();
            for shape in frame.store.shapes_ordered() {
                if Some(shape.id()) == frame.in_flight {
                    continue;
                }
                painter.shape(shape);
                stats.shapes_drawn += 1;
            }
        }
        if stats.preview {
            let mut painter = Painter::new(preview, viewport, glyphs);
            painter.clear();
            if let Some(shape) = in_flight {
                painter.shape(shape);
            }
            if let Some(shape) = frame.preview {
                painter.shape(shape);
            }
        }
        if stats.ui {
            let mut painter = Painter::new(ui, viewport, glyphs);
            painter.clear();
            for overlay in &frame.overlays {
                painter.overlay(overlay, &self.config);
            }
        }

        self.background_dirty = false;
        self.last_viewport = Some(viewport);
        self.last_in_flight = frame.in_flight;
        self.had_preview = has_preview;
        if stats.ui {
            self.last_overlays = frame.overlays.clone();
        }
        log::trace!("Rendered frame: {stats:?}");
        Ok(stats)
    }

    /// Flatten the four layers into one image.
    pub fn composite(&self) -> RenderResult<Pixmap> {
        let (width, height) = self.device_size().unwrap_or((1, 1));
        let mut out = Pixmap::new(width, height).ok_or(RendererError::Allocation { width, height })?;
        for layer in &self.layers {
            out.draw_pixmap(0, 0, layer.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkboard_core::input::PointerEvent;
    use inkboard_core::tools::ToolKind;
    use inkboard_core::{Engine, EngineConfig};
    use kurbo::Point;

    fn engine() -> Engine {
        Engine::headless(EngineConfig::default(), 200.0, 100.0, 2.0)
    }

    fn draw_line(e: &mut Engine, from: (f64, f64), to: (f64, f64), t: f64) {
        e.pointer_down(&PointerEvent::new(from.0, from.1).at(t));
        e.pointer_move(&PointerEvent::new(to.0, to.1).at(t + 16.0));
        e.frame(t + 16.0);
        e.pointer_up(&PointerEvent::new(to.0, to.1).at(t + 20.0));
    }

    #[test]
    fn test_layers_sized_in_device_pixels() {
        let mut e = engine();
        let mut r = LayeredRenderer::default();
        let stats = r.render(&FrameInput::from_engine(&mut e)).unwrap();
        assert!(stats.background && stats.shapes && stats.ui);
        for kind in LayerKind::ALL {
            let layer = r.layer(kind).unwrap();
            assert_eq!((layer.width(), layer.height()), (400, 200));
        }
    }

    #[test]
    fn test_idle_frame_repaints_nothing() {
        let mut e = engine();
        let mut r = LayeredRenderer::default();
        r.render(&FrameInput::from_engine(&mut e)).unwrap();
        let stats = r.render(&FrameInput::from_engine(&mut e)).unwrap();
        assert!(!stats.anything());
    }

    #[test]
    fn test_live_stroke_only_touches_preview() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        let mut r = LayeredRenderer::default();
        r.render(&FrameInput::from_engine(&mut e)).unwrap();

        e.pointer_down(&PointerEvent::new(20.0, 50.0).at(0.0));
        r.render(&FrameInput::from_engine(&mut e)).unwrap();
        e.pointer_move(&PointerEvent::new(180.0, 50.0).at(16.0));
        e.frame(16.0);
        let stats = r.render(&FrameInput::from_engine(&mut e)).unwrap();
        assert!(stats.preview);
        assert!(!stats.shapes && !stats.background);
        assert!(r.layer(LayerKind::Preview).unwrap().pixel(200, 100).unwrap().alpha() > 0);
        assert_eq!(r.layer(LayerKind::Shapes).unwrap().pixel(200, 100).unwrap().alpha(), 0);

        e.pointer_up(&PointerEvent::new(180.0, 50.0).at(20.0));
        let stats = r.render(&FrameInput::from_engine(&mut e)).unwrap();
        assert!(stats.shapes && stats.preview);
        assert_eq!(stats.shapes_drawn, 1);
        assert!(r.layer(LayerKind::Shapes).unwrap().pixel(200, 100).unwrap().alpha() > 0);
        assert_eq!(r.layer(LayerKind::Preview).unwrap().pixel(200, 100).unwrap().alpha(), 0);

        // Once the preview is gone it stays untouched.
        let stats = r.render(&FrameInput::from_engine(&mut e)).unwrap();
        assert!(!stats.preview);
    }

    #[test]
    fn test_zoom_repaints_shapes_not_background() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        draw_line(&mut e, (20.0, 50.0), (180.0, 50.0), 0.0);
        let mut r = LayeredRenderer::default();
        r.render(&FrameInput::from_engine(&mut e)).unwrap();

        e.zoom_at(Point::new(100.0, 50.0), 2.0);
        let stats = r.render(&FrameInput::from_engine(&mut e)).unwrap();
        assert!(stats.shapes && stats.ui);
        assert!(!stats.background);

        e.resize(300.0, 100.0, 2.0);
        let stats = r.render(&FrameInput::from_engine(&mut e)).unwrap();
        assert!(stats.background && stats.shapes);
        assert_eq!(r.device_size(), Some((600, 200)));
    }

    #[test]
    fn test_overlay_change_repaints_ui_only() {
        let mut e = engine();
        e.set_tool(ToolKind::Eraser);
        let mut r = LayeredRenderer::default();
        r.render(&FrameInput::from_engine(&mut e)).unwrap();
        e.pointer_move(&PointerEvent::new(100.0, 50.0));
        let stats = r.render(&FrameInput::from_engine(&mut e)).unwrap();
        assert!(stats.ui);
        assert!(!stats.shapes && !stats.background && !stats.preview);
    }

    #[test]
    fn test_composite_stacks_background_under_shapes() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        draw_line(&mut e, (20.0, 50.0), (180.0, 50.0), 0.0);
        let mut r = LayeredRenderer::default();
        r.render(&FrameInput::from_engine(&mut e)).unwrap();
        let out = r.composite().unwrap();
        let ink = out.pixel(200, 100).unwrap().demultiply();
        assert_eq!((ink.red(), ink.alpha()), (0, 255));
        let paper = out.pixel(10, 10).unwrap().demultiply();
        assert_eq!((paper.red(), paper.alpha()), (255, 255));
    }
}
