//! Renderer configuration, frame input and errors.

use inkboard_core::shapes::{Shape, ShapeId};
use inkboard_core::store::ShapeStore;
use inkboard_core::surface::Surface;
use inkboard_core::tools::Overlay;
use inkboard_core::Engine;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Cannot allocate a {width}x{height} layer")]
    Allocation { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("Font error: {0}")]
    Font(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Background grid style. The grid lives on the background layer, so it is
/// fixed to the surface rather than the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    #[default]
    None,
    Lines,
    Dots,
}

impl GridStyle {
    /// Cycle to the next grid style.
    pub fn next(self) -> Self {
        match self {
            GridStyle::None => GridStyle::Lines,
            GridStyle::Lines => GridStyle::Dots,
            GridStyle::Dots => GridStyle::None,
        }
    }
}

/// The four raster layers, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Background,
    Shapes,
    Preview,
    Ui,
}

impl LayerKind {
    pub const ALL: [LayerKind; 4] = [LayerKind::Background, LayerKind::Shapes, LayerKind::Preview, LayerKind::Ui];

    pub(crate) fn index(self) -> usize {
        match self {
            LayerKind::Background => 0,
            LayerKind::Shapes => 1,
            LayerKind::Preview => 2,
            LayerKind::Ui => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Background => "background",
            LayerKind::Shapes => "shapes",
            LayerKind::Preview => "preview",
            LayerKind::Ui => "ui",
        }
    }
}

/// Visual settings that are not part of the document.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub background_color: Color,
    pub grid_style: GridStyle,
    /// Grid spacing in logical pixels.
    pub grid_spacing: f64,
    pub grid_color: Color,
    pub selection_color: Color,
    pub eraser_color: Color,
    pub laser_color: Color,
    pub caret_color: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background_color: Color::from_rgba8(255, 255, 255, 255),
            grid_style: GridStyle::None,
            grid_spacing: 20.0,
            grid_color: Color::from_rgba8(225, 225, 225, 255),
            selection_color: Color::from_rgba8(59, 130, 246, 255), // Blue
            eraser_color: Color::from_rgba8(120, 120, 120, 255),
            laser_color: Color::from_rgba8(239, 68, 68, 255),
            caret_color: Color::from_rgba8(20, 20, 20, 255),
        }
    }
}

impl RenderConfig {
    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Set the grid style.
    pub fn with_grid(mut self, style: GridStyle) -> Self {
        self.grid_style = style;
        self
    }

    pub fn with_selection_color(mut self, color: Color) -> Self {
        self.selection_color = color;
        self
    }
}

/// Everything the renderer reads for one frame.
pub struct FrameInput<'a> {
    pub store: &'a ShapeStore,
    /// The active tool's local preview (vector drag, text draft).
    pub preview: Option<&'a Shape>,
    /// Store shape owned by the active gesture; drawn on the preview layer.
    pub in_flight: Option<ShapeId>,
    pub overlays: Vec<Overlay>,
    /// Committed shapes changed since the previous frame.
    pub shapes_damaged: bool,
}

impl<'a> FrameInput<'a> {
    /// Frame input for a bare store with no active gesture.
    pub fn from_store(store: &'a ShapeStore) -> Self {
        Self {
            store,
            preview: None,
            in_flight: None,
            overlays: Vec::new(),
            shapes_damaged: true,
        }
    }

    /// Collect the frame input from an engine, consuming its shape damage.
    pub fn from_engine<S: Surface>(engine: &'a mut Engine<S>) -> Self {
        let shapes_damaged = engine.take_shapes_damage();
        let engine: &'a Engine<S> = engine;
        Self {
            store: engine.store(),
            preview: engine.preview_shape(),
            in_flight: engine.in_flight(),
            overlays: engine.overlays(),
            shapes_damaged,
        }
    }
}

/// What a render call repainted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub background: bool,
    pub shapes: bool,
    pub preview: bool,
    pub ui: bool,
    /// Shapes rasterized on the shapes layer this frame.
    pub shapes_drawn: usize,
}

impl RenderStats {
    pub fn repainted(&self, layer: LayerKind) -> bool {
        match layer {
            LayerKind::Background => self.background,
            LayerKind::Shapes => self.shapes,
            LayerKind::Preview => self.preview,
            LayerKind::Ui => self.ui,
        }
    }

    pub fn anything(&self) -> bool {
        self.background || self.shapes || self.preview || self.ui
    }
}
