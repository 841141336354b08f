//! inkboard Render Library
//!
//! Four-layer CPU renderer for the annotation engine, glyph drawing for text
//! and stamps, and PNG/SVG export of the shapes layer.

mod export;
mod glyphs;
mod layers;
mod paint;
mod renderer;

pub use export::{encode_png, encode_svg, rasterize_shapes};
pub use glyphs::GlyphSet;
pub use layers::LayeredRenderer;
pub use renderer::{FrameInput, GridStyle, LayerKind, RenderConfig, RenderResult, RenderStats, RendererError};

/// Re-exported so hosts can read layer pixels without a direct dependency.
pub use resvg::tiny_skia::Pixmap;
