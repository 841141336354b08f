//! Image export of the shapes layer.
//!
//! Not a re-editable format: PNG is the rasterized layer, SVG wraps that
//! PNG in an `<image>` element.

use crate::glyphs::GlyphSet;
use crate::layers::LayeredRenderer;
use crate::paint::Painter;
use crate::renderer::{LayerKind, RenderResult, RendererError};
use base64::Engine as _;
use inkboard_core::store::ShapeStore;
use resvg::tiny_skia::Pixmap;

/// Encode a layer as an RGBA PNG. Layers are premultiplied; PNG is not.
pub fn encode_png(pixmap: &Pixmap) -> RenderResult<Vec<u8>> {
    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&data)?;
        writer.finish()?;
    }
    Ok(out)
}

/// Minimal SVG document embedding `pixmap` as a base64 PNG, sized in
/// logical pixels.
pub fn encode_svg(pixmap: &Pixmap, dpr: f64) -> RenderResult<String> {
    let png = encode_png(pixmap)?;
    let dpr = if dpr > 0.0 { dpr } else { 1.0 };
    let width = f64::from(pixmap.width()) / dpr;
    let height = f64::from(pixmap.height()) / dpr;
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
    Ok(format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">\
         <image width=\"{width}\" height=\"{height}\" href=\"data:image/png;base64,{encoded}\"/></svg>"
    ))
}

/// Rasterize every shape in `store` into a fresh device-sized layer.
pub fn rasterize_shapes(store: &ShapeStore, glyphs: Option<&GlyphSet>) -> RenderResult<Pixmap> {
    let viewport = *store.viewport();
    let mapping = viewport.device_mapping();
    let (width, height) = (mapping.device_width.max(1), mapping.device_height.max(1));
    let mut pixmap = Pixmap::new(width, height).ok_or(RendererError::Allocation { width, height })?;
    let mut painter = Painter::new(&mut pixmap, viewport, glyphs);
    for shape in store.shapes_ordered() {
        painter.shape(shape);
    }
    log::info!("Rasterized {} shapes at {width}x{height}", store.len());
    Ok(pixmap)
}

impl LayeredRenderer {
    fn shapes_layer(&self) -> RenderResult<&Pixmap> {
        self.layer(LayerKind::Shapes)
            .ok_or(RendererError::Allocation { width: 0, height: 0 })
    }

    /// PNG of the shapes layer as last rendered.
    pub fn export_png(&self) -> RenderResult<Vec<u8>> {
        encode_png(self.shapes_layer()?)
    }

    /// SVG wrapper around the shapes layer as last rendered.
    pub fn export_svg(&self, dpr: f64) -> RenderResult<String> {
        encode_svg(self.shapes_layer()?, dpr)
    }
}
