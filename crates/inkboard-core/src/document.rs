//! JSON document format: shapes in z-order, viewport and tool settings.

use crate::error::{EngineError, EngineResult};
use crate::settings::ToolSettings;
use crate::shapes::Shape;
use crate::store::ShapeStore;
use crate::viewport::Viewport;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current document format version.
pub const DOCUMENT_VERSION: u32 = 1;

fn current_version() -> u32 {
    DOCUMENT_VERSION
}

/// A saved annotation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "current_version")]
    pub version: u32,
    /// Back to front.
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub config: ToolSettings,
}

impl Document {
    /// Snapshot the live state of a store.
    pub fn from_store(store: &ShapeStore) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            shapes: store.shapes_ordered().cloned().collect(),
            viewport: *store.viewport(),
            config: store.settings().clone(),
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let doc: Document = serde_json::from_str(json)?;
        if doc.version > DOCUMENT_VERSION {
            return Err(EngineError::UnsupportedVersion(doc.version));
        }
        Ok(doc)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        log::info!(
            "Saved {} shapes to {}",
            self.shapes.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let doc = Self::from_json(&text)?;
        log::info!(
            "Loaded {} shapes from {}",
            doc.shapes.len(),
            path.as_ref().display()
        );
        Ok(doc)
    }
}

impl ShapeStore {
    /// Replace the store contents with a document, as one "import" entry.
    ///
    /// The surface size, device pixel ratio and zoom bounds stay those of the
    /// current host; only pan and zoom come from the document.
    pub fn import_document(&mut self, doc: Document) {
        let current = *self.viewport();
        let viewport = Viewport {
            pan_x: doc.viewport.pan_x,
            pan_y: doc.viewport.pan_y,
            zoom: doc.viewport.zoom,
            ..current
        };
        self.set_viewport(viewport);
        *self.settings_mut() = doc.config;
        self.replace_all(doc.shapes, "import");
    }
}
