//! inkboard Core Library
//!
//! Platform-agnostic annotation engine: coordinate transforms, the canonical
//! shape store with history, per-tool interaction state machines, the spatial
//! index used for hit-testing and the frame-coalescing update scheduler.

pub mod batcher;
pub mod collaboration;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod input;
pub mod settings;
pub mod shapes;
pub mod simplify;
pub mod snap;
pub mod spatial;
pub mod store;
pub mod surface;
pub mod time;
pub mod tools;
pub mod viewport;

pub use batcher::{FrameBatcher, FrameSource};
pub use collaboration::{CollabEvent, CollabPayload, OutboundQueue, RemoteCursors};
pub use config::EngineConfig;
pub use document::Document;
pub use engine::{Engine, FrameReport};
pub use error::{EngineError, ToolError};
pub use input::{Key, KeyEvent, Modifiers, PointerButton, PointerEvent, PointerKind};
pub use settings::ToolSettings;
pub use shapes::{Shape, ShapeBody, ShapeId, ShapeKind, ShapePatch};
pub use spatial::SpatialIndex;
pub use store::{HistoryEntry, ShapeStore, StoreChange};
pub use surface::{CursorIcon, HeadlessSurface, Surface};
pub use tools::{ActiveTool, Overlay, ToolKind};
pub use viewport::{DeviceMapping, Viewport};
