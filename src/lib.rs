//! vibe-ngin
//!
//! A small cross-platform wgpu renderer for native and WASM. It loads
//! Wavefront OBJ/MTL assets, keeps them in a per-manager cache, draws them
//! flat-colored or textured under a spinning transform, and lays a
//! dynamically rasterized text overlay on top.
//!
//! High-level modules
//! - `config`: engine knobs and their defaults
//! - `context`: window surface, device/queue handles and late device binding
//! - `data_structures`: mesh, material and texture records
//! - `error`: the engine error taxonomy
//! - `flow`: the event loop, debounced resizing and host hooks
//! - `pipelines`: flat, textured and text pipelines plus the resource binder
//! - `resources`: asset sources, the OBJ/MTL parser and the resource cache
//! - `scene`: drawables and the per-frame scene renderer
//! - `text`: fonts, text entries and the overlay renderer
//! - `transform`: rotation and aspect-correcting projection
//!

pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod resources;
pub mod scene;
pub mod text;
pub mod transform;

// Re-exports commonly used types for convenience in downstream code.
pub use config::{EngineConfig, ReadinessBudget};
pub use error::{EngineError, Result};
pub use flow::{run, GraphicsFlow};
pub use text::{FontBook, FontWeight, TextId, TextRenderer, TextStyle, TextUpdate};
pub use winit::event::WindowEvent;
