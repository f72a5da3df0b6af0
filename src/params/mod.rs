//! Parameter definitions with physical units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Physical units (seconds, Hz, etc.)
//! - Documented ranges and meanings
//! - Clamping at the write boundary, never inside a shader

mod analyzer;
mod render;
mod state;

// Re-export all types
pub use analyzer::AnalyzerConfig;
pub use render::RenderConfig;
pub use state::{ControlParams, SharedParams};
