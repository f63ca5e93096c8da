// src/optimizer/mod.rs
// =============================================================================
// Image optimization.
//
// Submodules:
// - pipeline: optimize() / thumbnail(), the normalize + resize + JPEG pipeline
// - info: inspect(), metadata only, nothing is re-encoded
//
// Everything here is synchronous and CPU bound. Async callers should run it
// through tokio::task::spawn_blocking (see service.rs).
// =============================================================================

mod info;
mod pipeline;

pub use info::{inspect, ImageInfo};
pub use pipeline::{optimize, thumbnail, OptimizedImage, OUTPUT_FORMAT};
