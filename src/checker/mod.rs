// src/checker/mod.rs
// =============================================================================
// Image URL status checking.
//
// Submodules:
// - http: single URL probe plus the bounded parallel scanner
//
// Nothing here ever fails: an unreachable image is just `false`.
// =============================================================================

mod http;

pub use http::StatusChecker;
