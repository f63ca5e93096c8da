// src/lib.rs
// =============================================================================
// image-linker: audit and replace the images linked from a Supabase table.
//
// Module map:
// - config:    environment configuration and the table Schema
// - error:     LinkerError, the library-wide error type
// - naming:    storage keys and content types
// - checker:   URL status probe + bounded parallel scanner
// - optimizer: JPEG normalize/resize pipeline and image inspection
// - backend:   RecordStore / BlobStore traits and the Supabase adapter
// - records:   in-memory record list with image statuses
// - service:   the download/optimize/upload/sign/persist sequence
// - batch:     re-optimizing every already linked image
// =============================================================================

pub mod backend;
pub mod batch;
pub mod checker;
pub mod config;
pub mod error;
pub mod naming;
pub mod optimizer;
pub mod records;
pub mod service;

pub use error::{LinkerError, Result};
