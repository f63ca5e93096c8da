// src/backend/mod.rs
// =============================================================================
// External collaborators: the remote table and the blob store.
//
// The rest of the crate only sees the two traits below. The real program
// plugs in SupabaseClient; tests plug in an in-memory fake.
//
// Submodules:
// - record: Record / RecordId, decoded through the configured Schema
// - signed: normalizes the signed-URL response shapes
// - supabase: the REST implementation of both traits
// =============================================================================

mod record;
mod signed;
mod supabase;

use async_trait::async_trait;

use crate::error::Result;

pub use record::{Record, RecordId};
pub use signed::{resolve_signed_url, SignedUrlResponse};
pub use supabase::SupabaseClient;

/// The remote table holding the records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every row of the table, in the order the server returns them.
    async fn fetch_all(&self) -> Result<Vec<Record>>;

    /// Sets `field` to `value` on the row whose id equals `id`.
    async fn update_field(&self, id: &RecordId, field: &str, value: &str) -> Result<()>;
}

/// The bucket the images are uploaded to.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// With `upsert` an existing object at `key` is overwritten.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str, upsert: bool) -> Result<()>;

    /// A signed, absolute read URL for `key`, valid for `expiry_secs`.
    async fn sign(&self, key: &str, expiry_secs: u64) -> Result<String>;
}
