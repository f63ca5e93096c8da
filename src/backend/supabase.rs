// src/backend/supabase.rs
// =============================================================================
// Supabase REST adapter: table access (PostgREST) and storage (Storage API).
//
// Endpoints used:
//   GET   {url}/rest/v1/{table}?select=*                  fetch every row
//   PATCH {url}/rest/v1/{table}?{id_column}=eq.{id}       update one column
//   POST  {url}/storage/v1/object/{bucket}/{key}          upload (x-upsert)
//   POST  {url}/storage/v1/object/sign/{bucket}/{key}     create signed URL
//
// Every request carries the access key both as `apikey` and as a bearer
// token, which is what the hosted API expects.
// =============================================================================

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::{json, Map, Value};
use url::Url;

use super::signed::resolve_signed_url;
use super::{BlobStore, Record, RecordId, RecordStore};
use crate::config::{BackendConfig, Schema};
use crate::error::{LinkerError, Result};

/// Talks to one Supabase project: one table and one storage bucket.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    base: Url,
    bucket: String,
    schema: Schema,
}

impl SupabaseClient {
    pub fn new(backend: &BackendConfig, schema: Schema) -> Result<Self> {
        let invalid_key = |_| LinkerError::Config("SUPABASE_KEY contains invalid characters".to_string());

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&backend.key).map_err(invalid_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", backend.key)).map_err(invalid_key)?,
        );

        // No timeout here: uploads of large originals may take a while
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LinkerError::Config(format!("failed to create HTTP client: {}", e)))?;

        let base = Url::parse(&backend.url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| LinkerError::Config(format!("SUPABASE_URL is not a valid URL: '{}'", backend.url)))?;

        Ok(SupabaseClient {
            client,
            base_url: backend.url.trim_end_matches('/').to_string(),
            base,
            bucket: backend.bucket.clone(),
            schema,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.schema.table)
    }

    fn storage_base(&self) -> String {
        format!("{}/storage/v1", self.base_url)
    }

    // Appends path segments to the project URL. Each segment is
    // percent-encoded, so a '/', '?' or '#' inside a key stays in its segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejected cannot-be-a-base URLs, so this always succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn object_url(&self, key: &str) -> Url {
        self.endpoint(&["storage", "v1", "object", self.bucket.as_str(), key])
    }

    fn sign_url(&self, key: &str) -> Url {
        self.endpoint(&["storage", "v1", "object", "sign", self.bucket.as_str(), key])
    }
}

// Turns a non-2xx response into "HTTP 400: <body>"
async fn failure_reason(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), body)
    }
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn fetch_all(&self) -> Result<Vec<Record>> {
        let response = self
            .client
            .get(self.table_url())
            .query(&[("select", "*")])
            .send()
            .await
            .map_err(|e| LinkerError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LinkerError::Fetch(failure_reason(response).await));
        }

        let rows: Vec<Map<String, Value>> = response
            .json()
            .await
            .map_err(|e| LinkerError::Schema(format!("table response is not a list of rows: {}", e)))?;

        tracing::debug!(rows = rows.len(), table = %self.schema.table, "fetched rows");

        rows.iter()
            .map(|row| Record::from_row(row, &self.schema))
            .collect()
    }

    async fn update_field(&self, id: &RecordId, field: &str, value: &str) -> Result<()> {
        let filter = format!("eq.{}", id);
        let mut body = Map::new();
        body.insert(field.to_string(), Value::String(value.to_string()));

        let response = self
            .client
            .patch(self.table_url())
            .query(&[(self.schema.id_column.as_str(), filter.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| LinkerError::Persist(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LinkerError::Persist(failure_reason(response).await));
        }

        tracing::info!(%id, field, "record updated");
        Ok(())
    }
}

#[async_trait]
impl BlobStore for SupabaseClient {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str, upsert: bool) -> Result<()> {
        let size = bytes.len();
        let response = self
            .client
            .post(self.object_url(key))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await
            .map_err(|e| LinkerError::Upload {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(LinkerError::Upload {
                key: key.to_string(),
                reason: failure_reason(response).await,
            });
        }

        tracing::info!(key, size, content_type, "blob uploaded");
        Ok(())
    }

    async fn sign(&self, key: &str, expiry_secs: u64) -> Result<String> {
        let sign_error = |reason: String| LinkerError::Sign {
            key: key.to_string(),
            reason,
        };

        let response = self
            .client
            .post(self.sign_url(key))
            .json(&json!({ "expiresIn": expiry_secs }))
            .send()
            .await
            .map_err(|e| sign_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(sign_error(failure_reason(response).await));
        }

        let value: Value = response.json().await.map_err(|e| sign_error(e.to_string()))?;
        resolve_signed_url(value, &self.storage_base())
    }
}
