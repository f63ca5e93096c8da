// src/backend/signed.rs
// =============================================================================
// Normalizes the answer of the "create signed URL" call.
//
// Depending on the server and client version the signed URL comes back as
//   {"signedURL": "..."}                  (storage API)
//   {"signedUrl": "..."}                  (typed client objects)
//   {"data": {...one of the above...}}    (enveloped responses)
// and the URL itself may be relative to the storage endpoint.
//
// Only this module knows about those shapes. The rest of the crate gets a
// plain absolute URL string or LinkerError::Lookup.
// =============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LinkerError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignedUrlResponse {
    Keyed {
        #[serde(rename = "signedURL")]
        signed_url: String,
    },
    Camel {
        #[serde(rename = "signedUrl")]
        signed_url: String,
    },
    Wrapped {
        data: Box<SignedUrlResponse>,
    },
}

impl SignedUrlResponse {
    /// Parses any JSON value; unknown shapes become LinkerError::Lookup.
    pub fn from_value(value: Value) -> Result<SignedUrlResponse> {
        let shown = value.to_string();
        serde_json::from_value(value).map_err(|_| LinkerError::Lookup(shown))
    }

    /// The URL as the server sent it (possibly relative).
    pub fn into_url(self) -> String {
        match self {
            SignedUrlResponse::Keyed { signed_url } | SignedUrlResponse::Camel { signed_url } => {
                signed_url
            }
            SignedUrlResponse::Wrapped { data } => data.into_url(),
        }
    }
}

/// Extracts the signed URL and makes it absolute against `storage_base`
/// (e.g. "https://abc.supabase.co/storage/v1").
pub fn resolve_signed_url(value: Value, storage_base: &str) -> Result<String> {
    let url = SignedUrlResponse::from_value(value)?.into_url();

    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(url);
    }

    let base = storage_base.trim_end_matches('/');
    if url.starts_with('/') {
        Ok(format!("{}{}", base, url))
    } else {
        Ok(format!("{}/{}", base, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://abc.supabase.co/storage/v1";

    #[test]
    fn test_mapping_shape() {
        let url = resolve_signed_url(json!({"signedURL": "https://x"}), BASE).unwrap();
        assert_eq!(url, "https://x");
    }

    #[test]
    fn test_object_shape() {
        let url = resolve_signed_url(json!({"signedUrl": "https://x", "path": "a.jpg"}), BASE).unwrap();
        assert_eq!(url, "https://x");
    }

    #[test]
    fn test_wrapped_shape() {
        let url = resolve_signed_url(json!({"data": {"signedURL": "https://x"}}), BASE).unwrap();
        assert_eq!(url, "https://x");
    }

    #[test]
    fn test_relative_url_is_made_absolute() {
        let url = resolve_signed_url(
            json!({"signedURL": "/object/sign/bucket/42_Sea_View.jpg?token=t"}),
            BASE,
        )
        .unwrap();
        assert_eq!(
            url,
            "https://abc.supabase.co/storage/v1/object/sign/bucket/42_Sea_View.jpg?token=t"
        );
    }

    #[test]
    fn test_unknown_shape_is_lookup_error() {
        let result = resolve_signed_url(json!({"error": "not found"}), BASE);
        assert!(matches!(result, Err(LinkerError::Lookup(_))));

        let result = resolve_signed_url(json!("https://x"), BASE);
        assert!(matches!(result, Err(LinkerError::Lookup(_))));
    }
}
