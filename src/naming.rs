// src/naming.rs
// =============================================================================
// Storage keys and content types.
//
// Every uploaded image lands at a key built from the record itself:
//
//     {id}_{sanitized_title}{extension}      e.g. "42_Sea_View.png"
//
// The same record always maps to the same key, so uploading again simply
// overwrites the old blob (the storage upload runs with upsert enabled).
// =============================================================================

use std::path::Path;
use url::Url;

/// Extension used when nothing better can be found.
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// Content type used for unknown extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Keeps letters, digits, spaces, '-' and '_', trims the ends and turns the
/// remaining spaces into underscores.
///
/// "Sea View!!" -> "Sea_View"
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim().replace(' ', "_")
}

/// Builds the storage key for a record image.
///
/// A title made only of punctuation sanitizes to nothing; the key then falls
/// back to the id alone (`{id}{extension}`) instead of a dangling underscore.
pub fn storage_key(id: &str, title: &str, extension: &str) -> String {
    let safe_title = sanitize_title(title);
    if safe_title.is_empty() {
        format!("{}{}", id, extension)
    } else {
        format!("{}_{}{}", id, safe_title, extension)
    }
}

/// Maps an extension (".png") or a file name ("photo.png") to a MIME type.
pub fn content_type(extension_or_filename: &str) -> &'static str {
    let ext = if extension_or_filename.starts_with('.') {
        extension_or_filename.to_lowercase()
    } else {
        extension_from_filename(extension_or_filename)
    };

    match ext.as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".webp" => "image/webp",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Lower-case extension of a file name, including the dot.
///
/// Returns an empty string when the name has no extension.
pub fn extension_from_filename(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Lower-case extension of the path part of a URL, or ".jpg".
///
/// Query strings and fragments are ignored:
/// "https://cdn.example.com/a/b.PNG?w=200" -> ".png"
pub fn extension_from_url(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let ext = extension_from_filename(&path);
    if ext.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        ext
    }
}
