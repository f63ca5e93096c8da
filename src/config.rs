// src/config.rs
// =============================================================================
// Runtime configuration, read from environment variables (and a .env file).
//
// Only SUPABASE_URL and SUPABASE_KEY are required. Everything else has a
// default that matches a "properties" table with id / title / image_url
// columns, so a fresh setup only needs the two credentials.
//
// `Config::from_lookup` takes any key -> value function. The real program
// passes `std::env::var`, tests pass a HashMap, so tests never have to touch
// the process environment.
// =============================================================================

use std::str::FromStr;
use std::time::Duration;

use crate::error::{LinkerError, Result};

/// Names of the table columns the tool reads and writes.
///
/// This is passed to the record set and the backend adapter when they are
/// built, so neither of them looks column names up on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub table: String,
    pub id_column: String,
    pub title_column: String,
    pub image_url_column: String,
    /// Extra columns shown by `show`, never interpreted
    pub extra_columns: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Schema {
            table: "properties_CM_pub".to_string(),
            id_column: "id".to_string(),
            title_column: "title".to_string(),
            image_url_column: "image_url".to_string(),
            extra_columns: vec!["listing_url".to_string()],
        }
    }
}

/// Where the backend lives and how to authenticate.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub key: String,
    pub bucket: String,
}

/// Settings for the status probe and the parallel scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub max_workers: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            timeout: Duration::from_secs(3),
            max_workers: 10,
        }
    }
}

/// Bounds for one run of the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
    pub max_dimension: u32,
    /// JPEG quality, 1..=95
    pub quality: u8,
}

impl ImageBounds {
    pub const FULL: ImageBounds = ImageBounds {
        max_dimension: 1920,
        quality: 85,
    };
    pub const THUMBNAIL: ImageBounds = ImageBounds {
        max_dimension: 400,
        quality: 75,
    };
}

const SECONDS_PER_YEAR: u64 = 60 * 60 * 24 * 365;

/// Everything the upload pipeline needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub optimize: bool,
    pub image: ImageBounds,
    pub thumbnail: ImageBounds,
    pub signed_url_expiry_years: u64,
    /// None means "wait as long as the server takes"
    pub download_timeout: Option<Duration>,
    /// Lower-case extensions including the dot, e.g. ".png"
    pub accepted_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            optimize: true,
            image: ImageBounds::FULL,
            thumbnail: ImageBounds::THUMBNAIL,
            signed_url_expiry_years: 10,
            download_timeout: None,
            accepted_extensions: [".jpg", ".jpeg", ".png", ".webp"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    /// Signed URL lifetime in seconds (a year is counted as 365 days).
    ///
    /// `from_lookup` rejects year counts that overflow, so the saturation
    /// only matters for hand-built values.
    pub fn signed_url_expiry_secs(&self) -> u64 {
        SECONDS_PER_YEAR.saturating_mul(self.signed_url_expiry_years)
    }

    /// Is this file name one we allow as an upload?
    pub fn accepts(&self, filename: &str) -> bool {
        let ext = crate::naming::extension_from_filename(filename);
        self.accepted_extensions.iter().any(|accepted| *accepted == ext)
    }
}

/// Labels and layout numbers for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub entity_label: String,
    pub entity_label_plural: String,
    pub page_size: usize,
    pub preview_width: u32,
    pub preview_height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            entity_label: "Property".to_string(),
            entity_label_plural: "Properties".to_string(),
            page_size: 20,
            preview_width: 300,
            preview_height: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub schema: Schema,
    pub probe: ProbeConfig,
    pub upload: UploadConfig,
    pub display: DisplayConfig,
}

impl Config {
    /// Loads `.env` (if there is one) and reads the process environment.
    pub fn from_env() -> Result<Config> {
        // A missing .env file is normal, real env vars still apply
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("no .env file loaded: {}", e);
        }
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Thumbnail bounds alone, for commands that never touch the backend.
    ///
    /// Needs no credentials, but a malformed THUMBNAIL_* value is still an error.
    pub fn thumbnail_bounds_from_env() -> Result<ImageBounds> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("no .env file loaded: {}", e);
        }
        Config::thumbnail_bounds_from_lookup(|key| std::env::var(key).ok())
    }

    pub fn thumbnail_bounds_from_lookup<F>(lookup: F) -> Result<ImageBounds>
    where
        F: Fn(&str) -> Option<String>,
    {
        thumbnail_bounds(&|key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
    }

    /// Builds the configuration from any key -> value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Treat empty strings like unset variables
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let url = get("SUPABASE_URL");
        let key = get("SUPABASE_KEY");
        let (url, key) = match (url, key) {
            (Some(url), Some(key)) => (url.trim_end_matches('/').to_string(), key),
            _ => {
                return Err(LinkerError::Config(
                    "Supabase credentials not found in environment variables \
                     (SUPABASE_URL, SUPABASE_KEY)"
                        .to_string(),
                ))
            }
        };

        let defaults = Schema::default();
        let schema = Schema {
            table: get("DATA_TABLE").unwrap_or(defaults.table),
            id_column: get("ID_COLUMN").unwrap_or(defaults.id_column),
            title_column: get("TITLE_COLUMN").unwrap_or(defaults.title_column),
            image_url_column: get("IMAGE_URL_COLUMN").unwrap_or(defaults.image_url_column),
            extra_columns: match get("ADDITIONAL_DISPLAY_COLUMNS") {
                Some(list) => split_list(&list),
                None => defaults.extra_columns,
            },
        };

        let probe = ProbeConfig {
            timeout: Duration::from_secs(parse_or(&get, "IMAGE_CHECK_TIMEOUT", 3u64)?),
            max_workers: parse_or(&get, "IMAGE_CHECK_MAX_WORKERS", 10usize)?.max(1),
        };

        let upload_defaults = UploadConfig::default();
        let upload = UploadConfig {
            optimize: parse_bool_or(&get, "ENABLE_IMAGE_OPTIMIZATION", true)?,
            image: ImageBounds {
                max_dimension: parse_dimension(&get, "IMAGE_MAX_DIMENSION", ImageBounds::FULL.max_dimension)?,
                quality: parse_quality(&get, "IMAGE_QUALITY", ImageBounds::FULL.quality)?,
            },
            thumbnail: thumbnail_bounds(&get)?,
            signed_url_expiry_years: parse_expiry_years(&get)?,
            download_timeout: match get("IMAGE_DOWNLOAD_TIMEOUT") {
                Some(raw) => Some(Duration::from_secs(parse_value("IMAGE_DOWNLOAD_TIMEOUT", &raw)?)),
                None => None,
            },
            accepted_extensions: match get("ACCEPTED_IMAGE_FORMATS") {
                Some(list) => split_list(&list)
                    .into_iter()
                    .map(|ext| normalize_extension(&ext))
                    .collect(),
                None => upload_defaults.accepted_extensions,
            },
        };

        let display_defaults = DisplayConfig::default();
        let display = DisplayConfig {
            entity_label: get("ENTITY_LABEL").unwrap_or(display_defaults.entity_label),
            entity_label_plural: get("ENTITY_LABEL_PLURAL")
                .unwrap_or(display_defaults.entity_label_plural),
            page_size: parse_or(&get, "TABLE_PAGE_SIZE", display_defaults.page_size)?.max(1),
            preview_width: parse_or(&get, "IMAGE_PREVIEW_WIDTH", display_defaults.preview_width)?,
            preview_height: parse_or(&get, "IMAGE_PREVIEW_HEIGHT", display_defaults.preview_height)?,
        };

        Ok(Config {
            backend: BackendConfig {
                url,
                key,
                bucket: get("STORAGE_BUCKET").unwrap_or_else(|| "property-images".to_string()),
            },
            schema,
            probe,
            upload,
            display,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

// "png" and ".PNG" both become ".png"
fn normalize_extension(ext: &str) -> String {
    let ext = ext.to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| LinkerError::Config(format!("{} has an invalid value: '{}'", name, raw)))
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, name: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(LinkerError::Config(format!("{} has an invalid value: '{}'", name, v))),
    }
}

fn parse_dimension<G>(get: &G, name: &str, default: u32) -> Result<u32>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, name, default)?;
    if value == 0 {
        return Err(LinkerError::Config(format!("{} must be at least 1", name)));
    }
    Ok(value)
}

fn thumbnail_bounds<G>(get: &G) -> Result<ImageBounds>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(ImageBounds {
        max_dimension: parse_dimension(get, "THUMBNAIL_MAX_DIMENSION", ImageBounds::THUMBNAIL.max_dimension)?,
        quality: parse_quality(get, "THUMBNAIL_QUALITY", ImageBounds::THUMBNAIL.quality)?,
    })
}

fn parse_expiry_years<G>(get: &G) -> Result<u64>
where
    G: Fn(&str) -> Option<String>,
{
    let years = parse_or(get, "SIGNED_URL_EXPIRY_YEARS", 10u64)?;
    match SECONDS_PER_YEAR.checked_mul(years) {
        Some(_) => Ok(years),
        None => Err(LinkerError::Config(format!(
            "SIGNED_URL_EXPIRY_YEARS is too large: {}",
            years
        ))),
    }
}

fn parse_quality<G>(get: &G, name: &str, default: u8) -> Result<u8>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_or(get, name, default)?.clamp(1, 95))
}
