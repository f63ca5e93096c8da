// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
// =============================================================================

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use image_linker::records::StatusFilter;

#[derive(Parser, Debug)]
#[command(
    name = "image-linker",
    version,
    about = "Check and replace the images linked from a Supabase table",
    long_about = "image-linker lists the records of a Supabase table, checks whether each \
                  record's image URL still works, and replaces broken images by uploading \
                  a file or copying one from a URL. Uploads are optimized to JPEG, stored \
                  in a storage bucket and linked back through a long-lived signed URL."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List records with the status of their image
    ///
    /// Example: image-linker scan --status error
    Scan {
        /// Which records to show: all, ok or error
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        /// Page to show (1-based), TABLE_PAGE_SIZE rows per page
        #[arg(long)]
        page: Option<usize>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the details of one record
    Show {
        /// Record id
        id: String,
    },

    /// Replace the image of one record
    ///
    /// Example: image-linker upload 42 --file ./sea-view.png
    Upload {
        /// Record id
        id: String,

        #[command(flatten)]
        source: UploadSource,
    },

    /// Re-optimize every image already linked from the table
    ///
    /// Example: image-linker optimize --dry-run --limit 5
    Optimize {
        /// Preview what would be optimized without making changes
        #[arg(long)]
        dry_run: bool,

        /// Only process the first N images
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print width, height, format and color mode of a local image
    Inspect {
        path: PathBuf,
    },

    /// Write a small JPEG thumbnail of a local image
    Thumbnail {
        input: PathBuf,
        output: PathBuf,
    },
}

/// Exactly one of --file / --url
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct UploadSource {
    /// Local image file to upload
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Image URL to download and upload
    #[arg(long)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan() {
        let cli = Cli::try_parse_from(["image-linker", "scan", "--status", "error", "--json"]).unwrap();
        match cli.command {
            Commands::Scan { status, page, json } => {
                assert_eq!(status, StatusFilter::Error);
                assert_eq!(page, None);
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_upload_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["image-linker", "upload", "42"]).is_err());
        assert!(Cli::try_parse_from([
            "image-linker",
            "upload",
            "42",
            "--file",
            "a.png",
            "--url",
            "https://x/a.png"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["image-linker", "upload", "42", "--url", "https://x/a.png"]).is_ok());
    }

    #[test]
    fn test_parse_optimize() {
        let cli = Cli::try_parse_from(["image-linker", "optimize", "--dry-run", "--limit", "5"]).unwrap();
        match cli.command {
            Commands::Optimize { dry_run, limit } => {
                assert!(dry_run);
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
