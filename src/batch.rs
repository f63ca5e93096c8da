// src/batch.rs
// =============================================================================
// Re-optimizes every image that is already linked from the table.
//
// For each record with a non-empty image URL:
// 1. download the current image
// 2. inspect + optimize it
// 3. skip it if the optimized JPEG is less than 10% smaller
// 4. otherwise upload -> sign -> update the record (unless --dry-run)
//
// One failing record is counted and reported; the batch keeps going.
// Progress is printed as we go, the totals at the end.
// =============================================================================

use std::time::Duration;

use crate::backend::{Record, RecordStore};
use crate::error::Result;
use crate::optimizer;
use crate::service::{self, reduction_percent, ImageService};

/// Minimum saving (percent) worth a re-upload.
pub const MIN_REDUCTION_PERCENT: f64 = 10.0;

/// Download timeout when the configuration does not set one.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Report what would happen without uploading or updating anything
    pub dry_run: bool,
    /// Only look at the first N records that have an image
    pub limit: Option<usize>,
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Uploaded (or would be, in a dry run)
    Optimized { before: usize, after: usize },
    /// Saving below MIN_REDUCTION_PERCENT
    Skipped { before: usize, after: usize },
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub optimized: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Bytes before/after, summed over optimized records only
    pub bytes_before: usize,
    pub bytes_after: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Optimized { before, after } => {
                self.optimized += 1;
                self.bytes_before += before;
                self.bytes_after += after;
            }
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn compression_percent(&self) -> f64 {
        reduction_percent(self.bytes_before, self.bytes_after)
    }

    /// Prints the closing block of the batch report.
    pub fn print(&self, dry_run: bool) {
        println!("{}", "=".repeat(60));
        println!("OPTIMIZATION SUMMARY");
        println!("{}", "=".repeat(60));
        println!("Total records processed: {}", self.total);
        println!("Successfully optimized: {}", self.optimized);
        println!("Failed: {}", self.failed);
        println!("Skipped (already optimal): {}", self.skipped);

        if self.optimized > 0 {
            let before = self.bytes_before as f64 / 1024.0;
            let after = self.bytes_after as f64 / 1024.0;
            println!();
            println!("Total size reduction:");
            println!("  Before: {:.1}KB", before);
            println!("  After: {:.1}KB", after);
            println!("  Saved: {:.1}KB", before - after);
            println!("  Compression: {:.1}%", self.compression_percent());
        }

        if dry_run {
            println!();
            println!("🔍 This was a DRY RUN - no changes were made");
            println!("Run without --dry-run to apply optimizations");
        }
        println!("{}", "=".repeat(60));
    }
}

/// Runs the batch over every record that currently has an image URL.
pub async fn optimize_existing(
    store: &dyn RecordStore,
    service: &ImageService,
    options: BatchOptions,
) -> Result<BatchSummary> {
    let records = store.fetch_all().await?;
    println!("Found {} total records", records.len());

    let mut with_images: Vec<Record> = records.into_iter().filter(|r| r.image_url.is_some()).collect();
    println!("Found {} records with images", with_images.len());

    if let Some(limit) = options.limit {
        with_images.truncate(limit);
        println!("Processing only first {} images (--limit flag)", limit);
    }

    let mut summary = BatchSummary {
        total: with_images.len(),
        ..BatchSummary::default()
    };

    for (index, record) in with_images.iter().enumerate() {
        println!("[{}/{}] Processing record {}", index + 1, summary.total, record.id);
        println!("  Title: {}", record.title);

        let outcome = match process_one(record, service, options.dry_run).await {
            Ok(outcome) => outcome,
            Err(e) => ItemOutcome::Failed(e.to_string()),
        };

        match &outcome {
            ItemOutcome::Optimized { .. } if options.dry_run => {
                println!("  ✅ Would optimize and upload (dry-run)")
            }
            ItemOutcome::Optimized { .. } => println!("  ✅ Successfully optimized and uploaded!"),
            ItemOutcome::Skipped { .. } => println!("  ⚠ Skipping: Less than 10% size reduction"),
            ItemOutcome::Failed(reason) => {
                tracing::warn!(id = %record.id, reason = %reason, "batch item failed");
                println!("  ❌ Error: {}", reason)
            }
        }
        println!();

        summary.record(&outcome);
    }

    Ok(summary)
}

async fn process_one(record: &Record, service: &ImageService, dry_run: bool) -> Result<ItemOutcome> {
    // Records without a URL were filtered out before
    let url = record.image_url.as_deref().unwrap_or_default();
    println!("  Current URL: {}", truncate(url, 80));

    let timeout = service.config().download_timeout.or(Some(DEFAULT_DOWNLOAD_TIMEOUT));
    let source = service::download(service.http(), url, timeout).await?;
    let before = source.bytes.len();

    let bounds = service.config().image;
    let (info, optimized) = tokio::task::spawn_blocking(move || {
        let info = optimizer::inspect(&source.bytes)?;
        let optimized = optimizer::optimize(&source.bytes, bounds)?;
        Ok::<_, crate::error::LinkerError>((info, optimized))
    })
    .await??;

    println!(
        "  → Original: {}x{} {}, {:.1}KB",
        info.width,
        info.height,
        info.format,
        before as f64 / 1024.0
    );

    let after = optimized.bytes.len();
    let saved = reduction_percent(before, after);
    println!("  → Optimized: {:.1}KB ({:.1}% reduction)", after as f64 / 1024.0, saved);

    if saved < MIN_REDUCTION_PERCENT {
        return Ok(ItemOutcome::Skipped { before, after });
    }

    if !dry_run {
        service
            .store(&record.id, &record.title, optimized.bytes, ".jpg", "image/jpeg")
            .await?;
    }

    Ok(ItemOutcome::Optimized { before, after })
}

// Shortens long URLs for the progress output
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let mut summary = BatchSummary {
            total: 3,
            ..BatchSummary::default()
        };
        summary.record(&ItemOutcome::Optimized { before: 1000, after: 400 });
        summary.record(&ItemOutcome::Skipped { before: 1000, after: 950 });
        summary.record(&ItemOutcome::Failed("HTTP 404".to_string()));

        assert_eq!(summary.optimized, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.bytes_before, 1000);
        assert_eq!(summary.bytes_after, 400);
        assert!((summary.compression_percent() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 80), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
