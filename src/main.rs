// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Set up logging and parse command-line arguments using clap
// 2. Load the configuration (needs SUPABASE_URL and SUPABASE_KEY)
// 3. Dispatch to the appropriate subcommand handler
// 4. Exit with proper code (0 = success, 1 = broken images / failed items,
//    2 = error)
//
// This is the only place that catches errors: every handler just uses `?`
// and run() turns whatever comes back into a message and exit code 2.
// =============================================================================

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, UploadSource};
use tracing_subscriber::EnvFilter;

use image_linker::backend::{RecordId, RecordStore, SupabaseClient};
use image_linker::batch::{self, BatchOptions};
use image_linker::checker::StatusChecker;
use image_linker::config::Config;
use image_linker::optimizer;
use image_linker::records::{RecordSet, RecordStatus, StatusFilter};
use image_linker::service::{ImageService, NoticeLevel};
use image_linker::LinkerError;

#[tokio::main]
async fn main() {
    // Logs go to stderr so they never mix with table / JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("image_linker=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    // These two work on local files and need no backend
    match &cli.command {
        Commands::Inspect { path } => return handle_inspect(path).await,
        Commands::Thumbnail { input, output } => return handle_thumbnail(input, output).await,
        _ => {}
    }

    let config = Config::from_env()?;
    let backend = Arc::new(SupabaseClient::new(&config.backend, config.schema.clone())?);
    let checker = StatusChecker::new(config.probe)?;

    match cli.command {
        Commands::Scan { status, page, json } => {
            handle_scan(&config, backend.as_ref(), &checker, status, page, json).await
        }
        Commands::Show { id } => handle_show(&config, backend.as_ref(), &checker, &RecordId::parse(&id)).await,
        Commands::Upload { id, source } => {
            let service = ImageService::new(
                backend.clone(),
                backend.clone(),
                &config.schema,
                config.upload.clone(),
            )?;
            handle_upload(&config, backend.as_ref(), &checker, &service, &RecordId::parse(&id), source).await
        }
        Commands::Optimize { dry_run, limit } => {
            let service = ImageService::new(
                backend.clone(),
                backend.clone(),
                &config.schema,
                config.upload.clone(),
            )?;
            handle_optimize(backend.as_ref(), &service, BatchOptions { dry_run, limit }).await
        }
        Commands::Inspect { .. } | Commands::Thumbnail { .. } => unreachable!("handled above"),
    }
}

// Handles the 'scan' subcommand
async fn handle_scan(
    config: &Config,
    store: &dyn RecordStore,
    checker: &StatusChecker,
    status: StatusFilter,
    page: Option<usize>,
    json: bool,
) -> Result<i32> {
    let plural = &config.display.entity_label_plural;
    if !json {
        println!("🔍 Loading {} from '{}'", plural.to_lowercase(), config.schema.table);
    }

    let set = RecordSet::load(store, checker).await?;
    let mut rows = set.display_rows(status);

    if let Some(page) = page {
        let size = config.display.page_size;
        let start = page.saturating_sub(1) * size;
        rows = rows.into_iter().skip(start).take(size).collect();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_table(&rows);
        let (ok, broken) = set.counts();
        println!("📊 Summary:");
        println!("   ✅ OK: {}", ok);
        println!("   ❌ Error: {}", broken);
        println!("   📋 Total {}: {}", plural.to_lowercase(), set.len());
    }

    let broken_shown = rows.iter().filter(|row| !row.ok).count();
    Ok(if broken_shown > 0 { 1 } else { 0 })
}

// Handles the 'show' subcommand, the equivalent of the editor panel
async fn handle_show(
    config: &Config,
    store: &dyn RecordStore,
    checker: &StatusChecker,
    id: &RecordId,
) -> Result<i32> {
    let set = RecordSet::load(store, checker).await?;
    let entry = set.get(id).ok_or_else(|| LinkerError::NotFound(id.to_string()))?;
    let schema = &config.schema;

    println!("{}", config.display.entity_label);
    println!("{}", "=".repeat(60));
    println!("{}: {}", column_label(&schema.id_column), entry.record.id);
    println!("{}: {}", column_label(&schema.title_column), entry.record.title);
    println!(
        "Current {}: {}",
        column_label(&schema.image_url_column),
        entry.record.image_url.as_deref().unwrap_or("None")
    );
    for (column, value) in &entry.record.extra {
        let shown = match value {
            serde_json::Value::Null => "None".to_string(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("{}: {}", column_label(column), shown);
    }
    println!("Status: {}", if entry.ok { "OK" } else { "Error/Missing" });

    Ok(0)
}

// Handles the 'upload' subcommand
async fn handle_upload(
    config: &Config,
    store: &dyn RecordStore,
    checker: &StatusChecker,
    service: &ImageService,
    id: &RecordId,
    source: UploadSource,
) -> Result<i32> {
    let label = &config.display.entity_label;

    // Only the title is needed, so skip probing every other image
    let mut set = RecordSet::from_parts(store.fetch_all().await?, Vec::new());
    let title = set
        .get(id)
        .map(|entry| entry.record.title.clone())
        .ok_or_else(|| LinkerError::NotFound(id.to_string()))?;

    println!("📤 Updating image for {} {} ({})", label.to_lowercase(), id, title);

    let outcome = match (source.file, source.url) {
        (Some(path), _) => {
            let filename = path.to_string_lossy().to_string();
            if !config.upload.accepts(&filename) {
                return Err(LinkerError::Rejected(format!(
                    "'{}' is not one of the accepted formats ({})",
                    filename,
                    config.upload.accepted_extensions.join(", ")
                ))
                .into());
            }
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("could not read {}", path.display()))?;
            service.upload_from_bytes(id, &title, bytes, &filename).await?
        }
        (None, Some(url)) => service.upload_from_url(id, &title, &url).await?,
        (None, None) => unreachable!("clap requires --file or --url"),
    };

    for notice in &outcome.notices {
        match notice.level {
            NoticeLevel::Info => println!("ℹ️  {}", notice.message),
            NoticeLevel::Warning => println!("⚠️  {}", notice.message),
        }
    }

    set.set_image_url(id, &outcome.signed_url)?;
    let ok = set.refresh_status(id, checker).await?;

    println!("✅ Image updated successfully!");
    println!("   Key: {}", outcome.storage_key);
    println!("   URL: {}", outcome.signed_url);
    println!("   Status: {}", if ok { "OK" } else { "Error/Missing" });

    Ok(0)
}

// Handles the 'optimize' subcommand
async fn handle_optimize(store: &dyn RecordStore, service: &ImageService, options: BatchOptions) -> Result<i32> {
    println!("{}", "=".repeat(60));
    println!("Image Batch Optimization");
    println!("{}", "=".repeat(60));
    if options.dry_run {
        println!("\n🔍 DRY RUN MODE - No changes will be made\n");
    }

    let summary = batch::optimize_existing(store, service, options).await?;
    summary.print(options.dry_run);

    Ok(if summary.failed > 0 { 1 } else { 0 })
}

// Handles the 'inspect' subcommand
async fn handle_inspect(path: &Path) -> Result<i32> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("could not read {}", path.display()))?;
    let info = optimizer::inspect(&bytes)?;

    println!("{}", path.display());
    println!("   Size: {}x{}", info.width, info.height);
    println!("   Format: {}", info.format);
    println!("   Mode: {}", info.mode);
    println!("   Bytes: {} ({:.1}KB)", info.size_bytes, info.size_bytes as f64 / 1024.0);
    Ok(0)
}

// Handles the 'thumbnail' subcommand
async fn handle_thumbnail(input: &Path, output: &Path) -> Result<i32> {
    // Credentials are irrelevant here, only the THUMBNAIL_* settings are read
    let bounds = Config::thumbnail_bounds_from_env()?;

    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("could not read {}", input.display()))?;
    let thumb = tokio::task::spawn_blocking(move || optimizer::thumbnail(&bytes, bounds)).await??;
    tokio::fs::write(output, &thumb)
        .await
        .with_context(|| format!("could not write {}", output.display()))?;

    println!("🖼️  Wrote {} ({:.1}KB)", output.display(), thumb.len() as f64 / 1024.0);
    Ok(0)
}

// Prints records as a human-readable table in the terminal
fn print_table(rows: &[&RecordStatus]) {
    println!("{:<10} {:<30} {:<50} {:<8}", "ID", "TITLE", "IMAGE URL", "STATUS");
    println!("{}", "=".repeat(101));

    for row in rows {
        let url = row.record.image_url.as_deref().unwrap_or("");
        println!(
            "{:<10} {:<30} {:<50} {:<8}",
            row.record.id.to_string(),
            clip(&row.record.title, 30),
            clip(url, 50),
            if row.ok { "✅ OK" } else { "❌ ERROR" }
        );
    }

    println!();
}

// Truncates a value so the table columns stay aligned
fn clip(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

// "image_url" -> "Image Url", short names like "id" -> "ID"
fn column_label(column: &str) -> String {
    if column.len() <= 3 {
        return column.to_uppercase();
    }
    column
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
