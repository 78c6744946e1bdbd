//! Administrative CLI for the gallery.

mod api_client;

use anyhow::{Context, Result};
use api_client::{ApiClient, CheckReport, DeleteAllReport, FixReport, ReuploadReport};
use clap::{Parser, Subcommand};
use gallery_core::media::mime_for_path;
use gallery_core::token::hash_token;
use std::io::Read;
use std::path::{Path, PathBuf};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Parser)]
#[command(name = "galleryctl")]
#[command(about = "Administrative CLI for the image gallery")]
#[command(version)]
struct Cli {
    /// Server API URL
    #[arg(long, global = true, env = "GALLERY_SERVER", default_value = DEFAULT_SERVER)]
    server: String,

    /// Bearer token
    #[arg(long, global = true, env = "GALLERY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report records whose image is missing from blob storage
    Check,
    /// Repair record urls and filenames containing "-undefined-"
    Fix,
    /// Re-store missing images by fetching their recorded url
    Reupload,
    /// Delete every image record (blobs are kept)
    DeleteAll {
        /// Confirm the deletion
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Upload an image file
    Upload {
        /// Image file to upload
        file: PathBuf,
        /// MIME type (guessed from the extension when omitted)
        #[arg(long)]
        mime_type: Option<String>,
    },
    /// List image records, newest first
    List {
        #[arg(long)]
        skip: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the identity behind the token
    Whoami,
    /// Check server health and version
    Health,
    /// Print the SHA-256 hash of a token read from stdin, for server config
    HashToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let Cli {
        server,
        token,
        command,
    } = Cli::parse();

    let client = ApiClient::new(&server, token.as_deref())?;
    match command {
        Commands::Check => print_check(&client.check_images().await?),
        Commands::Fix => print_fix(&client.fix_images().await?),
        Commands::Reupload => print_reupload(&client.reupload_images().await?),
        Commands::DeleteAll { yes } => {
            if !yes {
                anyhow::bail!("refusing to delete every image record without --yes");
            }
            print_delete_all(&client.delete_all_images().await?);
        }
        Commands::Upload { file, mime_type } => {
            handle_upload(&client, &file, mime_type).await?;
        }
        Commands::List { skip, limit } => {
            let page = client.list_images(skip, limit).await?;
            for image in &page.images {
                println!(
                    "{}  {}  {}  {}",
                    image.id, image.uploaded_at, image.uploaded_by, image.url
                );
            }
            println!(
                "Showing {} of {} (skip {}, limit {}){}",
                page.images.len(),
                page.total,
                page.pagination.skip,
                page.pagination.limit,
                if page.pagination.has_more { ", more available" } else { "" }
            );
        }
        Commands::Whoami => {
            let me = client.auth_check().await?;
            println!("Identity: {}", me.identity);
            println!("Role: {}", me.role);
        }
        Commands::Health => {
            let health = client.health().await?;
            println!("Status: {}", health.status);
            println!("Server version: {}", health.version);
            println!("Client version: {}", env!("CARGO_PKG_VERSION"));
            if health.version != env!("CARGO_PKG_VERSION") {
                eprintln!(
                    "Warning: version mismatch (server: {}, client: {})",
                    health.version,
                    env!("CARGO_PKG_VERSION")
                );
            }
        }
        Commands::HashToken => handle_hash_token()?,
    }
    Ok(())
}

fn handle_hash_token() -> Result<()> {
    let mut secret = String::new();
    std::io::stdin()
        .read_to_string(&mut secret)
        .context("failed to read token from stdin")?;
    let secret = secret.trim();
    if secret.is_empty() {
        anyhow::bail!("no token provided on stdin");
    }
    println!("{}", hash_token(secret));
    Ok(())
}

async fn handle_upload(client: &ApiClient, file: &Path, mime_type: Option<String>) -> Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let mime_type = resolve_mime(file, mime_type);

    let record = client.upload_image(filename, &mime_type, data).await?;
    println!("Uploaded {} ({} bytes)", record.filename, record.size);
    println!("  id:  {}", record.id);
    println!("  url: {}", record.url);
    Ok(())
}

fn resolve_mime(file: &Path, explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| mime_for_path(&file.to_string_lossy()).to_string())
}

fn print_check(report: &CheckReport) {
    println!(
        "Checked {}: {} found, {} missing",
        report.total, report.found, report.missing
    );
    for missing in &report.missing_images {
        println!("  missing {}  {}", missing.id, missing.url);
    }
}

fn print_fix(report: &FixReport) {
    println!(
        "Checked {}: {} fixed, {} skipped",
        report.total, report.fixed, report.skipped
    );
}

fn print_reupload(report: &ReuploadReport) {
    println!(
        "Checked {}: {} re-uploaded, {} skipped, {} failed",
        report.total, report.reuploaded, report.skipped, report.failed
    );
    for result in report.results.iter().filter(|r| r.status != "skipped") {
        match (&result.new_url, &result.reason) {
            (Some(new_url), _) => println!("  {} {}  -> {}", result.status, result.id, new_url),
            (None, Some(reason)) => println!("  {} {}  ({})", result.status, result.id, reason),
            (None, None) => println!("  {} {}", result.status, result.id),
        }
        if let Some(old_url) = &result.old_url {
            println!("      was {old_url}");
        }
    }
}

fn print_delete_all(report: &DeleteAllReport) {
    println!(
        "Deleted {} of {} records ({} failed)",
        report.deleted, report.total, report.failed
    );
    for result in report.results.iter().filter(|r| r.status != "deleted") {
        println!(
            "  {} {}  {}{}",
            result.status,
            result.id,
            result.reason.as_deref().unwrap_or_default(),
            result
                .url
                .as_deref()
                .map(|u| format!(" ({u})"))
                .unwrap_or_default()
        );
    }
}
