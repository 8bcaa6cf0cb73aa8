//! CLI entry point for download-unpack.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use download_unpack::{Artifact, DownloadRequest};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so a raw body on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let options = args
        .download_options()
        .context("invalid --options document")?;

    let mut request = DownloadRequest::new(args.url.clone()).options(options);
    if let Some(dir) = &args.output {
        request = request.output_dir(dir.clone());
    }
    let to_disk = request.output_dir.is_some();

    info!(url = %args.url, "downloading");
    let artifact = request
        .start()
        .await
        .with_context(|| format!("download of {} failed", args.url))?;

    let mut stdout = io::stdout().lock();
    match artifact {
        Artifact::Bytes(body) if !to_disk => {
            stdout.write_all(&body).context("failed to write body to stdout")?;
        }
        Artifact::Bytes(body) => {
            info!(bytes = body.len(), "download complete");
        }
        Artifact::Extracted(entries) => {
            for entry in &entries {
                writeln!(stdout, "{}", entry.path.display())?;
            }
            info!(entries = entries.len(), "extraction complete");
        }
    }
    stdout.flush()?;

    Ok(())
}
