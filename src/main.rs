use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dump_carver::analysis::analyze_files;
use dump_carver::cli::{Cli, Command};
use dump_carver::logging;
use dump_carver::output::OutputDir;
use dump_carver::recovery::{self, extract_media, extract_media_from_dir};
use dump_carver::scanner::scan_and_extract;
use dump_carver::{CancelToken, CarveConfig, Outcome, ScanProgress};

const PROGRESS_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = cli
        .engine
        .to_config()
        .map_err(|e| anyhow!("Invalid arguments: {e}"))?;

    match cli.command {
        Command::Scan { dump, output } => scan(dump, output, config).await,
        Command::Recover { source, output } => recover(source, output, config).await,
        Command::Analyze { files } => {
            let reports = analyze_files(&files, config.entropy_threshold);
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        }
        Command::Media { input, output } => media(input, output).await,
    }
}

async fn scan(dump: PathBuf, output: PathBuf, config: CarveConfig) -> Result<()> {
    println!("Dump:               {}", dump.display());
    println!("Output directory:   {}", output.display());
    println!("Workers:            {}", config.effective_workers());
    println!();

    let cancel = cancel_on_ctrl_c();
    let (progress, drain) = progress_channel();

    let outcome = tokio::task::spawn_blocking(move || {
        let output = OutputDir::create(&output)?;
        scan_and_extract(&dump, &config, &output, Some(cancel), Some(progress))
    })
    .await
    .context("scan task failed")??;
    let _ = drain.await;

    let run = match outcome {
        Outcome::Completed(run) => run,
        Outcome::Abandoned => bail!("interrupted, completed fragment files were kept"),
    };

    println!("Signatures found:   {}", run.scan.signature_count());
    println!("Megablocks scanned: {}", run.scan.blocks_scanned);
    println!("Fragments written:  {}", run.report.fragments.len());
    for fragment in &run.report.fragments {
        println!(
            "  {}  {} offsets  {} bytes  sha256 {}",
            fragment.path.display(),
            fragment.offsets,
            fragment.bytes_written,
            fragment.sha256
        );
    }

    if run.report.is_partial() {
        println!("Worker failures:    {}", run.report.failures.len());
        for failure in &run.report.failures {
            println!(
                "  part {} ({} offsets): {}",
                failure.part, failure.offsets, failure.error
            );
        }
        bail!(
            "partial success: {} of {} offsets written",
            run.report.total_offsets(),
            run.scan.signature_count()
        );
    }

    Ok(())
}

async fn recover(source: PathBuf, output: PathBuf, config: CarveConfig) -> Result<()> {
    println!("Source:             {}", source.display());
    println!("Output directory:   {}", output.display());
    println!("Recovery cap:       {}", config.recovery_cap);
    println!();

    let cancel = cancel_on_ctrl_c();
    let (progress, drain) = progress_channel();

    let outcome = tokio::task::spawn_blocking(move || {
        let output = OutputDir::create(&output)?;
        recovery::recover_documents(&source, &config, &output, Some(cancel), Some(progress))
    })
    .await
    .context("recovery task failed")??;
    let _ = drain.await;

    let summary = match outcome {
        Outcome::Completed(summary) => summary,
        Outcome::Abandoned => bail!("interrupted, recovered documents were kept"),
    };

    println!("Documents recovered: {}", summary.documents.len());
    for document in &summary.documents {
        println!(
            "  #{:<3} {}  at {}  {} bytes  sha256 {}",
            document.index,
            document.path.display(),
            document.offset,
            document.length,
            document.sha256
        );
    }
    println!("Candidates rejected: {}", summary.rejections.len());
    println!("Stopped:             {:?}", summary.stop);

    Ok(())
}

async fn media(input: PathBuf, output: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let output = OutputDir::create(&output)?;
        if input.is_dir() {
            let summary = extract_media_from_dir(&input, &output)?;
            println!(
                "Extracted {} images from {} documents into {} ({} skipped)",
                summary.images.len(),
                summary.documents_processed,
                output.path().display(),
                summary.documents_skipped
            );
        } else {
            let images = extract_media(&input, &output)
                .with_context(|| format!("failed to extract media from {}", input.display()))?;
            println!("Extracted {} images into {}", images.len(), output.path().display());
        }
        Ok(())
    })
    .await
    .context("media task failed")?
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancelToken {
    let token = CancelToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current unit of work");
            signal_token.cancel();
        }
    });
    token
}

/// Progress sender for the engine and a task logging what it receives
fn progress_channel() -> (mpsc::Sender<ScanProgress>, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let drain = tokio::spawn(async move {
        let mut bytes_scanned = 0u64;
        while let Some(update) = rx.recv().await {
            match update {
                ScanProgress::BytesScanned(read) => bytes_scanned += read,
                ScanProgress::SignatureFound(offset) => debug!(%offset, "signature"),
                ScanProgress::FragmentWritten { part, offsets } => {
                    info!(part, offsets, "fragment written")
                }
                ScanProgress::WorkerFailed { part, error } => warn!(part, %error, "worker failed"),
                ScanProgress::DocumentRecovered { index, offset } => {
                    debug!(index, %offset, "document recovered")
                }
                ScanProgress::CandidateRejected { offset, reason } => {
                    debug!(%offset, %reason, "candidate rejected")
                }
            }
        }
        debug!(bytes_scanned, "progress stream closed");
    });
    (tx, drain)
}
