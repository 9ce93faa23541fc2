//! Bundle Tracker CLI
//!
//! Fingerprints a directory of sample files, uploads it to the processing
//! server only when the server has not seen it, and follows processing to
//! completion.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bundle_tracker::config::Config;
use bundle_tracker::hash::{select_engine, Sha1Digest};
use bundle_tracker::manifest::{scan_directory, ManifestBuilder};
use bundle_tracker::pipeline::{BundlePipeline, Submission};
use bundle_tracker::reconcile::{
    cancel_pair, describe, CancelHandle, SessionOutcome, TracingObserver,
};
use bundle_tracker::remote::{ArtifactCatalog, BundleRemover, HttpClient};

#[derive(Parser, Debug)]
#[command(name = "bundle-tracker")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the fingerprint of a directory without contacting the server
    Fingerprint {
        /// Directory to scan
        dir: PathBuf,

        /// Print the canonical manifest that was hashed
        #[arg(long)]
        manifest: bool,
    },

    /// Fingerprint, upload if needed, and follow processing
    Submit {
        /// Directory to scan
        dir: PathBuf,

        /// Return after the upload instead of polling
        #[arg(long)]
        no_wait: bool,
    },

    /// Follow processing of an already submitted bundle
    Watch {
        /// Bundle fingerprint (40 hex characters)
        fingerprint: Sha1Digest,

        /// Task id returned by the upload, if known
        #[arg(long)]
        task_id: Option<String>,
    },

    /// List images generated for a bundle
    Images {
        fingerprint: Sha1Digest,
    },

    /// Remove a stored bundle from the server
    Remove {
        fingerprint: Sha1Digest,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "bundle_tracker=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let cli = Cli::parse();

    match cli.command {
        Commands::Fingerprint { dir, manifest } => fingerprint(&config, dir, manifest).await,
        Commands::Submit { dir, no_wait } => submit(&config, dir, no_wait).await,
        Commands::Watch {
            fingerprint,
            task_id,
        } => watch(&config, fingerprint, task_id).await,
        Commands::Images { fingerprint } => images(&config, fingerprint).await,
        Commands::Remove { fingerprint } => {
            let client = HttpClient::new(&config.server)?;
            client.remove(&fingerprint).await?;
            println!("Removed {}", fingerprint);
            Ok(())
        }
    }
}

async fn fingerprint(config: &Config, dir: PathBuf, show_manifest: bool) -> Result<()> {
    let engine = select_engine(config.hashing.engine)?;
    let sources = scan_directory(&dir, &config.selection.allow_list())?;
    let prepared = ManifestBuilder::new(engine)
        .build(sources)
        .await
        .with_context(|| format!("Failed to fingerprint {}", dir.display()))?;

    if show_manifest {
        print!("{}", prepared.bundle.canonical_manifest());
    }
    println!(
        "{}  ({} files, {} bytes)",
        prepared.bundle.fingerprint,
        prepared.bundle.item_count(),
        prepared.bundle.total_bytes()
    );
    Ok(())
}

async fn submit(config: &Config, dir: PathBuf, no_wait: bool) -> Result<()> {
    let pipeline = BundlePipeline::from_config(config, Arc::new(TracingObserver))?;

    let sources = scan_directory(&dir, &config.selection.allow_list())?;
    let prepared = pipeline
        .prepare(sources)
        .await
        .with_context(|| format!("Failed to fingerprint {}", dir.display()))?;
    println!("Bundle {}", prepared.fingerprint());

    let (mut session, submission) = pipeline.submit(&prepared).await?;
    match &submission {
        Submission::AlreadyStored => println!("Already stored on server, no upload needed"),
        Submission::Uploaded { task_id: Some(id) } => println!("Uploaded, task {}", id),
        Submission::Uploaded { task_id: None } => println!("Uploaded"),
    }

    if no_wait {
        return Ok(());
    }

    let (cancel, token) = cancel_pair();
    cancel_on_ctrl_c(cancel);

    let outcome = pipeline.track(&mut session, token).await;
    report(config, outcome)
}

async fn watch(config: &Config, fingerprint: Sha1Digest, task_id: Option<String>) -> Result<()> {
    let pipeline = BundlePipeline::from_config(config, Arc::new(TracingObserver))?;
    let reconciler = pipeline.reconciler();

    let mut session = reconciler.open_session(fingerprint);
    if let Some(task_id) = task_id {
        session.attach_task(task_id);
    }

    let (cancel, token) = cancel_pair();
    cancel_on_ctrl_c(cancel);

    let outcome = reconciler.run(&mut session, token).await;
    report(config, outcome)
}

async fn images(config: &Config, fingerprint: Sha1Digest) -> Result<()> {
    let client = HttpClient::new(&config.server)?;
    let listing = client.list_images(&fingerprint).await?;

    println!("{} image(s) for {}", listing.image_count, listing.fingerprint);
    for image in listing.images {
        match image.url {
            Some(url) => println!("  {}  {}", image.filename, url),
            None => println!("  {}", image.filename),
        }
    }
    Ok(())
}

fn report(config: &Config, outcome: SessionOutcome) -> Result<()> {
    println!(
        "{} after {} poll(s) in {}s",
        describe(&outcome.state),
        outcome.polls,
        outcome.elapsed.as_secs()
    );

    if outcome.is_complete() {
        println!("Outputs available from {}", config.server.base_url);
    }

    outcome.into_result()?;
    Ok(())
}

/// Cancel polling on Ctrl+C
fn cancel_on_ctrl_c(cancel: CancelHandle) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, stopping status polling...");
            cancel.cancel();
        }
    });
}
