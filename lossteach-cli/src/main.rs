// Lossteach command line client
// Health checks, predictions, size tables and mask overlays

mod client;
mod overlay;
mod report;
mod retry;

use anyhow::Context;
use clap::{Parser, Subcommand};
use client::{ApiClient, PredictRequest};
use lossteach_core::LegacyPredictionResponse;
use retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "lossteach")]
#[command(about = "Rock fragment size analysis client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the analysis service
    #[arg(long, env = "LOSSTEACH_URL", default_value = "http://localhost:8000", global = true)]
    url: String,

    /// Attempts per request before giving up
    #[arg(long, default_value_t = retry::DEFAULT_MAX_ATTEMPTS, global = true)]
    retries: u32,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service and its model are up
    Health,

    /// Analyze an image
    Predict {
        /// Image to upload
        image: PathBuf,

        /// Minimum detection score, exclusive
        #[arg(long)]
        threshold: Option<f32>,

        /// Do not request masks
        #[arg(long)]
        no_mask: bool,

        /// Do not request shape metrics
        #[arg(long)]
        no_metrics: bool,

        /// Write a mask overlay PNG
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,

        /// With --json, use the older `size_mectrics` list shape
        #[arg(long, requires = "json")]
        legacy: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    }

    let client = ApiClient::new(
        &cli.url,
        RetryPolicy {
            max_attempts: cli.retries,
            ..RetryPolicy::default()
        },
    );

    match cli.command {
        Commands::Health => check_health(&client, &cli.url).await,
        Commands::Predict {
            image,
            threshold,
            no_mask,
            no_metrics,
            overlay,
            json,
            legacy,
        } => {
            let request = PredictRequest {
                score_threshold: threshold,
                // overlays need masks whatever the flag says
                include_mask: !no_mask || overlay.is_some(),
                include_metrics: !no_metrics,
            };
            predict(&client, image, request, overlay, json, legacy).await
        }
    }
}

async fn check_health(client: &ApiClient, url: &str) -> anyhow::Result<()> {
    match client.health().await {
        Ok(health) => {
            println!("✅ Service is healthy");
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(())
        }
        Err(e) => {
            println!("❌ Service at {} is not available: {:#}", url, e);
            Err(e)
        }
    }
}

async fn predict(
    client: &ApiClient,
    image_path: PathBuf,
    request: PredictRequest,
    overlay_path: Option<PathBuf>,
    json: bool,
    legacy: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let prediction = client.predict(&image_path, &request).await?;
    let elapsed = started.elapsed();

    if json {
        let text = if legacy {
            serde_json::to_string_pretty(&LegacyPredictionResponse::from(prediction.clone()))?
        } else {
            serde_json::to_string_pretty(&prediction)?
        };
        println!("{}", text);
    } else {
        print!("{}", report::render(&prediction, elapsed.as_secs_f64()));
    }

    if let Some(path) = overlay_path {
        let base = image::open(&image_path)
            .with_context(|| format!("Failed to open {}", image_path.display()))?
            .to_rgb8();
        let rendered = overlay::render_overlay(&base, &prediction.fragments);
        rendered
            .save(&path)
            .with_context(|| format!("Failed to write overlay {}", path.display()))?;
        info!("Overlay written to {}", path.display());
        if !json {
            println!("\n🖼️  Overlay written to {}", path.display());
        }
    }
    Ok(())
}
