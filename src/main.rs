mod classifier;
mod config;
mod emotion;
mod frames;
mod server;
mod smoother;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use classifier::GeminiClassifier;
use config::Config;
use server::AppState;
use smoother::EmotionSmoother;

/// Webcam emotion classification service with temporal smoothing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Smoothing window size (number of recent frames)
    #[arg(short, long)]
    window_size: Option<usize>,

    /// Gemini model used for classification
    #[arg(long)]
    model: Option<String>,

    /// Directory for transient frame files
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    // Write a default config on first run so it can be edited in place.
    if let Ok(path) = Config::config_path() {
        if !path.exists() {
            if let Err(e) = Config::default().save() {
                debug!("Failed to write default config: {}", e);
            }
        }
    }

    // CLI flags override the saved config.
    let mut config = Config::load_or_default();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(window_size) = args.window_size {
        anyhow::ensure!(window_size >= 1, "window size must be at least 1");
        config.window_size = window_size;
    }
    if let Some(model) = args.model {
        config.gemini_model = model;
    }
    if let Some(temp_dir) = args.temp_dir {
        config.temp_dir = temp_dir;
    }

    let api_key = std::env::var("GOOGLE_API_KEY")
        .context("GOOGLE_API_KEY is not set; the Gemini classifier needs an API key")?;
    let classifier = GeminiClassifier::new(&api_key, Some(config.gemini_model.as_str()))?;

    info!("Emotion mirror starting...");
    info!("Model: {}", config.gemini_model);
    info!("Window size: {}", config.window_size);
    info!("Temp dir: {:?}", config.temp_dir);

    // One smoother for the process lifetime, seeded with a neutral entry.
    let state = AppState {
        smoother: Arc::new(Mutex::new(EmotionSmoother::seeded(config.window_size))),
        classifier: Arc::new(classifier),
        temp_dir: config.temp_dir.clone(),
    };

    // Background sweep for frames abandoned by interrupted requests.
    tokio::spawn(frames::run_cleanup_task(
        config.temp_dir.clone(),
        Duration::from_secs(config.frame_max_age_secs),
    ));

    server::run_server(state, config.port).await;
    Ok(())
}
