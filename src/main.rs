use std::time::Instant;

use clap::Parser;
use color_eyre::eyre::{Result, bail};
use image::ImageFormat;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use glint::domain::entities::{ImageRequest, RequestBuilder, Size};
use glint::infrastructure::{CliArgs, ImageLoader, LoaderConfig, StorageManager};

fn init_logging(config: &LoaderConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn build_request(args: &CliArgs, url: &str, viewport: Size) -> ImageRequest {
    let mut builder = RequestBuilder::new(url);
    if let Some(width) = args.width {
        builder = builder.width(width);
    }
    if let Some(height) = args.height {
        builder = builder.height(height);
    }
    if args.circle_crop {
        builder = builder.circle_crop();
    }
    if let Some(radius) = args.rounded_corners {
        builder = builder.rounded_corner_crop(radius);
    }
    builder.build(viewport)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling load");
            trigger.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(&args);

    init_logging(&config)?;

    info!(version = glint::VERSION, "Starting glint");

    let loader = ImageLoader::from_config(&config).await?;

    if args.clear_cache {
        loader.clear_all().await;
    }

    let Some(url) = args.url.as_deref() else {
        return Ok(());
    };

    let request = build_request(&args, url, config.viewport());
    let cancel = cancel_on_ctrl_c();
    let started = Instant::now();

    let Some(loaded) = loader.load_cancellable(&request, &cancel).await? else {
        bail!("Failed to load image from {url}");
    };
    let elapsed = started.elapsed();

    info!(
        key = %loaded.key,
        source = %loaded.source,
        elapsed_ms = elapsed.as_millis(),
        "Image ready"
    );
    debug!(stats = %loader.memory_cache_stats(), "Memory cache");
    debug!(stats = %loader.repository().disk().stats().await, "Disk cache");

    let (width, height) = (loaded.image.width(), loaded.image.height());
    let output = args.output.clone();
    let image = loaded.image;
    tokio::task::spawn_blocking(move || image.save_with_format(&output, ImageFormat::Png))
        .await??;

    println!(
        "{width}x{height} from {} in {elapsed:.2?} -> {}",
        loaded.source,
        args.output.display()
    );

    Ok(())
}
