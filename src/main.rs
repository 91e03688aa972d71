//! bedquote - Custom mattress configurator backend
//!
//! Serves the pricing engine (option selections to an itemized quote) and
//! cover texture extraction (perspective cropping of photographed faces)
//! to the configurator UI over a JSON API.

mod catalog;
mod config;
mod error;
mod faces;
mod price_book;
mod pricing;
mod server;
mod sheet;
mod transform;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// bedquote - mattress configurator pricing and texture service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Web server host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Web server port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("bedquote v{}", env!("CARGO_PKG_VERSION"));

    // Load or create configuration
    let config = config::Config::load_or_create(&args.config)?;

    // CLI args override the file
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    let book_path = config.price_book_path(&args.config);
    let book = price_book::load_or_create(&book_path)?;

    info!(
        "Catalog: {} sizes, {} options, guard foam {}mm",
        config.catalog.sizes.len(),
        config.catalog.options.len(),
        config.catalog.guard_foam_thickness
    );
    info!(
        "Texture output: {}x{} (max {})",
        config.texture.output_width,
        config.texture.output_height,
        config.texture.max_output_dimension
    );

    let state = Arc::new(server::AppState::new(
        config.catalog,
        config.texture,
        book,
        book_path,
    ));

    let addr = format!("{}:{}", host, port);
    info!("Starting web server at http://{}", addr);

    tokio::select! {
        result = server::run_server(&addr, state) => {
            if let Err(e) = &result {
                tracing::error!("Server error: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    Ok(())
}
