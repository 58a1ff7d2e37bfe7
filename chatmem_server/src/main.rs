//! # chatmem Viewer
//!
//! Serves processed conversation datasets for browsing.
//!
//! # Configuration
//!
//! Set `CHATMEM_CONFIG` env var to a TOML config file path, or use defaults.
//! The viewer binds to `viewer.host:viewer.port` (default `127.0.0.1:5000`).
//!
//! # CLI Usage
//!
//! ```bash
//! # Serve the newest dataset under data/
//! chatmem_viewer
//!
//! # Serve a specific file
//! chatmem_viewer --file data/prod/convs_with_memories_0101_gpt4omini.json
//!
//! # Generate example config file with inline documentation
//! chatmem_viewer --init-config
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use chatmem_config::ChatmemConfig;
use chatmem_server::datasets::{latest_dataset, read_dataset};
use chatmem_server::router::viewer_router;
use chatmem_server::state::{Dataset, ViewerState};
use chatmem_server::telemetry;

/// chatmem dataset viewer.
#[derive(Parser, Debug)]
#[command(name = "chatmem_viewer")]
#[command(about = "Browse processed conversations with their summaries and memories")]
#[command(version)]
struct Cli {
    /// Path to chatmem.toml config file.
    /// Can also be set via CHATMEM_CONFIG env var.
    #[arg(short, long, env = "CHATMEM_CONFIG")]
    config: Option<String>,

    /// Processed dataset to serve at startup.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Bind address (overrides viewer.host).
    #[arg(long)]
    host: Option<String>,

    /// Port (overrides viewer.port).
    #[arg(short, long)]
    port: Option<u16>,

    /// Generate an example chatmem.toml config file with documentation and exit.
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.init_config {
        print!("{}", ChatmemConfig::example_toml_commented());
        return Ok(());
    }

    let config = ChatmemConfig::load(cli.config.as_deref())?;
    telemetry::init_logging(telemetry::LoggingInit::from_config(&config.logging, false))?;

    let data_dir = PathBuf::from(&config.storage.data_dir);
    let dataset = initial_dataset(cli.file.as_deref(), &config, &data_dir);
    tracing::info!(
        file = dataset.source_display().as_str(),
        conversations = dataset.len(),
        "Initial dataset"
    );

    let state = Arc::new(ViewerState::new(dataset, &data_dir));
    let app = viewer_router(state);

    // Bind and serve.
    let host = cli.host.unwrap_or(config.viewer.host);
    let port = cli.port.unwrap_or(config.viewer.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Startup file: `--file`, then `viewer.data_file`, then the newest dataset
/// under the data directory. A file that cannot be read leaves the viewer
/// empty rather than failing startup.
fn initial_dataset(cli_file: Option<&Path>, config: &ChatmemConfig, data_dir: &Path) -> Dataset {
    let chosen = cli_file
        .map(Path::to_path_buf)
        .or_else(|| config.viewer.data_file.as_ref().map(PathBuf::from))
        .or_else(|| latest_dataset(data_dir));

    let Some(path) = chosen else {
        tracing::warn!(
            "No dataset found under {}; starting empty",
            data_dir.display()
        );
        return Dataset::default();
    };

    match read_dataset(&path) {
        Ok(stored) => Dataset::from_stored(stored, path),
        Err(e) => {
            tracing::warn!("Could not load {}: {:#}", path.display(), e);
            Dataset::default()
        }
    }
}
