//! LendScore CLI - Command line interface for the lendscore prediction service

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warp::Filter;

use lendscore_cli::api;
use lendscore_cli::config::{Config, LoggingConfig, Overrides};
use lendscore_core::{ModelSlot, PredictionService};

#[derive(Parser)]
#[command(name = "lendscore")]
#[command(author = "LendScore Contributors")]
#[command(version)]
#[command(about = "LendScore - Mortgage default prediction service", long_about = None)]
struct Cli {
    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, global = true, env = "LENDSCORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP prediction server
    Serve {
        /// Server port
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Bind address
        #[arg(long, env = "LENDSCORE_BIND")]
        bind: Option<String>,

        /// Path to the model artifact
        #[arg(short, long, env = "MODEL_PATH")]
        model: Option<PathBuf>,

        /// Path to the preprocessing metadata
        #[arg(long, env = "INFO_PATH")]
        metadata: Option<PathBuf>,

        /// Maximum number of requests per batch
        #[arg(long, env = "MAX_BATCH_SIZE")]
        max_batch_size: Option<usize>,
    },

    /// Load the model artifacts and print what was loaded
    Check {
        /// Path to the model artifact
        #[arg(short, long, env = "MODEL_PATH")]
        model: Option<PathBuf>,

        /// Path to the preprocessing metadata
        #[arg(long, env = "INFO_PATH")]
        metadata: Option<PathBuf>,
    },

    /// Generate example configuration file
    ConfigGen {
        /// Output format (yaml, toml)
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            bind,
            model,
            metadata,
            max_batch_size,
        } => {
            let mut config = Config::resolve(cli.config.as_deref())?;
            config.apply(Overrides {
                port,
                bind,
                model_path: model,
                metadata_path: metadata,
                max_batch_size,
            });
            config.validate()?;
            init_logging(&config.logging)?;
            run_server(config).await?;
        }

        Commands::Check { model, metadata } => {
            let mut config = Config::resolve(cli.config.as_deref())?;
            config.apply(Overrides {
                model_path: model,
                metadata_path: metadata,
                ..Default::default()
            });
            init_logging(&config.logging)?;
            run_check(&config)?;
        }

        Commands::ConfigGen { format, output } => {
            let content = match format.to_lowercase().as_str() {
                "yaml" | "yml" => Config::example_yaml(),
                "toml" => Config::example_toml(),
                _ => anyhow::bail!("Unsupported format: {}. Use 'yaml' or 'toml'", format),
            };

            if let Some(path) = output {
                std::fs::write(&path, &content)?;
                println!("Configuration written to: {}", path.display());
            } else {
                println!("{}", content);
            }
        }
    }

    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the config.
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", logging.level, e))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

// =============================================================================
// Server Mode
// =============================================================================

async fn run_server(config: Config) -> Result<()> {
    let bind_addr = config.bind_addr()?;
    let port = config.server.port;

    println!("LendScore Server");
    println!("==================");
    println!("REST API:  http://{}:{}/", config.server.bind, port);
    println!("Model:     {}", config.model.path.display());
    if let Some(ref path) = config.model.metadata_path {
        println!("Metadata:  {}", path.display());
    }
    println!("Max batch: {}", config.model.max_batch_size);
    println!();

    // Load before binding; a failed load still serves health as degraded.
    let slot = Arc::new(ModelSlot::new());
    let loader = config.model.loader();
    let load_slot = slot.clone();
    let outcome = tokio::task::spawn_blocking(move || load_slot.initialize(&loader)).await?;
    if let Err(e) = outcome {
        warn!("Starting without a model, predictions will return 503: {}", e);
    }

    let service = Arc::new(PredictionService::new(slot, config.model.max_batch_size));
    let routes = api::api_routes(service)
        .recover(api::handle_rejection)
        .with(warp::trace::request());

    let (addr, server) =
        warp::serve(routes).try_bind_with_graceful_shutdown((bind_addr, port), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })?;

    info!("Server listening on {}", addr);
    server.await;
    info!("Server stopped");

    Ok(())
}

// =============================================================================
// Check Mode
// =============================================================================

fn run_check(config: &Config) -> Result<()> {
    let loader = config.model.loader();
    let slot = Arc::new(ModelSlot::new());
    slot.initialize(&loader)
        .map_err(|e| anyhow::anyhow!("Model check failed: {}", e))?;

    let service = PredictionService::new(slot, config.model.max_batch_size);
    let info = service.model_info()?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    println!("Model OK ({} features)", info.feature_count);
    Ok(())
}
