//! Tradovate Bridge - Main Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use tradovate_bridge::broker::BrokerClient;
use tradovate_bridge::config::Config;
use tradovate_bridge::server::{self, AppState};

/// Tradovate Bridge CLI
#[derive(Parser)]
#[command(name = "tradovate-bridge")]
#[command(version, about = "Route webhook trade signals to Tradovate")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server (default)
    Serve {
        /// Listen address, overrides server.bind
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Resolve a symbol (e.g. MES or MESZ5) to its Tradovate contract id
    Resolve {
        /// Root or explicit contract symbol
        symbol: String,
    },

    /// Print open positions on the trading account
    Positions,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate()?;

    match cli.command {
        Some(Commands::Resolve { symbol }) => {
            let client = BrokerClient::new(&config.tradovate)?;
            let contract_id = client
                .resolve_contract_id(&symbol)
                .await
                .with_context(|| format!("Failed to resolve {}", symbol))?;
            println!("{} -> {}", symbol.trim().to_uppercase(), contract_id);
            Ok(())
        }
        Some(Commands::Positions) => {
            let client = BrokerClient::new(&config.tradovate)?;
            let positions = client
                .positions()
                .await
                .context("Failed to fetch positions")?;
            println!("{}", serde_json::to_string_pretty(&positions)?);
            Ok(())
        }
        Some(Commands::Serve { bind }) => serve(config, bind).await,
        None => serve(config, None).await,
    }
}

async fn serve(config: Config, bind: Option<String>) -> Result<()> {
    info!(
        "Tradovate Bridge v{} starting",
        env!("CARGO_PKG_VERSION")
    );
    log_config(&config);

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let state = AppState::new(&config)?;
    server::start_server(state, &bind).await
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "tradovate-bridge.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tradovate_bridge=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup. Secrets are never printed.
fn log_config(config: &Config) {
    info!("Configuration:");
    info!("   Tradovate Host: {}", config.tradovate.host);
    info!(
        "   Credentials: {}",
        if config.has_credentials() { "configured" } else { "MISSING" }
    );
    match config.tradovate.account_id {
        Some(id) => info!("   Account: {}", id),
        None => info!("   Account: first listed"),
    }
    info!(
        "   Webhook Secret: {}",
        if config.server.webhook_secret.as_deref().is_some_and(|s| !s.is_empty()) {
            "enabled"
        } else {
            "disabled"
        }
    );

    let mut caps: Vec<_> = config.risk.max_qty.iter().collect();
    caps.sort();
    for (root, max) in caps {
        info!("   Max Qty {}: {}", root.to_uppercase(), max);
    }
    info!("   Account Size: ${}", config.risk.account_size);
    info!("   Max Drawdown: ${} (informational)", config.risk.max_drawdown);

    if !config.has_credentials() {
        warn!("No Tradovate credentials configured; order routing will fail");
    }
    if let Some(notional) = config.risk.max_notional_usd {
        warn!(
            "Notional cap ${} is not enforced: no pricing source is configured",
            notional
        );
    }
}
