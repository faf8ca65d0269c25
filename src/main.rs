//! streamchat
//!
//! Entry point for the terminal chat client.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::fs::File;
use std::io::{self, IsTerminal};
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use streamchat::client::HttpTransport;
use streamchat::config::{AppConfig, Cli};
use streamchat::ui::{plain, terminal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before clap reads env fallbacks
    let _ = dotenv();

    let cli = Cli::parse();
    let interactive = cli.prompt.is_none()
        && !cli.plain
        && io::stdin().is_terminal()
        && io::stdout().is_terminal();
    init_tracing(&cli, interactive)?;

    let mut config = AppConfig::from_cli(&cli).context("Failed to load configuration")?;
    config.ui.color &= io::stdout().is_terminal();

    let transport = HttpTransport::from_config(&config).context("Failed to build HTTP client")?;
    let endpoint = transport.endpoint().clone();

    info!(
        name: "chat.config.loaded",
        endpoint = %endpoint,
        request_timeout_secs = ?config.http.request_timeout_secs,
        "Chat client configured"
    );

    if let Some(prompt) = &cli.prompt {
        plain::run_once(transport, &config.ui, prompt, io::stdout())
            .await
            .with_context(|| format!("Request to {endpoint} failed"))?;
        return Ok(());
    }

    if interactive {
        terminal::run(transport, &config.ui, &endpoint).await?;
    } else {
        let input = tokio::io::BufReader::new(tokio::io::stdin());
        let conversation = plain::run(transport, &config.ui, input, io::stdout()).await?;
        info!(
            name: "plain.session.closed",
            messages = conversation.len(),
            "Input exhausted"
        );
    }

    Ok(())
}

/// Initialize tracing (M-LOG-STRUCTURED).
///
/// Defaults to `warn`, or `off` when the raw-mode terminal owns stderr and no
/// log file was given. `RUST_LOG` overrides.
fn init_tracing(cli: &Cli, interactive: bool) -> anyhow::Result<()> {
    let default = if interactive && cli.log_file.is_none() {
        "off"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    match &cli.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let writer = Mutex::new(file);
            if cli.log_json {
                registry.with(fmt::layer().json().with_writer(writer)).init();
            } else {
                registry
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .init();
            }
        }
        None if cli.log_json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        None => registry
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init(),
    }
    Ok(())
}
