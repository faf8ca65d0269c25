//! Command-line and layered configuration.
//!
//! Precedence, lowest to highest: built-in defaults, config file
//! (`--config` or `./streamchat.{yaml,toml,json}`), `STREAMCHAT__`-prefixed
//! environment variables, explicit CLI flags (which clap also reads from
//! their `STREAMCHAT_*` env names).

use std::path::PathBuf;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Default chat server base URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
/// Default streaming endpoint path.
pub const DEFAULT_STREAM_PATH: &str = "/chat/stream";

#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "STREAMCHAT_CONFIG")]
    pub config: Option<String>,

    /// Base URL of the chat server
    #[arg(long, env = "STREAMCHAT_SERVER_URL")]
    pub server_url: Option<String>,

    /// Path of the streaming endpoint
    #[arg(long, env = "STREAMCHAT_STREAM_PATH")]
    pub stream_path: Option<String>,

    /// Whole-request timeout in seconds
    #[arg(long, env = "STREAMCHAT_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Read one message per stdin line instead of the interactive terminal
    #[arg(long, env = "STREAMCHAT_PLAIN")]
    pub plain: bool,

    /// Send a single message, print the reply and exit
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "STREAMCHAT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "STREAMCHAT_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub base_url: String,
    pub stream_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Unset means the request may stream for as long as the server keeps it open.
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    pub user_label: String,
    pub assistant_label: String,
    pub error_marker: String,
    pub color: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.base_url", DEFAULT_BASE_URL)?
            .set_default("server.stream_path", DEFAULT_STREAM_PATH)?
            .set_default("http.connect_timeout_secs", 10)?
            .set_default("ui.user_label", "user")?
            .set_default("ui.assistant_label", "assistant")?
            .set_default("ui.error_marker", "[error]")?
            .set_default("ui.color", true)?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("streamchat").required(false)),
        };

        // E.g. STREAMCHAT__SERVER__BASE_URL=http://10.0.0.2:8000
        builder = builder.add_source(
            Environment::with_prefix("STREAMCHAT")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli.server_url {
            builder = builder.set_override("server.base_url", url.as_str())?;
        }
        if let Some(path) = &cli.stream_path {
            builder = builder.set_override("server.stream_path", path.as_str())?;
        }
        if let Some(secs) = cli.timeout_secs {
            builder = builder.set_override("http.request_timeout_secs", secs)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "streamchat",
            "--server-url",
            "http://example.test",
            "--plain",
            "-p",
            "Hello",
        ])
        .unwrap();
        assert_eq!(cli.server_url.as_deref(), Some("http://example.test"));
        assert!(cli.plain);
        assert_eq!(cli.prompt.as_deref(), Some("Hello"));
        assert!(!cli.log_json);
    }
}
