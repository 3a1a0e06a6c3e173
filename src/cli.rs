//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

/// OAuth 2.0 Authorization Code redirect middleware for browser SPAs.
#[derive(Parser, Debug)]
#[command(name = "oauth-redirect-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, env = "OAUTH_GATEWAY_CONFIG", default_value = "build/config.json")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "OAUTH_GATEWAY_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json).
    #[arg(long, env = "OAUTH_GATEWAY_LOG_FORMAT")]
    pub log_format: Option<String>,
}
