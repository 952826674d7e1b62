use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Application configuration, loadable from a YAML file, environment
/// variables, or the CLI. Precedence: CLI > env > file > defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listen host for the HTTP API.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port for the HTTP API.
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Force debug-level logging.
    #[serde(default)]
    pub debug: bool,

    /// Quiet mode (suppress non-error logs).
    #[serde(default)]
    pub quiet: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "lookups.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            debug: false,
            quiet: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Merge environment variables into config (HOST, PORT, DB_PATH, DEBUG).
    pub fn merge_env(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(db_path) = std::env::var("DB_PATH") {
            self.db_path = db_path;
        }
        if let Ok(debug) = std::env::var("DEBUG") {
            self.debug = matches!(debug.as_str(), "1" | "true" | "True");
        }
    }

    /// Merge CLI args into config (CLI takes precedence).
    pub fn merge_cli(&mut self, cli: &CliArgs) {
        if cli.host != default_host() {
            self.host = cli.host.clone();
        }
        if cli.port != default_port() {
            self.port = cli.port;
        }
        if cli.db_path != default_db_path() {
            self.db_path = cli.db_path.clone();
        }
        if cli.debug {
            self.debug = true;
        }
        if cli.quiet {
            self.quiet = true;
        }
    }
}

use clap::Parser;

/// leyline: domain lookup API with persistent history
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Host to bind the API server on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to serve the API on.
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// SQLite database path.
    #[arg(long, default_value = "lookups.db")]
    pub db_path: String,

    /// Path to YAML config file.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Force debug-level logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Quiet mode (suppress non-error logs).
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
