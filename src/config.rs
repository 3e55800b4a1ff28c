use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub base_url: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Local S3 simulator backed by the filesystem")]
pub struct Args {
    /// Host to bind to (overrides S3_SIM_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides S3_SIM_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides S3_SIM_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Public URL prefix used in returned object URLs (overrides S3_SIM_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("S3_SIM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("S3_SIM_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing S3_SIM_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading S3_SIM_PORT"),
        };
        let env_storage = env::var("S3_SIM_STORAGE_DIR").unwrap_or_else(|_| "./data/storage".into());
        let env_base_url = env::var("S3_SIM_BASE_URL").ok();

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let base_url = args
            .base_url
            .or(env_base_url)
            .unwrap_or_else(|| format!("http://localhost:{}/s3", port));

        Ok(Self {
            host,
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            base_url,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
