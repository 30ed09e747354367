use super::AppConfig;
use crate::utils::error::Result;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "greenward")]
#[command(about = "Ward greenery analysis backend backed by Gemini and Perplexity")]
pub struct CliConfig {
    /// Path to a TOML configuration file; environment variables are used when omitted
    #[arg(short, long)]
    pub config: Option<String>,

    /// Address to bind, overrides the configured host
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on, overrides the configured port
    #[arg(short, long)]
    pub port: Option<u16>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliConfig {
    /// Loads the configuration source selected on the command line and applies overrides.
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path);
                AppConfig::from_file(path)?
            }
            None => {
                tracing::info!("Loading configuration from environment");
                AppConfig::from_env()?
            }
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        Ok(config)
    }
}
