use clap::Parser;
use std::path::PathBuf;

use chanmint::{try_load_default_config, ConfigError, ServiceConfig};

pub const ENV_PREFIX: &str = "CHANMINT";

#[derive(Parser, Debug)]
#[command(
    name = "chanmint",
    version,
    about = "Mint short-lived channels and the tokens to join them",
    long_about = None
)]
pub struct Cli {
    /// Path to a JSON or TOML configuration file
    #[arg(short, long, env = "CHANMINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind, overrides the configured value
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on, overrides the configured value
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable debug logging unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the service configuration.
    ///
    /// An explicit `--config` file wins; otherwise `CHANMINT_*` variables are
    /// read, then the default file locations. Flags are applied last.
    pub fn load_config(&self) -> Result<ServiceConfig, ConfigError> {
        let config = match &self.config {
            Some(path) => ServiceConfig::from_path(path)?,
            None => match ServiceConfig::from_env_or_file(ENV_PREFIX) {
                Ok(config) => config,
                Err(env_err) => try_load_default_config().ok_or(env_err)?,
            },
        };

        self.apply_overrides(config)
    }

    fn apply_overrides(&self, config: ServiceConfig) -> Result<ServiceConfig, ConfigError> {
        if self.bind.is_none() && self.port.is_none() {
            return Ok(config);
        }

        let mut builder = config.to_builder();
        if let Some(bind) = &self.bind {
            builder = builder.bind_address(bind.clone());
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        builder.build()
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "chanmint=debug,tower_http=debug"
        } else {
            "chanmint=info,tower_http=info"
        }
    }
}
