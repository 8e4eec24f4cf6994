//! Layered loading: defaults, optional TOML file, then environment overrides

use crate::dex_config::DexConfig;
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use std::path::Path;
use tracing::{debug, info};

/// Environment variable prefix (`SIMPLEDEX__POLLING__RESERVES_MS=5000`)
pub const ENV_PREFIX: &str = "SIMPLEDEX";

/// Separator between prefix, section and key
pub const ENV_SEPARATOR: &str = "__";

impl DexConfig {
    /// Load configuration from an optional file with environment overrides
    ///
    /// A missing `path` means defaults plus environment only. A path that is
    /// given but does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults =
            Config::try_from(&DexConfig::default()).context("Failed to seed default configuration")?;

        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            info!("Loading configuration file: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: DexConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        debug!(
            "Configuration loaded for chain {} via {}",
            config.network.chain_id, config.network.rpc_url
        );
        Ok(config)
    }

    /// Expand `${VAR}` references in string values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let expanded =
            shellexpand::env(&self.network.rpc_url).context("Failed to expand RPC URL")?;
        self.network.rpc_url = expanded.to_string();

        if let Some(key) = &self.wallet.private_key {
            let expanded = shellexpand::env(key).context("Failed to expand wallet private key")?;
            self.wallet.private_key = Some(expanded.to_string());
        }

        Ok(())
    }
}

/// Load, expand and validate in one step
pub fn load_config(path: Option<&Path>) -> Result<DexConfig> {
    let mut config = DexConfig::load(path)?;
    config.expand_env_vars()?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
