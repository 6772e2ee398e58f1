//! Configuration for custodyctl

use std::path::Path;

use custody_core::FundConfig;
use serde::{Deserialize, Serialize};

/// Main CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Fund construction parameters
    #[serde(default)]
    pub fund: FundConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CliConfig {
    /// Load configuration: defaults, then the optional file, then `CUSTODY_*`
    /// environment variables (`CUSTODY_FUND__MAXIMUM_ALLOWANCE=500`,
    /// `CUSTODY_FUND__BENEFACTORS=alice,bob`).
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CliConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CUSTODY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("fund.benefactors")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
