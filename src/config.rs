//! Top-level configuration
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. `ESCALATION__<SECTION>__<FIELD>` environment variables
//! 4. `ESCALATION_*` overrides for the integration section (including secrets)
//!
//! A `.env` file in the working directory is loaded first if present.

use crate::classifier::ThresholdCriteria;
use crate::error::Result;
use crate::logging::LoggingConfig;
use crate::notify::IntegrationConfig;
use ::config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

const ENV_PREFIX: &str = "ESCALATION";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub integration: IntegrationConfig,

    #[serde(default)]
    pub threshold: ThresholdCriteria,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from `path` (if given) and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Ok(dotenv) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", dotenv.display());
        }

        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let config: Config = builder.add_source(env_source()).build()?.try_deserialize()?;
        Ok(config.with_env_overrides())
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = ::config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Self {
        self.integration = self.integration.from_env();
        self
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
