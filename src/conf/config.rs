use std::path::Path;

use crate::{
    conf::CodecConfig,
    core::BlockcolError::{self, ConfigParsingError},
};
use config::Config as CConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub codec: CodecConfig,
}

impl Config {
    pub fn from_str(toml_str: &str) -> Result<Config, BlockcolError> {
        let config = CConfig::builder()
            .add_source(config::File::from_str(toml_str, config::FileFormat::Toml))
            .build()
            .map_err(|e| ConfigParsingError(e.to_string()))?
            .try_deserialize::<Config>()
            .map_err(|e| ConfigParsingError(e.to_string()))?;
        config.codec.validate()?;
        Ok(config)
    }

    /// Load a TOML file; `BLOCKCOL_CODEC__<FIELD>` environment variables
    /// take precedence over the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, BlockcolError> {
        let config = CConfig::builder()
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix("BLOCKCOL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigParsingError(e.to_string()))?
            .try_deserialize::<Config>()
            .map_err(|e| ConfigParsingError(e.to_string()))?;
        config.codec.validate()?;
        Ok(config)
    }
}
